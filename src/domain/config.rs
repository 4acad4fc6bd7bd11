//! Decoder configuration profiles
//!
//! A `DecoderConfig` is a saved profile: the optional FSK parameters of a
//! known station plus the tuning knobs of every pipeline stage. Missing
//! FSK parameters mean "run the estimator first".

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{RttyError, RttyResult};
use super::types::FskParameters;

/// How bit boundaries are recovered from the correlation stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockStrategy {
    /// Phase-locked bit clock that re-centres on transitions
    #[default]
    Pll,
    /// Start-bit scan with a fixed bit-centre schedule per frame
    FixedTiming,
}

/// Tuning of the blind parameter search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub band_low_hz: f64,
    pub band_high_hz: f64,
    /// Spectrogram window length
    pub window_ms: f64,
    /// Spectrogram hop
    pub hop_ms: f64,
    /// Grid step of candidate mark frequencies
    pub candidate_step_hz: f64,
    /// Standard shifts tried before the arbitrary-shift sweep
    pub shifts: Vec<f64>,
    pub baud_candidates: Vec<f64>,
    /// A pair qualifies when its anti-correlation is below this
    pub anticorrelation_threshold: f64,
    /// Stricter threshold for the arbitrary-shift fallback sweep
    pub arbitrary_shift_threshold: f64,
    /// Weaker tone's mean energy over the stronger one's; rejects a strong
    /// tone paired with its own spectral leakage
    pub min_tone_balance: f64,
    pub dedup_bucket_hz: f64,
    pub max_pairs: usize,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            band_low_hz: 200.0,
            band_high_hz: 3500.0,
            window_ms: 20.0,
            hop_ms: 10.0,
            candidate_step_hz: 5.0,
            shifts: vec![170.0, 200.0, 425.0, 450.0, 850.0],
            baud_candidates: vec![45.45, 50.0, 75.0, 100.0],
            anticorrelation_threshold: -0.3,
            arbitrary_shift_threshold: -0.5,
            min_tone_balance: 0.1,
            dedup_bucket_hz: 20.0,
            max_pairs: 15,
        }
    }
}

fn default_name() -> String {
    "Default".to_string()
}

fn default_pll_gain() -> f64 {
    0.05
}

fn default_threshold() -> f64 {
    0.15
}

/// A saved decoder profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub mark_hz: Option<f64>,
    #[serde(default)]
    pub space_hz: Option<f64>,
    #[serde(default)]
    pub baud_rate: Option<f64>,
    #[serde(default)]
    pub invert_polarity: bool,
    #[serde(default)]
    pub strategy: ClockStrategy,
    /// Correlator block length override, in samples
    #[serde(default)]
    pub block_size: Option<usize>,
    /// Correlator hop override, in samples (defaults to half the block length)
    #[serde(default)]
    pub hop_size: Option<usize>,
    #[serde(default = "default_pll_gain")]
    pub pll_gain: f64,
    /// Hysteresis level a correlation value must cross to count as a transition
    #[serde(default = "default_threshold")]
    pub transition_threshold: f64,
    /// Minimum start-bit confidence for a frame to be trusted
    #[serde(default = "default_threshold")]
    pub start_threshold: f64,
    #[serde(default)]
    pub estimator: EstimatorConfig,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            mark_hz: None,
            space_hz: None,
            baud_rate: None,
            invert_polarity: false,
            strategy: ClockStrategy::default(),
            block_size: None,
            hop_size: None,
            pll_gain: default_pll_gain(),
            transition_threshold: default_threshold(),
            start_threshold: default_threshold(),
            estimator: EstimatorConfig::default(),
        }
    }
}

impl DecoderConfig {
    /// Profile preset for a known station
    pub fn with_parameters(params: FskParameters) -> Self {
        Self {
            mark_hz: Some(params.mark_hz),
            space_hz: Some(params.space_hz),
            baud_rate: Some(params.baud_rate),
            invert_polarity: params.invert_polarity,
            ..Self::default()
        }
    }

    /// The configured FSK parameters, if all three values are present.
    ///
    /// Returns `Ok(None)` when any of mark/space/baud is missing (the caller
    /// must run the estimator) and an error when they are present but invalid.
    pub fn fsk_parameters(&self) -> RttyResult<Option<FskParameters>> {
        match (self.mark_hz, self.space_hz, self.baud_rate) {
            (Some(mark_hz), Some(space_hz), Some(baud_rate)) => {
                let params = FskParameters {
                    mark_hz,
                    space_hz,
                    baud_rate,
                    invert_polarity: self.invert_polarity,
                };
                params.validate()?;
                Ok(Some(params))
            }
            _ => Ok(None),
        }
    }

    /// Check the tuning knobs for values the pipeline cannot run with
    pub fn validate(&self) -> RttyResult<()> {
        sanitize_name(&self.name)?;
        self.fsk_parameters()?;
        if self.block_size == Some(0) || self.hop_size == Some(0) {
            return Err(RttyError::Config("block and hop sizes must be positive".into()));
        }
        if !(self.pll_gain > 0.0 && self.pll_gain <= 1.0) {
            return Err(RttyError::Config(format!(
                "pll_gain must be in (0, 1], got {}",
                self.pll_gain
            )));
        }
        if !(0.0..1.0).contains(&self.transition_threshold) || !(0.0..1.0).contains(&self.start_threshold) {
            return Err(RttyError::Config("thresholds must be in [0, 1)".into()));
        }
        let est = &self.estimator;
        if est.band_low_hz <= 0.0 || est.band_high_hz <= est.band_low_hz {
            return Err(RttyError::Config(format!(
                "invalid estimator band {}..{} Hz",
                est.band_low_hz, est.band_high_hz
            )));
        }
        if est.window_ms <= 0.0 || est.hop_ms <= 0.0 || est.candidate_step_hz <= 0.0 {
            return Err(RttyError::Config("estimator window, hop and step must be positive".into()));
        }
        if est.baud_candidates.is_empty() || est.baud_candidates.iter().any(|&b| b <= 0.0) {
            return Err(RttyError::Config("baud candidates must be non-empty and positive".into()));
        }
        Ok(())
    }

    /// Load a profile from a JSON file
    pub fn load(path: impl AsRef<Path>) -> RttyResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| RttyError::Config(format!("Failed to parse '{}': {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Save this profile as `<dir>/<name>.json`, returning the written path
    pub fn save(&self, dir: impl AsRef<Path>) -> RttyResult<std::path::PathBuf> {
        let name = sanitize_name(&self.name)?;
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{name}.json"));
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| RttyError::Config(format!("Serialization error: {e}")))?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}

/// Reject profile names that could escape the profile directory
fn sanitize_name(name: &str) -> RttyResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(RttyError::Config("Configuration name cannot be empty".into()));
    }
    if trimmed.contains("..") || trimmed.contains('/') || trimmed.contains('\\') {
        return Err(RttyError::Config("Invalid configuration name".into()));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_alphanumeric() || c == ' ' || c == '-' || c == '_')
    {
        return Err(RttyError::Config(
            "Configuration name contains invalid characters".into(),
        ));
    }
    Ok(trimmed.to_string())
}
