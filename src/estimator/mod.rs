//! Parameter estimator: mark, space and baud rate from raw audio
//!
//! Stages:
//! 1. `spectrogram`: band-limited FFT magnitude frames
//! 2. `tone_pairs`: anti-correlated tone pairs, ranked and deduplicated
//! 3. `refine`: sub-hertz tone frequencies from pure-tone segments
//! 4. `baud`: bit period fit over transition run lengths
//!
//! Polarity is not estimated; `polarity::resolve_polarity` decodes both ways
//! for callers that want to pick one by the text. `finetune::fine_tune`
//! likewise sweeps baud rate and mark frequency by decode score.

pub mod baud;
pub mod finetune;
pub mod polarity;
pub mod refine;
pub mod spectrogram;
pub mod tone_pairs;

use serde::{Deserialize, Serialize};

use crate::domain::{AudioBuffer, DecoderConfig, EstimatorConfig, FskParameters, RttyError, RttyResult};

pub use baud::BaudFit;
pub use finetune::{fine_tune, FineTune};
pub use polarity::{resolve_polarity, score_text};
pub use spectrogram::Spectrogram;
pub use tone_pairs::TonePair;

/// Confidence at or above which an estimate is considered usable
pub const PASS_CONFIDENCE: f64 = 0.3;

/// Baud fit error (RMS, in bit periods) at which confidence reaches zero
const RMS_ZERO_CONFIDENCE: f64 = 0.25;

/// How many ranked pairs to try before giving up on baud fitting
const PAIRS_TO_TRY: usize = 3;

/// Refinement sweeps at least this far from a coarse tone
const MIN_REFINE_RADIUS_HZ: f64 = 60.0;

/// ...and at least this many spectrogram bins
const REFINE_RADIUS_BINS: f64 = 1.5;

/// Best-guess parameters for a recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub params: FskParameters,
    /// 0..1: pair anti-correlation scaled down by baud fit error
    pub confidence: f64,
    pub pair: TonePair,
    pub baud: BaudFit,
}

impl Estimate {
    pub fn passes(&self) -> bool {
        self.confidence >= PASS_CONFIDENCE
    }
}

pub struct ParameterEstimator {
    config: EstimatorConfig,
}

impl ParameterEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    /// Every qualifying tone pair, most anti-correlated first
    pub fn candidate_pairs(&self, audio: &AudioBuffer) -> RttyResult<Vec<TonePair>> {
        let spec = Spectrogram::compute(audio, &self.config)?;
        Ok(tone_pairs::search(&spec, &self.config))
    }

    /// Estimate mark, space and baud rate.
    ///
    /// Fails with `ParameterUndetermined` when no pair clears the
    /// anti-correlation threshold, or none of the best pairs yields a baud
    /// fit with confidence of at least `PASS_CONFIDENCE`.
    pub fn estimate(&self, audio: &AudioBuffer) -> RttyResult<Estimate> {
        log::debug!("estimating parameters over {:.1} s of audio", audio.duration());
        let spec = Spectrogram::compute(audio, &self.config)?;
        let pairs = tone_pairs::search(&spec, &self.config);
        if pairs.is_empty() {
            log::warn!("estimator: no anti-correlated tone pair found");
            return Err(RttyError::ParameterUndetermined(
                "no tone pair clears the anti-correlation threshold".into(),
            ));
        }

        let radius = (spec.bin_hz() * REFINE_RADIUS_BINS).max(MIN_REFINE_RADIUS_HZ);
        let mut last_err = None;
        for pair in pairs.iter().take(PAIRS_TO_TRY) {
            match self.estimate_pair(audio, pair, radius) {
                Ok(estimate) if !estimate.passes() => {
                    log::debug!(
                        "pair {:.0}/{:.0} Hz: confidence {:.2} below {PASS_CONFIDENCE}",
                        pair.mark_hz,
                        pair.space_hz,
                        estimate.confidence
                    );
                    last_err = Some(RttyError::ParameterUndetermined(format!(
                        "no pair reaches confidence {PASS_CONFIDENCE} (last {:.2})",
                        estimate.confidence
                    )));
                }
                Ok(estimate) => {
                    log::info!(
                        "estimated mark {:.1} Hz, space {:.1} Hz, {} baud (confidence {:.2})",
                        estimate.params.mark_hz,
                        estimate.params.space_hz,
                        estimate.params.baud_rate,
                        estimate.confidence
                    );
                    return Ok(estimate);
                }
                Err(e) => {
                    log::debug!("pair {:.0}/{:.0} Hz rejected: {e}", pair.mark_hz, pair.space_hz);
                    last_err = Some(e);
                }
            }
        }

        let err = last_err.unwrap_or_else(|| RttyError::ParameterUndetermined("no usable pair".into()));
        log::warn!("estimator: {err}");
        Err(err)
    }

    fn estimate_pair(&self, audio: &AudioBuffer, pair: &TonePair, radius: f64) -> RttyResult<Estimate> {
        // Baud is unknown yet; the refinement and timing streams ignore it
        let coarse = FskParameters::new(pair.mark_hz, pair.space_hz, 1.0)?;
        let tones = refine::refine(audio, &coarse, radius);
        let (mark_hz, space_hz) = if tones.mark_hz > tones.space_hz {
            (tones.mark_hz, tones.space_hz)
        } else {
            (pair.mark_hz, pair.space_hz)
        };
        let refined = FskParameters::new(mark_hz, space_hz, 1.0)?;

        let baud = baud::fit_baud(audio, &refined, &self.config.baud_candidates)?;
        let params = FskParameters::new(mark_hz, space_hz, baud.baud_rate)?;

        let fit_quality = 1.0 - (baud.rms_error / (RMS_ZERO_CONFIDENCE * baud.period)).min(1.0);
        Ok(Estimate {
            params,
            confidence: pair.anticorrelation.abs() * fit_quality,
            pair: *pair,
            baud,
        })
    }
}

/// Parameters for decoding `audio` under `config`.
///
/// Fully configured profiles are used as-is. Otherwise the estimator runs
/// and any configured value overrides its estimate.
pub fn resolve_parameters(audio: &AudioBuffer, config: &DecoderConfig) -> RttyResult<FskParameters> {
    if let Some(params) = config.fsk_parameters()? {
        return Ok(params);
    }

    let estimate = ParameterEstimator::new(config.estimator.clone()).estimate(audio)?;

    let params = FskParameters {
        mark_hz: config.mark_hz.unwrap_or(estimate.params.mark_hz),
        space_hz: config.space_hz.unwrap_or(estimate.params.space_hz),
        baud_rate: config.baud_rate.unwrap_or(estimate.params.baud_rate),
        invert_polarity: config.invert_polarity,
    };
    params.validate_for(audio.sample_rate())?;
    Ok(params)
}
