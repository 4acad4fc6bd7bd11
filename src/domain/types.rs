//! Core domain types
//!
//! Pure types with no I/O dependencies. These flow between the pipeline
//! stages: audio → correlation samples → bit decisions → characters.

use serde::{Deserialize, Serialize};

use super::error::{RttyError, RttyResult};

/// Audio sample type (32-bit float, range -1.0 to 1.0)
pub type AudioSample = f32;

/// A captured block of mono audio tagged with its sample rate.
///
/// Immutable once built; decode calls only ever borrow it.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<AudioSample>,
    sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<AudioSample>, sample_rate: u32) -> RttyResult<Self> {
        if sample_rate == 0 {
            return Err(RttyError::InvalidAudio("sample rate must be positive".into()));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[AudioSample] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Mark/space tones, baud rate and polarity of one RTTY signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FskParameters {
    pub mark_hz: f64,
    pub space_hz: f64,
    pub baud_rate: f64,
    #[serde(default)]
    pub invert_polarity: bool,
}

impl FskParameters {
    /// Build a validated parameter set with normal polarity
    pub fn new(mark_hz: f64, space_hz: f64, baud_rate: f64) -> RttyResult<Self> {
        let params = Self {
            mark_hz,
            space_hz,
            baud_rate,
            invert_polarity: false,
        };
        params.validate()?;
        Ok(params)
    }

    /// Same tones and baud rate with the polarity flag set to `invert`
    pub fn with_polarity(self, invert: bool) -> Self {
        Self {
            invert_polarity: invert,
            ..self
        }
    }

    /// Absolute tone separation in Hz
    pub fn shift_hz(&self) -> f64 {
        (self.mark_hz - self.space_hz).abs()
    }

    pub fn validate(&self) -> RttyResult<()> {
        let finite = self.mark_hz.is_finite() && self.space_hz.is_finite() && self.baud_rate.is_finite();
        if !finite {
            return Err(RttyError::InvalidParameters("values must be finite".into()));
        }
        if self.mark_hz <= 0.0 || self.space_hz <= 0.0 {
            return Err(RttyError::InvalidParameters(format!(
                "tone frequencies must be positive (mark={}, space={})",
                self.mark_hz, self.space_hz
            )));
        }
        if self.mark_hz == self.space_hz {
            return Err(RttyError::InvalidParameters(format!(
                "mark and space must differ (both {} Hz)",
                self.mark_hz
            )));
        }
        if self.baud_rate <= 0.0 {
            return Err(RttyError::InvalidParameters(format!(
                "baud rate must be positive, got {}",
                self.baud_rate
            )));
        }
        Ok(())
    }

    /// Validate against a sample rate: both tones must sit below Nyquist
    pub fn validate_for(&self, sample_rate: u32) -> RttyResult<()> {
        self.validate()?;
        let nyquist = sample_rate as f64 / 2.0;
        if self.mark_hz >= nyquist || self.space_hz >= nyquist {
            return Err(RttyError::InvalidParameters(format!(
                "tones must be below Nyquist ({nyquist} Hz)"
            )));
        }
        if self.baud_rate >= sample_rate as f64 {
            return Err(RttyError::InvalidParameters(format!(
                "baud rate {} not representable at {sample_rate} Hz",
                self.baud_rate
            )));
        }
        Ok(())
    }
}

/// One correlator output: +1 = all mark energy, -1 = all space energy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelationSample {
    /// Sequential block index since the start of the stream
    pub index: u64,
    pub value: f32,
    /// Sum of mark and space power (diagnostic only)
    pub magnitude: f32,
}

/// A sampled bit: 1 = mark, 0 = space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BitDecision {
    /// Fractional correlation-sample index of the sampling instant
    pub position: f64,
    pub value: u8,
    pub confidence: f32,
}

impl BitDecision {
    pub fn is_mark(&self) -> bool {
        self.value == 1
    }

    pub fn is_space(&self) -> bool {
        self.value == 0
    }
}

/// Counters for the recoverable anomalies of a decode run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeStats {
    pub correlation_samples: u64,
    pub bit_decisions: u64,
    pub characters: u64,
    pub false_starts: u64,
    /// Stop bit sampled as space; the character is still decoded
    pub framing_errors: u64,
    /// Codes whose table entry is reserved
    pub dropped_codes: u64,
    pub shift_changes: u64,
}

/// Outcome of a complete decode run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeResult {
    pub text: String,
    /// True when the stream ended in the middle of a character frame
    pub partial: bool,
    pub stats: DecodeStats,
}
