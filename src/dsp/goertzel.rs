//! Goertzel single-bin power
//!
//! Two flavours: `Goertzel::for_bin` snaps the target to the nearest DFT bin
//! of the block (the correlator's discriminator), `tone_power` evaluates the
//! exact frequency (used by the estimator to refine tone estimates).

use std::f64::consts::PI;

/// Precomputed recursion coefficient for one frequency and block length
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Goertzel {
    coeff: f64,
}

impl Goertzel {
    /// Coefficient `2·cos(2π·round(N·f/sr)/N)` for a block of `block_len` samples
    pub fn for_bin(freq: f64, sample_rate: f64, block_len: usize) -> Self {
        let n = block_len as f64;
        let k = (n * freq / sample_rate).round();
        Self {
            coeff: 2.0 * (2.0 * PI * k / n).cos(),
        }
    }

    /// Coefficient for the exact frequency, independent of block length
    pub fn for_frequency(freq: f64, sample_rate: f64) -> Self {
        Self {
            coeff: 2.0 * (2.0 * PI * freq / sample_rate).cos(),
        }
    }

    /// Run the second-order recursion and return `s1² + s2² − coeff·s1·s2`
    pub fn power<I>(&self, samples: I) -> f64
    where
        I: IntoIterator<Item = f32>,
    {
        let mut s1 = 0.0f64;
        let mut s2 = 0.0f64;
        for x in samples {
            let s0 = x as f64 + self.coeff * s1 - s2;
            s2 = s1;
            s1 = s0;
        }
        // Rounding can leave a tiny negative residue for near-silent input
        (s1 * s1 + s2 * s2 - self.coeff * s1 * s2).max(0.0)
    }
}

/// Power at exactly `freq`
pub fn tone_power(samples: &[f32], freq: f64, sample_rate: f64) -> f64 {
    Goertzel::for_frequency(freq, sample_rate).power(samples.iter().copied())
}
