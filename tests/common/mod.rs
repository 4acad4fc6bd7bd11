//! Synthetic RTTY audio for integration tests

#![allow(dead_code)]

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rttydecode::modem::baudot::Baudot;
use rttydecode::AudioBuffer;

pub const SAMPLE_RATE: u32 = 8000;

pub const MARK_HZ: f64 = 1187.5;
pub const SPACE_HZ: f64 = 1018.5;
pub const BAUD: f64 = 45.45;

/// Phase-continuous two-tone FSK transmitter
pub struct FskSignal {
    /// Tone sent for a 1 bit
    pub one_hz: f64,
    /// Tone sent for a 0 bit
    pub zero_hz: f64,
    pub baud: f64,
    pub stop_bits: f64,
    /// Idle mark before the first character
    pub lead_in_bits: f64,
    /// Idle mark after the last character
    pub tail_bits: f64,
    pub amplitude: f64,
    /// Peak amplitude of uniform noise added to every sample
    pub noise: f64,
    pub seed: u64,
}

impl FskSignal {
    pub fn new(one_hz: f64, zero_hz: f64, baud: f64) -> Self {
        Self {
            one_hz,
            zero_hz,
            baud,
            stop_bits: 1.5,
            lead_in_bits: 5.0,
            tail_bits: 3.0,
            amplitude: 0.5,
            noise: 0.0,
            seed: 7,
        }
    }

    /// The standard test signal: 1187.5 / 1018.5 Hz, 45.45 baud
    pub fn standard() -> Self {
        Self::new(MARK_HZ, SPACE_HZ, BAUD)
    }

    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    /// Bit length in samples
    pub fn bit_samples(&self) -> f64 {
        SAMPLE_RATE as f64 / self.baud
    }

    /// Bits of one character frame
    pub fn frame_bits(&self) -> f64 {
        6.0 + self.stop_bits
    }

    /// (bit value, duration in bits) for the whole transmission
    fn levels(&self, codes: &[u8]) -> Vec<(bool, f64)> {
        let mut levels = vec![(true, self.lead_in_bits)];
        for &code in codes {
            levels.push((false, 1.0));
            for i in 0..5 {
                levels.push(((code >> i) & 1 == 1, 1.0));
            }
            levels.push((true, self.stop_bits));
        }
        levels.push((true, self.tail_bits));
        levels
    }

    pub fn render_codes(&self, codes: &[u8]) -> AudioBuffer {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let bit = self.bit_samples();
        let mut samples = Vec::new();
        let mut phase = 0.0f64;
        let mut end = 0.0f64;

        for (one, bits) in self.levels(codes) {
            let freq = if one { self.one_hz } else { self.zero_hz };
            end += bits * bit;
            while (samples.len() as f64) < end.round() {
                let mut x = self.amplitude * phase.sin();
                if self.noise > 0.0 {
                    x += rng.gen_range(-self.noise..self.noise);
                }
                samples.push(x as f32);
                phase = (phase + 2.0 * PI * freq / SAMPLE_RATE as f64) % (2.0 * PI);
            }
        }

        AudioBuffer::new(samples, SAMPLE_RATE).expect("valid sample rate")
    }

    /// Render `text` with a leading LTRS and shift codes where needed
    pub fn render(&self, text: &str) -> AudioBuffer {
        self.render_codes(&Baudot::encode_text(text))
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
