//! Windowed FFT magnitude frames for spectral analysis

use std::sync::Arc;

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// FFT processor for computing magnitude spectra of fixed-size frames
pub struct FftProcessor {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
}

impl FftProcessor {
    /// Create a new FFT processor with the given size
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        // Hann window
        let window: Vec<f32> = (0..fft_size)
            .map(|i| {
                let x = std::f32::consts::PI * i as f32 / fft_size as f32;
                0.5 * (1.0 - (2.0 * x).cos())
            })
            .collect();

        Self {
            fft,
            fft_size,
            window,
            buffer: Vec::with_capacity(fft_size),
        }
    }

    /// Linear magnitudes of bins `0..=fft_size/2`.
    ///
    /// Input shorter than `fft_size` is zero-padded.
    pub fn magnitudes(&mut self, samples: &[f32]) -> Vec<f32> {
        self.buffer.clear();
        self.buffer.extend(
            samples
                .iter()
                .take(self.fft_size)
                .zip(self.window.iter())
                .map(|(&s, &w)| Complex::new(s * w, 0.0)),
        );
        self.buffer.resize(self.fft_size, Complex::new(0.0, 0.0));

        self.fft.process(&mut self.buffer);

        self.buffer[..=self.fft_size / 2]
            .iter()
            .map(|c| c.norm())
            .collect()
    }

    /// Centre frequency of `bin` at `sample_rate`
    pub fn bin_frequency(&self, bin: usize, sample_rate: f64) -> f64 {
        bin as f64 * sample_rate / self.fft_size as f64
    }
}
