//! Band-limited magnitude spectrogram
//!
//! Hann-windowed FFT frames over the whole recording, trimmed to the search
//! band. Frame `t`, bin `b` is the linear magnitude at `b * bin_hz`. Each
//! frame also carries its noise floor: the median magnitude across the band.

use crate::domain::{AudioBuffer, EstimatorConfig, RttyError, RttyResult};
use crate::dsp::FftProcessor;

pub struct Spectrogram {
    /// `frames[t][b - low_bin]`
    frames: Vec<Vec<f32>>,
    floors: Vec<f32>,
    bin_hz: f64,
    low_bin: usize,
    high_bin: usize,
}

impl Spectrogram {
    pub fn compute(audio: &AudioBuffer, config: &EstimatorConfig) -> RttyResult<Self> {
        let sr = audio.sample_rate() as f64;
        let window = ((sr * config.window_ms / 1000.0).round() as usize).max(2);
        let hop = ((sr * config.hop_ms / 1000.0).round() as usize).max(1);
        if audio.len() < window {
            return Err(RttyError::ParameterUndetermined(format!(
                "{} samples is shorter than one {} ms analysis window",
                audio.len(),
                config.window_ms
            )));
        }

        let mut fft = FftProcessor::new(window);
        let bin_hz = fft.bin_frequency(1, sr);
        let nyquist_bin = window / 2;
        let low_bin = ((config.band_low_hz / bin_hz).ceil() as usize).min(nyquist_bin);
        let high_bin = ((config.band_high_hz.min(sr / 2.0) / bin_hz).floor() as usize).min(nyquist_bin);
        if high_bin <= low_bin {
            return Err(RttyError::ParameterUndetermined(format!(
                "search band {}..{} Hz is empty at {} Hz",
                config.band_low_hz,
                config.band_high_hz,
                audio.sample_rate()
            )));
        }

        let samples = audio.samples();
        let frames: Vec<Vec<f32>> = (0..=(samples.len() - window) / hop)
            .map(|t| {
                let start = t * hop;
                let spectrum = fft.magnitudes(&samples[start..start + window]);
                spectrum[low_bin..=high_bin].to_vec()
            })
            .collect();

        let floors = frames
            .iter()
            .map(|frame| {
                let mut sorted = frame.clone();
                sorted.sort_by(f32::total_cmp);
                sorted[sorted.len() / 2]
            })
            .collect();

        log::debug!(
            "spectrogram: {} frames, {} bins of {:.1} Hz ({:.0}..{:.0} Hz)",
            frames.len(),
            high_bin - low_bin + 1,
            bin_hz,
            low_bin as f64 * bin_hz,
            high_bin as f64 * bin_hz
        );

        Ok(Self {
            frames,
            floors,
            bin_hz,
            low_bin,
            high_bin,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn bin_hz(&self) -> f64 {
        self.bin_hz
    }

    /// Lowest and highest frequency covered
    pub fn band(&self) -> (f64, f64) {
        (self.frequency(self.low_bin), self.frequency(self.high_bin))
    }

    /// Nearest in-band bin for `freq`, if any
    pub fn bin_for(&self, freq: f64) -> Option<usize> {
        let bin = (freq / self.bin_hz).round();
        if bin < self.low_bin as f64 || bin > self.high_bin as f64 {
            return None;
        }
        Some(bin as usize)
    }

    pub fn frequency(&self, bin: usize) -> f64 {
        bin as f64 * self.bin_hz
    }

    /// Median in-band magnitude of every frame
    pub fn floors(&self) -> &[f32] {
        &self.floors
    }

    /// Magnitude of `bin` in every frame
    pub fn series(&self, bin: usize) -> Vec<f32> {
        let col = bin - self.low_bin;
        self.frames.iter().map(|frame| frame[col]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn tone(freq: f64, secs: f64) -> AudioBuffer {
        let n = (8000.0 * secs) as usize;
        let samples = (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / 8000.0).sin() as f32 * 0.5)
            .collect();
        AudioBuffer::new(samples, 8000).unwrap()
    }

    #[test]
    fn frame_and_band_layout() {
        let spec = Spectrogram::compute(&tone(1000.0, 1.0), &EstimatorConfig::default()).unwrap();
        // 160-sample window, 80-sample hop
        assert_eq!(spec.frame_count(), (8000 - 160) / 80 + 1);
        assert_eq!(spec.bin_hz(), 50.0);
        assert_eq!(spec.band(), (200.0, 3500.0));
        assert_eq!(spec.bin_for(100.0), None);
        assert_eq!(spec.bin_for(1010.0), Some(20));
    }

    #[test]
    fn tone_dominates_its_bin() {
        let spec = Spectrogram::compute(&tone(1000.0, 0.5), &EstimatorConfig::default()).unwrap();
        let on = spec.series(20);
        let off = spec.series(30);
        assert!(on.iter().zip(&off).all(|(a, b)| a > &(b * 100.0)));
        assert!(on.iter().zip(spec.floors()).all(|(a, f)| a > &(f * 100.0)));
    }

    #[test]
    fn too_short_is_undetermined() {
        let result = Spectrogram::compute(&tone(1000.0, 0.01), &EstimatorConfig::default());
        assert!(matches!(result, Err(RttyError::ParameterUndetermined(_))));
    }
}
