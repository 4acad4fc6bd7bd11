//! Fine tone frequency refinement
//!
//! Spectrogram bins are tens of hertz wide. To get within a couple of hertz
//! the coarse pair drives a correlator over the recording, the stream is cut
//! into pure-tone segments (between confident transitions, with a guard band
//! trimmed off each end), and an exact-frequency Goertzel sweep over those
//! segments locates each tone's peak. Parabolic interpolation of the three
//! samples around the peak gives the sub-hertz estimate.

use crate::domain::{AudioBuffer, FskParameters};
use crate::dsp::correlator::{correlate, default_block_size};
use crate::dsp::goertzel::tone_power;

/// Correlation level that counts as confidently one tone
const CONFIDENT_LEVEL: f32 = 0.5;

/// Fraction of the shift the sweep may move each tone
const SEARCH_SHIFT_FRACTION: f64 = 0.45;

const SWEEP_STEP_HZ: f64 = 1.0;

/// Audio span `[start, end)` carrying one tone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start: usize,
    pub end: usize,
    pub mark: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefinedTones {
    pub mark_hz: f64,
    pub space_hz: f64,
    pub mark_segments: usize,
    pub space_segments: usize,
}

/// Pure-tone segments of `audio` according to a correlator on `coarse`
pub fn tone_segments(audio: &AudioBuffer, coarse: &FskParameters) -> Vec<Segment> {
    let sr = audio.sample_rate();
    let block = default_block_size(coarse, sr);
    let hop = (block / 8).max(1);
    let stream = correlate(audio.samples(), sr, coarse, block, hop);

    // (audio position, level after the edge)
    let mut edges: Vec<(f64, bool)> = Vec::new();
    let mut level: Option<bool> = None;
    let mut crossing: Option<f64> = None;
    for pair in stream.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if (a.value < 0.0) != (b.value < 0.0) {
            let span = a.value - b.value;
            let frac = if span.abs() > f32::EPSILON { a.value / span } else { 0.5 };
            crossing = Some(a.index as f64 + frac.clamp(0.0, 1.0) as f64);
        }

        let next = if b.value > CONFIDENT_LEVEL {
            Some(true)
        } else if b.value < -CONFIDENT_LEVEL {
            Some(false)
        } else {
            level
        };
        if let (Some(prev), Some(now)) = (level, next) {
            if prev != now {
                let at = crossing.unwrap_or(b.index as f64 - 0.5);
                edges.push((at * hop as f64 + block as f64 / 2.0, now));
            }
        }
        level = next;
    }

    let guard = block as f64 / 2.0;
    edges
        .windows(2)
        .filter_map(|w| {
            let start = (w[0].0 + guard).ceil().max(0.0) as usize;
            let end = ((w[1].0 - guard).floor().max(0.0) as usize).min(audio.len());
            (end >= start + block).then_some(Segment {
                start,
                end,
                mark: w[0].1,
            })
        })
        .collect()
}

fn hann(samples: &[f32]) -> Vec<f32> {
    let n = samples.len() as f32;
    samples
        .iter()
        .enumerate()
        .map(|(i, &s)| s * 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n).cos()))
        .collect()
}

/// Frequency of peak summed power over `segments`, within `centre ± radius`
fn sweep_peak(segments: &[Vec<f32>], centre: f64, radius: f64, sample_rate: f64) -> Option<f64> {
    if segments.is_empty() {
        return None;
    }
    let steps = (radius / SWEEP_STEP_HZ).round() as i64;
    let freqs: Vec<f64> = (-steps..=steps)
        .map(|k| centre + k as f64 * SWEEP_STEP_HZ)
        .filter(|&f| f > 0.0 && f < sample_rate / 2.0)
        .collect();
    let powers: Vec<f64> = freqs
        .iter()
        .map(|&f| segments.iter().map(|seg| tone_power(seg, f, sample_rate)).sum())
        .collect();

    let (peak, _) = powers
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))?;
    if peak == 0 || peak + 1 == powers.len() {
        return Some(freqs[peak]);
    }

    let (left, mid, right) = (powers[peak - 1], powers[peak], powers[peak + 1]);
    let denom = left - 2.0 * mid + right;
    let delta = if denom.abs() > f64::EPSILON {
        (0.5 * (left - right) / denom).clamp(-0.5, 0.5)
    } else {
        0.0
    };
    Some(freqs[peak] + delta * SWEEP_STEP_HZ)
}

/// Refine both tones of `coarse`, sweeping each at most `max_radius` Hz
/// (and never beyond 0.45 of the shift). A tone with no pure segments keeps
/// its coarse frequency.
pub fn refine(audio: &AudioBuffer, coarse: &FskParameters, max_radius: f64) -> RefinedTones {
    let segments = tone_segments(audio, coarse);
    let samples = audio.samples();
    let (marks, spaces): (Vec<Segment>, Vec<Segment>) = segments.iter().partition(|s| s.mark);
    let windowed = |segs: &[Segment]| -> Vec<Vec<f32>> {
        segs.iter().map(|s| hann(&samples[s.start..s.end])).collect()
    };

    let radius = (coarse.shift_hz() * SEARCH_SHIFT_FRACTION).min(max_radius);
    let sr = audio.sample_rate() as f64;
    let mark_hz = sweep_peak(&windowed(&marks), coarse.mark_hz, radius, sr).unwrap_or(coarse.mark_hz);
    let space_hz = sweep_peak(&windowed(&spaces), coarse.space_hz, radius, sr).unwrap_or(coarse.space_hz);

    log::debug!(
        "refined tones: mark {:.1} -> {mark_hz:.2} Hz ({} segs), space {:.1} -> {space_hz:.2} Hz ({} segs)",
        coarse.mark_hz,
        marks.len(),
        coarse.space_hz,
        spaces.len()
    );

    RefinedTones {
        mark_hz,
        space_hz,
        mark_segments: marks.len(),
        space_segments: spaces.len(),
    }
}
