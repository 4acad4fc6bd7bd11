//! Tone-pair search
//!
//! A real FSK pair is anti-correlated over time: while the mark tone is on
//! the space tone is off. Every candidate pair's two spectrogram series are
//! compared over the active frames and scored by Pearson correlation; the
//! most negative pairs win.
//!
//! A frame is active when the pair's combined energy is above its median
//! and one of the two tones stands clear of the frame's noise floor. The
//! median cut alone makes any two noise bins look anti-correlated.
//!
//! Clicks and other broadband transients also clear the floor, in a handful
//! of frames and in both bins at once. A pair therefore needs a minimum
//! share of active frames, and each tone must clearly dominate the other in
//! some of them.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::spectrogram::Spectrogram;
use crate::domain::EstimatorConfig;

/// Fewest active frames a pair needs before its score means anything
const MIN_ACTIVE_FRAMES: usize = 10;

/// ...and at least this share of all frames
const MIN_ACTIVE_FRACTION: f64 = 0.05;

/// A tone dominates a frame when it is this many times the other tone
const DOMINANCE_RATIO: f64 = 2.0;

/// Share of active frames each tone must dominate
const MIN_DOMINANT_FRACTION: f64 = 0.1;

/// How far above the frame's noise floor a tone must be to count
const TONE_OVER_FLOOR: f32 = 4.0;

/// Shift range and grid of the arbitrary-shift sweep
const ARBITRARY_MIN_SHIFT_HZ: f64 = 50.0;
const ARBITRARY_MAX_SHIFT_HZ: f64 = 1000.0;
const ARBITRARY_STEP_HZ: f64 = 20.0;
const ARBITRARY_LOWEST_MARK_HZ: f64 = 500.0;
const ARBITRARY_BUCKET_HZ: f64 = 30.0;

/// A candidate mark/space pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TonePair {
    /// Higher of the two tones
    pub mark_hz: f64,
    pub space_hz: f64,
    pub shift_hz: f64,
    /// Pearson correlation of the two energy series; -1 is a perfect pair
    pub anticorrelation: f64,
    /// Mean combined magnitude over the active frames
    pub energy: f64,
}

/// Score the series of two bins against the per-frame noise floor
fn pair_score(a: &[f32], b: &[f32], floors: &[f32], min_balance: f64) -> Option<(f64, f64)> {
    let combined: Vec<f32> = a.iter().zip(b).map(|(x, y)| x + y).collect();
    let mut sorted = combined.clone();
    sorted.sort_by(f32::total_cmp);
    let median = *sorted.get(sorted.len() / 2)?;

    let active: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .zip(combined.iter().zip(floors))
        .filter(|((x, y), (c, floor))| **c > median && x.max(**y) > **floor * TONE_OVER_FLOOR)
        .map(|((&x, &y), _)| (x as f64, y as f64))
        .collect();
    let needed = MIN_ACTIVE_FRAMES.max((a.len() as f64 * MIN_ACTIVE_FRACTION).ceil() as usize);
    if active.len() < needed {
        return None;
    }

    let a_dominant = active.iter().filter(|p| p.0 > DOMINANCE_RATIO * p.1).count();
    let b_dominant = active.iter().filter(|p| p.1 > DOMINANCE_RATIO * p.0).count();
    if (a_dominant.min(b_dominant) as f64) < active.len() as f64 * MIN_DOMINANT_FRACTION {
        return None;
    }

    let n = active.len() as f64;
    let mean_a = active.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_b = active.iter().map(|p| p.1).sum::<f64>() / n;
    let (weak, strong) = if mean_a < mean_b { (mean_a, mean_b) } else { (mean_b, mean_a) };
    if strong <= 0.0 || weak / strong < min_balance {
        return None;
    }

    let var_a = active.iter().map(|p| (p.0 - mean_a).powi(2)).sum::<f64>() / n;
    let var_b = active.iter().map(|p| (p.1 - mean_b).powi(2)).sum::<f64>() / n;
    let denom = (var_a * var_b).sqrt();
    if denom <= f64::EPSILON {
        return None;
    }
    let cov = active
        .iter()
        .map(|p| (p.0 - mean_a) * (p.1 - mean_b))
        .sum::<f64>()
        / n;

    Some(((cov / denom).clamp(-1.0, 1.0), mean_a + mean_b))
}

/// Evaluates bin pairs once each, however many grid points land on them
struct PairScorer<'a> {
    spec: &'a Spectrogram,
    min_balance: f64,
    series: HashMap<usize, Vec<f32>>,
    scores: HashMap<(usize, usize), Option<(f64, f64)>>,
}

impl<'a> PairScorer<'a> {
    fn new(spec: &'a Spectrogram, min_balance: f64) -> Self {
        Self {
            spec,
            min_balance,
            series: HashMap::new(),
            scores: HashMap::new(),
        }
    }

    /// Score the pair at `mark`/`space`, returning it when both map to
    /// distinct in-band bins and the score exists
    fn score(&mut self, mark: f64, space: f64) -> Option<TonePair> {
        let mark_bin = self.spec.bin_for(mark)?;
        let space_bin = self.spec.bin_for(space)?;
        if mark_bin == space_bin {
            return None;
        }

        if !self.scores.contains_key(&(mark_bin, space_bin)) {
            for bin in [mark_bin, space_bin] {
                self.series
                    .entry(bin)
                    .or_insert_with(|| self.spec.series(bin));
            }
            let score = pair_score(
                &self.series[&mark_bin],
                &self.series[&space_bin],
                self.spec.floors(),
                self.min_balance,
            );
            self.scores.insert((mark_bin, space_bin), score);
        }
        let (anticorrelation, energy) = self.scores[&(mark_bin, space_bin)]?;

        let mark_hz = self.spec.frequency(mark_bin);
        let space_hz = self.spec.frequency(space_bin);
        Some(TonePair {
            mark_hz,
            space_hz,
            shift_hz: mark_hz - space_hz,
            anticorrelation,
            energy,
        })
    }
}

/// Rank by anti-correlation (most negative first), keep the first pair of
/// each bucket key, cap at `max_pairs`
fn rank<K, F>(mut pairs: Vec<TonePair>, max_pairs: usize, key: F) -> Vec<TonePair>
where
    K: std::hash::Hash + Eq,
    F: Fn(&TonePair) -> K,
{
    pairs.sort_by(|a, b| a.anticorrelation.total_cmp(&b.anticorrelation));
    let mut seen = HashSet::new();
    pairs
        .into_iter()
        .filter(|p| seen.insert(key(p)))
        .take(max_pairs)
        .collect()
}

/// Pairs at the standard shifts
pub fn standard_pairs(spec: &Spectrogram, config: &EstimatorConfig) -> Vec<TonePair> {
    let (low, high) = spec.band();
    let mut scorer = PairScorer::new(spec, config.min_tone_balance);
    let mut pairs = Vec::new();

    for &shift in &config.shifts {
        let mut f1 = low + shift;
        while f1 <= high {
            if let Some(pair) = scorer.score(f1, f1 - shift) {
                if pair.anticorrelation < config.anticorrelation_threshold {
                    pairs.push(pair);
                }
            }
            f1 += config.candidate_step_hz;
        }
    }

    let bucket = config.dedup_bucket_hz;
    rank(pairs, config.max_pairs, |p| {
        ((p.mark_hz / bucket).round() as i64, (p.space_hz / bucket).round() as i64)
    })
}

/// Sweep of every shift from 50 to 1000 Hz on a 20 Hz grid
pub fn arbitrary_pairs(spec: &Spectrogram, config: &EstimatorConfig) -> Vec<TonePair> {
    let (low, high) = spec.band();
    let mut scorer = PairScorer::new(spec, config.min_tone_balance);
    let mut pairs = Vec::new();

    let mut mark = ARBITRARY_LOWEST_MARK_HZ.max(low + ARBITRARY_MIN_SHIFT_HZ);
    while mark <= high {
        let mut space = low.max(mark - ARBITRARY_MAX_SHIFT_HZ);
        while space <= mark - ARBITRARY_MIN_SHIFT_HZ {
            if let Some(pair) = scorer.score(mark, space) {
                if pair.anticorrelation < config.arbitrary_shift_threshold {
                    pairs.push(pair);
                }
            }
            space += ARBITRARY_STEP_HZ;
        }
        mark += ARBITRARY_STEP_HZ;
    }

    rank(pairs, config.max_pairs, |p| {
        (
            (p.mark_hz / ARBITRARY_BUCKET_HZ).round() as i64,
            (p.shift_hz / ARBITRARY_BUCKET_HZ).round() as i64,
        )
    })
}

/// Standard shifts first; the arbitrary sweep only when none qualifies
pub fn search(spec: &Spectrogram, config: &EstimatorConfig) -> Vec<TonePair> {
    let pairs = standard_pairs(spec, config);
    if !pairs.is_empty() {
        log::debug!(
            "tone pairs: {} at standard shifts, best {:.0}/{:.0} Hz r={:.2}",
            pairs.len(),
            pairs[0].mark_hz,
            pairs[0].space_hz,
            pairs[0].anticorrelation
        );
        return pairs;
    }

    let pairs = arbitrary_pairs(spec, config);
    log::debug!("tone pairs: none at standard shifts, {} from arbitrary sweep", pairs.len());
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_envelope_has_no_active_frames() {
        let a: Vec<f32> = (0..40).map(|i| if i % 2 == 0 { 1.0 } else { 0.1 }).collect();
        let b: Vec<f32> = (0..40).map(|i| if i % 2 == 0 { 0.1 } else { 1.0 }).collect();
        assert_eq!(pair_score(&a, &b, &[0.0; 40], 0.1), None);
    }

    #[test]
    fn keyed_tones_after_silence_are_anticorrelated() {
        let mut a = vec![0.01f32; 40];
        let mut b = vec![0.01f32; 40];
        for i in 0..30 {
            let mark = (i * 7) % 3 != 0;
            a.push(if mark { 1.0 } else { 0.1 });
            b.push(if mark { 0.1 } else { 1.0 });
        }
        let (r, energy) = pair_score(&a, &b, &[0.005; 70], 0.1).unwrap();
        assert!(r < -0.99, "r = {r}");
        assert!((energy - 1.1).abs() < 1e-6);
    }

    #[test]
    fn unbalanced_pair_is_rejected() {
        let a: Vec<f32> = (0..60).map(|i| 1.0 + (i % 7) as f32).collect();
        let b: Vec<f32> = (0..60).map(|i| 0.01 * (i % 3) as f32).collect();
        assert_eq!(pair_score(&a, &b, &[0.0; 60], 0.1), None);
    }

    #[test]
    fn bins_at_the_noise_floor_are_inactive() {
        // Alternating levels, but never more than twice the floor
        let a: Vec<f32> = (0..60).map(|i| 1.0 + (i % 2) as f32).collect();
        let b: Vec<f32> = (0..60).map(|i| 2.0 - (i % 2) as f32 * 0.5).collect();
        assert_eq!(pair_score(&a, &b, &[1.0; 60], 0.1), None);
    }

    #[test]
    fn rare_transients_are_not_a_pair() {
        // 12 clicks, each favouring one bin or the other
        let clicks = |frames: usize, spacing: usize| {
            let mut a = vec![1.0f32; frames];
            let mut b = vec![1.0f32; frames];
            for k in 0..12 {
                let i = 5 + k * spacing;
                (a[i], b[i]) = if k % 2 == 0 { (25.0, 5.0) } else { (5.0, 25.0) };
            }
            (a, b)
        };

        // 3% of a long recording
        let (a, b) = clicks(400, 33);
        assert_eq!(pair_score(&a, &b, &[1.0; 400], 0.1), None);

        // 6% of a short one
        let (a, b) = clicks(200, 16);
        let (r, _) = pair_score(&a, &b, &[1.0; 200], 0.1).expect("score");
        assert!((-1.0..-0.99).contains(&r), "r = {r}");
    }

    #[test]
    fn splatter_without_a_dominant_tone_is_rejected() {
        // Both bins rise together; neither is ever twice the other
        let level = |i: usize, first: f32, second: f32| match i % 5 {
            0 => first,
            2 => second,
            _ => 1.0,
        };
        let a: Vec<f32> = (0..60).map(|i| level(i, 8.0, 6.0)).collect();
        let b: Vec<f32> = (0..60).map(|i| level(i, 6.0, 8.0)).collect();
        assert_eq!(pair_score(&a, &b, &[1.0; 60], 0.1), None);
    }

    #[test]
    fn rank_orders_and_dedups() {
        let pair = |mark_hz: f64, r: f64| TonePair {
            mark_hz,
            space_hz: mark_hz - 170.0,
            shift_hz: 170.0,
            anticorrelation: r,
            energy: 1.0,
        };
        let ranked = rank(
            vec![pair(1000.0, -0.4), pair(2000.0, -0.9), pair(2005.0, -0.8)],
            15,
            |p| (p.mark_hz / 20.0).round() as i64,
        );
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].mark_hz, 2000.0);
        assert_eq!(ranked[1].mark_hz, 1000.0);
    }
}
