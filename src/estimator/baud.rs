//! Baud-rate fit
//!
//! Transitions of a finely hopped correlation stream are located, and the
//! run lengths between them compared against integer multiples of each
//! candidate bit period. Mark and space runs are fitted separately: stop
//! bits of 1.5 periods make mark runs non-integer, while space runs (start
//! bit plus any following zeros) always are. The better of the two fits
//! scores the candidate.
//!
//! Every candidate is scored on the same runs. Runs shorter than half the
//! fastest candidate's period are glitches and dropped up front; any other
//! run shorter than a candidate's period counts as one period for it, so a
//! rate that is a sub-multiple of the true one pays for the bits it cannot
//! resolve.

use serde::{Deserialize, Serialize};

use crate::domain::{AudioBuffer, FskParameters, RttyError, RttyResult};
use crate::dsp::correlator::{correlate, default_block_size};

/// Hop of the timing stream, in seconds
const TIMING_HOP_SECONDS: f64 = 0.0005;

/// Run lengths considered, in bit periods
const MIN_RUN_BITS: f64 = 1.0;
const MAX_RUN_BITS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaudFit {
    pub baud_rate: f64,
    /// Bit period at `baud_rate`, in samples
    pub period: f64,
    /// RMS distance of run lengths from whole periods, in samples
    pub rms_error: f64,
    pub transitions: usize,
}

/// Bounded runs between consecutive transitions: (length in samples, is mark)
pub fn runs(audio: &AudioBuffer, tones: &FskParameters) -> Vec<(f64, bool)> {
    let sr = audio.sample_rate();
    let block = default_block_size(tones, sr);
    let hop = ((sr as f64 * TIMING_HOP_SECONDS).round() as usize).max(1);
    let stream = correlate(audio.samples(), sr, tones, block, hop);

    let mut transitions: Vec<(f64, bool)> = Vec::new();
    for pair in stream.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if (a.value > 0.0) != (b.value > 0.0) {
            let span = a.value - b.value;
            let frac = if span.abs() > f32::EPSILON { a.value / span } else { 0.5 };
            let index = a.index as f64 + frac.clamp(0.0, 1.0) as f64;
            transitions.push((index * hop as f64, b.value > 0.0));
        }
    }

    transitions
        .windows(2)
        .map(|w| (w[1].0 - w[0].0, w[0].1))
        .collect()
}

/// RMS quantization error of `lengths` against multiples of `period`.
/// Lengths under one period count as one; those over ten are skipped.
fn quantization_rms<'a>(lengths: impl Iterator<Item = &'a f64>, period: f64) -> Option<f64> {
    let errors: Vec<f64> = lengths
        .filter_map(|&len| {
            let n = (len / period).round().max(MIN_RUN_BITS);
            (n <= MAX_RUN_BITS).then(|| len - n * period)
        })
        .collect();
    if errors.is_empty() {
        return None;
    }
    Some((errors.iter().map(|e| e * e).sum::<f64>() / errors.len() as f64).sqrt())
}

/// Pick the candidate whose period best explains the run lengths
pub fn fit_baud(audio: &AudioBuffer, tones: &FskParameters, candidates: &[f64]) -> RttyResult<BaudFit> {
    let runs = runs(audio, tones);
    if runs.is_empty() {
        return Err(RttyError::ParameterUndetermined(
            "fewer than two transitions for baud fitting".into(),
        ));
    }

    let sr = audio.sample_rate() as f64;
    let fastest = candidates.iter().copied().fold(0.0f64, f64::max);
    let shortest = if fastest > 0.0 { 0.5 * sr / fastest } else { 0.0 };
    let marks: Vec<f64> = runs.iter().filter(|r| r.1 && r.0 >= shortest).map(|r| r.0).collect();
    let spaces: Vec<f64> = runs.iter().filter(|r| !r.1 && r.0 >= shortest).map(|r| r.0).collect();

    let best = candidates
        .iter()
        .filter_map(|&baud| {
            let period = sr / baud;
            let rms = match (quantization_rms(marks.iter(), period), quantization_rms(spaces.iter(), period)) {
                (Some(m), Some(s)) => m.min(s),
                (Some(m), None) => m,
                (None, Some(s)) => s,
                (None, None) => return None,
            };
            log::trace!("baud {baud}: rms {rms:.2} samples");
            Some(BaudFit {
                baud_rate: baud,
                period,
                rms_error: rms,
                transitions: runs.len() + 1,
            })
        })
        .min_by(|a, b| a.rms_error.total_cmp(&b.rms_error))
        .ok_or_else(|| {
            RttyError::ParameterUndetermined("no run lengths within 1..10 bit periods".into())
        })?;

    log::debug!(
        "baud fit: {} baud, rms {:.2} of {:.1} samples, {} transitions",
        best.baud_rate,
        best.rms_error,
        best.period,
        best.transitions
    );
    Ok(best)
}
