//! Decode-scored fine tuning
//!
//! A spectral estimate can be a few percent off in baud rate, enough to
//! garble every character of a fixed-timing decode. Fine tuning decodes the
//! recording over a grid around the given parameters and keeps whichever
//! text scores best under `score_text`:
//!
//! 1. baud rate within ±20% in 0.5 baud steps
//! 2. baud rate within ±2 of that winner in 0.1 baud steps
//! 3. mark frequency within ±40 Hz in 5 Hz steps, shift held constant
//!
//! Neighbouring grid points usually decode identically, so each stage takes
//! the middle of the longest run of top scores rather than its first point.

use crate::domain::{AudioBuffer, DecodeResult, DecoderConfig, FskParameters, RttyResult};
use crate::modem::decoder::decode;

use super::polarity::score_text;

const COARSE_BAUD_SPAN: f64 = 0.2;
const COARSE_BAUD_STEP: f64 = 0.5;
const FINE_BAUD_SPAN: f64 = 2.0;
const FINE_BAUD_STEP: f64 = 0.1;
const MARK_SPAN_HZ: f64 = 40.0;
const MARK_STEP_HZ: f64 = 5.0;

/// Outcome of `fine_tune`
#[derive(Debug, Clone, PartialEq)]
pub struct FineTune {
    pub params: FskParameters,
    pub result: DecodeResult,
    pub score: i64,
}

/// `centre ± span` in `step` increments, ascending
fn grid(centre: f64, span: f64, step: f64) -> Vec<f64> {
    let n = (span / step).floor() as i64;
    (-n..=n).map(|k| centre + k as f64 * step).collect()
}

/// Decode at every grid value and return the middle of the longest run of
/// best-scoring values. Values the decoder rejects break runs.
fn sweep<F>(audio: &AudioBuffer, config: &DecoderConfig, values: &[f64], make: F) -> Option<FineTune>
where
    F: Fn(f64) -> FskParameters,
{
    let trials: Vec<Option<FineTune>> = values
        .iter()
        .map(|&v| {
            let params = make(v);
            let result = decode(audio, &params, config).ok()?;
            let score = score_text(&result.text);
            Some(FineTune { params, result, score })
        })
        .collect();

    let best = trials.iter().flatten().map(|t| t.score).max()?;

    let mut longest = (0, 0);
    let mut run_start = None;
    for (i, trial) in trials.iter().enumerate() {
        let top = trial.as_ref().is_some_and(|t| t.score == best);
        match (top, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                if i - start > longest.1 {
                    longest = (start, i - start);
                }
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        if trials.len() - start > longest.1 {
            longest = (start, trials.len() - start);
        }
    }

    let middle = longest.0 + (longest.1 - 1) / 2;
    trials.into_iter().nth(middle).flatten()
}

/// Search baud rate and mark frequency around `params` for the decode that
/// reads best.
///
/// Returns `params` and its own decode unless some grid point scores
/// strictly higher. Polarity is left as given; see `resolve_polarity`.
pub fn fine_tune(
    audio: &AudioBuffer,
    params: FskParameters,
    config: &DecoderConfig,
) -> RttyResult<FineTune> {
    let result = decode(audio, &params, config)?;
    let baseline = FineTune {
        score: score_text(&result.text),
        params,
        result,
    };

    let coarse = grid(
        params.baud_rate,
        params.baud_rate * COARSE_BAUD_SPAN,
        COARSE_BAUD_STEP,
    );
    let Some(coarse) = sweep(audio, config, &coarse, |baud_rate| FskParameters {
        baud_rate,
        ..params
    }) else {
        return Ok(baseline);
    };
    log::debug!("fine tune: coarse baud {:.1} scores {}", coarse.params.baud_rate, coarse.score);

    let fine = grid(coarse.params.baud_rate, FINE_BAUD_SPAN, FINE_BAUD_STEP);
    let tuned = coarse.params;
    let fine = sweep(audio, config, &fine, |baud_rate| FskParameters { baud_rate, ..tuned })
        .unwrap_or(coarse);
    log::debug!("fine tune: fine baud {:.2} scores {}", fine.params.baud_rate, fine.score);

    let shift = params.mark_hz - params.space_hz;
    let marks = grid(params.mark_hz, MARK_SPAN_HZ, MARK_STEP_HZ);
    let tuned = fine.params;
    let best = sweep(audio, config, &marks, |mark_hz| FskParameters {
        mark_hz,
        space_hz: mark_hz - shift,
        ..tuned
    })
    .unwrap_or(fine);

    if best.score > baseline.score {
        log::info!(
            "fine tune: mark {:.1} Hz, space {:.1} Hz, {:.2} baud scores {} (was {})",
            best.params.mark_hz,
            best.params.space_hz,
            best.params.baud_rate,
            best.score,
            baseline.score
        );
        Ok(best)
    } else {
        log::debug!("fine tune: no improvement on score {}", baseline.score);
        Ok(baseline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_is_symmetric() {
        let g = grid(45.0, 1.0, 0.5);
        assert_eq!(g, vec![44.0, 44.5, 45.0, 45.5, 46.0]);
    }

    #[test]
    fn silence_keeps_given_parameters() {
        let audio = AudioBuffer::new(vec![0.0; 8000], 8000).unwrap();
        let params = FskParameters::new(1187.5, 1018.5, 45.45).unwrap();
        let tuned = fine_tune(&audio, params, &DecoderConfig::default()).unwrap();
        assert_eq!(tuned.params, params);
        assert_eq!(tuned.score, 0);
        assert!(tuned.result.text.is_empty());
    }
}
