//! Polarity choice by text plausibility
//!
//! The tone correlation cannot tell which tone is mark; a decode can. Both
//! polarities are decoded and the text that reads more like an amateur radio
//! exchange wins.

use crate::domain::{AudioBuffer, DecodeResult, DecoderConfig, FskParameters, RttyResult};
use crate::modem::decoder::decode;

const HAM_WORDS: [&str; 25] = [
    "CQ", "DE", "RST", "UR", "QTH", "QSL", "QRZ", "BK", "KN", "SK", "NAME", "OP", "RIG", "ANT",
    "WX", "HR", "HW", "CPY", "PSE", "AGN", "FB", "ES", "TNX", "TU", "BTU",
];

/// Characters that make up a run of figures-shift noise
fn is_figure(c: char) -> bool {
    c.is_ascii_digit() || "!@#$%^&*()-+=:;,.<>?/".contains(c)
}

/// End of a callsign-like token (`[A-Z0-9]{1,2}[0-9][A-Z]{1,3}`) starting at `i`
fn callsign_at(chars: &[char], i: usize) -> Option<usize> {
    let prefix_ok = |c: &char| c.is_ascii_uppercase() || c.is_ascii_digit();
    for prefix in [2, 1] {
        let digit = i + prefix;
        if digit >= chars.len() || !chars[i..digit].iter().all(prefix_ok) {
            continue;
        }
        if !chars[digit].is_ascii_digit() {
            continue;
        }
        let suffix = chars[digit + 1..]
            .iter()
            .take(3)
            .take_while(|c| c.is_ascii_uppercase())
            .count();
        if suffix > 0 {
            return Some(digit + 1 + suffix);
        }
    }
    None
}

fn count_callsigns(chars: &[char]) -> usize {
    let mut count = 0;
    let mut i = 0;
    while i < chars.len() {
        match callsign_at(chars, i) {
            Some(end) => {
                count += 1;
                i = end;
            }
            None => i += 1,
        }
    }
    count
}

/// Maximal runs of chars satisfying `pred` with at least `min_len` members
fn count_runs(chars: &[char], min_len: usize, pred: impl Fn(char) -> bool) -> usize {
    chars
        .split(|&c| !pred(c))
        .filter(|run| run.len() >= min_len)
        .count()
}

/// Plausibility of decoded text as an amateur radio exchange. Higher is
/// better; text shorter than five characters scores zero.
pub fn score_text(text: &str) -> i64 {
    let len = text.chars().count();
    if len < 5 {
        return 0;
    }
    let upper: Vec<char> = text.to_uppercase().chars().collect();
    let upper_str: String = upper.iter().collect();
    let original: Vec<char> = text.chars().collect();

    let mut score = count_callsigns(&upper) as i64 * 20;
    score += HAM_WORDS.iter().filter(|w| upper_str.contains(*w)).count() as i64 * 10;
    score += count_runs(&upper, 2, |c| c.is_ascii_uppercase()) as i64;
    score -= count_runs(&original, 5, is_figure) as i64 * 5;

    let letters = original.iter().filter(|c| c.is_alphabetic()).count();
    score += (letters as f64 / len as f64 * 20.0) as i64;
    score
}

/// Decode with both polarities and keep the more plausible text.
///
/// Returns the winning parameters (polarity flag set accordingly) and their
/// decode. Ties keep `params` as given.
pub fn resolve_polarity(
    audio: &AudioBuffer,
    params: FskParameters,
    config: &DecoderConfig,
) -> RttyResult<(FskParameters, DecodeResult)> {
    let flipped = params.with_polarity(!params.invert_polarity);
    let as_given = decode(audio, &params, config)?;
    let other = decode(audio, &flipped, config)?;

    let (given_score, other_score) = (score_text(&as_given.text), score_text(&other.text));
    log::debug!(
        "polarity: invert={} scores {given_score}, invert={} scores {other_score}",
        params.invert_polarity,
        flipped.invert_polarity
    );

    if other_score > given_score {
        Ok((flipped, other))
    } else {
        Ok((params, as_given))
    }
}
