//! Integration tests: blind parameter estimation on synthetic FSK

mod common;

use common::{init_logging, FskSignal, BAUD, MARK_HZ, SAMPLE_RATE, SPACE_HZ};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rttydecode::estimator::{fine_tune, resolve_polarity, score_text};
use rttydecode::{
    decode, resolve_parameters, AudioBuffer, ClockStrategy, DecoderConfig, EstimatorConfig,
    FskParameters, ParameterEstimator, RttyError, PASS_CONFIDENCE,
};

const QSO: &str = "CQ CQ CQ DE W1AW W1AW W1AW PSE K\r\nRYRYRY 599 599 TNX ES 73";

fn estimator() -> ParameterEstimator {
    ParameterEstimator::new(EstimatorConfig::default())
}

#[test]
fn test_recovers_standard_parameters() {
    init_logging();
    let audio = FskSignal::standard().with_noise(0.1).render(QSO);
    let estimate = estimator().estimate(&audio).expect("estimate");

    let p = estimate.params;
    assert!((p.mark_hz - MARK_HZ).abs() <= 2.0, "mark {}", p.mark_hz);
    assert!((p.space_hz - SPACE_HZ).abs() <= 2.0, "space {}", p.space_hz);
    assert!((p.baud_rate - BAUD).abs() <= 0.5, "baud {}", p.baud_rate);
    assert!(!p.invert_polarity);
    assert!(estimate.confidence >= PASS_CONFIDENCE, "confidence {}", estimate.confidence);
    assert!(estimate.passes());
}

#[test]
fn test_recovers_wide_shift_and_faster_baud() {
    let audio = FskSignal::new(2125.0, 1275.0, 75.0).with_noise(0.1).render(QSO);
    let estimate = estimator().estimate(&audio).expect("estimate");

    let p = estimate.params;
    assert!((p.mark_hz - 2125.0).abs() <= 2.0, "mark {}", p.mark_hz);
    assert!((p.space_hz - 1275.0).abs() <= 2.0, "space {}", p.space_hz);
    assert_eq!(p.baud_rate, 75.0);
}

#[test]
fn test_candidate_pairs_are_ranked() {
    let audio = FskSignal::standard().with_noise(0.1).render(QSO);
    let pairs = estimator().candidate_pairs(&audio).expect("pairs");

    assert!(!pairs.is_empty());
    assert!(pairs.len() <= EstimatorConfig::default().max_pairs);
    for w in pairs.windows(2) {
        assert!(w[0].anticorrelation <= w[1].anticorrelation);
    }
    let best = &pairs[0];
    assert!(best.anticorrelation < -0.3);
    assert!((best.mark_hz - MARK_HZ).abs() < 60.0, "{best:?}");
    assert!((best.space_hz - SPACE_HZ).abs() < 60.0, "{best:?}");
}

#[test]
fn test_silence_is_undetermined() {
    let audio = AudioBuffer::new(vec![0.0; SAMPLE_RATE as usize * 3], SAMPLE_RATE).expect("audio");
    assert!(matches!(
        estimator().estimate(&audio),
        Err(RttyError::ParameterUndetermined(_))
    ));
}

#[test]
fn test_noise_is_undetermined() {
    let mut rng = StdRng::seed_from_u64(42);
    let samples = (0..SAMPLE_RATE * 3).map(|_| rng.gen_range(-0.5f32..0.5)).collect();
    let audio = AudioBuffer::new(samples, SAMPLE_RATE).expect("audio");
    assert!(matches!(
        estimator().estimate(&audio),
        Err(RttyError::ParameterUndetermined(_))
    ));
}

#[test]
fn test_steady_carrier_is_undetermined() {
    // A single unkeyed tone: nothing to anti-correlate with
    let signal = FskSignal::new(MARK_HZ, SPACE_HZ, BAUD).with_noise(0.05);
    let audio = signal.render_codes(&[]);
    let long = AudioBuffer::new(audio.samples().repeat(40), SAMPLE_RATE).expect("audio");
    assert!(matches!(
        estimator().estimate(&long),
        Err(RttyError::ParameterUndetermined(_))
    ));
}

#[test]
fn test_unkeyed_carrier_is_never_decoded_on_a_guess() {
    let signal = FskSignal::new(MARK_HZ, SPACE_HZ, BAUD).with_noise(0.05);
    let audio = signal.render_codes(&[]);
    let long = AudioBuffer::new(audio.samples().repeat(40), SAMPLE_RATE).expect("audio");

    assert!(matches!(
        resolve_parameters(&long, &DecoderConfig::default()),
        Err(RttyError::ParameterUndetermined(_))
    ));
    let pairs = estimator().candidate_pairs(&long).expect("pairs");
    assert!(pairs.iter().all(|p| (-1.0..=1.0).contains(&p.anticorrelation)));
}

#[test]
fn test_fine_tune_finds_off_standard_baud() {
    // 45.9 baud keyed, decoded with fixed timing from a 52 baud guess
    let audio = FskSignal::new(MARK_HZ, SPACE_HZ, 45.9).with_noise(0.05).render(QSO);
    let config = DecoderConfig {
        strategy: ClockStrategy::FixedTiming,
        ..DecoderConfig::default()
    };
    let guess = FskParameters::new(MARK_HZ, SPACE_HZ, 52.0).expect("valid parameters");
    let garbled = decode(&audio, &guess, &config).expect("decode");
    assert_ne!(garbled.text, QSO);

    let tuned = fine_tune(&audio, guess, &config).expect("fine tune");
    assert_eq!(tuned.result.text, QSO);
    assert!((tuned.params.baud_rate - 45.9).abs() < 1.5, "baud {}", tuned.params.baud_rate);
    assert!(tuned.score > score_text(&garbled.text));
    let shift = tuned.params.mark_hz - tuned.params.space_hz;
    assert!((shift - (MARK_HZ - SPACE_HZ)).abs() < 1e-9, "shift {shift}");
}

#[test]
fn test_blind_decode() {
    let audio = FskSignal::standard().with_noise(0.1).render(QSO);
    let params = resolve_parameters(&audio, &DecoderConfig::default()).expect("parameters");
    let result = decode(&audio, &params, &DecoderConfig::default()).expect("decode");
    assert_eq!(result.text, QSO);
}

#[test]
fn test_configured_values_override_estimate() {
    let audio = FskSignal::standard().with_noise(0.1).render(QSO);
    let config = DecoderConfig {
        baud_rate: Some(45.0),
        invert_polarity: true,
        ..DecoderConfig::default()
    };
    let params = resolve_parameters(&audio, &config).expect("parameters");
    assert_eq!(params.baud_rate, 45.0);
    assert!(params.invert_polarity);
    assert!((params.mark_hz - MARK_HZ).abs() <= 2.0);
}

#[test]
fn test_polarity_resolution_picks_readable_text() {
    // Transmitter keys 1 bits on the lower tone
    let audio = FskSignal::new(SPACE_HZ, MARK_HZ, BAUD).with_noise(0.1).render(QSO);
    let estimate = estimator().estimate(&audio).expect("estimate");

    let (params, result) =
        resolve_polarity(&audio, estimate.params, &DecoderConfig::default()).expect("decode");
    assert!(params.invert_polarity);
    assert_eq!(result.text, QSO);
}
