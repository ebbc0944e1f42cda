mod common;

use beatshift::stretch::HISTORICAL_FRAME_RATE;
use beatshift::time_stretch;
use common::*;

#[test]
fn unit_factor_returns_input() {
    let input = noise(10_000, 3);
    assert_eq!(time_stretch(&input, 1.0, 22050), input);
}

#[test]
fn out_of_range_factors_return_input() {
    let input = sine(440.0, 22050, 10_000, 0.5);
    for factor in [0.1f32, 0.2499, 4.001, 8.0] {
        assert_eq!(time_stretch(&input, factor, 22050), input, "factor {factor}");
    }
}

#[test]
fn output_length_tracks_factor() {
    let input = sine(440.0, 22050, 22_050, 0.5);
    for factor in [0.25f32, 0.75, 1.1, 1.5, 3.0, 4.0] {
        let out = time_stretch(&input, factor, 22050);
        assert_eq!(out.len(), (input.len() as f64 * f64::from(factor)).floor() as usize);
        assert!(out.iter().all(|s| s.is_finite() && s.abs() <= 0.95));
    }
}

#[test]
fn stretched_tone_keeps_its_level() {
    let input = sine(440.0, 44100, 44_100, 0.5);
    let out = time_stretch(&input, 1.5, 44100);
    let rms = |x: &[f32]| (x.iter().map(|s| s * s).sum::<f32>() / x.len() as f32).sqrt();
    let ratio = rms(&out) / rms(&input);
    assert!((0.5..=1.05).contains(&ratio), "rms ratio {ratio}");
}

#[test]
fn historical_frame_rate_changes_output_only() {
    let input = sine(300.0, 22050, 40_000, 0.5);
    let true_rate = time_stretch(&input, 0.8, 22050);
    let legacy = time_stretch(&input, 0.8, HISTORICAL_FRAME_RATE);
    assert_eq!(true_rate.len(), legacy.len());
    assert_ne!(true_rate, legacy);
}
