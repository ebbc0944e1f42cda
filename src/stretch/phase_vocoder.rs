//! Phase-vocoder time stretching with transient phase reset and
//! energy-normalized weighted overlap-add.

use std::f32::consts::PI;

use rustfft::num_complex::Complex32;

use crate::dsp::{hanning_window, Radix2Fft};
use crate::error::DspResult;

pub const WINDOW_SIZE: usize = 4096;
pub const ANALYSIS_HOP: usize = WINDOW_SIZE / 4;
pub const MIN_FACTOR: f32 = 0.25;
pub const MAX_FACTOR: f32 = 4.0;
/// Frame rate the historical engine assumed for every input.
pub const HISTORICAL_FRAME_RATE: u32 = 44_100;

const IDENTITY_TOLERANCE: f32 = 0.001;
const TRANSIENT_RATIO: f32 = 3.0;
const TRANSIENT_MIN_MAGNITUDE: f32 = 0.01;
const MIN_OVERLAP_ENERGY: f32 = 0.01;
const MAX_GAIN_CORRECTION: f32 = 3.0;
const OUTPUT_CLIP: f32 = 0.95;

/// Returns true when `factor` would be processed rather than passed through.
pub fn is_active_factor(factor: f32) -> bool {
    factor.is_finite()
        && factor > 0.0
        && (factor - 1.0).abs() >= IDENTITY_TOLERANCE
        && (MIN_FACTOR..=MAX_FACTOR).contains(&factor)
}

/// Stretches `input` to roughly `input.len() * factor` samples without
/// changing pitch.
///
/// Empty input and factors that are trivial or outside `[0.25, 4.0]` return a
/// copy of the input. `sample_rate` sets the frame delta of the phase
/// advance; pass [`HISTORICAL_FRAME_RATE`] to reproduce the historical output.
pub fn time_stretch(input: &[f32], factor: f32, sample_rate: u32) -> Vec<f32> {
    if input.is_empty() || !is_active_factor(factor) {
        log::debug!("Stretch skipped (factor {factor}, {} samples)", input.len());
        return input.to_vec();
    }

    match PhaseVocoder::new(factor, sample_rate).and_then(|pv| pv.process(input)) {
        Ok(output) => output,
        Err(err) => {
            // Window and transform sizes are fixed powers of two.
            log::warn!("Stretch failed, returning input unchanged: {err}");
            input.to_vec()
        }
    }
}

struct PhaseVocoder {
    factor: f32,
    synthesis_hop: usize,
    frame_delta: f32,
    fft: Radix2Fft,
    analysis_window: Vec<f32>,
    synthesis_window: Vec<f32>,
}

/// Per-bin state carried from one frame to the next. Lives for one call.
struct BinTracker {
    phase: Vec<f32>,
    magnitude: Vec<f32>,
}

impl PhaseVocoder {
    fn new(factor: f32, sample_rate: u32) -> DspResult<Self> {
        let synthesis_hop = (ANALYSIS_HOP as f32 * factor).round() as usize;
        let frame_delta = ANALYSIS_HOP as f32 / sample_rate.max(1) as f32;

        let mut analysis_window = hanning_window(WINDOW_SIZE)?;
        let energy: f32 = analysis_window
            .iter()
            .step_by(ANALYSIS_HOP)
            .map(|w| w * w)
            .sum();
        if energy > 0.0 {
            let norm = 1.0 / energy.sqrt();
            for w in analysis_window.iter_mut() {
                *w *= norm;
            }
        }

        Ok(Self {
            factor,
            synthesis_hop,
            frame_delta,
            fft: Radix2Fft::new(WINDOW_SIZE)?,
            analysis_window,
            synthesis_window: hanning_window(WINDOW_SIZE)?,
        })
    }

    fn process(&self, input: &[f32]) -> DspResult<Vec<f32>> {
        let n = WINDOW_SIZE;
        let bins = n / 2 + 1;
        let target_len = (input.len() as f64 * f64::from(self.factor)) as usize;
        let output_len = target_len + n;

        let mut padded = vec![0.0f32; input.len() + 2 * n];
        padded[n..n + input.len()].copy_from_slice(input);

        let mut output = vec![0.0f32; output_len];
        let mut energy = vec![0.0f32; output_len];
        let mut tracker = BinTracker {
            phase: vec![0.0; bins],
            magnitude: vec![0.0; bins],
        };
        let mut frame = vec![Complex32::new(0.0, 0.0); n];

        log::debug!(
            "Phase vocoder: factor {:.3}, hops {} -> {}, {} samples",
            self.factor,
            ANALYSIS_HOP,
            self.synthesis_hop,
            input.len()
        );

        let mut analysis_pos = 0;
        let mut synthesis_pos = 0;
        while analysis_pos + n <= padded.len() {
            for (i, slot) in frame.iter_mut().enumerate() {
                *slot = Complex32::new(padded[analysis_pos + i] * self.analysis_window[i], 0.0);
            }
            self.fft.forward(&mut frame)?;

            self.advance_phases(&mut frame, &mut tracker);
            self.fft.inverse(&mut frame)?;

            if synthesis_pos + n <= output_len {
                for i in 0..n {
                    let w = self.synthesis_window[i];
                    output[synthesis_pos + i] += frame[i].re * w;
                    energy[synthesis_pos + i] += w * w;
                }
            }

            analysis_pos += ANALYSIS_HOP;
            synthesis_pos += self.synthesis_hop;
        }

        for (s, &e) in output.iter_mut().zip(&energy) {
            if e > MIN_OVERLAP_ENERGY {
                *s /= e.sqrt();
            }
        }

        output.truncate(target_len);
        match_level(input, &mut output);
        for s in output.iter_mut() {
            *s = s.clamp(-OUTPUT_CLIP, OUTPUT_CLIP);
        }

        Ok(output)
    }

    /// Replaces `spectrum` with the phase-advanced, conjugate-symmetric
    /// spectrum for this frame and updates the tracker.
    fn advance_phases(&self, spectrum: &mut [Complex32], tracker: &mut BinTracker) {
        let n = spectrum.len();
        let half = n / 2;
        let omega = 2.0 * PI / n as f32;

        let transient = (1..half).any(|i| {
            let prev = tracker.magnitude[i];
            prev > 0.0 && spectrum[i].norm() / prev > TRANSIENT_RATIO
        });

        for i in 0..=half {
            let magnitude = spectrum[i].norm();
            let phase = if i == 0 || i == half {
                0.0
            } else {
                let current = spectrum[i].arg();
                if transient && magnitude > TRANSIENT_MIN_MAGNITUDE {
                    current
                } else {
                    let expected = omega * i as f32 * self.frame_delta;
                    let diff = wrap_phase(current - tracker.phase[i]);
                    let inst_freq = expected + diff / self.frame_delta;
                    tracker.phase[i] + inst_freq * self.frame_delta * self.factor
                }
            };

            spectrum[i] = Complex32::from_polar(magnitude, phase);
            tracker.phase[i] = phase;
            tracker.magnitude[i] = magnitude;
        }

        for i in 1..half {
            spectrum[n - i] = spectrum[i].conj();
        }
    }
}

/// Wraps a phase difference into `[-π, π]`.
fn wrap_phase(diff: f32) -> f32 {
    diff - 2.0 * PI * (diff / (2.0 * PI)).round()
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Scales `output` towards the RMS level of `input`, boosting at most 3x.
fn match_level(input: &[f32], output: &mut [f32]) {
    let input_rms = rms(input);
    let output_rms = rms(output);
    if input_rms > 0.0 && output_rms > 0.0 {
        let gain = (input_rms / output_rms).min(MAX_GAIN_CORRECTION);
        for s in output.iter_mut() {
            *s *= gain;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sr: u32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / sr as f32).sin())
            .collect()
    }

    #[test]
    fn guarded_factors_pass_through() {
        let input = sine(440.0, 44100, 8192);
        for &f in &[1.0, 1.0005, 0.0, -1.0, 0.2, 4.5, f32::NAN, f32::INFINITY] {
            assert_eq!(time_stretch(&input, f, 44100), input, "factor {f}");
        }
        assert!(time_stretch(&[], 1.5, 44100).is_empty());
    }

    #[test]
    fn active_factor_bounds() {
        assert!(is_active_factor(0.25));
        assert!(is_active_factor(4.0));
        assert!(is_active_factor(0.998));
        assert!(!is_active_factor(0.9995));
        assert!(!is_active_factor(4.01));
    }

    #[test]
    fn output_length_is_scaled_input_length() {
        let input = sine(330.0, 44100, 20_000);
        for &f in &[0.25f32, 0.5, 0.8, 1.25, 2.0, 4.0] {
            let out = time_stretch(&input, f, 44100);
            assert_eq!(out.len(), (input.len() as f64 * f64::from(f)).floor() as usize, "factor {f}");
        }
    }

    #[test]
    fn output_is_clipped() {
        let input: Vec<f32> = sine(200.0, 44100, 30_000).iter().map(|s| s * 2.0).collect();
        let out = time_stretch(&input, 1.5, 44100);
        assert!(out.iter().all(|s| s.abs() <= OUTPUT_CLIP));
    }

    #[test]
    fn silence_stays_silent() {
        let out = time_stretch(&vec![0.0; 10_000], 2.0, 44100);
        assert_eq!(out.len(), 20_000);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn wrap_phase_stays_in_range() {
        for k in -20..=20 {
            let x = k as f32 * 0.77;
            let w = wrap_phase(x);
            assert!(w >= -PI - 1e-5 && w <= PI + 1e-5);
            assert!(((x - w) / (2.0 * PI) - ((x - w) / (2.0 * PI)).round()).abs() < 1e-4);
        }
    }

    #[test]
    fn analysis_window_has_unit_hop_energy() {
        let pv = PhaseVocoder::new(1.5, 44100).unwrap();
        let energy: f32 = pv
            .analysis_window
            .iter()
            .step_by(ANALYSIS_HOP)
            .map(|w| w * w)
            .sum();
        assert!((energy - 1.0).abs() < 1e-5);
        assert_eq!(pv.synthesis_hop, 1536);
    }

    #[test]
    fn transient_keeps_phase_of_audible_bins() {
        let pv = PhaseVocoder::new(1.5, 44100).unwrap();
        let bins = WINDOW_SIZE / 2 + 1;
        let mut tracker = BinTracker {
            phase: vec![0.0; bins],
            magnitude: vec![0.001; bins],
        };
        let mut spectrum = vec![Complex32::new(0.0, 0.0); WINDOW_SIZE];
        spectrum[10] = Complex32::from_polar(1.0, 0.7);
        spectrum[20] = Complex32::from_polar(0.005, 1.2);

        pv.advance_phases(&mut spectrum, &mut tracker);

        // Bin 10 jumped 1000x: the frame is a transient and loud bins keep
        // their measured phase.
        assert!((tracker.phase[10] - 0.7).abs() < 1e-5);
        assert!((spectrum[10].arg() - 0.7).abs() < 1e-5);

        // Bin 20 is below the magnitude gate and is propagated as usual.
        let omega = 2.0 * PI / WINDOW_SIZE as f32;
        let expected = omega * 20.0 * pv.frame_delta;
        let propagated = (expected + wrap_phase(1.2) / pv.frame_delta) * pv.frame_delta * 1.5;
        assert!((tracker.phase[20] - propagated).abs() < 1e-4);
        assert!((tracker.phase[20] - 1.2).abs() > 0.1);
        assert!((tracker.magnitude[20] - 0.005).abs() < 1e-6);
    }

    #[test]
    fn steady_frame_propagates_every_bin() {
        let pv = PhaseVocoder::new(2.0, 44100).unwrap();
        let bins = WINDOW_SIZE / 2 + 1;
        let mut tracker = BinTracker {
            phase: vec![0.3; bins],
            magnitude: vec![0.0; bins],
        };
        tracker.magnitude[10] = 0.9;
        let mut spectrum = vec![Complex32::new(0.0, 0.0); WINDOW_SIZE];
        spectrum[10] = Complex32::from_polar(1.0, 0.7);

        pv.advance_phases(&mut spectrum, &mut tracker);

        let omega = 2.0 * PI / WINDOW_SIZE as f32;
        let expected = omega * 10.0 * pv.frame_delta;
        let propagated =
            0.3 + (expected + wrap_phase(0.7 - 0.3) / pv.frame_delta) * pv.frame_delta * 2.0;
        assert!((tracker.phase[10] - propagated).abs() < 1e-4);
        assert_eq!(spectrum[WINDOW_SIZE - 10], spectrum[10].conj());
        assert_eq!(tracker.phase[0], 0.0);
    }

    #[test]
    fn level_match_caps_boost() {
        let input = vec![0.5f32; 100];
        let mut quiet = vec![0.05f32; 100];
        match_level(&input, &mut quiet);
        assert!(quiet.iter().all(|&s| (s - 0.15).abs() < 1e-6));

        let mut half = vec![0.25f32; 100];
        match_level(&input, &mut half);
        assert!(half.iter().all(|&s| (s - 0.5).abs() < 1e-6));

        let mut silent = vec![0.0f32; 100];
        match_level(&input, &mut silent);
        assert!(silent.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn synthesis_hop_is_rounded() {
        // 1024 * 0.7 = 716.8
        assert_eq!(PhaseVocoder::new(0.7, 44100).unwrap().synthesis_hop, 717);
    }

    #[test]
    fn frame_delta_follows_sample_rate() {
        let input = sine(440.0, 22050, 30_000);
        let true_rate = time_stretch(&input, 1.5, 22050);
        let historical = time_stretch(&input, 1.5, HISTORICAL_FRAME_RATE);
        assert_eq!(true_rate.len(), historical.len());
        // Known discrepancy: the historical engine always assumed 44.1 kHz.
        assert!(true_rate.iter().zip(&historical).any(|(a, b)| (a - b).abs() > 1e-6));
    }
}
