//! Multi-resolution spectral flux onset detection.

use rayon::prelude::*;
use rustfft::num_complex::Complex32;

use crate::dsp::{hanning_window, Radix2Fft};
use crate::error::DspResult;

/// Analysis window sizes; frame count is derived from the first (smallest).
pub const WINDOW_SIZES: [usize; 2] = [1024, 2048];
pub const HOP_SIZE: usize = 512;
const MEDIAN_SIZE: usize = 11;

// Rhythm-relevant band; bins outside it count half.
const BAND_LOW_HZ: f32 = 100.0;
const BAND_HIGH_HZ: f32 = 8000.0;

/// Number of onset frames produced for `num_samples` input samples.
pub fn frame_count(num_samples: usize) -> usize {
    let smallest = WINDOW_SIZES[0];
    if num_samples < smallest {
        return 0;
    }
    (num_samples - smallest) / HOP_SIZE + 1
}

/// Computes the onset strength envelope of a mono buffer.
///
/// Both window sizes share the frame grid of the smaller one, so frames of the
/// larger window near the end of the input read past it and see zeros. The
/// result is baseline-corrected and never negative.
pub fn detect_onsets(samples: &[f32], sample_rate: u32) -> DspResult<Vec<f32>> {
    let num_frames = frame_count(samples.len());
    if num_frames == 0 {
        log::debug!(
            "Onset detection skipped: {} samples is shorter than one window",
            samples.len()
        );
        return Ok(Vec::new());
    }

    let fluxes = WINDOW_SIZES
        .par_iter()
        .map(|&window_size| spectral_flux(samples, sample_rate, window_size, num_frames))
        .collect::<DspResult<Vec<_>>>()?;

    let mut combined = vec![0.0f32; num_frames];
    for flux in &fluxes {
        let max_flux = flux.iter().copied().fold(0.0f32, f32::max);
        if max_flux > 0.0 {
            for (c, f) in combined.iter_mut().zip(flux) {
                *c += f / max_flux;
            }
        }
    }
    let resolutions = WINDOW_SIZES.len() as f32;
    for c in combined.iter_mut() {
        *c /= resolutions;
    }

    let envelope = remove_baseline(&combined);
    log::debug!("Onset envelope: {} frames at hop {}", envelope.len(), HOP_SIZE);
    Ok(envelope)
}

/// Half-wave rectified, band-weighted spectral flux for one window size.
fn spectral_flux(
    samples: &[f32],
    sample_rate: u32,
    window_size: usize,
    num_frames: usize,
) -> DspResult<Vec<f32>> {
    let fft = Radix2Fft::new(window_size)?;
    let window = hanning_window(window_size)?;
    let half = window_size / 2;

    let weights: Vec<f32> = (0..=half)
        .map(|bin| {
            let freq = bin as f32 * sample_rate as f32 / window_size as f32;
            if freq > BAND_LOW_HZ && freq < BAND_HIGH_HZ {
                1.0
            } else {
                0.5
            }
        })
        .collect();

    let mut buffer = vec![Complex32::new(0.0, 0.0); window_size];
    let mut prev_magnitudes = vec![0.0f32; half + 1];
    let mut flux = Vec::with_capacity(num_frames);

    for frame in 0..num_frames {
        let start = frame * HOP_SIZE;
        for (i, slot) in buffer.iter_mut().enumerate() {
            let s = samples.get(start + i).copied().unwrap_or(0.0);
            *slot = Complex32::new(s * window[i], 0.0);
        }
        fft.forward(&mut buffer)?;

        let mut frame_flux = 0.0f32;
        for bin in 1..=half {
            let mag = buffer[bin].norm();
            let diff = mag - prev_magnitudes[bin];
            if diff > 0.0 {
                frame_flux += diff * weights[bin];
            }
            prev_magnitudes[bin] = mag;
        }
        flux.push(frame_flux);
    }

    Ok(flux)
}

/// Subtracts a centered 11-point running median (zero outside the buffer) and
/// clamps the result at zero.
fn remove_baseline(strength: &[f32]) -> Vec<f32> {
    let n = strength.len();
    let mut window = [0.0f32; MEDIAN_SIZE];

    (0..n)
        .map(|i| {
            for (j, slot) in window.iter_mut().enumerate() {
                let idx = (i + j).checked_sub(MEDIAN_SIZE / 2);
                *slot = idx.and_then(|k| strength.get(k)).copied().unwrap_or(0.0);
            }
            let (_, median, _) = window.select_nth_unstable_by(MEDIAN_SIZE / 2, f32::total_cmp);
            (strength[i] - *median).max(0.0)
        })
        .collect()
}
