use rustfft::num_complex::Complex32;

use crate::dsp::{hanning_window, Radix2Fft};
use crate::error::{DspError, DspResult};

/// Magnitudes of bins `0..=N/2` of the transform of `samples`.
///
/// The input is transformed as-is (no window); its length must be a nonzero
/// power of two.
pub fn forward_magnitude_spectrum(samples: &[f32]) -> DspResult<Vec<f32>> {
    if samples.is_empty() {
        return Err(DspError::EmptyInput);
    }
    let fft = Radix2Fft::new(samples.len())?;
    let mut buffer: Vec<Complex32> = samples.iter().map(|&s| Complex32::new(s, 0.0)).collect();
    fft.forward(&mut buffer)?;

    Ok(buffer[..=samples.len() / 2].iter().map(|c| c.norm()).collect())
}

/// Hann-windowed magnitude frames over the whole buffer, one per hop.
///
/// Frames are laid out time-major: `frames[t][bin]` with `fft_size/2 + 1`
/// bins each. The tail shorter than one window is dropped.
pub fn magnitude_frames(samples: &[f32], fft_size: usize, hop: usize) -> DspResult<Vec<Vec<f32>>> {
    let window = hanning_window(fft_size)?;
    let fft = Radix2Fft::new(fft_size)?;
    let hop = hop.max(1);

    let mut frames = Vec::new();
    let mut buffer = vec![Complex32::new(0.0, 0.0); fft_size];
    let mut pos = 0;
    while pos + fft_size <= samples.len() {
        for (i, slot) in buffer.iter_mut().enumerate() {
            *slot = Complex32::new(samples[pos + i] * window[i], 0.0);
        }
        fft.forward(&mut buffer)?;
        frames.push(buffer[..=fft_size / 2].iter().map(|c| c.norm()).collect());
        pos += hop;
    }
    Ok(frames)
}

/// Display scaling for [`normalize_spectrogram_for_display`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayScaling {
    pub dynamic_range_db: f32,
    pub gamma: f32,
}

impl Default for DisplayScaling {
    fn default() -> Self {
        Self {
            dynamic_range_db: 60.0,
            gamma: 0.7,
        }
    }
}

/// Maps raw spectrogram magnitudes to display intensities in `[0, 255]`.
///
/// Values are log-scaled, clipped to a window of `dynamic_range_db / 10`
/// decades below the 99th percentile, normalized, gamma-corrected and scaled.
pub fn normalize_spectrogram_for_display(
    data: &[f32],
    width: usize,
    height: usize,
    scaling: DisplayScaling,
) -> DspResult<Vec<f32>> {
    let Some(total) = width.checked_mul(height) else {
        return Err(DspError::ShapeMismatch {
            expected: usize::MAX,
            actual: data.len(),
        });
    };
    if total == 0 {
        return Err(DspError::EmptyInput);
    }
    if data.len() != total {
        return Err(DspError::ShapeMismatch {
            expected: total,
            actual: data.len(),
        });
    }

    let log_data: Vec<f32> = data.iter().map(|&x| (x + 1e-10).log10()).collect();

    let mut sorted = log_data.clone();
    sorted.sort_unstable_by(f32::total_cmp);
    let p1 = sorted[percentile_index(total, 0.01)];
    let p99 = sorted[percentile_index(total, 0.99)];
    log::debug!("Spectrogram percentiles: p1={:.3} p99={:.3}", p1, p99);

    let range_max = p99;
    let range_min = p99 - scaling.dynamic_range_db / 10.0;
    let range = (range_max - range_min).max(1e-6);

    Ok(log_data
        .iter()
        .map(|&v| {
            let normalized = (v.max(range_min).min(range_max) - range_min) / range;
            (normalized.powf(scaling.gamma) * 255.0).clamp(0.0, 255.0)
        })
        .collect())
}

fn percentile_index(total: usize, fraction: f32) -> usize {
    ((total as f32 * fraction) as usize).min(total - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn magnitude_spectrum_finds_tone_bin() {
        let n = 256;
        let samples: Vec<f32> = (0..n)
            .map(|i| (2.0 * PI * 16.0 * i as f32 / n as f32).sin())
            .collect();
        let mags = forward_magnitude_spectrum(&samples).unwrap();
        assert_eq!(mags.len(), n / 2 + 1);
        let peak = mags
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 16);
        assert!((mags[16] - n as f32 / 2.0).abs() < 1e-2);
    }

    #[test]
    fn magnitude_spectrum_rejects_bad_lengths() {
        assert_eq!(forward_magnitude_spectrum(&[]), Err(DspError::EmptyInput));
        assert_eq!(
            forward_magnitude_spectrum(&[0.0; 100]),
            Err(DspError::NotPowerOfTwo { len: 100 })
        );
    }

    #[test]
    fn frames_cover_whole_windows_only() {
        let samples = vec![0.1f32; 5000];
        let frames = magnitude_frames(&samples, 1024, 512).unwrap();
        assert_eq!(frames.len(), (5000 - 1024) / 512 + 1);
        assert!(frames.iter().all(|f| f.len() == 513));
    }

    #[test]
    fn display_values_are_byte_range() {
        let data: Vec<f32> = (0..64 * 32)
            .map(|i| ((i * 7919) % 1000) as f32 * 10.0_f32.powi((i % 9) as i32 - 4))
            .collect();
        let out = normalize_spectrogram_for_display(&data, 64, 32, DisplayScaling::default()).unwrap();
        assert_eq!(out.len(), data.len());
        assert!(out.iter().all(|&v| (0.0..=255.0).contains(&v)));
        assert!(out.iter().any(|&v| v == 255.0));
    }

    #[test]
    fn constant_input_is_handled() {
        let out = normalize_spectrogram_for_display(&[0.0; 16], 4, 4, DisplayScaling::default())
            .unwrap();
        assert!(out.iter().all(|&v| (0.0..=255.0).contains(&v)));
    }

    #[test]
    fn display_rejects_bad_shapes() {
        let scaling = DisplayScaling::default();
        assert_eq!(
            normalize_spectrogram_for_display(&[1.0; 10], 4, 4, scaling),
            Err(DspError::ShapeMismatch { expected: 16, actual: 10 })
        );
        assert_eq!(
            normalize_spectrogram_for_display(&[], 0, 4, scaling),
            Err(DspError::EmptyInput)
        );
        assert_eq!(
            normalize_spectrogram_for_display(&[1.0; 4], usize::MAX, 2, scaling),
            Err(DspError::ShapeMismatch { expected: usize::MAX, actual: 4 })
        );
    }
}
