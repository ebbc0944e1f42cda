use std::f32::consts::PI;

use crate::error::{DspError, DspResult};

/// Symmetric Hann window, `0.5 * (1 - cos(2πi / (size - 1)))`.
pub fn hanning_window(size: usize) -> DspResult<Vec<f32>> {
    if size <= 1 {
        return Err(DspError::WindowTooShort { size });
    }
    let norm = 2.0 * PI / (size - 1) as f32;
    Ok((0..size)
        .map(|i| 0.5 * (1.0 - (i as f32 * norm).cos()))
        .collect())
}

/// Multiplies `buffer` in place by a Hann window of its own length.
pub fn apply_hann_window(buffer: &mut [f32]) -> DspResult<()> {
    match buffer.len() {
        0 => Ok(()),
        1 => Err(DspError::WindowTooShort { size: 1 }),
        n => {
            let norm = 2.0 * PI / (n - 1) as f32;
            for (i, s) in buffer.iter_mut().enumerate() {
                *s *= 0.5 * (1.0 - (i as f32 * norm).cos());
            }
            Ok(())
        }
    }
}
