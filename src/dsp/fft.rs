//! Radix-2 decimation-in-time FFT.
//!
//! `Radix2Fft` plays the role of a planned transform: the twiddle table for a
//! given length is built once and reused for every frame of that length.

use std::f32::consts::PI;

use rustfft::num_complex::Complex32;

use crate::error::{DspError, DspResult};

#[derive(Clone, Debug)]
pub struct Radix2Fft {
    len: usize,
    twiddles: Vec<Complex32>,
}

impl Radix2Fft {
    /// Plans a transform of `len` points. Lengths 0 and 1 are accepted and
    /// turn every call into a no-op.
    pub fn new(len: usize) -> DspResult<Self> {
        if len > 1 && !len.is_power_of_two() {
            return Err(DspError::NotPowerOfTwo { len });
        }

        let twiddles = (0..len / 2)
            .map(|k| Complex32::from_polar(1.0, -2.0 * PI * k as f32 / len as f32))
            .collect();

        Ok(Self { len, twiddles })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// In-place forward transform.
    pub fn forward(&self, buffer: &mut [Complex32]) -> DspResult<()> {
        self.check_len(buffer)?;
        if self.len <= 1 {
            return Ok(());
        }

        bit_reverse(buffer);

        let n = self.len;
        let mut size = 2;
        while size <= n {
            let half = size / 2;
            let step = n / size;
            for start in (0..n).step_by(size) {
                for k in 0..half {
                    let t = buffer[start + k + half] * self.twiddles[k * step];
                    buffer[start + k + half] = buffer[start + k] - t;
                    buffer[start + k] += t;
                }
            }
            size *= 2;
        }

        Ok(())
    }

    /// In-place inverse transform, scaled by `1/N`.
    pub fn inverse(&self, buffer: &mut [Complex32]) -> DspResult<()> {
        self.check_len(buffer)?;
        if self.len <= 1 {
            return Ok(());
        }

        for c in buffer.iter_mut() {
            *c = c.conj();
        }
        self.forward(buffer)?;

        let scale = 1.0 / self.len as f32;
        for c in buffer.iter_mut() {
            *c = c.conj() * scale;
        }
        Ok(())
    }

    fn check_len(&self, buffer: &[Complex32]) -> DspResult<()> {
        if buffer.len() != self.len {
            return Err(DspError::ShapeMismatch {
                expected: self.len,
                actual: buffer.len(),
            });
        }
        Ok(())
    }
}

fn bit_reverse(buffer: &mut [Complex32]) {
    let n = buffer.len();
    let mut j = 0;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j |= bit;
        if i < j {
            buffer.swap(i, j);
        }
    }
}

/// One-shot forward transform of a power-of-two length sequence.
pub fn forward_transform(buffer: &mut [Complex32]) -> DspResult<()> {
    Radix2Fft::new(buffer.len())?.forward(buffer)
}

/// One-shot inverse transform of a power-of-two length sequence.
pub fn inverse_transform(buffer: &mut [Complex32]) -> DspResult<()> {
    Radix2Fft::new(buffer.len())?.inverse(buffer)
}
