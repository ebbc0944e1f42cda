#![allow(dead_code)]

use std::f32::consts::PI;

/// Hop-aligned rate: 120 BPM is exactly 22 hops of 512 samples.
pub const CLICK_RATE: u32 = 22528;
pub const CLICK_PERIOD_120: usize = 11264;

/// Alternating-sign clicks of `width` samples every `period` samples.
pub fn click_track(sample_rate: u32, secs: f32, period: usize, offset: usize) -> Vec<f32> {
    let len = (sample_rate as f32 * secs) as usize;
    let mut samples = vec![0.0f32; len];
    let mut pos = offset;
    while pos < len {
        for (i, s) in samples[pos..(pos + 64).min(len)].iter_mut().enumerate() {
            *s = if i % 2 == 0 { 0.9 } else { -0.9 };
        }
        pos += period;
    }
    samples
}

pub fn click_track_120(secs: f32) -> Vec<f32> {
    click_track(CLICK_RATE, secs, CLICK_PERIOD_120, 300)
}

pub fn sine(freq: f32, sample_rate: u32, len: usize, amplitude: f32) -> Vec<f32> {
    (0..len)
        .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

/// Deterministic pseudo-random samples in [-1, 1).
pub fn noise(len: usize, seed: u32) -> Vec<f32> {
    let mut state = seed.max(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state as f32 / u32::MAX as f32) * 2.0 - 1.0
        })
        .collect()
}
