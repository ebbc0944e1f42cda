//! Adaptive-threshold peak picking over an onset envelope.

use serde::Serialize;

pub const DEFAULT_THRESHOLD_FACTOR: f32 = 1.3;

/// Half-width of the local-maximum neighbourhood, in frames.
const PEAK_RADIUS: usize = 9;
/// Width of the mean/deviation window used for the threshold.
const STATS_WINDOW: usize = 30;

/// Returns the ascending frame indices of beat peaks.
///
/// A frame is a peak when it exceeds `mean + factor * stddev` of its local
/// window and no neighbour within nine frames is strictly larger. Equal
/// neighbours do not disqualify a frame, so a flat plateau can report several
/// adjacent peaks.
pub fn find_beats(envelope: &[f32], threshold_factor: f32) -> Vec<usize> {
    let len = envelope.len();
    let threshold = adaptive_threshold(envelope, threshold_factor);

    let mut peaks = Vec::new();
    for i in PEAK_RADIUS..len.saturating_sub(PEAK_RADIUS) {
        let value = envelope[i];
        if value <= threshold[i] {
            continue;
        }
        let is_peak = (i - PEAK_RADIUS..=i + PEAK_RADIUS)
            .filter(|&j| j != i)
            .all(|j| envelope[j] <= value);
        if is_peak {
            peaks.push(i);
        }
    }

    log::debug!("Peak picking: {} beats over {} frames", peaks.len(), len);
    peaks
}

fn adaptive_threshold(envelope: &[f32], factor: f32) -> Vec<f32> {
    let len = envelope.len();
    let half = STATS_WINDOW / 2;

    (0..len)
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half).min(len);
            let window = &envelope[start..end];
            let count = window.len() as f32;
            let sum: f32 = window.iter().sum();
            let sum_sq: f32 = window.iter().map(|v| v * v).sum();
            let mean = sum / count;
            let variance = (sum_sq / count - mean * mean).max(0.0);
            mean + factor * variance.sqrt()
        })
        .collect()
}

/// Beat frame indices together with the frame grid they refer to.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BeatGrid {
    pub frames: Vec<usize>,
    pub hop_size: usize,
    pub sample_rate: u32,
}

impl BeatGrid {
    pub fn new(frames: Vec<usize>, hop_size: usize, sample_rate: u32) -> Self {
        Self {
            frames,
            hop_size,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Beat times in seconds.
    pub fn times(&self) -> Vec<f32> {
        if self.sample_rate == 0 {
            return Vec::new();
        }
        self.frames
            .iter()
            .map(|&f| (f * self.hop_size) as f32 / self.sample_rate as f32)
            .collect()
    }

    /// Beat positions in whole milliseconds, truncated.
    pub fn positions_ms(&self) -> Vec<u64> {
        if self.sample_rate == 0 {
            return Vec::new();
        }
        self.frames
            .iter()
            .map(|&f| (f as u64 * self.hop_size as u64 * 1000) / self.sample_rate as u64)
            .collect()
    }
}
