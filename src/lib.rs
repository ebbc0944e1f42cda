//! Tempo and beat analysis plus pitch-preserving time stretching for mono
//! audio buffers.
//!
//! The DSP core works on `&[f32]` and returns owned buffers. File I/O, the
//! TOML configuration and the stateful [`TempoSession`] sit on top of it.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod dsp;
pub mod error;
pub mod session;
pub mod stretch;

pub use analysis::{
    forward_magnitude_spectrum, normalize_spectrogram_for_display, BeatGrid, DisplayScaling,
};
pub use dsp::{apply_hann_window, hanning_window};
pub use error::{DspError, DspResult};
pub use session::TempoSession;
pub use stretch::time_stretch;

use analysis::{detect_onsets, find_beats, onset::HOP_SIZE, DEFAULT_THRESHOLD_FACTOR};

/// Estimates the tempo of `samples` in whole BPM, or 0 when there is no
/// confident estimate.
pub fn estimate_tempo(samples: &[f32], sample_rate: u32) -> DspResult<u32> {
    let envelope = detect_onsets(samples, sample_rate)?;
    let beats = find_beats(&envelope, DEFAULT_THRESHOLD_FACTOR);
    let bpm = analysis::tempo::estimate_tempo(&beats, sample_rate, HOP_SIZE);
    if bpm == 0 {
        log::warn!("No confident tempo from {} beats", beats.len());
    } else {
        log::info!("Estimated tempo: {} BPM from {} beats", bpm, beats.len());
    }
    Ok(bpm)
}

/// Detects beats in `samples`. The returned grid converts frame indices to
/// time with `hop_size`.
pub fn detect_beats(samples: &[f32], sample_rate: u32, hop_size: usize) -> DspResult<BeatGrid> {
    detect_beats_with_threshold(samples, sample_rate, hop_size, DEFAULT_THRESHOLD_FACTOR)
}

/// [`detect_beats`] with an explicit peak-picking threshold factor.
pub fn detect_beats_with_threshold(
    samples: &[f32],
    sample_rate: u32,
    hop_size: usize,
    threshold_factor: f32,
) -> DspResult<BeatGrid> {
    let envelope = detect_onsets(samples, sample_rate)?;
    let frames = find_beats(&envelope, threshold_factor);
    log::debug!("Detected {} beats over {} onset frames", frames.len(), envelope.len());
    Ok(BeatGrid::new(frames, hop_size, sample_rate))
}
