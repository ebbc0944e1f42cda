pub mod beat;
pub mod onset;
pub mod spectrum;
pub mod tempo;

pub use beat::{find_beats, BeatGrid, DEFAULT_THRESHOLD_FACTOR};
pub use onset::detect_onsets;
pub use spectrum::{
    forward_magnitude_spectrum, magnitude_frames, normalize_spectrogram_for_display,
    DisplayScaling,
};
pub use tempo::estimate_tempo;
