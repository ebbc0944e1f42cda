pub mod phase_vocoder;

pub use phase_vocoder::{is_active_factor, time_stretch, HISTORICAL_FRAME_RATE};
