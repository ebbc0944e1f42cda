pub mod fft;
pub mod window;

pub use fft::{forward_transform, inverse_transform, Radix2Fft};
pub use window::{apply_hann_window, hanning_window};
