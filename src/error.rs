use thiserror::Error;

/// Precondition violations reported by the DSP routines.
///
/// Numerical edge cases (silence, zero variance, zero energy) are absorbed
/// inside the algorithms and never show up here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DspError {
    #[error("transform length must be a power of two, got {len}")]
    NotPowerOfTwo { len: usize },

    #[error("window size must be greater than 1, got {size}")]
    WindowTooShort { size: usize },

    #[error("input buffer is empty")]
    EmptyInput,

    #[error("buffer holds {actual} values, expected {expected}")]
    ShapeMismatch { expected: usize, actual: usize },
}

pub type DspResult<T> = std::result::Result<T, DspError>;
