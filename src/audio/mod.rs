pub mod decode;
pub mod encode;

pub use decode::{decode_audio, downsample_for_analysis, AudioData, AudioDecoder, SymphoniaDecoder};
pub use encode::write_wav;
