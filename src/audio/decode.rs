use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Mono samples and their sample rate.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioData {
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Source of decoded mono audio.
pub trait AudioDecoder {
    /// Decodes `path` to mono. When `max_seconds` is positive, at most
    /// `floor(rate * max_seconds)` frames are returned.
    fn decode(&self, path: &Path, max_seconds: Option<f32>) -> Result<AudioData>;
}

/// Decoder for every container/codec enabled in symphonia (WAV, MP3, FLAC,
/// OGG, AAC).
#[derive(Clone, Copy, Debug, Default)]
pub struct SymphoniaDecoder;

impl AudioDecoder for SymphoniaDecoder {
    fn decode(&self, path: &Path, max_seconds: Option<f32>) -> Result<AudioData> {
        decode_audio(path, max_seconds)
    }
}

pub fn decode_audio(path: &Path, max_seconds: Option<f32>) -> Result<AudioData> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to probe audio format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .context("No audio tracks found")?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count()).max(1);
    let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;

    let frame_limit = max_seconds
        .filter(|&secs| secs > 0.0)
        .map(|secs| (sample_rate as f32 * secs) as usize);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        if frame_limit.is_some_and(|limit| all_samples.len() >= limit) {
            break;
        }

        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        let samples = sample_buf.samples();

        // Downmix to mono
        if channels == 1 {
            all_samples.extend_from_slice(samples);
        } else {
            for frame_samples in samples.chunks(channels) {
                let mono: f32 = frame_samples.iter().sum::<f32>() / channels as f32;
                all_samples.push(mono);
            }
        }
    }

    if let Some(limit) = frame_limit {
        all_samples.truncate(limit);
    }

    if all_samples.is_empty() {
        anyhow::bail!("No audio data decoded from {}", path.display());
    }

    log::info!(
        "Decoded audio: {} samples, {}Hz, {:.1}s",
        all_samples.len(),
        sample_rate,
        all_samples.len() as f32 / sample_rate as f32
    );

    Ok(AudioData {
        samples: all_samples,
        sample_rate,
    })
}

/// Reduces the rate of `audio` towards `target_rate` by averaging blocks of
/// `floor(rate / target_rate)` samples. Audio already at or below the target,
/// or with a block size of 1, is returned unchanged.
pub fn downsample_for_analysis(audio: AudioData, target_rate: u32) -> AudioData {
    if target_rate == 0 || audio.sample_rate <= target_rate {
        return audio;
    }
    let factor = (audio.sample_rate / target_rate) as usize;
    if factor <= 1 {
        return audio;
    }

    let samples: Vec<f32> = audio
        .samples
        .chunks_exact(factor)
        .map(|block| block.iter().sum::<f32>() / factor as f32)
        .collect();
    let sample_rate = audio.sample_rate / factor as u32;

    log::debug!(
        "Downsampled {}Hz -> {}Hz for analysis ({} samples)",
        audio.sample_rate,
        sample_rate,
        samples.len()
    );

    AudioData {
        samples,
        sample_rate,
    }
}
