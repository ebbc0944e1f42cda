use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::Path;

/// Writes mono samples as a 16-bit PCM WAV file.
///
/// Samples are clamped to `[-1, 1]` and scaled by 32767.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;

    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
        writer.write_sample(value).context("Failed to write WAV sample")?;
    }

    writer.finalize().context("Failed to finalize WAV file")?;

    log::info!(
        "Wrote {} samples at {}Hz to {}",
        samples.len(),
        sample_rate,
        path.display()
    );
    Ok(())
}
