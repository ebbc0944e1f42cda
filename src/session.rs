//! Stateful tempo workflow around one source track.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::analysis::{detect_onsets, find_beats, tempo, BeatGrid};
use crate::audio::{downsample_for_analysis, write_wav, AudioDecoder};
use crate::config::{AnalysisConfig, StretchConfig};
use crate::stretch::{is_active_factor, time_stretch, HISTORICAL_FRAME_RATE};

/// The original file every tempo change is rendered from.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceTrack {
    pub path: PathBuf,
    /// Seconds of the file used for stretching; `<= 0` means all of it.
    pub length_secs: f32,
    pub original_bpm: u32,
    pub stretch_factor: f32,
    pub current_bpm: u32,
}

pub struct TempoSession<D: AudioDecoder> {
    decoder: D,
    analysis: AnalysisConfig,
    stretch: StretchConfig,
    source: Option<SourceTrack>,
    last_beats: Vec<usize>,
    last_bpm: u32,
}

impl<D: AudioDecoder> TempoSession<D> {
    pub fn new(decoder: D) -> Self {
        Self::with_config(decoder, AnalysisConfig::default(), StretchConfig::default())
    }

    pub fn with_config(decoder: D, analysis: AnalysisConfig, stretch: StretchConfig) -> Self {
        Self {
            decoder,
            analysis,
            stretch,
            source: None,
            last_beats: Vec::new(),
            last_bpm: 0,
        }
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn source(&self) -> Option<&SourceTrack> {
        self.source.as_ref()
    }

    /// Beat frames from the most recent preview analysis.
    pub fn last_beats(&self) -> &[usize] {
        &self.last_beats
    }

    pub fn last_bpm(&self) -> u32 {
        self.last_bpm
    }

    /// Quick BPM estimate from the first `preview_seconds` of `path`,
    /// analyzed at roughly `preview_target_rate`. Returns 0 when no tempo is
    /// found.
    pub fn analyze_bpm(&mut self, path: &Path) -> Result<u32> {
        let max_seconds = Some(self.analysis.preview_seconds).filter(|&s| s > 0.0);
        let audio = self.decoder.decode(path, max_seconds)?;
        let audio = downsample_for_analysis(audio, self.analysis.preview_target_rate);

        let envelope = detect_onsets(&audio.samples, audio.sample_rate)
            .with_context(|| format!("Onset detection failed for {}", path.display()))?;
        let beats = find_beats(&envelope, self.analysis.threshold_factor);
        let bpm = tempo::estimate_tempo(&beats, audio.sample_rate, self.analysis.preview_hop);

        if bpm == 0 {
            log::warn!("No tempo found in {} ({} beats)", path.display(), beats.len());
        } else {
            log::info!("{}: {} BPM", path.display(), bpm);
        }

        self.last_beats = beats;
        self.last_bpm = bpm;
        Ok(bpm)
    }

    /// Beat positions over the whole file at its native rate.
    ///
    /// Frames come from the fixed onset grid; the returned grid reads them
    /// with `full_track_hop` so timeline positions line up with existing
    /// waveform displays.
    pub fn analyze_full_track(&self, path: &Path) -> Result<BeatGrid> {
        let audio = self.decoder.decode(path, None)?;
        let envelope = detect_onsets(&audio.samples, audio.sample_rate)
            .with_context(|| format!("Onset detection failed for {}", path.display()))?;
        let frames = find_beats(&envelope, self.analysis.threshold_factor);

        log::info!(
            "{}: {} beats over {:.1}s",
            path.display(),
            frames.len(),
            audio.duration_secs()
        );
        Ok(BeatGrid::new(frames, self.analysis.full_track_hop, audio.sample_rate))
    }

    /// Renders `input` stretched by `factor` into a WAV file at `output`.
    ///
    /// A new `input` becomes the source track and its BPM is analyzed. Every
    /// call decodes the source again, so repeated changes never compound.
    pub fn change_tempo(
        &mut self,
        input: &Path,
        output: &Path,
        factor: f32,
        length_secs: f32,
    ) -> Result<()> {
        let is_new = self.source.as_ref().map_or(true, |s| s.path != input);
        if is_new {
            log::info!("New source track: {}", input.display());
            let original_bpm = self.analyze_bpm(input)?;
            self.source = Some(SourceTrack {
                path: input.to_path_buf(),
                length_secs,
                original_bpm,
                stretch_factor: 1.0,
                current_bpm: original_bpm,
            });
        }

        let Some(source) = self.source.as_mut() else {
            bail!("No source track loaded");
        };
        if !source.path.exists() {
            let path = source.path.display().to_string();
            self.source = None;
            bail!("Cannot access original file: {path}");
        }

        let max_seconds = Some(source.length_secs).filter(|&s| s > 0.0);
        let audio = self
            .decoder
            .decode(&source.path, max_seconds)
            .context("Failed to load original audio for processing")?;

        let frame_rate = if self.stretch.legacy_frame_rate {
            HISTORICAL_FRAME_RATE
        } else {
            audio.sample_rate
        };
        let stretched = time_stretch(&audio.samples, factor, frame_rate);
        if stretched.is_empty() {
            bail!("Time stretch produced no samples for {}", source.path.display());
        }

        write_wav(output, &stretched, audio.sample_rate)?;

        if is_active_factor(factor) {
            source.stretch_factor = factor;
            source.current_bpm = (source.original_bpm as f32 / factor).round() as u32;
        } else {
            // Guarded factors write the source unchanged.
            log::warn!("Factor {factor} leaves {} unchanged", source.path.display());
            source.stretch_factor = 1.0;
            source.current_bpm = source.original_bpm;
        }
        log::info!(
            "Tempo changed: {} -> {} BPM (factor {:.3})",
            source.original_bpm,
            source.current_bpm,
            factor
        );
        Ok(())
    }

    /// Forgets the source track and the last analysis.
    pub fn reset(&mut self) {
        self.source = None;
        self.last_beats.clear();
        self.last_bpm = 0;
    }
}
