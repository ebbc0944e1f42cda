mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

use beatshift::analysis::{magnitude_frames, normalize_spectrogram_for_display, DisplayScaling};
use beatshift::audio::{decode_audio, SymphoniaDecoder};
use beatshift::config::{self, Config};
use beatshift::{hanning_window, TempoSession};
use cli::{Cli, Command};

#[derive(Serialize)]
struct BpmReport {
    path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    bpm: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct BeatsReport<'a> {
    path: &'a Path,
    sample_rate: u32,
    hop_size: usize,
    beats_ms: Vec<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    let mut cfg = Config::default();
    if let Some(path) = config::find_config_path(cli.config.as_deref()) {
        if let Some(loaded) = config::load_config(&path) {
            log::info!("Loaded config from {}", path.display());
            cfg = loaded;
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    // Merge: config values apply only when CLI is at its default
    match &mut cli.command {
        Command::Beats { hop, .. } => {
            if *hop == 768 { *hop = cfg.analysis.full_track_hop; }
        }
        Command::Stretch { legacy_frame_rate, .. } => {
            if !*legacy_frame_rate { *legacy_frame_rate = cfg.stretch.legacy_frame_rate; }
        }
        _ => {}
    }

    match cli.command {
        Command::Bpm { inputs, json } => run_bpm(&inputs, json, &cfg),
        Command::Beats { input, hop, json } => run_beats(&input, hop, json, cfg),
        Command::Stretch {
            input,
            output,
            factor,
            length,
            legacy_frame_rate,
        } => {
            cfg.stretch.legacy_frame_rate = legacy_frame_rate;
            run_stretch(&input, &output, factor, length, cfg)
        }
        Command::Spectrogram {
            input,
            output,
            fft_size,
            hop,
            dynamic_range,
            gamma,
        } => {
            let scaling = DisplayScaling {
                dynamic_range_db: dynamic_range,
                gamma,
            };
            run_spectrogram(&input, &output, fft_size, hop, scaling)
        }
        Command::Window { size } => {
            for w in hanning_window(size)? {
                println!("{w}");
            }
            Ok(())
        }
    }
}

fn run_bpm(inputs: &[PathBuf], json: bool, cfg: &Config) -> Result<()> {
    let pb = if inputs.len() > 1 {
        let pb = ProgressBar::new(inputs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files ({eta} remaining)")?
                .progress_chars("=>-"),
        );
        Some(pb)
    } else {
        None
    };

    let reports: Vec<BpmReport> = inputs
        .par_iter()
        .map(|path| {
            let mut session = TempoSession::with_config(
                SymphoniaDecoder,
                cfg.analysis.clone(),
                cfg.stretch.clone(),
            );
            let result = session.analyze_bpm(path);
            if let Some(pb) = &pb {
                pb.inc(1);
            }
            match result {
                Ok(bpm) => BpmReport {
                    path: path.clone(),
                    bpm: Some(bpm),
                    error: None,
                },
                Err(err) => {
                    log::error!("{}: {:#}", path.display(), err);
                    BpmReport {
                        path: path.clone(),
                        bpm: None,
                        error: Some(format!("{err:#}")),
                    }
                }
            }
        })
        .collect();

    if let Some(pb) = pb {
        pb.finish_with_message("Analysis complete");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            match (report.bpm, &report.error) {
                (Some(bpm), _) => println!("{}\t{}", report.path.display(), bpm),
                (None, Some(err)) => println!("{}\terror: {}", report.path.display(), err),
                (None, None) => {}
            }
        }
    }

    if reports.iter().all(|r| r.error.is_some()) {
        bail!("No file could be analyzed");
    }
    Ok(())
}

fn run_beats(input: &Path, hop: usize, json: bool, mut cfg: Config) -> Result<()> {
    cfg.analysis.full_track_hop = hop;
    let session = TempoSession::with_config(SymphoniaDecoder, cfg.analysis, cfg.stretch);
    let grid = session.analyze_full_track(input)?;

    let report = BeatsReport {
        path: input,
        sample_rate: grid.sample_rate,
        hop_size: grid.hop_size,
        beats_ms: grid.positions_ms(),
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for ms in &report.beats_ms {
            println!("{ms}");
        }
    }
    Ok(())
}

fn run_stretch(input: &Path, output: &Path, factor: f32, length: f32, cfg: Config) -> Result<()> {
    if !input.exists() {
        bail!("Input file not found: {}", input.display());
    }
    let mut session = TempoSession::with_config(SymphoniaDecoder, cfg.analysis, cfg.stretch);
    session.change_tempo(input, output, factor, length)?;

    if let Some(source) = session.source() {
        println!(
            "{} -> {} ({} BPM -> {} BPM)",
            input.display(),
            output.display(),
            source.original_bpm,
            source.current_bpm
        );
    }
    Ok(())
}

fn run_spectrogram(
    input: &Path,
    output: &Path,
    fft_size: usize,
    hop: usize,
    scaling: DisplayScaling,
) -> Result<()> {
    let audio = decode_audio(input, None)?;
    let frames = magnitude_frames(&audio.samples, fft_size, hop)?;
    if frames.is_empty() {
        bail!(
            "{} is shorter than one {}-sample frame",
            input.display(),
            fft_size
        );
    }

    let width = frames.len();
    let height = fft_size / 2 + 1;
    log::info!("Spectrogram: {} frames x {} bins", width, height);

    // Row 0 is the top of the image, so the highest bin goes first.
    let mut data = Vec::with_capacity(width * height);
    for bin in (0..height).rev() {
        data.extend(frames.iter().map(|frame| frame[bin]));
    }

    let intensities = normalize_spectrogram_for_display(&data, width, height, scaling)?;
    let pixels: Vec<u8> = intensities.iter().map(|&v| v.round() as u8).collect();

    let image = image::GrayImage::from_raw(width as u32, height as u32, pixels)
        .context("Spectrogram buffer does not match image size")?;
    image
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    log::info!("Done! Output: {}", output.display());
    Ok(())
}
