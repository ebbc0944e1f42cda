use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "beatshift", about = "Tempo detection and pitch-preserving time stretching")]
pub struct Cli {
    /// Config file (defaults to beatshift.toml or the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Estimate the tempo of one or more audio files
    Bpm {
        /// Input audio files (WAV, MP3, FLAC, OGG)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// List beat positions over a whole track
    Beats {
        input: PathBuf,

        /// Hop used to convert beat frames to time
        #[arg(long, default_value_t = 768)]
        hop: usize,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Change the duration of a track without changing its pitch
    Stretch {
        input: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Output/input duration ratio (0.25-4.0)
        #[arg(short, long)]
        factor: f32,

        /// Seconds of input to process (0 = whole file)
        #[arg(long, default_value_t = 0.0)]
        length: f32,

        /// Assume 44.1 kHz when advancing phases, whatever the input rate
        #[arg(long)]
        legacy_frame_rate: bool,
    },

    /// Render a grayscale spectrogram PNG
    Spectrogram {
        input: PathBuf,

        /// Output PNG file
        #[arg(short, long)]
        output: PathBuf,

        /// FFT size (power of two)
        #[arg(long, default_value_t = 2048)]
        fft_size: usize,

        #[arg(long, default_value_t = 512)]
        hop: usize,

        /// Displayed dynamic range in dB
        #[arg(long, default_value_t = 60.0)]
        dynamic_range: f32,

        #[arg(long, default_value_t = 0.7)]
        gamma: f32,
    },

    /// Print Hann window coefficients
    Window {
        #[arg(long)]
        size: usize,
    },
}
