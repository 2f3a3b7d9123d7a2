use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "birdseye", about = "Bird's-eye road-view video rectifier")]
pub struct Cli {
    /// Append-mode log file, written alongside console output.
    #[arg(long, default_value = "birdseye.log")]
    pub log_file: PathBuf,

    /// Output frame width in pixels.
    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    /// Output frame height in pixels.
    #[arg(long, default_value_t = 800)]
    pub height: u32,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Process a video file.
    Video {
        /// Path to the input video (MP4, etc.).
        input: PathBuf,

        /// Path for the output video.
        #[arg(default_value = "birdseye_out.mp4")]
        output: PathBuf,
    },
    /// Process a directory of still images as a frame sequence.
    Images {
        /// Directory containing .jpg/.jpeg/.png frames.
        input: PathBuf,

        /// Path for the output video.
        #[arg(default_value = "birdseye_out.mp4")]
        output: PathBuf,

        /// Frame rate for the output video.
        #[arg(default_value_t = 30.0)]
        fps: f64,
    },
}
