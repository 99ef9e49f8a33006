use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vf_core::QualityTier;

#[derive(Parser)]
#[command(name = "vodforge")]
#[command(author, version, about = "Video ingestion: probe, HLS segmenting and object-store publishing")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transcode a video to HLS and publish it to the configured store
    Process {
        /// Video file to ingest
        #[arg(required = true)]
        file: PathBuf,

        /// Display name of the uploader; sanitized into the storage owner key
        #[arg(long, default_value = "guest")]
        owner: String,

        /// Video id to publish under (generated when omitted)
        #[arg(long)]
        video_id: Option<String>,

        /// Encode quality tier (defaults to pipeline.default_quality)
        #[arg(long, value_parser = parse_quality)]
        quality: Option<QualityTier>,

        /// HLS segment length in seconds (defaults to pipeline.default_segment_duration_secs)
        #[arg(long)]
        segment_duration: Option<u32>,

        /// Print the processing result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Probe a media file and display information
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

fn parse_quality(s: &str) -> Result<QualityTier, String> {
    s.parse().map_err(|e: vf_core::Error| e.to_string())
}
