//! # vf-av
//!
//! External media tooling for the vodforge pipeline.
//!
//! This crate provides:
//!
//! - **Command execution** ([`ToolCommand`]) -- async builder with a hard
//!   timeout that kills the whole process group.
//! - **Tool discovery** ([`ToolRegistry`]) -- find ffmpeg and ffprobe.
//! - **Workspace management** ([`Workspace`]) -- per-job scratch directory
//!   that is always removed.
//! - **Probing** ([`MediaProber`], [`FfprobeProber`]).
//! - **Segmenting** ([`Segmenter`], [`FfmpegSegmenter`]) plus the HLS naming
//!   convention in [`hls`].

pub mod command;
pub mod hls;
pub mod probe;
pub mod tools;
pub mod transcode;
pub mod workspace;

pub use command::{ToolCommand, ToolOutput};
pub use hls::{SegmentFile, SegmentNaming};
pub use probe::{FfprobeProber, MediaProber};
pub use tools::{ToolInfo, ToolRegistry};
pub use transcode::{
    EncodeProgress, FfmpegSegmenter, ProgressParser, QualityPreset, SegmentedOutput, Segmenter,
};
pub use workspace::Workspace;
