//! Unified error type for the ingestion pipeline.
//!
//! Stage failures (probe, transcode, publish, workspace) each have their own
//! variant. The orchestrator wraps whichever one ended the job in
//! [`Error::Job`] so callers always see the video id and the failing stage.
//! [`Error::http_status`] lets the upload endpoint pick a response code
//! without matching on every variant.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ids::VideoId;

/// How an external tool invocation failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolFailure {
    /// The process could not be started.
    #[error("failed to spawn {tool}: {message}")]
    Spawn { tool: String, message: String },

    /// The wall-clock budget ran out and the process group was killed.
    #[error("{tool} timed out after {after:?}")]
    Timeout { tool: String, after: Duration },

    /// The process ran to completion but reported failure.
    #[error("{tool} exited with {}: {stderr}", exit_label(.code))]
    Exit {
        tool: String,
        /// Exit code, or `None` when the process was terminated by a signal.
        code: Option<i32>,
        /// Trimmed standard error.
        stderr: String,
    },

    /// The caller cancelled the job while the process was running.
    #[error("{tool} was cancelled")]
    Cancelled { tool: String },

    /// Reading the process pipes failed.
    #[error("I/O error while running {tool}: {message}")]
    Io { tool: String, message: String },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "a signal".to_string(),
    }
}

impl ToolFailure {
    /// Name of the tool that failed.
    pub fn tool(&self) -> &str {
        match self {
            Self::Spawn { tool, .. }
            | Self::Timeout { tool, .. }
            | Self::Exit { tool, .. }
            | Self::Cancelled { tool }
            | Self::Io { tool, .. } => tool,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Why probing an input file failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeFailure {
    #[error(transparent)]
    Tool(#[from] ToolFailure),

    /// ffprobe produced something other than the expected JSON report.
    #[error("unparsable probe report: {0}")]
    Parse(String),

    /// The report parsed but lists no video stream.
    #[error("no video stream found in {0}")]
    NoVideoStream(String),
}

/// Why the segmenting encode failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranscodeFailure {
    #[error(transparent)]
    Tool(#[from] ToolFailure),

    /// ffmpeg exited cleanly but the expected files are not there.
    #[error("encoder produced no {0}")]
    MissingOutput(String),

    /// The encoder's output directory could not be prepared or read.
    #[error("encoder output directory: {0}")]
    Io(String),
}

/// Pipeline stage a job was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStage {
    Provisioning,
    Probing,
    Transcoding,
    Publishing,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provisioning => write!(f, "provisioning"),
            Self::Probing => write!(f, "probing"),
            Self::Transcoding => write!(f, "transcoding"),
            Self::Publishing => write!(f, "publishing"),
        }
    }
}

/// Unified error type covering all failure modes in vodforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Media probing failed.
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeFailure),

    /// The segmenting encode failed.
    #[error("Transcode error: {0}")]
    Transcode(#[from] TranscodeFailure),

    /// An upload to the object store failed.
    #[error("Publish error [{key}]: {message}")]
    Publish {
        /// Storage key (or artifact name) being written.
        key: String,
        /// Human-readable error description.
        message: String,
    },

    /// The per-job scratch directory could not be created.
    #[error("Workspace error: {0}")]
    Workspace(String),

    /// An external tool failed outside of a pipeline stage.
    #[error("Tool error: {0}")]
    Tool(ToolFailure),

    /// A job failed; `source` is the stage-specific error.
    #[error("job {video_id} failed during {stage}: {source}")]
    Job {
        video_id: VideoId,
        stage: JobStage,
        #[source]
        source: Box<Error>,
    },

    /// Caller-supplied data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration could not be loaded or parsed.
    #[error("Config error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Probe(_) => 422,
            Error::Transcode(TranscodeFailure::Tool(f)) | Error::Tool(f) if f.is_timeout() => 504,
            Error::Transcode(TranscodeFailure::Io(_)) => 500,
            Error::Transcode(_) | Error::Tool(_) => 502,
            Error::Publish { .. } => 502,
            Error::Workspace(_) => 500,
            Error::Job { source, .. } => source.http_status(),
            Error::Validation(_) => 400,
            Error::Config(_) => 500,
            Error::Io { .. } => 500,
        }
    }

    /// The stage a job failed in, if this is a wrapped job error.
    pub fn stage(&self) -> Option<JobStage> {
        match self {
            Error::Job { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Whether the root cause is an external tool hitting its timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Probe(ProbeFailure::Tool(f))
            | Error::Transcode(TranscodeFailure::Tool(f))
            | Error::Tool(f) => f.is_timeout(),
            Error::Job { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// Convenience constructor for [`Error::Publish`].
    pub fn publish(key: impl Into<String>, message: impl fmt::Display) -> Self {
        Error::Publish {
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Wrap a stage error with the job context.
    pub fn job(video_id: VideoId, stage: JobStage, source: Error) -> Self {
        Error::Job {
            video_id,
            stage,
            source: Box::new(source),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
