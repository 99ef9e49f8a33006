//! Media-domain types shared across the pipeline crates.
//!
//! Enums serialize in lowercase and implement `Display`/`FromStr` with the
//! same spelling so CLI flags, config files and JSON output all agree.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::ids::{OwnerKey, VideoId};

/// Default length of one HLS segment, in seconds.
pub const DEFAULT_SEGMENT_DURATION_SECS: u32 = 6;

/// Media type of the rewritten HLS playlist.
pub const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Media type of an MPEG transport-stream segment.
pub const SEGMENT_CONTENT_TYPE: &str = "video/mp2t";

// ---------------------------------------------------------------------------
// QualityTier
// ---------------------------------------------------------------------------

/// Named encode preset controlling the compression/bitrate trade-off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityTier {
    pub const ALL: [QualityTier; 3] = [QualityTier::Low, QualityTier::Medium, QualityTier::High];
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

impl FromStr for QualityTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(Error::Validation(format!(
                "unknown quality tier '{other}' (expected low, medium or high)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ProcessingOptions
// ---------------------------------------------------------------------------

/// Per-call encode options supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingOptions {
    pub quality_tier: QualityTier,
    pub segment_duration_secs: u32,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            quality_tier: QualityTier::default(),
            segment_duration_secs: DEFAULT_SEGMENT_DURATION_SECS,
        }
    }
}

impl ProcessingOptions {
    pub fn new(quality_tier: QualityTier, segment_duration_secs: u32) -> Self {
        Self {
            quality_tier,
            segment_duration_secs,
        }
    }

    /// Check the options before handing them to the pipeline.
    ///
    /// The pipeline itself trusts its input; callers that accept options from
    /// users should run this first.
    pub fn validate(&self) -> crate::Result<()> {
        if self.segment_duration_secs == 0 {
            return Err(Error::Validation(
                "segment_duration_secs must be a positive integer".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MediaInfo
// ---------------------------------------------------------------------------

/// Facts about the input file gathered by the prober.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    /// Container-level bitrate in bits per second, when reported.
    pub bitrate: Option<u64>,
    /// Codec name of the first video stream (ffprobe spelling).
    pub video_codec: Option<String>,
    pub has_audio: bool,
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

/// What an uploaded object is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Original,
    Manifest,
    Segment,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Original => write!(f, "original"),
            Self::Manifest => write!(f, "manifest"),
            Self::Segment => write!(f, "segment"),
        }
    }
}

/// One object destined for the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub relative_name: String,
    pub content_type: String,
}

impl Artifact {
    pub fn segment(name: impl Into<String>) -> Self {
        Self {
            kind: ArtifactKind::Segment,
            relative_name: name.into(),
            content_type: SEGMENT_CONTENT_TYPE.to_string(),
        }
    }

    pub fn manifest(name: impl Into<String>) -> Self {
        Self {
            kind: ArtifactKind::Manifest,
            relative_name: name.into(),
            content_type: MANIFEST_CONTENT_TYPE.to_string(),
        }
    }

    pub fn original(name: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            kind: ArtifactKind::Original,
            relative_name: name.into(),
            content_type: content_type.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProcessingResult
// ---------------------------------------------------------------------------

/// Descriptor returned after every artifact has been uploaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub video_id: VideoId,
    pub owner_key: OwnerKey,
    pub original_storage_key: String,
    /// Key prefix shared by the manifest and all its segments.
    pub manifest_storage_key_prefix: String,
    pub manifest_storage_key: String,
    pub manifest_public_path: String,
    /// Proxy paths of the segments, in playback order.
    pub segment_public_paths: Vec<String>,
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
}
