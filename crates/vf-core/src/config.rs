//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON. Every section
//! defaults sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::media::{QualityTier, DEFAULT_SEGMENT_DURATION_SECS};
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub timeouts: TimeoutConfig,
    pub encoding: EncodingConfig,
    pub storage: StorageConfig,
    pub workspace: WorkspaceConfig,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str).map_err(|e| Error::Config(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path.
    ///
    /// A missing path or file yields defaults; an unreadable or malformed file
    /// is an error so a typo never silently drops storage settings.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(Error::Config(format!(
                "failed to read config file {}: {e}",
                path.display()
            ))),
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.timeouts.probe_secs == 0 {
            warnings.push("timeouts.probe_secs is 0; every probe will time out".into());
        }
        if self.timeouts.transcode_secs == 0 {
            warnings.push("timeouts.transcode_secs is 0; every transcode will time out".into());
        }
        if self.pipeline.upload_concurrency == 0 {
            warnings.push("pipeline.upload_concurrency is 0; 1 will be used".into());
        }
        if self.pipeline.default_segment_duration_secs == 0 {
            warnings.push("pipeline.default_segment_duration_secs must be positive".into());
        }

        if self.storage.namespace.trim_matches('/').is_empty() {
            warnings.push("storage.namespace is empty".into());
        }
        if self.storage.proxy_prefix.trim_matches('/').is_empty() {
            warnings.push("storage.proxy_prefix is empty".into());
        }

        match self.storage.backend {
            StorageBackend::S3 => {
                if self.storage.s3.bucket.is_empty() {
                    warnings.push("storage.backend is s3 but storage.s3.bucket is empty".into());
                }
                if self.storage.s3.access_key.is_some() != self.storage.s3.secret_key.is_some() {
                    warnings.push(
                        "storage.s3.access_key and storage.s3.secret_key must be set together"
                            .into(),
                    );
                }
            }
            StorageBackend::Fs => {
                if self.storage.fs_root.as_os_str().is_empty() {
                    warnings.push("storage.backend is fs but storage.fs_root is empty".into());
                }
            }
            StorageBackend::Memory => {}
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Paths to external CLI tools. Unset entries are looked up on `PATH`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

/// Wall-clock budgets for external processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub probe_secs: u64,
    pub transcode_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            probe_secs: 30,
            transcode_secs: 300,
        }
    }
}

impl TimeoutConfig {
    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }

    pub fn transcode(&self) -> Duration {
        Duration::from_secs(self.transcode_secs)
    }
}

/// Encoder settings that do not vary by quality tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    pub video_codec: String,
    /// Encoder speed preset (`-preset`).
    pub video_preset: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub audio_sample_rate: u32,
    pub audio_channels: u8,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            video_codec: "libx264".into(),
            video_preset: "veryfast".into(),
            audio_codec: "aac".into(),
            audio_bitrate: "128k".into(),
            audio_sample_rate: 44_100,
            audio_channels: 2,
        }
    }
}

/// Which object store implementation to publish into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-process map; nothing survives the process.
    Memory,
    /// Plain files under `fs_root`.
    #[default]
    Fs,
    /// S3 or an S3-compatible service.
    S3,
}

/// Object store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// First segment of every storage key.
    pub namespace: String,
    /// First segment of every public path served by the application proxy.
    pub proxy_prefix: String,
    pub fs_root: PathBuf,
    pub s3: S3Config,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            namespace: "uploads".into(),
            proxy_prefix: "media".into(),
            fs_root: PathBuf::from("./data/objects"),
            s3: S3Config::default(),
        }
    }
}

/// S3 connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, R2, ...).
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub force_path_style: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: "us-east-1".into(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            force_path_style: true,
        }
    }
}

/// Scratch directory settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Parent of the per-job directories; the system temp dir when unset.
    pub root: Option<PathBuf>,
}

impl WorkspaceConfig {
    pub fn root_or_temp(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Orchestration defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of segment uploads in flight for one job.
    pub upload_concurrency: usize,
    pub default_segment_duration_secs: u32,
    pub default_quality: QualityTier,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            upload_concurrency: 4,
            default_segment_duration_secs: DEFAULT_SEGMENT_DURATION_SECS,
            default_quality: QualityTier::Medium,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert_eq!(cfg.timeouts.probe_secs, 30);
        assert_eq!(cfg.timeouts.transcode_secs, 300);
        assert_eq!(cfg.encoding.video_codec, "libx264");
        assert_eq!(cfg.storage.backend, StorageBackend::Fs);
        assert_eq!(cfg.storage.namespace, "uploads");
        assert_eq!(cfg.storage.proxy_prefix, "media");
        assert_eq!(cfg.pipeline.upload_concurrency, 4);
    }

    #[test]
    fn default_config_no_warnings() {
        let cfg = Config::default();
        let warnings = cfg.validate();
        assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
    }

    #[test]
    fn parse_empty_json_uses_defaults() {
        let cfg = Config::from_json("{}").unwrap();
        assert_eq!(cfg.timeouts.probe(), Duration::from_secs(30));
        assert_eq!(cfg.timeouts.transcode(), Duration::from_secs(300));
    }

    #[test]
    fn parse_json_config() {
        let json = r#"{
            "timeouts": {"probe_secs": 10},
            "storage": {"backend": "s3", "s3": {"bucket": "videos", "endpoint": "http://minio:9000"}},
            "pipeline": {"default_quality": "high"}
        }"#;
        let cfg = Config::from_json(json).unwrap();
        assert_eq!(cfg.timeouts.probe_secs, 10);
        assert_eq!(cfg.timeouts.transcode_secs, 300);
        assert_eq!(cfg.storage.backend, StorageBackend::S3);
        assert_eq!(cfg.storage.s3.bucket, "videos");
        assert_eq!(cfg.storage.s3.region, "us-east-1");
        assert_eq!(cfg.pipeline.default_quality, QualityTier::High);
    }

    #[test]
    fn malformed_json_is_config_error() {
        let err = Config::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn s3_without_bucket_warns() {
        let mut cfg = Config::default();
        cfg.storage.backend = StorageBackend::S3;
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("bucket")));
    }

    #[test]
    fn half_configured_credentials_warn() {
        let mut cfg = Config::default();
        cfg.storage.backend = StorageBackend::S3;
        cfg.storage.s3.bucket = "videos".into();
        cfg.storage.s3.access_key = Some("AKIA".into());
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("secret_key")));
    }

    #[test]
    fn zero_timeouts_warn() {
        let mut cfg = Config::default();
        cfg.timeouts.probe_secs = 0;
        cfg.pipeline.upload_concurrency = 0;
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("probe_secs")));
        assert!(warnings.iter().any(|w| w.contains("upload_concurrency")));
    }

    #[test]
    fn load_or_default_with_none() {
        let cfg = Config::load_or_default(None).unwrap();
        assert_eq!(cfg.pipeline.upload_concurrency, 4);
    }

    #[test]
    fn load_or_default_with_missing_file() {
        let cfg = Config::load_or_default(Some(Path::new("/nonexistent/vodforge.json"))).unwrap();
        assert_eq!(cfg.storage.namespace, "uploads");
    }

    #[test]
    fn workspace_root_defaults_to_temp() {
        let cfg = WorkspaceConfig::default();
        assert_eq!(cfg.root_or_temp(), std::env::temp_dir());
    }
}
