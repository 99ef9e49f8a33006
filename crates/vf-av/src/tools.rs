//! External tool detection.
//!
//! The [`ToolRegistry`] resolves the encoder and prober executables once at
//! startup so every job uses the same binaries.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vf_core::config::ToolsConfig;
use vf_core::ToolFailure;

/// Tools the pipeline shells out to.
pub const KNOWN_TOOLS: &[&str] = &["ffmpeg", "ffprobe"];

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub available: bool,
    /// First line of `-version` output, if the tool ran.
    pub version: Option<String>,
    pub path: Option<PathBuf>,
}

/// Resolved executable paths keyed by tool name.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, PathBuf>,
}

impl ToolRegistry {
    /// Discover tools, preferring configured paths that exist and falling
    /// back to a `PATH` lookup. Tools that cannot be found are omitted.
    pub fn discover(config: &ToolsConfig) -> Self {
        let mut tools = HashMap::new();

        for &name in KNOWN_TOOLS {
            let custom = match name {
                "ffmpeg" => config.ffmpeg_path.as_deref(),
                "ffprobe" => config.ffprobe_path.as_deref(),
                _ => None,
            };

            let resolved = match custom {
                Some(p) if p.exists() => Some(p.to_path_buf()),
                Some(p) => {
                    tracing::warn!(
                        "configured {name} path {} does not exist; searching PATH",
                        p.display()
                    );
                    which::which(name).ok()
                }
                None => which::which(name).ok(),
            };

            if let Some(path) = resolved {
                tracing::debug!("resolved {name} -> {}", path.display());
                tools.insert(name.to_string(), path);
            }
        }

        Self { tools }
    }

    /// Registry with explicit paths, bypassing discovery.
    pub fn with_paths(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        let mut tools = HashMap::new();
        tools.insert("ffmpeg".to_string(), ffmpeg.into());
        tools.insert("ffprobe".to_string(), ffprobe.into());
        Self { tools }
    }

    /// Path for `name`, or a spawn failure naming the missing tool.
    pub fn require(&self, name: &str) -> Result<&Path, ToolFailure> {
        self.tools
            .get(name)
            .map(PathBuf::as_path)
            .ok_or_else(|| ToolFailure::Spawn {
                tool: name.to_string(),
                message: format!("{name} not found; is it installed and in PATH?"),
            })
    }

    pub fn ffmpeg(&self) -> Result<&Path, ToolFailure> {
        self.require("ffmpeg")
    }

    pub fn ffprobe(&self) -> Result<&Path, ToolFailure> {
        self.require("ffprobe")
    }

    /// Availability report for every known tool.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| match self.tools.get(name) {
                Some(path) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(path),
                    path: Some(path.clone()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            })
            .collect()
    }
}

/// Run `<tool> -version` and return the first line of stdout.
fn detect_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path)
        .arg("-version")
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}
