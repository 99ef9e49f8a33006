//! Per-job scratch directories.
//!
//! A [`Workspace`] is a uniquely named directory holding the raw input and
//! everything the encoder writes. It is removed by [`Workspace::destroy`] or,
//! failing that, when the value is dropped.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use vf_core::{Error, VideoId};

/// Subdirectory the segmenter writes into.
const OUTPUT_DIR: &str = "hls";

/// Base name of the raw input scratch file.
const INPUT_STEM: &str = "input";

/// Scratch directory for one job.
///
/// # Example
///
/// ```no_run
/// use vf_av::Workspace;
/// use vf_core::VideoId;
///
/// let ws = Workspace::provision(&std::env::temp_dir(), &VideoId::generate()).unwrap();
/// std::fs::write(ws.input_path(Some("mp4")), b"...").unwrap();
/// // ... encode into ws.output_dir() ...
/// ws.destroy();
/// ```
#[derive(Debug)]
pub struct Workspace {
    temp_dir: TempDir,
    output_dir: PathBuf,
}

impl Workspace {
    /// Create `<root>/vodforge-<video_id>-<random>/` and its `hls/` subdir.
    pub fn provision(root: &Path, video_id: &VideoId) -> vf_core::Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix(&format!("vodforge-{video_id}-"))
            .tempdir_in(root)
            .map_err(|e| {
                Error::Workspace(format!(
                    "failed to create job directory under {}: {e}",
                    root.display()
                ))
            })?;

        let output_dir = temp_dir.path().join(OUTPUT_DIR);
        std::fs::create_dir(&output_dir).map_err(|e| {
            Error::Workspace(format!(
                "failed to create {}: {e}",
                output_dir.display()
            ))
        })?;

        tracing::debug!(video_id = %video_id, path = %temp_dir.path().display(), "workspace provisioned");

        Ok(Self {
            temp_dir,
            output_dir,
        })
    }

    /// Root of the job directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Scratch file for the raw upload, keeping the original extension so the
    /// demuxer can use it as a hint.
    pub fn input_path(&self, extension: Option<&str>) -> PathBuf {
        match extension.filter(|e| !e.is_empty()) {
            Some(ext) => self.path().join(format!("{INPUT_STEM}.{ext}")),
            None => self.path().join(INPUT_STEM),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Remove the directory tree. Failures are logged, never returned.
    pub fn destroy(self) {
        let path = self.temp_dir.path().to_path_buf();
        match self.temp_dir.close() {
            Ok(()) => tracing::debug!(path = %path.display(), "workspace removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), "failed to remove workspace: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> VideoId {
        s.parse().unwrap()
    }

    #[test]
    fn provision_creates_prefixed_dir() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::provision(root.path(), &id("abc123")).unwrap();

        assert!(ws.path().is_dir());
        assert!(ws.output_dir().is_dir());
        assert_eq!(ws.path().parent().unwrap(), root.path());
        let name = ws.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("vodforge-abc123-"), "got {name}");
    }

    #[test]
    fn concurrent_jobs_get_distinct_dirs() {
        let root = tempfile::tempdir().unwrap();
        let a = Workspace::provision(root.path(), &id("same")).unwrap();
        let b = Workspace::provision(root.path(), &id("same")).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn input_path_keeps_extension() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::provision(root.path(), &id("v1")).unwrap();
        assert_eq!(ws.input_path(Some("mov")), ws.path().join("input.mov"));
        assert_eq!(ws.input_path(None), ws.path().join("input"));
        assert_eq!(ws.input_path(Some("")), ws.path().join("input"));
    }

    #[test]
    fn destroy_removes_everything() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::provision(root.path(), &id("v2")).unwrap();
        std::fs::write(ws.input_path(Some("mp4")), b"data").unwrap();
        std::fs::write(ws.output_dir().join("chunk0.ts"), b"ts").unwrap();
        let path = ws.path().to_path_buf();

        ws.destroy();
        assert!(!path.exists());
    }

    #[test]
    fn destroy_tolerates_missing_dir() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::provision(root.path(), &id("v3")).unwrap();
        std::fs::remove_dir_all(ws.path()).unwrap();
        ws.destroy();
    }

    #[test]
    fn drop_removes_dir() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let ws = Workspace::provision(root.path(), &id("v4")).unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn provision_under_missing_root_fails() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("does/not/exist");
        let err = Workspace::provision(&missing, &id("v5")).unwrap_err();
        assert!(matches!(err, Error::Workspace(_)));
    }
}
