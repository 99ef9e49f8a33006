//! HLS output naming.
//!
//! [`SegmentNaming`] is the one place that knows what the encoder names its
//! files. The segmenter hands its pattern to ffmpeg, scans the output
//! directory with it, and the publisher uses its regex to find segment
//! references inside the playlist.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

/// Naming convention for the playlist and its transport-stream segments.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentNaming;

impl SegmentNaming {
    pub const MANIFEST_NAME: &'static str = "playlist.m3u8";
    const PREFIX: &'static str = "chunk";
    const EXTENSION: &'static str = "ts";

    /// printf-style pattern handed to `-hls_segment_filename`.
    pub fn ffmpeg_pattern() -> String {
        format!("{}%d.{}", Self::PREFIX, Self::EXTENSION)
    }

    /// File name of the segment at `index`.
    pub fn segment_name(index: u32) -> String {
        format!("{}{index}.{}", Self::PREFIX, Self::EXTENSION)
    }

    /// Index encoded in a segment file name, or `None` for anything else.
    pub fn parse_index(name: &str) -> Option<u32> {
        let caps = Self::file_regex().captures(name)?;
        caps.get(1)?.as_str().parse().ok()
    }

    /// Matches a segment reference anywhere in playlist text. Group 1 is the
    /// index.
    pub fn reference_regex() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| {
            Regex::new(&format!(r"\b{}(\d+)\.{}\b", Self::PREFIX, Self::EXTENSION))
                .expect("valid regex")
        })
    }

    fn file_regex() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| {
            Regex::new(&format!(r"^{}(\d+)\.{}$", Self::PREFIX, Self::EXTENSION))
                .expect("valid regex")
        })
    }
}

/// A segment file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFile {
    pub index: u32,
    pub name: String,
    pub path: PathBuf,
}

/// List the segment files in `dir`, ordered by numeric index.
///
/// Lexical order would put `chunk10.ts` before `chunk2.ts`.
pub fn list_segments(dir: &Path) -> std::io::Result<Vec<SegmentFile>> {
    let mut segments = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(index) = SegmentNaming::parse_index(&name) {
            segments.push(SegmentFile {
                index,
                name,
                path: entry.path(),
            });
        }
    }
    segments.sort_by_key(|s| s.index);
    Ok(segments)
}

/// Sum of the `#EXTINF` durations in a media playlist.
pub fn playlist_duration(text: &str) -> f64 {
    text.lines()
        .filter_map(|line| line.trim().strip_prefix("#EXTINF:"))
        .filter_map(|rest| rest.split(',').next())
        .filter_map(|d| d.trim().parse::<f64>().ok())
        .sum()
}
