//! Segmenting HLS encode using ffmpeg.
//!
//! One ffmpeg run re-encodes the input to H.264/AAC and cuts it into
//! fixed-length transport-stream segments plus a VOD playlist. Keyframes are
//! forced on segment boundaries so every segment is independently decodable.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use vf_core::config::EncodingConfig;
use vf_core::{ProcessingOptions, QualityTier, TranscodeFailure};

use crate::command::ToolCommand;
use crate::hls::{list_segments, SegmentFile, SegmentNaming};

/// Default encode timeout: 5 minutes.
pub const DEFAULT_TRANSCODE_TIMEOUT: Duration = Duration::from_secs(300);

// ---------------------------------------------------------------------------
// Quality presets
// ---------------------------------------------------------------------------

/// Rate-control settings for one [`QualityTier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityPreset {
    /// Constant rate factor; lower is better.
    pub crf: u8,
    /// VBV maximum rate in kbit/s.
    pub max_bitrate_kbps: u32,
    /// VBV buffer size in kbit.
    pub bufsize_kbps: u32,
}

impl QualityPreset {
    /// Preset for a tier. Higher tiers never get a higher CRF or a lower
    /// bitrate ceiling.
    ///
    /// | tier   | crf | maxrate | bufsize |
    /// |--------|-----|---------|---------|
    /// | low    | 28  | 800k    | 1600k   |
    /// | medium | 23  | 2500k   | 5000k   |
    /// | high   | 19  | 5000k   | 10000k  |
    pub fn for_tier(tier: QualityTier) -> Self {
        match tier {
            QualityTier::Low => Self {
                crf: 28,
                max_bitrate_kbps: 800,
                bufsize_kbps: 1600,
            },
            QualityTier::Medium => Self {
                crf: 23,
                max_bitrate_kbps: 2500,
                bufsize_kbps: 5000,
            },
            QualityTier::High => Self {
                crf: 19,
                max_bitrate_kbps: 5000,
                bufsize_kbps: 10_000,
            },
        }
    }

    fn maxrate_arg(&self) -> String {
        format!("{}k", self.max_bitrate_kbps)
    }

    fn bufsize_arg(&self) -> String {
        format!("{}k", self.bufsize_kbps)
    }
}

// ---------------------------------------------------------------------------
// Output and trait
// ---------------------------------------------------------------------------

/// Files left in the output directory by a successful encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentedOutput {
    pub manifest_path: PathBuf,
    /// Segments in playback order.
    pub segments: Vec<SegmentFile>,
}

impl SegmentedOutput {
    pub fn segment_paths(&self) -> Vec<PathBuf> {
        self.segments.iter().map(|s| s.path.clone()).collect()
    }

    /// Scan `output_dir` for the playlist and its segments.
    pub fn collect(output_dir: &Path) -> vf_core::Result<Self> {
        let manifest_path = output_dir.join(SegmentNaming::MANIFEST_NAME);
        if !manifest_path.is_file() {
            return Err(TranscodeFailure::MissingOutput(SegmentNaming::MANIFEST_NAME.into()).into());
        }

        let segments = list_segments(output_dir).map_err(|e| {
            TranscodeFailure::Io(format!("listing {}: {e}", output_dir.display()))
        })?;
        if segments.is_empty() {
            return Err(TranscodeFailure::MissingOutput("segments".into()).into());
        }

        Ok(Self {
            manifest_path,
            segments,
        })
    }
}

/// Produces an HLS playlist and segments from an input file.
#[async_trait]
pub trait Segmenter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Encode `input` into `output_dir`.
    ///
    /// `duration_hint` is the probed duration, used only for progress
    /// reporting.
    async fn segment(
        &self,
        input: &Path,
        output_dir: &Path,
        options: &ProcessingOptions,
        duration_hint: Option<f64>,
        cancel: &CancellationToken,
    ) -> vf_core::Result<SegmentedOutput>;
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress stats from an ffmpeg encode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodeProgress {
    /// 0.0..=1.0, when the source duration is known.
    pub pct: Option<f64>,
    pub out_time_secs: Option<f64>,
    pub fps: Option<f64>,
    pub speed: Option<String>,
    pub frame: Option<u64>,
    /// Set on the final block (`progress=end`).
    pub done: bool,
}

/// Accumulates `key=value` lines from `-progress pipe:2` and yields one
/// [`EncodeProgress`] per block.
#[derive(Debug, Default)]
pub struct ProgressParser {
    duration_secs: Option<f64>,
    current: EncodeProgress,
}

impl ProgressParser {
    pub fn new(duration_secs: Option<f64>) -> Self {
        Self {
            duration_secs: duration_secs.filter(|d| *d > 0.0),
            current: EncodeProgress::default(),
        }
    }

    /// Feed one stderr line. Returns a snapshot at the end of each block.
    pub fn feed(&mut self, line: &str) -> Option<EncodeProgress> {
        let (key, value) = line.trim().split_once('=')?;
        let value = value.trim();
        match key {
            "out_time_us" | "out_time_ms" => {
                // ffmpeg reports microseconds under both names.
                if let Ok(us) = value.parse::<i64>() {
                    let secs = us.max(0) as f64 / 1_000_000.0;
                    self.current.out_time_secs = Some(secs);
                    self.current.pct = self.duration_secs.map(|d| (secs / d).clamp(0.0, 1.0));
                }
            }
            "fps" => self.current.fps = value.parse().ok(),
            "speed" if value != "N/A" => self.current.speed = Some(value.to_string()),
            "frame" => self.current.frame = value.parse().ok(),
            "progress" => {
                self.current.done = value == "end";
                if self.current.done && self.duration_secs.is_some() {
                    self.current.pct = Some(1.0);
                }
                return Some(self.current.clone());
            }
            _ => {}
        }
        None
    }
}

// ---------------------------------------------------------------------------
// ffmpeg implementation
// ---------------------------------------------------------------------------

type ProgressCallback = Arc<dyn Fn(&EncodeProgress) + Send + Sync>;

/// A [`Segmenter`] backed by the `ffmpeg` CLI.
#[derive(Clone)]
pub struct FfmpegSegmenter {
    ffmpeg_path: PathBuf,
    timeout: Duration,
    encoding: EncodingConfig,
    on_progress: Option<ProgressCallback>,
}

impl fmt::Debug for FfmpegSegmenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FfmpegSegmenter")
            .field("ffmpeg_path", &self.ffmpeg_path)
            .field("timeout", &self.timeout)
            .field("encoding", &self.encoding)
            .finish_non_exhaustive()
    }
}

impl FfmpegSegmenter {
    pub fn new(ffmpeg_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            timeout: DEFAULT_TRANSCODE_TIMEOUT,
            encoding: EncodingConfig::default(),
            on_progress: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_encoding(mut self, encoding: EncodingConfig) -> Self {
        self.encoding = encoding;
        self
    }

    /// Receive every parsed progress block. Purely observational.
    #[must_use]
    pub fn with_progress(mut self, f: impl Fn(&EncodeProgress) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }
}

/// Full ffmpeg argument list for one segmenting encode.
pub fn build_args(
    input: &Path,
    output_dir: &Path,
    options: &ProcessingOptions,
    encoding: &EncodingConfig,
) -> Vec<String> {
    let preset = QualityPreset::for_tier(options.quality_tier);
    let seg = options.segment_duration_secs.to_string();
    let segment_pattern = output_dir.join(SegmentNaming::ffmpeg_pattern());
    let manifest = output_dir.join(SegmentNaming::MANIFEST_NAME);

    let mut args: Vec<String> = Vec::with_capacity(64);
    let mut push = |items: &[&str]| args.extend(items.iter().map(|s| s.to_string()));

    push(&["-y", "-hide_banner", "-progress", "pipe:2", "-nostats"]);
    push(&["-i", &input.to_string_lossy()]);

    // Video: CRF with a VBV ceiling, keyframes pinned to segment boundaries.
    push(&["-c:v", &encoding.video_codec, "-preset", &encoding.video_preset]);
    push(&["-crf", &preset.crf.to_string()]);
    push(&["-maxrate", &preset.maxrate_arg(), "-bufsize", &preset.bufsize_arg()]);
    push(&["-sc_threshold", "0"]);
    push(&["-force_key_frames", &format!("expr:gte(t,n_forced*{seg})")]);

    push(&["-c:a", &encoding.audio_codec]);
    push(&["-ar", &encoding.audio_sample_rate.to_string()]);
    push(&["-ac", &encoding.audio_channels.to_string()]);
    push(&["-b:a", &encoding.audio_bitrate]);
    push(&["-movflags", "+faststart"]);

    push(&["-f", "hls", "-hls_time", &seg]);
    push(&["-hls_playlist_type", "vod", "-hls_list_size", "0"]);
    push(&["-start_number", "0", "-hls_flags", "independent_segments"]);
    push(&["-hls_segment_filename", &segment_pattern.to_string_lossy()]);
    push(&[&manifest.to_string_lossy()]);

    args
}

#[async_trait]
impl Segmenter for FfmpegSegmenter {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn segment(
        &self,
        input: &Path,
        output_dir: &Path,
        options: &ProcessingOptions,
        duration_hint: Option<f64>,
        cancel: &CancellationToken,
    ) -> vf_core::Result<SegmentedOutput> {
        tokio::fs::create_dir_all(output_dir).await.map_err(|e| {
            TranscodeFailure::Io(format!("creating {}: {e}", output_dir.display()))
        })?;

        let preset = QualityPreset::for_tier(options.quality_tier);
        tracing::info!(
            input = %input.display(),
            tier = %options.quality_tier,
            crf = preset.crf,
            segment_secs = options.segment_duration_secs,
            "HLS encode starting"
        );

        let mut cmd = ToolCommand::new(self.ffmpeg_path.clone());
        cmd.args(build_args(input, output_dir, options, &self.encoding));
        cmd.timeout(self.timeout);

        let mut parser = ProgressParser::new(duration_hint);
        let on_progress = self.on_progress.clone();
        cmd.execute_with_stderr_callback(
            |line| {
                if let Some(progress) = parser.feed(line) {
                    tracing::debug!(
                        pct = ?progress.pct,
                        out_time = ?progress.out_time_secs,
                        speed = ?progress.speed,
                        "encode progress"
                    );
                    if let Some(cb) = &on_progress {
                        cb(&progress);
                    }
                }
            },
            Some(cancel.clone()),
        )
        .await
        .map_err(TranscodeFailure::from)?;

        let output = SegmentedOutput::collect(output_dir)?;
        tracing::info!(segments = output.segments.len(), "HLS encode finished");
        Ok(output)
    }
}
