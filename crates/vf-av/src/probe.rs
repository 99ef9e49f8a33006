//! Media probing.
//!
//! [`FfprobeProber`] shells out to
//! `ffprobe -v quiet -print_format json -show_format -show_streams` and maps
//! the JSON report into [`MediaInfo`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use vf_core::{MediaInfo, ProbeFailure};

use crate::command::ToolCommand;

/// Default probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Extracts duration and dimensions from a media file.
#[async_trait]
pub trait MediaProber: Send + Sync {
    fn name(&self) -> &'static str;

    async fn probe(&self, path: &Path, cancel: &CancellationToken) -> vf_core::Result<MediaInfo>;
}

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self {
            ffprobe_path,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Create a prober that finds ffprobe on `PATH`.
    pub fn from_path() -> Option<Self> {
        which::which("ffprobe").ok().map(Self::new)
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn probe(&self, path: &Path, cancel: &CancellationToken) -> vf_core::Result<MediaInfo> {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ]);
        cmd.arg(path.to_string_lossy());
        cmd.timeout(self.timeout);

        let output = cmd
            .execute_with_stderr_callback(|_| {}, Some(cancel.clone()))
            .await
            .map_err(ProbeFailure::from)?;

        let info = parse_report(&output.stdout)?;
        tracing::debug!(
            path = %path.display(),
            duration = info.duration_secs,
            width = info.width,
            height = info.height,
            "probed"
        );
        Ok(info)
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    #[serde(default)]
    disposition: FfprobeDisposition,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    attached_pic: u8,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Map an ffprobe JSON report to [`MediaInfo`].
///
/// The first real video stream supplies the dimensions; cover art
/// (`attached_pic`) does not count. Duration comes from the container and
/// falls back to the video stream, then to zero.
pub fn parse_report(json: &str) -> Result<MediaInfo, ProbeFailure> {
    let report: FfprobeOutput =
        serde_json::from_str(json).map_err(|e| ProbeFailure::Parse(e.to_string()))?;

    let video = report
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video") && s.disposition.attached_pic == 0)
        .ok_or_else(|| {
            ProbeFailure::NoVideoStream(format!(
                "{} stream(s), none of them video",
                report.streams.len()
            ))
        })?;

    let has_audio = report
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let format_duration = report
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(parse_seconds);
    let duration_secs = format_duration
        .or_else(|| video.duration.as_deref().and_then(parse_seconds))
        .unwrap_or(0.0);

    let bitrate = report
        .format
        .as_ref()
        .and_then(|f| f.bit_rate.as_deref())
        .and_then(|s| s.parse::<u64>().ok());

    Ok(MediaInfo {
        duration_secs,
        width: video.width.unwrap_or(0),
        height: video.height.unwrap_or(0),
        bitrate,
        video_codec: video.codec_name.clone(),
        has_audio,
    })
}

/// Parse a decimal seconds string, rejecting NaN and clamping negatives to 0.
fn parse_seconds(s: &str) -> Option<f64> {
    let v = s.trim().parse::<f64>().ok()?;
    if v.is_finite() {
        Some(v.max(0.0))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080,
             "duration": "19.980000", "disposition": {"default": 1, "attached_pic": 0}},
            {"index": 1, "codec_type": "audio", "codec_name": "aac", "channels": 2}
        ],
        "format": {"filename": "in.mp4", "duration": "20.000000", "bit_rate": "1534210", "size": "3835525"}
    }"#;

    #[test]
    fn parses_typical_report() {
        let info = parse_report(SAMPLE).unwrap();
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
        assert!((info.duration_secs - 20.0).abs() < 1e-9);
        assert_eq!(info.bitrate, Some(1_534_210));
        assert_eq!(info.video_codec.as_deref(), Some("h264"));
        assert!(info.has_audio);
    }

    #[test]
    fn audio_only_is_no_video_stream() {
        let json = r#"{"streams":[{"codec_type":"audio","codec_name":"mp3"}],"format":{"duration":"3.0"}}"#;
        assert!(matches!(
            parse_report(json),
            Err(ProbeFailure::NoVideoStream(_))
        ));
    }

    #[test]
    fn cover_art_is_not_video() {
        let json = r#"{
            "streams":[
                {"codec_type":"video","codec_name":"mjpeg","width":600,"height":600,"disposition":{"attached_pic":1}},
                {"codec_type":"audio","codec_name":"flac"}
            ],
            "format":{"duration":"200.0"}
        }"#;
        assert!(matches!(
            parse_report(json),
            Err(ProbeFailure::NoVideoStream(_))
        ));
    }

    #[test]
    fn skips_cover_art_before_real_video() {
        let json = r#"{
            "streams":[
                {"codec_type":"video","codec_name":"png","width":300,"height":300,"disposition":{"attached_pic":1}},
                {"codec_type":"video","codec_name":"hevc","width":1280,"height":720}
            ],
            "format":{"duration":"5.5"}
        }"#;
        let info = parse_report(json).unwrap();
        assert_eq!((info.width, info.height), (1280, 720));
        assert_eq!(info.video_codec.as_deref(), Some("hevc"));
        assert!(!info.has_audio);
    }

    #[test]
    fn missing_format_duration_falls_back_to_stream() {
        let json = r#"{"streams":[{"codec_type":"video","width":640,"height":360,"duration":"7.25"}]}"#;
        let info = parse_report(json).unwrap();
        assert!((info.duration_secs - 7.25).abs() < 1e-9);
        assert_eq!(info.bitrate, None);
    }

    #[test]
    fn missing_duration_is_zero() {
        let json = r#"{"streams":[{"codec_type":"video","width":640,"height":360}],"format":{"duration":"N/A"}}"#;
        let info = parse_report(json).unwrap();
        assert_eq!(info.duration_secs, 0.0);
    }

    #[test]
    fn negative_duration_clamped() {
        assert_eq!(parse_seconds("-1.5"), Some(0.0));
        assert_eq!(parse_seconds("nan"), None);
        assert_eq!(parse_seconds(" 2.5 "), Some(2.5));
    }

    #[test]
    fn empty_stdout_is_parse_failure() {
        // `-v quiet` on an unreadable file can exit 0 with nothing printed.
        assert!(matches!(parse_report(""), Err(ProbeFailure::Parse(_))));
        assert!(matches!(parse_report("{"), Err(ProbeFailure::Parse(_))));
    }

    #[test]
    fn empty_object_has_no_video() {
        assert!(matches!(
            parse_report("{}"),
            Err(ProbeFailure::NoVideoStream(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn fake_ffprobe_end_to_end() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("ffprobe");
        std::fs::write(
            &script,
            format!("#!/bin/sh\ncat <<'EOF'\n{SAMPLE}\nEOF\n"),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let prober = FfprobeProber::new(script);
        let info = prober
            .probe(Path::new("/any/input.mp4"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(info.width, 1920);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_ffprobe_times_out() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("ffprobe");
        std::fs::write(&script, "#!/bin/sh\nsleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let prober = FfprobeProber::new(script).with_timeout(Duration::from_millis(200));
        let err = prober
            .probe(Path::new("/any/input.mp4"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, vf_core::Error::Probe(ProbeFailure::Tool(_))));
        assert!(err.is_timeout());
    }
}
