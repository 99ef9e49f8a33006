//! CLI end-to-end tests
//!
//! Tests for the vodforge command-line interface. Jobs run against small
//! shell scripts standing in for ffprobe/ffmpeg, configured through a JSON
//! config file, so no media tools need to be installed.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{tempdir, TempDir};

/// Get a command for the vodforge binary
#[allow(deprecated)]
fn vodforge_cmd() -> Command {
    Command::cargo_bin("vodforge").unwrap()
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = vodforge_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = vodforge_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("vodforge"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_flag() {
    let mut cmd = vodforge_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("vodforge"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = vodforge_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "vodforge {}",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_cli_check_tools_command() {
    let mut cmd = vodforge_cmd();
    cmd.arg("check-tools").assert().success().stdout(
        predicate::str::contains("ffmpeg").and(predicate::str::contains("ffprobe")),
    );
}

#[test]
fn test_cli_process_help() {
    let mut cmd = vodforge_cmd();
    cmd.args(["process", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--quality"))
        .stdout(predicate::str::contains("--segment-duration"));
}

#[test]
fn test_cli_validate_defaults() {
    let mut cmd = vodforge_cmd();
    cmd.arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("using defaults"))
        .stdout(predicate::str::contains("Configuration is valid"));
}

#[test]
fn test_cli_validate_config_file() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    fs::write(
        &config_path,
        r#"{"storage": {"backend": "s3", "s3": {"bucket": ""}}, "timeouts": {"probe_secs": 5}}"#,
    )
    .unwrap();

    let mut cmd = vodforge_cmd();
    cmd.arg("validate")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("warning"))
        .stdout(predicate::str::contains("bucket is empty"))
        .stdout(predicate::str::contains("probe 5s"));
}

#[test]
fn test_cli_validate_malformed_config_fails() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    fs::write(&config_path, "{ not json").unwrap();

    let mut cmd = vodforge_cmd();
    cmd.arg("validate")
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("config parse error"));
}

#[test]
fn test_cli_validate_missing_config_fails() {
    let mut cmd = vodforge_cmd();
    cmd.args(["validate", "/nonexistent/vodforge.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_probe_nonexistent_file() {
    let mut cmd = vodforge_cmd();
    cmd.args(["probe", "/nonexistent/file.mkv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_process_nonexistent_file() {
    let mut cmd = vodforge_cmd();
    cmd.args(["process", "/nonexistent/file.mp4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_process_rejects_unknown_quality() {
    let mut cmd = vodforge_cmd();
    cmd.args(["process", "clip.mp4", "--quality", "ultra"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ultra"));
}

#[test]
fn test_cli_process_rejects_zero_segment_duration() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("clip.mp4");
    fs::write(&input, b"data").unwrap();

    let mut cmd = vodforge_cmd();
    cmd.arg("process")
        .arg(&input)
        .args(["--segment-duration", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("segment"));
}

// ---------------------------------------------------------------------------
// Jobs with stand-in tools
// ---------------------------------------------------------------------------

#[cfg(unix)]
mod with_fake_tools {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    const FFPROBE: &str = r#"cat <<'EOF'
{"streams":[{"codec_type":"video","codec_name":"h264","width":640,"height":360},{"codec_type":"audio","codec_name":"aac"}],"format":{"duration":"12.5","bit_rate":"750000"}}
EOF"#;

    const FFMPEG: &str = r#"for last; do :; done
dir=$(dirname "$last")
printf '#EXTM3U\n#EXT-X-VERSION:6\n#EXT-X-TARGETDURATION:6\n#EXT-X-PLAYLIST-TYPE:VOD\n' > "$last"
for i in 0 1 2; do
  echo "segment $i" > "$dir/chunk$i.ts"
  printf '#EXTINF:4.166667,\nchunk%s.ts\n' "$i" >> "$last"
done
echo '#EXT-X-ENDLIST' >> "$last""#;

    struct Env {
        dir: TempDir,
        config: PathBuf,
    }

    impl Env {
        fn objects(&self) -> PathBuf {
            self.dir.path().join("objects")
        }

        fn jobs(&self) -> PathBuf {
            self.dir.path().join("jobs")
        }

        fn input(&self) -> PathBuf {
            let path = self.dir.path().join("My Clip.mp4");
            fs::write(&path, b"pretend this is h264").unwrap();
            path
        }
    }

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn setup(ffprobe_body: &str) -> Env {
        let dir = tempdir().unwrap();
        let ffprobe = script(dir.path(), "ffprobe", ffprobe_body);
        let ffmpeg = script(dir.path(), "ffmpeg", FFMPEG);
        fs::create_dir(dir.path().join("jobs")).unwrap();

        let config = serde_json::json!({
            "tools": { "ffmpeg_path": ffmpeg, "ffprobe_path": ffprobe },
            "storage": { "backend": "fs", "fs_root": dir.path().join("objects") },
            "workspace": { "root": dir.path().join("jobs") },
        });
        let config_path = dir.path().join("config.json");
        fs::write(&config_path, config.to_string()).unwrap();

        Env {
            dir,
            config: config_path,
        }
    }

    #[test]
    fn test_cli_process_publishes_to_fs_store() {
        let env = setup(FFPROBE);

        let output = vodforge_cmd()
            .arg("--config")
            .arg(&env.config)
            .arg("process")
            .arg(env.input())
            .args(["--owner", "Ana María", "--video-id", "clip42", "--json"])
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        );

        let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(result["video_id"], "clip42");
        assert_eq!(result["owner_key"], "ana-maria");
        assert_eq!(result["width"], 640);
        assert_eq!(
            result["manifest_public_path"],
            "/media/uploads/ana-maria/hls/clip42/playlist.m3u8"
        );
        assert_eq!(result["segment_public_paths"].as_array().unwrap().len(), 3);

        let hls = env.objects().join("uploads/ana-maria/hls/clip42");
        let playlist = fs::read_to_string(hls.join("playlist.m3u8")).unwrap();
        assert!(playlist.contains("/media/uploads/ana-maria/hls/clip42/chunk2.ts"));
        assert!(!playlist.lines().any(|l| l == "chunk0.ts"));
        for i in 0..3 {
            assert!(hls.join(format!("chunk{i}.ts")).is_file());
        }

        let original_key = result["original_storage_key"].as_str().unwrap();
        assert_eq!(
            fs::read(env.objects().join(original_key)).unwrap(),
            b"pretend this is h264"
        );

        assert_eq!(fs::read_dir(env.jobs()).unwrap().count(), 0);
    }

    #[test]
    fn test_cli_process_human_output() {
        let env = setup(FFPROBE);

        vodforge_cmd()
            .arg("--config")
            .arg(&env.config)
            .arg("process")
            .arg(env.input())
            .args(["--quality", "high", "--segment-duration", "4"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Owner:    guest"))
            .stdout(predicate::str::contains("640x360"))
            .stdout(predicate::str::contains("Segments: 3"));
    }

    #[test]
    fn test_cli_process_probe_failure_exits_nonzero() {
        let env = setup("echo 'Invalid data found when processing input' >&2; exit 1");

        vodforge_cmd()
            .arg("--config")
            .arg(&env.config)
            .arg("process")
            .arg(env.input())
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid data found"));

        assert!(!env.objects().exists());
        assert_eq!(fs::read_dir(env.jobs()).unwrap().count(), 0);
    }

    #[test]
    fn test_cli_probe_json() {
        let env = setup(FFPROBE);

        let output = vodforge_cmd()
            .arg("--config")
            .arg(&env.config)
            .arg("probe")
            .arg(env.input())
            .arg("--json")
            .output()
            .unwrap();
        assert!(output.status.success());

        let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(info["duration_secs"], 12.5);
        assert_eq!(info["height"], 360);
        assert_eq!(info["has_audio"], true);
    }

    #[test]
    fn test_cli_check_tools_uses_configured_paths() {
        let env = setup(FFPROBE);

        vodforge_cmd()
            .arg("--config")
            .arg(&env.config)
            .arg("check-tools")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                env.dir.path().join("ffprobe").display().to_string(),
            ));
    }
}
