//! Job orchestration: one upload in, one [`ProcessingResult`] out.
//!
//! A job walks `Idle -> Probing -> Transcoding -> Publishing -> Cleanup ->
//! Done`. Any failure jumps to `Cleanup` and ends in `Failed`. Cleanup runs
//! exactly once per job whatever the outcome.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use vf_av::{FfmpegSegmenter, FfprobeProber, MediaProber, Segmenter, ToolRegistry, Workspace};
use vf_core::config::Config;
use vf_core::{
    Error, JobIdentity, JobStage, ProbeFailure, ProcessingOptions, ProcessingResult, VideoId,
};
use vf_storage::{ObjectStore, StorageLayout};

use crate::publish::{OriginalUpload, Publisher};

/// Longest file extension carried over to the scratch input file.
const MAX_EXTENSION_LEN: usize = 10;

/// Where a job is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Idle,
    Probing,
    Transcoding,
    Publishing,
    Cleanup,
    Done,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Probing => "probing",
            Self::Transcoding => "transcoding",
            Self::Publishing => "publishing",
            Self::Cleanup => "cleanup",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Receives every state transition of every job. Must not block.
pub trait JobObserver: Send + Sync {
    fn on_transition(&self, video_id: &VideoId, from: JobState, to: JobState);
}

/// Tracks the current state of one job and fans transitions out.
struct Transitions<'a> {
    video_id: &'a VideoId,
    state: JobState,
    observer: Option<&'a dyn JobObserver>,
}

impl<'a> Transitions<'a> {
    fn new(video_id: &'a VideoId, observer: Option<&'a dyn JobObserver>) -> Self {
        Self {
            video_id,
            state: JobState::Idle,
            observer,
        }
    }

    fn advance(&mut self, to: JobState) {
        let from = self.state;
        tracing::debug!(video_id = %self.video_id, %from, %to, "job state");
        if let Some(observer) = self.observer {
            observer.on_transition(self.video_id, from, to);
        }
        self.state = to;
    }
}

/// Runs jobs end to end: workspace, probe, segment, publish, cleanup.
#[derive(Clone)]
pub struct JobOrchestrator {
    prober: Arc<dyn MediaProber>,
    segmenter: Arc<dyn Segmenter>,
    publisher: Publisher,
    workspace_root: PathBuf,
    observer: Option<Arc<dyn JobObserver>>,
}

impl fmt::Debug for JobOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobOrchestrator")
            .field("prober", &self.prober.name())
            .field("segmenter", &self.segmenter.name())
            .field("publisher", &self.publisher)
            .field("workspace_root", &self.workspace_root)
            .finish_non_exhaustive()
    }
}

impl JobOrchestrator {
    pub fn new(
        prober: Arc<dyn MediaProber>,
        segmenter: Arc<dyn Segmenter>,
        publisher: Publisher,
        workspace_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            prober,
            segmenter,
            publisher,
            workspace_root: workspace_root.into(),
            observer: None,
        }
    }

    /// Wire up the ffprobe/ffmpeg implementations from configuration.
    pub fn from_config(
        config: &Config,
        tools: &ToolRegistry,
        store: Arc<dyn ObjectStore>,
    ) -> vf_core::Result<Self> {
        let ffprobe = tools.ffprobe().map_err(Error::Tool)?;
        let ffmpeg = tools.ffmpeg().map_err(Error::Tool)?;

        let prober = FfprobeProber::new(ffprobe.to_path_buf()).with_timeout(config.timeouts.probe());
        let segmenter = FfmpegSegmenter::new(ffmpeg.to_path_buf())
            .with_timeout(config.timeouts.transcode())
            .with_encoding(config.encoding.clone());
        let publisher = Publisher::new(store, StorageLayout::from_config(&config.storage))
            .with_upload_concurrency(config.pipeline.upload_concurrency);

        Ok(Self::new(
            Arc::new(prober),
            Arc::new(segmenter),
            publisher,
            config.workspace.root_or_temp(),
        ))
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn JobObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Process one upload. See [`process_with_cancel`](Self::process_with_cancel).
    pub async fn process(
        &self,
        identity: &JobIdentity,
        raw: Bytes,
        original_file_name: &str,
        options: &ProcessingOptions,
    ) -> vf_core::Result<ProcessingResult> {
        self.process_with_cancel(identity, raw, original_file_name, options, &CancellationToken::new())
            .await
    }

    /// Process one upload, aborting when `cancel` fires.
    ///
    /// Cancellation kills the running ffprobe/ffmpeg process or abandons the
    /// upload in progress; cleanup still runs. Errors are always
    /// [`Error::Job`] carrying the stage that failed.
    pub async fn process_with_cancel(
        &self,
        identity: &JobIdentity,
        raw: Bytes,
        original_file_name: &str,
        options: &ProcessingOptions,
        cancel: &CancellationToken,
    ) -> vf_core::Result<ProcessingResult> {
        let video_id = &identity.video_id;
        let mut states = Transitions::new(video_id, self.observer.as_deref());
        let started = Instant::now();

        tracing::info!(
            video_id = %video_id,
            owner = %identity.owner_key,
            bytes = raw.len(),
            tier = %options.quality_tier,
            "job started"
        );

        let (workspace, input) = match self.provision(video_id, &raw, original_file_name).await {
            Ok(ws) => ws,
            Err(e) => {
                states.advance(JobState::Cleanup);
                states.advance(JobState::Failed);
                tracing::warn!(video_id = %video_id, "job failed during provisioning: {e}");
                return Err(Error::job(video_id.clone(), JobStage::Provisioning, e));
            }
        };

        let outcome = self
            .run_stages(
                identity,
                &workspace,
                &input,
                OriginalUpload::new(original_file_name, raw),
                options,
                cancel,
                &mut states,
            )
            .await;

        states.advance(JobState::Cleanup);
        workspace.destroy();

        match outcome {
            Ok(result) => {
                states.advance(JobState::Done);
                tracing::info!(
                    video_id = %video_id,
                    segments = result.segment_public_paths.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "job done"
                );
                Ok(result)
            }
            Err((stage, e)) => {
                states.advance(JobState::Failed);
                tracing::warn!(video_id = %video_id, %stage, "job failed: {e}");
                Err(Error::job(video_id.clone(), stage, e))
            }
        }
    }

    /// Create the workspace and write the raw bytes into it.
    async fn provision(
        &self,
        video_id: &VideoId,
        raw: &Bytes,
        original_file_name: &str,
    ) -> vf_core::Result<(Workspace, PathBuf)> {
        let workspace = Workspace::provision(&self.workspace_root, video_id)?;
        let input = workspace.input_path(safe_extension(original_file_name));
        tokio::fs::write(&input, raw).await.map_err(|e| {
            Error::Workspace(format!("failed to write {}: {e}", input.display()))
        })?;
        Ok((workspace, input))
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_stages(
        &self,
        identity: &JobIdentity,
        workspace: &Workspace,
        input: &Path,
        original: OriginalUpload,
        options: &ProcessingOptions,
        cancel: &CancellationToken,
        states: &mut Transitions<'_>,
    ) -> Result<ProcessingResult, (JobStage, Error)> {
        states.advance(JobState::Probing);
        if original.body.is_empty() {
            return Err((
                JobStage::Probing,
                ProbeFailure::NoVideoStream("an empty upload".into()).into(),
            ));
        }
        let media = self
            .prober
            .probe(input, cancel)
            .await
            .map_err(|e| (JobStage::Probing, e))?;

        states.advance(JobState::Transcoding);
        let segmented = self
            .segmenter
            .segment(
                input,
                workspace.output_dir(),
                options,
                Some(media.duration_secs),
                cancel,
            )
            .await
            .map_err(|e| (JobStage::Transcoding, e))?;

        states.advance(JobState::Publishing);
        let prefix = self.publisher.layout().hls_prefix(identity);
        let cancelled = || Error::publish(&prefix, "job cancelled before upload finished");
        if cancel.is_cancelled() {
            return Err((JobStage::Publishing, cancelled()));
        }
        tokio::select! {
            res = self.publisher.publish(identity, original, &segmented, &media) => {
                res.map_err(|e| (JobStage::Publishing, e))
            }
            _ = cancel.cancelled() => Err((JobStage::Publishing, cancelled())),
        }
    }
}

/// Extension of the client file name if it is short and alphanumeric.
fn safe_extension(file_name: &str) -> Option<&str> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.len() <= MAX_EXTENSION_LEN && e.chars().all(|c| c.is_ascii_alphanumeric()))
}
