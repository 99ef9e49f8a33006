//! Uploading a finished job.
//!
//! Upload order: the original, then every segment, then the rewritten
//! playlist. The playlist only goes up once all of its segments are stored,
//! so a published playlist never points at a missing object.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use vf_av::{SegmentFile, SegmentNaming, SegmentedOutput};
use vf_core::{Artifact, Error, JobIdentity, MediaInfo, ProcessingResult};
use vf_storage::{ObjectStore, StorageLayout};

use crate::manifest::rewrite_manifest;

/// Content type used when the file name gives no hint.
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// The raw upload as received from the caller.
#[derive(Debug, Clone)]
pub struct OriginalUpload {
    /// Client-supplied file name; only its extension is used.
    pub file_name: String,
    pub body: Bytes,
}

impl OriginalUpload {
    pub fn new(file_name: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            body: body.into(),
        }
    }

    /// Guessed from the file name extension.
    pub fn artifact(&self) -> Artifact {
        let content_type = mime_guess::from_path(&self.file_name)
            .first_raw()
            .unwrap_or(FALLBACK_CONTENT_TYPE);
        Artifact::original(self.file_name.clone(), content_type)
    }
}

/// Writes a job's artifacts to an [`ObjectStore`].
#[derive(Clone)]
pub struct Publisher {
    store: Arc<dyn ObjectStore>,
    layout: StorageLayout,
    upload_concurrency: usize,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("store", &self.store.name())
            .field("layout", &self.layout)
            .field("upload_concurrency", &self.upload_concurrency)
            .finish()
    }
}

impl Publisher {
    pub fn new(store: Arc<dyn ObjectStore>, layout: StorageLayout) -> Self {
        Self {
            store,
            layout,
            upload_concurrency: 4,
        }
    }

    /// Segment uploads in flight at once. Zero is treated as one.
    #[must_use]
    pub fn with_upload_concurrency(mut self, n: usize) -> Self {
        self.upload_concurrency = n.max(1);
        self
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Upload everything for one job and describe where it landed.
    pub async fn publish(
        &self,
        identity: &JobIdentity,
        original: OriginalUpload,
        segmented: &SegmentedOutput,
        media: &MediaInfo,
    ) -> vf_core::Result<ProcessingResult> {
        let original_key = self.layout.original_key(identity);
        let artifact = original.artifact();
        self.put(&original_key, original.body, &artifact).await?;
        tracing::debug!(key = %original_key, content_type = %artifact.content_type, "original stored");

        let segment_public_paths = self.upload_segments(identity, &segmented.segments).await?;

        let manifest_key = self.layout.hls_key(identity, SegmentNaming::MANIFEST_NAME);
        let manifest_text = tokio::fs::read_to_string(&segmented.manifest_path)
            .await
            .map_err(|e| Error::publish(&manifest_key, format!("failed to read playlist: {e}")))?;

        let by_index: BTreeMap<u32, String> = segmented
            .segments
            .iter()
            .map(|s| s.index)
            .zip(segment_public_paths.iter().cloned())
            .collect();
        let rewritten = rewrite_manifest(&manifest_text, &manifest_key, &by_index)?;

        let manifest = Artifact::manifest(SegmentNaming::MANIFEST_NAME);
        self.put(&manifest_key, Bytes::from(rewritten), &manifest)
            .await?;

        tracing::info!(
            video_id = %identity.video_id,
            segments = segment_public_paths.len(),
            manifest = %manifest_key,
            "published"
        );

        Ok(ProcessingResult {
            video_id: identity.video_id.clone(),
            owner_key: identity.owner_key.clone(),
            original_storage_key: original_key,
            manifest_storage_key_prefix: self.layout.hls_prefix(identity),
            manifest_public_path: self.layout.public_path(&manifest_key),
            manifest_storage_key: manifest_key,
            segment_public_paths,
            duration_secs: media.duration_secs,
            width: media.width,
            height: media.height,
        })
    }

    /// Upload segments with bounded concurrency. The returned public paths
    /// are in the same order as `segments`; the first failure aborts the rest.
    async fn upload_segments(
        &self,
        identity: &JobIdentity,
        segments: &[SegmentFile],
    ) -> vf_core::Result<Vec<String>> {
        stream::iter(segments)
            .map(|segment| async move {
                let key = self.layout.hls_key(identity, &segment.name);
                let body = tokio::fs::read(&segment.path).await.map_err(|e| {
                    Error::publish(&key, format!("failed to read {}: {e}", segment.name))
                })?;
                let artifact = Artifact::segment(&segment.name);
                self.put(&key, Bytes::from(body), &artifact).await?;
                Ok::<_, Error>(self.layout.public_path(&key))
            })
            .buffered(self.upload_concurrency)
            .try_collect()
            .await
    }

    async fn put(&self, key: &str, body: Bytes, artifact: &Artifact) -> vf_core::Result<()> {
        tracing::trace!(key, kind = %artifact.kind, name = %artifact.relative_name, "upload");
        self.store
            .put(key, body, &artifact.content_type)
            .await
            .map_err(|e| Error::publish(key, e))
    }
}
