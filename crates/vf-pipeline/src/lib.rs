//! # vf-pipeline
//!
//! Turns an uploaded video into a published HLS stream.
//!
//! - **[`JobOrchestrator`]** -- runs one job through workspace provisioning,
//!   probing, segmenting and publishing, always cleaning up after itself.
//! - **[`Publisher`]** -- uploads the original, the segments and the
//!   rewritten playlist to an object store.
//! - **[`rewrite_manifest`]** -- swaps segment file names in a playlist for
//!   their public proxy paths.

pub mod manifest;
pub mod orchestrator;
pub mod publish;

pub use manifest::rewrite_manifest;
pub use orchestrator::{JobObserver, JobOrchestrator, JobState};
pub use publish::{OriginalUpload, Publisher};
