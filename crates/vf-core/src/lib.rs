//! vf-core: shared types, identities, errors, and configuration.
//!
//! This crate is the foundational dependency for all other vf-* crates,
//! providing the job identity types, a unified error type, the media-domain
//! types passed between pipeline stages, and application configuration.

pub mod config;
pub mod error;
pub mod ids;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, JobStage, ProbeFailure, Result, ToolFailure, TranscodeFailure};
pub use ids::*;
pub use media::*;
