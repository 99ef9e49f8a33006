//! Job identity: the video id and the sanitized owner key.
//!
//! Both values end up as path segments in the scratch directory name and in
//! every storage key, so they are validated or normalised on construction and
//! immutable afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

/// Maximum length of a caller-supplied video id.
const MAX_VIDEO_ID_LEN: usize = 64;

/// Owner key used when a guest name sanitizes to nothing.
const FALLBACK_OWNER: &str = "guest";

/// Opaque unique token naming one ingestion job and its stored objects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VideoId(String);

impl VideoId {
    /// Generate a new random id (UUID v4, simple form).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VideoId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.len() > MAX_VIDEO_ID_LEN {
            return Err(Error::Validation(format!(
                "video id must be 1-{MAX_VIDEO_ID_LEN} characters, got {}",
                s.len()
            )));
        }
        if let Some(bad) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(Error::Validation(format!(
                "video id contains invalid character {bad:?}"
            )));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for VideoId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VideoId> for String {
    fn from(id: VideoId) -> Self {
        id.0
    }
}

/// Storage-path-safe identifier derived from a guest's display name.
///
/// Lowercase ASCII words joined by single hyphens, never starting or ending
/// with a hyphen. [`OwnerKey::sanitize`] is deterministic and idempotent, and
/// deserialized values pass through it too.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct OwnerKey(String);

impl OwnerKey {
    /// Normalise a raw guest name into an owner key.
    ///
    /// Non-ASCII letters are transliterated (`"Zoë"` becomes `"zoe"`), runs of
    /// anything that is not an ASCII letter or digit collapse to one hyphen.
    /// Names with no usable characters map to `"guest"`.
    pub fn sanitize(raw: &str) -> Self {
        let slug = slug::slugify(raw);
        if slug.is_empty() {
            Self(FALLBACK_OWNER.to_string())
        } else {
            Self(slug)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for OwnerKey {
    fn from(raw: String) -> Self {
        Self::sanitize(&raw)
    }
}

impl From<OwnerKey> for String {
    fn from(key: OwnerKey) -> Self {
        key.0
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one ingestion job. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobIdentity {
    pub video_id: VideoId,
    pub owner_key: OwnerKey,
}

impl JobIdentity {
    pub fn new(video_id: VideoId, owner_key: OwnerKey) -> Self {
        Self {
            video_id,
            owner_key,
        }
    }

    /// Identity with a freshly generated video id.
    pub fn for_guest(guest_name: &str) -> Self {
        Self::new(VideoId::generate(), OwnerKey::sanitize(guest_name))
    }
}
