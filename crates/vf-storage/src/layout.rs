//! Storage key and public path layout.
//!
//! ```text
//! <namespace>/<owner>/originals/<video_id>
//! <namespace>/<owner>/hls/<video_id>/<file>
//! /<proxy_prefix>/<key>
//! ```

use vf_core::config::StorageConfig;
use vf_core::JobIdentity;

const ORIGINALS: &str = "originals";
const HLS: &str = "hls";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    namespace: String,
    proxy_prefix: String,
}

impl StorageLayout {
    /// Surrounding slashes are stripped from both parts.
    pub fn new(namespace: &str, proxy_prefix: &str) -> Self {
        Self {
            namespace: namespace.trim_matches('/').to_string(),
            proxy_prefix: proxy_prefix.trim_matches('/').to_string(),
        }
    }

    pub fn from_config(cfg: &StorageConfig) -> Self {
        Self::new(&cfg.namespace, &cfg.proxy_prefix)
    }

    pub fn original_key(&self, identity: &JobIdentity) -> String {
        format!(
            "{}/{}/{ORIGINALS}/{}",
            self.namespace, identity.owner_key, identity.video_id
        )
    }

    /// Prefix shared by the manifest and every segment of a job.
    pub fn hls_prefix(&self, identity: &JobIdentity) -> String {
        format!(
            "{}/{}/{HLS}/{}",
            self.namespace, identity.owner_key, identity.video_id
        )
    }

    pub fn hls_key(&self, identity: &JobIdentity, file_name: &str) -> String {
        format!("{}/{file_name}", self.hls_prefix(identity))
    }

    /// Path under which the application proxy serves `key`.
    pub fn public_path(&self, key: &str) -> String {
        format!("/{}/{}", self.proxy_prefix, key.trim_start_matches('/'))
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self::from_config(&StorageConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vf_core::{OwnerKey, VideoId};

    fn identity() -> JobIdentity {
        JobIdentity::new("vid42".parse::<VideoId>().unwrap(), OwnerKey::sanitize("Alice Smith"))
    }

    #[test]
    fn keys_follow_layout() {
        let layout = StorageLayout::new("uploads", "media");
        let id = identity();
        assert_eq!(layout.original_key(&id), "uploads/alice-smith/originals/vid42");
        assert_eq!(layout.hls_prefix(&id), "uploads/alice-smith/hls/vid42");
        assert_eq!(
            layout.hls_key(&id, "chunk3.ts"),
            "uploads/alice-smith/hls/vid42/chunk3.ts"
        );
    }

    #[test]
    fn public_path_prefixes_proxy() {
        let layout = StorageLayout::new("/uploads/", "/media/");
        let key = layout.hls_key(&identity(), "playlist.m3u8");
        assert_eq!(
            layout.public_path(&key),
            "/media/uploads/alice-smith/hls/vid42/playlist.m3u8"
        );
    }

    #[test]
    fn default_matches_config_defaults() {
        let layout = StorageLayout::default();
        assert_eq!(layout, StorageLayout::new("uploads", "media"));
    }
}
