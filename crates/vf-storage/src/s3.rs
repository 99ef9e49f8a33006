//! S3 (or S3-compatible) object store.

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Builder, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use vf_core::config::S3Config;

use crate::store::{validate_key, ObjectStore, StoreError};

const ACCESS_KEY_ENV: &str = "AWS_ACCESS_KEY_ID";
const SECRET_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";

#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from settings. Credentials come from the config or,
    /// when both are unset there, from `AWS_ACCESS_KEY_ID` and
    /// `AWS_SECRET_ACCESS_KEY`.
    pub fn from_config(cfg: &S3Config) -> Result<Self, StoreError> {
        if cfg.bucket.is_empty() {
            return Err(StoreError::Config("storage.s3.bucket is empty".into()));
        }

        let (access_key, secret_key) = resolve_credentials(
            cfg,
            std::env::var(ACCESS_KEY_ENV).ok(),
            std::env::var(SECRET_KEY_ENV).ok(),
        )?;
        let credentials = Credentials::new(access_key, secret_key, None, None, "vodforge-config");

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(cfg.force_path_style);
        if let Some(endpoint) = &cfg.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        tracing::info!(
            bucket = %cfg.bucket,
            region = %cfg.region,
            endpoint = cfg.endpoint.as_deref().unwrap_or("aws"),
            "S3 object store configured"
        );

        Ok(Self::new(Client::from_conf(builder.build()), cfg.bucket.clone()))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn resolve_credentials(
    cfg: &S3Config,
    env_access: Option<String>,
    env_secret: Option<String>,
) -> Result<(String, String), StoreError> {
    match (&cfg.access_key, &cfg.secret_key) {
        (Some(a), Some(s)) => Ok((a.clone(), s.clone())),
        (None, None) => match (env_access, env_secret) {
            (Some(a), Some(s)) => Ok((a, s)),
            _ => Err(StoreError::Config(format!(
                "no S3 credentials: set storage.s3.access_key/secret_key or {ACCESS_KEY_ENV}/{SECRET_KEY_ENV}"
            ))),
        },
        _ => Err(StoreError::Config(
            "storage.s3.access_key and storage.s3.secret_key must be set together".into(),
        )),
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        let len = body.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StoreError::Backend(DisplayErrorContext(&e).to_string()))?;

        tracing::debug!(bucket = %self.bucket, key, bytes = len, "uploaded object");
        Ok(())
    }
}
