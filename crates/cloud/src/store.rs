//! S3-backed artifact store.
//!
//! One bucket holds every mirrored PDF/XML. Credentials are static;
//! the endpoint can be overridden for S3-compatible providers.

use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use crate::error::StorageError;

/// Connection settings for the artifact bucket.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub bucket: String,
    /// Override for S3-compatible endpoints; `None` uses AWS proper.
    pub endpoint: Option<String>,
}

/// Handle on the artifact bucket.
#[derive(Clone)]
pub struct ObjectStore {
    client: Client,
    bucket: String,
}

impl ObjectStore {
    /// Build a store from static credentials.
    pub async fn connect(config: StoreConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key,
            config.secret_key,
            None,
            None,
            "nfse_static",
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials);

        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let shared = loader.load().await;
        let s3_config = aws_sdk_s3::Config::from(&shared);

        Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket,
        }
    }

    /// Every key under a prefix, following continuation tokens until the
    /// listing is exhausted.
    pub async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);
            if let Some(t) = token.take() {
                req = req.continuation_token(t);
            }
            let resp = req.send().await.map_err(|e| {
                StorageError::operation("list_objects_v2", prefix, DisplayErrorContext(&e))
            })?;

            if let Some(contents) = resp.contents {
                for obj in contents {
                    if let Some(key) = obj.key {
                        keys.push(key);
                    }
                }
            }

            if resp.is_truncated.unwrap_or(false) {
                token = resp.next_continuation_token;
                if token.is_none() {
                    break;
                }
            } else {
                break;
            }
        }
        tracing::debug!(prefix, total = keys.len(), "listed bucket keys");
        Ok(keys)
    }

    /// Whether an object exists. Not-found is normalized to `false`.
    pub async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let resp = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;
        match resp {
            Ok(_) => Ok(true),
            Err(e) => {
                let msg = DisplayErrorContext(&e).to_string();
                if msg.contains("NotFound") || msg.contains("NoSuchKey") {
                    return Ok(false);
                }
                Err(StorageError::operation("head_object", key, msg))
            }
        }
    }

    /// Upload one artifact.
    pub async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| {
                StorageError::operation("put_object", key, DisplayErrorContext(&e))
            })?;
        Ok(())
    }

    /// Presign a GET for one artifact, valid for `expiry`.
    pub async fn presign_get(&self, key: &str, expiry: Duration) -> Result<String, StorageError> {
        let presigning = PresigningConfig::expires_in(expiry)
            .map_err(|e| StorageError::operation("presign", key, e))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| {
                StorageError::operation("presign", key, DisplayErrorContext(&e))
            })?;
        Ok(request.uri().to_string())
    }
}
