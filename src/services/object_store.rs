//! Object store client: a thin adapter over an S3-compatible endpoint.
//!
//! Buckets are per-country; object keys are `{deployment_id}/{data_type}/{filename}`.
//! The trait exists so the upload pipeline can be exercised against an
//! in-memory store in tests. All failures surface as [`StoreError`] with the
//! underlying cause attached; no retries beyond what the SDK does by default.

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::S3Settings;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object `{key}` not found in bucket `{bucket}`")]
    NotFound { bucket: String, key: String },
    #[error("bucket `{0}` already exists")]
    BucketAlreadyExists(String),
    #[error("object store request failed: {0:#}")]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Minimal object store operations the gateway needs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> StoreResult<()>;

    /// Head-style existence probe. A missing bucket reads as "not there".
    async fn exists(&self, bucket: &str, key: &str) -> StoreResult<bool>;

    async fn list(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<String>>;

    /// Time-limited single-object PUT URL; transfers no bytes itself.
    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StoreResult<String>;

    async fn create_bucket(&self, bucket: &str) -> StoreResult<()>;

    async fn get(&self, bucket: &str, key: &str) -> StoreResult<Bytes>;
}

/// `ObjectStore` backed by the AWS SDK.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: S3Client,
}

impl S3ObjectStore {
    /// Build a client from the ambient AWS environment plus gateway settings.
    /// A custom endpoint and path-style addressing cover MinIO/LocalStack.
    pub async fn new(settings: &S3Settings) -> Self {
        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(settings.region.clone()))
            .load()
            .await;

        let mut builder = S3ConfigBuilder::from(&aws_config);
        if let Some(ref endpoint_url) = settings.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }
        if settings.force_path_style {
            builder = builder.force_path_style(true);
        }

        let client = S3Client::from_conf(builder.build());
        info!(region = %settings.region, "object store client initialized");
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> StoreResult<()> {
        debug!(bucket, key, size_bytes = bytes.len(), "putting object");
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|err| StoreError::Backend(err.into()))?;
        Ok(())
    }

    async fn exists(&self, bucket: &str, key: &str) -> StoreResult<bool> {
        match self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                if err
                    .as_service_error()
                    .map(|e| e.is_not_found())
                    .unwrap_or(false)
                {
                    Ok(false)
                } else {
                    Err(StoreError::Backend(err.into()))
                }
            }
        }
    }

    async fn list(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<String>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|err| StoreError::Backend(err.into()))?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(String::from)),
            );
        }
        Ok(keys)
    }

    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StoreResult<String> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|err| StoreError::Backend(err.into()))?;

        let presigned = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|err| StoreError::Backend(err.into()))?;

        Ok(presigned.uri().to_string())
    }

    async fn create_bucket(&self, bucket: &str) -> StoreResult<()> {
        match self.client.create_bucket().bucket(bucket).send().await {
            Ok(_) => {
                info!(bucket, "bucket created");
                Ok(())
            }
            Err(err) => {
                let conflict = err
                    .as_service_error()
                    .map(|e| e.is_bucket_already_exists() || e.is_bucket_already_owned_by_you())
                    .unwrap_or(false);
                if conflict {
                    Err(StoreError::BucketAlreadyExists(bucket.to_string()))
                } else {
                    Err(StoreError::Backend(err.into()))
                }
            }
        }
    }

    async fn get(&self, bucket: &str, key: &str) -> StoreResult<Bytes> {
        let resp = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(resp) => resp,
            Err(err) => {
                let missing = err
                    .as_service_error()
                    .map(|e| e.is_no_such_key())
                    .unwrap_or(false);
                return Err(if missing {
                    StoreError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    StoreError::Backend(err.into())
                });
            }
        };

        let data = resp
            .body
            .collect()
            .await
            .map_err(|err| StoreError::Backend(err.into()))?;
        Ok(data.into_bytes())
    }
}

/// In-memory store used by pipeline and handler tests.
#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MemoryStore {
        objects: Mutex<BTreeMap<(String, String), (Bytes, String)>>,
        buckets: Mutex<Vec<String>>,
        /// Puts whose key starts with any of these prefixes fail. Lets tests
        /// break the audit-log write without touching media writes.
        pub fail_put_prefixes: Mutex<Vec<String>>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
            self.objects
                .lock()
                .unwrap()
                .get(&(bucket.to_string(), key.to_string()))
                .map(|(bytes, _)| bytes.clone())
        }

        pub fn object_count(&self) -> usize {
            self.objects.lock().unwrap().len()
        }

        pub fn insert(&self, bucket: &str, key: &str, bytes: impl Into<Bytes>) {
            self.objects.lock().unwrap().insert(
                (bucket.to_string(), key.to_string()),
                (bytes.into(), "application/octet-stream".to_string()),
            );
        }

        pub fn fail_puts_under(&self, prefix: &str) {
            self.fail_put_prefixes
                .lock()
                .unwrap()
                .push(prefix.to_string());
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn put(
            &self,
            bucket: &str,
            key: &str,
            bytes: Bytes,
            content_type: &str,
        ) -> StoreResult<()> {
            let blocked = self
                .fail_put_prefixes
                .lock()
                .unwrap()
                .iter()
                .any(|p| key.starts_with(p.as_str()));
            if blocked {
                return Err(StoreError::Backend(anyhow::anyhow!(
                    "injected put failure for `{key}`"
                )));
            }
            self.objects.lock().unwrap().insert(
                (bucket.to_string(), key.to_string()),
                (bytes, content_type.to_string()),
            );
            Ok(())
        }

        async fn exists(&self, bucket: &str, key: &str) -> StoreResult<bool> {
            Ok(self
                .objects
                .lock()
                .unwrap()
                .contains_key(&(bucket.to_string(), key.to_string())))
        }

        async fn list(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<String>> {
            Ok(self
                .objects
                .lock()
                .unwrap()
                .keys()
                .filter(|(b, k)| b == bucket && k.starts_with(prefix))
                .map(|(_, k)| k.clone())
                .collect())
        }

        async fn presign_put(
            &self,
            bucket: &str,
            key: &str,
            _content_type: &str,
            expires_in: Duration,
        ) -> StoreResult<String> {
            Ok(format!(
                "https://{bucket}.example.test/{key}?X-Amz-Expires={}",
                expires_in.as_secs()
            ))
        }

        async fn create_bucket(&self, bucket: &str) -> StoreResult<()> {
            let mut buckets = self.buckets.lock().unwrap();
            if buckets.iter().any(|b| b == bucket) {
                return Err(StoreError::BucketAlreadyExists(bucket.to_string()));
            }
            buckets.push(bucket.to_string());
            Ok(())
        }

        async fn get(&self, bucket: &str, key: &str) -> StoreResult<Bytes> {
            self.object(bucket, key).ok_or_else(|| StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
        }
    }
}
