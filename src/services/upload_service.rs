//! Upload pipeline: validates one submission against the deployment
//! registry, materializes media into the object store, and appends an audit
//! trail, without silently accepting partial or duplicate data.
//!
//! Per-file existence-check-then-write is not atomic: two concurrent
//! submissions racing on one key can both pass the check, and the later put
//! wins. That last-writer-wins behavior is deliberate; do not replace the
//! unconditional put without changing the documented guarantee.

use crate::models::deployment::{DataType, DeploymentRecord};
use crate::models::upload::{FileReport, LogEntry, StorageKey, UploadItem, UploadReport};
use crate::services::object_store::{ObjectStore, StoreError};
use crate::services::registry::{DeploymentRegistry, RegistryError};
use bytes::Bytes;
use flate2::read::GzDecoder;
use futures::stream::{self, StreamExt};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Hard cap on files per batch call, enforced before any store write.
pub const MAX_FILES_PER_BATCH: usize = 1000;

/// Ceiling on an archive payload, enforced before expansion.
pub const MAX_ARCHIVE_BYTES: usize = 1024 * 1024 * 1024;

/// Ceiling on unpacked archive content, summed across entries. The
/// compressed size says little about the expanded size, so expansion is
/// budgeted separately while it happens.
pub const MAX_UNPACKED_ARCHIVE_BYTES: usize = 4 * 1024 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no deployment `{deployment}` in `{country}`")]
    DeploymentNotFound { country: String, deployment: String },
    #[error("deployment `{deployment_id}` does not collect `{data_type}`")]
    UnsupportedDataType {
        deployment_id: String,
        data_type: DataType,
    },
    #[error("batch of {count} files exceeds the limit of {limit} per call")]
    TooManyFiles { count: usize, limit: usize },
    #[error("archive of {size} bytes exceeds the limit of {limit}")]
    PayloadTooLarge { size: usize, limit: usize },
    #[error("could not read archive: {0}")]
    BadArchive(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// The gateway's single state object: registry + store behind trait objects
/// so tests run against in-memory fakes.
#[derive(Clone)]
pub struct UploadService {
    registry: Arc<dyn DeploymentRegistry>,
    store: Arc<dyn ObjectStore>,
    presign_expiry: Duration,
    upload_concurrency: usize,
}

impl UploadService {
    pub fn new(
        registry: Arc<dyn DeploymentRegistry>,
        store: Arc<dyn ObjectStore>,
        presign_expiry: Duration,
        upload_concurrency: usize,
    ) -> Self {
        Self {
            registry,
            store,
            presign_expiry,
            upload_concurrency: upload_concurrency.max(1),
        }
    }

    pub fn registry(&self) -> &dyn DeploymentRegistry {
        &*self.registry
    }

    pub fn store(&self) -> &dyn ObjectStore {
        &*self.store
    }

    /// Look up the active deployment a submission names, then check it
    /// collects the submitted media category. Fails before any store call.
    pub fn resolve_deployment(
        &self,
        country: &str,
        deployment: &str,
        data_type: DataType,
    ) -> GatewayResult<DeploymentRecord> {
        let record = self.registry.resolve(country, deployment).ok_or_else(|| {
            GatewayError::DeploymentNotFound {
                country: country.to_string(),
                deployment: deployment.to_string(),
            }
        })?;

        if !record.supports(data_type) {
            return Err(GatewayError::UnsupportedDataType {
                deployment_id: record.deployment_id,
                data_type,
            });
        }
        Ok(record)
    }

    /// Store existence probe for one filename. Duplicate detection is key
    /// equality only; content is never hashed or compared.
    pub async fn check_exists(
        &self,
        deployment: &DeploymentRecord,
        data_type: DataType,
        filename: &str,
    ) -> GatewayResult<bool> {
        let key = StorageKey::for_file(deployment, data_type, filename);
        Ok(self.store.exists(&key.bucket, &key.key).await?)
    }

    /// Time-limited PUT URL so clients can push one object straight to the
    /// store without proxying bytes through the gateway.
    pub async fn presigned_upload_url(
        &self,
        deployment: &DeploymentRecord,
        data_type: DataType,
        filename: &str,
        file_type: &str,
    ) -> GatewayResult<String> {
        let key = StorageKey::for_file(deployment, data_type, filename);
        let url = self
            .store
            .presign_put(&key.bucket, &key.key, file_type, self.presign_expiry)
            .await?;
        Ok(url)
    }

    /// Upload a bounded batch. Per-file outcomes land in the report instead
    /// of aborting the batch; only whole-batch preconditions error out. An
    /// empty batch is a valid, empty report.
    pub async fn upload_files(
        &self,
        username: &str,
        deployment: &DeploymentRecord,
        data_type: DataType,
        files: Vec<UploadItem>,
    ) -> GatewayResult<UploadReport> {
        if files.len() > MAX_FILES_PER_BATCH {
            return Err(GatewayError::TooManyFiles {
                count: files.len(),
                limit: MAX_FILES_PER_BATCH,
            });
        }

        // Bounded concurrency; `buffered` (not unordered) keeps the report
        // in submission order.
        let reports: Vec<FileReport> = stream::iter(files)
            .map(|item| self.upload_one(deployment, data_type, item))
            .buffered(self.upload_concurrency)
            .collect()
            .await;

        let mut report = UploadReport {
            files: reports,
            log_error: None,
        };
        self.append_log(username, deployment, data_type, &mut report)
            .await;

        info!(
            deployment_id = %deployment.deployment_id,
            %data_type,
            files = report.files.len(),
            written = report.written().count(),
            "batch upload finished"
        );
        Ok(report)
    }

    /// Expand a gzipped tar payload and run every regular-file entry through
    /// the same per-entry logic as a plain batch.
    pub async fn upload_archive(
        &self,
        username: &str,
        deployment: &DeploymentRecord,
        data_type: DataType,
        archive: Bytes,
    ) -> GatewayResult<UploadReport> {
        if archive.len() > MAX_ARCHIVE_BYTES {
            return Err(GatewayError::PayloadTooLarge {
                size: archive.len(),
                limit: MAX_ARCHIVE_BYTES,
            });
        }

        let entries = tokio::task::spawn_blocking(move || {
            unpack_archive(&archive, MAX_FILES_PER_BATCH, MAX_UNPACKED_ARCHIVE_BYTES)
        })
        .await
        .map_err(|err| GatewayError::BadArchive(err.to_string()))??;

        self.upload_files(username, deployment, data_type, entries)
            .await
    }

    /// Raw content of the per-deployment/data-type upload log.
    pub async fn read_log(
        &self,
        deployment: &DeploymentRecord,
        data_type: DataType,
    ) -> GatewayResult<String> {
        let key = StorageKey::for_log(deployment, data_type);
        let bytes = self.store.get(&key.bucket, &key.key).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn upload_one(
        &self,
        deployment: &DeploymentRecord,
        data_type: DataType,
        item: UploadItem,
    ) -> FileReport {
        let key = StorageKey::for_file(deployment, data_type, &item.filename);

        match self.store.exists(&key.bucket, &key.key).await {
            Ok(true) => return FileReport::duplicate(item.filename),
            Ok(false) => {}
            Err(err) => return FileReport::failed(item.filename, err.to_string()),
        }

        match self
            .store
            .put(&key.bucket, &key.key, item.bytes, &item.content_type)
            .await
        {
            Ok(()) => FileReport::written(item.filename),
            Err(err) => {
                warn!(%key, error = %err, "file write failed");
                FileReport::failed(item.filename, err.to_string())
            }
        }
    }

    /// Append one log line per written file. Best-effort relative to the
    /// uploads themselves: a failure here is recorded on the report, the
    /// media writes stand.
    async fn append_log(
        &self,
        username: &str,
        deployment: &DeploymentRecord,
        data_type: DataType,
        report: &mut UploadReport,
    ) {
        let lines: String = report
            .written()
            .map(|file| {
                let entry = LogEntry::new(
                    username,
                    &deployment.country,
                    &deployment.deployment_id,
                    data_type,
                    &file.filename,
                );
                format!("{entry}\n")
            })
            .collect();
        if lines.is_empty() {
            return;
        }

        let key = StorageKey::for_log(deployment, data_type);
        let existing = match self.store.get(&key.bucket, &key.key).await {
            Ok(bytes) => bytes,
            Err(StoreError::NotFound { .. }) => Bytes::new(),
            Err(err) => {
                warn!(%key, error = %err, "could not read upload log");
                report.log_error = Some(err.to_string());
                return;
            }
        };

        let mut content = Vec::with_capacity(existing.len() + lines.len());
        content.extend_from_slice(&existing);
        content.extend_from_slice(lines.as_bytes());

        if let Err(err) = self
            .store
            .put(&key.bucket, &key.key, content.into(), "text/plain")
            .await
        {
            warn!(%key, error = %err, "could not append upload log");
            report.log_error = Some(err.to_string());
        }
    }
}

/// Read a gzipped tar from memory into upload items, one per regular file.
/// Directory structure inside the archive is dropped; only the final name
/// component is kept, matching how individually submitted files are named.
///
/// Both limits are enforced while expanding, against bytes actually read.
/// The tar header's claimed entry size never drives an allocation; a
/// crafted header cannot push memory use past `max_bytes`.
fn unpack_archive(
    archive: &[u8],
    max_entries: usize,
    max_bytes: usize,
) -> GatewayResult<Vec<UploadItem>> {
    let mut entries = Vec::new();
    let mut budget = max_bytes;
    let mut tar = tar::Archive::new(GzDecoder::new(archive));

    let iter = tar
        .entries()
        .map_err(|err| GatewayError::BadArchive(err.to_string()))?;
    for entry in iter {
        let mut entry = entry.map_err(|err| GatewayError::BadArchive(err.to_string()))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let path = entry
            .path()
            .map_err(|err| GatewayError::BadArchive(err.to_string()))?;
        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };

        if entries.len() == max_entries {
            return Err(GatewayError::TooManyFiles {
                count: max_entries + 1,
                limit: max_entries,
            });
        }

        let mut bytes = Vec::new();
        let read = (&mut entry)
            .take(budget as u64 + 1)
            .read_to_end(&mut bytes)
            .map_err(|err| GatewayError::BadArchive(err.to_string()))?;
        if read > budget {
            return Err(GatewayError::PayloadTooLarge {
                size: max_bytes - budget + read,
                limit: max_bytes,
            });
        }
        budget -= read;

        let content_type = guess_content_type(&filename).to_string();
        entries.push(UploadItem {
            filename,
            content_type,
            bytes: bytes.into(),
        });
    }
    Ok(entries)
}

/// Media type from the filename extension. The store keeps whatever we send,
/// and a wrong type only degrades later downloads, so unknown extensions
/// fall back to the generic byte stream type.
pub fn guess_content_type(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "flac" => "audio/flac",
        "ogg" => "audio/ogg",
        _ => "application/octet-stream",
    }
}
