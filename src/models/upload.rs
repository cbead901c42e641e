//! Submission-side types: storage keys, per-file outcomes, audit log lines.

use crate::models::deployment::{DataType, DeploymentRecord};
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fmt;

/// Address of one media object: the country bucket plus the object key
/// inside it. The full path is `{country_code}/{deployment_id}/{data_type}/{filename}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageKey {
    pub bucket: String,
    pub key: String,
}

impl StorageKey {
    /// Build the canonical key for a file. Filenames are taken as submitted;
    /// if the store rejects the resulting key the write fails, it is not
    /// sanitized here.
    pub fn for_file(deployment: &DeploymentRecord, data_type: DataType, filename: &str) -> Self {
        Self {
            bucket: deployment.bucket(),
            key: format!("{}/{}/{}", deployment.deployment_id, data_type, filename),
        }
    }

    /// Key of the append-only upload log for one deployment/data-type pair.
    /// Kept under `logs/` so it never shows up in media listings.
    pub fn for_log(deployment: &DeploymentRecord, data_type: DataType) -> Self {
        Self {
            bucket: deployment.bucket(),
            key: format!("logs/{}/{}.log", deployment.deployment_id, data_type),
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// One file of a batch submission, already pulled out of the multipart body.
#[derive(Clone, Debug)]
pub struct UploadItem {
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Outcome of one file within a batch.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileOutcome {
    Written,
    SkippedDuplicate,
    Failed,
}

/// Per-file status entry in an upload response.
#[derive(Serialize, Clone, Debug)]
pub struct FileReport {
    pub filename: String,
    pub status: FileOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    pub fn written(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            status: FileOutcome::Written,
            error: None,
        }
    }

    pub fn duplicate(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            status: FileOutcome::SkippedDuplicate,
            error: None,
        }
    }

    pub fn failed(filename: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            status: FileOutcome::Failed,
            error: Some(error.into()),
        }
    }
}

/// Result of a whole batch or archive submission. Order follows submission
/// order. `log_error` carries a best-effort audit-log failure; the media
/// writes it refers to are still in place.
#[derive(Serialize, Clone, Debug, Default)]
pub struct UploadReport {
    pub files: Vec<FileReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_error: Option<String>,
}

impl UploadReport {
    pub fn written(&self) -> impl Iterator<Item = &FileReport> {
        self.files
            .iter()
            .filter(|f| f.status == FileOutcome::Written)
    }
}

/// One immutable line of the per-deployment upload log.
#[derive(Clone, Debug)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub username: String,
    pub country: String,
    pub deployment: String,
    pub data_type: DataType,
    pub filename: String,
}

impl LogEntry {
    pub fn new(
        username: &str,
        country: &str,
        deployment: &str,
        data_type: DataType,
        filename: &str,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            username: username.to_string(),
            country: country.to_string(),
            deployment: deployment.to_string(),
            data_type,
            filename: filename.to_string(),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} user=\"{}\" country=\"{}\" deployment=\"{}\" data_type=\"{}\" file=\"{}\"",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.username,
            self.country,
            self.deployment,
            self.data_type,
            self.filename,
        )
    }
}
