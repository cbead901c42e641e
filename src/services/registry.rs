//! Deployment registry: a flat CSV file of deployment records with an
//! in-process read-mostly cache.
//!
//! The file is loaded once at startup; administrative writes rewrite the
//! whole file and refresh the cache. There is no cross-process coordination,
//! so two admin instances racing on the same record can lose an update —
//! accepted for an administrative, low-write-rate surface.

use crate::models::deployment::{DeploymentRecord, DeploymentStatus, NewDeployment};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("deployment `{deployment_id}` in `{country_code}` already exists")]
    Conflict {
        country_code: String,
        deployment_id: String,
    },
    #[error("deployment `{deployment_id}` in `{country_code}` not found")]
    NotFound {
        country_code: String,
        deployment_id: String,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Read/write access to the deployment registry. Injected so tests can use
/// an in-memory fake instead of a file on disk.
pub trait DeploymentRegistry: Send + Sync {
    fn list(&self) -> Vec<DeploymentRecord>;

    fn get(&self, country_code: &str, deployment_id: &str) -> Option<DeploymentRecord>;

    /// Look up an active deployment by the names field operators submit:
    /// country plus location name. Case-insensitive on both.
    fn resolve(&self, country: &str, location_name: &str) -> Option<DeploymentRecord>;

    fn create(&self, new: NewDeployment) -> RegistryResult<DeploymentRecord>;

    fn update(&self, record: DeploymentRecord) -> RegistryResult<DeploymentRecord>;
}

/// CSV-file-backed registry.
pub struct CsvRegistry {
    path: PathBuf,
    records: RwLock<Vec<DeploymentRecord>>,
}

impl CsvRegistry {
    /// Load the registry from `path`. A missing file is created empty (with
    /// a header row) so a fresh install starts without manual steps.
    pub fn load(path: impl Into<PathBuf>) -> RegistryResult<Self> {
        let path = path.into();
        if !path.exists() {
            info!(path = %path.display(), "registry file missing, creating empty registry");
            write_records(&path, &[])?;
        }

        let records = read_records(&path)?;
        info!(
            path = %path.display(),
            deployments = records.len(),
            "deployment registry loaded"
        );
        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    /// Number of loaded records; used by the readiness probe.
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    fn flush(&self, records: &[DeploymentRecord]) -> RegistryResult<()> {
        write_records(&self.path, records)?;
        debug!(path = %self.path.display(), deployments = records.len(), "registry flushed");
        Ok(())
    }
}

impl DeploymentRegistry for CsvRegistry {
    fn list(&self) -> Vec<DeploymentRecord> {
        self.records.read().unwrap().clone()
    }

    fn get(&self, country_code: &str, deployment_id: &str) -> Option<DeploymentRecord> {
        self.records
            .read()
            .unwrap()
            .iter()
            .find(|r| {
                r.country_code.eq_ignore_ascii_case(country_code)
                    && r.deployment_id == deployment_id
            })
            .cloned()
    }

    fn resolve(&self, country: &str, location_name: &str) -> Option<DeploymentRecord> {
        self.records
            .read()
            .unwrap()
            .iter()
            .find(|r| {
                r.is_active()
                    && r.country.eq_ignore_ascii_case(country)
                    && r.location_name.eq_ignore_ascii_case(location_name)
            })
            .cloned()
    }

    fn create(&self, new: NewDeployment) -> RegistryResult<DeploymentRecord> {
        let mut records = self.records.write().unwrap();

        let deployment_id = match new.deployment_id {
            Some(id) => id,
            None => next_id(records.iter().map(|r| r.deployment_id.as_str()), "dep"),
        };
        if records.iter().any(|r| {
            r.country_code.eq_ignore_ascii_case(&new.country_code)
                && r.deployment_id == deployment_id
        }) {
            return Err(RegistryError::Conflict {
                country_code: new.country_code,
                deployment_id,
            });
        }

        let record = DeploymentRecord {
            country: new.country,
            country_code: new.country_code,
            location_name: new.location_name,
            lat: new.lat,
            lon: new.lon,
            location_id: next_id(records.iter().map(|r| r.location_id.as_str()), "loc"),
            camera_id: new.camera_id,
            system_id: next_id(records.iter().map(|r| r.system_id.as_str()), "sys"),
            hardware_id: new.hardware_id,
            deployment_id,
            data_types: new.data_types,
            status: new.status,
        };

        records.push(record.clone());
        self.flush(&records)?;
        Ok(record)
    }

    fn update(&self, record: DeploymentRecord) -> RegistryResult<DeploymentRecord> {
        let mut records = self.records.write().unwrap();
        let slot = records
            .iter_mut()
            .find(|r| {
                r.country_code.eq_ignore_ascii_case(&record.country_code)
                    && r.deployment_id == record.deployment_id
            })
            .ok_or_else(|| RegistryError::NotFound {
                country_code: record.country_code.clone(),
                deployment_id: record.deployment_id.clone(),
            })?;

        *slot = record.clone();
        self.flush(&records)?;
        Ok(record)
    }
}

fn read_records(path: &Path) -> RegistryResult<Vec<DeploymentRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

fn write_records(path: &Path, records: &[DeploymentRecord]) -> RegistryResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    if records.is_empty() {
        // serde-driven headers only appear with at least one row, so write
        // them explicitly for an empty registry.
        writer.write_record([
            "country",
            "country_code",
            "location_name",
            "lat",
            "lon",
            "location_id",
            "camera_id",
            "system_id",
            "hardware_id",
            "deployment_id",
            "data_types",
            "status",
        ])?;
    }
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Generate the next `{prefix}NNNNNN` identifier: max existing numeric part
/// plus one, zero-padded to six digits. Ids that do not fit the scheme are
/// ignored.
fn next_id<'a>(existing: impl Iterator<Item = &'a str>, prefix: &str) -> String {
    let max = existing
        .filter_map(|id| id.strip_prefix(prefix))
        .filter_map(|n| n.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    format!("{prefix}{:06}", max + 1)
}
