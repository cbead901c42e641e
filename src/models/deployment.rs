//! Represents a physical monitoring deployment (camera/microphone installation).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Media categories a deployment can collect.
///
/// The wire form is the snake_case name; the same string is the third
/// segment of every storage key, so the mapping must stay stable.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    MotionImages,
    SnapshotImages,
    AudibleRecordings,
    UltrasoundRecordings,
}

impl DataType {
    pub const ALL: [DataType; 4] = [
        DataType::MotionImages,
        DataType::SnapshotImages,
        DataType::AudibleRecordings,
        DataType::UltrasoundRecordings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::MotionImages => "motion_images",
            DataType::SnapshotImages => "snapshot_images",
            DataType::AudibleRecordings => "audible_recordings",
            DataType::UltrasoundRecordings => "ultrasound_recordings",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = UnknownDataType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataType::ALL
            .into_iter()
            .find(|dt| dt.as_str() == s)
            .ok_or_else(|| UnknownDataType(s.to_string()))
    }
}

/// Raised when a submitted data_type is not one of the fixed enumeration.
#[derive(Debug, thiserror::Error)]
#[error("unknown data type `{0}`")]
pub struct UnknownDataType(pub String);

/// Whether a deployment currently accepts uploads.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Active,
    Inactive,
}

/// One physical camera/microphone installation at a location.
///
/// `(country_code, deployment_id)` is the natural key. The same struct is a
/// registry-file row (column order below) and a JSON API payload, so field
/// order and names must not change. `data_types` is the semicolon-joined
/// supported set; parse it with [`DeploymentRecord::supported_data_types`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DeploymentRecord {
    pub country: String,
    pub country_code: String,
    pub location_name: String,
    pub lat: String,
    pub lon: String,
    pub location_id: String,
    pub camera_id: String,
    pub system_id: String,
    pub hardware_id: String,
    pub deployment_id: String,
    pub data_types: String,
    pub status: DeploymentStatus,
}

impl DeploymentRecord {
    pub fn is_active(&self) -> bool {
        self.status == DeploymentStatus::Active
    }

    /// Bucket name for this deployment's country (lowercased alpha-3 code).
    pub fn bucket(&self) -> String {
        self.country_code.to_lowercase()
    }

    /// Supported media categories, parsed from the `data_types` column.
    /// Unknown entries are ignored rather than rejected so a registry edit
    /// cannot brick unrelated uploads.
    pub fn supported_data_types(&self) -> Vec<DataType> {
        self.data_types
            .split(';')
            .filter_map(|s| s.trim().parse().ok())
            .collect()
    }

    pub fn supports(&self, data_type: DataType) -> bool {
        self.supported_data_types().contains(&data_type)
    }

    /// Object-key prefix for one media category inside the country bucket.
    pub fn key_prefix(&self, data_type: DataType) -> String {
        format!("{}/{}", self.deployment_id, data_type)
    }
}

/// Payload for creating a deployment. Identifiers the registry assigns
/// (`location_id`, `system_id`, `deployment_id`) are optional; a supplied
/// `deployment_id` is honored and conflict-checked instead of generated.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NewDeployment {
    pub country: String,
    pub country_code: String,
    pub location_name: String,
    pub lat: String,
    pub lon: String,
    pub camera_id: String,
    pub hardware_id: String,
    #[serde(default)]
    pub deployment_id: Option<String>,
    #[serde(default = "default_data_types")]
    pub data_types: String,
    #[serde(default = "default_status")]
    pub status: DeploymentStatus,
}

fn default_status() -> DeploymentStatus {
    DeploymentStatus::Inactive
}

fn default_data_types() -> String {
    DataType::ALL.map(|dt| dt.as_str()).join(";")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> DeploymentRecord {
        DeploymentRecord {
            country: "Kenya".into(),
            country_code: "KEN".into(),
            location_name: "Site-A".into(),
            lat: "-1.2921".into(),
            lon: "36.8219".into(),
            location_id: "loc000001".into(),
            camera_id: "cam-17".into(),
            system_id: "sys000001".into(),
            hardware_id: "hw-2041".into(),
            deployment_id: "dep000001".into(),
            data_types: "motion_images;snapshot_images".into(),
            status: DeploymentStatus::Active,
        }
    }

    #[test]
    fn data_type_round_trips_through_str() {
        for dt in DataType::ALL {
            assert_eq!(dt.as_str().parse::<DataType>().unwrap(), dt);
        }
        assert!("thermal_images".parse::<DataType>().is_err());
    }

    #[test]
    fn data_type_serializes_as_snake_case() {
        let json = serde_json::to_string(&DataType::UltrasoundRecordings).unwrap();
        assert_eq!(json, "\"ultrasound_recordings\"");
    }

    #[test]
    fn bucket_is_lowercased_country_code() {
        assert_eq!(record().bucket(), "ken");
    }

    #[test]
    fn supported_set_parses_and_filters() {
        let rec = record();
        assert!(rec.supports(DataType::MotionImages));
        assert!(!rec.supports(DataType::AudibleRecordings));

        let mut odd = record();
        odd.data_types = "motion_images; bogus ;audible_recordings".into();
        assert_eq!(
            odd.supported_data_types(),
            vec![DataType::MotionImages, DataType::AudibleRecordings]
        );
    }

    #[test]
    fn key_prefix_joins_deployment_and_data_type() {
        assert_eq!(
            record().key_prefix(DataType::MotionImages),
            "dep000001/motion_images"
        );
    }
}
