use crate::services::object_store::StoreError;
use crate::services::registry::RegistryError;
use crate::services::upload_service::GatewayError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for handler errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for 400 Bad Request (missing or malformed fields).
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

/// Pipeline error taxonomy → HTTP status. Whole-request preconditions map to
/// 4xx and are never retried by the gateway; backend failures surface as 5xx
/// with the cause text.
impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        let status = match &err {
            GatewayError::DeploymentNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::UnsupportedDataType { .. } => StatusCode::BAD_REQUEST,
            GatewayError::TooManyFiles { .. } => StatusCode::BAD_REQUEST,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::BadArchive(_) => StatusCode::BAD_REQUEST,
            GatewayError::Registry(inner) => registry_status(inner),
            GatewayError::Store(inner) => store_status(inner),
        };
        AppError::new(status, err.to_string())
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        AppError::new(registry_status(&err), err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::new(store_status(&err), err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

fn registry_status(err: &RegistryError) -> StatusCode {
    match err {
        RegistryError::Conflict { .. } => StatusCode::CONFLICT,
        RegistryError::NotFound { .. } => StatusCode::NOT_FOUND,
        RegistryError::Csv(_) | RegistryError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::BucketAlreadyExists(_) => StatusCode::CONFLICT,
        StoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::deployment::DataType;

    #[test]
    fn gateway_errors_map_to_the_documented_statuses() {
        let cases: Vec<(GatewayError, StatusCode)> = vec![
            (
                GatewayError::DeploymentNotFound {
                    country: "Kenya".into(),
                    deployment: "Site-A".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                GatewayError::UnsupportedDataType {
                    deployment_id: "dep000001".into(),
                    data_type: DataType::MotionImages,
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                GatewayError::TooManyFiles {
                    count: 1001,
                    limit: 1000,
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                GatewayError::PayloadTooLarge {
                    size: 2,
                    limit: 1,
                },
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                GatewayError::Store(StoreError::Backend(anyhow::anyhow!("boom"))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                GatewayError::Registry(RegistryError::Conflict {
                    country_code: "ken".into(),
                    deployment_id: "dep000001".into(),
                }),
                StatusCode::CONFLICT,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(AppError::from(err).status, expected);
        }
    }
}
