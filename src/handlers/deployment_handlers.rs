//! Administrative handlers: deployment registry CRUD and bucket creation.

use crate::errors::AppError;
use crate::models::deployment::{DeploymentRecord, NewDeployment};
use crate::services::upload_service::UploadService;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

/// `GET /get-deployments/` — every registry record.
pub async fn get_deployments(State(service): State<UploadService>) -> impl IntoResponse {
    Json(service.registry().list())
}

/// `POST /create-deployment/` — add a record; 409 when the natural key
/// `(country_code, deployment_id)` already exists.
pub async fn create_deployment(
    State(service): State<UploadService>,
    Json(new): Json<NewDeployment>,
) -> Result<impl IntoResponse, AppError> {
    let record = service.registry().create(new)?;
    info!(
        country_code = %record.country_code,
        deployment_id = %record.deployment_id,
        "deployment created"
    );
    Ok((StatusCode::CREATED, Json(record)))
}

/// `PUT /update-deployment/` — replace a record by natural key; 404 when no
/// such record exists.
pub async fn update_deployment(
    State(service): State<UploadService>,
    Json(record): Json<DeploymentRecord>,
) -> Result<impl IntoResponse, AppError> {
    let updated = service.registry().update(record)?;
    info!(
        country_code = %updated.country_code,
        deployment_id = %updated.deployment_id,
        "deployment updated"
    );
    Ok(Json(updated))
}

/// Body of `POST /create-bucket/`. Buckets are named after the country's
/// lowercased alpha-3 code.
#[derive(Debug, Deserialize)]
pub struct CreateBucketReq {
    pub bucket_name: String,
}

/// `POST /create-bucket/` — create a country bucket; 409 when it exists.
pub async fn create_bucket(
    State(service): State<UploadService>,
    Json(req): Json<CreateBucketReq>,
) -> Result<impl IntoResponse, AppError> {
    let bucket = req.bucket_name.to_lowercase();
    service.store().create_bucket(&bucket).await?;
    Ok(Json(json!({
        "message": format!("bucket `{bucket}` created")
    })))
}
