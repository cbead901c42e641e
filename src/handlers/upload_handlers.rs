//! HTTP handlers for the data-submission surface.
//!
//! `POST /upload/` is a single multipart endpoint with three shapes, kept
//! for client compatibility:
//! - `name, country, deployment, data_type, files...` → batch upload
//! - `... , filename, file_type`                      → presigned PUT URL
//! - `... , filename`                                 → existence check
//!
//! The handlers only translate between HTTP and the pipeline; all decisions
//! live in `UploadService`.
//!
//! A batch is drained fully into memory before the first store write so the
//! per-call file cap can reject an oversized batch with zero side effects.
//! The router's body limit bounds that buffering, so a request can hold at
//! most one archive ceiling's worth of bytes in memory.

use crate::errors::AppError;
use crate::models::deployment::DataType;
use crate::models::upload::UploadItem;
use crate::services::upload_service::{
    MAX_ARCHIVE_BYTES, UploadService, guess_content_type,
};
use axum::{
    Json,
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

/// Metadata fields common to every `/upload/` submission shape.
#[derive(Debug, Default)]
struct SubmissionFields {
    name: Option<String>,
    country: Option<String>,
    deployment: Option<String>,
    data_type: Option<String>,
    filename: Option<String>,
    file_type: Option<String>,
}

impl SubmissionFields {
    fn require(&self) -> Result<(&str, &str, &str, DataType), AppError> {
        let name = self
            .name
            .as_deref()
            .ok_or_else(|| AppError::bad_request("missing field `name`"))?;
        let country = self
            .country
            .as_deref()
            .ok_or_else(|| AppError::bad_request("missing field `country`"))?;
        let deployment = self
            .deployment
            .as_deref()
            .ok_or_else(|| AppError::bad_request("missing field `deployment`"))?;
        let data_type = self
            .data_type
            .as_deref()
            .ok_or_else(|| AppError::bad_request("missing field `data_type`"))?
            .parse::<DataType>()
            .map_err(|err| AppError::bad_request(err.to_string()))?;
        Ok((name, country, deployment, data_type))
    }
}

/// `POST /upload/` — batch upload, presign request, or existence check.
pub async fn upload(
    State(service): State<UploadService>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut fields = SubmissionFields::default();
    let mut files: Vec<UploadItem> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("bad multipart body: {err}")))?
    {
        match field.name().unwrap_or_default() {
            "files" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| guess_content_type(&filename).to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| AppError::bad_request(format!("bad file part: {err}")))?;
                files.push(UploadItem {
                    filename,
                    content_type,
                    bytes,
                });
            }
            other => {
                let name = other.to_string();
                let value = field
                    .text()
                    .await
                    .map_err(|err| AppError::bad_request(format!("bad field `{name}`: {err}")))?;
                match name.as_str() {
                    "name" => fields.name = Some(value),
                    "country" => fields.country = Some(value),
                    "deployment" => fields.deployment = Some(value),
                    "data_type" => fields.data_type = Some(value),
                    "filename" => fields.filename = Some(value),
                    "file_type" => fields.file_type = Some(value),
                    unknown => {
                        return Err(AppError::bad_request(format!(
                            "unexpected field `{unknown}`"
                        )));
                    }
                }
            }
        }
    }

    let (name, country, deployment_name, data_type) = fields.require()?;
    let deployment = service.resolve_deployment(country, deployment_name, data_type)?;

    // Batch beats the single-file shapes when both are present.
    if !files.is_empty() {
        let report = service
            .upload_files(name, &deployment, data_type, files)
            .await?;
        return Ok(Json(serde_json::to_value(report).unwrap_or_default()));
    }

    match (fields.filename.as_deref(), fields.file_type.as_deref()) {
        (Some(filename), Some(file_type)) => {
            let url = service
                .presigned_upload_url(&deployment, data_type, filename, file_type)
                .await?;
            info!(deployment_id = %deployment.deployment_id, filename, "presigned URL issued");
            Ok(Json(json!({ "url": url })))
        }
        (Some(filename), None) => {
            let exists = service.check_exists(&deployment, data_type, filename).await?;
            Ok(Json(json!({ "exists": exists })))
        }
        (None, _) => {
            // Zero `files` parts and no filename: treat as an empty batch so
            // a submission of nothing is a success with an empty report.
            let report = service
                .upload_files(name, &deployment, data_type, Vec::new())
                .await?;
            Ok(Json(serde_json::to_value(report).unwrap_or_default()))
        }
    }
}

/// `POST /upload-archive/` — one gzipped tar of media files.
pub async fn upload_archive(
    State(service): State<UploadService>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut fields = SubmissionFields::default();
    let mut archive: Option<Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("bad multipart body: {err}")))?
    {
        match field.name().unwrap_or_default() {
            "archive" => {
                let bytes = field.bytes().await.map_err(|err| {
                    AppError::bad_request(format!("bad archive part: {err}"))
                })?;
                if bytes.len() > MAX_ARCHIVE_BYTES {
                    return Err(AppError::new(
                        StatusCode::PAYLOAD_TOO_LARGE,
                        format!(
                            "archive of {} bytes exceeds the limit of {MAX_ARCHIVE_BYTES}",
                            bytes.len()
                        ),
                    ));
                }
                archive = Some(bytes);
            }
            other => {
                let name = other.to_string();
                let value = field
                    .text()
                    .await
                    .map_err(|err| AppError::bad_request(format!("bad field `{name}`: {err}")))?;
                match name.as_str() {
                    "name" => fields.name = Some(value),
                    "country" => fields.country = Some(value),
                    "deployment" => fields.deployment = Some(value),
                    "data_type" => fields.data_type = Some(value),
                    unknown => {
                        return Err(AppError::bad_request(format!(
                            "unexpected field `{unknown}`"
                        )));
                    }
                }
            }
        }
    }

    let (name, country, deployment_name, data_type) = fields.require()?;
    let archive = archive.ok_or_else(|| AppError::bad_request("missing field `archive`"))?;

    let deployment = service.resolve_deployment(country, deployment_name, data_type)?;
    let report = service
        .upload_archive(name, &deployment, data_type, archive)
        .await?;
    Ok(Json(serde_json::to_value(report).unwrap_or_default()))
}

/// Query params shared by `/list-data/`, `/count-data/` and `/get-logs/`:
/// `country_location_name` is the `"Country - Location"` pair the admin UI
/// presents as one string.
#[derive(Debug, Deserialize)]
pub struct DataQuery {
    pub country_location_name: String,
    pub data_type: String,
}

impl DataQuery {
    fn split(&self) -> Result<(&str, &str, DataType), AppError> {
        let (country, location) = self
            .country_location_name
            .split_once(" - ")
            .ok_or_else(|| {
                AppError::bad_request(
                    "country_location_name must look like `Country - Location`",
                )
            })?;
        let data_type = self
            .data_type
            .parse::<DataType>()
            .map_err(|err| AppError::bad_request(err.to_string()))?;
        Ok((country, location, data_type))
    }
}

/// `GET /list-data/` — object keys under one deployment/data-type prefix.
pub async fn list_data(
    State(service): State<UploadService>,
    Query(query): Query<DataQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (country, location, data_type) = query.split()?;
    let deployment = service.resolve_deployment(country, location, data_type)?;

    let prefix = format!("{}/", deployment.key_prefix(data_type));
    let keys = service.store().list(&deployment.bucket(), &prefix).await?;
    Ok(Json(json!({ "files": keys })))
}

/// `GET /count-data/` — number of objects under the prefix.
pub async fn count_data(
    State(service): State<UploadService>,
    Query(query): Query<DataQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (country, location, data_type) = query.split()?;
    let deployment = service.resolve_deployment(country, location, data_type)?;

    let prefix = format!("{}/", deployment.key_prefix(data_type));
    let keys = service.store().list(&deployment.bucket(), &prefix).await?;
    Ok(Json(json!({ "count": keys.len() })))
}

/// `GET /get-logs/` — raw upload log for one deployment/data-type pair.
pub async fn get_logs(
    State(service): State<UploadService>,
    Query(query): Query<DataQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (country, location, data_type) = query.split()?;
    let deployment = service.resolve_deployment(country, location, data_type)?;

    let content = service.read_log(&deployment, data_type).await?;
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::deployment::{DeploymentRecord, DeploymentStatus};
    use crate::routes::routes::routes;
    use crate::services::object_store::testing::MemoryStore;
    use crate::services::registry::testing::MemoryRegistry;
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn deployment() -> DeploymentRecord {
        DeploymentRecord {
            country: "Kenya".into(),
            country_code: "ken".into(),
            location_name: "Site-A".into(),
            lat: "-1.29".into(),
            lon: "36.82".into(),
            location_id: "loc000001".into(),
            camera_id: "cam-1".into(),
            system_id: "sys000001".into(),
            hardware_id: "hw-1".into(),
            deployment_id: "dep000001".into(),
            data_types: "motion_images;audible_recordings".into(),
            status: DeploymentStatus::Active,
        }
    }

    fn app() -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(MemoryRegistry::with_records(vec![deployment()]));
        let service = UploadService::new(
            registry,
            store.clone(),
            Duration::from_secs(3600),
            4,
        );
        (routes().with_state(service), store)
    }

    const BOUNDARY: &str = "x-form-boundary";

    const META: &[(&str, &str)] = &[
        ("name", "dan"),
        ("country", "Kenya"),
        ("deployment", "Site-A"),
        ("data_type", "motion_images"),
    ];

    fn form(fields: &[(&str, &str)], files: &[(&str, &[u8])]) -> Body {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; \
                     name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        for (filename, bytes) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; \
                     name=\"files\"; filename=\"{filename}\"\r\n\
                     Content-Type: image/jpeg\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Body::from(body)
    }

    fn upload_request(body: Body) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/upload/")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(body)
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn file_parts_select_the_batch_shape() {
        let (app, store) = app();
        let response = app
            .oneshot(upload_request(form(META, &[("a.jpg", b"x")])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["files"][0]["status"], "written");
        assert!(store.object("ken", "dep000001/motion_images/a.jpg").is_some());
    }

    #[tokio::test]
    async fn filename_and_file_type_return_a_presigned_url() {
        let (app, _) = app();
        let mut fields = META.to_vec();
        fields.push(("filename", "a.jpg"));
        fields.push(("file_type", "image/jpeg"));

        let response = app
            .oneshot(upload_request(form(&fields, &[])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let url = body["url"].as_str().unwrap();
        assert!(url.contains("dep000001/motion_images/a.jpg"));
    }

    #[tokio::test]
    async fn filename_alone_is_an_existence_check() {
        let (app, store) = app();
        store.insert("ken", "dep000001/motion_images/a.jpg", b"x".as_slice());
        let mut fields = META.to_vec();
        fields.push(("filename", "a.jpg"));

        let response = app
            .oneshot(upload_request(form(&fields, &[])))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["exists"], true);
    }

    #[tokio::test]
    async fn file_parts_win_over_the_single_file_fields() {
        let (app, _) = app();
        let mut fields = META.to_vec();
        fields.push(("filename", "other.jpg"));
        fields.push(("file_type", "image/jpeg"));

        let response = app
            .oneshot(upload_request(form(&fields, &[("a.jpg", b"x")])))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert!(body.get("files").is_some());
        assert!(body.get("url").is_none());
    }

    #[tokio::test]
    async fn missing_required_fields_are_a_bad_request() {
        let (app, _) = app();
        let response = app
            .oneshot(upload_request(form(&[("country", "Kenya")], &[])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("name"));
    }

    #[tokio::test]
    async fn unknown_deployment_maps_to_not_found() {
        let (app, _) = app();
        let fields = &[
            ("name", "dan"),
            ("country", "Kenya"),
            ("deployment", "Nowhere"),
            ("data_type", "motion_images"),
        ];
        let response = app
            .oneshot(upload_request(form(fields, &[("a.jpg", b"x")])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_data_splits_the_country_location_pair() {
        let (app, store) = app();
        store.insert("ken", "dep000001/motion_images/a.jpg", b"x".as_slice());

        let response = app
            .oneshot(
                Request::builder()
                    .uri(
                        "/list-data/?country_location_name=Kenya%20-%20Site-A\
                         &data_type=motion_images",
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["files"][0], "dep000001/motion_images/a.jpg");
    }

    #[tokio::test]
    async fn malformed_country_location_name_is_rejected() {
        let (app, _) = app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/list-data/?country_location_name=Kenya&data_type=motion_images")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
