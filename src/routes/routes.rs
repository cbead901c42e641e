//! Defines routes for the data-submission and administrative surfaces.
//!
//! ## Structure
//! - **Data submission**
//!   - `POST /upload/`         — batch upload / presign / existence check
//!   - `POST /upload-archive/` — gzipped tar of media files
//!   - `GET  /list-data/`      — object keys for one deployment/data-type
//!   - `GET  /count-data/`     — object count for one deployment/data-type
//!   - `GET  /get-logs/`       — raw upload log
//!
//! - **Administration**
//!   - `GET  /get-deployments/`   — registry dump
//!   - `POST /create-deployment/` — add registry record
//!   - `PUT  /update-deployment/` — replace registry record
//!   - `POST /create-bucket/`     — create a country bucket
//!
//! The router carries shared state (`UploadService`) to all handlers. The
//! body limit is raised on the submission routes because a single archive
//! part can run to a gigabyte; everything else stays at the axum default.

use crate::{
    handlers::{
        deployment_handlers::{
            create_bucket, create_deployment, get_deployments, update_deployment,
        },
        health_handlers::{healthz, readyz},
        upload_handlers::{count_data, get_logs, list_data, upload, upload_archive},
    },
    services::upload_service::{MAX_ARCHIVE_BYTES, UploadService},
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build and return the router for the whole gateway.
pub fn routes() -> Router<UploadService> {
    let submission = Router::new()
        .route("/upload/", post(upload))
        .route("/upload-archive/", post(upload_archive))
        // Archive parts and large batches exceed axum's 2 MB default.
        .layer(DefaultBodyLimit::max(MAX_ARCHIVE_BYTES + 1024 * 1024));

    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .merge(submission)
        .route("/list-data/", get(list_data))
        .route("/count-data/", get(count_data))
        .route("/get-logs/", get(get_logs))
        .route("/get-deployments/", get(get_deployments))
        .route("/create-deployment/", post(create_deployment))
        .route("/update-deployment/", put(update_deployment))
        .route("/create-bucket/", post(create_bucket))
        .layer(TraceLayer::new_for_http())
        // Browser clients submit from the admin UI on another origin.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
