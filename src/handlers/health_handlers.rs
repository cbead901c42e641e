//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks the registry and the object store

use crate::services::upload_service::UploadService;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;

/// `GET /healthz`
///
/// Very small liveness probe — always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Reads the in-memory deployment registry.
/// 2. Issues a head probe against one of the registry's own country buckets;
///    a clean "not found" is just as ready as a hit, only a
///    transport/credential failure is not. Probing a bucket the gateway does
///    not own would report a stranger's 403 as unready, so with an empty
///    registry the store check is skipped.
///
/// Returns JSON describing each check. HTTP 200 when all checks pass,
/// HTTP 503 when any check fails.
pub async fn readyz(State(service): State<UploadService>) -> impl IntoResponse {
    let deployments = service.registry().list();
    let registry_check: (bool, Option<String>) =
        (true, Some(format!("{} deployments", deployments.len())));

    let mut buckets: Vec<String> = deployments.iter().map(|record| record.bucket()).collect();
    buckets.sort();
    buckets.dedup();

    let store_check = match buckets.first() {
        None => (true, Some("no buckets to probe".to_string())),
        Some(bucket) => match service.store().exists(bucket, "readyz-probe").await {
            Ok(_) => (true, None),
            Err(e) => (false, Some(format!("error: {}", e))),
        },
    };

    let registry_ok = registry_check.0;
    let store_ok = store_check.0;
    let overall_ok = registry_ok && store_ok;

    let mut checks = HashMap::new();
    checks.insert(
        "registry",
        CheckStatus {
            ok: registry_ok,
            error: registry_check.1,
        },
    );
    checks.insert(
        "object_store",
        CheckStatus {
            ok: store_ok,
            error: store_check.1,
        },
    );

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
