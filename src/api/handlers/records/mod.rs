//! Compliance record endpoints.
//!
//! Listing needs any signed-in session; create, update and delete need an admin
//! session. The gate runs before the store is touched, so a denied mutation never
//! writes.

mod storage;
mod types;

pub use storage::{MemoryRecordStore, MySqlRecordStore, RecordError, RecordStore};
pub use types::{ComplianceRecord, RecordFilter, RecordInput};

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::info;

use super::auth::{
    error::ErrorBody,
    gate::{require, Capability},
    session::session_id_from_headers,
    AuthState,
};

/// Shared handle injected as an axum `Extension`.
pub type SharedRecordStore = Arc<dyn RecordStore>;

fn invalid_record() -> axum::response::Response {
    (StatusCode::BAD_REQUEST, Json(ErrorBody::new("invalid_record"))).into_response()
}

#[utoipa::path(
    get,
    path = "/v1/records",
    params(RecordFilter),
    responses(
        (status = 200, description = "Matching records", body = [ComplianceRecord]),
        (status = 403, description = "No authenticated session", body = ErrorBody),
        (status = 503, description = "Record store unavailable", body = ErrorBody)
    ),
    tag = "records"
)]
pub async fn list_records(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    store: Extension<SharedRecordStore>,
    Query(filter): Query<RecordFilter>,
) -> impl IntoResponse {
    let session_id = session_id_from_headers(&headers);
    if let Err(err) = require(&auth_state, session_id.as_ref(), Capability::Authenticated).await {
        return err.into_response();
    }

    match store.list(&filter.normalized()).await {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/records",
    request_body = RecordInput,
    responses(
        (status = 201, description = "Record created", body = ComplianceRecord),
        (status = 400, description = "Invalid record", body = ErrorBody),
        (status = 403, description = "Admin session required", body = ErrorBody),
        (status = 503, description = "Record store unavailable", body = ErrorBody)
    ),
    tag = "records"
)]
pub async fn create_record(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    store: Extension<SharedRecordStore>,
    payload: Option<Json<RecordInput>>,
) -> impl IntoResponse {
    let session_id = session_id_from_headers(&headers);
    let principal = match require(&auth_state, session_id.as_ref(), Capability::Admin).await {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    let input = match payload {
        Some(Json(input)) if input.is_valid() => input,
        _ => return invalid_record(),
    };

    match store.create(input).await {
        Ok(record) => {
            info!(record_id = record.id, admin = %principal.email, "record created");
            (StatusCode::CREATED, Json(record)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/v1/records/{id}",
    params(("id" = u64, Path, description = "Record id")),
    request_body = RecordInput,
    responses(
        (status = 200, description = "Record updated", body = ComplianceRecord),
        (status = 400, description = "Invalid record", body = ErrorBody),
        (status = 403, description = "Admin session required", body = ErrorBody),
        (status = 404, description = "Record not found", body = ErrorBody),
        (status = 503, description = "Record store unavailable", body = ErrorBody)
    ),
    tag = "records"
)]
pub async fn update_record(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    store: Extension<SharedRecordStore>,
    Path(id): Path<u64>,
    payload: Option<Json<RecordInput>>,
) -> impl IntoResponse {
    let session_id = session_id_from_headers(&headers);
    let principal = match require(&auth_state, session_id.as_ref(), Capability::Admin).await {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    let input = match payload {
        Some(Json(input)) if input.is_valid() => input,
        _ => return invalid_record(),
    };

    match store.update(id, input).await {
        Ok(record) => {
            info!(record_id = id, admin = %principal.email, "record updated");
            (StatusCode::OK, Json(record)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/records/{id}",
    params(("id" = u64, Path, description = "Record id")),
    responses(
        (status = 204, description = "Record deleted"),
        (status = 403, description = "Admin session required", body = ErrorBody),
        (status = 404, description = "Record not found", body = ErrorBody),
        (status = 503, description = "Record store unavailable", body = ErrorBody)
    ),
    tag = "records"
)]
pub async fn delete_record(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    store: Extension<SharedRecordStore>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    let session_id = session_id_from_headers(&headers);
    let principal = match require(&auth_state, session_id.as_ref(), Capability::Admin).await {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    match store.delete(id).await {
        Ok(()) => {
            info!(record_id = id, admin = %principal.email, "record deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => err.into_response(),
    }
}
