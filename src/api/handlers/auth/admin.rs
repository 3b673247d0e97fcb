//! Admin credential reset endpoint.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;

use super::{
    error::ErrorBody,
    machine,
    state::AuthState,
    types::{MessageResponse, ResetPasswordRequest},
};

/// Rotate an admin password and mail the new one to the admin's address.
///
/// The new credential never appears in the response.
#[utoipa::path(
    post,
    path = "/v1/auth/admin/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 202, description = "New password sent", body = MessageResponse),
        (status = 403, description = "Email does not belong to an admin", body = ErrorBody),
        (status = 502, description = "New password could not be delivered", body = ErrorBody),
        (status = 503, description = "Credential store unavailable", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> impl IntoResponse {
    let request: ResetPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    match machine::reset_admin_password(&auth_state, &request.email).await {
        Ok(_) => (
            StatusCode::ACCEPTED,
            Json(MessageResponse::new("New password sent")),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
