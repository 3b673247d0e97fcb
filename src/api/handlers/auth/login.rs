//! One-time code and login endpoints.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use std::sync::Arc;

use super::{
    error::ErrorBody,
    machine, otp,
    session::{cookie_headers, session_id_from_headers, SessionHandle},
    state::AuthState,
    types::{LoginRequest, MessageResponse, SendCodeRequest, SessionResponse},
};

#[utoipa::path(
    post,
    path = "/v1/auth/send-code",
    request_body = SendCodeRequest,
    responses(
        (status = 200, description = "Code delivered", body = MessageResponse),
        (status = 400, description = "Invalid email", body = ErrorBody),
        (status = 502, description = "Code could not be delivered", body = ErrorBody),
        (status = 503, description = "Session store unavailable", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn send_code(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<SendCodeRequest>>,
) -> impl IntoResponse {
    let request: SendCodeRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let handle = match SessionHandle::resolve_or_mint(&headers, &auth_state).await {
        Ok(handle) => handle,
        Err(err) => return err.into_response(),
    };

    match otp::issue(&auth_state, &handle.id, &request.email).await {
        Ok(()) => (
            StatusCode::OK,
            handle.response_headers(auth_state.config()),
            Json(MessageResponse::new("OTP sent successfully")),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in; a new session cookie is set", body = SessionResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
        (status = 503, description = "Store unavailable", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    // The session is re-keyed on success, so the cookie is always replaced.
    let session_id = session_id_from_headers(&headers);
    match machine::login(
        &auth_state,
        session_id.as_ref(),
        &request.email,
        &request.password,
    )
    .await
    {
        Ok(signed_in) => (
            StatusCode::OK,
            cookie_headers(auth_state.config(), &signed_in.token),
            Json(SessionResponse::from(signed_in.principal)),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
