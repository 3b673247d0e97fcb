//! Session cookie handling plus the session and logout endpoints.

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, AUTHORIZATION, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::error;

use super::{
    error::{AuthError, ErrorBody},
    gate::{require, Capability},
    machine,
    state::{AuthConfig, AuthState},
    store::SessionId,
    types::SessionResponse,
    utils::generate_session_token,
};

pub(crate) const SESSION_COOKIE_NAME: &str = "seportal_session";

/// Session handle for the current request.
pub(crate) struct SessionHandle {
    pub(crate) token: String,
    pub(crate) id: SessionId,
    /// True when the token was created for this request and must be sent back.
    pub(crate) minted: bool,
}

impl SessionHandle {
    /// Reuse the client's session when the store knows it, otherwise start a new one.
    /// Unknown client-supplied tokens are never adopted.
    pub(crate) async fn resolve_or_mint(
        headers: &HeaderMap,
        state: &AuthState,
    ) -> Result<Self, AuthError> {
        if let Some(token) = extract_session_token(headers) {
            let id = SessionId::from_token(&token);
            let known = state
                .sessions()
                .get(&id)
                .await
                .map_err(AuthError::Unavailable)?
                .is_some();
            if known {
                return Ok(Self {
                    token,
                    id,
                    minted: false,
                });
            }
        }

        let token = generate_session_token().map_err(AuthError::Unavailable)?;
        Ok(Self {
            id: SessionId::from_token(&token),
            token,
            minted: true,
        })
    }

    /// Headers to attach to a successful response.
    pub(crate) fn response_headers(&self, config: &AuthConfig) -> HeaderMap {
        if self.minted {
            cookie_headers(config, &self.token)
        } else {
            HeaderMap::new()
        }
    }
}

/// `Set-Cookie` for `token`.
pub(crate) fn cookie_headers(config: &AuthConfig, token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    match session_cookie(config, token) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => error!("Failed to build session cookie: {err}"),
    }
    headers
}

/// Session id for the presented token, if any. Does not consult the store.
pub(crate) fn session_id_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    extract_session_token(headers).map(|token| SessionId::from_token(&token))
}

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is authenticated", body = SessionResponse),
        (status = 403, description = "No authenticated session", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn session(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> Response {
    let session_id = session_id_from_headers(&headers);
    match require(&auth_state, session_id.as_ref(), Capability::Authenticated).await {
        Ok(principal) => (StatusCode::OK, Json(SessionResponse::from(principal))).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> Response {
    if let Some(session_id) = session_id_from_headers(&headers) {
        if let Err(err) = machine::logout(&auth_state, &session_id).await {
            error!("Failed to clear session: {err}");
        }
    }

    // Always clear the cookie, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(auth_state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

/// Build an `HttpOnly` cookie for the session token.
pub(crate) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.secure_cookies() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.secure_cookies() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let value = headers.get(COOKIE)?.to_str().ok()?;
    value.split(';').find_map(|pair| {
        let (key, val) = pair.trim().split_once('=')?;
        let val = val.trim();
        (key.trim() == SESSION_COOKIE_NAME && !val.is_empty()).then(|| val.to_string())
    })
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_session_token_reads_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; seportal_session=abc123; other=1"),
        );
        assert_eq!(extract_session_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn extract_session_token_prefers_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("seportal_session=cookie"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer header"));
        assert_eq!(extract_session_token(&headers), Some("header".to_string()));
    }

    #[test]
    fn extract_session_token_ignores_empty_values() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("seportal_session="));
        assert_eq!(extract_session_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(extract_session_token(&headers), None);
    }

    #[test]
    fn session_cookie_flags() -> anyhow::Result<()> {
        let config = AuthConfig::new().with_session_ttl_seconds(60);
        let cookie = session_cookie(&config, "tok")?;
        assert_eq!(
            cookie.to_str()?,
            "seportal_session=tok; Path=/; HttpOnly; SameSite=Lax; Max-Age=60"
        );

        let secure = AuthConfig::new().with_secure_cookies(true);
        assert!(clear_session_cookie(&secure)?.to_str()?.ends_with("Max-Age=0; Secure"));
        Ok(())
    }
}
