//! Authorization gate for session-backed operations.
//!
//! Every operation declares exactly one `Capability`. The gate only reads the
//! session, so callers run it before touching any store.

use super::{
    error::AuthError,
    principal::Principal,
    state::AuthState,
    store::{Session, SessionId},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    /// Any signed-in principal.
    Authenticated,
    /// Signed-in principal with the admin role.
    Admin,
}

/// Decide whether `session` may perform an operation requiring `capability`.
///
/// # Errors
/// `Forbidden` when there is no principal, or when `Admin` is required and the
/// principal is a user.
pub fn authorize(session: Option<&Session>, capability: Capability) -> Result<Principal, AuthError> {
    let principal = session
        .and_then(|session| session.principal.as_ref())
        .ok_or(AuthError::Forbidden)?;

    match capability {
        Capability::Authenticated => Ok(principal.clone()),
        Capability::Admin if principal.is_admin() => Ok(principal.clone()),
        Capability::Admin => Err(AuthError::Forbidden),
    }
}

/// Load the session for `session_id` (if any) and run the gate on it.
///
/// # Errors
/// `Forbidden` as for `authorize`, `Unavailable` when the session store fails.
pub async fn require(
    state: &AuthState,
    session_id: Option<&SessionId>,
    capability: Capability,
) -> Result<Principal, AuthError> {
    let Some(session_id) = session_id else {
        return Err(AuthError::Forbidden);
    };
    let session = state
        .sessions()
        .get(session_id)
        .await
        .map_err(AuthError::Unavailable)?;
    authorize(session.as_ref(), capability)
}
