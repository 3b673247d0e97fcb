//! Login decision table and the admin credential reset.
//!
//! Flow Overview:
//! 1. Resolve the stored record for the email into `Credential` (one lookup).
//! 2. `Admin(secret)` is decided by the password alone; the pending code is never read.
//! 3. `User` and `Unknown` are decided by the session's pending code alone; the stored
//!    credential column is never read. Unknown emails take this path because codes can
//!    be requested for any address.
//! 4. Everything that does not match is `InvalidCredentials`.
//!
//! A successful login always hands out a new session token. The session the client
//! arrived with is moved under it and the old token stops working.

use secrecy::{ExposeSecret, SecretString};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use super::{
    credentials::Credential,
    error::AuthError,
    principal::{Principal, Role},
    state::AuthState,
    store::{Session, SessionId},
    utils::{clean_email, generate_admin_secret, generate_session_token, secrets_match},
};
use crate::api::notifier::EmailMessage;

pub(crate) const RESET_SUBJECT: &str = "Your new admin password";

/// Outcome of a successful login: who signed in and the token of their new session.
pub struct SignedIn {
    pub principal: Principal,
    pub token: String,
}

impl SignedIn {
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        SessionId::from_token(&self.token)
    }
}

/// Authenticate `email`/`password` against the client's current session, if any.
///
/// # Errors
/// `InvalidCredentials` on any mismatch, `Unavailable` when a store fails.
#[instrument(skip(state, password))]
pub async fn login(
    state: &AuthState,
    session_id: Option<&SessionId>,
    email: &str,
    password: &str,
) -> Result<SignedIn, AuthError> {
    let email = clean_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(AuthError::InvalidCredentials);
    }

    let record = state
        .credentials()
        .lookup(email)
        .await
        .map_err(AuthError::Unavailable)?;

    match Credential::from(record) {
        Credential::Admin(secret) => admin_login(state, session_id, email, password, &secret).await,
        Credential::User | Credential::Unknown => code_login(state, session_id, email, password).await,
    }
}

async fn admin_login(
    state: &AuthState,
    session_id: Option<&SessionId>,
    email: &str,
    password: &str,
    secret: &SecretString,
) -> Result<SignedIn, AuthError> {
    if !secrets_match(secret.expose_secret(), password) {
        debug!("admin password mismatch");
        return Err(AuthError::InvalidCredentials);
    }

    let sessions = state.sessions();
    let mut session = match session_id {
        Some(id) => sessions.get(id).await.map_err(AuthError::Unavailable)?,
        None => None,
    }
    .unwrap_or_default();

    let signed_in = SignedIn {
        principal: Principal::new(email, Role::Admin),
        token: generate_session_token().map_err(AuthError::Unavailable)?,
    };
    session.principal = Some(signed_in.principal.clone());
    sessions
        .put(&signed_in.session_id(), session)
        .await
        .map_err(AuthError::Unavailable)?;
    if let Some(id) = session_id {
        sessions.clear(id).await.map_err(AuthError::Unavailable)?;
    }

    info!("admin signed in");
    Ok(signed_in)
}

async fn code_login(
    state: &AuthState,
    session_id: Option<&SessionId>,
    email: &str,
    code: &str,
) -> Result<SignedIn, AuthError> {
    let Some(session_id) = session_id else {
        debug!("no session to hold a pending code");
        return Err(AuthError::InvalidCredentials);
    };

    let sessions = state.sessions();
    let Some(challenge) = sessions
        .get(session_id)
        .await
        .map_err(AuthError::Unavailable)?
        .and_then(|session: Session| session.pending_challenge)
    else {
        debug!("no pending code for session");
        return Err(AuthError::InvalidCredentials);
    };

    if !challenge.accepts(email, code, state.config().otp_ttl()) {
        debug!("pending code rejected");
        return Err(AuthError::InvalidCredentials);
    }

    let signed_in = SignedIn {
        principal: Principal::new(email, Role::User),
        token: generate_session_token().map_err(AuthError::Unavailable)?,
    };
    let redeemed = sessions
        .redeem(
            session_id,
            &signed_in.session_id(),
            &challenge,
            signed_in.principal.clone(),
        )
        .await
        .map_err(AuthError::Unavailable)?;

    if redeemed {
        info!("user signed in with one-time code");
        Ok(signed_in)
    } else {
        // Another request consumed or replaced the code between read and redeem.
        warn!("one-time code already redeemed");
        Err(AuthError::InvalidCredentials)
    }
}

/// Drop the whole session. Missing sessions are not an error.
///
/// # Errors
/// `Unavailable` when the session store fails.
pub async fn logout(state: &AuthState, session_id: &SessionId) -> Result<(), AuthError> {
    state
        .sessions()
        .clear(session_id)
        .await
        .map_err(AuthError::Unavailable)
}

/// Rotate an admin's stored password and mail the new one to them.
///
/// Unknown emails and non-admin records both answer `NotAdmin`. The new password
/// only stays in place once it has been delivered; otherwise the previous one is
/// written back.
///
/// # Errors
/// `NotAdmin`, `Unavailable` when the credential cannot be persisted (the old one
/// stays valid), `SendFailed` when the new credential could not be delivered.
#[instrument(skip(state))]
pub async fn reset_admin_password(
    state: &AuthState,
    email: &str,
) -> Result<SecretString, AuthError> {
    let email = clean_email(email);
    let record = state
        .credentials()
        .lookup(email)
        .await
        .map_err(AuthError::Unavailable)?;

    let Credential::Admin(previous) = Credential::from(record) else {
        return Err(AuthError::NotAdmin);
    };

    let credential = SecretString::from(generate_admin_secret().map_err(AuthError::Unavailable)?);
    state
        .credentials()
        .upsert(email, &credential, Role::Admin)
        .await
        .map_err(AuthError::Unavailable)?;

    let message = EmailMessage {
        from: state.config().mail_from().to_string(),
        to: email.to_string(),
        subject: RESET_SUBJECT.to_string(),
        body: format!("Your new admin password is {}", credential.expose_secret()),
        redact_body: true,
    };
    match timeout(state.config().notifier_timeout(), state.notifier().send(&message)).await {
        Ok(Ok(())) => {
            info!("admin password reset delivered");
            return Ok(credential);
        }
        Ok(Err(err)) => error!("failed to deliver admin password reset: {err:#}"),
        Err(_) => warn!("admin password reset delivery timed out"),
    }

    // Nobody received the new password, so the old one must keep working.
    if let Err(err) = state
        .credentials()
        .upsert(email, &previous, Role::Admin)
        .await
    {
        error!("failed to restore admin password after undelivered reset: {err:#}");
        return Err(AuthError::Unavailable(err));
    }
    Err(AuthError::SendFailed)
}
