//! One-time code issuing.
//!
//! Flow Overview: generate a 6-digit code, hand it to the notifier, and only once
//! delivery succeeded store it as the session's pending challenge. A failed send
//! leaves the session untouched so an undelivered code can never be guessed into.

use rand::Rng;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, instrument, warn};

use super::{
    error::AuthError,
    state::AuthState,
    store::SessionId,
    utils::{clean_email, valid_email},
};
use crate::api::notifier::EmailMessage;

const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

pub(crate) const OTP_SUBJECT: &str = "Your OTP Code";

/// Pending code bound to one email inside one session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OtpChallenge {
    pub email: String,
    pub code: String,
    pub issued_at: Instant,
}

impl OtpChallenge {
    #[must_use]
    pub fn new(email: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            code: code.into(),
            issued_at: Instant::now(),
        }
    }

    /// A challenge is usable while strictly younger than `ttl`.
    #[must_use]
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.issued_at.elapsed() >= ttl
    }

    /// True when the submitted pair matches and the challenge is still live.
    #[must_use]
    pub fn accepts(&self, email: &str, code: &str, ttl: Duration) -> bool {
        !self.is_expired(ttl) && self.email == email && self.code == code
    }
}

/// Uniform 6-digit numeric code in `[100000, 999999]`.
#[must_use]
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(CODE_MIN..=CODE_MAX).to_string()
}

fn otp_message(email: &str, code: &str, from: &str) -> EmailMessage {
    EmailMessage {
        from: from.to_string(),
        to: email.to_string(),
        subject: OTP_SUBJECT.to_string(),
        body: format!("Your OTP code is {code}"),
        redact_body: false,
    }
}

/// Issue a code for `email` and install it in the session once delivered.
///
/// # Errors
/// `InvalidEmail` for malformed input, `SendFailed` when delivery fails or times out
/// (the session is not modified), `Unavailable` when the session store fails.
#[instrument(skip(state))]
pub async fn issue(state: &AuthState, session_id: &SessionId, email: &str) -> Result<(), AuthError> {
    let email = clean_email(email);
    if email.is_empty() || !valid_email(email) {
        return Err(AuthError::InvalidEmail);
    }

    let code = generate_code();
    let message = otp_message(email, &code, state.config().mail_from());

    match timeout(state.config().notifier_timeout(), state.notifier().send(&message)).await {
        Ok(Ok(())) => debug!("one-time code delivered"),
        Ok(Err(err)) => {
            error!("failed to deliver one-time code: {err:#}");
            return Err(AuthError::SendFailed);
        }
        Err(_) => {
            warn!("one-time code delivery timed out");
            return Err(AuthError::SendFailed);
        }
    }

    let sessions = state.sessions();
    let mut session = sessions
        .get(session_id)
        .await
        .map_err(AuthError::Unavailable)?
        .unwrap_or_default();
    session.pending_challenge = Some(OtpChallenge::new(email, code));
    sessions
        .put(session_id, session)
        .await
        .map_err(AuthError::Unavailable)?;

    Ok(())
}
