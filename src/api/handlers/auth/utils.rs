//! Small helpers for auth validation and token handling.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Trim surrounding whitespace only. Emails are case-sensitive as stored.
pub(crate) fn clean_email(email: &str) -> &str {
    email.trim()
}

/// Basic email format check.
pub(crate) fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}

fn random_token(len: usize) -> Result<String> {
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to read from the OS random source")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Create a new session token for the auth cookie.
/// The raw value is only returned to set the cookie; the session store keys on its hash.
pub(crate) fn generate_session_token() -> Result<String> {
    random_token(32).context("failed to generate session token")
}

/// Create a replacement admin credential for a password reset.
pub(crate) fn generate_admin_secret() -> Result<String> {
    random_token(24).context("failed to generate admin credential")
}

/// Hash a session token so raw values never sit in the session store.
pub(crate) fn hash_session_token(token: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Byte-for-byte comparison that does not short-circuit on the first mismatch.
pub(crate) fn secrets_match(expected: &str, provided: &str) -> bool {
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}
