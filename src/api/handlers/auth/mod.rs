//! Auth handlers and supporting modules.
//!
//! Two ways to sign in share one login endpoint:
//!
//! - **Admins** authenticate with the password stored in the `users` table. The
//!   session's pending code is never read on this path.
//! - **Everyone else** (users and emails with no record at all) requests a 6-digit
//!   code by email and submits it as the password. Codes are bound to the session
//!   that requested them, expire after `--otp-ttl-seconds` and are single-use.
//!
//! ## Sessions
//!
//! The client holds an opaque token (cookie `seportal_session` or a bearer header);
//! the server keys session state by its SHA-256. Sessions live in memory, so a
//! restart signs everybody out.
//!
//! ## Admin Password Reset
//!
//! `POST /v1/auth/admin/reset-password` rotates an admin's password and mails the new
//! one. The new password is stored before it is sent.

pub(crate) mod admin;
pub(crate) mod credentials;
pub(crate) mod error;
pub(crate) mod gate;
pub(crate) mod login;
mod machine;
mod otp;
pub(crate) mod principal;
pub(crate) mod session;
mod state;
pub(crate) mod store;
pub(crate) mod types;
mod utils;

pub use credentials::{CredentialStore, MemoryCredentialStore, MySqlCredentialStore};
pub use error::AuthError;
pub use gate::Capability;
pub use principal::{Principal, Role};
pub use state::{AuthConfig, AuthState};
pub use store::{MemorySessionStore, SessionStore};
