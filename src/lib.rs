//! # Seportal (statutory compliance records)
//!
//! `seportal` serves the `se_data` compliance table behind a small login flow and
//! server-side sessions.
//!
//! ## Authentication
//!
//! There are two ways into a session, chosen per login attempt from the stored
//! credential record:
//!
//! - **Admin password:** rows with role `admin` authenticate with their stored secret.
//!   A wrong password is rejected outright; it never falls through to the code check.
//! - **One-time code:** everyone else requests a 6-digit code by email and submits it
//!   as the password. The code lives only in the requesting session, expires after a
//!   few minutes and is consumed on first use.
//!
//! ## Authorization
//!
//! Every operation declares one capability: `authenticated` (any principal) or
//! `admin`. Record listing needs a session; creating, editing or deleting records
//! needs an admin session. The check runs before any storage access.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
