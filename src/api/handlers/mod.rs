//! API handlers for Seportal.
//!
//! `auth` owns sessions, login and the authorization gate; `records` serves the
//! compliance table through it.

pub mod auth;
pub mod health;
pub mod records;
