//! Authenticated principal and role types.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    /// Parse a stored role column. Anything that is not exactly `admin` is a user.
    #[must_use]
    pub fn from_stored(value: &str) -> Self {
        if value.trim() == "admin" {
            Self::Admin
        } else {
            Self::User
        }
    }
}

/// Identity attached to a session after a successful login.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Principal {
    pub email: String,
    pub role: Role,
}

impl Principal {
    #[must_use]
    pub fn new(email: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            role,
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
