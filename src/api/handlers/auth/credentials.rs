//! Credential records and the stores that hold them.

use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sqlx::{MySqlPool, Row};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{info_span, Instrument};

use super::principal::Role;

/// One row of the `users` table.
#[derive(Clone, Debug)]
pub struct CredentialRecord {
    pub email: String,
    pub credential: SecretString,
    pub role: Role,
}

/// How a login attempt for an email must be authenticated.
#[derive(Debug)]
pub enum Credential {
    Admin(SecretString),
    User,
    Unknown,
}

impl From<Option<CredentialRecord>> for Credential {
    fn from(record: Option<CredentialRecord>) -> Self {
        match record {
            Some(CredentialRecord {
                role: Role::Admin,
                credential,
                ..
            }) => Self::Admin(credential),
            Some(_) => Self::User,
            None => Self::Unknown,
        }
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn lookup(&self, email: &str) -> Result<Option<CredentialRecord>>;

    async fn upsert(&self, email: &str, credential: &SecretString, role: Role) -> Result<()>;
}

/// `users` table in the application database.
#[derive(Clone, Debug)]
pub struct MySqlCredentialStore {
    pool: MySqlPool,
}

impl MySqlCredentialStore {
    #[must_use]
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for MySqlCredentialStore {
    async fn lookup(&self, email: &str) -> Result<Option<CredentialRecord>> {
        let query = "SELECT email, password, role FROM users WHERE email = ? LIMIT 1";
        let span = info_span!(
            "db.query",
            db.system = "mysql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup credential record")?;

        row.map(|row| -> Result<CredentialRecord> {
            let password: Option<String> = row.try_get("password")?;
            let role: String = row.try_get("role")?;
            Ok(CredentialRecord {
                email: row.try_get("email")?,
                credential: SecretString::from(password.unwrap_or_default()),
                role: Role::from_stored(&role),
            })
        })
        .transpose()
        .context("failed to decode credential record")
    }

    async fn upsert(&self, email: &str, credential: &SecretString, role: Role) -> Result<()> {
        let query = r"
            INSERT INTO users (email, password, role)
            VALUES (?, ?, ?)
            ON DUPLICATE KEY UPDATE password = VALUES(password), role = VALUES(role)
        ";
        let span = info_span!(
            "db.query",
            db.system = "mysql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(email)
            .bind(credential.expose_secret())
            .bind(role.as_str())
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to upsert credential record")?;
        Ok(())
    }
}

/// In-process credential table for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    records: RwLock<HashMap<String, CredentialRecord>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style seeding helper.
    #[must_use]
    pub fn with_record(mut self, email: &str, credential: &str, role: Role) -> Self {
        self.records.get_mut().insert(
            email.to_string(),
            CredentialRecord {
                email: email.to_string(),
                credential: SecretString::from(credential.to_string()),
                role,
            },
        );
        self
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn lookup(&self, email: &str) -> Result<Option<CredentialRecord>> {
        Ok(self.records.read().await.get(email).cloned())
    }

    async fn upsert(&self, email: &str, credential: &SecretString, role: Role) -> Result<()> {
        self.records.write().await.insert(
            email.to_string(),
            CredentialRecord {
                email: email.to_string(),
                credential: credential.clone(),
                role,
            },
        );
        Ok(())
    }
}

/// Test store whose database is unreachable.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FailingCredentialStore;

#[cfg(test)]
#[async_trait]
impl CredentialStore for FailingCredentialStore {
    async fn lookup(&self, _email: &str) -> Result<Option<CredentialRecord>> {
        Err(anyhow::anyhow!("connection refused")).context("failed to lookup credential record")
    }

    async fn upsert(&self, _email: &str, _credential: &SecretString, _role: Role) -> Result<()> {
        Err(anyhow::anyhow!("connection refused")).context("failed to upsert credential record")
    }
}
