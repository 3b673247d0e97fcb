//! Persistence for `se_data`.

use anyhow::Context;
use async_trait::async_trait;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use sqlx::{mysql::MySqlRow, Connection, MySql, MySqlPool, QueryBuilder, Row};
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info_span, Instrument};

use super::types::{ComplianceRecord, RecordFilter, RecordInput};
use crate::api::handlers::auth::error::ErrorBody;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record not found")]
    NotFound,
    #[error("record store unavailable: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl IntoResponse for RecordError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound => {
                (StatusCode::NOT_FOUND, Json(ErrorBody::new("not_found"))).into_response()
            }
            Self::Store(err) => {
                error!("record store unavailable: {err:#}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(ErrorBody::new("unavailable")),
                )
                    .into_response()
            }
        }
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Cheap liveness probe for `/health`.
    async fn ping(&self) -> Result<(), RecordError>;

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<ComplianceRecord>, RecordError>;

    async fn create(&self, input: RecordInput) -> Result<ComplianceRecord, RecordError>;

    async fn update(&self, id: u64, input: RecordInput) -> Result<ComplianceRecord, RecordError>;

    async fn delete(&self, id: u64) -> Result<(), RecordError>;
}

const SELECT_COLUMNS: &str = "SELECT id, state, location, establishment, act, details FROM se_data";

#[derive(Clone, Debug)]
pub struct MySqlRecordStore {
    pool: MySqlPool,
}

impl MySqlRecordStore {
    #[must_use]
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn find(&self, id: u64) -> Result<Option<ComplianceRecord>, RecordError> {
        let query = format!("{SELECT_COLUMNS} WHERE id = ?");
        let span = info_span!(
            "db.query",
            db.system = "mysql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to fetch record")?;
        Ok(row.map(|row| decode_row(&row)).transpose()?)
    }
}

fn decode_row(row: &MySqlRow) -> anyhow::Result<ComplianceRecord> {
    let details: Option<String> = row.try_get("details")?;
    Ok(ComplianceRecord {
        id: row.try_get("id")?,
        state: row.try_get("state")?,
        location: row.try_get("location")?,
        establishment: row.try_get("establishment")?,
        act: row.try_get("act")?,
        details: details.unwrap_or_default(),
    })
}

#[async_trait]
impl RecordStore for MySqlRecordStore {
    async fn ping(&self) -> Result<(), RecordError> {
        let acquire_span = info_span!("db.acquire", db.system = "mysql", db.operation = "ACQUIRE");
        let mut conn = self
            .pool
            .acquire()
            .instrument(acquire_span)
            .await
            .context("failed to acquire database connection")?;
        let ping_span = info_span!("db.ping", db.system = "mysql", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .context("failed to ping database")?;
        Ok(())
    }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<ComplianceRecord>, RecordError> {
        let mut builder = QueryBuilder::<MySql>::new(SELECT_COLUMNS);
        builder.push(" WHERE 1=1");
        if let Some(state) = &filter.state {
            builder.push(" AND state = ").push_bind(state.as_str());
        }
        if let Some(location) = &filter.location {
            builder.push(" AND location = ").push_bind(location.as_str());
        }
        builder.push(" ORDER BY id");

        let span = info_span!(
            "db.query",
            db.system = "mysql",
            db.operation = "SELECT",
            db.statement = builder.sql()
        );
        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list records")?;

        rows.iter()
            .map(decode_row)
            .collect::<anyhow::Result<Vec<_>>>()
            .context("failed to decode records")
            .map_err(RecordError::from)
    }

    async fn create(&self, input: RecordInput) -> Result<ComplianceRecord, RecordError> {
        let query = r"
            INSERT INTO se_data (state, location, establishment, act, details)
            VALUES (?, ?, ?, ?, ?)
        ";
        let span = info_span!(
            "db.query",
            db.system = "mysql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(&input.state)
            .bind(&input.location)
            .bind(&input.establishment)
            .bind(&input.act)
            .bind(&input.details)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert record")?;
        Ok(ComplianceRecord::from_input(result.last_insert_id(), input))
    }

    async fn update(&self, id: u64, input: RecordInput) -> Result<ComplianceRecord, RecordError> {
        let query = r"
            UPDATE se_data
            SET state = ?, location = ?, establishment = ?, act = ?, details = ?
            WHERE id = ?
        ";
        let span = info_span!(
            "db.query",
            db.system = "mysql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(&input.state)
            .bind(&input.location)
            .bind(&input.establishment)
            .bind(&input.act)
            .bind(&input.details)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update record")?;

        // MySQL reports zero affected rows for a no-op update, so confirm by reading back.
        self.find(id).await?.ok_or(RecordError::NotFound)
    }

    async fn delete(&self, id: u64) -> Result<(), RecordError> {
        let query = "DELETE FROM se_data WHERE id = ?";
        let span = info_span!(
            "db.query",
            db.system = "mysql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete record")?;
        if result.rows_affected() == 0 {
            return Err(RecordError::NotFound);
        }
        Ok(())
    }
}

/// In-process record table for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    inner: RwLock<MemoryRecords>,
}

#[derive(Debug, Default)]
struct MemoryRecords {
    next_id: u64,
    rows: BTreeMap<u64, ComplianceRecord>,
}

impl MemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.inner.read().await.rows.len()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn ping(&self) -> Result<(), RecordError> {
        Ok(())
    }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<ComplianceRecord>, RecordError> {
        Ok(self
            .inner
            .read()
            .await
            .rows
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }

    async fn create(&self, input: RecordInput) -> Result<ComplianceRecord, RecordError> {
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let record = ComplianceRecord::from_input(inner.next_id, input);
        inner.rows.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update(&self, id: u64, input: RecordInput) -> Result<ComplianceRecord, RecordError> {
        let mut inner = self.inner.write().await;
        let slot = inner.rows.get_mut(&id).ok_or(RecordError::NotFound)?;
        *slot = ComplianceRecord::from_input(id, input);
        Ok(slot.clone())
    }

    async fn delete(&self, id: u64) -> Result<(), RecordError> {
        self.inner
            .write()
            .await
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or(RecordError::NotFound)
    }
}
