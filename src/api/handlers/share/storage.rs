//! Persistence for shared report records.
//!
//! All lockout state lives in `PostgreSQL` so every instance of the service sees the
//! same counters. Writes are conditional on the previously observed
//! `(failed_attempts, locked_until)` pair; a lost race is reported to the caller,
//! which re-reads and re-evaluates instead of overwriting a concurrent increment.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::Instrument;
use uuid::Uuid;

use super::types::{AttemptState, ProtectedResource};

#[async_trait]
pub trait ShareStore: Send + Sync {
    /// Most recently created, non-deleted record for `token`.
    async fn find_active_by_token(&self, token: &str) -> Result<Option<ProtectedResource>>;

    /// Fresh read of a non-deleted record.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ProtectedResource>>;

    /// Store `next` only if the record still holds `expected`.
    ///
    /// Returns `false` when another writer changed the counters first.
    async fn compare_and_set_attempts(
        &self,
        id: Uuid,
        expected: AttemptState,
        next: AttemptState,
    ) -> Result<bool>;

    async fn ping(&self) -> Result<()>;
}

const RESOURCE_COLUMNS: &str = "id, share_token, object_id, is_password_protected, \
     password_salt, password_hash, failed_attempts, locked_until, created_at, deleted_at";

#[derive(Clone, Debug)]
pub struct PgShareStore {
    pool: PgPool,
}

impl PgShareStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn resource_from_row(row: &PgRow) -> Result<ProtectedResource, sqlx::Error> {
    let failed_attempts: i32 = row.try_get("failed_attempts")?;
    Ok(ProtectedResource {
        id: row.try_get("id")?,
        share_token: row.try_get("share_token")?,
        object_id: row.try_get("object_id")?,
        is_password_protected: row.try_get("is_password_protected")?,
        password_salt: row.try_get("password_salt")?,
        password_hash: row.try_get("password_hash")?,
        // Negative values are rejected by a CHECK constraint.
        failed_attempts: u32::try_from(failed_attempts).unwrap_or(0),
        locked_until: row.try_get("locked_until")?,
        created_at: row.try_get("created_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn attempts_to_db(attempts: u32) -> i32 {
    i32::try_from(attempts).unwrap_or(i32::MAX)
}

#[async_trait]
impl ShareStore for PgShareStore {
    async fn find_active_by_token(&self, token: &str) -> Result<Option<ProtectedResource>> {
        let query = format!(
            "SELECT {RESOURCE_COLUMNS} FROM shared_reports \
             WHERE share_token = $1 AND deleted_at IS NULL \
             ORDER BY created_at DESC LIMIT 1"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(token)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup shared report by token")?;

        row.as_ref()
            .map(resource_from_row)
            .transpose()
            .context("failed to decode shared report")
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ProtectedResource>> {
        let query = format!(
            "SELECT {RESOURCE_COLUMNS} FROM shared_reports WHERE id = $1 AND deleted_at IS NULL"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup shared report by id")?;

        row.as_ref()
            .map(resource_from_row)
            .transpose()
            .context("failed to decode shared report")
    }

    async fn compare_and_set_attempts(
        &self,
        id: Uuid,
        expected: AttemptState,
        next: AttemptState,
    ) -> Result<bool> {
        // Zero rows affected means another writer changed the counters first.
        let query = r"
            UPDATE shared_reports
            SET failed_attempts = $4, locked_until = $5
            WHERE id = $1
              AND deleted_at IS NULL
              AND failed_attempts = $2
              AND locked_until IS NOT DISTINCT FROM $3
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .bind(attempts_to_db(expected.failed_attempts))
            .bind(expected.locked_until)
            .bind(attempts_to_db(next.failed_attempts))
            .bind(next.locked_until)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update share attempt counters")?;

        Ok(result.rows_affected() == 1)
    }

    async fn ping(&self) -> Result<()> {
        let span = tracing::info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to ping database")?;
        Ok(())
    }
}
