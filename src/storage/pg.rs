//! Relay storage implementation using a PostgreSQL database.

use super::{StorageApi, api::Result};
use crate::{
    error::StorageError,
    types::{AaStateTransaction, AaTransaction, Status, TxId},
};
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::instrument;

/// PostgreSQL storage implementation.
#[derive(Debug)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    /// Creates a new PostgreSQL storage instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn read_with_status(&self, status: Status) -> Result<Vec<AaStateTransaction>> {
        let rows = sqlx::query(
            "select job from aa_jobs where status = $1 order by sender asc, nonce asc, created_at asc",
        )
        .bind(JobStatus::from(status))
        .fetch_all(&self.pool)
        .await
        .map_err(eyre::Error::from)?;

        rows.into_iter().map(decode_job).collect()
    }
}

/// Column representation of [`Status`].
#[derive(Debug, sqlx::Type)]
#[sqlx(type_name = "aa_job_status", rename_all = "lowercase")]
enum JobStatus {
    Queued,
    Pending,
    Completed,
    Failed,
}

impl From<Status> for JobStatus {
    fn from(status: Status) -> Self {
        match status {
            Status::Queued => Self::Queued,
            Status::Pending => Self::Pending,
            Status::Completed => Self::Completed,
            Status::Failed => Self::Failed,
        }
    }
}

fn decode_job(row: PgRow) -> Result<AaStateTransaction> {
    let job: serde_json::Value = row.try_get("job").map_err(eyre::Error::from)?;
    Ok(serde_json::from_value(job)?)
}

#[async_trait]
impl StorageApi for PgStorage {
    #[instrument(skip_all)]
    async fn add(&self, tx: AaTransaction) -> Result<AaStateTransaction> {
        let job = AaStateTransaction::new(tx);

        let inserted = sqlx::query(
            "insert into aa_jobs (id, sender, nonce, status, tx_hash, job, created_at, updated_at) \
             values ($1, $2, $3, $4, $5, $6, $7, $8) on conflict (id) do nothing",
        )
        .bind(job.id.as_slice())
        .bind(job.from().as_slice())
        .bind(job.tx.nonce().to_be_bytes::<32>().to_vec())
        .bind(JobStatus::from(job.status))
        .bind(job.tx_hash().map(|hash| hash.to_vec()))
        .bind(serde_json::to_value(&job)?)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(eyre::Error::from)?;

        if inserted.rows_affected() == 0 {
            return Err(StorageError::AlreadyExists(job.id));
        }

        Ok(job)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: TxId) -> Result<AaStateTransaction> {
        let row = sqlx::query("select job from aa_jobs where id = $1")
            .bind(id.as_slice())
            .fetch_optional(&self.pool)
            .await
            .map_err(eyre::Error::from)?;

        row.map(decode_job).transpose()?.ok_or(StorageError::NotFound(id))
    }

    #[instrument(skip(self))]
    async fn get_all_pending(&self) -> Result<Vec<AaStateTransaction>> {
        self.read_with_status(Status::Pending).await
    }

    #[instrument(skip(self))]
    async fn get_all_queued(&self) -> Result<Vec<AaStateTransaction>> {
        self.read_with_status(Status::Queued).await
    }

    #[instrument(skip_all, fields(id = %job.id, status = %job.status))]
    async fn update(&self, job: &AaStateTransaction) -> Result<()> {
        sqlx::query(
            "insert into aa_jobs (id, sender, nonce, status, tx_hash, job, created_at, updated_at) \
             values ($1, $2, $3, $4, $5, $6, $7, $8) \
             on conflict (id) do update set status = excluded.status, tx_hash = excluded.tx_hash, \
             job = excluded.job, updated_at = excluded.updated_at",
        )
        .bind(job.id.as_slice())
        .bind(job.from().as_slice())
        .bind(job.tx.nonce().to_be_bytes::<32>().to_vec())
        .bind(JobStatus::from(job.status))
        .bind(job.tx_hash().map(|hash| hash.to_vec()))
        .bind(serde_json::to_value(job)?)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(eyre::Error::from)?;

        Ok(())
    }
}
