use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::model::{DeliveryLogEntry, DeliveryStatus, NewDeliveryLog};

use super::PgStore;

/// Append-only record of delivery attempts
#[async_trait::async_trait]
pub trait DeliveryLogRepo: Send + Sync {
    /// Record a new attempt with status `pending` and no retries
    async fn insert_entry(&self, new_entry: &NewDeliveryLog) -> Result<DeliveryLogEntry>;

    /// Fetch an entry by id
    async fn find_entry(&self, log_id: i64) -> Result<Option<DeliveryLogEntry>>;

    /// Move an entry to `status`. Delivered statuses stamp `sent_at`;
    /// an error message replaces the previous one when given.
    async fn set_status(
        &self,
        log_id: i64,
        status: DeliveryStatus,
        error_message: Option<&str>,
    ) -> Result<()>;

    /// Consume one retry of a retryable entry, moving it back to `pending`.
    /// Returns the updated entry, or `None` if it is missing, exhausted, already
    /// claimed or no longer failed. Only one concurrent caller can claim an entry.
    async fn claim_retry(&self, log_id: i64) -> Result<Option<DeliveryLogEntry>>;

    /// Fail an entry for good by spending its whole retry budget
    async fn abandon(&self, log_id: i64, error_message: &str) -> Result<()>;

    /// Abandon every retryable entry of a product, returning how many were closed
    async fn abandon_for_product(&self, product_id: i64, error_message: &str) -> Result<u64>;

    /// Failed entries with retry budget left, oldest first
    async fn list_retryable(&self) -> Result<Vec<DeliveryLogEntry>>;

    /// Entries of a user, newest first, optionally filtered by status
    async fn list_for_user(
        &self,
        user_id: i64,
        status: Option<DeliveryStatus>,
    ) -> Result<Vec<DeliveryLogEntry>>;
}

#[derive(sqlx::FromRow)]
struct DeliveryLogRow {
    id: i64,
    notification_id: i64,
    user_id: i64,
    product_id: i64,
    notification_type: String,
    message: String,
    status: String,
    retry_count: i32,
    max_retries: i32,
    error_message: Option<String>,
    sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DeliveryLogRow> for DeliveryLogEntry {
    type Error = Error;

    fn try_from(row: DeliveryLogRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            subscription_id: row.notification_id,
            user_id: row.user_id,
            product_id: row.product_id,
            channel_type: row.notification_type.parse().map_err(Error::Corrupt)?,
            message: row.message,
            status: row.status.parse().map_err(Error::Corrupt)?,
            retry_count: row.retry_count,
            max_retries: row.max_retries,
            error_message: row.error_message,
            sent_at: row.sent_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_entries(rows: Vec<DeliveryLogRow>) -> Result<Vec<DeliveryLogEntry>> {
    rows.into_iter().map(DeliveryLogEntry::try_from).collect()
}

const COLUMNS: &str = "id, notification_id, user_id, product_id, notification_type, message, status, \
     retry_count, max_retries, error_message, sent_at, created_at, updated_at";

#[async_trait::async_trait]
impl DeliveryLogRepo for PgStore {
    #[tracing::instrument(name = "Insert delivery log entry", skip(self))]
    async fn insert_entry(&self, new_entry: &NewDeliveryLog) -> Result<DeliveryLogEntry> {
        let query = format!(
            r#"
            insert into notification_logs(notification_id, user_id, product_id, notification_type, message, status, retry_count, max_retries)
            values ($1, $2, $3, $4, $5, 'pending', 0, $6)
            returning {COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, DeliveryLogRow>(&query)
            .bind(new_entry.subscription_id)
            .bind(new_entry.user_id)
            .bind(new_entry.product_id)
            .bind(new_entry.channel_type.as_str())
            .bind(&new_entry.message)
            .bind(new_entry.max_retries)
            .fetch_one(self.pool())
            .await?;

        row.try_into()
    }

    #[tracing::instrument(name = "Fetch delivery log entry by id", skip(self))]
    async fn find_entry(&self, log_id: i64) -> Result<Option<DeliveryLogEntry>> {
        let query = format!("select {COLUMNS} from notification_logs where id=$1");
        sqlx::query_as::<_, DeliveryLogRow>(&query)
            .bind(log_id)
            .fetch_optional(self.pool())
            .await?
            .map(DeliveryLogEntry::try_from)
            .transpose()
    }

    #[tracing::instrument(name = "Update delivery log status", skip(self))]
    async fn set_status(
        &self,
        log_id: i64,
        status: DeliveryStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            update notification_logs set
                status=$2,
                error_message=coalesce($3, error_message),
                sent_at=case when $4 then now() else sent_at end,
                updated_at=now()
            where id=$1
            "#,
        )
        .bind(log_id)
        .bind(status.as_str())
        .bind(error_message)
        .bind(status.is_delivered())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    #[tracing::instrument(name = "Claim delivery log retry", skip(self))]
    async fn claim_retry(&self, log_id: i64) -> Result<Option<DeliveryLogEntry>> {
        // Committed before the resend starts, so a crash mid-retry still counts the attempt
        let query = format!(
            r#"
            update notification_logs set status='pending', retry_count=retry_count + 1, updated_at=now()
            where id=$1 and status='failed' and retry_count < max_retries
            returning {COLUMNS}
            "#
        );
        sqlx::query_as::<_, DeliveryLogRow>(&query)
            .bind(log_id)
            .fetch_optional(self.pool())
            .await?
            .map(DeliveryLogEntry::try_from)
            .transpose()
    }

    #[tracing::instrument(name = "Abandon delivery log entry", skip(self))]
    async fn abandon(&self, log_id: i64, error_message: &str) -> Result<()> {
        sqlx::query(
            r#"
            update notification_logs set
                status='failed',
                retry_count=max_retries,
                error_message=$2,
                updated_at=now()
            where id=$1
            "#,
        )
        .bind(log_id)
        .bind(error_message)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    #[tracing::instrument(name = "Abandon retryable entries of a product", skip(self))]
    async fn abandon_for_product(&self, product_id: i64, error_message: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            update notification_logs set
                retry_count=max_retries,
                error_message=$2,
                updated_at=now()
            where product_id=$1 and status='failed' and retry_count < max_retries
            "#,
        )
        .bind(product_id)
        .bind(error_message)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "Fetch retryable delivery log entries", skip(self))]
    async fn list_retryable(&self) -> Result<Vec<DeliveryLogEntry>> {
        let query = format!(
            "select {COLUMNS} from notification_logs where status='failed' and retry_count < max_retries order by created_at asc, id asc"
        );
        let rows = sqlx::query_as::<_, DeliveryLogRow>(&query)
            .fetch_all(self.pool())
            .await?;
        into_entries(rows)
    }

    #[tracing::instrument(name = "Fetch delivery log entries of a user", skip(self))]
    async fn list_for_user(
        &self,
        user_id: i64,
        status: Option<DeliveryStatus>,
    ) -> Result<Vec<DeliveryLogEntry>> {
        let query = format!(
            "select {COLUMNS} from notification_logs where user_id=$1 and ($2::text is null or status=$2) order by created_at desc, id desc"
        );
        let rows = sqlx::query_as::<_, DeliveryLogRow>(&query)
            .bind(user_id)
            .bind(status.map(|status| status.as_str()))
            .fetch_all(self.pool())
            .await?;
        into_entries(rows)
    }
}
