use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::model::{NotificationKind, Subscription};

use super::PgStore;

/// Subscription registry, must be implemented for each store used.
/// NOTE: Intended to facilitate easier testing/mocking
#[async_trait::async_trait]
pub trait SubscriptionRepo: Send + Sync {
    /// Insert a subscription, or reset the existing one for the same
    /// (user, product, kind) to unsent. Never creates a duplicate.
    async fn upsert_subscription(
        &self,
        user_id: i64,
        product_id: i64,
        kind: NotificationKind,
    ) -> Result<Subscription>;

    /// Delete a subscription, returning whether a row was removed
    async fn delete_subscription(&self, subscription_id: i64) -> Result<bool>;

    /// Fetch a subscription by id
    async fn find_subscription(&self, subscription_id: i64) -> Result<Option<Subscription>>;

    /// All subscriptions of a user, newest first
    async fn find_by_user(&self, user_id: i64) -> Result<Vec<Subscription>>;

    /// All subscriptions on a product, newest first
    async fn find_by_product(&self, product_id: i64) -> Result<Vec<Subscription>>;

    /// Subscriptions on a product still waiting for a delivery, oldest first
    async fn find_unsent_by_product(&self, product_id: i64) -> Result<Vec<Subscription>>;

    /// Whether the user holds any subscription on the product, sent or not
    async fn exists(&self, user_id: i64, product_id: i64) -> Result<bool>;

    /// Flip `is_sent` from false to true. Returns `false` if the subscription
    /// is missing or was already marked by someone else.
    async fn mark_sent(&self, subscription_id: i64) -> Result<bool>;

    /// Make every subscription on a product eligible for the next restock
    async fn reset_for_product(&self, product_id: i64) -> Result<u64>;
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id: i64,
    product_id: i64,
    user_id: i64,
    notification_type: String,
    is_sent: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    sent_at: Option<DateTime<Utc>>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = Error;

    fn try_from(row: SubscriptionRow) -> Result<Self> {
        let channel_type = row.notification_type.parse().map_err(Error::Corrupt)?;

        Ok(Self {
            id: row.id,
            product_id: row.product_id,
            user_id: row.user_id,
            channel_type,
            is_sent: row.is_sent,
            created_at: row.created_at,
            updated_at: row.updated_at,
            sent_at: row.sent_at,
        })
    }
}

fn into_subscriptions(rows: Vec<SubscriptionRow>) -> Result<Vec<Subscription>> {
    rows.into_iter().map(Subscription::try_from).collect()
}

const COLUMNS: &str =
    "id, product_id, user_id, notification_type, is_sent, created_at, updated_at, sent_at";

#[async_trait::async_trait]
impl SubscriptionRepo for PgStore {
    #[tracing::instrument(name = "Upsert subscription", skip(self))]
    async fn upsert_subscription(
        &self,
        user_id: i64,
        product_id: i64,
        kind: NotificationKind,
    ) -> Result<Subscription> {
        let query = format!(
            r#"
            insert into product_notifications(product_id, user_id, notification_type, is_sent)
            values ($1, $2, $3, false)
            on conflict (user_id, product_id, notification_type)
            do update set is_sent=false, sent_at=null, updated_at=now()
            returning {COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, SubscriptionRow>(&query)
            .bind(product_id)
            .bind(user_id)
            .bind(kind.as_str())
            .fetch_one(self.pool())
            .await?;

        row.try_into()
    }

    #[tracing::instrument(name = "Delete subscription", skip(self))]
    async fn delete_subscription(&self, subscription_id: i64) -> Result<bool> {
        let result = sqlx::query("delete from product_notifications where id=$1")
            .bind(subscription_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(name = "Fetch subscription by id", skip(self))]
    async fn find_subscription(&self, subscription_id: i64) -> Result<Option<Subscription>> {
        let query = format!("select {COLUMNS} from product_notifications where id=$1");
        sqlx::query_as::<_, SubscriptionRow>(&query)
            .bind(subscription_id)
            .fetch_optional(self.pool())
            .await?
            .map(Subscription::try_from)
            .transpose()
    }

    #[tracing::instrument(name = "Fetch subscriptions of a user", skip(self))]
    async fn find_by_user(&self, user_id: i64) -> Result<Vec<Subscription>> {
        let query = format!(
            "select {COLUMNS} from product_notifications where user_id=$1 order by created_at desc, id desc"
        );
        let rows = sqlx::query_as::<_, SubscriptionRow>(&query)
            .bind(user_id)
            .fetch_all(self.pool())
            .await?;
        into_subscriptions(rows)
    }

    #[tracing::instrument(name = "Fetch subscribers of a product", skip(self))]
    async fn find_by_product(&self, product_id: i64) -> Result<Vec<Subscription>> {
        let query = format!(
            "select {COLUMNS} from product_notifications where product_id=$1 order by created_at desc, id desc"
        );
        let rows = sqlx::query_as::<_, SubscriptionRow>(&query)
            .bind(product_id)
            .fetch_all(self.pool())
            .await?;
        into_subscriptions(rows)
    }

    #[tracing::instrument(name = "Fetch unsent subscriptions of a product", skip(self))]
    async fn find_unsent_by_product(&self, product_id: i64) -> Result<Vec<Subscription>> {
        let query = format!(
            "select {COLUMNS} from product_notifications where product_id=$1 and is_sent=false order by created_at asc, id asc"
        );
        let rows = sqlx::query_as::<_, SubscriptionRow>(&query)
            .bind(product_id)
            .fetch_all(self.pool())
            .await?;
        into_subscriptions(rows)
    }

    #[tracing::instrument(name = "Check subscription exists", skip(self))]
    async fn exists(&self, user_id: i64, product_id: i64) -> Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "select exists(select 1 from product_notifications where user_id=$1 and product_id=$2)",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(self.pool())
        .await?;
        Ok(exists)
    }

    #[tracing::instrument(name = "Mark subscription as sent", skip(self))]
    async fn mark_sent(&self, subscription_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "update product_notifications set is_sent=true, sent_at=now(), updated_at=now() where id=$1 and is_sent=false",
        )
        .bind(subscription_id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(name = "Reset subscriptions of a product", skip(self))]
    async fn reset_for_product(&self, product_id: i64) -> Result<u64> {
        let result = sqlx::query(
            "update product_notifications set is_sent=false, sent_at=null, updated_at=now() where product_id=$1 and is_sent=true",
        )
        .bind(product_id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }
}
