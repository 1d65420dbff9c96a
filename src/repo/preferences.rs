use crate::error::Result;
use crate::model::{NotificationPreference, PreferenceFlags};

use super::PgStore;

/// Per-user channel preferences
#[async_trait::async_trait]
pub trait PreferenceRepo: Send + Sync {
    /// Fetch the preferences of a user, persisting the defaults first if none exist
    async fn get_or_create(&self, user_id: i64) -> Result<NotificationPreference>;

    /// Replace all four flags of a user, creating the record if none exists
    async fn upsert_preferences(&self, user_id: i64, flags: PreferenceFlags)
        -> Result<NotificationPreference>;
}

const COLUMNS: &str = "id, user_id, email_enabled, push_enabled, sms_enabled, in_app_enabled, created_at, updated_at";

#[async_trait::async_trait]
impl PreferenceRepo for PgStore {
    #[tracing::instrument(name = "Get or create preferences", skip(self))]
    async fn get_or_create(&self, user_id: i64) -> Result<NotificationPreference> {
        let defaults = PreferenceFlags::default();
        // A concurrent creator wins silently; both callers read the same row afterwards
        sqlx::query(
            r#"
            insert into notification_preferences(user_id, email_enabled, push_enabled, sms_enabled, in_app_enabled)
            values ($1, $2, $3, $4, $5)
            on conflict (user_id) do nothing
            "#,
        )
        .bind(user_id)
        .bind(defaults.email)
        .bind(defaults.push)
        .bind(defaults.sms)
        .bind(defaults.in_app)
        .execute(self.pool())
        .await?;

        let query = format!("select {COLUMNS} from notification_preferences where user_id=$1");
        let preference = sqlx::query_as::<_, NotificationPreference>(&query)
            .bind(user_id)
            .fetch_one(self.pool())
            .await?;
        Ok(preference)
    }

    #[tracing::instrument(name = "Upsert preferences", skip(self))]
    async fn upsert_preferences(
        &self,
        user_id: i64,
        flags: PreferenceFlags,
    ) -> Result<NotificationPreference> {
        let query = format!(
            r#"
            insert into notification_preferences(user_id, email_enabled, push_enabled, sms_enabled, in_app_enabled)
            values ($1, $2, $3, $4, $5)
            on conflict (user_id) do update set
                email_enabled=excluded.email_enabled,
                push_enabled=excluded.push_enabled,
                sms_enabled=excluded.sms_enabled,
                in_app_enabled=excluded.in_app_enabled,
                updated_at=now()
            returning {COLUMNS}
            "#
        );
        let preference = sqlx::query_as::<_, NotificationPreference>(&query)
            .bind(user_id)
            .bind(flags.email)
            .bind(flags.push)
            .bind(flags.sms)
            .bind(flags.in_app)
            .fetch_one(self.pool())
            .await?;
        Ok(preference)
    }
}
