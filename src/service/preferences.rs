use std::sync::Arc;

use crate::domain::Entity;
use crate::error::Result;
use crate::model::{NotificationPreference, PreferenceFlags};
use crate::repo::Repository;

/// Per-user channel toggles
pub struct PreferenceStore {
    repo: Arc<dyn Repository>,
}

impl PreferenceStore {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Fetch a user's preferences, persisting the defaults on first access
    #[tracing::instrument(name = "Get notification preferences", skip(self))]
    pub async fn get(&self, user_id: i64) -> Result<NotificationPreference> {
        self.ensure_user(user_id).await?;
        self.repo.get_or_create(user_id).await
    }

    /// Replace all four toggles of a user
    #[tracing::instrument(name = "Update notification preferences", skip(self))]
    pub async fn update(
        &self,
        user_id: i64,
        flags: PreferenceFlags,
    ) -> Result<NotificationPreference> {
        self.ensure_user(user_id).await?;
        self.repo.upsert_preferences(user_id, flags).await
    }

    async fn ensure_user(&self, user_id: i64) -> Result<()> {
        Entity::User.validate_id(user_id)?;
        self.repo
            .find_user(user_id)
            .await?
            .ok_or_else(|| Entity::User.not_found(user_id))?;
        Ok(())
    }
}
