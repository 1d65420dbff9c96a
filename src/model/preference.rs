use chrono::{DateTime, Utc};

use serde::{Deserialize, Serialize};

/// The four per-user channel toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceFlags {
    pub email: bool,
    pub push: bool,
    pub sms: bool,
    pub in_app: bool,
}

impl Default for PreferenceFlags {
    fn default() -> Self {
        Self {
            email: true,
            push: false,
            sms: false,
            in_app: true,
        }
    }
}

/// Stored channel preferences, exactly one per user
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct NotificationPreference {
    pub id: i64,
    pub user_id: i64,
    pub email_enabled: bool,
    pub push_enabled: bool,
    pub sms_enabled: bool,
    pub in_app_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationPreference {
    pub fn flags(&self) -> PreferenceFlags {
        PreferenceFlags {
            email: self.email_enabled,
            push: self.push_enabled,
            sms: self.sms_enabled,
            in_app: self.in_app_enabled,
        }
    }
}
