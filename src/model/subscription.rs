use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use serde::Serialize;

/// What a subscriber wants to hear about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Restocked,
    OutOfStock,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restocked => "restocked",
            Self::OutOfStock => "out_of_stock",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "restocked" => Ok(Self::Restocked),
            "out_of_stock" => Ok(Self::OutOfStock),
            other => Err(format!("{} is not a notification kind", other)),
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored interest of a user in a product
#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub id: i64,
    pub product_id: i64,
    pub user_id: i64,
    pub channel_type: NotificationKind,
    /// `false` until a delivery for the current restock cycle succeeds
    pub is_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}
