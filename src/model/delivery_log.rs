use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use serde::{Deserialize, Serialize};

use super::NotificationKind;

pub const DEFAULT_MAX_RETRIES: i32 = 3;

/// Outcome of a delivery attempt
///
/// `Pending -> Sent` and `Failed -> Retried` are the terminal successes.
/// A `Failed` entry stays recoverable until its retry budget is spent;
/// claiming a retry moves it back to `Pending` until the resend settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
    Retried,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Retried => "retried",
        }
    }

    /// Whether this status records a successful delivery
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Sent | Self::Retried)
    }
}

impl FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            "retried" => Ok(Self::Retried),
            other => Err(format!("{} is not a delivery status", other)),
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A delivery attempt about to be recorded as `pending`
#[derive(Debug, Clone)]
pub struct NewDeliveryLog {
    pub subscription_id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub channel_type: NotificationKind,
    pub message: String,
    pub max_retries: i32,
}

/// Stored delivery attempt
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryLogEntry {
    pub id: i64,
    /// The subscription being delivered; retries always go back to this one
    pub subscription_id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub channel_type: NotificationKind,
    pub message: String,
    pub status: DeliveryStatus,
    pub retry_count: i32,
    pub max_retries: i32,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryLogEntry {
    /// A failed entry that still has retry budget left
    pub fn is_retryable(&self) -> bool {
        self.status == DeliveryStatus::Failed && self.retry_count < self.max_retries
    }
}
