mod catalog;
mod delivery_log;
mod preference;
mod subscription;

pub use catalog::{Product, User};
pub use delivery_log::{DeliveryLogEntry, DeliveryStatus, NewDeliveryLog, DEFAULT_MAX_RETRIES};
pub use preference::{NotificationPreference, PreferenceFlags};
pub use subscription::{NotificationKind, Subscription};
