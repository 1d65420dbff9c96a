use sqlx::PgPool;

mod catalog;
mod delivery_log;
mod memory;
mod preferences;
mod subscriptions;

pub use catalog::CatalogRepo;
pub use delivery_log::DeliveryLogRepo;
pub use memory::MemoryStore;
pub use preferences::PreferenceRepo;
pub use subscriptions::SubscriptionRepo;

/// Everything the notification services need from storage.
/// NOTE: Implemented automatically for any type implementing all four repositories
pub trait Repository: CatalogRepo + SubscriptionRepo + DeliveryLogRepo + PreferenceRepo {}

impl<T> Repository for T where T: CatalogRepo + SubscriptionRepo + DeliveryLogRepo + PreferenceRepo {}

/// Postgres-backed store
/// Each method acquires a pooled connection for the duration of a single statement
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
