use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{self, Error};
use crate::model::{
    DeliveryLogEntry, DeliveryStatus, NewDeliveryLog, NotificationKind, NotificationPreference,
    PreferenceFlags, Product, Subscription, User,
};
use crate::repo::{
    CatalogRepo, DeliveryLogRepo, MemoryStore, PreferenceRepo, Repository, SubscriptionRepo,
};

use super::sender::{Channel, ChannelFailure, ChannelSender, Delivery, DeliveryError};
use super::{NotifierConfig, Services};

/// Channel sender that succeeds or fails on command and records every delivery
#[derive(Debug, Clone)]
pub struct ScriptedSender {
    failure: Arc<Mutex<Option<String>>>,
    deliveries: Arc<Mutex<Vec<Delivery>>>,
    yield_before_reply: Arc<AtomicBool>,
}

impl ScriptedSender {
    pub fn succeeding() -> Self {
        Self {
            failure: Arc::new(Mutex::new(None)),
            deliveries: Arc::default(),
            yield_before_reply: Arc::default(),
        }
    }

    pub fn failing(reason: &str) -> Self {
        let sender = Self::succeeding();
        sender.fail(reason);
        sender
    }

    pub fn succeed(&self) {
        *self.failure.lock() = None;
    }

    pub fn fail(&self, reason: &str) {
        *self.failure.lock() = Some(reason.into());
    }

    /// Give other tasks a chance to run between receiving a delivery and replying
    pub fn yielding(self) -> Self {
        self.yield_before_reply.store(true, Ordering::SeqCst);
        self
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }
}

#[async_trait::async_trait]
impl ChannelSender for ScriptedSender {
    async fn send(&self, delivery: &Delivery) -> Result<(), DeliveryError> {
        self.deliveries.lock().push(delivery.clone());
        if self.yield_before_reply.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }

        let failure = self.failure.lock().clone();
        match failure {
            Some(reason) => Err(DeliveryError::ChannelsFailed(vec![ChannelFailure {
                channel: Channel::Email,
                reason,
            }])),
            None => Ok(()),
        }
    }
}

/// Services over a store seeded with user 1 and product 7 (out of stock)
pub fn fixture(sender: ScriptedSender) -> (Arc<MemoryStore>, Services) {
    let store = Arc::new(MemoryStore::new());
    store.insert_user(1, "Ada", "ada@example.com");
    store.insert_user(42, "Alan", "alan@example.com");
    store.insert_product(7, "Kettle", 0);

    let repo: Arc<dyn Repository> = store.clone();
    let services = Services::new(repo, Arc::new(sender), NotifierConfig::default());
    (store, services)
}

/// Store whose delivery log rejects inserts for one subscription, as a broken connection would
pub struct FlakyStore {
    inner: Arc<MemoryStore>,
    failing_subscription: i64,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryStore>, failing_subscription: i64) -> Self {
        Self {
            inner,
            failing_subscription,
        }
    }
}

#[async_trait::async_trait]
impl CatalogRepo for FlakyStore {
    async fn find_user(&self, user_id: i64) -> error::Result<Option<User>> {
        self.inner.find_user(user_id).await
    }

    async fn find_product(&self, product_id: i64) -> error::Result<Option<Product>> {
        self.inner.find_product(product_id).await
    }

    async fn replace_stock(&self, product_id: i64, stock: i32) -> error::Result<Option<i32>> {
        self.inner.replace_stock(product_id, stock).await
    }
}

#[async_trait::async_trait]
impl SubscriptionRepo for FlakyStore {
    async fn upsert_subscription(
        &self,
        user_id: i64,
        product_id: i64,
        kind: NotificationKind,
    ) -> error::Result<Subscription> {
        self.inner
            .upsert_subscription(user_id, product_id, kind)
            .await
    }

    async fn delete_subscription(&self, subscription_id: i64) -> error::Result<bool> {
        self.inner.delete_subscription(subscription_id).await
    }

    async fn find_subscription(&self, subscription_id: i64) -> error::Result<Option<Subscription>> {
        self.inner.find_subscription(subscription_id).await
    }

    async fn find_by_user(&self, user_id: i64) -> error::Result<Vec<Subscription>> {
        self.inner.find_by_user(user_id).await
    }

    async fn find_by_product(&self, product_id: i64) -> error::Result<Vec<Subscription>> {
        self.inner.find_by_product(product_id).await
    }

    async fn find_unsent_by_product(&self, product_id: i64) -> error::Result<Vec<Subscription>> {
        self.inner.find_unsent_by_product(product_id).await
    }

    async fn exists(&self, user_id: i64, product_id: i64) -> error::Result<bool> {
        self.inner.exists(user_id, product_id).await
    }

    async fn mark_sent(&self, subscription_id: i64) -> error::Result<bool> {
        self.inner.mark_sent(subscription_id).await
    }

    async fn reset_for_product(&self, product_id: i64) -> error::Result<u64> {
        self.inner.reset_for_product(product_id).await
    }
}

#[async_trait::async_trait]
impl DeliveryLogRepo for FlakyStore {
    async fn insert_entry(&self, new_entry: &NewDeliveryLog) -> error::Result<DeliveryLogEntry> {
        if new_entry.subscription_id == self.failing_subscription {
            return Err(Error::DatabaseError(sqlx::Error::PoolTimedOut));
        }
        self.inner.insert_entry(new_entry).await
    }

    async fn find_entry(&self, log_id: i64) -> error::Result<Option<DeliveryLogEntry>> {
        self.inner.find_entry(log_id).await
    }

    async fn set_status(
        &self,
        log_id: i64,
        status: DeliveryStatus,
        error_message: Option<&str>,
    ) -> error::Result<()> {
        self.inner.set_status(log_id, status, error_message).await
    }

    async fn claim_retry(&self, log_id: i64) -> error::Result<Option<DeliveryLogEntry>> {
        self.inner.claim_retry(log_id).await
    }

    async fn abandon(&self, log_id: i64, error_message: &str) -> error::Result<()> {
        self.inner.abandon(log_id, error_message).await
    }

    async fn abandon_for_product(&self, product_id: i64, error_message: &str) -> error::Result<u64> {
        self.inner
            .abandon_for_product(product_id, error_message)
            .await
    }

    async fn list_retryable(&self) -> error::Result<Vec<DeliveryLogEntry>> {
        self.inner.list_retryable().await
    }

    async fn list_for_user(
        &self,
        user_id: i64,
        status: Option<DeliveryStatus>,
    ) -> error::Result<Vec<DeliveryLogEntry>> {
        self.inner.list_for_user(user_id, status).await
    }
}

#[async_trait::async_trait]
impl PreferenceRepo for FlakyStore {
    async fn get_or_create(&self, user_id: i64) -> error::Result<NotificationPreference> {
        self.inner.get_or_create(user_id).await
    }

    async fn upsert_preferences(
        &self,
        user_id: i64,
        flags: PreferenceFlags,
    ) -> error::Result<NotificationPreference> {
        self.inner.upsert_preferences(user_id, flags).await
    }
}
