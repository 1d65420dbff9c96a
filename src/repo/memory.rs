use std::collections::{BTreeMap, HashMap};

use chrono::Utc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::model::{
    DeliveryLogEntry, DeliveryStatus, NewDeliveryLog, NotificationKind, NotificationPreference,
    PreferenceFlags, Product, Subscription, User,
};

use super::{CatalogRepo, DeliveryLogRepo, PreferenceRepo, SubscriptionRepo};

/// Store that keeps every table in process memory.
/// NOTE: The lock is never held across an `.await`, so every method is a single atomic step
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    products: BTreeMap<i64, Product>,
    stock: HashMap<i64, i32>,
    subscriptions: BTreeMap<i64, Subscription>,
    logs: BTreeMap<i64, DeliveryLogEntry>,
    preferences: BTreeMap<i64, NotificationPreference>,
    sequences: Sequences,
}

/// Per-table id sequences; ids are never reused, even after deletes
#[derive(Debug, Default)]
struct Sequences {
    subscription: i64,
    log: i64,
    preference: i64,
}

fn next(sequence: &mut i64) -> i64 {
    *sequence += 1;
    *sequence
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user record
    pub fn insert_user(&self, id: i64, name: &str, email: &str) {
        let user = User {
            id,
            name: name.into(),
            email: email.into(),
        };
        self.tables.lock().users.insert(id, user);
    }

    /// Seed a product record with its inventory
    pub fn insert_product(&self, id: i64, name: &str, stock: i32) {
        let product = Product {
            id,
            name: name.into(),
            description: None,
        };
        let mut tables = self.tables.lock();
        tables.products.insert(id, product);
        tables.stock.insert(id, stock);
    }

    /// Current stock of a product, if it has an inventory record
    pub fn stock(&self, product_id: i64) -> Option<i32> {
        self.tables.lock().stock.get(&product_id).copied()
    }
}

#[async_trait::async_trait]
impl CatalogRepo for MemoryStore {
    async fn find_user(&self, user_id: i64) -> Result<Option<User>> {
        Ok(self.tables.lock().users.get(&user_id).cloned())
    }

    async fn find_product(&self, product_id: i64) -> Result<Option<Product>> {
        Ok(self.tables.lock().products.get(&product_id).cloned())
    }

    async fn replace_stock(&self, product_id: i64, stock: i32) -> Result<Option<i32>> {
        let mut tables = self.tables.lock();
        Ok(tables
            .stock
            .get_mut(&product_id)
            .map(|current| std::mem::replace(current, stock)))
    }
}

#[async_trait::async_trait]
impl SubscriptionRepo for MemoryStore {
    async fn upsert_subscription(
        &self,
        user_id: i64,
        product_id: i64,
        kind: NotificationKind,
    ) -> Result<Subscription> {
        let mut tables = self.tables.lock();
        let now = Utc::now();

        let existing = tables.subscriptions.values_mut().find(|s| {
            s.user_id == user_id && s.product_id == product_id && s.channel_type == kind
        });
        if let Some(subscription) = existing {
            subscription.is_sent = false;
            subscription.sent_at = None;
            subscription.updated_at = now;
            return Ok(subscription.clone());
        }

        let id = next(&mut tables.sequences.subscription);
        let subscription = Subscription {
            id,
            product_id,
            user_id,
            channel_type: kind,
            is_sent: false,
            created_at: now,
            updated_at: now,
            sent_at: None,
        };
        tables.subscriptions.insert(id, subscription.clone());
        Ok(subscription)
    }

    async fn delete_subscription(&self, subscription_id: i64) -> Result<bool> {
        Ok(self
            .tables
            .lock()
            .subscriptions
            .remove(&subscription_id)
            .is_some())
    }

    async fn find_subscription(&self, subscription_id: i64) -> Result<Option<Subscription>> {
        Ok(self
            .tables
            .lock()
            .subscriptions
            .get(&subscription_id)
            .cloned())
    }

    async fn find_by_user(&self, user_id: i64) -> Result<Vec<Subscription>> {
        let tables = self.tables.lock();
        Ok(tables
            .subscriptions
            .values()
            .rev()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_by_product(&self, product_id: i64) -> Result<Vec<Subscription>> {
        let tables = self.tables.lock();
        Ok(tables
            .subscriptions
            .values()
            .rev()
            .filter(|s| s.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn find_unsent_by_product(&self, product_id: i64) -> Result<Vec<Subscription>> {
        let tables = self.tables.lock();
        Ok(tables
            .subscriptions
            .values()
            .filter(|s| s.product_id == product_id && !s.is_sent)
            .cloned()
            .collect())
    }

    async fn exists(&self, user_id: i64, product_id: i64) -> Result<bool> {
        let tables = self.tables.lock();
        Ok(tables
            .subscriptions
            .values()
            .any(|s| s.user_id == user_id && s.product_id == product_id))
    }

    async fn mark_sent(&self, subscription_id: i64) -> Result<bool> {
        let mut tables = self.tables.lock();
        match tables.subscriptions.get_mut(&subscription_id) {
            Some(subscription) if !subscription.is_sent => {
                let now = Utc::now();
                subscription.is_sent = true;
                subscription.sent_at = Some(now);
                subscription.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn reset_for_product(&self, product_id: i64) -> Result<u64> {
        let mut tables = self.tables.lock();
        let now = Utc::now();
        let mut reset = 0;
        for subscription in tables.subscriptions.values_mut() {
            if subscription.product_id == product_id && subscription.is_sent {
                subscription.is_sent = false;
                subscription.sent_at = None;
                subscription.updated_at = now;
                reset += 1;
            }
        }
        Ok(reset)
    }
}

#[async_trait::async_trait]
impl DeliveryLogRepo for MemoryStore {
    async fn insert_entry(&self, new_entry: &NewDeliveryLog) -> Result<DeliveryLogEntry> {
        let mut tables = self.tables.lock();
        let now = Utc::now();
        let id = next(&mut tables.sequences.log);
        let entry = DeliveryLogEntry {
            id,
            subscription_id: new_entry.subscription_id,
            user_id: new_entry.user_id,
            product_id: new_entry.product_id,
            channel_type: new_entry.channel_type,
            message: new_entry.message.clone(),
            status: DeliveryStatus::Pending,
            retry_count: 0,
            max_retries: new_entry.max_retries,
            error_message: None,
            sent_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.logs.insert(id, entry.clone());
        Ok(entry)
    }

    async fn find_entry(&self, log_id: i64) -> Result<Option<DeliveryLogEntry>> {
        Ok(self.tables.lock().logs.get(&log_id).cloned())
    }

    async fn set_status(
        &self,
        log_id: i64,
        status: DeliveryStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        let mut tables = self.tables.lock();
        if let Some(entry) = tables.logs.get_mut(&log_id) {
            let now = Utc::now();
            entry.status = status;
            if let Some(message) = error_message {
                entry.error_message = Some(message.to_string());
            }
            if status.is_delivered() {
                entry.sent_at = Some(now);
            }
            entry.updated_at = now;
        }
        Ok(())
    }

    async fn claim_retry(&self, log_id: i64) -> Result<Option<DeliveryLogEntry>> {
        let mut tables = self.tables.lock();
        match tables.logs.get_mut(&log_id) {
            Some(entry) if entry.is_retryable() => {
                entry.status = DeliveryStatus::Pending;
                entry.retry_count += 1;
                entry.updated_at = Utc::now();
                Ok(Some(entry.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn abandon(&self, log_id: i64, error_message: &str) -> Result<()> {
        let mut tables = self.tables.lock();
        if let Some(entry) = tables.logs.get_mut(&log_id) {
            entry.status = DeliveryStatus::Failed;
            entry.retry_count = entry.max_retries;
            entry.error_message = Some(error_message.to_string());
            entry.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn abandon_for_product(&self, product_id: i64, error_message: &str) -> Result<u64> {
        let mut tables = self.tables.lock();
        let now = Utc::now();
        let mut abandoned = 0;
        for entry in tables
            .logs
            .values_mut()
            .filter(|entry| entry.product_id == product_id && entry.is_retryable())
        {
            entry.retry_count = entry.max_retries;
            entry.error_message = Some(error_message.to_string());
            entry.updated_at = now;
            abandoned += 1;
        }
        Ok(abandoned)
    }

    async fn list_retryable(&self) -> Result<Vec<DeliveryLogEntry>> {
        let tables = self.tables.lock();
        Ok(tables
            .logs
            .values()
            .filter(|entry| entry.is_retryable())
            .cloned()
            .collect())
    }

    async fn list_for_user(
        &self,
        user_id: i64,
        status: Option<DeliveryStatus>,
    ) -> Result<Vec<DeliveryLogEntry>> {
        let tables = self.tables.lock();
        Ok(tables
            .logs
            .values()
            .rev()
            .filter(|entry| entry.user_id == user_id)
            .filter(|entry| status.map_or(true, |status| entry.status == status))
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl PreferenceRepo for MemoryStore {
    async fn get_or_create(&self, user_id: i64) -> Result<NotificationPreference> {
        let mut tables = self.tables.lock();
        if let Some(preference) = tables.preferences.get(&user_id) {
            return Ok(preference.clone());
        }

        let now = Utc::now();
        let defaults = PreferenceFlags::default();
        let preference = NotificationPreference {
            id: next(&mut tables.sequences.preference),
            user_id,
            email_enabled: defaults.email,
            push_enabled: defaults.push,
            sms_enabled: defaults.sms,
            in_app_enabled: defaults.in_app,
            created_at: now,
            updated_at: now,
        };
        tables.preferences.insert(user_id, preference.clone());
        Ok(preference)
    }

    async fn upsert_preferences(
        &self,
        user_id: i64,
        flags: PreferenceFlags,
    ) -> Result<NotificationPreference> {
        let mut tables = self.tables.lock();
        let Tables {
            preferences,
            sequences,
            ..
        } = &mut *tables;
        let now = Utc::now();

        let preference = preferences
            .entry(user_id)
            .or_insert_with(|| NotificationPreference {
                id: next(&mut sequences.preference),
                user_id,
                email_enabled: flags.email,
                push_enabled: flags.push,
                sms_enabled: flags.sms,
                in_app_enabled: flags.in_app,
                created_at: now,
                updated_at: now,
            });
        preference.email_enabled = flags.email;
        preference.push_enabled = flags.push;
        preference.sms_enabled = flags.sms;
        preference.in_app_enabled = flags.in_app;
        preference.updated_at = now;

        Ok(preference.clone())
    }
}
