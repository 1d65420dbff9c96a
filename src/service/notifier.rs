use std::sync::Arc;

use serde::Serialize;

use crate::domain::Entity;
use crate::error::{Error, Result};
use crate::model::{
    DeliveryLogEntry, DeliveryStatus, NewDeliveryLog, NotificationKind, PreferenceFlags,
    Subscription, DEFAULT_MAX_RETRIES,
};
use crate::repo::Repository;

use super::sender::{ChannelSender, Delivery};

pub const DEFAULT_RESTOCK_MESSAGE: &str = "Product back in stock! Check it out now.";

/// Tunables for outgoing notifications
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Retry budget given to every new delivery log entry
    pub max_retries: i32,
    /// Message sent to subscribers when a product is restocked
    pub restock_message: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            restock_message: DEFAULT_RESTOCK_MESSAGE.into(),
        }
    }
}

/// Summary of a stock update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestockReport {
    pub previous_stock: i32,
    pub new_stock: i32,
    /// Whether the update crossed from zero to positive stock
    pub fired: bool,
    pub notified: usize,
    pub failed: usize,
    /// Subscriptions delivered by a concurrent sender first
    pub skipped: usize,
}

/// How a single delivery attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Delivered,
    Failed,
    Skipped,
}

/// Subscription registry and restock fan-out
pub struct Notifier {
    repo: Arc<dyn Repository>,
    sender: Arc<dyn ChannelSender>,
    config: NotifierConfig,
}

impl Notifier {
    pub fn new(
        repo: Arc<dyn Repository>,
        sender: Arc<dyn ChannelSender>,
        config: NotifierConfig,
    ) -> Self {
        Self {
            repo,
            sender,
            config,
        }
    }

    /// Register a user's interest in a product, re-arming an existing subscription
    #[tracing::instrument(name = "Subscribe to restock notifications", skip(self))]
    pub async fn subscribe(&self, user_id: i64, product_id: i64) -> Result<Subscription> {
        Entity::User.validate_id(user_id)?;
        Entity::Product.validate_id(product_id)?;

        self.repo
            .find_user(user_id)
            .await?
            .ok_or_else(|| Entity::User.not_found(user_id))?;
        self.repo
            .find_product(product_id)
            .await?
            .ok_or_else(|| Entity::Product.not_found(product_id))?;

        self.repo
            .upsert_subscription(user_id, product_id, NotificationKind::Restocked)
            .await
    }

    /// Remove a subscription, returning whether one existed
    #[tracing::instrument(name = "Unsubscribe from restock notifications", skip(self))]
    pub async fn unsubscribe(&self, subscription_id: i64) -> Result<bool> {
        Entity::Subscription.validate_id(subscription_id)?;

        self.repo.delete_subscription(subscription_id).await
    }

    /// Replace a product's stock and notify subscribers on the zero to positive edge.
    /// Selling out re-arms every subscription on the product for the next restock.
    #[tracing::instrument(name = "Trigger restock", skip(self))]
    pub async fn trigger_restock(&self, product_id: i64, new_stock: i32) -> Result<RestockReport> {
        Entity::Product.validate_id(product_id)?;
        if new_stock < 0 {
            return Err(Error::InvalidArgument(format!(
                "stock must not be negative, got {}",
                new_stock
            )));
        }

        let previous_stock = self
            .repo
            .replace_stock(product_id, new_stock)
            .await?
            .ok_or_else(|| Entity::Product.not_found(product_id))?;

        let mut report = RestockReport {
            previous_stock,
            new_stock,
            ..Default::default()
        };

        if previous_stock > 0 && new_stock == 0 {
            let reset = self.repo.reset_for_product(product_id).await?;
            // Failed sends from the last restock must not go out while sold out
            let abandoned = self
                .repo
                .abandon_for_product(product_id, "product sold out before the retry")
                .await?;
            tracing::info!(
                product_id,
                reset,
                abandoned,
                "Product sold out, subscriptions re-armed"
            );
            return Ok(report);
        }
        if previous_stock != 0 || new_stock == 0 {
            return Ok(report);
        }

        report.fired = true;
        let pending = self.repo.find_unsent_by_product(product_id).await?;
        tracing::info!(
            product_id,
            subscribers = pending.len(),
            "Sending restock notifications"
        );

        // The stock swap is committed; one subscriber's error must not cost the rest
        for subscription in pending {
            match self
                .deliver(&subscription, &self.config.restock_message)
                .await
            {
                Ok(Outcome::Delivered) => report.notified += 1,
                Ok(Outcome::Failed) => report.failed += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    tracing::error!(
                        subscription_id = subscription.id,
                        error = %e,
                        "Failed to deliver restock notification"
                    );
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Deliver one notification for a subscription.
    /// Returns `true` only if this call delivered it and marked it sent.
    #[tracing::instrument(name = "Send a single notification", skip(self, message))]
    pub async fn send_one(&self, subscription_id: i64, message: &str) -> Result<bool> {
        Entity::Subscription.validate_id(subscription_id)?;

        let subscription = match self.repo.find_subscription(subscription_id).await? {
            Some(subscription) => subscription,
            None => return Ok(false),
        };

        let outcome = self.deliver(&subscription, message).await?;
        Ok(outcome == Outcome::Delivered)
    }

    /// Subscriptions of a user, newest first
    #[tracing::instrument(name = "List subscriptions of a user", skip(self))]
    pub async fn user_subscriptions(&self, user_id: i64) -> Result<Vec<Subscription>> {
        Entity::User.validate_id(user_id)?;
        self.repo.find_by_user(user_id).await
    }

    /// Subscribers of a product, newest first
    #[tracing::instrument(name = "List subscribers of a product", skip(self))]
    pub async fn product_subscribers(&self, product_id: i64) -> Result<Vec<Subscription>> {
        Entity::Product.validate_id(product_id)?;
        self.repo.find_by_product(product_id).await
    }

    /// Whether the user holds a subscription on the product, delivered or not
    #[tracing::instrument(name = "Check subscription", skip(self))]
    pub async fn is_subscribed(&self, user_id: i64, product_id: i64) -> Result<bool> {
        Entity::User.validate_id(user_id)?;
        Entity::Product.validate_id(product_id)?;
        self.repo.exists(user_id, product_id).await
    }

    /// Delivery log of a user, newest first
    #[tracing::instrument(name = "List delivery logs of a user", skip(self))]
    pub async fn delivery_logs(
        &self,
        user_id: i64,
        status: Option<DeliveryStatus>,
    ) -> Result<Vec<DeliveryLogEntry>> {
        Entity::User.validate_id(user_id)?;
        self.repo.list_for_user(user_id, status).await
    }

    /// Resend a claimed delivery log entry, transitioning that same entry.
    /// Returns `true` only if this call delivered it and marked the subscription sent.
    pub(crate) async fn redeliver(&self, entry: &DeliveryLogEntry) -> Result<bool> {
        let subscription = match self.repo.find_subscription(entry.subscription_id).await? {
            Some(subscription) => subscription,
            None => {
                self.repo
                    .abandon(entry.id, "subscription no longer exists")
                    .await?;
                return Ok(false);
            }
        };
        // Delivered by a later attempt; retrying again could only duplicate it
        if subscription.is_sent {
            self.repo
                .abandon(entry.id, "subscription already delivered")
                .await?;
            return Ok(false);
        }

        let preference = self.repo.get_or_create(subscription.user_id).await?;
        match self
            .dispatch(&subscription, &entry.message, preference.flags())
            .await
        {
            Ok(()) => {
                let won = self.repo.mark_sent(subscription.id).await?;
                self.repo
                    .set_status(entry.id, DeliveryStatus::Retried, None)
                    .await?;
                if won {
                    tracing::info!(
                        log_id = entry.id,
                        attempt = entry.retry_count,
                        "Retried delivery succeeded"
                    );
                } else {
                    tracing::warn!(
                        log_id = entry.id,
                        attempt = entry.retry_count,
                        "Retried delivery sent, but another sender marked the subscription first"
                    );
                }
                Ok(won)
            }
            Err(Error::DeliveryFailure(e)) => {
                let reason = e.to_string();
                self.repo
                    .set_status(entry.id, DeliveryStatus::Failed, Some(&reason))
                    .await?;
                tracing::warn!(
                    log_id = entry.id,
                    attempt = entry.retry_count,
                    max_retries = entry.max_retries,
                    reason = %reason,
                    "Retried delivery failed"
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Log, send and record the outcome of a first delivery attempt
    async fn deliver(&self, subscription: &Subscription, message: &str) -> Result<Outcome> {
        if subscription.is_sent {
            return Ok(Outcome::Skipped);
        }

        let preference = self.repo.get_or_create(subscription.user_id).await?;
        // Record the attempt before anything leaves the process
        let entry = self
            .repo
            .insert_entry(&NewDeliveryLog {
                subscription_id: subscription.id,
                user_id: subscription.user_id,
                product_id: subscription.product_id,
                channel_type: subscription.channel_type,
                message: message.into(),
                max_retries: self.config.max_retries,
            })
            .await?;

        match self
            .dispatch(subscription, message, preference.flags())
            .await
        {
            Ok(()) => {
                let won = self.repo.mark_sent(subscription.id).await?;
                self.repo
                    .set_status(entry.id, DeliveryStatus::Sent, None)
                    .await?;
                if won {
                    tracing::info!(
                        subscription_id = subscription.id,
                        log_id = entry.id,
                        "Notification delivered"
                    );
                    Ok(Outcome::Delivered)
                } else {
                    tracing::warn!(
                        subscription_id = subscription.id,
                        log_id = entry.id,
                        "Notification delivered, but another sender marked the subscription first"
                    );
                    Ok(Outcome::Skipped)
                }
            }
            Err(Error::DeliveryFailure(e)) => {
                let reason = e.to_string();
                self.repo
                    .set_status(entry.id, DeliveryStatus::Failed, Some(&reason))
                    .await?;
                tracing::warn!(
                    subscription_id = subscription.id,
                    log_id = entry.id,
                    reason = %reason,
                    "Notification delivery failed"
                );
                Ok(Outcome::Failed)
            }
            Err(e) => Err(e),
        }
    }

    /// Hand a subscription's notification to the channel sender
    async fn dispatch(
        &self,
        subscription: &Subscription,
        message: &str,
        channels: PreferenceFlags,
    ) -> Result<()> {
        let delivery = Delivery {
            subscription_id: subscription.id,
            user_id: subscription.user_id,
            product_id: subscription.product_id,
            message: message.into(),
            channels: channels.into(),
        };
        self.sender.send(&delivery).await?;
        Ok(())
    }
}
