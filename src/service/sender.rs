use std::fmt;
use std::sync::Arc;

use chrono::Duration;

use url::Url;

use crate::client::{Email, EmailClient};
use crate::crypto::{SigningKey, UnsubscribeToken};
use crate::domain::EmailAddress;
use crate::model::PreferenceFlags;
use crate::repo::Repository;

/// A delivery channel a user can toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Email,
    Push,
    Sms,
    InApp,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Push => "push",
            Self::Sms => "sms",
            Self::InApp => "in_app",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The channels a single delivery goes out on, in a fixed order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSet(Vec<Channel>);

impl ChannelSet {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Channel> + '_ {
        self.0.iter().copied()
    }
}

impl From<PreferenceFlags> for ChannelSet {
    fn from(flags: PreferenceFlags) -> Self {
        let toggles = [
            (flags.email, Channel::Email),
            (flags.push, Channel::Push),
            (flags.sms, Channel::Sms),
            (flags.in_app, Channel::InApp),
        ];
        Self(
            toggles
                .into_iter()
                .filter_map(|(enabled, channel)| enabled.then_some(channel))
                .collect(),
        )
    }
}

/// Everything a channel sender needs to deliver one notification
#[derive(Debug, Clone)]
pub struct Delivery {
    pub subscription_id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub message: String,
    pub channels: ChannelSet,
}

/// A single channel that did not accept a delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelFailure {
    pub channel: Channel,
    pub reason: String,
}

impl fmt::Display for ChannelFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.channel, self.reason)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("no delivery channels enabled")]
    NoChannels,
    #[error("delivery failed on {}", list_failures(.0))]
    ChannelsFailed(Vec<ChannelFailure>),
}

fn list_failures(failures: &[ChannelFailure]) -> String {
    failures
        .iter()
        .map(ChannelFailure::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Delivers notifications over a user's enabled channels.
/// Success means every enabled channel accepted the message.
/// NOTE: Intended to facilitate easier testing/mocking
#[async_trait::async_trait]
pub trait ChannelSender: Send + Sync {
    async fn send(&self, delivery: &Delivery) -> Result<(), DeliveryError>;
}

/// Production sender: e-mail through the e-mail API, the other channels traced
pub struct RestockSender {
    repo: Arc<dyn Repository>,
    email_client: EmailClient,
    signing_key: SigningKey,
    base_url: Url,
    unsubscribe_link_ttl: Duration,
}

impl RestockSender {
    pub fn new(
        repo: Arc<dyn Repository>,
        email_client: EmailClient,
        signing_key: SigningKey,
        base_url: Url,
        unsubscribe_link_ttl: Duration,
    ) -> Self {
        Self {
            repo,
            email_client,
            signing_key,
            base_url,
            unsubscribe_link_ttl,
        }
    }

    #[tracing::instrument(name = "Send restock email", skip(self, delivery), fields(user_id = delivery.user_id))]
    async fn send_email(&self, delivery: &Delivery) -> Result<(), String> {
        // Resolve the recipient
        let user = self
            .repo
            .find_user(delivery.user_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("recipient user {} not found", delivery.user_id))?;
        let recipient: EmailAddress = user.email.parse()?;
        // Name the product in the subject when it can be found
        let product_name = self
            .repo
            .find_product(delivery.product_id)
            .await
            .map_err(|e| e.to_string())?
            .map(|product| product.name)
            .unwrap_or_else(|| format!("Product {}", delivery.product_id));
        // Sign an unsubscribe link for this subscription
        let unsubscribe_url = self
            .unsubscribe_url(delivery.subscription_id)
            .map_err(|e| format!("failed to build unsubscribe link: {}", e))?;

        let email = build_restock_email(&product_name, &delivery.message, &unsubscribe_url);
        self.email_client
            .send(&recipient, &email)
            .await
            .map_err(|e| e.to_string())
    }

    fn unsubscribe_url(&self, subscription_id: i64) -> anyhow::Result<Url> {
        let token = UnsubscribeToken::new(subscription_id)
            .sign(&self.signing_key, self.unsubscribe_link_ttl)?;
        let url = self
            .base_url
            .join(&format!("subscriptions/unsubscribe/{}", token.as_ref()))?;
        Ok(url)
    }
}

#[async_trait::async_trait]
impl ChannelSender for RestockSender {
    #[tracing::instrument(
        name = "Deliver restock notification",
        skip(self, delivery),
        fields(subscription_id = delivery.subscription_id)
    )]
    async fn send(&self, delivery: &Delivery) -> Result<(), DeliveryError> {
        if delivery.channels.is_empty() {
            return Err(DeliveryError::NoChannels);
        }

        let mut failures = Vec::new();
        for channel in delivery.channels.iter() {
            match channel {
                Channel::Email => {
                    if let Err(reason) = self.send_email(delivery).await {
                        failures.push(ChannelFailure { channel, reason });
                    }
                }
                // No transport is wired up for these; the log entry is the record
                Channel::Push | Channel::Sms | Channel::InApp => {
                    tracing::info!(
                        channel = channel.as_str(),
                        user_id = delivery.user_id,
                        product_id = delivery.product_id,
                        "Notification recorded"
                    );
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DeliveryError::ChannelsFailed(failures))
        }
    }
}

/// Build the restock e-mail for a subscriber
fn build_restock_email(product_name: &str, message: &str, unsubscribe_url: &Url) -> Email {
    let subject = format!("{} is back in stock", product_name);
    let html_body = format!(
        "<h1>{}</h1><p>{}</p><p>No longer interested? <a href=\"{}\">Unsubscribe</a>.</p>",
        escape_html(&subject),
        escape_html(message),
        escape_html(unsubscribe_url.as_str())
    );
    let text_body = format!(
        "{}\n\n{}\n\nTo stop these notifications, visit: {}",
        subject, message, unsubscribe_url
    );

    Email {
        subject,
        html_body,
        text_body,
    }
}

/// Escape text for an HTML body or attribute
fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
