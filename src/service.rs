use std::sync::Arc;

use crate::repo::Repository;

mod notifier;
mod preferences;
mod retry;
mod sender;
#[cfg(test)]
mod testing;

pub use notifier::{Notifier, NotifierConfig, RestockReport, DEFAULT_RESTOCK_MESSAGE};
pub use preferences::PreferenceStore;
pub use retry::{RetryCoordinator, RetrySweep};
pub use sender::{
    Channel, ChannelFailure, ChannelSender, ChannelSet, Delivery, DeliveryError, RestockSender,
};

/// The notification services, sharing one repository and one channel sender
#[derive(Clone)]
pub struct Services {
    pub notifier: Arc<Notifier>,
    pub retries: Arc<RetryCoordinator>,
    pub preferences: Arc<PreferenceStore>,
}

impl Services {
    pub fn new(
        repo: Arc<dyn Repository>,
        sender: Arc<dyn ChannelSender>,
        config: NotifierConfig,
    ) -> Self {
        let notifier = Arc::new(Notifier::new(repo.clone(), sender, config));
        let retries = Arc::new(RetryCoordinator::new(repo.clone(), notifier.clone()));
        let preferences = Arc::new(PreferenceStore::new(repo));

        Self {
            notifier,
            retries,
            preferences,
        }
    }
}
