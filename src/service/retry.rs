use std::sync::Arc;

use serde::Serialize;

use crate::domain::Entity;
use crate::error::Result;
use crate::model::DeliveryLogEntry;
use crate::repo::Repository;

use super::notifier::Notifier;

/// Summary of a retry sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetrySweep {
    pub attempted: usize,
    pub recovered: usize,
}

/// Resends failed deliveries that still have retry budget left
pub struct RetryCoordinator {
    repo: Arc<dyn Repository>,
    notifier: Arc<Notifier>,
}

impl RetryCoordinator {
    pub fn new(repo: Arc<dyn Repository>, notifier: Arc<Notifier>) -> Self {
        Self { repo, notifier }
    }

    /// Failed entries with retry budget left, oldest first
    #[tracing::instrument(name = "List retryable deliveries", skip(self))]
    pub async fn list_retryable(&self) -> Result<Vec<DeliveryLogEntry>> {
        self.repo.list_retryable().await
    }

    /// Retry one delivery log entry.
    /// Returns `false` if the entry is missing, exhausted, not failed, or the resend failed.
    #[tracing::instrument(name = "Retry delivery", skip(self))]
    pub async fn retry(&self, log_id: i64) -> Result<bool> {
        Entity::DeliveryLog.validate_id(log_id)?;

        // The attempt is counted before the resend starts
        let entry = match self.repo.claim_retry(log_id).await? {
            Some(entry) => entry,
            None => return Ok(false),
        };

        self.notifier.redeliver(&entry).await
    }

    /// Retry every retryable entry once
    #[tracing::instrument(name = "Retry all failed deliveries", skip(self))]
    pub async fn retry_all(&self) -> Result<RetrySweep> {
        let mut sweep = RetrySweep::default();
        for entry in self.list_retryable().await? {
            sweep.attempted += 1;
            if self.retry(entry.id).await? {
                sweep.recovered += 1;
            }
        }

        tracing::info!(
            attempted = sweep.attempted,
            recovered = sweep.recovered,
            "Retry sweep finished"
        );
        Ok(sweep)
    }
}
