//! Watermark-based dedup of transaction alerts.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;

use super::gateway::NotificationGateway;
use super::presenter::{NotificationContent, NotificationData, NotificationPresenter};
use super::templates::transaction_message;
use super::types::{CompanyId, TransactionNotification};
use crate::db::{state, StateStore};

/// Surfaces transaction alerts that arrived since the last check for a company.
pub struct WatermarkTracker {
    gateway: Arc<dyn NotificationGateway>,
    presenter: Arc<dyn NotificationPresenter>,
    store: Arc<dyn StateStore>,
    company_locks: Mutex<HashMap<CompanyId, Arc<AsyncMutex<()>>>>,
}

impl WatermarkTracker {
    pub fn new(
        gateway: Arc<dyn NotificationGateway>,
        presenter: Arc<dyn NotificationPresenter>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            gateway,
            presenter,
            store,
            company_locks: Mutex::new(HashMap::new()),
        }
    }

    fn company_lock(&self, company_id: CompanyId) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .company_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(company_id).or_default().clone()
    }

    /// Fetch, present anything newer than the watermark, then advance it.
    ///
    /// Returns how many notifications were surfaced. Checks for the same
    /// company run one at a time; the watermark is advanced to the check's
    /// start time even when nothing new arrived or a presentation failed.
    pub async fn check_for_new(&self, company_id: CompanyId) -> usize {
        let lock = self.company_lock(company_id);
        let _guard = lock.lock().await;

        let started_at = Utc::now();
        tracing::debug!("Checking new notifications for company {}", company_id);

        let notifications = self.gateway.fetch_transaction_notifications(company_id).await;

        let watermark = match state::load_watermark(self.store.as_ref(), company_id).await {
            Ok(watermark) => watermark,
            Err(e) => {
                tracing::warn!(
                    "Unreadable watermark for company {}, starting over: {}",
                    company_id,
                    e
                );
                chrono::DateTime::<Utc>::UNIX_EPOCH
            }
        };

        let fresh: Vec<&TransactionNotification> = notifications
            .iter()
            .filter(|n| !n.read && n.created_at > watermark)
            .collect();

        tracing::debug!(
            "Company {}: {} notifications fetched, {} new since {}",
            company_id,
            notifications.len(),
            fresh.len(),
            watermark.to_rfc3339()
        );

        for notification in &fresh {
            let (title, body) = transaction_message(notification);
            let content = NotificationContent {
                title,
                body,
                sound: true,
                data: NotificationData::Transaction {
                    transaction_id: notification.id,
                    company_id: notification.company_id,
                },
            };

            if let Err(e) = self.presenter.present(content).await {
                tracing::error!(
                    "Failed to present notification for transaction {}: {}",
                    notification.id,
                    e
                );
            }
        }

        if let Err(e) = state::save_watermark(self.store.as_ref(), company_id, started_at).await {
            tracing::warn!("Failed to save watermark for company {}: {}", company_id, e);
        }

        if !fresh.is_empty() {
            tracing::info!("Surfaced {} new notifications for company {}", fresh.len(), company_id);
        }
        fresh.len()
    }
}
