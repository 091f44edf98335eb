//! Remote notification gateway

pub mod client;
pub mod types;

use async_trait::async_trait;

use super::types::{CompanyId, SummaryScheduleConfig, TransactionNotification};

pub use client::HttpGateway;
pub use types::GatewayError;

/// Summary settings as stored by the backend, with the backend row id (0 when new).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSummaryConfig {
    pub id: i64,
    pub config: SummaryScheduleConfig,
}

/// Read access to the payments backend.
///
/// The read operations never fail: network errors, non-success statuses and
/// malformed payloads are logged and degrade to empty results.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Transaction alerts for a company, in server order. Empty on failure.
    async fn fetch_transaction_notifications(
        &self,
        company_id: CompanyId,
    ) -> Vec<TransactionNotification>;

    /// Revenue total of the day in centavos. Zero on failure.
    async fn fetch_summary_total(&self, company_id: CompanyId) -> i64;

    /// Stored summary settings. `None` on failure or when the company has none.
    async fn fetch_summary_config(&self, company_id: CompanyId) -> Option<RemoteSummaryConfig>;

    /// Persist summary settings on the backend.
    async fn save_summary_config(&self, config: &RemoteSummaryConfig) -> Result<(), GatewayError>;
}
