//! Daily revenue summaries.
//!
//! [`SummaryScheduler::schedule`] registers one daily trigger per enabled hour.
//! When a trigger fires, the presenter publishes a `Received` event carrying a
//! `summary_trigger` payload; [`SummaryListener`] picks it up, fetches the
//! current total and presents the rendered summary.

use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::{CancellationToken, DropGuard};

use super::gateway::NotificationGateway;
use super::presenter::{
    NotificationContent, NotificationData, NotificationEvent, NotificationId,
    NotificationPresenter, NotificationRequest, PresentError,
};
use super::templates::{render_summary, summary_title};
use super::types::{CompanyId, SummaryHour, SummaryScheduleConfig, SummaryStyle};

const TRIGGER_BODY: &str = "Verificando movimentações...";

pub struct SummaryScheduler {
    gateway: Arc<dyn NotificationGateway>,
    presenter: Arc<dyn NotificationPresenter>,
}

impl SummaryScheduler {
    pub fn new(
        gateway: Arc<dyn NotificationGateway>,
        presenter: Arc<dyn NotificationPresenter>,
    ) -> Self {
        Self { gateway, presenter }
    }

    /// Replace every scheduled trigger with the ones `config` enables.
    ///
    /// The cancel is global: triggers of other companies are dropped too.
    /// A failing hour is logged and skipped. Returns how many triggers were registered.
    pub async fn schedule(&self, config: &SummaryScheduleConfig) -> usize {
        tracing::info!(
            "Scheduling summaries for company {}: hours {:?}, style {}",
            config.company_id,
            config.enabled_hours.iter().map(|h| h.hour()).collect::<Vec<_>>(),
            config.style.id()
        );

        if let Err(e) = self.presenter.cancel_all_scheduled().await {
            tracing::error!("Failed to cancel previous summary triggers: {}", e);
        }

        let mut registered = 0;
        for hour in SummaryHour::ALL {
            if !config.is_enabled(hour) {
                continue;
            }

            match self.register_hour(config.company_id, hour, config.style).await {
                Ok(id) => {
                    registered += 1;
                    tracing::debug!("Summary trigger for {} registered as {}", hour, id);
                }
                Err(e) => tracing::error!("Failed to schedule summary for {}: {}", hour, e),
            }
        }

        registered
    }

    async fn register_hour(
        &self,
        company_id: CompanyId,
        hour: SummaryHour,
        style: SummaryStyle,
    ) -> Result<NotificationId, PresentError> {
        let content = NotificationContent {
            title: summary_title(hour),
            body: TRIGGER_BODY.to_string(),
            sound: true,
            data: NotificationData::SummaryTrigger {
                hour,
                company_id,
                style,
            },
        };

        self.presenter
            .schedule(NotificationRequest::daily(content, hour.hour(), 0))
            .await
    }

    /// Fetch the day's total and present the rendered summary.
    pub async fn handle_trigger(
        &self,
        company_id: CompanyId,
        hour: SummaryHour,
        style: SummaryStyle,
    ) -> Result<NotificationId, PresentError> {
        let total = self.gateway.fetch_summary_total(company_id).await;
        let content = NotificationContent {
            title: summary_title(hour),
            body: render_summary(style, hour, total),
            sound: true,
            data: NotificationData::Summary {
                hour,
                company_id,
                style,
            },
        };

        let id = self.presenter.present(content).await?;
        tracing::info!("Summary for {} presented to company {}", hour, company_id);
        Ok(id)
    }

    /// Start reacting to fired summary triggers. The listener stops when the guard drops.
    pub fn listen(self: &Arc<Self>) -> SummaryListener {
        let cancel = CancellationToken::new();
        let events = self.presenter.subscribe();
        let scheduler = self.clone();
        let token = cancel.clone();

        tokio::spawn(async move {
            scheduler.run_listener(events, token).await;
        });

        SummaryListener {
            _guard: cancel.drop_guard(),
        }
    }

    async fn run_listener(
        &self,
        mut events: broadcast::Receiver<NotificationEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = events.recv() => event,
            };

            match event {
                Ok(NotificationEvent::Received(delivered)) => {
                    if let NotificationData::SummaryTrigger {
                        hour,
                        company_id,
                        style,
                    } = delivered.content.data
                    {
                        if let Err(e) = self.handle_trigger(company_id, hour, style).await {
                            tracing::error!("Failed to present summary for {}: {}", hour, e);
                        }
                    }
                }
                Ok(NotificationEvent::Responded(_)) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Summary listener lagged, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!("Summary listener stopped");
    }
}

/// Keeps the summary listener alive; dropping it stops the listener.
pub struct SummaryListener {
    _guard: DropGuard,
}
