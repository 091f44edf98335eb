//! The notification scheduler service.
//!
//! Owns every piece of the subsystem and is the only thing the application
//! talks to. All seams are injected so the service runs the same against the
//! real backend or in-memory fakes.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::db::{state, StateStore, StoreError};
use crate::monitor::background::{BackgroundTasks, TaskFuture, TaskHandler};
use crate::monitor::controller::{
    MonitoringController, MonitoringState, BACKGROUND_NOTIFICATION_TASK,
};
use crate::notifications::gateway::{GatewayError, NotificationGateway, RemoteSummaryConfig};
use crate::notifications::presenter::{NotificationEvent, NotificationPresenter};
use crate::notifications::summary::{SummaryListener, SummaryScheduler};
use crate::notifications::tracker::WatermarkTracker;
use crate::notifications::types::{CompanyId, SummaryScheduleConfig};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

struct Listeners {
    _summaries: SummaryListener,
    _responses: DropGuard,
}

pub struct NotificationScheduler {
    store: Arc<dyn StateStore>,
    gateway: Arc<dyn NotificationGateway>,
    presenter: Arc<dyn NotificationPresenter>,
    tasks: Arc<dyn BackgroundTasks>,
    tracker: Arc<WatermarkTracker>,
    summaries: Arc<SummaryScheduler>,
    monitor: MonitoringController,
    listeners: Mutex<Option<Listeners>>,
}

impl NotificationScheduler {
    pub fn new(
        store: Arc<dyn StateStore>,
        gateway: Arc<dyn NotificationGateway>,
        presenter: Arc<dyn NotificationPresenter>,
        tasks: Arc<dyn BackgroundTasks>,
        poll_interval: Duration,
    ) -> Self {
        let tracker = Arc::new(WatermarkTracker::new(
            gateway.clone(),
            presenter.clone(),
            store.clone(),
        ));
        let summaries = Arc::new(SummaryScheduler::new(gateway.clone(), presenter.clone()));
        let monitor =
            MonitoringController::new(tracker.clone(), tasks.clone(), store.clone(), poll_interval);

        Self {
            store,
            gateway,
            presenter,
            tasks,
            tracker,
            summaries,
            monitor,
            listeners: Mutex::new(None),
        }
    }

    /// Bring the subsystem up after process start.
    ///
    /// Defines the background task, starts the listeners, restores the
    /// persisted summary schedule if the presenter lost it, and resumes
    /// monitoring for the persisted company.
    pub async fn init(&self) -> Result<(), ServiceError> {
        tracing::info!("Initializing notification scheduler");

        self.tasks
            .define(BACKGROUND_NOTIFICATION_TASK, self.background_handler())
            .await;

        {
            let mut listeners = self.listeners.lock().await;
            if listeners.is_none() {
                *listeners = Some(Listeners {
                    _summaries: self.summaries.listen(),
                    _responses: self.spawn_response_logger(),
                });
            }
        }

        if !self.ensure_permission().await {
            tracing::warn!("Notification permission not granted, notifications will not be shown");
        }

        if self.presenter.scheduled().await.is_empty() {
            match state::load_summary_config(self.store.as_ref()).await {
                Ok(Some(config)) => {
                    let registered = self.summaries.schedule(&config).await;
                    tracing::info!("Restored {} summary triggers", registered);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Could not restore summary schedule: {}", e),
            }
        }

        self.monitor.resume().await?;
        Ok(())
    }

    fn background_handler(&self) -> TaskHandler {
        let store = self.store.clone();
        let tracker = self.tracker.clone();

        Arc::new(move || -> TaskFuture {
            let store = store.clone();
            let tracker = tracker.clone();
            Box::pin(async move {
                match state::load_monitoring_target(store.as_ref()).await {
                    Ok(Some(company_id)) => {
                        let found = tracker.check_for_new(company_id).await;
                        tracing::debug!("Background check found {} notifications", found);
                    }
                    Ok(None) => tracing::debug!("Background check skipped, nothing monitored"),
                    Err(e) => tracing::warn!("Background check could not read target: {}", e),
                }
            })
        })
    }

    fn spawn_response_logger(&self) -> DropGuard {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let mut events = self.presenter.subscribe();

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    event = events.recv() => event,
                };

                match event {
                    Ok(NotificationEvent::Responded(notification)) => {
                        tracing::info!(
                            "Notification {} opened: {:?}",
                            notification.id,
                            notification.content.data
                        );
                    }
                    Ok(NotificationEvent::Received(_)) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
            }
        });

        cancel.drop_guard()
    }

    /// True if notifications may be shown, asking once when undecided.
    pub async fn ensure_permission(&self) -> bool {
        if self.presenter.permission_status().await.is_granted() {
            return true;
        }
        self.presenter.request_permission().await.is_granted()
    }

    pub async fn start_monitoring(&self, company_id: CompanyId) -> Result<(), ServiceError> {
        self.monitor.start(company_id).await?;
        Ok(())
    }

    pub async fn stop_monitoring(&self) -> Result<(), ServiceError> {
        self.monitor.stop().await?;
        Ok(())
    }

    pub async fn monitoring_state(&self) -> MonitoringState {
        self.monitor.state().await
    }

    /// Run one check right away, outside the timers.
    pub async fn check_now(&self, company_id: CompanyId) -> usize {
        self.tracker.check_for_new(company_id).await
    }

    /// Apply a summary schedule locally and remember it for restarts.
    pub async fn configure_summaries(
        &self,
        config: &SummaryScheduleConfig,
    ) -> Result<usize, ServiceError> {
        let registered = self.summaries.schedule(config).await;
        state::save_summary_config(self.store.as_ref(), config).await?;
        Ok(registered)
    }

    /// Save summary settings to the backend, then apply them here.
    ///
    /// Returns `Ok(false)` without saving anything when permission is denied.
    pub async fn save_summary_settings(
        &self,
        config: &SummaryScheduleConfig,
    ) -> Result<bool, ServiceError> {
        if !self.ensure_permission().await {
            tracing::warn!("Summary settings not saved: notification permission denied");
            return Ok(false);
        }

        let id = self
            .gateway
            .fetch_summary_config(config.company_id)
            .await
            .map(|remote| remote.id)
            .unwrap_or(0);

        self.gateway
            .save_summary_config(&RemoteSummaryConfig {
                id,
                config: config.clone(),
            })
            .await?;
        tracing::info!("Summary settings saved for company {}", config.company_id);

        if let Err(e) = self.configure_summaries(config).await {
            tracing::warn!("Summary settings saved remotely but not locally: {}", e);
        }
        Ok(true)
    }

    /// The backend's settings for `company_id`, or everything off.
    pub async fn load_summary_settings(&self, company_id: CompanyId) -> SummaryScheduleConfig {
        self.gateway
            .fetch_summary_config(company_id)
            .await
            .map(|remote| remote.config)
            .unwrap_or_else(|| SummaryScheduleConfig::disabled(company_id))
    }

    /// Stop timers and listeners. The monitoring target stays persisted.
    pub async fn shutdown(&self) {
        self.monitor.suspend().await;
        self.listeners.lock().await.take();
        tracing::info!("Notification scheduler shut down");
    }
}
