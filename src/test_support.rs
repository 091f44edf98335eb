//! In-memory fakes shared by unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::monitor::background::{BackgroundTasks, TaskError, TaskHandler};
use crate::notifications::gateway::{GatewayError, NotificationGateway, RemoteSummaryConfig};
use crate::notifications::presenter::{
    DeliveredNotification, NotificationContent, NotificationEvent, NotificationId,
    NotificationPresenter, NotificationRequest, PermissionState, PresentError,
    ScheduledNotification, Trigger,
};
use crate::notifications::sink::DeliverySink;
use crate::notifications::types::{CompanyId, TransactionNotification};

#[derive(Default)]
pub struct FakeGateway {
    notifications: Vec<TransactionNotification>,
    summary_total: i64,
    remote_config: Mutex<Option<RemoteSummaryConfig>>,
    fail_save: bool,
    latency: Option<Duration>,
    notification_requests: Mutex<Vec<CompanyId>>,
    summary_requests: Mutex<Vec<CompanyId>>,
    saved: Mutex<Vec<RemoteSummaryConfig>>,
}

impl FakeGateway {
    pub fn with_notifications(notifications: Vec<TransactionNotification>) -> Self {
        Self {
            notifications,
            ..Self::default()
        }
    }

    pub fn with_summary_total(mut self, total: i64) -> Self {
        self.summary_total = total;
        self
    }

    pub fn with_remote_config(self, config: RemoteSummaryConfig) -> Self {
        *self.remote_config.lock().unwrap() = Some(config);
        self
    }

    pub fn failing_save(mut self) -> Self {
        self.fail_save = true;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn notification_requests(&self) -> Vec<CompanyId> {
        self.notification_requests.lock().unwrap().clone()
    }

    pub fn summary_requests(&self) -> Vec<CompanyId> {
        self.summary_requests.lock().unwrap().clone()
    }

    pub fn saved(&self) -> Vec<RemoteSummaryConfig> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationGateway for FakeGateway {
    async fn fetch_transaction_notifications(
        &self,
        company_id: CompanyId,
    ) -> Vec<TransactionNotification> {
        self.notification_requests.lock().unwrap().push(company_id);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.notifications.clone()
    }

    async fn fetch_summary_total(&self, company_id: CompanyId) -> i64 {
        self.summary_requests.lock().unwrap().push(company_id);
        self.summary_total
    }

    async fn fetch_summary_config(&self, company_id: CompanyId) -> Option<RemoteSummaryConfig> {
        self.remote_config
            .lock()
            .unwrap()
            .clone()
            .filter(|remote| remote.config.company_id == company_id)
    }

    async fn save_summary_config(&self, config: &RemoteSummaryConfig) -> Result<(), GatewayError> {
        if self.fail_save {
            return Err(GatewayError::Unsuccessful("Erro no servidor".into()));
        }
        self.saved.lock().unwrap().push(config.clone());
        *self.remote_config.lock().unwrap() = Some(config.clone());
        Ok(())
    }
}

/// Presenter that records everything and never touches a timer.
pub struct RecordingPresenter {
    permission: Mutex<PermissionState>,
    grant_on_request: bool,
    fail_with: Option<PresentError>,
    fail_daily_hour: Option<u32>,
    presented: Mutex<Vec<NotificationContent>>,
    scheduled: Mutex<Vec<ScheduledNotification>>,
    cancel_calls: AtomicUsize,
    next_id: AtomicUsize,
    events: broadcast::Sender<NotificationEvent>,
}

impl RecordingPresenter {
    fn with_state(permission: PermissionState, grant_on_request: bool) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            permission: Mutex::new(permission),
            grant_on_request,
            fail_with: None,
            fail_daily_hour: None,
            presented: Mutex::new(Vec::new()),
            scheduled: Mutex::new(Vec::new()),
            cancel_calls: AtomicUsize::new(0),
            next_id: AtomicUsize::new(0),
            events,
        }
    }

    pub fn granted() -> Self {
        Self::with_state(PermissionState::Granted, true)
    }

    /// Undetermined until asked, then granted.
    pub fn undetermined() -> Self {
        Self::with_state(PermissionState::Undetermined, true)
    }

    pub fn denying() -> Self {
        Self::with_state(PermissionState::Undetermined, false)
    }

    pub fn failing(error: PresentError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::granted()
        }
    }

    pub fn failing_daily_at(mut self, hour: u32) -> Self {
        self.fail_daily_hour = Some(hour);
        self
    }

    pub fn presented(&self) -> Vec<NotificationContent> {
        self.presented.lock().unwrap().clone()
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    pub fn emit(&self, event: NotificationEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl NotificationPresenter for RecordingPresenter {
    async fn permission_status(&self) -> PermissionState {
        *self.permission.lock().unwrap()
    }

    async fn request_permission(&self) -> PermissionState {
        let mut permission = self.permission.lock().unwrap();
        *permission = if self.grant_on_request {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        };
        *permission
    }

    async fn schedule(&self, request: NotificationRequest) -> Result<NotificationId, PresentError> {
        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }

        let id = format!("n{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        match request.trigger {
            Trigger::Immediate => self.presented.lock().unwrap().push(request.content),
            Trigger::Daily { hour, .. } => {
                if self.fail_daily_hour == Some(hour) {
                    return Err(PresentError::Scheduling(format!("refused {}h", hour)));
                }
                self.scheduled.lock().unwrap().push(ScheduledNotification {
                    id: id.clone(),
                    content: request.content,
                    trigger: request.trigger,
                });
            }
        }
        Ok(id)
    }

    async fn cancel_all_scheduled(&self) -> Result<(), PresentError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.scheduled.lock().unwrap().clear();
        Ok(())
    }

    async fn scheduled(&self) -> Vec<ScheduledNotification> {
        self.scheduled.lock().unwrap().clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.events.subscribe()
    }
}

#[derive(Default)]
pub struct RecordingSink {
    deny: bool,
    delivered: Mutex<Vec<DeliveredNotification>>,
}

impl RecordingSink {
    pub fn denying() -> Self {
        Self {
            deny: true,
            ..Self::default()
        }
    }

    pub fn delivered(&self) -> Vec<DeliveredNotification> {
        self.delivered.lock().unwrap().clone()
    }
}

impl DeliverySink for RecordingSink {
    fn deliver(&self, notification: &DeliveredNotification) -> Result<(), PresentError> {
        self.delivered.lock().unwrap().push(notification.clone());
        Ok(())
    }

    fn request_permission(&self) -> PermissionState {
        if self.deny {
            PermissionState::Denied
        } else {
            PermissionState::Granted
        }
    }
}

/// Records registrations without running anything.
#[derive(Default)]
pub struct FakeBackgroundTasks {
    definitions: Mutex<HashMap<String, TaskHandler>>,
    registered: Mutex<HashMap<String, Duration>>,
    log: Mutex<Vec<String>>,
}

impl FakeBackgroundTasks {
    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn definition_count(&self) -> usize {
        self.definitions.lock().unwrap().len()
    }

    /// Run a defined task's handler once, as the platform would.
    pub async fn run(&self, name: &str) {
        let handler = self.definitions.lock().unwrap().get(name).cloned();
        if let Some(handler) = handler {
            handler().await;
        }
    }
}

#[async_trait]
impl BackgroundTasks for FakeBackgroundTasks {
    async fn define(&self, name: &str, handler: TaskHandler) {
        self.definitions
            .lock()
            .unwrap()
            .insert(name.to_string(), handler);
        self.log.lock().unwrap().push(format!("define {}", name));
    }

    async fn register(&self, name: &str, interval: Duration) -> Result<(), TaskError> {
        if !self.definitions.lock().unwrap().contains_key(name) {
            return Err(TaskError::NotDefined(name.to_string()));
        }
        self.registered
            .lock()
            .unwrap()
            .insert(name.to_string(), interval);
        self.log.lock().unwrap().push(format!("register {}", name));
        Ok(())
    }

    async fn unregister(&self, name: &str) {
        if self.registered.lock().unwrap().remove(name).is_some() {
            self.log.lock().unwrap().push(format!("unregister {}", name));
        }
    }

    async fn is_registered(&self, name: &str) -> bool {
        self.registered.lock().unwrap().contains_key(name)
    }
}
