//! In-process notification center.
//!
//! Immediate requests are handed to a [`DeliverySink`] right away. Daily
//! requests get their own timer task that sleeps until the next local
//! `hour:minute`, delivers, and repeats until cancelled.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::presenter::{
    DeliveredNotification, NotificationContent, NotificationEvent, NotificationId,
    NotificationPresenter, NotificationRequest, PermissionState, PresentError,
    ScheduledNotification, Trigger,
};
use super::sink::DeliverySink;

const EVENT_CAPACITY: usize = 64;

struct ScheduledEntry {
    notification: ScheduledNotification,
    cancel: CancellationToken,
}

struct CenterInner {
    sink: Arc<dyn DeliverySink>,
    permission: RwLock<PermissionState>,
    scheduled: Mutex<HashMap<NotificationId, ScheduledEntry>>,
    events: broadcast::Sender<NotificationEvent>,
}

impl CenterInner {
    fn deliver(
        &self,
        id: NotificationId,
        content: NotificationContent,
    ) -> Result<(), PresentError> {
        let delivered = DeliveredNotification {
            id,
            content,
            delivered_at: Utc::now(),
        };

        self.sink.deliver(&delivered)?;
        // No subscribers is fine.
        let _ = self.events.send(NotificationEvent::Received(delivered));
        Ok(())
    }
}

pub struct LocalNotificationCenter {
    inner: Arc<CenterInner>,
}

impl LocalNotificationCenter {
    pub fn new(sink: Arc<dyn DeliverySink>) -> Self {
        Self::with_permission(sink, PermissionState::Undetermined)
    }

    pub fn with_permission(sink: Arc<dyn DeliverySink>, permission: PermissionState) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(CenterInner {
                sink,
                permission: RwLock::new(permission),
                scheduled: Mutex::new(HashMap::new()),
                events,
            }),
        }
    }

    /// Report that the user acted on a delivered notification.
    pub fn record_response(&self, notification: DeliveredNotification) {
        let _ = self.inner.events.send(NotificationEvent::Responded(notification));
    }

    fn permission(&self) -> PermissionState {
        self.inner
            .permission
            .read()
            .map(|p| *p)
            .unwrap_or(PermissionState::Undetermined)
    }

    fn spawn_daily(
        &self,
        id: NotificationId,
        content: NotificationContent,
        time: NaiveTime,
        cancel: CancellationToken,
    ) {
        let inner = self.inner.clone();

        tokio::spawn(async move {
            let mut not_before = Local::now();
            loop {
                let now = Local::now().max(not_before);
                let next = next_daily_fire(now, time);
                let wait = (next - Local::now()).to_std().unwrap_or_default();

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {}
                }
                if cancel.is_cancelled() {
                    break;
                }

                tracing::debug!("Daily trigger {} fired for {}", id, time);
                if let Err(e) = inner.deliver(id.clone(), content.clone()) {
                    tracing::error!("Failed to deliver scheduled notification {}: {}", id, e);
                }
                not_before = next + ChronoDuration::seconds(1);
            }
            tracing::debug!("Daily trigger {} cancelled", id);
        });
    }
}

#[async_trait]
impl NotificationPresenter for LocalNotificationCenter {
    async fn permission_status(&self) -> PermissionState {
        self.permission()
    }

    async fn request_permission(&self) -> PermissionState {
        let current = self.permission();
        if current.is_granted() {
            return current;
        }

        let granted = self.inner.sink.request_permission();
        if let Ok(mut permission) = self.inner.permission.write() {
            *permission = granted;
        }
        if !granted.is_granted() {
            tracing::warn!("Notification permission denied");
        }
        granted
    }

    async fn schedule(&self, request: NotificationRequest) -> Result<NotificationId, PresentError> {
        if !self.permission().is_granted() {
            return Err(PresentError::PermissionDenied);
        }

        let id = uuid::Uuid::new_v4().to_string();

        match request.trigger {
            Trigger::Immediate => {
                self.inner.deliver(id.clone(), request.content)?;
            }
            Trigger::Daily { hour, minute } => {
                let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| {
                    PresentError::Scheduling(format!("invalid time {:02}:{:02}", hour, minute))
                })?;

                let cancel = CancellationToken::new();
                let mut scheduled = self
                    .inner
                    .scheduled
                    .lock()
                    .map_err(|_| PresentError::Scheduling("scheduler state poisoned".into()))?;

                scheduled.insert(
                    id.clone(),
                    ScheduledEntry {
                        notification: ScheduledNotification {
                            id: id.clone(),
                            content: request.content.clone(),
                            trigger: request.trigger,
                        },
                        cancel: cancel.clone(),
                    },
                );
                drop(scheduled);

                self.spawn_daily(id.clone(), request.content, time, cancel);
            }
        }

        Ok(id)
    }

    async fn cancel_all_scheduled(&self) -> Result<(), PresentError> {
        let mut scheduled = self
            .inner
            .scheduled
            .lock()
            .map_err(|_| PresentError::Scheduling("scheduler state poisoned".into()))?;

        for (_, entry) in scheduled.drain() {
            entry.cancel.cancel();
        }
        Ok(())
    }

    async fn scheduled(&self) -> Vec<ScheduledNotification> {
        let Ok(scheduled) = self.inner.scheduled.lock() else {
            return Vec::new();
        };

        let mut pending: Vec<_> = scheduled.values().map(|e| e.notification.clone()).collect();
        pending.sort_by_key(|n| match n.trigger {
            Trigger::Daily { hour, minute } => (hour, minute),
            Trigger::Immediate => (0, 0),
        });
        pending
    }

    fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.inner.events.subscribe()
    }
}

impl Drop for LocalNotificationCenter {
    fn drop(&mut self) {
        if let Ok(scheduled) = self.inner.scheduled.lock() {
            for entry in scheduled.values() {
                entry.cancel.cancel();
            }
        }
    }
}

/// Next local instant strictly after `now` whose wall-clock time is `time`.
pub fn next_daily_fire(now: DateTime<Local>, time: NaiveTime) -> DateTime<Local> {
    let mut date = now.date_naive();
    loop {
        // Skips days where `time` falls into a DST gap.
        if let Some(candidate) = Local.from_local_datetime(&date.and_time(time)).earliest() {
            if candidate > now {
                return candidate;
            }
        }
        date = date.succ_opt().unwrap_or(date);
    }
}
