//! Local notification presentation capability.
//!
//! The platform side (desktop banner, mobile notification center) is injected
//! behind [`NotificationPresenter`]. [`super::center::LocalNotificationCenter`]
//! is the in-process implementation used by the daemon.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use super::types::{CompanyId, SummaryHour, SummaryStyle};

pub type NotificationId = String;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PresentError {
    #[error("notification permission not granted")]
    PermissionDenied,

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("scheduling failed: {0}")]
    Scheduling(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
    Undetermined,
}

impl PermissionState {
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Typed payload attached to every notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationData {
    #[serde(rename_all = "camelCase")]
    Transaction {
        transaction_id: i64,
        company_id: CompanyId,
    },
    #[serde(rename_all = "camelCase")]
    Summary {
        hour: SummaryHour,
        company_id: CompanyId,
        #[serde(rename = "model")]
        style: SummaryStyle,
    },
    #[serde(rename_all = "camelCase")]
    SummaryTrigger {
        hour: SummaryHour,
        company_id: CompanyId,
        #[serde(rename = "model")]
        style: SummaryStyle,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub sound: bool,
    pub data: NotificationData,
}

/// When a notification should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    Immediate,
    /// Every day at `hour:minute` local time.
    Daily { hour: u32, minute: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub content: NotificationContent,
    pub trigger: Trigger,
}

impl NotificationRequest {
    pub fn immediate(content: NotificationContent) -> Self {
        Self {
            content,
            trigger: Trigger::Immediate,
        }
    }

    pub fn daily(content: NotificationContent, hour: u32, minute: u32) -> Self {
        Self {
            content,
            trigger: Trigger::Daily { hour, minute },
        }
    }
}

/// A pending recurring request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledNotification {
    pub id: NotificationId,
    pub content: NotificationContent,
    pub trigger: Trigger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredNotification {
    pub id: NotificationId,
    pub content: NotificationContent,
    pub delivered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    /// A notification was shown, either immediately or by a fired trigger.
    Received(DeliveredNotification),
    /// The user acted on a shown notification.
    Responded(DeliveredNotification),
}

#[async_trait]
pub trait NotificationPresenter: Send + Sync {
    async fn permission_status(&self) -> PermissionState;

    /// Ask the platform for permission; returns the resulting state.
    async fn request_permission(&self) -> PermissionState;

    async fn schedule(&self, request: NotificationRequest) -> Result<NotificationId, PresentError>;

    /// Cancel every pending scheduled request, regardless of company.
    async fn cancel_all_scheduled(&self) -> Result<(), PresentError>;

    async fn scheduled(&self) -> Vec<ScheduledNotification>;

    /// Subscribe to received/responded events. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<NotificationEvent>;

    async fn present(&self, content: NotificationContent) -> Result<NotificationId, PresentError> {
        self.schedule(NotificationRequest::immediate(content)).await
    }
}
