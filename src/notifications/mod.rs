//! Transaction alerts and daily revenue summaries.

pub mod center;
pub mod format;
pub mod gateway;
pub mod presenter;
pub mod sink;
pub mod summary;
pub mod templates;
pub mod tracker;
pub mod types;

pub use center::LocalNotificationCenter;
pub use gateway::{GatewayError, HttpGateway, NotificationGateway, RemoteSummaryConfig};
pub use presenter::{
    NotificationContent, NotificationData, NotificationEvent, NotificationPresenter,
    PermissionState, PresentError,
};
pub use summary::{SummaryListener, SummaryScheduler};
pub use tracker::WatermarkTracker;
pub use types::{CompanyId, SummaryHour, SummaryScheduleConfig, SummaryStyle};
