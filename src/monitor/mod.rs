pub mod background;
pub mod controller;

pub use background::{BackgroundTasks, TaskError, TokioBackgroundTasks};
pub use controller::{MonitoringController, MonitoringState, BACKGROUND_NOTIFICATION_TASK};
