//! Merchant-side notification subsystem for the payments app.
pub mod config;
pub mod db;
pub mod monitor;
pub mod notifications;
pub mod service;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use service::{NotificationScheduler, ServiceError};
