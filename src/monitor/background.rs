//! Recurring background tasks.
//!
//! Mirrors the mobile task-manager model: a task is *defined* once by name
//! with its handler, then *registered* to run at an interval. Definitions can
//! be replaced at any time; registered loops pick up the newest handler on
//! their next run.

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Handler invoked on every run of a background task.
pub type TaskHandler = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("background task {0} is not defined")]
    NotDefined(String),

    #[error("background task {0}: interval must be greater than zero")]
    InvalidInterval(String),
}

#[async_trait]
pub trait BackgroundTasks: Send + Sync {
    /// Define or redefine a task. Never fails.
    async fn define(&self, name: &str, handler: TaskHandler);

    async fn register(&self, name: &str, interval: Duration) -> Result<(), TaskError>;

    /// Stop a registered task. Unregistering an unknown task is a no-op.
    async fn unregister(&self, name: &str);

    async fn is_registered(&self, name: &str) -> bool;
}

struct Registration {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Runs registered tasks as tokio interval loops inside this process.
#[derive(Default)]
pub struct TokioBackgroundTasks {
    definitions: Arc<RwLock<HashMap<String, TaskHandler>>>,
    registrations: RwLock<HashMap<String, Registration>>,
}

impl TokioBackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop every loop and wait for runs already in progress to finish.
    pub async fn shutdown(&self) {
        let registrations: Vec<_> = self.registrations.write().await.drain().collect();

        for (_, registration) in &registrations {
            registration.cancel.cancel();
        }
        for (name, registration) in registrations {
            if let Err(e) = registration.handle.await {
                tracing::warn!("Background task {} ended abnormally: {}", name, e);
            }
        }
        tracing::debug!("Background tasks shut down");
    }
}

#[async_trait]
impl BackgroundTasks for TokioBackgroundTasks {
    async fn define(&self, name: &str, handler: TaskHandler) {
        let replaced = self
            .definitions
            .write()
            .await
            .insert(name.to_string(), handler)
            .is_some();

        if replaced {
            tracing::debug!("Background task {} redefined", name);
        } else {
            tracing::debug!("Background task {} defined", name);
        }
    }

    async fn register(&self, name: &str, interval: Duration) -> Result<(), TaskError> {
        if interval.is_zero() {
            return Err(TaskError::InvalidInterval(name.to_string()));
        }
        if !self.definitions.read().await.contains_key(name) {
            return Err(TaskError::NotDefined(name.to_string()));
        }

        let mut registrations = self.registrations.write().await;
        if registrations.contains_key(name) {
            tracing::debug!("Background task {} already registered", name);
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let definitions = self.definitions.clone();
        let task_name = name.to_string();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if token.is_cancelled() {
                    break;
                }

                let handler = definitions.read().await.get(&task_name).cloned();
                match handler {
                    Some(handler) => handler().await,
                    None => tracing::warn!("Background task {} has no definition", task_name),
                }
            }
            tracing::debug!("Background task {} stopped", task_name);
        });

        registrations.insert(name.to_string(), Registration { cancel, handle });
        drop(registrations);

        tracing::info!("Background task {} registered every {:?}", name, interval);
        Ok(())
    }

    async fn unregister(&self, name: &str) {
        if let Some(registration) = self.registrations.write().await.remove(name) {
            registration.cancel.cancel();
            tracing::info!("Background task {} unregistered", name);
        }
    }

    async fn is_registered(&self, name: &str) -> bool {
        self.registrations.read().await.contains_key(name)
    }
}

impl Drop for TokioBackgroundTasks {
    fn drop(&mut self) {
        for registration in self.registrations.get_mut().values() {
            registration.cancel.cancel();
        }
    }
}
