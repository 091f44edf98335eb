use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::background::BackgroundTasks;
use crate::db::{state, StateStore, StoreError};
use crate::notifications::tracker::WatermarkTracker;
use crate::notifications::types::CompanyId;

/// Name under which the polling task is defined with [`BackgroundTasks`].
pub const BACKGROUND_NOTIFICATION_TASK: &str = "background-notification-task";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitoringState {
    Stopped,
    Running(CompanyId),
}

struct MonitoringSession {
    company_id: CompanyId,
    timer: CancellationToken,
}

/// Keeps at most one company under watch.
///
/// Polling runs on two paths at the same interval: a foreground timer owned
/// by this controller and a registered background task. Both end up in
/// [`WatermarkTracker::check_for_new`], which serializes per company.
pub struct MonitoringController {
    tracker: Arc<WatermarkTracker>,
    tasks: Arc<dyn BackgroundTasks>,
    store: Arc<dyn StateStore>,
    poll_interval: Duration,
    session: Mutex<Option<MonitoringSession>>,
}

impl MonitoringController {
    pub fn new(
        tracker: Arc<WatermarkTracker>,
        tasks: Arc<dyn BackgroundTasks>,
        store: Arc<dyn StateStore>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            tracker,
            tasks,
            store,
            poll_interval,
            session: Mutex::new(None),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub async fn state(&self) -> MonitoringState {
        match self.session.lock().await.as_ref() {
            Some(session) => MonitoringState::Running(session.company_id),
            None => MonitoringState::Stopped,
        }
    }

    /// Start watching `company_id`.
    ///
    /// No-op if it is already watched; a different company is stopped first.
    pub async fn start(&self, company_id: CompanyId) -> Result<(), StoreError> {
        let mut session = self.session.lock().await;

        if let Some(current) = session.as_ref() {
            if current.company_id == company_id {
                tracing::debug!("Already monitoring company {}", company_id);
                return Ok(());
            }
            tracing::info!(
                "Switching monitoring from company {} to {}",
                current.company_id,
                company_id
            );
            self.stop_locked(&mut session).await?;
        }

        tracing::info!("Starting notification monitoring for company {}", company_id);
        state::save_monitoring_target(self.store.as_ref(), company_id).await?;

        if self.tasks.is_registered(BACKGROUND_NOTIFICATION_TASK).await {
            tracing::debug!("Background task already registered");
        } else if let Err(e) = self
            .tasks
            .register(BACKGROUND_NOTIFICATION_TASK, self.poll_interval)
            .await
        {
            tracing::error!("Failed to register background task: {}", e);
        }

        *session = Some(MonitoringSession {
            company_id,
            timer: self.spawn_foreground_timer(company_id),
        });

        Ok(())
    }

    /// Stop watching. Safe to call when nothing is running.
    pub async fn stop(&self) -> Result<(), StoreError> {
        let mut session = self.session.lock().await;
        self.stop_locked(&mut session).await
    }

    async fn stop_locked(&self, session: &mut Option<MonitoringSession>) -> Result<(), StoreError> {
        if let Some(current) = session.take() {
            current.timer.cancel();
            tracing::info!("Stopped foreground polling for company {}", current.company_id);
        }

        self.tasks.unregister(BACKGROUND_NOTIFICATION_TASK).await;
        state::clear_monitoring_target(self.store.as_ref()).await
    }

    /// Stop the foreground timer but keep the persisted target and the
    /// background registration, so the next process start resumes.
    pub async fn suspend(&self) {
        if let Some(current) = self.session.lock().await.take() {
            current.timer.cancel();
            tracing::info!("Suspended monitoring for company {}", current.company_id);
        }
    }

    /// Restart monitoring for the persisted target, if any. Returns the resumed company.
    pub async fn resume(&self) -> Result<Option<CompanyId>, StoreError> {
        let Some(company_id) = state::load_monitoring_target(self.store.as_ref()).await? else {
            return Ok(None);
        };

        tracing::info!("Resuming notification monitoring for company {}", company_id);
        self.start(company_id).await?;
        Ok(Some(company_id))
    }

    fn spawn_foreground_timer(&self, company_id: CompanyId) -> CancellationToken {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let tracker = self.tracker.clone();
        let period = self.poll_interval;

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
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
                tracker.check_for_new(company_id).await;
            }
            tracing::debug!("Foreground timer for company {} exited", company_id);
        });

        cancel
    }
}

impl Drop for MonitoringController {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.timer.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStateStore;
    use crate::monitor::background::TaskFuture;
    use crate::test_support::{FakeBackgroundTasks, FakeGateway, RecordingPresenter};

    const INTERVAL: Duration = Duration::from_secs(30);

    struct Harness {
        gateway: Arc<FakeGateway>,
        tasks: Arc<FakeBackgroundTasks>,
        store: Arc<MemoryStateStore>,
        controller: MonitoringController,
    }

    async fn harness() -> Harness {
        harness_with(FakeGateway::default()).await
    }

    async fn harness_with(gateway: FakeGateway) -> Harness {
        let gateway = Arc::new(gateway);
        let store = Arc::new(MemoryStateStore::new());
        let tasks = Arc::new(FakeBackgroundTasks::default());
        tasks
            .define(
                BACKGROUND_NOTIFICATION_TASK,
                Arc::new(|| -> TaskFuture { Box::pin(async {}) }),
            )
            .await;

        let tracker = Arc::new(WatermarkTracker::new(
            gateway.clone(),
            Arc::new(RecordingPresenter::granted()),
            store.clone(),
        ));
        let controller =
            MonitoringController::new(tracker, tasks.clone(), store.clone(), INTERVAL);

        Harness {
            gateway,
            tasks,
            store,
            controller,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_keeps_a_single_timer() {
        let h = harness().await;

        h.controller.start(5).await.unwrap();
        h.controller.start(5).await.unwrap();

        tokio::time::sleep(INTERVAL * 3 + Duration::from_secs(1)).await;

        assert_eq!(h.gateway.notification_requests(), vec![5, 5, 5]);
        assert_eq!(
            h.tasks.log(),
            vec![
                "define background-notification-task",
                "register background-notification-task"
            ]
        );
        assert_eq!(h.controller.state().await, MonitoringState::Running(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_check_waits_one_interval() {
        let h = harness().await;
        h.controller.start(5).await.unwrap();

        tokio::time::sleep(INTERVAL - Duration::from_secs(1)).await;
        assert!(h.gateway.notification_requests().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(h.gateway.notification_requests(), vec![5]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_company_stops_previous_session_first() {
        let h = harness().await;

        h.controller.start(5).await.unwrap();
        h.controller.start(7).await.unwrap();

        assert_eq!(
            h.tasks.log(),
            vec![
                "define background-notification-task",
                "register background-notification-task",
                "unregister background-notification-task",
                "register background-notification-task",
            ]
        );
        assert_eq!(
            state::load_monitoring_target(h.store.as_ref()).await.unwrap(),
            Some(7)
        );

        tokio::time::sleep(INTERVAL * 2 + Duration::from_secs(1)).await;
        assert_eq!(h.gateway.notification_requests(), vec![7, 7]);
        assert_eq!(h.controller.state().await, MonitoringState::Running(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_everything_and_is_idempotent() {
        let h = harness().await;

        h.controller.start(5).await.unwrap();
        tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
        h.controller.stop().await.unwrap();
        h.controller.stop().await.unwrap();

        tokio::time::sleep(INTERVAL * 5).await;
        assert_eq!(h.gateway.notification_requests(), vec![5]);
        assert_eq!(h.controller.state().await, MonitoringState::Stopped);
        assert!(!h.tasks.is_registered(BACKGROUND_NOTIFICATION_TASK).await);
        assert_eq!(
            state::load_monitoring_target(h.store.as_ref()).await.unwrap(),
            None
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_slow_check_starts_no_new_check() {
        // Each check outlasts the interval, so the next tick is already due when it returns.
        for _ in 0..10 {
            let slow = FakeGateway::default().with_latency(Duration::from_secs(45));
            let h = harness_with(slow).await;

            h.controller.start(5).await.unwrap();
            tokio::time::sleep(Duration::from_secs(40)).await;
            assert_eq!(h.gateway.notification_requests(), vec![5]);

            h.controller.stop().await.unwrap();
            tokio::time::sleep(Duration::from_secs(300)).await;

            assert_eq!(h.gateway.notification_requests(), vec![5]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_keeps_watermark() {
        let h = harness().await;

        h.controller.start(5).await.unwrap();
        tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
        h.controller.stop().await.unwrap();

        assert!(h.store.get("last_checked:5").await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_suspend_then_resume_recreates_timer() {
        let h = harness().await;

        h.controller.start(5).await.unwrap();
        h.controller.suspend().await;
        assert_eq!(h.controller.state().await, MonitoringState::Stopped);
        assert_eq!(
            state::load_monitoring_target(h.store.as_ref()).await.unwrap(),
            Some(5)
        );

        tokio::time::sleep(INTERVAL * 2).await;
        assert!(h.gateway.notification_requests().is_empty());

        assert_eq!(h.controller.resume().await.unwrap(), Some(5));
        tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
        assert_eq!(h.gateway.notification_requests(), vec![5]);
        // The background task stayed registered through the suspend.
        assert_eq!(
            h.tasks.log(),
            vec!["define background-notification-task", "register background-notification-task"]
        );
    }

    #[tokio::test]
    async fn test_resume_without_target_does_nothing() {
        let h = harness().await;
        assert_eq!(h.controller.resume().await.unwrap(), None);
        assert_eq!(h.controller.state().await, MonitoringState::Stopped);
    }

    #[tokio::test]
    async fn test_registration_failure_does_not_prevent_foreground_polling() {
        let gateway = Arc::new(FakeGateway::default());
        let store = Arc::new(MemoryStateStore::new());
        // Nothing defined, so registration fails.
        let tasks = Arc::new(FakeBackgroundTasks::default());
        let tracker = Arc::new(WatermarkTracker::new(
            gateway,
            Arc::new(RecordingPresenter::granted()),
            store.clone(),
        ));
        let controller = MonitoringController::new(tracker, tasks.clone(), store, INTERVAL);

        controller.start(5).await.unwrap();
        assert_eq!(controller.state().await, MonitoringState::Running(5));
        assert!(!tasks.is_registered(BACKGROUND_NOTIFICATION_TASK).await);
    }
}
