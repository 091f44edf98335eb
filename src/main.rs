use merchant_companion::db::Database;
use merchant_companion::monitor::TokioBackgroundTasks;
use merchant_companion::notifications::sink::DeliverySink;
use merchant_companion::notifications::{HttpGateway, LocalNotificationCenter, NotificationGateway};
use merchant_companion::{Config, NotificationScheduler};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("merchant_companion=info")),
        )
        .init();

    let config = Config::from_env().expect("Invalid configuration");
    tracing::info!(
        "Starting with API {} and a {:?} poll interval",
        config.api_base_url,
        config.poll_interval
    );

    let db = Arc::new(
        Database::open(&config.database_path)
            .await
            .expect("Failed to initialize database"),
    );
    match db.entries().await {
        Ok(entries) => {
            for entry in entries {
                tracing::debug!("Stored state {} = {}", entry.key, entry.value);
            }
        }
        Err(e) => tracing::warn!("Could not list stored state: {}", e),
    }

    let gateway = Arc::new(
        HttpGateway::new(config.api_base_url.clone(), config.http_timeout)
            .expect("Failed to build HTTP client"),
    );
    let center = Arc::new(LocalNotificationCenter::new(delivery_sink()));
    let tasks = Arc::new(TokioBackgroundTasks::new());

    let scheduler = NotificationScheduler::new(
        db.clone(),
        gateway.clone(),
        center,
        tasks.clone(),
        config.poll_interval,
    );

    if let Err(e) = scheduler.init().await {
        tracing::error!("Failed to initialize notification scheduler: {}", e);
    }

    if let Some(company_id) = config.company_id {
        if let Some(remote) = gateway.fetch_summary_config(company_id).await {
            if let Err(e) = scheduler.configure_summaries(&remote.config).await {
                tracing::error!("Failed to apply summary settings: {}", e);
            }
        }
        if let Err(e) = scheduler.start_monitoring(company_id).await {
            tracing::error!("Failed to start monitoring company {}: {}", company_id, e);
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }

    scheduler.shutdown().await;
    tasks.shutdown().await;
    db.pool().close().await;
}

#[cfg(feature = "desktop")]
fn delivery_sink() -> Arc<dyn DeliverySink> {
    Arc::new(merchant_companion::notifications::sink::DesktopSink::new("Master Pagamentos"))
}

#[cfg(not(feature = "desktop"))]
fn delivery_sink() -> Arc<dyn DeliverySink> {
    Arc::new(merchant_companion::notifications::sink::LogSink)
}
