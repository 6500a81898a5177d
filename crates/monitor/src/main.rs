use std::sync::Arc;
use std::time::Duration;

use queuewatch::config::Config;
use queuewatch::poll::{BackoffConfig, Poller, PollerConfig, TokioScheduler};
use queuewatch::store::{cutoff_days, sweep_metrics, FailureLedger, MetricStore};
use queuewatch::{db, ClientConfig, Connection, JobServerClient, QueueControls};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = Config::from_env()?;
    info!(
        server = %cfg.server_url,
        db = %cfg.database_path,
        interval_secs = cfg.poll_interval_secs,
        retention_days = cfg.metric_retention_days,
        backoff = cfg.backoff_enabled,
        "queuewatch monitor starting"
    );

    let pool = db::make_pool(&cfg.database_path).await?;
    if cfg.migrate_on_startup {
        db::run_migrations(&pool).await?;
    }

    let metrics = MetricStore::new(pool.clone());
    let ledger = FailureLedger::new(pool.clone());

    let client = Arc::new(JobServerClient::new(&ClientConfig {
        base_url: cfg.server_url.clone(),
        api_token: cfg.api_token.clone(),
        timeout: Duration::from_secs(cfg.http_timeout_secs),
    })?);
    let _controls = QueueControls::new(Arc::clone(&client), ledger.clone());

    let poller = Poller::new(
        client,
        metrics.clone(),
        Arc::new(TokioScheduler),
        PollerConfig {
            interval: Duration::from_secs(cfg.poll_interval_secs),
            persist_metrics: cfg.persist_metrics,
            backoff: cfg.backoff_enabled.then(BackoffConfig::default),
        },
    );

    // The UI stand-in: log every published status transition.
    let subscription = poller.subscribe(|status| match &status.connection {
        Connection::Connected => {
            if let Some(stats) = &status.stats {
                info!(
                    queues = status.snapshots.len(),
                    active_workers = stats.active_workers,
                    failed = stats.jobs_failed_today,
                    processed = stats.jobs_processed_since_start,
                    rate_per_min = stats.average_rate_per_minute,
                    "connected"
                );
            }
        }
        Connection::Disconnected { message } => {
            error!(%message, "disconnected");
        }
    });

    poller.start();

    // ---- Maintenance task ----
    let maintenance_handle = {
        let metrics = metrics.clone();
        let retention_days = cfg.metric_retention_days;
        let every = Duration::from_secs(cfg.maintenance_interval_secs);
        tokio::spawn(async move {
            loop {
                match sweep_metrics(&metrics, cutoff_days(retention_days)).await {
                    Ok(n) if n > 0 => info!(deleted = n, "maintenance sweep done"),
                    Ok(_) => {}
                    Err(err) => error!(%err, "maintenance sweep failed"),
                }
                tokio::time::sleep(every).await;
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    poller.stop();
    maintenance_handle.abort();
    drop(subscription);

    Ok(())
}
