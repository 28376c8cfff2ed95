use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tokio::time::Duration;
use tracing::{error, info};

use trendwire::authority::AuthorityEstimator;
use trendwire::db::Database;
use trendwire::environment::{get_env_var_or, get_env_var_or_string};
use trendwire::logging::configure_logging;
use trendwire::pipeline::IngestPipeline;
use trendwire::rss::{FetchConfig, DEFAULT_FETCH_CONCURRENCY, DEFAULT_USER_AGENT};
use trendwire::scheduler::Scheduler;

#[tokio::main]
async fn main() -> Result<()> {
    configure_logging();

    let (cancel_tx, cancel_rx) = watch::channel(false);

    tokio::spawn(async move {
        if signal::ctrl_c().await.is_err() {
            error!("Failed to listen for ctrl-c");
        }
        let _ = cancel_tx.send(true);
    });

    let database_path = get_env_var_or_string("DATABASE_PATH", "trendwire.db");
    let db = Database::new(&database_path).await?;

    let fetch_config = FetchConfig {
        user_agent: get_env_var_or_string("FETCH_USER_AGENT", DEFAULT_USER_AGENT),
        timeout: Duration::from_secs(get_env_var_or("FETCH_TIMEOUT_SECS", 30u64)),
        concurrency: get_env_var_or("FETCH_CONCURRENCY", DEFAULT_FETCH_CONCURRENCY),
    };

    let interval = Duration::from_secs(get_env_var_or("SCHEDULER_INTERVAL_SECS", 600u64));

    info!(
        "Starting trendwire: database={}, interval={:?}, fetch concurrency={}",
        database_path, interval, fetch_config.concurrency
    );

    let authority_interval =
        Duration::from_secs(get_env_var_or("AUTHORITY_REFRESH_SECS", 1800u64));
    let estimator = AuthorityEstimator::new(db.clone());
    let authority_cancel = cancel_rx.clone();
    tokio::spawn(async move {
        estimator.run_periodic(authority_interval, authority_cancel).await;
    });

    let pipeline = Arc::new(IngestPipeline::new(db, fetch_config));
    let scheduler = Scheduler::new(pipeline, interval);

    scheduler.run(cancel_rx).await;

    info!("Shutdown complete");
    Ok(())
}
