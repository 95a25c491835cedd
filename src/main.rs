use std::sync::Arc;
use std::time::Duration;

use actix_web::middleware::from_fn;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;
use tokio::sync::watch;

use wallet_ledger::adapters::{CacheAdapter, EventChannelAdapter, LedgerStoreAdapter};
use wallet_ledger::cache::AnyCache;
use wallet_ledger::channel::{EventChannel, LogEventChannel};
use wallet_ledger::config::{self, DatabaseConfig};
use wallet_ledger::database::{self, SeaOrmLedgerStore};
use wallet_ledger::metrics::{AppMetrics, track_http};
use wallet_ledger::monitor::HealthMonitor;
use wallet_ledger::outbox::OutboxRelay;
use wallet_ledger::resilience::{DegradationCoordinator, FailurePatterns, RetryPolicy};
use wallet_ledger::services::{HealthReporter, LedgerDependencies, LedgerFacade};
use wallet_ledger::store::{InMemoryLedgerStore, LedgerStore};
use wallet_ledger::{router, telemetry};

type Stores = (Arc<dyn LedgerStore>, Arc<dyn LedgerStore>);

async fn stores(config: &DatabaseConfig) -> anyhow::Result<Stores> {
    if config.is_memory() {
        tracing::warn!("Using the in-process store; data is lost on exit");
        let primary = InMemoryLedgerStore::new();
        let replica = primary.replica_handle();
        return Ok((Arc::new(primary), Arc::new(replica)));
    }

    let primary = SeaOrmLedgerStore::new(
        database::connect(&config.primary_url, config, true)
            .await
            .context("primary database")?,
    );
    let replica = match &config.replica_url {
        Some(url) => SeaOrmLedgerStore::new(
            database::connect(url, config, false)
                .await
                .context("replica database")?,
        ),
        None => primary.clone(),
    };
    Ok((Arc::new(primary), Arc::new(replica)))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = config::load()?;
    telemetry::init(&config.observability);
    let metrics = AppMetrics::with_config(Some(&config));

    tracing::info!(
        name = %config.app.name,
        version = %config.app.version,
        environment = %config.app.environment,
        "Starting"
    );

    let resilience = &config.resilience;
    let coordinator = Arc::new(DegradationCoordinator::new());
    let patterns = Arc::new(FailurePatterns::new(resilience));

    let (primary, replica) = stores(&config.database).await?;
    let store = Arc::new(LedgerStoreAdapter::new(
        primary,
        replica,
        resilience,
        coordinator.clone(),
        patterns.clone(),
    ));

    let cache = Arc::new(AnyCache::from_config(&config.cache).await?);
    let cache = Arc::new(CacheAdapter::new(
        cache,
        &resilience.cache,
        coordinator.clone(),
        store.clone(),
        Duration::from_secs(config.cache.wallet_ttl),
    ));

    let channel: Arc<dyn EventChannel> = Arc::new(LogEventChannel::new());
    let events = Arc::new(EventChannelAdapter::new(
        channel,
        &resilience.event_channel,
        coordinator.clone(),
        config.outbox.topic.clone(),
    ));

    let relay = Arc::new(OutboxRelay::new(store.clone(), events.clone(), config.outbox.clone()));
    let monitor = Arc::new(HealthMonitor::new(
        store.clone(),
        cache.clone(),
        coordinator.clone(),
        patterns.clone(),
        resilience.check_interval(),
    ));
    let ledger = Arc::new(LedgerFacade::new(LedgerDependencies {
        store,
        cache,
        channel: events,
        coordinator,
        patterns,
        retry: RetryPolicy::from(&resilience.retry),
        relay: relay.notifier(),
        outbox: config.outbox.clone(),
    }));

    let (shutdown, shutdown_rx) = watch::channel(false);
    let relay_task = relay.spawn(shutdown_rx.clone());
    let monitor_task = monitor.spawn(shutdown_rx);

    let reporter: Arc<dyn HealthReporter> = ledger;
    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(Data::from(reporter.clone()))
            .app_data(Data::new(metrics.clone()))
            .wrap(from_fn(track_http))
            .configure(router::route)
    })
    .shutdown_timeout(config.app.shutdown_timeout);
    if config.server.workers > 0 {
        server = server.workers(config.server.workers);
    }

    let address = (config.server.host.as_str(), config.server.port);
    tracing::info!(host = %address.0, port = address.1, "Listening");
    server.bind(address)?.run().await?;

    tracing::info!("Shutting down background tasks");
    let _ = shutdown.send(true);
    let _ = tokio::join!(relay_task, monitor_task);
    Ok(())
}
