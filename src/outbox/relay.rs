use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::{counter, gauge};
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::adapters::{EventChannelAdapter, LedgerStoreAdapter, PublishOutcome};
use crate::config::OutboxConfig;
use crate::error::LedgerError;

/// What one relay pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayCycle {
    pub published: usize,
    pub deferred: usize,
    /// Left pending to keep per-aggregate order, or because the channel went down
    pub skipped: usize,
    /// Deferred records whose attempt count reached the alert threshold
    pub alerts: usize,
    /// The pass stopped early because the channel is not accepting events
    pub channel_unavailable: bool,
}

/// Drains pending outbox records through the event channel
///
/// Records are fetched oldest first. Once a record of an aggregate is deferred,
/// the rest of that aggregate's records wait for the next pass, so each
/// aggregate's events are delivered in commit order. Publishing is at-least-once
/// and consumers deduplicate on the record id, which makes running more than one
/// relay safe.
pub struct OutboxRelay {
    store: Arc<LedgerStoreAdapter>,
    channel: Arc<EventChannelAdapter>,
    config: OutboxConfig,
    notify: Arc<Notify>,
}

impl OutboxRelay {
    pub fn new(store: Arc<LedgerStoreAdapter>, channel: Arc<EventChannelAdapter>, config: OutboxConfig) -> Self {
        Self {
            store,
            channel,
            config,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Handle that wakes the relay loop early, notified after each commit
    pub fn notifier(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn run_once(&self) -> Result<RelayCycle, LedgerError> {
        let mut cycle = RelayCycle::default();

        if (self.channel.is_degraded() || self.channel.is_open()) && !self.channel.check_health().await {
            cycle.channel_unavailable = true;
            self.update_pending_gauge().await;
            return Ok(cycle);
        }

        let batch = self.store.pending_outbox(self.config.batch_size).await?;
        let mut blocked: HashSet<Uuid> = HashSet::new();

        for record in &batch {
            if cycle.channel_unavailable || blocked.contains(&record.aggregate_id) {
                cycle.skipped += 1;
                continue;
            }

            match self.channel.publish(record).await {
                PublishOutcome::Published => {
                    self.store.mark_published(record.id, Utc::now()).await?;
                    counter!("outbox_published_total").increment(1);
                    cycle.published += 1;
                }
                PublishOutcome::Deferred { reason } => {
                    blocked.insert(record.aggregate_id);
                    cycle.deferred += 1;
                    counter!("outbox_publish_failures_total").increment(1);

                    let attempts = self.store.record_publish_failure(record.id, &reason).await?;
                    if attempts >= self.config.max_attempts {
                        cycle.alerts += 1;
                        if attempts == self.config.max_attempts {
                            counter!("outbox_alerts_total").increment(1);
                        }
                        tracing::error!(
                            outbox_id = %record.id,
                            aggregate_id = %record.aggregate_id,
                            event_type = %record.event_type,
                            attempts,
                            error = %reason,
                            "Outbox record keeps failing to publish"
                        );
                    }

                    if self.channel.is_open() {
                        cycle.channel_unavailable = true;
                    }
                }
            }
        }

        self.update_pending_gauge().await;
        if cycle.published > 0 || cycle.deferred > 0 {
            tracing::debug!(
                published = cycle.published,
                deferred = cycle.deferred,
                skipped = cycle.skipped,
                "Outbox relay pass finished"
            );
        }
        Ok(cycle)
    }

    /// Run passes until nothing is pending or a pass makes no progress
    pub async fn drain(&self, max_passes: usize) -> Result<usize, LedgerError> {
        let mut published = 0;
        for _ in 0..max_passes {
            let cycle = self.run_once().await?;
            published += cycle.published;
            if cycle.published == 0 {
                break;
            }
        }
        Ok(published)
    }

    /// Run the relay until `shutdown` flips to true
    ///
    /// The loop polls every `poll_interval` and wakes early on commit
    /// notifications. While the channel is unavailable it backs off
    /// exponentially up to `max_backoff`, probing only once per wait.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let poll = self.config.poll_interval();
            let max_backoff = self.config.max_backoff();
            let mut backoff = poll;
            tracing::info!(topic = self.channel.topic(), "Outbox relay started");

            loop {
                if *shutdown.borrow() {
                    break;
                }

                let healthy = match self.run_once().await {
                    Ok(cycle) => !cycle.channel_unavailable,
                    Err(err) => {
                        tracing::warn!(error = %err, "Outbox relay pass failed");
                        false
                    }
                };

                let wait = if healthy {
                    backoff = poll;
                    poll
                } else {
                    backoff = next_backoff(backoff, max_backoff);
                    backoff
                };

                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(wait) => {}
                    _ = self.notify.notified(), if healthy => {}
                }
            }

            tracing::info!("Outbox relay stopped");
        })
    }

    async fn update_pending_gauge(&self) {
        match self.store.count_pending_outbox().await {
            Ok(pending) => gauge!("outbox_pending").set(pending as f64),
            Err(err) => tracing::debug!(error = %err, "Could not count pending outbox records"),
        }
    }
}

fn next_backoff(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}
