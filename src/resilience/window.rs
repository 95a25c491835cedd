//! Sliding time windows for recurring failure detection

use std::collections::VecDeque;
use std::hash::Hash;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::config::ResilienceConfig;

fn prune(events: &mut VecDeque<Instant>, window: Duration, now: Instant) {
    while let Some(oldest) = events.front() {
        if now.duration_since(*oldest) > window {
            events.pop_front();
        } else {
            break;
        }
    }
}

/// Counts events that happened within the last `window`
#[derive(Debug)]
pub struct FailureWindow {
    window: Duration,
    threshold: usize,
    events: Mutex<VecDeque<Instant>>,
}

impl FailureWindow {
    pub fn new(window: Duration, threshold: usize) -> Self {
        Self {
            window,
            threshold: threshold.max(1),
            events: Mutex::new(VecDeque::new()),
        }
    }

    /// Record one event and return the number of events in the window
    pub fn record(&self) -> usize {
        let now = Instant::now();
        let mut events = self.events.lock();
        prune(&mut events, self.window, now);
        events.push_back(now);
        events.len()
    }

    /// Record one event and report whether the threshold is reached
    pub fn record_and_check(&self) -> bool {
        self.record() >= self.threshold
    }

    pub fn count(&self) -> usize {
        let mut events = self.events.lock();
        prune(&mut events, self.window, Instant::now());
        events.len()
    }

    pub fn is_quiet(&self) -> bool {
        self.count() == 0
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

/// A [`FailureWindow`] per key
#[derive(Debug)]
pub struct KeyedFailureWindow<K: Eq + Hash> {
    window: Duration,
    threshold: usize,
    events: DashMap<K, VecDeque<Instant>>,
}

impl<K: Eq + Hash + Clone> KeyedFailureWindow<K> {
    pub fn new(window: Duration, threshold: usize) -> Self {
        Self {
            window,
            threshold: threshold.max(1),
            events: DashMap::new(),
        }
    }

    /// Record one event for `key` and return that key's count in the window
    pub fn record(&self, key: &K) -> usize {
        let now = Instant::now();
        let mut events = self.events.entry(key.clone()).or_default();
        prune(&mut events, self.window, now);
        events.push_back(now);
        events.len()
    }

    pub fn record_and_check(&self, key: &K) -> bool {
        self.record(key) >= self.threshold
    }

    pub fn count(&self, key: &K) -> usize {
        let now = Instant::now();
        match self.events.get_mut(key) {
            Some(mut events) => {
                prune(&mut events, self.window, now);
                events.len()
            }
            None => 0,
        }
    }

    /// Drop expired events and keys without events left
    pub fn prune(&self) {
        let now = Instant::now();
        self.events.retain(|_, events| {
            prune(events, self.window, now);
            !events.is_empty()
        });
    }

    pub fn is_quiet(&self) -> bool {
        self.prune();
        self.events.is_empty()
    }
}

/// Failure windows shared by the store adapter, the ledger façade and the health monitor
#[derive(Debug)]
pub struct FailurePatterns {
    /// Technical store failures
    pub transient: FailureWindow,
    /// Version conflicts per wallet
    pub contention: KeyedFailureWindow<Uuid>,
}

impl FailurePatterns {
    pub fn new(config: &ResilienceConfig) -> Self {
        Self {
            transient: FailureWindow::new(config.transient.window(), config.transient.threshold),
            contention: KeyedFailureWindow::new(config.contention.window(), config.contention.threshold),
        }
    }
}
