//! Harness event log.
//!
//! The log keeps a bounded, strictly ordered history of [`HarnessEvent`]s and
//! fans them out over a broadcast stream. Phase ordering can be checked from
//! the history alone since every publish is serialized by one lock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;

pub mod events;

pub use events::HarnessEvent;

/// Snapshot of the log state.
#[derive(Debug, Clone)]
pub struct EventSnapshot {
    pub recent: Vec<HarnessEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
}

struct EventLogInner {
    tx: broadcast::Sender<HarnessEvent>,
    history: Mutex<VecDeque<HarnessEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

/// Cloneable handle to a shared event log.
#[derive(Clone)]
pub struct EventLog {
    inner: Arc<EventLogInner>,
}

impl EventLog {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self {
            inner: Arc::new(EventLogInner {
                tx,
                history: Mutex::new(VecDeque::with_capacity(history_capacity)),
                history_capacity,
                total_events: AtomicU64::new(0),
                dropped_history: AtomicU64::new(0),
            }),
        }
    }

    pub fn publish(&self, event: HarnessEvent) {
        let inner = &self.inner;
        {
            let mut history = inner
                .history
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            inner.total_events.fetch_add(1, Ordering::Relaxed);
            if history.len() == inner.history_capacity {
                history.pop_front();
                inner.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        // No subscribers is the normal case outside of tests.
        let _ = inner.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HarnessEvent> {
        self.inner.tx.subscribe()
    }

    pub fn snapshot(&self) -> EventSnapshot {
        let history = self
            .inner
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        EventSnapshot {
            recent: history.iter().cloned().collect(),
            total_events: self.inner.total_events.load(Ordering::Relaxed),
            dropped_events: self.inner.dropped_history.load(Ordering::Relaxed),
        }
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(256, 1024)
    }
}
