//! Snapshot fan-out
//!
//! Every registered observer owns a bounded queue drained by its own worker
//! thread, so a slow or failing observer never holds up the tick or its peers.
//! A newly registered observer receives the latest snapshot synchronously,
//! before `subscribe` returns.

use crate::error::ReplayError;
use crate::models::PriceSnapshot;
use crate::Result;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Recipient of price snapshots
///
/// Implemented for any `Fn(&PriceSnapshot) -> anyhow::Result<()>` closure.
pub trait SnapshotObserver: Send + Sync + 'static {
    fn on_snapshot(&self, snapshot: &PriceSnapshot) -> anyhow::Result<()>;
}

impl<F> SnapshotObserver for F
where
    F: Fn(&PriceSnapshot) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn on_snapshot(&self, snapshot: &PriceSnapshot) -> anyhow::Result<()> {
        self(snapshot)
    }
}

/// Token returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Registry {
    latest: Arc<PriceSnapshot>,
    queues: HashMap<SubscriptionId, mpsc::Sender<Arc<PriceSnapshot>>>,
}

/// Registry of observers plus the most recent snapshot
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<Mutex<Registry>>,
    queue_capacity: usize,
}

impl Broadcaster {
    /// Create a broadcaster whose per-observer queues hold `queue_capacity` snapshots
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                latest: Arc::new(PriceSnapshot::default()),
                queues: HashMap::new(),
            })),
            queue_capacity: queue_capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an observer
    ///
    /// The latest snapshot (an empty one before the first tick) is delivered
    /// before this returns. Snapshots published afterwards are queued and
    /// delivered in tick order once that first delivery completes.
    pub fn subscribe<O: SnapshotObserver>(&self, observer: O) -> Result<SubscriptionId> {
        let id = SubscriptionId::new();
        let observer: Arc<dyn SnapshotObserver> = Arc::new(observer);
        let (tx, rx) = mpsc::channel(self.queue_capacity);

        // Registration and the read of `latest` share one critical section, so
        // every later tick lands in the queue and none is seen twice.
        let latest = {
            let mut registry = self.lock();
            registry.queues.insert(id, tx);
            registry.latest.clone()
        };

        deliver(id, observer.as_ref(), &latest);

        let spawned = std::thread::Builder::new()
            .name(format!("observer-{}", id))
            .spawn(move || run_observer(id, observer, rx));

        if let Err(e) = spawned {
            self.lock().queues.remove(&id);
            return Err(ReplayError::Io(e));
        }

        tracing::debug!(observer = %id, tick = latest.tick_index, "Observer subscribed");

        Ok(id)
    }

    /// Remove an observer; returns false if it was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.lock().queues.remove(&id).is_some();
        if removed {
            tracing::debug!(observer = %id, "Observer unsubscribed");
        }
        removed
    }

    /// Record `snapshot` as the latest and queue it for every observer
    ///
    /// Returns how many observers accepted it.
    pub fn publish(&self, snapshot: Arc<PriceSnapshot>) -> usize {
        let mut registry = self.lock();
        registry.latest = snapshot.clone();

        let mut accepted = 0;
        let mut closed = Vec::new();

        for (id, queue) in &registry.queues {
            match queue.try_send(snapshot.clone()) {
                Ok(()) => accepted += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        observer = %id,
                        tick = snapshot.tick_index,
                        "Observer queue full, dropping snapshot"
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }

        for id in closed {
            tracing::warn!(observer = %id, "Observer worker gone, removing");
            registry.queues.remove(&id);
        }

        accepted
    }

    /// Most recently published snapshot
    pub fn latest(&self) -> Arc<PriceSnapshot> {
        self.lock().latest.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().queues.len()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

fn run_observer(
    id: SubscriptionId,
    observer: Arc<dyn SnapshotObserver>,
    mut rx: mpsc::Receiver<Arc<PriceSnapshot>>,
) {
    while let Some(snapshot) = rx.blocking_recv() {
        deliver(id, observer.as_ref(), &snapshot);
    }
    tracing::debug!(observer = %id, "Observer worker stopped");
}

/// Invoke one observer, isolating errors and panics
fn deliver(id: SubscriptionId, observer: &dyn SnapshotObserver, snapshot: &PriceSnapshot) -> bool {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| observer.on_snapshot(snapshot)));

    let message = match outcome {
        Ok(Ok(())) => return true,
        Ok(Err(e)) => format!("{:#}", e),
        Err(payload) => panic_message(payload.as_ref()),
    };

    let failure = ReplayError::ObserverFailure {
        id: id.to_string(),
        message,
    };
    tracing::warn!(tick = snapshot.tick_index, error = %failure, "Observer failed");

    false
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
