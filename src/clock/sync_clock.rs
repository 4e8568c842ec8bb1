use super::alignment::{self, TickAlignment, TickPrices};
use crate::broadcast::Broadcaster;
use crate::error::ReplayError;
use crate::models::{ClockState, PriceSnapshot};
use crate::store::SeriesStore;
use crate::Result;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

struct ClockInner {
    store: SeriesStore,
    broadcaster: Broadcaster,
    alignment: TickAlignment,
    start_date: Option<NaiveDate>,
    state: RwLock<Arc<ClockState>>,
    tick_guard: Mutex<()>,
    running: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Replay clock shared by every symbol
///
/// Cheap to clone; clones drive the same tick index. Independent `Clock`
/// instances never share state.
#[derive(Clone)]
pub struct Clock {
    inner: Arc<ClockInner>,
}

impl Clock {
    /// Position-aligned clock over `store`, publishing through `broadcaster`
    pub fn new(store: SeriesStore, broadcaster: Broadcaster) -> Self {
        Self::with_alignment(store, broadcaster, TickAlignment::Position, None)
    }

    /// Clock with an explicit alignment; `start_date` only applies to
    /// calendar alignment.
    pub fn with_alignment(
        store: SeriesStore,
        broadcaster: Broadcaster,
        alignment: TickAlignment,
        start_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            inner: Arc::new(ClockInner {
                store,
                broadcaster,
                alignment,
                start_date,
                state: RwLock::new(Arc::new(ClockState::default())),
                tick_guard: Mutex::new(()),
                running: AtomicBool::new(false),
                task: Mutex::new(None),
            }),
        }
    }

    /// Start ticking every `period`
    ///
    /// Returns `Ok(false)` without doing anything if the clock already runs.
    /// Outside a tokio runtime this fails with `NoRuntime` and the clock
    /// stays stopped.
    pub fn start(&self, period: Duration) -> Result<bool> {
        if period.is_zero() {
            return Err(ReplayError::Config(config::ConfigError::Message(
                "tick period must be greater than zero".to_string(),
            )));
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ReplayError::NoRuntime)?;

        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Clock already running, ignoring start");
            return Ok(false);
        }

        let weak = Arc::downgrade(&self.inner);
        let handle = runtime.spawn(run_ticks(weak, period));
        *self.inner.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        tracing::info!(
            period_ms = period.as_millis() as u64,
            alignment = ?self.inner.alignment,
            symbols = self.inner.store.symbols().len(),
            "Replay clock started"
        );

        Ok(true)
    }

    /// Advance one tick and broadcast the result
    ///
    /// Ticks are serialized: concurrent callers and the interval task never
    /// overlap.
    pub fn tick(&self) -> Arc<PriceSnapshot> {
        tick_inner(&self.inner)
    }

    /// Stop the interval task. The tick index is kept.
    pub fn shutdown(&self) {
        if let Some(handle) = self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        if self.inner.running.swap(false, Ordering::SeqCst) {
            tracing::info!(tick = self.state().tick_index, "Replay clock stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Consistent view of tick index and simulated date
    pub fn state(&self) -> Arc<ClockState> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn current_date(&self) -> Option<NaiveDate> {
        self.state().current_date
    }

    /// Most recent snapshot (empty before the first tick)
    pub fn latest(&self) -> Arc<PriceSnapshot> {
        self.inner.broadcaster.latest()
    }

    pub fn alignment(&self) -> TickAlignment {
        self.inner.alignment
    }

    pub fn store(&self) -> &SeriesStore {
        &self.inner.store
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.inner.broadcaster
    }

    /// True once no loaded series has data beyond the current tick
    pub fn is_playback_complete(&self) -> bool {
        let tick = self.state().tick_index;
        let remaining = match self.inner.alignment {
            TickAlignment::Position => self.inner.store.longest_len().saturating_sub(1),
            TickAlignment::Calendar => {
                alignment::calendar_from(&self.inner.store, self.inner.start_date).len()
            }
        };
        tick >= remaining as u64
    }
}

async fn run_ticks(clock: Weak<ClockInner>, period: Duration) {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let Some(inner) = clock.upgrade() else {
            tracing::debug!("Clock dropped, stopping tick task");
            break;
        };
        tick_inner(&inner);
    }
}

fn tick_inner(inner: &ClockInner) -> Arc<PriceSnapshot> {
    let _guard = inner.tick_guard.lock().unwrap_or_else(PoisonError::into_inner);

    let previous = inner
        .state
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    let tick_index = previous.tick_index + 1;

    let TickPrices { prices, date } = match inner.alignment {
        TickAlignment::Position => alignment::position_prices(&inner.store, tick_index),
        TickAlignment::Calendar => {
            alignment::calendar_prices(&inner.store, tick_index, inner.start_date)
        }
    };

    let snapshot = Arc::new(PriceSnapshot {
        tick_index,
        current_date: date.or(previous.current_date),
        prices,
    });

    *inner.state.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot.state());
    let delivered = inner.broadcaster.publish(snapshot.clone());

    tracing::debug!(
        tick = tick_index,
        date = ?snapshot.current_date,
        symbols = snapshot.prices.len(),
        delivered,
        "Tick"
    );

    snapshot
}
