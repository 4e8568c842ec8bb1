use super::window::{align_window, Window};
use crate::broadcast::{Broadcaster, SnapshotObserver, SubscriptionId};
use crate::clock::{Clock, TickAlignment};
use crate::execution::TradeTimeBinder;
use crate::indicators;
use crate::models::{ClockState, DatedOrder, Order, PricePoint, PriceSnapshot, Trend};
use crate::settings::Settings;
use crate::store::SeriesStore;
use crate::Result;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;

/// Everything the presentation layer talks to
///
/// Owns one store, one clock and one broadcaster. Several engines can run
/// side by side without sharing state.
#[derive(Clone)]
pub struct ReplayEngine {
    store: SeriesStore,
    clock: Clock,
    binder: TradeTimeBinder,
    tick_period: Duration,
    window_size: usize,
}

impl ReplayEngine {
    /// Build an engine from explicit parts
    pub fn new(
        tick_period: Duration,
        window_size: usize,
        alignment: TickAlignment,
        start_date: Option<NaiveDate>,
        queue_capacity: usize,
    ) -> Self {
        let store = SeriesStore::new();
        let broadcaster = Broadcaster::new(queue_capacity);
        let clock = Clock::with_alignment(store.clone(), broadcaster, alignment, start_date);
        let binder = TradeTimeBinder::new(clock.clone());

        Self {
            store,
            clock,
            binder,
            tick_period,
            window_size,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.tick_period(),
            settings.window_size,
            settings.alignment,
            settings.start_date,
            settings.observer_queue_capacity,
        )
    }

    /// Load or replace a symbol's series
    pub fn load(&self, symbol: &str, series: Vec<PricePoint>) -> Result<()> {
        self.store.load(symbol, series)
    }

    /// Start the clock at the configured period; false if already running
    pub fn start(&self) -> Result<bool> {
        self.clock.start(self.tick_period)
    }

    /// Advance one tick by hand
    pub fn tick(&self) -> Arc<PriceSnapshot> {
        self.clock.tick()
    }

    pub fn shutdown(&self) {
        self.clock.shutdown();
    }

    pub fn subscribe<O: SnapshotObserver>(&self, observer: O) -> Result<SubscriptionId> {
        self.clock.broadcaster().subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.clock.broadcaster().unsubscribe(id)
    }

    /// Trailing window for `symbol` ending at the simulated date
    pub fn window(&self, symbol: &str, size: usize) -> Result<Window> {
        self.window_at(symbol, self.clock.current_date(), size)
    }

    /// Trailing window for `symbol` ending at an explicit reference date
    pub fn window_at(
        &self,
        symbol: &str,
        reference: Option<NaiveDate>,
        size: usize,
    ) -> Result<Window> {
        let series = self.store.get(symbol)?;
        Ok(align_window(&series, reference, size))
    }

    /// Trailing window at the configured size
    pub fn chart_window(&self, symbol: &str) -> Result<Window> {
        self.window(symbol, self.window_size)
    }

    pub fn classify(&self, window: &Window) -> Result<Trend> {
        indicators::classify(window)
    }

    /// Direction of the last move visible in `symbol`'s chart window
    pub fn trend(&self, symbol: &str) -> Result<Trend> {
        self.trend_at(symbol, self.clock.current_date())
    }

    /// Trend as of `reference`, e.g. the date carried by a snapshot
    pub fn trend_at(&self, symbol: &str, reference: Option<NaiveDate>) -> Result<Trend> {
        let window = self.window_at(symbol, reference, self.window_size)?;
        indicators::classify(&window)
    }

    pub fn bind_trade_time(&self, order: Order) -> Result<DatedOrder> {
        self.binder.bind(order)
    }

    pub fn state(&self) -> Arc<ClockState> {
        self.clock.state()
    }

    pub fn latest(&self) -> Arc<PriceSnapshot> {
        self.clock.latest()
    }

    pub fn is_playback_complete(&self) -> bool {
        self.clock.is_playback_complete()
    }

    pub fn store(&self) -> &SeriesStore {
        &self.store
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReplayError;
    use crate::models::Side;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn create_test_engine(window_size: usize) -> ReplayEngine {
        let engine = ReplayEngine::new(
            Duration::from_millis(2000),
            window_size,
            TickAlignment::Position,
            None,
            16,
        );
        engine
            .load(
                "AAPL",
                vec![
                    PricePoint::new(day(1), 100.0),
                    PricePoint::new(day(2), 102.0),
                    PricePoint::new(day(3), 101.0),
                ],
            )
            .unwrap();
        engine
    }

    #[test]
    fn test_window_before_first_tick_is_empty() {
        let engine = create_test_engine(2);

        assert!(engine.chart_window("AAPL").unwrap().is_empty());
        assert!(engine.trend("AAPL").unwrap_err().is_not_ready());
    }

    #[test]
    fn test_window_unknown_symbol() {
        let engine = create_test_engine(2);
        assert!(matches!(
            engine.window("GOOG", 2),
            Err(ReplayError::NotFound(_))
        ));
    }

    #[test]
    fn test_window_follows_clock() {
        let engine = create_test_engine(2);

        engine.tick();
        let window = engine.chart_window("AAPL").unwrap();
        assert_eq!(window.points(), &[PricePoint::new(day(1), 100.0), PricePoint::new(day(2), 102.0)]);
        assert_eq!(engine.classify(&window).unwrap(), Trend::Up);

        engine.tick();
        assert_eq!(engine.trend("AAPL").unwrap(), Trend::Down);
        // Earlier snapshots can still be classified as of their own date
        assert_eq!(engine.trend_at("AAPL", Some(day(2))).unwrap(), Trend::Up);
    }

    #[test]
    fn test_bind_trade_time_through_engine() {
        let engine = create_test_engine(2);

        assert!(matches!(
            engine.bind_trade_time(Order::new("AAPL", Side::Buy, 1)),
            Err(ReplayError::ClockNotStarted)
        ));

        engine.tick();
        let dated = engine.bind_trade_time(Order::new("AAPL", Side::Buy, 1)).unwrap();
        assert_eq!(dated.date, day(2));
    }

    #[test]
    fn test_from_settings() {
        let settings = Settings::build(Settings::defaults().unwrap()).unwrap();
        let engine = ReplayEngine::from_settings(&settings);

        assert_eq!(engine.window_size(), 50);
        assert_eq!(engine.clock().alignment(), TickAlignment::Position);
        assert!(engine.store().is_empty());
    }
}
