use chrono::NaiveDate;
use marketreplay::*;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Instant;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(2);

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

fn aapl_series() -> Vec<PricePoint> {
    vec![
        PricePoint::new(day(1), 100.0),
        PricePoint::new(day(4), 102.0),
        PricePoint::new(day(5), 101.0),
    ]
}

fn create_test_engine(window_size: usize) -> ReplayEngine {
    let engine = ReplayEngine::new(
        Duration::from_millis(2000),
        window_size,
        TickAlignment::Position,
        None,
        16,
    );
    engine.load("AAPL", aapl_series()).unwrap();
    engine
}

#[test]
fn test_single_symbol_walkthrough() {
    let _ = tracing_subscriber::fmt::try_init();
    let engine = create_test_engine(2);

    // Nothing traded yet
    assert!(matches!(
        engine.bind_trade_time(Order::new("AAPL", Side::Buy, 10)),
        Err(ReplayError::ClockNotStarted)
    ));

    let first = engine.tick();
    assert_eq!(first.tick_index, 1);
    assert_eq!(first.current_date, Some(day(4)));
    assert_eq!(first.price("AAPL"), Some(102.0));

    let window = engine.chart_window("AAPL").unwrap();
    assert_eq!(
        window.points(),
        &[PricePoint::new(day(1), 100.0), PricePoint::new(day(4), 102.0)]
    );
    assert_eq!(engine.classify(&window).unwrap(), Trend::Up);

    let dated = engine
        .bind_trade_time(Order::new("AAPL", Side::Buy, 10))
        .unwrap();
    assert_eq!(dated.date, day(4));
    assert_eq!(dated.quantity, 10);

    let second = engine.tick();
    assert_eq!(second.price("AAPL"), Some(101.0));
    assert_eq!(engine.trend("AAPL").unwrap(), Trend::Down);
    assert!(engine.is_playback_complete());

    // Past the end: empty prices, date holds
    let third = engine.tick();
    assert_eq!(third.tick_index, 3);
    assert!(third.prices.is_empty());
    assert_eq!(third.current_date, Some(day(5)));
}

#[test]
fn test_tick_index_matches_tick_count() {
    let engine = create_test_engine(50);

    for n in 1..=20u64 {
        engine.tick();
        assert_eq!(engine.state().tick_index, n);
    }
}

#[test]
fn test_observers_see_every_tick_in_order() {
    let engine = create_test_engine(2);
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);

    engine
        .subscribe(move |s: &PriceSnapshot| -> anyhow::Result<()> {
            tx.lock().unwrap().send(s.clone())?;
            Ok(())
        })
        .unwrap();

    // Empty snapshot is delivered before any tick
    let initial = rx.try_recv().unwrap();
    assert_eq!(initial.tick_index, 0);
    assert!(initial.prices.is_empty());

    engine.tick();
    engine.tick();

    let received: Vec<PriceSnapshot> = (0..2).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
    assert_eq!(received[0].tick_index, 1);
    assert_eq!(received[0].price("AAPL"), Some(102.0));
    assert_eq!(received[1].tick_index, 2);
    assert_eq!(received[1].price("AAPL"), Some(101.0));
}

#[test]
fn test_failing_observer_does_not_block_others() {
    let engine = create_test_engine(2);

    engine
        .subscribe(|_: &PriceSnapshot| -> anyhow::Result<()> {
            anyhow::bail!("observer unavailable")
        })
        .unwrap();

    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    engine
        .subscribe(move |s: &PriceSnapshot| -> anyhow::Result<()> {
            tx.lock().unwrap().send(s.tick_index)?;
            Ok(())
        })
        .unwrap();

    engine.tick();

    assert_eq!(rx.recv_timeout(WAIT).unwrap(), 0);
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), 1);
    assert_eq!(engine.state().tick_index, 1);
}

#[test]
fn test_rejected_load_keeps_previous_series() {
    let engine = create_test_engine(2);

    let out_of_order = vec![
        PricePoint::new(day(5), 90.0),
        PricePoint::new(day(1), 91.0),
    ];
    let err = engine.load("AAPL", out_of_order).unwrap_err();
    assert!(matches!(err, ReplayError::InvalidSeries { .. }));

    let kept = engine.store().get("AAPL").unwrap();
    assert_eq!(&kept[..], aapl_series().as_slice());
}

#[test]
fn test_symbols_of_different_length() {
    let engine = create_test_engine(2);
    engine
        .load(
            "MSFT",
            vec![
                PricePoint::new(day(1), 400.0),
                PricePoint::new(day(4), 405.0),
            ],
        )
        .unwrap();

    let first = engine.tick();
    assert_eq!(first.price("AAPL"), Some(102.0));
    assert_eq!(first.price("MSFT"), Some(405.0));

    // MSFT is exhausted and simply drops out
    let second = engine.tick();
    assert_eq!(second.price("AAPL"), Some(101.0));
    assert_eq!(second.price("MSFT"), None);
}

#[test]
fn test_engines_are_independent() {
    let a = create_test_engine(2);
    let b = create_test_engine(2);

    a.tick();
    a.tick();

    assert_eq!(a.state().tick_index, 2);
    assert_eq!(b.state().tick_index, 0);
    assert!(b.chart_window("AAPL").unwrap().is_empty());
}

#[test]
fn test_calendar_alignment_carries_prices_forward() {
    let engine = ReplayEngine::new(
        Duration::from_millis(2000),
        50,
        TickAlignment::Calendar,
        None,
        16,
    );
    engine.load("AAPL", aapl_series()).unwrap();
    engine
        .load("MSFT", vec![PricePoint::new(day(1), 400.0), PricePoint::new(day(5), 410.0)])
        .unwrap();

    let first = engine.tick();
    assert_eq!(first.current_date, Some(day(1)));
    assert_eq!(first.price("AAPL"), Some(100.0));
    assert_eq!(first.price("MSFT"), Some(400.0));

    // MSFT has no bar on the 4th; its last open carries
    let second = engine.tick();
    assert_eq!(second.current_date, Some(day(4)));
    assert_eq!(second.price("AAPL"), Some(102.0));
    assert_eq!(second.price("MSFT"), Some(400.0));
}

#[test]
fn test_subscribing_while_ticking_keeps_sequences_consecutive() {
    const TICKS: u64 = 300;

    // Queues large enough that nothing is dropped
    let engine = ReplayEngine::new(
        Duration::from_millis(2000),
        2,
        TickAlignment::Position,
        None,
        1024,
    );
    engine.load("AAPL", aapl_series()).unwrap();

    let ticker = {
        let engine = engine.clone();
        thread::spawn(move || {
            for _ in 0..TICKS {
                engine.tick();
                thread::sleep(Duration::from_micros(200));
            }
        })
    };

    let mut received = Vec::new();
    for i in 0..20 {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = engine
            .subscribe(move |s: &PriceSnapshot| -> anyhow::Result<()> {
                sink.lock().unwrap().push(s.tick_index);
                Ok(())
            })
            .unwrap();
        // Every other observer leaves again mid-run
        if i % 2 == 1 {
            thread::sleep(Duration::from_millis(1));
            engine.unsubscribe(id);
        }
        received.push((i % 2 == 0, seen));
        thread::sleep(Duration::from_millis(2));
    }

    ticker.join().unwrap();

    let deadline = Instant::now() + WAIT;
    for (stays, seen) in &received {
        if *stays {
            while seen.lock().unwrap().last() != Some(&TICKS) && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(5));
            }
        }
    }

    for (stays, seen) in &received {
        let ticks = seen.lock().unwrap().clone();
        assert!(!ticks.is_empty());
        for pair in ticks.windows(2) {
            assert_eq!(pair[1], pair[0] + 1, "gap or reorder in {:?}", ticks);
        }
        if *stays {
            assert_eq!(ticks.last(), Some(&TICKS));
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_started_engine_ticks_on_period() {
    let engine = create_test_engine(2);

    assert!(engine.start().unwrap());
    assert!(!engine.start().unwrap());

    tokio::time::sleep(Duration::from_millis(4100)).await;
    assert_eq!(engine.state().tick_index, 2);

    engine.shutdown();
    tokio::time::sleep(Duration::from_millis(10_000)).await;
    assert_eq!(engine.state().tick_index, 2);
}
