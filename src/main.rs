use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use marketreplay::api::LedgerClient;
use marketreplay::replay::{SeriesScenario, SyntheticSeriesGenerator};
use marketreplay::settings::Settings;
use marketreplay::{Order, PriceSnapshot, ReplayEngine, Side, TickAlignment};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, BufReader};

const SYNTHETIC_SCENARIOS: [SeriesScenario; 4] = [
    SeriesScenario::Uptrend,
    SeriesScenario::Sideways,
    SeriesScenario::Volatile,
    SeriesScenario::Downtrend,
];

#[derive(Parser)]
#[command(name = "marketreplay", about = "Replay daily prices as a live feed")]
struct Cli {
    /// Ledger base URL (overrides REPLAY_LEDGER_URL)
    #[arg(long, global = true)]
    ledger_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay prices and accept buy/sell commands on stdin
    Run(RunArgs),
    /// List trades recorded by the ledger
    Trades,
    /// Show net positions
    Positions,
    /// Show unrealized PnL
    Pnl,
    /// Show realized PnL per closing trade
    Realized,
}

#[derive(Args)]
struct RunArgs {
    /// Symbols to replay (comma separated)
    #[arg(long, value_delimiter = ',')]
    symbols: Option<Vec<String>>,

    /// Tick period in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Chart window size in points
    #[arg(long)]
    window: Option<usize>,

    /// position | calendar
    #[arg(long)]
    alignment: Option<TickAlignment>,

    /// Start calendar replay at the newest BUY trade in the ledger
    #[arg(long)]
    resume_from_last_buy: bool,

    /// Generate N synthetic points per symbol instead of fetching from the ledger
    #[arg(long)]
    synthetic: Option<usize>,

    /// Seed for synthetic series
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Ignore stdin and run until Ctrl+C
    #[arg(long)]
    no_console: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let mut settings = Settings::load().context("Failed to load settings")?;
    if let Some(url) = cli.ledger_url {
        settings.ledger_url = url;
    }

    let ledger = LedgerClient::new(&settings.ledger_url, settings.ledger_requests_per_second)?;

    match cli.command {
        Command::Run(args) => run(settings, ledger, args).await,
        Command::Trades => print_trades(&ledger).await,
        Command::Positions => print_positions(&ledger).await,
        Command::Pnl => print_pnl(&ledger).await,
        Command::Realized => print_realized(&ledger).await,
    }
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("marketreplay=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// ============================================================================
// Replay
// ============================================================================

async fn run(mut settings: Settings, ledger: LedgerClient, args: RunArgs) -> anyhow::Result<()> {
    if let Some(symbols) = args.symbols {
        settings.symbols = symbols.iter().map(|s| s.trim().to_uppercase()).collect();
    }
    if let Some(tick_ms) = args.tick_ms {
        anyhow::ensure!(tick_ms > 0, "--tick-ms must be greater than zero");
        settings.tick_period_ms = tick_ms;
    }
    if let Some(window) = args.window {
        anyhow::ensure!(window > 0, "--window must be greater than zero");
        settings.window_size = window;
    }
    if let Some(alignment) = args.alignment {
        settings.alignment = alignment;
    }
    if args.resume_from_last_buy {
        settings.alignment = TickAlignment::Calendar;
        settings.start_date = ledger.latest_buy_date().await?;
        match settings.start_date {
            Some(date) => tracing::info!("Resuming replay from last BUY on {}", date),
            None => tracing::warn!("No BUY trades in ledger, replaying from the beginning"),
        }
    }

    let engine = ReplayEngine::from_settings(&settings);

    match args.synthetic {
        Some(points) => load_synthetic(&engine, &settings.symbols, points, args.seed)?,
        None => load_from_ledger(&engine, &ledger, &settings.symbols).await?,
    }

    let observer_engine = engine.clone();
    let completed = AtomicBool::new(false);
    let subscription = engine.subscribe(move |snapshot: &PriceSnapshot| -> anyhow::Result<()> {
        log_snapshot(&observer_engine, snapshot);
        if observer_engine.is_playback_complete() && !completed.swap(true, Ordering::Relaxed) {
            tracing::info!(tick = snapshot.tick_index, "Playback complete, no more data to replay");
        }
        Ok(())
    })?;

    engine.start()?;

    tracing::info!(
        "Replaying {} symbols every {}ms (window {}, {:?} alignment)",
        engine.store().symbols().len(),
        settings.tick_period_ms,
        settings.window_size,
        settings.alignment
    );

    if args.no_console {
        tokio::signal::ctrl_c().await?;
    } else {
        tracing::info!("Commands: buy SYMBOL QTY | sell SYMBOL QTY | status | quit");
        console_loop(&engine, &ledger).await?;
    }

    engine.unsubscribe(subscription);
    engine.shutdown();
    tracing::info!("Replay stopped at tick {}", engine.state().tick_index);

    Ok(())
}

async fn load_from_ledger(
    engine: &ReplayEngine,
    ledger: &LedgerClient,
    symbols: &[String],
) -> anyhow::Result<()> {
    for symbol in symbols {
        let loaded = match ledger.fetch_prices(symbol).await {
            Ok(series) => engine.load(symbol, series),
            Err(e) => Err(e),
        };
        if let Err(e) = loaded {
            tracing::warn!("Skipping {}: {}", symbol, e);
        }
    }

    anyhow::ensure!(
        !engine.store().is_empty(),
        "No price series could be loaded from {}",
        ledger.base_url()
    );
    Ok(())
}

fn load_synthetic(
    engine: &ReplayEngine,
    symbols: &[String],
    points: usize,
    seed: u64,
) -> anyhow::Result<()> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).context("invalid start date")?;

    for (i, symbol) in symbols.iter().enumerate() {
        let scenario = SYNTHETIC_SCENARIOS[i % SYNTHETIC_SCENARIOS.len()];
        let mut generator = SyntheticSeriesGenerator::new(seed.wrapping_add(i as u64))
            .with_base_price(50.0 + 75.0 * i as f64);
        engine.load(symbol, generator.generate(scenario, start, points))?;
    }

    Ok(())
}

fn log_snapshot(engine: &ReplayEngine, snapshot: &PriceSnapshot) {
    let date = snapshot
        .current_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string());

    let quotes: Vec<String> = snapshot
        .prices
        .iter()
        .map(|(symbol, price)| {
            let trend = engine
                .trend_at(symbol, snapshot.current_date)
                .map(|t| t.to_string())
                .unwrap_or_else(|_| "-".to_string());
            format!("{} {:.2} ({})", symbol, price, trend)
        })
        .collect();

    tracing::info!(tick = snapshot.tick_index, date = %date, "{}", quotes.join(" | "));
}

async fn console_loop(engine: &ReplayEngine, ledger: &LedgerClient) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down...");
                return Ok(());
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("stdin closed, shutting down...");
                    return Ok(());
                };
                if !handle_command(engine, ledger, line.trim()).await {
                    return Ok(());
                }
            }
        }
    }
}

/// Returns false when the user asked to quit
async fn handle_command(engine: &ReplayEngine, ledger: &LedgerClient, line: &str) -> bool {
    let parts: Vec<&str> = line.split_whitespace().collect();

    match parts.as_slice() {
        [] => {}
        ["quit"] | ["exit"] => return false,
        ["status"] => {
            let state = engine.state();
            println!(
                "tick {} | date {} | complete {}",
                state.tick_index,
                state
                    .current_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                engine.is_playback_complete()
            );
        }
        [side, symbol, quantity] => match parse_order(side, symbol, quantity) {
            Ok(order) => place_order(engine, ledger, order).await,
            Err(e) => println!("❌ {}", e),
        },
        _ => println!("Unknown command: {}", line),
    }

    true
}

fn parse_order(side: &str, symbol: &str, quantity: &str) -> anyhow::Result<Order> {
    let side: Side = side.parse().map_err(anyhow::Error::msg)?;
    let quantity: u32 = quantity
        .parse()
        .with_context(|| format!("invalid quantity: {}", quantity))?;
    Ok(Order::new(symbol.to_uppercase(), side, quantity))
}

async fn place_order(engine: &ReplayEngine, ledger: &LedgerClient, order: Order) {
    let dated = match engine.bind_trade_time(order) {
        Ok(dated) => dated,
        Err(e) => {
            println!("❌ {}", e);
            return;
        }
    };

    match ledger.submit_trade(&dated).await {
        Ok(_) => println!(
            "✅ {} {} {} on {}",
            dated.side, dated.quantity, dated.symbol, dated.date
        ),
        Err(e) => println!("❌ {}", e),
    }
}

// ============================================================================
// Ledger reports
// ============================================================================

async fn print_trades(ledger: &LedgerClient) -> anyhow::Result<()> {
    let trades = ledger.fetch_trades().await?;

    println!(
        "{:<8} {:<6} {:>10} {:>12}  {}",
        "Symbol", "Side", "Quantity", "Price", "Timestamp"
    );
    println!("{}", "─".repeat(64));
    for t in &trades {
        println!(
            "{:<8} {:<6} {:>10} {:>12.2}  {}",
            t.symbol, t.side, t.quantity, t.price, t.timestamp
        );
    }

    Ok(())
}

async fn print_positions(ledger: &LedgerClient) -> anyhow::Result<()> {
    let positions = ledger.fetch_positions().await?;

    println!("{:<8} {:>14}", "Symbol", "Net Quantity");
    println!("{}", "─".repeat(23));
    for (symbol, quantity) in &positions {
        println!("{:<8} {:>14}", symbol, quantity);
    }

    Ok(())
}

async fn print_pnl(ledger: &LedgerClient) -> anyhow::Result<()> {
    let pnl = ledger.fetch_pnl().await?;

    println!(
        "{:<8} {:>8} {:>10} {:>10} {:>12} {:>12} {:>12}",
        "Symbol", "Qty", "Avg Cost", "Price", "Mkt Value", "Cost Basis", "Unrealized"
    );
    println!("{}", "─".repeat(80));
    for (symbol, row) in &pnl {
        println!(
            "{:<8} {:>8} {:>10.2} {:>10.2} {:>12.2} {:>12.2} {:>+12.2}",
            symbol,
            row.quantity,
            row.avg_cost,
            row.current_price,
            row.market_value,
            row.cost_basis,
            row.unrealized_pnl
        );
    }

    Ok(())
}

async fn print_realized(ledger: &LedgerClient) -> anyhow::Result<()> {
    let rows = ledger.fetch_realized_trades().await?;
    if rows.is_empty() {
        println!("No realized trades yet.");
        return Ok(());
    }

    println!(
        "{:<8} {:>10} {:>12} {:>12} {:>12}",
        "Symbol", "Qty Sold", "Avg Buy", "Sell", "Realized"
    );
    println!("{}", "─".repeat(58));
    for r in &rows {
        println!(
            "{:<8} {:>10} {:>12.2} {:>12.2} {:>+12.2}",
            r.symbol, r.quantity_sold, r.avg_buy_price, r.sell_price, r.realized_pnl
        );
    }

    let total: f64 = rows.iter().map(|r| r.realized_pnl).sum();
    println!("\nTotal realized: {:+.2}", total);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_order() {
        let order = parse_order("buy", "aapl", "10").unwrap();
        assert_eq!(order, Order::new("AAPL", Side::Buy, 10));

        assert!(parse_order("hold", "AAPL", "1").is_err());
        assert!(parse_order("sell", "AAPL", "-1").is_err());
    }

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "marketreplay",
            "run",
            "--symbols",
            "aapl,msft",
            "--tick-ms",
            "1000",
            "--alignment",
            "calendar",
            "--synthetic",
            "120",
        ])
        .unwrap();

        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.symbols.unwrap(), vec!["aapl", "msft"]);
        assert_eq!(args.tick_ms, Some(1000));
        assert_eq!(args.alignment, Some(TickAlignment::Calendar));
        assert_eq!(args.synthetic, Some(120));
        assert_eq!(args.seed, 42);
    }

    #[test]
    fn test_load_synthetic() {
        let engine = ReplayEngine::new(
            std::time::Duration::from_millis(1000),
            50,
            TickAlignment::Position,
            None,
            8,
        );
        let symbols = vec!["AAPL".to_string(), "MSFT".to_string()];
        load_synthetic(&engine, &symbols, 30, 7).unwrap();

        assert_eq!(engine.store().len("AAPL").unwrap(), 30);
        assert_eq!(engine.store().len("MSFT").unwrap(), 30);
        assert_eq!(engine.store().symbols(), symbols);
    }
}
