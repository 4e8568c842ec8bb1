use crate::error::ReplayError;
use crate::models::{
    DatedOrder, Positions, PricePoint, RealizedTrade, Side, TradeRecord, UnrealizedPnl,
};
use crate::Result;
use chrono::NaiveDate;
use governor::{Quota, RateLimiter};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

pub const DEFAULT_LEDGER_URL: &str = "http://127.0.0.1:5000";
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;
const REQUEST_TIMEOUT_SECS: u64 = 10;

type LedgerRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Error body returned by the ledger on rejected requests
#[derive(Debug, Deserialize)]
struct LedgerErrorBody {
    error: String,
}

/// HTTP client for the trade ledger backend
///
/// The ledger owns trades, positions and PnL; this client only moves data in
/// and out. Reads are retried on transient failures, writes never are.
#[derive(Clone)]
pub struct LedgerClient {
    client: Client,
    base_url: String,
    rate_limiter: Arc<LedgerRateLimiter>,
    initial_backoff: Duration,
}

impl LedgerClient {
    /// Create a client for `base_url`, allowing `requests_per_second` requests
    pub fn new(base_url: &str, requests_per_second: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(rps)));

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limiter,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Override the first retry delay (doubles on each attempt)
    pub fn with_retry_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full history for a symbol, oldest first
    pub async fn fetch_prices(&self, symbol: &str) -> Result<Vec<PricePoint>> {
        let points: Vec<PricePoint> = self.get_json(&format!("/prices/{}", symbol)).await?;
        tracing::info!(symbol = %symbol, points = points.len(), "Fetched price history");
        Ok(points)
    }

    pub async fn fetch_trades(&self) -> Result<Vec<TradeRecord>> {
        self.get_json("/trades").await
    }

    pub async fn fetch_positions(&self) -> Result<Positions> {
        self.get_json("/positions").await
    }

    pub async fn fetch_pnl(&self) -> Result<BTreeMap<String, UnrealizedPnl>> {
        self.get_json("/pnl").await
    }

    pub async fn fetch_realized_trades(&self) -> Result<Vec<RealizedTrade>> {
        self.get_json("/realized-trades").await
    }

    /// Date of the newest BUY trade, if any
    pub async fn latest_buy_date(&self) -> Result<Option<NaiveDate>> {
        let trades = self.fetch_trades().await?;
        Ok(trades
            .iter()
            .filter(|t| t.side == Side::Buy)
            .filter_map(|t| parse_ledger_date(&t.timestamp))
            .max())
    }

    /// Submit a dated order; returns the ledger's JSON response
    pub async fn submit_trade(&self, order: &DatedOrder) -> Result<serde_json::Value> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/trades", self.base_url);
        let response = self.client.post(&url).json(order).send().await?;
        let response = check_status(response).await?;

        tracing::info!(
            symbol = %order.symbol,
            side = %order.side,
            quantity = order.quantity,
            date = %order.date,
            "Trade submitted to ledger"
        );

        Ok(response.json().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.get_with_retry(path).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// GET with exponential backoff on connect errors and 5xx responses
    async fn get_with_retry(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 1;

        loop {
            self.rate_limiter.until_ready().await;

            let outcome = self.client.get(&url).send().await;
            let retryable = match &outcome {
                Ok(response) => response.status().is_server_error(),
                Err(e) => e.is_connect() || e.is_timeout(),
            };

            if !retryable || attempt >= MAX_RETRIES {
                return check_status(outcome?).await;
            }

            let backoff = self.initial_backoff * 2_u32.pow(attempt - 1);
            match &outcome {
                Ok(response) => tracing::warn!(
                    "Ledger returned {} for {} (attempt {}/{}), retrying in {:?}",
                    response.status(),
                    path,
                    attempt,
                    MAX_RETRIES,
                    backoff
                ),
                Err(e) => tracing::warn!(
                    "Ledger request {} failed (attempt {}/{}): {}. Retrying in {:?}",
                    path,
                    attempt,
                    MAX_RETRIES,
                    e,
                    backoff
                ),
            }

            sleep(backoff).await;
            attempt += 1;
        }
    }
}

/// Map non-2xx responses to `ReplayError::Ledger`, preferring the ledger's own message
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<LedgerErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or_else(|_| {
            if text.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                text
            }
        });

    Err(ReplayError::Ledger {
        status: status.as_u16(),
        message,
    })
}

/// Ledger timestamps come either ISO-formatted or as HTTP dates
fn parse_ledger_date(timestamp: &str) -> Option<NaiveDate> {
    if let Some(prefix) = timestamp.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(date);
        }
    }
    chrono::DateTime::parse_from_rfc2822(timestamp)
        .ok()
        .map(|dt| dt.date_naive())
}
