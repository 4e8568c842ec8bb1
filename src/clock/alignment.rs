use crate::store::SeriesStore;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a tick index is mapped onto each symbol's series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickAlignment {
    /// Tick N reads the point at position N of every series. Position 0 is
    /// the pre-roll point and is never broadcast.
    #[default]
    Position,
    /// Tick N advances to the Nth date of the union calendar (1-based) and
    /// every symbol reports its latest open on or before that date.
    Calendar,
}

impl std::str::FromStr for TickAlignment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "position" => Ok(TickAlignment::Position),
            "calendar" => Ok(TickAlignment::Calendar),
            other => Err(format!("unknown alignment: {}", other)),
        }
    }
}

/// Prices and simulated date produced by one tick
#[derive(Debug, Default)]
pub(crate) struct TickPrices {
    pub prices: BTreeMap<String, f64>,
    pub date: Option<NaiveDate>,
}

/// Position lookup: symbols are visited in sorted order and the date of the
/// last point used becomes the simulated date.
pub(crate) fn position_prices(store: &SeriesStore, tick_index: u64) -> TickPrices {
    let mut out = TickPrices::default();
    let Ok(position) = usize::try_from(tick_index) else {
        return out;
    };

    for (symbol, series) in store.entries() {
        match series.get(position) {
            Some(point) if point.open.is_finite() => {
                out.prices.insert(symbol, point.open);
                out.date = Some(point.date);
            }
            _ => {}
        }
    }

    out
}

/// Calendar lookup against the sorted union of loaded dates
pub(crate) fn calendar_prices(
    store: &SeriesStore,
    tick_index: u64,
    start_date: Option<NaiveDate>,
) -> TickPrices {
    let mut out = TickPrices::default();
    let calendar = calendar_from(store, start_date);

    let Some(date) = usize::try_from(tick_index)
        .ok()
        .and_then(|t| t.checked_sub(1))
        .and_then(|idx| calendar.get(idx).copied())
    else {
        return out;
    };

    for (symbol, series) in store.entries() {
        let end = series.partition_point(|p| p.date <= date);
        if let Some(point) = end.checked_sub(1).map(|idx| series[idx]) {
            out.prices.insert(symbol, point.open);
        }
    }
    out.date = Some(date);

    out
}

/// Union calendar, trimmed to dates on or after `start_date`
pub(crate) fn calendar_from(store: &SeriesStore, start_date: Option<NaiveDate>) -> Vec<NaiveDate> {
    let calendar = store.calendar();
    match start_date {
        Some(start) => calendar.into_iter().filter(|d| *d >= start).collect(),
        None => calendar,
    }
}
