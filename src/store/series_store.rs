use super::SeriesValidator;
use crate::error::ReplayError;
use crate::models::PricePoint;
use crate::Result;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

/// Shared, immutable view of one symbol's history
pub type Series = Arc<[PricePoint]>;

/// Thread-safe in-memory store of replay series
///
/// Each symbol maps to a validated series that is replaced wholesale on reload.
#[derive(Clone, Default)]
pub struct SeriesStore {
    data: Arc<RwLock<HashMap<String, Series>>>,
}

impl SeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load (or replace) the series for a symbol
    ///
    /// Validation happens before the write lock is taken, so a rejected
    /// series leaves the previous one in place.
    pub fn load(&self, symbol: &str, series: Vec<PricePoint>) -> Result<()> {
        SeriesValidator::new().validate(symbol, &series)?;

        let points = series.len();
        let first = series[0].date;
        let last = series[points - 1].date;

        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let replaced = data.insert(symbol.to_string(), series.into()).is_some();

        tracing::info!(
            symbol = %symbol,
            points,
            first = %first,
            last = %last,
            replaced,
            "Loaded price series"
        );

        Ok(())
    }

    /// Get the series for a symbol
    pub fn get(&self, symbol: &str) -> Result<Series> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        data.get(symbol)
            .cloned()
            .ok_or_else(|| ReplayError::NotFound(symbol.to_string()))
    }

    /// Point at a given position, if the series reaches that far
    pub fn point_at(&self, symbol: &str, position: usize) -> Option<PricePoint> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        data.get(symbol).and_then(|s| s.get(position).copied())
    }

    /// Latest open price on or before `date`
    pub fn price_on_or_before(&self, symbol: &str, date: NaiveDate) -> Result<Option<PricePoint>> {
        let series = self.get(symbol)?;
        let end = series.partition_point(|p| p.date <= date);
        Ok(end.checked_sub(1).map(|idx| series[idx]))
    }

    /// All loaded symbols, sorted
    pub fn symbols(&self) -> Vec<String> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        let mut symbols: Vec<String> = data.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Every loaded series, sorted by symbol
    pub fn entries(&self) -> Vec<(String, Series)> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<(String, Series)> = data
            .iter()
            .map(|(symbol, series)| (symbol.clone(), series.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Number of points for a symbol
    pub fn len(&self, symbol: &str) -> Result<usize> {
        Ok(self.get(symbol)?.len())
    }

    /// Length of the longest loaded series (0 when empty)
    pub fn longest_len(&self) -> usize {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        data.values().map(|s| s.len()).max().unwrap_or(0)
    }

    /// Sorted union of every loaded date
    pub fn calendar(&self) -> Vec<NaiveDate> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        let dates: BTreeSet<NaiveDate> = data
            .values()
            .flat_map(|s| s.iter().map(|p| p.date))
            .collect();
        dates.into_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        data.is_empty()
    }

    /// Drop the series for a symbol
    pub fn remove(&self, symbol: &str) -> bool {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.remove(symbol).is_some()
    }
}
