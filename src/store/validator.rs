use crate::error::ReplayError;
use crate::models::PricePoint;
use crate::Result;

/// Validates a price series before it is admitted into the store
pub struct SeriesValidator;

impl SeriesValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a whole series for a symbol
    pub fn validate(&self, symbol: &str, series: &[PricePoint]) -> Result<()> {
        if symbol.trim().is_empty() {
            return Err(ReplayError::invalid_series(symbol, "symbol is empty"));
        }
        if series.is_empty() {
            return Err(ReplayError::invalid_series(symbol, "series is empty"));
        }

        for (idx, point) in series.iter().enumerate() {
            self.validate_price(symbol, idx, point)?;
        }
        self.validate_ordering(symbol, series)?;

        Ok(())
    }

    /// Open prices must be finite and positive
    fn validate_price(&self, symbol: &str, idx: usize, point: &PricePoint) -> Result<()> {
        if !point.open.is_finite() || point.open <= 0.0 {
            return Err(ReplayError::invalid_series(
                symbol,
                format!("invalid open price {} on {} (index {})", point.open, point.date, idx),
            ));
        }
        Ok(())
    }

    /// Dates must be strictly increasing, which also rules out duplicates
    fn validate_ordering(&self, symbol: &str, series: &[PricePoint]) -> Result<()> {
        for (idx, pair) in series.windows(2).enumerate() {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.date == prev.date {
                return Err(ReplayError::invalid_series(
                    symbol,
                    format!("duplicate date {} at index {}", next.date, idx + 1),
                ));
            }
            if next.date < prev.date {
                return Err(ReplayError::invalid_series(
                    symbol,
                    format!(
                        "date {} at index {} is earlier than {}",
                        next.date,
                        idx + 1,
                        prev.date
                    ),
                ));
            }
        }
        Ok(())
    }
}

impl Default for SeriesValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn make_valid_series() -> Vec<PricePoint> {
        vec![
            PricePoint::new(day(2), 100.0),
            PricePoint::new(day(3), 102.0),
            PricePoint::new(day(4), 101.0),
        ]
    }

    #[test]
    fn test_validate_valid_series() {
        let validator = SeriesValidator::new();
        assert!(validator.validate("AAPL", &make_valid_series()).is_ok());
    }

    #[test]
    fn test_validate_empty_series() {
        let validator = SeriesValidator::new();

        let result = validator.validate("AAPL", &[]);
        assert!(result.unwrap_err().to_string().contains("series is empty"));
    }

    #[test]
    fn test_validate_out_of_order() {
        let validator = SeriesValidator::new();
        let mut series = make_valid_series();
        series.swap(1, 2);

        let err = validator.validate("AAPL", &series).unwrap_err();
        assert!(matches!(err, ReplayError::InvalidSeries { .. }));
        assert!(err.to_string().contains("earlier than"));
    }

    #[test]
    fn test_validate_duplicate_date() {
        let validator = SeriesValidator::new();
        let mut series = make_valid_series();
        series[2].date = day(3);

        let err = validator.validate("AAPL", &series).unwrap_err();
        assert!(err.to_string().contains("duplicate date"));
    }

    #[test]
    fn test_validate_non_positive_open() {
        let validator = SeriesValidator::new();
        let mut series = make_valid_series();
        series[1].open = 0.0;

        let err = validator.validate("AAPL", &series).unwrap_err();
        assert!(err.to_string().contains("invalid open price"));
    }

    #[test]
    fn test_validate_nan_open() {
        let validator = SeriesValidator::new();
        let mut series = make_valid_series();
        series[0].open = f64::NAN;

        assert!(validator.validate("AAPL", &series).is_err());
    }

    #[test]
    fn test_validate_single_point() {
        // Edge case: one point is a valid (if short) series
        let validator = SeriesValidator::new();
        let series = vec![PricePoint::new(day(2), 50.0)];

        assert!(validator.validate("NFLX", &series).is_ok());
    }
}
