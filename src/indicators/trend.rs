use crate::error::ReplayError;
use crate::models::{PricePoint, Trend};
use crate::Result;

/// Classify the direction of the last move in a window
///
/// Compares the open of the second-to-last point with the last one. Windows
/// with fewer than two points have no trend yet.
pub fn classify(window: &[PricePoint]) -> Result<Trend> {
    let [.., prev, curr] = window else {
        return Err(ReplayError::InsufficientData {
            needed: 2,
            available: window.len(),
        });
    };

    let trend = if curr.open > prev.open {
        Trend::Up
    } else if curr.open < prev.open {
        Trend::Down
    } else {
        Trend::Flat
    };

    Ok(trend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn points(prices: &[f64]) -> Vec<PricePoint> {
        prices
            .iter()
            .enumerate()
            .map(|(i, p)| {
                PricePoint::new(NaiveDate::from_ymd_opt(2024, 5, i as u32 + 1).unwrap(), *p)
            })
            .collect()
    }

    #[test]
    fn test_classify_up_down_flat() {
        assert_eq!(classify(&points(&[100.0, 102.0])).unwrap(), Trend::Up);
        assert_eq!(classify(&points(&[102.0, 101.0])).unwrap(), Trend::Down);
        assert_eq!(classify(&points(&[101.0, 101.0])).unwrap(), Trend::Flat);
    }

    #[test]
    fn test_classify_only_looks_at_last_two() {
        let window = points(&[50.0, 200.0, 100.0, 100.5]);
        assert_eq!(classify(&window).unwrap(), Trend::Up);
    }

    #[test]
    fn test_swapping_last_two_reverses_trend() {
        let mut window = points(&[10.0, 11.0, 12.5]);
        assert_eq!(classify(&window).unwrap(), Trend::Up);

        let n = window.len();
        let (a, b) = (window[n - 2].open, window[n - 1].open);
        window[n - 2].open = b;
        window[n - 1].open = a;
        assert_eq!(classify(&window).unwrap(), Trend::Down);
    }

    #[test]
    fn test_classify_insufficient_data() {
        let err = classify(&points(&[100.0])).unwrap_err();
        assert!(matches!(
            err,
            ReplayError::InsufficientData {
                needed: 2,
                available: 1
            }
        ));
        assert!(err.is_not_ready());
        assert!(classify(&[]).is_err());
    }
}
