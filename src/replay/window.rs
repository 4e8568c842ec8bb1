use crate::models::PricePoint;
use chrono::NaiveDate;
use serde::Serialize;
use std::ops::Deref;

/// Default number of points shown on a chart
pub const DEFAULT_WINDOW_SIZE: usize = 50;

/// Trailing slice of a series ending at or before a reference date
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Window {
    points: Vec<PricePoint>,
}

impl Window {
    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<PricePoint> {
        self.points
    }

    /// Date of the newest point in the window
    pub fn end_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }
}

impl Deref for Window {
    type Target = [PricePoint];

    fn deref(&self) -> &[PricePoint] {
        &self.points
    }
}

impl From<Vec<PricePoint>> for Window {
    fn from(points: Vec<PricePoint>) -> Self {
        Self { points }
    }
}

/// Align a series against a reference date
///
/// Returns at most `size` points ending at the last point whose date is on or
/// before `reference`. An absent reference, a reference before all data, or
/// `size == 0` yields an empty window.
pub fn align_window(series: &[PricePoint], reference: Option<NaiveDate>, size: usize) -> Window {
    let Some(reference) = reference else {
        return Window::default();
    };

    // Series dates are strictly increasing, so this is the count of points <= reference
    let end = series.partition_point(|p| p.date <= reference);
    let start = end.saturating_sub(size);

    Window::from(series[start..end].to_vec())
}
