use crate::models::PricePoint;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::str::FromStr;

/// Shape of a generated daily series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesScenario {
    /// Upward drift (+0.3% per session) with light noise
    Uptrend,
    /// Downward drift (-0.3% per session) with light noise
    Downtrend,
    /// Mean-reverting around the base price
    Sideways,
    /// ±4% daily swings
    Volatile,
}

impl FromStr for SeriesScenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "uptrend" | "up" => Ok(SeriesScenario::Uptrend),
            "downtrend" | "down" => Ok(SeriesScenario::Downtrend),
            "sideways" => Ok(SeriesScenario::Sideways),
            "volatile" => Ok(SeriesScenario::Volatile),
            other => Err(format!("unknown scenario: {}", other)),
        }
    }
}

/// Seeded generator of weekday-only daily open prices
///
/// Used to replay without a ledger; the same seed always yields the same series.
pub struct SyntheticSeriesGenerator {
    rng: StdRng,
    base_price: f64,
}

impl SyntheticSeriesGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 150.0,
        }
    }

    pub fn with_base_price(mut self, base_price: f64) -> Self {
        self.base_price = base_price;
        self
    }

    /// Generate `num_points` sessions starting on the first weekday at or after `start`
    pub fn generate(
        &mut self,
        scenario: SeriesScenario,
        start: NaiveDate,
        num_points: usize,
    ) -> Vec<PricePoint> {
        let mut points = Vec::with_capacity(num_points);
        let mut price = self.base_price;
        let mut date = next_weekday(start);

        for _ in 0..num_points {
            price = self.step(scenario, price);
            points.push(PricePoint::new(date, round_cents(price)));
            date = next_weekday(date + Days::new(1));
        }

        points
    }

    fn step(&mut self, scenario: SeriesScenario, price: f64) -> f64 {
        let next = match scenario {
            SeriesScenario::Uptrend => price * (1.003 + self.rng.gen_range(-0.004..0.004)),
            SeriesScenario::Downtrend => price * (0.997 + self.rng.gen_range(-0.004..0.004)),
            SeriesScenario::Sideways => {
                let reversion = (self.base_price - price) * 0.1;
                price + reversion + price * self.rng.gen_range(-0.01..0.01)
            }
            SeriesScenario::Volatile => price * (1.0 + self.rng.gen_range(-0.04..0.04)),
        };

        // Keep prices strictly positive
        next.max(self.base_price * 0.05)
    }
}

fn next_weekday(mut date: NaiveDate) -> NaiveDate {
    while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        date = date + Days::new(1);
    }
    date
}

fn round_cents(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}
