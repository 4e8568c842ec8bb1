// Indicators computed over replay windows
pub mod trend;

pub use trend::classify;
