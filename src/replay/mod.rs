// Replay surface: window alignment, engine facade and synthetic data
pub mod engine;
pub mod synthetic;
pub mod window;

pub use engine::ReplayEngine;
pub use synthetic::{SeriesScenario, SyntheticSeriesGenerator};
pub use window::{align_window, Window, DEFAULT_WINDOW_SIZE};
