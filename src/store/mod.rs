// In-memory series storage and load-time validation
pub mod series_store;
pub mod validator;

pub use series_store::{Series, SeriesStore};
pub use validator::SeriesValidator;
