// Core modules
pub mod api;
pub mod broadcast;
pub mod clock;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod replay;
pub mod settings;
pub mod store;

// Re-export commonly used types
pub use broadcast::{Broadcaster, SnapshotObserver, SubscriptionId};
pub use clock::{Clock, TickAlignment};
pub use error::ReplayError;
pub use models::*;
pub use replay::{ReplayEngine, Window};
pub use store::SeriesStore;

// Error handling
pub type Result<T> = std::result::Result<T, ReplayError>;
