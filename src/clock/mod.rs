// Synchronized replay clock
pub mod alignment;
pub mod sync_clock;

pub use alignment::TickAlignment;
pub use sync_clock::Clock;
