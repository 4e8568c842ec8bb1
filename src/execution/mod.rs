// Order preparation for the ledger
pub mod trade_binder;

pub use trade_binder::TradeTimeBinder;
