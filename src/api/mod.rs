pub mod ledger;

pub use ledger::{LedgerClient, DEFAULT_LEDGER_URL};
