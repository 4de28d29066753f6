//! The three report shapes built from fetched payloads.
mod ledger;
mod pivot;
pub mod writeoff;

pub use ledger::{CalendarPolicy, Ledger};
pub use pivot::PivotMatrix;
