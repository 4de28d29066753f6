//! Types that represent the core data model, such as `AnalyticRecord` and `Cell`.
mod amount;
mod cell;
mod record;
mod writeoff;

pub use amount::{Amount, AmountError};
pub use cell::{column_letters, Cell, CellRef, Row, Sheet};
pub use record::{AnalyticRecord, DayLabel, RecordFields};
pub use writeoff::{WriteoffDocument, WriteoffItem, WriteoffStatus};
