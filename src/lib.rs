//! Builds restaurant report spreadsheets from iiko OLAP and write-off data.
//!
//! The pipeline for every report is the same: fetch a payload from each selected iiko server,
//! flatten it into records, aggregate it into a sheet, and hand the sheets to a sink that writes
//! an `.xlsx` workbook or a directory of `.csv` files.

mod api;
mod archive;
pub mod args;
pub mod commands;
mod config;
mod error;
pub mod model;
mod normalize;
mod period;
mod report;
mod resolver;
mod sink;
mod utils;


pub use api::Mode;
pub use config::Config;
pub use error::Error;
pub use error::Result;
