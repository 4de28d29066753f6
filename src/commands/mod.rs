//! Command handlers for the iiko-report CLI.
//!
//! This module contains implementations for all CLI subcommands.

mod bases;
mod init;
mod ledger;
mod pivot;
mod report;
mod writeoff;

use serde::Serialize;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub use bases::bases;
pub use init::init;
pub use ledger::ledger;
pub use pivot::pivot;
pub use writeoff::writeoff;

/// The output type for a command. This allows the command to return a consistent message and,
/// optionally, structured data.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    /// Get the `message`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the structured data stored in `structure`.
    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the message to `info!` and the structured data (if it exists) as JSON to `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}

/// What a report command produced.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    report: String,
    period: String,
    output: PathBuf,
    /// Ids of the bases that made it into the output, in sheet order.
    sources: Vec<String>,
    failures: Vec<SourceFailure>,
}

impl ReportSummary {
    pub fn report(&self) -> &str {
        &self.report
    }

    pub fn period(&self) -> &str {
        &self.period
    }

    /// The written workbook, or the directory of csv files.
    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn failures(&self) -> &[SourceFailure] {
        &self.failures
    }
}

/// A base that was selected but contributed nothing, and why.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SourceFailure {
    base: String,
    reason: String,
}

impl SourceFailure {
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}
