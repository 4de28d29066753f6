//! Copies of raw API responses kept on disk for troubleshooting.

use crate::{utils, Config, Result};
use anyhow::Context;
use chrono::Local;
use serde_json::Value;
use std::path::PathBuf;

/// Prefix for OLAP ledger payloads.
pub const LEDGER: &str = "ledger";

/// Prefix for OLAP revenue payloads.
pub const PIVOT: &str = "pivot";

/// Prefix for write-off document payloads.
pub const WRITEOFF: &str = "writeoff";

const EXTENSION: &str = "json";

/// Saves raw payloads under `$IIKO_REPORT_HOME/.responses` and rotates old copies.
///
/// Create one via `Config::archive()` or `ResponseArchive::new()`.
#[derive(Debug, Clone)]
pub struct ResponseArchive {
    dir: PathBuf,
    copies: u32,
}

impl ResponseArchive {
    pub fn new(config: &Config) -> Self {
        Self {
            dir: config.responses().to_path_buf(),
            copies: config.response_copies(),
        }
    }

    /// Saves `payload` as pretty-printed JSON named `{base}-{report}.YYYY-MM-DD-NNN.json`, where
    /// NNN is a per-day sequence number, then deletes the oldest files beyond the configured
    /// number of copies for that prefix.
    ///
    /// Returns the path to the created file.
    pub async fn save_json(&self, base: &str, report: &str, payload: &Value) -> Result<PathBuf> {
        let prefix = format!("{base}-{report}");
        let date = today();
        let seq = self.next_sequence_number(&prefix, &date).await?;
        let path = self
            .dir
            .join(format!("{prefix}.{date}-{seq:03}.{EXTENSION}"));

        let json = serde_json::to_string_pretty(payload)
            .context("Failed to serialize the response to JSON")?;
        utils::write(&path, json).await?;

        self.rotate(&prefix).await?;
        Ok(path)
    }

    async fn next_sequence_number(&self, prefix: &str, date: &str) -> Result<u32> {
        let mut max_seq: u32 = 0;
        let mut dir = utils::read_dir(&self.dir).await?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .context("Failed to read directory entry")?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(seq) = parse_sequence_number(&name, prefix, date) {
                max_seq = max_seq.max(seq);
            }
        }
        Ok(max_seq + 1)
    }

    async fn rotate(&self, prefix: &str) -> Result<()> {
        let mut files: Vec<(PathBuf, String)> = Vec::new();
        let mut dir = utils::read_dir(&self.dir).await?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .context("Failed to read directory entry")?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if is_archive_file(&name, prefix) {
                files.push((entry.path(), name));
            }
        }

        // Names sort by date, then sequence number
        files.sort_by(|a, b| a.1.cmp(&b.1));

        let to_delete = files.len().saturating_sub(self.copies as usize);
        for (path, _) in files.into_iter().take(to_delete) {
            utils::remove(&path).await?;
        }
        Ok(())
    }
}

fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Returns the NNN of `{prefix}.{date}-NNN.json`, or `None` for any other name.
fn parse_sequence_number(filename: &str, prefix: &str, date: &str) -> Option<u32> {
    filename
        .strip_prefix(&format!("{prefix}.{date}-"))?
        .strip_suffix(&format!(".{EXTENSION}"))?
        .parse()
        .ok()
}

fn is_archive_file(filename: &str, prefix: &str) -> bool {
    filename
        .strip_prefix(&format!("{prefix}."))
        .and_then(|rest| rest.strip_suffix(&format!(".{EXTENSION}")))
        // `{date}-NNN`, which keeps `kursk-ledger` from matching `kursk-ledger-2`
        .is_some_and(|stamp| {
            stamp.len() == 14 && stamp.chars().all(|c| c.is_ascii_digit() || c == '-')
        })
}
