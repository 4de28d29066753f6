//! Writes finished sheets to disk as an `.xlsx` workbook or as a directory of `.csv` files.

use crate::model::{Cell, Sheet};
use crate::period::Period;
use crate::{utils, Result};
use anyhow::Context;
use chrono::Local;
use rust_xlsxwriter::Workbook;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Spreadsheet applications reject longer sheet names.
const MAX_SHEET_NAME: usize = 31;
const FORBIDDEN_SHEET_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// The file format a report is exported as.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Xlsx,
    Csv,
}

serde_plain::derive_display_from_serialize!(OutputFormat);
serde_plain::derive_fromstr_from_deserialize!(OutputFormat);

/// Receives finished sheets, one per data source, and persists them together.
#[async_trait::async_trait]
pub trait Sink: Send {
    /// Queues `sheet` for output. Sheet names are made unique and valid for the format.
    fn add_sheet(&mut self, sheet: &Sheet);

    fn sheet_count(&self) -> usize;

    /// Writes everything queued so far and returns the path written.
    async fn finish(&mut self) -> Result<PathBuf>;
}

/// Creates a sink for `format` writing to `dir`. The file (or directory, for csv) is named
/// `{title} {period} ({timestamp})`.
pub fn create(format: OutputFormat, dir: &Path, title: &str, period: &Period) -> Box<dyn Sink> {
    let stamp = Local::now().format("%Y-%m-%d_%H-%M");
    let stem = format!("{title} {period} ({stamp})");
    match format {
        OutputFormat::Xlsx => Box::new(XlsxSink::new(dir.join(format!("{stem}.xlsx")))),
        OutputFormat::Csv => Box::new(CsvSink::new(dir.join(stem))),
    }
}

/// Queued sheets with names already made unique.
#[derive(Debug, Default)]
struct Queue {
    sheets: Vec<(String, Sheet)>,
    taken: HashSet<String>,
}

impl Queue {
    fn push(&mut self, sheet: &Sheet) {
        let name = unique_sheet_name(sheet.name(), &mut self.taken);
        trace!("Queued sheet '{name}' with {} rows", sheet.rows().len());
        self.sheets.push((name, sheet.clone()));
    }
}

/// Cleans `name` for use as a sheet name and makes it distinct from the names in `taken`, e.g.
/// a second `Курск` becomes `Курск (2)`.
fn unique_sheet_name(name: &str, taken: &mut HashSet<String>) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if FORBIDDEN_SHEET_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let cleaned = match cleaned.trim() {
        "" => "Sheet".to_string(),
        s => s.to_string(),
    };

    let mut candidate = truncate(&cleaned, MAX_SHEET_NAME);
    let mut n = 2;
    while taken.contains(&candidate.to_lowercase()) {
        let suffix = format!(" ({n})");
        let keep = MAX_SHEET_NAME - suffix.chars().count();
        candidate = format!("{}{suffix}", truncate(&cleaned, keep));
        n += 1;
    }
    taken.insert(candidate.to_lowercase());
    candidate
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Writes all sheets into a single workbook. Formula cells stay formulas.
#[derive(Debug)]
pub struct XlsxSink {
    path: PathBuf,
    queue: Queue,
}

impl XlsxSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            queue: Queue::default(),
        }
    }
}

#[async_trait::async_trait]
impl Sink for XlsxSink {
    fn add_sheet(&mut self, sheet: &Sheet) {
        self.queue.push(sheet);
    }

    fn sheet_count(&self) -> usize {
        self.queue.sheets.len()
    }

    async fn finish(&mut self) -> Result<PathBuf> {
        let bytes = workbook_bytes(&self.queue.sheets)?;
        if let Some(parent) = self.path.parent() {
            utils::make_dir(parent).await?;
        }
        utils::write(&self.path, bytes).await?;
        debug!(
            "Wrote {} sheets to {}",
            self.queue.sheets.len(),
            self.path.display()
        );
        Ok(self.path.clone())
    }
}

fn workbook_bytes(sheets: &[(String, Sheet)]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    for (name, sheet) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(name)
            .with_context(|| format!("Unable to name a sheet '{name}'"))?;
        for (r, row) in sheet.rows().iter().enumerate() {
            let r = u32::try_from(r).context("Too many rows for a worksheet")?;
            for (c, cell) in row.iter().enumerate() {
                let c = u16::try_from(c).context("Too many columns for a worksheet")?;
                match cell {
                    Cell::Empty => {}
                    Cell::Text(s) => {
                        worksheet.write_string(r, c, s)?;
                    }
                    Cell::Number(amount) => {
                        worksheet.write_number(r, c, amount.to_f64())?;
                    }
                    Cell::Formula(f) => {
                        worksheet.write_formula(r, c, f.as_str())?;
                    }
                }
            }
        }
    }
    workbook
        .save_to_buffer()
        .context("Unable to serialize the workbook")
}

/// Writes one `.csv` per sheet into a directory. Formulas are written as their text.
#[derive(Debug)]
pub struct CsvSink {
    dir: PathBuf,
    queue: Queue,
}

impl CsvSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            queue: Queue::default(),
        }
    }
}

#[async_trait::async_trait]
impl Sink for CsvSink {
    fn add_sheet(&mut self, sheet: &Sheet) {
        self.queue.push(sheet);
    }

    fn sheet_count(&self) -> usize {
        self.queue.sheets.len()
    }

    async fn finish(&mut self) -> Result<PathBuf> {
        utils::make_dir(&self.dir).await?;
        for (name, sheet) in &self.queue.sheets {
            let path = self.dir.join(format!("{name}.csv"));
            utils::write(&path, csv_bytes(sheet)?).await?;
            trace!("Wrote {}", path.display());
        }
        Ok(self.dir.clone())
    }
}

fn csv_bytes(sheet: &Sheet) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    for row in sheet.rows() {
        if row.is_empty() {
            // Blank rows are kept as a single empty field
            writer.write_record([""])?;
            continue;
        }
        writer.write_record(row.iter().map(Cell::display))?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Unable to flush csv data: {e}"))
}
