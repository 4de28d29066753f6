//! The shared row/cell model handed to a `Sink`.

use crate::model::Amount;
use anyhow::{bail, Context};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A single spreadsheet cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(Amount),
    /// A formula including its leading `=`, e.g. `=SUM(D6:D9)`.
    Formula(String),
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    /// Copies a measure verbatim from an untyped record: numbers (and numeric strings) become
    /// `Number`, other strings stay as `Text`, and anything missing or structured becomes zero.
    pub fn measure(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(s)) if s.trim().is_empty() => Cell::Number(Amount::ZERO),
            Some(Value::String(s)) => match Amount::from_str(s) {
                Ok(amount) => Cell::Number(amount),
                Err(_) => Cell::Text(s.clone()),
            },
            Some(v) => Cell::Number(Amount::coerce(v)),
            None => Cell::Number(Amount::ZERO),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// The text a plain-text sink should write for this cell.
    pub fn display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(amount) => amount.value().normalize().to_string(),
            Cell::Formula(f) => f.clone(),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::text(value)
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<Amount> for Cell {
    fn from(value: Amount) -> Self {
        Cell::Number(value)
    }
}

impl From<u32> for Cell {
    fn from(value: u32) -> Self {
        Cell::Number(Amount::from(rust_decimal::Decimal::from(value)))
    }
}

/// One row of cells.
pub type Row = Vec<Cell>;

/// A named grid of rows, one per sheet of an exported workbook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Sheet {
    name: String,
    rows: Vec<Row>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub fn push_blank(&mut self) {
        self.rows.push(Vec::new());
    }

    /// The 1-based spreadsheet row number the next pushed row will land on.
    pub fn next_row_number(&self) -> u32 {
        self.rows.len() as u32 + 1
    }

    pub fn get(&self, at: CellRef) -> Option<&Cell> {
        self.rows.get(at.row()).and_then(|r| r.get(at.col()))
    }
}

/// A zero-based (row, column) coordinate that displays and parses as A1 notation, so
/// `CellRef::new(5, 3)` is `D6`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CellRef(usize, usize);

impl CellRef {
    pub fn new(row: usize, col: usize) -> Self {
        Self(row, col)
    }

    pub fn row(&self) -> usize {
        self.0
    }

    pub fn col(&self) -> usize {
        self.1
    }
}

/// Converts a zero-based column index into spreadsheet letters: 0 -> A, 25 -> Z, 26 -> AA.
pub fn column_letters(col: usize) -> String {
    let mut n = col + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.1), self.0 + 1)
    }
}

impl FromStr for CellRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .with_context(|| format!("Cell reference has no row number: {s}"))?;
        let (letters, digits) = s.split_at(split);
        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
            bail!("Cell reference must start with column letters, got: {s}");
        }

        let mut col = 0usize;
        for c in letters.chars() {
            col = col * 26 + (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        }

        let row = digits
            .parse::<usize>()
            .map_err(|e| anyhow::anyhow!("Invalid row number in {s}: {e}"))?;
        if row == 0 {
            bail!("Row numbers start at 1, got: {s}");
        }

        Ok(CellRef(row - 1, col - 1))
    }
}

impl Serialize for CellRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CellRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        CellRef::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(3), "D");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(27), "AB");
        assert_eq!(column_letters(701), "ZZ");
        assert_eq!(column_letters(702), "AAA");
    }

    #[test]
    fn test_cell_ref_display() {
        assert_eq!(CellRef::new(0, 0).to_string(), "A1");
        assert_eq!(CellRef::new(5, 3).to_string(), "D6");
        assert_eq!(CellRef::new(41, 27).to_string(), "AB42");
    }

    #[test]
    fn test_cell_ref_from_str() {
        assert_eq!("D6".parse::<CellRef>().unwrap(), CellRef::new(5, 3));
        assert_eq!("ab42".parse::<CellRef>().unwrap(), CellRef::new(41, 27));
        assert_eq!(" A1 ".parse::<CellRef>().unwrap(), CellRef::new(0, 0));
    }

    #[test]
    fn test_cell_ref_from_str_invalid() {
        assert!("6".parse::<CellRef>().is_err());
        assert!("D".parse::<CellRef>().is_err());
        assert!("D0".parse::<CellRef>().is_err());
        assert!("D-1".parse::<CellRef>().is_err());
        assert!("Д6".parse::<CellRef>().is_err());
    }

    #[test]
    fn test_cell_ref_serde() {
        let json = serde_json::to_string(&CellRef::new(5, 3)).unwrap();
        assert_eq!(json, r#""D6""#);
        let back: CellRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CellRef::new(5, 3));
    }

    #[test]
    fn test_measure_copies_numbers() {
        assert_eq!(Cell::measure(Some(&json!(150))), Cell::from(150u32));
        assert_eq!(Cell::measure(Some(&json!("7"))), Cell::from(7u32));
    }

    #[test]
    fn test_measure_keeps_text_verbatim() {
        assert_eq!(Cell::measure(Some(&json!("n/a"))), Cell::text("n/a"));
    }

    #[test]
    fn test_measure_missing_is_zero() {
        assert_eq!(Cell::measure(None), Cell::Number(Amount::ZERO));
        assert_eq!(Cell::measure(Some(&json!(null))), Cell::Number(Amount::ZERO));
        assert_eq!(Cell::measure(Some(&json!(""))), Cell::Number(Amount::ZERO));
    }

    #[test]
    fn test_display() {
        assert_eq!(Cell::Empty.display(), "");
        assert_eq!(Cell::from(12u32).display(), "12");
        assert_eq!(
            Cell::Formula("=SUM(D6:D7)".to_string()).display(),
            "=SUM(D6:D7)"
        );
    }

    #[test]
    fn test_sheet_next_row_number() {
        let mut sheet = Sheet::new("x");
        assert_eq!(sheet.next_row_number(), 1);
        sheet.push(vec![Cell::text("a")]);
        sheet.push_blank();
        assert_eq!(sheet.next_row_number(), 3);
        assert_eq!(
            sheet.get("A1".parse().unwrap()),
            Some(&Cell::text("a"))
        );
        assert_eq!(sheet.get("A2".parse().unwrap()), None);
    }
}
