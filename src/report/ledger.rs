//! The hierarchical ledger ("Планы"): day rows grouped by restaurant group and week, with a
//! subtotal row closing every week and every group.
//!
//! Subtotals are not computed here. They are `SUM` formulas over the exact rows they close.

use crate::model::{column_letters, AnalyticRecord, Cell, CellRef, DayLabel, Row, Sheet};
use crate::period::{self, Period, DATE_FORMAT};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::trace;

const TITLE: &str = "Планы";
const HEADERS: [&str; 7] = [
    "Группа",
    "Неделя",
    "День недели",
    "Итого",
    "Гости",
    "Блюда",
    "Чеки",
];
/// Columns D through G hold the four measures.
const FIRST_MEASURE_COL: usize = 3;
const MEASURE_COUNT: usize = 4;

/// How a data source fills in `week` and `day` when its records lack them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarPolicy {
    /// Missing weeks become week 1 and missing days become Monday.
    #[default]
    FirstWeekMonday,
    /// Missing weeks and days are derived from the record's open date: the week is the 7-day
    /// block of the month and the day is the weekday. Records without a usable date fall back
    /// to week 1, Monday.
    DeriveFromOpenDate,
}

serde_plain::derive_display_from_serialize!(CalendarPolicy);
serde_plain::derive_fromstr_from_deserialize!(CalendarPolicy);

impl CalendarPolicy {
    pub fn apply(self, record: &mut AnalyticRecord) {
        let date = match self {
            CalendarPolicy::FirstWeekMonday => None,
            CalendarPolicy::DeriveFromOpenDate => record.open_date().map(|d| d.date()),
        };
        if record.week().is_none() {
            record.set_week(date.map(period::week_of_month).unwrap_or(1));
        }
        if record.day().is_none() {
            let day = date
                .map(|d| DayLabel::from_weekday_number(d.weekday().number_from_monday()))
                .unwrap_or_else(DayLabel::monday);
            record.set_day(day);
        }
    }
}

/// One row of the ledger body, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum LedgerRow {
    /// Marks the start of a group; carries the group name only.
    GroupHeader { group: String },
    Data {
        group: String,
        week: u32,
        day: DayLabel,
        measures: [Cell; MEASURE_COUNT],
    },
    /// Closes a week. `rows` is the half-open range of body offsets it sums.
    WeekSubtotal { week: u32, rows: Range<usize> },
    /// Closes a group. `leaves` are the body offsets of the group's data rows.
    GroupSubtotal { group: String, leaves: Vec<usize> },
}

/// The ordered ledger body for one data source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Ledger {
    rows: Vec<LedgerRow>,
}

impl Ledger {
    /// Fills in missing calendar fields with `policy`, sorts by (group, week, day number), and
    /// walks the records emitting headers, data rows and subtotals.
    pub fn build(mut records: Vec<AnalyticRecord>, policy: CalendarPolicy) -> Self {
        for record in records.iter_mut() {
            policy.apply(record);
        }
        records.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));

        let mut builder = LedgerBuilder::default();
        for record in records {
            builder.push(record);
        }
        builder.finish()
    }

    #[cfg(test)]
    pub fn rows(&self) -> &[LedgerRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn data_row_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| matches!(r, LedgerRow::Data { .. }))
            .count()
    }

    /// Lays the ledger out as a sheet: title block, column headers, then the body with
    /// subtotals rendered as formulas.
    pub fn to_sheet(&self, base_name: &str, period: &Period) -> Sheet {
        let mut sheet = Sheet::new(base_name);
        sheet.push(vec![Cell::text(TITLE)]);
        sheet.push(vec![Cell::text(format!("Название ресторана: {base_name}"))]);
        sheet.push(vec![Cell::text(format!(
            "Период: с {} по {}",
            period.from().format(DATE_FORMAT),
            period.to().format(DATE_FORMAT)
        ))]);
        sheet.push_blank();
        sheet.push(HEADERS.iter().map(|h| Cell::text(*h)).collect());

        let body_start = sheet.rows().len();
        for row in &self.rows {
            sheet.push(render_row(row, body_start));
        }
        sheet
    }
}

fn sort_key(record: &AnalyticRecord) -> (&str, u32, u32) {
    (
        record.group(),
        record.week().unwrap_or(1),
        record.day().map(DayLabel::number).unwrap_or(1),
    )
}

/// Where the single linear pass over sorted records currently stands.
#[derive(Debug, Default)]
enum Cursor {
    #[default]
    AwaitingGroup,
    InGroup {
        group: String,
        leaves: Vec<usize>,
    },
    InWeek {
        group: String,
        leaves: Vec<usize>,
        week: u32,
        week_start: usize,
    },
}

#[derive(Debug, Default)]
struct LedgerBuilder {
    rows: Vec<LedgerRow>,
    cursor: Cursor,
}

impl LedgerBuilder {
    fn push(&mut self, record: AnalyticRecord) {
        let week = record.week().unwrap_or(1);
        let day = record.day().cloned().unwrap_or_else(DayLabel::monday);
        trace!("Ledger record: group={}, week={week}, day={day}", record.group());

        self.enter(record.group(), week);
        let offset = self.rows.len();
        if let Cursor::InWeek { leaves, .. } = &mut self.cursor {
            leaves.push(offset);
        }
        self.rows.push(LedgerRow::Data {
            group: record.group().to_string(),
            week,
            day,
            measures: record.measures(),
        });
    }

    /// Steps the cursor until it is inside `week` of `group`, closing whatever it leaves.
    fn enter(&mut self, group: &str, week: u32) {
        loop {
            self.cursor = match std::mem::take(&mut self.cursor) {
                Cursor::AwaitingGroup => {
                    self.rows.push(LedgerRow::GroupHeader {
                        group: group.to_string(),
                    });
                    Cursor::InGroup {
                        group: group.to_string(),
                        leaves: Vec::new(),
                    }
                }
                Cursor::InGroup {
                    group: current,
                    leaves,
                } if current == group => Cursor::InWeek {
                    group: current,
                    leaves,
                    week,
                    week_start: self.rows.len(),
                },
                Cursor::InGroup {
                    group: current,
                    leaves,
                } => {
                    self.close_group(current, leaves);
                    Cursor::AwaitingGroup
                }
                cursor @ Cursor::InWeek { .. } if cursor.is_at(group, week) => {
                    self.cursor = cursor;
                    return;
                }
                Cursor::InWeek {
                    group: current,
                    leaves,
                    week: current_week,
                    week_start,
                } => {
                    self.close_week(current_week, week_start);
                    Cursor::InGroup {
                        group: current,
                        leaves,
                    }
                }
            };
        }
    }

    fn close_week(&mut self, week: u32, week_start: usize) {
        self.rows.push(LedgerRow::WeekSubtotal {
            week,
            rows: week_start..self.rows.len(),
        });
    }

    fn close_group(&mut self, group: String, leaves: Vec<usize>) {
        self.rows.push(LedgerRow::GroupSubtotal { group, leaves });
    }

    /// Closes the open week and group at end of input.
    fn finish(mut self) -> Ledger {
        loop {
            match std::mem::take(&mut self.cursor) {
                Cursor::AwaitingGroup => break,
                Cursor::InGroup { group, leaves } => self.close_group(group, leaves),
                Cursor::InWeek {
                    group,
                    leaves,
                    week,
                    week_start,
                } => {
                    self.close_week(week, week_start);
                    self.cursor = Cursor::InGroup { group, leaves };
                }
            }
        }
        Ledger { rows: self.rows }
    }
}

impl Cursor {
    fn is_at(&self, group: &str, week: u32) -> bool {
        matches!(self, Cursor::InWeek { group: g, week: w, .. } if g == group && *w == week)
    }
}

fn render_row(row: &LedgerRow, body_start: usize) -> Row {
    match row {
        LedgerRow::GroupHeader { group } => vec![Cell::text(group)],
        LedgerRow::Data {
            week,
            day,
            measures,
            ..
        } => {
            let mut cells = vec![Cell::Empty, Cell::from(*week), Cell::text(day.to_string())];
            cells.extend(measures.iter().cloned());
            cells
        }
        LedgerRow::WeekSubtotal { week, rows } => {
            let mut cells = vec![Cell::Empty, Cell::text(format!("{week} всего")), Cell::Empty];
            cells.extend(measure_columns().map(|col| {
                if rows.is_empty() {
                    return Cell::Formula("=0".to_string());
                }
                let first = CellRef::new(body_start + rows.start, col);
                let last = CellRef::new(body_start + rows.end - 1, col);
                Cell::Formula(format!("=SUM({first}:{last})"))
            }));
            cells
        }
        LedgerRow::GroupSubtotal { group, leaves } => {
            let mut cells = vec![Cell::text(format!("{group} всего")), Cell::Empty, Cell::Empty];
            cells.extend(measure_columns().map(|col| sum_of_rows(leaves, body_start, col)));
            cells
        }
    }
}

fn measure_columns() -> impl Iterator<Item = usize> {
    FIRST_MEASURE_COL..FIRST_MEASURE_COL + MEASURE_COUNT
}

/// `=SUM(...)` over exactly `offsets`, with consecutive offsets collapsed into ranges.
fn sum_of_rows(offsets: &[usize], body_start: usize, col: usize) -> Cell {
    if offsets.is_empty() {
        return Cell::Formula("=0".to_string());
    }
    let letters = column_letters(col);
    let mut parts = Vec::new();
    let mut run_start = offsets[0];
    let mut run_end = offsets[0];
    for &offset in offsets.iter().skip(1) {
        if offset == run_end + 1 {
            run_end = offset;
            continue;
        }
        parts.push(run(&letters, body_start, run_start, run_end));
        run_start = offset;
        run_end = offset;
    }
    parts.push(run(&letters, body_start, run_start, run_end));
    Cell::Formula(format!("=SUM({})", parts.join(",")))
}

fn run(letters: &str, body_start: usize, start: usize, end: usize) -> String {
    let first = body_start + start + 1;
    let last = body_start + end + 1;
    if first == last {
        format!("{letters}{first}")
    } else {
        format!("{letters}{first}:{letters}{last}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Amount, RecordFields};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use std::str::FromStr;

    fn records(values: Value) -> Vec<AnalyticRecord> {
        crate::normalize::records(values, &RecordFields::default())
    }

    fn period() -> Period {
        Period::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        )
        .unwrap()
    }

    /// Evaluates the `=SUM(...)` formulas this module writes against the sheet's numbers.
    fn eval(sheet: &Sheet, cell: &Cell) -> Decimal {
        match cell {
            Cell::Number(a) => a.value(),
            Cell::Formula(f) if f == "=0" => Decimal::ZERO,
            Cell::Formula(f) => {
                let inner = f.strip_prefix("=SUM(").unwrap().strip_suffix(')').unwrap();
                let mut total = Decimal::ZERO;
                for part in inner.split(',') {
                    let (a, b) = part.split_once(':').unwrap_or((part, part));
                    let a = CellRef::from_str(a).unwrap();
                    let b = CellRef::from_str(b).unwrap();
                    for row in a.row()..=b.row() {
                        let c = sheet.get(CellRef::new(row, a.col())).unwrap_or(&Cell::Empty);
                        total += eval(sheet, c);
                    }
                }
                total
            }
            _ => Decimal::ZERO,
        }
    }

    fn scenario() -> Vec<AnalyticRecord> {
        records(json!([
            {"RestorauntGroup": "B", "WeekInMonthOpen": 1, "DayOfWeekOpen": "1. Понедельник", "DishDiscountSumInt": 30},
            {"RestorauntGroup": "A", "WeekInMonthOpen": 1, "DayOfWeekOpen": "2. Вторник", "DishDiscountSumInt": 50},
            {"RestorauntGroup": "A", "WeekInMonthOpen": 1, "DayOfWeekOpen": "1. Понедельник", "DishDiscountSumInt": 100},
        ]))
    }

    #[test]
    fn test_scenario_rows() {
        let ledger = Ledger::build(scenario(), CalendarPolicy::FirstWeekMonday);
        let kinds: Vec<String> = ledger
            .rows()
            .iter()
            .map(|r| match r {
                LedgerRow::GroupHeader { group } => format!("header {group}"),
                LedgerRow::Data { group, day, .. } => format!("data {group} {}", day.number()),
                LedgerRow::WeekSubtotal { week, rows } => {
                    format!("week {week} {}..{}", rows.start, rows.end)
                }
                LedgerRow::GroupSubtotal { group, leaves } => format!("group {group} {leaves:?}"),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "header A",
                "data A 1",
                "data A 2",
                "week 1 1..3",
                "group A [1, 2]",
                "header B",
                "data B 1",
                "week 1 6..7",
                "group B [6]",
            ]
        );
    }

    #[test]
    fn test_scenario_sheet_totals() {
        let ledger = Ledger::build(scenario(), CalendarPolicy::FirstWeekMonday);
        let sheet = ledger.to_sheet("Курск", &period());
        let rows = sheet.rows();

        assert_eq!(rows[0], vec![Cell::text("Планы")]);
        assert_eq!(rows[1], vec![Cell::text("Название ресторана: Курск")]);
        assert_eq!(rows[2], vec![Cell::text("Период: с 01.03.2024 по 31.03.2024")]);
        assert_eq!(rows[4][0], Cell::text("Группа"));

        // Body starts at sheet row 6 (index 5)
        assert_eq!(rows[5], vec![Cell::text("A")]);
        assert_eq!(rows[8][1], Cell::text("1 всего"));
        assert_eq!(rows[8][3], Cell::Formula("=SUM(D7:D8)".to_string()));
        assert_eq!(rows[9][0], Cell::text("A всего"));
        assert_eq!(rows[9][3], Cell::Formula("=SUM(D7:D8)".to_string()));
        assert_eq!(rows[9][6], Cell::Formula("=SUM(G7:G8)".to_string()));

        let total = |row: usize| eval(&sheet, &rows[row][3]);
        assert_eq!(total(8), Decimal::from(150));
        assert_eq!(total(9), Decimal::from(150));
        assert_eq!(rows[10], vec![Cell::text("B")]);
        assert_eq!(total(12), Decimal::from(30));
        assert_eq!(total(13), Decimal::from(30));
    }

    #[test]
    fn test_data_row_cells() {
        let ledger = Ledger::build(scenario(), CalendarPolicy::FirstWeekMonday);
        let sheet = ledger.to_sheet("x", &period());
        assert_eq!(
            sheet.rows()[6],
            vec![
                Cell::Empty,
                Cell::from(1u32),
                Cell::text("1. Понедельник"),
                Cell::from(100u32),
                Cell::Number(Amount::ZERO),
                Cell::Number(Amount::ZERO),
                Cell::Number(Amount::ZERO),
            ]
        );
    }

    #[test]
    fn test_group_subtotal_skips_week_subtotals() {
        let ledger = Ledger::build(
            records(json!([
                {"RestorauntGroup": "A", "WeekInMonthOpen": 1, "DayOfWeekOpen": "1. Понедельник", "DishDiscountSumInt": 10},
                {"RestorauntGroup": "A", "WeekInMonthOpen": 1, "DayOfWeekOpen": "3. Среда", "DishDiscountSumInt": 20},
                {"RestorauntGroup": "A", "WeekInMonthOpen": 2, "DayOfWeekOpen": "1. Понедельник", "DishDiscountSumInt": 5},
            ])),
            CalendarPolicy::FirstWeekMonday,
        );
        let sheet = ledger.to_sheet("x", &period());
        let rows = sheet.rows();
        // 6 header, 7-8 week 1, 9 subtotal, 10 week 2, 11 subtotal, 12 group total
        assert_eq!(rows[8][3], Cell::Formula("=SUM(D7:D8)".to_string()));
        assert_eq!(rows[10][3], Cell::Formula("=SUM(D10:D10)".to_string()));
        assert_eq!(rows[11][3], Cell::Formula("=SUM(D7:D8,D10)".to_string()));
        assert_eq!(eval(&sheet, &rows[11][3]), Decimal::from(35));
    }

    #[test]
    fn test_float_weeks_are_kept() {
        let ledger = Ledger::build(
            records(json!([
                {"RestorauntGroup": "A", "WeekInMonthOpen": 3.0, "DayOfWeekOpen": "2. Вторник"},
                {"RestorauntGroup": "A", "WeekInMonthOpen": 1, "DayOfWeekOpen": "1. Понедельник"},
            ])),
            CalendarPolicy::DeriveFromOpenDate,
        );
        let weeks: Vec<u32> = ledger
            .rows()
            .iter()
            .filter_map(|r| match r {
                LedgerRow::WeekSubtotal { week, .. } => Some(*week),
                _ => None,
            })
            .collect();
        assert_eq!(weeks, vec![1, 3]);
        assert_eq!(ledger.data_row_count(), 2);
    }

    #[test]
    fn test_single_record() {
        let ledger = Ledger::build(
            records(json!([{"RestorauntGroup": "A", "WeekInMonthOpen": 3, "DayOfWeekOpen": "5. Пятница"}])),
            CalendarPolicy::FirstWeekMonday,
        );
        assert_eq!(ledger.rows().len(), 4);
        assert!(matches!(ledger.rows()[2], LedgerRow::WeekSubtotal { week: 3, .. }));
        assert!(matches!(ledger.rows()[3], LedgerRow::GroupSubtotal { .. }));
    }

    #[test]
    fn test_empty_input() {
        let ledger = Ledger::build(Vec::new(), CalendarPolicy::FirstWeekMonday);
        assert!(ledger.is_empty());
        assert_eq!(ledger.to_sheet("x", &period()).rows().len(), 5);
    }

    #[test]
    fn test_empty_group_emits_empty_subtotal() {
        let mut builder = LedgerBuilder::default();
        builder.rows.push(LedgerRow::GroupHeader {
            group: "A".to_string(),
        });
        builder.cursor = Cursor::InGroup {
            group: "A".to_string(),
            leaves: Vec::new(),
        };
        let ledger = builder.finish();
        assert_eq!(
            ledger.rows()[1],
            LedgerRow::GroupSubtotal {
                group: "A".to_string(),
                leaves: Vec::new()
            }
        );
        let sheet = ledger.to_sheet("x", &period());
        assert_eq!(sheet.rows()[6][3], Cell::Formula("=0".to_string()));
    }

    #[test]
    fn test_empty_week_range_renders_zero() {
        let row = LedgerRow::WeekSubtotal { week: 1, rows: 3..3 };
        assert_eq!(render_row(&row, 5)[3], Cell::Formula("=0".to_string()));
    }

    #[test]
    fn test_ordering_and_subtotal_placement() {
        let ledger = Ledger::build(
            records(json!([
                {"RestorauntGroup": "B", "WeekInMonthOpen": 2, "DayOfWeekOpen": "4. Четверг"},
                {"RestorauntGroup": "A", "WeekInMonthOpen": "x", "DayOfWeekOpen": "7. Воскресенье"},
                {"RestorauntGroup": "B", "WeekInMonthOpen": 1, "DayOfWeekOpen": "2. Вторник"},
                {"RestorauntGroup": "A", "WeekInMonthOpen": 2, "DayOfWeekOpen": "1. Понедельник"},
                {"RestorauntGroup": "B", "WeekInMonthOpen": 2, "DayOfWeekOpen": "1. Понедельник"},
                {"RestorauntGroup": "A", "WeekInMonthOpen": 1, "DayOfWeekOpen": "garbage"},
            ])),
            CalendarPolicy::FirstWeekMonday,
        );

        let rows = ledger.rows();
        let mut last_key: Option<(String, u32, u32)> = None;
        for (ix, row) in rows.iter().enumerate() {
            match row {
                LedgerRow::Data {
                    group, week, day, ..
                } => {
                    let key = (group.clone(), *week, day.number());
                    if let Some(prev) = &last_key {
                        assert!(prev <= &key, "{prev:?} > {key:?}");
                    }
                    last_key = Some(key);
                }
                LedgerRow::WeekSubtotal { rows: range, .. } => {
                    assert!(matches!(rows[ix - 1], LedgerRow::Data { .. }));
                    assert_eq!(range.end, ix);
                    for offset in range.clone() {
                        assert!(matches!(rows[offset], LedgerRow::Data { .. }));
                    }
                }
                LedgerRow::GroupSubtotal { leaves, .. } => {
                    assert!(matches!(rows[ix - 1], LedgerRow::WeekSubtotal { .. }));
                    for offset in leaves {
                        assert!(matches!(rows[*offset], LedgerRow::Data { .. }));
                    }
                }
                LedgerRow::GroupHeader { .. } => {
                    assert!(ix == 0 || matches!(rows[ix - 1], LedgerRow::GroupSubtotal { .. }));
                }
            }
        }
        assert_eq!(ledger.data_row_count(), 6);
        // A has weeks 1 and 2, B has weeks 1 and 2: 4 week subtotals, 2 group subtotals
        let weeks = rows
            .iter()
            .filter(|r| matches!(r, LedgerRow::WeekSubtotal { .. }))
            .count();
        assert_eq!(weeks, 4);
    }

    #[test]
    fn test_first_week_monday_policy() {
        let mut r = records(json!([{"RestorauntGroup": "A", "OpenDate.Typed": "2024-03-13T00:00:00"}]));
        CalendarPolicy::FirstWeekMonday.apply(&mut r[0]);
        assert_eq!(r[0].week(), Some(1));
        assert_eq!(r[0].day(), Some(&DayLabel::new(1, "Понедельник")));
    }

    #[test]
    fn test_derive_from_open_date_policy() {
        // 13 March 2024 is a Wednesday in the second 7-day block
        let mut r = records(json!([{"RestorauntGroup": "A", "OpenDate.Typed": "2024-03-13T00:00:00"}]));
        CalendarPolicy::DeriveFromOpenDate.apply(&mut r[0]);
        assert_eq!(r[0].week(), Some(2));
        assert_eq!(r[0].day(), Some(&DayLabel::new(3, "Среда")));
    }

    #[test]
    fn test_derive_keeps_present_fields() {
        let mut r = records(json!([{
            "RestorauntGroup": "A",
            "WeekInMonthOpen": 4,
            "DayOfWeekOpen": "6. Суббота",
            "OpenDate.Typed": "2024-03-13T00:00:00"
        }]));
        CalendarPolicy::DeriveFromOpenDate.apply(&mut r[0]);
        assert_eq!(r[0].week(), Some(4));
        assert_eq!(r[0].day().unwrap().number(), 6);
    }

    #[test]
    fn test_derive_without_date_falls_back() {
        let mut r = records(json!([{"RestorauntGroup": "A"}]));
        CalendarPolicy::DeriveFromOpenDate.apply(&mut r[0]);
        assert_eq!(r[0].week(), Some(1));
        assert_eq!(r[0].day().unwrap().number(), 1);
    }

    #[test]
    fn test_policy_names() {
        assert_eq!(
            CalendarPolicy::from_str("derive_from_open_date").unwrap(),
            CalendarPolicy::DeriveFromOpenDate
        );
        assert_eq!(CalendarPolicy::default().to_string(), "first_week_monday");
    }
}
