//! The revenue pivot ("Выручка для динамики"): revenue summed by group and dish category.

use crate::model::{AnalyticRecord, Amount, Cell, Row, Sheet};
use crate::period::{Period, DATE_FORMAT};
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

const TOTAL: &str = "Итого";

/// A group x category table of summed revenue.
///
/// Groups and categories iterate in lexicographic order. Totals are computed from the cells on
/// demand rather than stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PivotMatrix {
    groups: BTreeSet<String>,
    categories: BTreeSet<String>,
    cells: BTreeMap<(String, String), Amount>,
}

impl PivotMatrix {
    /// Folds `records` into a matrix. Returns `None` when no record had both a group and a
    /// category.
    pub fn aggregate<'a>(records: impl IntoIterator<Item = &'a AnalyticRecord>) -> Option<Self> {
        let mut matrix = Self::default();
        for record in records {
            matrix.add(record);
        }
        matrix.has_data().then_some(matrix)
    }

    fn add(&mut self, record: &AnalyticRecord) {
        let group = record.group();
        let category = record.category();
        if group.trim().is_empty() || category.trim().is_empty() {
            trace!("Skipping record without group or category: {record:?}");
            return;
        }
        // Category labels sometimes carry a single leading space from the preset.
        let category = category.strip_prefix(' ').unwrap_or(category);

        self.groups.insert(group.to_string());
        self.categories.insert(category.to_string());
        *self
            .cells
            .entry((group.to_string(), category.to_string()))
            .or_default() += record.revenue();
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(String::as_str)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(String::as_str)
    }

    pub fn has_data(&self) -> bool {
        !self.groups.is_empty() && !self.categories.is_empty()
    }

    /// The accumulated sum for a pair, zero when the pair never appeared.
    pub fn cell(&self, group: &str, category: &str) -> Amount {
        self.cells
            .get(&(group.to_string(), category.to_string()))
            .copied()
            .unwrap_or_default()
    }

    pub fn group_total(&self, group: &str) -> Amount {
        self.cells
            .iter()
            .filter(|((g, _), _)| g == group)
            .map(|(_, v)| v)
            .sum()
    }

    #[cfg(test)]
    pub fn category_total(&self, category: &str) -> Amount {
        self.cells
            .iter()
            .filter(|((_, c), _)| c == category)
            .map(|(_, v)| v)
            .sum()
    }

    #[cfg(test)]
    pub fn grand_total(&self) -> Amount {
        self.cells.values().sum()
    }

    /// Lays the matrix out as a sheet showing at most `max_groups` group columns. The row
    /// totals and the grand total cover the shown groups only, so every total on the sheet
    /// adds up across its row or column.
    pub fn to_sheet(&self, base_name: &str, period: &Period, max_groups: usize) -> Sheet {
        let shown: Vec<&str> = self.groups().take(max_groups).collect();
        if shown.len() < self.groups.len() {
            trace!(
                "Showing {} of {} groups for {base_name}",
                shown.len(),
                self.groups.len()
            );
        }

        let mut sheet = Sheet::new(base_name);
        sheet.push(vec![Cell::text(format!("Выручка для динамики - {base_name}"))]);
        sheet.push(vec![Cell::text(format!("Название ресторана: {base_name}"))]);
        sheet.push(vec![Cell::text(format!(
            "Период: с {} по {}",
            period.from().format(DATE_FORMAT),
            period.to().format(DATE_FORMAT)
        ))]);
        sheet.push_blank();

        let mut header: Row = vec![Cell::text("Группа")];
        header.extend(shown.iter().map(|g| Cell::text(*g)));
        header.push(Cell::text(TOTAL));
        sheet.push(header);

        let month = period.month_label();
        let mut months: Row = vec![Cell::text("Категория блюда")];
        months.extend((0..=shown.len()).map(|_| Cell::text(month.as_str())));
        sheet.push(months);

        for category in self.categories() {
            let mut row: Row = vec![Cell::text(category)];
            let mut total = Amount::ZERO;
            for group in &shown {
                let value = self.cell(group, category);
                total += value;
                row.push(Cell::Number(value));
            }
            row.push(Cell::Number(total));
            sheet.push(row);
        }

        let mut totals: Row = vec![Cell::text(TOTAL)];
        let mut grand = Amount::ZERO;
        for group in &shown {
            let value = self.group_total(group);
            grand += value;
            totals.push(Cell::Number(value));
        }
        totals.push(Cell::Number(grand));
        sheet.push(totals);
        sheet
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordFields;
    use chrono::NaiveDate;
    use serde_json::{json, Value};

    fn records(values: Value) -> Vec<AnalyticRecord> {
        crate::normalize::records(values, &RecordFields::default())
    }

    fn amount(s: &str) -> Amount {
        s.parse().unwrap()
    }

    fn period() -> Period {
        Period::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        )
        .unwrap()
    }

    fn scenario() -> PivotMatrix {
        PivotMatrix::aggregate(&records(json!({"data": [
            {"RestorauntGroup": "A", "DishCategory": "Напитки", "DishDiscountSumInt": 10},
            {"RestorauntGroup": "A", "DishCategory": "Напитки", "DishDiscountSumInt": 5},
            {"RestorauntGroup": "B", "DishCategory": " Десерты", "DishDiscountSumInt": 7},
        ]})))
        .unwrap()
    }

    #[test]
    fn test_scenario() {
        let matrix = scenario();
        assert_eq!(matrix.groups().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(
            matrix.categories().collect::<Vec<_>>(),
            vec!["Десерты", "Напитки"]
        );
        assert_eq!(matrix.cell("A", "Напитки"), amount("15"));
        assert_eq!(matrix.cell("B", "Десерты"), amount("7"));
        assert!(matrix.cell("A", "Десерты").is_zero());
        assert!(matrix.has_data());
    }

    #[test]
    fn test_totals() {
        let matrix = scenario();
        assert_eq!(matrix.group_total("A"), amount("15"));
        assert_eq!(matrix.category_total("Десерты"), amount("7"));
        assert_eq!(matrix.grand_total(), amount("22"));
    }

    #[test]
    fn test_only_one_leading_space_is_trimmed() {
        let matrix = PivotMatrix::aggregate(&records(json!([
            {"RestorauntGroup": "A", "DishCategory": "  Супы", "DishDiscountSumInt": 1},
        ])))
        .unwrap();
        assert_eq!(matrix.categories().collect::<Vec<_>>(), vec![" Супы"]);
    }

    #[test]
    fn test_category_falls_back_to_dish_group() {
        let matrix = PivotMatrix::aggregate(&records(json!([
            {"RestorauntGroup": "A", "DishCategory": "", "DishGroup": "Выпечка", "DishDiscountSumInt": 3},
        ])))
        .unwrap();
        assert_eq!(matrix.cell("A", "Выпечка"), amount("3"));
    }

    #[test]
    fn test_blank_group_or_category_is_skipped() {
        assert!(PivotMatrix::aggregate(&records(json!([
            {"RestorauntGroup": " ", "DishCategory": "Напитки", "DishDiscountSumInt": 3},
            {"RestorauntGroup": "A", "DishDiscountSumInt": 3},
        ])))
        .is_none());
    }

    #[test]
    fn test_bad_amounts_count_as_zero() {
        let matrix = PivotMatrix::aggregate(&records(json!([
            {"RestorauntGroup": "A", "DishCategory": "Напитки", "DishDiscountSumInt": "n/a"},
            {"RestorauntGroup": "A", "DishCategory": "Напитки", "DishDiscountSumInt": "2,5"},
            {"RestorauntGroup": "A", "DishCategory": "Напитки"},
        ])))
        .unwrap();
        assert_eq!(matrix.cell("A", "Напитки"), amount("2.5"));
    }

    #[test]
    fn test_additivity() {
        let input = records(json!([
            {"RestorauntGroup": "A", "DishCategory": "x", "DishDiscountSumInt": 1.25},
            {"RestorauntGroup": "B", "DishCategory": "x", "DishDiscountSumInt": 2},
            {"RestorauntGroup": "A", "DishCategory": " x", "DishDiscountSumInt": 3},
            {"RestorauntGroup": "A", "DishCategory": "y", "DishDiscountSumInt": 4},
        ]));
        let matrix = PivotMatrix::aggregate(&input).unwrap();
        for g in matrix.groups() {
            for c in matrix.categories() {
                let expected: Amount = input
                    .iter()
                    .filter(|r| r.group() == g)
                    .filter(|r| r.category().strip_prefix(' ').unwrap_or(r.category()) == c)
                    .map(|r| r.revenue())
                    .sum();
                assert_eq!(matrix.cell(g, c), expected, "{g}/{c}");
            }
        }
        assert_eq!(matrix.cell("A", "x"), amount("4.25"));
    }

    #[test]
    fn test_sheet_layout() {
        let sheet = scenario().to_sheet("Курск", &period(), 4);
        let rows = sheet.rows();
        assert_eq!(rows[0], vec![Cell::text("Выручка для динамики - Курск")]);
        assert_eq!(
            rows[4],
            vec![
                Cell::text("Группа"),
                Cell::text("A"),
                Cell::text("B"),
                Cell::text("Итого")
            ]
        );
        assert_eq!(rows[5][0], Cell::text("Категория блюда"));
        assert_eq!(rows[5][3], Cell::text("03 (Март)"));
        assert_eq!(
            rows[6],
            vec![
                Cell::text("Десерты"),
                Cell::Number(Amount::ZERO),
                Cell::Number(amount("7")),
                Cell::Number(amount("7")),
            ]
        );
        assert_eq!(
            rows[8],
            vec![
                Cell::text("Итого"),
                Cell::Number(amount("15")),
                Cell::Number(amount("7")),
                Cell::Number(amount("22")),
            ]
        );
        assert_eq!(rows.len(), 9);
    }

    #[test]
    fn test_sheet_limits_groups() {
        let sheet = scenario().to_sheet("x", &period(), 1);
        let rows = sheet.rows();
        assert_eq!(rows[4].len(), 3);
        // Totals cover the shown group only
        assert_eq!(
            rows[8],
            vec![
                Cell::text("Итого"),
                Cell::Number(amount("15")),
                Cell::Number(amount("15")),
            ]
        );
    }
}
