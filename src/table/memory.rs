use std::collections::HashMap;

use super::{Column, RowAccessError, RowAccessor, SENTINEL_ROW_KEY};
use crate::filter::FilterField;
use crate::units::UnitRecord;

/// Per-row pricing selector pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selectors {
    pub strategy: String,
    pub multiplier: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub key: Option<String>,
    pub id: String,
    pub city: String,
    pub name: String,
    pub size: String,
    pub products: Vec<String>,
    pub visible: bool,
    pub selectors: Option<Selectors>,
}

impl TableRow {
    pub fn new(id: &str, city: &str, name: &str, size: &str, products: &[&str]) -> Self {
        Self {
            key: None,
            id: id.to_string(),
            city: city.to_string(),
            name: name.to_string(),
            size: size.to_string(),
            products: products.iter().map(|p| p.to_string()).collect(),
            visible: true,
            selectors: None,
        }
    }

    fn from_unit(unit: &UnitRecord) -> Self {
        Self {
            key: None,
            id: unit.id.to_string(),
            city: unit.city_name.clone(),
            name: unit.name.clone(),
            size: unit.size_text(),
            products: unit.product_labels(),
            visible: true,
            selectors: None,
        }
    }

    fn sentinel() -> Self {
        Self {
            key: Some(SENTINEL_ROW_KEY.to_string()),
            id: String::new(),
            city: String::new(),
            name: String::new(),
            size: String::new(),
            products: Vec::new(),
            visible: true,
            selectors: None,
        }
    }
}

/// In-memory unit listing, the headless counterpart of the rendered table
#[derive(Debug, Clone, Default)]
pub struct UnitTable {
    rows: Vec<TableRow>,
    inputs: HashMap<FilterField, String>,
}

impl UnitTable {
    pub fn new(rows: Vec<TableRow>) -> Self {
        Self {
            rows,
            inputs: HashMap::new(),
        }
    }

    /// Build the listing from unit records, one row per unit followed by the
    /// sentinel row
    pub fn from_units(units: &[UnitRecord]) -> Self {
        let mut rows: Vec<TableRow> = units.iter().map(TableRow::from_unit).collect();
        rows.push(TableRow::sentinel());
        Self::new(rows)
    }

    /// Append the sentinel row
    pub fn with_sentinel(mut self) -> Self {
        self.rows.push(TableRow::sentinel());
        self
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn row(&self, idx: usize) -> Option<&TableRow> {
        self.rows.get(idx)
    }

    /// Rows currently shown, sentinel excluded
    pub fn visible_rows(&self) -> impl Iterator<Item = &TableRow> {
        self.rows
            .iter()
            .filter(|r| r.visible && r.key.as_deref() != Some(SENTINEL_ROW_KEY))
    }

    fn get(&self, row: usize) -> Result<&TableRow, RowAccessError> {
        self.rows.get(row).ok_or(RowAccessError::NoSuchRow(row))
    }
}

impl RowAccessor for UnitTable {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn row_key(&self, row: usize) -> Result<Option<String>, RowAccessError> {
        Ok(self.get(row)?.key.clone())
    }

    fn cell_text(&self, row: usize, column: Column) -> Result<String, RowAccessError> {
        let r = self.get(row)?;
        Ok(match column {
            Column::Id => r.id.clone(),
            Column::City => r.city.clone(),
            Column::Name => r.name.clone(),
            Column::Size => r.size.clone(),
        })
    }

    fn product_labels(&self, row: usize) -> Result<Vec<String>, RowAccessError> {
        Ok(self.get(row)?.products.clone())
    }

    fn is_visible(&self, row: usize) -> bool {
        self.rows.get(row).is_some_and(|r| r.visible)
    }

    fn set_visible(&mut self, row: usize, visible: bool) {
        if let Some(r) = self.rows.get_mut(row) {
            r.visible = visible;
        }
    }

    fn bind_selectors(&mut self, row: usize, strategy: &str, multiplier: &str) {
        if let Some(r) = self.rows.get_mut(row) {
            r.selectors = Some(Selectors {
                strategy: strategy.to_string(),
                multiplier: multiplier.to_string(),
            });
        }
    }

    fn strategy_choice(&self, row: usize) -> Option<String> {
        self.rows
            .get(row)
            .and_then(|r| r.selectors.as_ref())
            .map(|s| s.strategy.clone())
    }

    fn set_strategy_choice(&mut self, row: usize, label: &str) {
        if let Some(s) = self.rows.get_mut(row).and_then(|r| r.selectors.as_mut()) {
            s.strategy = label.to_string();
        }
    }

    fn multiplier_choice(&self, row: usize) -> Option<String> {
        self.rows
            .get(row)
            .and_then(|r| r.selectors.as_ref())
            .map(|s| s.multiplier.clone())
    }

    fn set_multiplier_choice(&mut self, row: usize, multiplier: &str) {
        if let Some(s) = self.rows.get_mut(row).and_then(|r| r.selectors.as_mut()) {
            s.multiplier = multiplier.to_string();
        }
    }

    fn filter_input(&self, field: FilterField) -> String {
        self.inputs.get(&field).cloned().unwrap_or_default()
    }

    fn set_filter_input(&mut self, field: FilterField, value: &str) {
        self.inputs.insert(field, value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::types::sample_unit;

    #[test]
    fn test_from_units_appends_sentinel() {
        let table = UnitTable::from_units(&[sample_unit(1, "shop"), sample_unit(2, "mine")]);
        assert_eq!(table.row_count(), 3);
        assert!(table.is_sentinel(2));
        assert!(!table.is_sentinel(0));
        assert_eq!(table.unit_id(1), Some(2));
        assert_eq!(table.unit_id(2), None);
        assert_eq!(table.find_unit_row(2), Some(1));
    }

    #[test]
    fn test_selectors_ignored_until_bound() {
        let mut table = UnitTable::from_units(&[sample_unit(1, "shop")]);
        table.set_strategy_choice(0, "Market");
        assert_eq!(table.strategy_choice(0), None);

        table.bind_selectors(0, "Market", "0");
        table.set_multiplier_choice(0, "1.4");
        assert_eq!(table.strategy_choice(0).as_deref(), Some("Market"));
        assert_eq!(table.multiplier_choice(0).as_deref(), Some("1.4"));
    }

    #[test]
    fn test_out_of_range_row_is_an_error() {
        let table = UnitTable::default();
        assert!(matches!(
            table.cell_text(3, Column::Id),
            Err(RowAccessError::NoSuchRow(3))
        ));
    }
}
