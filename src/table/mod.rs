pub mod memory;

pub use memory::{TableRow, UnitTable};

use crate::filter::FilterField;

/// Key of the always-visible row that keeps column widths stable while
/// other rows are hidden.
pub const SENTINEL_ROW_KEY: &str = "sentinel-row";

/// Text columns the filters read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    City,
    Name,
    Size,
}

#[derive(Debug, thiserror::Error)]
pub enum RowAccessError {
    #[error("row {0} does not exist")]
    NoSuchRow(usize),
    #[error("row {row} has no {column:?} cell")]
    MissingCell { row: usize, column: Column },
}

/// Capability over the rendered unit listing.
///
/// Rows are addressed by position. Hidden rows stay addressable so a later
/// filter pass can show them again.
pub trait RowAccessor {
    fn row_count(&self) -> usize;

    /// Structural key of the row, used to spot the sentinel row
    fn row_key(&self, row: usize) -> Result<Option<String>, RowAccessError>;

    fn cell_text(&self, row: usize, column: Column) -> Result<String, RowAccessError>;

    /// Product labels from the row's product annotations
    fn product_labels(&self, row: usize) -> Result<Vec<String>, RowAccessError>;

    fn is_visible(&self, row: usize) -> bool;

    fn set_visible(&mut self, row: usize, visible: bool);

    /// Attach the pricing selector pair to a row with initial values.
    /// Selector setters are no-ops on rows without selectors.
    fn bind_selectors(&mut self, row: usize, strategy: &str, multiplier: &str);

    /// Current value of the strategy selector, `None` when the row has none
    fn strategy_choice(&self, row: usize) -> Option<String>;

    fn set_strategy_choice(&mut self, row: usize, label: &str);

    /// Current value of the minimum-price multiplier selector
    fn multiplier_choice(&self, row: usize) -> Option<String>;

    fn set_multiplier_choice(&mut self, row: usize, multiplier: &str);

    /// Current text of a filter input
    fn filter_input(&self, field: FilterField) -> String;

    fn set_filter_input(&mut self, field: FilterField, value: &str);

    fn is_sentinel(&self, row: usize) -> bool {
        matches!(self.row_key(row), Ok(Some(key)) if key == SENTINEL_ROW_KEY)
    }

    /// Unit id shown in the row's id cell, if it parses
    fn unit_id(&self, row: usize) -> Option<u64> {
        self.cell_text(row, Column::Id)
            .ok()
            .and_then(|text| text.trim().parse().ok())
    }

    /// Position of the first row showing the given unit id
    fn find_unit_row(&self, unit_id: u64) -> Option<usize> {
        (0..self.row_count()).find(|&row| self.unit_id(row) == Some(unit_id))
    }
}
