pub mod engine;
pub mod types;

pub use engine::{row_matches, FilterEngine, FilterError, RowFields};
pub use types::{FilterField, FilterState, Filters};
