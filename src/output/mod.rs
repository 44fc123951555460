pub mod formatter;

pub use formatter::{
    format_batch_report, format_choices, format_filters, format_planned_changes,
    format_unit_table, should_use_colors,
};
