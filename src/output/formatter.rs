use owo_colors::OwoColorize;
use std::io::IsTerminal;
use terminal_size::{terminal_size, Width};

use crate::api::PriceChange;
use crate::filter::{FilterField, FilterState};
use crate::pricing::{BatchReport, CalculationStrategy, MIN_PRICE_MULTIPLIERS};
use crate::table::TableRow;

/// Check if stdout is a TTY (for auto-detecting color support)
pub fn should_use_colors() -> bool {
    std::io::stdout().is_terminal()
}

/// Get terminal width, defaulting to None for pipes (unlimited)
fn get_terminal_width() -> Option<usize> {
    terminal_size().map(|(Width(w), _)| w as usize)
}

/// Truncate text to fit available width, accounting for Unicode
fn truncate(text: &str, max_width: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_width {
        text.to_string()
    } else if max_width > 3 {
        format!("{}...", chars[..max_width - 3].iter().collect::<String>())
    } else {
        chars[..max_width].iter().collect()
    }
}

fn pad(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        text.to_string()
    } else {
        format!("{}{}", text, " ".repeat(width - len))
    }
}

/// Format visible rows as a table: id, city, name, size, products, and the
/// pricing choice for rows that have selectors
pub fn format_unit_table<'a>(
    rows: impl IntoIterator<Item = &'a TableRow>,
    use_colors: bool,
) -> String {
    let rows: Vec<&TableRow> = rows.into_iter().collect();
    if rows.is_empty() {
        return "No units match the current filters.".to_string();
    }

    let id_width = rows.iter().map(|r| r.id.len()).max().unwrap_or(0);
    let city_width = rows.iter().map(|r| r.city.chars().count()).max().unwrap_or(0).min(16);
    let size_width = rows.iter().map(|r| r.size.len()).max().unwrap_or(0);
    let separator = "  ";

    let name_width = match get_terminal_width() {
        Some(width) => width
            .saturating_sub(id_width + city_width + size_width + separator.len() * 4 + 30)
            .max(16),
        None => usize::MAX,
    };

    rows.iter()
        .map(|row| {
            let id = format!("{:>width$}", row.id, width = id_width);
            let city = pad(&truncate(&row.city, city_width), city_width);
            let name = truncate(&row.name, name_width);
            let size = format!("{:>width$}", row.size, width = size_width);
            let products = row.products.join(", ");
            let choice = row
                .selectors
                .as_ref()
                .map(|s| format!("[{} / min x{}]", s.strategy, s.multiplier))
                .unwrap_or_default();

            let line = if use_colors {
                format!(
                    "{}{sep}{}{sep}{}{sep}{}{sep}{}",
                    id.dimmed(),
                    city.cyan(),
                    size,
                    name.bold(),
                    products.yellow(),
                    sep = separator
                )
            } else {
                format!(
                    "{}{sep}{}{sep}{}{sep}{}{sep}{}",
                    id,
                    city,
                    size,
                    name,
                    products,
                    sep = separator
                )
            };

            if choice.is_empty() {
                line
            } else if use_colors {
                format!("{}{}{}", line, separator, choice.green())
            } else {
                format!("{}{}{}", line, separator, choice)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format the active filters, one per line
pub fn format_filters(state: &FilterState) -> String {
    if state.is_empty() {
        return "No filters set.".to_string();
    }

    FilterField::ALL
        .iter()
        .filter(|field| !state.get(**field).is_empty())
        .map(|field| format!("{:<9}{:?}", format!("{}:", field), state.get(*field)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format the strategy catalog and the multiplier choices
pub fn format_choices(strategies: &[CalculationStrategy], use_colors: bool) -> String {
    let label_width = strategies.iter().map(|s| s.label.len()).max().unwrap_or(0);
    let mut lines: Vec<String> = strategies
        .iter()
        .enumerate()
        .map(|(idx, s)| {
            let default_marker = if idx == 0 { " (default)" } else { "" };
            let label = format!("{:<width$}", s.label, width = label_width);
            if use_colors {
                format!("{}  {}{}", label.bold(), s.description, default_marker.dimmed())
            } else {
                format!("{}  {}{}", label, s.description, default_marker)
            }
        })
        .collect();

    let multipliers = MIN_PRICE_MULTIPLIERS
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    lines.push(String::new());
    lines.push(format!(
        "Minimum price multipliers: {} (minPrice = purchasePrice * multiplier)",
        multipliers
    ));
    lines.join("\n")
}

/// Format a batch outcome summary, listing failed units
pub fn format_batch_report(report: &BatchReport, use_colors: bool) -> String {
    let summary = format!("{} of {} units updated", report.succeeded, report.total);
    let mut lines = vec![if use_colors && report.failures.is_empty() {
        summary.green().to_string()
    } else {
        summary
    }];

    for failure in &report.failures {
        let line = format!("  unit {}: {}", failure.unit_id, failure.message);
        lines.push(if use_colors {
            line.red().to_string()
        } else {
            line
        });
    }

    lines.join("\n")
}

/// Format planned price changes from a dry run
pub fn format_planned_changes(planned: &[(u64, PriceChange)]) -> String {
    if planned.is_empty() {
        return "No price changes planned.".to_string();
    }

    planned
        .iter()
        .map(|(unit_id, change)| {
            format!(
                "unit {:>8}  product {:>8}  {:>12.2}",
                unit_id, change.product_id, change.price
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
