use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::types::{FilterField, FilterState, Filters, FILTER_STATE_VERSION};
use crate::context::{PageContext, FILTER_FEATURE};
use crate::store::{restore_json, store_json, SettingsStore, StoreError};
use crate::table::{Column, RowAccessError, RowAccessor};

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("failed to parse row list for filtering: {source}")]
    Evaluation {
        #[source]
        source: RowAccessError,
    },
    #[error("failed to persist filters: {0}")]
    Persist(#[from] StoreError),
}

/// Lower-cased, trimmed text of one row as the filters see it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowFields {
    pub id: String,
    pub city: String,
    pub name: String,
    pub size: String,
    pub products: Vec<String>,
}

impl RowFields {
    pub fn extract<R: RowAccessor + ?Sized>(rows: &R, row: usize) -> Result<Self, RowAccessError> {
        let cell = |column| -> Result<String, RowAccessError> {
            Ok(rows.cell_text(row, column)?.to_lowercase().trim().to_string())
        };

        Ok(Self {
            id: cell(Column::Id)?,
            city: cell(Column::City)?,
            name: cell(Column::Name)?,
            size: cell(Column::Size)?,
            products: rows
                .product_labels(row)?
                .iter()
                .map(|p| p.to_lowercase().trim().to_string())
                .collect(),
        })
    }
}

/// Case-insensitive containment; an empty filter matches everything
fn text_matches(field: &str, filter: &str) -> bool {
    filter.is_empty() || field.contains(&filter.to_lowercase())
}

/// Comma-separated product terms; a row passes when any of its labels
/// contains any term. Terms are not trimmed, so "tools, diesel" looks for
/// " diesel".
fn products_match(products: &[String], filter: &str) -> bool {
    if filter.is_empty() {
        return true;
    }
    let filter = filter.to_lowercase();
    let terms: Vec<&str> = filter.split(',').collect();
    products
        .iter()
        .any(|label| terms.iter().any(|term| label.contains(term)))
}

/// Whether a row passes every filter
pub fn row_matches(fields: &RowFields, filters: &Filters) -> bool {
    text_matches(&fields.id, &filters.filter_by_id)
        && text_matches(&fields.city, &filters.filter_by_city)
        && text_matches(&fields.name, &filters.filter_by_name)
        && text_matches(&fields.size, &filters.filter_by_size)
        && products_match(&fields.products, &filters.filter_by_products)
}

/// Filters the unit listing and keeps the filter text persisted per tenant
/// and page.
pub struct FilterEngine {
    storage_key: String,
    store: Arc<dyn SettingsStore>,
    state: FilterState,
}

impl FilterEngine {
    pub fn new(ctx: &PageContext, store: Arc<dyn SettingsStore>) -> Self {
        Self {
            storage_key: ctx.storage_key(FILTER_FEATURE),
            store,
            state: FilterState::new(),
        }
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    /// Show rows passing every filter and hide the rest.
    ///
    /// Visibility for all rows is computed before any row is touched, so a
    /// row that cannot be read leaves the listing unchanged. Returns the
    /// number of visible data rows.
    pub fn apply_filters<R: RowAccessor + ?Sized>(
        &self,
        rows: &mut R,
    ) -> Result<usize, FilterError> {
        let reader: &R = rows;
        let visibility = (0..reader.row_count())
            .map(|row| {
                if reader.is_sentinel(row) {
                    return Ok((true, true));
                }
                let fields = RowFields::extract(reader, row)?;
                Ok((row_matches(&fields, &self.state.filters), false))
            })
            .collect::<Result<Vec<_>, RowAccessError>>()
            .map_err(|source| FilterError::Evaluation { source })?;

        let mut shown = 0;
        for (row, (visible, sentinel)) in visibility.into_iter().enumerate() {
            rows.set_visible(row, visible);
            if visible && !sentinel {
                shown += 1;
            }
        }

        debug!(shown, total = rows.row_count(), "filters applied");
        Ok(shown)
    }

    /// Change one filter, persist all filters, and re-filter
    pub fn update_filter<R: RowAccessor + ?Sized>(
        &mut self,
        rows: &mut R,
        field: FilterField,
        value: &str,
    ) -> Result<usize, FilterError> {
        self.state.set(field, value);
        self.save()?;
        self.apply_filters(rows)
    }

    /// Clear every filter and its input, persist, and re-filter
    pub fn reset_filters<R: RowAccessor + ?Sized>(
        &mut self,
        rows: &mut R,
    ) -> Result<usize, FilterError> {
        self.state.clear();
        for field in FilterField::ALL {
            rows.set_filter_input(field, "");
        }
        self.save()?;
        self.apply_filters(rows)
    }

    /// Load persisted filters, fill the inputs, and re-filter.
    ///
    /// Returns `Ok(false)` without touching the listing when nothing is
    /// persisted.
    pub fn restore<R: RowAccessor + ?Sized>(&mut self, rows: &mut R) -> Result<bool, FilterError> {
        let stored = restore_json::<FilterState>(self.store.as_ref(), &self.storage_key)?;
        let Some(entry) = stored else {
            return Ok(false);
        };

        if entry.data.version != FILTER_STATE_VERSION {
            warn!(
                version = entry.data.version,
                "ignoring persisted filters with unsupported version"
            );
            return Ok(false);
        }

        self.state = entry.data;
        for field in FilterField::ALL {
            rows.set_filter_input(field, self.state.get(field));
        }

        let shown = self.apply_filters(rows)?;
        info!(shown, saved_at = %entry.timestamp, "restored filters");
        Ok(true)
    }

    fn save(&self) -> Result<(), StoreError> {
        store_json(self.store.as_ref(), &self.storage_key, &self.state, Utc::now())
    }
}
