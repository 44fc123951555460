use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const FILTER_STATE_VERSION: u32 = 1;

/// One of the five listing filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    Id,
    City,
    Name,
    Size,
    Products,
}

impl FilterField {
    pub const ALL: [FilterField; 5] = [
        FilterField::Id,
        FilterField::City,
        FilterField::Name,
        FilterField::Size,
        FilterField::Products,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterField::Id => "id",
            FilterField::City => "city",
            FilterField::Name => "name",
            FilterField::Size => "size",
            FilterField::Products => "products",
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "id" => Ok(FilterField::Id),
            "city" => Ok(FilterField::City),
            "name" => Ok(FilterField::Name),
            "size" => Ok(FilterField::Size),
            "products" | "product" => Ok(FilterField::Products),
            other => bail!(
                "Unknown filter field '{}' (expected id, city, name, size or products)",
                other
            ),
        }
    }
}

/// Current text of every filter. All five are always present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Filters {
    pub filter_by_id: String,
    pub filter_by_city: String,
    pub filter_by_name: String,
    pub filter_by_size: String,
    pub filter_by_products: String,
}

/// Persisted filter blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub filters: Filters,
}

fn default_version() -> u32 {
    FILTER_STATE_VERSION
}

impl Default for FilterState {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterState {
    pub fn new() -> Self {
        Self {
            version: FILTER_STATE_VERSION,
            filters: Filters::default(),
        }
    }

    pub fn get(&self, field: FilterField) -> &str {
        match field {
            FilterField::Id => &self.filters.filter_by_id,
            FilterField::City => &self.filters.filter_by_city,
            FilterField::Name => &self.filters.filter_by_name,
            FilterField::Size => &self.filters.filter_by_size,
            FilterField::Products => &self.filters.filter_by_products,
        }
    }

    pub fn set(&mut self, field: FilterField, value: impl Into<String>) {
        let value = value.into();
        match field {
            FilterField::Id => self.filters.filter_by_id = value,
            FilterField::City => self.filters.filter_by_city = value,
            FilterField::Name => self.filters.filter_by_name = value,
            FilterField::Size => self.filters.filter_by_size = value,
            FilterField::Products => self.filters.filter_by_products = value,
        }
    }

    pub fn clear(&mut self) {
        self.filters = Filters::default();
    }

    pub fn is_empty(&self) -> bool {
        FilterField::ALL.iter().all(|f| self.get(*f).is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field_names() {
        assert_eq!("ID".parse::<FilterField>().unwrap(), FilterField::Id);
        assert_eq!("products".parse::<FilterField>().unwrap(), FilterField::Products);
        assert!("price".parse::<FilterField>().is_err());
    }

    #[test]
    fn test_partial_blob_fills_missing_fields() {
        let state: FilterState =
            serde_json::from_str(r#"{"filters": {"filterByCity": "kyiv"}}"#).unwrap();
        assert_eq!(state.version, FILTER_STATE_VERSION);
        assert_eq!(state.get(FilterField::City), "kyiv");
        assert_eq!(state.get(FilterField::Products), "");
    }

    #[test]
    fn test_serialized_blob_carries_all_fields() {
        let value = serde_json::to_value(FilterState::new()).unwrap();
        let filters = value["filters"].as_object().unwrap();
        assert_eq!(filters.len(), 5);
        assert!(filters.contains_key("filterByProducts"));
    }

    #[test]
    fn test_set_and_clear() {
        let mut state = FilterState::new();
        state.set(FilterField::Size, "3");
        assert!(!state.is_empty());
        state.clear();
        assert!(state.is_empty());
    }
}
