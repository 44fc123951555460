use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tracing::warn;

use super::types::{UnitIndicator, UnitProduct, UnitRecord};

/// Raw units response as the server sends it.
///
/// Both `data` and each `indicators` entry are grouped: an object or array
/// whose children are either items or arrays of items.
#[derive(Debug, Default, Deserialize)]
pub struct UnitsResponse {
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub indicators: Value,
}

/// Parse a units response document into records
pub fn parse_units_json(json: &str) -> Result<Vec<UnitRecord>> {
    let response: UnitsResponse =
        serde_json::from_str(json).context("Failed to parse units response")?;
    Ok(parse_units_response(&response))
}

/// Load and parse a units response from a JSON file
pub fn load_units_file(path: &Path) -> Result<Vec<UnitRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read units file at {}", path.display()))?;
    parse_units_json(&content)
        .with_context(|| format!("Invalid units file {}", path.display()))
}

/// Flatten a response into an ordered list of unit records.
///
/// Items whose id is not a non-negative integer are skipped.
pub fn parse_units_response(response: &UnitsResponse) -> Vec<UnitRecord> {
    flatten_groups(&response.data)
        .into_iter()
        .filter_map(|item| {
            let Some(id) = unit_id(item.get("id")) else {
                warn!(id = %text(item.get("id")), "skipping unit with invalid id");
                return None;
            };

            Some(UnitRecord {
                id,
                name: text(item.get("name")),
                city_symbol: text(item.get("city_symbol")),
                city_name: text(item.get("city_name")),
                country_symbol: text(item.get("country_symbol")),
                country_name: text(item.get("country_name")),
                region_name: text(item.get("region_name")),
                unit_type_id: numberify(item.get("unit_type_id")),
                unit_type_symbol: text(item.get("unit_type_symbol")),
                unit_type_name: text(item.get("unit_type_name")),
                size: numberify(item.get("size")),
                labor_max: numberify(item.get("labor_max")),
                equipment_max: numberify(item.get("equipment_max")),
                square: numberify(item.get("square")),
                produce_name: text(item.get("unit_type_produce_name")),
                class_id: numberify(item.get("unit_class_id")),
                class_name: text(item.get("unit_class_name")),
                class_kind: text(item.get("unit_class_kind")),
                productivity: numberify(item.get("productivity")),
                notice: text(item.get("notice")),
                market_status: text(item.get("market_status")),
                time_to_build: numberify(item.get("time_to_build")),
                office_sort: numberify(item.get("office_sort")),
                products: map_products(item),
                indicators: map_indicators(id, &response.indicators),
            })
        })
        .collect()
}

/// Flatten one level of grouping. Array children are expanded, anything else
/// is taken as an item.
fn flatten_groups(value: &Value) -> Vec<&Value> {
    let children: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        _ => return Vec::new(),
    };

    children
        .into_iter()
        .flat_map(|child| match child {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        })
        .filter(|item| item.is_object())
        .collect()
}

/// Exact non-negative integer id. Numeric strings parse as `u64` directly;
/// integral floats are accepted only while they fit.
fn unit_id(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64().or_else(|| integral_id(n.as_f64()?)),
        Value::String(s) => id_from_text(s),
        _ => None,
    }
}

fn id_from_text(text: &str) -> Option<u64> {
    let text = text.trim();
    text.parse::<u64>()
        .ok()
        .or_else(|| integral_id(text.parse::<f64>().ok()?))
}

fn integral_id(float: f64) -> Option<u64> {
    // 2^64; every f64 below it converts without saturating
    const LIMIT: f64 = 18_446_744_073_709_551_616.0;
    if float.is_finite() && float >= 0.0 && float < LIMIT && float.fract() == 0.0 {
        Some(float as u64)
    } else {
        None
    }
}

/// Lenient numeric coercion: numbers and numeric strings parse, blank strings
/// and null count as zero, everything else becomes NaN.
pub fn numberify(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::Null) => 0.0,
        Some(Value::String(s)) if s.trim().is_empty() => 0.0,
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        Some(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => f64::NAN,
    }
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Unwrap a "{a,b,c}" encoded list. Empty or too-short encodings yield an
/// empty list.
pub fn decode_list(encoded: &str, strip_quotes: bool) -> Vec<String> {
    let mut chars = encoded.chars();
    chars.next();
    chars.next_back();
    let inner = chars.as_str();

    if inner.is_empty() {
        return Vec::new();
    }

    let inner = if strip_quotes {
        inner.replace('"', "")
    } else {
        inner.to_string()
    };

    inner.split(',').map(str::to_string).collect()
}

fn map_products(item: &Value) -> Vec<UnitProduct> {
    let ids = decode_list(&text(item.get("product_ids")), false);
    let symbols = decode_list(&text(item.get("product_symbols")), true);
    let names = decode_list(&text(item.get("product_names")), true);

    ids.iter()
        .enumerate()
        .filter_map(|(i, raw_id)| match raw_id.trim().parse::<u64>() {
            Ok(id) => Some(UnitProduct {
                id,
                symbol: symbols.get(i).cloned(),
                name: names.get(i).cloned(),
            }),
            Err(_) => {
                warn!(product_id = %raw_id, "skipping product with invalid id");
                None
            }
        })
        .collect()
}

/// Indicators of the first mapping key numerically equal to the unit id
fn map_indicators(unit_id: u64, indicators: &Value) -> Vec<UnitIndicator> {
    let Value::Object(map) = indicators else {
        return Vec::new();
    };

    map.iter()
        .find(|(key, _)| id_from_text(key) == Some(unit_id))
        .map(|(_, group)| {
            flatten_groups(group)
                .into_iter()
                .map(|item| UnitIndicator {
                    id: numberify(item.get("id")),
                    kind: text(item.get("kind")),
                    name: text(item.get("name")),
                })
                .collect()
        })
        .unwrap_or_default()
}
