use serde::{Deserialize, Serialize};

/// Pricing choice a user made for one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSetting {
    pub unit_id: u64,
    /// Strategy label
    pub price_choice: String,
    /// Minimum-price multiplier as shown in the selector
    pub min_price_choice: String,
}

/// Settings keyed by unit id, at most one per unit. Entries are never
/// removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductSettings {
    entries: Vec<ProductSetting>,
}

impl ProductSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, unit_id: u64) -> Option<&ProductSetting> {
        self.entries.iter().find(|s| s.unit_id == unit_id)
    }

    /// Existing entry for the unit, or a new one built from the defaults
    pub fn entry(
        &mut self,
        unit_id: u64,
        default_price_choice: &str,
        default_min_price_choice: &str,
    ) -> &mut ProductSetting {
        let idx = match self.entries.iter().position(|s| s.unit_id == unit_id) {
            Some(idx) => idx,
            None => {
                self.entries.push(ProductSetting {
                    unit_id,
                    price_choice: default_price_choice.to_string(),
                    min_price_choice: default_min_price_choice.to_string(),
                });
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProductSetting> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creates_once() {
        let mut settings = ProductSettings::new();
        settings.entry(5, "Market", "0").price_choice = "Brand".to_string();
        settings.entry(5, "Market", "0").min_price_choice = "1.4".to_string();

        assert_eq!(settings.len(), 1);
        let setting = settings.get(5).unwrap();
        assert_eq!(setting.price_choice, "Brand");
        assert_eq!(setting.min_price_choice, "1.4");
    }

    #[test]
    fn test_wire_format_is_camel_case_list() {
        let mut settings = ProductSettings::new();
        settings.entry(7, "Market", "1.1");
        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(
            json,
            r#"[{"unitId":7,"priceChoice":"Market","minPriceChoice":"1.1"}]"#
        );

        let parsed: ProductSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, settings);
    }
}
