pub mod parse;
pub mod types;

pub use parse::{load_units_file, parse_units_json, parse_units_response, UnitsResponse};
pub use types::{UnitIndicator, UnitProduct, UnitRecord, SHOP_CLASS_KIND};

use std::collections::HashMap;

/// Units joined by id. On duplicate ids the first record wins.
#[derive(Debug, Clone, Default)]
pub struct UnitDirectory {
    units: Vec<UnitRecord>,
    by_id: HashMap<u64, usize>,
}

impl UnitDirectory {
    pub fn new(units: Vec<UnitRecord>) -> Self {
        let mut by_id = HashMap::new();
        for (idx, unit) in units.iter().enumerate() {
            by_id.entry(unit.id).or_insert(idx);
        }
        Self { units, by_id }
    }

    pub fn get(&self, id: u64) -> Option<&UnitRecord> {
        self.by_id.get(&id).map(|&idx| &self.units[idx])
    }

    pub fn units(&self) -> &[UnitRecord] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::types::sample_unit;
    use super::*;

    #[test]
    fn test_directory_first_duplicate_wins() {
        let mut first = sample_unit(1, "shop");
        first.name = "First".to_string();
        let mut second = sample_unit(1, "mine");
        second.name = "Second".to_string();

        let dir = UnitDirectory::new(vec![first, second, sample_unit(2, "shop")]);
        assert_eq!(dir.get(1).unwrap().name, "First");
        assert!(dir.get(2).is_some());
        assert!(dir.get(3).is_none());
        assert_eq!(dir.len(), 3);
    }
}
