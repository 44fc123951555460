/// Unit class kind that makes a unit eligible for price recalculation
pub const SHOP_CLASS_KIND: &str = "shop";

/// One product a unit deals in.
///
/// `symbol` and `name` come from separately encoded lists and may be missing
/// when the lists disagree in length.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitProduct {
    pub id: u64,
    pub symbol: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitIndicator {
    pub id: f64,
    pub kind: String,
    pub name: String,
}

/// Normalized unit record. Numeric fields are NaN when the server sent
/// something non-numeric or left them out.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitRecord {
    pub id: u64,
    pub name: String,
    pub city_symbol: String,
    pub city_name: String,
    pub country_symbol: String,
    pub country_name: String,
    pub region_name: String,
    pub unit_type_id: f64,
    pub unit_type_symbol: String,
    pub unit_type_name: String,
    pub size: f64,
    pub labor_max: f64,
    pub equipment_max: f64,
    pub square: f64,
    pub produce_name: String,
    pub class_id: f64,
    pub class_name: String,
    pub class_kind: String,
    pub productivity: f64,
    pub notice: String,
    pub market_status: String,
    pub time_to_build: f64,
    pub office_sort: f64,
    pub products: Vec<UnitProduct>,
    pub indicators: Vec<UnitIndicator>,
}

impl UnitRecord {
    pub fn is_shop(&self) -> bool {
        self.class_kind == SHOP_CLASS_KIND
    }

    /// Product labels as shown in the listing (name, falling back to symbol)
    pub fn product_labels(&self) -> Vec<String> {
        self.products
            .iter()
            .filter_map(|p| p.name.clone().or_else(|| p.symbol.clone()))
            .collect()
    }

    /// Size formatted the way the listing shows it; empty when unknown
    pub fn size_text(&self) -> String {
        if self.size.is_finite() {
            format!("{}", self.size)
        } else {
            String::new()
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_unit(id: u64, class_kind: &str) -> UnitRecord {
    UnitRecord {
        id,
        name: format!("Unit {}", id),
        city_symbol: "kyiv".to_string(),
        city_name: "Kyiv".to_string(),
        country_symbol: "ua".to_string(),
        country_name: "Ukraine".to_string(),
        region_name: "Kyiv region".to_string(),
        unit_type_id: 1.0,
        unit_type_symbol: "shop".to_string(),
        unit_type_name: "Shop".to_string(),
        size: 3.0,
        labor_max: 100.0,
        equipment_max: 0.0,
        square: 500.0,
        produce_name: String::new(),
        class_id: 1.0,
        class_name: "Trade".to_string(),
        class_kind: class_kind.to_string(),
        productivity: 0.9,
        notice: String::new(),
        market_status: "ok".to_string(),
        time_to_build: 0.0,
        office_sort: 0.0,
        products: vec![],
        indicators: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_shop() {
        assert!(sample_unit(1, "shop").is_shop());
        assert!(!sample_unit(2, "mine").is_shop());
    }

    #[test]
    fn test_product_labels_fall_back_to_symbol() {
        let mut unit = sample_unit(1, "shop");
        unit.products = vec![
            UnitProduct {
                id: 1,
                symbol: Some("tools".into()),
                name: Some("Tools".into()),
            },
            UnitProduct {
                id: 2,
                symbol: Some("diesel".into()),
                name: None,
            },
            UnitProduct {
                id: 3,
                symbol: None,
                name: None,
            },
        ];
        assert_eq!(unit.product_labels(), vec!["Tools", "diesel"]);
    }

    #[test]
    fn test_size_text_hides_nan() {
        let mut unit = sample_unit(1, "shop");
        assert_eq!(unit.size_text(), "3");
        unit.size = f64::NAN;
        assert_eq!(unit.size_text(), "");
    }
}
