use serde::{Deserialize, Serialize};

/// Market view of one product sold by a shop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductQuote {
    pub product_id: u64,
    /// What the shop paid per item
    pub purchase_price: f64,
    /// Average retail price in the shop's city
    pub local_price: f64,
    pub quality: f64,
    pub local_quality: f64,
    #[serde(default)]
    pub brand: f64,
    #[serde(default)]
    pub local_brand: f64,
    #[serde(default)]
    pub stock: f64,
}

/// A named pricing formula
pub struct CalculationStrategy {
    pub label: &'static str,
    pub description: &'static str,
    calculate: fn(&ProductQuote) -> f64,
}

impl std::fmt::Debug for CalculationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalculationStrategy")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl CalculationStrategy {
    /// Raw formula output; may be NaN or non-positive for incomplete quotes
    pub fn calculate(&self, quote: &ProductQuote) -> f64 {
        (self.calculate)(quote)
    }

    /// Price to set for a product.
    ///
    /// Falls back to the purchase price when the formula has no usable result,
    /// then raises the price to `purchase_price * multiplier`. Returns `None`
    /// when the quote has no usable price at all.
    pub fn target_price(&self, quote: &ProductQuote, multiplier: f64) -> Option<f64> {
        let raw = self.calculate(quote);
        let price = if usable(raw) {
            raw
        } else if usable(quote.purchase_price) {
            quote.purchase_price
        } else {
            return None;
        };

        let floor = quote.purchase_price * multiplier;
        let price = if floor.is_finite() { price.max(floor) } else { price };
        Some((price * 100.0).round() / 100.0)
    }
}

fn usable(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if usable(numerator) && usable(denominator) {
        numerator / denominator
    } else {
        1.0
    }
}

fn market(q: &ProductQuote) -> f64 {
    q.local_price
}

fn double_purchase(q: &ProductQuote) -> f64 {
    q.purchase_price * 2.0
}

fn purchase_markup(q: &ProductQuote) -> f64 {
    q.purchase_price * 1.3
}

fn quality_adjusted(q: &ProductQuote) -> f64 {
    q.local_price * ratio(q.quality, q.local_quality)
}

fn brand_adjusted(q: &ProductQuote) -> f64 {
    quality_adjusted(q) * ratio(1.0 + q.brand.max(0.0), 1.0 + q.local_brand.max(0.0))
}

fn zero_stock(q: &ProductQuote) -> f64 {
    q.purchase_price * 1.1
}

/// Strategy catalog. The first entry is the default.
pub static STRATEGIES: [CalculationStrategy; 6] = [
    CalculationStrategy {
        label: "Market",
        description: "price = local market price",
        calculate: market,
    },
    CalculationStrategy {
        label: "Purchase x2",
        description: "price = purchasePrice * 2",
        calculate: double_purchase,
    },
    CalculationStrategy {
        label: "Purchase +30%",
        description: "price = purchasePrice * 1.3",
        calculate: purchase_markup,
    },
    CalculationStrategy {
        label: "Quality",
        description: "price = localPrice * quality / localQuality",
        calculate: quality_adjusted,
    },
    CalculationStrategy {
        label: "Brand",
        description: "price = localPrice * quality / localQuality * (1 + brand) / (1 + localBrand)",
        calculate: brand_adjusted,
    },
    CalculationStrategy {
        label: "Zero stock",
        description: "price = purchasePrice * 1.1, sells off the remaining stock",
        calculate: zero_stock,
    },
];

/// Minimum-price multipliers; minPrice = purchasePrice * multiplier
pub const MIN_PRICE_MULTIPLIERS: [f64; 6] = [0.0, 1.0, 1.1, 1.4, 1.6, 2.0];

pub fn catalog() -> &'static [CalculationStrategy] {
    &STRATEGIES
}

pub fn default_strategy() -> &'static CalculationStrategy {
    &STRATEGIES[0]
}

pub fn find_strategy(label: &str) -> Option<&'static CalculationStrategy> {
    STRATEGIES.iter().find(|s| s.label == label)
}

pub fn default_multiplier() -> f64 {
    MIN_PRICE_MULTIPLIERS[0]
}

/// Multiplier as shown in the selector ("0", "1.1", "2")
pub fn format_multiplier(multiplier: f64) -> String {
    format!("{}", multiplier)
}

#[cfg(test)]
pub(crate) fn sample_quote() -> ProductQuote {
    ProductQuote {
        product_id: 1,
        purchase_price: 10.0,
        local_price: 18.0,
        quality: 3.0,
        local_quality: 2.0,
        brand: 1.0,
        local_brand: 0.0,
        stock: 50.0,
    }
}
