pub mod engine;
pub mod settings;
pub mod strategy;

pub use engine::{
    BatchOptions, BatchReport, PriceEngine, PriceJob, PriceUpdater, PricingError, UpdateFailure,
};
pub use settings::{ProductSetting, ProductSettings};
pub use strategy::{
    catalog, default_multiplier, default_strategy, find_strategy, format_multiplier,
    CalculationStrategy, ProductQuote, MIN_PRICE_MULTIPLIERS,
};
