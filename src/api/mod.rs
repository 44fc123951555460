pub mod client;
pub mod updater;

pub use client::{ApiClient, PriceChange};
pub use updater::{plan_price_changes, HttpPriceUpdater};
