pub mod api;
pub mod config;
pub mod context;
pub mod filter;
pub mod output;
pub mod pricing;
pub mod status;
pub mod store;
pub mod table;
pub mod units;
