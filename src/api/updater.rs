use anyhow::Result;
use std::sync::Mutex;
use tracing::{debug, warn};

use super::client::{ApiClient, PriceChange};
use crate::pricing::{CalculationStrategy, PriceUpdater, ProductQuote};
use crate::units::UnitRecord;

/// Price changes for a unit's quotes; products without a usable price are
/// left alone
pub fn plan_price_changes(
    unit_id: u64,
    quotes: &[ProductQuote],
    strategy: &CalculationStrategy,
    multiplier: f64,
) -> Vec<PriceChange> {
    quotes
        .iter()
        .filter_map(|quote| match strategy.target_price(quote, multiplier) {
            Some(price) => Some(PriceChange {
                product_id: quote.product_id,
                price,
            }),
            None => {
                warn!(
                    unit_id,
                    product_id = quote.product_id,
                    "no usable price for product, skipping"
                );
                None
            }
        })
        .collect()
}

/// Fetches quotes, prices them with the chosen strategy, and posts the result.
/// In dry-run mode the planned changes are only recorded.
pub struct HttpPriceUpdater {
    client: ApiClient,
    dry_run: bool,
    planned: Mutex<Vec<(u64, PriceChange)>>,
}

impl HttpPriceUpdater {
    pub fn new(client: ApiClient, dry_run: bool) -> Self {
        Self {
            client,
            dry_run,
            planned: Mutex::new(Vec::new()),
        }
    }

    /// Changes recorded so far as (unit id, change), sorted by unit
    pub fn planned(&self) -> Vec<(u64, PriceChange)> {
        let mut planned = self
            .planned
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        planned.sort_by_key(|(unit_id, change)| (*unit_id, change.product_id));
        planned
    }
}

impl PriceUpdater for HttpPriceUpdater {
    async fn update_price(
        &self,
        unit: &UnitRecord,
        strategy: &'static CalculationStrategy,
        multiplier: f64,
    ) -> Result<()> {
        let quotes = self.client.fetch_quotes(unit.id).await?;
        let changes = plan_price_changes(unit.id, &quotes, strategy, multiplier);

        {
            let mut planned = self.planned.lock().unwrap_or_else(|e| e.into_inner());
            planned.extend(changes.iter().cloned().map(|c| (unit.id, c)));
        }

        if changes.is_empty() || self.dry_run {
            debug!(
                unit_id = unit.id,
                changes = changes.len(),
                dry_run = self.dry_run,
                "prices not sent"
            );
            return Ok(());
        }

        self.client.set_prices(unit.id, &changes).await
    }
}
