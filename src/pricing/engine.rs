use anyhow::anyhow;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::settings::ProductSettings;
use super::strategy::{
    default_multiplier, default_strategy, find_strategy, format_multiplier, CalculationStrategy,
};
use crate::context::{PageContext, PRICES_FEATURE};
use crate::status::{LogLevel, ProgressSink};
use crate::store::{restore_json, store_json, SettingsStore, StoreError};
use crate::table::RowAccessor;
use crate::units::{UnitDirectory, UnitRecord};

/// Pushes new prices for one unit to wherever prices live
pub trait PriceUpdater {
    fn update_price(
        &self,
        unit: &UnitRecord,
        strategy: &'static CalculationStrategy,
        multiplier: f64,
    ) -> impl Future<Output = anyhow::Result<()>>;
}

#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("a price recalculation is already running")]
    AlreadyRunning,
    #[error("row {0} does not show a unit id")]
    UnknownRow(usize),
    #[error("unit {0} is not a shop; prices apply to shops only")]
    NotAShop(u64),
    #[error("failed to persist price settings: {0}")]
    Persist(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Upper bound on updates in flight at once
    pub max_concurrent: usize,
    /// Per-unit deadline; `None` waits forever
    pub update_timeout: Option<Duration>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_concurrent: 8,
            update_timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateFailure {
    pub unit_id: u64,
    pub message: String,
}

/// Outcome of one recalculation batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failures: Vec<UpdateFailure>,
}

/// Resolved work for one row
#[derive(Debug, Clone)]
pub struct PriceJob<'a> {
    pub unit: &'a UnitRecord,
    pub strategy: &'static CalculationStrategy,
    pub multiplier: f64,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Bulk price recalculation over the visible shops of the listing, plus the
/// per-unit strategy and multiplier choices behind it.
pub struct PriceEngine {
    storage_key: String,
    store: Arc<dyn SettingsStore>,
    sink: Arc<dyn ProgressSink>,
    settings: ProductSettings,
    options: BatchOptions,
    in_flight: AtomicBool,
}

impl PriceEngine {
    pub fn new(
        ctx: &PageContext,
        store: Arc<dyn SettingsStore>,
        sink: Arc<dyn ProgressSink>,
        options: BatchOptions,
    ) -> Self {
        Self {
            storage_key: ctx.storage_key(PRICES_FEATURE),
            store,
            sink,
            settings: ProductSettings::new(),
            options,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &ProductSettings {
        &self.settings
    }

    /// Attach default selectors to every shop row
    pub fn bind_selectors<R: RowAccessor + ?Sized>(&self, rows: &mut R, units: &UnitDirectory) {
        let multiplier = format_multiplier(default_multiplier());
        for row in 0..rows.row_count() {
            let is_shop = rows
                .unit_id(row)
                .and_then(|id| units.get(id))
                .is_some_and(|unit| unit.is_shop());
            if is_shop {
                rows.bind_selectors(row, default_strategy().label, &multiplier);
            }
        }
    }

    /// Visible rows whose unit is a shop, in listing order
    pub fn eligible_rows<R: RowAccessor + ?Sized>(
        &self,
        rows: &R,
        units: &UnitDirectory,
    ) -> Vec<usize> {
        (0..rows.row_count())
            .filter(|&row| !rows.is_sentinel(row) && rows.is_visible(row))
            .filter(|&row| {
                rows.unit_id(row)
                    .and_then(|id| units.get(id))
                    .is_some_and(|unit| unit.is_shop())
            })
            .collect()
    }

    /// Strategy and multiplier for every eligible row. Unknown or missing
    /// selector values fall back to the catalog defaults.
    pub fn resolve_jobs<'a, R: RowAccessor + ?Sized>(
        &self,
        rows: &R,
        units: &'a UnitDirectory,
    ) -> Vec<PriceJob<'a>> {
        self.eligible_rows(rows, units)
            .into_iter()
            .filter_map(|row| {
                let unit = units.get(rows.unit_id(row)?)?;
                let strategy = rows
                    .strategy_choice(row)
                    .and_then(|label| find_strategy(&label))
                    .unwrap_or_else(default_strategy);
                let multiplier = rows
                    .multiplier_choice(row)
                    .and_then(|text| text.trim().parse::<f64>().ok())
                    .filter(|m| m.is_finite())
                    .unwrap_or_else(default_multiplier);
                Some(PriceJob {
                    unit,
                    strategy,
                    multiplier,
                })
            })
            .collect()
    }

    /// Recalculate prices of every eligible row.
    ///
    /// Updates run concurrently up to `max_concurrent`. Every row ticks the
    /// progress sink exactly once, failed or not, and failures are collected
    /// in the report. A second call while a batch is running is rejected.
    pub async fn recalculate_all<R, U>(
        &self,
        rows: &R,
        units: &UnitDirectory,
        updater: &U,
    ) -> Result<BatchReport, PricingError>
    where
        R: RowAccessor + ?Sized,
        U: PriceUpdater,
    {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("price recalculation requested while another batch is running");
            return Err(PricingError::AlreadyRunning);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let jobs = self.resolve_jobs(rows, units);
        let mut report = BatchReport {
            total: jobs.len(),
            ..Default::default()
        };

        self.sink.begin(jobs.len());
        self.sink.log("Updating prices...", LogLevel::Success);
        info!(units = jobs.len(), "starting price recalculation");

        let timeout = self.options.update_timeout;
        let mut results = stream::iter(jobs)
            .map(|job| async move {
                debug!(
                    unit_id = job.unit.id,
                    strategy = job.strategy.label,
                    multiplier = job.multiplier,
                    "updating unit prices"
                );
                let update = updater.update_price(job.unit, job.strategy, job.multiplier);
                let result = match timeout {
                    Some(limit) => match tokio::time::timeout(limit, update).await {
                        Ok(result) => result,
                        Err(_) => Err(anyhow!(
                            "timed out after {}",
                            humantime::format_duration(limit)
                        )),
                    },
                    None => update.await,
                };
                (job.unit.id, result)
            })
            .buffer_unordered(self.options.max_concurrent.max(1));

        while let Some((unit_id, result)) = results.next().await {
            match result {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    let message = format!("{:#}", e);
                    self.sink.log(
                        &format!("Unit {}: price update failed: {}", unit_id, message),
                        LogLevel::Error,
                    );
                    report.failures.push(UpdateFailure { unit_id, message });
                }
            }
            self.sink.tick();
        }

        if report.failures.is_empty() {
            self.sink
                .log(&format!("Updated prices of {} units", report.succeeded), LogLevel::Success);
        } else {
            self.sink.log(
                &format!(
                    "Updated prices of {} units, {} failed",
                    report.succeeded,
                    report.failures.len()
                ),
                LogLevel::Warning,
            );
        }
        info!(
            succeeded = report.succeeded,
            failed = report.failures.len(),
            "price recalculation finished"
        );

        Ok(report)
    }

    /// Record a strategy choice for the row's unit and persist all settings
    pub fn on_strategy_selected<R: RowAccessor + ?Sized>(
        &mut self,
        rows: &mut R,
        row: usize,
        label: &str,
    ) -> Result<(), PricingError> {
        let unit_id = Self::selectable_unit(rows, row)?;
        rows.set_strategy_choice(row, label);

        let default_min = format_multiplier(default_multiplier());
        self.settings
            .entry(unit_id, default_strategy().label, &default_min)
            .price_choice = label.to_string();
        self.save()
    }

    /// Record a minimum-price multiplier for the row's unit and persist all
    /// settings
    pub fn on_multiplier_selected<R: RowAccessor + ?Sized>(
        &mut self,
        rows: &mut R,
        row: usize,
        multiplier: &str,
    ) -> Result<(), PricingError> {
        let unit_id = Self::selectable_unit(rows, row)?;
        rows.set_multiplier_choice(row, multiplier);

        let default_min = format_multiplier(default_multiplier());
        self.settings
            .entry(unit_id, default_strategy().label, &default_min)
            .min_price_choice = multiplier.to_string();
        self.save()
    }

    /// Unit id of a row that carries pricing selectors
    fn selectable_unit<R: RowAccessor + ?Sized>(rows: &R, row: usize) -> Result<u64, PricingError> {
        let unit_id = rows.unit_id(row).ok_or(PricingError::UnknownRow(row))?;
        if rows.strategy_choice(row).is_none() {
            return Err(PricingError::NotAShop(unit_id));
        }
        Ok(unit_id)
    }

    /// Load persisted settings and push them into the matching rows'
    /// selectors. Returns how many rows were updated; settings for rows
    /// without selectors are kept but not applied.
    pub fn restore_settings<R: RowAccessor + ?Sized>(
        &mut self,
        rows: &mut R,
    ) -> Result<usize, PricingError> {
        let stored = restore_json::<ProductSettings>(self.store.as_ref(), &self.storage_key)?;
        let Some(entry) = stored else {
            return Ok(0);
        };
        self.settings = entry.data;

        let mut applied = 0;
        for setting in self.settings.iter() {
            let Some(row) = rows.find_unit_row(setting.unit_id) else {
                continue;
            };
            if rows.strategy_choice(row).is_some() {
                rows.set_strategy_choice(row, &setting.price_choice);
                rows.set_multiplier_choice(row, &setting.min_price_choice);
                applied += 1;
            }
        }

        debug!(stored = self.settings.len(), applied, "restored price settings");
        Ok(applied)
    }

    fn save(&self) -> Result<(), PricingError> {
        store_json(self.store.as_ref(), &self.storage_key, &self.settings, Utc::now())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::testing::RecordingSink;
    use crate::store::MemoryStore;
    use crate::table::UnitTable;
    use crate::units::types::sample_unit;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tokio::sync::Semaphore;

    #[derive(Default)]
    struct FakeUpdater {
        calls: Mutex<Vec<(u64, &'static str, f64)>>,
        fail_units: Vec<u64>,
        gate: Option<Arc<Semaphore>>,
    }

    impl PriceUpdater for FakeUpdater {
        async fn update_price(
            &self,
            unit: &UnitRecord,
            strategy: &'static CalculationStrategy,
            multiplier: f64,
        ) -> anyhow::Result<()> {
            if let Some(gate) = &self.gate {
                gate.acquire().await?.forget();
            }
            self.calls
                .lock()
                .unwrap()
                .push((unit.id, strategy.label, multiplier));
            if self.fail_units.contains(&unit.id) {
                anyhow::bail!("server rejected prices");
            }
            Ok(())
        }
    }

    /// Sleeps per update and records the most updates seen in flight at once
    #[derive(Default)]
    struct TrackingUpdater {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl PriceUpdater for TrackingUpdater {
        async fn update_price(
            &self,
            _unit: &UnitRecord,
            _strategy: &'static CalculationStrategy,
            _multiplier: f64,
        ) -> anyhow::Result<()> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn ctx() -> PageContext {
        PageContext::new("4521", "unit_list")
    }

    fn units() -> UnitDirectory {
        UnitDirectory::new(vec![
            sample_unit(1, "shop"),
            sample_unit(2, "mine"),
            sample_unit(3, "shop"),
            sample_unit(4, "shop"),
        ])
    }

    fn setup(
        store: Arc<dyn SettingsStore>,
    ) -> (PriceEngine, Arc<RecordingSink>, UnitTable, UnitDirectory) {
        let sink = Arc::new(RecordingSink::default());
        let engine = PriceEngine::new(&ctx(), store, sink.clone(), BatchOptions::default());
        let units = units();
        let mut table = UnitTable::from_units(units.units());
        engine.bind_selectors(&mut table, &units);
        (engine, sink, table, units)
    }

    #[test]
    fn test_eligible_rows_skip_hidden_and_non_shops() {
        let (engine, _, mut table, units) = setup(Arc::new(MemoryStore::new()));
        assert_eq!(engine.eligible_rows(&table, &units), vec![0, 2, 3]);

        table.set_visible(2, false);
        assert_eq!(engine.eligible_rows(&table, &units), vec![0, 3]);

        table.set_visible(1, true);
        assert!(!engine.eligible_rows(&table, &units).contains(&1));
    }

    #[test]
    fn test_selectors_bound_only_for_shops() {
        let (_, _, table, _) = setup(Arc::new(MemoryStore::new()));
        assert_eq!(table.strategy_choice(0).as_deref(), Some("Market"));
        assert_eq!(table.multiplier_choice(0).as_deref(), Some("0"));
        assert_eq!(table.strategy_choice(1), None);
    }

    #[test]
    fn test_resolve_jobs_falls_back_to_defaults() {
        let (engine, _, mut table, units) = setup(Arc::new(MemoryStore::new()));
        table.set_strategy_choice(0, "Brand");
        table.set_multiplier_choice(0, "1.6");
        table.set_strategy_choice(2, "No such strategy");
        table.set_multiplier_choice(2, "lots");

        let jobs = engine.resolve_jobs(&table, &units);
        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0].strategy.label, "Brand");
        assert_eq!(jobs[0].multiplier, 1.6);
        assert_eq!(jobs[1].unit.id, 3);
        assert_eq!(jobs[1].strategy.label, "Market");
        assert_eq!(jobs[1].multiplier, 0.0);
    }

    #[tokio::test]
    async fn test_recalculate_ticks_once_per_eligible_row() {
        let (engine, sink, table, units) = setup(Arc::new(MemoryStore::new()));
        let updater = FakeUpdater::default();

        let report = engine.recalculate_all(&table, &units, &updater).await.unwrap();

        assert_eq!(sink.total(), 3);
        assert_eq!(sink.ticks(), engine.eligible_rows(&table, &units).len());
        assert_eq!(report.total, 3);
        assert_eq!(report.succeeded, 3);
        assert!(report.failures.is_empty());

        let mut called: Vec<u64> = updater.calls.lock().unwrap().iter().map(|c| c.0).collect();
        called.sort();
        assert_eq!(called, vec![1, 3, 4]);
    }

    #[tokio::test]
    async fn test_failed_updates_are_reported_and_still_tick() {
        let (engine, sink, table, units) = setup(Arc::new(MemoryStore::new()));
        let updater = FakeUpdater {
            fail_units: vec![3],
            ..Default::default()
        };

        let report = engine.recalculate_all(&table, &units, &updater).await.unwrap();

        assert_eq!(sink.ticks(), 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].unit_id, 3);
        assert!(report.failures[0].message.contains("server rejected prices"));
        assert_eq!(sink.messages_at(LogLevel::Error).len(), 1);
    }

    #[tokio::test]
    async fn test_update_timeout_counts_as_failure() {
        let sink = Arc::new(RecordingSink::default());
        let engine = PriceEngine::new(
            &ctx(),
            Arc::new(MemoryStore::new()),
            sink.clone(),
            BatchOptions {
                max_concurrent: 2,
                update_timeout: Some(Duration::from_millis(20)),
            },
        );
        let units = UnitDirectory::new(vec![sample_unit(1, "shop")]);
        let table = UnitTable::from_units(units.units());
        let updater = FakeUpdater {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Default::default()
        };

        let report = engine.recalculate_all(&table, &units, &updater).await.unwrap();
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].message.contains("timed out"));
        assert_eq!(sink.ticks(), 1);
    }

    #[tokio::test]
    async fn test_updates_in_flight_never_exceed_limit() {
        let sink = Arc::new(RecordingSink::default());
        let engine = PriceEngine::new(
            &ctx(),
            Arc::new(MemoryStore::new()),
            sink.clone(),
            BatchOptions {
                max_concurrent: 3,
                update_timeout: None,
            },
        );
        let units = UnitDirectory::new((1..=10).map(|id| sample_unit(id, "shop")).collect());
        let table = UnitTable::from_units(units.units());
        let updater = TrackingUpdater::default();

        let report = engine.recalculate_all(&table, &units, &updater).await.unwrap();

        assert_eq!(report.succeeded, 10);
        assert_eq!(sink.ticks(), 10);
        let peak = updater.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak in flight was {}", peak);
        assert!(peak > 1);
    }

    #[tokio::test]
    async fn test_second_batch_rejected_while_running() {
        let (engine, sink, table, units) = setup(Arc::new(MemoryStore::new()));
        let gate = Arc::new(Semaphore::new(0));
        let updater = FakeUpdater {
            gate: Some(gate.clone()),
            ..Default::default()
        };

        let first = engine.recalculate_all(&table, &units, &updater);
        tokio::pin!(first);
        assert!(futures::poll!(first.as_mut()).is_pending());

        let second = engine.recalculate_all(&table, &units, &updater).await;
        assert!(matches!(second, Err(PricingError::AlreadyRunning)));

        gate.add_permits(3);
        let report = first.await.unwrap();
        assert_eq!(report.succeeded, 3);
        assert_eq!(sink.ticks(), 3);

        // guard released once the batch is done
        gate.add_permits(3);
        assert!(engine.recalculate_all(&table, &units, &updater).await.is_ok());
    }

    #[test]
    fn test_strategy_selection_survives_reload() {
        let store: Arc<dyn SettingsStore> = Arc::new(MemoryStore::new());
        let (mut engine, _, mut table, _) = setup(store.clone());
        engine.on_strategy_selected(&mut table, 2, "Quality").unwrap();

        let setting = engine.settings().get(3).unwrap();
        assert_eq!(setting.price_choice, "Quality");
        assert_eq!(setting.min_price_choice, "0");

        let (mut reloaded, _, mut reloaded_table, _) = setup(store);
        assert_eq!(reloaded_table.strategy_choice(2).as_deref(), Some("Market"));
        let applied = reloaded.restore_settings(&mut reloaded_table).unwrap();
        assert_eq!(applied, 1);
        assert_eq!(reloaded_table.strategy_choice(2).as_deref(), Some("Quality"));
        assert_eq!(reloaded_table.multiplier_choice(2).as_deref(), Some("0"));
    }

    #[test]
    fn test_multiplier_selection_defaults_strategy() {
        let (mut engine, _, mut table, _) = setup(Arc::new(MemoryStore::new()));
        engine.on_multiplier_selected(&mut table, 0, "1.4").unwrap();
        engine.on_multiplier_selected(&mut table, 0, "2").unwrap();
        engine.on_strategy_selected(&mut table, 0, "Brand").unwrap();

        assert_eq!(engine.settings().len(), 1);
        let setting = engine.settings().get(1).unwrap();
        assert_eq!(setting.price_choice, "Brand");
        assert_eq!(setting.min_price_choice, "2");
    }

    #[test]
    fn test_selection_on_sentinel_row_is_rejected() {
        let (mut engine, _, mut table, _) = setup(Arc::new(MemoryStore::new()));
        let sentinel = table.row_count() - 1;
        assert!(matches!(
            engine.on_strategy_selected(&mut table, sentinel, "Market"),
            Err(PricingError::UnknownRow(_))
        ));
        assert!(engine.settings().is_empty());
    }

    #[test]
    fn test_selection_on_non_shop_row_is_rejected() {
        let (mut engine, _, mut table, _) = setup(Arc::new(MemoryStore::new()));
        assert!(matches!(
            engine.on_strategy_selected(&mut table, 1, "Brand"),
            Err(PricingError::NotAShop(2))
        ));
        assert!(matches!(
            engine.on_multiplier_selected(&mut table, 1, "1.4"),
            Err(PricingError::NotAShop(2))
        ));
        assert!(engine.settings().is_empty());
        assert_eq!(table.strategy_choice(1), None);
    }

    #[test]
    fn test_restore_skips_rows_without_selectors() {
        let store: Arc<dyn SettingsStore> = Arc::new(MemoryStore::new());
        let mut stored = ProductSettings::new();
        stored.entry(2, "Brand", "0");
        stored.entry(3, "Quality", "1.1");
        let key = ctx().storage_key(PRICES_FEATURE);
        store_json(store.as_ref(), &key, &stored, Utc::now()).unwrap();

        let (mut engine, _, mut table, _) = setup(store);
        assert_eq!(engine.restore_settings(&mut table).unwrap(), 1);
        assert_eq!(table.strategy_choice(1), None);
        assert_eq!(table.strategy_choice(2).as_deref(), Some("Quality"));
        assert_eq!(engine.settings().len(), 2);
    }

    #[test]
    fn test_restore_without_settings_leaves_rows_untouched() {
        let (mut engine, _, mut table, _) = setup(Arc::new(MemoryStore::new()));
        table.set_strategy_choice(0, "Brand");
        assert_eq!(engine.restore_settings(&mut table).unwrap(), 0);
        assert_eq!(table.strategy_choice(0).as_deref(), Some("Brand"));
    }
}
