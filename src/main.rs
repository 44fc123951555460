use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use unit_manager::api::{ApiClient, HttpPriceUpdater};
use unit_manager::config::Config;
use unit_manager::context::PageContext;
use unit_manager::filter::{FilterEngine, FilterField};
use unit_manager::output;
use unit_manager::pricing::{self, BatchOptions, PriceEngine};
use unit_manager::status::ConsoleStatus;
use unit_manager::store::{get_store_path, FileStore, SettingsStore};
use unit_manager::table::{RowAccessor, UnitTable};
use unit_manager::units::{self, UnitDirectory, UnitRecord};

const EXIT_SUCCESS: i32 = 0;
const EXIT_FAILURE: i32 = 1;
const EXIT_NETWORK: i32 = 2;
const EXIT_CONFIG: i32 = 4;

#[derive(Subcommand, Debug)]
enum FilterAction {
    /// Show the saved filters
    Show,
    /// Set one filter (id, city, name, size, products)
    Set {
        field: FilterField,
        /// Filter text; comma separated terms for products (e.g. tools,diesel)
        #[arg(default_value = "")]
        value: String,
    },
    /// Clear all filters
    Reset,
}

#[derive(Subcommand, Debug)]
enum PriceAction {
    /// List pricing strategies and minimum price multipliers
    Choices,
    /// Choose the strategy and/or minimum price multiplier for a shop
    Set {
        unit_id: u64,
        #[arg(short, long)]
        strategy: Option<String>,
        #[arg(short, long)]
        multiplier: Option<String>,
    },
    /// Recalculate prices of every visible shop
    Run {
        /// Compute prices without sending them
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List units passing the saved filters (default if no subcommand)
    List,
    /// Manage unit list filters
    Filter {
        #[command(subcommand)]
        action: FilterAction,
    },
    /// Pricing strategies and bulk price updates
    Price {
        #[command(subcommand)]
        action: PriceAction,
    },
}

#[derive(Parser, Debug)]
#[command(name = "unit-manager")]
#[command(about = "Filter unit listings and bulk-update shop prices", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (defaults to ~/.config/unit-manager/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Units response JSON file (overrides units_file from config)
    #[arg(short, long, global = true)]
    units: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn load_units(
    cli_units: Option<PathBuf>,
    config: &Config,
) -> Result<Vec<UnitRecord>, (i32, String)> {
    if let Some(path) = cli_units.or_else(|| config.units_file.clone()) {
        return units::load_units_file(&path).map_err(|e| (EXIT_CONFIG, format!("{:#}", e)));
    }

    let Some(ref api) = config.api else {
        return Err((
            EXIT_CONFIG,
            "No units source: pass --units or set units_file or api in config".to_string(),
        ));
    };

    let client = ApiClient::new(api).map_err(|e| (EXIT_NETWORK, format!("{:#}", e)))?;
    client
        .fetch_units()
        .await
        .map_err(|e| (EXIT_NETWORK, format!("Failed to fetch units: {:#}", e)))
}

/// Canonical selector text for a multiplier from the catalog
fn parse_multiplier(text: &str) -> Option<String> {
    let value: f64 = text.trim().parse().ok()?;
    pricing::MIN_PRICE_MULTIPLIERS
        .iter()
        .find(|m| (**m - value).abs() < f64::EPSILON)
        .map(|m| pricing::format_multiplier(*m))
}

fn fail(code: i32, message: impl std::fmt::Display) -> ! {
    eprintln!("{}", message);
    std::process::exit(code);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let command = cli.command.unwrap_or(Commands::List);
    let start_time = Instant::now();
    let use_colors = output::should_use_colors();

    // Load config
    let config_path = cli.config.map(PathBuf::from);
    let config = match unit_manager::config::load_config(config_path) {
        Ok(c) => c,
        Err(e) => fail(EXIT_CONFIG, format!("Config error: {:#}", e)),
    };

    if let Err(errors) = unit_manager::config::validate_config(&config) {
        eprintln!("Config errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        std::process::exit(EXIT_CONFIG);
    }

    // Nothing else needed to list choices
    if let Commands::Price {
        action: PriceAction::Choices,
    } = command
    {
        println!("{}", output::format_choices(pricing::catalog(), use_colors));
        std::process::exit(EXIT_SUCCESS);
    }

    let ctx = PageContext::new(config.tenant_id.clone(), config.page_type.clone());
    let store_path = config.store_path.clone().unwrap_or_else(get_store_path);
    let store: Arc<dyn SettingsStore> = Arc::new(FileStore::new(store_path));
    let sink = Arc::new(ConsoleStatus::new(std::io::stderr().is_terminal()));
    let batch_options: BatchOptions = config.pricing.batch_options();

    let records = match load_units(cli.units, &config).await {
        Ok(records) => records,
        Err((code, message)) => fail(code, message),
    };
    let directory = UnitDirectory::new(records);
    tracing::debug!(units = directory.len(), "units loaded");

    let mut table = UnitTable::from_units(directory.units());
    let mut filters = FilterEngine::new(&ctx, store.clone());
    let mut prices = PriceEngine::new(&ctx, store.clone(), sink, batch_options);

    prices.bind_selectors(&mut table, &directory);
    if let Err(e) = filters.restore(&mut table) {
        fail(EXIT_FAILURE, e);
    }
    if let Err(e) = prices.restore_settings(&mut table) {
        fail(EXIT_FAILURE, e);
    }

    match command {
        Commands::List => {
            println!("{}", output::format_unit_table(table.visible_rows(), use_colors));
        }
        Commands::Filter { action } => {
            let result = match action {
                FilterAction::Show => {
                    println!("{}", output::format_filters(filters.state()));
                    Ok(table.visible_rows().count())
                }
                FilterAction::Set { field, value } => {
                    table.set_filter_input(field, &value);
                    filters.update_filter(&mut table, field, &value)
                }
                FilterAction::Reset => filters.reset_filters(&mut table),
            };
            match result {
                Ok(shown) => eprintln!("{} of {} units visible", shown, directory.len()),
                Err(e) => fail(EXIT_FAILURE, e),
            }
        }
        Commands::Price { action } => match action {
            PriceAction::Choices => unreachable!("handled before loading units"),
            PriceAction::Set {
                unit_id,
                strategy,
                multiplier,
            } => {
                if strategy.is_none() && multiplier.is_none() {
                    fail(EXIT_CONFIG, "Nothing to set: pass --strategy and/or --multiplier");
                }

                let Some(row) = table.find_unit_row(unit_id) else {
                    fail(EXIT_CONFIG, format!("Unit {} is not in the listing", unit_id));
                };
                if !directory.get(unit_id).is_some_and(|u| u.is_shop()) {
                    fail(
                        EXIT_CONFIG,
                        format!("Unit {} is not a shop; prices apply to shops only", unit_id),
                    );
                }

                if let Some(label) = strategy {
                    if pricing::find_strategy(&label).is_none() {
                        fail(
                            EXIT_CONFIG,
                            format!(
                                "Unknown strategy '{}'. Run `unit-manager price choices` to list them.",
                                label
                            ),
                        );
                    }
                    if let Err(e) = prices.on_strategy_selected(&mut table, row, &label) {
                        fail(EXIT_FAILURE, e);
                    }
                }
                if let Some(text) = multiplier {
                    let Some(canonical) = parse_multiplier(&text) else {
                        fail(EXIT_CONFIG, format!("Unknown multiplier '{}'", text));
                    };
                    if let Err(e) = prices.on_multiplier_selected(&mut table, row, &canonical) {
                        fail(EXIT_FAILURE, e);
                    }
                }

                if let Some(setting) = prices.settings().get(unit_id) {
                    println!(
                        "Unit {}: {} / min x{}",
                        unit_id, setting.price_choice, setting.min_price_choice
                    );
                }
            }
            PriceAction::Run { dry_run } => {
                let Some(ref api) = config.api else {
                    fail(EXIT_CONFIG, "Price updates need an api section in config");
                };
                let client = match ApiClient::new(api) {
                    Ok(c) => c,
                    Err(e) => fail(EXIT_NETWORK, format!("{:#}", e)),
                };
                let updater = HttpPriceUpdater::new(client, dry_run);

                let report = match prices.recalculate_all(&table, &directory, &updater).await {
                    Ok(report) => report,
                    Err(e) => fail(EXIT_FAILURE, e),
                };

                if dry_run {
                    println!("{}", output::format_planned_changes(&updater.planned()));
                }
                println!("{}", output::format_batch_report(&report, use_colors));

                if cli.verbose {
                    eprintln!("Finished in {:?}", start_time.elapsed());
                }
                if !report.failures.is_empty() {
                    std::process::exit(EXIT_NETWORK);
                }
            }
        },
    }

    std::process::exit(EXIT_SUCCESS);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_multiplier() {
        assert_eq!(parse_multiplier("1.10").as_deref(), Some("1.1"));
        assert_eq!(parse_multiplier("2").as_deref(), Some("2"));
        assert_eq!(parse_multiplier("3"), None);
        assert_eq!(parse_multiplier("abc"), None);
    }

    #[test]
    fn test_cli_parses_filter_set() {
        let cli =
            Cli::try_parse_from(["unit-manager", "filter", "set", "products", "tools,diesel"])
                .unwrap();
        match cli.command {
            Some(Commands::Filter {
                action: FilterAction::Set { field, value },
            }) => {
                assert_eq!(field, FilterField::Products);
                assert_eq!(value, "tools,diesel");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
