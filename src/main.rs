use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use meter_watch::config::{Config, ConfigOverrides};
use meter_watch::extract::{PortalExtractor, SnapshotExtractor, UsageExtractor};
use meter_watch::history::{HistoryStore, JsonHistoryStore};
use meter_watch::notify::format::test_message;
use meter_watch::notify::{dispatcher_from_config, ChannelResult, Language};
use meter_watch::output::csv::{deliveries_to_csv, history_to_csv};
use meter_watch::output::json::render_json;
use meter_watch::output::table::{render_delivery_table, render_history_table, render_report};
use meter_watch::record::CustomerIdentity;
use meter_watch::run::{RunCoordinator, RunReport};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "meter-watch",
    about = "Announces new monthly usage records from a prepaid-meter portal"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long = "consumer-id")]
    consumer_id: Option<String>,
    #[arg(long = "history")]
    history_path: Option<String>,
    #[arg(short, long)]
    language: Option<Language>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one check against the portal (or a saved snapshot).
    Check {
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Run checks back to back; `--iterations 0` keeps going until interrupted.
    Watch {
        #[arg(long, default_value_t = 3600)]
        interval_secs: u64,
        #[arg(long, default_value_t = 1)]
        iterations: u32,
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Show the records already announced.
    History {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Send a test message through every configured channel.
    NotifyTest,
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        consumer_id: cli.consumer_id.clone(),
        history_path: cli.history_path.clone(),
        language: cli.language,
    });

    match &cli.command {
        Commands::Check { snapshot } => {
            let coordinator = build_coordinator(&config, snapshot.as_deref())?;
            let report = coordinator.run_once().await;
            print_report(&report, cli.output)?;
        }
        Commands::Watch {
            interval_secs,
            iterations,
            snapshot,
        } => {
            let coordinator = build_coordinator(&config, snapshot.as_deref())?;
            run_watch_loop(&coordinator, *interval_secs, *iterations, cli.output).await?;
        }
        Commands::History { limit } => {
            let store = JsonHistoryStore::new(config.resolved_history_path());
            let history = store.load();
            let skip = history.len().saturating_sub(*limit);
            let rows = &history.rows()[skip..];
            match cli.output {
                OutputFormat::Table => {
                    println!("{}", render_history_table(rows));
                    println!("{} of {} records", rows.len(), history.len());
                }
                OutputFormat::Json => println!("{}", render_json(rows)?),
                OutputFormat::Csv => print!("{}", history_to_csv(rows)?),
            }
        }
        Commands::NotifyTest => {
            let dispatcher = dispatcher_from_config(&config.notify);
            if dispatcher.is_empty() {
                warn!("no notification channel is configured");
            }
            let identity = CustomerIdentity::new("meter-watch", config.customer.consumer_id.clone());
            let message = test_message(&identity, config.notify.language);
            let results = dispatcher.dispatch(&message).await;
            print_deliveries(&results, cli.output)?;
        }
        Commands::Config { init, show } => {
            handle_config_command(*init, *show, &config, &config_path)?;
        }
    }

    Ok(())
}

fn build_coordinator(config: &Config, snapshot: Option<&Path>) -> Result<RunCoordinator> {
    let extractor: Box<dyn UsageExtractor> = match snapshot {
        Some(path) => Box::new(SnapshotExtractor::new(path)),
        None => Box::new(PortalExtractor::new(
            &config.portal,
            config.customer.consumer_id.clone(),
        )?),
    };
    let history_path = config.resolved_history_path();
    info!(history = %history_path.display(), source = extractor.name(), "run configured");
    Ok(RunCoordinator::new(
        extractor,
        Box::new(JsonHistoryStore::new(history_path)),
        dispatcher_from_config(&config.notify),
        config.notify.language,
    ))
}

async fn run_watch_loop(
    coordinator: &RunCoordinator,
    interval_secs: u64,
    iterations: u32,
    output: OutputFormat,
) -> Result<()> {
    let interval = Duration::from_secs(interval_secs.max(1));
    let mut i: u32 = 0;
    loop {
        i = i.saturating_add(1);
        info!("watch iteration {i}");
        let report = coordinator.run_once().await;
        print_report(&report, output)?;

        if iterations != 0 && i >= iterations {
            break;
        }
        tokio::time::sleep(interval).await;
    }
    Ok(())
}

fn handle_config_command(init: bool, show: bool, config: &Config, config_path: &Path) -> Result<()> {
    if init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if show || !init {
        println!("{}", render_json(&config.redacted())?);
    }
    Ok(())
}

fn print_report(report: &RunReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_report(report)),
        OutputFormat::Json => println!("{}", render_json(report)?),
        OutputFormat::Csv => print!("{}", deliveries_to_csv(&report.deliveries)?),
    }
    Ok(())
}

fn print_deliveries(results: &[ChannelResult], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_delivery_table(results)),
        OutputFormat::Json => println!("{}", render_json(results)?),
        OutputFormat::Csv => print!("{}", deliveries_to_csv(results)?),
    }
    Ok(())
}
