//! `pdufa`: build and inspect the PDUFA decision ledger.

mod config;
mod display;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use pdufa_core::config::resolve_date_expr;
use pdufa_core::{LedgerStore, RawEvent, RunConfig, RunStats, run, run_with_store};
use pdufa_feed::{FeedClient, parse_calendar_str};
use pdufa_store::{CsvLedger, export_parquet};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pdufa", version, about = "PDUFA calendar extraction and ledger")]
struct Cli {
    /// Calendar config (YAML).
    #[arg(long, global = true, env = "PDUFA_CONFIG", default_value = "config/calendars.yaml")]
    config: PathBuf,

    /// Ledger CSV file.
    #[arg(long, global = true, env = "PDUFA_LEDGER", default_value = "data/pdufa_master.csv")]
    ledger: PathBuf,

    /// Debug logging (also enabled by `debug: true` in the config).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch feeds, extract and merge into the ledger
    Run(RunArgs),
    /// Print ledger rows
    Show(ShowArgs),
    /// Load and validate the config, then print it
    CheckConfig,
}

#[derive(Args)]
struct RunArgs {
    /// Read a local .ics file instead of fetching the configured feeds (repeatable)
    #[arg(long = "ics", value_name = "FILE")]
    ics: Vec<PathBuf>,

    /// Read events from a JSON array of raw events instead of fetching feeds
    #[arg(long, value_name = "FILE")]
    events: Option<PathBuf>,

    /// Also write the merged ledger as a Parquet file
    #[arg(long, value_name = "PATH")]
    parquet: Option<PathBuf>,

    /// Merge and report, but leave the ledger file untouched
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct ShowArgs {
    /// Only rows with this ticker
    #[arg(long)]
    ticker: Option<String>,

    /// Only rows on or after this date (YYYY-MM-DD or @today[+-N{d,w,m,y}])
    #[arg(long)]
    from: Option<String>,

    /// Vertical cards instead of a table
    #[arg(long)]
    card: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.command {
        Commands::Show(_) => None,
        _ => Some(config::load(&cli.config)?),
    };
    init_tracing(cli.verbose || config.as_ref().is_some_and(|c| c.debug));

    let store = CsvLedger::new(&cli.ledger);
    match (cli.command, config) {
        (Commands::Run(args), Some(config)) => cmd_run(&store, &config, args),
        (Commands::Show(args), _) => cmd_show(&store, args),
        (Commands::CheckConfig, Some(config)) => cmd_check_config(&config),
        _ => bail!("config was not loaded"),
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

// ── Commands ──

fn cmd_run(store: &CsvLedger, config: &RunConfig, args: RunArgs) -> Result<()> {
    let events = collect_events(config, &args)?;
    let run_at = Utc::now();

    let stats = if args.dry_run {
        let existing = store.load().context("loading ledger")?;
        let outcome = run(existing, &events, config, run_at)?;
        if let Some(path) = &args.parquet {
            export_parquet(&outcome.rows, path)?;
        }
        outcome.stats
    } else {
        let stats = run_with_store(store, &events, config, run_at)
            .with_context(|| format!("updating ledger {}", store.path().display()))?;
        if let Some(path) = &args.parquet {
            let rows = store.load().context("reloading ledger")?;
            export_parquet(&rows, path)?;
        }
        stats
    };

    print_summary(&stats, config);
    Ok(())
}

fn cmd_show(store: &CsvLedger, args: ShowArgs) -> Result<()> {
    let mut rows = store
        .load()
        .with_context(|| format!("loading ledger {}", store.path().display()))?;

    if let Some(ticker) = &args.ticker {
        rows.retain(|r| r.ticker.eq_ignore_ascii_case(ticker.trim()));
    }
    if let Some(expr) = &args.from {
        let from: NaiveDate = resolve_date_expr(expr.trim(), Local::now().date_naive())?;
        rows.retain(|r| r.date_pdufa >= from);
    }

    if rows.is_empty() {
        println!("No matching rows.");
        return Ok(());
    }
    if args.card {
        display::print_cards(&rows)
    } else {
        display::print_table(&rows)
    }
}

fn cmd_check_config(config: &RunConfig) -> Result<()> {
    let tz = config.resolve_timezone();
    let window = config.date_window(Utc::now().with_timezone(&tz).date_naive())?;
    println!("feeds:           {}", config.feeds.len());
    for feed in &config.feeds {
        println!("  - {feed}");
    }
    println!("timezone:        {tz}");
    println!("datetime_policy: {:?}", config.datetime_policy);
    println!("min_date:        {}", fmt_bound(window.min));
    println!("max_date:        {}", fmt_bound(window.max));
    println!("debug:           {}", config.debug);
    Ok(())
}

// ── Helpers ──

/// Local files when given, otherwise the configured feeds over HTTP.
fn collect_events(config: &RunConfig, args: &RunArgs) -> Result<Vec<RawEvent>> {
    if !args.ics.is_empty() || args.events.is_some() {
        let mut events = Vec::new();
        for path in &args.ics {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let label = path.display().to_string();
            events.extend(parse_calendar_str(&text, &label)?);
        }
        if let Some(path) = &args.events {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let parsed: Vec<RawEvent> = serde_json::from_str(&text)
                .with_context(|| format!("parsing events {}", path.display()))?;
            events.extend(parsed);
        }
        info!(count = events.len(), "read local events");
        return Ok(events);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let client = FeedClient::new()?;
    let report = runtime.block_on(client.fetch_all(&config.feeds));
    if !report.failed.is_empty() {
        warn!(failed = report.failed.len(), "some feeds could not be read");
    }
    Ok(report.events)
}

fn print_summary(stats: &RunStats, config: &RunConfig) {
    println!(
        "Inserted: {} | Updated: {} | Unchanged: {} | Dropped: {} | Out of window: {} | Ledger rows: {} | min_date={} | max_date={}",
        stats.inserted,
        stats.updated,
        stats.unchanged,
        stats.dropped_no_date + stats.dropped_empty_summary,
        stats.out_of_window,
        stats.ledger_rows,
        config.min_date.as_deref().unwrap_or("None"),
        config.max_date.as_deref().unwrap_or("None"),
    );
}

fn fmt_bound(bound: Option<NaiveDate>) -> String {
    bound.map_or_else(|| "open".to_string(), |d| d.to_string())
}
