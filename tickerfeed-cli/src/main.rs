//! tickerfeed CLI: run ingestion, inspect plans, and manage the store.
//!
//! Commands:
//! - `run`: fetch every planned unit, dedup, append to the store, save a report
//! - `plan`: print the units a run would execute, without fetching
//! - `store status`: row and part-file counts per table
//! - `report`: print the summary of a saved run
//! - `init-config`: write a starter config with the stock query lists

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use tickerfeed_core::domain::SourceKind;
use tickerfeed_core::store::{MemoryStore, ParquetStore, RecordStore};
use tickerfeed_core::DedupGate;
use tickerfeed_runner::{
    build_registry, load_report, render_summary, save_report, Credentials, IngestConfig, Pipeline,
    PipelineOptions, QueryPlan,
};

#[derive(Parser)]
#[command(
    name = "tickerfeed",
    about = "tickerfeed: market chatter and news ingestion for a fixed ticker set"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, deduplicate and store every planned unit.
    Run {
        /// Path to the TOML config file.
        #[arg(long, default_value = "tickerfeed.toml")]
        config: PathBuf,

        /// Fetch and dedup against the store, but keep writes in memory.
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Output directory for the run report.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Restrict the run to these sources (reddit, x, news). Repeatable.
        #[arg(long = "source")]
        sources: Vec<SourceKind>,
    },
    /// Print the planned units without fetching anything.
    Plan {
        /// Path to the TOML config file.
        #[arg(long, default_value = "tickerfeed.toml")]
        config: PathBuf,

        /// Restrict the plan to these sources. Repeatable.
        #[arg(long = "source")]
        sources: Vec<SourceKind>,
    },
    /// Store inspection commands.
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
    /// Print the summary of a saved run.
    Report {
        /// Run directory containing report.json.
        dir: PathBuf,
    },
    /// Write a starter config file.
    InitConfig {
        /// Where to write the config.
        #[arg(long, default_value = "tickerfeed.toml")]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum StoreAction {
    /// Report row and part-file counts per table.
    Status {
        /// Path to the TOML config file.
        #[arg(long, default_value = "tickerfeed.toml")]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("tickerfeed_core=info".parse()?)
                .add_directive("tickerfeed_runner=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            dry_run,
            output_dir,
            sources,
        } => run_ingest(&config, dry_run, &output_dir, &sources),
        Commands::Plan { config, sources } => run_plan(&config, &sources),
        Commands::Store { action } => match action {
            StoreAction::Status { config } => run_store_status(&config),
        },
        Commands::Report { dir } => run_show_report(&dir),
        Commands::InitConfig { path, force } => run_init_config(&path, force),
    }
}

fn run_ingest(
    config_path: &Path,
    dry_run: bool,
    output_dir: &Path,
    sources: &[SourceKind],
) -> Result<()> {
    let config = IngestConfig::from_file(config_path)?;
    let plan = QueryPlan::build(&config, Utc::now(), sources);
    if plan.is_empty() {
        bail!("nothing to do: no units planned (check enabled sources and --source filters)");
    }
    tracing::info!(units = plan.len(), since = %plan.since, "plan built");

    let registry = build_registry(&config, &Credentials::from_env(), &plan)?;

    let tables = config.store.tables.clone();
    let parquet = ParquetStore::new(&config.store.root, &config.store.dataset, tables.clone());
    let gate = DedupGate::load(&parquet, tables.iter().map(|(_, t)| t))
        .context("failed to load existing keys from the store")?;

    let memory = MemoryStore::new(tables.clone());
    let store: &dyn RecordStore = if dry_run { &memory } else { &parquet };

    let options = PipelineOptions {
        dry_run,
        ..PipelineOptions::from_settings(&config.run)
    };
    let mut pipeline = Pipeline::new(&registry, store, tables, gate, options);
    let report = pipeline.run_all(plan.units);

    print!("{}", render_summary(&report));

    let run_dir = save_report(&report, output_dir)?;
    println!("Report saved to: {}", run_dir.display());

    Ok(())
}

fn run_plan(config_path: &Path, sources: &[SourceKind]) -> Result<()> {
    let config = IngestConfig::from_file(config_path)?;
    let plan = QueryPlan::build(&config, Utc::now(), sources);

    println!("since {}", plan.since.format("%Y-%m-%d %H:%M:%S UTC"));
    for source in SourceKind::ALL {
        println!("{:<8} {} units", source.as_str(), plan.units_for(source));
    }
    println!();
    for unit in &plan.units {
        println!("{:>3} pages  {}", unit.page_cap, unit.label());
    }
    if config.run.fetch_comments && plan.units_for(SourceKind::Reddit) > 0 {
        println!("\n+ one comment unit per newly written post");
    }
    Ok(())
}

fn run_store_status(config_path: &Path) -> Result<()> {
    let config = IngestConfig::from_file(config_path)?;
    let store = ParquetStore::new(
        &config.store.root,
        &config.store.dataset,
        config.store.tables.clone(),
    );

    println!(
        "Store: {}",
        config.store.root.join(&config.store.dataset).display()
    );
    println!("{:<16} {:<16} {:>8} {:>6}", "kind", "table", "rows", "parts");
    for (kind, table) in config.store.tables.iter() {
        let rows = store
            .row_count(table)
            .with_context(|| format!("failed to count rows of {table}"))?;
        let parts = store.part_files(table)?.len();
        println!(
            "{:<16} {:<16} {:>8} {:>6}",
            kind.to_string(),
            table,
            rows,
            parts
        );
    }
    Ok(())
}

fn run_show_report(dir: &Path) -> Result<()> {
    let report = load_report(dir)?;
    print!("{}", render_summary(&report));
    Ok(())
}

fn run_init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    let toml_str = IngestConfig::starter().to_toml()?;
    std::fs::write(path, toml_str)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Config written to: {}", path.display());
    Ok(())
}
