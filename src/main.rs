use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use nhl_sync::config::{self, ProviderConfig, SyncConfig};
use nhl_sync::driver::{PhaseReport, Reconciler, RunSummary};
use nhl_sync::error::UnitOutcome;
use nhl_sync::fixture_source::FixtureProvider;
use nhl_sync::logging::{self, DEFAULT_FILTER};
use nhl_sync::provider::{NhlApiProvider, SourceProvider};
use nhl_sync::repair::RepairReport;
use nhl_sync::schema;
use nhl_sync::store;

#[derive(Debug, Parser)]
#[command(name = "nhl_sync")]
#[command(about = "Mirror NHL seasons, teams, rosters, games and play-by-play into SQLite")]
struct Cli {
    /// SQLite file; defaults to NHL_SYNC_DB or the user cache dir.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Seasons to reconcile, e.g. `20162017-20232024` or `20212022,20222023`.
    #[arg(long, global = true)]
    seasons: Option<String>,
    /// Serve documents from a fixture directory instead of the live API.
    #[arg(long, global = true)]
    fixtures: Option<PathBuf>,
    /// Print the summary as JSON.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run every phase, then the repair jobs.
    Sync,
    /// Run only the repair jobs.
    Repair,
    /// Refetch one game's scoreboard and play-by-play.
    Game { id: i64 },
    /// Migrate the store and list its tables.
    Schema,
}

fn main() -> Result<()> {
    config::load_dotenv();
    logging::init_tracing(DEFAULT_FILTER)?;
    let cli = Cli::parse();

    let db_path = cli
        .db
        .clone()
        .or_else(config::default_db_path)
        .context("unable to resolve sqlite path")?;
    let mut sync_config = SyncConfig::from_env()?;
    if let Some(raw) = cli.seasons.as_deref() {
        sync_config.season_range = config::parse_season_range(raw)?;
    }

    let mut conn = store::open_store(&db_path)?;
    let provider: Box<dyn SourceProvider> = match cli.fixtures.as_deref() {
        Some(dir) => Box::new(FixtureProvider::from_dir(dir)?),
        None => Box::new(NhlApiProvider::new(ProviderConfig::from_env())?),
    };

    match cli.command.unwrap_or(Commands::Sync) {
        Commands::Sync => {
            let mut reconciler = Reconciler::new(&mut conn, provider.as_ref(), sync_config)
                .context("schema migration failed")?;
            let summary = reconciler.run()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_run_summary(&db_path, &summary);
            }
        }
        Commands::Repair => {
            let mut reconciler = Reconciler::new(&mut conn, provider.as_ref(), sync_config)
                .context("schema migration failed")?;
            let report = reconciler.run_repairs()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Repair complete");
                println!("DB: {}", db_path.display());
                print_repair(&report);
            }
        }
        Commands::Game { id } => {
            let mut reconciler = Reconciler::new(&mut conn, provider.as_ref(), sync_config)
                .context("schema migration failed")?;
            let outcome = reconciler.refresh_game(id)?;
            match outcome {
                UnitOutcome::Success { rows } => println!("game {id}: {rows} events stored"),
                UnitOutcome::ConfirmedAbsent => println!("game {id}: not found upstream"),
                UnitOutcome::TransientFailure(reason) => {
                    println!("game {id}: left pending ({reason})")
                }
                UnitOutcome::IntegrityViolation(reason) => {
                    println!("game {id}: unusable payload ({reason})")
                }
            }
        }
        Commands::Schema => {
            let report = schema::ensure_schema(&mut conn).context("schema migration failed")?;
            println!("Schema v{} at {}", schema::schema_version(&conn)?, db_path.display());
            for table in &report.tables_created {
                println!("created {table}");
            }
            for column in &report.columns_added {
                println!("added {column}");
            }
            for (table, columns) in schema::schema_inventory(&conn)? {
                let rows = store::count_rows(&conn, &table)?;
                println!("{table} ({rows} rows): {}", columns.join(", "));
            }
        }
    }

    Ok(())
}

fn print_run_summary(db_path: &Path, summary: &RunSummary) {
    println!("Sync complete");
    println!("DB: {}", db_path.display());
    println!("Started: {}", summary.started_at);
    println!("Finished: {}", summary.finished_at);
    for (name, phase) in summary.phases() {
        print_phase(name, phase);
    }
    print_repair(&summary.repair);
}

fn print_phase(name: &str, phase: &PhaseReport) {
    println!(
        "{name}: attempted={} ok={} skipped={} absent={} pending={} rows={}",
        phase.attempted,
        phase.succeeded,
        phase.skipped,
        phase.absent,
        phase.pending(),
        phase.rows
    );
}

fn print_repair(report: &RepairReport) {
    println!(
        "repair: teams={} events_backfilled={} coords_missing={} has_plays={}",
        report.teams_repaired,
        report.events_backfilled,
        report.coords_missing,
        report.has_plays_reconciled
    );
}
