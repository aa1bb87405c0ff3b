use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use pickem_ledger::config::Config;
use pickem_ledger::export::export_workbook;
use pickem_ledger::ingest::{self, SheetFailurePolicy};
use pickem_ledger::reconcile::{self, season_range};
use pickem_ledger::scoreboard::{HttpScoreboard, ResultsFetcher, RetryPolicy};
use pickem_ledger::sheet_scan::SheetLayout;
use pickem_ledger::store::PickStore;

/// Pick'em ledger: import weekly pick sheets, settle them against final
/// scores and keep the running standings.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// SQLite database path (overrides PICKEM_DB).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Season year used for scoreboard queries (overrides PICKEM_SEASON).
    #[arg(long, global = true)]
    season: Option<i32>,

    /// Turn on debug logging.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replace all stored picks with the week sheets of a workbook.
    Ingest {
        workbook: PathBuf,
        /// `abort` or `skip` (overrides PICKEM_SHEET_FAILURE).
        #[arg(long)]
        on_sheet_failure: Option<SheetFailurePolicy>,
    },
    /// Fetch results, settle picks and rebuild standings.
    Reconcile {
        /// Week to reconcile; repeat for several. Defaults to the whole season.
        #[arg(long = "week")]
        weeks: Vec<u32>,
    },
    /// Print cumulative standings.
    Standings {
        #[arg(long)]
        week: Option<u32>,
    },
    /// Write standings, weekly records, picks and tiebreakers to a workbook.
    Export { out: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = Config::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = Some(db);
    }
    if let Some(season) = cli.season {
        config.season = season;
    }
    let db_path = config.db_path()?;
    info!("using database {}", db_path.display());
    let mut store = PickStore::open(&db_path, config.busy_timeout)?;

    match cli.command {
        Command::Ingest {
            workbook,
            on_sheet_failure,
        } => {
            let policy = on_sheet_failure.unwrap_or(config.sheet_failure);
            let summary = ingest::ingest(&mut store, &workbook, &SheetLayout::STANDARD, policy)?;
            println!("Ingest complete");
            println!("Records: {}", summary.records);
            for (week, games) in &summary.games_per_week {
                println!("week {week}: {games} games");
            }
            for skipped in &summary.skipped {
                println!("skipped {}: {}", skipped.sheet, skipped.reason);
            }
            for w in summary.warnings.iter().take(10) {
                println!("  week {} row {}: {}", w.week, w.warning.row, w.warning.reason);
            }
        }
        Command::Reconcile { weeks } => {
            let weeks = if weeks.is_empty() {
                season_range(config.season_weeks)
            } else {
                weeks
            };
            let source = HttpScoreboard::new(
                &config.scoreboard_url,
                config.http_timeout,
                RetryPolicy::default(),
            )?;
            let fetcher = ResultsFetcher::new(
                Box::new(source),
                config.known_outcomes.load(config.season)?,
                config.season,
            );
            let summary =
                reconcile::reconcile(&mut store, &fetcher, &weeks, config.season_weeks)?;
            println!("Reconcile complete");
            println!("Outcomes written: {}", summary.updated());
            println!("Unmatched games: {}", summary.unmatched());
            println!("Standings rows: {}", summary.standings_rows);
        }
        Command::Standings { week } => {
            let week = match week {
                Some(week) => week,
                None => store
                    .load_standings(None)?
                    .iter()
                    .map(|r| r.week)
                    .max()
                    .context("no standings yet; run reconcile first")?,
            };
            let title = format!("Week {week}");
            println!("{title:<10} {:>4} {:>4} {:>4} {:>6}", "W", "L", "T", "Pct");
            for row in store.load_standings(Some(week))? {
                println!(
                    "{:<10} {:>4} {:>4} {:>4} {:>6}",
                    row.participant, row.wins, row.losses, row.ties, row.win_pct
                );
            }
        }
        Command::Export { out } => {
            let records = store.load_picks()?;
            let standings = store.load_standings(None)?;
            let report = export_workbook(&out, &records, &standings)?;
            println!("Export written to {}", out.display());
            println!(
                "standings={} weekly={} picks={} tiebreakers={}",
                report.standings, report.weekly, report.picks, report.tiebreakers
            );
        }
    }
    Ok(())
}
