use chrono::Utc;
use log::{info, warn};
use serde::Serialize;
use serde_json::json;

use crate::error::ReconcileError;
use crate::picks::PickRecord;
use crate::scoreboard::{ResultsFetcher, WeekResults};
use crate::standings;
use crate::store::{OutcomeUpdate, PickStore, as_aggregation_error};

/// A stored game the fetched results did not mention. Expected for games not
/// yet played or names that drifted; never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileMismatch {
    pub week: u32,
    pub game: u32,
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WeekReconcile {
    pub week: u32,
    pub fetched: usize,
    pub updated: usize,
    pub undecided: usize,
    pub unmatched: Vec<ReconcileMismatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub weeks: Vec<WeekReconcile>,
    pub standings_rows: usize,
}

impl ReconcileSummary {
    pub fn updated(&self) -> usize {
        self.weeks.iter().map(|w| w.updated).sum()
    }

    pub fn unmatched(&self) -> usize {
        self.weeks.iter().map(|w| w.unmatched.len()).sum()
    }
}

pub fn season_range(season_weeks: u32) -> Vec<u32> {
    (1..=season_weeks).collect()
}

/// Match stored games against fetched results. Only decided games produce
/// updates; unknown keys are reported back.
pub fn plan_updates(
    records: &[PickRecord],
    results: &WeekResults,
) -> (Vec<OutcomeUpdate>, usize, Vec<ReconcileMismatch>) {
    let mut updates = Vec::new();
    let mut undecided = 0usize;
    let mut unmatched = Vec::new();
    for record in records {
        let key = record.composite_key();
        match results.get(&key) {
            Some(result) => match result.winner {
                Some(winner) => updates.push(OutcomeUpdate {
                    game: record.game,
                    winner,
                    total_points: result.total_points,
                }),
                None => undecided += 1,
            },
            None => unmatched.push(ReconcileMismatch {
                week: record.week,
                game: record.game,
                key,
            }),
        }
    }
    (updates, undecided, unmatched)
}

/// Pull results for each week, write outcomes onto matching picks, then
/// rebuild the standings table from scratch.
pub fn reconcile(
    store: &mut PickStore,
    fetcher: &ResultsFetcher,
    weeks: &[u32],
    season_weeks: u32,
) -> Result<ReconcileSummary, ReconcileError> {
    let started_at = Utc::now().to_rfc3339();
    let mut summary = ReconcileSummary::default();

    for &week in weeks {
        let records = store.load_week(week).map_err(store_error)?;
        if records.is_empty() {
            info!("week {week}: no stored picks, skipping");
            continue;
        }

        let results = fetcher.fetch(week);
        if results.is_empty() {
            info!("week {week}: no results, nothing to reconcile");
            summary.weeks.push(WeekReconcile {
                week,
                ..WeekReconcile::default()
            });
            continue;
        }

        let (updates, undecided, unmatched) = plan_updates(&records, &results);
        for miss in &unmatched {
            warn!(
                "week {week}: game {} {:?} not found in fetched results",
                miss.game, miss.key
            );
        }
        let updated = store.apply_outcomes(week, &updates)?;
        info!(
            "week {week}: {updated} outcomes written, {undecided} undecided, {} unmatched",
            unmatched.len()
        );
        summary.weeks.push(WeekReconcile {
            week,
            fetched: results.len(),
            updated,
            undecided,
            unmatched,
        });
    }

    summary.standings_rows = standings::rebuild(store, season_weeks)?;

    store.record_run(
        "reconcile",
        &started_at,
        &json!({
            "season": fetcher.season(),
            "weeks": summary.weeks,
            "standings_rows": summary.standings_rows,
        }),
    )?;
    Ok(summary)
}

fn store_error(err: anyhow::Error) -> ReconcileError {
    match as_aggregation_error(err) {
        Ok(agg) => ReconcileError::Aggregation(agg),
        Err(other) => ReconcileError::Store(other),
    }
}
