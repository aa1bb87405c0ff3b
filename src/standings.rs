use std::collections::BTreeMap;

use log::info;
use serde::Serialize;

use crate::error::{AggregationError, ReconcileError};
use crate::picks::{Outcome, PARTICIPANT_COUNT, PARTICIPANTS, PickRecord};
use crate::store::{PickStore, as_aggregation_error};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
}

impl Tally {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Win => self.wins += 1,
            Outcome::Loss => self.losses += 1,
            Outcome::Tie => self.ties += 1,
        }
    }

    pub fn add(&mut self, other: &Tally) {
        self.wins += other.wins;
        self.losses += other.losses;
        self.ties += other.ties;
    }

    pub fn decided(&self) -> u32 {
        self.wins + self.losses + self.ties
    }

    /// Wins over all decided picks, in percent. Zero when nothing is decided.
    pub fn win_pct(&self) -> f64 {
        let decided = self.decided();
        if decided == 0 {
            return 0.0;
        }
        f64::from(self.wins) / f64::from(decided) * 100.0
    }
}

pub fn format_pct(pct: f64) -> String {
    format!("{pct:.1}")
}

/// Cumulative record for one participant as of (and including) `week`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StandingsRow {
    pub week: u32,
    pub participant: String,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub win_pct: String,
}

impl StandingsRow {
    fn new(week: u32, participant: &str, tally: &Tally) -> Self {
        Self {
            week,
            participant: participant.to_string(),
            wins: tally.wins,
            losses: tally.losses,
            ties: tally.ties,
            win_pct: format_pct(tally.win_pct()),
        }
    }
}

/// Per-week (non-cumulative) tallies, one per participant slot.
pub fn weekly_tallies(
    records: &[PickRecord],
) -> Result<BTreeMap<u32, [Tally; PARTICIPANT_COUNT]>, AggregationError> {
    let mut weeks: BTreeMap<u32, [Tally; PARTICIPANT_COUNT]> = BTreeMap::new();
    for record in records {
        if record.week == 0 {
            return Err(AggregationError(format!(
                "game {} ({}) has week 0",
                record.game,
                record.composite_key()
            )));
        }
        let tallies = weeks.entry(record.week).or_default();
        for (slot, tally) in tallies.iter_mut().enumerate() {
            if let Some(outcome) = record.outcome_for(slot) {
                tally.record(outcome);
            }
        }
    }
    Ok(weeks)
}

/// Running totals for every participant at every week boundary from 1 up to
/// `season_weeks` (or the latest stored week, if later).
pub fn compute_standings(
    records: &[PickRecord],
    season_weeks: u32,
) -> Result<Vec<StandingsRow>, AggregationError> {
    let weekly = weekly_tallies(records)?;
    let last_week = weekly
        .keys()
        .next_back()
        .copied()
        .unwrap_or(0)
        .max(season_weeks);

    let mut running = [Tally::default(); PARTICIPANT_COUNT];
    let mut rows = Vec::with_capacity(last_week as usize * PARTICIPANT_COUNT);
    for week in 1..=last_week {
        if let Some(delta) = weekly.get(&week) {
            for (total, d) in running.iter_mut().zip(delta.iter()) {
                total.add(d);
            }
        }
        for (slot, name) in PARTICIPANTS.iter().enumerate() {
            rows.push(StandingsRow::new(week, name, &running[slot]));
        }
    }
    Ok(rows)
}

/// Recompute the whole cumulative table from stored picks and replace it.
pub fn rebuild(store: &mut PickStore, season_weeks: u32) -> Result<usize, ReconcileError> {
    let records = store.load_picks().map_err(|err| match as_aggregation_error(err) {
        Ok(agg) => ReconcileError::Aggregation(agg),
        Err(other) => ReconcileError::Store(other),
    })?;
    let rows = compute_standings(&records, season_weeks)?;
    store.replace_standings(&rows)?;
    info!(
        "standings rebuilt: {} rows from {} pick records",
        rows.len(),
        records.len()
    );
    Ok(rows.len())
}
