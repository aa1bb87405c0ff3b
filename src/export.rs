use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::picks::{PARTICIPANTS, PickRecord};
use crate::standings::{StandingsRow, Tally, format_pct, weekly_tallies};

pub struct ExportReport {
    pub standings: usize,
    pub weekly: usize,
    pub picks: usize,
    pub tiebreakers: usize,
}

/// Write the reporting workbook: cumulative standings, per-week records, raw
/// picks and the tiebreaker leaderboard.
pub fn export_workbook(
    path: &Path,
    records: &[PickRecord],
    standings: &[StandingsRow],
) -> Result<ExportReport> {
    let mut standings_rows = vec![header(&["Week", "Participant", "W", "L", "T", "Win %"])];
    standings_rows.extend(standings.iter().map(standings_row));

    let mut weekly_rows = vec![header(&["Week", "Participant", "W", "L", "T", "Win %"])];
    let weekly = weekly_tallies(records).context("tally weekly records")?;
    for (week, tallies) in &weekly {
        for (slot, tally) in tallies.iter().enumerate() {
            weekly_rows.push(weekly_row(*week, PARTICIPANTS[slot], tally));
        }
    }

    let mut pick_header = vec!["Week", "Game", "Away", "Home"];
    pick_header.extend(PARTICIPANTS);
    pick_header.extend(["Winner", "Total"]);
    let mut picks_rows = vec![header(&pick_header)];
    picks_rows.extend(records.iter().map(pick_row));

    let mut tiebreaker_rows = vec![header(&[
        "Week",
        "Game",
        "Participant",
        "Guess",
        "Actual",
        "Miss",
    ])];
    tiebreaker_rows.extend(tiebreaker_leaderboard(records));

    let report = ExportReport {
        standings: standings_rows.len() - 1,
        weekly: weekly_rows.len() - 1,
        picks: picks_rows.len() - 1,
        tiebreakers: tiebreaker_rows.len() - 1,
    };

    let mut workbook = Workbook::new();
    for (name, rows) in [
        ("Standings", &standings_rows),
        ("Weekly", &weekly_rows),
        ("Picks", &picks_rows),
        ("Tiebreakers", &tiebreaker_rows),
    ] {
        let sheet = workbook.add_worksheet();
        sheet
            .set_name(name)
            .with_context(|| format!("name sheet {name}"))?;
        write_rows(sheet, rows)?;
    }
    workbook
        .save(path)
        .with_context(|| format!("save workbook {}", path.display()))?;
    Ok(report)
}

fn header(cols: &[&str]) -> Vec<String> {
    cols.iter().map(|c| c.to_string()).collect()
}

fn standings_row(row: &StandingsRow) -> Vec<String> {
    vec![
        row.week.to_string(),
        row.participant.clone(),
        row.wins.to_string(),
        row.losses.to_string(),
        row.ties.to_string(),
        row.win_pct.clone(),
    ]
}

fn weekly_row(week: u32, participant: &str, tally: &Tally) -> Vec<String> {
    vec![
        week.to_string(),
        participant.to_string(),
        tally.wins.to_string(),
        tally.losses.to_string(),
        tally.ties.to_string(),
        format_pct(tally.win_pct()),
    ]
}

fn pick_row(record: &PickRecord) -> Vec<String> {
    let mut row = vec![
        record.week.to_string(),
        record.game.to_string(),
        record.away_team.clone(),
        record.home_team.clone(),
    ];
    row.extend(
        record
            .picks
            .iter()
            .map(|p| p.map(|s| s.to_string()).unwrap_or_default()),
    );
    row.push(opt_to_string(record.actual_winner));
    row.push(opt_to_string(record.actual_total_points));
    row
}

/// Per week, guesses ordered by distance from the actual total. Missing
/// guesses go last; weeks without a final total keep sheet order.
pub fn tiebreaker_leaderboard(records: &[PickRecord]) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for record in records.iter().filter(|r| r.has_tiebreakers()) {
        let mut entries = PARTICIPANTS
            .iter()
            .zip(record.tiebreakers.iter())
            .map(|(name, guess)| {
                let miss = match (guess, record.actual_total_points) {
                    (Some(g), Some(actual)) => Some(g.abs_diff(actual)),
                    _ => None,
                };
                (*name, *guess, miss)
            })
            .collect::<Vec<_>>();
        entries.sort_by_key(|(_, guess, miss)| (guess.is_none(), miss.is_none(), *miss));
        for (name, guess, miss) in entries {
            rows.push(vec![
                record.week.to_string(),
                record.game.to_string(),
                name.to_string(),
                opt_to_string(guess),
                opt_to_string(record.actual_total_points),
                opt_to_string(miss),
            ]);
        }
    }
    rows
}

fn opt_to_string<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
