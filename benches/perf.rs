use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use pickem_ledger::grid::{Cell, Grid};
use pickem_ledger::picks::{PickRecord, Side, Winner};
use pickem_ledger::scoreboard::parse_scoreboard_json;
use pickem_ledger::sheet_scan::{
    AWAY_PICK_COLUMNS, AWAY_TEAM_COLUMN, HOME_PICK_COLUMNS, HOME_TEAM_COLUMN, SheetLayout,
    TIEBREAKER_COLUMNS, parse_week,
};
use pickem_ledger::standings::compute_standings;

fn sample_week_grid() -> Grid {
    let layout = SheetLayout::STANDARD;
    let mut grid = Grid::default();
    grid.set(0, AWAY_TEAM_COLUMN, Cell::from("Away"));
    grid.set(0, HOME_TEAM_COLUMN, Cell::from("Home"));
    for game in 0..16usize {
        let row = layout.header_rows + game;
        grid.set(row, AWAY_TEAM_COLUMN, Cell::Text(format!("Away Team {game}*")));
        grid.set(row, HOME_TEAM_COLUMN, Cell::Text(format!("Home Team {game}")));
        for slot in 0..6 {
            let col = if (game + slot) % 2 == 0 {
                AWAY_PICK_COLUMNS[slot]
            } else {
                HOME_PICK_COLUMNS[slot]
            };
            grid.set(row, col, Cell::from("x"));
        }
    }
    for (slot, col) in TIEBREAKER_COLUMNS.iter().enumerate() {
        grid.set(layout.tiebreaker_row(), *col, Cell::Float(40.0 + slot as f64));
    }
    grid
}

fn sample_season() -> Vec<PickRecord> {
    let mut out = Vec::new();
    for week in 1..=18u32 {
        for game in 1..=16u32 {
            let picks = std::array::from_fn(|slot| {
                if (week + game + slot as u32) % 3 == 0 {
                    None
                } else if (game + slot as u32) % 2 == 0 {
                    Some(Side::Away)
                } else {
                    Some(Side::Home)
                }
            });
            out.push(PickRecord {
                week,
                game,
                away_team: format!("Away {game}"),
                home_team: format!("Home {game}"),
                picks,
                tiebreakers: [None; 6],
                actual_winner: match (week * game) % 5 {
                    0 => Some(Winner::Tie),
                    1 | 2 => Some(Winner::Away),
                    _ => Some(Winner::Home),
                },
                actual_total_points: Some(40),
            });
        }
    }
    out
}

fn sample_scoreboard() -> String {
    let events = (0..16)
        .map(|game| {
            format!(
                r#"{{"competitions":[{{"competitors":[
                    {{"homeAway":"home","team":{{"displayName":"Home {game}"}},"score":"{}"}},
                    {{"homeAway":"away","team":{{"displayName":"Away {game}"}},"score":"{}"}}
                ],"status":{{"type":{{"completed":true}}}}}}]}}"#,
                17 + game,
                21 + game % 7
            )
        })
        .collect::<Vec<_>>();
    format!(r#"{{"events":[{}]}}"#, events.join(","))
}

fn bench_parse_week(c: &mut Criterion) {
    let grid = sample_week_grid();
    c.bench_function("parse_week_16_games", |b| {
        b.iter(|| {
            let parsed = parse_week(1, black_box(&grid), &SheetLayout::STANDARD);
            black_box(parsed.records.len());
        })
    });
}

fn bench_compute_standings(c: &mut Criterion) {
    let records = sample_season();
    c.bench_function("compute_standings_full_season", |b| {
        b.iter(|| {
            let rows = compute_standings(black_box(&records), 18).expect("valid season");
            black_box(rows.len());
        })
    });
}

fn bench_parse_scoreboard(c: &mut Criterion) {
    let raw = sample_scoreboard();
    c.bench_function("parse_scoreboard_16_events", |b| {
        b.iter(|| {
            let results = parse_scoreboard_json(black_box(&raw)).expect("valid payload");
            black_box(results.len());
        })
    });
}

criterion_group!(
    perf,
    bench_parse_week,
    bench_compute_standings,
    bench_parse_scoreboard
);
criterion_main!(perf);
