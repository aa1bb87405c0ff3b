//! Positional parsing of a single week sheet.
//!
//! Week sheets are human-edited grids with no header contract, so every
//! position below is an assumption about the layout rather than something
//! discovered from the sheet. `parse_week` is pure: it never touches the
//! store or the network.

use log::{debug, warn};
use serde::Serialize;

use crate::grid::{Cell, Grid};
use crate::picks::{PARTICIPANT_COUNT, PickRecord, Side, normalize_team_name};

/// Rows 0 and 1 are headers on every sheet.
pub const HEADER_ROWS: usize = 2;
pub const AWAY_PICK_COLUMNS: [usize; PARTICIPANT_COUNT] = [0, 1, 2, 3, 4, 5];
pub const AWAY_TEAM_COLUMN: usize = 6;
pub const HOME_TEAM_COLUMN: usize = 7;
pub const HOME_PICK_COLUMNS: [usize; PARTICIPANT_COUNT] = [8, 9, 10, 11, 12, 13];
/// Guesses sit a fixed distance below the header, not below the last game.
pub const TIEBREAKER_ROW_OFFSET: usize = 18;
pub const TIEBREAKER_COLUMNS: [usize; PARTICIPANT_COUNT] = [8, 9, 10, 11, 12, 13];
pub const PICK_MARK: &str = "x";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetLayout {
    pub header_rows: usize,
    pub away_team_column: usize,
    pub home_team_column: usize,
    pub away_pick_columns: [usize; PARTICIPANT_COUNT],
    pub home_pick_columns: [usize; PARTICIPANT_COUNT],
    pub tiebreaker_row_offset: usize,
    pub tiebreaker_columns: [usize; PARTICIPANT_COUNT],
}

impl SheetLayout {
    pub const STANDARD: SheetLayout = SheetLayout {
        header_rows: HEADER_ROWS,
        away_team_column: AWAY_TEAM_COLUMN,
        home_team_column: HOME_TEAM_COLUMN,
        away_pick_columns: AWAY_PICK_COLUMNS,
        home_pick_columns: HOME_PICK_COLUMNS,
        tiebreaker_row_offset: TIEBREAKER_ROW_OFFSET,
        tiebreaker_columns: TIEBREAKER_COLUMNS,
    };

    pub fn tiebreaker_row(&self) -> usize {
        self.header_rows + self.tiebreaker_row_offset
    }
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// A game row accepted by the scanner, before it becomes a `PickRecord`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRow {
    pub row: usize,
    pub sequence: u32,
    pub away_team: String,
    pub home_team: String,
    pub picks: [Option<Side>; PARTICIPANT_COUNT],
}

/// Why a row was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowWarning {
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub games: Vec<GameRow>,
    pub warnings: Vec<RowWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedWeek {
    pub week: u32,
    pub records: Vec<PickRecord>,
    pub warnings: Vec<RowWarning>,
}

/// Find every game row in sheet order. Rows that fail are recorded as
/// warnings and scanning carries on.
pub fn scan_games(grid: &Grid, layout: &SheetLayout) -> ScanResult {
    let mut result = ScanResult::default();
    for row in layout.header_rows..grid.height() {
        match scan_row(grid, layout, row) {
            Ok(Some((away_team, home_team, picks))) => {
                let sequence = result.games.len() as u32 + 1;
                result.games.push(GameRow {
                    row,
                    sequence,
                    away_team,
                    home_team,
                    picks,
                });
            }
            Ok(None) => {}
            Err(reason) => {
                warn!("skipping row {row}: {reason}");
                result.warnings.push(RowWarning { row, reason });
            }
        }
    }
    result
}

type RowPicks = (String, String, [Option<Side>; PARTICIPANT_COUNT]);

fn scan_row(grid: &Grid, layout: &SheetLayout, row: usize) -> Result<Option<RowPicks>, String> {
    let away_raw = team_cell(grid.get(row, layout.away_team_column), "away")?;
    let home_raw = team_cell(grid.get(row, layout.home_team_column), "home")?;
    if away_raw.trim().is_empty() || home_raw.trim().is_empty() {
        return Ok(None);
    }
    if is_numeric(&away_raw) || is_numeric(&home_raw) {
        return Err(format!(
            "numeric team names {:?} / {:?}",
            away_raw.trim(),
            home_raw.trim()
        ));
    }

    let away_team = normalize_team_name(&away_raw);
    let home_team = normalize_team_name(&home_raw);
    if away_team.is_empty() || home_team.is_empty() {
        return Ok(None);
    }

    let mut picks = [None; PARTICIPANT_COUNT];
    for (slot, pick) in picks.iter_mut().enumerate() {
        *pick = if is_mark(grid.get(row, layout.away_pick_columns[slot])) {
            Some(Side::Away)
        } else if is_mark(grid.get(row, layout.home_pick_columns[slot])) {
            Some(Side::Home)
        } else {
            None
        };
    }
    Ok(Some((away_team, home_team, picks)))
}

fn team_cell(cell: &Cell, side: &str) -> Result<String, String> {
    cell.render()
        .ok_or_else(|| format!("unreadable {side} team cell {cell:?}"))
}

fn is_numeric(raw: &str) -> bool {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    digits.chars().any(|c| c.is_ascii_digit())
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
}

fn is_mark(cell: &Cell) -> bool {
    cell.render()
        .is_some_and(|s| s.trim().to_lowercase() == PICK_MARK)
}

type Guesses = [Option<u32>; PARTICIPANT_COUNT];

/// Read each participant's point-total guess. Anything other than a plain
/// run of digits is treated as no guess.
pub fn locate_tiebreakers(grid: &Grid, layout: &SheetLayout) -> Guesses {
    scan_tiebreakers(grid, layout).0
}

/// Like [`locate_tiebreakers`], but a run of digits too large to be a guess
/// is reported as a warning instead of vanishing silently. Other rejected
/// cells (`24.5`, `-3`, text) only get a debug line.
fn scan_tiebreakers(grid: &Grid, layout: &SheetLayout) -> (Guesses, Vec<RowWarning>) {
    let row = layout.tiebreaker_row();
    let mut guesses = [None; PARTICIPANT_COUNT];
    let mut warnings = Vec::new();
    for (slot, guess) in guesses.iter_mut().enumerate() {
        let cell = grid.get(row, layout.tiebreaker_columns[slot]);
        match cell.render().map(|raw| parse_guess(&raw)) {
            Some(Guess::Value(value)) => *guess = Some(value),
            Some(Guess::OutOfRange(raw)) => {
                let reason = format!("tiebreaker guess {raw} for slot {} is out of range", slot + 1);
                warn!("row {row}: {reason}");
                warnings.push(RowWarning { row, reason });
            }
            _ if !cell.is_blank() => debug!("ignoring tiebreaker cell {cell:?} for slot {slot}"),
            _ => {}
        }
    }
    (guesses, warnings)
}

enum Guess {
    Value(u32),
    OutOfRange(String),
    Invalid,
}

fn parse_guess(raw: &str) -> Guess {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Guess::Invalid;
    }
    match trimmed.parse::<u32>() {
        Ok(value) => Guess::Value(value),
        Err(_) => Guess::OutOfRange(trimmed.to_string()),
    }
}

/// Scan one week sheet into pick records. The tiebreaker guesses go on the
/// last game only.
pub fn parse_week(week: u32, grid: &Grid, layout: &SheetLayout) -> ParsedWeek {
    let mut scan = scan_games(grid, layout);
    let last_sequence = scan.games.iter().map(|g| g.sequence).max();
    let guesses = match last_sequence {
        Some(_) => {
            let (guesses, warnings) = scan_tiebreakers(grid, layout);
            scan.warnings.extend(warnings);
            guesses
        }
        None => [None; PARTICIPANT_COUNT],
    };

    let records = scan
        .games
        .into_iter()
        .map(|game| PickRecord {
            week,
            game: game.sequence,
            tiebreakers: if Some(game.sequence) == last_sequence {
                guesses
            } else {
                [None; PARTICIPANT_COUNT]
            },
            away_team: game.away_team,
            home_team: game.home_team,
            picks: game.picks,
            actual_winner: None,
            actual_total_points: None,
        })
        .collect::<Vec<_>>();

    debug!(
        "week {week}: {} games, {} warnings",
        records.len(),
        scan.warnings.len()
    );
    ParsedWeek {
        week,
        records,
        warnings: scan.warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> Grid {
        let mut grid = Grid::default();
        grid.set(0, AWAY_TEAM_COLUMN, Cell::from("Away"));
        grid.set(0, HOME_TEAM_COLUMN, Cell::from("Home"));
        grid.set(1, AWAY_TEAM_COLUMN, Cell::Int(1));
        grid
    }

    fn game(grid: &mut Grid, row: usize, away: &str, home: &str) {
        grid.set(row, AWAY_TEAM_COLUMN, Cell::from(away));
        grid.set(row, HOME_TEAM_COLUMN, Cell::from(home));
    }

    #[test]
    fn away_block_mark_picks_away() {
        let mut grid = sheet();
        game(&mut grid, 2, "Team A", "Team B");
        grid.set(2, AWAY_PICK_COLUMNS[0], Cell::from("x"));
        let scan = scan_games(&grid, &SheetLayout::STANDARD);
        assert_eq!(scan.games.len(), 1);
        assert_eq!(scan.games[0].picks[0], Some(Side::Away));
        assert_eq!(scan.games[0].picks[1], None);
    }

    #[test]
    fn mark_is_trimmed_and_case_folded() {
        let mut grid = sheet();
        game(&mut grid, 2, "Team A", "Team B");
        grid.set(2, HOME_PICK_COLUMNS[3], Cell::from(" X "));
        grid.set(2, HOME_PICK_COLUMNS[4], Cell::from("xx"));
        let scan = scan_games(&grid, &SheetLayout::STANDARD);
        assert_eq!(scan.games[0].picks[3], Some(Side::Home));
        assert_eq!(scan.games[0].picks[4], None);
    }

    #[test]
    fn away_block_wins_when_both_marked() {
        let mut grid = sheet();
        game(&mut grid, 2, "Team A", "Team B");
        grid.set(2, AWAY_PICK_COLUMNS[2], Cell::from("x"));
        grid.set(2, HOME_PICK_COLUMNS[2], Cell::from("x"));
        let scan = scan_games(&grid, &SheetLayout::STANDARD);
        assert_eq!(scan.games[0].picks[2], Some(Side::Away));
    }

    #[test]
    fn header_rows_are_never_games() {
        let mut grid = Grid::default();
        game(&mut grid, 0, "Team A", "Team B");
        game(&mut grid, 1, "Team C", "Team D");
        let scan = scan_games(&grid, &SheetLayout::STANDARD);
        assert!(scan.games.is_empty());
        assert!(scan.warnings.is_empty());
    }

    #[test]
    fn numeric_team_names_are_rejected_with_warning() {
        let mut grid = sheet();
        game(&mut grid, 2, "12", "Team B");
        grid.set(3, AWAY_TEAM_COLUMN, Cell::Float(3.0));
        grid.set(3, HOME_TEAM_COLUMN, Cell::from("Team D"));
        game(&mut grid, 4, "Team E", "Team F");
        let scan = scan_games(&grid, &SheetLayout::STANDARD);
        assert_eq!(scan.games.len(), 1);
        assert_eq!(scan.games[0].away_team, "Team E");
        assert_eq!(scan.games[0].sequence, 1);
        assert_eq!(
            scan.warnings.iter().map(|w| w.row).collect::<Vec<_>>(),
            vec![2, 3]
        );
    }

    #[test]
    fn error_cells_skip_only_their_row() {
        let mut grid = sheet();
        game(&mut grid, 2, "Team A", "Team B");
        grid.set(3, AWAY_TEAM_COLUMN, Cell::Error("#REF!".into()));
        grid.set(3, HOME_TEAM_COLUMN, Cell::from("Team D"));
        game(&mut grid, 4, "Team E", "Team F");
        let scan = scan_games(&grid, &SheetLayout::STANDARD);
        assert_eq!(scan.games.len(), 2);
        assert_eq!(scan.games[1].sequence, 2);
        assert_eq!(scan.games[1].row, 4);
        assert_eq!(scan.warnings.len(), 1);
        assert_eq!(scan.warnings[0].row, 3);
    }

    #[test]
    fn team_names_lose_footnote_markers() {
        let mut grid = sheet();
        game(&mut grid, 2, " Team A* ", "Team B *");
        let scan = scan_games(&grid, &SheetLayout::STANDARD);
        assert_eq!(scan.games[0].away_team, "Team A");
        assert_eq!(scan.games[0].home_team, "Team B");
    }

    #[test]
    fn guesses_accept_digits_only() {
        let mut grid = sheet();
        let row = SheetLayout::STANDARD.tiebreaker_row();
        grid.set(row, TIEBREAKER_COLUMNS[0], Cell::from(" 44 "));
        grid.set(row, TIEBREAKER_COLUMNS[1], Cell::from("24.5"));
        grid.set(row, TIEBREAKER_COLUMNS[2], Cell::from("-3"));
        grid.set(row, TIEBREAKER_COLUMNS[3], Cell::from("1,024"));
        grid.set(row, TIEBREAKER_COLUMNS[4], Cell::Float(38.0));
        grid.set(row, TIEBREAKER_COLUMNS[5], Cell::Float(38.5));
        let guesses = locate_tiebreakers(&grid, &SheetLayout::STANDARD);
        assert_eq!(guesses, [Some(44), None, None, None, Some(38), None]);
    }

    #[test]
    fn guesses_attach_to_last_game_only() {
        let mut grid = sheet();
        game(&mut grid, 2, "Team A", "Team B");
        game(&mut grid, 3, "Team C", "Team D");
        game(&mut grid, 5, "Team E", "Team F");
        let row = SheetLayout::STANDARD.tiebreaker_row();
        grid.set(row, TIEBREAKER_COLUMNS[0], Cell::Int(41));
        let week = parse_week(4, &grid, &SheetLayout::STANDARD);
        assert_eq!(week.records.len(), 3);
        let with_guesses = week
            .records
            .iter()
            .filter(|r| r.has_tiebreakers())
            .collect::<Vec<_>>();
        assert_eq!(with_guesses.len(), 1);
        assert_eq!(with_guesses[0].game, 3);
        assert_eq!(with_guesses[0].tiebreakers[0], Some(41));
        assert!(week.records.iter().all(|r| r.week == 4));
    }

    #[test]
    fn oversized_guess_is_a_warning() {
        let mut grid = sheet();
        game(&mut grid, 2, "Team A", "Team B");
        let row = SheetLayout::STANDARD.tiebreaker_row();
        grid.set(row, TIEBREAKER_COLUMNS[0], Cell::from("99999999999"));
        grid.set(row, TIEBREAKER_COLUMNS[1], Cell::from("24.5"));
        grid.set(row, TIEBREAKER_COLUMNS[2], Cell::Int(40));
        let week = parse_week(1, &grid, &SheetLayout::STANDARD);
        assert_eq!(week.records[0].tiebreakers[..3], [None, None, Some(40)]);
        assert_eq!(week.warnings.len(), 1);
        assert_eq!(week.warnings[0].row, row);
        assert!(week.warnings[0].reason.contains("99999999999"));
    }

    #[test]
    fn empty_week_has_no_records() {
        let mut grid = sheet();
        let row = SheetLayout::STANDARD.tiebreaker_row();
        grid.set(row, TIEBREAKER_COLUMNS[0], Cell::Int(41));
        let week = parse_week(2, &grid, &SheetLayout::STANDARD);
        assert!(week.records.is_empty());
    }
}
