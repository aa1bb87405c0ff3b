use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of participant slots on every week sheet.
pub const PARTICIPANT_COUNT: usize = 6;

/// The fixed participant set, in sheet column order. Adding or removing a
/// participant means changing this list, the sheet layout and the `picks`
/// table columns together.
pub const PARTICIPANTS: [&str; PARTICIPANT_COUNT] =
    ["Alex", "Blake", "Casey", "Drew", "Emery", "Frankie"];

/// Trailing footnote marker some sheets and feeds append to team names.
pub const FOOTNOTE_MARKER: char = '*';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Away,
    Home,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Away => "Away",
            Side::Home => "Home",
        }
    }

    pub fn parse(raw: &str) -> Option<Side> {
        match raw {
            "Away" => Some(Side::Away),
            "Home" => Some(Side::Home),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Winner {
    Away,
    Home,
    Tie,
}

impl Winner {
    pub fn as_str(self) -> &'static str {
        match self {
            Winner::Away => "Away",
            Winner::Home => "Home",
            Winner::Tie => "Tie",
        }
    }

    pub fn parse(raw: &str) -> Option<Winner> {
        match raw {
            "Away" => Some(Winner::Away),
            "Home" => Some(Winner::Home),
            "Tie" => Some(Winner::Tie),
            _ => None,
        }
    }

    /// Strictly-greater side wins, equal scores tie.
    pub fn from_scores(away: i64, home: i64) -> Winner {
        if away > home {
            Winner::Away
        } else if home > away {
            Winner::Home
        } else {
            Winner::Tie
        }
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a single participant fared on a decided game. Derived on demand from
/// the pick and the stored winner, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
    Tie,
}

impl Outcome {
    pub fn classify(pick: Side, winner: Winner) -> Outcome {
        match (pick, winner) {
            (_, Winner::Tie) => Outcome::Tie,
            (Side::Away, Winner::Away) | (Side::Home, Winner::Home) => Outcome::Win,
            _ => Outcome::Loss,
        }
    }
}

/// One game of one week, with every participant's pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickRecord {
    pub week: u32,
    pub game: u32,
    pub away_team: String,
    pub home_team: String,
    pub picks: [Option<Side>; PARTICIPANT_COUNT],
    pub tiebreakers: [Option<u32>; PARTICIPANT_COUNT],
    pub actual_winner: Option<Winner>,
    pub actual_total_points: Option<u32>,
}

impl PickRecord {
    pub fn composite_key(&self) -> String {
        composite_key(&self.away_team, &self.home_team)
    }

    pub fn has_tiebreakers(&self) -> bool {
        self.tiebreakers.iter().any(Option::is_some)
    }

    /// Outcome for participant `slot`, if they picked and the game is decided.
    pub fn outcome_for(&self, slot: usize) -> Option<Outcome> {
        let pick = self.picks.get(slot).copied().flatten()?;
        let winner = self.actual_winner?;
        Some(Outcome::classify(pick, winner))
    }
}

/// Trim, drop one trailing footnote marker, trim again. Handles both
/// `"Team*"` and `"Team *"`.
pub fn normalize_team_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = trimmed.strip_suffix(FOOTNOTE_MARKER).unwrap_or(trimmed);
    stripped.trim().to_string()
}

/// Join key between stored picks and fetched results. Callers pass
/// already-normalized names.
pub fn composite_key(away: &str, home: &str) -> String {
    format!("{away} @ {home}")
}
