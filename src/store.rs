use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, Row, Transaction, params};
use serde_json::Value;

use crate::error::AggregationError;
use crate::picks::{PARTICIPANT_COUNT, PickRecord, Side, Winner};
use crate::standings::StandingsRow;

const CACHE_DIR: &str = "pickem_ledger";
const DB_FILE: &str = "picks.sqlite";

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

const PICK_COLUMNS: &str = "week, game, away_team, home_team, \
     pick_1, pick_2, pick_3, pick_4, pick_5, pick_6, \
     tiebreak_1, tiebreak_2, tiebreak_3, tiebreak_4, tiebreak_5, tiebreak_6, \
     actual_winner, actual_total_points";

/// Owned handle on the pick database. Every operation borrows it; nothing
/// holds a connection globally.
pub struct PickStore {
    conn: Connection,
}

/// One outcome write for a single game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeUpdate {
    pub game: u32,
    pub winner: Winner,
    pub total_points: Option<u32>,
}

pub fn default_db_path() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(CACHE_DIR).join(DB_FILE));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR).join(DB_FILE))
}

impl PickStore {
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn =
            Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
        conn.busy_timeout(busy_timeout)
            .context("set sqlite busy timeout")?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .context("enable wal journal")?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS picks (
                    week INTEGER NOT NULL,
                    game INTEGER NOT NULL,
                    away_team TEXT NOT NULL,
                    home_team TEXT NOT NULL,
                    pick_1 TEXT NULL,
                    pick_2 TEXT NULL,
                    pick_3 TEXT NULL,
                    pick_4 TEXT NULL,
                    pick_5 TEXT NULL,
                    pick_6 TEXT NULL,
                    tiebreak_1 INTEGER NULL,
                    tiebreak_2 INTEGER NULL,
                    tiebreak_3 INTEGER NULL,
                    tiebreak_4 INTEGER NULL,
                    tiebreak_5 INTEGER NULL,
                    tiebreak_6 INTEGER NULL,
                    actual_winner TEXT NULL,
                    actual_total_points INTEGER NULL,
                    PRIMARY KEY (week, game)
                );

                CREATE TABLE IF NOT EXISTS standings (
                    week INTEGER NOT NULL,
                    participant TEXT NOT NULL,
                    wins INTEGER NOT NULL,
                    losses INTEGER NOT NULL,
                    ties INTEGER NOT NULL,
                    win_pct TEXT NOT NULL,
                    PRIMARY KEY (week, participant)
                );

                CREATE TABLE IF NOT EXISTS runs (
                    run_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    kind TEXT NOT NULL,
                    started_at TEXT NOT NULL,
                    finished_at TEXT NOT NULL,
                    detail_json TEXT NOT NULL
                );
                "#,
            )
            .context("create sqlite schema")?;
        Ok(())
    }

    /// Replace every stored pick with `records` in one transaction. Rows for
    /// the weeks in `retain_weeks` are left as they are.
    pub fn replace_picks(&mut self, records: &[PickRecord], retain_weeks: &[u32]) -> Result<usize> {
        let tx = self
            .conn
            .transaction()
            .context("begin ingest transaction")?;
        if retain_weeks.is_empty() {
            tx.execute("DELETE FROM picks", [])
                .context("clear picks")?;
        } else {
            let retained = serde_json::to_string(retain_weeks).context("encode retained weeks")?;
            tx.execute(
                "DELETE FROM picks WHERE week NOT IN (SELECT value FROM json_each(?1))",
                params![retained],
            )
            .context("clear picks outside retained weeks")?;
        }
        for record in records {
            insert_pick(&tx, record)?;
        }
        tx.commit().context("commit ingest transaction")?;
        Ok(records.len())
    }

    pub fn load_picks(&self) -> Result<Vec<PickRecord>> {
        self.query_picks(
            &format!("SELECT {PICK_COLUMNS} FROM picks ORDER BY week ASC, game ASC"),
            None,
        )
    }

    pub fn load_week(&self, week: u32) -> Result<Vec<PickRecord>> {
        self.query_picks(
            &format!("SELECT {PICK_COLUMNS} FROM picks WHERE week = ?1 ORDER BY game ASC"),
            Some(week),
        )
    }

    fn query_picks(&self, sql: &str, week: Option<u32>) -> Result<Vec<PickRecord>> {
        let mut stmt = self.conn.prepare(sql).context("prepare load picks query")?;
        let rows = match week {
            Some(week) => stmt.query_map(params![week], read_raw_pick),
            None => stmt.query_map([], read_raw_pick),
        }
        .context("query load picks")?;

        let mut out = Vec::new();
        for row in rows {
            let raw = row.context("decode pick row")?;
            out.push(raw.into_record().map_err(anyhow::Error::new)?);
        }
        Ok(out)
    }

    /// Overwrite the outcome fields of the given games. Re-applying the same
    /// updates leaves the table unchanged.
    pub fn apply_outcomes(&mut self, week: u32, updates: &[OutcomeUpdate]) -> Result<usize> {
        let tx = self
            .conn
            .transaction()
            .context("begin outcome transaction")?;
        let mut changed = 0usize;
        for update in updates {
            changed += tx
                .execute(
                    "UPDATE picks SET actual_winner = ?1, actual_total_points = ?2
                     WHERE week = ?3 AND game = ?4",
                    params![
                        update.winner.as_str(),
                        update.total_points,
                        week,
                        update.game
                    ],
                )
                .with_context(|| format!("update outcome week {week} game {}", update.game))?;
        }
        tx.commit().context("commit outcome transaction")?;
        Ok(changed)
    }

    pub fn replace_standings(&mut self, rows: &[StandingsRow]) -> Result<()> {
        let tx = self
            .conn
            .transaction()
            .context("begin standings transaction")?;
        tx.execute("DELETE FROM standings", [])
            .context("clear standings")?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO standings (week, participant, wins, losses, ties, win_pct)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .context("prepare standings insert")?;
            for row in rows {
                stmt.execute(params![
                    row.week,
                    row.participant,
                    row.wins,
                    row.losses,
                    row.ties,
                    row.win_pct
                ])
                .with_context(|| format!("insert standings {} {}", row.week, row.participant))?;
            }
        }
        tx.commit().context("commit standings transaction")?;
        Ok(())
    }

    pub fn load_standings(&self, week: Option<u32>) -> Result<Vec<StandingsRow>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT week, participant, wins, losses, ties, win_pct
                 FROM standings
                 WHERE ?1 IS NULL OR week = ?1
                 ORDER BY week ASC, wins DESC, participant ASC",
            )
            .context("prepare load standings query")?;
        let rows = stmt
            .query_map(params![week], |row| {
                Ok(StandingsRow {
                    week: row.get(0)?,
                    participant: row.get(1)?,
                    wins: row.get(2)?,
                    losses: row.get(3)?,
                    ties: row.get(4)?,
                    win_pct: row.get(5)?,
                })
            })
            .context("query load standings")?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode standings row")?);
        }
        Ok(out)
    }

    /// Append an entry to the run log.
    pub fn record_run(&self, kind: &str, started_at: &str, detail: &Value) -> Result<i64> {
        let detail_json = serde_json::to_string(detail).context("encode run detail")?;
        self.conn
            .execute(
                "INSERT INTO runs (kind, started_at, finished_at, detail_json)
                 VALUES (?1, ?2, ?3, ?4)",
                params![kind, started_at, Utc::now().to_rfc3339(), detail_json],
            )
            .context("insert run")?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn last_run(&self, kind: &str) -> Result<Option<Value>> {
        let raw = self
            .conn
            .query_row(
                "SELECT detail_json FROM runs WHERE kind = ?1 ORDER BY run_id DESC LIMIT 1",
                params![kind],
                |row| row.get::<_, String>(0),
            )
            .map(Some)
            .or_else(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
            .context("query last run")?;
        raw.map(|r| serde_json::from_str(&r).context("decode run detail"))
            .transpose()
    }
}

fn insert_pick(tx: &Transaction<'_>, r: &PickRecord) -> Result<()> {
    let picks = r.picks.map(|p| p.map(Side::as_str));
    tx.execute(
        &format!(
            "INSERT INTO picks ({PICK_COLUMNS}) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14, ?15, ?16,
                ?17, ?18
            )"
        ),
        params![
            r.week,
            r.game,
            r.away_team,
            r.home_team,
            picks[0],
            picks[1],
            picks[2],
            picks[3],
            picks[4],
            picks[5],
            r.tiebreakers[0],
            r.tiebreakers[1],
            r.tiebreakers[2],
            r.tiebreakers[3],
            r.tiebreakers[4],
            r.tiebreakers[5],
            r.actual_winner.map(Winner::as_str),
            r.actual_total_points,
        ],
    )
    .with_context(|| format!("insert pick week {} game {}", r.week, r.game))?;
    Ok(())
}

struct RawPick {
    week: u32,
    game: u32,
    away_team: String,
    home_team: String,
    picks: [Option<String>; PARTICIPANT_COUNT],
    tiebreakers: [Option<u32>; PARTICIPANT_COUNT],
    actual_winner: Option<String>,
    actual_total_points: Option<u32>,
}

fn read_raw_pick(row: &Row<'_>) -> rusqlite::Result<RawPick> {
    Ok(RawPick {
        week: row.get(0)?,
        game: row.get(1)?,
        away_team: row.get(2)?,
        home_team: row.get(3)?,
        picks: [
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
            row.get(9)?,
        ],
        tiebreakers: [
            row.get(10)?,
            row.get(11)?,
            row.get(12)?,
            row.get(13)?,
            row.get(14)?,
            row.get(15)?,
        ],
        actual_winner: row.get(16)?,
        actual_total_points: row.get(17)?,
    })
}

impl RawPick {
    fn into_record(self) -> std::result::Result<PickRecord, AggregationError> {
        let mut picks = [None; PARTICIPANT_COUNT];
        for (slot, raw) in self.picks.iter().enumerate() {
            picks[slot] = match raw.as_deref() {
                None => None,
                Some(value) => Some(Side::parse(value).ok_or_else(|| {
                    AggregationError(format!(
                        "week {} game {} slot {}: unknown pick {value:?}",
                        self.week,
                        self.game,
                        slot + 1
                    ))
                })?),
            };
        }
        let actual_winner = match self.actual_winner.as_deref() {
            None => None,
            Some(value) => Some(Winner::parse(value).ok_or_else(|| {
                AggregationError(format!(
                    "week {} game {}: unknown winner {value:?}",
                    self.week, self.game
                ))
            })?),
        };
        Ok(PickRecord {
            week: self.week,
            game: self.game,
            away_team: self.away_team,
            home_team: self.home_team,
            picks,
            tiebreakers: self.tiebreakers,
            actual_winner,
            actual_total_points: self.actual_total_points,
        })
    }
}

/// Unwrap an aggregation invariant failure from a store error, if that is
/// what it is.
pub fn as_aggregation_error(err: anyhow::Error) -> std::result::Result<AggregationError, anyhow::Error> {
    err.downcast::<AggregationError>()
}

#[cfg(test)]
impl PickStore {
    pub(crate) fn raw_execute(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql).context("raw execute")
    }
}
