//! Weekly results from the external scoreboard.

use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use log::{debug, info, warn};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Request};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FetchError;
use crate::http_client::http_client;
use crate::overrides::OutcomeOverrides;
use crate::picks::{Winner, composite_key, normalize_team_name};

pub const DEFAULT_SCOREBOARD_URL: &str =
    "https://site.api.espn.com/apis/site/v2/sports/football/nfl/scoreboard";
const REGULAR_SEASON: u32 = 2;

/// Outcome of one fetched game. `winner` stays `None` until the game is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub winner: Option<Winner>,
    pub total_points: Option<u32>,
}

/// Fetched results for one week, keyed by `"{away} @ {home}"`.
pub type WeekResults = BTreeMap<String, GameResult>;

/// Raw transport for one week's scoreboard document.
pub trait ScoreboardSource {
    fn fetch_week(&self, season: i32, week: u32) -> Result<String, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)))
    }

    /// Run `op` until it succeeds, fails permanently, or the attempts run out.
    pub fn run<T>(&self, mut op: impl FnMut(u32) -> Result<T, FetchError>) -> Result<T, FetchError> {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() => return Err(err),
                Err(err) if attempt >= max_attempts => {
                    return Err(FetchError::Exhausted {
                        attempts: attempt,
                        last: Box::new(err),
                    });
                }
                Err(err) => {
                    let delay = self.delay_for(attempt);
                    warn!("attempt {attempt} failed ({err}), retrying in {delay:?}");
                    thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

pub struct HttpScoreboard {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpScoreboard {
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.to_string(),
            retry,
        })
    }

    /// Query pairs are appended to whatever query the base URL already has.
    pub fn week_request(&self, season: i32, week: u32) -> Result<Request, FetchError> {
        self.client
            .get(&self.base_url)
            .query(&[
                ("seasontype", REGULAR_SEASON.to_string()),
                ("week", week.to_string()),
                ("dates", season.to_string()),
            ])
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))
    }
}

impl ScoreboardSource for HttpScoreboard {
    fn fetch_week(&self, season: i32, week: u32) -> Result<String, FetchError> {
        let request = self.week_request(season, week)?;
        self.retry.run(|attempt| {
            debug!("GET {} (attempt {attempt})", request.url());
            let req = request
                .try_clone()
                .ok_or_else(|| FetchError::Request("request cannot be retried".into()))?;
            let resp = self.client.execute(req)?;
            let status = resp.status();
            if status != StatusCode::OK {
                return Err(FetchError::Status {
                    status: status.as_u16(),
                });
            }
            Ok(resp.text()?)
        })
    }
}

#[derive(Debug, Deserialize)]
struct Scoreboard {
    events: Vec<ScoreboardEvent>,
}

#[derive(Debug, Deserialize)]
struct ScoreboardEvent {
    #[serde(default)]
    competitions: Vec<Competition>,
    #[serde(default)]
    status: Option<EventStatus>,
}

#[derive(Debug, Deserialize)]
struct Competition {
    #[serde(default)]
    competitors: Vec<Competitor>,
    #[serde(default)]
    status: Option<EventStatus>,
}

#[derive(Debug, Deserialize)]
struct Competitor {
    #[serde(rename = "homeAway")]
    home_away: Option<String>,
    team: Option<TeamRef>,
    #[serde(default)]
    score: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct TeamRef {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventStatus {
    #[serde(rename = "type")]
    kind: Option<StatusType>,
}

#[derive(Debug, Deserialize)]
struct StatusType {
    #[serde(default)]
    completed: bool,
}

impl EventStatus {
    fn completed(&self) -> bool {
        self.kind.as_ref().is_some_and(|k| k.completed)
    }
}

pub fn parse_scoreboard_json(raw: &str) -> Result<WeekResults, FetchError> {
    let board: Scoreboard =
        serde_json::from_str(raw.trim()).map_err(|e| FetchError::Payload(e.to_string()))?;

    let mut out = WeekResults::new();
    for (idx, event) in board.events.iter().enumerate() {
        match parse_event(event) {
            Some((key, result)) => {
                out.insert(key, result);
            }
            None => debug!("skipping scoreboard event {idx}: incomplete competitors"),
        }
    }
    Ok(out)
}

fn parse_event(event: &ScoreboardEvent) -> Option<(String, GameResult)> {
    let competition = event.competitions.first()?;
    let (home, away) = split_sides(&competition.competitors)?;

    let home_name = normalize_team_name(home.team.as_ref()?.display_name.as_deref()?);
    let away_name = normalize_team_name(away.team.as_ref()?.display_name.as_deref()?);
    if home_name.is_empty() || away_name.is_empty() {
        return None;
    }

    let completed = competition
        .status
        .as_ref()
        .or(event.status.as_ref())
        .is_some_and(EventStatus::completed);
    let home_score = home.score.as_ref().and_then(as_i64_any);
    let away_score = away.score.as_ref().and_then(as_i64_any);

    let (winner, total_points) = match (away_score, home_score) {
        (Some(a), Some(h)) => (
            completed.then(|| Winner::from_scores(a, h)),
            a.checked_add(h).and_then(|t| u32::try_from(t).ok()),
        ),
        _ => (None, None),
    };

    Some((
        composite_key(&away_name, &home_name),
        GameResult {
            winner,
            total_points,
        },
    ))
}

/// `(home, away)`. Uses `homeAway` when the feed provides it, otherwise the
/// feed lists home first.
fn split_sides(competitors: &[Competitor]) -> Option<(&Competitor, &Competitor)> {
    let tagged = |tag: &str| {
        competitors
            .iter()
            .find(|c| c.home_away.as_deref().is_some_and(|h| h.eq_ignore_ascii_case(tag)))
    };
    if let (Some(home), Some(away)) = (tagged("home"), tagged("away")) {
        return Some((home, away));
    }
    match competitors {
        [home, away, ..] => Some((home, away)),
        _ => None,
    }
}

fn as_i64_any(v: &Value) -> Option<i64> {
    if let Some(n) = v.as_i64() {
        return Some(n);
    }
    if let Some(f) = v.as_f64()
        && f.fract() == 0.0
    {
        return Some(f as i64);
    }
    v.as_str()?.trim().parse::<i64>().ok()
}

/// Scoreboard fetches with the known-outcomes fallback. Never fails: a week
/// that cannot be fetched yields an empty mapping unless an override exists.
pub struct ResultsFetcher {
    source: Box<dyn ScoreboardSource>,
    overrides: Box<dyn OutcomeOverrides>,
    season: i32,
}

impl ResultsFetcher {
    pub fn new(
        source: Box<dyn ScoreboardSource>,
        overrides: Box<dyn OutcomeOverrides>,
        season: i32,
    ) -> Self {
        Self {
            source,
            overrides,
            season,
        }
    }

    pub fn season(&self) -> i32 {
        self.season
    }

    pub fn try_fetch(&self, week: u32) -> Result<WeekResults, FetchError> {
        let raw = self.source.fetch_week(self.season, week)?;
        parse_scoreboard_json(&raw)
    }

    pub fn fetch(&self, week: u32) -> WeekResults {
        match self.try_fetch(week) {
            Ok(results) => {
                debug!("week {week}: fetched {} results", results.len());
                results
            }
            Err(err) => {
                warn!("week {week}: scoreboard fetch failed: {err}");
                match self.overrides.fallback(self.season, week) {
                    Some(known) => {
                        info!("week {week}: using {} known outcomes", known.len());
                        known
                    }
                    None => WeekResults::new(),
                }
            }
        }
    }
}
