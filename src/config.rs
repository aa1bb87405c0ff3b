use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use log::info;

use crate::http_client::REQUEST_TIMEOUT_SECS;
use crate::ingest::SheetFailurePolicy;
use crate::overrides::{KnownOutcomes, NoOverrides, OutcomeOverrides};
use crate::scoreboard::DEFAULT_SCOREBOARD_URL;
use crate::store::{DEFAULT_BUSY_TIMEOUT, default_db_path};

pub const DEFAULT_SEASON: i32 = 2024;
pub const DEFAULT_SEASON_WEEKS: u32 = 18;

/// Where the fallback results come from when the scoreboard is down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KnownOutcomesSource {
    Builtin,
    Off,
    File(PathBuf),
}

impl KnownOutcomesSource {
    fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" | "builtin" => Self::Builtin,
            "off" | "none" => Self::Off,
            path => Self::File(PathBuf::from(path)),
        }
    }

    /// A file table is read as belonging to `season`.
    pub fn load(&self, season: i32) -> Result<Box<dyn OutcomeOverrides>> {
        Ok(match self {
            Self::Builtin => {
                let known = KnownOutcomes::builtin();
                if known.season() != season {
                    info!(
                        "built-in known outcomes cover season {} only, none apply to {season}",
                        known.season()
                    );
                }
                Box::new(known)
            }
            Self::Off => Box::new(NoOverrides),
            Self::File(path) => Box::new(KnownOutcomes::from_json_file(path, season)?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `None` means the cache-directory default, resolved by [`Config::db_path`].
    pub db_path: Option<PathBuf>,
    pub season: i32,
    pub season_weeks: u32,
    pub scoreboard_url: String,
    pub http_timeout: Duration,
    pub busy_timeout: Duration,
    pub sheet_failure: SheetFailurePolicy,
    pub known_outcomes: KnownOutcomesSource,
}

impl Config {
    /// Read `PICKEM_*` variables, after loading `.env.local` and `.env`.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let db_path = var("PICKEM_DB").map(|path| PathBuf::from(path.trim()));
        let season = parse_or(var("PICKEM_SEASON"), "PICKEM_SEASON", DEFAULT_SEASON)?;
        let season_weeks = parse_or(
            var("PICKEM_SEASON_WEEKS"),
            "PICKEM_SEASON_WEEKS",
            DEFAULT_SEASON_WEEKS,
        )?;
        if season_weeks == 0 {
            return Err(anyhow!("PICKEM_SEASON_WEEKS must be positive"));
        }
        let http_timeout = Duration::from_secs(
            parse_or(
                var("PICKEM_HTTP_TIMEOUT_SECS"),
                "PICKEM_HTTP_TIMEOUT_SECS",
                REQUEST_TIMEOUT_SECS,
            )?
            .max(1),
        );
        let busy_timeout = match var("PICKEM_BUSY_TIMEOUT_MS") {
            Some(raw) => Duration::from_millis(
                raw.trim()
                    .parse::<u64>()
                    .with_context(|| format!("invalid PICKEM_BUSY_TIMEOUT_MS {raw:?}"))?,
            ),
            None => DEFAULT_BUSY_TIMEOUT,
        };
        let sheet_failure = match var("PICKEM_SHEET_FAILURE") {
            Some(raw) => raw.parse()?,
            None => SheetFailurePolicy::default(),
        };

        Ok(Self {
            db_path,
            season,
            season_weeks,
            scoreboard_url: var("PICKEM_SCOREBOARD_URL")
                .map(|u| u.trim().to_string())
                .unwrap_or_else(|| DEFAULT_SCOREBOARD_URL.to_string()),
            http_timeout,
            busy_timeout,
            sheet_failure,
            known_outcomes: KnownOutcomesSource::parse(
                var("PICKEM_KNOWN_OUTCOMES").as_deref().unwrap_or(""),
            ),
        })
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => default_db_path().context("unable to resolve sqlite path"),
        }
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow!("invalid {key} {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = config(&[("PICKEM_DB", "/tmp/picks.sqlite")]).unwrap();
        assert_eq!(cfg.season, DEFAULT_SEASON);
        assert_eq!(cfg.season_weeks, 18);
        assert_eq!(cfg.scoreboard_url, DEFAULT_SCOREBOARD_URL);
        assert_eq!(cfg.http_timeout, Duration::from_secs(10));
        assert_eq!(cfg.busy_timeout, Duration::from_millis(5000));
        assert_eq!(cfg.sheet_failure, SheetFailurePolicy::Abort);
        assert_eq!(cfg.known_outcomes, KnownOutcomesSource::Builtin);
    }

    #[test]
    fn values_override_defaults() {
        let cfg = config(&[
            ("PICKEM_DB", "/tmp/picks.sqlite"),
            ("PICKEM_SEASON", "2025"),
            ("PICKEM_SEASON_WEEKS", "17"),
            ("PICKEM_SHEET_FAILURE", "skip"),
            ("PICKEM_KNOWN_OUTCOMES", "off"),
            ("PICKEM_BUSY_TIMEOUT_MS", "250"),
        ])
        .unwrap();
        assert_eq!(cfg.season, 2025);
        assert_eq!(cfg.season_weeks, 17);
        assert_eq!(cfg.sheet_failure, SheetFailurePolicy::SkipSheet);
        assert_eq!(cfg.known_outcomes, KnownOutcomesSource::Off);
        assert_eq!(cfg.busy_timeout, Duration::from_millis(250));
    }

    #[test]
    fn db_path_resolves_lazily() {
        let mut cfg = config(&[]).unwrap();
        assert_eq!(cfg.db_path, None);
        cfg.db_path = Some(PathBuf::from("x.sqlite"));
        assert_eq!(cfg.db_path().unwrap(), PathBuf::from("x.sqlite"));

        let cfg = config(&[("PICKEM_DB", " /tmp/picks.sqlite ")]).unwrap();
        assert_eq!(cfg.db_path().unwrap(), PathBuf::from("/tmp/picks.sqlite"));
    }

    #[test]
    fn builtin_outcomes_only_apply_to_their_season() {
        let overrides = KnownOutcomesSource::Builtin.load(2025).unwrap();
        assert!(overrides.fallback(2025, 1).is_none());
        let overrides = KnownOutcomesSource::Builtin.load(2024).unwrap();
        assert_eq!(overrides.fallback(2024, 1).map(|w| w.len()), Some(16));
    }

    #[test]
    fn bad_numbers_are_rejected() {
        assert!(config(&[("PICKEM_DB", "x"), ("PICKEM_SEASON", "twenty")]).is_err());
        assert!(config(&[("PICKEM_DB", "x"), ("PICKEM_SEASON_WEEKS", "0")]).is_err());
    }
}
