use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::anyhow;
use calamine::{Reader, open_workbook_auto};
use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::json;

use crate::error::{IngestionError, ParseError};
use crate::grid::Grid;
use crate::picks::PickRecord;
use crate::sheet_scan::{ParsedWeek, RowWarning, SheetLayout, parse_week};
use crate::store::PickStore;

const WEEK_SHEET_PREFIX: &str = "Sheet";

/// What to do when one week sheet cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SheetFailurePolicy {
    /// Fail the whole import; stored picks stay as they were.
    #[default]
    Abort,
    /// Skip the sheet and keep whatever was stored for its week.
    SkipSheet,
}

impl FromStr for SheetFailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip" | "skip-sheet" | "skip_sheet" => Ok(Self::SkipSheet),
            other => Err(anyhow!("unknown sheet failure policy {other:?}")),
        }
    }
}

impl fmt::Display for SheetFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Abort => "abort",
            Self::SkipSheet => "skip",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSheet {
    pub sheet: String,
    pub week: Option<u32>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekWarning {
    pub week: u32,
    #[serde(flatten)]
    pub warning: RowWarning,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub games_per_week: Vec<(u32, usize)>,
    pub records: usize,
    pub skipped: Vec<SkippedSheet>,
    pub warnings: Vec<WeekWarning>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetKind {
    Week(u32),
    Other,
}

/// `Sheet<N>` names week `N`; anything else is an auxiliary sheet.
pub fn classify_sheet(name: &str) -> Result<SheetKind, ParseError> {
    let Some(digits) = name.strip_prefix(WEEK_SHEET_PREFIX) else {
        return Ok(SheetKind::Other);
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Ok(SheetKind::Other);
    }
    match digits.parse::<u32>() {
        Ok(week) if week > 0 => Ok(SheetKind::Week(week)),
        _ => Err(ParseError::SheetWeek {
            sheet: name.to_string(),
        }),
    }
}

/// Weeks parsed from a workbook, plus the sheets that were skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedWorkbook {
    pub weeks: Vec<ParsedWeek>,
    pub skipped: Vec<SkippedSheet>,
}

/// Parse already-loaded sheets in workbook order.
pub fn parse_sheets<I>(
    sheets: I,
    layout: &SheetLayout,
    policy: SheetFailurePolicy,
) -> Result<ParsedWorkbook, ParseError>
where
    I: IntoIterator<Item = (String, Result<Grid, ParseError>)>,
{
    let mut out = ParsedWorkbook::default();
    let mut seen = HashSet::new();

    for (name, grid) in sheets {
        let attempt = classify_sheet(&name).and_then(|kind| match kind {
            SheetKind::Other => Ok(None),
            SheetKind::Week(week) if !seen.insert(week) => Err(ParseError::DuplicateWeek {
                sheet: name.clone(),
                week,
            }),
            SheetKind::Week(week) => grid.map(|g| Some(parse_week(week, &g, layout))),
        });

        match attempt {
            Ok(Some(parsed)) => out.weeks.push(parsed),
            Ok(None) => debug!("ignoring sheet {name:?}"),
            Err(err) if policy == SheetFailurePolicy::SkipSheet => {
                warn!("skipping sheet {name:?}: {err}");
                let week = match &err {
                    ParseError::DuplicateWeek { .. } => None,
                    _ => classify_sheet(&name).ok().and_then(|k| match k {
                        SheetKind::Week(w) => Some(w),
                        SheetKind::Other => None,
                    }),
                };
                out.skipped.push(SkippedSheet {
                    sheet: name,
                    week,
                    reason: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }
    }
    Ok(out)
}

pub fn read_workbook(
    path: &Path,
    layout: &SheetLayout,
    policy: SheetFailurePolicy,
) -> Result<ParsedWorkbook, ParseError> {
    let mut workbook = open_workbook_auto(path).map_err(|source| ParseError::Workbook {
        path: path.display().to_string(),
        source,
    })?;
    let names = workbook.sheet_names();
    let sheets = names
        .into_iter()
        .map(|name| {
            let grid = match classify_sheet(&name) {
                Ok(SheetKind::Week(_)) => workbook
                    .worksheet_range(&name)
                    .map(|range| Grid::from_range(&range))
                    .map_err(|source| ParseError::Sheet {
                        sheet: name.clone(),
                        source,
                    }),
                _ => Ok(Grid::default()),
            };
            (name, grid)
        })
        .collect::<Vec<_>>();
    parse_sheets(sheets, layout, policy)
}

/// Replace all stored picks with the contents of the workbook at `path`.
pub fn ingest(
    store: &mut PickStore,
    path: &Path,
    layout: &SheetLayout,
    policy: SheetFailurePolicy,
) -> Result<IngestSummary, IngestionError> {
    let started_at = Utc::now().to_rfc3339();
    info!("ingesting {} (on sheet failure: {policy})", path.display());
    let parsed = read_workbook(path, layout, policy)?;

    let retain = parsed
        .skipped
        .iter()
        .filter_map(|s| s.week)
        .collect::<Vec<_>>();
    let records = parsed
        .weeks
        .iter()
        .flat_map(|w| w.records.iter().cloned())
        .collect::<Vec<PickRecord>>();
    let written = store.replace_picks(&records, &retain)?;

    let summary = IngestSummary {
        games_per_week: parsed
            .weeks
            .iter()
            .map(|w| (w.week, w.records.len()))
            .collect(),
        records: written,
        skipped: parsed.skipped,
        warnings: parsed
            .weeks
            .into_iter()
            .flat_map(|w| {
                let week = w.week;
                w.warnings
                    .into_iter()
                    .map(move |warning| WeekWarning { week, warning })
            })
            .collect(),
    };
    info!(
        "ingested {} pick records across {} weeks ({} sheets skipped, {} row warnings)",
        summary.records,
        summary.games_per_week.len(),
        summary.skipped.len(),
        summary.warnings.len()
    );
    store.record_run(
        "ingest",
        &started_at,
        &json!({
            "path": path.display().to_string(),
            "policy": policy,
            "summary": summary,
        }),
    )?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Cell;
    use crate::sheet_scan::{AWAY_TEAM_COLUMN, HOME_TEAM_COLUMN};

    fn week_grid(away: &str, home: &str) -> Grid {
        let mut grid = Grid::default();
        grid.set(2, AWAY_TEAM_COLUMN, Cell::from(away));
        grid.set(2, HOME_TEAM_COLUMN, Cell::from(home));
        grid
    }

    fn broken(sheet: &str) -> Result<Grid, ParseError> {
        Err(ParseError::SheetWeek {
            sheet: sheet.to_string(),
        })
    }

    #[test]
    fn sheet_names_map_to_weeks() {
        assert_eq!(classify_sheet("Sheet1").unwrap(), SheetKind::Week(1));
        assert_eq!(classify_sheet("Sheet17").unwrap(), SheetKind::Week(17));
        assert_eq!(classify_sheet("Cumulative").unwrap(), SheetKind::Other);
        assert_eq!(classify_sheet("Sheet").unwrap(), SheetKind::Other);
        assert_eq!(classify_sheet("Sheet1a").unwrap(), SheetKind::Other);
        assert_eq!(classify_sheet("sheet1").unwrap(), SheetKind::Other);
        assert!(classify_sheet("Sheet0").is_err());
    }

    #[test]
    fn auxiliary_sheets_are_ignored() {
        let parsed = parse_sheets(
            vec![
                ("Cumulative".to_string(), Ok(week_grid("X", "Y"))),
                ("Sheet2".to_string(), Ok(week_grid("Team A", "Team B"))),
            ],
            &SheetLayout::STANDARD,
            SheetFailurePolicy::Abort,
        )
        .unwrap();
        assert_eq!(parsed.weeks.len(), 1);
        assert_eq!(parsed.weeks[0].week, 2);
    }

    #[test]
    fn abort_policy_fails_on_first_bad_sheet() {
        let res = parse_sheets(
            vec![
                ("Sheet1".to_string(), Ok(week_grid("Team A", "Team B"))),
                ("Sheet2".to_string(), broken("Sheet2")),
            ],
            &SheetLayout::STANDARD,
            SheetFailurePolicy::Abort,
        );
        assert!(res.is_err());
    }

    #[test]
    fn skip_policy_records_the_week_to_retain() {
        let parsed = parse_sheets(
            vec![
                ("Sheet1".to_string(), Ok(week_grid("Team A", "Team B"))),
                ("Sheet2".to_string(), broken("Sheet2")),
                ("Sheet01".to_string(), Ok(week_grid("Team C", "Team D"))),
            ],
            &SheetLayout::STANDARD,
            SheetFailurePolicy::SkipSheet,
        )
        .unwrap();
        assert_eq!(parsed.weeks.len(), 1);
        assert_eq!(parsed.skipped.len(), 2);
        assert_eq!(parsed.skipped[0].week, Some(2));
        assert_eq!(parsed.skipped[1].week, None);
    }

    #[test]
    fn policy_parses_from_config_strings() {
        assert_eq!(
            "abort".parse::<SheetFailurePolicy>().unwrap(),
            SheetFailurePolicy::Abort
        );
        assert_eq!(
            "Skip".parse::<SheetFailurePolicy>().unwrap(),
            SheetFailurePolicy::SkipSheet
        );
        assert!("maybe".parse::<SheetFailurePolicy>().is_err());
    }
}
