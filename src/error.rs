//! Error taxonomy for ingestion, fetching, reconciliation and aggregation.

use thiserror::Error;

/// The grid or workbook violates the layout assumptions.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("cannot open workbook {path}: {source}")]
    Workbook {
        path: String,
        #[source]
        source: calamine::Error,
    },

    #[error("cannot read sheet {sheet}: {source}")]
    Sheet {
        sheet: String,
        #[source]
        source: calamine::Error,
    },

    #[error("sheet {sheet} does not name a positive week")]
    SheetWeek { sheet: String },

    #[error("sheet {sheet} repeats week {week}")]
    DuplicateWeek { sheet: String, week: u32 },
}

/// The scoreboard could not be fetched or understood.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid scoreboard request: {0}")]
    Request(String),

    #[error("http status {status}")]
    Status { status: u16 },

    #[error("malformed scoreboard payload: {0}")]
    Payload(String),

    #[error("failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout(_) | FetchError::Network(_) => true,
            FetchError::Status { status } => matches!(status, 429 | 500 | 502 | 503 | 504),
            FetchError::Request(_) | FetchError::Payload(_) | FetchError::Exhausted { .. } => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::Status {
                status: status.as_u16(),
            }
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Stored pick data that should be impossible if ingestion and
/// reconciliation are the only writers.
#[derive(Error, Debug)]
#[error("aggregation invariant violated: {0}")]
pub struct AggregationError(pub String);

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("ingestion failed: {0}")]
    Parse(#[from] ParseError),

    #[error("ingestion failed: {0:#}")]
    Store(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("reconciliation failed: {0:#}")]
    Store(#[from] anyhow::Error),

    #[error("reconciliation failed: {0}")]
    Aggregation(#[from] AggregationError),
}
