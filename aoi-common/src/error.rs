//! Error types for the aoi-slice exporter
//!
//! Every failure of an export is fatal: nothing is retried and nothing is
//! partially committed. [`Error::exit_code`] maps a failure onto the process
//! exit status the binaries report.

use strsim::{jaro_winkler, normalized_levenshtein};
use thiserror::Error;

/// Minimum combined similarity for a name suggestion.
const MIN_SUGGESTION_SCORE: f64 = 0.65;

/// Find the closest known name for a misspelled one.
///
/// Scores are 70% Jaro-Winkler plus 30% normalized Levenshtein, compared
/// case-insensitively. An exact case-insensitive match yields no suggestion.
pub fn suggest_name(input: &str, candidates: &[&str]) -> Option<String> {
    let input_lower = input.to_lowercase();
    if candidates
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(&input_lower))
    {
        return None;
    }

    let mut best_match = None;
    let mut best_score = 0.0f64;

    for candidate in candidates {
        let candidate_lower = candidate.to_lowercase();
        let jw_score = jaro_winkler(&input_lower, &candidate_lower);
        let lev_score = normalized_levenshtein(&input_lower, &candidate_lower);
        let score = (jw_score * 0.7) + (lev_score * 0.3);

        if score >= MIN_SUGGESTION_SCORE && score > best_score {
            best_score = score;
            best_match = Some(candidate.to_string());
        }
    }

    best_match
}

/// Main error type for aoi-slice operations
#[derive(Error, Debug)]
pub enum Error {
    /// Nearest-node lookup returned nothing (empty vertex table)
    #[error("No network node found near ({lon}, {lat})")]
    NoNetworkNodeFound { lon: f64, lat: f64 },

    /// The isochrone call failed or produced no usable polygon
    #[error("Isochrone computation failed: {0}")]
    IsochroneComputation(String),

    /// The tile builder exited unsuccessfully
    #[error("Tile build failed: {}", describe_exit(.code))]
    TileBuildFailed { code: Option<i32> },

    /// An external process could not be spawned, timed out, or produced nothing usable
    #[error("External process '{program}' failed: {message}")]
    ExternalProcess { program: String, message: String },

    /// Database connection or query failure
    #[error("Database error: {0}")]
    Database(String),

    /// Invalid or unusable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid command-line parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// GraphML encoding or decoding failure
    #[error("GraphML error: {0}")]
    GraphFormat(String),

    /// Tile archive packaging failure
    #[error("Archive error: {0}")]
    Archive(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("builder exited with status {code}"),
        None => "builder terminated by signal".to_string(),
    }
}

impl Error {
    /// Process exit code for this failure.
    ///
    /// A failed tile build hands back the builder's own status verbatim;
    /// everything else exits with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::TileBuildFailed { code: Some(code) } if *code != 0 => *code,
            _ => 1,
        }
    }
}

#[cfg(feature = "postgres")]
impl From<tokio_postgres::Error> for Error {
    fn from(err: tokio_postgres::Error) -> Self {
        match err.as_db_error() {
            Some(db) => Error::Database(format!("{} ({})", db.message(), db.code().code())),
            None => Error::Database(err.to_string()),
        }
    }
}

/// Convenience result type for aoi-slice operations
pub type Result<T> = std::result::Result<T, Error>;
