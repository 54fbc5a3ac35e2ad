//! Error taxonomy for the aggregation pipeline.
//!
//! Only [`LeaderboardError::NoParticipantData`] aborts a whole run. Schema and
//! column-boundary failures are scoped to one period and are turned into
//! diagnostics by the pipeline; a column-boundary failure never leaves the
//! extractor as an error.

use thiserror::Error;

/// A mandatory identity or score column is missing from a period source.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("period '{period}': required column '{column}' not found")]
pub struct SchemaError {
    pub period: String,
    pub column: String,
}

/// The "total" column that closes the club-activity block could not be located.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("period '{period}': no 'total' column found, club activity block has no end boundary")]
pub struct ColumnBoundaryError {
    pub period: String,
}

#[derive(Error, Debug)]
pub enum LeaderboardError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Workbook error in {path}: {message}")]
    Workbook { path: String, message: String },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("No valid participant data in any period ({periods_failed} of {periods_total} periods failed)")]
    NoParticipantData {
        periods_failed: usize,
        periods_total: usize,
    },
}

pub type Result<T> = std::result::Result<T, LeaderboardError>;
