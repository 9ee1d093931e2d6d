//! Error taxonomy for the engine
//!
//! Every failure surfaces as a typed `EngineError`. A query that legitimately
//! matches nothing is an `Ok` result with zero rows, never an error.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Field metadata required to build the schema is missing or malformed
    #[error("schema inference failed: {0}")]
    SchemaInference(String),

    /// A row does not have as many cells as the header has columns
    #[error("row {row} has {found} cells but header has {expected} columns")]
    DataIntegrity {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// A filter cannot be evaluated (bad operator or value for its domain)
    #[error("filter evaluation failed: {0}")]
    FilterEvaluation(String),

    /// No SQL translation exists for the requested shape
    #[error("SQL generation failed: {0}")]
    SqlGeneration(String),

    /// The SQL engine is unreachable or rejected the statement
    #[error("SQL execution failed: {0}")]
    SqlExecution(String),

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for EngineError {
    fn from(error: rusqlite::Error) -> Self {
        EngineError::SqlExecution(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
