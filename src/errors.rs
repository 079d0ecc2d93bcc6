
use std::path::PathBuf;

/// Errors raised by the pipeline stages.
/// Structural errors abort a run before any output is written; `MalformedRow` and `MissingColumn` are recovered locally by the caller.
#[derive(thiserror::Error, Debug)]
pub enum CohortError {
    #[error("no input tables were provided")]
    NoInput,
    #[error("schema mismatch in {filename:?}: expected {expected} columns, found {found}")]
    SchemaMismatch { filename: PathBuf, expected: usize, found: usize },
    #[error("schema mismatch in {filename:?}: column #{index} is {found:?}, expected {expected:?}")]
    ColumnOrderMismatch { filename: PathBuf, index: usize, expected: String, found: String },
    #[error("invalid tier level {level:?}, expected one of: all, 1, 2, 3, 4")]
    InvalidTierLevel { level: String },
    #[error("line {line}: expected {expected} columns, found {found}")]
    MalformedRow { line: u64, expected: usize, found: usize },
    #[error("unrecognized column {column:?}")]
    MissingColumn { column: String },
    #[error("required column {column:?} is missing from {filename:?}")]
    MissingRequiredColumn { filename: PathBuf, column: String },
}
