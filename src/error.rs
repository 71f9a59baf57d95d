use thiserror::Error;

/// Configuration problems that abort a cleaning run before any row is read.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CleanError {
    #[error("key column `{column}` is not declared in the column type map")]
    UntypedKeyColumn { column: String },
    #[error("key column `{column}` is listed more than once")]
    DuplicateKeyColumn { column: String },
}

pub type Result<T> = std::result::Result<T, CleanError>;
