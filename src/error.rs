use thiserror::Error;

/// Failures that cross the boundary of the data-access layer.
///
/// Ordinary "nothing happened" outcomes (storing a clean record, deleting a
/// record that does not exist, a keyed write that touched zero rows) are not
/// errors; they come back as `Ok(false)` or as an unchanged value.
#[derive(Error, Debug)]
pub enum RowkeeperError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, RowkeeperError>;

// Helper conversions
impl From<rusqlite::Error> for RowkeeperError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Connection(e.to_string())
    }
}

impl From<config::ConfigError> for RowkeeperError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for RowkeeperError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Lock(e.to_string())
    }
}
