//! Pieces shared by the in-process table implementations.

use std::sync::{Mutex, MutexGuard};

/// Failures surfaced by any backing table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("foreign key constraint violated on table \"{table}\"")]
    ForeignKey { table: &'static str },
    #[error("table \"{table}\" already holds its single row")]
    Duplicate { table: &'static str },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("table lock poisoned".to_string()))
}
