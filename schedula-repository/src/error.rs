use thiserror::Error;

/// Enumeration of errors the `Repository` capability can return.
///
/// The repository never panics on an unknown id -- lookups that miss
/// return [`RepositoryError::NotFound`] rather than unwinding, so the
/// Dispatcher's tick loop can log and move on to the next job.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("job '{0}' not found")]
    NotFound(String),
    #[error("job is inserted with a non-empty id")]
    NonEmptyId,
    #[error("invalid job schedule: {0}")]
    InvalidSchedule(#[from] schedula_common::ScheduleError),
    #[error("repository lock was poisoned")]
    LockPoisoned,
}
