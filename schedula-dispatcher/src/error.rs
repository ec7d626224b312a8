use thiserror::Error;

/// Lifecycle errors for the Dispatcher's `new -> running -> stopped` state
/// machine. Never returned from the dispatch path itself -- per-job and
/// per-tick errors are recorded as `Execution` rows or logged, not
/// propagated as `DispatcherError`.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DispatcherError {
    #[error("dispatcher already started")]
    AlreadyStarted,
    #[error("dispatcher was not started, cannot stop")]
    NotStarted,
}
