//! The job store: a `Repository` capability owning all job state, plus an
//! in-process reference backend.
//!
//! The Dispatcher and the admission API both depend on the `Repository`
//! trait, never on `InMemoryRepository` directly, so either can be driven
//! by a different storage backend (a key-value store, a relational
//! database) without changing a line outside this crate.

mod error;
mod memory;

pub use error::RepositoryError;
pub use memory::InMemoryRepository;

use schedula_common::{Job, Status};

/// Default page size applied when a caller asks for more than `PAGE_MAX`
/// jobs in one `list` call.
pub const PAGE_MAX: i64 = 100;

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Owns all job state: the by-id index, the by-activation-timestamp index,
/// and the insertion-ordered sequence used for pagination.
///
/// Implementations must be safe to share across the Dispatcher's tick loop
/// and every worker task, typically behind an `Arc`.
pub trait Repository: Send + Sync {
    /// Insert a new job. `job.id` must be empty and `job.schedule` must be
    /// valid; the returned job has a freshly assigned `id` and
    /// `status = pending`.
    fn add(&self, job: Job) -> RepositoryResult<Job>;

    /// Look up a job by id. Returns a job with an empty `id` field (the
    /// "not found" sentinel) rather than erroring when `id` is unknown --
    /// only a genuine storage failure is an `Err`.
    fn get(&self, id: &str) -> RepositoryResult<Job>;

    /// Return an insertion-ordered slice of jobs. `skip` is clamped to the
    /// total count; `limit` is clamped to `[0, PAGE_MAX]`. A negative
    /// `limit` yields an empty result rather than an error.
    fn list(&self, skip: i64, limit: i64) -> RepositoryResult<Vec<Job>>;

    /// Remove a job from both indices, returning the removed job.
    fn remove(&self, id: &str) -> RepositoryResult<Job>;

    /// Set a job's status to `canceled`.
    fn cancel(&self, id: &str) -> RepositoryResult<Job>;

    /// Append an execution to a job and update its status to match.
    fn record_execution(
        &self,
        id: &str,
        timestamp: i64,
        status: Status,
        message: &str,
    ) -> RepositoryResult<Job>;

    /// Total number of jobs currently tracked.
    fn count(&self) -> usize;

    /// Snapshot of jobs whose activation bucket equals `timestamp`. Always
    /// succeeds with an empty vector if the bucket has no jobs.
    fn list_by_schedule(&self, timestamp: i64) -> RepositoryResult<Vec<Job>>;
}
