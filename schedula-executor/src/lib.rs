//! The `Executor` capability: performs exactly one callback attempt and
//! classifies the outcome into the three buckets the core's status state
//! machine understands (`success` / `fail` / `error`).
//!
//! The Executor is stateless with respect to job state -- it never talks
//! to the `Repository`. All state transitions flow back through whichever
//! caller holds the `Repository` handle (the Dispatcher's workers).

mod http_executor;
mod recording;

pub use http_executor::HttpExecutor;
pub use recording::RecordingExecutor;

use async_trait::async_trait;
use schedula_common::Job;

/// The classified result of one callback attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The callee responded 200 or 202.
    Success,
    /// The callee responded, but with a status outside {200, 202}. An
    /// application-level rejection; the message is the status text.
    Fail(String),
    /// The request could not be sent or the response could not be read.
    /// A transport-level failure; the message is the error text.
    Error(String),
}

#[async_trait]
pub trait Executor: Send + Sync {
    /// Perform one callback attempt against `job.callback_url`.
    async fn execute(&self, job: &Job) -> Outcome;
}
