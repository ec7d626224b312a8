use std::sync::Mutex;

use async_trait::async_trait;
use schedula_common::Job;

use crate::{Executor, Outcome};

/// A test double that returns a fixed [`Outcome`] and records every job id
/// it was invoked with, in call order.
///
/// Used by `schedula-dispatcher`'s unit tests to exercise host routing and
/// worker fan-out without depending on the network.
pub struct RecordingExecutor {
    outcome: Outcome,
    calls: Mutex<Vec<String>>,
}

impl RecordingExecutor {
    pub fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("recording executor lock poisoned").clone()
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn execute(&self, job: &Job) -> Outcome {
        self.calls
            .lock()
            .expect("recording executor lock poisoned")
            .push(job.id.clone());
        self.outcome.clone()
    }
}
