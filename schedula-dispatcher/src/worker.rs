use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use schedula_common::{Job, Status};
use schedula_executor::{Executor, Outcome};
use schedula_repository::Repository;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, warn};

/// One worker's dequeue-execute-record loop for a single `HostContext`.
///
/// Workers never mutate a job directly; every state transition flows
/// through `Repository::record_execution`. Ordering within one host's
/// queue is FIFO, but workers are indistinguishable consumers so ordering
/// across workers for the same host is not strict.
pub async fn run(
    worker_index: usize,
    host: String,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    repository: Arc<dyn Repository>,
    executor: Arc<dyn Executor>,
) {
    loop {
        let job = {
            let mut rx = receiver.lock().await;
            rx.recv().await
        };
        let Some(job) = job else {
            break;
        };

        process(&job, &host, &repository, &executor).await;
    }

    tracing::debug!(host, worker_index, "worker exiting, queue closed");
}

async fn process(job: &Job, host: &str, repository: &Arc<dyn Repository>, executor: &Arc<dyn Executor>) {
    let labels = [("host", host.to_owned())];
    metrics::counter!("dispatcher_jobs_dispatched_total", &labels).increment(1);

    let started = std::time::Instant::now();
    let outcome = executor.execute(job).await;
    let elapsed = started.elapsed().as_secs_f64();

    let (status, message) = match outcome {
        Outcome::Success => (Status::Success, String::new()),
        Outcome::Fail(message) => (Status::Fail, message),
        Outcome::Error(message) => (Status::Error, message),
    };

    let outcome_labels = [("host", host.to_owned()), ("status", status.to_string())];
    metrics::counter!("dispatcher_jobs_completed_total", &outcome_labels).increment(1);
    metrics::histogram!("dispatcher_job_duration_seconds", &labels).record(elapsed);

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs() as i64;

    if let Err(e) = repository.record_execution(&job.id, now, status, &message) {
        warn!(job_id = job.id, host, error = %e, "failed to record execution");
    }

    if status == Status::Error {
        error!(job_id = job.id, host, message, "callback attempt failed with a transport error");
    }
}
