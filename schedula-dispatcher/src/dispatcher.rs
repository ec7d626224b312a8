use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use health::HealthHandle;
use schedula_common::Status;
use schedula_executor::Executor;
use schedula_repository::Repository;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::DispatcherConfig;
use crate::error::DispatcherError;
use crate::host::HostRouter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    New,
    Running,
    Stopped,
}

/// The tick loop, the per-host fan-out, and the worker pools.
///
/// Owns the clock subscription and the pool lifecycle; the `Repository`
/// owns all shared mutable state about jobs, and the `Executor` is pure
/// with respect to job state.
pub struct Dispatcher {
    repository: Arc<dyn Repository>,
    executor: Arc<dyn Executor>,
    config: DispatcherConfig,
    liveness: HealthHandle,
    host_router: Arc<HostRouter>,
    state: Mutex<State>,
    shutdown: Arc<Notify>,
    tick_task: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    pub fn new(
        repository: Arc<dyn Repository>,
        executor: Arc<dyn Executor>,
        config: DispatcherConfig,
        liveness: HealthHandle,
    ) -> Self {
        let host_router = Arc::new(HostRouter::new(config.clone()));
        Self {
            repository,
            executor,
            config,
            liveness,
            host_router,
            state: Mutex::new(State::New),
            shutdown: Arc::new(Notify::new()),
            tick_task: Mutex::new(None),
        }
    }

    /// `new -> running`. A second call returns
    /// [`DispatcherError::AlreadyStarted`] without disturbing the running
    /// loop.
    pub async fn start(&self) -> Result<(), DispatcherError> {
        {
            let mut state = self.state.lock().await;
            if *state != State::New {
                return Err(DispatcherError::AlreadyStarted);
            }
            *state = State::Running;
        }

        let repository = self.repository.clone();
        let executor = self.executor.clone();
        let config = self.config.clone();
        let liveness = self.liveness.clone();
        let host_router = self.host_router.clone();
        let shutdown = self.shutdown.clone();

        let handle = tokio::spawn(async move {
            run_tick_loop(repository, executor, config, liveness, host_router, shutdown).await;
        });

        *self.tick_task.lock().await = Some(handle);
        Ok(())
    }

    /// `running -> stopped`. Calling `stop` before `start` returns
    /// [`DispatcherError::NotStarted`]. Halts the clock, closes every
    /// `HostContext` queue, and lets in-flight workers drain.
    pub async fn stop(&self) -> Result<(), DispatcherError> {
        {
            let mut state = self.state.lock().await;
            if *state != State::Running {
                return Err(DispatcherError::NotStarted);
            }
            *state = State::Stopped;
        }

        self.shutdown.notify_waiters();
        if let Some(handle) = self.tick_task.lock().await.take() {
            let _ = handle.await;
        }
        self.host_router.close_all().await;
        Ok(())
    }

    #[cfg(test)]
    pub async fn host_count(&self) -> usize {
        self.host_router.host_count().await
    }
}

fn now_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs() as i64
}

#[allow(clippy::too_many_arguments)]
async fn run_tick_loop(
    repository: Arc<dyn Repository>,
    executor: Arc<dyn Executor>,
    config: DispatcherConfig,
    liveness: HealthHandle,
    host_router: Arc<HostRouter>,
    shutdown: Arc<Notify>,
) {
    let mut interval = tokio::time::interval(config.tick_interval);
    let last_tick = AtomicI64::new(now_seconds() - 1);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                liveness.report_healthy().await;

                let now = now_seconds();
                let from = last_tick.load(Ordering::SeqCst) + 1;
                last_tick.store(now, Ordering::SeqCst);

                // A coalesced platform ticker must not skip buckets: drain
                // every second between the last processed tick and now.
                for t in from..=now {
                    let repository = repository.clone();
                    let executor = executor.clone();
                    let host_router = host_router.clone();
                    tokio::spawn(async move {
                        dispatch_tick(t, repository, executor, host_router).await;
                    });
                }

                host_router.evict_idle().await;
            }
            _ = shutdown.notified() => break,
        }
    }
}

/// The per-tick dispatcher-helper: snapshot due jobs, route each by
/// destination host, and hand it to that host's queue. Runs as a
/// short-lived spawned task so the tick loop itself never blocks on
/// repository or channel I/O.
async fn dispatch_tick(
    t: i64,
    repository: Arc<dyn Repository>,
    executor: Arc<dyn Executor>,
    host_router: Arc<HostRouter>,
) {
    let jobs = match repository.list_by_schedule(t) {
        Ok(jobs) => jobs,
        Err(e) => {
            warn!(tick = t, error = %e, "failed to list jobs due at tick");
            return;
        }
    };

    if jobs.is_empty() {
        return;
    }

    debug!(tick = t, count = jobs.len(), "launching callbacks scheduled at tick");

    for job in jobs {
        if !job.is_executable() {
            continue;
        }

        match job.callback_host() {
            Ok(host) => {
                if host_router
                    .dispatch(&host, job.clone(), &repository, &executor)
                    .await
                    .is_err()
                {
                    warn!(job_id = job.id, host, "host queue closed, dropping dispatch");
                }
            }
            Err(e) => {
                warn!(job_id = job.id, url = job.callback_url, error = %e, "unparseable callback url");
                if let Err(record_err) =
                    repository.record_execution(&job.id, now_seconds(), Status::Error, &e.to_string())
                {
                    warn!(job_id = job.id, error = %record_err, "failed to record url parse error");
                }
            }
        }
    }
}
