use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use schedula_common::Job;
use schedula_executor::Executor;
use schedula_repository::Repository;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use crate::config::DispatcherConfig;
use crate::worker;

/// Per-destination-host queue and worker group.
///
/// A single shared worker pool lets a slow destination starve all others;
/// partitioning by destination host bounds the blast radius of a
/// misbehaving callee to its own `HostContext`.
pub struct HostContext {
    sender: mpsc::Sender<Job>,
    last_used: Mutex<Instant>,
}

impl HostContext {
    /// Spawn a fresh context for `host`: a bounded channel and
    /// `workers_per_host` long-lived worker tasks, spawned exactly once.
    fn spawn(
        host: String,
        repository: Arc<dyn Repository>,
        executor: Arc<dyn Executor>,
        config: &DispatcherConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.host_queue_capacity);
        let rx = Arc::new(Mutex::new(rx));

        for worker_index in 0..config.workers_per_host {
            let rx = rx.clone();
            let repository = repository.clone();
            let executor = executor.clone();
            let host = host.clone();
            tokio::spawn(async move {
                worker::run(worker_index, host, rx, repository, executor).await;
            });
        }

        info!(host, workers = config.workers_per_host, "spawned host context");

        Self {
            sender: tx,
            last_used: Mutex::new(Instant::now()),
        }
    }

    /// Enqueue a job for this host. The reference policy is to deliver
    /// synchronously but from the per-tick helper task (never from the
    /// tick loop itself), so a full queue applies backpressure to that
    /// helper without stalling the clock.
    async fn enqueue(&self, job: Job) -> Result<(), mpsc::error::SendError<Job>> {
        *self.last_used.lock().await = Instant::now();
        self.sender.send(job).await
    }

    async fn idle_for(&self) -> Duration {
        self.last_used.lock().await.elapsed()
    }
}

/// The Dispatcher-owned table mapping destination host to `HostContext`.
/// Contexts are created lazily on first use and swept for eviction once
/// per tick.
pub struct HostRouter {
    contexts: Mutex<HashMap<String, Arc<HostContext>>>,
    config: DispatcherConfig,
}

impl HostRouter {
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            contexts: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Look up the `HostContext` for `host`, creating it if this is the
    /// first job seen for that host. Guarded by a single lock so
    /// concurrent per-tick helpers never double-create a context for the
    /// same host.
    pub async fn get_or_create(
        &self,
        host: &str,
        repository: &Arc<dyn Repository>,
        executor: &Arc<dyn Executor>,
    ) -> Arc<HostContext> {
        let mut contexts = self.contexts.lock().await;
        if let Some(existing) = contexts.get(host) {
            return existing.clone();
        }
        let context = Arc::new(HostContext::spawn(
            host.to_owned(),
            repository.clone(),
            executor.clone(),
            &self.config,
        ));
        contexts.insert(host.to_owned(), context.clone());
        context
    }

    /// Deliver `job` to the host's queue, creating the `HostContext` on
    /// first use.
    pub async fn dispatch(
        &self,
        host: &str,
        job: Job,
        repository: &Arc<dyn Repository>,
        executor: &Arc<dyn Executor>,
    ) -> Result<(), mpsc::error::SendError<Job>> {
        let context = self.get_or_create(host, repository, executor).await;
        context.enqueue(job).await
    }

    /// Evict any `HostContext` idle for longer than
    /// `evict_after_idle_ticks * tick_interval`. Dropping the entry drops
    /// the last `Arc`/`Sender` clone the router holds; once in-flight
    /// workers finish their current job, `recv` returns `None` and they
    /// exit.
    pub async fn evict_idle(&self) {
        let threshold = self.config.tick_interval * self.config.evict_after_idle_ticks as u32;
        let mut contexts = self.contexts.lock().await;
        let mut evictable = Vec::new();
        for (host, context) in contexts.iter() {
            if context.idle_for().await > threshold {
                evictable.push(host.clone());
            }
        }
        for host in evictable {
            debug!(host, "evicting idle host context");
            contexts.remove(&host);
        }
    }

    /// Close every `HostContext`'s queue so their workers drain and exit,
    /// used by `Dispatcher::stop`.
    pub async fn close_all(&self) {
        let mut contexts = self.contexts.lock().await;
        contexts.clear();
    }

    #[cfg(test)]
    pub async fn host_count(&self) -> usize {
        self.contexts.lock().await.len()
    }
}
