use std::time::Duration;

/// Tunables for the tick loop, per-host worker pools, and HostContext
/// eviction.
///
/// This is a plain struct constructed by the binary from parsed CLI flags
/// -- the dispatcher crate itself has no opinion on where these values
/// come from.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Fixed worker count spawned for every `HostContext`.
    pub workers_per_host: usize,
    /// Bounded channel capacity for each `HostContext`'s pending-job
    /// queue.
    pub host_queue_capacity: usize,
    /// How often the clock ticks. Each tick carries the wall-clock time
    /// truncated to seconds, used as the activation-bucket lookup key.
    pub tick_interval: Duration,
    /// Per-attempt HTTP timeout, forwarded to the `Executor`.
    pub request_timeout: Duration,
    /// A `HostContext` idle for this many ticks is evicted: its queue is
    /// closed, its workers drain and exit, and the host entry is dropped
    /// so a future job for that host gets a fresh context.
    pub evict_after_idle_ticks: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers_per_host: 5,
            host_queue_capacity: 1000,
            tick_interval: Duration::from_secs(1),
            request_timeout: Duration::from_secs(5),
            evict_after_idle_ticks: 300,
        }
    }
}
