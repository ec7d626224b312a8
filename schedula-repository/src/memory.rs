use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tracing::warn;
use uuid::Uuid;

use schedula_common::{Job, Status};

use crate::error::RepositoryError;
use crate::{Repository, RepositoryResult, PAGE_MAX};

/// Lock holds longer than this emit a diagnostic -- dispatch latency is
/// sensitive to repository hold times, so a slow critical section here is
/// worth knowing about even though it isn't itself an error.
const SLOW_LOCK_THRESHOLD: Duration = Duration::from_millis(1);

struct State {
    /// id -> job, the single canonical copy of every job's state.
    jobs_by_id: HashMap<String, Job>,
    /// insertion-ordered ids, used only for pagination.
    job_index_by_id: Vec<String>,
    /// activation timestamp -> ids, the dispatch-time lookup.
    jobs_by_schedule: HashMap<i64, Vec<String>>,
}

impl State {
    fn new() -> Self {
        Self {
            jobs_by_id: HashMap::new(),
            job_index_by_id: Vec::new(),
            jobs_by_schedule: HashMap::new(),
        }
    }
}

/// The in-process reference `Repository` backend: a single readers-writer
/// lock guards all three indices. Read paths (`get`, `list`,
/// `list_by_schedule`, `count`) acquire the shared mode; write paths
/// acquire the exclusive mode.
pub struct InMemoryRepository {
    state: RwLock<State>,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::new()),
        }
    }

    /// Sentinel returned by `get` for an unknown id: a job with an empty
    /// `id`, rather than an error -- callers branch on `id.is_empty()`.
    fn not_found() -> Job {
        Job {
            id: String::new(),
            client_key: String::new(),
            callback_url: String::new(),
            data: None,
            schedule: schedula_common::Schedule {
                format: String::new(),
                value: String::new(),
            },
            status: Status::Pending,
            executions: Vec::new(),
        }
    }
}

fn warn_if_slow(started: Instant, operation: &str) {
    let elapsed = started.elapsed();
    if elapsed > SLOW_LOCK_THRESHOLD {
        warn!(
            operation,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "repository lock held longer than 1ms"
        );
    }
}

impl Repository for InMemoryRepository {
    fn add(&self, mut job: Job) -> RepositoryResult<Job> {
        if !job.id.is_empty() {
            return Err(RepositoryError::NonEmptyId);
        }
        let activation = job.schedule.next_activation()?;

        job.id = Uuid::new_v4().to_string();
        job.status = Status::Pending;

        let started = Instant::now();
        {
            let mut state = self.state.write().map_err(|_| RepositoryError::LockPoisoned)?;
            state.job_index_by_id.push(job.id.clone());
            state
                .jobs_by_schedule
                .entry(activation)
                .or_default()
                .push(job.id.clone());
            state.jobs_by_id.insert(job.id.clone(), job.clone());
        }
        warn_if_slow(started, "add");

        Ok(job)
    }

    fn get(&self, id: &str) -> RepositoryResult<Job> {
        let state = self.state.read().map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(state
            .jobs_by_id
            .get(id)
            .cloned()
            .unwrap_or_else(InMemoryRepository::not_found))
    }

    fn list(&self, skip: i64, limit: i64) -> RepositoryResult<Vec<Job>> {
        let state = self.state.read().map_err(|_| RepositoryError::LockPoisoned)?;

        if limit < 0 {
            return Ok(Vec::new());
        }
        let limit = limit.min(PAGE_MAX);

        let total = state.job_index_by_id.len() as i64;
        if skip < 0 || skip > total {
            return Ok(Vec::new());
        }

        let start = skip as usize;
        let end = ((skip + limit).min(total)) as usize;

        Ok(state.job_index_by_id[start..end]
            .iter()
            .map(|id| state.jobs_by_id[id].clone())
            .collect())
    }

    fn remove(&self, id: &str) -> RepositoryResult<Job> {
        let started = Instant::now();
        let removed = {
            let mut state = self.state.write().map_err(|_| RepositoryError::LockPoisoned)?;

            let job = state
                .jobs_by_id
                .remove(id)
                .ok_or_else(|| RepositoryError::NotFound(id.to_owned()))?;

            state.job_index_by_id.retain(|existing| existing != id);

            if let Ok(activation) = job.schedule.next_activation() {
                if let Some(bucket) = state.jobs_by_schedule.get_mut(&activation) {
                    bucket.retain(|existing| existing != id);
                }
            }

            job
        };
        warn_if_slow(started, "remove");

        Ok(removed)
    }

    fn cancel(&self, id: &str) -> RepositoryResult<Job> {
        let started = Instant::now();
        let job = {
            let mut state = self.state.write().map_err(|_| RepositoryError::LockPoisoned)?;
            let job = state
                .jobs_by_id
                .get_mut(id)
                .ok_or_else(|| RepositoryError::NotFound(id.to_owned()))?;
            job.status = Status::Canceled;
            job.clone()
        };
        warn_if_slow(started, "cancel");

        Ok(job)
    }

    fn record_execution(
        &self,
        id: &str,
        timestamp: i64,
        status: Status,
        message: &str,
    ) -> RepositoryResult<Job> {
        let started = Instant::now();
        let job = {
            let mut state = self.state.write().map_err(|_| RepositoryError::LockPoisoned)?;
            let job = state
                .jobs_by_id
                .get_mut(id)
                .ok_or_else(|| RepositoryError::NotFound(id.to_owned()))?;
            job.executions.push(schedula_common::Execution {
                timestamp,
                status,
                message: message.to_owned(),
            });
            job.status = status;
            job.clone()
        };
        warn_if_slow(started, "record_execution");

        Ok(job)
    }

    fn count(&self) -> usize {
        let state = self.state.read().expect("repository lock poisoned");
        state.job_index_by_id.len()
    }

    fn list_by_schedule(&self, timestamp: i64) -> RepositoryResult<Vec<Job>> {
        let state = self.state.read().map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(state
            .jobs_by_schedule
            .get(&timestamp)
            .map(|ids| ids.iter().map(|id| state.jobs_by_id[id].clone()).collect())
            .unwrap_or_default())
    }
}
