//! The tick loop, the per-host dispatch fabric, and the worker pools that
//! turn due jobs into callback attempts.

mod config;
mod dispatcher;
mod error;
mod host;
mod worker;

pub use config::DispatcherConfig;
pub use dispatcher::Dispatcher;
pub use error::DispatcherError;
pub use host::HostRouter;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, routing::post, Router};
    use schedula_common::{Job, Schedule, Status};
    use schedula_executor::{HttpExecutor, RecordingExecutor};
    use schedula_repository::{InMemoryRepository, Repository};
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicU16, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    async fn spawn_echo_status(status: u16) -> SocketAddr {
        let app = Router::new().route(
            "/cb",
            post(move || async move { axum::http::StatusCode::from_u16(status).unwrap() }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    async fn spawn_slow_echo(status: u16, delay: Duration) -> SocketAddr {
        let app = Router::new().route(
            "/cb",
            post(move || async move {
                tokio::time::sleep(delay).await;
                axum::http::StatusCode::from_u16(status).unwrap()
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    async fn spawn_counting_echo(status: u16) -> (SocketAddr, Arc<AtomicU16>) {
        let count = Arc::new(AtomicU16::new(0));
        let counter = count.clone();
        let app = Router::new().route(
            "/cb",
            post(move |State(counter): State<Arc<AtomicU16>>| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                axum::http::StatusCode::from_u16(status).unwrap()
            }),
        );
        let app = app.with_state(counter);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, count)
    }

    fn job_due_in(seconds: i64, addr: SocketAddr) -> Job {
        let activation = now() + seconds;
        Job {
            id: String::new(),
            client_key: String::new(),
            callback_url: format!("http://{addr}/cb"),
            data: None,
            schedule: Schedule::timestamp(activation),
            status: Status::Pending,
            executions: Vec::new(),
        }
    }

    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }

    async fn liveness_handle() -> health::HealthHandle {
        let registry = health::HealthRegistry::new("test");
        registry
            .register("dispatcher".to_owned(), time::Duration::seconds(60))
            .await
    }

    fn fast_config() -> DispatcherConfig {
        DispatcherConfig {
            tick_interval: Duration::from_millis(200),
            ..Default::default()
        }
    }

    /// A job due in the near future gets a single successful execution
    /// recorded.
    #[tokio::test]
    async fn happy_path_records_success() {
        let addr = spawn_echo_status(200).await;
        let repository: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
        let executor: Arc<dyn schedula_executor::Executor> =
            Arc::new(HttpExecutor::new(Duration::from_secs(5)));

        let added = repository.add(job_due_in(1, addr)).unwrap();

        let dispatcher = Dispatcher::new(
            repository.clone(),
            executor,
            fast_config(),
            liveness_handle().await,
        );
        dispatcher.start().await.unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        dispatcher.stop().await.unwrap();

        let job = repository.get(&added.id).unwrap();
        assert_eq!(job.status, Status::Success);
        assert_eq!(job.executions.len(), 1);
        assert_eq!(job.executions[0].status, Status::Success);
    }

    /// A non-2xx response is a `fail` outcome whose message carries the
    /// status.
    #[tokio::test]
    async fn application_failure_records_fail_with_status() {
        let addr = spawn_echo_status(500).await;
        let repository: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
        let executor: Arc<dyn schedula_executor::Executor> =
            Arc::new(HttpExecutor::new(Duration::from_secs(5)));

        let added = repository.add(job_due_in(1, addr)).unwrap();

        let dispatcher = Dispatcher::new(
            repository.clone(),
            executor,
            fast_config(),
            liveness_handle().await,
        );
        dispatcher.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        dispatcher.stop().await.unwrap();

        let job = repository.get(&added.id).unwrap();
        assert_eq!(job.status, Status::Fail);
        assert!(job.executions[0].message.contains("500"));
    }

    /// An unreachable host yields an `error` outcome with a non-empty
    /// message.
    #[tokio::test]
    async fn transport_failure_records_error() {
        let repository: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
        let executor: Arc<dyn schedula_executor::Executor> =
            Arc::new(HttpExecutor::new(Duration::from_millis(300)));

        let mut job = job_due_in(1, "127.0.0.1:1".parse().unwrap());
        job.callback_url = "http://127.0.0.1:1/cb".to_owned();
        let added = repository.add(job).unwrap();

        let dispatcher = Dispatcher::new(
            repository.clone(),
            executor,
            fast_config(),
            liveness_handle().await,
        );
        dispatcher.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        dispatcher.stop().await.unwrap();

        let job = repository.get(&added.id).unwrap();
        assert_eq!(job.status, Status::Error);
        assert!(!job.executions[0].message.is_empty());
    }

    /// A job canceled before its activation never reaches the executor.
    #[tokio::test]
    async fn cancel_before_fire_skips_dispatch() {
        let (addr, calls) = spawn_counting_echo(200).await;
        let repository: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
        let recording = Arc::new(RecordingExecutor::new(schedula_executor::Outcome::Success));
        let executor: Arc<dyn schedula_executor::Executor> = recording.clone();

        let added = repository.add(job_due_in(2, addr)).unwrap();
        repository.cancel(&added.id).unwrap();

        let dispatcher = Dispatcher::new(
            repository.clone(),
            executor,
            fast_config(),
            liveness_handle().await,
        );
        dispatcher.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        dispatcher.stop().await.unwrap();

        let job = repository.get(&added.id).unwrap();
        assert_eq!(job.status, Status::Canceled);
        assert!(job.executions.is_empty());
        assert_eq!(recording.calls().len(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    /// A slow destination does not delay delivery to a fast destination
    /// dispatched at the same tick.
    #[tokio::test]
    async fn per_host_isolation() {
        let slow_addr = spawn_slow_echo(200, Duration::from_secs(3)).await;
        let fast_addr = spawn_echo_status(200).await;

        let repository: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
        let executor: Arc<dyn schedula_executor::Executor> =
            Arc::new(HttpExecutor::new(Duration::from_secs(10)));

        let activation = now() + 1;
        let mut slow_job_a = job_due_in(1, slow_addr);
        slow_job_a.schedule = Schedule::timestamp(activation);
        let mut slow_job_b = job_due_in(1, slow_addr);
        slow_job_b.schedule = Schedule::timestamp(activation);
        let mut fast_job_a = job_due_in(1, fast_addr);
        fast_job_a.schedule = Schedule::timestamp(activation);
        let mut fast_job_b = job_due_in(1, fast_addr);
        fast_job_b.schedule = Schedule::timestamp(activation);

        let slow_a = repository.add(slow_job_a).unwrap();
        let slow_b = repository.add(slow_job_b).unwrap();
        let fast_a = repository.add(fast_job_a).unwrap();
        let fast_b = repository.add(fast_job_b).unwrap();

        let dispatcher = Dispatcher::new(
            repository.clone(),
            executor,
            fast_config(),
            liveness_handle().await,
        );
        dispatcher.start().await.unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(repository.get(&fast_a.id).unwrap().status, Status::Success);
        assert_eq!(repository.get(&fast_b.id).unwrap().status, Status::Success);
        assert_eq!(repository.get(&slow_a.id).unwrap().status, Status::Pending);
        assert_eq!(repository.get(&slow_b.id).unwrap().status, Status::Pending);

        tokio::time::sleep(Duration::from_secs(3)).await;
        dispatcher.stop().await.unwrap();
        assert_eq!(repository.get(&slow_a.id).unwrap().status, Status::Success);
        assert_eq!(repository.get(&slow_b.id).unwrap().status, Status::Success);
    }

    #[tokio::test]
    async fn start_twice_errors() {
        let repository: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
        let executor: Arc<dyn schedula_executor::Executor> =
            Arc::new(RecordingExecutor::new(schedula_executor::Outcome::Success));
        let dispatcher = Dispatcher::new(
            repository,
            executor,
            fast_config(),
            liveness_handle().await,
        );

        dispatcher.start().await.unwrap();
        assert_eq!(dispatcher.start().await, Err(DispatcherError::AlreadyStarted));
        dispatcher.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_before_start_errors() {
        let repository: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
        let executor: Arc<dyn schedula_executor::Executor> =
            Arc::new(RecordingExecutor::new(schedula_executor::Outcome::Success));
        let dispatcher = Dispatcher::new(
            repository,
            executor,
            fast_config(),
            liveness_handle().await,
        );

        assert_eq!(dispatcher.stop().await, Err(DispatcherError::NotStarted));
    }

    #[tokio::test]
    async fn unparseable_url_records_error_execution() {
        let repository: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
        let executor: Arc<dyn schedula_executor::Executor> =
            Arc::new(RecordingExecutor::new(schedula_executor::Outcome::Success));

        let mut job = job_due_in(1, "127.0.0.1:1".parse().unwrap());
        job.callback_url = "not-a-url".to_owned();
        let added = repository.add(job).unwrap();

        let dispatcher = Dispatcher::new(
            repository.clone(),
            executor,
            fast_config(),
            liveness_handle().await,
        );
        dispatcher.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        dispatcher.stop().await.unwrap();

        let job = repository.get(&added.id).unwrap();
        assert_eq!(job.status, Status::Error);
    }
}
