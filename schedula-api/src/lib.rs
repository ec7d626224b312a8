//! The admission HTTP API: `POST`/`GET`/`DELETE` under `/jobs/`, mounted
//! by the binary alongside the dispatcher's metrics and health routes.

mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use schedula_repository::Repository;

/// Build the `/jobs/` admission router over a shared `Repository`.
pub fn routes(repository: Arc<dyn Repository>) -> Router {
    Router::new()
        .route("/jobs/", get(handlers::list_jobs).post(handlers::create_job))
        .route(
            "/jobs/:id",
            get(handlers::get_job).delete(handlers::cancel_job),
        )
        .with_state(repository)
}
