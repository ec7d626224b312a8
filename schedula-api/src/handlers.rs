use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use schedula_common::Job;
use schedula_repository::{Repository, RepositoryError};
use tracing::{error, warn};

type SharedRepository = Arc<dyn Repository>;

/// Error envelope used for every non-2xx admission API response:
/// `{"error": "<message>"}`.
fn error_response(status: StatusCode, message: impl std::fmt::Display) -> Response {
    let body = serde_json::json!({ "error": message.to_string() }).to_string();
    let mut response = (status, body).into_response();
    response.headers_mut().insert(
        axum::http::header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

fn json_response(status: StatusCode, value: &impl serde::Serialize) -> Response {
    let body = serde_json::to_string(value).expect("job/job list is always serializable");
    let mut response = (status, body).into_response();
    response.headers_mut().insert(
        axum::http::header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

/// A status-only response (no body) that still carries the admission
/// API's blanket `Content-Type: application/json`.
fn empty_json_response(status: StatusCode) -> Response {
    let mut response = status.into_response();
    response.headers_mut().insert(
        axum::http::header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

/// `POST /jobs/` -- body is a JSON job without `id`.
pub async fn create_job(State(repository): State<SharedRepository>, body: Bytes) -> Response {
    let job: Job = match serde_json::from_slice(&body) {
        Ok(job) => job,
        Err(e) => {
            warn!(error = %e, "failed to parse job body");
            return error_response(StatusCode::BAD_REQUEST, e);
        }
    };

    match repository.add(job) {
        Ok(created) => {
            let location = format!("/jobs/{}", created.id);
            let mut response = empty_json_response(StatusCode::CREATED);
            response.headers_mut().insert(
                axum::http::header::LOCATION,
                HeaderValue::from_str(&location).expect("job id is a valid header value"),
            );
            response
        }
        Err(e) => {
            warn!(error = %e, "failed to schedule job");
            error_response(StatusCode::BAD_REQUEST, e)
        }
    }
}

/// `GET /jobs/` -- query params `skip` (default 0), `limit` (default 100,
/// capped at 100 by the repository).
pub async fn list_jobs(
    State(repository): State<SharedRepository>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let skip = params
        .get("skip")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0);
    let limit = params
        .get("limit")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(schedula_repository::PAGE_MAX);

    match repository.list(skip, limit) {
        Ok(jobs) => {
            let page_count = jobs.len().to_string();
            let total_count = repository.count().to_string();
            let mut response = json_response(StatusCode::OK, &jobs);
            let headers = response.headers_mut();
            headers.insert(
                "Page-Count",
                HeaderValue::from_str(&page_count).expect("usize is a valid header value"),
            );
            headers.insert(
                "Total-Count",
                HeaderValue::from_str(&total_count).expect("usize is a valid header value"),
            );
            response
        }
        Err(e) => {
            error!(error = %e, "failed to list jobs");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// `GET /jobs/{id}` -- 200 + job JSON, or 404 if unknown.
pub async fn get_job(State(repository): State<SharedRepository>, Path(id): Path<String>) -> Response {
    match repository.get(&id) {
        Ok(job) if job.id.is_empty() => empty_json_response(StatusCode::NOT_FOUND),
        Ok(job) => json_response(StatusCode::OK, &job),
        Err(e) => {
            error!(error = %e, "failed to fetch job");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// `DELETE /jobs/{id}` -- maps to `Repository::cancel`. 200 on success,
/// 500 on any storage error (including not-found, which is never
/// distinguished from other storage errors here).
pub async fn cancel_job(
    State(repository): State<SharedRepository>,
    Path(id): Path<String>,
) -> Response {
    match repository.cancel(&id) {
        Ok(_) => empty_json_response(StatusCode::OK),
        Err(e @ RepositoryError::NotFound(_)) => {
            warn!(error = %e, "cancel target not found");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
        Err(e) => {
            error!(error = %e, "failed to cancel job");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}
