use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use schedula_common::Job;

use crate::{Executor, Outcome};

/// A real `Executor` that invokes a job's callback over HTTP via
/// `reqwest`.
///
/// Request shape is bit-exact at the wire: `POST`, `Content-Type:
/// application/json`, `User-Agent: schedula`, body is the JSON encoding of
/// the job. The client is built once and is safe to share across workers.
pub struct HttpExecutor {
    client: reqwest::Client,
}

impl HttpExecutor {
    /// `request_timeout` bounds a single callback attempt; it is the only
    /// timeout the core enforces (no overall job deadline).
    pub fn new(request_timeout: Duration) -> Self {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent("schedula")
            .timeout(request_timeout)
            .build()
            .expect("failed to construct reqwest client for the webhook executor");

        Self { client }
    }
}

#[async_trait]
impl Executor for HttpExecutor {
    async fn execute(&self, job: &Job) -> Outcome {
        let body = match serde_json::to_string(job) {
            Ok(body) => body,
            Err(e) => return Outcome::Error(format!("failed to encode job body: {e}")),
        };

        let response = self
            .client
            .post(&job.callback_url)
            .body(body)
            .send()
            .await;

        match response {
            Ok(response) => {
                let status = response.status();
                if status == reqwest::StatusCode::OK || status == reqwest::StatusCode::ACCEPTED {
                    Outcome::Success
                } else {
                    Outcome::Fail(format!(
                        "invalid callback response, expected 200 or 202 but got {status}"
                    ))
                }
            }
            Err(e) => Outcome::Error(e.to_string()),
        }
    }
}
