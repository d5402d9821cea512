use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::stats::Stats;
use crate::task::{Health, NewTask, Task, TaskId, TaskPatch};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid API base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },

    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// The REST surface the board talks to.
pub trait TaskApi {
    fn list_tasks(&self) -> impl Future<Output = Result<Vec<Task>>> + Send;

    fn stats(&self) -> impl Future<Output = Result<Stats>> + Send;

    fn create_task(&self, task: &NewTask) -> impl Future<Output = Result<Task>> + Send;

    fn update_task(
        &self,
        id: TaskId,
        patch: &TaskPatch,
    ) -> impl Future<Output = Result<Task>> + Send;

    fn delete_task(&self, id: TaskId) -> impl Future<Output = Result<()>> + Send;

    fn health(&self) -> impl Future<Output = Result<Health>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpTaskApi {
    client: Client,
    base_url: String,
}

impl HttpTaskApi {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let base_url = normalize_base_url(base_url)?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| ApiError::Other(format!("failed building HTTP client: {err}")))?;

        debug!(base_url = %base_url, ?timeout, "created task API client");
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(String, reqwest::Response)>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(path);
        let mut request = self.client.request(method.clone(), url.as_str());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|source| {
            warn!(method = %method, url = %url, error = %source, "request failed");
            ApiError::Transport {
                url: url.clone(),
                source,
            }
        })?;

        let status = response.status();
        debug!(method = %method, url = %url, status = %status, "response received");
        if !status.is_success() {
            warn!(method = %method, url = %url, status = %status, "non-success status");
            return Err(ApiError::Status { url, status });
        }

        Ok((url, response))
    }

    async fn send_json<B, R>(&self, method: Method, path: &str, body: Option<&B>) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let (url, response) = self.send(method, path, body).await?;
        response
            .json::<R>()
            .await
            .map_err(|source| ApiError::Decode { url, source })
    }
}

impl TaskApi for HttpTaskApi {
    #[instrument(skip(self))]
    async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.send_json::<(), _>(Method::GET, "/api/tasks", None).await
    }

    #[instrument(skip(self))]
    async fn stats(&self) -> Result<Stats> {
        self.send_json::<(), _>(Method::GET, "/api/stats", None).await
    }

    #[instrument(skip(self, task), fields(title_len = task.title.len()))]
    async fn create_task(&self, task: &NewTask) -> Result<Task> {
        self.send_json(Method::POST, "/api/tasks", Some(task)).await
    }

    #[instrument(skip(self, patch))]
    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<Task> {
        self.send_json(Method::PUT, &task_path(id), Some(patch)).await
    }

    #[instrument(skip(self))]
    async fn delete_task(&self, id: TaskId) -> Result<()> {
        self.send::<()>(Method::DELETE, &task_path(id), None)
            .await
            .map(|_| ())
    }

    // 503 carries a Health body too, so decode regardless of status.
    #[instrument(skip(self))]
    async fn health(&self) -> Result<Health> {
        let url = self.endpoint("/health");
        let response = self.client.get(url.as_str()).send().await.map_err(|source| {
            ApiError::Transport {
                url: url.clone(),
                source,
            }
        })?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::SERVICE_UNAVAILABLE {
            return Err(ApiError::Status { url, status });
        }

        response
            .json::<Health>()
            .await
            .map_err(|source| ApiError::Decode { url, source })
    }
}

fn task_path(id: TaskId) -> String {
    format!("/api/tasks/{id}")
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ApiError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: "URL is empty".to_string(),
        });
    }

    let parsed = reqwest::Url::parse(trimmed).map_err(|err| ApiError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {}", parsed.scheme()),
        });
    }

    Ok(trimmed.to_string())
}
