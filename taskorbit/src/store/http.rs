//! HTTP backend for the hosted task API.
//!
//! Speaks the store's REST/JSON dialect:
//!
//! ```text
//! GET    /tasks/{ownerEmail}   -> [Task]
//! POST   /tasks                -> { "insertedId": "…" }
//! PATCH  /tasks/{id}           -> 2xx
//! DELETE /tasks/{id}           -> 2xx
//! ```

use std::time::Duration;

use reqwest::{Client, Response, StatusCode, Url};

use taskorbit_proto::{InsertedId, NewTask, Task, TaskId, TaskPatch};

use super::{StoreError, TaskStore};

/// REST client for the remote task store.
#[derive(Debug, Clone)]
pub struct HttpTaskStore {
    client: Client,
    base_url: Url,
}

impl HttpTaskStore {
    /// Creates a client for the API rooted at `base_url`.
    ///
    /// `request_timeout` bounds each request end to end.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the URL cannot be parsed or cannot
    /// carry path segments, or if the HTTP client cannot be built.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| StoreError::Config(format!("invalid base url {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Config(format!(
                "base url cannot carry a path: {base_url}"
            )));
        }
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| StoreError::Config(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    /// Returns the API root this client talks to.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds `{base}/tasks[/{segment}]` with the segment percent-encoded.
    fn tasks_url(&self, segment: Option<&str>) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| StoreError::Config("base url cannot carry a path".to_string()))?;
            segments.pop_if_empty().push("tasks");
            if let Some(segment) = segment {
                segments.push(segment);
            }
        }
        Ok(url)
    }
}

/// Maps a transport-level reqwest error onto [`StoreError`].
fn map_request_error(e: &reqwest::Error) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout
    } else if e.is_decode() {
        StoreError::Decode(e.to_string())
    } else {
        StoreError::Network(e.to_string())
    }
}

/// Turns non-success statuses into errors, passing successful responses through.
async fn check_status(response: Response, id: Option<&TaskId>) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match (status, id) {
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => Err(StoreError::Unauthorized),
        (StatusCode::NOT_FOUND, Some(id)) => Err(StoreError::NotFound(id.clone())),
        _ => {
            let message = response
                .text()
                .await
                .ok()
                .filter(|body| !body.is_empty())
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string());
            Err(StoreError::Status {
                status: status.as_u16(),
                message,
            })
        }
    }
}

impl TaskStore for HttpTaskStore {
    async fn fetch_by_owner(&self, owner: &str) -> Result<Vec<Task>, StoreError> {
        let url = self.tasks_url(Some(owner))?;
        tracing::debug!(%url, "fetching tasks");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| map_request_error(&e))?;
        check_status(response, None)
            .await?
            .json::<Vec<Task>>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn create(&self, task: &NewTask) -> Result<TaskId, StoreError> {
        let url = self.tasks_url(None)?;
        let response = self
            .client
            .post(url)
            .json(task)
            .send()
            .await
            .map_err(|e| map_request_error(&e))?;
        let inserted = check_status(response, None)
            .await?
            .json::<InsertedId>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        tracing::debug!(task_id = %inserted.inserted_id, "task created");
        Ok(inserted.inserted_id)
    }

    async fn patch(&self, id: &TaskId, patch: &TaskPatch) -> Result<(), StoreError> {
        let url = self.tasks_url(Some(id.as_str()))?;
        let response = self
            .client
            .patch(url)
            .json(patch)
            .send()
            .await
            .map_err(|e| map_request_error(&e))?;
        check_status(response, Some(id)).await?;
        Ok(())
    }

    async fn delete(&self, id: &TaskId) -> Result<(), StoreError> {
        let url = self.tasks_url(Some(id.as_str()))?;
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(|e| map_request_error(&e))?;
        check_status(response, Some(id)).await?;
        Ok(())
    }
}
