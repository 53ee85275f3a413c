//! HTTP surface of the devstore.
//!
//! ```text
//! GET    /tasks/{email}   -> [Task]
//! POST   /tasks           -> { "insertedId": "…" }
//! PATCH  /tasks/{id}      -> { "modifiedCount": 1 }
//! DELETE /tasks/{id}      -> { "deletedCount": 1 }
//! ```
//!
//! Bodies are checked with the same field rules the client applies.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};

use taskorbit_proto::{InsertedId, NewTask, Task, TaskId, TaskPatch};

use crate::store::{RepoError, TaskRepository};

/// Error responses, rendered as `{"error": "…"}`.
#[derive(Debug)]
pub enum ApiError {
    /// 400.
    BadRequest(String),
    /// 404.
    NotFound(String),
    /// 503.
    Unavailable,
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound(id) => Self::NotFound(format!("task not found: {id}")),
            RepoError::Unavailable => Self::Unavailable,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "store temporarily unavailable".to_string(),
            ),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

async fn list_tasks(
    State(repo): State<Arc<TaskRepository>>,
    Path(email): Path<String>,
) -> Json<Vec<Task>> {
    Json(repo.list_by_owner(&email).await)
}

async fn create_task(
    State(repo): State<Arc<TaskRepository>>,
    Json(task): Json<NewTask>,
) -> Result<Json<InsertedId>, ApiError> {
    task.validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let inserted_id = repo.insert(task).await?;
    Ok(Json(InsertedId { inserted_id }))
}

async fn update_task(
    State(repo): State<Arc<TaskRepository>>,
    Path(id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<serde_json::Value>, ApiError> {
    patch
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    repo.update(&TaskId::new(id), &patch).await?;
    Ok(Json(serde_json::json!({ "modifiedCount": 1 })))
}

async fn delete_task(
    State(repo): State<Arc<TaskRepository>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    repo.remove(&TaskId::new(id)).await?;
    Ok(Json(serde_json::json!({ "deletedCount": 1 })))
}

/// Builds the router over `repo`.
pub fn router(repo: Arc<TaskRepository>) -> axum::Router {
    axum::Router::new()
        .route("/tasks", post(create_task))
        .route(
            "/tasks/{key}",
            get(list_tasks).patch(update_task).delete(delete_task),
        )
        .with_state(repo)
}

/// Starts the devstore on `addr` with an empty repository.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(TaskRepository::new())).await
}

/// Starts the devstore over a caller-owned repository, so tests can
/// inspect it or inject faults.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    repo: Arc<TaskRepository>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(repo);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "devstore server error");
        }
    });

    Ok((bound_addr, handle))
}
