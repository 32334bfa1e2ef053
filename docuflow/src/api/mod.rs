//! HTTP API exposing the node tree under `/api`.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use docuflow_core::node::blank_as_none;
use docuflow_core::{DocumentStore, Error, ListFilter, NewNode, Node, NodePatch};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use uuid::Uuid;

pub const BANNER: &str = "DocFlow Is now in Production";

/// Shared application state containing the document store.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<DocumentStore>>,
}

#[derive(Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub message: String,
    pub deleted_count: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    root: Option<bool>,
    #[serde(default, deserialize_with = "blank_as_none")]
    parent_id: Option<Uuid>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoveRequest {
    #[serde(default, deserialize_with = "blank_as_none")]
    parent_id: Option<Uuid>,
}

/// Failure of a request, rendered as `{message}` with a matching status.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Store(Error),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Store(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Store(Error::Validation(message)) => (StatusCode::BAD_REQUEST, message),
            ApiError::Store(Error::NotFound(id)) => {
                (StatusCode::NOT_FOUND, format!("Document {} not found", id))
            }
            ApiError::Store(Error::Consistency(message)) => (StatusCode::CONFLICT, message),
            ApiError::Store(e) => {
                error!(error = %e, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        (status, Json(MessageResponse { message })).into_response()
    }
}

pub fn router(store: Arc<RwLock<DocumentStore>>) -> Router {
    let state = AppState { store };
    Router::new()
        .route("/api", get(banner))
        .route("/api/", get(banner))
        .route("/api/documents", post(create_document).get(list_documents))
        .route(
            "/api/documents/{id}",
            get(get_document).put(update_document).delete(delete_document),
        )
        .route("/api/documents/{id}/move", put(move_document))
        .route("/health", get(health_check))
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
        .with_state(state)
}

async fn banner() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: BANNER.to_string(),
    })
}

async fn health_check() -> &'static str {
    "OK"
}

async fn create_document(
    State(state): State<AppState>,
    payload: Result<Json<NewNode>, JsonRejection>,
) -> Result<(StatusCode, Json<Node>), ApiError> {
    let Json(new) = payload?;
    let node = state.store.write().await.create(new)?;
    Ok((StatusCode::CREATED, Json(node)))
}

async fn list_documents(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Node>>, ApiError> {
    let Query(params) = params?;
    let filter = match (params.root.unwrap_or(false), params.parent_id) {
        (true, Some(_)) => {
            return Err(ApiError::BadRequest(
                "root and parentId cannot be combined".to_string(),
            ))
        }
        (true, None) => ListFilter::Roots,
        (false, Some(parent)) => ListFilter::Children(parent),
        (false, None) => ListFilter::All,
    };
    Ok(Json(state.store.read().await.list(filter)))
}

async fn get_document(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Node>, ApiError> {
    let Path(id) = id?;
    let node = state.store.read().await.get(id)?.clone();
    Ok(Json(node))
}

async fn update_document(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<NodePatch>, JsonRejection>,
) -> Result<Json<Node>, ApiError> {
    let Path(id) = id?;
    let Json(patch) = payload?;
    let node = state.store.write().await.update(id, patch)?;
    Ok(Json(node))
}

async fn move_document(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<MoveRequest>, JsonRejection>,
) -> Result<Json<Node>, ApiError> {
    let Path(id) = id?;
    let Json(req) = payload?;
    let node = state.store.write().await.move_node(id, req.parent_id)?;
    Ok(Json(node))
}

async fn delete_document(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let Path(id) = id?;
    let summary = state.store.write().await.delete(id)?;
    Ok(Json(DeleteResponse {
        message: "Document deleted".to_string(),
        deleted_count: summary.deleted_count,
    }))
}

/// Bind `addr` and serve the API until the process exits.
pub async fn run_server(addr: SocketAddr, store: Arc<RwLock<DocumentStore>>) -> anyhow::Result<()> {
    let app = router(store);
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
