use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio_util::sync::CancellationToken;

use scout_client::ScoutClient;
use scout_common::error::AgentError;
use scout_common::types::{AgentPatch, ProcessPatch};

use crate::structs::InfoResponse;

#[derive(Clone)]
struct AppState {
    client: Arc<ScoutClient>,
    cancellation_token: CancellationToken,
}

/// Typed engine errors mapped onto the HTTP surface.
struct ApiError(AgentError);

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AgentError::NotFound(_) => StatusCode::NOT_FOUND,
            AgentError::Incompatible(_) => StatusCode::CONFLICT,
            AgentError::Connection(_) => StatusCode::BAD_GATEWAY,
            AgentError::MonitoringSettings(_)
            | AgentError::Start { .. }
            | AgentError::Stop { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.0.to_string()).into_response()
    }
}

pub fn get_app(client: Arc<ScoutClient>, cancellation_token: CancellationToken) -> Router {
    let state = AppState {
        client,
        cancellation_token,
    };

    Router::new()
        .route("/processes", get(list_processes))
        .route("/processes/{id}", get(get_process).patch(patch_process))
        .route("/agent", get(get_agent).patch(patch_agent))
        .route("/info", get(info))
        .route("/refresh", post(refresh))
        .route("/terminate", post(terminate))
        .with_state(state)
}

async fn list_processes(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.client.reconciler().list().await)
}

async fn get_process(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.client.reconciler().find_by_id(&id).await?;
    Ok(Json(record))
}

async fn patch_process(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut patch): Json<ProcessPatch>,
) -> Result<impl IntoResponse, ApiError> {
    patch.id = id;
    let record = state.client.reconciler().apply_patch(patch).await?;
    Ok(Json(record))
}

async fn get_agent(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let agent = state
        .client
        .reconciler()
        .agent()
        .await
        .ok_or_else(|| AgentError::NotFound("agent not registered yet".into()))?;
    Ok(Json(agent))
}

async fn patch_agent(
    State(state): State<AppState>,
    Json(patch): Json<AgentPatch>,
) -> Result<impl IntoResponse, ApiError> {
    let agent = state.client.reconciler().update_agent(patch).await?;
    Ok(Json(agent))
}

async fn info(State(state): State<AppState>) -> impl IntoResponse {
    let reconciler = state.client.reconciler();
    let agent = reconciler.agent().await;
    let records = reconciler.list().await;

    Json(InfoResponse {
        registered: agent.is_some(),
        agent,
        process_count: records.len(),
        monitored_count: records
            .iter()
            .filter(|record| record.monitored && !record.stopped)
            .count(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn refresh(State(state): State<AppState>) -> impl IntoResponse {
    state.client.reconciler().refresh().await;
    StatusCode::ACCEPTED
}

async fn terminate(State(state): State<AppState>) -> impl IntoResponse {
    state.cancellation_token.cancel();
    "Terminating..."
}
