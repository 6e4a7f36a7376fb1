use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::ws::SUCCESS_MESSAGE;
use crate::AppState;
use crate::error::ApiError;
use crate::models::clp::ExecuteOperationParams;

#[derive(Deserialize)]
pub struct StatusQuery {
    pub id: String,
}

#[derive(Deserialize)]
pub struct ExecuteRequest {
    pub id: String,
    pub params: ExecuteOperationParams,
}

pub async fn handle_list_upstreams(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.relay.upstream_ids().await)
}

pub async fn handle_get_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Response, ApiError> {
    let client = state.relay.client(&query.id).await?;
    let status = client.get_cluster_status().await?;
    Ok(Json(status).into_response())
}

pub async fn handle_execute(
    State(state): State<AppState>,
    Json(req): Json<ExecuteRequest>,
) -> Result<Response, ApiError> {
    state.relay.execute(&req.id, &req.params).await?;
    Ok(Json(serde_json::json!({ "message": SUCCESS_MESSAGE })).into_response())
}

pub async fn handle_healthz() -> &'static str {
    "ok\n"
}
