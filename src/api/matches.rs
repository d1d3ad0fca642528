use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{require_authority, require_user, AppState};
use crate::{
    engine::{AttackResult, Phase, ShipClass, ShipPlacement, SlotOutcome},
    error::Result,
    models::ApiResponse,
    services::{FinishSummary, MatchStatus},
};

// ==================== REQUEST/RESPONSE TYPES ====================

#[derive(Debug, Deserialize)]
pub struct CreateMatchRequest {
    pub board_size: Option<i32>,
    pub ship_config: Vec<ShipClass>,
}

#[derive(Debug, Serialize)]
pub struct CreateMatchResponse {
    pub match_id: Uuid,
    pub phase: Phase,
    pub board_size: i32,
    pub ship_config: Vec<ShipClass>,
}

#[derive(Debug, Serialize)]
pub struct PhaseResponse {
    pub match_id: Uuid,
    pub phase: Phase,
}

#[derive(Debug, Deserialize)]
pub struct AttackRequest {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Serialize)]
pub struct AttackResponse {
    pub x: i32,
    pub y: i32,
    pub result: AttackResult,
}

#[derive(Debug, Deserialize)]
pub struct FinishedPlayer {
    pub username: String,
    pub state: SlotOutcome,
}

#[derive(Debug, Deserialize)]
pub struct FinishMatchRequest {
    pub players: Vec<FinishedPlayer>,
}

// ==================== HANDLERS ====================

/// POST /api/v1/matches
pub async fn create_match(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateMatchRequest>,
) -> Result<Json<ApiResponse<CreateMatchResponse>>> {
    require_authority(&headers, &state)?;

    let record = state
        .service
        .create_match(req.board_size, &req.ship_config)
        .await?;

    Ok(Json(ApiResponse::success(CreateMatchResponse {
        match_id: record.id,
        phase: record.phase,
        board_size: record.config.board_size(),
        ship_config: record.config.ship_classes(),
    })))
}

/// POST /api/v1/matches/{match_id}/join
pub async fn join_match(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<PhaseResponse>>> {
    let identity = require_user(&headers, &state).await?;
    let phase = state.service.join(match_id, &identity).await?;
    Ok(Json(ApiResponse::success(PhaseResponse { match_id, phase })))
}

/// POST /api/v1/matches/{match_id}/place
///
/// Body is the full layout as a JSON array of `{x, y, length, orientation}`.
pub async fn place_ships(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
    headers: HeaderMap,
    Json(ships): Json<Vec<ShipPlacement>>,
) -> Result<Json<ApiResponse<PhaseResponse>>> {
    let identity = require_user(&headers, &state).await?;
    let phase = state.service.place(match_id, &identity, &ships).await?;
    Ok(Json(ApiResponse::success(PhaseResponse { match_id, phase })))
}

/// POST /api/v1/matches/{match_id}/attack
pub async fn attack(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<AttackRequest>,
) -> Result<Json<ApiResponse<AttackResponse>>> {
    let identity = require_user(&headers, &state).await?;
    let result = state
        .service
        .attack(match_id, &identity, (req.x, req.y))
        .await?;
    Ok(Json(ApiResponse::success(AttackResponse {
        x: req.x,
        y: req.y,
        result,
    })))
}

/// POST /api/v1/matches/{match_id}/finish
pub async fn finish_match(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<FinishMatchRequest>,
) -> Result<Json<ApiResponse<FinishSummary>>> {
    require_authority(&headers, &state)?;

    let reported: Vec<(String, SlotOutcome)> = req
        .players
        .into_iter()
        .map(|player| (player.username, player.state))
        .collect();
    let summary = state.service.finish(match_id, &reported).await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// GET /api/v1/matches/{match_id}
pub async fn get_match_status(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<MatchStatus>>> {
    let identity = require_user(&headers, &state).await?;
    let status = state.service.status(match_id, &identity).await?;
    Ok(Json(ApiResponse::success(status)))
}
