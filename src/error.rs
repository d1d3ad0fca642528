use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::{
    constants::{PG_DEADLOCK_DETECTED, PG_LOCK_NOT_AVAILABLE, PG_SERIALIZATION_FAILURE},
    engine::Phase,
};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid match config: {0}")]
    InvalidConfig(String),

    // Match engine
    #[error("Action not allowed while match is in {0} phase")]
    WrongPhase(Phase),

    #[error("Not accepting joins")]
    NotAcceptingJoins,

    #[error("Already joined this match")]
    AlreadyJoined,

    #[error("Match is full")]
    Full,

    #[error("Ships have already been placed")]
    AlreadyPlaced,

    #[error("{}", out_of_bounds_message(.index, .x, .y))]
    OutOfBounds {
        index: Option<usize>,
        x: i32,
        y: i32,
    },

    #[error("Ship[{index}] is overlapping or touching another ship")]
    Overlap { index: usize },

    #[error("Invalid ship configuration")]
    InvalidRoster,

    #[error("Move ({x}, {y}) has already been made")]
    AlreadyAttacked { x: i32, y: i32 },

    #[error("Another request is holding this slot")]
    Busy,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

fn out_of_bounds_message(index: &Option<usize>, x: &i32, y: &i32) -> String {
    match index {
        Some(index) => format!("Ship[{}] is out of bounds at ({}, {})", index, x, y),
        None => format!("Attack ({}, {}) is out of bounds", x, y),
    }
}

impl AppError {
    /// Maps lock contention reported by Postgres onto `Busy`; everything else
    /// stays a database error.
    pub fn from_contended(err: sqlx::Error) -> Self {
        let contended = err
            .as_database_error()
            .and_then(|db| db.code())
            .map(|code| {
                code == PG_LOCK_NOT_AVAILABLE
                    || code == PG_DEADLOCK_DETECTED
                    || code == PG_SERIALIZATION_FAILURE
            })
            .unwrap_or(false);
        if contended {
            AppError::Busy
        } else {
            AppError::Database(err)
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::WrongPhase(phase) => Some(json!({ "phase": phase })),
            AppError::OutOfBounds { index, x, y } => {
                Some(json!({ "index": index, "x": x, "y": y }))
            }
            AppError::Overlap { index } => Some(json!({ "index": index })),
            AppError::AlreadyAttacked { x, y } => Some(json!({ "x": x, "y": y })),
            _ => None,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match self {
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            AppError::Redis(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CACHE_ERROR"),
            AppError::AuthError(_) => (StatusCode::UNAUTHORIZED, "AUTH_ERROR"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::InvalidConfig(_) => (StatusCode::BAD_REQUEST, "INVALID_CONFIG"),
            AppError::OutOfBounds { .. } => (StatusCode::BAD_REQUEST, "OUT_OF_BOUNDS"),
            AppError::Overlap { .. } => (StatusCode::BAD_REQUEST, "OVERLAP"),
            AppError::InvalidRoster => (StatusCode::BAD_REQUEST, "INVALID_ROSTER"),
            AppError::WrongPhase(_) => (StatusCode::CONFLICT, "WRONG_PHASE"),
            AppError::NotAcceptingJoins => (StatusCode::CONFLICT, "NOT_ACCEPTING_JOINS"),
            AppError::AlreadyJoined => (StatusCode::CONFLICT, "ALREADY_JOINED"),
            AppError::Full => (StatusCode::CONFLICT, "FULL"),
            AppError::AlreadyPlaced => (StatusCode::CONFLICT, "ALREADY_PLACED"),
            AppError::AlreadyAttacked { .. } => (StatusCode::CONFLICT, "ALREADY_ATTACKED"),
            AppError::Busy => (StatusCode::CONFLICT, "BUSY"),
            AppError::InvalidState(_) => (StatusCode::CONFLICT, "INVALID_STATE"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        } else {
            tracing::debug!("request rejected code={} reason={}", code, self);
        }

        let body = Json(ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details: self.details(),
            },
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
