use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use uuid::Uuid;

use crate::{
    db::store::{MatchRecord, SlotRecord},
    engine::{MatchConfig, Orientation, Phase, ShipClass, ShipPlacement, SlotOutcome},
    error::{AppError, Result},
};

// ==================== MATCH ====================
#[derive(Debug, Clone, FromRow)]
pub struct MatchRow {
    pub id: Uuid,
    pub board_size: i32,
    pub ship_config: Json<Vec<ShipClass>>,
    pub phase: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<MatchRow> for MatchRecord {
    type Error = AppError;

    fn try_from(row: MatchRow) -> Result<Self> {
        let config = MatchConfig::new(row.board_size, &row.ship_config.0)?;
        let phase = Phase::parse(&row.phase).ok_or_else(|| {
            AppError::InvalidState(format!("Match {} has unknown phase '{}'", row.id, row.phase))
        })?;
        Ok(MatchRecord {
            id: row.id,
            config,
            phase,
            created_at: row.created_at,
        })
    }
}

// ==================== SLOT ====================
#[derive(Debug, Clone, FromRow)]
pub struct SlotRow {
    pub id: i64,
    pub match_id: Uuid,
    pub identity: String,
    pub outcome: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<SlotRow> for SlotRecord {
    type Error = AppError;

    fn try_from(row: SlotRow) -> Result<Self> {
        let outcome = SlotOutcome::parse(&row.outcome).ok_or_else(|| {
            AppError::InvalidState(format!("Slot {} has unknown outcome '{}'", row.id, row.outcome))
        })?;
        Ok(SlotRecord {
            id: row.id,
            match_id: row.match_id,
            identity: row.identity,
            outcome,
        })
    }
}

// ==================== PLACEMENT ====================
#[derive(Debug, Clone, FromRow)]
pub struct PlacementRow {
    pub slot_id: i64,
    pub x: i32,
    pub y: i32,
    pub length: i32,
    pub orientation: i16,
}

impl TryFrom<PlacementRow> for ShipPlacement {
    type Error = AppError;

    fn try_from(row: PlacementRow) -> Result<Self> {
        let orientation = Orientation::from_i16(row.orientation).ok_or_else(|| {
            AppError::InvalidState(format!("Unknown orientation {}", row.orientation))
        })?;
        Ok(ShipPlacement::new(row.x, row.y, row.length, orientation))
    }
}

// ==================== MOVE ====================
#[derive(Debug, Clone, FromRow)]
pub struct MoveRow {
    pub id: i64,
    pub slot_id: i64,
    pub x: i32,
    pub y: i32,
}

// ==================== API RESPONSE ====================
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn match_row(phase: &str) -> MatchRow {
        MatchRow {
            id: Uuid::new_v4(),
            board_size: 4,
            ship_config: Json(vec![ShipClass { length: 2, count: 1 }]),
            phase: phase.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn api_response_success_sets_flag() {
        let response = ApiResponse::success("ok");
        assert!(response.success);
        assert_eq!(response.data, "ok");
    }

    #[test]
    fn match_row_converts_phase_and_config() {
        let record = MatchRecord::try_from(match_row("attack")).unwrap();
        assert_eq!(record.phase, Phase::Attack);
        assert_eq!(record.config.board_size(), 4);
        assert_eq!(record.config.roster().get(&2), Some(&1));
    }

    #[test]
    fn unknown_phase_is_invalid_state() {
        assert!(matches!(
            MatchRecord::try_from(match_row("paused")),
            Err(AppError::InvalidState(_))
        ));
    }

    #[test]
    fn placement_row_rejects_unknown_orientation() {
        let row = PlacementRow {
            slot_id: 1,
            x: 0,
            y: 0,
            length: 2,
            orientation: 7,
        };
        assert!(ShipPlacement::try_from(row).is_err());
    }
}
