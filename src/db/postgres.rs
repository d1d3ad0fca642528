use async_trait::async_trait;
use sqlx::{types::Json, Postgres, Transaction};
use uuid::Uuid;

use super::{
    store::{MatchRecord, MatchSnapshot, MatchStore, MatchTx, SlotRecord, SlotSnapshot},
    Database,
};
use crate::{
    constants::PG_UNIQUE_VIOLATION,
    engine::{Cell, MatchConfig, Phase, ShipPlacement, SlotOutcome},
    error::{AppError, Result},
    models::{MatchRow, MoveRow, PlacementRow, SlotRow},
};

/// Postgres-backed store. Row locks come from `FOR UPDATE` and
/// `FOR UPDATE SKIP LOCKED` inside the open transaction.
#[derive(Clone)]
pub struct PgMatchStore {
    db: Database,
}

impl PgMatchStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

pub struct PgMatchTx {
    tx: Transaction<'static, Postgres>,
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == PG_UNIQUE_VIOLATION)
        .unwrap_or(false)
}

#[async_trait]
impl MatchStore for PgMatchStore {
    async fn begin(&self) -> Result<Box<dyn MatchTx>> {
        let tx = self.db.pool().begin().await?;
        Ok(Box::new(PgMatchTx { tx }))
    }

    async fn snapshot(&self, match_id: Uuid) -> Result<Option<MatchSnapshot>> {
        let Some(row) = self.db.get_match(match_id).await? else {
            return Ok(None);
        };
        let record = MatchRecord::try_from(row)?;
        let placements = self.db.get_match_placements(match_id).await?;
        let moves = self.db.get_match_moves(match_id).await?;

        let mut slots = Vec::new();
        for slot_row in self.db.get_slots(match_id).await? {
            let slot = SlotRecord::try_from(slot_row)?;
            let ships = placements
                .iter()
                .filter(|p| p.slot_id == slot.id)
                .cloned()
                .map(ShipPlacement::try_from)
                .collect::<Result<Vec<_>>>()?;
            let moves = moves
                .iter()
                .filter(|m| m.slot_id == slot.id)
                .map(|m| (m.x, m.y))
                .collect();
            slots.push(SlotSnapshot { slot, ships, moves });
        }

        Ok(Some(MatchSnapshot { record, slots }))
    }

    async fn ping(&self) -> bool {
        self.db.pool().acquire().await.is_ok()
    }
}

// ==================== MATCH QUERIES ====================
#[derive(Debug, Clone, Copy)]
enum RowLock {
    None,
    Share,
    Update,
}

impl PgMatchTx {
    async fn fetch_match(&mut self, match_id: Uuid, lock: RowLock) -> Result<Option<MatchRecord>> {
        let sql = match lock {
            RowLock::None => "SELECT * FROM matches WHERE id = $1",
            RowLock::Share => "SELECT * FROM matches WHERE id = $1 FOR SHARE",
            RowLock::Update => "SELECT * FROM matches WHERE id = $1 FOR UPDATE",
        };
        let row = sqlx::query_as::<_, MatchRow>(sql)
            .bind(match_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(AppError::from_contended)?;
        row.map(MatchRecord::try_from).transpose()
    }
}

// ==================== SLOT QUERIES ====================
impl PgMatchTx {
    async fn slot_exists(&mut self, slot_id: i64) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM match_slots WHERE id = $1)")
                .bind(slot_id)
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(exists)
    }
}

#[async_trait]
impl MatchTx for PgMatchTx {
    async fn insert_match(&mut self, config: &MatchConfig) -> Result<MatchRecord> {
        let row = sqlx::query_as::<_, MatchRow>(
            r#"
            INSERT INTO matches (id, board_size, ship_config, phase)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(config.board_size())
        .bind(Json(config.ship_classes()))
        .bind(Phase::Join.as_str())
        .fetch_one(&mut *self.tx)
        .await?;
        MatchRecord::try_from(row)
    }

    async fn lock_match(&mut self, match_id: Uuid) -> Result<Option<MatchRecord>> {
        self.fetch_match(match_id, RowLock::Update).await
    }

    async fn share_match(&mut self, match_id: Uuid) -> Result<Option<MatchRecord>> {
        self.fetch_match(match_id, RowLock::Share).await
    }

    async fn load_match(&mut self, match_id: Uuid) -> Result<Option<MatchRecord>> {
        self.fetch_match(match_id, RowLock::None).await
    }

    async fn slots(&mut self, match_id: Uuid) -> Result<Vec<SlotRecord>> {
        let rows = sqlx::query_as::<_, SlotRow>(
            "SELECT * FROM match_slots WHERE match_id = $1 ORDER BY id ASC",
        )
        .bind(match_id)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(SlotRecord::try_from).collect()
    }

    async fn find_slot(&mut self, match_id: Uuid, identity: &str) -> Result<Option<SlotRecord>> {
        let row = sqlx::query_as::<_, SlotRow>(
            "SELECT * FROM match_slots WHERE match_id = $1 AND identity = $2",
        )
        .bind(match_id)
        .bind(identity)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(SlotRecord::try_from).transpose()
    }

    async fn try_lock_slot(&mut self, slot_id: i64) -> Result<Option<SlotRecord>> {
        let row = sqlx::query_as::<_, SlotRow>(
            "SELECT * FROM match_slots WHERE id = $1 FOR UPDATE SKIP LOCKED",
        )
        .bind(slot_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(AppError::from_contended)?;

        if let Some(row) = row {
            return Ok(Some(SlotRecord::try_from(row)?));
        }
        // SKIP LOCKED hides a held row the same way it hides a missing one.
        if self.slot_exists(slot_id).await? {
            return Err(AppError::Busy);
        }
        Ok(None)
    }

    async fn insert_slot(&mut self, match_id: Uuid, identity: &str) -> Result<SlotRecord> {
        let row = sqlx::query_as::<_, SlotRow>(
            r#"
            INSERT INTO match_slots (match_id, identity, outcome)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(match_id)
        .bind(identity)
        .bind(SlotOutcome::Playing.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::AlreadyJoined
            } else {
                AppError::Database(e)
            }
        })?;
        SlotRecord::try_from(row)
    }

    async fn placements(&mut self, slot_id: i64) -> Result<Vec<ShipPlacement>> {
        let rows = sqlx::query_as::<_, PlacementRow>(
            "SELECT slot_id, x, y, length, orientation FROM placements WHERE slot_id = $1 ORDER BY id ASC",
        )
        .bind(slot_id)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(ShipPlacement::try_from).collect()
    }

    async fn insert_placements(&mut self, slot_id: i64, ships: &[ShipPlacement]) -> Result<()> {
        for ship in ships {
            sqlx::query(
                r#"
                INSERT INTO placements (slot_id, x, y, length, orientation)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(slot_id)
            .bind(ship.x)
            .bind(ship.y)
            .bind(ship.length)
            .bind(ship.orientation.as_i16())
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn moves(&mut self, slot_id: i64) -> Result<Vec<Cell>> {
        let rows = sqlx::query_as::<_, MoveRow>(
            "SELECT id, slot_id, x, y FROM moves WHERE slot_id = $1 ORDER BY id ASC",
        )
        .bind(slot_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(|m| (m.x, m.y)).collect())
    }

    async fn append_move(&mut self, slot_id: i64, target: Cell) -> Result<()> {
        let (x, y) = target;
        sqlx::query("INSERT INTO moves (slot_id, x, y) VALUES ($1, $2, $3)")
            .bind(slot_id)
            .bind(x)
            .bind(y)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::AlreadyAttacked { x, y }
                } else {
                    AppError::from_contended(e)
                }
            })?;
        Ok(())
    }

    async fn set_phase(&mut self, match_id: Uuid, phase: Phase) -> Result<()> {
        sqlx::query("UPDATE matches SET phase = $2 WHERE id = $1")
            .bind(match_id)
            .bind(phase.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(AppError::from_contended)?;
        Ok(())
    }

    async fn set_outcome(&mut self, slot_id: i64, outcome: SlotOutcome) -> Result<()> {
        sqlx::query("UPDATE match_slots SET outcome = $2 WHERE id = $1")
            .bind(slot_id)
            .bind(outcome.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(AppError::from_contended)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.tx.commit().await.map_err(AppError::from_contended)?;
        Ok(())
    }
}
