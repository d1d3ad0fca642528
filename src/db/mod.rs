pub mod memory;
pub mod postgres;
pub mod store;

use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use crate::{config::Config, error::Result, models::*};

pub use memory::MemoryMatchStore;
pub use postgres::PgMatchStore;
pub use store::{MatchRecord, MatchSnapshot, MatchStore, MatchTx, SlotRecord, SlotSnapshot};

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}


impl Database {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        // migrations live at the crate root: ./migrations
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ==================== SNAPSHOT QUERIES ====================
// Unlocked reads used by status polling. Callers must tolerate the phase
// moving on between these reads and their next action.
impl Database {
    pub async fn get_match(&self, match_id: Uuid) -> Result<Option<MatchRow>> {
        let row = sqlx::query_as::<_, MatchRow>("SELECT * FROM matches WHERE id = $1")
            .bind(match_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_slots(&self, match_id: Uuid) -> Result<Vec<SlotRow>> {
        let rows = sqlx::query_as::<_, SlotRow>(
            "SELECT * FROM match_slots WHERE match_id = $1 ORDER BY id ASC",
        )
        .bind(match_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_match_placements(&self, match_id: Uuid) -> Result<Vec<PlacementRow>> {
        let rows = sqlx::query_as::<_, PlacementRow>(
            r#"
            SELECT p.slot_id, p.x, p.y, p.length, p.orientation
            FROM placements p
            JOIN match_slots s ON s.id = p.slot_id
            WHERE s.match_id = $1
            ORDER BY p.id ASC
            "#,
        )
        .bind(match_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_match_moves(&self, match_id: Uuid) -> Result<Vec<MoveRow>> {
        let rows = sqlx::query_as::<_, MoveRow>(
            r#"
            SELECT m.id, m.slot_id, m.x, m.y
            FROM moves m
            JOIN match_slots s ON s.id = m.slot_id
            WHERE s.match_id = $1
            ORDER BY m.id ASC
            "#,
        )
        .bind(match_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
