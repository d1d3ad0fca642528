use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    engine::{Cell, MatchConfig, Phase, ShipPlacement, SlotOutcome},
    error::Result,
};

#[derive(Debug, Clone)]
pub struct MatchRecord {
    pub id: Uuid,
    pub config: MatchConfig,
    pub phase: Phase,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRecord {
    pub id: i64,
    pub match_id: Uuid,
    pub identity: String,
    pub outcome: SlotOutcome,
}

/// One seat with its ships and its moves in persisted order.
#[derive(Debug, Clone)]
pub struct SlotSnapshot {
    pub slot: SlotRecord,
    pub ships: Vec<ShipPlacement>,
    pub moves: Vec<Cell>,
}

/// Point-in-time read of a whole match, seats in join order.
#[derive(Debug, Clone)]
pub struct MatchSnapshot {
    pub record: MatchRecord,
    pub slots: Vec<SlotSnapshot>,
}

impl MatchSnapshot {
    pub fn seat_of(&self, identity: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|seat| seat.slot.identity == identity)
    }
}

/// Entry point to persistence. Everything that mutates goes through a
/// [`MatchTx`]; `snapshot` is an unlocked read for status polling.
#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn MatchTx>>;

    async fn snapshot(&self, match_id: Uuid) -> Result<Option<MatchSnapshot>>;

    /// Whether the backing store answers at all.
    async fn ping(&self) -> bool;
}

/// A single transaction. Dropping it without `commit` rolls everything back
/// and releases every lock it took.
///
/// Locks are taken slot first, then match. Reads return committed rows plus
/// whatever locks guarantee; callers must not depend on reading back their
/// own uncommitted writes.
#[async_trait]
pub trait MatchTx: Send {
    async fn insert_match(&mut self, config: &MatchConfig) -> Result<MatchRecord>;

    /// Blocking row lock on the match, held until commit or rollback.
    async fn lock_match(&mut self, match_id: Uuid) -> Result<Option<MatchRecord>>;

    /// Shared lock on the match. Shared holders do not block each other but
    /// keep `lock_match` waiting, so the phase read here stays current until
    /// commit.
    async fn share_match(&mut self, match_id: Uuid) -> Result<Option<MatchRecord>>;

    async fn load_match(&mut self, match_id: Uuid) -> Result<Option<MatchRecord>>;

    /// Seats of a match in join order.
    async fn slots(&mut self, match_id: Uuid) -> Result<Vec<SlotRecord>>;

    async fn find_slot(&mut self, match_id: Uuid, identity: &str) -> Result<Option<SlotRecord>>;

    /// Non-blocking row lock on a slot. `Ok(None)` when the slot does not
    /// exist, `Err(Busy)` when another transaction holds it.
    async fn try_lock_slot(&mut self, slot_id: i64) -> Result<Option<SlotRecord>>;

    async fn insert_slot(&mut self, match_id: Uuid, identity: &str) -> Result<SlotRecord>;

    async fn placements(&mut self, slot_id: i64) -> Result<Vec<ShipPlacement>>;

    async fn insert_placements(&mut self, slot_id: i64, ships: &[ShipPlacement]) -> Result<()>;

    /// Moves made by this slot, oldest first.
    async fn moves(&mut self, slot_id: i64) -> Result<Vec<Cell>>;

    /// Fails with `AlreadyAttacked` if the slot already targeted this cell.
    async fn append_move(&mut self, slot_id: i64, target: Cell) -> Result<()>;

    async fn set_phase(&mut self, match_id: Uuid, phase: Phase) -> Result<()>;

    async fn set_outcome(&mut self, slot_id: i64, outcome: SlotOutcome) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
