use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use super::store::{MatchRecord, MatchSnapshot, MatchStore, MatchTx, SlotRecord, SlotSnapshot};
use crate::{
    engine::{Cell, MatchConfig, Phase, ShipPlacement, SlotOutcome},
    error::{AppError, Result},
};

/// In-process store for local runs and tests.
///
/// Row locks are per-key tokio mutexes: match locks wait, slot locks use
/// `try_lock` and fail with `Busy`. Writes are staged on the transaction and
/// applied in one step at commit, so readers only ever see committed rows.
#[derive(Clone, Default)]
pub struct MemoryMatchStore {
    tables: Arc<RwLock<Tables>>,
    match_locks: LockTable<Uuid>,
    slot_locks: LockTable<i64>,
}

impl MemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Default)]
struct Tables {
    matches: HashMap<Uuid, MatchRecord>,
    slots: BTreeMap<i64, SlotRecord>,
    placements: HashMap<i64, Vec<ShipPlacement>>,
    // keyed by move id; iteration order is persisted order
    moves: BTreeMap<i64, (i64, Cell)>,
    next_slot_id: i64,
    next_move_id: i64,
}

impl Tables {
    fn slots_of(&self, match_id: Uuid) -> Vec<SlotRecord> {
        self.slots
            .values()
            .filter(|slot| slot.match_id == match_id)
            .cloned()
            .collect()
    }

    fn moves_of(&self, slot_id: i64) -> Vec<Cell> {
        self.moves
            .values()
            .filter(|(owner, _)| *owner == slot_id)
            .map(|(_, cell)| *cell)
            .collect()
    }

    fn phase_of_slot(&self, slot_id: i64) -> Option<Phase> {
        let slot = self.slots.get(&slot_id)?;
        self.matches.get(&slot.match_id).map(|record| record.phase)
    }

    fn has_move(&self, slot_id: i64, target: Cell) -> bool {
        self.moves
            .values()
            .any(|(owner, cell)| *owner == slot_id && *cell == target)
    }

    fn apply(&mut self, write: Write) {
        match write {
            Write::Match(record) => {
                self.matches.insert(record.id, record);
            }
            Write::Slot(slot) => {
                self.slots.insert(slot.id, slot);
            }
            Write::Placements { slot_id, ships } => {
                self.placements.entry(slot_id).or_default().extend(ships);
            }
            Write::Move { id, slot_id, target } => {
                self.moves.insert(id, (slot_id, target));
            }
            Write::Phase { match_id, phase } => {
                if let Some(record) = self.matches.get_mut(&match_id) {
                    record.phase = phase;
                }
            }
            Write::Outcome { slot_id, outcome } => {
                if let Some(slot) = self.slots.get_mut(&slot_id) {
                    slot.outcome = outcome;
                }
            }
        }
    }
}

enum Write {
    Match(MatchRecord),
    Slot(SlotRecord),
    Placements { slot_id: i64, ships: Vec<ShipPlacement> },
    Move { id: i64, slot_id: i64, target: Cell },
    Phase { match_id: Uuid, phase: Phase },
    Outcome { slot_id: i64, outcome: SlotOutcome },
}

#[derive(Clone)]
struct LockTable<K> {
    locks: Arc<Mutex<HashMap<K, Arc<Mutex<()>>>>>,
}

impl<K> Default for LockTable<K> {
    fn default() -> Self {
        Self {
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K: Eq + Hash + Copy> LockTable<K> {
    async fn handle(&self, key: K) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(key).or_default().clone()
    }

    async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        self.handle(key).await.lock_owned().await
    }

    async fn try_lock(&self, key: K) -> Option<OwnedMutexGuard<()>> {
        self.handle(key).await.try_lock_owned().ok()
    }
}

pub struct MemoryMatchTx {
    tables: Arc<RwLock<Tables>>,
    match_locks: LockTable<Uuid>,
    slot_locks: LockTable<i64>,
    match_guards: HashMap<Uuid, OwnedMutexGuard<()>>,
    slot_guards: HashMap<i64, OwnedMutexGuard<()>>,
    writes: Vec<Write>,
}

impl MemoryMatchTx {
    fn staged_move(&self, slot_id: i64, target: Cell) -> bool {
        self.writes.iter().any(|write| {
            matches!(write, Write::Move { slot_id: owner, target: cell, .. }
                if *owner == slot_id && *cell == target)
        })
    }
}

#[async_trait]
impl MatchStore for MemoryMatchStore {
    async fn begin(&self) -> Result<Box<dyn MatchTx>> {
        Ok(Box::new(MemoryMatchTx {
            tables: self.tables.clone(),
            match_locks: self.match_locks.clone(),
            slot_locks: self.slot_locks.clone(),
            match_guards: HashMap::new(),
            slot_guards: HashMap::new(),
            writes: Vec::new(),
        }))
    }

    async fn snapshot(&self, match_id: Uuid) -> Result<Option<MatchSnapshot>> {
        let tables = self.tables.read().await;
        let Some(record) = tables.matches.get(&match_id).cloned() else {
            return Ok(None);
        };
        let slots = tables
            .slots_of(match_id)
            .into_iter()
            .map(|slot| SlotSnapshot {
                ships: tables.placements.get(&slot.id).cloned().unwrap_or_default(),
                moves: tables.moves_of(slot.id),
                slot,
            })
            .collect();
        Ok(Some(MatchSnapshot { record, slots }))
    }

    async fn ping(&self) -> bool {
        true
    }
}

#[async_trait]
impl MatchTx for MemoryMatchTx {
    async fn insert_match(&mut self, config: &MatchConfig) -> Result<MatchRecord> {
        let record = MatchRecord {
            id: Uuid::new_v4(),
            config: config.clone(),
            phase: Phase::Join,
            created_at: Utc::now(),
        };
        self.writes.push(Write::Match(record.clone()));
        Ok(record)
    }

    async fn lock_match(&mut self, match_id: Uuid) -> Result<Option<MatchRecord>> {
        if !self.match_guards.contains_key(&match_id) {
            let guard = self.match_locks.lock(match_id).await;
            self.match_guards.insert(match_id, guard);
        }
        self.load_match(match_id).await
    }

    async fn share_match(&mut self, match_id: Uuid) -> Result<Option<MatchRecord>> {
        // No guard; commit rejects moves whose match left Attack.
        self.load_match(match_id).await
    }

    async fn load_match(&mut self, match_id: Uuid) -> Result<Option<MatchRecord>> {
        Ok(self.tables.read().await.matches.get(&match_id).cloned())
    }

    async fn slots(&mut self, match_id: Uuid) -> Result<Vec<SlotRecord>> {
        Ok(self.tables.read().await.slots_of(match_id))
    }

    async fn find_slot(&mut self, match_id: Uuid, identity: &str) -> Result<Option<SlotRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .slots_of(match_id)
            .into_iter()
            .find(|slot| slot.identity == identity))
    }

    async fn try_lock_slot(&mut self, slot_id: i64) -> Result<Option<SlotRecord>> {
        let Some(slot) = self.tables.read().await.slots.get(&slot_id).cloned() else {
            return Ok(None);
        };
        if !self.slot_guards.contains_key(&slot_id) {
            let guard = self.slot_locks.try_lock(slot_id).await.ok_or(AppError::Busy)?;
            self.slot_guards.insert(slot_id, guard);
        }
        Ok(Some(slot))
    }

    async fn insert_slot(&mut self, match_id: Uuid, identity: &str) -> Result<SlotRecord> {
        let id = {
            let mut tables = self.tables.write().await;
            if tables
                .slots
                .values()
                .any(|slot| slot.match_id == match_id && slot.identity == identity)
            {
                return Err(AppError::AlreadyJoined);
            }
            tables.next_slot_id += 1;
            tables.next_slot_id
        };
        let slot = SlotRecord {
            id,
            match_id,
            identity: identity.to_string(),
            outcome: SlotOutcome::Playing,
        };
        self.writes.push(Write::Slot(slot.clone()));
        Ok(slot)
    }

    async fn placements(&mut self, slot_id: i64) -> Result<Vec<ShipPlacement>> {
        Ok(self
            .tables
            .read()
            .await
            .placements
            .get(&slot_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_placements(&mut self, slot_id: i64, ships: &[ShipPlacement]) -> Result<()> {
        self.writes.push(Write::Placements {
            slot_id,
            ships: ships.to_vec(),
        });
        Ok(())
    }

    async fn moves(&mut self, slot_id: i64) -> Result<Vec<Cell>> {
        Ok(self.tables.read().await.moves_of(slot_id))
    }

    async fn append_move(&mut self, slot_id: i64, target: Cell) -> Result<()> {
        let (x, y) = target;
        if self.staged_move(slot_id, target) {
            return Err(AppError::AlreadyAttacked { x, y });
        }
        let id = {
            let mut tables = self.tables.write().await;
            if tables.has_move(slot_id, target) {
                return Err(AppError::AlreadyAttacked { x, y });
            }
            tables.next_move_id += 1;
            tables.next_move_id
        };
        self.writes.push(Write::Move {
            id,
            slot_id,
            target,
        });
        Ok(())
    }

    async fn set_phase(&mut self, match_id: Uuid, phase: Phase) -> Result<()> {
        self.writes.push(Write::Phase { match_id, phase });
        Ok(())
    }

    async fn set_outcome(&mut self, slot_id: i64, outcome: SlotOutcome) -> Result<()> {
        self.writes.push(Write::Outcome { slot_id, outcome });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryMatchTx {
            tables,
            match_guards,
            slot_guards,
            writes,
            ..
        } = *self;

        let mut tables = tables.write().await;
        // Check every constraint before touching anything so a failed commit
        // leaves no partial state behind.
        let mut seen: HashSet<(i64, Cell)> = HashSet::new();
        for write in &writes {
            if let Write::Move { slot_id, target, .. } = write {
                if let Some(phase) = tables.phase_of_slot(*slot_id) {
                    if phase != Phase::Attack {
                        return Err(AppError::WrongPhase(phase));
                    }
                }
                if tables.has_move(*slot_id, *target) || !seen.insert((*slot_id, *target)) {
                    let (x, y) = *target;
                    return Err(AppError::AlreadyAttacked { x, y });
                }
            }
        }
        for write in writes {
            tables.apply(write);
        }
        drop(tables);

        drop(slot_guards);
        drop(match_guards);
        Ok(())
    }
}
