use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use super::replay_cache::ReplayCache;
use crate::{
    constants::DEFAULT_BOARD_SIZE,
    db::{MatchRecord, MatchSnapshot, MatchStore},
    engine::{
        phase::{admit_join, settle_outcomes, SeatedSlot},
        placement::validate_layout,
        reconstruct, resolve_attack, AttackResult, Cell, MatchConfig, MatchReplay, Phase,
        ReplayedMove, ShipClass, ShipPlacement, SlotLog, SlotOutcome,
    },
    error::{AppError, Result},
};

#[derive(Debug, Clone, Serialize)]
pub struct PlayerStatus {
    pub identity: String,
    pub outcome: SlotOutcome,
    pub ships_placed: bool,
    pub moves_made: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchStatus {
    pub match_id: Uuid,
    pub phase: Phase,
    pub board_size: i32,
    pub ship_config: Vec<ShipClass>,
    pub created_at: DateTime<Utc>,
    pub you: PlayerStatus,
    pub opponent: Option<PlayerStatus>,
    // Populated once the match is finished and both seats were filled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moves: Option<Vec<ReplayedMove>>,
    pub loser: Option<String>,
    pub winner: Option<String>,
    pub is_draw: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerOutcome {
    pub identity: String,
    pub outcome: SlotOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinishSummary {
    pub match_id: Uuid,
    pub phase: Phase,
    pub players: Vec<PlayerOutcome>,
    pub loser: Option<String>,
    pub winner: Option<String>,
    pub is_draw: Option<bool>,
}

fn match_not_found(match_id: Uuid) -> AppError {
    AppError::NotFound(format!("Match {} not found", match_id))
}

fn not_seated(match_id: Uuid, identity: &str) -> AppError {
    AppError::NotFound(format!("Player {} has no seat in match {}", identity, match_id))
}

/// Runs each match operation inside one store transaction and hands the
/// decisions to the engine.
#[derive(Clone)]
pub struct MatchService {
    store: Arc<dyn MatchStore>,
    cache: ReplayCache,
}

impl MatchService {
    pub fn new(store: Arc<dyn MatchStore>, cache: ReplayCache) -> Self {
        Self { store, cache }
    }

    pub async fn store_ready(&self) -> bool {
        self.store.ping().await
    }

    pub async fn create_match(
        &self,
        board_size: Option<i32>,
        ships: &[ShipClass],
    ) -> Result<MatchRecord> {
        let config = MatchConfig::new(board_size.unwrap_or(DEFAULT_BOARD_SIZE), ships)?;

        let mut tx = self.store.begin().await?;
        let record = tx.insert_match(&config).await?;
        tx.commit().await?;

        tracing::info!(
            match_id = %record.id,
            board_size = config.board_size(),
            "Match created"
        );
        Ok(record)
    }

    /// Seats `identity`. The match row stays locked from the seat count read
    /// until the new seat is committed, so two joiners cannot both become the
    /// second seat.
    pub async fn join(&self, match_id: Uuid, identity: &str) -> Result<Phase> {
        let mut tx = self.store.begin().await?;
        let record = tx
            .lock_match(match_id)
            .await?
            .ok_or_else(|| match_not_found(match_id))?;
        let slots = tx.slots(match_id).await?;
        let seated: Vec<&str> = slots.iter().map(|slot| slot.identity.as_str()).collect();

        let next = admit_join(record.phase, &seated, identity)?;
        tx.insert_slot(match_id, identity).await?;
        if next != record.phase {
            tx.set_phase(match_id, next).await?;
        }
        tx.commit().await?;

        tracing::info!(%match_id, identity, seat = seated.len() + 1, "Player joined match");
        if next != record.phase {
            tracing::info!(%match_id, from = %record.phase, to = %next, "Match phase advanced");
        }
        Ok(next)
    }

    /// Commits a full layout for the caller's slot and returns the phase
    /// afterwards (`Attack` once the opponent had already placed).
    pub async fn place(
        &self,
        match_id: Uuid,
        identity: &str,
        ships: &[ShipPlacement],
    ) -> Result<Phase> {
        let mut tx = self.store.begin().await?;
        let slot = tx
            .find_slot(match_id, identity)
            .await?
            .ok_or_else(|| not_seated(match_id, identity))?;
        tx.try_lock_slot(slot.id)
            .await?
            .ok_or_else(|| not_seated(match_id, identity))?;

        let record = tx
            .load_match(match_id)
            .await?
            .ok_or_else(|| match_not_found(match_id))?;
        let existing = tx.placements(slot.id).await?;
        validate_layout(record.phase, existing.len(), &record.config, ships)?;
        tx.insert_placements(slot.id, ships).await?;

        // The phase may have moved while the slot was being validated.
        let record = tx
            .lock_match(match_id)
            .await?
            .ok_or_else(|| match_not_found(match_id))?;
        if record.phase != Phase::Setup {
            return Err(AppError::WrongPhase(record.phase));
        }

        let mut phase = record.phase;
        let opponent = tx
            .slots(match_id)
            .await?
            .into_iter()
            .find(|other| other.id != slot.id);
        if let Some(opponent) = opponent {
            if !tx.placements(opponent.id).await?.is_empty() {
                phase = phase.transition(Phase::Attack)?;
                tx.set_phase(match_id, phase).await?;
            }
        }
        tx.commit().await?;

        tracing::info!(%match_id, identity, ships = ships.len(), "Ships placed");
        if phase != record.phase {
            tracing::info!(%match_id, from = %record.phase, to = %phase, "Match phase advanced");
        }
        Ok(phase)
    }

    /// Resolves one shot and records it. The opponent's ships and the
    /// attacker's earlier moves are read in the same transaction as the append.
    /// The match is held shared, so a concurrent finish waits for the append
    /// or the append fails.
    pub async fn attack(&self, match_id: Uuid, identity: &str, target: Cell) -> Result<AttackResult> {
        let mut tx = self.store.begin().await?;
        let record = tx
            .share_match(match_id)
            .await?
            .ok_or_else(|| match_not_found(match_id))?;
        let slots = tx.slots(match_id).await?;
        let attacker = slots
            .iter()
            .find(|slot| slot.identity == identity)
            .ok_or_else(|| not_seated(match_id, identity))?;

        let defender_ships = match slots.iter().find(|slot| slot.id != attacker.id) {
            Some(defender) => tx.placements(defender.id).await?,
            None => Vec::new(),
        };
        let prior: HashSet<Cell> = tx.moves(attacker.id).await?.into_iter().collect();

        let result = resolve_attack(record.phase, &record.config, &prior, &defender_ships, target)?;
        tx.append_move(attacker.id, target).await?;
        tx.commit().await?;

        tracing::debug!(
            %match_id,
            identity,
            x = target.0,
            y = target.1,
            %result,
            "Attack resolved"
        );
        Ok(result)
    }

    /// Authority-only. Moves the match to `Finished` and fixes every seat's
    /// outcome; seats left out of `reported` did not finish.
    pub async fn finish(
        &self,
        match_id: Uuid,
        reported: &[(String, SlotOutcome)],
    ) -> Result<FinishSummary> {
        let mut tx = self.store.begin().await?;

        // Slot locks before the match lock; an in-flight placement makes this Busy.
        for slot in tx.slots(match_id).await? {
            tx.try_lock_slot(slot.id).await?;
        }
        let record = tx
            .lock_match(match_id)
            .await?
            .ok_or_else(|| match_not_found(match_id))?;
        let slots = tx.slots(match_id).await?;
        for slot in &slots {
            tx.try_lock_slot(slot.id).await?;
        }

        let mut logs = Vec::with_capacity(slots.len());
        for slot in &slots {
            logs.push(SlotLog {
                identity: slot.identity.clone(),
                outcome: slot.outcome,
                ships: tx.placements(slot.id).await?,
                moves: tx.moves(slot.id).await?,
            });
        }
        let seated: Vec<SeatedSlot<'_>> = logs
            .iter()
            .map(|log| SeatedSlot {
                identity: &log.identity,
                has_ships: !log.ships.is_empty(),
            })
            .collect();
        let outcomes = settle_outcomes(record.phase, &seated, reported)?;
        let phase = record.phase.transition(Phase::Finished)?;

        for (slot, outcome) in slots.iter().zip(&outcomes) {
            tx.set_outcome(slot.id, *outcome).await?;
        }
        tx.set_phase(match_id, phase).await?;
        tx.commit().await?;

        for (log, outcome) in logs.iter_mut().zip(&outcomes) {
            log.outcome = *outcome;
        }
        let replay = if logs.len() == 2 {
            let replay = reconstruct(&logs)?;
            Some(self.cache.put(match_id, replay).await)
        } else {
            None
        };

        tracing::info!(
            %match_id,
            from = %record.phase,
            loser = replay.as_ref().and_then(|r| r.loser.as_deref()),
            "Match finished"
        );

        Ok(FinishSummary {
            match_id,
            phase,
            players: logs
                .iter()
                .map(|log| PlayerOutcome {
                    identity: log.identity.clone(),
                    outcome: log.outcome,
                })
                .collect(),
            loser: replay.as_ref().and_then(|r| r.loser.clone()),
            winner: replay.as_ref().and_then(|r| r.winner.clone()),
            is_draw: replay.as_ref().map(|r| r.is_draw()),
        })
    }

    /// Unlocked read. Replay fields are only filled for finished two-seat
    /// matches.
    pub async fn status(&self, match_id: Uuid, identity: &str) -> Result<MatchStatus> {
        let snapshot = self
            .store
            .snapshot(match_id)
            .await?
            .ok_or_else(|| match_not_found(match_id))?;
        let seat = snapshot
            .seat_of(identity)
            .ok_or_else(|| not_seated(match_id, identity))?;

        let replay = if snapshot.record.phase == Phase::Finished && snapshot.slots.len() == 2 {
            Some(self.replay(&snapshot).await?)
        } else {
            None
        };

        let player = |index: usize| {
            snapshot.slots.get(index).map(|seat| PlayerStatus {
                identity: seat.slot.identity.clone(),
                outcome: seat.slot.outcome,
                ships_placed: !seat.ships.is_empty(),
                moves_made: seat.moves.len(),
            })
        };
        let you = player(seat).ok_or_else(|| not_seated(match_id, identity))?;
        let opponent = (0..snapshot.slots.len())
            .find(|index| *index != seat)
            .and_then(player);

        let record = &snapshot.record;
        Ok(MatchStatus {
            match_id,
            phase: record.phase,
            board_size: record.config.board_size(),
            ship_config: record.config.ship_classes(),
            created_at: record.created_at,
            you,
            opponent,
            moves: replay.as_ref().map(|r| r.moves.clone()),
            loser: replay.as_ref().and_then(|r| r.loser.clone()),
            winner: replay.as_ref().and_then(|r| r.winner.clone()),
            is_draw: replay.as_ref().map(|r| r.is_draw()),
        })
    }

    async fn replay(&self, snapshot: &MatchSnapshot) -> Result<Arc<MatchReplay>> {
        let match_id = snapshot.record.id;
        if snapshot.record.phase != Phase::Finished {
            return Err(AppError::InvalidState(format!(
                "Match {} is not finished",
                match_id
            )));
        }
        if let Some(replay) = self.cache.get(match_id).await {
            return Ok(replay);
        }

        let logs: Vec<SlotLog> = snapshot
            .slots
            .iter()
            .map(|seat| SlotLog {
                identity: seat.slot.identity.clone(),
                outcome: seat.slot.outcome,
                ships: seat.ships.clone(),
                moves: seat.moves.clone(),
            })
            .collect();
        let replay = reconstruct(&logs)?;
        Ok(self.cache.put(match_id, replay).await)
    }
}
