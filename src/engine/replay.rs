//! Rebuilds the chronological move stream of a match from its persisted
//! placements and per-slot move logs, and decides the loser.
//!
//! Moves do not store their result. Each slot's log is replayed against the
//! opponent's ships, cut into streaks (runs of hits closed by a miss), and the
//! two streak lists are interleaved turn by turn, first seat first.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{AttackResult, Cell, ShipPlacement, SlotOutcome};
use crate::{
    constants::MAX_SLOTS,
    error::{AppError, Result},
};

/// Everything the reconstructor needs about one seat.
#[derive(Debug, Clone)]
pub struct SlotLog {
    pub identity: String,
    pub outcome: SlotOutcome,
    pub ships: Vec<ShipPlacement>,
    /// Attacker's moves in persisted order.
    pub moves: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayedMove {
    pub x: i32,
    pub y: i32,
    pub player: String,
    pub result: AttackResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchReplay {
    pub moves: Vec<ReplayedMove>,
    pub loser: Option<String>,
    pub winner: Option<String>,
}

impl MatchReplay {
    pub fn is_draw(&self) -> bool {
        self.loser.is_none()
    }
}

/// Live copy of the defender's unsunk cells.
struct FleetIndex {
    ship_of: HashMap<Cell, usize>,
    remaining: Vec<usize>,
}

impl FleetIndex {
    fn new(ships: &[ShipPlacement]) -> Self {
        let mut ship_of = HashMap::new();
        let mut remaining = Vec::with_capacity(ships.len());
        for (index, ship) in ships.iter().enumerate() {
            let occupied = ship.occupied_cells();
            remaining.push(occupied.len());
            for cell in occupied {
                ship_of.entry(cell).or_insert(index);
            }
        }
        Self { ship_of, remaining }
    }

    fn strike(&mut self, cell: Cell) -> AttackResult {
        let Some(index) = self.ship_of.remove(&cell) else {
            return AttackResult::Miss;
        };
        self.remaining[index] = self.remaining[index].saturating_sub(1);
        if self.remaining[index] == 0 {
            AttackResult::Sunk
        } else {
            AttackResult::Hit
        }
    }
}

/// Classifies an attacker's moves, in order, against the defender's ships.
pub fn classify_moves(defender_ships: &[ShipPlacement], moves: &[Cell]) -> Vec<AttackResult> {
    let mut fleet = FleetIndex::new(defender_ships);
    moves.iter().map(|cell| fleet.strike(*cell)).collect()
}

/// Cuts classified moves into streaks. A streak ends after its first miss or
/// when the log runs out.
pub fn streaks(player: &str, moves: &[Cell], results: &[AttackResult]) -> Vec<Vec<ReplayedMove>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    for (&(x, y), &result) in moves.iter().zip(results) {
        current.push(ReplayedMove {
            x,
            y,
            player: player.to_string(),
            result,
        });
        if result == AttackResult::Miss {
            out.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Interleaves streak lists turn by turn, `first` leading every round.
fn interleave(first: Vec<Vec<ReplayedMove>>, second: Vec<Vec<ReplayedMove>>) -> Vec<ReplayedMove> {
    let rounds = first.len().max(second.len());
    let mut first = first.into_iter();
    let mut second = second.into_iter();
    let mut stream = Vec::new();
    for _ in 0..rounds {
        stream.extend(first.next().unwrap_or_default());
        stream.extend(second.next().unwrap_or_default());
    }
    stream
}

/// Replays a two-seat match. `slots` must be in seat order.
///
/// Loser rules: a lone `DidNotFinish` seat loses outright. Otherwise the seat
/// that owns both of the last two records in the stream is the loser, since it
/// was still shooting after the other seat had cleared the board. Anything
/// else is a draw.
pub fn reconstruct(slots: &[SlotLog]) -> Result<MatchReplay> {
    let [first, second] = slots else {
        return Err(AppError::InvalidState(format!(
            "Replay needs exactly {} slots, found {}",
            MAX_SLOTS,
            slots.len()
        )));
    };

    let first_streaks = streaks(
        &first.identity,
        &first.moves,
        &classify_moves(&second.ships, &first.moves),
    );
    let second_streaks = streaks(
        &second.identity,
        &second.moves,
        &classify_moves(&first.ships, &second.moves),
    );
    let moves = interleave(first_streaks, second_streaks);

    let first_dnf = first.outcome == SlotOutcome::DidNotFinish;
    let second_dnf = second.outcome == SlotOutcome::DidNotFinish;
    let loser = match (first_dnf, second_dnf) {
        (true, false) => Some(first.identity.clone()),
        (false, true) => Some(second.identity.clone()),
        _ => match moves.as_slice() {
            [.., before_last, last] if before_last.player == last.player => {
                Some(last.player.clone())
            }
            _ => None,
        },
    };
    let winner = loser.as_ref().map(|loser| {
        if *loser == first.identity {
            second.identity.clone()
        } else {
            first.identity.clone()
        }
    });

    Ok(MatchReplay {
        moves,
        loser,
        winner,
    })
}
