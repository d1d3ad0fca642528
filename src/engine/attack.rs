use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::{Cell, MatchConfig, Phase, ShipPlacement};
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttackResult {
    Miss,
    Hit,
    Sunk,
}

impl AttackResult {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Miss => "MISS",
            Self::Hit => "HIT",
            Self::Sunk => "SUNK",
        }
    }

    pub fn is_hit(self) -> bool {
        self != Self::Miss
    }
}

impl fmt::Display for AttackResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies one shot against the defender's committed ships.
///
/// `prior_moves` are the attacker's earlier shots. The caller persists the
/// move afterwards whatever the result; this function only decides it.
pub fn resolve_attack(
    phase: Phase,
    config: &MatchConfig,
    prior_moves: &HashSet<Cell>,
    defender_ships: &[ShipPlacement],
    target: Cell,
) -> Result<AttackResult> {
    if phase != Phase::Attack {
        return Err(AppError::WrongPhase(phase));
    }
    let (x, y) = target;
    if !config.contains(x, y) {
        return Err(AppError::OutOfBounds { index: None, x, y });
    }
    if prior_moves.contains(&target) {
        return Err(AppError::AlreadyAttacked { x, y });
    }

    // A cell belongs to at most one ship, so the first match decides.
    for ship in defender_ships {
        let occupied = ship.occupied_cells();
        if !occupied.contains(&target) {
            continue;
        }
        let sunk = occupied
            .iter()
            .all(|cell| *cell == target || prior_moves.contains(cell));
        return Ok(if sunk {
            AttackResult::Sunk
        } else {
            AttackResult::Hit
        });
    }
    Ok(AttackResult::Miss)
}
