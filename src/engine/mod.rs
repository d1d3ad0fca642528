// Match rules: pure functions over configs, placements and move logs.
// Nothing in here touches storage; the services layer feeds it snapshots
// read inside a transaction.

pub mod attack;
pub mod geometry;
pub mod match_config;
pub mod phase;
pub mod placement;
pub mod replay;

use serde::{Deserialize, Serialize};

pub use attack::{resolve_attack, AttackResult};
pub use match_config::{MatchConfig, ShipClass};
pub use phase::{Phase, SlotOutcome};
pub use replay::{reconstruct, MatchReplay, ReplayedMove, SlotLog};

/// Board coordinate as `(x, y)`.
pub type Cell = (i32, i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    pub fn as_i16(self) -> i16 {
        match self {
            Self::Horizontal => 0,
            Self::Vertical => 1,
        }
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(Self::Horizontal),
            1 => Some(Self::Vertical),
            _ => None,
        }
    }
}

/// One ship as submitted by a player and later committed to its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShipPlacement {
    pub x: i32,
    pub y: i32,
    pub length: i32,
    pub orientation: Orientation,
}

impl ShipPlacement {
    pub fn new(x: i32, y: i32, length: i32, orientation: Orientation) -> Self {
        Self {
            x,
            y,
            length,
            orientation,
        }
    }
}
