use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{
    constants::SHIP_PACKING_PADDING,
    error::{AppError, Result},
};

/// One roster entry: `count` ships of `length` cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipClass {
    pub length: i32,
    pub count: i32,
}

/// Board size plus required roster. Immutable once a match references it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchConfig {
    board_size: i32,
    roster: BTreeMap<i32, i32>,
}

impl MatchConfig {
    /// Builds a config, rejecting rosters that cannot reasonably be packed.
    ///
    /// Each ship is charged `length + 3` cells for its share of the exclusion
    /// corridor. The total must be positive and fit on the board. This is a
    /// heuristic, not a packing proof.
    pub fn new(board_size: i32, classes: &[ShipClass]) -> Result<Self> {
        if board_size <= 0 {
            return Err(AppError::InvalidConfig(
                "Board size must be > 0".to_string(),
            ));
        }

        let mut roster = BTreeMap::new();
        for class in classes {
            if class.length <= 0 {
                return Err(AppError::InvalidConfig(format!(
                    "Ship length must be > 0 (got {})",
                    class.length
                )));
            }
            if class.count < 0 {
                return Err(AppError::InvalidConfig(format!(
                    "Ship count must be >= 0 (got {} for length {})",
                    class.count, class.length
                )));
            }
            if roster.insert(class.length, class.count).is_some() {
                return Err(AppError::InvalidConfig(format!(
                    "Ship length {} listed more than once",
                    class.length
                )));
            }
        }
        roster.retain(|_, count| *count > 0);

        let config = Self { board_size, roster };
        let consumed = config.consumed_cells();
        if consumed == 0 {
            return Err(AppError::InvalidConfig(
                "Must have at least 1 ship".to_string(),
            ));
        }
        let capacity = i64::from(board_size) * i64::from(board_size);
        if consumed > capacity {
            return Err(AppError::InvalidConfig(format!(
                "Not enough empty tiles: roster needs {} of {}",
                consumed, capacity
            )));
        }
        Ok(config)
    }

    pub fn board_size(&self) -> i32 {
        self.board_size
    }

    /// Required ship count keyed by length. Zero-count classes are dropped.
    pub fn roster(&self) -> &BTreeMap<i32, i32> {
        &self.roster
    }

    pub fn ship_classes(&self) -> Vec<ShipClass> {
        self.roster
            .iter()
            .map(|(&length, &count)| ShipClass { length, count })
            .collect()
    }

    /// Cells charged against the board by the packing heuristic.
    pub fn consumed_cells(&self) -> i64 {
        self.roster
            .iter()
            .map(|(&length, &count)| {
                i64::from(count) * (i64::from(length) + SHIP_PACKING_PADDING)
            })
            .sum()
    }

    pub fn total_ship_cells(&self) -> i64 {
        self.roster
            .iter()
            .map(|(&length, &count)| i64::from(count) * i64::from(length))
            .sum()
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        (0..self.board_size).contains(&x) && (0..self.board_size).contains(&y)
    }
}
