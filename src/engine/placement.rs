use std::collections::{BTreeMap, HashSet};

use super::{Cell, MatchConfig, Phase, ShipPlacement};
use crate::error::{AppError, Result};

/// Validates a full proposed layout for one slot.
///
/// Checks run in a fixed order and stop at the first failure: phase, existing
/// ships, then per ship (in input order) bounds and spacing, and finally the
/// roster. Spacing is checked both ways: the new hull against everything
/// earlier ships claimed, and the new corridor against earlier hulls. That
/// makes the verdict independent of the order ships are listed in.
pub fn validate_layout(
    phase: Phase,
    existing_ships: usize,
    config: &MatchConfig,
    ships: &[ShipPlacement],
) -> Result<()> {
    if phase != Phase::Setup {
        return Err(AppError::WrongPhase(phase));
    }
    if existing_ships > 0 {
        return Err(AppError::AlreadyPlaced);
    }

    let mut claimed: HashSet<Cell> = HashSet::new();
    let mut hulls: HashSet<Cell> = HashSet::new();
    let mut counts: BTreeMap<i32, i32> = BTreeMap::new();

    for (index, ship) in ships.iter().enumerate() {
        if ship.length > config.board_size() {
            return Err(AppError::OutOfBounds {
                index: Some(index),
                x: ship.x,
                y: ship.y,
            });
        }

        let occupied = ship.occupied_cells();
        if let Some(&(x, y)) = occupied.iter().find(|(x, y)| !config.contains(*x, *y)) {
            return Err(AppError::OutOfBounds {
                index: Some(index),
                x,
                y,
            });
        }

        let buffer = ship.buffer_cells();
        if !occupied.is_disjoint(&claimed) || !buffer.is_disjoint(&hulls) {
            return Err(AppError::Overlap { index });
        }

        claimed.extend(buffer);
        hulls.extend(occupied);
        *counts.entry(ship.length).or_insert(0) += 1;
    }

    if &counts != config.roster() {
        return Err(AppError::InvalidRoster);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Orientation, ShipClass};
    use proptest::prelude::*;

    fn config(board_size: i32, classes: &[(i32, i32)]) -> MatchConfig {
        let classes: Vec<ShipClass> = classes
            .iter()
            .map(|&(length, count)| ShipClass { length, count })
            .collect();
        MatchConfig::new(board_size, &classes).unwrap()
    }

    fn h(x: i32, y: i32, length: i32) -> ShipPlacement {
        ShipPlacement::new(x, y, length, Orientation::Horizontal)
    }

    fn v(x: i32, y: i32, length: i32) -> ShipPlacement {
        ShipPlacement::new(x, y, length, Orientation::Vertical)
    }

    #[test]
    fn accepts_spaced_layout() {
        let cfg = config(6, &[(3, 1), (2, 2)]);
        let ships = [h(0, 0, 3), v(5, 0, 2), h(0, 4, 2)];
        assert!(validate_layout(Phase::Setup, 0, &cfg, &ships).is_ok());
    }

    #[test]
    fn wrong_phase_comes_first() {
        let cfg = config(4, &[(2, 1)]);
        assert!(matches!(
            validate_layout(Phase::Attack, 1, &cfg, &[h(0, 0, 2)]),
            Err(AppError::WrongPhase(Phase::Attack))
        ));
        assert!(matches!(
            validate_layout(Phase::Join, 0, &cfg, &[h(0, 0, 2)]),
            Err(AppError::WrongPhase(Phase::Join))
        ));
    }

    #[test]
    fn existing_ships_block_replacement() {
        let cfg = config(4, &[(2, 1)]);
        assert!(matches!(
            validate_layout(Phase::Setup, 1, &cfg, &[h(0, 0, 2)]),
            Err(AppError::AlreadyPlaced)
        ));
    }

    #[test]
    fn out_of_bounds_cites_ship_index() {
        let cfg = config(5, &[(2, 2)]);
        let err = validate_layout(Phase::Setup, 0, &cfg, &[h(0, 0, 2), v(4, 4, 2)]).unwrap_err();
        assert!(matches!(
            err,
            AppError::OutOfBounds {
                index: Some(1),
                x: 4,
                y: 5
            }
        ));

        let err = validate_layout(Phase::Setup, 0, &cfg, &[h(-1, 0, 2), h(0, 3, 2)]).unwrap_err();
        assert!(matches!(
            err,
            AppError::OutOfBounds {
                index: Some(0),
                x: -1,
                y: 0
            }
        ));
    }

    #[test]
    fn oversized_ship_is_out_of_bounds() {
        let cfg = config(5, &[(2, 1)]);
        assert!(matches!(
            validate_layout(Phase::Setup, 0, &cfg, &[h(0, 0, i32::MAX)]),
            Err(AppError::OutOfBounds { index: Some(0), .. })
        ));
    }

    #[test]
    fn adjacent_rows_overlap() {
        // Hulls never share a cell, but the second sits in the first's corridor.
        let cfg = config(6, &[(2, 2)]);
        assert!(matches!(
            validate_layout(Phase::Setup, 0, &cfg, &[h(0, 0, 2), h(0, 1, 2)]),
            Err(AppError::Overlap { index: 1 })
        ));
    }

    #[test]
    fn identical_cells_overlap() {
        let cfg = config(6, &[(2, 2)]);
        assert!(matches!(
            validate_layout(Phase::Setup, 0, &cfg, &[h(1, 1, 2), v(1, 1, 2)]),
            Err(AppError::Overlap { index: 1 })
        ));
    }

    #[test]
    fn stern_diagonal_is_caught_in_either_order() {
        // (2, 1) touches the stern of the first ship diagonally, a cell its
        // corridor leaves out. The later ship's corridor still reaches back.
        let cfg = config(6, &[(2, 1), (1, 1)]);
        let first = h(0, 0, 2);
        let second = h(2, 1, 1);
        assert!(matches!(
            validate_layout(Phase::Setup, 0, &cfg, &[first, second]),
            Err(AppError::Overlap { index: 1 })
        ));
        assert!(matches!(
            validate_layout(Phase::Setup, 0, &cfg, &[second, first]),
            Err(AppError::Overlap { index: 1 })
        ));
    }

    #[test]
    fn roster_mismatch_is_rejected() {
        let cfg = config(8, &[(3, 1), (2, 1)]);
        // missing ship
        assert!(matches!(
            validate_layout(Phase::Setup, 0, &cfg, &[h(0, 0, 3)]),
            Err(AppError::InvalidRoster)
        ));
        // extra ship
        assert!(matches!(
            validate_layout(Phase::Setup, 0, &cfg, &[h(0, 0, 3), h(0, 4, 2), h(5, 6, 2)]),
            Err(AppError::InvalidRoster)
        ));
        // wrong length
        assert!(matches!(
            validate_layout(Phase::Setup, 0, &cfg, &[h(0, 0, 3), h(0, 4, 4)]),
            Err(AppError::InvalidRoster)
        ));
        // empty layout
        assert!(matches!(
            validate_layout(Phase::Setup, 0, &cfg, &[]),
            Err(AppError::InvalidRoster)
        ));
    }

    fn arb_ship(board: i32) -> impl Strategy<Value = ShipPlacement> {
        (0..board, 0..board, 1i32..4, any::<bool>()).prop_map(|(x, y, length, vertical)| {
            let orientation = if vertical {
                Orientation::Vertical
            } else {
                Orientation::Horizontal
            };
            ShipPlacement::new(x, y, length, orientation)
        })
    }

    proptest! {
        #[test]
        fn verdict_is_order_independent(
            ships in prop::collection::vec(arb_ship(8), 1..5),
            rotate in 0usize..5,
        ) {
            let mut lengths: BTreeMap<i32, i32> = BTreeMap::new();
            for ship in &ships {
                *lengths.entry(ship.length).or_insert(0) += 1;
            }
            let classes: Vec<ShipClass> = lengths
                .iter()
                .map(|(&length, &count)| ShipClass { length, count })
                .collect();
            // The packing heuristic may refuse crowded rosters; nothing to check then.
            if let Ok(cfg) = MatchConfig::new(8, &classes) {
                let forward = validate_layout(Phase::Setup, 0, &cfg, &ships).is_ok();

                let mut reversed = ships.clone();
                reversed.reverse();
                let mut rotated = ships.clone();
                let shift = rotate % rotated.len();
                rotated.rotate_left(shift);

                prop_assert_eq!(validate_layout(Phase::Setup, 0, &cfg, &reversed).is_ok(), forward);
                prop_assert_eq!(validate_layout(Phase::Setup, 0, &cfg, &rotated).is_ok(), forward);
            }
        }
    }
}
