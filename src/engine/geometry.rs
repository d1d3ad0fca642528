use std::collections::HashSet;

use super::{Cell, Orientation, ShipPlacement};

/// Cells covered by a ship of `length` starting at `(x, y)`.
///
/// Vertical ships grow along `y`, horizontal ships along `x`. A non-positive
/// length covers nothing.
pub fn occupied_cells(x: i32, y: i32, length: i32, orientation: Orientation) -> HashSet<Cell> {
    (0..length.max(0))
        .map(|step| match orientation {
            Orientation::Vertical => (x, y.saturating_add(step)),
            Orientation::Horizontal => (x.saturating_add(step), y),
        })
        .collect()
}

/// Occupied cells plus the exclusion corridor around them.
///
/// The corridor runs along both sides of the long axis, starting one cell
/// before the bow and ending level with the stern, and adds one cap cell
/// beyond each end. The two diagonal cells past the stern are not part of it,
/// so the placement validator checks corridors in both directions.
pub fn buffer_cells(ship: &ShipPlacement) -> HashSet<Cell> {
    let ShipPlacement {
        x,
        y,
        length,
        orientation,
    } = *ship;
    let mut cells = occupied_cells(x, y, length, orientation);
    if length <= 0 {
        return cells;
    }

    let span = length.saturating_add(1);
    let (before_x, before_y) = (x.saturating_sub(1), y.saturating_sub(1));
    match orientation {
        Orientation::Vertical => {
            cells.extend(occupied_cells(before_x, before_y, span, orientation));
            cells.extend(occupied_cells(x.saturating_add(1), before_y, span, orientation));
            cells.insert((x, before_y));
            cells.insert((x, y.saturating_add(length)));
        }
        Orientation::Horizontal => {
            cells.extend(occupied_cells(before_x, before_y, span, orientation));
            cells.extend(occupied_cells(before_x, y.saturating_add(1), span, orientation));
            cells.insert((before_x, y));
            cells.insert((x.saturating_add(length), y));
        }
    }
    cells
}

impl ShipPlacement {
    pub fn occupied_cells(&self) -> HashSet<Cell> {
        occupied_cells(self.x, self.y, self.length, self.orientation)
    }

    pub fn buffer_cells(&self) -> HashSet<Cell> {
        buffer_cells(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cells(list: &[Cell]) -> HashSet<Cell> {
        list.iter().copied().collect()
    }

    #[test]
    fn horizontal_ship_grows_along_x() {
        let occupied = occupied_cells(1, 2, 3, Orientation::Horizontal);
        assert_eq!(occupied, cells(&[(1, 2), (2, 2), (3, 2)]));
    }

    #[test]
    fn vertical_ship_grows_along_y() {
        let occupied = occupied_cells(4, 0, 2, Orientation::Vertical);
        assert_eq!(occupied, cells(&[(4, 0), (4, 1)]));
    }

    #[test]
    fn zero_length_covers_nothing() {
        assert!(occupied_cells(0, 0, 0, Orientation::Vertical).is_empty());
        assert!(occupied_cells(0, 0, -3, Orientation::Horizontal).is_empty());
    }

    #[test]
    fn horizontal_buffer_is_corridor_shaped() {
        let ship = ShipPlacement::new(2, 2, 2, Orientation::Horizontal);
        let expected = cells(&[
            // hull
            (2, 2),
            (3, 2),
            // row above, bow corner through stern
            (1, 1),
            (2, 1),
            (3, 1),
            // row below
            (1, 3),
            (2, 3),
            (3, 3),
            // caps
            (1, 2),
            (4, 2),
        ]);
        assert_eq!(ship.buffer_cells(), expected);
        assert!(!ship.buffer_cells().contains(&(4, 1)));
        assert!(!ship.buffer_cells().contains(&(4, 3)));
    }

    #[test]
    fn vertical_buffer_is_corridor_shaped() {
        let ship = ShipPlacement::new(1, 1, 1, Orientation::Vertical);
        let expected = cells(&[(1, 1), (0, 0), (0, 1), (2, 0), (2, 1), (1, 0), (1, 2)]);
        assert_eq!(buffer_cells(&ship), expected);
    }

    #[test]
    fn buffer_at_the_integer_limits_saturates() {
        for orientation in [Orientation::Horizontal, Orientation::Vertical] {
            let low = ShipPlacement::new(i32::MIN, i32::MIN, 3, orientation);
            let buffer = buffer_cells(&low);
            assert!(buffer.contains(&(i32::MIN, i32::MIN)));

            let high = ShipPlacement::new(i32::MAX, i32::MAX, 3, orientation);
            assert!(buffer_cells(&high).contains(&(i32::MAX, i32::MAX)));
        }
    }

    proptest! {
        #[test]
        fn occupied_cells_are_collinear_and_exactly_length(
            x in 0i32..50,
            y in 0i32..50,
            length in 1i32..12,
            vertical in any::<bool>(),
        ) {
            let orientation = if vertical { Orientation::Vertical } else { Orientation::Horizontal };
            let occupied = occupied_cells(x, y, length, orientation);
            prop_assert_eq!(occupied.len(), length as usize);
            for step in 0..length {
                let expected = if vertical { (x, y + step) } else { (x + step, y) };
                prop_assert!(occupied.contains(&expected));
            }
        }

        #[test]
        fn buffer_always_contains_hull(
            x in -5i32..50,
            y in -5i32..50,
            length in 1i32..12,
            vertical in any::<bool>(),
        ) {
            let orientation = if vertical { Orientation::Vertical } else { Orientation::Horizontal };
            let ship = ShipPlacement::new(x, y, length, orientation);
            let buffer = ship.buffer_cells();
            prop_assert!(ship.occupied_cells().is_subset(&buffer));
            prop_assert_eq!(buffer.len(), 3 * length as usize + 4);
        }
    }
}
