// src/models/mod.rs
pub mod matches;

pub use matches::{ApiResponse, MatchRow, MoveRow, PlacementRow, SlotRow};
