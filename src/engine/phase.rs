use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    constants::MAX_SLOTS,
    error::{AppError, Result},
};

/// Match lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Join,
    Setup,
    Attack,
    Finished,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Setup => "setup",
            Self::Attack => "attack",
            Self::Finished => "finished",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "join" => Some(Self::Join),
            "setup" => Some(Self::Setup),
            "attack" => Some(Self::Attack),
            "finished" => Some(Self::Finished),
            _ => None,
        }
    }

    /// Transition table. The normal path is Join -> Setup -> Attack -> Finished;
    /// an external finish may also close a match still in Join or Setup.
    pub fn can_transition_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Self::Join, Self::Setup)
                | (Self::Setup, Self::Attack)
                | (Self::Attack, Self::Finished)
                | (Self::Join, Self::Finished)
                | (Self::Setup, Self::Finished)
        )
    }

    pub fn transition(self, next: Phase) -> Result<Phase> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(AppError::InvalidState(format!(
                "Illegal phase transition {} -> {}",
                self, next
            )))
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Finished
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of one seated player, set only when the match finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotOutcome {
    #[serde(rename = "playing")]
    Playing,
    #[serde(rename = "finished")]
    Finished,
    #[serde(rename = "dnf")]
    DidNotFinish,
}

impl SlotOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Playing => "playing",
            Self::Finished => "finished",
            Self::DidNotFinish => "dnf",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "playing" => Some(Self::Playing),
            "finished" => Some(Self::Finished),
            "dnf" => Some(Self::DidNotFinish),
            _ => None,
        }
    }
}

/// Decides whether `identity` may take a seat, returning the phase the match
/// moves to once the seat is written.
///
/// A full match always answers `Full`, whatever its phase, so a third joiner
/// gets the same error before and after the match finishes.
pub fn admit_join(phase: Phase, seated: &[&str], identity: &str) -> Result<Phase> {
    if seated.iter().any(|seat| *seat == identity) {
        return Err(AppError::AlreadyJoined);
    }
    if seated.len() >= MAX_SLOTS {
        return Err(AppError::Full);
    }
    if phase.is_terminal() {
        return Err(AppError::WrongPhase(phase));
    }
    if phase != Phase::Join {
        return Err(AppError::NotAcceptingJoins);
    }
    if seated.len() + 1 == MAX_SLOTS {
        return phase.transition(Phase::Setup);
    }
    Ok(phase)
}

/// A seated player as seen by the finish step.
#[derive(Debug, Clone, Copy)]
pub struct SeatedSlot<'a> {
    pub identity: &'a str,
    pub has_ships: bool,
}

/// Resolves the terminal outcome of every seated slot, in seat order.
///
/// Seats with no committed ships while the match never left Join/Setup are
/// forced to `DidNotFinish`. Seats the authority did not report are treated
/// the same way.
pub fn settle_outcomes(
    phase: Phase,
    seated: &[SeatedSlot<'_>],
    reported: &[(String, SlotOutcome)],
) -> Result<Vec<SlotOutcome>> {
    if phase.is_terminal() {
        return Err(AppError::WrongPhase(phase));
    }

    for (index, (identity, outcome)) in reported.iter().enumerate() {
        if *outcome == SlotOutcome::Playing {
            return Err(AppError::BadRequest(format!(
                "Outcome for {} must be terminal",
                identity
            )));
        }
        if !seated.iter().any(|seat| seat.identity == identity) {
            return Err(AppError::NotFound(format!(
                "Player {} is not seated in this match",
                identity
            )));
        }
        if reported[..index].iter().any(|(other, _)| other == identity) {
            return Err(AppError::BadRequest(format!(
                "Outcome for {} reported more than once",
                identity
            )));
        }
    }

    let forfeit_unplaced = matches!(phase, Phase::Join | Phase::Setup);
    let outcomes = seated
        .iter()
        .map(|seat| {
            if forfeit_unplaced && !seat.has_ships {
                return SlotOutcome::DidNotFinish;
            }
            reported
                .iter()
                .find(|(identity, _)| identity == seat.identity)
                .map(|(_, outcome)| *outcome)
                .unwrap_or(SlotOutcome::DidNotFinish)
        })
        .collect();
    Ok(outcomes)
}
