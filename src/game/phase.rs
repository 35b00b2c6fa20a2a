//! Arena phases and the legal transitions between them

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ArenaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Disabled,
    Waiting,
    Starting,
    InGame,
    Ending,
    Regenerating,
}

impl Phase {
    /// Phases in which new players may enter the roster
    pub fn is_joinable(self) -> bool {
        matches!(self, Phase::Waiting | Phase::Starting)
    }

    /// Loadout choices stay open until the match begins
    pub fn accepts_loadout_selection(self) -> bool {
        self.is_joinable()
    }

    /// Phases owning timers or world writes that a force-stop must unwind
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Phase::Starting | Phase::InGame | Phase::Ending | Phase::Regenerating
        )
    }

    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::*;
        match (self, next) {
            (Disabled, Waiting) => true,
            (Waiting, Starting) | (Waiting, Disabled) => true,
            (Starting, Waiting) | (Starting, InGame) | (Starting, Disabled) => true,
            (InGame, Ending) | (InGame, Waiting) | (InGame, Disabled) => true,
            (Ending, Regenerating) | (Ending, Waiting) | (Ending, Disabled) => true,
            (Regenerating, Waiting) | (Regenerating, Disabled) => true,
            _ => false,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Disabled => "DISABLED",
            Phase::Waiting => "WAITING",
            Phase::Starting => "STARTING",
            Phase::InGame => "IN_GAME",
            Phase::Ending => "ENDING",
            Phase::Regenerating => "REGENERATING",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Owns the current phase; every change goes through [`PhaseMachine::advance`]
#[derive(Debug)]
pub struct PhaseMachine {
    arena: String,
    phase: Phase,
    transitions: u64,
}

impl PhaseMachine {
    pub fn new(arena: impl Into<String>) -> Self {
        Self {
            arena: arena.into(),
            phase: Phase::Disabled,
            transitions: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Move to `next`, returning the previous phase
    pub fn advance(&mut self, next: Phase) -> Result<Phase, ArenaError> {
        let from = self.phase;
        if !from.can_transition_to(next) {
            warn!(arena = %self.arena, %from, to = %next, "Rejected phase transition");
            return Err(ArenaError::IllegalTransition { from, to: next });
        }
        self.phase = next;
        self.transitions += 1;
        debug!(arena = %self.arena, %from, to = %next, "Phase transition");
        Ok(from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_lifecycle_path_is_legal() {
        let mut machine = PhaseMachine::new("sky");
        for next in [
            Phase::Waiting,
            Phase::Starting,
            Phase::InGame,
            Phase::Ending,
            Phase::Regenerating,
            Phase::Waiting,
        ] {
            machine.advance(next).unwrap();
        }
        assert_eq!(machine.phase(), Phase::Waiting);
        assert_eq!(machine.transitions(), 6);
    }

    #[test]
    fn test_skipping_phases_is_rejected() {
        let mut machine = PhaseMachine::new("sky");
        assert!(machine.advance(Phase::InGame).is_err());
        machine.advance(Phase::Waiting).unwrap();
        assert!(matches!(
            machine.advance(Phase::InGame),
            Err(ArenaError::IllegalTransition {
                from: Phase::Waiting,
                to: Phase::InGame
            })
        ));
        assert!(machine.advance(Phase::Regenerating).is_err());
        assert_eq!(machine.phase(), Phase::Waiting);
    }

    #[test]
    fn test_every_active_phase_can_be_stopped() {
        for phase in [Phase::Starting, Phase::InGame, Phase::Ending, Phase::Regenerating] {
            assert!(phase.is_active());
            assert!(phase.can_transition_to(Phase::Waiting));
            assert!(phase.can_transition_to(Phase::Disabled));
        }
        assert!(!Phase::Waiting.is_active());
        assert!(!Phase::Disabled.can_transition_to(Phase::Disabled));
    }
}
