//! Error types for arena operations

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game::Phase;

/// Geometry an arena still needs before it can be enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissingPart {
    LobbySpawn,
    SpectatorSpawn,
    PlayerSpawns,
    Corner1,
    Corner2,
    World,
}

impl fmt::Display for MissingPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MissingPart::LobbySpawn => "lobby spawn",
            MissingPart::SpectatorSpawn => "spectator spawn",
            MissingPart::PlayerSpawns => "player spawns",
            MissingPart::Corner1 => "corner 1",
            MissingPart::Corner2 => "corner 2",
            MissingPart::World => "loaded world",
        };
        f.write_str(label)
    }
}

fn list_parts(parts: &[MissingPart]) -> String {
    parts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("arena {0} is not ready")]
    ArenaNotReady(String),

    #[error("arena {0} is already in game")]
    InGame(String),

    #[error("arena {0} is full")]
    ArenaFull(String),

    #[error("player is already in an arena")]
    AlreadyInArena,

    #[error("no arena is accepting players")]
    NoArenaAvailable,

    #[error("unknown arena: {0}")]
    UnknownArena(String),
}

impl JoinError {
    /// Message catalog key shown to the rejected player
    pub fn message_key(&self) -> &'static str {
        match self {
            JoinError::ArenaNotReady(_) | JoinError::NoArenaAvailable | JoinError::UnknownArena(_) => {
                "arena-not-ready"
            }
            JoinError::InGame(_) => "arena-in-game",
            JoinError::ArenaFull(_) => "arena-full",
            JoinError::AlreadyInArena => "already-in-arena",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpectateError {
    #[error("spectating is disabled")]
    NotAllowed,

    #[error("active players cannot spectate")]
    Playing,

    #[error("arena cannot be spectated while {0}")]
    Unavailable(Phase),

    #[error("player is already in another arena")]
    AlreadyInArena,

    #[error("unknown arena: {0}")]
    UnknownArena(String),
}

impl SpectateError {
    pub fn message_key(&self) -> &'static str {
        match self {
            SpectateError::Playing => "cannot-spectate-playing",
            SpectateError::AlreadyInArena => "already-in-arena",
            SpectateError::UnknownArena(_) => "arena-not-ready",
            SpectateError::NotAllowed | SpectateError::Unavailable(_) => "cannot-spectate-disabled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadoutError {
    #[error("unknown loadout: {0}")]
    UnknownLoadout(String),

    #[error("missing permission for loadout {0}")]
    NoPermission(String),

    #[error("loadout selection is closed while {0}")]
    SelectionClosed(Phase),

    #[error("player is not an active arena participant")]
    NotInArena,

    #[error("loadout {0} already exists")]
    AlreadyExists(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no stored record for arena {0}")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("arena is not fully configured, missing: {}", list_parts(.0))]
    NotConfigured(Vec<MissingPart>),

    #[error("illegal phase transition {from} -> {to}")]
    IllegalTransition { from: Phase, to: Phase },

    #[error("arena cannot start while {0}")]
    NotStartable(Phase),

    #[error("arena has no players")]
    NoPlayers,

    #[error("no match is running, arena is {0}")]
    NotRunning(Phase),

    #[error("arena must be disabled to edit, currently {0}")]
    Busy(Phase),

    #[error("unknown arena: {0}")]
    UnknownArena(String),

    #[error("arena {0} already exists")]
    AlreadyExists(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
