//! Authored arena layout

use serde::{Deserialize, Serialize};

use crate::error::MissingPart;
use crate::world::{Bounds, Position, WorldAccess};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArenaGeometry {
    #[serde(default)]
    pub lobby_spawn: Option<Position>,
    #[serde(default)]
    pub spectator_spawn: Option<Position>,
    #[serde(default)]
    pub player_spawns: Vec<Position>,
    #[serde(default)]
    pub chest_locations: Vec<Position>,
    #[serde(default)]
    pub corner1: Option<Position>,
    #[serde(default)]
    pub corner2: Option<Position>,
    #[serde(default)]
    pub center: Option<Position>,
}

impl ArenaGeometry {
    /// World the arena lives in: the lobby's, else the first corner's
    pub fn world_name(&self) -> Option<&str> {
        self.lobby_spawn
            .as_ref()
            .or(self.corner1.as_ref())
            .map(|pos| pos.world.as_str())
    }

    pub fn bounds(&self) -> Option<Bounds> {
        match (&self.corner1, &self.corner2) {
            (Some(a), Some(b)) => Some(Bounds::from_corners(a.block(), b.block())),
            _ => None,
        }
    }

    /// True when `pos` is in the arena world and inside the corners
    pub fn contains(&self, pos: &Position) -> bool {
        match (self.world_name(), self.bounds()) {
            (Some(world), Some(bounds)) => {
                pos.in_world(world) && bounds.contains_point(pos.x, pos.y, pos.z)
            }
            _ => false,
        }
    }

    pub fn missing_parts(&self, world: &dyn WorldAccess) -> Vec<MissingPart> {
        let mut missing = Vec::new();
        if self.lobby_spawn.is_none() {
            missing.push(MissingPart::LobbySpawn);
        }
        if self.spectator_spawn.is_none() {
            missing.push(MissingPart::SpectatorSpawn);
        }
        if self.player_spawns.is_empty() {
            missing.push(MissingPart::PlayerSpawns);
        }
        if self.corner1.is_none() {
            missing.push(MissingPart::Corner1);
        }
        if self.corner2.is_none() {
            missing.push(MissingPart::Corner2);
        }
        if !self.world_name().is_some_and(|name| world.is_loaded(name)) {
            missing.push(MissingPart::World);
        }
        missing
    }
}
