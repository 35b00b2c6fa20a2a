//! Arena restoration after a match
//!
//! A [`RegenJob`] is stepped from scheduler callbacks; each step writes at
//! most one batch so other arenas keep ticking during a large restore.

pub mod snapshot;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::game::LootProvider;
use crate::util::time::Timer;
use crate::world::{BlockPos, BlockState, Bounds, Position, WorldAccess, WorldError};

pub use snapshot::BlockSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegenMode {
    /// Rewrite every cell from the captured snapshot
    Full,
    /// Revert player-placed cells to air
    Partial,
    /// Only refill containers
    None,
}

impl FromStr for RegenMode {
    type Err = RegenError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "FULL" => Ok(RegenMode::Full),
            "PARTIAL" => Ok(RegenMode::Partial),
            "NONE" => Ok(RegenMode::None),
            _ => Err(RegenError::UnknownMode(raw.to_string())),
        }
    }
}

impl fmt::Display for RegenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RegenMode::Full => "FULL",
            RegenMode::Partial => "PARTIAL",
            RegenMode::None => "NONE",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum RegenError {
    #[error("unknown regeneration mode: {0}")]
    UnknownMode(String),

    #[error("world {0} is not loaded")]
    WorldUnavailable(String),

    #[error("arena has no world or bounds configured")]
    MissingBounds,

    #[error("no block snapshot captured")]
    NoSnapshot,

    #[error("snapshot covers {found}, arena covers {expected}")]
    SnapshotMismatch { expected: String, found: String },

    #[error("arena volume of {} cells exceeds the snapshot limit of {limit}", cells.map_or_else(|| "too many".to_string(), |n| n.to_string()))]
    VolumeTooLarge { cells: Option<u64>, limit: u64 },

    #[error("snapshot capture aborted after {scanned} cells: world {world} became unavailable")]
    CaptureAborted { world: String, scanned: u64 },

    #[error(transparent)]
    World(#[from] WorldError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegenProgress {
    More,
    Done,
}

/// What a restoration step may touch
pub struct RestoreTarget<'a> {
    pub world: &'a dyn WorldAccess,
    pub world_name: Option<&'a str>,
    pub bounds: Option<Bounds>,
    pub snapshot: Option<Arc<BlockSnapshot>>,
    pub modified: &'a DashSet<BlockPos>,
}

/// Incremental restoration state, carried between scheduler steps
#[derive(Debug)]
pub struct RegenJob {
    mode: RegenMode,
    batch_size: usize,
    cursor: usize,
    restored: usize,
    snapshot: Option<Arc<BlockSnapshot>>,
    timer: Timer,
}

impl RegenJob {
    pub fn new(mode: RegenMode, batch_size: usize) -> Self {
        Self {
            mode,
            batch_size: batch_size.max(1),
            cursor: 0,
            restored: 0,
            snapshot: None,
            timer: Timer::new(),
        }
    }

    pub fn mode(&self) -> RegenMode {
        self.mode
    }

    /// Cells written so far
    pub fn restored(&self) -> usize {
        self.restored
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.timer.elapsed_ms()
    }

    pub fn step(&mut self, target: &RestoreTarget<'_>) -> Result<RegenProgress, RegenError> {
        if self.mode == RegenMode::None {
            return Ok(RegenProgress::Done);
        }

        let (world_name, bounds) = match (target.world_name, target.bounds) {
            (Some(name), Some(bounds)) => (name, bounds),
            _ => return Err(RegenError::MissingBounds),
        };
        if !target.world.is_loaded(world_name) {
            return Err(RegenError::WorldUnavailable(world_name.to_string()));
        }

        match self.mode {
            RegenMode::Full => self.restore_batch(target, world_name, bounds),
            RegenMode::Partial => {
                let cells = drain_cells(target.modified);
                for pos in cells {
                    if bounds.contains(pos) {
                        target.world.set_block(world_name, pos, BlockState::air(), false)?;
                        self.restored += 1;
                    }
                }
                Ok(RegenProgress::Done)
            }
            RegenMode::None => Ok(RegenProgress::Done),
        }
    }

    fn restore_batch(
        &mut self,
        target: &RestoreTarget<'_>,
        world_name: &str,
        bounds: Bounds,
    ) -> Result<RegenProgress, RegenError> {
        if self.snapshot.is_none() {
            self.snapshot = target.snapshot.clone();
        }
        let snapshot = match &self.snapshot {
            Some(snapshot) if !snapshot.is_empty() => snapshot,
            _ => return Err(RegenError::NoSnapshot),
        };
        if !snapshot.covers(world_name, bounds) {
            return Err(RegenError::SnapshotMismatch {
                expected: describe_volume(world_name, bounds),
                found: describe_volume(snapshot.world(), snapshot.bounds()),
            });
        }

        let batch = snapshot.batch(self.cursor, self.batch_size);
        for (pos, state) in batch {
            target.world.set_block(world_name, *pos, state.clone(), false)?;
        }
        self.cursor += batch.len();
        self.restored += batch.len();
        debug!(restored = self.restored, total = snapshot.len(), "Restored snapshot batch");

        if self.cursor < snapshot.len() {
            Ok(RegenProgress::More)
        } else {
            Ok(RegenProgress::Done)
        }
    }
}

fn describe_volume(world_name: &str, bounds: Bounds) -> String {
    format!("{} {}..{}", world_name, bounds.min(), bounds.max())
}

/// Remove and return every tracked cell
pub fn drain_cells(cells: &DashSet<BlockPos>) -> Vec<BlockPos> {
    let drained: Vec<BlockPos> = cells.iter().map(|cell| *cell).collect();
    for cell in &drained {
        cells.remove(cell);
    }
    drained
}

/// Replace container contents with fresh loot. Locations that are in another
/// world or are not containers are skipped with a warning.
pub fn refill_containers(
    world: &dyn WorldAccess,
    world_name: &str,
    chests: &[Position],
    loot: &dyn LootProvider,
) -> usize {
    let mut refilled = 0;
    for chest in chests {
        if !chest.in_world(world_name) {
            warn!(location = %chest, "Chest location is outside the arena world");
            continue;
        }
        let pos = chest.block();
        let Some(current) = world.container_contents(world_name, pos) else {
            warn!(location = %chest, "Chest location is not a container");
            continue;
        };
        let mut contents = vec![None; current.len()];
        loot.fill(&mut contents);
        match world.set_container_contents(world_name, pos, contents) {
            Ok(()) => refilled += 1,
            Err(e) => warn!(location = %chest, error = %e, "Failed to refill container"),
        }
    }
    refilled
}
