//! Full-volume block snapshots

use std::collections::HashMap;

use serde::{Deserialize, Serialize, Serializer};
use tracing::{info, warn};

use super::RegenError;
use crate::util::time::Timer;
use crate::world::{BlockPos, BlockState, Bounds, WorldAccess};

/// Upper bound on up-front allocation; larger scans grow as they go
const PREALLOCATE_CELLS: u64 = 1 << 20;

/// Every cell of an arena volume, kept in capture order for chunked
/// restoration and indexed by position for lookups.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "SnapshotRecord")]
pub struct BlockSnapshot {
    world: String,
    bounds: Bounds,
    entries: Vec<(BlockPos, BlockState)>,
    index: HashMap<BlockPos, usize>,
}

#[derive(Deserialize)]
struct SnapshotRecord {
    world: String,
    bounds: Bounds,
    blocks: Vec<(BlockPos, BlockState)>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    world: &'a str,
    bounds: &'a Bounds,
    blocks: &'a [(BlockPos, BlockState)],
}

impl From<SnapshotRecord> for BlockSnapshot {
    fn from(record: SnapshotRecord) -> Self {
        Self::from_entries(record.world, record.bounds, record.blocks)
    }
}

impl Serialize for BlockSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SnapshotRef {
            world: &self.world,
            bounds: &self.bounds,
            blocks: &self.entries,
        }
        .serialize(serializer)
    }
}

impl BlockSnapshot {
    fn from_entries(world: String, bounds: Bounds, entries: Vec<(BlockPos, BlockState)>) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, (pos, _))| (*pos, i))
            .collect();
        Self {
            world,
            bounds,
            entries,
            index,
        }
    }

    /// Scan the whole volume. Aborts without a partial result if the world
    /// stops answering mid-scan. Volumes above `max_cells` are refused
    /// before any block is read.
    pub fn capture(
        world: &dyn WorldAccess,
        world_name: &str,
        bounds: Bounds,
        max_cells: u64,
    ) -> Result<Self, RegenError> {
        let volume = match bounds.volume() {
            Some(volume) if volume <= max_cells => volume,
            _ => {
                return Err(RegenError::VolumeTooLarge {
                    cells: bounds.volume(),
                    limit: max_cells,
                })
            }
        };
        if !world.is_loaded(world_name) {
            return Err(RegenError::WorldUnavailable(world_name.to_string()));
        }

        let timer = Timer::new();
        let reserve = volume.min(PREALLOCATE_CELLS) as usize;
        let mut entries = Vec::with_capacity(reserve);
        let mut index = HashMap::with_capacity(reserve);

        for pos in bounds.cells() {
            let Some(state) = world.block_at(world_name, pos) else {
                warn!(world = world_name, scanned = entries.len(), "World became unavailable during snapshot");
                return Err(RegenError::CaptureAborted {
                    world: world_name.to_string(),
                    scanned: entries.len() as u64,
                });
            };
            index.insert(pos, entries.len());
            entries.push((pos, state));
        }

        info!(
            world = world_name,
            blocks = entries.len(),
            elapsed_ms = timer.elapsed_ms(),
            "Snapshot captured"
        );

        Ok(Self {
            world: world_name.to_string(),
            bounds,
            entries,
            index,
        })
    }

    pub fn world(&self) -> &str {
        &self.world
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether this snapshot was taken of exactly `bounds` in `world_name`
    pub fn covers(&self, world_name: &str, bounds: Bounds) -> bool {
        self.world == world_name && self.bounds == bounds
    }

    pub fn get(&self, pos: BlockPos) -> Option<&BlockState> {
        self.index.get(&pos).map(|&i| &self.entries[i].1)
    }

    /// Entries `start..start + size`, clamped to the end
    pub fn batch(&self, start: usize, size: usize) -> &[(BlockPos, BlockState)] {
        let start = start.min(self.entries.len());
        let end = start.saturating_add(size).min(self.entries.len());
        &self.entries[start..end]
    }
}
