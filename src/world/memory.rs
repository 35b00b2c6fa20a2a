//! In-memory world backing headless runs and tests

use dashmap::{DashMap, DashSet};

use super::{BlockPos, BlockState, Inventory, WorldAccess, WorldError};

type CellKey = (String, BlockPos);

/// Sparse block store; unset cells read as air
#[derive(Debug, Default)]
pub struct MemoryWorld {
    loaded: DashSet<String>,
    blocks: DashMap<CellKey, BlockState>,
    containers: DashMap<CellKey, Inventory>,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_world(world: &str) -> Self {
        let this = Self::new();
        this.load_world(world);
        this
    }

    pub fn load_world(&self, world: &str) {
        self.loaded.insert(world.to_string());
    }

    pub fn unload_world(&self, world: &str) {
        self.loaded.remove(world);
    }

    /// Place an empty container of `slots` slots
    pub fn place_container(&self, world: &str, pos: BlockPos, slots: usize) {
        let key = (world.to_string(), pos);
        self.blocks.insert(key.clone(), BlockState::new("minecraft:chest"));
        self.containers.insert(key, vec![None; slots]);
    }

    /// Number of non-air cells stored for a world
    pub fn solid_blocks(&self, world: &str) -> usize {
        self.blocks
            .iter()
            .filter(|entry| entry.key().0 == world && !entry.value().is_air())
            .count()
    }
}

impl WorldAccess for MemoryWorld {
    fn is_loaded(&self, world: &str) -> bool {
        self.loaded.contains(world)
    }

    fn block_at(&self, world: &str, pos: BlockPos) -> Option<BlockState> {
        if !self.is_loaded(world) {
            return None;
        }
        Some(
            self.blocks
                .get(&(world.to_string(), pos))
                .map(|state| state.clone())
                .unwrap_or_else(BlockState::air),
        )
    }

    fn set_block(
        &self,
        world: &str,
        pos: BlockPos,
        state: BlockState,
        _apply_physics: bool,
    ) -> Result<(), WorldError> {
        if !self.is_loaded(world) {
            return Err(WorldError::Unavailable(world.to_string()));
        }
        let key = (world.to_string(), pos);
        if state.is_air() {
            self.blocks.remove(&key);
            self.containers.remove(&key);
        } else {
            self.blocks.insert(key, state);
        }
        Ok(())
    }

    fn container_contents(&self, world: &str, pos: BlockPos) -> Option<Inventory> {
        if !self.is_loaded(world) {
            return None;
        }
        self.containers
            .get(&(world.to_string(), pos))
            .map(|contents| contents.clone())
    }

    fn set_container_contents(
        &self,
        world: &str,
        pos: BlockPos,
        contents: Inventory,
    ) -> Result<(), WorldError> {
        if !self.is_loaded(world) {
            return Err(WorldError::Unavailable(world.to_string()));
        }
        match self.containers.get_mut(&(world.to_string(), pos)) {
            Some(mut slot) => {
                *slot = contents;
                Ok(())
            }
            None => Err(WorldError::NotAContainer(pos)),
        }
    }
}
