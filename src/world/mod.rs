//! World access - block state reads/writes and container contents

pub mod memory;
pub mod position;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryWorld;
pub use position::{BlockPos, Bounds, Position};

/// Opaque block payload, e.g. `minecraft:oak_stairs[facing=north]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockState(pub String);

impl BlockState {
    pub const AIR: &'static str = "minecraft:air";

    pub fn new(data: impl Into<String>) -> Self {
        Self(data.into())
    }

    pub fn air() -> Self {
        Self(Self::AIR.to_string())
    }

    pub fn is_air(&self) -> bool {
        self.0 == Self::AIR
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub material: String,
    pub amount: u32,
}

impl ItemStack {
    pub fn new(material: impl Into<String>, amount: u32) -> Self {
        Self {
            material: material.into(),
            amount,
        }
    }
}

/// Slot-indexed container or player inventory
pub type Inventory = Vec<Option<ItemStack>>;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("world {0} is not loaded")]
    Unavailable(String),

    #[error("block at {0} is not a container")]
    NotAContainer(BlockPos),
}

/// Host world operations used by snapshots, restoration and chest refills
pub trait WorldAccess: Send + Sync {
    fn is_loaded(&self, world: &str) -> bool;

    /// `None` when the world is unavailable
    fn block_at(&self, world: &str, pos: BlockPos) -> Option<BlockState>;

    fn set_block(
        &self,
        world: &str,
        pos: BlockPos,
        state: BlockState,
        apply_physics: bool,
    ) -> Result<(), WorldError>;

    /// `None` when the block is not a container or the world is unavailable
    fn container_contents(&self, world: &str, pos: BlockPos) -> Option<Inventory>;

    fn set_container_contents(
        &self,
        world: &str,
        pos: BlockPos,
        contents: Inventory,
    ) -> Result<(), WorldError>;
}
