//! Positions, block coordinates and arena bounds

use std::fmt;

use serde::{Deserialize, Serialize};

/// A point in a named world, with facing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub yaw: f32,
    #[serde(default)]
    pub pitch: f32,
}

impl Position {
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    pub fn with_rotation(mut self, yaw: f32, pitch: f32) -> Self {
        self.yaw = yaw;
        self.pitch = pitch;
        self
    }

    /// The block cell containing this point
    pub fn block(&self) -> BlockPos {
        BlockPos::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }

    pub fn in_world(&self, world: &str) -> bool {
        self.world == world
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{:.2}:{:.2}:{:.2}:{:.2}:{:.2}",
            self.world, self.x, self.y, self.z, self.yaw, self.pitch
        )
    }
}

/// Integer block coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn to_position(self, world: impl Into<String>) -> Position {
        Position::new(world, self.x as f64, self.y as f64, self.z as f64)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.x, self.y, self.z)
    }
}

/// Axis-aligned box between two corners, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    min: BlockPos,
    max: BlockPos,
}

impl Bounds {
    pub fn from_corners(a: BlockPos, b: BlockPos) -> Self {
        Self {
            min: BlockPos::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: BlockPos::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    pub fn min(&self) -> BlockPos {
        self.min
    }

    pub fn max(&self) -> BlockPos {
        self.max
    }

    pub fn contains(&self, pos: BlockPos) -> bool {
        pos.x >= self.min.x
            && pos.x <= self.max.x
            && pos.y >= self.min.y
            && pos.y <= self.max.y
            && pos.z >= self.min.z
            && pos.z <= self.max.z
    }

    /// Point containment; the far faces extend to the end of the max block
    pub fn contains_point(&self, x: f64, y: f64, z: f64) -> bool {
        x >= self.min.x as f64
            && x < self.max.x as f64 + 1.0
            && y >= self.min.y as f64
            && y < self.max.y as f64 + 1.0
            && z >= self.min.z as f64
            && z < self.max.z as f64 + 1.0
    }

    /// Cell count, `None` if it does not fit in a `u64`
    pub fn volume(&self) -> Option<u64> {
        let dx = (self.max.x as i64 - self.min.x as i64 + 1) as u64;
        let dy = (self.max.y as i64 - self.min.y as i64 + 1) as u64;
        let dz = (self.max.z as i64 - self.min.z as i64 + 1) as u64;
        dx.checked_mul(dy)?.checked_mul(dz)
    }

    /// Every cell in x, y, z order
    pub fn cells(&self) -> impl Iterator<Item = BlockPos> {
        let (min, max) = (self.min, self.max);
        (min.x..=max.x).flat_map(move |x| {
            (min.y..=max.y).flat_map(move |y| (min.z..=max.z).map(move |z| BlockPos::new(x, y, z)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_normalize_corners() {
        let bounds = Bounds::from_corners(BlockPos::new(5, 70, -3), BlockPos::new(-2, 60, 4));
        assert_eq!(bounds.min(), BlockPos::new(-2, 60, -3));
        assert_eq!(bounds.max(), BlockPos::new(5, 70, 4));
        assert_eq!(bounds.volume(), Some(8 * 11 * 8));
        assert_eq!(Some(bounds.cells().count() as u64), bounds.volume());
    }

    #[test]
    fn test_volume_overflow_is_none() {
        let bounds = Bounds::from_corners(
            BlockPos::new(i32::MIN, i32::MIN, i32::MIN),
            BlockPos::new(i32::MAX, i32::MAX, i32::MAX),
        );
        assert_eq!(bounds.volume(), None);
    }

    #[test]
    fn test_point_containment_is_inclusive_of_max_block() {
        let bounds = Bounds::from_corners(BlockPos::new(0, 0, 0), BlockPos::new(9, 9, 9));
        assert!(bounds.contains_point(9.99, 0.0, 5.5));
        assert!(!bounds.contains_point(10.0, 0.0, 5.5));
        assert!(!bounds.contains_point(-0.01, 0.0, 0.0));
        assert!(bounds.contains(BlockPos::new(9, 9, 9)));
        assert!(!bounds.contains(BlockPos::new(10, 9, 9)));
    }

    #[test]
    fn test_negative_coordinates_floor() {
        let pos = Position::new("world", -0.5, 64.2, -10.0);
        assert_eq!(pos.block(), BlockPos::new(-1, 64, -10));
    }
}
