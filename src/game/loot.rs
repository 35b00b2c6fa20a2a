//! Chest loot generation

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::world::{Inventory, ItemStack};

pub trait LootProvider: Send + Sync {
    /// Place items into empty slots of `inventory`
    fn fill(&self, inventory: &mut Inventory);
}

#[derive(Debug, Clone, Copy)]
pub struct LootEntry {
    pub material: &'static str,
    pub min: u32,
    pub max: u32,
}

const fn entry(material: &'static str, min: u32, max: u32) -> LootEntry {
    LootEntry { material, min, max }
}

pub const LOOT_POOL: &[LootEntry] = &[
    entry("minecraft:stone_sword", 1, 1),
    entry("minecraft:iron_sword", 1, 1),
    entry("minecraft:bow", 1, 1),
    entry("minecraft:arrow", 8, 16),
    entry("minecraft:cooked_beef", 2, 4),
    entry("minecraft:golden_apple", 1, 1),
    entry("minecraft:oak_planks", 16, 32),
    entry("minecraft:cobblestone", 16, 32),
    entry("minecraft:iron_helmet", 1, 1),
    entry("minecraft:iron_chestplate", 1, 1),
    entry("minecraft:iron_leggings", 1, 1),
    entry("minecraft:iron_boots", 1, 1),
    entry("minecraft:water_bucket", 1, 1),
    entry("minecraft:lava_bucket", 1, 1),
];

/// Uniform draw from [`LOOT_POOL`]. Empty slots are found by random probing
/// with at most `slots * 2` attempts per item, so a full chest stays as is.
pub struct PlaceholderLoot {
    min_items: usize,
    max_items: usize,
    rng: Mutex<ChaCha8Rng>,
}

impl PlaceholderLoot {
    pub fn new(min_items: usize, max_items: usize) -> Self {
        Self::with_rng(min_items, max_items, ChaCha8Rng::from_entropy())
    }

    pub fn seeded(min_items: usize, max_items: usize, seed: u64) -> Self {
        Self::with_rng(min_items, max_items, ChaCha8Rng::seed_from_u64(seed))
    }

    fn with_rng(min_items: usize, max_items: usize, rng: ChaCha8Rng) -> Self {
        Self {
            min_items: min_items.min(max_items),
            max_items: max_items.max(min_items),
            rng: Mutex::new(rng),
        }
    }
}

impl LootProvider for PlaceholderLoot {
    fn fill(&self, inventory: &mut Inventory) {
        let slots = inventory.len();
        if slots == 0 {
            return;
        }
        let mut rng = self.rng.lock();
        let count = rng.gen_range(self.min_items..=self.max_items);
        let attempts = slots * 2;

        for _ in 0..count {
            let mut placed = false;
            for _ in 0..attempts {
                let slot = rng.gen_range(0..slots);
                if inventory[slot].is_none() {
                    let pick = LOOT_POOL[rng.gen_range(0..LOOT_POOL.len())];
                    let amount = rng.gen_range(pick.min..=pick.max);
                    inventory[slot] = Some(ItemStack::new(pick.material, amount));
                    placed = true;
                    break;
                }
            }
            if !placed {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_respects_item_count_and_ranges() {
        let loot = PlaceholderLoot::seeded(3, 6, 42);
        for _ in 0..50 {
            let mut chest: Inventory = vec![None; 27];
            loot.fill(&mut chest);
            let items: Vec<&ItemStack> = chest.iter().flatten().collect();
            assert!((3..=6).contains(&items.len()));
            for item in items {
                let rule = LOOT_POOL
                    .iter()
                    .find(|e| e.material == item.material)
                    .unwrap();
                assert!(item.amount >= rule.min && item.amount <= rule.max);
            }
        }
    }

    #[test]
    fn test_occupied_slots_untouched() {
        let loot = PlaceholderLoot::seeded(6, 6, 7);
        let keep = ItemStack::new("minecraft:diamond", 1);
        let mut chest: Inventory = vec![Some(keep.clone()), None, None];
        loot.fill(&mut chest);
        assert_eq!(chest[0], Some(keep));
    }

    #[test]
    fn test_full_and_empty_containers() {
        let loot = PlaceholderLoot::seeded(3, 6, 1);
        let stone = Some(ItemStack::new("minecraft:stone", 64));
        let mut full: Inventory = vec![stone.clone(); 9];
        loot.fill(&mut full);
        assert!(full.iter().all(|slot| *slot == stone));

        let mut none: Inventory = Vec::new();
        loot.fill(&mut none);
        assert!(none.is_empty());
    }
}
