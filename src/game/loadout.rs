//! Loadouts (kits) and the registry that stores and applies them

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{LoadoutError, StoreError};
use crate::host::{ArmorSlots, PlayerHost, PlayerId};
use crate::world::{Inventory, ItemStack};

/// Named starting inventory. Immutable once built; registry lookups hand
/// out clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loadout {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    permission: Option<String>,
    items: Inventory,
    #[serde(default)]
    armor: ArmorSlots,
}

impl Loadout {
    pub fn new(name: impl Into<String>, items: Inventory) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            permission: None,
            items,
            armor: Default::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn with_armor(mut self, armor: ArmorSlots) -> Self {
        self.armor = armor;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn permission(&self) -> Option<&str> {
        self.permission.as_deref()
    }

    pub fn items(&self) -> &[Option<ItemStack>] {
        &self.items
    }

    pub fn armor(&self) -> &ArmorSlots {
        &self.armor
    }
}

/// Loadout lookup and application used by arenas
pub trait LoadoutService: Send + Sync {
    fn lookup(&self, name: &str) -> Option<Loadout>;
    fn can_use(&self, player: PlayerId, loadout: &Loadout) -> bool;
    fn apply(&self, player: PlayerId, loadout: &Loadout);
}

pub const KIT_WILDCARD_PERMISSION: &str = "skyarena.kit.*";

/// Case-insensitive kit store backed by a JSON file
pub struct KitRegistry {
    kits: DashMap<String, Loadout>,
    host: Arc<dyn PlayerHost>,
}

impl KitRegistry {
    pub fn new(host: Arc<dyn PlayerHost>) -> Self {
        Self {
            kits: DashMap::new(),
            host,
        }
    }

    pub fn create(&self, loadout: Loadout) -> Result<(), LoadoutError> {
        let key = loadout.name().to_lowercase();
        if self.kits.contains_key(&key) {
            return Err(LoadoutError::AlreadyExists(loadout.name().to_string()));
        }
        info!(kit = %loadout.name(), "Kit created");
        self.kits.insert(key, loadout);
        Ok(())
    }

    pub fn delete(&self, name: &str) -> bool {
        self.kits.remove(&name.to_lowercase()).is_some()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.kits.contains_key(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.kits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kits.is_empty()
    }

    /// Kits the player may use, sorted by name
    pub fn available_for(&self, player: PlayerId) -> Vec<Loadout> {
        let mut kits: Vec<Loadout> = self
            .kits
            .iter()
            .filter(|kit| self.can_use(player, kit.value()))
            .map(|kit| kit.value().clone())
            .collect();
        kits.sort_by(|a, b| a.name().cmp(b.name()));
        kits
    }

    pub fn load_json(&self, path: &Path) -> Result<usize, StoreError> {
        let raw = std::fs::read_to_string(path)?;
        let kits: Vec<Loadout> = serde_json::from_str(&raw)?;
        let mut loaded = 0;
        for kit in kits {
            if let Err(e) = self.create(kit) {
                warn!(error = %e, "Skipping duplicate kit");
            } else {
                loaded += 1;
            }
        }
        info!(path = %path.display(), loaded, "Kits loaded");
        Ok(loaded)
    }

    pub fn save_json(&self, path: &Path) -> Result<(), StoreError> {
        let mut kits: Vec<Loadout> = self.kits.iter().map(|kit| kit.value().clone()).collect();
        kits.sort_by(|a, b| a.name().cmp(b.name()));
        std::fs::write(path, serde_json::to_string_pretty(&kits)?)?;
        Ok(())
    }
}

impl LoadoutService for KitRegistry {
    fn lookup(&self, name: &str) -> Option<Loadout> {
        self.kits.get(&name.to_lowercase()).map(|kit| kit.value().clone())
    }

    fn can_use(&self, player: PlayerId, loadout: &Loadout) -> bool {
        match loadout.permission() {
            None => true,
            Some(permission) => {
                self.host.has_permission(player, permission)
                    || self.host.has_permission(player, KIT_WILDCARD_PERMISSION)
            }
        }
    }

    fn apply(&self, player: PlayerId, loadout: &Loadout) {
        self.host
            .set_inventory(player, loadout.items().to_vec(), loadout.armor().clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HeadlessHost;
    use uuid::Uuid;

    fn archer() -> Loadout {
        Loadout::new(
            "Archer",
            vec![
                Some(ItemStack::new("minecraft:bow", 1)),
                Some(ItemStack::new("minecraft:arrow", 16)),
            ],
        )
        .with_permission("skyarena.kit.archer")
    }

    #[test]
    fn test_lookup_is_case_insensitive_and_copies() {
        let registry = KitRegistry::new(Arc::new(HeadlessHost::new()));
        registry.create(archer()).unwrap();
        assert!(matches!(
            registry.create(archer()),
            Err(LoadoutError::AlreadyExists(_))
        ));

        let copy = registry.lookup("ARCHER").unwrap();
        assert_eq!(copy.items().len(), 2);
        assert_eq!(registry.lookup("archer").unwrap(), copy);
    }

    #[test]
    fn test_permission_and_wildcard() {
        let host = Arc::new(HeadlessHost::new());
        let registry = KitRegistry::new(host.clone());
        registry.create(archer()).unwrap();
        registry.create(Loadout::new("Basic", vec![])).unwrap();

        let (plain, vip) = (Uuid::new_v4(), Uuid::new_v4());
        host.grant(vip, KIT_WILDCARD_PERMISSION);

        let names = |p| {
            registry
                .available_for(p)
                .iter()
                .map(|k| k.name().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(plain), vec!["Basic"]);
        assert_eq!(names(vip), vec!["Archer", "Basic"]);
    }

    #[test]
    fn test_apply_sets_inventory() {
        let host = Arc::new(HeadlessHost::new());
        let registry = KitRegistry::new(host.clone());
        let player = Uuid::new_v4();
        registry.apply(player, &archer());
        let (items, _) = host.inventory(player).unwrap();
        assert_eq!(items[1], Some(ItemStack::new("minecraft:arrow", 16)));
    }

    #[test]
    fn test_json_round_trip_through_file() {
        let registry = KitRegistry::new(Arc::new(HeadlessHost::new()));
        registry.create(archer()).unwrap();
        let path = std::env::temp_dir().join(format!("skyarena-kits-{}.json", Uuid::new_v4()));
        registry.save_json(&path).unwrap();

        let reloaded = KitRegistry::new(Arc::new(HeadlessHost::new()));
        assert_eq!(reloaded.load_json(&path).unwrap(), 1);
        assert_eq!(reloaded.lookup("archer"), Some(archer()));
        let _ = std::fs::remove_file(path);
    }
}
