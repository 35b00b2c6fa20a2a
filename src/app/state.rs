//! Application state shared across the process

use std::sync::Arc;

use tracing::debug;

use crate::config::{keys, Config, Settings};
use crate::directory::{ArenaDirectory, JsonArenaStore};
use crate::error::StoreError;
use crate::game::{ArenaServices, KitRegistry, PlaceholderLoot};
use crate::host::{HeadlessHost, TracingPresenter};
use crate::scheduler::runtime::TokioScheduler;
use crate::world::MemoryWorld;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub directory: Arc<ArenaDirectory>,
    pub kits: Arc<KitRegistry>,
    pub world: Arc<MemoryWorld>,
    pub host: Arc<HeadlessHost>,
}

impl AppState {
    /// Must be called inside a tokio runtime
    pub fn new(config: Config) -> Result<Self, StoreError> {
        let config = Arc::new(config);
        let world = Arc::new(MemoryWorld::new());
        let host = Arc::new(HeadlessHost::new());
        let kits = Arc::new(KitRegistry::new(host.clone()));

        let store = JsonArenaStore::new(config.string_setting(keys::ARENAS_DIR))?;
        let min_items = config.int_setting(keys::LOOT_MIN_ITEMS).max(0) as usize;
        let max_items = config.int_setting(keys::LOOT_MAX_ITEMS).max(0) as usize;

        let services = ArenaServices {
            settings: config.clone(),
            scheduler: Arc::new(TokioScheduler::current()),
            world: world.clone(),
            host: host.clone(),
            presenter: Arc::new(TracingPresenter),
            loadouts: kits.clone(),
            loot: Arc::new(PlaceholderLoot::new(min_items, max_items.max(min_items))),
            store: Arc::new(store),
        };

        let directory = Arc::new(ArenaDirectory::new(services));
        register_default_kit(&directory, config.clone());

        Ok(Self {
            config,
            directory,
            kits,
            world,
            host,
        })
    }
}

/// Pre-select the configured default kit for every new participant
fn register_default_kit(directory: &ArenaDirectory, settings: Arc<Config>) {
    directory.on_join(move |arena, player| {
        if !settings.bool_setting(keys::AUTO_EQUIP_DEFAULT_KIT) {
            return;
        }
        let kit = settings.string_setting(keys::DEFAULT_KIT);
        if let Err(e) = arena.select_loadout(player, &kit) {
            debug!(arena = %arena.name(), player = %player, kit = %kit, error = %e, "Default kit not applied");
        }
    });
}
