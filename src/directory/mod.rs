//! Arena directory - registry of arenas and the player-facing entry points

pub mod store;

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ArenaSettings;
use crate::error::{ArenaError, JoinError, LoadoutError, SpectateError, StoreError};
use crate::game::{Arena, ArenaGeometry, ArenaServices, DamageCause, JoinOutcome, Loadout, Membership, Phase};
use crate::regen::RegenMode;
use crate::host::PlayerId;
use crate::world::Position;

pub use store::{ArenaRecord, ArenaStore, JsonArenaStore, MemoryArenaStore};

/// Holders outside every arena may edit blocks inside any arena
pub const BYPASS_PERMISSION: &str = "skyarena.admin.bypass";

/// Runs after a player successfully joins an arena as a participant
pub type JoinHook = Arc<dyn Fn(&Arena, PlayerId) + Send + Sync>;

/// Row of the arena listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArenaInfo {
    pub name: String,
    pub phase: Phase,
    pub enabled: bool,
    pub players: usize,
    pub spectators: usize,
    pub capacity: usize,
}

/// All arenas, keyed case-insensitively by name
pub struct ArenaDirectory {
    arenas: DashMap<String, Arc<Arena>>,
    services: ArenaServices,
    join_hooks: RwLock<Vec<JoinHook>>,
    /// Players with a join or spectate in flight
    admitting: DashSet<PlayerId>,
}

/// Exclusive right to admit one player somewhere, released on drop
struct Admission<'a> {
    admitting: &'a DashSet<PlayerId>,
    player: PlayerId,
}

impl<'a> Admission<'a> {
    fn claim(admitting: &'a DashSet<PlayerId>, player: PlayerId) -> Option<Self> {
        admitting.insert(player).then(|| Self { admitting, player })
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        self.admitting.remove(&self.player);
    }
}

impl ArenaDirectory {
    pub fn new(services: ArenaServices) -> Self {
        Self {
            arenas: DashMap::new(),
            services,
            join_hooks: RwLock::new(Vec::new()),
            admitting: DashSet::new(),
        }
    }

    pub fn services(&self) -> &ArenaServices {
        &self.services
    }

    pub fn on_join(&self, hook: impl Fn(&Arena, PlayerId) + Send + Sync + 'static) {
        self.join_hooks.write().push(Arc::new(hook));
    }

    /// Load every stored arena. Records without a lobby or bounds are skipped.
    pub fn load_all(&self) -> Result<usize, StoreError> {
        let records = self.services.store.load_all()?;
        let min_players = ArenaSettings::read(&*self.services.settings).min_players;

        let mut loaded = 0;
        for record in records {
            if record.geometry.lobby_spawn.is_none() || record.geometry.bounds().is_none() {
                warn!(arena = %record.name, "Skipping stored arena without lobby or bounds");
                continue;
            }
            let spawns = record.geometry.player_spawns.len();
            if spawns < min_players {
                warn!(arena = %record.name, spawns, min_players, "Arena has fewer spawn points than minimum players");
            }
            let key = record.name.to_lowercase();
            let arena = Arena::from_record(record, self.services.clone());
            self.arenas.insert(key, arena);
            loaded += 1;
        }

        info!(loaded, "Arenas loaded");
        Ok(loaded)
    }

    /// Stop everything and reload from the store
    pub fn reload(&self) -> Result<usize, StoreError> {
        self.stop_all();
        for arena in self.arenas() {
            arena.disable();
        }
        self.arenas.clear();
        self.load_all()
    }

    pub fn create(&self, name: &str) -> Result<Arc<Arena>, ArenaError> {
        match self.arenas.entry(name.to_lowercase()) {
            Entry::Occupied(_) => Err(ArenaError::AlreadyExists(name.to_string())),
            Entry::Vacant(slot) => {
                let arena = Arena::new(name, ArenaGeometry::default(), self.services.clone());
                slot.insert(arena.clone());
                info!(arena = name, "Arena created");
                Ok(arena)
            }
        }
    }

    pub fn delete(&self, name: &str) -> Result<(), ArenaError> {
        let (_, arena) = self
            .arenas
            .remove(&name.to_lowercase())
            .ok_or_else(|| ArenaError::UnknownArena(name.to_string()))?;
        arena.disable();
        self.services.store.delete(arena.name())?;
        info!(arena = %arena.name(), "Arena deleted");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Arena>> {
        self.arenas.get(&name.to_lowercase()).map(|arena| arena.clone())
    }

    fn require(&self, name: &str) -> Result<Arc<Arena>, ArenaError> {
        self.get(name)
            .ok_or_else(|| ArenaError::UnknownArena(name.to_string()))
    }

    /// All arenas sorted by name
    pub fn arenas(&self) -> Vec<Arc<Arena>> {
        let mut arenas: Vec<Arc<Arena>> = self.arenas.iter().map(|e| e.value().clone()).collect();
        arenas.sort_by(|a, b| a.name().cmp(b.name()));
        arenas
    }

    pub fn enable(&self, name: &str) -> Result<(), ArenaError> {
        let arena = self.require(name)?;
        arena.enable()?;
        arena.save()?;
        Ok(())
    }

    pub fn disable(&self, name: &str) -> Result<(), ArenaError> {
        let arena = self.require(name)?;
        arena.disable();
        arena.save()?;
        Ok(())
    }

    /// Store the authored layout of a disabled arena and persist it. In FULL
    /// mode the new volume is captured right away.
    pub fn finish_authoring(&self, name: &str, geometry: ArenaGeometry) -> Result<(), ArenaError> {
        let arena = self.require(name)?;
        arena.set_geometry(geometry)?;
        if ArenaSettings::read(&*self.services.settings).regen_mode == RegenMode::Full {
            match arena.capture_snapshot() {
                Ok(blocks) => info!(arena = %arena.name(), blocks, "Snapshot captured for new layout"),
                Err(e) => warn!(arena = %arena.name(), error = %e, "Snapshot capture failed"),
            }
        }
        arena.save()?;
        let missing = arena.missing_parts();
        if !missing.is_empty() {
            info!(arena = %arena.name(), ?missing, "Arena saved with incomplete layout");
        }
        Ok(())
    }

    /// Arena the player is attached to in any role
    pub fn player_arena(&self, player: PlayerId) -> Option<Arc<Arena>> {
        self.arenas
            .iter()
            .find(|entry| entry.value().membership(player).is_some())
            .map(|entry| entry.value().clone())
    }

    /// First arena whose bounds contain `pos`
    pub fn arena_at(&self, pos: &Position) -> Option<Arc<Arena>> {
        self.arenas().into_iter().find(|arena| arena.contains_position(pos))
    }

    pub fn join(&self, player: PlayerId, target: Option<&str>) -> Result<(Arc<Arena>, JoinOutcome), JoinError> {
        let (arena, outcome) = {
            let _admission = Admission::claim(&self.admitting, player).ok_or(JoinError::AlreadyInArena)?;
            if self.player_arena(player).is_some() {
                return Err(JoinError::AlreadyInArena);
            }
            let arena = match target {
                Some(name) => self
                    .get(name)
                    .ok_or_else(|| JoinError::UnknownArena(name.to_string()))?,
                None => self.pick_open_arena().ok_or(JoinError::NoArenaAvailable)?,
            };
            let outcome = arena.join(player)?;
            (arena, outcome)
        };

        if outcome == JoinOutcome::Playing {
            let hooks = self.join_hooks.read().clone();
            for hook in hooks {
                hook(&arena, player);
            }
        }
        Ok((arena, outcome))
    }

    fn pick_open_arena(&self) -> Option<Arc<Arena>> {
        self.arenas().into_iter().find(|arena| {
            arena.is_enabled() && arena.phase() == Phase::Waiting && arena.player_count() < arena.capacity()
        })
    }

    pub fn leave(&self, player: PlayerId) -> bool {
        match self.player_arena(player) {
            Some(arena) => arena.leave(player).is_some(),
            None => false,
        }
    }

    pub fn enter_spectator(&self, player: PlayerId, name: &str) -> Result<Arc<Arena>, SpectateError> {
        let _admission = Admission::claim(&self.admitting, player).ok_or(SpectateError::AlreadyInArena)?;
        let arena = self
            .get(name)
            .ok_or_else(|| SpectateError::UnknownArena(name.to_string()))?;
        if let Some(current) = self.player_arena(player) {
            let same = Arc::ptr_eq(&current, &arena);
            return match current.membership(player) {
                Some(Membership::Spectator) if same => Ok(arena),
                Some(Membership::Player) if same => Err(SpectateError::Playing),
                _ => Err(SpectateError::AlreadyInArena),
            };
        }
        arena.enter_spectator(player)?;
        Ok(arena)
    }

    pub fn exit_spectator(&self, player: PlayerId) -> bool {
        self.player_arena(player)
            .is_some_and(|arena| arena.exit_spectator(player))
    }

    pub fn force_start(&self, name: &str) -> Result<(), ArenaError> {
        self.require(name)?.force_start()
    }

    pub fn force_stop(&self, name: &str) -> Result<bool, ArenaError> {
        Ok(self.require(name)?.force_stop())
    }

    pub fn restock(&self, name: &str) -> Result<usize, ArenaError> {
        self.require(name)?.restock()
    }

    pub fn select_loadout(&self, player: PlayerId, loadout: &str) -> Result<Loadout, LoadoutError> {
        self.player_arena(player)
            .ok_or(LoadoutError::NotInArena)?
            .select_loadout(player, loadout)
    }

    pub fn report_block_placement(&self, player: PlayerId, pos: &Position) -> bool {
        self.player_arena(player)
            .is_some_and(|arena| arena.report_block_placement(player, pos))
    }

    /// Whether `player` may place or break a block at `pos`
    pub fn can_modify(&self, player: PlayerId, pos: &Position) -> bool {
        if let Some(arena) = self.player_arena(player) {
            return arena.report_block_break_attempt(player, pos);
        }
        if self.services.host.has_permission(player, BYPASS_PERMISSION) {
            return true;
        }
        let protected = self
            .arenas()
            .into_iter()
            .any(|arena| arena.phase() != Phase::Disabled && arena.contains_position(pos));
        if protected {
            debug!(player = %player, location = %pos, "Refused edit inside an arena");
        }
        !protected
    }

    pub fn report_death(&self, victim: PlayerId, killer: Option<PlayerId>) -> bool {
        self.player_arena(victim)
            .is_some_and(|arena| arena.report_death(victim, killer))
    }

    pub fn damage_allowed(&self, player: PlayerId, cause: DamageCause) -> bool {
        match self.player_arena(player) {
            Some(arena) => arena.damage_allowed(player, cause),
            None => true,
        }
    }

    pub fn list_arenas(&self) -> Vec<ArenaInfo> {
        self.arenas()
            .into_iter()
            .map(|arena| ArenaInfo {
                name: arena.name().to_string(),
                phase: arena.phase(),
                enabled: arena.is_enabled(),
                players: arena.player_count(),
                spectators: arena.spectators().len(),
                capacity: arena.capacity(),
            })
            .collect()
    }

    /// Force-stop every running arena, e.g. on shutdown
    pub fn stop_all(&self) {
        let stopped = self
            .arenas()
            .into_iter()
            .filter(|arena| arena.force_stop())
            .count();
        info!(stopped, "All active arenas stopped");
    }
}
