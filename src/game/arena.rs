//! A single arena: phase machine, roster, timers and restoration
//!
//! Every mutation takes the state mutex first and the roster lock second.
//! Scheduler callbacks hold only a `Weak` back-reference and re-check their
//! timer epoch under the state mutex before acting.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use chrono::Utc;
use dashmap::{DashMap, DashSet};
use parking_lot::{Mutex, RwLock};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, error, info, warn};

use super::geometry::ArenaGeometry;
use super::loadout::Loadout;
use super::phase::{Phase, PhaseMachine};
use super::roster::{AddOutcome, Membership, Roster};
use super::status::{self, StatusContext};
use super::timers::{TimerKind, Timers};
use super::ArenaServices;
use crate::config::ArenaSettings;
use crate::directory::store::ArenaRecord;
use crate::error::{ArenaError, JoinError, LoadoutError, MissingPart, SpectateError, StoreError};
use crate::host::{GameMode, ObserverSettings, PlayerId, Sound};
use crate::regen::{self, BlockSnapshot, RegenError, RegenJob, RegenMode, RegenProgress, RestoreTarget};
use crate::scheduler::Ticks;
use crate::util::time::{secs_to_ticks, TICKS_PER_SECOND};
use crate::world::{BlockPos, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Playing,
    /// The match was running and the player was redirected to spectate
    Spectating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageCause {
    Fall,
    Void,
    Attack,
    Other,
}

type Tick = fn(&Arena, &mut ArenaState) -> ControlFlow<()>;

struct ArenaState {
    enabled: bool,
    machine: PhaseMachine,
    countdown_remaining: u32,
    /// `None` while no match clock runs
    clock_remaining: Option<i64>,
    timers: Timers,
    rng: ChaCha8Rng,
}

impl ArenaState {
    fn phase(&self) -> Phase {
        self.machine.phase()
    }

    fn enter(&mut self, next: Phase) -> bool {
        self.machine.advance(next).is_ok()
    }
}

pub struct Arena {
    name: String,
    me: Weak<Arena>,
    services: ArenaServices,
    geometry: RwLock<ArenaGeometry>,
    state: Mutex<ArenaState>,
    roster: Roster,
    selections: DashMap<PlayerId, Loadout>,
    /// Expiry in scheduler-clock millis
    invincible_until: DashMap<PlayerId, u64>,
    snapshot: RwLock<Option<Arc<BlockSnapshot>>>,
    /// Captured since the last successful save
    snapshot_unsaved: AtomicBool,
    modified: DashSet<BlockPos>,
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Arena {
    /// New arenas start disabled
    pub fn new(name: impl Into<String>, geometry: ArenaGeometry, services: ArenaServices) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            state: Mutex::new(ArenaState {
                enabled: false,
                machine: PhaseMachine::new(name.clone()),
                countdown_remaining: 0,
                clock_remaining: None,
                timers: Timers::new(),
                rng: ChaCha8Rng::from_entropy(),
            }),
            name,
            services,
            geometry: RwLock::new(geometry),
            roster: Roster::new(),
            selections: DashMap::new(),
            invincible_until: DashMap::new(),
            snapshot: RwLock::new(None),
            snapshot_unsaved: AtomicBool::new(false),
            modified: DashSet::new(),
        })
    }

    /// Rebuild from storage; a stored snapshot is reused rather than
    /// recaptured when it still covers the stored layout
    pub fn from_record(record: ArenaRecord, services: ArenaServices) -> Arc<Self> {
        let snapshot = match (record.snapshot, record.geometry.world_name(), record.geometry.bounds()) {
            (Some(snapshot), Some(world), Some(bounds)) if snapshot.covers(world, bounds) => Some(snapshot),
            (Some(_), _, _) => {
                warn!(arena = %record.name, "Discarding stored snapshot of a different layout");
                None
            }
            (None, _, _) => None,
        };
        let arena = Self::new(record.name, record.geometry, services);
        *arena.snapshot.write() = snapshot;
        if record.enabled {
            if let Err(e) = arena.activate(false) {
                warn!(arena = %arena.name, error = %e, "Stored arena could not be enabled");
            }
        }
        arena
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase()
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    pub fn countdown_remaining(&self) -> u32 {
        self.state.lock().countdown_remaining
    }

    pub fn clock_remaining(&self) -> Option<i64> {
        self.state.lock().clock_remaining
    }

    pub fn membership(&self, player: PlayerId) -> Option<Membership> {
        self.roster.membership(player)
    }

    pub fn players(&self) -> Vec<PlayerId> {
        self.roster.players()
    }

    pub fn spectators(&self) -> Vec<PlayerId> {
        self.roster.spectators()
    }

    pub fn player_count(&self) -> usize {
        self.roster.player_count()
    }

    pub fn capacity(&self) -> usize {
        self.settings().max_players
    }

    pub fn geometry(&self) -> ArenaGeometry {
        self.geometry.read().clone()
    }

    pub fn world_name(&self) -> Option<String> {
        self.geometry.read().world_name().map(str::to_string)
    }

    pub fn contains_position(&self, pos: &Position) -> bool {
        self.geometry.read().contains(pos)
    }

    pub fn missing_parts(&self) -> Vec<MissingPart> {
        self.geometry.read().missing_parts(&*self.services.world)
    }

    pub fn is_fully_configured(&self) -> bool {
        self.missing_parts().is_empty()
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.read().is_some()
    }

    pub fn snapshot(&self) -> Option<Arc<BlockSnapshot>> {
        self.snapshot.read().clone()
    }

    pub fn modified_cells(&self) -> Vec<BlockPos> {
        self.modified.iter().map(|cell| *cell).collect()
    }

    pub fn selected_loadout(&self, player: PlayerId) -> Option<String> {
        self.selections.get(&player).map(|l| l.name().to_string())
    }

    pub fn is_timer_armed(&self, kind: TimerKind) -> bool {
        self.state.lock().timers.is_armed(kind)
    }

    /// Scheduled tasks owned by this arena that may still fire
    pub fn live_timer_handles(&self) -> usize {
        self.state.lock().timers.live_handles()
    }

    pub fn record(&self) -> ArenaRecord {
        let enabled = self.state.lock().enabled;
        self.record_with(enabled)
    }

    /// The snapshot is attached only in FULL mode and only when it has not
    /// been saved yet
    fn record_with(&self, enabled: bool) -> ArenaRecord {
        let unsaved = self.snapshot_unsaved.load(Ordering::SeqCst);
        let snapshot = if unsaved && self.settings().regen_mode == RegenMode::Full {
            self.snapshot.read().clone()
        } else {
            None
        };
        ArenaRecord {
            name: self.name.clone(),
            enabled,
            geometry: self.geometry(),
            snapshot,
            saved_at: Utc::now(),
        }
    }

    /// Write the current record to the arena store
    pub fn save(&self) -> Result<(), StoreError> {
        let record = self.record();
        self.services.store.save(&record)?;
        self.mark_saved(record.snapshot.as_ref());
        Ok(())
    }

    fn mark_saved(&self, saved: Option<&Arc<BlockSnapshot>>) {
        let Some(saved) = saved else {
            return;
        };
        let current = self.snapshot.read();
        if current.as_ref().is_some_and(|snapshot| Arc::ptr_eq(snapshot, saved)) {
            self.snapshot_unsaved.store(false, Ordering::SeqCst);
        }
    }

    /// Persist off the caller's thread. Used from scheduler callbacks, which
    /// run under the state lock.
    fn persist_later(&self, record: ArenaRecord, disabling: bool) {
        let me = self.me.clone();
        let store = self.services.store.clone();
        self.services.scheduler.run_blocking(Box::new(move || {
            let result = if disabling {
                match store.mark_disabled(&record.name) {
                    Err(StoreError::NotFound(_)) => store.save(&record),
                    other => other,
                }
            } else {
                store.save(&record)
            };
            match result {
                Ok(()) => {
                    if let Some(arena) = me.upgrade() {
                        arena.mark_saved(record.snapshot.as_ref());
                    }
                }
                Err(e) => warn!(arena = %record.name, error = %e, disabling, "Failed to persist arena"),
            }
        }));
    }

    fn settings(&self) -> ArenaSettings {
        ArenaSettings::read(&*self.services.settings)
    }

    /// Replace the authored layout; only while disabled. A snapshot of a
    /// different world or volume is dropped.
    pub fn set_geometry(&self, geometry: ArenaGeometry) -> Result<(), ArenaError> {
        let st = self.state.lock();
        if st.phase() != Phase::Disabled {
            return Err(ArenaError::Busy(st.phase()));
        }
        let moved = {
            let mut current = self.geometry.write();
            let moved = current.world_name() != geometry.world_name() || current.bounds() != geometry.bounds();
            *current = geometry;
            moved
        };
        if moved && self.snapshot.write().take().is_some() {
            self.snapshot_unsaved.store(false, Ordering::SeqCst);
            info!(arena = %self.name, "Dropped snapshot of the previous layout");
        }
        Ok(())
    }

    pub fn enable(&self) -> Result<(), ArenaError> {
        self.activate(true)
    }

    fn activate(&self, recapture: bool) -> Result<(), ArenaError> {
        let cfg = self.settings();
        {
            let mut st = self.state.lock();
            if st.enabled {
                return Ok(());
            }
            let missing = self.missing_parts();
            if !missing.is_empty() {
                warn!(arena = %self.name, ?missing, "Refusing to enable incomplete arena");
                return Err(ArenaError::NotConfigured(missing));
            }
            st.enabled = true;
            if st.phase() == Phase::Disabled {
                st.machine.advance(Phase::Waiting)?;
            }
            info!(arena = %self.name, "Arena enabled");
        }

        if cfg.regen_mode == RegenMode::Full && (recapture || !self.has_snapshot()) {
            if let Err(e) = self.capture_snapshot() {
                warn!(arena = %self.name, error = %e, "Snapshot capture failed");
            }
        }
        Ok(())
    }

    /// Evacuates everyone and cancels all timers
    pub fn disable(&self) {
        let mut st = self.state.lock();
        if !st.enabled && st.phase() == Phase::Disabled {
            return;
        }
        st.enabled = false;
        st.timers.disarm_all();
        self.evacuate();
        self.modified.clear();
        st.countdown_remaining = 0;
        st.clock_remaining = None;
        if st.phase() != Phase::Disabled {
            st.enter(Phase::Disabled);
        }
        info!(arena = %self.name, "Arena disabled");
    }

    /// Scan the arena volume into a fresh snapshot, dropping the old one
    pub fn capture_snapshot(&self) -> Result<usize, RegenError> {
        let (world_name, bounds) = {
            let geometry = self.geometry.read();
            (geometry.world_name().map(str::to_string), geometry.bounds())
        };
        let (Some(world_name), Some(bounds)) = (world_name, bounds) else {
            return Err(RegenError::MissingBounds);
        };

        let limit = self.settings().snapshot_max_cells;
        match BlockSnapshot::capture(&*self.services.world, &world_name, bounds, limit) {
            Ok(snapshot) => {
                let blocks = snapshot.len();
                *self.snapshot.write() = Some(Arc::new(snapshot));
                self.snapshot_unsaved.store(true, Ordering::SeqCst);
                Ok(blocks)
            }
            Err(e) => {
                *self.snapshot.write() = None;
                self.snapshot_unsaved.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    pub fn join(&self, player: PlayerId) -> Result<JoinOutcome, JoinError> {
        let cfg = self.settings();
        let mut st = self.state.lock();
        let phase = st.phase();

        if !st.enabled || matches!(phase, Phase::Disabled | Phase::Regenerating) {
            return Err(JoinError::ArenaNotReady(self.name.clone()));
        }
        if !phase.is_joinable() {
            if phase == Phase::InGame && cfg.allow_spectators {
                self.enter_spectator_locked(&st, &cfg, player)
                    .map_err(|_| JoinError::InGame(self.name.clone()))?;
                return Ok(JoinOutcome::Spectating);
            }
            return Err(JoinError::InGame(self.name.clone()));
        }

        let current = match self.roster.add_player(player, cfg.max_players) {
            AddOutcome::Added { players } => players,
            AddOutcome::Full => return Err(JoinError::ArenaFull(self.name.clone())),
            AddOutcome::AlreadyPresent => return Err(JoinError::AlreadyInArena),
        };

        let host = &self.services.host;
        let lobby = self.geometry.read().lobby_spawn.clone();
        if let Some(lobby) = lobby {
            host.teleport(player, &lobby);
        }
        host.reset(player, GameMode::Adventure);

        let placeholders = [
            ("arena", self.name.clone()),
            ("player", host.display_name(player)),
            ("current", current.to_string()),
            ("max", cfg.max_players.to_string()),
        ];
        self.tell(player, "join-arena", &placeholders);
        self.announce_except(player, "join-arena-broadcast", &placeholders);
        info!(arena = %self.name, player = %player, players = current, "Player joined");

        self.check_start_countdown(&mut st, &cfg);
        self.refresh_status(&st, &cfg);
        Ok(JoinOutcome::Playing)
    }

    /// Idempotent; returns the membership the player had
    pub fn leave(&self, player: PlayerId) -> Option<Membership> {
        let cfg = self.settings();
        let mut st = self.state.lock();
        let membership = self.roster.remove(player)?;
        self.selections.remove(&player);
        self.invincible_until.remove(&player);

        match membership {
            Membership::Player => {
                self.services.host.reset(player, GameMode::Default);
                let placeholders = [
                    ("arena", self.name.clone()),
                    ("player", self.services.host.display_name(player)),
                    ("current", self.roster.player_count().to_string()),
                    ("max", cfg.max_players.to_string()),
                ];
                self.tell(player, "leave-arena", &placeholders);
                self.announce("leave-arena-broadcast", &placeholders);
            }
            Membership::Eliminated | Membership::Spectator => {
                self.release_spectator(player);
                self.tell(player, "stop-spectating", &[("arena", self.name.clone())]);
            }
        }
        info!(arena = %self.name, player = %player, ?membership, "Player left");

        match st.phase() {
            Phase::Starting if self.roster.player_count() < cfg.min_players => {
                self.cancel_countdown(&mut st, &cfg)
            }
            Phase::InGame => self.check_win(&mut st, &cfg),
            _ => {}
        }
        self.refresh_status(&st, &cfg);
        Some(membership)
    }

    pub fn enter_spectator(&self, player: PlayerId) -> Result<(), SpectateError> {
        let cfg = self.settings();
        let st = self.state.lock();
        self.enter_spectator_locked(&st, &cfg, player)
    }

    fn enter_spectator_locked(&self, st: &ArenaState, cfg: &ArenaSettings, player: PlayerId) -> Result<(), SpectateError> {
        if !cfg.allow_spectators {
            return Err(SpectateError::NotAllowed);
        }
        let phase = st.phase();
        if !st.enabled || matches!(phase, Phase::Disabled | Phase::Regenerating) {
            return Err(SpectateError::Unavailable(phase));
        }
        match self.roster.membership(player) {
            Some(Membership::Spectator) => return Ok(()),
            Some(_) => return Err(SpectateError::Playing),
            None => {}
        }
        if !self.roster.add_spectator(player) {
            return Err(SpectateError::Playing);
        }

        self.apply_spectator_effects(cfg, player);
        self.tell(player, "now-spectating", &[("arena", self.name.clone())]);
        info!(arena = %self.name, player = %player, "Spectator joined");
        Ok(())
    }

    /// Voluntary or forced spectator exit; false if not spectating here
    pub fn exit_spectator(&self, player: PlayerId) -> bool {
        let _st = self.state.lock();
        if self.roster.membership(player) != Some(Membership::Spectator) {
            return false;
        }
        self.roster.remove(player);
        self.release_spectator(player);
        self.tell(player, "stop-spectating", &[("arena", self.name.clone())]);
        debug!(arena = %self.name, player = %player, "Spectator left");
        true
    }

    fn apply_spectator_effects(&self, cfg: &ArenaSettings, player: PlayerId) {
        let host = &self.services.host;
        host.reset(player, GameMode::Spectator);
        let spawn = {
            let geometry = self.geometry.read();
            geometry
                .spectator_spawn
                .clone()
                .or_else(|| geometry.lobby_spawn.clone())
        };
        if let Some(spawn) = spawn {
            host.teleport(player, &spawn);
        }
        host.set_observer(
            player,
            ObserverSettings {
                flight_speed: cfg.spectator_speed,
                night_vision: cfg.spectator_night_vision,
            },
        );
        host.hide_from(&self.roster.players(), player);
    }

    fn release_spectator(&self, player: PlayerId) {
        let host = &self.services.host;
        host.clear_observer(player);
        host.reveal(player);
        host.reset(player, GameMode::Default);
    }

    /// Start now, skipping the countdown and the minimum-player rule
    pub fn force_start(&self) -> Result<(), ArenaError> {
        let cfg = self.settings();
        let mut st = self.state.lock();
        let phase = st.phase();
        if !phase.is_joinable() {
            return Err(ArenaError::NotStartable(phase));
        }
        if self.roster.player_count() == 0 {
            return Err(ArenaError::NoPlayers);
        }
        if phase == Phase::Waiting {
            st.machine.advance(Phase::Starting)?;
        }
        info!(arena = %self.name, players = self.roster.player_count(), "Force start");
        self.start_match(&mut st, &cfg, true);
        Ok(())
    }

    /// Cancel everything and return to WAITING, or DISABLED when disabled.
    /// No-op outside the active phases.
    pub fn force_stop(&self) -> bool {
        let mut st = self.state.lock();
        let from = st.phase();
        if !from.is_active() {
            return false;
        }
        st.timers.disarm_all();
        self.evacuate();
        self.modified.clear();
        st.countdown_remaining = 0;
        st.clock_remaining = None;
        let next = if st.enabled { Phase::Waiting } else { Phase::Disabled };
        st.enter(next);
        info!(arena = %self.name, %from, to = %next, "Arena force-stopped");
        true
    }

    pub fn select_loadout(&self, player: PlayerId, name: &str) -> Result<Loadout, LoadoutError> {
        let st = self.state.lock();
        if self.roster.membership(player) != Some(Membership::Player) {
            return Err(LoadoutError::NotInArena);
        }
        let phase = st.phase();
        if !phase.accepts_loadout_selection() {
            return Err(LoadoutError::SelectionClosed(phase));
        }
        let loadouts = &self.services.loadouts;
        let loadout = loadouts
            .lookup(name)
            .ok_or_else(|| LoadoutError::UnknownLoadout(name.to_string()))?;
        if !loadouts.can_use(player, &loadout) {
            return Err(LoadoutError::NoPermission(loadout.name().to_string()));
        }

        self.selections.insert(player, loadout.clone());
        self.tell(player, "kit-selected", &[("kit", loadout.name().to_string())]);
        debug!(arena = %self.name, player = %player, kit = %loadout.name(), "Loadout selected");
        Ok(loadout)
    }

    /// Track a player-placed cell for partial restoration
    pub fn report_block_placement(&self, player: PlayerId, pos: &Position) -> bool {
        let cfg = self.settings();
        let st = self.state.lock();
        if st.phase() != Phase::InGame || cfg.regen_mode != RegenMode::Partial {
            return false;
        }
        if self.roster.membership(player) != Some(Membership::Player) {
            return false;
        }
        if !self.geometry.read().contains(pos) {
            return false;
        }
        self.modified.insert(pos.block());
        true
    }

    /// Whether a member of this arena may break a block. Non-members are
    /// judged by the directory.
    pub fn report_block_break_attempt(&self, player: PlayerId, _pos: &Position) -> bool {
        match self.roster.membership(player) {
            Some(Membership::Player) => self.phase() == Phase::InGame,
            Some(_) => false,
            None => true,
        }
    }

    pub fn is_invincible(&self, player: PlayerId) -> bool {
        let now = self.services.scheduler.now_millis();
        self.invincible_until
            .get(&player)
            .is_some_and(|until| now < *until)
    }

    pub fn damage_allowed(&self, player: PlayerId, cause: DamageCause) -> bool {
        match self.roster.membership(player) {
            None => return true,
            Some(Membership::Player) => {}
            Some(_) => return false,
        }
        if self.is_invincible(player) {
            return false;
        }
        if cause == DamageCause::Fall && !self.settings().fall_damage {
            return false;
        }
        self.phase() == Phase::InGame || cause == DamageCause::Void
    }

    pub fn report_death(&self, victim: PlayerId, killer: Option<PlayerId>) -> bool {
        let cfg = self.settings();
        let mut st = self.state.lock();
        if st.phase() != Phase::InGame || self.roster.membership(victim) != Some(Membership::Player) {
            return false;
        }
        self.invincible_until.remove(&victim);
        self.selections.remove(&victim);

        let host = &self.services.host;
        match killer.filter(|k| *k != victim) {
            Some(killer) => self.announce(
                "player-eliminated-by-player",
                &[
                    ("victim", host.display_name(victim)),
                    ("killer", host.display_name(killer)),
                ],
            ),
            None => self.announce("player-eliminated", &[("player", host.display_name(victim))]),
        }
        info!(arena = %self.name, victim = %victim, killer = ?killer, "Player eliminated");

        if cfg.allow_spectators {
            self.roster.eliminate(victim);
            let me = self.me.clone();
            let handle = self.services.scheduler.run_once(
                cfg.death_delay_ticks,
                Box::new(move || {
                    if let Some(arena) = me.upgrade() {
                        arena.finish_elimination(victim);
                    }
                }),
            );
            st.timers.track_grace(handle);
        } else {
            self.roster.remove(victim);
            host.reset(victim, GameMode::Default);
            self.tell(victim, "leave-arena", &[("arena", self.name.clone())]);
        }

        self.check_win(&mut st, &cfg);
        self.refresh_status(&st, &cfg);
        true
    }

    fn finish_elimination(&self, victim: PlayerId) {
        let cfg = self.settings();
        let st = self.state.lock();
        if self.roster.membership(victim) != Some(Membership::Eliminated) {
            return;
        }
        let phase = st.phase();
        let can_spectate = cfg.allow_spectators
            && st.enabled
            && !matches!(phase, Phase::Disabled | Phase::Regenerating)
            && self.services.host.is_online(victim);
        if !can_spectate {
            self.roster.remove(victim);
            self.services.host.reset(victim, GameMode::Default);
            return;
        }

        self.roster.promote_eliminated(victim);
        self.apply_spectator_effects(&cfg, victim);
        self.tell(victim, "now-spectating", &[("arena", self.name.clone())]);
    }

    /// Fill every configured chest with fresh loot
    pub fn refill_containers(&self) -> usize {
        let (world_name, chests) = {
            let geometry = self.geometry.read();
            (
                geometry.world_name().map(str::to_string),
                geometry.chest_locations.clone(),
            )
        };
        let Some(world_name) = world_name else {
            return 0;
        };
        let refilled = regen::refill_containers(
            &*self.services.world,
            &world_name,
            &chests,
            &*self.services.loot,
        );
        debug!(arena = %self.name, refilled, "Containers refilled");
        refilled
    }

    /// Mid-match restock: refill every chest and tell the arena
    pub fn restock(&self) -> Result<usize, ArenaError> {
        let st = self.state.lock();
        if st.phase() != Phase::InGame {
            return Err(ArenaError::NotRunning(st.phase()));
        }
        let refilled = self.refill_containers();
        self.announce("chest-refilled", &[]);
        self.services
            .presenter
            .play_sound(&self.roster.everyone(), Sound::ChestRefill);
        info!(arena = %self.name, refilled, "Chests restocked");
        Ok(refilled)
    }

    /// Push the current status line to everyone attached
    pub fn refresh_status_bars(&self) {
        let cfg = self.settings();
        let st = self.state.lock();
        self.refresh_status(&st, &cfg);
    }

    // ---- match flow, all called with the state mutex held ----

    fn check_start_countdown(&self, st: &mut ArenaState, cfg: &ArenaSettings) {
        if st.phase() != Phase::Waiting || self.roster.player_count() < cfg.min_players {
            return;
        }
        if !st.enter(Phase::Starting) {
            return;
        }
        st.countdown_remaining = cfg.countdown_secs;
        self.announce("countdown-starting", &[("time", cfg.countdown_secs.to_string())]);
        info!(arena = %self.name, seconds = cfg.countdown_secs, "Countdown started");
        self.schedule_periodic(st, TimerKind::Countdown, 0, TICKS_PER_SECOND, Arena::countdown_tick);
    }

    fn countdown_tick(&self, st: &mut ArenaState) -> ControlFlow<()> {
        if st.phase() != Phase::Starting {
            return ControlFlow::Break(());
        }
        let cfg = self.settings();
        if st.countdown_remaining == 0 {
            self.start_match(st, &cfg, false);
            return ControlFlow::Break(());
        }

        let audience = self.audience();
        if self.roster.player_count() < cfg.min_players {
            self.cancel_countdown(st, &cfg);
            return ControlFlow::Break(());
        }

        let seconds = st.countdown_remaining;
        let cue = status::countdown_cue(seconds);
        let presenter = &self.services.presenter;
        if cue.announce && cfg.show_countdown_title {
            presenter.show_countdown_cue(&audience, seconds);
        }
        if let Some(pitch) = cue.pitch {
            presenter.play_sound(&audience, Sound::CountdownTick { pitch });
        }
        self.refresh_status(st, &cfg);
        st.countdown_remaining -= 1;
        ControlFlow::Continue(())
    }

    fn cancel_countdown(&self, st: &mut ArenaState, cfg: &ArenaSettings) {
        st.timers.disarm(TimerKind::Countdown);
        st.countdown_remaining = 0;
        if !st.enter(Phase::Waiting) {
            return;
        }
        self.announce("countdown-cancelled", &[]);
        info!(arena = %self.name, players = self.roster.player_count(), "Countdown cancelled");
        self.refresh_status(st, cfg);
    }

    fn start_match(&self, st: &mut ArenaState, cfg: &ArenaSettings, forced: bool) {
        st.timers.disarm(TimerKind::Countdown);
        st.countdown_remaining = 0;
        self.prune_offline();
        let players = self.roster.players();
        if players.is_empty() || (!forced && players.len() < cfg.min_players) {
            warn!(arena = %self.name, players = players.len(), "Not enough players to start");
            self.cancel_countdown(st, cfg);
            return;
        }
        if !st.enter(Phase::InGame) {
            return;
        }
        info!(arena = %self.name, players = players.len(), forced, "Match started");

        let audience = self.roster.everyone();
        let presenter = &self.services.presenter;
        self.announce("game-starting", &[]);
        if cfg.show_start_title {
            presenter.show_title(&audience, &self.text("title-start", &[]), &self.text("subtitle-start", &[]));
        }
        presenter.play_sound(&audience, Sound::MatchStart);

        let (lobby, mut spawns) = {
            let geometry = self.geometry.read();
            (geometry.lobby_spawn.clone(), geometry.player_spawns.clone())
        };
        spawns.shuffle(&mut st.rng);

        let host = &self.services.host;
        for (i, player) in players.iter().copied().enumerate() {
            match spawns.get(i) {
                Some(spawn) => host.teleport(player, spawn),
                None => {
                    warn!(arena = %self.name, player = %player, "No spawn point left, using lobby");
                    if let Some(lobby) = &lobby {
                        host.teleport(player, lobby);
                    }
                }
            }
            host.reset(player, GameMode::Survival);
            let selected = self.selections.get(&player).map(|l| l.clone());
            if let Some(loadout) = selected {
                self.services.loadouts.apply(player, &loadout);
            }
            self.grant_invincibility(st, cfg, player);
        }

        self.refill_containers();
        self.modified.clear();
        self.start_match_clock(st, cfg);
        self.refresh_status(st, cfg);
        self.check_win(st, cfg);
    }

    fn grant_invincibility(&self, st: &mut ArenaState, cfg: &ArenaSettings, player: PlayerId) {
        if cfg.invincibility_secs <= 0 {
            return;
        }
        let until = self.services.scheduler.now_millis() + cfg.invincibility_secs as u64 * 1_000;
        self.invincible_until.insert(player, until);
        self.tell(player, "invincibility-start", &[("time", cfg.invincibility_secs.to_string())]);

        if !st.timers.is_armed(TimerKind::Invincibility) {
            self.schedule_periodic(
                st,
                TimerKind::Invincibility,
                TICKS_PER_SECOND,
                TICKS_PER_SECOND,
                Arena::invincibility_sweep,
            );
        }
    }

    fn invincibility_sweep(&self, st: &mut ArenaState) -> ControlFlow<()> {
        if st.phase() != Phase::InGame {
            self.invincible_until.clear();
            return ControlFlow::Break(());
        }
        let now = self.services.scheduler.now_millis();
        let expired: Vec<PlayerId> = self
            .invincible_until
            .iter()
            .filter(|entry| *entry.value() <= now)
            .map(|entry| *entry.key())
            .collect();
        for player in expired {
            self.invincible_until.remove(&player);
            if self.services.host.is_online(player) {
                self.tell(player, "invincibility-end", &[]);
            }
        }

        if self.invincible_until.is_empty() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    fn start_match_clock(&self, st: &mut ArenaState, cfg: &ArenaSettings) {
        if cfg.time_limit_secs <= 0 {
            st.clock_remaining = None;
            return;
        }
        st.clock_remaining = Some(cfg.time_limit_secs);
        self.schedule_periodic(st, TimerKind::MatchClock, 0, TICKS_PER_SECOND, Arena::clock_tick);
    }

    fn clock_tick(&self, st: &mut ArenaState) -> ControlFlow<()> {
        if st.phase() != Phase::InGame {
            return ControlFlow::Break(());
        }
        let cfg = self.settings();
        let remaining = st.clock_remaining.unwrap_or(0);
        if remaining <= 0 {
            info!(arena = %self.name, "Time limit reached");
            self.end_match(st, &cfg, None);
            return ControlFlow::Break(());
        }

        self.prune_offline();
        self.check_win(st, &cfg);
        if st.phase() != Phase::InGame {
            return ControlFlow::Break(());
        }
        self.refresh_status(st, &cfg);
        st.clock_remaining = Some(remaining - 1);
        ControlFlow::Continue(())
    }

    fn check_win(&self, st: &mut ArenaState, cfg: &ArenaSettings) {
        if st.phase() != Phase::InGame {
            return;
        }
        let players = self.roster.players();
        if players.len() <= 1 {
            self.end_match(st, cfg, players.first().copied());
        }
    }

    fn end_match(&self, st: &mut ArenaState, cfg: &ArenaSettings, winner: Option<PlayerId>) {
        if !st.enter(Phase::Ending) {
            return;
        }
        st.timers.disarm(TimerKind::Countdown);
        st.timers.disarm(TimerKind::MatchClock);
        st.timers.disarm(TimerKind::Invincibility);
        st.clock_remaining = None;
        self.invincible_until.clear();
        self.selections.clear();

        let host = &self.services.host;
        let presenter = &self.services.presenter;
        let audience = self.audience();
        let arena = ("arena", self.name.clone());

        match winner.filter(|w| host.is_online(*w)) {
            Some(winner) => {
                let name = host.display_name(winner);
                self.announce("game-won", &[("player", name.clone()), arena]);
                if cfg.show_winner_title {
                    presenter.show_title(&audience, &self.text("title-win", &[("player", name)]), "");
                }
                presenter.play_sound(&[winner], Sound::Victory);
                info!(arena = %self.name, winner = %winner, "Match won");
            }
            None => {
                self.announce("game-draw", &[arena]);
                if cfg.show_winner_title {
                    presenter.show_title(&audience, &self.text("title-draw", &[]), "");
                }
                info!(arena = %self.name, "Match ended in a draw");
            }
        }
        presenter.show_status_bar(&audience, "");

        let delay = secs_to_ticks(cfg.end_delay_secs);
        self.schedule_once(st, TimerKind::EndDelay, delay, |arena, st| {
            if st.phase() == Phase::Ending {
                arena.reset_and_regenerate(st);
            }
        });
    }

    fn reset_and_regenerate(&self, st: &mut ArenaState) {
        let cfg = self.settings();
        self.announce("arena-regenerating", &[("arena", self.name.clone())]);
        self.evacuate();
        if !st.enter(Phase::Regenerating) {
            return;
        }
        info!(arena = %self.name, mode = %cfg.regen_mode, "Regeneration started");
        self.schedule_regen_step(st, RegenJob::new(cfg.regen_mode, cfg.regen_batch_size));
    }

    fn schedule_regen_step(&self, st: &mut ArenaState, job: RegenJob) {
        self.schedule_once(st, TimerKind::Regeneration, 1, move |arena, st| {
            arena.regen_step(st, job)
        });
    }

    fn regen_step(&self, st: &mut ArenaState, mut job: RegenJob) {
        if st.phase() != Phase::Regenerating {
            return;
        }
        let (world_name, bounds) = {
            let geometry = self.geometry.read();
            (geometry.world_name().map(str::to_string), geometry.bounds())
        };
        let snapshot = self.snapshot.read().clone();
        let target = RestoreTarget {
            world: &*self.services.world,
            world_name: world_name.as_deref(),
            bounds,
            snapshot,
            modified: &self.modified,
        };

        match job.step(&target) {
            Ok(RegenProgress::More) => self.schedule_regen_step(st, job),
            Ok(RegenProgress::Done) => self.finish_regeneration(st, &job),
            Err(e) => self.fail_regeneration(st, &job, e),
        }
    }

    fn finish_regeneration(&self, st: &mut ArenaState, job: &RegenJob) {
        let refilled = self.refill_containers();
        let next = if st.enabled { Phase::Waiting } else { Phase::Disabled };
        if !st.enter(next) {
            return;
        }
        info!(
            arena = %self.name,
            mode = %job.mode(),
            restored = job.restored(),
            refilled,
            elapsed_ms = job.elapsed_ms(),
            "Regeneration complete"
        );
        self.persist_later(self.record_with(st.enabled), false);
    }

    fn fail_regeneration(&self, st: &mut ArenaState, job: &RegenJob, err: RegenError) {
        error!(arena = %self.name, mode = %job.mode(), error = %err, "Regeneration failed, disabling arena");
        st.enabled = false;
        st.timers.disarm_all();
        st.enter(Phase::Disabled);

        self.persist_later(self.record_with(false), true);
    }

    /// Return everyone to the host default state and empty the roster
    fn evacuate(&self) {
        let (players, spectators) = self.roster.clear();
        let host = &self.services.host;
        for player in &players {
            host.reveal(*player);
            host.reset(*player, GameMode::Default);
        }
        for spectator in &spectators {
            self.release_spectator(*spectator);
        }
        self.selections.clear();
        self.invincible_until.clear();
        if !players.is_empty() || !spectators.is_empty() {
            debug!(
                arena = %self.name,
                players = players.len(),
                spectators = spectators.len(),
                "Arena evacuated"
            );
        }
    }

    // ---- scheduling ----

    fn schedule_periodic(&self, st: &mut ArenaState, kind: TimerKind, initial: Ticks, period: Ticks, tick: Tick) {
        let epoch = st.timers.arm(kind);
        let me = self.me.clone();
        let handle = self.services.scheduler.run_periodic(
            initial,
            period,
            Box::new(move || {
                let Some(arena) = me.upgrade() else {
                    return ControlFlow::Break(());
                };
                let mut st = arena.state.lock();
                if !st.timers.is_current(epoch) {
                    debug!(arena = %arena.name, timer = ?epoch.kind(), "Discarding stale timer callback");
                    return ControlFlow::Break(());
                }
                let flow = tick(&*arena, &mut *st);
                if flow.is_break() {
                    st.timers.finish(epoch);
                }
                flow
            }),
        );
        st.timers.attach(epoch, handle);
    }

    fn schedule_once<F>(&self, st: &mut ArenaState, kind: TimerKind, delay: Ticks, run: F)
    where
        F: FnOnce(&Arena, &mut ArenaState) + Send + 'static,
    {
        let epoch = st.timers.arm(kind);
        let me = self.me.clone();
        let handle = self.services.scheduler.run_once(
            delay,
            Box::new(move || {
                let Some(arena) = me.upgrade() else {
                    return;
                };
                let mut st = arena.state.lock();
                if !st.timers.is_current(epoch) {
                    debug!(arena = %arena.name, timer = ?epoch.kind(), "Discarding stale timer callback");
                    return;
                }
                st.timers.finish(epoch);
                run(&*arena, &mut *st);
            }),
        );
        st.timers.attach(epoch, handle);
    }

    // ---- presentation ----

    fn prune_offline(&self) -> Vec<PlayerId> {
        let host = &self.services.host;
        let dropped = self.roster.retain(|player| host.is_online(player));
        for player in &dropped {
            self.selections.remove(player);
            self.invincible_until.remove(player);
            warn!(arena = %self.name, player = %player, "Dropped offline player from roster");
        }
        dropped
    }

    fn audience(&self) -> Vec<PlayerId> {
        self.prune_offline();
        self.roster.everyone()
    }

    fn text(&self, key: &str, placeholders: &[(&str, String)]) -> String {
        self.services.settings.message(key, placeholders)
    }

    fn tell(&self, player: PlayerId, key: &str, placeholders: &[(&str, String)]) {
        let message = self.services.settings.prefixed_message(key, placeholders);
        self.services.presenter.broadcast(&[player], &message);
    }

    fn announce(&self, key: &str, placeholders: &[(&str, String)]) {
        let audience = self.audience();
        if audience.is_empty() {
            return;
        }
        let message = self.services.settings.prefixed_message(key, placeholders);
        self.services.presenter.broadcast(&audience, &message);
    }

    fn announce_except(&self, skip: PlayerId, key: &str, placeholders: &[(&str, String)]) {
        let audience: Vec<PlayerId> = self.audience().into_iter().filter(|p| *p != skip).collect();
        if audience.is_empty() {
            return;
        }
        let message = self.services.settings.prefixed_message(key, placeholders);
        self.services.presenter.broadcast(&audience, &message);
    }

    fn refresh_status(&self, st: &ArenaState, cfg: &ArenaSettings) {
        if !cfg.show_action_bar {
            return;
        }
        let audience = self.audience();
        if audience.is_empty() {
            return;
        }
        let text = status::render(
            &*self.services.settings,
            &StatusContext {
                arena: &self.name,
                phase: st.phase(),
                players: self.roster.player_count(),
                min_players: cfg.min_players,
                max_players: cfg.max_players,
                countdown: st.countdown_remaining,
                clock: st.clock_remaining,
            },
        );
        self.services.presenter.show_status_bar(&audience, &text);
    }
}
