//! Player and presentation seams implemented by the host server

pub mod headless;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::world::{Inventory, ItemStack, Position};

pub use headless::HeadlessHost;

pub type PlayerId = Uuid;

pub type ArmorSlots = [Option<ItemStack>; 4];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameMode {
    Survival,
    Adventure,
    Spectator,
    /// The host's configured default for players outside arenas
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserverSettings {
    pub flight_speed: f32,
    pub night_vision: bool,
}

/// Operations on online players. Implementations must not call back into
/// arena methods.
pub trait PlayerHost: Send + Sync {
    fn is_online(&self, player: PlayerId) -> bool;
    fn display_name(&self, player: PlayerId) -> String;
    fn has_permission(&self, player: PlayerId, permission: &str) -> bool;

    fn teleport(&self, player: PlayerId, to: &Position);

    /// Restore full health, food and xp, clear inventory and effects, then
    /// switch game mode
    fn reset(&self, player: PlayerId, mode: GameMode);

    fn set_inventory(&self, player: PlayerId, items: Inventory, armor: ArmorSlots);

    fn set_observer(&self, player: PlayerId, settings: ObserverSettings);
    fn clear_observer(&self, player: PlayerId);

    /// Hide `target` from each of `viewers`
    fn hide_from(&self, viewers: &[PlayerId], target: PlayerId);

    /// Make `target` visible to everyone again
    fn reveal(&self, target: PlayerId);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sound {
    CountdownTick { pitch: f32 },
    MatchStart,
    Victory,
    ChestRefill,
}

/// Outbound presentation; fire-and-forget
pub trait Presenter: Send + Sync {
    fn broadcast(&self, players: &[PlayerId], message: &str);
    fn show_countdown_cue(&self, players: &[PlayerId], seconds_left: u32);
    fn show_title(&self, players: &[PlayerId], title: &str, subtitle: &str);
    /// Empty text clears the bar
    fn show_status_bar(&self, players: &[PlayerId], text: &str);
    fn play_sound(&self, players: &[PlayerId], sound: Sound);
}

/// Presenter that writes everything to the log
#[derive(Debug, Default)]
pub struct TracingPresenter;

impl Presenter for TracingPresenter {
    fn broadcast(&self, players: &[PlayerId], message: &str) {
        info!(recipients = players.len(), message, "Broadcast");
    }

    fn show_countdown_cue(&self, players: &[PlayerId], seconds_left: u32) {
        info!(recipients = players.len(), seconds_left, "Countdown cue");
    }

    fn show_title(&self, players: &[PlayerId], title: &str, subtitle: &str) {
        info!(recipients = players.len(), title, subtitle, "Title");
    }

    fn show_status_bar(&self, _players: &[PlayerId], _text: &str) {}

    fn play_sound(&self, _players: &[PlayerId], _sound: Sound) {}
}
