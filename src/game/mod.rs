//! Arena match lifecycle

pub mod arena;
pub mod geometry;
pub mod loadout;
pub mod loot;
pub mod phase;
pub mod roster;
pub mod status;
pub mod timers;

use std::sync::Arc;

pub use arena::{Arena, DamageCause, JoinOutcome};
pub use geometry::ArenaGeometry;
pub use loadout::{KitRegistry, Loadout, LoadoutService};
pub use loot::{LootProvider, PlaceholderLoot};
pub use phase::{Phase, PhaseMachine};
pub use roster::{Membership, Roster};
pub use timers::TimerKind;

use crate::config::Settings;
use crate::directory::store::ArenaStore;
use crate::host::{PlayerHost, Presenter};
use crate::scheduler::Scheduler;
use crate::world::WorldAccess;

/// Collaborators every arena talks to, shared across the directory
#[derive(Clone)]
pub struct ArenaServices {
    pub settings: Arc<dyn Settings>,
    pub scheduler: Arc<dyn Scheduler>,
    pub world: Arc<dyn WorldAccess>,
    pub host: Arc<dyn PlayerHost>,
    pub presenter: Arc<dyn Presenter>,
    pub loadouts: Arc<dyn LoadoutService>,
    pub loot: Arc<dyn LootProvider>,
    pub store: Arc<dyn ArenaStore>,
}
