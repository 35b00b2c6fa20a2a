//! SkyArena - match-lifecycle engine for last-player-standing arena minigames
//!
//! The engine owns arena phases, rosters, timers and map restoration. The
//! host server plugs in through traits:
//! - [`config::Settings`] for thresholds and localized text
//! - [`host::PlayerHost`] and [`host::Presenter`] for players and output
//! - [`scheduler::Scheduler`] for every delayed action
//! - [`world::WorldAccess`] for blocks and containers
//! - [`directory::ArenaStore`] for persistence

pub mod app;
pub mod config;
pub mod directory;
pub mod error;
pub mod game;
pub mod host;
pub mod regen;
pub mod scheduler;
pub mod util;
pub mod world;
