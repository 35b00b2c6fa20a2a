//! Shared fixtures for arena integration tests

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use skyarena::config::{keys, Config};
use skyarena::directory::{ArenaDirectory, MemoryArenaStore};
use skyarena::game::{Arena, ArenaGeometry, ArenaServices, KitRegistry, PlaceholderLoot};
use skyarena::host::{HeadlessHost, PlayerId, Presenter, Sound};
use skyarena::scheduler::manual::ManualScheduler;
use skyarena::world::{BlockPos, MemoryWorld, Position};
use uuid::Uuid;

pub const WORLD: &str = "sky";
pub const CHEST: BlockPos = BlockPos { x: 2, y: 64, z: 2 };

#[derive(Debug, Clone, PartialEq)]
pub enum Shown {
    Message { to: Vec<PlayerId>, text: String },
    Cue { to: Vec<PlayerId>, seconds: u32 },
    Title { to: Vec<PlayerId>, title: String },
    Status { to: Vec<PlayerId>, text: String },
    Sound { to: Vec<PlayerId>, sound: Sound },
}

/// Presenter that keeps everything it was asked to show
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    shown: Mutex<Vec<Shown>>,
}

impl RecordingPresenter {
    pub fn messages_to(&self, player: PlayerId) -> Vec<String> {
        self.shown
            .lock()
            .iter()
            .filter_map(|shown| match shown {
                Shown::Message { to, text } if to.contains(&player) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn cues(&self) -> Vec<u32> {
        self.shown
            .lock()
            .iter()
            .filter_map(|shown| match shown {
                Shown::Cue { seconds, .. } => Some(*seconds),
                _ => None,
            })
            .collect()
    }

    pub fn titles(&self) -> Vec<String> {
        self.shown
            .lock()
            .iter()
            .filter_map(|shown| match shown {
                Shown::Title { title, .. } => Some(title.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn sounds(&self) -> Vec<Sound> {
        self.shown
            .lock()
            .iter()
            .filter_map(|shown| match shown {
                Shown::Sound { sound, .. } => Some(*sound),
                _ => None,
            })
            .collect()
    }

    pub fn last_status(&self, player: PlayerId) -> Option<String> {
        self.shown.lock().iter().rev().find_map(|shown| match shown {
            Shown::Status { to, text } if to.contains(&player) => Some(text.clone()),
            _ => None,
        })
    }

    pub fn clear(&self) {
        self.shown.lock().clear();
    }
}

impl Presenter for RecordingPresenter {
    fn broadcast(&self, players: &[PlayerId], message: &str) {
        self.shown.lock().push(Shown::Message {
            to: players.to_vec(),
            text: message.to_string(),
        });
    }

    fn show_countdown_cue(&self, players: &[PlayerId], seconds_left: u32) {
        self.shown.lock().push(Shown::Cue {
            to: players.to_vec(),
            seconds: seconds_left,
        });
    }

    fn show_title(&self, players: &[PlayerId], title: &str, _subtitle: &str) {
        self.shown.lock().push(Shown::Title {
            to: players.to_vec(),
            title: title.to_string(),
        });
    }

    fn show_status_bar(&self, players: &[PlayerId], text: &str) {
        self.shown.lock().push(Shown::Status {
            to: players.to_vec(),
            text: text.to_string(),
        });
    }

    fn play_sound(&self, players: &[PlayerId], sound: Sound) {
        self.shown.lock().push(Shown::Sound {
            to: players.to_vec(),
            sound,
        });
    }
}

pub struct Harness {
    pub config: Arc<Config>,
    pub scheduler: Arc<ManualScheduler>,
    pub world: Arc<MemoryWorld>,
    pub host: Arc<HeadlessHost>,
    pub presenter: Arc<RecordingPresenter>,
    pub kits: Arc<KitRegistry>,
    pub store: Arc<MemoryArenaStore>,
    pub services: ArenaServices,
}

impl Harness {
    pub fn new() -> Self {
        let config = Arc::new(Config::new());
        let scheduler = Arc::new(ManualScheduler::new());
        let world = Arc::new(MemoryWorld::with_world(WORLD));
        world.place_container(WORLD, CHEST, 27);
        let host = Arc::new(HeadlessHost::new());
        let presenter = Arc::new(RecordingPresenter::default());
        let kits = Arc::new(KitRegistry::new(host.clone()));
        let store = Arc::new(MemoryArenaStore::new());

        let services = ArenaServices {
            settings: config.clone(),
            scheduler: scheduler.clone(),
            world: world.clone(),
            host: host.clone(),
            presenter: presenter.clone(),
            loadouts: kits.clone(),
            loot: Arc::new(PlaceholderLoot::seeded(3, 6, 7)),
            store: store.clone(),
        };

        Self {
            config,
            scheduler,
            world,
            host,
            presenter,
            kits,
            store,
            services,
        }
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.set(key, value);
    }

    /// Four spawns, a chest and a 33x11x33 volume in [`WORLD`]
    pub fn geometry() -> ArenaGeometry {
        ArenaGeometry {
            lobby_spawn: Some(Position::new(WORLD, 0.5, 80.0, 0.5)),
            spectator_spawn: Some(Position::new(WORLD, 0.5, 90.0, 0.5)),
            player_spawns: vec![
                Position::new(WORLD, 10.5, 65.0, 10.5),
                Position::new(WORLD, -10.5, 65.0, 10.5),
                Position::new(WORLD, 10.5, 65.0, -10.5),
                Position::new(WORLD, -10.5, 65.0, -10.5),
            ],
            chest_locations: vec![CHEST.to_position(WORLD)],
            corner1: Some(Position::new(WORLD, -16.0, 60.0, -16.0)),
            corner2: Some(Position::new(WORLD, 16.0, 70.0, 16.0)),
            center: Some(Position::new(WORLD, 0.5, 65.0, 0.5)),
        }
    }

    /// A fully configured, enabled arena
    pub fn arena(&self, name: &str) -> Arc<Arena> {
        let arena = Arena::new(name, Self::geometry(), self.services.clone());
        arena.enable().expect("arena enables");
        arena
    }

    pub fn directory(&self) -> ArenaDirectory {
        ArenaDirectory::new(self.services.clone())
    }

    pub fn player(&self, name: &str) -> PlayerId {
        let id = Uuid::new_v4();
        self.host.connect(id, name);
        id
    }

    /// Shorten every delay so a match fits in a few seconds
    pub fn fast(&self) {
        self.set(keys::COUNTDOWN, "3");
        self.set(keys::END_DELAY, "1");
        self.set(keys::TIME_LIMIT, "0");
    }
}
