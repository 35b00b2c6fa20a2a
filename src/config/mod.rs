//! Configuration module - settings lookup and environment parsing

pub mod messages;

use std::collections::HashMap;
use std::env;

use parking_lot::RwLock;
use tracing::warn;

use crate::regen::RegenMode;
pub use messages::MessageCatalog;

/// Setting keys
pub mod keys {
    pub const MIN_PLAYERS: &str = "min-players-to-start";
    pub const MAX_PLAYERS: &str = "max-players";
    pub const COUNTDOWN: &str = "countdown-duration";
    pub const TIME_LIMIT: &str = "game-time-limit";
    pub const INVINCIBILITY: &str = "invincibility-duration";
    pub const END_DELAY: &str = "end-game-delay";
    pub const DEATH_DELAY_TICKS: &str = "death-spectate-delay-ticks";
    pub const REGEN_MODE: &str = "regeneration-mode";
    pub const REGEN_BATCH_SIZE: &str = "regen-batch-size";
    pub const SNAPSHOT_MAX_CELLS: &str = "snapshot-max-cells";
    pub const ALLOW_SPECTATORS: &str = "allow-spectators";
    pub const SPECTATOR_NIGHT_VISION: &str = "spectator-night-vision";
    pub const SPECTATOR_SPEED: &str = "spectator-speed";
    pub const SHOW_COUNTDOWN_TITLE: &str = "show-countdown-title";
    pub const SHOW_START_TITLE: &str = "show-start-title";
    pub const SHOW_WINNER_TITLE: &str = "show-winner-title";
    pub const SHOW_ACTION_BAR: &str = "show-action-bar-messages";
    pub const FALL_DAMAGE: &str = "enable-fall-damage";
    pub const LOOT_MIN_ITEMS: &str = "loot-min-items";
    pub const LOOT_MAX_ITEMS: &str = "loot-max-items";
    pub const AUTO_EQUIP_DEFAULT_KIT: &str = "auto-equip-default-kit";
    pub const DEFAULT_KIT: &str = "default-kit-name";
    pub const ARENAS_DIR: &str = "arenas-dir";
    pub const KITS_FILE: &str = "kits-file";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Int,
    Bool,
    Text,
}

const DEFAULTS: &[(&str, &str, Kind)] = &[
    (keys::MIN_PLAYERS, "2", Kind::Int),
    (keys::MAX_PLAYERS, "12", Kind::Int),
    (keys::COUNTDOWN, "15", Kind::Int),
    (keys::TIME_LIMIT, "600", Kind::Int),
    (keys::INVINCIBILITY, "5", Kind::Int),
    (keys::END_DELAY, "10", Kind::Int),
    (keys::DEATH_DELAY_TICKS, "2", Kind::Int),
    (keys::REGEN_MODE, "PARTIAL", Kind::Text),
    (keys::REGEN_BATCH_SIZE, "4096", Kind::Int),
    (keys::SNAPSHOT_MAX_CELLS, "16777216", Kind::Int),
    (keys::ALLOW_SPECTATORS, "true", Kind::Bool),
    (keys::SPECTATOR_NIGHT_VISION, "true", Kind::Bool),
    (keys::SPECTATOR_SPEED, "0.2", Kind::Text),
    (keys::SHOW_COUNTDOWN_TITLE, "true", Kind::Bool),
    (keys::SHOW_START_TITLE, "true", Kind::Bool),
    (keys::SHOW_WINNER_TITLE, "true", Kind::Bool),
    (keys::SHOW_ACTION_BAR, "true", Kind::Bool),
    (keys::FALL_DAMAGE, "true", Kind::Bool),
    (keys::LOOT_MIN_ITEMS, "3", Kind::Int),
    (keys::LOOT_MAX_ITEMS, "6", Kind::Int),
    (keys::AUTO_EQUIP_DEFAULT_KIT, "false", Kind::Bool),
    (keys::DEFAULT_KIT, "default", Kind::Text),
    (keys::ARENAS_DIR, "arenas", Kind::Text),
    (keys::KITS_FILE, "kits.json", Kind::Text),
];

fn lookup_default(key: &str) -> Option<(&'static str, Kind)> {
    DEFAULTS
        .iter()
        .find(|(name, _, _)| *name == key)
        .map(|(_, value, kind)| (*value, *kind))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Environment variable carrying a setting, e.g. `SKYARENA_MAX_PLAYERS`
pub fn env_var_name(key: &str) -> String {
    format!("SKYARENA_{}", key.to_ascii_uppercase().replace('-', "_"))
}

/// Read-only settings and message lookup used by the arena core
pub trait Settings: Send + Sync {
    fn int_setting(&self, key: &str) -> i64;
    fn bool_setting(&self, key: &str) -> bool;
    fn string_setting(&self, key: &str) -> String;
    fn message(&self, key: &str, placeholders: &[(&str, String)]) -> String;

    fn prefixed_message(&self, key: &str, placeholders: &[(&str, String)]) -> String {
        format!("{}{}", self.message("prefix", &[]), self.message(key, placeholders))
    }
}

/// Application configuration loaded from environment variables
///
/// Values can be replaced at runtime with [`Config::set`]; arenas read
/// settings at each decision point, so a change applies to the next one.
#[derive(Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    values: RwLock<HashMap<String, String>>,
    messages: RwLock<MessageCatalog>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
            values: RwLock::new(HashMap::new()),
            messages: RwLock::new(MessageCatalog::new()),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();
        config.log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        for (key, _, _) in DEFAULTS {
            if let Ok(value) = env::var(env_var_name(key)) {
                config.try_set(key, value)?;
            }
        }

        Ok(config)
    }

    /// Builder form of [`Config::set`]
    pub fn with(self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&self, key: &str, value: impl Into<String>) {
        self.values.write().insert(key.to_string(), value.into());
    }

    /// Validated set; rejects values that do not parse for the key's type
    pub fn try_set(&self, key: &str, value: impl Into<String>) -> Result<(), ConfigError> {
        let value = value.into();
        let (_, kind) = lookup_default(key).ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

        let valid = match kind {
            Kind::Int => value.trim().parse::<i64>().is_ok(),
            Kind::Bool => parse_bool(&value).is_some(),
            Kind::Text if key == keys::REGEN_MODE => value.parse::<RegenMode>().is_ok(),
            Kind::Text if key == keys::SPECTATOR_SPEED => value.trim().parse::<f32>().is_ok(),
            Kind::Text => true,
        };
        if !valid {
            return Err(ConfigError::Invalid {
                key: key.to_string(),
                value,
            });
        }

        self.set(key, value);
        Ok(())
    }

    pub fn set_message(&self, key: &str, template: impl Into<String>) {
        self.messages.write().set(key, template);
    }

    fn raw(&self, key: &str) -> Option<String> {
        if let Some(value) = self.values.read().get(key) {
            return Some(value.clone());
        }
        lookup_default(key).map(|(value, _)| value.to_string())
    }

    fn default_of(key: &str) -> Option<&'static str> {
        lookup_default(key).map(|(value, _)| value)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings for Config {
    fn int_setting(&self, key: &str) -> i64 {
        let parsed = self.raw(key).and_then(|raw| raw.trim().parse::<i64>().ok());
        match parsed {
            Some(value) => value,
            None => {
                warn!(key, "Integer setting missing or malformed, using default");
                Self::default_of(key)
                    .and_then(|raw| raw.parse().ok())
                    .unwrap_or(0)
            }
        }
    }

    fn bool_setting(&self, key: &str) -> bool {
        match self.raw(key).as_deref().and_then(parse_bool) {
            Some(value) => value,
            None => {
                warn!(key, "Boolean setting missing or malformed, using default");
                Self::default_of(key).and_then(parse_bool).unwrap_or(false)
            }
        }
    }

    fn string_setting(&self, key: &str) -> String {
        self.raw(key).unwrap_or_default()
    }

    fn message(&self, key: &str, placeholders: &[(&str, String)]) -> String {
        self.messages.read().render(key, placeholders)
    }
}

/// Typed view of the arena settings, read fresh at each decision point
#[derive(Debug, Clone, PartialEq)]
pub struct ArenaSettings {
    pub min_players: usize,
    pub max_players: usize,
    pub countdown_secs: u32,
    /// `<= 0` disables the match clock
    pub time_limit_secs: i64,
    pub invincibility_secs: i64,
    pub end_delay_secs: u64,
    pub death_delay_ticks: u64,
    pub regen_mode: RegenMode,
    pub regen_batch_size: usize,
    /// Largest volume a full snapshot may cover
    pub snapshot_max_cells: u64,
    pub allow_spectators: bool,
    pub spectator_night_vision: bool,
    pub spectator_speed: f32,
    pub show_countdown_title: bool,
    pub show_start_title: bool,
    pub show_winner_title: bool,
    pub show_action_bar: bool,
    pub fall_damage: bool,
}

impl ArenaSettings {
    pub fn read(settings: &dyn Settings) -> Self {
        let min_players = settings.int_setting(keys::MIN_PLAYERS).max(1) as usize;
        let max_players = (settings.int_setting(keys::MAX_PLAYERS).max(1) as usize).max(min_players);

        let regen_mode = settings
            .string_setting(keys::REGEN_MODE)
            .parse()
            .unwrap_or_else(|_| {
                warn!("Unknown regeneration mode, falling back to PARTIAL");
                RegenMode::Partial
            });

        let spectator_speed = settings
            .string_setting(keys::SPECTATOR_SPEED)
            .trim()
            .parse::<f32>()
            .unwrap_or(0.2)
            .clamp(-1.0, 1.0);

        Self {
            min_players,
            max_players,
            countdown_secs: settings.int_setting(keys::COUNTDOWN).max(0) as u32,
            time_limit_secs: settings.int_setting(keys::TIME_LIMIT),
            invincibility_secs: settings.int_setting(keys::INVINCIBILITY),
            end_delay_secs: settings.int_setting(keys::END_DELAY).max(0) as u64,
            death_delay_ticks: settings.int_setting(keys::DEATH_DELAY_TICKS).max(0) as u64,
            regen_mode,
            regen_batch_size: settings.int_setting(keys::REGEN_BATCH_SIZE).max(1) as usize,
            snapshot_max_cells: settings.int_setting(keys::SNAPSHOT_MAX_CELLS).max(1) as u64,
            allow_spectators: settings.bool_setting(keys::ALLOW_SPECTATORS),
            spectator_night_vision: settings.bool_setting(keys::SPECTATOR_NIGHT_VISION),
            spectator_speed,
            show_countdown_title: settings.bool_setting(keys::SHOW_COUNTDOWN_TITLE),
            show_start_title: settings.bool_setting(keys::SHOW_START_TITLE),
            show_winner_title: settings.bool_setting(keys::SHOW_WINNER_TITLE),
            show_action_bar: settings.bool_setting(keys::SHOW_ACTION_BAR),
            fall_damage: settings.bool_setting(keys::FALL_DAMAGE),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown setting: {0}")]
    UnknownKey(String),

    #[error("Invalid value {value:?} for setting {key}")]
    Invalid { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ArenaSettings::read(&Config::new());
        assert_eq!(settings.min_players, 2);
        assert_eq!(settings.max_players, 12);
        assert_eq!(settings.countdown_secs, 15);
        assert_eq!(settings.time_limit_secs, 600);
        assert_eq!(settings.invincibility_secs, 5);
        assert_eq!(settings.end_delay_secs, 10);
        assert_eq!(settings.death_delay_ticks, 2);
        assert_eq!(settings.regen_mode, RegenMode::Partial);
        assert!(settings.allow_spectators);
        assert!(settings.spectator_night_vision);
        assert!((settings.spectator_speed - 0.2).abs() < f32::EPSILON);
        assert!(settings.show_action_bar);
    }

    #[test]
    fn test_overrides_apply_immediately() {
        let config = Config::new().with(keys::MAX_PLAYERS, "8");
        assert_eq!(ArenaSettings::read(&config).max_players, 8);
        config.set(keys::REGEN_MODE, "full");
        assert_eq!(ArenaSettings::read(&config).regen_mode, RegenMode::Full);
    }

    #[test]
    fn test_malformed_int_falls_back_to_default() {
        let config = Config::new().with(keys::COUNTDOWN, "soon");
        assert_eq!(config.int_setting(keys::COUNTDOWN), 15);
    }

    #[test]
    fn test_try_set_validates() {
        let config = Config::new();
        assert!(matches!(
            config.try_set(keys::MIN_PLAYERS, "two"),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            config.try_set(keys::REGEN_MODE, "sometimes"),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            config.try_set("no-such-key", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(config.try_set(keys::ALLOW_SPECTATORS, "no").is_ok());
        assert!(!config.bool_setting(keys::ALLOW_SPECTATORS));
    }

    #[test]
    fn test_max_never_below_min() {
        let config = Config::new()
            .with(keys::MIN_PLAYERS, "6")
            .with(keys::MAX_PLAYERS, "4");
        let settings = ArenaSettings::read(&config);
        assert_eq!(settings.min_players, 6);
        assert_eq!(settings.max_players, 6);
    }

    #[test]
    fn test_env_var_name() {
        assert_eq!(env_var_name(keys::MAX_PLAYERS), "SKYARENA_MAX_PLAYERS");
        assert_eq!(
            env_var_name(keys::SHOW_ACTION_BAR),
            "SKYARENA_SHOW_ACTION_BAR_MESSAGES"
        );
    }

    #[test]
    fn test_prefixed_message() {
        let config = Config::new();
        assert_eq!(
            config.prefixed_message("arena-full", &[("arena", "sky".to_string())]),
            "[SkyArena] Arena sky is full."
        );
    }
}
