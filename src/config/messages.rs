//! Player-facing message templates with `{name}` placeholders

use std::collections::HashMap;

const DEFAULT_MESSAGES: &[(&str, &str)] = &[
    ("prefix", "[SkyArena] "),
    ("arena-not-ready", "Arena {arena} is not ready yet."),
    ("arena-in-game", "Arena {arena} is already in game."),
    ("arena-full", "Arena {arena} is full."),
    ("already-in-arena", "You are already in an arena."),
    ("join-arena", "You joined {arena} ({current}/{max})."),
    ("join-arena-broadcast", "{player} joined the arena ({current}/{max})."),
    ("leave-arena", "You left {arena}."),
    ("leave-arena-broadcast", "{player} left the arena ({current}/{max})."),
    ("now-spectating", "You are now spectating {arena}."),
    ("stop-spectating", "You stopped spectating {arena}."),
    ("cannot-spectate-disabled", "Spectating is not available in {arena} right now."),
    ("cannot-spectate-playing", "You cannot spectate while playing."),
    ("countdown-starting", "Enough players! The game starts in {time} seconds."),
    ("countdown-cancelled", "Not enough players, countdown cancelled."),
    ("game-starting", "The game has started. Good luck!"),
    ("invincibility-start", "You are invincible for {time} seconds."),
    ("invincibility-end", "Your invincibility has worn off."),
    ("player-eliminated", "{player} has been eliminated."),
    ("player-eliminated-by-player", "{victim} was eliminated by {killer}."),
    ("game-won", "{player} has won the game on {arena}!"),
    ("game-draw", "The game on {arena} ended in a draw."),
    ("arena-regenerating", "Arena {arena} is regenerating."),
    ("chest-refilled", "Chests have been refilled!"),
    ("cannot-modify-arena", "You cannot modify this arena."),
    ("cannot-interact-spectator", "Spectators cannot interact with the arena."),
    ("kit-selected", "You selected the {kit} kit."),
    ("title-countdown", "{time}"),
    ("subtitle-countdown", "Get ready!"),
    ("title-start", "GO!"),
    ("subtitle-start", "Last one standing wins"),
    ("title-win", "{player} wins!"),
    ("title-draw", "Draw!"),
    ("actionbar-waiting", "Waiting for {needed} more ({current}/{max})"),
    ("actionbar-starting", "Starting in {time}s"),
    ("actionbar-ingame", "Players left: {players} | Time: {time}"),
    ("actionbar-ending", "Game over!"),
    ("actionbar-regenerating", "Regenerating {arena}..."),
    ("actionbar-disabled", "{arena} is disabled"),
];

#[derive(Debug, Clone)]
pub struct MessageCatalog {
    templates: HashMap<String, String>,
}

impl MessageCatalog {
    pub fn new() -> Self {
        Self {
            templates: DEFAULT_MESSAGES
                .iter()
                .map(|(key, template)| (key.to_string(), template.to_string()))
                .collect(),
        }
    }

    pub fn set(&mut self, key: &str, template: impl Into<String>) {
        self.templates.insert(key.to_string(), template.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.templates.contains_key(key)
    }

    /// Substitute every `{name}` occurrence; unknown keys render a marker
    pub fn render(&self, key: &str, placeholders: &[(&str, String)]) -> String {
        let template = match self.templates.get(key) {
            Some(template) => template.clone(),
            None => return format!("<missing message: {key}>"),
        };
        placeholders
            .iter()
            .fold(template, |text, (name, value)| {
                text.replace(&format!("{{{name}}}"), value)
            })
    }
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_replaces_all_placeholders() {
        let catalog = MessageCatalog::new();
        let text = catalog.render(
            "join-arena-broadcast",
            &[
                ("player", "Steve".to_string()),
                ("current", "3".to_string()),
                ("max", "12".to_string()),
            ],
        );
        assert_eq!(text, "Steve joined the arena (3/12).");
    }

    #[test]
    fn test_override_and_missing_key() {
        let mut catalog = MessageCatalog::new();
        catalog.set("arena-full", "{arena} full");
        assert_eq!(
            catalog.render("arena-full", &[("arena", "sky".to_string())]),
            "sky full"
        );
        assert_eq!(catalog.render("nope", &[]), "<missing message: nope>");
    }
}
