//! Headless player host that tracks player state in memory

use dashmap::{DashMap, DashSet};
use tracing::debug;

use super::{ArmorSlots, GameMode, ObserverSettings, PlayerHost, PlayerId};
use crate::world::{Inventory, Position};

/// Stand-in for a real server: players "connect" with a name and every
/// host operation is recorded for inspection.
#[derive(Debug, Default)]
pub struct HeadlessHost {
    names: DashMap<PlayerId, String>,
    permissions: DashMap<PlayerId, Vec<String>>,
    positions: DashMap<PlayerId, Position>,
    modes: DashMap<PlayerId, GameMode>,
    inventories: DashMap<PlayerId, (Inventory, ArmorSlots)>,
    observers: DashMap<PlayerId, ObserverSettings>,
    /// target -> viewers it is hidden from
    hidden: DashMap<PlayerId, DashSet<PlayerId>>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, player: PlayerId, name: impl Into<String>) {
        self.names.insert(player, name.into());
    }

    pub fn disconnect(&self, player: PlayerId) {
        self.names.remove(&player);
    }

    pub fn grant(&self, player: PlayerId, permission: impl Into<String>) {
        self.permissions.entry(player).or_default().push(permission.into());
    }

    pub fn position(&self, player: PlayerId) -> Option<Position> {
        self.positions.get(&player).map(|pos| pos.clone())
    }

    pub fn mode(&self, player: PlayerId) -> Option<GameMode> {
        self.modes.get(&player).map(|mode| *mode)
    }

    pub fn inventory(&self, player: PlayerId) -> Option<(Inventory, ArmorSlots)> {
        self.inventories.get(&player).map(|inv| inv.clone())
    }

    pub fn observer(&self, player: PlayerId) -> Option<ObserverSettings> {
        self.observers.get(&player).map(|settings| *settings)
    }

    pub fn is_hidden_from(&self, target: PlayerId, viewer: PlayerId) -> bool {
        self.hidden
            .get(&target)
            .map(|viewers| viewers.contains(&viewer))
            .unwrap_or(false)
    }
}

impl PlayerHost for HeadlessHost {
    fn is_online(&self, player: PlayerId) -> bool {
        self.names.contains_key(&player)
    }

    fn display_name(&self, player: PlayerId) -> String {
        self.names
            .get(&player)
            .map(|name| name.clone())
            .unwrap_or_else(|| player.to_string())
    }

    fn has_permission(&self, player: PlayerId, permission: &str) -> bool {
        self.permissions
            .get(&player)
            .map(|granted| granted.iter().any(|p| p == permission || p == "*"))
            .unwrap_or(false)
    }

    fn teleport(&self, player: PlayerId, to: &Position) {
        debug!(player = %player, to = %to, "Teleport");
        self.positions.insert(player, to.clone());
    }

    fn reset(&self, player: PlayerId, mode: GameMode) {
        self.inventories.remove(&player);
        self.observers.remove(&player);
        self.modes.insert(player, mode);
    }

    fn set_inventory(&self, player: PlayerId, items: Inventory, armor: ArmorSlots) {
        self.inventories.insert(player, (items, armor));
    }

    fn set_observer(&self, player: PlayerId, settings: ObserverSettings) {
        self.observers.insert(player, settings);
    }

    fn clear_observer(&self, player: PlayerId) {
        self.observers.remove(&player);
    }

    fn hide_from(&self, viewers: &[PlayerId], target: PlayerId) {
        let entry = self.hidden.entry(target).or_default();
        for viewer in viewers {
            entry.insert(*viewer);
        }
    }

    fn reveal(&self, target: PlayerId) {
        self.hidden.remove(&target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_connect_and_permissions() {
        let host = HeadlessHost::new();
        let player = Uuid::new_v4();
        assert!(!host.is_online(player));

        host.connect(player, "Alex");
        host.grant(player, "skyarena.kit.archer");
        assert!(host.is_online(player));
        assert_eq!(host.display_name(player), "Alex");
        assert!(host.has_permission(player, "skyarena.kit.archer"));
        assert!(!host.has_permission(player, "skyarena.admin"));
    }

    #[test]
    fn test_visibility() {
        let host = HeadlessHost::new();
        let (viewer, target) = (Uuid::new_v4(), Uuid::new_v4());
        host.hide_from(&[viewer], target);
        assert!(host.is_hidden_from(target, viewer));
        host.reveal(target);
        assert!(!host.is_hidden_from(target, viewer));
    }
}
