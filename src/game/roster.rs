//! Player and spectator membership for one arena

use parking_lot::RwLock;

use crate::host::PlayerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Player,
    /// Died this match and awaiting conversion to a spectator
    Eliminated,
    Spectator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added { players: usize },
    Full,
    AlreadyPresent,
}

#[derive(Debug, Default)]
struct Sets {
    players: Vec<PlayerId>,
    eliminated: Vec<PlayerId>,
    spectators: Vec<PlayerId>,
}

impl Sets {
    fn membership(&self, id: PlayerId) -> Option<Membership> {
        if self.players.contains(&id) {
            Some(Membership::Player)
        } else if self.eliminated.contains(&id) {
            Some(Membership::Eliminated)
        } else if self.spectators.contains(&id) {
            Some(Membership::Spectator)
        } else {
            None
        }
    }

    fn take(list: &mut Vec<PlayerId>, id: PlayerId) -> bool {
        match list.iter().position(|p| *p == id) {
            Some(idx) => {
                list.remove(idx);
                true
            }
            None => false,
        }
    }
}

/// The three lists are disjoint; every mutation keeps them so under one lock.
/// Players keep join order.
#[derive(Debug, Default)]
pub struct Roster {
    sets: RwLock<Sets>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an active player unless present anywhere or `capacity` is reached
    pub fn add_player(&self, id: PlayerId, capacity: usize) -> AddOutcome {
        let mut sets = self.sets.write();
        if sets.membership(id).is_some() {
            return AddOutcome::AlreadyPresent;
        }
        if sets.players.len() >= capacity {
            return AddOutcome::Full;
        }
        sets.players.push(id);
        AddOutcome::Added {
            players: sets.players.len(),
        }
    }

    /// Add a spectator; fails if the id is an active or eliminated player
    pub fn add_spectator(&self, id: PlayerId) -> bool {
        let mut sets = self.sets.write();
        match sets.membership(id) {
            None => {
                sets.spectators.push(id);
                true
            }
            Some(Membership::Spectator) => true,
            Some(_) => false,
        }
    }

    /// Move an active player to the eliminated list
    pub fn eliminate(&self, id: PlayerId) -> bool {
        let mut sets = self.sets.write();
        if Sets::take(&mut sets.players, id) {
            sets.eliminated.push(id);
            true
        } else {
            false
        }
    }

    /// Move an eliminated player to the spectators
    pub fn promote_eliminated(&self, id: PlayerId) -> bool {
        let mut sets = self.sets.write();
        if Sets::take(&mut sets.eliminated, id) {
            sets.spectators.push(id);
            true
        } else {
            false
        }
    }

    pub fn remove(&self, id: PlayerId) -> Option<Membership> {
        let mut sets = self.sets.write();
        let membership = sets.membership(id)?;
        let list = match membership {
            Membership::Player => &mut sets.players,
            Membership::Eliminated => &mut sets.eliminated,
            Membership::Spectator => &mut sets.spectators,
        };
        Sets::take(list, id);
        Some(membership)
    }

    pub fn membership(&self, id: PlayerId) -> Option<Membership> {
        self.sets.read().membership(id)
    }

    pub fn players(&self) -> Vec<PlayerId> {
        self.sets.read().players.clone()
    }

    pub fn spectators(&self) -> Vec<PlayerId> {
        self.sets.read().spectators.clone()
    }

    pub fn player_count(&self) -> usize {
        self.sets.read().players.len()
    }

    pub fn spectator_count(&self) -> usize {
        self.sets.read().spectators.len()
    }

    /// Everyone attached to the arena
    pub fn everyone(&self) -> Vec<PlayerId> {
        let sets = self.sets.read();
        sets.players
            .iter()
            .chain(&sets.eliminated)
            .chain(&sets.spectators)
            .copied()
            .collect()
    }

    /// Drop ids failing `keep`, returning the dropped ids
    pub fn retain(&self, keep: impl Fn(PlayerId) -> bool) -> Vec<PlayerId> {
        let mut guard = self.sets.write();
        let sets = &mut *guard;
        let mut dropped = Vec::new();
        for list in [&mut sets.players, &mut sets.eliminated, &mut sets.spectators] {
            list.retain(|id| {
                let kept = keep(*id);
                if !kept {
                    dropped.push(*id);
                }
                kept
            });
        }
        dropped
    }

    /// Empty the roster, returning `(players and eliminated, spectators)`
    pub fn clear(&self) -> (Vec<PlayerId>, Vec<PlayerId>) {
        let mut sets = self.sets.write();
        let mut players = std::mem::take(&mut sets.players);
        players.append(&mut sets.eliminated);
        let spectators = std::mem::take(&mut sets.spectators);
        (players, spectators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    #[test]
    fn test_capacity_and_duplicates() {
        let roster = Roster::new();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(roster.add_player(a, 2), AddOutcome::Added { players: 1 });
        assert_eq!(roster.add_player(a, 2), AddOutcome::AlreadyPresent);
        assert_eq!(roster.add_player(b, 2), AddOutcome::Added { players: 2 });
        assert_eq!(roster.add_player(c, 2), AddOutcome::Full);
        assert_eq!(roster.players(), vec![a, b]);
    }

    #[test]
    fn test_player_cannot_become_spectator_directly() {
        let roster = Roster::new();
        let id = Uuid::new_v4();
        roster.add_player(id, 4);
        assert!(!roster.add_spectator(id));
        assert!(roster.eliminate(id));
        assert!(!roster.add_spectator(id));
        assert!(roster.promote_eliminated(id));
        assert_eq!(roster.membership(id), Some(Membership::Spectator));
        assert_eq!(roster.player_count(), 0);
    }

    #[test]
    fn test_retain_reports_dropped() {
        let roster = Roster::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        roster.add_player(a, 4);
        roster.add_spectator(b);
        let dropped = roster.retain(|id| id == a);
        assert_eq!(dropped, vec![b]);
        assert_eq!(roster.everyone(), vec![a]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Join(u8),
        Spectate(u8),
        Eliminate(u8),
        Promote(u8),
        Leave(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..8).prop_map(Op::Join),
            (0u8..8).prop_map(Op::Spectate),
            (0u8..8).prop_map(Op::Eliminate),
            (0u8..8).prop_map(Op::Promote),
            (0u8..8).prop_map(Op::Leave),
        ]
    }

    proptest! {
        #[test]
        fn prop_lists_stay_disjoint(ops in prop::collection::vec(op(), 0..64)) {
            let ids: Vec<PlayerId> = (0..8).map(|_| Uuid::new_v4()).collect();
            let roster = Roster::new();
            for op in ops {
                match op {
                    Op::Join(i) => { roster.add_player(ids[i as usize], 5); }
                    Op::Spectate(i) => { roster.add_spectator(ids[i as usize]); }
                    Op::Eliminate(i) => { roster.eliminate(ids[i as usize]); }
                    Op::Promote(i) => { roster.promote_eliminated(ids[i as usize]); }
                    Op::Leave(i) => { roster.remove(ids[i as usize]); }
                }
                let everyone = roster.everyone();
                let mut unique = everyone.clone();
                unique.sort();
                unique.dedup();
                prop_assert_eq!(unique.len(), everyone.len());
                prop_assert!(roster.player_count() <= 5);
            }
        }
    }
}
