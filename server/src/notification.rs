//! Outward communication with deferred spectator resolution.
//!
//! A notification never carries a recipient list. It knows how to find its
//! spectators in the world *at dispatch time* and how to render itself for
//! each of them, because what a viewer is told depends on who the viewer is
//! (the damaged player sees their own stats, bystanders see a health bar).

use crate::world::{Creature, World};
use shared::{health_percent, CreatureId, Location, Packet, SYSTEM_ID};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    #[error("creature {0} is no longer in the world")]
    CreatureGone(CreatureId),
    #[error("spectator {0} is not in the world")]
    UnknownSpectator(CreatureId),
}

pub trait Notification: Send {
    /// Identity used in logs.
    fn describe(&self) -> String;

    fn requestor(&self) -> CreatureId {
        SYSTEM_ID
    }

    fn resolve_spectators(&self, world: &World) -> Vec<CreatureId>;

    fn prepare_for(&self, world: &World, spectator: CreatureId) -> Result<Vec<Packet>, NotificationError>;
}

/// Players able to see any of `locations`, deduplicated and in id order.
pub fn spectators_of(world: &World, locations: &[Location]) -> Vec<CreatureId> {
    let mut spectators: Vec<CreatureId> = locations
        .iter()
        .flat_map(|location| world.players_in_view(location))
        .collect();
    spectators.sort_unstable();
    spectators.dedup();
    spectators
}

fn spectator_location(world: &World, spectator: CreatureId) -> Result<Location, NotificationError> {
    world
        .find_actor(spectator)
        .map(|creature| creature.location)
        .ok_or(NotificationError::UnknownSpectator(spectator))
}

#[derive(Debug, Clone)]
pub struct CreatureMovedNotification {
    pub creature_id: CreatureId,
    pub from: Location,
    pub to: Location,
}

impl Notification for CreatureMovedNotification {
    fn describe(&self) -> String {
        format!("creature {} moved {} -> {}", self.creature_id, self.from, self.to)
    }

    fn requestor(&self) -> CreatureId {
        self.creature_id
    }

    fn resolve_spectators(&self, world: &World) -> Vec<CreatureId> {
        spectators_of(world, &[self.from, self.to])
    }

    fn prepare_for(&self, world: &World, spectator: CreatureId) -> Result<Vec<Packet>, NotificationError> {
        let moved = Packet::CreatureMoved {
            creature_id: self.creature_id,
            from: self.from,
            to: self.to,
        };

        if spectator == self.creature_id {
            // The mover also learns about everything that just scrolled into view.
            let mut packets = vec![moved];
            packets.extend(
                world
                    .creatures_in_view(&self.to)
                    .into_iter()
                    .filter(|creature| creature.id != spectator && !self.from.can_see(&creature.location))
                    .map(|creature| Packet::CreatureAppeared {
                        creature: creature.view(),
                    }),
            );
            return Ok(packets);
        }

        let viewer = spectator_location(world, spectator)?;
        let packets = match (viewer.can_see(&self.from), viewer.can_see(&self.to)) {
            (true, true) => vec![moved],
            (false, true) => {
                let creature = world
                    .find_actor(self.creature_id)
                    .ok_or(NotificationError::CreatureGone(self.creature_id))?;
                vec![Packet::CreatureAppeared {
                    creature: creature.view(),
                }]
            }
            (true, false) => vec![Packet::CreatureRemoved {
                creature_id: self.creature_id,
                location: self.from,
            }],
            (false, false) => Vec::new(),
        };
        Ok(packets)
    }
}

#[derive(Debug, Clone)]
pub struct CreatureSpokeNotification {
    pub creature_id: CreatureId,
    pub name: String,
    pub text: String,
    pub location: Location,
}

impl Notification for CreatureSpokeNotification {
    fn describe(&self) -> String {
        format!("creature {} spoke at {}", self.creature_id, self.location)
    }

    fn requestor(&self) -> CreatureId {
        self.creature_id
    }

    fn resolve_spectators(&self, world: &World) -> Vec<CreatureId> {
        spectators_of(world, &[self.location])
    }

    fn prepare_for(&self, _world: &World, _spectator: CreatureId) -> Result<Vec<Packet>, NotificationError> {
        Ok(vec![Packet::CreatureSpoke {
            creature_id: self.creature_id,
            name: self.name.clone(),
            text: self.text.clone(),
        }])
    }
}

/// A creature entered the world (login, spawn, respawn).
#[derive(Debug, Clone)]
pub struct CreatureAppearedNotification {
    pub creature_id: CreatureId,
}

impl Notification for CreatureAppearedNotification {
    fn describe(&self) -> String {
        format!("creature {} appeared", self.creature_id)
    }

    fn resolve_spectators(&self, world: &World) -> Vec<CreatureId> {
        world
            .find_actor(self.creature_id)
            .map(|creature| world.players_in_view(&creature.location))
            .unwrap_or_default()
    }

    fn prepare_for(&self, world: &World, spectator: CreatureId) -> Result<Vec<Packet>, NotificationError> {
        let creature = world
            .find_actor(self.creature_id)
            .ok_or(NotificationError::CreatureGone(self.creature_id))?;

        if spectator != self.creature_id {
            return Ok(vec![Packet::CreatureAppeared {
                creature: creature.view(),
            }]);
        }

        // The creature itself gets its stats and a full picture of its surroundings.
        let mut packets = vec![Packet::PlayerStats {
            hitpoints: creature.hitpoints,
            max_hitpoints: creature.max_hitpoints,
        }];
        packets.extend(
            world
                .creatures_in_view(&creature.location)
                .into_iter()
                .map(|visible| Packet::CreatureAppeared {
                    creature: visible.view(),
                }),
        );
        Ok(packets)
    }
}

#[derive(Debug, Clone)]
pub struct CreatureRemovedNotification {
    pub creature_id: CreatureId,
    pub location: Location,
}

impl Notification for CreatureRemovedNotification {
    fn describe(&self) -> String {
        format!("creature {} removed from {}", self.creature_id, self.location)
    }

    fn resolve_spectators(&self, world: &World) -> Vec<CreatureId> {
        spectators_of(world, &[self.location])
    }

    fn prepare_for(&self, _world: &World, _spectator: CreatureId) -> Result<Vec<Packet>, NotificationError> {
        Ok(vec![Packet::CreatureRemoved {
            creature_id: self.creature_id,
            location: self.location,
        }])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthChange {
    Damage { amount: u32, source: Option<String> },
    Heal { amount: u32 },
}

/// Health is captured when the change happens, so a target that died and
/// respawned before dispatch is still reported at the health it was left with.
#[derive(Debug, Clone)]
pub struct HealthChangedNotification {
    pub target: CreatureId,
    pub location: Location,
    pub hitpoints: u32,
    pub max_hitpoints: u32,
    pub change: HealthChange,
}

impl HealthChangedNotification {
    pub fn new(target: &Creature, change: HealthChange) -> Self {
        Self {
            target: target.id,
            location: target.location,
            hitpoints: target.hitpoints,
            max_hitpoints: target.max_hitpoints,
            change,
        }
    }

    /// Text shown to the target itself. Healing only refreshes the stats.
    fn message(&self) -> Option<String> {
        match &self.change {
            HealthChange::Damage {
                amount,
                source: Some(source),
            } => Some(format!(
                "You lose {} hitpoints due to an attack by {}.",
                amount, source
            )),
            HealthChange::Damage { amount, source: None } => {
                Some(format!("You lose {} hitpoints.", amount))
            }
            HealthChange::Heal { .. } => None,
        }
    }
}

impl Notification for HealthChangedNotification {
    fn describe(&self) -> String {
        format!("health of creature {} changed: {:?}", self.target, self.change)
    }

    /// Everyone watching the tile it happened on, plus the target wherever it
    /// is now.
    fn resolve_spectators(&self, world: &World) -> Vec<CreatureId> {
        let mut spectators = spectators_of(world, &[self.location]);
        let target_is_player = world
            .find_actor(self.target)
            .map_or(false, |creature| creature.is_player);
        if target_is_player && !spectators.contains(&self.target) {
            spectators.push(self.target);
            spectators.sort_unstable();
        }
        spectators
    }

    fn prepare_for(&self, _world: &World, spectator: CreatureId) -> Result<Vec<Packet>, NotificationError> {
        if spectator == self.target {
            let mut packets = vec![Packet::PlayerStats {
                hitpoints: self.hitpoints,
                max_hitpoints: self.max_hitpoints,
            }];
            packets.extend(self.message().map(|text| Packet::TextMessage { text }));
            return Ok(packets);
        }

        Ok(vec![Packet::CreatureHealth {
            creature_id: self.target,
            health_percent: health_percent(self.hitpoints, self.max_hitpoints),
        }])
    }
}

/// Private message to a single player.
#[derive(Debug, Clone)]
pub struct TextMessageNotification {
    pub recipient: CreatureId,
    pub text: String,
}

impl Notification for TextMessageNotification {
    fn describe(&self) -> String {
        format!("text message to {}", self.recipient)
    }

    fn resolve_spectators(&self, world: &World) -> Vec<CreatureId> {
        match world.find_actor(self.recipient) {
            Some(creature) if creature.is_player => vec![creature.id],
            _ => Vec::new(),
        }
    }

    fn prepare_for(&self, _world: &World, _spectator: CreatureId) -> Result<Vec<Packet>, NotificationError> {
        Ok(vec![Packet::TextMessage {
            text: self.text.clone(),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Creature, MONSTER_ID_BASE};

    fn world_with_players(players: &[(CreatureId, i32, i32)]) -> World {
        let mut world = World::new(100, 100, 7);
        for (id, x, y) in players {
            world
                .add_creature(Creature::new(*id, format!("P{}", id), true, Location::new(*x, *y, 7), 100))
                .unwrap();
        }
        world
    }

    #[test]
    fn test_spectators_are_resolved_from_current_world() {
        let mut world = world_with_players(&[(1, 10, 10), (2, 12, 10)]);
        let notification = CreatureSpokeNotification {
            creature_id: 1,
            name: "P1".to_string(),
            text: "hi".to_string(),
            location: Location::new(10, 10, 7),
        };

        assert_eq!(notification.resolve_spectators(&world), vec![1, 2]);

        world.move_creature(2, Location::new(40, 40, 7)).unwrap();
        world
            .add_creature(Creature::new(3, "P3", true, Location::new(11, 11, 7), 100))
            .unwrap();
        assert_eq!(notification.resolve_spectators(&world), vec![1, 3]);
    }

    #[test]
    fn test_move_payload_depends_on_viewer() {
        // Mover walks east from x=20 to x=21. Player 2 only sees x=21 (west edge
        // of its view is x=21), player 3 only sees x=20.
        let mut world = world_with_players(&[(1, 20, 10), (2, 30, 10), (3, 11, 10), (4, 22, 10)]);
        world.move_creature(1, Location::new(21, 10, 7)).unwrap();

        let notification = CreatureMovedNotification {
            creature_id: 1,
            from: Location::new(20, 10, 7),
            to: Location::new(21, 10, 7),
        };
        assert_eq!(notification.resolve_spectators(&world), vec![1, 2, 3, 4]);

        assert!(matches!(
            notification.prepare_for(&world, 4).unwrap().as_slice(),
            [Packet::CreatureMoved { creature_id: 1, .. }]
        ));
        assert!(matches!(
            notification.prepare_for(&world, 2).unwrap().as_slice(),
            [Packet::CreatureAppeared { .. }]
        ));
        assert!(matches!(
            notification.prepare_for(&world, 3).unwrap().as_slice(),
            [Packet::CreatureRemoved { creature_id: 1, .. }]
        ));

        // The mover is told about player 2, which just scrolled into its view.
        let own = notification.prepare_for(&world, 1).unwrap();
        assert!(matches!(own[0], Packet::CreatureMoved { .. }));
        assert!(own.iter().any(|packet| matches!(
            packet,
            Packet::CreatureAppeared { creature } if creature.id == 2
        )));
    }

    #[test]
    fn test_health_change_payloads() {
        let mut world = world_with_players(&[(1, 10, 10), (2, 11, 10)]);
        world.find_actor_mut(1).unwrap().apply_damage(25);

        let notification = HealthChangedNotification::new(
            world.find_actor(1).unwrap(),
            HealthChange::Damage {
                amount: 25,
                source: Some("a rat".to_string()),
            },
        );

        let own = notification.prepare_for(&world, 1).unwrap();
        assert_eq!(
            own,
            vec![
                Packet::PlayerStats {
                    hitpoints: 75,
                    max_hitpoints: 100
                },
                Packet::TextMessage {
                    text: "You lose 25 hitpoints due to an attack by a rat.".to_string()
                },
            ]
        );

        let bystander = notification.prepare_for(&world, 2).unwrap();
        assert_eq!(
            bystander,
            vec![Packet::CreatureHealth {
                creature_id: 1,
                health_percent: 75
            }]
        );
    }

    #[test]
    fn test_health_of_dead_target_reads_zero() {
        let world = world_with_players(&[(2, 11, 10)]);
        let notification = HealthChangedNotification {
            target: MONSTER_ID_BASE,
            location: Location::new(10, 10, 7),
            hitpoints: 0,
            max_hitpoints: 30,
            change: HealthChange::Damage {
                amount: 20,
                source: None,
            },
        };

        assert_eq!(notification.resolve_spectators(&world), vec![2]);
        assert_eq!(
            notification.prepare_for(&world, 2).unwrap(),
            vec![Packet::CreatureHealth {
                creature_id: MONSTER_ID_BASE,
                health_percent: 0
            }]
        );
    }

    #[test]
    fn test_health_is_reported_as_captured_after_respawn() {
        let mut world = world_with_players(&[(1, 10, 10), (2, 11, 10)]);
        world.find_actor_mut(1).unwrap().apply_damage(100);
        let notification = HealthChangedNotification::new(
            world.find_actor(1).unwrap(),
            HealthChange::Damage {
                amount: 100,
                source: Some("a troll".to_string()),
            },
        );

        // Respawned far away at full health before the dispatch.
        world.move_creature(1, Location::new(60, 60, 7)).unwrap();
        let victim = world.find_actor_mut(1).unwrap();
        victim.hitpoints = victim.max_hitpoints;

        assert_eq!(notification.resolve_spectators(&world), vec![1, 2]);
        assert_eq!(
            notification.prepare_for(&world, 2).unwrap(),
            vec![Packet::CreatureHealth {
                creature_id: 1,
                health_percent: 0
            }]
        );
        assert_eq!(
            notification.prepare_for(&world, 1).unwrap(),
            vec![
                Packet::PlayerStats {
                    hitpoints: 0,
                    max_hitpoints: 100
                },
                Packet::TextMessage {
                    text: "You lose 100 hitpoints due to an attack by a troll.".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_appeared_gives_newcomer_full_view() {
        let world = world_with_players(&[(1, 10, 10), (2, 12, 12)]);
        let notification = CreatureAppearedNotification { creature_id: 1 };

        assert_eq!(notification.resolve_spectators(&world), vec![1, 2]);

        let own = notification.prepare_for(&world, 1).unwrap();
        assert!(matches!(own[0], Packet::PlayerStats { .. }));
        assert_eq!(own.len(), 3);

        let other = notification.prepare_for(&world, 2).unwrap();
        assert_eq!(other.len(), 1);
    }

    #[test]
    fn test_appeared_for_missing_creature_fails() {
        let world = world_with_players(&[(2, 12, 12)]);
        let notification = CreatureAppearedNotification { creature_id: 9 };

        assert!(notification.resolve_spectators(&world).is_empty());
        assert_eq!(
            notification.prepare_for(&world, 2),
            Err(NotificationError::CreatureGone(9))
        );
    }

    #[test]
    fn test_text_message_only_reaches_recipient() {
        let world = world_with_players(&[(1, 10, 10), (2, 11, 10)]);
        let notification = TextMessageNotification {
            recipient: 2,
            text: "Sorry, not possible.".to_string(),
        };
        assert_eq!(notification.resolve_spectators(&world), vec![2]);

        let gone = TextMessageNotification {
            recipient: 5,
            text: "lost".to_string(),
        };
        assert!(gone.resolve_spectators(&world).is_empty());
    }
}
