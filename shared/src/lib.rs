use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a creature (player or monster). `SYSTEM_ID` marks work
/// requested by the server itself rather than by an actor.
pub type CreatureId = u32;

pub const SYSTEM_ID: CreatureId = 0;
pub const CLIENT_VERSION: u32 = 1;

/// Horizontal and vertical distance, in tiles, a player can observe.
pub const VIEW_RANGE_X: i32 = 9;
pub const VIEW_RANGE_Y: i32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub x: i32,
    pub y: i32,
    pub z: i8,
}

impl Location {
    pub const fn new(x: i32, y: i32, z: i8) -> Self {
        Self { x, y, z }
    }

    pub fn step(&self, direction: Direction) -> Location {
        let (dx, dy) = direction.offset();
        Location::new(self.x + dx, self.y + dy, self.z)
    }

    /// True when `other` is one of the eight surrounding tiles on the same floor.
    pub fn is_adjacent_to(&self, other: &Location) -> bool {
        self.z == other.z
            && *self != *other
            && (self.x - other.x).abs() <= 1
            && (self.y - other.y).abs() <= 1
    }

    /// Straight-line distance in tiles, ignoring floors.
    pub fn distance_to(&self, other: &Location) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }

    /// True when `other` falls inside the viewport centred on `self`.
    pub fn can_see(&self, other: &Location) -> bool {
        self.z == other.z
            && (self.x - other.x).abs() <= VIEW_RANGE_X
            && (self.y - other.y).abs() <= VIEW_RANGE_Y
    }

    /// Single step that brings `self` closer to `target`, if they differ.
    pub fn direction_towards(&self, target: &Location) -> Option<Direction> {
        let dx = (target.x - self.x).signum();
        let dy = (target.y - self.y).signum();
        Direction::from_offset(dx, dy)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
    NorthEast,
    SouthEast,
    SouthWest,
    NorthWest,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
        Direction::NorthEast,
        Direction::SouthEast,
        Direction::SouthWest,
        Direction::NorthWest,
    ];

    pub fn offset(&self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
            Direction::NorthEast => (1, -1),
            Direction::SouthEast => (1, 1),
            Direction::SouthWest => (-1, 1),
            Direction::NorthWest => (-1, -1),
        }
    }

    pub fn from_offset(dx: i32, dy: i32) -> Option<Direction> {
        Direction::ALL
            .iter()
            .copied()
            .find(|direction| direction.offset() == (dx, dy))
    }

    pub fn is_diagonal(&self) -> bool {
        let (dx, dy) = self.offset();
        dx != 0 && dy != 0
    }
}

/// Cooldown dimension tracked per actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExhaustionType {
    Combat,
    Movement,
    Speech,
    Action,
}

/// Category of deferred work, used for bulk cancellation and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Login,
    Logout,
    Movement,
    WalkTo,
    Attack,
    AutoAttack,
    Speech,
    /// One kind per condition type, so a new poison can replace a pending
    /// one without touching regeneration.
    Condition(ConditionType),
    Spawn,
    Think,
    Notification,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionType {
    Poison,
    Regeneration,
}

/// What an observer is told about a creature entering its view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatureView {
    pub id: CreatureId,
    pub name: String,
    pub location: Location,
    pub health_percent: u8,
    pub is_player: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    // Client commands
    Connect {
        client_version: u32,
        name: String,
    },
    Move {
        direction: Direction,
    },
    WalkTo {
        location: Location,
    },
    Attack {
        target: CreatureId,
    },
    StopAttack,
    Say {
        text: String,
    },
    Disconnect,

    // Server payloads
    Connected {
        creature_id: CreatureId,
    },
    Disconnected {
        reason: String,
    },
    CreatureAppeared {
        creature: CreatureView,
    },
    CreatureMoved {
        creature_id: CreatureId,
        from: Location,
        to: Location,
    },
    CreatureRemoved {
        creature_id: CreatureId,
        location: Location,
    },
    CreatureSpoke {
        creature_id: CreatureId,
        name: String,
        text: String,
    },
    CreatureHealth {
        creature_id: CreatureId,
        health_percent: u8,
    },
    PlayerStats {
        hitpoints: u32,
        max_hitpoints: u32,
    },
    TextMessage {
        text: String,
    },
}

/// Health as a percentage, rounded down, never above 100.
pub fn health_percent(hitpoints: u32, max_hitpoints: u32) -> u8 {
    if max_hitpoints == 0 {
        return 0;
    }
    ((hitpoints.min(max_hitpoints) as u64 * 100) / max_hitpoints as u64) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_location_step() {
        let origin = Location::new(100, 100, 7);
        assert_eq!(origin.step(Direction::North), Location::new(100, 99, 7));
        assert_eq!(origin.step(Direction::SouthWest), Location::new(99, 101, 7));
    }

    #[test]
    fn test_location_adjacency() {
        let origin = Location::new(10, 10, 7);
        assert!(origin.is_adjacent_to(&Location::new(11, 11, 7)));
        assert!(origin.is_adjacent_to(&Location::new(10, 9, 7)));
        assert!(!origin.is_adjacent_to(&origin));
        assert!(!origin.is_adjacent_to(&Location::new(12, 10, 7)));
        assert!(!origin.is_adjacent_to(&Location::new(11, 10, 6)));
    }

    #[test]
    fn test_location_distance() {
        let a = Location::new(0, 0, 7);
        let b = Location::new(3, 4, 7);
        assert_approx_eq!(a.distance_to(&b), 5.0, 0.0001);
        assert_approx_eq!(b.distance_to(&a), 5.0, 0.0001);
        assert_approx_eq!(a.distance_to(&a), 0.0, 0.0001);
    }

    #[test]
    fn test_location_view_range() {
        let viewer = Location::new(50, 50, 7);
        assert!(viewer.can_see(&Location::new(59, 57, 7)));
        assert!(!viewer.can_see(&Location::new(60, 50, 7)));
        assert!(!viewer.can_see(&Location::new(50, 58, 7)));
        assert!(!viewer.can_see(&Location::new(50, 50, 6)));
    }

    #[test]
    fn test_direction_towards() {
        let from = Location::new(5, 5, 7);
        assert_eq!(
            from.direction_towards(&Location::new(9, 5, 7)),
            Some(Direction::East)
        );
        assert_eq!(
            from.direction_towards(&Location::new(1, 1, 7)),
            Some(Direction::NorthWest)
        );
        assert_eq!(from.direction_towards(&from), None);
    }

    #[test]
    fn test_direction_offsets_are_unique() {
        for direction in Direction::ALL {
            let (dx, dy) = direction.offset();
            assert_eq!(Direction::from_offset(dx, dy), Some(direction));
        }
        assert!(Direction::NorthEast.is_diagonal());
        assert!(!Direction::West.is_diagonal());
    }

    #[test]
    fn test_health_percent() {
        assert_eq!(health_percent(50, 100), 50);
        assert_eq!(health_percent(1, 3), 33);
        assert_eq!(health_percent(200, 100), 100);
        assert_eq!(health_percent(10, 0), 0);
    }

    #[test]
    fn test_packet_serialization_connect() {
        let packet = Packet::Connect {
            client_version: CLIENT_VERSION,
            name: "Knight".to_string(),
        };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Connect {
                client_version,
                name,
            } => {
                assert_eq!(client_version, CLIENT_VERSION);
                assert_eq!(name, "Knight");
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_creature_appeared() {
        let creature = CreatureView {
            id: 7,
            name: "Rat".to_string(),
            location: Location::new(100, 120, 7),
            health_percent: 80,
            is_player: false,
        };
        let packet = Packet::CreatureAppeared {
            creature: creature.clone(),
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        assert_eq!(deserialized, Packet::CreatureAppeared { creature });
    }

    #[test]
    fn test_truncated_packet_is_rejected() {
        let packet = Packet::Say {
            text: "hello".to_string(),
        };
        let data = bincode::serialize(&packet).unwrap();
        let result: Result<Packet, _> = bincode::deserialize(&data[..data.len() / 2]);
        assert!(result.is_err());
    }
}
