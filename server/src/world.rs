//! Authoritative world state: creatures and the single-floor tile grid.
//!
//! The world is owned by [`Game`](crate::game::Game) and mutated only from
//! the dispatch loop, so none of it is locked.

use rand::seq::SliceRandom;
use rand::Rng;
use shared::{health_percent, CreatureId, CreatureView, Direction, Location};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use thiserror::Error;

/// Monster ids start here so they never collide with connection-assigned player ids.
pub const MONSTER_ID_BASE: CreatureId = 0x4000_0000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldError {
    #[error("creature {0} not found")]
    CreatureNotFound(CreatureId),
    #[error("creature {0} is already in the world")]
    DuplicateCreature(CreatureId),
    #[error("location {0} is outside the map")]
    OutOfBounds(Location),
    #[error("location {0} is blocked")]
    TileBlocked(Location),
    #[error("location {0} is occupied")]
    TileOccupied(Location),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Creature {
    pub id: CreatureId,
    pub name: String,
    pub is_player: bool,
    pub location: Location,
    pub hitpoints: u32,
    pub max_hitpoints: u32,
    pub max_damage: u32,
    /// Poison damage per tick inflicted on a successful melee hit; 0 for none.
    pub poison_damage: u32,
    pub step_duration: Duration,
}

impl Creature {
    pub fn new(
        id: CreatureId,
        name: impl Into<String>,
        is_player: bool,
        location: Location,
        max_hitpoints: u32,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            is_player,
            location,
            hitpoints: max_hitpoints,
            max_hitpoints,
            max_damage: 10,
            poison_damage: 0,
            step_duration: Duration::from_millis(400),
        }
    }

    pub fn with_max_damage(mut self, max_damage: u32) -> Self {
        self.max_damage = max_damage;
        self
    }

    pub fn with_poison(mut self, poison_damage: u32) -> Self {
        self.poison_damage = poison_damage;
        self
    }

    pub fn with_step_duration(mut self, step_duration: Duration) -> Self {
        self.step_duration = step_duration;
        self
    }

    pub fn is_alive(&self) -> bool {
        self.hitpoints > 0
    }

    pub fn health_percent(&self) -> u8 {
        health_percent(self.hitpoints, self.max_hitpoints)
    }

    /// Diagonal steps take twice as long as straight ones.
    pub fn step_cost(&self, direction: Direction) -> Duration {
        if direction.is_diagonal() {
            self.step_duration * 2
        } else {
            self.step_duration
        }
    }

    /// Returns the damage actually dealt.
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        let dealt = amount.min(self.hitpoints);
        self.hitpoints -= dealt;
        dealt
    }

    /// Returns the hitpoints actually restored.
    pub fn heal(&mut self, amount: u32) -> u32 {
        let healed = amount.min(self.max_hitpoints - self.hitpoints.min(self.max_hitpoints));
        self.hitpoints += healed;
        healed
    }

    pub fn view(&self) -> CreatureView {
        CreatureView {
            id: self.id,
            name: self.name.clone(),
            location: self.location,
            health_percent: self.health_percent(),
            is_player: self.is_player,
        }
    }
}

/// Snapshot of what occupies one location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileState {
    pub location: Location,
    pub walkable: bool,
    pub occupant: Option<CreatureId>,
}

impl TileState {
    pub fn is_free(&self) -> bool {
        self.walkable && self.occupant.is_none()
    }
}

#[derive(Debug)]
pub struct World {
    width: i32,
    height: i32,
    floor: i8,
    blocked: HashSet<Location>,
    creatures: HashMap<CreatureId, Creature>,
    occupancy: HashMap<Location, CreatureId>,
    next_monster_id: CreatureId,
}

impl World {
    pub fn new(width: i32, height: i32, floor: i8) -> Self {
        Self {
            width,
            height,
            floor,
            blocked: HashSet::new(),
            creatures: HashMap::new(),
            occupancy: HashMap::new(),
            next_monster_id: MONSTER_ID_BASE,
        }
    }

    pub fn contains(&self, location: &Location) -> bool {
        location.z == self.floor
            && (0..self.width).contains(&location.x)
            && (0..self.height).contains(&location.y)
    }

    pub fn block(&mut self, location: Location) {
        self.blocked.insert(location);
    }

    /// Tile view of `location`, or `None` outside the map.
    pub fn location_state(&self, location: &Location) -> Option<TileState> {
        if !self.contains(location) {
            return None;
        }
        Some(TileState {
            location: *location,
            walkable: !self.blocked.contains(location),
            occupant: self.occupancy.get(location).copied(),
        })
    }

    pub fn is_free(&self, location: &Location) -> bool {
        self.location_state(location)
            .map(|tile| tile.is_free())
            .unwrap_or(false)
    }

    pub fn find_actor(&self, id: CreatureId) -> Option<&Creature> {
        self.creatures.get(&id)
    }

    pub fn find_actor_mut(&mut self, id: CreatureId) -> Option<&mut Creature> {
        self.creatures.get_mut(&id)
    }

    pub fn creatures(&self) -> impl Iterator<Item = &Creature> {
        self.creatures.values()
    }

    pub fn creature_count(&self) -> usize {
        self.creatures.len()
    }

    pub fn next_monster_id(&mut self) -> CreatureId {
        let id = self.next_monster_id;
        self.next_monster_id = self.next_monster_id.wrapping_add(1).max(MONSTER_ID_BASE);
        id
    }

    pub fn add_creature(&mut self, creature: Creature) -> Result<(), WorldError> {
        if self.creatures.contains_key(&creature.id) {
            return Err(WorldError::DuplicateCreature(creature.id));
        }
        self.check_enterable(&creature.location)?;

        self.occupancy.insert(creature.location, creature.id);
        self.creatures.insert(creature.id, creature);
        Ok(())
    }

    pub fn remove_creature(&mut self, id: CreatureId) -> Result<Creature, WorldError> {
        let creature = self
            .creatures
            .remove(&id)
            .ok_or(WorldError::CreatureNotFound(id))?;
        if self.occupancy.get(&creature.location) == Some(&id) {
            self.occupancy.remove(&creature.location);
        }
        Ok(creature)
    }

    /// Moves a creature and returns the location it left.
    pub fn move_creature(&mut self, id: CreatureId, to: Location) -> Result<Location, WorldError> {
        if !self.creatures.contains_key(&id) {
            return Err(WorldError::CreatureNotFound(id));
        }
        self.check_enterable(&to)?;

        let creature = self
            .creatures
            .get_mut(&id)
            .ok_or(WorldError::CreatureNotFound(id))?;
        let from = creature.location;
        creature.location = to;

        self.occupancy.remove(&from);
        self.occupancy.insert(to, id);
        Ok(from)
    }

    fn check_enterable(&self, location: &Location) -> Result<(), WorldError> {
        let tile = self
            .location_state(location)
            .ok_or(WorldError::OutOfBounds(*location))?;
        if !tile.walkable {
            return Err(WorldError::TileBlocked(*location));
        }
        if tile.occupant.is_some() {
            return Err(WorldError::TileOccupied(*location));
        }
        Ok(())
    }

    /// Players whose viewport contains `location`, in id order.
    pub fn players_in_view(&self, location: &Location) -> Vec<CreatureId> {
        let mut players: Vec<CreatureId> = self
            .creatures
            .values()
            .filter(|creature| creature.is_player && creature.location.can_see(location))
            .map(|creature| creature.id)
            .collect();
        players.sort_unstable();
        players
    }

    /// Creatures visible from `location`, in id order.
    pub fn creatures_in_view(&self, location: &Location) -> Vec<&Creature> {
        let mut creatures: Vec<&Creature> = self
            .creatures
            .values()
            .filter(|creature| location.can_see(&creature.location))
            .collect();
        creatures.sort_unstable_by_key(|creature| creature.id);
        creatures
    }

    /// Closest living player visible from `from`; ties go to the lower id.
    pub fn nearest_player(&self, from: &Location) -> Option<&Creature> {
        self.creatures_in_view(from)
            .into_iter()
            .filter(|creature| creature.is_player && creature.is_alive())
            .min_by(|a, b| {
                a.location
                    .distance_to(from)
                    .total_cmp(&b.location.distance_to(from))
                    .then(a.id.cmp(&b.id))
            })
    }

    /// First free tile scanning outward ring by ring from `center`.
    pub fn free_tile_near(&self, center: &Location, radius: i32) -> Option<Location> {
        (0..=radius).find_map(|ring| {
            Self::ring(center, ring)
                .into_iter()
                .find(|location| self.is_free(location))
        })
    }

    /// Uniformly chosen free tile within `radius` of `center`.
    pub fn random_free_tile_near<R: Rng>(
        &self,
        center: &Location,
        radius: i32,
        rng: &mut R,
    ) -> Option<Location> {
        let candidates: Vec<Location> = (0..=radius)
            .flat_map(|ring| Self::ring(center, ring))
            .filter(|location| self.is_free(location))
            .collect();
        candidates.choose(rng).copied()
    }

    fn ring(center: &Location, ring: i32) -> Vec<Location> {
        if ring == 0 {
            return vec![*center];
        }
        let mut tiles = Vec::new();
        for dy in -ring..=ring {
            for dx in -ring..=ring {
                if dx.abs() == ring || dy.abs() == ring {
                    tiles.push(Location::new(center.x + dx, center.y + dy, center.z));
                }
            }
        }
        tiles
    }
}
