use crate::world::{Creature, World};
use shared::{CreatureId, Location};
use std::time::Duration;

/// A place the server keeps populated with monsters of one race.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnPoint {
    pub race: String,
    pub center: Location,
    pub radius: i32,
    pub max_count: usize,
    pub interval: Duration,
    pub max_hitpoints: u32,
    pub max_damage: u32,
    pub poison_damage: u32,
    pub step_duration: Duration,
}

impl SpawnPoint {
    pub fn monster(&self, id: CreatureId, location: Location) -> Creature {
        Creature::new(id, self.race.clone(), false, location, self.max_hitpoints)
            .with_max_damage(self.max_damage)
            .with_poison(self.poison_damage)
            .with_step_duration(self.step_duration)
    }
}

/// Tunables for the simulation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub world_width: i32,
    pub world_height: i32,
    pub floor: i8,
    /// Where players log in and respawn.
    pub temple: Location,
    pub player_max_hitpoints: u32,
    pub player_max_damage: u32,
    pub player_step: Duration,
    pub attack_interval: Duration,
    pub combat_exhaustion: Duration,
    pub speech_exhaustion: Duration,
    pub think_interval: Duration,
    /// Hitpoints a player regains every `regeneration_interval`.
    pub regeneration_amount: u32,
    pub regeneration_interval: Duration,
    /// Ticks of poison a venomous hit leaves behind.
    pub poison_ticks: u32,
    pub poison_interval: Duration,
    pub client_timeout: Duration,
    pub max_path_steps: usize,
    pub max_speech_length: usize,
    pub spawn_points: Vec<SpawnPoint>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            world_width: 100,
            world_height: 100,
            floor: 7,
            temple: Location::new(50, 50, 7),
            player_max_hitpoints: 150,
            player_max_damage: 20,
            player_step: Duration::from_millis(300),
            attack_interval: Duration::from_millis(2000),
            combat_exhaustion: Duration::from_millis(2000),
            speech_exhaustion: Duration::from_millis(1000),
            think_interval: Duration::from_millis(1000),
            regeneration_amount: 1,
            regeneration_interval: Duration::from_secs(3),
            poison_ticks: 5,
            poison_interval: Duration::from_secs(2),
            client_timeout: Duration::from_secs(5),
            max_path_steps: 64,
            max_speech_length: 255,
            spawn_points: vec![
                SpawnPoint {
                    race: "Rat".to_string(),
                    center: Location::new(60, 50, 7),
                    radius: 3,
                    max_count: 3,
                    interval: Duration::from_secs(30),
                    max_hitpoints: 20,
                    max_damage: 5,
                    poison_damage: 0,
                    step_duration: Duration::from_millis(600),
                },
                SpawnPoint {
                    race: "Spider".to_string(),
                    center: Location::new(40, 62, 7),
                    radius: 2,
                    max_count: 2,
                    interval: Duration::from_secs(45),
                    max_hitpoints: 35,
                    max_damage: 8,
                    poison_damage: 3,
                    step_duration: Duration::from_millis(500),
                },
            ],
        }
    }
}

impl EngineConfig {
    /// Empty map sized by this configuration.
    pub fn build_world(&self) -> World {
        World::new(self.world_width, self.world_height, self.floor)
    }

    pub fn player(&self, id: CreatureId, name: &str, location: Location) -> Creature {
        Creature::new(id, name, true, location, self.player_max_hitpoints)
            .with_max_damage(self.player_max_damage)
            .with_step_duration(self.player_step)
    }
}
