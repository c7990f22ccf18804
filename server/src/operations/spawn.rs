use crate::config::SpawnPoint;
use crate::context::OperationContext;
use crate::factory::OperationArgs;
use crate::notification::CreatureAppearedNotification;
use crate::operation::{Operation, OperationError, Outcome};
use log::{debug, info};
use shared::{CreatureId, OperationKind, SYSTEM_ID};
use std::time::Duration;

/// Server-side wave that tops a spawn point back up to its population and
/// gives every new monster a brain.
pub struct SpawnOperation {
    point: SpawnPoint,
    spawned: Vec<CreatureId>,
}

impl SpawnOperation {
    pub fn new(point: SpawnPoint) -> Self {
        Self {
            point,
            spawned: Vec::new(),
        }
    }

    pub fn alive(&self) -> &[CreatureId] {
        &self.spawned
    }
}

impl Operation for SpawnOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Spawn
    }

    fn requestor(&self) -> CreatureId {
        SYSTEM_ID
    }

    fn execute(&mut self, ctx: &mut OperationContext<'_>) -> Result<Outcome, OperationError> {
        self.spawned.retain(|id| ctx.find_actor(*id).is_some());

        let mut created = 0;
        while self.spawned.len() < self.point.max_count {
            let location = match ctx.random_free_tile_near(&self.point.center, self.point.radius) {
                Some(location) => location,
                None => {
                    debug!("No room left around the {} spawn at {}", self.point.race, self.point.center);
                    break;
                }
            };
            let id = ctx.world_mut().next_monster_id();
            ctx.world_mut().add_creature(self.point.monster(id, location))?;
            ctx.notify(Box::new(CreatureAppearedNotification { creature_id: id }));

            let think = ctx.create_operation(OperationArgs::Think { monster: id })?;
            let interval = ctx.config().think_interval;
            ctx.schedule(think, interval);

            self.spawned.push(id);
            created += 1;
        }

        if created > 0 {
            info!("Spawned {} {}(s) around {}", created, self.point.race, self.point.center);
            Ok(Outcome::Completed)
        } else {
            Ok(Outcome::Skipped)
        }
    }

    fn repeat_after(&self) -> Option<Duration> {
        Some(self.point.interval)
    }

    fn describe(&self) -> String {
        format!("{} spawn at {}", self.point.race, self.point.center)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::testing::Harness;
    use crate::world::MONSTER_ID_BASE;

    #[test]
    fn test_spawn_fills_to_max_count() {
        let mut harness = Harness::new();
        let point = harness.config.spawn_points[0].clone();
        let mut spawn = SpawnOperation::new(point.clone());

        assert_eq!(harness.run(&mut spawn).unwrap(), Outcome::Completed);

        assert_eq!(spawn.alive().len(), point.max_count);
        assert_eq!(harness.world.creature_count(), point.max_count);
        assert_eq!(harness.scheduled.len(), point.max_count);
        assert!(harness
            .scheduled
            .iter()
            .all(|operation| operation.kind() == OperationKind::Think));
        for id in spawn.alive() {
            let monster = harness.world.find_actor(*id).unwrap();
            assert!(*id >= MONSTER_ID_BASE);
            assert!((monster.location.x - point.center.x).abs() <= point.radius);
        }
        assert_eq!(spawn.repeat_after(), Some(point.interval));
    }

    #[test]
    fn test_spawn_replaces_only_the_dead() {
        let mut harness = Harness::new();
        let point = harness.config.spawn_points[0].clone();
        let mut spawn = SpawnOperation::new(point.clone());
        harness.run(&mut spawn).unwrap();

        assert_eq!(harness.run(&mut spawn).unwrap(), Outcome::Skipped);

        let victim = spawn.alive()[0];
        harness.world.remove_creature(victim).unwrap();
        harness.notifications.clear();
        assert_eq!(harness.run(&mut spawn).unwrap(), Outcome::Completed);
        assert_eq!(harness.notifications.len(), 1);
        assert_eq!(spawn.alive().len(), point.max_count);
        assert!(!spawn.alive().contains(&victim));
    }
}
