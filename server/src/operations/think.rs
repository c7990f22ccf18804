use crate::context::OperationContext;
use crate::factory::OperationArgs;
use crate::operation::{Operation, OperationError, Outcome};
use crate::pathfinding::PathConstraints;
use log::trace;
use rand::seq::SliceRandom;
use shared::{CreatureId, Direction, OperationKind};
use std::time::Duration;

/// Monster brain: fight an adjacent player, chase a visible one, otherwise
/// wander. Runs every interval until the monster is gone.
pub struct ThinkOperation {
    monster: CreatureId,
    interval: Duration,
    fighting: Option<CreatureId>,
    repeat: Option<Duration>,
}

impl ThinkOperation {
    pub fn new(monster: CreatureId, interval: Duration) -> Self {
        Self {
            monster,
            interval,
            fighting: None,
            repeat: None,
        }
    }

    fn stop_fighting(&mut self, ctx: &OperationContext<'_>) {
        if self.fighting.take().is_some() {
            ctx.cancel_kind_for(self.monster, OperationKind::AutoAttack);
        }
    }

    fn step(&self, ctx: &mut OperationContext<'_>, direction: Direction) -> Result<(), OperationError> {
        let step = ctx.create_operation(OperationArgs::Move {
            creature_id: self.monster,
            direction,
        })?;
        ctx.schedule_throttled(step, Duration::ZERO);
        Ok(())
    }
}

impl Operation for ThinkOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Think
    }

    fn requestor(&self) -> CreatureId {
        self.monster
    }

    fn execute(&mut self, ctx: &mut OperationContext<'_>) -> Result<Outcome, OperationError> {
        self.repeat = None;

        let location = match ctx.find_actor(self.monster) {
            Some(monster) => monster.location,
            None => return Ok(Outcome::Skipped),
        };
        self.repeat = Some(self.interval);

        let prey = ctx
            .world()
            .nearest_player(&location)
            .map(|player| (player.id, player.location));

        match prey {
            Some((player, target)) if location.is_adjacent_to(&target) => {
                if self.fighting != Some(player) {
                    self.stop_fighting(ctx);
                    let attack = ctx.create_operation(OperationArgs::AutoAttack {
                        attacker: self.monster,
                        target: player,
                    })?;
                    ctx.schedule(attack, Duration::ZERO);
                    self.fighting = Some(player);
                }
            }
            Some((player, target)) => {
                self.stop_fighting(ctx);
                let constraints = PathConstraints {
                    max_steps: ctx.config().max_path_steps,
                    stop_adjacent: true,
                };
                match ctx.find_path(location, target, constraints) {
                    Ok(path) => {
                        if let Some(direction) = path.first() {
                            self.step(ctx, *direction)?;
                        }
                    }
                    Err(e) => trace!("Creature {} cannot reach player {}: {}", self.monster, player, e),
                }
            }
            None => {
                self.stop_fighting(ctx);
                let direction = *Direction::ALL
                    .choose(ctx.rng())
                    .unwrap_or(&Direction::North);
                if ctx.world().is_free(&location.step(direction)) {
                    self.step(ctx, direction)?;
                }
            }
        }
        Ok(Outcome::Completed)
    }

    fn repeat_after(&self) -> Option<Duration> {
        self.repeat
    }

    fn describe(&self) -> String {
        format!("think of creature {}", self.monster)
    }
}
