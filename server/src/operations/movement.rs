use crate::context::OperationContext;
use crate::exhaustion::ExhaustionInfo;
use crate::notification::{CreatureMovedNotification, TextMessageNotification};
use crate::operation::{Operation, OperationError, Outcome};
use crate::pathfinding::PathConstraints;
use log::debug;
use shared::{CreatureId, Direction, ExhaustionType, Location, OperationKind};
use std::collections::VecDeque;
use std::time::Duration;

/// Moves `creature_id` one tile. Returns the step's duration, or `None` when
/// the creature is gone or the tile cannot be entered.
fn step(
    ctx: &mut OperationContext<'_>,
    creature_id: CreatureId,
    direction: Direction,
) -> Result<Option<Duration>, OperationError> {
    let (from, cost) = match ctx.find_actor(creature_id) {
        Some(creature) => (creature.location, creature.step_cost(direction)),
        None => return Ok(None),
    };
    let to = from.step(direction);
    if !ctx.location_state(&to).map(|tile| tile.is_free()).unwrap_or(false) {
        return Ok(None);
    }

    ctx.world_mut().move_creature(creature_id, to)?;
    ctx.notify(Box::new(CreatureMovedNotification {
        creature_id,
        from,
        to,
    }));
    Ok(Some(cost))
}

fn tell(ctx: &mut OperationContext<'_>, recipient: CreatureId, text: &str) {
    ctx.notify(Box::new(TextMessageNotification {
        recipient,
        text: text.to_string(),
    }));
}

/// A single step in one direction.
pub struct MoveOperation {
    creature_id: CreatureId,
    direction: Direction,
    cost: Duration,
}

impl MoveOperation {
    pub fn new(creature_id: CreatureId, direction: Direction) -> Self {
        Self {
            creature_id,
            direction,
            cost: Duration::ZERO,
        }
    }
}

impl Operation for MoveOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Movement
    }

    fn requestor(&self) -> CreatureId {
        self.creature_id
    }

    // The cost depends on the mover's speed and is only known once it steps.
    fn exhaustion_info(&self) -> ExhaustionInfo {
        ExhaustionInfo::single(ExhaustionType::Movement, self.cost)
    }

    fn execute(&mut self, ctx: &mut OperationContext<'_>) -> Result<Outcome, OperationError> {
        if ctx.find_actor(self.creature_id).is_none() {
            return Ok(Outcome::Skipped);
        }
        match step(ctx, self.creature_id, self.direction)? {
            Some(cost) => {
                self.cost = cost;
                Ok(Outcome::Completed)
            }
            None => {
                tell(ctx, self.creature_id, "Sorry, not possible.");
                Ok(Outcome::Skipped)
            }
        }
    }

    fn describe(&self) -> String {
        format!("step {:?} of creature {}", self.direction, self.creature_id)
    }
}

/// Walks a creature to a destination one step per execution, re-planning
/// when the way ahead gets blocked.
pub struct WalkToOperation {
    creature_id: CreatureId,
    destination: Location,
    max_steps: usize,
    path: VecDeque<Direction>,
    planned: bool,
    cost: Duration,
    repeat: Option<Duration>,
}

impl WalkToOperation {
    pub fn new(creature_id: CreatureId, destination: Location, max_steps: usize) -> Self {
        Self {
            creature_id,
            destination,
            max_steps,
            path: VecDeque::new(),
            planned: false,
            cost: Duration::ZERO,
            repeat: None,
        }
    }

    fn plan(&mut self, ctx: &OperationContext<'_>, from: Location) -> bool {
        let constraints = PathConstraints {
            max_steps: self.max_steps,
            stop_adjacent: false,
        };
        match ctx.find_path(from, self.destination, constraints) {
            Ok(path) => {
                self.path = path.into();
                self.planned = true;
                true
            }
            Err(e) => {
                debug!("Creature {} cannot walk: {}", self.creature_id, e);
                false
            }
        }
    }
}

impl Operation for WalkToOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::WalkTo
    }

    fn requestor(&self) -> CreatureId {
        self.creature_id
    }

    fn exhaustion_info(&self) -> ExhaustionInfo {
        ExhaustionInfo::single(ExhaustionType::Movement, self.cost)
    }

    fn execute(&mut self, ctx: &mut OperationContext<'_>) -> Result<Outcome, OperationError> {
        self.repeat = None;
        self.cost = Duration::ZERO;

        let from = match ctx.find_actor(self.creature_id) {
            Some(creature) => creature.location,
            None => return Ok(Outcome::Skipped),
        };
        if from == self.destination {
            return Ok(Outcome::Skipped);
        }

        if !self.planned && !self.plan(ctx, from) {
            tell(ctx, self.creature_id, "There is no way.");
            return Ok(Outcome::Skipped);
        }

        let direction = match self.path.front() {
            Some(direction) => *direction,
            None => return Ok(Outcome::Skipped),
        };
        let cost = match step(ctx, self.creature_id, direction)? {
            Some(cost) => cost,
            None => {
                // Something stepped into the way; try again from here.
                if !self.plan(ctx, from) {
                    tell(ctx, self.creature_id, "There is no way.");
                    return Ok(Outcome::Skipped);
                }
                match self.path.front().copied() {
                    Some(direction) => match step(ctx, self.creature_id, direction)? {
                        Some(cost) => cost,
                        None => {
                            tell(ctx, self.creature_id, "There is no way.");
                            return Ok(Outcome::Skipped);
                        }
                    },
                    None => return Ok(Outcome::Skipped),
                }
            }
        };

        self.path.pop_front();
        self.cost = cost;
        if !self.path.is_empty() {
            self.repeat = Some(cost);
        }
        Ok(Outcome::Completed)
    }

    fn repeat_after(&self) -> Option<Duration> {
        self.repeat
    }

    fn describe(&self) -> String {
        format!("walk of creature {} to {}", self.creature_id, self.destination)
    }
}
