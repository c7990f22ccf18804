use crate::context::OperationContext;
use crate::factory::OperationArgs;
use crate::notification::{HealthChange, HealthChangedNotification};
use crate::operation::{Operation, OperationError, Outcome};
use crate::operations::combat::inflict_damage;
use shared::{ConditionType, CreatureId, OperationKind};
use std::time::Duration;

/// Starts the open-ended regeneration every player carries.
pub(crate) fn schedule_regeneration(
    ctx: &mut OperationContext<'_>,
    player: CreatureId,
) -> Result<(), OperationError> {
    let interval = ctx.config().regeneration_interval;
    let regeneration = ctx.create_operation(OperationArgs::Condition {
        target: player,
        condition: ConditionType::Regeneration,
        amount: ctx.config().regeneration_amount,
        ticks: u32::MAX,
        interval,
    })?;
    ctx.schedule(regeneration, interval);
    Ok(())
}

/// A periodic effect on one creature. The creature itself is the requestor so
/// the effect ends with everything else it has pending on logout or death.
pub struct ConditionOperation {
    target: CreatureId,
    condition: ConditionType,
    amount: u32,
    remaining: u32,
    interval: Duration,
    repeat: Option<Duration>,
}

impl ConditionOperation {
    pub fn new(
        target: CreatureId,
        condition: ConditionType,
        amount: u32,
        ticks: u32,
        interval: Duration,
    ) -> Self {
        Self {
            target,
            condition,
            amount,
            remaining: ticks,
            interval,
            repeat: None,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

impl Operation for ConditionOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Condition(self.condition)
    }

    fn requestor(&self) -> CreatureId {
        self.target
    }

    fn execute(&mut self, ctx: &mut OperationContext<'_>) -> Result<Outcome, OperationError> {
        self.repeat = None;
        if self.remaining == 0 {
            return Ok(Outcome::Skipped);
        }

        if ctx.find_actor(self.target).is_none() {
            return Ok(Outcome::Skipped);
        }
        self.remaining -= 1;

        match self.condition {
            ConditionType::Poison => {
                if inflict_damage(ctx, self.target, self.amount, None)? {
                    return Ok(Outcome::Completed);
                }
            }
            ConditionType::Regeneration => {
                let healed = ctx.world_mut().find_actor_mut(self.target).and_then(|creature| {
                    let amount = creature.heal(self.amount);
                    (amount > 0)
                        .then(|| HealthChangedNotification::new(creature, HealthChange::Heal { amount }))
                });
                if let Some(notification) = healed {
                    ctx.notify(Box::new(notification));
                }
            }
        }

        if self.remaining > 0 {
            self.repeat = Some(self.interval);
        }
        Ok(Outcome::Completed)
    }

    fn repeat_after(&self) -> Option<Duration> {
        self.repeat
    }

    fn describe(&self) -> String {
        format!(
            "{:?} on creature {} ({} ticks left)",
            self.condition, self.target, self.remaining
        )
    }
}
