use crate::context::OperationContext;
use crate::exhaustion::ExhaustionInfo;
use crate::factory::OperationArgs;
use crate::notification::{
    CreatureAppearedNotification, CreatureRemovedNotification, HealthChange,
    HealthChangedNotification, TextMessageNotification,
};
use crate::operation::{Operation, OperationError, Outcome};
use crate::operations::condition::schedule_regeneration;
use crate::operations::login::TEMPLE_RADIUS;
use crate::world::WorldError;
use log::{debug, info};
use rand::Rng;
use shared::{ConditionType, CreatureId, ExhaustionType, OperationKind};
use std::time::Duration;

/// Deals `amount` damage to `target` and handles its death. Returns true when
/// the target died.
pub(crate) fn inflict_damage(
    ctx: &mut OperationContext<'_>,
    target: CreatureId,
    amount: u32,
    source: Option<String>,
) -> Result<bool, OperationError> {
    let creature = ctx
        .world_mut()
        .find_actor_mut(target)
        .ok_or(WorldError::CreatureNotFound(target))?;
    let dealt = creature.apply_damage(amount);
    let alive = creature.is_alive();
    let notification = HealthChangedNotification::new(
        creature,
        HealthChange::Damage {
            amount: dealt,
            source,
        },
    );
    ctx.notify(Box::new(notification));

    if alive {
        return Ok(false);
    }
    handle_death(ctx, target)?;
    Ok(true)
}

/// Monsters are removed for good; players wake up at the temple.
fn handle_death(ctx: &mut OperationContext<'_>, id: CreatureId) -> Result<(), OperationError> {
    ctx.cancel_all_for(id);
    ctx.clear_exhaustion(id);
    let mut creature = ctx.world_mut().remove_creature(id)?;
    ctx.notify(Box::new(CreatureRemovedNotification {
        creature_id: id,
        location: creature.location,
    }));

    if !creature.is_player {
        info!("{} (creature {}) died at {}", creature.name, id, creature.location);
        return Ok(());
    }

    let temple = ctx.config().temple;
    let respawn = ctx
        .world()
        .free_tile_near(&temple, TEMPLE_RADIUS)
        .ok_or_else(|| OperationError::Fault(format!("no free tile around temple {}", temple)))?;
    info!("{} (creature {}) died and respawns at {}", creature.name, id, respawn);

    creature.hitpoints = creature.max_hitpoints;
    creature.location = respawn;
    ctx.world_mut().add_creature(creature)?;
    ctx.notify(Box::new(CreatureAppearedNotification { creature_id: id }));
    ctx.notify(Box::new(TextMessageNotification {
        recipient: id,
        text: "You are dead.".to_string(),
    }));
    schedule_regeneration(ctx, id)
}

/// One melee swing.
pub struct AttackOperation {
    attacker: CreatureId,
    target: CreatureId,
    cost: Duration,
}

impl AttackOperation {
    pub fn new(attacker: CreatureId, target: CreatureId, cost: Duration) -> Self {
        Self {
            attacker,
            target,
            cost,
        }
    }
}

impl Operation for AttackOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Attack
    }

    fn requestor(&self) -> CreatureId {
        self.attacker
    }

    fn exhaustion_info(&self) -> ExhaustionInfo {
        ExhaustionInfo::single(ExhaustionType::Combat, self.cost)
    }

    fn execute(&mut self, ctx: &mut OperationContext<'_>) -> Result<Outcome, OperationError> {
        let (attacker, target) = match (ctx.find_actor(self.attacker), ctx.find_actor(self.target)) {
            (Some(attacker), Some(target)) => (attacker.clone(), target.location),
            _ => return Ok(Outcome::Skipped),
        };
        if !attacker.location.is_adjacent_to(&target) {
            debug!(
                "Creature {} is out of reach of creature {}",
                self.target, self.attacker
            );
            return Ok(Outcome::Skipped);
        }

        let damage = ctx.rng().gen_range(1..=attacker.max_damage.max(1));
        let source = Some(attacker.name.clone());
        let killed = inflict_damage(ctx, self.target, damage, source)?;

        if !killed && attacker.poison_damage > 0 {
            // A fresh poison replaces whatever poison the target still carries.
            ctx.cancel_kind_for(self.target, OperationKind::Condition(ConditionType::Poison));
            let poison = ctx.create_operation(OperationArgs::Condition {
                target: self.target,
                condition: ConditionType::Poison,
                amount: attacker.poison_damage,
                ticks: ctx.config().poison_ticks,
                interval: ctx.config().poison_interval,
            })?;
            let interval = ctx.config().poison_interval;
            ctx.schedule(poison, interval);
        }
        Ok(Outcome::Completed)
    }

    fn describe(&self) -> String {
        format!("attack of creature {} on creature {}", self.attacker, self.target)
    }
}

/// Keeps attacking a target every interval while it stays in sight.
pub struct AutoAttackOperation {
    attacker: CreatureId,
    target: CreatureId,
    interval: Duration,
    repeat: Option<Duration>,
}

impl AutoAttackOperation {
    pub fn new(attacker: CreatureId, target: CreatureId, interval: Duration) -> Self {
        Self {
            attacker,
            target,
            interval,
            repeat: None,
        }
    }
}

impl Operation for AutoAttackOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::AutoAttack
    }

    fn requestor(&self) -> CreatureId {
        self.attacker
    }

    fn execute(&mut self, ctx: &mut OperationContext<'_>) -> Result<Outcome, OperationError> {
        self.repeat = None;

        let attacker = match ctx.find_actor(self.attacker) {
            Some(attacker) => attacker.location,
            None => return Ok(Outcome::Skipped),
        };
        let in_sight = ctx
            .find_actor(self.target)
            .map(|target| target.is_alive() && attacker.can_see(&target.location))
            .unwrap_or(false);
        if !in_sight {
            ctx.notify(Box::new(TextMessageNotification {
                recipient: self.attacker,
                text: "Target lost.".to_string(),
            }));
            return Ok(Outcome::Skipped);
        }

        let attack = ctx.create_operation(OperationArgs::Attack {
            attacker: self.attacker,
            target: self.target,
        })?;
        ctx.schedule_throttled(attack, Duration::ZERO);
        self.repeat = Some(self.interval);
        Ok(Outcome::Completed)
    }

    fn repeat_after(&self) -> Option<Duration> {
        self.repeat
    }

    fn describe(&self) -> String {
        format!(
            "auto-attack of creature {} on creature {}",
            self.attacker, self.target
        )
    }
}
