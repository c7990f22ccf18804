//! Turns requests into operations.
//!
//! Everything that wants work done (connection handlers, other operations,
//! startup) goes through an [`OperationFactory`] so inputs are validated in
//! one place and construction never touches the world.

use crate::config::{EngineConfig, SpawnPoint};
use crate::operation::{Operation, OperationError};
use crate::operations::{
    AttackOperation, AutoAttackOperation, ConditionOperation, LoginOperation, LogoutOperation,
    MoveOperation, SpawnOperation, SpeechOperation, ThinkOperation, WalkToOperation,
};
use shared::{ConditionType, CreatureId, Direction, Location, SYSTEM_ID};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum OperationArgs {
    Login {
        creature_id: CreatureId,
        name: String,
    },
    Logout {
        creature_id: CreatureId,
    },
    Move {
        creature_id: CreatureId,
        direction: Direction,
    },
    WalkTo {
        creature_id: CreatureId,
        destination: Location,
    },
    Attack {
        attacker: CreatureId,
        target: CreatureId,
    },
    AutoAttack {
        attacker: CreatureId,
        target: CreatureId,
    },
    Speech {
        creature_id: CreatureId,
        text: String,
    },
    Condition {
        target: CreatureId,
        condition: ConditionType,
        amount: u32,
        ticks: u32,
        interval: Duration,
    },
    Spawn {
        point: SpawnPoint,
    },
    Think {
        monster: CreatureId,
    },
}

pub trait OperationFactory: Send + Sync {
    fn create(&self, args: OperationArgs) -> Result<Box<dyn Operation>, OperationError>;
}

pub struct DefaultOperationFactory {
    config: EngineConfig,
}

impl DefaultOperationFactory {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    fn actor(id: CreatureId) -> Result<CreatureId, OperationError> {
        if id == SYSTEM_ID {
            return Err(OperationError::InvalidArgument(
                "the system actor cannot act as a creature".to_string(),
            ));
        }
        Ok(id)
    }

    fn combatants(attacker: CreatureId, target: CreatureId) -> Result<(), OperationError> {
        Self::actor(attacker)?;
        Self::actor(target)?;
        if attacker == target {
            return Err(OperationError::InvalidArgument(format!(
                "creature {} cannot attack itself",
                attacker
            )));
        }
        Ok(())
    }
}

impl OperationFactory for DefaultOperationFactory {
    fn create(&self, args: OperationArgs) -> Result<Box<dyn Operation>, OperationError> {
        let config = &self.config;
        let operation: Box<dyn Operation> = match args {
            OperationArgs::Login { creature_id, name } => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(OperationError::InvalidArgument("empty player name".to_string()));
                }
                Box::new(LoginOperation::new(Self::actor(creature_id)?, name.to_string()))
            }
            OperationArgs::Logout { creature_id } => {
                Box::new(LogoutOperation::new(Self::actor(creature_id)?))
            }
            OperationArgs::Move {
                creature_id,
                direction,
            } => Box::new(MoveOperation::new(Self::actor(creature_id)?, direction)),
            OperationArgs::WalkTo {
                creature_id,
                destination,
            } => Box::new(WalkToOperation::new(
                Self::actor(creature_id)?,
                destination,
                config.max_path_steps,
            )),
            OperationArgs::Attack { attacker, target } => {
                Self::combatants(attacker, target)?;
                Box::new(AttackOperation::new(attacker, target, config.combat_exhaustion))
            }
            OperationArgs::AutoAttack { attacker, target } => {
                Self::combatants(attacker, target)?;
                Box::new(AutoAttackOperation::new(attacker, target, config.attack_interval))
            }
            OperationArgs::Speech { creature_id, text } => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(OperationError::InvalidArgument("empty message".to_string()));
                }
                if text.chars().count() > config.max_speech_length {
                    return Err(OperationError::InvalidArgument(format!(
                        "message longer than {} characters",
                        config.max_speech_length
                    )));
                }
                Box::new(SpeechOperation::new(
                    Self::actor(creature_id)?,
                    text.to_string(),
                    config.speech_exhaustion,
                ))
            }
            OperationArgs::Condition {
                target,
                condition,
                amount,
                ticks,
                interval,
            } => {
                if ticks == 0 || interval.is_zero() {
                    return Err(OperationError::InvalidArgument(
                        "conditions need at least one tick and a non-zero interval".to_string(),
                    ));
                }
                Box::new(ConditionOperation::new(
                    Self::actor(target)?,
                    condition,
                    amount,
                    ticks,
                    interval,
                ))
            }
            OperationArgs::Spawn { point } => {
                if point.max_count == 0 || point.interval.is_zero() {
                    return Err(OperationError::InvalidArgument(format!(
                        "spawn point for {} needs a positive count and interval",
                        point.race
                    )));
                }
                Box::new(SpawnOperation::new(point))
            }
            OperationArgs::Think { monster } => {
                Box::new(ThinkOperation::new(Self::actor(monster)?, config.think_interval))
            }
        };
        Ok(operation)
    }
}
