use crate::context::OperationContext;
use crate::exhaustion::ExhaustionInfo;
use crate::notification::CreatureSpokeNotification;
use crate::operation::{Operation, OperationError, Outcome};
use shared::{CreatureId, ExhaustionType, OperationKind};
use std::time::Duration;

pub struct SpeechOperation {
    creature_id: CreatureId,
    text: String,
    cost: Duration,
}

impl SpeechOperation {
    pub fn new(creature_id: CreatureId, text: String, cost: Duration) -> Self {
        Self {
            creature_id,
            text,
            cost,
        }
    }
}

impl Operation for SpeechOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Speech
    }

    fn requestor(&self) -> CreatureId {
        self.creature_id
    }

    fn exhaustion_info(&self) -> ExhaustionInfo {
        ExhaustionInfo::single(ExhaustionType::Speech, self.cost)
    }

    fn execute(&mut self, ctx: &mut OperationContext<'_>) -> Result<Outcome, OperationError> {
        let (name, location) = match ctx.find_actor(self.creature_id) {
            Some(creature) => (creature.name.clone(), creature.location),
            None => return Ok(Outcome::Skipped),
        };

        ctx.notify(Box::new(CreatureSpokeNotification {
            creature_id: self.creature_id,
            name,
            text: self.text.clone(),
            location,
        }));
        Ok(Outcome::Completed)
    }
}
