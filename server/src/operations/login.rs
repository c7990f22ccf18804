use crate::context::OperationContext;
use crate::notification::{
    CreatureAppearedNotification, CreatureRemovedNotification, TextMessageNotification,
};
use crate::operation::{Operation, OperationError, Outcome};
use crate::operations::condition::schedule_regeneration;
use crate::world::WorldError;
use log::info;
use shared::{CreatureId, OperationKind};

/// How far from the temple a player may be placed when it is crowded.
pub const TEMPLE_RADIUS: i32 = 3;

/// Places a freshly connected player at the temple.
pub struct LoginOperation {
    creature_id: CreatureId,
    name: String,
}

impl LoginOperation {
    pub fn new(creature_id: CreatureId, name: String) -> Self {
        Self { creature_id, name }
    }
}

impl Operation for LoginOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Login
    }

    fn requestor(&self) -> CreatureId {
        self.creature_id
    }

    fn execute(&mut self, ctx: &mut OperationContext<'_>) -> Result<Outcome, OperationError> {
        if ctx.find_actor(self.creature_id).is_some() {
            return Err(WorldError::DuplicateCreature(self.creature_id).into());
        }

        let temple = ctx.config().temple;
        let location = ctx
            .world()
            .free_tile_near(&temple, TEMPLE_RADIUS)
            .ok_or_else(|| OperationError::Fault(format!("no free tile around temple {}", temple)))?;
        let player = ctx.config().player(self.creature_id, &self.name, location);
        ctx.world_mut().add_creature(player)?;

        info!("{} (creature {}) logged in at {}", self.name, self.creature_id, location);
        ctx.notify(Box::new(CreatureAppearedNotification {
            creature_id: self.creature_id,
        }));
        ctx.notify(Box::new(TextMessageNotification {
            recipient: self.creature_id,
            text: format!("Welcome, {}.", self.name),
        }));
        schedule_regeneration(ctx, self.creature_id)?;
        Ok(Outcome::Completed)
    }

    fn describe(&self) -> String {
        format!("login of {} as creature {}", self.name, self.creature_id)
    }
}

/// Takes a player out of the world and drops everything still pending for it.
pub struct LogoutOperation {
    creature_id: CreatureId,
}

impl LogoutOperation {
    pub fn new(creature_id: CreatureId) -> Self {
        Self { creature_id }
    }
}

impl Operation for LogoutOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Logout
    }

    fn requestor(&self) -> CreatureId {
        self.creature_id
    }

    fn execute(&mut self, ctx: &mut OperationContext<'_>) -> Result<Outcome, OperationError> {
        if ctx.find_actor(self.creature_id).is_none() {
            return Ok(Outcome::Skipped);
        }

        ctx.cancel_all_for(self.creature_id);
        let creature = ctx.world_mut().remove_creature(self.creature_id)?;
        ctx.clear_exhaustion(self.creature_id);

        info!("{} (creature {}) logged out", creature.name, creature.id);
        ctx.notify(Box::new(CreatureRemovedNotification {
            creature_id: creature.id,
            location: creature.location,
        }));
        Ok(Outcome::Completed)
    }
}
