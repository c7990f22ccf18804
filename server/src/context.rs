//! Per-execution view of the engine handed to [`Operation::execute`].
//!
//! The context lends the world and its collaborators for the duration of one
//! call. Follow-up operations and notifications requested through it are
//! buffered and only committed by the dispatch loop once `execute` returned
//! `Ok`, so a failing operation leaves nothing half-scheduled behind.
//! Cancellations act immediately and also reach follow-ups buffered earlier
//! in the same execution.

use crate::clock::Millis;
use crate::config::EngineConfig;
use crate::factory::{OperationArgs, OperationFactory};
use crate::notification::Notification;
use crate::operation::{Operation, OperationError};
use crate::pathfinding::{PathConstraints, PathError, PathFinder};
use crate::queue::Handle;
use crate::scheduler::Scheduler;
use crate::world::{Creature, TileState, World};
use log::debug;
use rand::rngs::StdRng;
use shared::{CreatureId, Direction, ExhaustionType, Location, OperationKind};
use std::time::Duration;

pub(crate) struct PendingSchedule {
    pub handle: Handle,
    pub operation: Box<dyn Operation>,
    pub delay: Duration,
    pub throttled: bool,
}

pub struct OperationContext<'a> {
    world: &'a mut World,
    scheduler: &'a Scheduler,
    factory: &'a dyn OperationFactory,
    pathfinder: &'a dyn PathFinder,
    config: &'a EngineConfig,
    rng: &'a mut StdRng,
    now: Millis,
    handle: Handle,
    scheduled: Vec<PendingSchedule>,
    notifications: Vec<Box<dyn Notification>>,
}

impl<'a> OperationContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        world: &'a mut World,
        scheduler: &'a Scheduler,
        factory: &'a dyn OperationFactory,
        pathfinder: &'a dyn PathFinder,
        config: &'a EngineConfig,
        rng: &'a mut StdRng,
        now: Millis,
        handle: Handle,
    ) -> Self {
        Self {
            world,
            scheduler,
            factory,
            pathfinder,
            config,
            rng,
            now,
            handle,
            scheduled: Vec::new(),
            notifications: Vec::new(),
        }
    }

    /// Engine time at which this execution started.
    pub fn now(&self) -> Millis {
        self.now
    }

    /// Handle of the executing operation.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn config(&self) -> &EngineConfig {
        self.config
    }

    pub fn world(&self) -> &World {
        &*self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut *self.world
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut *self.rng
    }

    pub fn find_actor(&self, id: CreatureId) -> Option<&Creature> {
        self.world.find_actor(id)
    }

    pub fn location_state(&self, location: &Location) -> Option<TileState> {
        self.world.location_state(location)
    }

    pub fn random_free_tile_near(&mut self, center: &Location, radius: i32) -> Option<Location> {
        self.world.random_free_tile_near(center, radius, &mut *self.rng)
    }

    pub fn find_path(
        &self,
        from: Location,
        to: Location,
        constraints: PathConstraints,
    ) -> Result<Vec<Direction>, PathError> {
        self.pathfinder.find_path(&*self.world, from, to, constraints)
    }

    pub fn create_operation(&self, args: OperationArgs) -> Result<Box<dyn Operation>, OperationError> {
        self.factory.create(args)
    }

    /// Schedules a follow-up operation at `now + delay` once this execution succeeds.
    pub fn schedule(&mut self, operation: Box<dyn Operation>, delay: Duration) -> Handle {
        self.buffer(operation, delay, false)
    }

    /// Like [`schedule`](Self::schedule); the requestor's remaining exhaustion
    /// is added when the schedule is committed.
    pub fn schedule_throttled(&mut self, operation: Box<dyn Operation>, delay: Duration) -> Handle {
        self.buffer(operation, delay, true)
    }

    fn buffer(&mut self, operation: Box<dyn Operation>, delay: Duration, throttled: bool) -> Handle {
        let handle = self.scheduler.reserve(operation.as_ref());
        self.scheduled.push(PendingSchedule {
            handle,
            operation,
            delay,
            throttled,
        });
        handle
    }

    pub fn cancel_kind_for(&self, actor: CreatureId, kind: OperationKind) -> usize {
        self.scheduler
            .cancel_from_execution(|info| info.requestor == actor && info.kind == kind)
    }

    /// Cancelling the executing operation's own actor stops its repeat, but
    /// follow-ups scheduled after the call are still committed.
    pub fn cancel_all_for(&self, actor: CreatureId) -> usize {
        let cancelled = self
            .scheduler
            .cancel_from_execution(|info| info.requestor == actor);
        if cancelled > 0 {
            debug!("Cancelled {} pending items of creature {}", cancelled, actor);
        }
        cancelled
    }

    pub fn cancel_handle(&self, handle: Handle) -> bool {
        self.scheduler
            .cancel_from_execution(|info| info.handle == handle)
            > 0
    }

    pub fn exhaustion_remaining(&self, actor: CreatureId, category: ExhaustionType) -> Duration {
        self.scheduler.exhaustion().remaining(actor, category, self.now)
    }

    /// Forgets all cooldowns of `actor`.
    pub fn clear_exhaustion(&self, actor: CreatureId) {
        self.scheduler.exhaustion().clear_actor(actor);
    }

    /// Queues a notification for dispatch after this execution succeeds.
    pub fn notify(&mut self, notification: Box<dyn Notification>) {
        self.notifications.push(notification);
    }

    pub(crate) fn take_scheduled(&mut self) -> Vec<PendingSchedule> {
        std::mem::take(&mut self.scheduled)
    }

    pub(crate) fn take_notifications(&mut self) -> Vec<Box<dyn Notification>> {
        std::mem::take(&mut self.notifications)
    }
}
