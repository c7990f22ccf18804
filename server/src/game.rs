//! The single dispatch loop.
//!
//! [`Game`] owns the world and is the only consumer of the event queue. It
//! pops due items in `(due, sequence)` order and runs each one to completion
//! before looking at the next, so operations never observe each other half
//! done. Producers on other tasks only ever touch the queue through their
//! [`Scheduler`] clones.

use crate::clock::{to_millis, Millis};
use crate::config::EngineConfig;
use crate::context::OperationContext;
use crate::dispatcher::{panic_message, Dispatcher, Outbound};
use crate::factory::{DefaultOperationFactory, OperationArgs, OperationFactory};
use crate::notification::Notification;
use crate::operation::{Operation, OperationError, Outcome};
use crate::pathfinding::{GreedyPathFinder, PathFinder};
use crate::queue::{ItemInfo, Payload, ScheduledItem};
use crate::scheduler::Scheduler;
use crate::world::World;
use log::{debug, error, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

pub struct Game {
    world: World,
    scheduler: Scheduler,
    dispatcher: Dispatcher,
    factory: Arc<dyn OperationFactory>,
    pathfinder: Box<dyn PathFinder>,
    config: EngineConfig,
    rng: StdRng,
}

impl Game {
    pub fn new(config: EngineConfig, scheduler: Scheduler, outbound: Arc<dyn Outbound>) -> Self {
        Self {
            world: config.build_world(),
            scheduler,
            dispatcher: Dispatcher::new(outbound),
            factory: Arc::new(DefaultOperationFactory::new(config.clone())),
            pathfinder: Box::new(GreedyPathFinder),
            config,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_factory(mut self, factory: Arc<dyn OperationFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_pathfinder(mut self, pathfinder: Box<dyn PathFinder>) -> Self {
        self.pathfinder = pathfinder;
        self
    }

    /// Makes combat rolls, spawn placement and wandering reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn factory(&self) -> Arc<dyn OperationFactory> {
        Arc::clone(&self.factory)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Starts one repeating spawn wave per configured spawn point.
    pub fn schedule_spawns(&self) -> Result<usize, OperationError> {
        for point in &self.config.spawn_points {
            let spawn = self.factory.create(OperationArgs::Spawn {
                point: point.clone(),
            })?;
            self.scheduler.schedule(spawn, Duration::ZERO);
        }
        Ok(self.config.spawn_points.len())
    }

    /// Processes everything due at the current time. Returns how many items
    /// were taken off the queue.
    pub fn run_pending(&mut self) -> usize {
        let mut processed = 0;
        while !self.scheduler.is_shut_down() {
            let now = self.scheduler.current_time();
            match self.scheduler.pop_due(now) {
                Some(item) => {
                    self.process(item, now);
                    processed += 1;
                }
                None => break,
            }
        }
        processed
    }

    /// Runs until [`Scheduler::shutdown`] is called, sleeping until the next
    /// item is due or a producer inserts something new.
    pub async fn run(&mut self) {
        info!("Dispatch loop started");
        let scheduler = self.scheduler.clone();

        loop {
            if scheduler.is_shut_down() {
                break;
            }
            self.run_pending();
            if scheduler.is_shut_down() {
                break;
            }

            match scheduler.next_due() {
                Some(due) => {
                    let wait = Duration::from_millis(due.saturating_sub(scheduler.current_time()));
                    tokio::select! {
                        _ = scheduler.queue().notified() => {}
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
                None => scheduler.queue().notified().await,
            }
        }

        info!(
            "Dispatch loop stopped with {} items still pending",
            scheduler.pending_count()
        );
    }

    fn process(&mut self, item: ScheduledItem, now: Millis) {
        let ScheduledItem { info, payload, .. } = item;
        match payload {
            Payload::Notification(notification) => {
                self.scheduler.finish(info.handle);
                self.dispatcher.dispatch(&self.world, notification.as_ref());
            }
            Payload::Operation(operation) => self.execute(info, operation, now),
        }
    }

    fn execute(&mut self, info: ItemInfo, mut operation: Box<dyn Operation>, now: Millis) {
        let Game {
            world,
            scheduler,
            dispatcher,
            factory,
            pathfinder,
            config,
            rng,
        } = self;

        // Never run early: an actor that is still exhausted waits it out
        // under the same handle.
        let wait = scheduler.throttle_delay(operation.as_ref());
        if !wait.is_zero() {
            if scheduler.finish(info.handle).cancelled {
                debug!("{} {} cancelled before it could run", info.kind, info.handle);
                return;
            }
            debug!(
                "Creature {} still exhausted, deferring {} {} by {:?}",
                info.requestor, info.kind, info.handle, wait
            );
            scheduler.enqueue(
                info.handle,
                Payload::Operation(operation),
                now.saturating_add(to_millis(wait)),
            );
            return;
        }

        let mut ctx = OperationContext::new(
            &mut *world,
            &*scheduler,
            &**factory,
            &**pathfinder,
            &*config,
            &mut *rng,
            now,
            info.handle,
        );
        let result = panic::catch_unwind(AssertUnwindSafe(|| operation.execute(&mut ctx)));
        let scheduled = ctx.take_scheduled();
        let notifications = ctx.take_notifications();
        drop(ctx);
        let retired = scheduler.finish(info.handle);

        let outcome = match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(
                    "{} {} of creature {} failed: {}",
                    info.kind, info.handle, info.requestor, e
                );
                return;
            }
            Err(payload) => {
                error!(
                    "{} {} of creature {} panicked: {}",
                    info.kind,
                    info.handle,
                    info.requestor,
                    panic_message(payload.as_ref())
                );
                return;
            }
        };

        match outcome {
            Outcome::Completed => scheduler
                .exhaustion()
                .apply_all(info.requestor, &operation.exhaustion_info(), now),
            Outcome::Skipped => debug!(
                "{} {} of creature {} skipped: {}",
                info.kind,
                info.handle,
                info.requestor,
                operation.describe()
            ),
        }

        for pending in scheduled {
            if !retired.keeps(pending.handle) {
                debug!(
                    "Discarding {} {} cancelled before {} {} committed it",
                    pending.operation.kind(),
                    pending.handle,
                    info.kind,
                    info.handle
                );
                continue;
            }
            let mut delay = pending.delay;
            if pending.throttled {
                delay = delay.saturating_add(scheduler.exhaustion().remaining_for(
                    pending.operation.requestor(),
                    &pending.operation.exhaustion_info(),
                    now,
                ));
            }
            scheduler.enqueue(
                pending.handle,
                Payload::Operation(pending.operation),
                now.saturating_add(to_millis(delay)),
            );
        }

        dispatch_all(dispatcher, world, notifications);

        match operation.repeat_after() {
            Some(after) if !after.is_zero() && !retired.cancelled => {
                scheduler.enqueue(
                    info.handle,
                    Payload::Operation(operation),
                    now.saturating_add(to_millis(after)),
                );
            }
            Some(after) if !after.is_zero() => {
                debug!("{} {} cancelled while running, not repeating", info.kind, info.handle);
            }
            _ => {}
        }
    }
}

fn dispatch_all(dispatcher: &Dispatcher, world: &World, notifications: Vec<Box<dyn Notification>>) {
    for notification in notifications {
        dispatcher.dispatch(world, notification.as_ref());
    }
}
