//! Producer-facing scheduling surface.
//!
//! A [`Scheduler`] is a cheap, cloneable handle over the shared clock, event
//! queue and exhaustion tracker. Every connection task and internal timer
//! holds one; the single dispatch loop in [`Game`](crate::game::Game) holds
//! another and is the only consumer.

use crate::clock::{to_millis, Clock, Millis};
use crate::exhaustion::ExhaustionTracker;
use crate::notification::Notification;
use crate::operation::Operation;
use crate::queue::{EventQueue, Handle, ItemInfo, Payload, Retired, ScheduledItem};
use log::{debug, info};
use shared::{CreatureId, OperationKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct Scheduler {
    clock: Arc<dyn Clock>,
    queue: Arc<EventQueue>,
    exhaustion: Arc<ExhaustionTracker>,
    shutdown: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            queue: Arc::new(EventQueue::new()),
            exhaustion: Arc::new(ExhaustionTracker::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn current_time(&self) -> Millis {
        self.clock.now()
    }

    pub fn exhaustion(&self) -> &ExhaustionTracker {
        &self.exhaustion
    }

    pub(crate) fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// Runs `operation` at `now + delay`.
    pub fn schedule(&self, operation: Box<dyn Operation>, delay: Duration) -> Handle {
        let due = self.current_time().saturating_add(to_millis(delay));
        self.schedule_at(operation, due)
    }

    /// Runs `operation` at the absolute time `due`; a due time in the past
    /// is clamped to now.
    pub fn schedule_at(&self, operation: Box<dyn Operation>, due: Millis) -> Handle {
        let handle = self.queue.allocate_handle();
        self.enqueue(handle, Payload::Operation(operation), due);
        handle
    }

    /// Like [`schedule`](Self::schedule), but first waits out whatever
    /// cooldown the requestor still has on the categories the operation
    /// requires.
    pub fn schedule_throttled(&self, operation: Box<dyn Operation>, delay: Duration) -> Handle {
        let delay = delay.saturating_add(self.throttle_delay(operation.as_ref()));
        self.schedule(operation, delay)
    }

    /// Remaining exhaustion the operation's requestor must wait out before it may run.
    pub fn throttle_delay(&self, operation: &dyn Operation) -> Duration {
        self.exhaustion.remaining_for(
            operation.requestor(),
            &operation.exhaustion_info(),
            self.current_time(),
        )
    }

    /// Dispatches `notification` at `now + delay`, resolving its spectators then.
    pub fn schedule_notification(
        &self,
        notification: Box<dyn Notification>,
        delay: Duration,
    ) -> Handle {
        let handle = self.queue.allocate_handle();
        let due = self.current_time().saturating_add(to_millis(delay));
        self.enqueue(handle, Payload::Notification(notification), due);
        handle
    }

    /// Re-inserts a payload under an existing handle (reschedules and
    /// exhaustion re-deferrals) or under a handle reserved earlier.
    pub(crate) fn enqueue(&self, handle: Handle, payload: Payload, due: Millis) {
        let due = due.max(self.current_time());
        debug!(
            "Scheduling {} {} of creature {} at {}",
            payload.kind(),
            handle,
            payload.requestor(),
            due
        );
        self.queue.push(handle, due, payload);
    }

    pub(crate) fn allocate_handle(&self) -> Handle {
        self.queue.allocate_handle()
    }

    /// Handle for a follow-up buffered by the executing operation.
    pub(crate) fn reserve(&self, operation: &dyn Operation) -> Handle {
        self.queue.reserve(operation.requestor(), operation.kind())
    }

    pub(crate) fn pop_due(&self, now: Millis) -> Option<ScheduledItem> {
        self.queue.pop_due(now)
    }

    pub(crate) fn finish(&self, handle: Handle) -> Retired {
        self.queue.finish(handle)
    }

    /// Cancels every pending item matching `predicate`; returns how many.
    /// Matching the executing item also discards everything it buffered.
    ///
    /// The predicate runs while the queue lock is held, so it must not call
    /// back into this scheduler or any clone of it.
    pub fn cancel<F>(&self, predicate: F) -> usize
    where
        F: Fn(&ItemInfo) -> bool,
    {
        self.queue.cancel(predicate)
    }

    /// Cancellation requested by the executing operation through its context.
    pub(crate) fn cancel_from_execution<F>(&self, predicate: F) -> usize
    where
        F: Fn(&ItemInfo) -> bool,
    {
        self.queue.cancel_from_execution(predicate)
    }

    /// Returns false when the handle is unknown or already ran.
    pub fn cancel_handle(&self, handle: Handle) -> bool {
        self.cancel(|info| info.handle == handle) > 0
    }

    pub fn cancel_all_for(&self, actor: CreatureId) -> usize {
        let cancelled = self.cancel(|info| info.requestor == actor);
        if cancelled > 0 {
            debug!("Cancelled {} pending items of creature {}", cancelled, actor);
        }
        cancelled
    }

    pub fn cancel_kind_for(&self, actor: CreatureId, kind: OperationKind) -> usize {
        self.cancel(|info| info.requestor == actor && info.kind == kind)
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    pub fn next_due(&self) -> Option<Millis> {
        self.queue.next_due()
    }

    /// Asks the dispatch loop to stop after the item it is running.
    pub fn shutdown(&self) {
        info!("Scheduler shutdown requested");
        self.shutdown.store(true, Ordering::SeqCst);
        self.queue.wake();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}
