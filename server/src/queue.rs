//! Time-ordered, thread-safe queue of scheduled work.
//!
//! Entries are ordered by `(due, sequence)`. The sequence number is assigned
//! at insertion, so entries due at the same millisecond pop in insertion
//! order regardless of how the heap breaks ties.
//!
//! Cancellation is lazy: a cancelled entry only has its flag set and stays in
//! the heap until its natural dequeue time, where [`EventQueue::pop_due`]
//! drops it. The flag is checked under the same lock that removes the entry,
//! so a cancelled entry can never be handed to the dispatch loop.
//!
//! The entry most recently handed out stays visible to cancellation until the
//! loop calls [`EventQueue::finish`], so a cancel that races with execution
//! still stops the operation from being rescheduled. Handles the executing
//! operation reserves for its follow-ups are tracked the same way: they are
//! not in the heap yet, but a cancel matching them is remembered and reported
//! on [`EventQueue::finish`] so the follow-up is never committed.

use crate::clock::Millis;
use crate::notification::Notification;
use crate::operation::Operation;
use log::trace;
use parking_lot::Mutex;
use shared::{CreatureId, OperationKind};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use tokio::sync::futures::Notified;
use tokio::sync::Notify;

/// Identifies one logical piece of scheduled work. A rescheduled operation
/// keeps its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

impl Handle {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a cancellation predicate gets to look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemInfo {
    pub handle: Handle,
    pub requestor: CreatureId,
    pub kind: OperationKind,
}

pub enum Payload {
    Operation(Box<dyn Operation>),
    /// Deferred notification; spectators resolve when it is dequeued.
    Notification(Box<dyn Notification>),
}

impl Payload {
    pub fn kind(&self) -> OperationKind {
        match self {
            Payload::Operation(operation) => operation.kind(),
            Payload::Notification(_) => OperationKind::Notification,
        }
    }

    pub fn requestor(&self) -> CreatureId {
        match self {
            Payload::Operation(operation) => operation.requestor(),
            Payload::Notification(notification) => notification.requestor(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Payload::Operation(operation) => operation.describe(),
            Payload::Notification(notification) => notification.describe(),
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[derive(Debug)]
pub struct ScheduledItem {
    pub info: ItemInfo,
    pub due: Millis,
    pub sequence: u64,
    cancelled: AtomicBool,
    pub payload: Payload,
}

impl ScheduledItem {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(AtomicOrdering::Acquire)
    }
}

// Reversed so the std max-heap pops the earliest (due, sequence) first.
impl Ord for ScheduledItem {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for ScheduledItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScheduledItem {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.sequence == other.sequence
    }
}

impl Eq for ScheduledItem {}

/// Entry handed to the dispatch loop and not yet retired.
#[derive(Debug)]
struct Executing {
    info: ItemInfo,
    cancelled: bool,
    /// Cancelled from outside the operation's own execution.
    revoked: bool,
    /// Reserved follow-ups and whether a cancel has matched them.
    follow_ups: Vec<(ItemInfo, bool)>,
}

/// How cancellation touched an entry between dequeue and retirement.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Retired {
    /// The entry itself was cancelled and must not repeat.
    pub cancelled: bool,
    /// The cancel came from a producer, so nothing it buffered may be committed.
    pub revoked: bool,
    /// Reserved follow-ups that a cancel matched.
    pub dropped: Vec<Handle>,
}

impl Retired {
    /// Whether the follow-up reserved under `handle` may still be committed.
    pub fn keeps(&self, handle: Handle) -> bool {
        !self.revoked && !self.dropped.contains(&handle)
    }
}

#[derive(Debug, Default)]
struct QueueState {
    heap: BinaryHeap<ScheduledItem>,
    next_sequence: u64,
    next_handle: u64,
    live: usize,
    executing: Option<Executing>,
}

#[derive(Debug, Default)]
pub struct EventQueue {
    state: Mutex<QueueState>,
    wakeup: Notify,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a handle without inserting anything yet.
    pub fn allocate_handle(&self) -> Handle {
        let mut state = self.state.lock();
        state.next_handle += 1;
        Handle(state.next_handle)
    }

    /// Reserves a handle for a follow-up of the executing entry. Until that
    /// entry is retired, cancels matching `requestor` and `kind` are recorded
    /// against the follow-up.
    pub fn reserve(&self, requestor: CreatureId, kind: OperationKind) -> Handle {
        let mut state = self.state.lock();
        state.next_handle += 1;
        let handle = Handle(state.next_handle);
        if let Some(executing) = state.executing.as_mut() {
            executing.follow_ups.push((
                ItemInfo {
                    handle,
                    requestor,
                    kind,
                },
                false,
            ));
        }
        handle
    }

    /// Inserts `payload` under `handle`, due at `due`, and wakes the dispatch loop.
    pub fn push(&self, handle: Handle, due: Millis, payload: Payload) {
        {
            let mut state = self.state.lock();
            let sequence = state.next_sequence;
            state.next_sequence += 1;
            state.live += 1;
            state.heap.push(ScheduledItem {
                info: ItemInfo {
                    handle,
                    requestor: payload.requestor(),
                    kind: payload.kind(),
                },
                due,
                sequence,
                cancelled: AtomicBool::new(false),
                payload,
            });
        }
        self.wakeup.notify_one();
    }

    /// Flags every pending entry matching `predicate`, including the executing
    /// entry and its reserved follow-ups. A matched executing entry is revoked:
    /// none of its buffered follow-ups will be committed. Returns how many were
    /// newly cancelled. The heap itself is left untouched.
    ///
    /// `predicate` runs while the queue lock is held and must not call back
    /// into the queue.
    pub fn cancel<F>(&self, predicate: F) -> usize
    where
        F: Fn(&ItemInfo) -> bool,
    {
        self.cancel_matching(predicate, true)
    }

    /// Cancel issued by the executing operation itself. Unlike
    /// [`cancel`](Self::cancel), matching the executing entry only stops its
    /// repeat; follow-ups it reserves are still committed unless matched.
    pub fn cancel_from_execution<F>(&self, predicate: F) -> usize
    where
        F: Fn(&ItemInfo) -> bool,
    {
        self.cancel_matching(predicate, false)
    }

    fn cancel_matching<F>(&self, predicate: F, external: bool) -> usize
    where
        F: Fn(&ItemInfo) -> bool,
    {
        let mut state = self.state.lock();
        let mut cancelled = state
            .heap
            .iter()
            .filter(|item| !item.is_cancelled() && predicate(&item.info))
            .filter(|item| !item.cancelled.swap(true, AtomicOrdering::AcqRel))
            .count();
        state.live -= cancelled;

        if let Some(executing) = state.executing.as_mut() {
            if predicate(&executing.info) {
                if !executing.cancelled {
                    executing.cancelled = true;
                    cancelled += 1;
                }
                executing.revoked |= external;
            }
            for (info, flagged) in executing.follow_ups.iter_mut() {
                if !*flagged && predicate(&*info) {
                    *flagged = true;
                    cancelled += 1;
                }
            }
        }
        cancelled
    }

    /// Removes and returns the earliest live entry due at or before `now`,
    /// silently discarding cancelled entries on the way.
    pub fn pop_due(&self, now: Millis) -> Option<ScheduledItem> {
        let mut state = self.state.lock();
        loop {
            if state.heap.peek()?.due > now {
                return None;
            }
            let item = state.heap.pop()?;
            if item.is_cancelled() {
                trace!(
                    "Dropping cancelled {} {} of creature {}",
                    item.info.kind,
                    item.info.handle,
                    item.info.requestor
                );
                continue;
            }
            state.live -= 1;
            state.executing = Some(Executing {
                info: item.info,
                cancelled: false,
                revoked: false,
                follow_ups: Vec::new(),
            });
            return Some(item);
        }
    }

    /// Retires the entry last returned by [`pop_due`](Self::pop_due) and
    /// reports what cancellation did to it while it executed.
    pub fn finish(&self, handle: Handle) -> Retired {
        let mut state = self.state.lock();
        match state.executing.take() {
            Some(executing) if executing.info.handle == handle => Retired {
                cancelled: executing.cancelled,
                revoked: executing.revoked,
                dropped: executing
                    .follow_ups
                    .into_iter()
                    .filter(|(_, flagged)| *flagged)
                    .map(|(info, _)| info.handle)
                    .collect(),
            },
            other => {
                state.executing = other;
                Retired::default()
            }
        }
    }

    /// Due time of the earliest entry in the heap, cancelled or not.
    pub fn next_due(&self) -> Option<Millis> {
        self.state.lock().heap.peek().map(|item| item.due)
    }

    /// Number of entries that are neither cancelled nor dequeued.
    pub fn len(&self) -> usize {
        self.state.lock().live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Heap size including cancelled entries still waiting to be dropped.
    pub fn heap_len(&self) -> usize {
        self.state.lock().heap.len()
    }

    pub fn notified(&self) -> Notified<'_> {
        self.wakeup.notified()
    }

    pub fn wake(&self) {
        self.wakeup.notify_one();
    }
}
