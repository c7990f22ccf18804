//! Per-actor cooldown bookkeeping.
//!
//! Every (creature, [`ExhaustionType`]) pair has a "usable again at"
//! timestamp. The timestamp is written only after an operation has actually
//! executed and it never moves backward, so a cheap action performed right
//! after an expensive one cannot shorten the expensive one's cooldown.
//!
//! The tracker delays, it does not reject: callers turn the remaining time
//! into extra scheduling delay.

use crate::clock::{to_millis, Millis};
use parking_lot::RwLock;
use shared::{CreatureId, ExhaustionType, SYSTEM_ID};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Cooldown categories an operation requires before it runs, each with the
/// cost it imposes after running. A zero cost means "requires only".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExhaustionInfo {
    costs: BTreeMap<ExhaustionType, Duration>,
}

impl ExhaustionInfo {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn single(category: ExhaustionType, cost: Duration) -> Self {
        Self::none().with(category, cost)
    }

    pub fn with(mut self, category: ExhaustionType, cost: Duration) -> Self {
        self.costs.insert(category, cost);
        self
    }

    pub fn cost_of(&self, category: ExhaustionType) -> Option<Duration> {
        self.costs.get(&category).copied()
    }

    pub fn categories(&self) -> impl Iterator<Item = ExhaustionType> + '_ {
        self.costs.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ExhaustionType, Duration)> + '_ {
        self.costs.iter().map(|(category, cost)| (*category, *cost))
    }

    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }
}

/// Thread-safe record of when each actor may use each category again.
#[derive(Debug, Default)]
pub struct ExhaustionTracker {
    records: RwLock<HashMap<(CreatureId, ExhaustionType), Millis>>,
}

impl ExhaustionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored "usable again at" timestamp, if the actor ever used the category.
    pub fn usable_at(&self, actor: CreatureId, category: ExhaustionType) -> Option<Millis> {
        self.records.read().get(&(actor, category)).copied()
    }

    /// `max(0, usable_at - now)` for one category.
    pub fn remaining(&self, actor: CreatureId, category: ExhaustionType, now: Millis) -> Duration {
        self.usable_at(actor, category)
            .map(|until| Duration::from_millis(until.saturating_sub(now)))
            .unwrap_or(Duration::ZERO)
    }

    /// Longest remaining wait across every category `info` requires.
    /// The system actor is never throttled.
    pub fn remaining_for(&self, actor: CreatureId, info: &ExhaustionInfo, now: Millis) -> Duration {
        if actor == SYSTEM_ID || info.is_empty() {
            return Duration::ZERO;
        }
        let records = self.records.read();
        info.categories()
            .filter_map(|category| records.get(&(actor, category)))
            .map(|until| Duration::from_millis(until.saturating_sub(now)))
            .max()
            .unwrap_or(Duration::ZERO)
    }

    /// Records that `actor` spent `cost` of `category` at `now` and returns the
    /// resulting "usable again at" timestamp. Never shortens an existing record.
    pub fn apply(
        &self,
        actor: CreatureId,
        category: ExhaustionType,
        now: Millis,
        cost: Duration,
    ) -> Millis {
        let candidate = now.saturating_add(to_millis(cost));
        let mut records = self.records.write();
        let until = records.entry((actor, category)).or_insert(candidate);
        if *until < candidate {
            *until = candidate;
        }
        *until
    }

    /// Applies every non-zero cost in `info`.
    pub fn apply_all(&self, actor: CreatureId, info: &ExhaustionInfo, now: Millis) {
        if actor == SYSTEM_ID {
            return;
        }
        for (category, cost) in info.iter().filter(|(_, cost)| !cost.is_zero()) {
            self.apply(actor, category, now, cost);
        }
    }

    /// Forgets an actor entirely, e.g. after logout or death.
    pub fn clear_actor(&self, actor: CreatureId) {
        self.records.write().retain(|(id, _), _| *id != actor);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}
