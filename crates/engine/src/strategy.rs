// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-event-type aggregation strategies
//!
//! A strategy folds events of its type into a [`BatchState`] and writes that
//! state out for one day at flush time. Types without a registered strategy
//! are dropped by the processor.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tally_core::{hash_user_id, Event, VIEW_EVENT};
use tally_storage::{SegmentStore, StorageError};

/// Aggregates accumulated over one batch, partitioned by UTC day
#[derive(Debug, Default)]
pub struct BatchState {
    pub views_by_day: BTreeMap<NaiveDate, BTreeMap<String, u64>>,
    pub users_by_day: BTreeMap<NaiveDate, BTreeSet<String>>,
}

impl BatchState {
    /// Every day touched by the batch, ascending
    pub fn days(&self) -> BTreeSet<NaiveDate> {
        self.views_by_day
            .keys()
            .chain(self.users_by_day.keys())
            .copied()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.views_by_day.is_empty() && self.users_by_day.is_empty()
    }
}

/// Aggregation behavior for one event type
pub trait EventStrategy: Send + Sync {
    /// The lowercase event type this strategy handles
    fn event_type(&self) -> &str;

    fn accumulate(&self, event: &Event, state: &mut BatchState);

    /// Persist this strategy's aggregates for `day`
    fn flush(
        &self,
        day: NaiveDate,
        state: &BatchState,
        segments: &SegmentStore,
    ) -> Result<(), StorageError>;
}

/// Counts views per video and records hashed users per day
#[derive(Debug, Default, Clone, Copy)]
pub struct ViewStrategy;

impl EventStrategy for ViewStrategy {
    fn event_type(&self) -> &str {
        VIEW_EVENT
    }

    fn accumulate(&self, event: &Event, state: &mut BatchState) {
        // Both ids are required to attribute a view
        if event.video_id.is_empty() || event.user_id.is_empty() {
            return;
        }

        let day = event.day_key();
        *state
            .views_by_day
            .entry(day)
            .or_default()
            .entry(event.video_id.clone())
            .or_default() += 1;
        state
            .users_by_day
            .entry(day)
            .or_default()
            .insert(hash_user_id(&event.user_id));
    }

    fn flush(
        &self,
        day: NaiveDate,
        state: &BatchState,
        segments: &SegmentStore,
    ) -> Result<(), StorageError> {
        let no_views = BTreeMap::new();
        let no_users = BTreeSet::new();
        segments.append_aggregates(
            day,
            state.views_by_day.get(&day).unwrap_or(&no_views),
            state.users_by_day.get(&day).unwrap_or(&no_users),
        )
    }
}

/// Accepts an event type without aggregating it
#[derive(Debug, Clone)]
pub struct NoopStrategy {
    event_type: String,
}

impl NoopStrategy {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
        }
    }
}

impl EventStrategy for NoopStrategy {
    fn event_type(&self) -> &str {
        &self.event_type
    }

    fn accumulate(&self, _event: &Event, _state: &mut BatchState) {}

    fn flush(
        &self,
        _day: NaiveDate,
        _state: &BatchState,
        _segments: &SegmentStore,
    ) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Event types accepted but not yet aggregated
pub const PLACEHOLDER_EVENTS: [&str; 3] = ["search", "like", "comment"];

/// Strategies keyed by event type
pub struct StrategyRegistry {
    strategies: BTreeMap<String, Box<dyn EventStrategy>>,
}

impl StrategyRegistry {
    /// An empty registry; every event type is dropped
    pub fn empty() -> Self {
        Self {
            strategies: BTreeMap::new(),
        }
    }

    /// Register a strategy, replacing any previous one for the same type
    pub fn register(mut self, strategy: impl EventStrategy + 'static) -> Self {
        self.strategies
            .insert(strategy.event_type().to_string(), Box::new(strategy));
        self
    }

    pub fn get(&self, event_type: &str) -> Option<&dyn EventStrategy> {
        self.strategies.get(event_type).map(|s| s.as_ref())
    }

    /// Registered event types in flush order
    pub fn event_types(&self) -> Vec<String> {
        self.strategies.keys().cloned().collect()
    }

    /// Fold `event` into `state`; false when no strategy handles its type
    pub fn accumulate(&self, event: &Event, state: &mut BatchState) -> bool {
        match self.get(&event.kind) {
            Some(strategy) => {
                strategy.accumulate(event, state);
                true
            }
            None => false,
        }
    }

    /// Flush every strategy for `day`, stopping at the first failure
    pub fn flush_day(
        &self,
        day: NaiveDate,
        state: &BatchState,
        segments: &SegmentStore,
    ) -> Result<(), StorageError> {
        for strategy in self.strategies.values() {
            strategy.flush(day, state, segments)?;
        }
        Ok(())
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        PLACEHOLDER_EVENTS
            .into_iter()
            .fold(Self::empty().register(ViewStrategy), |registry, kind| {
                registry.register(NoopStrategy::new(kind))
            })
    }
}

#[cfg(test)]
#[path = "strategy_tests.rs"]
mod tests;
