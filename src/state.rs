//! Element state readings and the classification of group members by state.
//!
//! A state here is an *observed* hardware condition, not a transition-guarded
//! machine: any state may follow any other, because it reflects what the
//! controller last reported. Absence of a reading is modelled as
//! `Option<State>::None` and is distinct from [`State::Unknown`].

use crate::types::ElementId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Observed condition of an element or group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    /// Idle and ready.
    On,
    /// A motion or acquisition is in progress.
    Moving,
    /// Hardware reported a fault.
    Fault,
    /// Hardware reported an alarm condition (e.g. limit switch).
    Alarm,
    /// The controller could not determine the state.
    Unknown,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::On => "On",
            State::Moving => "Moving",
            State::Fault => "Fault",
            State::Alarm => "Alarm",
            State::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// A normalized `(state, status)` reading for one element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateInfo {
    /// The observed state.
    pub state: State,
    /// Human-readable status text, non-empty whenever the state is known.
    pub status: String,
}

impl StateInfo {
    /// Builds a reading from a state and status text.
    pub fn new(state: State, status: impl Into<String>) -> Self {
        Self {
            state,
            status: status.into(),
        }
    }
}

/// Raw state reply as produced by a controller.
///
/// Controllers are allowed to answer a state request in two shapes: a bare
/// state value, or a rich reply carrying status text and an extra payload.
/// [`RawStateInfo::normalize`] folds both into a [`StateInfo`] without
/// failing on either shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawStateInfo {
    /// Flat reply carrying only the state.
    Bare(State),
    /// Rich reply with controller status text and optional extra payload
    /// (per-axis data and the like, passed through untouched).
    Full {
        /// The observed state.
        state: State,
        /// Raw controller status text.
        status: String,
        /// Controller-specific extra payload.
        extra: Option<serde_json::Value>,
    },
}

impl RawStateInfo {
    /// Normalizes either reply shape into a reading for element `name`.
    ///
    /// A bare reply synthesizes the status as "`{name} is in {state}`".
    pub fn normalize(self, name: &str) -> StateInfo {
        match self {
            RawStateInfo::Bare(state) => StateInfo {
                state,
                status: format!("{name} is in {state}"),
            },
            RawStateInfo::Full { state, status, .. } => StateInfo { state, status },
        }
    }
}

/// Classification of group members by their last observed state.
///
/// Derived and recomputable; overwritten wholesale on every aggregation
/// pass. The `None` bucket holds members with no reading yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateStats {
    buckets: HashMap<Option<State>, HashSet<ElementId>>,
}

impl StateStats {
    /// Records `id` under `state`.
    pub(crate) fn insert(&mut self, state: Option<State>, id: ElementId) {
        self.buckets.entry(state).or_default().insert(id);
    }

    /// The members last observed in `state`.
    pub fn elements_in(&self, state: Option<State>) -> Option<&HashSet<ElementId>> {
        self.buckets.get(&state)
    }

    /// How many members were last observed in `state`.
    pub fn count(&self, state: Option<State>) -> usize {
        self.buckets.get(&state).map_or(0, HashSet::len)
    }

    /// Total number of classified members.
    pub fn total(&self) -> usize {
        self.buckets.values().map(HashSet::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_reply_synthesizes_status() {
        let info = RawStateInfo::Bare(State::Moving).normalize("mot01");
        assert_eq!(info.state, State::Moving);
        assert_eq!(info.status, "mot01 is in Moving");
    }

    #[test]
    fn full_reply_passes_through() {
        let info = RawStateInfo::Full {
            state: State::Alarm,
            status: "upper limit switch active".into(),
            extra: Some(serde_json::json!({"limit": "upper"})),
        }
        .normalize("mot01");
        assert_eq!(info.state, State::Alarm);
        assert_eq!(info.status, "upper limit switch active");
    }

    #[test]
    fn stats_buckets_track_absent_readings_separately() {
        let mut stats = StateStats::default();
        stats.insert(Some(State::On), ElementId(1));
        stats.insert(Some(State::Unknown), ElementId(2));
        stats.insert(None, ElementId(3));

        assert_eq!(stats.count(Some(State::On)), 1);
        assert_eq!(stats.count(Some(State::Unknown)), 1);
        assert_eq!(stats.count(None), 1);
        assert_eq!(stats.total(), 3);
    }
}
