//! Change-event machinery.
//!
//! Elements and groups publish state, status and simulation-mode changes
//! through an [`EventEmitter`]. Listeners register explicitly and are
//! removed with an explicit [`EventEmitter::unsubscribe`] call keyed by the
//! returned [`SubscriptionId`]; nothing here depends on garbage-collected
//! weak references. This layer only decides *whether* an event fires, never
//! how downstream delivery happens.

use crate::state::State;
use crate::types::ElementId;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// What changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The element state cache changed.
    State,
    /// The element status cache changed.
    Status,
    /// The simulation-mode flag changed.
    SimulationMode,
}

/// An event kind together with its delivery priority.
///
/// The priority is the `propagate` value of the call that produced the
/// event. `0` suppresses the event entirely; values above `1` mark the
/// event for faster downstream delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventType {
    /// What changed.
    pub kind: EventKind,
    /// Delivery priority.
    pub priority: i32,
}

impl EventType {
    /// Builds an event type.
    pub fn new(kind: EventKind, priority: i32) -> Self {
        Self { kind, priority }
    }

    /// Whether downstream delivery should treat this as a priority event.
    pub fn is_priority(&self) -> bool {
        self.priority > 1
    }
}

/// The changed value carried by an event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventValue {
    /// New state.
    State(State),
    /// New status text.
    Status(String),
    /// New simulation-mode flag.
    SimulationMode(bool),
}

/// A change event fired by an element or group.
#[derive(Debug, Clone)]
pub struct Event {
    /// Id of the firing element.
    pub source: ElementId,
    /// Name of the firing element.
    pub source_name: String,
    /// Kind and priority.
    pub evt_type: EventType,
    /// The changed value.
    pub value: EventValue,
}

/// Callback invoked for every event fired by the emitter it subscribed to.
pub type EventListener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Handle identifying one subscription on one emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Explicit subscription table for change events.
///
/// Listeners are invoked synchronously on the thread that fired the event,
/// from a snapshot of the table, so a listener may subscribe or unsubscribe
/// (itself included) without deadlocking.
#[derive(Default)]
pub struct EventEmitter {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(SubscriptionId, EventListener)>>,
}

impl EventEmitter {
    /// Creates an emitter with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` and returns the handle needed to remove it.
    pub fn subscribe(&self, listener: EventListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    /// Removes the subscription `id`. Returns whether it was present.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(sub, _)| *sub != id);
        listeners.len() != before
    }

    /// Whether anybody is listening.
    pub fn has_listeners(&self) -> bool {
        !self.listeners.read().is_empty()
    }

    /// Delivers `event` to every listener, in subscription order.
    pub fn fire(&self, event: &Event) {
        let snapshot: Vec<EventListener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}
