//! Base element machinery: state caching, locking and operation claims.
//!
//! [`BaseElement`] carries everything every pool-managed object shares: the
//! reentrant per-element lock, the cached `(state, status)` pair with its
//! edge-triggered event bookkeeping, the simulation-mode and stop/abort
//! latches, the operation claim slot and the action-cache registration.
//! Concrete kinds embed it and implement [`Element`], overriding the few
//! hooks that differ per kind (default attribute, state derivation,
//! physical footprint).

use crate::action::ActionCache;
use crate::error::{PoolError, Result};
use crate::event::{
    Event, EventEmitter, EventKind, EventListener, EventType, EventValue, SubscriptionId,
};
use crate::group::PhysicalIndex;
use crate::operation::Operation;
use crate::state::{State, StateInfo};
use crate::types::{ControllerId, ElementId, ElementKind};
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Guard over an element's reentrant lock.
///
/// The same thread may re-acquire the lock while holding it; two different
/// threads serialize. Releasing happens on drop, so a double unlock is
/// unrepresentable.
pub type ElementGuard<'a> = ReentrantMutexGuard<'a, ()>;

/// Serializable snapshot of an element's identity and cached condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementSnapshot {
    /// Short element name.
    pub name: String,
    /// Fully qualified name (device name or source string).
    pub full_name: String,
    /// Pool-assigned id.
    pub id: ElementId,
    /// Element kind.
    pub kind: ElementKind,
    /// Cached state, if any reading happened yet.
    pub state: Option<State>,
    /// Cached status, if any reading happened yet.
    pub status: Option<String>,
}

/// The coordination contract every pool-managed object satisfies.
///
/// Most operations have default implementations over [`Element::base`];
/// concrete kinds override the hooks that differ (kind, default attribute,
/// state derivation, physical footprint, the action-cache slot for
/// composites).
pub trait Element: fmt::Debug + Send + Sync {
    /// Shared base machinery.
    fn base(&self) -> &BaseElement;

    /// Element kind, fixed per concrete type.
    fn kind(&self) -> ElementKind;

    // ------------------------------------------------------------------
    // identity
    // ------------------------------------------------------------------

    /// Short element name.
    fn name(&self) -> &str {
        self.base().name()
    }

    /// Fully qualified name.
    fn full_name(&self) -> &str {
        self.base().full_name()
    }

    /// Pool-assigned id.
    fn id(&self) -> ElementId {
        self.base().id()
    }

    // ------------------------------------------------------------------
    // locking
    // ------------------------------------------------------------------

    /// Acquires this element's lock, blocking until available.
    fn lock(&self) -> ElementGuard<'_> {
        self.base().lock()
    }

    /// Acquires this element's lock without blocking.
    fn try_lock(&self) -> Option<ElementGuard<'_>> {
        self.base().try_lock()
    }

    // ------------------------------------------------------------------
    // action cache
    // ------------------------------------------------------------------

    /// The action cache this element is registered with, if any.
    fn action_cache(&self) -> Option<Arc<dyn ActionCache>> {
        self.base().action_cache()
    }

    /// (Re)homes this element onto `cache`.
    fn set_action_cache(&self, cache: Option<Arc<dyn ActionCache>>) {
        self.base().set_action_cache(cache);
    }

    // ------------------------------------------------------------------
    // state
    // ------------------------------------------------------------------

    /// Derives the published state information from a raw reading.
    ///
    /// The base shape is "`{name} is {state}`" on the first line followed
    /// by the raw controller status.
    fn calculate_state_info(&self, info: StateInfo) -> StateInfo {
        self.base().standard_state_info(info)
    }

    /// Returns the element state.
    ///
    /// With `cache` set and a cached value present, returns it without
    /// touching hardware. Otherwise performs [`Element::read_state_info`]
    /// and updates the caches first. `propagate` follows the event rules of
    /// [`BaseElement::set_state_value`].
    fn get_state(&self, cache: bool, propagate: i32) -> Result<State> {
        if !cache || self.base().inspect_state().is_none() {
            let info = self.read_state_info()?;
            self.set_state_info(info, propagate);
        }
        self.base()
            .inspect_state()
            .ok_or_else(|| PoolError::MissingReading {
                element: self.name().to_string(),
            })
    }

    /// Returns the element status, with the same cache/propagate contract
    /// as [`Element::get_state`].
    fn get_status(&self, cache: bool, propagate: i32) -> Result<String> {
        if !cache || self.base().inspect_status().is_none() {
            let info = self.read_state_info()?;
            self.set_state_info(info, propagate);
        }
        self.base()
            .inspect_status()
            .ok_or_else(|| PoolError::MissingReading {
                element: self.name().to_string(),
            })
    }

    /// Cached state; never triggers hardware I/O.
    fn inspect_state(&self) -> Option<State> {
        self.base().inspect_state()
    }

    /// Cached status; never triggers hardware I/O.
    fn inspect_status(&self) -> Option<String> {
        self.base().inspect_status()
    }

    /// Runs `calculate_state_info` on a raw reading and updates both caches
    /// (status first, then state), each edge-triggered independently.
    fn set_state_info(&self, info: StateInfo, propagate: i32) {
        let derived = self.calculate_state_info(info);
        self.base().apply_state_info(derived, propagate);
    }

    /// Performs a serialized consolidated read through this element's
    /// action cache and normalizes the raw controller reply.
    fn read_state_info(&self) -> Result<StateInfo> {
        let cache = self.action_cache().ok_or_else(|| PoolError::NoActionCache {
            element: self.name().to_string(),
        })?;
        let mut readings = cache.read_state_info(true)?;
        let raw = readings
            .remove(&self.id())
            .ok_or_else(|| PoolError::MissingReading {
                element: self.name().to_string(),
            })?;
        Ok(raw.normalize(self.name()))
    }

    // ------------------------------------------------------------------
    // stop / abort
    // ------------------------------------------------------------------

    /// Latches the stop marker. Does not talk to hardware by itself.
    fn stop(&self) {
        self.base().latch_stopped();
    }

    /// Latches the abort marker. Does not talk to hardware by itself.
    fn abort(&self) {
        self.base().latch_aborted();
    }

    /// Whether a stop was requested since the last claim.
    fn was_stopped(&self) -> bool {
        self.base().was_stopped()
    }

    /// Whether an abort was requested since the last claim.
    fn was_aborted(&self) -> bool {
        self.base().was_aborted()
    }

    /// Whether the in-flight action ended by an abort or stop.
    fn was_interrupted(&self) -> bool {
        self.was_aborted() || self.was_stopped()
    }

    // ------------------------------------------------------------------
    // operation claims
    // ------------------------------------------------------------------

    /// The operation presently claiming this element, if any.
    fn get_operation(&self) -> Option<Arc<Operation>> {
        self.base().operation()
    }

    /// Claims or releases this element.
    ///
    /// Passing `None` always succeeds. Passing a token while any claim is
    /// live fails with [`PoolError::AlreadyInOperation`], leaving the
    /// existing claim untouched. A successful claim resets the
    /// stop/abort latches.
    fn set_operation(&self, operation: Option<Arc<Operation>>) -> Result<()> {
        self.base().set_operation(operation)
    }

    /// Releases any claim on this element.
    fn clear_operation(&self) {
        self.base().clear_operation();
    }

    /// Whether this element is involved in any operation.
    fn is_in_operation(&self) -> bool {
        self.get_operation().is_some()
    }

    /// Whether this element's current operation is the one run by its own
    /// action cache.
    fn is_in_local_operation(&self) -> bool {
        match (self.get_operation(), self.action_cache()) {
            (Some(op), Some(cache)) => Operation::same(&op, &cache.operation()),
            _ => false,
        }
    }

    /// Whether this element's action cache is currently driving an action.
    fn is_action_running(&self) -> bool {
        self.action_cache().is_some_and(|cache| cache.is_running())
    }

    // ------------------------------------------------------------------
    // attributes
    // ------------------------------------------------------------------

    /// Name of the attribute used by default motion/acquisition paths.
    ///
    /// Erroring here is a configuration defect: every concrete kind that
    /// participates in acquisition or motion must override it.
    fn default_attribute(&self) -> Result<&str> {
        Err(PoolError::NoDefaultAttribute {
            element: self.name().to_string(),
            kind: self.kind(),
        })
    }

    /// Name of the channel used by default acquisition paths.
    fn default_acquisition_channel(&self) -> Result<String> {
        Ok(self.default_attribute()?.to_string())
    }

    // ------------------------------------------------------------------
    // simulation mode
    // ------------------------------------------------------------------

    /// Current simulation-mode flag.
    fn simulation_mode(&self) -> bool {
        self.base().simulation_mode()
    }

    /// Updates the simulation-mode flag, firing an event on change.
    fn set_simulation_mode(&self, mode: bool, propagate: i32) {
        self.base().set_simulation_mode(mode, propagate);
    }

    // ------------------------------------------------------------------
    // events
    // ------------------------------------------------------------------

    /// Registers a change-event listener on this element.
    fn subscribe(&self, listener: EventListener) -> SubscriptionId {
        self.base().emitter().subscribe(listener)
    }

    /// Removes a change-event subscription.
    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.base().emitter().unsubscribe(id)
    }

    // ------------------------------------------------------------------
    // composition hooks
    // ------------------------------------------------------------------

    /// Controller owning this element, for physical kinds.
    fn controller_id(&self) -> Option<ControllerId> {
        None
    }

    /// Flattened index of leaf hardware channels reachable through this
    /// element. Leaf physical elements index themselves; composites return
    /// their already-computed index; other kinds have no footprint.
    fn physical_index(&self) -> Result<PhysicalIndex> {
        Ok(PhysicalIndex::default())
    }

    /// Whether `id` is this element or reachable through its members.
    fn contains_element(&self, id: ElementId) -> bool {
        id == self.id()
    }

    /// Serializable snapshot of identity and cached condition.
    fn snapshot(&self) -> ElementSnapshot {
        self.base().snapshot_with(self.kind())
    }
}

/// Shared machinery embedded by every concrete element kind.
pub struct BaseElement {
    name: String,
    full_name: String,
    id: ElementId,
    // High-level operation lock: monitoring, motion or acquisition.
    lock: ReentrantMutex<()>,
    state: RwLock<Option<State>>,
    status: RwLock<Option<String>>,
    // Last values an event was fired for; the edge-trigger reference.
    state_event: Mutex<Option<State>>,
    status_event: Mutex<Option<String>>,
    simulation_mode: AtomicBool,
    stopped: AtomicBool,
    aborted: AtomicBool,
    operation: Mutex<Option<Arc<Operation>>>,
    action_cache: RwLock<Option<Arc<dyn ActionCache>>>,
    emitter: EventEmitter,
}

impl BaseElement {
    /// Builds the machinery for an element named `name`.
    pub fn new(name: impl Into<String>, full_name: impl Into<String>, id: ElementId) -> Self {
        Self {
            name: name.into(),
            full_name: full_name.into(),
            id,
            lock: ReentrantMutex::new(()),
            state: RwLock::new(None),
            status: RwLock::new(None),
            state_event: Mutex::new(None),
            status_event: Mutex::new(None),
            simulation_mode: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            aborted: AtomicBool::new(false),
            operation: Mutex::new(None),
            action_cache: RwLock::new(None),
            emitter: EventEmitter::new(),
        }
    }

    /// Short element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully qualified name.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Pool-assigned id.
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// Acquires the element lock, blocking until available.
    pub fn lock(&self) -> ElementGuard<'_> {
        self.lock.lock()
    }

    /// Acquires the element lock without blocking.
    pub fn try_lock(&self) -> Option<ElementGuard<'_>> {
        self.lock.try_lock()
    }

    /// The action cache this element is registered with, if any.
    pub fn action_cache(&self) -> Option<Arc<dyn ActionCache>> {
        self.action_cache.read().clone()
    }

    /// Stores the action-cache registration.
    pub fn set_action_cache(&self, cache: Option<Arc<dyn ActionCache>>) {
        *self.action_cache.write() = cache;
    }

    /// The event emitter of this element.
    pub fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }

    /// Cached state.
    pub fn inspect_state(&self) -> Option<State> {
        *self.state.read()
    }

    /// Cached status.
    pub fn inspect_status(&self) -> Option<String> {
        self.status.read().clone()
    }

    /// Standard derived status: "`{name} is {state}`" plus the raw text.
    pub(crate) fn standard_state_info(&self, info: StateInfo) -> StateInfo {
        let status = format!("{} is {}\n{}", self.name, info.state, info.status);
        StateInfo {
            state: info.state,
            status,
        }
    }

    /// Updates both caches from derived state information, status first,
    /// then state, each edge-triggered independently.
    pub fn apply_state_info(&self, info: StateInfo, propagate: i32) {
        self.set_status_value(info.status, propagate);
        self.set_state_value(info.state, propagate);
    }

    /// Updates the state cache.
    ///
    /// With `propagate > 0`, fires a state event iff the value differs from
    /// the last value an event was fired for; `propagate > 1` marks the
    /// event as priority.
    pub fn set_state_value(&self, state: State, propagate: i32) {
        *self.state.write() = Some(state);
        if propagate <= 0 {
            return;
        }
        {
            let mut last = self.state_event.lock();
            if *last == Some(state) {
                return;
            }
            *last = Some(state);
        }
        self.fire(EventKind::State, EventValue::State(state), propagate);
    }

    /// Updates the status cache, with the same event rule as
    /// [`BaseElement::set_state_value`].
    pub fn set_status_value(&self, status: String, propagate: i32) {
        *self.status.write() = Some(status.clone());
        if propagate <= 0 {
            return;
        }
        {
            let mut last = self.status_event.lock();
            if last.as_deref() == Some(status.as_str()) {
                return;
            }
            *last = Some(status.clone());
        }
        self.fire(EventKind::Status, EventValue::Status(status), propagate);
    }

    /// Current simulation-mode flag.
    pub fn simulation_mode(&self) -> bool {
        self.simulation_mode.load(Ordering::SeqCst)
    }

    /// Updates the simulation-mode flag; fires an event on actual change.
    pub fn set_simulation_mode(&self, mode: bool, propagate: i32) {
        let previous = self.simulation_mode.swap(mode, Ordering::SeqCst);
        if propagate <= 0 || previous == mode {
            return;
        }
        self.fire(
            EventKind::SimulationMode,
            EventValue::SimulationMode(mode),
            propagate,
        );
    }

    /// Latches the stop marker.
    pub fn latch_stopped(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Latches the abort marker.
    pub fn latch_aborted(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested since the last claim.
    pub fn was_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Whether an abort was requested since the last claim.
    pub fn was_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// The operation presently claiming this element, if any.
    pub fn operation(&self) -> Option<Arc<Operation>> {
        self.operation.lock().clone()
    }

    /// Claims or releases this element; see [`Element::set_operation`].
    pub fn set_operation(&self, operation: Option<Arc<Operation>>) -> Result<()> {
        let mut slot = self.operation.lock();
        match operation {
            Some(token) => {
                if slot.is_some() {
                    return Err(PoolError::AlreadyInOperation {
                        element: self.name.clone(),
                    });
                }
                self.aborted.store(false, Ordering::SeqCst);
                self.stopped.store(false, Ordering::SeqCst);
                *slot = Some(token);
            }
            None => *slot = None,
        }
        Ok(())
    }

    /// Releases any claim on this element.
    pub fn clear_operation(&self) {
        *self.operation.lock() = None;
    }

    /// Serializable snapshot with the caller-supplied kind.
    pub fn snapshot_with(&self, kind: ElementKind) -> ElementSnapshot {
        ElementSnapshot {
            name: self.name.clone(),
            full_name: self.full_name.clone(),
            id: self.id,
            kind,
            state: self.inspect_state(),
            status: self.inspect_status(),
        }
    }

    fn fire(&self, kind: EventKind, value: EventValue, priority: i32) {
        let event = Event {
            source: self.id,
            source_name: self.name.clone(),
            evt_type: EventType::new(kind, priority),
            value,
        };
        self.emitter.fire(&event);
    }
}

impl fmt::Debug for BaseElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseElement")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("state", &self.inspect_state())
            .finish()
    }
}

/// A leaf element wrapping one physical hardware channel of a controller.
pub struct PhysicalElement {
    base: BaseElement,
    kind: ElementKind,
    controller: ControllerId,
    axis: u32,
}

impl PhysicalElement {
    /// Builds a physical element of `kind` on `controller`'s channel `axis`.
    ///
    /// Fails with [`PoolError::KindMismatch`] for non-physical kinds.
    pub fn new(
        kind: ElementKind,
        name: impl Into<String>,
        full_name: impl Into<String>,
        id: ElementId,
        controller: ControllerId,
        axis: u32,
    ) -> Result<Arc<Self>> {
        let name = name.into();
        if !kind.is_physical() {
            return Err(PoolError::KindMismatch {
                element: name,
                kind,
                expected: "a physical kind",
            });
        }
        Ok(Arc::new(Self {
            base: BaseElement::new(name, full_name, id),
            kind,
            controller,
            axis,
        }))
    }

    /// The controller channel index of this element.
    pub fn axis(&self) -> u32 {
        self.axis
    }
}

impl Element for PhysicalElement {
    fn base(&self) -> &BaseElement {
        &self.base
    }

    fn kind(&self) -> ElementKind {
        self.kind
    }

    fn controller_id(&self) -> Option<ControllerId> {
        Some(self.controller)
    }

    fn physical_index(&self) -> Result<PhysicalIndex> {
        let mut index = PhysicalIndex::default();
        index.insert(self.controller, self.base.id());
        Ok(index)
    }

    fn default_attribute(&self) -> Result<&str> {
        Ok(match self.kind {
            ElementKind::Motor => "position",
            _ => "value",
        })
    }
}

impl fmt::Debug for PhysicalElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicalElement")
            .field("name", &self.base.name())
            .field("id", &self.base.id())
            .field("kind", &self.kind)
            .field("controller", &self.controller)
            .field("axis", &self.axis)
            .finish()
    }
}
