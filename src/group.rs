//! Group machinery: membership, physical-element indexing and state
//! aggregation.
//!
//! A group coordinates an ordered list of members (elements, nested groups,
//! or external objects) as one unit. From its members it derives a
//! flattened [`PhysicalIndex`] of every distinct leaf hardware channel it
//! can reach, grouped by controller, which is what batched reads and
//! broadcast stop/abort operate on. Its consolidated `(state, status)` is
//! recomputed from member caches by [`BaseGroup::calculate_states`] and
//! never triggers hardware I/O by itself.

use crate::action::ActionCache;
use crate::element::{BaseElement, Element};
use crate::error::{PoolError, Result};
use crate::event::{Event, EventKind, EventListener};
use crate::operation::Operation;
use crate::pool::{ElementContainer, Pool};
use crate::state::{State, StateInfo, StateStats};
use crate::types::{ControllerId, ElementId, ElementKind};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// Reference to a group member before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserElementRef {
    /// Id of an element owned by the same pool.
    Internal(ElementId),
    /// Source string of an external object, resolved through the pool's
    /// name validator.
    External(String),
}

/// Flattened, deduplicated index of leaf hardware channels, grouped by
/// controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhysicalIndex {
    by_controller: HashMap<ControllerId, BTreeSet<ElementId>>,
    all: HashSet<ElementId>,
}

impl PhysicalIndex {
    /// Records `element` under `controller`. Returns whether it was new.
    pub fn insert(&mut self, controller: ControllerId, element: ElementId) -> bool {
        let fresh = self.all.insert(element);
        if fresh {
            self.by_controller
                .entry(controller)
                .or_default()
                .insert(element);
        }
        fresh
    }

    /// Merges another index into this one, keeping entries deduplicated.
    pub fn merge(&mut self, other: &PhysicalIndex) {
        for (controller, elements) in &other.by_controller {
            for element in elements {
                self.insert(*controller, *element);
            }
        }
    }

    /// O(1) membership test.
    pub fn contains(&self, element: ElementId) -> bool {
        self.all.contains(&element)
    }

    /// The flat set of every indexed element.
    pub fn ids(&self) -> &HashSet<ElementId> {
        &self.all
    }

    /// Iterates the per-controller buckets.
    pub fn iter_controllers(
        &self,
    ) -> impl Iterator<Item = (&ControllerId, &BTreeSet<ElementId>)> {
        self.by_controller.iter()
    }

    /// Number of distinct controllers indexed.
    pub fn controller_count(&self) -> usize {
        self.by_controller.len()
    }

    /// Number of distinct elements indexed.
    pub fn len(&self) -> usize {
        self.all.len()
    }

    /// Whether nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

/// Shared group machinery embedded by composite element kinds.
///
/// Holds the ordered member references, the resolved member list, the
/// physical-element index and the aggregation state. Resolution is lazy
/// and retried: if a referenced element does not exist yet, the group
/// stays `pending` and the next access rebuilds before doing anything
/// else.
pub struct BaseGroup {
    pool: Weak<Pool>,
    owner_id: ElementId,
    owner_name: String,
    managed: fn(ElementKind) -> bool,
    member_listener: Option<EventListener>,
    pending: AtomicBool,
    user_element_ids: RwLock<Vec<UserElementRef>>,
    user_elements: RwLock<Vec<Arc<dyn Element>>>,
    physical: RwLock<PhysicalIndex>,
    stats: RwLock<StateStats>,
    container: ElementContainer,
    action_cache: RwLock<Option<Arc<dyn ActionCache>>>,
    subscriptions: Mutex<Vec<(Arc<dyn Element>, crate::event::SubscriptionId)>>,
}

impl BaseGroup {
    /// Builds group machinery for the element `owner_id`/`owner_name`.
    ///
    /// `managed` decides which member kinds this group coordinates itself;
    /// everything else is resolved as an external object. The optional
    /// `member_listener` is subscribed on every managed member.
    pub fn new(
        pool: Weak<Pool>,
        owner_id: ElementId,
        owner_name: impl Into<String>,
        user_element_ids: Vec<UserElementRef>,
        member_listener: Option<EventListener>,
        managed: fn(ElementKind) -> bool,
    ) -> Self {
        Self {
            pool,
            owner_id,
            owner_name: owner_name.into(),
            managed,
            member_listener,
            pending: AtomicBool::new(true),
            user_element_ids: RwLock::new(user_element_ids),
            user_elements: RwLock::new(Vec::new()),
            physical: RwLock::new(PhysicalIndex::default()),
            stats: RwLock::new(StateStats::default()),
            container: ElementContainer::new(),
            action_cache: RwLock::new(None),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    fn pool(&self) -> Result<Arc<Pool>> {
        self.pool.upgrade().ok_or(PoolError::ContextDropped)
    }

    /// Whether the resolved views still need a (re)build.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    fn ensure_built(&self) -> Result<()> {
        if self.is_pending() {
            self.build_elements()
        } else {
            Ok(())
        }
    }

    /// Resolves every member reference and rebuilds the derived views.
    ///
    /// A reference to a not-yet-constructed element leaves the group
    /// pending and returns [`PoolError::UnresolvedMember`]; any later
    /// access retries. Internal references to elements this group kind
    /// does not manage are re-resolved as external objects through the
    /// pool's name validator.
    pub fn build_elements(&self) -> Result<()> {
        self.pending.store(true, Ordering::SeqCst);
        self.reset_views();
        let pool = self.pool()?;
        let refs = self.user_element_ids.read().clone();
        for user_ref in refs {
            let element = match self.resolve_ref(&pool, &user_ref) {
                Ok(element) => element,
                Err(err) => {
                    self.reset_views();
                    return Err(err);
                }
            };
            if let Err(err) = self.attach_member(element, None) {
                self.reset_views();
                return Err(err);
            }
        }
        self.pending.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn resolve_ref(
        &self,
        pool: &Arc<Pool>,
        user_ref: &UserElementRef,
    ) -> Result<Arc<dyn Element>> {
        match user_ref {
            UserElementRef::Internal(id) => {
                let element = pool
                    .get_element(*id)
                    .map_err(|_| PoolError::UnresolvedMember(*id))?;
                if element.kind().is_external() || !(self.managed)(element.kind()) {
                    // Not a kind this group coordinates itself (e.g. a bare
                    // channel referenced by a motor group): treat its source
                    // as an external object.
                    pool.resolve_external(element.full_name())
                } else {
                    Ok(element)
                }
            }
            UserElementRef::External(source) => pool.resolve_external(source),
        }
    }

    fn reset_views(&self) {
        for (element, sub) in self.subscriptions.lock().drain(..) {
            element.base().emitter().unsubscribe(sub);
        }
        self.container.clear();
        self.user_elements.write().clear();
        *self.physical.write() = PhysicalIndex::default();
        *self.stats.write() = StateStats::default();
    }

    // ------------------------------------------------------------------
    // membership
    // ------------------------------------------------------------------

    /// Adds a resolved member at `index` (default: end) and keeps the
    /// reference list in sync, so a later rebuild reproduces the same
    /// ordered membership.
    ///
    /// Duplicates and membership cycles are rejected with the group's
    /// views left untouched.
    pub fn add_user_element(
        &self,
        element: Arc<dyn Element>,
        index: Option<usize>,
    ) -> Result<usize> {
        self.ensure_built()?;
        let index = self.attach_member(Arc::clone(&element), index)?;
        let user_ref = if element.kind().is_external() {
            UserElementRef::External(element.full_name().to_string())
        } else {
            UserElementRef::Internal(element.id())
        };
        self.user_element_ids.write().insert(index, user_ref);
        Ok(index)
    }

    fn attach_member(&self, element: Arc<dyn Element>, index: Option<usize>) -> Result<usize> {
        {
            let members = self.user_elements.read();
            if members.iter().any(|member| member.id() == element.id()) {
                return Err(PoolError::DuplicateMember {
                    group: self.owner_name.clone(),
                    element: element.name().to_string(),
                });
            }
        }
        if element.contains_element(self.owner_id) {
            return Err(PoolError::MembershipCycle {
                group: self.owner_name.clone(),
                element: element.name().to_string(),
            });
        }

        let managed = !element.kind().is_external() && (self.managed)(element.kind());
        if managed {
            // The physical footprint must be computable before any view is
            // mutated, so a pending nested group rejects cleanly.
            let addition = element.physical_index()?;
            self.container.add(Arc::clone(&element))?;
            self.physical.write().merge(&addition);
        }

        let index = {
            let mut members = self.user_elements.write();
            let index = index.unwrap_or(members.len()).min(members.len());
            members.insert(index, Arc::clone(&element));
            index
        };

        if !managed {
            return Ok(index);
        }

        if let Some(cache) = self.action_cache.read().clone() {
            self.fill_action_cache(&cache);
        }
        if let Some(listener) = &self.member_listener {
            let sub = element.base().emitter().subscribe(Arc::clone(listener));
            self.subscriptions.lock().push((element, sub));
        }
        Ok(index)
    }

    /// Drops every resolved member: unsubscribes listeners, clears the
    /// container and derived views, forgets the action cache and leaves
    /// the group pending with an empty reference list.
    pub fn clear_user_elements(&self) {
        self.reset_views();
        *self.action_cache.write() = None;
        self.user_element_ids.write().clear();
        self.pending.store(true, Ordering::SeqCst);
    }

    /// Replaces the member reference list; the next access rebuilds.
    pub fn set_user_element_ids(&self, refs: Vec<UserElementRef>) {
        self.clear_user_elements();
        *self.user_element_ids.write() = refs;
    }

    /// The ordered member reference list.
    pub fn user_element_ids(&self) -> Vec<UserElementRef> {
        self.user_element_ids.read().clone()
    }

    /// The resolved ordered member list, rebuilding first if pending.
    pub fn user_elements(&self) -> Result<Vec<Arc<dyn Element>>> {
        self.ensure_built()?;
        Ok(self.user_elements.read().clone())
    }

    /// Default-attribute name of every member, in member order.
    pub fn user_element_attributes(&self) -> Result<Vec<(ElementId, String)>> {
        let mut attributes = Vec::new();
        for member in self.user_elements()? {
            attributes.push((member.id(), member.default_attribute()?.to_string()));
        }
        Ok(attributes)
    }

    /// Whether `id` is reachable through the currently resolved members.
    pub fn contains_element(&self, id: ElementId) -> bool {
        self.user_elements
            .read()
            .iter()
            .any(|member| member.contains_element(id))
    }

    // ------------------------------------------------------------------
    // physical index
    // ------------------------------------------------------------------

    /// Snapshot of the physical index, rebuilding first if pending.
    pub fn physical_elements(&self) -> Result<PhysicalIndex> {
        self.ensure_built()?;
        Ok(self.physical.read().clone())
    }

    /// Flat set of every reachable physical element.
    pub fn physical_elements_set(&self) -> Result<HashSet<ElementId>> {
        Ok(self.physical_elements()?.ids().clone())
    }

    fn resolve_physical(&self, pool: &Arc<Pool>) -> Vec<(ControllerId, Vec<Arc<dyn Element>>)> {
        let physical = self.physical.read().clone();
        let mut resolved = Vec::new();
        for (controller, ids) in physical.iter_controllers() {
            let mut elements = Vec::new();
            for id in ids {
                match pool.get_element(*id) {
                    Ok(element) => elements.push(element),
                    Err(_) => warn!(element = %id, "physical element vanished from pool"),
                }
            }
            resolved.push((*controller, elements));
        }
        resolved
    }

    // ------------------------------------------------------------------
    // action cache
    // ------------------------------------------------------------------

    /// The action cache this group drives its hardware actions through.
    pub fn action_cache(&self) -> Option<Arc<dyn ActionCache>> {
        self.action_cache.read().clone()
    }

    /// Re-homes this group onto `cache`.
    ///
    /// Every physical element is deregistered from the old cache before
    /// the new one is filled, so no element is ever registered with two
    /// caches at once.
    pub fn set_action_cache(&self, cache: Arc<dyn ActionCache>) -> Result<()> {
        if let Some(old) = self.action_cache.read().clone() {
            let pool = self.pool()?;
            for (_, elements) in self.resolve_physical(&pool) {
                for element in elements {
                    old.remove_element(element.id());
                }
            }
        }
        self.fill_action_cache(&cache);
        *self.action_cache.write() = Some(cache);
        Ok(())
    }

    /// Forgets the action-cache registration.
    pub fn clear_action_cache(&self) {
        *self.action_cache.write() = None;
    }

    fn fill_action_cache(&self, cache: &Arc<dyn ActionCache>) {
        let Ok(pool) = self.pool() else {
            warn!(group = %self.owner_name, "pool context gone, action cache not filled");
            return;
        };
        for (_, elements) in self.resolve_physical(&pool) {
            for element in elements {
                cache.add_element(element);
            }
        }
    }

    // ------------------------------------------------------------------
    // state aggregation
    // ------------------------------------------------------------------

    /// Computes the consolidated `(state, status)` of this group.
    ///
    /// Member readings come from `state_info` when supplied, otherwise
    /// from each member's cached state/status; aggregation never performs
    /// hardware I/O. External members are skipped. The aggregate status
    /// joins the first status line of every participating member; members
    /// without a reading contribute "`{name} is None`". The aggregate
    /// state follows strict priority: any member without a reading or
    /// `Unknown` wins, then `Fault`, then `Alarm`, then `Moving`, else
    /// `On`. The state statistics are overwritten with the full
    /// classification.
    pub fn calculate_states(
        &self,
        state_info: Option<&HashMap<ElementId, (Option<State>, Option<String>)>>,
    ) -> Result<(State, String)> {
        let members = self.user_elements()?;
        let mut stats = StateStats::default();
        let mut status_lines = Vec::new();

        for member in &members {
            if member.kind().is_external() {
                continue;
            }
            let (u_state, u_status) = match state_info {
                Some(map) => match map.get(&member.id()) {
                    Some(info) => info.clone(),
                    None => continue,
                },
                None => (member.inspect_state(), member.inspect_status()),
            };
            let line = match u_status {
                Some(status) => status.lines().next().unwrap_or_default().to_string(),
                None => format!("{} is None", member.name()),
            };
            status_lines.push(line);
            stats.insert(u_state, member.id());
        }

        let state = if stats.count(None) > 0 || stats.count(Some(State::Unknown)) > 0 {
            State::Unknown
        } else if stats.count(Some(State::Fault)) > 0 {
            State::Fault
        } else if stats.count(Some(State::Alarm)) > 0 {
            State::Alarm
        } else if stats.count(Some(State::Moving)) > 0 {
            State::Moving
        } else {
            State::On
        };

        *self.stats.write() = stats;
        Ok((state, status_lines.join("\n")))
    }

    /// Snapshot of the last aggregation pass's classification.
    pub fn state_statistics(&self) -> StateStats {
        self.stats.read().clone()
    }

    // ------------------------------------------------------------------
    // stop / abort
    // ------------------------------------------------------------------

    /// Commands a graceful stop on every physical element, controller by
    /// controller.
    ///
    /// Best-effort: one controller failing is logged and does not prevent
    /// the remaining controllers from being commanded. Only an unresolved
    /// membership (or dropped pool) is reported as an error.
    pub fn stop(&self) -> Result<()> {
        self.ensure_built()?;
        let pool = self.pool()?;
        for (controller_id, elements) in self.resolve_physical(&pool) {
            let controller = match pool.get_controller(controller_id) {
                Ok(controller) => controller,
                Err(err) => {
                    error!(controller = %controller_id, error = %err, "unable to stop controller");
                    continue;
                }
            };
            let names: Vec<&str> = elements.iter().map(|element| element.name()).collect();
            debug!(controller = controller.name(), elements = ?names, "stopping");
            if let Err(err) = controller.stop_elements(&elements) {
                error!(controller = controller.name(), error = %err, "unable to stop controller");
            }
        }
        Ok(())
    }

    /// Commands an immediate abort on every physical element, controller
    /// by controller. Same best-effort contract as [`BaseGroup::stop`].
    pub fn abort(&self) -> Result<()> {
        self.ensure_built()?;
        let pool = self.pool()?;
        for (controller_id, elements) in self.resolve_physical(&pool) {
            let controller = match pool.get_controller(controller_id) {
                Ok(controller) => controller,
                Err(err) => {
                    error!(controller = %controller_id, error = %err, "unable to abort controller");
                    continue;
                }
            };
            let names: Vec<&str> = elements.iter().map(|element| element.name()).collect();
            debug!(controller = controller.name(), elements = ?names, "aborting");
            if let Err(err) = controller.abort_elements(&elements) {
                error!(controller = controller.name(), error = %err, "unable to abort controller");
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // operation
    // ------------------------------------------------------------------

    /// The operation some physical element of this group is claimed by,
    /// if any. Groups never own a claim themselves.
    pub fn get_operation(&self) -> Result<Option<Arc<Operation>>> {
        self.ensure_built()?;
        let pool = self.pool()?;
        for (_, elements) in self.resolve_physical(&pool) {
            for element in elements {
                if let Some(operation) = element.get_operation() {
                    return Ok(Some(operation));
                }
            }
        }
        Ok(None)
    }
}

impl fmt::Debug for BaseGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseGroup")
            .field("owner", &self.owner_name)
            .field("pending", &self.is_pending())
            .field("members", &self.user_elements.read().len())
            .finish()
    }
}

/// A composite element: both an [`Element`] with the usual state/lock
/// machinery and a group over an ordered member list.
///
/// Member state events trigger a recomputation of the aggregate and are
/// re-fired as this element's own state/status events, carrying the member
/// event's priority.
pub struct GroupElement {
    base: BaseElement,
    group: BaseGroup,
    kind: ElementKind,
}

impl GroupElement {
    /// Builds a group element over `user_element_ids`.
    ///
    /// The build is attempted immediately; a reference to an element that
    /// does not exist yet leaves the group pending instead of failing, and
    /// the next access retries. Duplicate or cyclic initial membership is
    /// a hard error.
    pub fn new(
        kind: ElementKind,
        name: impl Into<String>,
        full_name: impl Into<String>,
        id: ElementId,
        pool: &Arc<Pool>,
        cache: Arc<dyn ActionCache>,
        user_element_ids: Vec<UserElementRef>,
    ) -> Result<Arc<Self>> {
        let name = name.into();
        if !kind.is_group() {
            return Err(PoolError::KindMismatch {
                element: name,
                kind,
                expected: "a group kind",
            });
        }
        let managed: fn(ElementKind) -> bool = match kind {
            ElementKind::MotorGroup => ElementKind::is_moveable,
            _ => ElementKind::is_acquirable,
        };
        let full_name = full_name.into();
        let group = Arc::new_cyclic(|weak: &Weak<GroupElement>| {
            let weak = weak.clone();
            let listener: EventListener = Arc::new(move |event: &Event| {
                if let Some(group) = weak.upgrade() {
                    group.on_element_changed(event);
                }
            });
            Self {
                base: BaseElement::new(name.clone(), full_name, id),
                group: BaseGroup::new(
                    Arc::downgrade(pool),
                    id,
                    name.clone(),
                    user_element_ids,
                    Some(listener),
                    managed,
                ),
                kind,
            }
        });
        group.group.set_action_cache(cache)?;
        match group.group.build_elements() {
            Ok(()) => {}
            Err(PoolError::UnresolvedMember(missing)) => {
                info!(
                    group = group.base.name(),
                    element = %missing,
                    "member not constructed yet, group stays pending"
                );
            }
            Err(err) => return Err(err),
        }
        Ok(group)
    }

    /// A member state event arrived: recompute and republish the aggregate
    /// with the member event's priority.
    fn on_element_changed(&self, event: &Event) {
        if event.evt_type.kind != EventKind::State {
            return;
        }
        let propagate = event.evt_type.priority;
        match self.group.calculate_states(None) {
            Ok((state, status)) => {
                self.base.set_status_value(status, propagate);
                self.base.set_state_value(state, propagate);
            }
            Err(err) => {
                warn!(group = self.base.name(), error = %err, "state aggregation failed");
            }
        }
    }

    // ------------------------------------------------------------------
    // group facade
    // ------------------------------------------------------------------

    /// Whether membership still needs a (re)build.
    pub fn is_pending(&self) -> bool {
        self.group.is_pending()
    }

    /// The ordered member reference list.
    pub fn user_element_ids(&self) -> Vec<UserElementRef> {
        self.group.user_element_ids()
    }

    /// The resolved ordered member list.
    pub fn user_elements(&self) -> Result<Vec<Arc<dyn Element>>> {
        self.group.user_elements()
    }

    /// Adds a member; see [`BaseGroup::add_user_element`].
    pub fn add_user_element(
        &self,
        element: Arc<dyn Element>,
        index: Option<usize>,
    ) -> Result<usize> {
        self.group.add_user_element(element, index)
    }

    /// Snapshot of the physical index.
    pub fn physical_elements(&self) -> Result<PhysicalIndex> {
        self.group.physical_elements()
    }

    /// Flat set of every reachable physical element.
    pub fn physical_elements_set(&self) -> Result<HashSet<ElementId>> {
        self.group.physical_elements_set()
    }

    /// Snapshot of the last aggregation classification.
    pub fn state_statistics(&self) -> StateStats {
        self.group.state_statistics()
    }

    /// Computes the consolidated state; see
    /// [`BaseGroup::calculate_states`].
    pub fn calculate_states(
        &self,
        state_info: Option<&HashMap<ElementId, (Option<State>, Option<String>)>>,
    ) -> Result<(State, String)> {
        self.group.calculate_states(state_info)
    }

    /// Default-attribute name of every member, in member order.
    pub fn user_element_attributes(&self) -> Result<Vec<(ElementId, String)>> {
        self.group.user_element_attributes()
    }

    /// Drops every resolved member and forgets the action cache.
    pub fn clear_user_elements(&self) {
        self.group.clear_user_elements();
    }

    /// Replaces the member reference list; the next access rebuilds.
    pub fn set_user_element_ids(&self, refs: Vec<UserElementRef>) {
        self.group.set_user_element_ids(refs);
    }

    /// Re-homes this group onto `cache`, remove-then-add.
    pub fn rehome_action_cache(&self, cache: Arc<dyn ActionCache>) -> Result<()> {
        self.group.set_action_cache(cache)
    }
}

impl Element for GroupElement {
    fn base(&self) -> &BaseElement {
        &self.base
    }

    fn kind(&self) -> ElementKind {
        self.kind
    }

    fn action_cache(&self) -> Option<Arc<dyn ActionCache>> {
        self.group.action_cache()
    }

    fn set_action_cache(&self, cache: Option<Arc<dyn ActionCache>>) {
        match cache {
            Some(cache) => {
                if let Err(err) = self.group.set_action_cache(cache) {
                    warn!(group = self.base.name(), error = %err, "action cache re-home failed");
                }
            }
            None => self.group.clear_action_cache(),
        }
    }

    /// The aggregate status computed by the group is already fully derived;
    /// no per-element wrapping is applied on top.
    fn calculate_state_info(&self, info: StateInfo) -> StateInfo {
        info
    }

    /// One serialized batched read over all physical members through the
    /// group's cache; each reading is pushed into its member silently, then
    /// the aggregate is computed from the refreshed member caches.
    fn read_state_info(&self) -> Result<StateInfo> {
        let cache = self
            .action_cache()
            .ok_or_else(|| PoolError::NoActionCache {
                element: self.base.name().to_string(),
            })?;
        let readings = cache.read_state_info(true)?;
        for member in self.group.user_elements()? {
            if member.kind().is_external() {
                continue;
            }
            if let Some(raw) = readings.get(&member.id()) {
                let info = raw.clone().normalize(member.name());
                member.set_state_info(info, 0);
            }
        }
        let (state, status) = self.group.calculate_states(None)?;
        Ok(StateInfo { state, status })
    }

    fn stop(&self) {
        self.base.latch_stopped();
        if let Err(err) = self.group.stop() {
            warn!(group = self.base.name(), error = %err, "stop broadcast skipped");
        }
    }

    fn abort(&self) {
        self.base.latch_aborted();
        if let Err(err) = self.group.abort() {
            warn!(group = self.base.name(), error = %err, "abort broadcast skipped");
        }
    }

    /// Groups never own a claim; this reports whichever operation one of
    /// the group's physical elements is currently under.
    fn get_operation(&self) -> Option<Arc<Operation>> {
        match self.group.get_operation() {
            Ok(operation) => operation,
            Err(err) => {
                debug!(group = self.base.name(), error = %err, "operation scan skipped");
                None
            }
        }
    }

    fn physical_index(&self) -> Result<PhysicalIndex> {
        self.group.physical_elements()
    }

    fn contains_element(&self, id: ElementId) -> bool {
        id == self.base.id() || self.group.contains_element(id)
    }

    fn default_attribute(&self) -> Result<&str> {
        match self.kind {
            ElementKind::MotorGroup => Ok("position"),
            _ => Err(PoolError::NoDefaultAttribute {
                element: self.base.name().to_string(),
                kind: self.kind,
            }),
        }
    }
}

impl fmt::Debug for GroupElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupElement")
            .field("name", &self.base.name())
            .field("id", &self.base.id())
            .field("kind", &self.kind)
            .field("pending", &self.is_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_index_deduplicates() {
        let mut index = PhysicalIndex::default();
        assert!(index.insert(ControllerId(1), ElementId(1)));
        assert!(!index.insert(ControllerId(1), ElementId(1)));
        assert!(index.insert(ControllerId(1), ElementId(2)));
        assert!(index.insert(ControllerId(2), ElementId(3)));

        assert_eq!(index.len(), 3);
        assert_eq!(index.controller_count(), 2);
        assert!(index.contains(ElementId(2)));
        assert!(!index.contains(ElementId(9)));
    }

    #[test]
    fn physical_index_merge_is_a_union() {
        let mut left = PhysicalIndex::default();
        left.insert(ControllerId(1), ElementId(1));
        left.insert(ControllerId(1), ElementId(2));

        let mut right = PhysicalIndex::default();
        right.insert(ControllerId(1), ElementId(2));
        right.insert(ControllerId(2), ElementId(3));

        left.merge(&right);
        assert_eq!(left.len(), 3);
        assert_eq!(left.controller_count(), 2);

        let mut expected = PhysicalIndex::default();
        expected.insert(ControllerId(1), ElementId(1));
        expected.insert(ControllerId(1), ElementId(2));
        expected.insert(ControllerId(2), ElementId(3));
        assert_eq!(left, expected);
    }
}
