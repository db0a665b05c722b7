//! Shared mock hardware for the integration tests.
//!
//! Provides a scriptable controller, an action cache that batches reads
//! per controller, and a permissive name validator, plus small builders
//! to wire them into a pool.

#![allow(dead_code)]

use anyhow::anyhow;
use beamline_pool::{
    ActionCache, Controller, ControllerId, Element, ElementId, ElementKind, ExternalSpec,
    NameValidator, Operation, PhysicalElement, Pool, RawStateInfo, State,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// Accepts any source containing a '/' and names it after the last
/// path segment.
pub struct PathValidator;

impl NameValidator for PathValidator {
    fn validate(&self, source: &str) -> Option<ExternalSpec> {
        if !source.contains('/') {
            return None;
        }
        let name = source.rsplit('/').next()?;
        Some(ExternalSpec {
            name: name.to_string(),
            source: source.to_string(),
        })
    }
}

/// Scriptable controller: per-element canned state replies plus call
/// recording and switchable stop/abort failure.
pub struct MockController {
    id: ControllerId,
    name: String,
    replies: RwLock<HashMap<ElementId, RawStateInfo>>,
    stop_calls: Mutex<Vec<Vec<ElementId>>>,
    abort_calls: Mutex<Vec<Vec<ElementId>>>,
    batch_reads: AtomicUsize,
    fail_stop: AtomicBool,
    fail_abort: AtomicBool,
}

impl MockController {
    pub fn new(id: ControllerId, name: &str) -> Arc<Self> {
        Arc::new(Self {
            id,
            name: name.to_string(),
            replies: RwLock::new(HashMap::new()),
            stop_calls: Mutex::new(Vec::new()),
            abort_calls: Mutex::new(Vec::new()),
            batch_reads: AtomicUsize::new(0),
            fail_stop: AtomicBool::new(false),
            fail_abort: AtomicBool::new(false),
        })
    }

    /// Scripts the raw reply for one element. Elements without a scripted
    /// reply answer `Bare(On)`.
    pub fn set_reply(&self, element: ElementId, reply: RawStateInfo) {
        self.replies.write().insert(element, reply);
    }

    pub fn fail_stop(&self, fail: bool) {
        self.fail_stop.store(fail, Ordering::SeqCst);
    }

    pub fn fail_abort(&self, fail: bool) {
        self.fail_abort.store(fail, Ordering::SeqCst);
    }

    pub fn stop_calls(&self) -> Vec<Vec<ElementId>> {
        self.stop_calls.lock().clone()
    }

    pub fn abort_calls(&self) -> Vec<Vec<ElementId>> {
        self.abort_calls.lock().clone()
    }

    pub fn batch_reads(&self) -> usize {
        self.batch_reads.load(Ordering::SeqCst)
    }
}

impl Controller for MockController {
    fn id(&self) -> ControllerId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn stop_elements(&self, elements: &[Arc<dyn Element>]) -> anyhow::Result<()> {
        let mut ids: Vec<ElementId> = elements.iter().map(|e| e.id()).collect();
        ids.sort();
        self.stop_calls.lock().push(ids);
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(anyhow!("controller '{}' refused to stop", self.name));
        }
        Ok(())
    }

    fn abort_elements(&self, elements: &[Arc<dyn Element>]) -> anyhow::Result<()> {
        let mut ids: Vec<ElementId> = elements.iter().map(|e| e.id()).collect();
        ids.sort();
        self.abort_calls.lock().push(ids);
        if self.fail_abort.load(Ordering::SeqCst) {
            return Err(anyhow!("controller '{}' refused to abort", self.name));
        }
        Ok(())
    }

    fn read_state_info_batch(
        &self,
        elements: &[Arc<dyn Element>],
    ) -> anyhow::Result<HashMap<ElementId, RawStateInfo>> {
        self.batch_reads.fetch_add(1, Ordering::SeqCst);
        let replies = self.replies.read();
        Ok(elements
            .iter()
            .map(|e| {
                let reply = replies
                    .get(&e.id())
                    .cloned()
                    .unwrap_or(RawStateInfo::Bare(State::On));
                (e.id(), reply)
            })
            .collect())
    }
}

/// Action cache that batches reads per controller through the pool's
/// controller registry. `serial` reads go through a gate mutex so
/// concurrent callers serialize.
pub struct MockActionCache {
    name: String,
    operation: Arc<Operation>,
    pool: Weak<Pool>,
    elements: RwLock<HashMap<ElementId, Arc<dyn Element>>>,
    serial_gate: Mutex<()>,
    reads: AtomicUsize,
    running: AtomicBool,
}

impl MockActionCache {
    pub fn new(pool: &Arc<Pool>, name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            operation: Operation::new(format!("{name}.operation")),
            pool: Arc::downgrade(pool),
            elements: RwLock::new(HashMap::new()),
            serial_gate: Mutex::new(()),
            reads: AtomicUsize::new(0),
            running: AtomicBool::new(false),
        })
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.elements.read().contains_key(&id)
    }

    pub fn element_count(&self) -> usize {
        self.elements.read().len()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }
}

impl ActionCache for MockActionCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn operation(&self) -> Arc<Operation> {
        Arc::clone(&self.operation)
    }

    fn add_element(&self, element: Arc<dyn Element>) {
        self.elements.write().insert(element.id(), element);
    }

    fn remove_element(&self, id: ElementId) -> bool {
        self.elements.write().remove(&id).is_some()
    }

    fn read_state_info(
        &self,
        serial: bool,
    ) -> anyhow::Result<HashMap<ElementId, RawStateInfo>> {
        let _gate = serial.then(|| self.serial_gate.lock());
        self.reads.fetch_add(1, Ordering::SeqCst);
        let pool = self.pool.upgrade().ok_or_else(|| anyhow!("pool gone"))?;

        let mut by_controller: HashMap<ControllerId, Vec<Arc<dyn Element>>> = HashMap::new();
        for element in self.elements.read().values() {
            if let Some(controller) = element.controller_id() {
                by_controller
                    .entry(controller)
                    .or_default()
                    .push(Arc::clone(element));
            }
        }

        let mut readings = HashMap::new();
        for (controller_id, elements) in by_controller {
            let controller = pool.get_controller(controller_id).map_err(anyhow::Error::new)?;
            readings.extend(controller.read_state_info_batch(&elements)?);
        }
        Ok(readings)
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// A pool with the permissive validator.
pub fn test_pool() -> Arc<Pool> {
    Pool::new("testpool", Box::new(PathValidator))
}

/// Builds and registers a physical element, wired to `cache` when given.
pub fn add_channel(
    pool: &Arc<Pool>,
    kind: ElementKind,
    id: u32,
    controller: ControllerId,
    name: &str,
    cache: Option<&Arc<MockActionCache>>,
) -> Arc<PhysicalElement> {
    let element = PhysicalElement::new(
        kind,
        name,
        format!("testpool/{name}"),
        ElementId(id),
        controller,
        id,
    )
    .expect("physical kind");
    pool.add_element(element.clone() as Arc<dyn Element>)
        .expect("register element");
    if let Some(cache) = cache {
        element.set_action_cache(Some(cache.clone() as Arc<dyn ActionCache>));
        cache.add_element(element.clone() as Arc<dyn Element>);
    }
    element
}

/// Shorthand for a motor.
pub fn add_motor(
    pool: &Arc<Pool>,
    id: u32,
    controller: ControllerId,
    name: &str,
    cache: Option<&Arc<MockActionCache>>,
) -> Arc<PhysicalElement> {
    add_channel(pool, ElementKind::Motor, id, controller, name, cache)
}

/// Seeds an element's caches without firing events.
pub fn seed_state(element: &Arc<PhysicalElement>, state: State, status: &str) {
    element.set_state_info(beamline_pool::StateInfo::new(state, status), 0);
}
