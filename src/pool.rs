//! The owning pool context: a flat arena of elements plus the controller
//! registry.
//!
//! Elements and groups hold an explicit reference to their pool, supplied
//! at construction; there is no ambient singleton to reach for. Lookups go
//! through stable integer handles, names are matched case-insensitively.

use crate::controller::Controller;
use crate::element::Element;
use crate::error::{PoolError, Result};
use crate::external::{ExternalObject, NameValidator};
use crate::types::{ControllerId, ElementId, ElementKind};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Ids at or above this value are allocated to external objects and never
/// handed out for pool-managed elements.
const EXTERNAL_ID_BASE: u32 = 1 << 31;

#[derive(Default)]
struct ContainerInner {
    by_id: HashMap<ElementId, Arc<dyn Element>>,
    // lowercased name -> id
    by_name: HashMap<String, ElementId>,
    by_kind: HashMap<ElementKind, BTreeSet<ElementId>>,
}

/// Index of elements by id, case-insensitive name and kind.
///
/// Used both by the pool itself and by every group, which doubles as a
/// container of its own members.
#[derive(Default)]
pub struct ElementContainer {
    inner: RwLock<ContainerInner>,
}

impl ElementContainer {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `element`, rejecting duplicate ids and names.
    pub fn add(&self, element: Arc<dyn Element>) -> Result<()> {
        let mut inner = self.inner.write();
        let id = element.id();
        let name_key = element.name().to_lowercase();
        if inner.by_id.contains_key(&id) {
            return Err(PoolError::DuplicateElementId(id));
        }
        if inner.by_name.contains_key(&name_key) {
            return Err(PoolError::DuplicateElementName(element.name().to_string()));
        }
        inner.by_name.insert(name_key, id);
        inner.by_kind.entry(element.kind()).or_default().insert(id);
        inner.by_id.insert(id, element);
        Ok(())
    }

    /// Removes and returns the element `id`.
    pub fn remove(&self, id: ElementId) -> Result<Arc<dyn Element>> {
        let mut inner = self.inner.write();
        let element = inner
            .by_id
            .remove(&id)
            .ok_or(PoolError::ElementNotFound(id))?;
        inner.by_name.remove(&element.name().to_lowercase());
        if let Some(ids) = inner.by_kind.get_mut(&element.kind()) {
            ids.remove(&id);
        }
        Ok(element)
    }

    /// Looks up an element by id.
    pub fn get(&self, id: ElementId) -> Option<Arc<dyn Element>> {
        self.inner.read().by_id.get(&id).cloned()
    }

    /// Looks up an element by name, case-insensitively.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn Element>> {
        let inner = self.inner.read();
        let id = inner.by_name.get(&name.to_lowercase())?;
        inner.by_id.get(id).cloned()
    }

    /// Ids of every element of `kind`, ordered.
    pub fn ids_of_kind(&self, kind: ElementKind) -> Vec<ElementId> {
        self.inner
            .read()
            .by_kind
            .get(&kind)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of registered elements.
    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every registration.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.by_id.clear();
        inner.by_name.clear();
        inner.by_kind.clear();
    }
}

impl fmt::Debug for ElementContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementContainer")
            .field("elements", &self.len())
            .finish()
    }
}

/// The owning context of elements, groups and controllers.
pub struct Pool {
    name: String,
    container: ElementContainer,
    controllers: RwLock<HashMap<ControllerId, Arc<dyn Controller>>>,
    validator: Box<dyn NameValidator>,
    next_external_id: AtomicU32,
}

impl Pool {
    /// Creates a pool named `name` with the given external-name validator.
    pub fn new(name: impl Into<String>, validator: Box<dyn NameValidator>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            container: ElementContainer::new(),
            controllers: RwLock::new(HashMap::new()),
            validator,
            next_external_id: AtomicU32::new(0),
        })
    }

    /// Pool name, used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    // ------------------------------------------------------------------
    // elements
    // ------------------------------------------------------------------

    /// Registers `element` into the arena.
    pub fn add_element(&self, element: Arc<dyn Element>) -> Result<()> {
        self.container.add(element)
    }

    /// Removes the element `id`, returning it.
    pub fn remove_element(&self, id: ElementId) -> Result<Arc<dyn Element>> {
        self.container.remove(id)
    }

    /// Looks up an element by id.
    pub fn get_element(&self, id: ElementId) -> Result<Arc<dyn Element>> {
        self.container.get(id).ok_or(PoolError::ElementNotFound(id))
    }

    /// Looks up an element by name, case-insensitively.
    pub fn get_element_by_name(&self, name: &str) -> Result<Arc<dyn Element>> {
        self.container
            .get_by_name(name)
            .ok_or_else(|| PoolError::ElementNameNotFound(name.to_string()))
    }

    /// Every element of `kind`, ordered by id.
    pub fn elements_of_kind(&self, kind: ElementKind) -> Vec<Arc<dyn Element>> {
        self.container
            .ids_of_kind(kind)
            .into_iter()
            .filter_map(|id| self.container.get(id))
            .collect()
    }

    /// Number of registered elements.
    pub fn element_count(&self) -> usize {
        self.container.len()
    }

    // ------------------------------------------------------------------
    // controllers
    // ------------------------------------------------------------------

    /// Registers a controller, rejecting duplicate ids.
    pub fn add_controller(&self, controller: Arc<dyn Controller>) -> Result<()> {
        let mut controllers = self.controllers.write();
        let id = controller.id();
        if controllers.contains_key(&id) {
            return Err(PoolError::DuplicateControllerId(id));
        }
        controllers.insert(id, controller);
        Ok(())
    }

    /// Looks up a controller by id.
    pub fn get_controller(&self, id: ControllerId) -> Result<Arc<dyn Controller>> {
        self.controllers
            .read()
            .get(&id)
            .cloned()
            .ok_or(PoolError::ControllerNotFound(id))
    }

    /// Number of registered controllers.
    pub fn controller_count(&self) -> usize {
        self.controllers.read().len()
    }

    // ------------------------------------------------------------------
    // externals
    // ------------------------------------------------------------------

    /// Resolves a raw source string into an external member object.
    ///
    /// The source is checked by the pool's name validator; the returned
    /// object carries a synthetic id from a range never used by managed
    /// elements and is not registered in the arena.
    pub fn resolve_external(&self, source: &str) -> Result<Arc<dyn Element>> {
        let spec = self
            .validator
            .validate(source)
            .ok_or_else(|| PoolError::InvalidExternalSource(source.to_string()))?;
        let id = ElementId(
            EXTERNAL_ID_BASE + self.next_external_id.fetch_add(1, Ordering::Relaxed),
        );
        let object: Arc<dyn Element> = ExternalObject::new(spec, id);
        Ok(object)
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.name)
            .field("elements", &self.container.len())
            .field("controllers", &self.controller_count())
            .finish()
    }
}
