//! External (non-managed) member objects.
//!
//! A group may reference objects the pool does not manage, e.g. a bare
//! device-server channel listed in a measurement group. Such references
//! are plain source strings, validated and split by a [`NameValidator`]
//! supplied by the embedding application. External members never
//! participate in state aggregation, physical indexing or broadcast
//! stop/abort.

use crate::element::{BaseElement, Element};
use crate::types::{ElementId, ElementKind};
use std::fmt;
use std::sync::Arc;

/// A validated external reference: display name plus the raw source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalSpec {
    /// Short display name of the referenced object.
    pub name: String,
    /// The raw source string, kept verbatim for round-trips.
    pub source: String,
}

/// Validates raw external identifier strings.
///
/// Returns `None` for strings that do not name a reachable external
/// object; the group build then fails with an invalid-source error.
pub trait NameValidator: Send + Sync {
    /// Validates `source` into a spec, or rejects it.
    fn validate(&self, source: &str) -> Option<ExternalSpec>;
}

/// A group member resolved outside the pool.
pub struct ExternalObject {
    base: BaseElement,
    source: String,
}

impl ExternalObject {
    /// Wraps a validated spec under the pool-assigned synthetic `id`.
    pub fn new(spec: ExternalSpec, id: ElementId) -> Arc<Self> {
        Arc::new(Self {
            base: BaseElement::new(spec.name, spec.source.clone(), id),
            source: spec.source,
        })
    }

    /// The raw source string this object was resolved from.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Element for ExternalObject {
    fn base(&self) -> &BaseElement {
        &self.base
    }

    fn kind(&self) -> ElementKind {
        ElementKind::External
    }
}

impl fmt::Debug for ExternalObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalObject")
            .field("name", &self.base.name())
            .field("source", &self.source)
            .finish()
    }
}
