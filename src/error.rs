//! Error types for the pool coordination layer.
//!
//! The policy is fail fast and loud for programming errors (duplicate
//! membership, operation conflicts, unimplemented default attributes) and
//! log-and-continue for per-controller broadcast failures, which never
//! reach the group-level caller as errors.

use crate::types::{ControllerId, ElementId, ElementKind};
use thiserror::Error;

/// Convenience alias for results using the pool error type.
pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors raised by the element/group coordination layer.
#[derive(Error, Debug)]
pub enum PoolError {
    /// An element was claimed while already under a different operation.
    #[error("{element} is already involved in an operation")]
    AlreadyInOperation {
        /// Name of the contested element.
        element: String,
    },

    /// A member was added to a group that already contains it.
    #[error("group {group} already contains {element}")]
    DuplicateMember {
        /// Name of the group.
        group: String,
        /// Name of the rejected member.
        element: String,
    },

    /// A member addition would make a group contain itself.
    #[error("adding {element} to {group} would create a membership cycle")]
    MembershipCycle {
        /// Name of the group.
        group: String,
        /// Name of the rejected member.
        element: String,
    },

    /// A referenced member has not been constructed yet.
    ///
    /// Not a hard failure at the group boundary: the group stays pending
    /// and the next access retries the build.
    #[error("element {0} does not exist (yet)")]
    UnresolvedMember(ElementId),

    /// Lookup of an element id failed.
    #[error("element {0} not found")]
    ElementNotFound(ElementId),

    /// Lookup of an element name failed.
    #[error("no element named '{0}'")]
    ElementNameNotFound(String),

    /// An element was registered under an id already in use.
    #[error("element id {0} already registered")]
    DuplicateElementId(ElementId),

    /// An element was registered under a name already in use.
    #[error("element name '{0}' already registered")]
    DuplicateElementName(String),

    /// Lookup of a controller id failed.
    #[error("controller {0} not found")]
    ControllerNotFound(ControllerId),

    /// A controller was registered under an id already in use.
    #[error("controller id {0} already registered")]
    DuplicateControllerId(ControllerId),

    /// The owning pool context was dropped while still referenced.
    #[error("owning pool context no longer exists")]
    ContextDropped,

    /// The element kind does not support the requested construction.
    #[error("{element}: kind {kind} is not {expected}")]
    KindMismatch {
        /// Name of the element.
        element: String,
        /// The actual kind.
        kind: ElementKind,
        /// What the kind was required to be.
        expected: &'static str,
    },

    /// The element kind defines no default attribute.
    ///
    /// A configuration defect, not a transient hardware condition.
    #[error("{kind} element {element} doesn't have a default attribute")]
    NoDefaultAttribute {
        /// Name of the element.
        element: String,
        /// Kind missing the override.
        kind: ElementKind,
    },

    /// An external source string was rejected by the name validator.
    #[error("'{0}' is not a valid external element source")]
    InvalidExternalSource(String),

    /// A consolidated read returned no entry for the element.
    #[error("no state reading returned for {element}")]
    MissingReading {
        /// Name of the element.
        element: String,
    },

    /// The element is not registered with any action cache.
    #[error("{element} has no action cache")]
    NoActionCache {
        /// Name of the element.
        element: String,
    },

    /// A collaborator (controller or action cache) failed.
    #[error(transparent)]
    Hardware(#[from] anyhow::Error),
}
