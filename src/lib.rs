//! # beamline-pool
//!
//! Element/group coordination layer of a hardware device pool driving
//! synchrotron beamline instruments (motors, counters, timers).
//!
//! Every physical hardware channel is represented as a stateful, lockable
//! [`Element`](element::Element); many elements (and nested groups) compose
//! into groups that move or acquire together under a single consolidated
//! state; and exclusive [`Operation`](operation::Operation) claims guarantee
//! that no two concurrent actions own the same physical hardware.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                            Pool                                │
//! │   flat arena: id → element, name → element, kind → ids         │
//! │   controller registry, external-name validator                 │
//! ├────────────────────────────────────────────────────────────────┤
//! │   GroupElement                     PhysicalElement             │
//! │   BaseElement + BaseGroup          BaseElement + channel       │
//! │   aggregate (state, status)        cached (state, status)      │
//! │   physical index by controller     reentrant lock, claims      │
//! ├────────────────────────────────────────────────────────────────┤
//! │            Capability contracts (collaborators)                │
//! │   Controller: bulk stop / abort / state reads                  │
//! │   ActionCache: coalesced hardware reads per controller         │
//! │   NameValidator: external member resolution                    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module map
//!
//! - **`types`**: stable integer handles and the element-kind taxonomy.
//! - **`state`**: the observed state enumeration, raw controller reply
//!   normalization and per-state member statistics.
//! - **`event`**: explicit-subscription change events with edge-triggered
//!   firing and delivery priorities.
//! - **`element`**: the [`Element`](element::Element) contract plus the
//!   shared [`BaseElement`](element::BaseElement) machinery and the leaf
//!   [`PhysicalElement`](element::PhysicalElement).
//! - **`group`**: membership resolution, the flattened physical-element
//!   index, state aggregation and broadcast stop/abort.
//! - **`operation`**: exclusive claim tokens and the RAII claim guard.
//! - **`controller`** / **`action`** / **`external`**: the capability
//!   contracts consumed from collaborators.
//! - **`pool`**: the owning context, passed explicitly to every element.
//! - **`error`**: the crate error type; programming errors fail fast,
//!   per-controller broadcast failures are logged and tolerated.
//!
//! ## Concurrency model
//!
//! Synchronous and multi-threaded. Each element carries its own reentrant
//! lock; callers performing a multi-step hardware sequence under one
//! logical operation hold it for the duration, and the same thread may
//! re-enter. Events fire synchronously on the mutating thread after cache
//! guards are released; no event ordering across different elements is
//! guaranteed.

pub mod action;
pub mod controller;
pub mod element;
pub mod error;
pub mod event;
pub mod external;
pub mod group;
pub mod operation;
pub mod pool;
pub mod state;
pub mod types;

pub use action::ActionCache;
pub use controller::Controller;
pub use element::{BaseElement, Element, ElementGuard, ElementSnapshot, PhysicalElement};
pub use error::{PoolError, Result};
pub use event::{Event, EventEmitter, EventKind, EventListener, EventType, EventValue, SubscriptionId};
pub use external::{ExternalObject, ExternalSpec, NameValidator};
pub use group::{BaseGroup, GroupElement, PhysicalIndex, UserElementRef};
pub use operation::{claim_operation, Operation, OperationClaim};
pub use pool::{ElementContainer, Pool};
pub use state::{RawStateInfo, State, StateInfo, StateStats};
pub use types::{ControllerId, ElementId, ElementKind};
