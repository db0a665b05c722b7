//! Action-cache capability contract.
//!
//! An action cache is the per-controller (or per-context) batching executor:
//! elements register with exactly one cache, and reading one element's state
//! triggers (or reuses) a single consolidated hardware read across all
//! elements sharing the cache. The cache is also the sole arbiter of *when*
//! a real hardware read happens versus returning an in-flight result.
//!
//! Only the contract consumed by elements and groups is defined here; the
//! batching implementation itself lives with whoever drives hardware
//! actions.

use crate::element::Element;
use crate::operation::Operation;
use crate::state::RawStateInfo;
use crate::types::ElementId;
use std::collections::HashMap;
use std::sync::Arc;

/// Contract an action cache exposes to elements and groups.
pub trait ActionCache: Send + Sync {
    /// Name of this cache, used in logs.
    fn name(&self) -> &str;

    /// The claim token identifying an operation run by this cache itself.
    ///
    /// An element whose current operation is this token is in a *local*
    /// operation, i.e. one driven by its own cache.
    fn operation(&self) -> Arc<Operation>;

    /// Registers `element` with this cache.
    ///
    /// Re-registering an element that is already present is a no-op; groups
    /// re-fill their cache wholesale after membership changes.
    fn add_element(&self, element: Arc<dyn Element>);

    /// Deregisters the element `id`. Absent elements are tolerated; returns
    /// whether the element was present.
    fn remove_element(&self, id: ElementId) -> bool;

    /// One consolidated hardware read across this cache's elements.
    ///
    /// With `serial` set, controller accesses are performed one at a time
    /// across the batch instead of concurrently. Reads for elements sharing
    /// a cache may be coalesced into one hardware round trip; no ordering
    /// across elements is guaranteed.
    fn read_state_info(
        &self,
        serial: bool,
    ) -> anyhow::Result<HashMap<ElementId, RawStateInfo>>;

    /// Whether this cache is currently driving a hardware action.
    fn is_running(&self) -> bool;
}
