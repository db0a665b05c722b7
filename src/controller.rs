//! Controller capability contract.
//!
//! A controller is an external driver object owning a set of physical
//! channels. Only the contract consumed by elements and groups is defined
//! here; how a driver talks to its hardware is its own business. Driver
//! failures are open-ended, so every operation returns [`anyhow::Result`].

use crate::element::Element;
use crate::state::RawStateInfo;
use crate::types::{ControllerId, ElementId};
use std::collections::HashMap;
use std::sync::Arc;

/// Contract a hardware controller exposes to the pool.
pub trait Controller: Send + Sync {
    /// Stable handle of this controller inside the pool.
    fn id(&self) -> ControllerId;

    /// Human-readable controller name, used in logs.
    fn name(&self) -> &str;

    /// Commands every given element of this controller to stop gracefully
    /// (decelerate, finish the current point).
    ///
    /// Must not fail for elements that are already stopped or idle.
    fn stop_elements(&self, elements: &[Arc<dyn Element>]) -> anyhow::Result<()>;

    /// Commands every given element of this controller to abort immediately.
    ///
    /// Must not fail for elements that are already stopped or idle.
    fn abort_elements(&self, elements: &[Arc<dyn Element>]) -> anyhow::Result<()>;

    /// Produces a raw state reading for each given element in one call.
    ///
    /// May block for the duration of a device I/O round trip.
    fn read_state_info_batch(
        &self,
        elements: &[Arc<dyn Element>],
    ) -> anyhow::Result<HashMap<ElementId, RawStateInfo>>;
}
