//! Exclusive operation claim tokens.
//!
//! An [`Operation`] represents one in-flight hardware action (a motion, an
//! acquisition). The coordination layer never inspects a token's contents;
//! tokens are compared by `Arc` identity only. An element can be claimed by
//! at most one operation at a time, and the claim is fail-fast: claiming an
//! already-claimed element errors immediately instead of queueing.

use crate::element::Element;
use crate::error::Result;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Opaque claim token for one in-flight hardware action.
#[derive(Debug)]
pub struct Operation {
    token: u64,
    name: String,
}

impl Operation {
    /// Allocates a fresh token. `name` is used in logs only.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            token: NEXT_TOKEN.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
        })
    }

    /// Log label of this operation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Numeric token, for diagnostics.
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Whether `a` and `b` are the same claim.
    pub fn same(a: &Arc<Operation>, b: &Arc<Operation>) -> bool {
        Arc::ptr_eq(a, b)
    }
}

/// RAII claim over one element.
///
/// Obtained through [`claim_operation`]; releases the claim on drop,
/// provided the element is still held by this same operation.
pub struct OperationClaim {
    element: Arc<dyn Element>,
    operation: Arc<Operation>,
}

impl OperationClaim {
    /// The claimed element.
    pub fn element(&self) -> &Arc<dyn Element> {
        &self.element
    }

    /// The claiming operation.
    pub fn operation(&self) -> &Arc<Operation> {
        &self.operation
    }
}

impl fmt::Debug for OperationClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationClaim")
            .field("element", &self.element.name())
            .field("operation", &self.operation.name())
            .finish()
    }
}

impl Drop for OperationClaim {
    fn drop(&mut self) {
        if let Some(current) = self.element.get_operation() {
            if Operation::same(&current, &self.operation) {
                self.element.clear_operation();
            }
        }
    }
}

/// Claims `element` for `operation`, failing fast if it is already claimed.
///
/// On success the element's `stopped`/`aborted` latches are reset and the
/// returned guard releases the claim when dropped.
pub fn claim_operation(
    element: &Arc<dyn Element>,
    operation: &Arc<Operation>,
) -> Result<OperationClaim> {
    element.set_operation(Some(Arc::clone(operation)))?;
    Ok(OperationClaim {
        element: Arc::clone(element),
        operation: Arc::clone(operation),
    })
}
