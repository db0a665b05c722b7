//! Identity handles and element kind classification.
//!
//! Elements, controllers and groups are referred to by stable integer
//! handles instead of object references. The handles are allocated by the
//! owning [`Pool`](crate::pool::Pool) and remain valid for the lifetime of
//! the element, which keeps membership graphs (groups of groups) flat and
//! cheap to walk.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable integer handle of an element inside its owning pool.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ElementId(pub u32);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable integer handle of a controller registered with a pool.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ControllerId(pub u32);

impl fmt::Display for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctrl#{}", self.0)
    }
}

/// The closed set of element kinds a pool manages.
///
/// Physical kinds wrap one hardware channel of a controller; pseudo kinds
/// compute their value from other elements; group kinds aggregate an ordered
/// member list; [`External`](ElementKind::External) marks objects that live
/// outside the pool and only participate in membership lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    /// A motorized axis.
    Motor,
    /// A counter/timer channel.
    CounterTimer,
    /// A scalar (0D) experimental channel.
    ZeroDChannel,
    /// A spectrum (1D) experimental channel.
    OneDChannel,
    /// An image (2D) experimental channel.
    TwoDChannel,
    /// A generic communication channel.
    ComChannel,
    /// An input/output register.
    IORegister,
    /// A computed motor built on top of other moveables.
    PseudoMotor,
    /// A computed counter built on top of other channels.
    PseudoCounter,
    /// A group of moveables commanded as one.
    MotorGroup,
    /// A group of acquisition channels read as one.
    MeasurementGroup,
    /// An object not managed by the pool.
    External,
}

impl ElementKind {
    /// Whether this kind wraps one physical hardware channel directly.
    pub fn is_physical(self) -> bool {
        matches!(
            self,
            ElementKind::Motor
                | ElementKind::CounterTimer
                | ElementKind::ZeroDChannel
                | ElementKind::OneDChannel
                | ElementKind::TwoDChannel
                | ElementKind::ComChannel
                | ElementKind::IORegister
        )
    }

    /// Whether this kind is a composite over an ordered member list.
    pub fn is_group(self) -> bool {
        matches!(self, ElementKind::MotorGroup | ElementKind::MeasurementGroup)
    }

    /// Whether elements of this kind can be moved.
    pub fn is_moveable(self) -> bool {
        matches!(
            self,
            ElementKind::Motor | ElementKind::PseudoMotor | ElementKind::MotorGroup
        )
    }

    /// Whether elements of this kind can source acquisition data.
    pub fn is_acquirable(self) -> bool {
        !matches!(
            self,
            ElementKind::External | ElementKind::MotorGroup | ElementKind::MeasurementGroup
        )
    }

    /// Whether this kind lives outside the pool.
    pub fn is_external(self) -> bool {
        matches!(self, ElementKind::External)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementKind::Motor => "Motor",
            ElementKind::CounterTimer => "CounterTimer",
            ElementKind::ZeroDChannel => "ZeroDChannel",
            ElementKind::OneDChannel => "OneDChannel",
            ElementKind::TwoDChannel => "TwoDChannel",
            ElementKind::ComChannel => "ComChannel",
            ElementKind::IORegister => "IORegister",
            ElementKind::PseudoMotor => "PseudoMotor",
            ElementKind::PseudoCounter => "PseudoCounter",
            ElementKind::MotorGroup => "MotorGroup",
            ElementKind::MeasurementGroup => "MeasurementGroup",
            ElementKind::External => "External",
        };
        f.write_str(name)
    }
}
