//! Core identifiers and geometry shared by every engine module.
//!
//! - `NodeId`: opaque reference to a host render-tree node
//! - `TransitionKey`: adapter-chosen key identifying a transitioning element
//! - `Generation`: per-node counter invalidating stale frames
//! - `Direction`: entering or exiting
//! - `Rect`: axis-aligned box in host pixels

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to a node in the host render tree.
///
/// Adapters mint these however they like (DOM element pointer, arena index,
/// virtual node id); the engine only compares and hashes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Key under which an adapter registers a transitioning element.
///
/// Re-registering the same key while its exit is still running is a rapid
/// toggle and resumes the element instead of restarting it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransitionKey(pub String);

impl TransitionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key used internally for a page-level view root.
    ///
    /// Includes the node so two generations of the same route never share a
    /// departure slot.
    pub(crate) fn view(path: &str, node: NodeId) -> Self {
        Self(format!("view:{path}@{node}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TransitionKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for TransitionKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for TransitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Monotonic start counter for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Which half of an element's lifecycle a transition animates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Entering,
    Exiting,
}

impl Direction {
    /// Progress value the spring heads towards.
    pub fn target(self) -> f64 {
        match self {
            Self::Entering => 1.0,
            Self::Exiting => 0.0,
        }
    }

    /// Progress value a fresh (uninterrupted) run starts from.
    pub fn origin(self) -> f64 {
        match self {
            Self::Entering => 0.0,
            Self::Exiting => 1.0,
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Self::Entering => Self::Exiting,
            Self::Exiting => Self::Entering,
        }
    }
}

/// Axis-aligned rectangle in host pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// True when the rect has a usable, finite area.
    pub fn is_measurable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    /// Express this rect in the coordinate space of `origin`'s top-left corner.
    pub fn relative_to(&self, origin: &Rect) -> Rect {
        Rect {
            x: self.x - origin.x,
            y: self.y - origin.y,
            width: self.width,
            height: self.height,
        }
    }
}

static_assertions::assert_impl_all!(NodeId: Send, Sync, Copy);
static_assertions::assert_impl_all!(Rect: Send, Sync, Copy);
