//! Scope registry suppressing nested transitions.
//!
//! Scopes form a forest mirroring render-tree containment. When a container
//! and its children mount (or unmount) in the same frame, only the container
//! should animate: a `Local` child skips its enter while its nearest ancestor
//! scope is entering, and skips its exit while that ancestor is exiting.
//! `Global` children always animate.
//!
//! A scope is `Entering` from creation until the end of that frame, and
//! `Exiting` from destruction until the end of that frame, after which it is
//! removed. `set_transitioning` pins a state across frames until cleared.
//!
//! # Usage
//!
//! ```ignore
//! let mut scopes = ScopeRegistry::new();
//! let container = scopes.create_scope(None, ScopeKind::Global)?;
//! let child = scopes.create_scope(Some(container), ScopeKind::Local)?;
//! assert!(scopes.should_skip(child, Direction::Entering));
//! scopes.end_frame();
//! assert!(!scopes.should_skip(child, Direction::Entering));
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GlideError, Result};
use crate::types::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeId(pub u64);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

/// Whether an element's transitions yield to its container's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    /// Skip while the nearest ancestor scope transitions the same way.
    #[default]
    Local,
    /// Always animate.
    Global,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScopeNode {
    pub id: ScopeId,
    pub parent: Option<ScopeId>,
    /// Fixed at creation.
    pub kind: ScopeKind,
    pub transitioning: Option<Direction>,
}

#[derive(Debug, Default)]
pub struct ScopeRegistry {
    nodes: HashMap<ScopeId, ScopeNode>,
    /// Created this frame; cleared back to idle by `end_frame`.
    fresh: Vec<ScopeId>,
    /// Destroyed this frame; removed by `end_frame`.
    doomed: Vec<ScopeId>,
    next_id: u64,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope under `parent`, entering until the end of this frame.
    pub fn create_scope(&mut self, parent: Option<ScopeId>, kind: ScopeKind) -> Result<ScopeId> {
        if let Some(parent) = parent {
            if !self.nodes.contains_key(&parent) {
                return Err(GlideError::UnknownScope(parent));
            }
        }

        self.next_id += 1;
        let id = ScopeId(self.next_id);
        self.nodes.insert(
            id,
            ScopeNode {
                id,
                parent,
                kind,
                transitioning: Some(Direction::Entering),
            },
        );
        self.fresh.push(id);
        Ok(id)
    }

    /// Mark a scope as exiting; it is removed at the end of this frame.
    pub fn destroy_scope(&mut self, id: ScopeId) -> Result<()> {
        let node = self.nodes.get_mut(&id).ok_or(GlideError::UnknownScope(id))?;
        node.transitioning = Some(Direction::Exiting);
        self.fresh.retain(|fresh| *fresh != id);
        if !self.doomed.contains(&id) {
            self.doomed.push(id);
        }
        Ok(())
    }

    /// Pin a transitioning state that survives `end_frame`.
    pub fn set_transitioning(&mut self, id: ScopeId, direction: Option<Direction>) -> Result<()> {
        let node = self.nodes.get_mut(&id).ok_or(GlideError::UnknownScope(id))?;
        node.transitioning = direction;
        self.fresh.retain(|fresh| *fresh != id);
        Ok(())
    }

    /// True if an element in scope `id` should not animate `direction`.
    ///
    /// Unknown scopes never skip.
    pub fn should_skip(&self, id: ScopeId, direction: Direction) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        if node.kind == ScopeKind::Global {
            return false;
        }
        node.parent
            .and_then(|parent| self.nodes.get(&parent))
            .is_some_and(|parent| parent.transitioning == Some(direction))
    }

    /// Settle frame-scoped states: fresh scopes go idle, destroyed scopes are removed.
    pub fn end_frame(&mut self) {
        for id in self.fresh.drain(..) {
            if let Some(node) = self.nodes.get_mut(&id) {
                if node.transitioning == Some(Direction::Entering) {
                    node.transitioning = None;
                }
            }
        }

        if self.doomed.is_empty() {
            return;
        }
        for id in self.doomed.drain(..) {
            self.nodes.remove(&id);
        }
        let live: Vec<ScopeId> = self.nodes.keys().copied().collect();
        for node in self.nodes.values_mut() {
            if node.parent.is_some_and(|parent| !live.contains(&parent)) {
                node.parent = None;
            }
        }
    }

    pub fn get(&self, id: ScopeId) -> Option<&ScopeNode> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: ScopeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

static_assertions::assert_impl_all!(ScopeRegistry: Send);
