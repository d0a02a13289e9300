//! Transition definitions: what to run when an element enters or exits.

use std::fmt;
use std::rc::Rc;

use crate::error::Result;
use crate::spring::{SpringParams, SpringSpec};
use crate::types::{Direction, NodeId};

/// Builds the spring for one node. Called once per run so callbacks may
/// capture node-specific state.
pub type SpecBuilder = Rc<dyn Fn(NodeId) -> Result<SpringSpec>>;

/// Enter and exit builders for an element or page, plus optional shared-element
/// morph parameters used on page navigations.
///
/// A missing builder means that phase completes immediately without animating.
#[derive(Clone, Default)]
pub struct TransitionDefinition {
    enter: Option<SpecBuilder>,
    exit: Option<SpecBuilder>,
    shared: Option<SpringParams>,
}

impl TransitionDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// A definition that never animates.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_enter<F>(mut self, build: F) -> Self
    where
        F: Fn(NodeId) -> Result<SpringSpec> + 'static,
    {
        self.enter = Some(Rc::new(build));
        self
    }

    pub fn with_exit<F>(mut self, build: F) -> Self
    where
        F: Fn(NodeId) -> Result<SpringSpec> + 'static,
    {
        self.exit = Some(Rc::new(build));
        self
    }

    /// Morph elements sharing a correlation key across a page navigation.
    pub fn with_shared_elements(mut self, params: SpringParams) -> Self {
        self.shared = Some(params);
        self
    }

    pub fn has_enter(&self) -> bool {
        self.enter.is_some()
    }

    pub fn has_exit(&self) -> bool {
        self.exit.is_some()
    }

    pub fn shared(&self) -> Option<SpringParams> {
        self.shared
    }

    pub fn is_none(&self) -> bool {
        self.enter.is_none() && self.exit.is_none() && self.shared.is_none()
    }

    /// The same definition with enter and exit roles exchanged.
    pub fn swapped(&self) -> Self {
        Self {
            enter: self.exit.clone(),
            exit: self.enter.clone(),
            shared: self.shared,
        }
    }

    /// Build the spring for `direction`, or `None` if that phase has no builder.
    pub fn build(&self, node: NodeId, direction: Direction) -> Result<Option<SpringSpec>> {
        let builder = match direction {
            Direction::Entering => &self.enter,
            Direction::Exiting => &self.exit,
        };
        builder.as_ref().map(|build| build(node)).transpose()
    }
}

impl fmt::Debug for TransitionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionDefinition")
            .field("enter", &self.enter.is_some())
            .field("exit", &self.exit.is_some())
            .field("shared", &self.shared)
            .finish()
    }
}
