//! Lifecycle events for transitions and navigations.
//!
//! The runner and engine push events while ticking; adapters poll them after
//! each `Engine::tick` to react to state changes (for example to release
//! focus traps once an exit has been detached).
//!
//! # Usage
//!
//! ```ignore
//! engine.tick(16.0, &mut host);
//! for event in engine.drain_events() {
//!     if let TransitionEvent::Detached { node } = event {
//!         adapter.forget(node);
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::types::{Direction, Generation, NodeId};

/// Event emitted when a transition or navigation changes state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionEvent {
    /// A spring was started for a node.
    Started {
        node: NodeId,
        direction: Direction,
        generation: Generation,
        /// Progress the spring started from; non-origin values mean a reversal.
        from_progress: f64,
    },
    /// A running transition came to rest.
    Settled { node: NodeId, direction: Direction },
    /// A running transition hit the maximum duration guard.
    TimedOut { node: NodeId, direction: Direction },
    /// A running transition was reversed mid-flight.
    Interrupted {
        node: NodeId,
        from: Direction,
        to: Direction,
        progress: f64,
    },
    /// A transition was skipped (scope suppression, missing builder, or build failure).
    Skipped { node: NodeId, direction: Direction },
    /// The host was told to physically remove a node.
    Detached { node: NodeId },
    /// Two elements sharing a correlation key were paired for a morph.
    HeroPaired {
        key: String,
        from_node: NodeId,
        to_node: NodeId,
    },
    /// A navigation pair was resolved against the rule set.
    NavigationResolved {
        from: Option<String>,
        to: String,
        matched: bool,
    },
}

impl TransitionEvent {
    /// Node this event concerns, if any. Hero pairs report the incoming node.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Self::Started { node, .. }
            | Self::Settled { node, .. }
            | Self::TimedOut { node, .. }
            | Self::Interrupted { node, .. }
            | Self::Skipped { node, .. }
            | Self::Detached { node } => Some(*node),
            Self::HeroPaired { to_node, .. } => Some(*to_node),
            Self::NavigationResolved { .. } => None,
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started { .. })
    }

    /// True for events that end a transition.
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            Self::Settled { .. } | Self::TimedOut { .. } | Self::Skipped { .. }
        )
    }
}

/// Queue for collecting events during update cycles.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<TransitionEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: TransitionEvent) {
        self.events.push_back(event);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn pop(&mut self) -> Option<TransitionEvent> {
        self.events.pop_front()
    }

    /// Drain all events from the queue, returning an iterator.
    pub fn drain(&mut self) -> impl Iterator<Item = TransitionEvent> + '_ {
        self.events.drain(..)
    }

    pub fn peek(&self) -> Option<&TransitionEvent> {
        self.events.front()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Move every event from `other` to the back of this queue.
    pub fn append(&mut self, other: &mut EventQueue) {
        self.events.append(&mut other.events);
    }

    /// Get events for a specific node.
    pub fn events_for_node(&self, node: NodeId) -> Vec<&TransitionEvent> {
        self.events
            .iter()
            .filter(|e| e.node() == Some(node))
            .collect()
    }
}
