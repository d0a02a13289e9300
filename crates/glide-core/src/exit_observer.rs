//! Deferred removal of transitioning elements.
//!
//! Host frameworks often remove a node synchronously when reactive state
//! changes. The observer turns that into a two-phase protocol: `intercept`
//! pins the node in an overlay at its current bounds and starts its exit;
//! `collect` tells the host to finish the detach once every exit handle the
//! node is waiting on has resolved.
//!
//! If a key comes back before its exit finishes, `reinsert` cancels the exit
//! and resumes the element as an enter from wherever the exit had reached.

use std::collections::HashMap;

use tracing::debug;

use crate::definition::TransitionDefinition;
use crate::error::Result;
use crate::events::{EventQueue, TransitionEvent};
use crate::host::RenderHost;
use crate::runner::{ExitHandle, ExitOutcome, TransitionRunner};
use crate::scope::{ScopeId, ScopeRegistry};
use crate::types::{Direction, NodeId, TransitionKey};

/// A live element registered under a key.
#[derive(Debug, Clone)]
pub struct WatchedElement {
    pub node: NodeId,
    pub definition: TransitionDefinition,
    pub scope: Option<ScopeId>,
}

#[derive(Debug)]
struct Departure {
    node: NodeId,
    definition: TransitionDefinition,
    scope: Option<ScopeId>,
    /// The node's own exit first, then anything else it must outlive.
    handles: Vec<ExitHandle>,
    /// Descendants animated on their own; detached along with the node.
    companions: Vec<NodeId>,
}

impl Departure {
    fn is_done(&self) -> bool {
        self.handles.iter().all(ExitHandle::is_resolved)
    }

    fn superseded(&self) -> bool {
        self.handles
            .first()
            .and_then(ExitHandle::outcome)
            .is_some_and(|outcome| !outcome.should_detach())
    }
}

#[derive(Debug, Default)]
pub struct ExitObserver {
    watched: HashMap<TransitionKey, WatchedElement>,
    departing: HashMap<TransitionKey, Departure>,
}

impl ExitObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a live element so its removal can be intercepted.
    pub fn watch(
        &mut self,
        key: TransitionKey,
        node: NodeId,
        definition: TransitionDefinition,
        scope: Option<ScopeId>,
    ) {
        self.watched.insert(
            key,
            WatchedElement {
                node,
                definition,
                scope,
            },
        );
    }

    pub fn watched(&self, key: &TransitionKey) -> Option<&WatchedElement> {
        self.watched.get(key)
    }

    /// Stop tracking without running an exit.
    pub fn unwatch(&mut self, key: &TransitionKey) -> Option<WatchedElement> {
        self.watched.remove(key)
    }

    /// Handle the host's removal of a watched element.
    ///
    /// Returns `Ok(None)` for keys that are not watched. A build error is
    /// returned after the node has been queued for detachment, so it is never
    /// left stranded.
    pub fn intercept(
        &mut self,
        key: &TransitionKey,
        runner: &mut TransitionRunner,
        scopes: &ScopeRegistry,
        host: &mut dyn RenderHost,
    ) -> Result<Option<ExitHandle>> {
        let Some(element) = self.watched.remove(key) else {
            return Ok(None);
        };
        let WatchedElement {
            node,
            definition,
            scope,
        } = element;

        let suppressed = scope.is_some_and(|scope| scopes.should_skip(scope, Direction::Exiting));
        let started = if suppressed {
            debug!(%key, %node, "exit suppressed by exiting container");
            Ok(runner.skip(node, Direction::Exiting).unwrap_or_default())
        } else {
            if let Some(rect) = host.bounding_rect(node) {
                host.lift_to_overlay(node, rect);
            }
            runner.exit(node, &definition)
        };

        let (handle, result) = match started {
            Ok(handle) => (handle.clone(), Ok(Some(handle))),
            Err(error) => (ExitHandle::resolved(ExitOutcome::Skipped), Err(error)),
        };
        self.departing.insert(
            key.clone(),
            Departure {
                node,
                definition,
                scope,
                handles: vec![handle],
                companions: Vec::new(),
            },
        );
        result
    }

    /// Keep `node` attached until every handle resolves.
    ///
    /// The first handle is the node's own exit; if it resolves as superseded
    /// the node is kept.
    pub fn defer(
        &mut self,
        key: TransitionKey,
        node: NodeId,
        definition: TransitionDefinition,
        handles: Vec<ExitHandle>,
    ) {
        self.watched.remove(&key);
        self.departing.insert(
            key,
            Departure {
                node,
                definition,
                scope: None,
                handles,
                companions: Vec::new(),
            },
        );
    }

    /// Make an in-flight departure also wait for `companion`'s exit.
    ///
    /// The companion's runner state is dropped when the departure detaches.
    pub fn extend(&mut self, key: &TransitionKey, handle: ExitHandle, companion: NodeId) -> bool {
        match self.departing.get_mut(key) {
            Some(departure) => {
                departure.handles.push(handle);
                departure.companions.push(companion);
                true
            }
            None => false,
        }
    }

    /// Resume a departing key that the host has inserted again.
    ///
    /// Returns `Ok(false)` when the key was not departing. The same node is
    /// restored from the overlay and reversed in place; a different node
    /// starts from the old node's progress and the old node is detached.
    #[allow(clippy::too_many_arguments)]
    pub fn reinsert(
        &mut self,
        key: TransitionKey,
        node: NodeId,
        definition: TransitionDefinition,
        scope: Option<ScopeId>,
        runner: &mut TransitionRunner,
        host: &mut dyn RenderHost,
        events: &mut EventQueue,
    ) -> Result<bool> {
        let Some(departure) = self.departing.remove(&key) else {
            return Ok(false);
        };
        debug!(%key, %node, old = %departure.node, "re-inserted before exit finished");

        let result = if departure.node == node {
            host.restore_from_overlay(node);
            runner.enter(node, &definition)
        } else {
            let progress = runner.cancel(departure.node).unwrap_or(0.0);
            host.finish_detach(departure.node);
            runner.forget(departure.node);
            events.push(TransitionEvent::Detached {
                node: departure.node,
            });
            runner.enter_from(node, &definition, progress)
        };

        self.watch(key, node, definition, scope.or(departure.scope));
        result.map(|()| true)
    }

    /// Definition the departing key was registered with.
    pub fn departing_definition(&self, key: &TransitionKey) -> Option<&TransitionDefinition> {
        self.departing.get(key).map(|d| &d.definition)
    }

    /// Detach every departed node whose handles have all resolved.
    pub fn collect(
        &mut self,
        runner: &mut TransitionRunner,
        host: &mut dyn RenderHost,
        events: &mut EventQueue,
    ) -> Vec<NodeId> {
        let done: Vec<TransitionKey> = self
            .departing
            .iter()
            .filter(|(_, departure)| departure.is_done())
            .map(|(key, _)| key.clone())
            .collect();

        let mut detached = Vec::new();
        for key in done {
            let Some(departure) = self.departing.remove(&key) else {
                continue;
            };
            if departure.superseded() {
                continue;
            }
            host.finish_detach(departure.node);
            runner.forget(departure.node);
            for companion in departure.companions {
                runner.forget(companion);
            }
            events.push(TransitionEvent::Detached {
                node: departure.node,
            });
            detached.push(departure.node);
        }
        detached.sort();
        detached
    }

    pub fn is_pending(&self, key: &TransitionKey) -> bool {
        self.departing.contains_key(key)
    }

    pub fn departing_node(&self, key: &TransitionKey) -> Option<NodeId> {
        self.departing.get(key).map(|d| d.node)
    }

    pub fn departing_count(&self) -> usize {
        self.departing.len()
    }

    pub fn watched_count(&self) -> usize {
        self.watched.len()
    }
}
