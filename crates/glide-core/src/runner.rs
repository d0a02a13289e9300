//! Per-element transition state machine.
//!
//! Every node the engine animates has a `NodeRun` tracking where it is in its
//! lifecycle:
//!
//! ```text
//! Idle ──enter──▶ Entering ──settle──▶ Settled
//!   │                 │ ▲                 │
//!   │            exit │ │ enter           │ exit
//!   │                 ▼ │                 │
//!   └─────exit─────▶ Exiting ◀────────────┘
//!                     │
//!                  settle
//!                     ▼
//!                  Removed
//! ```
//!
//! Reversing a running transition never restarts from the origin: the new
//! spring starts from the old one's position and velocity. Every start bumps
//! the node's generation; a frame whose generation no longer matches is
//! dropped before its callback runs.
//!
//! Exits return an `ExitHandle`, a future that resolves once the node can be
//! physically removed.
//!
//! Styles produced outside a tick (a run's prepare step and origin frame, or
//! the end state of an interrupted shared-element morph) are queued and
//! written by `flush_styles`, which `tick` also calls before advancing.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::definition::TransitionDefinition;
use crate::error::Result;
use crate::events::{EventQueue, TransitionEvent};
use crate::hero::HeroMorph;
use crate::host::RenderHost;
use crate::scheduler::{FrameScheduler, SimulatorHandle};
use crate::spring::{Callbacks, SimulationSettings, SpringParams, SpringSpec, SpringStatus};
use crate::style::StyleMap;
use crate::types::{Direction, Generation, NodeId};

/// Lifecycle state of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Entering,
    Settled,
    Exiting,
    Removed,
}

/// How an exit finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitOutcome {
    /// The exit spring settled.
    Completed,
    /// The exit spring hit the maximum duration guard.
    TimedOut,
    /// No exit ran (suppressed, no builder, or build failure).
    Skipped,
    /// The node re-entered before the exit finished; do not detach it.
    Superseded,
}

impl ExitOutcome {
    /// True when the node should now be physically removed.
    pub fn should_detach(self) -> bool {
        !matches!(self, Self::Superseded)
    }
}

#[derive(Debug, Default)]
struct ExitSignal {
    outcome: Cell<Option<ExitOutcome>>,
    waker: RefCell<Option<Waker>>,
}

/// Deferred completion of an exit transition.
///
/// Clones observe the same signal. The first resolution wins.
#[derive(Debug, Clone, Default)]
pub struct ExitHandle {
    signal: Rc<ExitSignal>,
}

impl ExitHandle {
    pub(crate) fn pending() -> Self {
        Self::default()
    }

    pub(crate) fn resolved(outcome: ExitOutcome) -> Self {
        let handle = Self::default();
        handle.resolve(outcome);
        handle
    }

    pub(crate) fn resolve(&self, outcome: ExitOutcome) {
        if self.signal.outcome.get().is_some() {
            return;
        }
        self.signal.outcome.set(Some(outcome));
        if let Some(waker) = self.signal.waker.borrow_mut().take() {
            waker.wake();
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.signal.outcome.get().is_some()
    }

    pub fn outcome(&self) -> Option<ExitOutcome> {
        self.signal.outcome.get()
    }

    /// True if both handles observe the same exit.
    pub fn same_exit(&self, other: &ExitHandle) -> bool {
        Rc::ptr_eq(&self.signal, &other.signal)
    }
}

impl Future for ExitHandle {
    type Output = ExitOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.signal.outcome.get() {
            Some(outcome) => Poll::Ready(outcome),
            None => {
                *self.signal.waker.borrow_mut() = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

#[derive(Debug, Default)]
struct NodeRun {
    state: RunState,
    direction: Option<Direction>,
    generation: Generation,
    handle: Option<SimulatorHandle>,
    exit: Option<ExitHandle>,
    last_progress: f64,
}

impl NodeRun {
    fn is_running(&self) -> bool {
        self.handle.is_some() && matches!(self.state, RunState::Entering | RunState::Exiting)
    }
}

#[derive(Debug, Clone, Copy)]
struct PairSide {
    node: NodeId,
    generation: Generation,
}

/// Scheduler payload: what a simulator's progress drives.
#[derive(Debug)]
enum Driver {
    Single {
        node: NodeId,
        generation: Generation,
        direction: Direction,
        callbacks: Callbacks,
    },
    /// One progress value (0 to 1) drives both sides of a shared-element morph.
    Pair {
        outgoing: PairSide,
        incoming: PairSide,
        morph: HeroMorph,
    },
}

/// Runs enter/exit springs for individual nodes.
#[derive(Debug)]
pub struct TransitionRunner {
    scheduler: FrameScheduler<Driver>,
    nodes: HashMap<NodeId, NodeRun>,
    /// Styles waiting for the next `flush_styles`, in write order.
    styles: Vec<(NodeId, StyleMap)>,
    events: EventQueue,
}

impl TransitionRunner {
    pub fn new(settings: SimulationSettings) -> Self {
        Self {
            scheduler: FrameScheduler::new(settings),
            nodes: HashMap::new(),
            styles: Vec::new(),
            events: EventQueue::new(),
        }
    }

    /// Start (or resume) the enter transition for `node`.
    ///
    /// An in-flight exit is reversed from its current position and its handle
    /// resolves as `Superseded`. A build error settles the node immediately
    /// and is returned to the caller.
    pub fn enter(&mut self, node: NodeId, definition: &TransitionDefinition) -> Result<()> {
        self.begin_enter(node, definition, None)
    }

    /// Start an enter transition from an explicit progress, at rest.
    ///
    /// Used when a removed node comes back as a different node that should
    /// pick up where the old one left off.
    pub fn enter_from(
        &mut self,
        node: NodeId,
        definition: &TransitionDefinition,
        progress: f64,
    ) -> Result<()> {
        self.begin_enter(node, definition, Some(progress))
    }

    fn begin_enter(
        &mut self,
        node: NodeId,
        definition: &TransitionDefinition,
        resume: Option<f64>,
    ) -> Result<()> {
        let spec = match definition.build(node, Direction::Entering) {
            Ok(spec) => spec,
            Err(error) => {
                tracing::warn!(%node, %error, "enter transition failed to build");
                self.skip(node, Direction::Entering);
                return Err(error);
            }
        };
        let Some(spec) = spec else {
            self.skip(node, Direction::Entering);
            return Ok(());
        };

        let (position, velocity) = match resume {
            Some(progress) => {
                self.halt(node);
                (progress, 0.0)
            }
            None => self.take_motion(node, Direction::Entering),
        };
        self.start_single(node, Direction::Entering, spec, position, velocity);
        Ok(())
    }

    /// Start the exit transition for `node`.
    ///
    /// Calling exit on a node that is already exiting returns the existing
    /// handle. An in-flight enter is reversed from its current position.
    pub fn exit(&mut self, node: NodeId, definition: &TransitionDefinition) -> Result<ExitHandle> {
        if let Some(run) = self.nodes.get(&node) {
            if run.state == RunState::Exiting && run.is_running() {
                if let Some(handle) = &run.exit {
                    return Ok(handle.clone());
                }
            }
        }

        let spec = match definition.build(node, Direction::Exiting) {
            Ok(spec) => spec,
            Err(error) => {
                tracing::warn!(%node, %error, "exit transition failed to build");
                self.skip(node, Direction::Exiting);
                return Err(error);
            }
        };
        let Some(spec) = spec else {
            return Ok(self.skip_exit(node));
        };

        let (position, velocity) = self.take_motion(node, Direction::Exiting);
        let handle = self
            .nodes
            .get_mut(&node)
            .and_then(|run| run.exit.take())
            .filter(|h| !h.is_resolved())
            .unwrap_or_else(ExitHandle::pending);
        self.start_single(node, Direction::Exiting, spec, position, velocity);
        self.run_mut(node).exit = Some(handle.clone());
        Ok(handle)
    }

    /// Reserve an exit handle for a node whose exit has not started yet.
    ///
    /// A later `exit`, `start_pair` or skip resolves this same handle, so a
    /// node can be marked as departing before its transition is known.
    pub(crate) fn hold_exit(&mut self, node: NodeId) -> ExitHandle {
        let run = self.run_mut(node);
        match &run.exit {
            Some(handle) if !handle.is_resolved() => handle.clone(),
            _ => {
                let handle = ExitHandle::pending();
                run.exit = Some(handle.clone());
                handle
            }
        }
    }

    /// Complete `direction` immediately without animating.
    ///
    /// Returns the (already resolved) exit handle when skipping an exit.
    pub fn skip(&mut self, node: NodeId, direction: Direction) -> Option<ExitHandle> {
        match direction {
            Direction::Entering => {
                self.halt(node);
                let run = self.run_mut(node);
                run.generation = run.generation.next();
                run.state = RunState::Settled;
                run.direction = Some(Direction::Entering);
                run.last_progress = Direction::Entering.target();
                if let Some(exit) = run.exit.take() {
                    exit.resolve(ExitOutcome::Superseded);
                }
                self.events.push(TransitionEvent::Skipped { node, direction });
                None
            }
            Direction::Exiting => Some(self.skip_exit(node)),
        }
    }

    fn skip_exit(&mut self, node: NodeId) -> ExitHandle {
        self.halt(node);
        let run = self.run_mut(node);
        run.generation = run.generation.next();
        run.state = RunState::Removed;
        run.direction = Some(Direction::Exiting);
        run.last_progress = Direction::Exiting.target();
        let handle = run.exit.take().unwrap_or_else(ExitHandle::pending);
        handle.resolve(ExitOutcome::Skipped);
        self.events.push(TransitionEvent::Skipped {
            node,
            direction: Direction::Exiting,
        });
        handle
    }

    /// Stop any running spring for `node` where it is.
    ///
    /// Returns the progress reached. A pending exit resolves as `Superseded`.
    pub fn cancel(&mut self, node: NodeId) -> Option<f64> {
        if !self.nodes.contains_key(&node) {
            return None;
        }
        self.halt(node);
        let run = self.run_mut(node);
        run.generation = run.generation.next();
        run.state = RunState::Idle;
        if let Some(exit) = run.exit.take() {
            exit.resolve(ExitOutcome::Superseded);
        }
        Some(run.last_progress)
    }

    /// Drop all state for a node that has been detached.
    pub fn forget(&mut self, node: NodeId) {
        self.halt(node);
        if let Some(run) = self.nodes.remove(&node) {
            if let Some(exit) = run.exit {
                exit.resolve(ExitOutcome::Skipped);
            }
        }
    }

    /// Drive a shared-element morph: `outgoing` exits while `incoming` enters,
    /// both from one spring.
    ///
    /// Returns the outgoing node's exit handle (reusing a pending one).
    pub fn start_pair(
        &mut self,
        outgoing: NodeId,
        incoming: NodeId,
        params: SpringParams,
        morph: HeroMorph,
    ) -> ExitHandle {
        self.halt(outgoing);
        self.halt(incoming);

        let exit = self
            .nodes
            .get_mut(&outgoing)
            .and_then(|run| run.exit.take())
            .filter(|h| !h.is_resolved())
            .unwrap_or_else(ExitHandle::pending);

        let out_generation = self.bump(outgoing, RunState::Exiting, Direction::Exiting, 1.0);
        let in_generation = self.bump(incoming, RunState::Entering, Direction::Entering, 0.0);
        self.styles.push((outgoing, morph.outgoing_style(0.0)));
        self.styles.push((incoming, morph.incoming_style(0.0)));

        let handle = self.scheduler.start(
            params,
            0.0,
            1.0,
            0.0,
            Driver::Pair {
                outgoing: PairSide {
                    node: outgoing,
                    generation: out_generation,
                },
                incoming: PairSide {
                    node: incoming,
                    generation: in_generation,
                },
                morph,
            },
        );

        let out_run = self.run_mut(outgoing);
        out_run.handle = Some(handle);
        out_run.exit = Some(exit.clone());
        let in_run = self.run_mut(incoming);
        in_run.handle = Some(handle);
        if let Some(stale) = in_run.exit.take() {
            stale.resolve(ExitOutcome::Superseded);
        }

        self.events.push(TransitionEvent::Started {
            node: outgoing,
            direction: Direction::Exiting,
            generation: out_generation,
            from_progress: 1.0,
        });
        self.events.push(TransitionEvent::Started {
            node: incoming,
            direction: Direction::Entering,
            generation: in_generation,
            from_progress: 0.0,
        });
        exit
    }

    /// Last progress delivered for `node`.
    pub fn progress(&self, node: NodeId) -> Option<f64> {
        self.nodes.get(&node).map(|run| run.last_progress)
    }

    pub fn state(&self, node: NodeId) -> RunState {
        self.nodes.get(&node).map(|run| run.state).unwrap_or_default()
    }

    pub fn generation(&self, node: NodeId) -> Generation {
        self.nodes
            .get(&node)
            .map(|run| run.generation)
            .unwrap_or_default()
    }

    pub fn is_running(&self, node: NodeId) -> bool {
        self.nodes.get(&node).is_some_and(NodeRun::is_running)
    }

    /// True while `node` is one side of a running shared-element morph.
    pub fn in_pair(&self, node: NodeId) -> bool {
        self.nodes
            .get(&node)
            .and_then(|run| run.handle)
            .and_then(|handle| self.scheduler.payload(handle))
            .is_some_and(|driver| matches!(driver, Driver::Pair { .. }))
    }

    /// Pending exit for `node`, if one is in flight.
    pub fn exit_handle(&self, node: NodeId) -> Option<ExitHandle> {
        self.nodes.get(&node).and_then(|run| run.exit.clone())
    }

    pub fn has_active(&self) -> bool {
        !self.scheduler.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.scheduler.len()
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = TransitionEvent> + '_ {
        self.events.drain()
    }

    /// Write queued styles to the host.
    pub fn flush_styles(&mut self, host: &mut dyn RenderHost) {
        for (node, style) in self.styles.drain(..) {
            host.apply_style(node, &style);
        }
    }

    pub fn has_pending_styles(&self) -> bool {
        !self.styles.is_empty()
    }

    /// Advance every running spring by `delta_ms` and deliver frames.
    pub fn tick(&mut self, delta_ms: f64, host: &mut dyn RenderHost) {
        self.flush_styles(host);
        let nodes = &mut self.nodes;
        let events = &mut self.events;

        self.scheduler.advance(delta_ms, |frame| match frame.payload {
            Driver::Single {
                node,
                generation,
                direction,
                callbacks,
            } => {
                let (node, generation, direction) = (*node, *generation, *direction);
                let Some(run) = nodes.get_mut(&node) else {
                    trace!(%node, "dropping frame for forgotten node");
                    return false;
                };
                if run.generation != generation || run.handle != Some(frame.handle) {
                    trace!(%node, ?generation, current = ?run.generation, "dropping stale frame");
                    return false;
                }

                if let Some(style) = callbacks.frame(frame.progress) {
                    host.apply_style(node, &style);
                }
                run.last_progress = frame.progress;

                if frame.status.is_finished() {
                    callbacks.end();
                    finish(run, node, direction, frame.status, events);
                }
                true
            }
            Driver::Pair {
                outgoing,
                incoming,
                morph,
            } => {
                let mut live = false;
                for (side, direction) in [
                    (*outgoing, Direction::Exiting),
                    (*incoming, Direction::Entering),
                ] {
                    let Some(run) = nodes.get_mut(&side.node) else {
                        continue;
                    };
                    if run.generation != side.generation {
                        trace!(node = %side.node, "dropping stale pair frame");
                        continue;
                    }
                    live = true;

                    let (style, progress) = match direction {
                        Direction::Exiting => (morph.outgoing_style(frame.progress), 1.0 - frame.progress),
                        Direction::Entering => (morph.incoming_style(frame.progress), frame.progress),
                    };
                    host.apply_style(side.node, &style);
                    run.last_progress = progress;

                    if frame.status.is_finished() {
                        finish(run, side.node, direction, frame.status, events);
                    }
                }
                live
            }
        });
    }

    fn run_mut(&mut self, node: NodeId) -> &mut NodeRun {
        self.nodes.entry(node).or_default()
    }

    /// Advance the generation and put the node in `state` at `progress`.
    fn bump(&mut self, node: NodeId, state: RunState, direction: Direction, progress: f64) -> Generation {
        let run = self.run_mut(node);
        run.generation = run.generation.next();
        run.state = state;
        run.direction = Some(direction);
        run.last_progress = progress;
        run.handle = None;
        run.generation
    }

    /// Cancel the node's simulator, if any, leaving bookkeeping in place.
    ///
    /// Interrupting either side of a shared-element morph settles both: the
    /// partner finishes at its end state, and the interrupted side is queued
    /// at its resting style so neither is stranded mid-morph.
    fn halt(&mut self, node: NodeId) -> Option<(f64, f64)> {
        let handle = self.nodes.get_mut(&node)?.handle.take()?;
        let cancelled = self.scheduler.cancel(handle)?;

        match cancelled.payload {
            Driver::Single { .. } => Some((cancelled.position, cancelled.velocity)),
            Driver::Pair {
                outgoing,
                incoming,
                morph,
            } => {
                let halted_outgoing = outgoing.node == node;
                let (partner, partner_direction, own_position, own_velocity) = if halted_outgoing {
                    (incoming, Direction::Entering, 1.0 - cancelled.position, -cancelled.velocity)
                } else {
                    (outgoing, Direction::Exiting, cancelled.position, cancelled.velocity)
                };

                // An outgoing element that stops morphing is shown as it was;
                // an incoming one lands on its final geometry.
                let own_style = if halted_outgoing {
                    morph.outgoing_style(0.0)
                } else {
                    morph.incoming_style(1.0)
                };
                self.styles.push((node, own_style));

                if let Some(run) = self.nodes.get_mut(&partner.node) {
                    if run.generation == partner.generation {
                        debug!(node = %partner.node, "shared element partner interrupted, finishing");
                        run.handle = None;
                        run.last_progress = partner_direction.target();
                        let partner_style = match partner_direction {
                            Direction::Entering => morph.incoming_style(1.0),
                            Direction::Exiting => morph.outgoing_style(1.0),
                        };
                        self.styles.push((partner.node, partner_style));
                        finish(
                            run,
                            partner.node,
                            partner_direction,
                            SpringStatus::Settled,
                            &mut self.events,
                        );
                    }
                }
                Some((own_position, own_velocity))
            }
        }
    }

    /// Stop whatever is running and return the position/velocity a new run
    /// in `direction` should start from.
    fn take_motion(&mut self, node: NodeId, direction: Direction) -> (f64, f64) {
        let previous = self.nodes.get(&node).map(|run| (run.state, run.direction));
        let running = self.is_running(node);

        match self.halt(node) {
            Some((position, velocity)) if running => {
                if let Some((_, Some(from))) = previous {
                    if from != direction {
                        self.events.push(TransitionEvent::Interrupted {
                            node,
                            from,
                            to: direction,
                            progress: position,
                        });
                    }
                }
                (position, velocity)
            }
            _ => match previous {
                Some((RunState::Settled, _)) | Some((RunState::Idle, Some(_))) => {
                    (self.run_mut(node).last_progress, 0.0)
                }
                _ => (direction.origin(), 0.0),
            },
        }
    }

    fn start_single(
        &mut self,
        node: NodeId,
        direction: Direction,
        spec: SpringSpec,
        position: f64,
        velocity: f64,
    ) {
        let state = match direction {
            Direction::Entering => RunState::Entering,
            Direction::Exiting => RunState::Exiting,
        };
        let generation = self.bump(node, state, direction, position);
        if direction == Direction::Entering {
            // Re-entering cancels any exit, running or merely reserved.
            if let Some(exit) = self.run_mut(node).exit.take() {
                exit.resolve(ExitOutcome::Superseded);
            }
        }
        let (params, mut callbacks) = spec.into_parts();
        if let Some(style) = callbacks.prepare() {
            self.styles.push((node, style));
        }
        callbacks.start();
        // The origin frame is written before first paint, not a tick later.
        if let Some(style) = callbacks.frame(position) {
            self.styles.push((node, style));
        }
        let handle = self.scheduler.start(
            params,
            position,
            direction.target(),
            velocity,
            Driver::Single {
                node,
                generation,
                direction,
                callbacks,
            },
        );
        self.run_mut(node).handle = Some(handle);
        self.events.push(TransitionEvent::Started {
            node,
            direction,
            generation,
            from_progress: position,
        });
    }
}

fn finish(
    run: &mut NodeRun,
    node: NodeId,
    direction: Direction,
    status: SpringStatus,
    events: &mut EventQueue,
) {
    run.handle = None;
    match direction {
        Direction::Entering => run.state = RunState::Settled,
        Direction::Exiting => {
            run.state = RunState::Removed;
            if let Some(exit) = run.exit.take() {
                exit.resolve(match status {
                    SpringStatus::TimedOut => ExitOutcome::TimedOut,
                    _ => ExitOutcome::Completed,
                });
            }
        }
    }
    events.push(match status {
        SpringStatus::TimedOut => TransitionEvent::TimedOut { node, direction },
        _ => TransitionEvent::Settled { node, direction },
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spring::ProgressRange;
    use crate::style::{StyleMap, StyleProperty};
    use crate::types::Rect;
    use std::task::Waker;

    #[derive(Default)]
    struct NullHost {
        applied: Vec<(NodeId, StyleMap)>,
    }

    impl RenderHost for NullHost {
        fn root_rect(&self) -> Rect {
            Rect::new(0.0, 0.0, 800.0, 600.0)
        }
        fn bounding_rect(&self, _: NodeId) -> Option<Rect> {
            None
        }
        fn apply_style(&mut self, node: NodeId, style: &StyleMap) {
            self.applied.push((node, style.clone()));
        }
        fn lift_to_overlay(&mut self, _: NodeId, _: Rect) {}
        fn restore_from_overlay(&mut self, _: NodeId) {}
        fn finish_detach(&mut self, _: NodeId) {}
        fn correlation_keys(&self, _: NodeId, _: &str) -> Vec<(String, NodeId)> {
            Vec::new()
        }
    }

    type Log = Rc<RefCell<Vec<(Direction, f64)>>>;

    fn recording(log: &Log) -> TransitionDefinition {
        let enter_log = log.clone();
        let exit_log = log.clone();
        TransitionDefinition::new()
            .with_enter(move |_| {
                let log = enter_log.clone();
                SpringSpec::mutate(SpringParams::default(), move |p| {
                    log.borrow_mut().push((Direction::Entering, p))
                })
            })
            .with_exit(move |_| {
                let log = exit_log.clone();
                SpringSpec::mutate(SpringParams::default(), move |p| {
                    log.borrow_mut().push((Direction::Exiting, p))
                })
            })
    }

    fn run_until_idle(runner: &mut TransitionRunner, host: &mut NullHost) {
        for _ in 0..1000 {
            if !runner.has_active() {
                return;
            }
            runner.tick(16.0, host);
        }
        panic!("runner did not settle");
    }

    #[test]
    fn test_enter_settles() {
        let log = Log::default();
        let mut runner = TransitionRunner::new(SimulationSettings::default());
        let mut host = NullHost::default();

        runner.enter(NodeId(1), &recording(&log)).unwrap();
        assert_eq!(runner.state(NodeId(1)), RunState::Entering);
        assert_eq!(runner.generation(NodeId(1)), Generation(1));

        run_until_idle(&mut runner, &mut host);
        assert_eq!(runner.state(NodeId(1)), RunState::Settled);
        assert_eq!(runner.progress(NodeId(1)), Some(1.0));
        // Final frame is delivered at the target
        assert_eq!(log.borrow().last(), Some(&(Direction::Entering, 1.0)));

        let events: Vec<_> = runner.drain_events().collect();
        assert!(events[0].is_started());
        assert!(matches!(events.last(), Some(TransitionEvent::Settled { .. })));
    }

    #[test]
    fn test_exit_resolves_handle() {
        let log = Log::default();
        let mut runner = TransitionRunner::new(SimulationSettings::default());
        let mut host = NullHost::default();

        let handle = runner.exit(NodeId(1), &recording(&log)).unwrap();
        assert!(!handle.is_resolved());
        // Only the origin frame has been delivered
        assert_eq!(*log.borrow(), vec![(Direction::Exiting, 1.0)]);

        run_until_idle(&mut runner, &mut host);
        assert_eq!(handle.outcome(), Some(ExitOutcome::Completed));
        assert_eq!(runner.state(NodeId(1)), RunState::Removed);
        assert_eq!(log.borrow().last(), Some(&(Direction::Exiting, 0.0)));
    }

    #[test]
    fn test_exit_handle_is_a_future() {
        let mut runner = TransitionRunner::new(SimulationSettings::default());
        let mut host = NullHost::default();
        let mut handle = runner.exit(NodeId(1), &recording(&Log::default())).unwrap();

        let mut cx = Context::from_waker(Waker::noop());
        assert!(Pin::new(&mut handle).poll(&mut cx).is_pending());

        run_until_idle(&mut runner, &mut host);
        assert_eq!(
            Pin::new(&mut handle).poll(&mut cx),
            Poll::Ready(ExitOutcome::Completed)
        );
    }

    #[test]
    fn test_reversal_has_no_discontinuity() {
        let log = Log::default();
        let def = recording(&log);
        let mut runner = TransitionRunner::new(SimulationSettings::default());
        let mut host = NullHost::default();

        runner.enter(NodeId(1), &def).unwrap();
        for _ in 0..5 {
            runner.tick(16.0, &mut host);
        }
        let handle = runner.exit(NodeId(1), &def).unwrap();
        runner.tick(16.0, &mut host);

        let log = log.borrow();
        let last_enter = log.iter().rev().find(|(d, _)| *d == Direction::Entering).unwrap().1;
        let first_exit = log.iter().find(|(d, _)| *d == Direction::Exiting).unwrap().1;
        assert!(last_enter > 0.1 && last_enter < 1.0);
        assert!((first_exit - last_enter).abs() < 0.15);
        assert!(!handle.is_resolved());
        assert_eq!(runner.generation(NodeId(1)), Generation(2));
    }

    #[test]
    fn test_reenter_supersedes_exit() {
        let log = Log::default();
        let def = recording(&log);
        let mut runner = TransitionRunner::new(SimulationSettings::default());
        let mut host = NullHost::default();

        let handle = runner.exit(NodeId(1), &def).unwrap();
        runner.tick(16.0, &mut host);
        runner.tick(16.0, &mut host);
        let reached = runner.progress(NodeId(1)).unwrap();
        assert!(reached < 1.0);

        runner.enter(NodeId(1), &def).unwrap();
        assert_eq!(handle.outcome(), Some(ExitOutcome::Superseded));

        let started_from = runner
            .drain_events()
            .filter_map(|e| match e {
                TransitionEvent::Started {
                    direction: Direction::Entering,
                    from_progress,
                    ..
                } => Some(from_progress),
                _ => None,
            })
            .last()
            .unwrap();
        assert_eq!(started_from, reached);
    }

    #[test]
    fn test_stale_callbacks_never_fire() {
        let log = Log::default();
        let def = recording(&log);
        let mut runner = TransitionRunner::new(SimulationSettings::default());
        let mut host = NullHost::default();

        runner.enter(NodeId(1), &def).unwrap();
        runner.tick(16.0, &mut host);
        let _exit = runner.exit(NodeId(1), &def).unwrap();
        log.borrow_mut().clear();

        run_until_idle(&mut runner, &mut host);
        assert!(log.borrow().iter().all(|(d, _)| *d == Direction::Exiting));
    }

    #[test]
    fn test_missing_builder_completes_immediately() {
        let mut runner = TransitionRunner::new(SimulationSettings::default());
        let none = TransitionDefinition::none();

        runner.enter(NodeId(1), &none).unwrap();
        assert_eq!(runner.state(NodeId(1)), RunState::Settled);

        let handle = runner.exit(NodeId(1), &none).unwrap();
        assert_eq!(handle.outcome(), Some(ExitOutcome::Skipped));
        assert!(!runner.has_active());
    }

    #[test]
    fn test_build_error_is_returned_and_skips() {
        let mut runner = TransitionRunner::new(SimulationSettings::default());
        let bad = TransitionDefinition::new()
            .with_exit(|_| SpringSpec::mutate(SpringParams::new(-1.0, 0.0), |_| {}));

        assert!(runner.exit(NodeId(1), &bad).is_err());
        assert_eq!(runner.state(NodeId(1)), RunState::Removed);
        assert!(!runner.has_active());
    }

    #[test]
    fn test_style_callbacks_reach_host() {
        let mut runner = TransitionRunner::new(SimulationSettings::default());
        let mut host = NullHost::default();
        let def = TransitionDefinition::new().with_enter(|_| {
            SpringSpec::style(SpringParams::default(), |p| StyleMap::new().opacity(p))
        });

        runner.enter(NodeId(7), &def).unwrap();
        assert!(runner.has_pending_styles());
        runner.flush_styles(&mut host);
        assert_eq!(host.applied.len(), 1);
        assert_eq!(host.applied[0].0, NodeId(7));
        assert_eq!(
            host.applied[0].1.get(StyleProperty::Opacity).and_then(|v| v.as_number()),
            Some(0.0)
        );

        runner.tick(16.0, &mut host);
        assert_eq!(host.applied.len(), 2);
        assert!(host.applied[1].1.get(StyleProperty::Opacity).is_some());
    }

    #[test]
    fn test_prepare_precedes_origin_frame() {
        let mut runner = TransitionRunner::new(SimulationSettings::default());
        let mut host = NullHost::default();
        let def = TransitionDefinition::new().with_enter(|_| {
            Ok(SpringSpec::style(SpringParams::default(), |p| StyleMap::new().opacity(p))?
                .with_prepare(|| StyleMap::new().transform_origin("top left")))
        });

        runner.enter(NodeId(3), &def).unwrap();
        runner.flush_styles(&mut host);
        assert_eq!(host.applied.len(), 2);
        assert!(host.applied[0].1.get(StyleProperty::TransformOrigin).is_some());
        assert!(host.applied[1].1.get(StyleProperty::Opacity).is_some());
    }

    #[test]
    fn test_lifecycle_hooks() {
        let calls: Rc<RefCell<Vec<&'static str>>> = Rc::default();
        let hooked = {
            let calls = calls.clone();
            TransitionDefinition::new().with_enter(move |_| {
                let (start, end) = (calls.clone(), calls.clone());
                Ok(SpringSpec::mutate(SpringParams::default(), |_| {})?
                    .with_on_start(move || start.borrow_mut().push("start"))
                    .with_on_end(move || end.borrow_mut().push("end")))
            })
        };
        let mut runner = TransitionRunner::new(SimulationSettings::default());
        let mut host = NullHost::default();

        runner.enter(NodeId(1), &hooked).unwrap();
        assert_eq!(*calls.borrow(), vec!["start"]);
        run_until_idle(&mut runner, &mut host);
        assert_eq!(*calls.borrow(), vec!["start", "end"]);

        // An interrupted run never reports its end
        calls.borrow_mut().clear();
        runner.enter(NodeId(2), &hooked).unwrap();
        runner.tick(16.0, &mut host);
        runner.cancel(NodeId(2));
        run_until_idle(&mut runner, &mut host);
        assert_eq!(*calls.borrow(), vec!["start"]);
    }

    #[test]
    fn test_range_reaches_callback() {
        let log = Log::default();
        let sink = log.clone();
        let def = TransitionDefinition::new().with_enter(move |_| {
            let sink = sink.clone();
            Ok(SpringSpec::mutate(SpringParams::default(), move |p| {
                sink.borrow_mut().push((Direction::Entering, p))
            })?
            .with_range(ProgressRange::new(0.5, 1.0)?))
        });
        let mut runner = TransitionRunner::new(SimulationSettings::default());
        let mut host = NullHost::default();

        runner.enter(NodeId(1), &def).unwrap();
        run_until_idle(&mut runner, &mut host);
        let log = log.borrow();
        assert_eq!(log.first(), Some(&(Direction::Entering, 0.5)));
        assert_eq!(log.last(), Some(&(Direction::Entering, 1.0)));
        // Runner progress is unaffected by the callback's range
        assert_eq!(runner.progress(NodeId(1)), Some(1.0));
    }

    #[test]
    fn test_timeout_resolves_exit() {
        let settings = SimulationSettings {
            max_duration_ms: 200.0,
            ..SimulationSettings::default()
        };
        let mut runner = TransitionRunner::new(settings);
        let mut host = NullHost::default();
        let undamped = TransitionDefinition::new()
            .with_exit(|_| SpringSpec::mutate(SpringParams::new(300.0, 0.0), |_| {}));

        let handle = runner.exit(NodeId(1), &undamped).unwrap();
        run_until_idle(&mut runner, &mut host);
        assert_eq!(handle.outcome(), Some(ExitOutcome::TimedOut));
    }

    #[test]
    fn test_exit_twice_returns_same_handle() {
        let mut runner = TransitionRunner::new(SimulationSettings::default());
        let def = recording(&Log::default());
        let a = runner.exit(NodeId(1), &def).unwrap();
        let b = runner.exit(NodeId(1), &def).unwrap();
        assert!(a.same_exit(&b));
        assert_eq!(runner.active_count(), 1);
    }

    #[test]
    fn test_cancel_reports_progress() {
        let mut runner = TransitionRunner::new(SimulationSettings::default());
        let mut host = NullHost::default();
        let def = recording(&Log::default());

        let handle = runner.exit(NodeId(1), &def).unwrap();
        runner.tick(16.0, &mut host);
        let progress = runner.cancel(NodeId(1)).unwrap();
        assert!(progress < 1.0);
        assert_eq!(handle.outcome(), Some(ExitOutcome::Superseded));
        assert_eq!(runner.state(NodeId(1)), RunState::Idle);
        assert!(runner.cancel(NodeId(99)).is_none());
    }

    #[test]
    fn test_pair_shares_progress() {
        use crate::hero::{HeroGeometry, HeroMorph};

        let mut runner = TransitionRunner::new(SimulationSettings::default());
        let mut host = NullHost::default();
        let geo = HeroGeometry::compute(
            Rect::new(0.0, 0.0, 100.0, 100.0),
            Rect::new(200.0, 50.0, 400.0, 300.0),
            Rect::new(0.0, 0.0, 800.0, 600.0),
        );

        let exit = runner.start_pair(NodeId(1), NodeId(2), SpringParams::default(), HeroMorph::new(geo));
        assert_eq!(runner.active_count(), 1);
        assert!(runner.in_pair(NodeId(1)) && runner.in_pair(NodeId(2)));

        runner.tick(16.0, &mut host);
        let out = runner.progress(NodeId(1)).unwrap();
        let inc = runner.progress(NodeId(2)).unwrap();
        assert!((out + inc - 1.0).abs() < 1e-12);

        run_until_idle(&mut runner, &mut host);
        assert_eq!(exit.outcome(), Some(ExitOutcome::Completed));
        assert_eq!(runner.state(NodeId(2)), RunState::Settled);
        assert!(!runner.in_pair(NodeId(2)));
    }

    #[test]
    fn test_skipping_pair_side_lands_both_on_end_state() {
        use crate::hero::{HeroGeometry, HeroMorph};

        let mut runner = TransitionRunner::new(SimulationSettings::default());
        let mut host = NullHost::default();
        let geo = HeroGeometry::compute(
            Rect::new(0.0, 0.0, 100.0, 100.0),
            Rect::new(200.0, 50.0, 400.0, 300.0),
            Rect::new(0.0, 0.0, 800.0, 600.0),
        );
        let morph = HeroMorph::new(geo);
        let exit = runner.start_pair(NodeId(1), NodeId(2), SpringParams::default(), morph);
        runner.tick(16.0, &mut host);
        host.applied.clear();

        runner.skip(NodeId(2), Direction::Entering);
        runner.tick(16.0, &mut host);

        let last = |node: NodeId| {
            host.applied
                .iter()
                .rev()
                .find(|(n, _)| *n == node)
                .map(|(_, style)| style.clone())
        };
        assert_eq!(last(NodeId(2)), Some(morph.incoming_style(1.0)));
        assert_eq!(last(NodeId(1)), Some(morph.outgoing_style(1.0)));
        assert_eq!(exit.outcome(), Some(ExitOutcome::Completed));
        assert_eq!(runner.state(NodeId(2)), RunState::Settled);
        assert!(!runner.has_active());
    }
}
