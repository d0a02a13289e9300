//! Engine facade: the surface adapters call.
//!
//! Adapters report navigations and view roots, register the elements they
//! want animated, and drive the engine once per animation frame:
//!
//! ```ignore
//! let mut engine = Engine::new(config, &GlideConfig::load());
//!
//! engine.report_navigation(Some("/"), "/photos");
//! engine.unmount_view("/", &mut host)?;
//! engine.mount_view("/photos", photos_root, &mut host)?;
//!
//! // every frame
//! engine.tick(delta_ms, &mut host);
//! for event in engine.drain_events() { /* ... */ }
//! ```
//!
//! A view unmount pins the old root in the overlay straight away; its exit
//! only starts once the detector pairs it with the arriving root and the
//! matcher has picked a definition. A half that finds no counterpart within
//! one tick is completed without animation.

use std::collections::HashMap;

use glide_config::GlideConfig;
use tracing::{debug, warn};

use crate::definition::TransitionDefinition;
use crate::detector::{
    Detection, NavigationDetector, PendingNavigation, RootOrderHeuristic, ViewSide, detector_for,
};
use crate::error::{GlideError, Result};
use crate::events::{EventQueue, TransitionEvent};
use crate::exit_observer::ExitObserver;
use crate::hero::{HeroCorrelator, HeroGeometry, HeroMorph};
use crate::host::RenderHost;
use crate::matcher::{NavigationPair, Resolution, RuleMatcher, TransitionConfig};
use crate::presets::preset_by_name;
use crate::runner::{RunState, TransitionRunner};
use crate::scope::{ScopeId, ScopeKind, ScopeRegistry};
use crate::spring::{SimulationSettings, SpringParams};
use crate::style::{StyleMap, Visibility};
use crate::types::{Direction, NodeId, Rect, TransitionKey};

/// Ticks an unpaired view half waits for its counterpart.
const PAIRING_GRACE_TICKS: u64 = 1;

/// How a registered element animates and which container it belongs to.
#[derive(Debug, Clone, Default)]
pub struct ElementOptions {
    pub transition: TransitionDefinition,
    /// Scope of the enclosing container, if any.
    pub scope_parent: Option<ScopeId>,
    pub kind: ScopeKind,
}

impl ElementOptions {
    pub fn new(transition: TransitionDefinition) -> Self {
        Self {
            transition,
            ..Self::default()
        }
    }

    pub fn in_scope(mut self, parent: ScopeId) -> Self {
        self.scope_parent = Some(parent);
        self
    }

    pub fn kind(mut self, kind: ScopeKind) -> Self {
        self.kind = kind;
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct MountedView {
    node: NodeId,
    scope: ScopeId,
}

/// A view half waiting for the detector to pair it.
#[derive(Debug, Clone, Copy)]
struct Waiting {
    node: NodeId,
    since: u64,
}

#[derive(Debug)]
pub struct Engine {
    settings: GlideConfig,
    matcher: RuleMatcher,
    detector: Box<dyn NavigationDetector>,
    heuristic: RootOrderHeuristic,
    runner: TransitionRunner,
    observer: ExitObserver,
    scopes: ScopeRegistry,
    correlator: HeroCorrelator,
    views: HashMap<String, MountedView>,
    leaving: HashMap<String, Waiting>,
    arriving: HashMap<String, Waiting>,
    /// Navigation announced by the adapter, with the tick it arrived on.
    reported: Option<(NavigationPair, u64)>,
    /// Scopes held in `Entering` while their owner's enter is running.
    pinned: Vec<(ScopeId, NodeId)>,
    frame: u64,
    events: EventQueue,
}

impl Engine {
    pub fn new(config: TransitionConfig, settings: &GlideConfig) -> Self {
        Self {
            settings: settings.clone(),
            matcher: RuleMatcher::new(config),
            detector: detector_for(settings.navigation.strategy),
            heuristic: RootOrderHeuristic::new(),
            runner: TransitionRunner::new(SimulationSettings::from(&settings.simulation)),
            observer: ExitObserver::new(),
            scopes: ScopeRegistry::new(),
            correlator: HeroCorrelator::new(settings.hero.max_distance)
                .with_key_attribute(settings.hero.key_attribute.clone()),
            views: HashMap::new(),
            leaving: HashMap::new(),
            arriving: HashMap::new(),
            reported: None,
            pinned: Vec::new(),
            frame: 0,
            events: EventQueue::new(),
        }
    }

    /// Swap the rule set. Running transitions keep the definition they started with.
    pub fn replace_config(&mut self, config: TransitionConfig) {
        self.matcher = RuleMatcher::new(config);
    }

    pub fn settings(&self) -> &GlideConfig {
        &self.settings
    }

    pub fn runner(&self) -> &TransitionRunner {
        &self.runner
    }

    pub fn scopes(&self) -> &ScopeRegistry {
        &self.scopes
    }

    pub fn observer(&self) -> &ExitObserver {
        &self.observer
    }

    /// Spring used by presets and shared-element morphs unless overridden.
    pub fn default_spring(&self) -> SpringParams {
        SpringParams::from(&self.settings.spring)
    }

    /// Named preset driven by the configured default spring.
    pub fn preset(&self, name: &str) -> Result<TransitionDefinition> {
        preset_by_name(name, self.default_spring())
    }

    // ---------------------------------------------------------------------
    // Matching
    // ---------------------------------------------------------------------

    pub fn resolve_transition(&self, from: &str, to: &str) -> Resolution {
        self.matcher.resolve(from, to)
    }

    pub fn has_match(&self, from: &str, to: &str) -> bool {
        self.matcher.has_match(from, to)
    }

    /// Authoritative navigation from the adapter's router.
    ///
    /// `from` is `None` on first render. The pair is only used to decide the
    /// initial style and to disambiguate roots for hosts that cannot report
    /// removals; pairing itself still comes from view events.
    pub fn report_navigation(&mut self, from: Option<&str>, to: &str) {
        debug!(from = from.unwrap_or("-"), to, "navigation reported");
        self.reported = from.map(|from| (NavigationPair::new(from, to), self.frame));
    }

    /// Style to apply to a freshly inserted view before first paint.
    pub fn initial_style(&self) -> StyleMap {
        let pending_match = self
            .reported
            .as_ref()
            .is_some_and(|(pair, _)| self.matcher.has_match(&pair.from, &pair.to));

        if self.settings.navigation.hide_until_ready && pending_match {
            StyleMap::new().visibility(Visibility::Hidden)
        } else {
            StyleMap::new()
        }
    }

    // ---------------------------------------------------------------------
    // Views
    // ---------------------------------------------------------------------

    /// A view root for `path` was inserted.
    pub fn mount_view(
        &mut self,
        path: &str,
        node: NodeId,
        host: &mut dyn RenderHost,
    ) -> Result<()> {
        let scope = self.scopes.create_scope(None, ScopeKind::Global)?;
        if let Some(previous) = self
            .views
            .insert(path.to_string(), MountedView { node, scope })
        {
            self.scopes.destroy_scope(previous.scope)?;
        }
        self.heuristic.observe_insert(path);
        self.arriving.insert(
            path.to_string(),
            Waiting {
                node,
                since: self.frame,
            },
        );

        let detection = self.detector.trigger(path, ViewSide::In);
        let result = self.on_detection(path, ViewSide::In, detection, host);
        self.runner.flush_styles(host);
        result
    }

    /// The view root for `path` is being removed.
    ///
    /// The node stays attached in the overlay until its exit finishes and
    /// the engine calls `finish_detach`.
    pub fn unmount_view(&mut self, path: &str, host: &mut dyn RenderHost) -> Result<()> {
        let view = self
            .views
            .remove(path)
            .ok_or_else(|| GlideError::UnknownView(path.to_string()))?;
        self.heuristic.observe_remove(path);
        self.arriving.remove(path);
        self.scopes.destroy_scope(view.scope)?;

        if let Some(rect) = host.bounding_rect(view.node) {
            host.lift_to_overlay(view.node, rect);
        }
        let hold = self.runner.hold_exit(view.node);
        self.observer.defer(
            TransitionKey::view(path, view.node),
            view.node,
            TransitionDefinition::none(),
            vec![hold],
        );
        self.leaving.insert(
            path.to_string(),
            Waiting {
                node: view.node,
                since: self.frame,
            },
        );

        let detection = self.detector.trigger(path, ViewSide::Out);
        let result = self.on_detection(path, ViewSide::Out, detection, host);
        self.runner.flush_styles(host);
        result
    }

    pub fn view_scope(&self, path: &str) -> Option<ScopeId> {
        self.views.get(path).map(|view| view.scope)
    }

    pub fn view_node(&self, path: &str) -> Option<NodeId> {
        self.views.get(path).map(|view| view.node)
    }

    fn on_detection(
        &mut self,
        path: &str,
        side: ViewSide,
        detection: Detection,
        host: &mut dyn RenderHost,
    ) -> Result<()> {
        match detection {
            Detection::Pending => Ok(()),
            Detection::Paired(pair) => self.start_navigation(pair, host),
            Detection::Skip => {
                debug!(path, ?side, "view event outside a navigation");
                if let Some(waiting) = self.arriving.remove(path) {
                    self.reveal(path, waiting.node, host);
                }
                Ok(())
            }
            Detection::Superseded { stale, next } => {
                debug!(?stale, "pending navigation superseded");
                self.settle_unpaired(stale, host);
                self.on_detection(path, side, *next, host)
            }
        }
    }

    /// Complete both halves of a navigation that will never pair.
    fn settle_unpaired(&mut self, stale: PendingNavigation, host: &mut dyn RenderHost) {
        let incoming = stale
            .to
            .and_then(|path| self.arriving.remove(&path).map(|waiting| (path, waiting.node)));
        if let Some((path, node)) = &incoming {
            self.reveal(path, *node, host);
        }

        let outgoing = stale
            .from
            .and_then(|path| self.leaving.remove(&path))
            .map(|waiting| waiting.node);
        if let Some(node) = outgoing {
            if incoming.map(|(_, node)| node) != Some(node) {
                self.runner.skip(node, Direction::Exiting);
            }
        }
    }

    fn start_navigation(&mut self, pair: NavigationPair, host: &mut dyn RenderHost) -> Result<()> {
        let outgoing = self.leaving.remove(&pair.from).map(|waiting| waiting.node);
        let incoming = self.arriving.remove(&pair.to).map(|waiting| waiting.node);
        self.reported = None;

        let (Some(out_node), Some(in_node)) = (outgoing, incoming) else {
            self.settle_unpaired(
                PendingNavigation {
                    from: outgoing.map(|_| pair.from.clone()),
                    to: incoming.map(|_| pair.to.clone()),
                },
                host,
            );
            return Ok(());
        };

        if out_node == in_node {
            // The same root came straight back: not a navigation.
            self.reveal(&pair.to, in_node, host);
            return Ok(());
        }
        if pair.from == pair.to {
            self.runner.skip(out_node, Direction::Exiting);
            self.reveal(&pair.to, in_node, host);
            return Ok(());
        }

        let Resolution {
            definition,
            matched,
            rule_index,
            reversed,
            ..
        } = self.matcher.resolve(&pair.from, &pair.to);
        debug!(
            from = %pair.from,
            to = %pair.to,
            matched,
            rule = ?rule_index,
            reversed,
            "navigation resolved"
        );
        self.sync_events();
        self.events.push(TransitionEvent::NavigationResolved {
            from: Some(pair.from.clone()),
            to: pair.to.clone(),
            matched,
        });

        if let Some(params) = definition.shared() {
            self.start_heroes(&pair.from, out_node, in_node, params, host);
        }

        let exit = self.runner.exit(out_node, &definition);
        self.reclaim(&pair.to, in_node, host);
        let enter = self.runner.enter(in_node, &definition);
        if let Some(scope) = self.view_scope(&pair.to) {
            self.pin(scope, in_node);
        }
        // Origin frames land before the root is made visible.
        self.runner.flush_styles(host);
        self.show(in_node, host);

        exit.and(enter)
    }

    /// Pair keyed descendants of the two roots and drive each pair from one spring.
    fn start_heroes(
        &mut self,
        from_path: &str,
        out_root: NodeId,
        in_root: NodeId,
        params: SpringParams,
        host: &mut dyn RenderHost,
    ) {
        let root = host.root_rect();
        let correlation = self.correlator.correlate(out_root, in_root, root, host);
        let frame = Rect::new(0.0, 0.0, root.width, root.height);
        let departure = TransitionKey::view(from_path, out_root);

        self.sync_events();
        for pair in correlation.pairs {
            let morph = HeroMorph::new(HeroGeometry::compute(pair.from_rect, pair.to_rect, frame));
            let exit = self
                .runner
                .start_pair(pair.from_node, pair.to_node, params, morph);
            // The old root must outlive every morph leaving it.
            self.observer.extend(&departure, exit, pair.from_node);
            self.events.push(TransitionEvent::HeroPaired {
                key: pair.key,
                from_node: pair.from_node,
                to_node: pair.to_node,
            });
        }
    }

    /// Show a view immediately, without animation.
    fn reveal(&mut self, path: &str, node: NodeId, host: &mut dyn RenderHost) {
        self.reclaim(path, node, host);
        self.runner.skip(node, Direction::Entering);
        self.runner.flush_styles(host);
        self.show(node, host);
    }

    /// Bring back a root that is still departing under the same node.
    fn reclaim(&mut self, path: &str, node: NodeId, host: &mut dyn RenderHost) {
        let key = TransitionKey::view(path, node);
        if self.observer.departing_node(&key) == Some(node) {
            debug!(path, %node, "view re-mounted before its exit finished");
            host.restore_from_overlay(node);
        }
    }

    fn show(&self, node: NodeId, host: &mut dyn RenderHost) {
        if self.settings.navigation.hide_until_ready {
            host.apply_style(node, &StyleMap::new().visibility(Visibility::Visible));
        }
    }

    fn pin(&mut self, scope: ScopeId, node: NodeId) {
        if self.runner.state(node) == RunState::Entering
            && self
                .scopes
                .set_transitioning(scope, Some(Direction::Entering))
                .is_ok()
        {
            self.pinned.push((scope, node));
        }
    }

    // ---------------------------------------------------------------------
    // Elements
    // ---------------------------------------------------------------------

    /// An element was inserted under `key`.
    ///
    /// Returns the element's own scope, to pass as `scope_parent` for
    /// anything nested inside it. A key that is still running its exit is
    /// resumed from where that exit got to.
    pub fn register_element(
        &mut self,
        key: impl Into<TransitionKey>,
        node: NodeId,
        options: ElementOptions,
        host: &mut dyn RenderHost,
    ) -> Result<ScopeId> {
        let key = key.into();
        let ElementOptions {
            transition,
            scope_parent,
            kind,
        } = options;
        let scope = self.scopes.create_scope(scope_parent, kind)?;
        let started = self.start_element(key, node, transition, scope, host);
        self.runner.flush_styles(host);
        started.map(|()| scope)
    }

    fn start_element(
        &mut self,
        key: TransitionKey,
        node: NodeId,
        transition: TransitionDefinition,
        scope: ScopeId,
        host: &mut dyn RenderHost,
    ) -> Result<()> {
        if self.observer.is_pending(&key) {
            self.sync_events();
            self.observer.reinsert(
                key,
                node,
                transition,
                Some(scope),
                &mut self.runner,
                host,
                &mut self.events,
            )?;
            self.pin(scope, node);
            return Ok(());
        }

        self.observer
            .watch(key.clone(), node, transition.clone(), Some(scope));
        if self.runner.in_pair(node) {
            debug!(%key, %node, "element is mid-morph, leaving it to its pair");
            return Ok(());
        }
        if self.scopes.should_skip(scope, Direction::Entering) {
            debug!(%key, %node, "enter suppressed by entering container");
            self.runner.skip(node, Direction::Entering);
            return Ok(());
        }

        self.runner.enter(node, &transition)?;
        self.pin(scope, node);
        Ok(())
    }

    /// The element under `key` is being removed.
    ///
    /// Unknown keys are ignored. On a build error the node is still detached
    /// on the next tick.
    pub fn unregister_element(
        &mut self,
        key: impl Into<TransitionKey>,
        host: &mut dyn RenderHost,
    ) -> Result<()> {
        let key = key.into();
        let scope = self.observer.watched(&key).and_then(|element| element.scope);
        let intercepted = self
            .observer
            .intercept(&key, &mut self.runner, &self.scopes, host);
        self.runner.flush_styles(host);

        if let Some(scope) = scope.filter(|scope| self.scopes.contains(*scope)) {
            self.scopes.destroy_scope(scope)?;
        }
        intercepted.map(|_| ())
    }

    // ---------------------------------------------------------------------
    // Scopes
    // ---------------------------------------------------------------------

    pub fn create_scope(&mut self, parent: Option<ScopeId>, kind: ScopeKind) -> Result<ScopeId> {
        self.scopes.create_scope(parent, kind)
    }

    pub fn destroy_scope(&mut self, id: ScopeId) -> Result<()> {
        self.pinned.retain(|(scope, _)| *scope != id);
        self.scopes.destroy_scope(id)
    }

    /// Hold a scope in a transitioning state across frames.
    pub fn set_transitioning(&mut self, id: ScopeId, direction: Option<Direction>) -> Result<()> {
        self.pinned.retain(|(scope, _)| *scope != id);
        self.scopes.set_transitioning(id, direction)
    }

    // ---------------------------------------------------------------------
    // Frame loop
    // ---------------------------------------------------------------------

    /// Advance every transition by `delta_ms` and detach finished exits.
    pub fn tick(&mut self, delta_ms: f64, host: &mut dyn RenderHost) {
        self.frame += 1;
        self.runner.tick(delta_ms, host);
        self.release_pins();
        self.resolve_stragglers(host);
        self.runner.flush_styles(host);

        self.sync_events();
        self.observer
            .collect(&mut self.runner, host, &mut self.events);

        self.heuristic.end_frame();
        self.scopes.end_frame();
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = TransitionEvent> + '_ {
        self.sync_events();
        self.events.drain()
    }

    /// True while any spring is running or any node waits to be detached.
    pub fn is_animating(&self) -> bool {
        self.runner.has_active() || self.observer.departing_count() > 0
    }

    fn release_pins(&mut self) {
        let (done, live): (Vec<_>, Vec<_>) = self
            .pinned
            .drain(..)
            .partition(|(_, node)| self.runner.state(*node) != RunState::Entering);
        self.pinned = live;

        for (scope, _) in done {
            let still_entering = self
                .scopes
                .get(scope)
                .is_some_and(|node| node.transitioning == Some(Direction::Entering));
            if still_entering {
                // Cannot fail: the scope was just looked up.
                self.scopes.set_transitioning(scope, None).ok();
            }
        }
    }

    /// Pair or settle view halves the detector could not pair on its own.
    fn resolve_stragglers(&mut self, host: &mut dyn RenderHost) {
        // Hosts that never report removals leave the old root mounted next
        // to the new one.
        let arrivals: Vec<String> = self.arriving.keys().cloned().collect();
        for to in arrivals {
            let Some(from) = self.infer_origin(&to) else {
                continue;
            };
            debug!(%from, %to, "inferred navigation from live roots");
            if let Err(error) = self.unmount_view(&from, host) {
                warn!(%from, %to, %error, "inferred navigation failed to start");
            }
        }

        let frame = self.frame;
        let expired = |waiting: &Waiting| waiting.since + PAIRING_GRACE_TICKS < frame;
        let stale_in: Vec<String> = self
            .arriving
            .iter()
            .filter(|(_, waiting)| expired(*waiting))
            .map(|(path, _)| path.clone())
            .collect();
        let stale_out: Vec<String> = self
            .leaving
            .iter()
            .filter(|(_, waiting)| expired(*waiting))
            .map(|(path, _)| path.clone())
            .collect();

        if !stale_in.is_empty() || !stale_out.is_empty() {
            debug!(?stale_in, ?stale_out, "unpaired view events, completing without animation");
            self.detector.reset();
        }
        for path in stale_in {
            if let Some(waiting) = self.arriving.remove(&path) {
                self.reveal(&path, waiting.node, host);
            }
        }
        for path in stale_out {
            if let Some(waiting) = self.leaving.remove(&path) {
                self.runner.skip(waiting.node, Direction::Exiting);
            }
        }

        if self
            .reported
            .as_ref()
            .is_some_and(|(_, since)| since + PAIRING_GRACE_TICKS < frame)
        {
            self.reported = None;
        }
    }

    /// Root the arriving view at `to` replaces, if one is still mounted.
    fn infer_origin(&self, to: &str) -> Option<String> {
        let mounted = |pair: &NavigationPair| pair.to == to && self.views.contains_key(&pair.from);

        if let Some((pair, _)) = &self.reported {
            if mounted(pair) {
                return Some(pair.from.clone());
            }
        }
        self.heuristic
            .infer()
            .filter(|pair| mounted(pair))
            .map(|pair| pair.from)
    }

    fn sync_events(&mut self) {
        for event in self.runner.drain_events() {
            self.events.push(event);
        }
    }
}
