#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use glide_core::{
    Direction, Engine, NodeId, Rect, RenderHost, SpringParams, SpringSpec, StyleMap,
    TransitionDefinition,
};

/// Host that records every call the engine makes.
#[derive(Debug, Default)]
pub struct RecordingHost {
    pub root: Rect,
    pub rects: HashMap<NodeId, Rect>,
    pub keys: HashMap<NodeId, Vec<(String, NodeId)>>,
    /// Attribute the keyed descendants are tagged with.
    pub key_attribute: String,
    pub styles: HashMap<NodeId, Vec<StyleMap>>,
    pub overlay: Vec<NodeId>,
    pub restored: Vec<NodeId>,
    pub detached: Vec<NodeId>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self {
            root: Rect::new(0.0, 0.0, 1000.0, 1000.0),
            key_attribute: "data-hero-key".to_string(),
            ..Self::default()
        }
    }

    pub fn with_rect(mut self, node: NodeId, rect: Rect) -> Self {
        self.rects.insert(node, rect);
        self
    }

    pub fn with_keys(mut self, root: NodeId, keys: &[(&str, NodeId)]) -> Self {
        self.keys.insert(
            root,
            keys.iter()
                .map(|(key, node)| (key.to_string(), *node))
                .collect(),
        );
        self
    }

    pub fn last_style(&self, node: NodeId) -> Option<&StyleMap> {
        self.styles.get(&node).and_then(|styles| styles.last())
    }

    pub fn style_count(&self, node: NodeId) -> usize {
        self.styles.get(&node).map_or(0, Vec::len)
    }

    pub fn is_lifted(&self, node: NodeId) -> bool {
        self.overlay.contains(&node)
    }
}

impl RenderHost for RecordingHost {
    fn root_rect(&self) -> Rect {
        self.root
    }

    fn bounding_rect(&self, node: NodeId) -> Option<Rect> {
        Some(
            self.rects
                .get(&node)
                .copied()
                .unwrap_or(Rect::new(0.0, 0.0, 100.0, 100.0)),
        )
    }

    fn apply_style(&mut self, node: NodeId, style: &StyleMap) {
        self.styles.entry(node).or_default().push(style.clone());
    }

    fn lift_to_overlay(&mut self, node: NodeId, _rect: Rect) {
        if !self.overlay.contains(&node) {
            self.overlay.push(node);
        }
    }

    fn restore_from_overlay(&mut self, node: NodeId) {
        self.overlay.retain(|lifted| *lifted != node);
        self.restored.push(node);
    }

    fn finish_detach(&mut self, node: NodeId) {
        self.overlay.retain(|lifted| *lifted != node);
        self.detached.push(node);
    }

    fn correlation_keys(&self, root: NodeId, attribute: &str) -> Vec<(String, NodeId)> {
        if attribute != self.key_attribute {
            return Vec::new();
        }
        self.keys.get(&root).cloned().unwrap_or_default()
    }
}

/// `(node, direction, progress)` for every frame callback.
pub type FrameLog = Rc<RefCell<Vec<(NodeId, Direction, f64)>>>;

pub fn frame_log() -> FrameLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// Definition that records its frames into `log`.
pub fn logging(log: &FrameLog) -> TransitionDefinition {
    logging_with(log, SpringParams::default())
}

pub fn logging_with(log: &FrameLog, params: SpringParams) -> TransitionDefinition {
    let enter_log = log.clone();
    let exit_log = log.clone();
    TransitionDefinition::new()
        .with_enter(move |node| {
            let log = enter_log.clone();
            SpringSpec::mutate(params, move |p| {
                log.borrow_mut().push((node, Direction::Entering, p))
            })
        })
        .with_exit(move |node| {
            let log = exit_log.clone();
            SpringSpec::mutate(params, move |p| {
                log.borrow_mut().push((node, Direction::Exiting, p))
            })
        })
}

pub fn frames_for(log: &FrameLog, node: NodeId, direction: Direction) -> Vec<f64> {
    log.borrow()
        .iter()
        .filter(|(n, d, _)| *n == node && *d == direction)
        .map(|(_, _, p)| *p)
        .collect()
}

pub const FRAME_MS: f64 = 16.0;

pub fn run_frames(engine: &mut Engine, host: &mut RecordingHost, frames: usize) {
    for _ in 0..frames {
        engine.tick(FRAME_MS, host);
    }
}

/// Tick until nothing is running or waiting to be detached.
pub fn settle(engine: &mut Engine, host: &mut RecordingHost) -> usize {
    let mut frames = 0;
    while engine.is_animating() {
        engine.tick(FRAME_MS, host);
        frames += 1;
        assert!(frames < 1000, "engine never went idle");
    }
    frames
}
