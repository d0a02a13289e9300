//! Shared-element ("hero") correlation and morph geometry.
//!
//! On a page navigation with shared elements enabled, descendants of the
//! leaving and entering roots that advertise the same correlation key are
//! paired. Each pair is driven by one spring: the outgoing element moves and
//! scales onto the incoming element's box while fading out, and the incoming
//! element starts on the outgoing element's box and settles to identity while
//! fading in. Both share a clip inset expressed in percent of the
//! orchestration root.
//!
//! Rects are measured relative to the orchestration root so the morph is
//! stable under scrolling.
//!
//! # Usage
//!
//! ```ignore
//! let correlator = HeroCorrelator::new(Some(700.0)).with_key_attribute("data-hero-key");
//! let correlation = correlator.correlate(old_root, new_root, host.root_rect(), &host);
//! for pair in &correlation.pairs {
//!     let morph = HeroMorph::new(HeroGeometry::compute(pair.from_rect, pair.to_rect, root));
//!     runner.start_pair(pair.from_node, pair.to_node, params, morph);
//! }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::host::RenderHost;
use crate::style::{ClipInset, Interpolate, StyleMap, Transform};
use crate::types::{NodeId, Rect};

/// A leaving and an entering element sharing a correlation key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroPair {
    pub key: String,
    pub from_node: NodeId,
    pub to_node: NodeId,
    /// Relative to the orchestration root.
    pub from_rect: Rect,
    /// Relative to the orchestration root.
    pub to_rect: Rect,
}

/// Result of correlating two roots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Correlation {
    pub pairs: Vec<HeroPair>,
    /// Keyed outgoing elements with no usable counterpart.
    pub unmatched_outgoing: Vec<NodeId>,
    /// Keyed incoming elements with no usable counterpart.
    pub unmatched_incoming: Vec<NodeId>,
}

/// Deltas between a pair's boxes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeroGeometry {
    pub from: Rect,
    pub to: Rect,
    /// `to.center - from.center`
    pub translate: (f64, f64),
    /// `to.top_left - from.top_left`
    pub origin_delta: (f64, f64),
    /// Uniform scale, `max(to.w / from.w, to.h / from.h)`.
    pub scale: f64,
    pub from_clip: ClipInset,
    pub to_clip: ClipInset,
}

impl HeroGeometry {
    /// `from` and `to` must already be relative to `root`.
    pub fn compute(from: Rect, to: Rect, root: Rect) -> Self {
        let (fx, fy) = from.center();
        let (tx, ty) = to.center();
        let scale = (to.width / from.width).max(to.height / from.height);

        Self {
            from,
            to,
            translate: (tx - fx, ty - fy),
            origin_delta: (to.x - from.x, to.y - from.y),
            scale,
            from_clip: clip_within(from, root),
            to_clip: clip_within(to, root),
        }
    }

    /// Transform carrying the outgoing box onto the incoming one (center origin).
    pub fn forward(&self) -> Transform {
        Transform::translate(self.translate.0, self.translate.1).with_uniform_scale(self.scale)
    }

    /// Transform carrying the incoming box back onto the outgoing one.
    pub fn inverse(&self) -> Transform {
        Transform::translate(-self.translate.0, -self.translate.1).with_uniform_scale(1.0 / self.scale)
    }

    pub fn clip_at(&self, progress: f64) -> ClipInset {
        self.from_clip.interpolate(&self.to_clip, progress)
    }
}

fn clip_within(rect: Rect, root: Rect) -> ClipInset {
    if !root.is_measurable() {
        return ClipInset::default();
    }
    ClipInset {
        top: rect.y / root.height * 100.0,
        right: (root.width - rect.right()) / root.width * 100.0,
        bottom: (root.height - rect.bottom()) / root.height * 100.0,
        left: rect.x / root.width * 100.0,
    }
}

/// Per-frame styles for both sides of a pair at a shared progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeroMorph {
    geometry: HeroGeometry,
}

impl HeroMorph {
    pub fn new(geometry: HeroGeometry) -> Self {
        Self { geometry }
    }

    pub fn geometry(&self) -> &HeroGeometry {
        &self.geometry
    }

    pub fn outgoing_style(&self, progress: f64) -> StyleMap {
        StyleMap::new()
            .transform_origin("center")
            .transform(Transform::IDENTITY.interpolate(&self.geometry.forward(), progress))
            .clip_inset(self.geometry.clip_at(progress))
            .opacity(1.0 - progress)
    }

    pub fn incoming_style(&self, progress: f64) -> StyleMap {
        StyleMap::new()
            .transform_origin("center")
            .transform(self.geometry.inverse().interpolate(&Transform::IDENTITY, progress))
            .clip_inset(self.geometry.clip_at(progress))
            .opacity(progress)
    }
}

/// Attribute correlation keys are read from unless configured otherwise.
pub const DEFAULT_KEY_ATTRIBUTE: &str = "data-hero-key";

/// Pairs keyed descendants of two roots.
#[derive(Debug, Clone)]
pub struct HeroCorrelator {
    max_distance: Option<f64>,
    key_attribute: String,
}

impl Default for HeroCorrelator {
    fn default() -> Self {
        Self::new(None)
    }
}

impl HeroCorrelator {
    /// Pairs whose centers are further apart vertically than `max_distance`
    /// are left unmatched.
    pub fn new(max_distance: Option<f64>) -> Self {
        Self {
            max_distance,
            key_attribute: DEFAULT_KEY_ATTRIBUTE.to_string(),
        }
    }

    pub fn with_key_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.key_attribute = attribute.into();
        self
    }

    pub fn key_attribute(&self) -> &str {
        &self.key_attribute
    }

    pub fn correlate(
        &self,
        out_root: NodeId,
        in_root: NodeId,
        root_rect: Rect,
        host: &dyn RenderHost,
    ) -> Correlation {
        let mut correlation = Correlation::default();

        let (outgoing, dup_out) = first_per_key(host.correlation_keys(out_root, &self.key_attribute));
        let (incoming, dup_in) = first_per_key(host.correlation_keys(in_root, &self.key_attribute));
        correlation.unmatched_outgoing.extend(dup_out);
        correlation.unmatched_incoming.extend(dup_in);

        let incoming_index: HashMap<&str, NodeId> =
            incoming.iter().map(|(k, n)| (k.as_str(), *n)).collect();
        let mut paired_incoming = Vec::new();

        for (key, from_node) in &outgoing {
            let Some(&to_node) = incoming_index.get(key.as_str()) else {
                correlation.unmatched_outgoing.push(*from_node);
                continue;
            };

            match self.measure(*from_node, to_node, root_rect, host) {
                Some((from_rect, to_rect)) => {
                    paired_incoming.push(to_node);
                    correlation.pairs.push(HeroPair {
                        key: key.clone(),
                        from_node: *from_node,
                        to_node,
                        from_rect,
                        to_rect,
                    });
                }
                None => {
                    tracing::debug!(%key, "shared element not morphable, using plain transition");
                    correlation.unmatched_outgoing.push(*from_node);
                }
            }
        }

        correlation.unmatched_incoming.extend(
            incoming
                .iter()
                .map(|(_, node)| *node)
                .filter(|node| !paired_incoming.contains(node)),
        );

        correlation
    }

    fn measure(
        &self,
        from_node: NodeId,
        to_node: NodeId,
        root_rect: Rect,
        host: &dyn RenderHost,
    ) -> Option<(Rect, Rect)> {
        let from = host.bounding_rect(from_node)?.relative_to(&root_rect);
        let to = host.bounding_rect(to_node)?.relative_to(&root_rect);
        if !from.is_measurable() || !to.is_measurable() {
            return None;
        }
        if let Some(max) = self.max_distance {
            if (to.center().1 - from.center().1).abs() > max {
                return None;
            }
        }
        Some((from, to))
    }
}

/// Keep the first node per key; later duplicates are returned separately.
fn first_per_key(keys: Vec<(String, NodeId)>) -> (Vec<(String, NodeId)>, Vec<NodeId>) {
    let mut firsts: Vec<(String, NodeId)> = Vec::new();
    let mut duplicates = Vec::new();
    for (key, node) in keys {
        if firsts.iter().any(|(k, _)| *k == key) {
            duplicates.push(node);
        } else {
            firsts.push((key, node));
        }
    }
    (firsts, duplicates)
}
