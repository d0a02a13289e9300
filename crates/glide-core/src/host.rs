//! The seam between the engine and a host UI framework.

use crate::style::StyleMap;
use crate::types::{NodeId, Rect};

/// Operations an adapter performs on the host render tree on the engine's behalf.
///
/// All rects are in host pixels in the same coordinate space (typically the
/// viewport); the engine converts them relative to `root_rect` itself.
pub trait RenderHost {
    /// Bounding box of the orchestration root.
    fn root_rect(&self) -> Rect;

    /// Current on-screen bounding box of `node`, or `None` if it is not laid out.
    fn bounding_rect(&self, node: NodeId) -> Option<Rect>;

    /// Write style properties onto `node`.
    fn apply_style(&mut self, node: NodeId, style: &StyleMap);

    /// Keep a node the framework has removed visible, pinned at `rect` in a
    /// fixed-position overlay so siblings reflow immediately.
    fn lift_to_overlay(&mut self, node: NodeId, rect: Rect);

    /// Undo `lift_to_overlay`; the node is being kept after a rapid re-insert.
    fn restore_from_overlay(&mut self, node: NodeId);

    /// Physically remove a node whose exit has finished.
    fn finish_detach(&mut self, node: NodeId);

    /// Descendants of `root` whose `attribute` carries a correlation key, in
    /// document order.
    fn correlation_keys(&self, root: NodeId, attribute: &str) -> Vec<(String, NodeId)>;
}
