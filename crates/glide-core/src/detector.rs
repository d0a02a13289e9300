//! Navigation detection: pairing view OUT and IN events into a navigation.
//!
//! Hosts report a view leaving (OUT) and a view arriving (IN) separately and
//! not always in the same order:
//!
//! - `OutFirstDetector`: hosts with native destroy callbacks report OUT
//!   before IN. An IN with no preceding OUT is a first render or refresh and
//!   never animates.
//! - `AnyOrderDetector`: hosts observing removals after the fact may report
//!   either side first. A different path arriving on an already filled side
//!   abandons the pending pair.
//!
//! `RootOrderHeuristic` covers hosts that cannot report OUT at all: when two
//! view roots coexist in one frame, the root that was already present in the
//! previous frame is the one being left.

use glide_config::DetectorStrategy;

use crate::matcher::NavigationPair;

/// Which half of a navigation a view event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewSide {
    Out,
    In,
}

/// Half-filled navigation waiting for its counterpart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingNavigation {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Result of feeding one view event to a detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// Waiting for the other half.
    Pending,
    /// Both halves are known.
    Paired(NavigationPair),
    /// The event does not belong to a navigation (first render or refresh).
    Skip,
    /// A newer navigation replaced the pending one, which will never pair.
    Superseded {
        stale: PendingNavigation,
        /// State after recording the new event.
        next: Box<Detection>,
    },
}

pub trait NavigationDetector: std::fmt::Debug {
    fn trigger(&mut self, path: &str, side: ViewSide) -> Detection;

    fn pending(&self) -> Option<&PendingNavigation>;

    /// Drop any half-filled pair, returning it.
    fn reset(&mut self) -> Option<PendingNavigation>;
}

/// Build the detector configured by `strategy`.
pub fn detector_for(strategy: DetectorStrategy) -> Box<dyn NavigationDetector> {
    match strategy {
        DetectorStrategy::OutFirst => Box::new(OutFirstDetector::default()),
        DetectorStrategy::AnyOrder => Box::new(AnyOrderDetector::default()),
    }
}

fn record(pending: &mut Option<PendingNavigation>, path: &str, side: ViewSide) -> Detection {
    let slot = pending.get_or_insert_with(PendingNavigation::default);
    match side {
        ViewSide::Out => slot.from = Some(path.to_string()),
        ViewSide::In => slot.to = Some(path.to_string()),
    }

    match (slot.from.clone(), slot.to.clone()) {
        (Some(from), Some(to)) => {
            *pending = None;
            Detection::Paired(NavigationPair { from, to })
        }
        _ => Detection::Pending,
    }
}

#[derive(Debug, Default)]
pub struct OutFirstDetector {
    pending: Option<PendingNavigation>,
}

impl NavigationDetector for OutFirstDetector {
    fn trigger(&mut self, path: &str, side: ViewSide) -> Detection {
        let has_out = self.pending.as_ref().is_some_and(|p| p.from.is_some());
        if side == ViewSide::In && !has_out {
            return Detection::Skip;
        }
        record(&mut self.pending, path, side)
    }

    fn pending(&self) -> Option<&PendingNavigation> {
        self.pending.as_ref()
    }

    fn reset(&mut self) -> Option<PendingNavigation> {
        self.pending.take()
    }
}

#[derive(Debug, Default)]
pub struct AnyOrderDetector {
    pending: Option<PendingNavigation>,
}

impl NavigationDetector for AnyOrderDetector {
    fn trigger(&mut self, path: &str, side: ViewSide) -> Detection {
        let replaces = self.pending.as_ref().is_some_and(|p| {
            let filled = match side {
                ViewSide::Out => &p.from,
                ViewSide::In => &p.to,
            };
            filled.as_deref().is_some_and(|existing| existing != path)
        });

        if replaces {
            let stale = self.pending.take().unwrap_or_default();
            let next = record(&mut self.pending, path, side);
            return Detection::Superseded {
                stale,
                next: Box::new(next),
            };
        }
        record(&mut self.pending, path, side)
    }

    fn pending(&self) -> Option<&PendingNavigation> {
        self.pending.as_ref()
    }

    fn reset(&mut self) -> Option<PendingNavigation> {
        self.pending.take()
    }
}

/// Infers `from`/`to` from the order view roots appear in.
#[derive(Debug, Default, Clone)]
pub struct RootOrderHeuristic {
    /// Roots present at the end of the previous frame.
    previous: Vec<String>,
    /// Live roots in insertion order.
    current: Vec<String>,
}

impl RootOrderHeuristic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe_insert(&mut self, path: &str) {
        self.current.retain(|p| p != path);
        self.current.push(path.to_string());
    }

    pub fn observe_remove(&mut self, path: &str) {
        self.current.retain(|p| p != path);
    }

    pub fn end_frame(&mut self) {
        self.previous.clone_from(&self.current);
    }

    /// Best guess at the navigation implied by the live roots.
    ///
    /// `from` is the most recently inserted root that was already present in
    /// the previous frame; `to` is the most recently inserted root that was not.
    pub fn infer(&self) -> Option<NavigationPair> {
        if self.current.len() < 2 {
            return None;
        }
        let from = self
            .current
            .iter()
            .rev()
            .find(|p| self.previous.contains(p))?;
        let to = self
            .current
            .iter()
            .rev()
            .find(|p| !self.previous.contains(p))?;
        Some(NavigationPair::new(from.clone(), to.clone()))
    }

    pub fn live(&self) -> &[String] {
        &self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_first_pairs_in_order() {
        let mut detector = OutFirstDetector::default();
        assert_eq!(detector.trigger("/a", ViewSide::Out), Detection::Pending);
        assert_eq!(
            detector.trigger("/b", ViewSide::In),
            Detection::Paired(NavigationPair::new("/a", "/b"))
        );
        assert!(detector.pending().is_none());
    }

    #[test]
    fn test_out_first_in_without_out_is_refresh() {
        let mut detector = OutFirstDetector::default();
        assert_eq!(detector.trigger("/b", ViewSide::In), Detection::Skip);
        assert!(detector.pending().is_none());
    }

    #[test]
    fn test_any_order_pairs_either_way() {
        let mut detector = AnyOrderDetector::default();
        assert_eq!(detector.trigger("/b", ViewSide::In), Detection::Pending);
        assert_eq!(
            detector.trigger("/a", ViewSide::Out),
            Detection::Paired(NavigationPair::new("/a", "/b"))
        );
    }

    #[test]
    fn test_any_order_new_path_supersedes_pending() {
        let mut detector = AnyOrderDetector::default();
        detector.trigger("/b", ViewSide::In);

        let detection = detector.trigger("/c", ViewSide::In);
        let Detection::Superseded { stale, next } = detection else {
            panic!("expected supersede, got {detection:?}");
        };
        assert_eq!(stale.to.as_deref(), Some("/b"));
        assert_eq!(*next, Detection::Pending);
        assert_eq!(
            detector.pending().and_then(|p| p.to.as_deref()),
            Some("/c")
        );

        // Same path again is not a new navigation
        assert_eq!(detector.trigger("/c", ViewSide::In), Detection::Pending);
    }

    #[test]
    fn test_detector_for_strategy() {
        let mut detector = detector_for(DetectorStrategy::AnyOrder);
        assert_eq!(detector.trigger("/b", ViewSide::In), Detection::Pending);
        assert!(detector.reset().is_some());

        let mut detector = detector_for(DetectorStrategy::OutFirst);
        assert_eq!(detector.trigger("/b", ViewSide::In), Detection::Skip);
    }

    #[test]
    fn test_root_order_two_roots() {
        let mut heuristic = RootOrderHeuristic::new();
        heuristic.observe_insert("/a");
        heuristic.end_frame();
        assert_eq!(heuristic.infer(), None);

        heuristic.observe_insert("/b");
        assert_eq!(heuristic.infer(), Some(NavigationPair::new("/a", "/b")));

        heuristic.observe_remove("/a");
        heuristic.end_frame();
        assert_eq!(heuristic.infer(), None);
    }

    #[test]
    fn test_root_order_prefers_most_recent_insertions() {
        let mut heuristic = RootOrderHeuristic::new();
        heuristic.observe_insert("/a");
        heuristic.observe_insert("/b");
        heuristic.end_frame();

        heuristic.observe_insert("/c");
        heuristic.observe_insert("/d");
        assert_eq!(heuristic.infer(), Some(NavigationPair::new("/b", "/d")));
    }
}
