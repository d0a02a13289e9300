//! Rule matching: navigation pair to transition definition.
//!
//! Rules pair a `from` pattern with a `to` pattern:
//!
//! - `*` matches any path
//! - `/blog/*` matches `/blog` and anything under `/blog/`
//! - anything else matches exactly
//!
//! Every rule matching both sides is a candidate. The most specific candidate
//! wins, ranked first by how many sides are exact and then by how many
//! literal segments its wildcard prefixes carry. Ties go to the rule declared
//! first, and a rule's forward direction beats its symmetric reverse.
//!
//! # Usage
//!
//! ```ignore
//! let config = TransitionConfig::new()
//!     .rule(TransitionRule::new("/", "/post/*", slide_left).symmetric())
//!     .rule(TransitionRule::new("*", "*", fade))
//!     .default_transition(fade);
//!
//! let matcher = RuleMatcher::new(config);
//! let resolution = matcher.resolve("/post/1", "/");
//! assert!(resolution.reversed);
//! ```

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::definition::TransitionDefinition;

/// One side of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathPattern {
    /// `*`
    Any,
    /// `/prefix/*`, stored without the trailing `/*`
    Prefix(String),
    Exact(String),
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Self {
        if pattern == "*" {
            Self::Any
        } else if let Some(prefix) = pattern.strip_suffix("/*") {
            Self::Prefix(prefix.to_string())
        } else {
            Self::Exact(pattern.to_string())
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Prefix(prefix) => {
                path == prefix
                    || path
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            Self::Exact(exact) => path == exact,
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Exact(_))
    }

    /// Literal segments in a wildcard prefix (`/a/b/*` has two).
    fn prefix_segments(&self) -> usize {
        match self {
            Self::Prefix(prefix) => prefix.split('/').filter(|s| !s.is_empty()).count(),
            _ => 0,
        }
    }
}

impl From<&str> for PathPattern {
    fn from(pattern: &str) -> Self {
        Self::parse(pattern)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Prefix(prefix) => write!(f, "{prefix}/*"),
            Self::Exact(exact) => f.write_str(exact),
        }
    }
}

/// A `(from, to)` navigation between two views.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NavigationPair {
    pub from: String,
    pub to: String,
}

impl NavigationPair {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

pub type DefinitionFactory = Rc<dyn Fn() -> TransitionDefinition>;
pub type Middleware = Rc<dyn Fn(&str, &str) -> NavigationPair>;

#[derive(Clone)]
pub struct TransitionRule {
    pub from: PathPattern,
    pub to: PathPattern,
    build: DefinitionFactory,
    pub symmetric: bool,
}

impl TransitionRule {
    pub fn new<F>(from: impl Into<PathPattern>, to: impl Into<PathPattern>, build: F) -> Self
    where
        F: Fn() -> TransitionDefinition + 'static,
    {
        Self {
            from: from.into(),
            to: to.into(),
            build: Rc::new(build),
            symmetric: false,
        }
    }

    /// Also match the reversed pair, with enter and exit swapped.
    pub fn symmetric(mut self) -> Self {
        self.symmetric = true;
        self
    }

    pub fn definition(&self) -> TransitionDefinition {
        (self.build)()
    }

    fn specificity(&self) -> (usize, usize) {
        let exact = usize::from(self.from.is_exact()) + usize::from(self.to.is_exact());
        (exact, self.from.prefix_segments() + self.to.prefix_segments())
    }
}

impl fmt::Debug for TransitionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionRule")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("symmetric", &self.symmetric)
            .finish_non_exhaustive()
    }
}

/// Rules, fallback and middleware for one orchestration root.
#[derive(Clone, Default)]
pub struct TransitionConfig {
    pub rules: Vec<TransitionRule>,
    default_transition: Option<DefinitionFactory>,
    middleware: Option<Middleware>,
}

impl TransitionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, rule: TransitionRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Used when no rule matches. Without one, unmatched navigations do not animate.
    pub fn default_transition<F>(mut self, build: F) -> Self
    where
        F: Fn() -> TransitionDefinition + 'static,
    {
        self.default_transition = Some(Rc::new(build));
        self
    }

    /// Rewrite `(from, to)` before matching.
    pub fn middleware<F>(mut self, rewrite: F) -> Self
    where
        F: Fn(&str, &str) -> NavigationPair + 'static,
    {
        self.middleware = Some(Rc::new(rewrite));
        self
    }
}

impl fmt::Debug for TransitionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionConfig")
            .field("rules", &self.rules)
            .field("default_transition", &self.default_transition.is_some())
            .field("middleware", &self.middleware.is_some())
            .finish()
    }
}

/// Outcome of resolving a navigation pair.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub definition: TransitionDefinition,
    /// False when the default (or nothing) was used.
    pub matched: bool,
    pub rule_index: Option<usize>,
    /// The winning rule matched in its symmetric reverse direction.
    pub reversed: bool,
    /// The pair after middleware.
    pub pair: NavigationPair,
}

#[derive(Debug, Clone, Default)]
pub struct RuleMatcher {
    config: TransitionConfig,
}

impl RuleMatcher {
    pub fn new(config: TransitionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransitionConfig {
        &self.config
    }

    pub fn resolve(&self, from: &str, to: &str) -> Resolution {
        let pair = self.rewrite(from, to);

        match self.best_match(&pair) {
            Some((index, reversed)) => {
                let definition = self.config.rules[index].definition();
                Resolution {
                    definition: if reversed {
                        definition.swapped()
                    } else {
                        definition
                    },
                    matched: true,
                    rule_index: Some(index),
                    reversed,
                    pair,
                }
            }
            None => Resolution {
                definition: self
                    .config
                    .default_transition
                    .as_ref()
                    .map(|build| build())
                    .unwrap_or_default(),
                matched: false,
                rule_index: None,
                reversed: false,
                pair,
            },
        }
    }

    /// True if a configured rule (not the default) matches.
    pub fn has_match(&self, from: &str, to: &str) -> bool {
        self.best_match(&self.rewrite(from, to)).is_some()
    }

    fn rewrite(&self, from: &str, to: &str) -> NavigationPair {
        match &self.config.middleware {
            Some(rewrite) => rewrite(from, to),
            None => NavigationPair::new(from, to),
        }
    }

    /// Index of the winning rule and whether it matched in reverse.
    fn best_match(&self, pair: &NavigationPair) -> Option<(usize, bool)> {
        let mut best: Option<((usize, usize), usize, bool)> = None;

        for (index, rule) in self.config.rules.iter().enumerate() {
            let forward = rule.from.matches(&pair.from) && rule.to.matches(&pair.to);
            let reverse =
                rule.symmetric && rule.from.matches(&pair.to) && rule.to.matches(&pair.from);

            for (hit, reversed) in [(forward, false), (reverse, true)] {
                if !hit {
                    continue;
                }
                let score = rule.specificity();
                if best.is_none_or(|(top, _, _)| score > top) {
                    best = Some((score, index, reversed));
                }
            }
        }

        best.map(|(_, index, reversed)| (index, reversed))
    }
}
