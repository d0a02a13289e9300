//! Error types for the transition engine.

use thiserror::Error;

use crate::scope::ScopeId;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, GlideError>;

/// Errors surfaced synchronously to the caller that supplied bad input.
///
/// Match misses, correlation misses and runaway springs are not errors; the
/// engine degrades to "no animation" for those and keeps going.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GlideError {
    /// A spring parameter was non-finite or outside its valid range.
    #[error("invalid spring {parameter}: {value} ({expected})")]
    InvalidSpring {
        parameter: &'static str,
        value: f64,
        expected: &'static str,
    },

    /// A preset name did not match any registered transition.
    #[error("unknown transition preset: {0}")]
    UnknownPreset(String),

    /// A scope id was not (or no longer) registered.
    #[error("unknown scope: {0:?}")]
    UnknownScope(ScopeId),

    /// A view path was not mounted.
    #[error("unknown view: {0}")]
    UnknownView(String),
}
