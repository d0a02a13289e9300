//! Glide: spring-driven page and element transitions.
//!
//! Re-exports the engine and its configuration crate under one name.

pub use glide_config as config;
pub use glide_core::*;
