//! Spring-driven transition orchestration for host UI frameworks.
//!
//! This crate provides:
//! - **Spring timing**: a damped-oscillator simulator and one frame scheduler driving every spring
//! - **Transitions**: per-node enter/exit state machines with interruption and reversal
//! - **Deferred removal**: nodes stay attached until their exit has finished
//! - **Navigation**: rule matching and pairing of leaving/arriving view roots
//! - **Shared elements**: keyed descendants morphing across a navigation
//!
//! # Architecture
//!
//! ```text
//! Engine
//!   ├── RuleMatcher          (from, to) → TransitionDefinition
//!   ├── NavigationDetector   view OUT/IN events → navigation pair
//!   ├── HeroCorrelator       keyed descendants → synchronized pairs
//!   ├── ExitObserver         intercept removal → finish_detach
//!   ├── ScopeRegistry        nested transition suppression
//!   └── TransitionRunner
//!         └── FrameScheduler → SpringSimulator (one per running node or pair)
//! ```
//!
//! The host side is abstracted by [`RenderHost`]; nothing here depends on a
//! particular UI framework.

pub mod definition;
pub mod detector;
pub mod engine;
pub mod error;
pub mod events;
pub mod exit_observer;
pub mod hero;
pub mod host;
pub mod matcher;
pub mod presets;
pub mod runner;
pub mod scheduler;
pub mod scope;
pub mod spring;
pub mod style;
pub mod types;

pub use definition::TransitionDefinition;
pub use detector::{Detection, NavigationDetector, RootOrderHeuristic, ViewSide, detector_for};
pub use engine::{ElementOptions, Engine};
pub use error::{GlideError, Result};
pub use events::{EventQueue, TransitionEvent};
pub use exit_observer::ExitObserver;
pub use hero::{Correlation, DEFAULT_KEY_ATTRIBUTE, HeroCorrelator, HeroGeometry, HeroMorph, HeroPair};
pub use host::RenderHost;
pub use matcher::{NavigationPair, PathPattern, Resolution, RuleMatcher, TransitionConfig, TransitionRule};
pub use presets::{PresetName, preset, preset_by_name};
pub use runner::{ExitHandle, ExitOutcome, RunState, TransitionRunner};
pub use scheduler::{FrameScheduler, SimulatorHandle};
pub use scope::{ScopeId, ScopeKind, ScopeRegistry};
pub use spring::{
    Callbacks, OnFrame, ProgressRange, SimulationSettings, SpringParams, SpringSimulator,
    SpringSpec, SpringStatus,
};
pub use style::{ClipInset, StyleMap, StyleProperty, StyleValue, Transform, Visibility};
pub use types::{Direction, NodeId, Rect, TransitionKey};
