//! Spring physics used as the timing source for every transition.
//!
//! A spring integrates a damped harmonic oscillator with semi-implicit Euler:
//!
//! ```text
//! velocity += (stiffness * (target - x) - damping * velocity) / mass * dt
//! x        += velocity * dt
//! ```
//!
//! Progress is not clamped, so under-damped springs overshoot their target.
//!
//! # Usage
//!
//! ```ignore
//! use glide_core::spring::{SimulationSettings, SpringParams, SpringSimulator, SpringStatus};
//!
//! let mut sim = SpringSimulator::new(SpringParams::default(), 0.0, 1.0, SimulationSettings::default());
//! while sim.step(16.0) == SpringStatus::Running {
//!     render(sim.position());
//! }
//! ```

use std::fmt;

use glide_config::{SimulationConfig, SpringConfig};
use serde::{Deserialize, Serialize};

use crate::error::{GlideError, Result};
use crate::style::StyleMap;

/// Stiffness, damping and mass of a spring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpringParams {
    pub stiffness: f64,
    pub damping: f64,
    pub mass: f64,
}

impl Default for SpringParams {
    fn default() -> Self {
        Self {
            stiffness: 300.0,
            damping: 30.0,
            mass: 1.0,
        }
    }
}

impl SpringParams {
    /// Create params with unit mass.
    pub fn new(stiffness: f64, damping: f64) -> Self {
        Self {
            stiffness,
            damping,
            mass: 1.0,
        }
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    /// Reject parameters that would produce NaN or divergent motion.
    pub fn validate(&self) -> Result<()> {
        if !self.stiffness.is_finite() || self.stiffness <= 0.0 {
            return Err(GlideError::InvalidSpring {
                parameter: "stiffness",
                value: self.stiffness,
                expected: "finite and > 0",
            });
        }
        if !self.damping.is_finite() || self.damping < 0.0 {
            return Err(GlideError::InvalidSpring {
                parameter: "damping",
                value: self.damping,
                expected: "finite and >= 0",
            });
        }
        if !self.mass.is_finite() || self.mass <= 0.0 {
            return Err(GlideError::InvalidSpring {
                parameter: "mass",
                value: self.mass,
                expected: "finite and > 0",
            });
        }
        Ok(())
    }
}

impl From<&SpringConfig> for SpringParams {
    fn from(config: &SpringConfig) -> Self {
        Self {
            stiffness: config.stiffness,
            damping: config.damping,
            mass: config.mass,
        }
    }
}

/// Integrator thresholds shared by every simulator in one engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Position threshold for settling detection
    pub rest_delta: f64,
    /// Velocity threshold for settling detection
    pub rest_speed: f64,
    /// Longer frames are integrated as a single step of this size
    pub max_step_ms: f64,
    /// Force-complete a spring that has not settled after this long
    pub max_duration_ms: f64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self::from(&SimulationConfig::default())
    }
}

impl From<&SimulationConfig> for SimulationSettings {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            rest_delta: config.rest_delta,
            rest_speed: config.rest_speed,
            max_step_ms: config.max_step_ms,
            max_duration_ms: config.max_duration_ms,
        }
    }
}

/// Per-frame callback receiving the spring's progress.
///
/// `Mutate` callbacks write to the host themselves; `Style` callbacks return a
/// map the runner hands to `RenderHost::apply_style`.
pub enum OnFrame {
    Mutate(Box<dyn FnMut(f64)>),
    Style(Box<dyn FnMut(f64) -> StyleMap>),
}

impl OnFrame {
    pub fn mutate(f: impl FnMut(f64) + 'static) -> Self {
        Self::Mutate(Box::new(f))
    }

    pub fn style(f: impl FnMut(f64) -> StyleMap + 'static) -> Self {
        Self::Style(Box::new(f))
    }

    /// Invoke the callback, returning a style map if this is a style callback.
    pub fn call(&mut self, progress: f64) -> Option<StyleMap> {
        match self {
            Self::Mutate(f) => {
                f(progress);
                None
            }
            Self::Style(f) => Some(f(progress)),
        }
    }
}

impl fmt::Debug for OnFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mutate(_) => f.write_str("OnFrame::Mutate(..)"),
            Self::Style(_) => f.write_str("OnFrame::Style(..)"),
        }
    }
}

/// Progress window a callback sees.
///
/// The runner always drives progress from 0 (hidden) to 1 (shown); callbacks
/// receive `from + (to - from) * progress`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressRange {
    pub from: f64,
    pub to: f64,
}

impl Default for ProgressRange {
    fn default() -> Self {
        Self { from: 0.0, to: 1.0 }
    }
}

impl ProgressRange {
    pub fn new(from: f64, to: f64) -> Result<Self> {
        for (parameter, value) in [("from", from), ("to", to)] {
            if !value.is_finite() {
                return Err(GlideError::InvalidSpring {
                    parameter,
                    value,
                    expected: "finite",
                });
            }
        }
        Ok(Self { from, to })
    }

    pub fn map(&self, progress: f64) -> f64 {
        self.from + (self.to - self.from) * progress
    }
}

type Prepare = Box<dyn FnOnce() -> StyleMap>;
type Hook = Box<dyn FnOnce()>;

/// Everything a run calls back into, separated from the spring that drives it.
pub struct Callbacks {
    on_frame: OnFrame,
    range: ProgressRange,
    prepare: Option<Prepare>,
    on_start: Option<Hook>,
    on_end: Option<Hook>,
}

impl Callbacks {
    /// Deliver one frame at runner progress `progress`.
    pub fn frame(&mut self, progress: f64) -> Option<StyleMap> {
        self.on_frame.call(self.range.map(progress))
    }

    /// Pre-paint setup, at most once.
    pub fn prepare(&mut self) -> Option<StyleMap> {
        self.prepare.take().map(|prepare| prepare())
    }

    pub fn start(&mut self) {
        if let Some(on_start) = self.on_start.take() {
            on_start();
        }
    }

    /// Called when the spring settles or times out, never on interruption.
    pub fn end(&mut self) {
        if let Some(on_end) = self.on_end.take() {
            on_end();
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_frame", &self.on_frame)
            .field("range", &self.range)
            .field("prepare", &self.prepare.is_some())
            .field("on_start", &self.on_start.is_some())
            .field("on_end", &self.on_end.is_some())
            .finish()
    }
}

/// Validated spring parameters plus the callbacks driven by them.
#[derive(Debug)]
pub struct SpringSpec {
    params: SpringParams,
    callbacks: Callbacks,
}

impl SpringSpec {
    pub fn new(params: SpringParams, on_frame: OnFrame) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            callbacks: Callbacks {
                on_frame,
                range: ProgressRange::default(),
                prepare: None,
                on_start: None,
                on_end: None,
            },
        })
    }

    pub fn mutate(params: SpringParams, f: impl FnMut(f64) + 'static) -> Result<Self> {
        Self::new(params, OnFrame::mutate(f))
    }

    pub fn style(params: SpringParams, f: impl FnMut(f64) -> StyleMap + 'static) -> Result<Self> {
        Self::new(params, OnFrame::style(f))
    }

    /// Remap the progress callbacks receive.
    pub fn with_range(mut self, range: ProgressRange) -> Self {
        self.callbacks.range = range;
        self
    }

    /// Style applied once, before the first frame is painted.
    pub fn with_prepare(mut self, prepare: impl FnOnce() -> StyleMap + 'static) -> Self {
        self.callbacks.prepare = Some(Box::new(prepare));
        self
    }

    pub fn with_on_start(mut self, on_start: impl FnOnce() + 'static) -> Self {
        self.callbacks.on_start = Some(Box::new(on_start));
        self
    }

    pub fn with_on_end(mut self, on_end: impl FnOnce() + 'static) -> Self {
        self.callbacks.on_end = Some(Box::new(on_end));
        self
    }

    pub fn params(&self) -> SpringParams {
        self.params
    }

    pub fn range(&self) -> ProgressRange {
        self.callbacks.range
    }

    pub fn into_parts(self) -> (SpringParams, Callbacks) {
        (self.params, self.callbacks)
    }
}

/// Outcome of a simulator step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpringStatus {
    Running,
    /// Came to rest within the thresholds and snapped to target
    Settled,
    /// Hit the maximum duration guard and was snapped to target
    TimedOut,
}

impl SpringStatus {
    pub fn is_finished(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// One spring heading from an initial value towards a target.
#[derive(Debug, Clone)]
pub struct SpringSimulator {
    params: SpringParams,
    settings: SimulationSettings,
    position: f64,
    velocity: f64,
    target: f64,
    elapsed_ms: f64,
    status: SpringStatus,
}

impl SpringSimulator {
    pub fn new(params: SpringParams, initial: f64, target: f64, settings: SimulationSettings) -> Self {
        Self {
            params,
            settings,
            position: initial,
            velocity: 0.0,
            target,
            elapsed_ms: 0.0,
            status: SpringStatus::Running,
        }
    }

    /// Start with an initial velocity, used when reversing an interrupted run.
    pub fn with_velocity(mut self, velocity: f64) -> Self {
        self.velocity = velocity;
        self
    }

    /// Advance by `delta_ms`, clamped to the maximum step.
    pub fn step(&mut self, delta_ms: f64) -> SpringStatus {
        if self.status.is_finished() {
            return self.status;
        }

        let delta_ms = if delta_ms.is_finite() { delta_ms.max(0.0) } else { 0.0 };
        let dt = delta_ms.min(self.settings.max_step_ms) / 1000.0;

        let SpringParams {
            stiffness,
            damping,
            mass,
        } = self.params;
        let force = stiffness * (self.target - self.position) - damping * self.velocity;
        self.velocity += force / mass * dt;
        self.position += self.velocity * dt;
        self.elapsed_ms += delta_ms;

        if (self.target - self.position).abs() < self.settings.rest_delta
            && self.velocity.abs() < self.settings.rest_speed
        {
            self.finish(SpringStatus::Settled);
        } else if self.elapsed_ms >= self.settings.max_duration_ms || !self.position.is_finite() {
            tracing::warn!(
                elapsed_ms = self.elapsed_ms,
                position = self.position,
                velocity = self.velocity,
                params = ?self.params,
                "spring did not settle, forcing completion"
            );
            self.finish(SpringStatus::TimedOut);
        }

        self.status
    }

    fn finish(&mut self, status: SpringStatus) {
        self.position = self.target;
        self.velocity = 0.0;
        self.status = status;
    }

    /// Step with a fixed frame length until finished; returns the step count.
    pub fn run_to_rest(&mut self, frame_ms: f64) -> usize {
        let frame_ms = if frame_ms.is_finite() && frame_ms > 0.0 {
            frame_ms
        } else {
            self.settings.max_step_ms
        };

        let mut steps = 0;
        while !self.status.is_finished() {
            self.step(frame_ms);
            steps += 1;
        }
        steps
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn status(&self) -> SpringStatus {
        self.status
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }
}
