//! Named transition presets.
//!
//! A small registry of common shapes so adapters can refer to transitions by
//! name (`"fade"`, `"slide-left"`, ...). Unknown names are an error rather
//! than a silent no-op.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::definition::TransitionDefinition;
use crate::error::{GlideError, Result};
use crate::spring::{SpringParams, SpringSpec};
use crate::style::{StyleMap, Transform};

/// Distance in pixels slide presets travel.
pub const SLIDE_DISTANCE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresetName {
    Fade,
    Scale,
    SlideLeft,
    SlideRight,
    SlideUp,
    SlideDown,
}

impl PresetName {
    pub const ALL: [PresetName; 6] = [
        Self::Fade,
        Self::Scale,
        Self::SlideLeft,
        Self::SlideRight,
        Self::SlideUp,
        Self::SlideDown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fade => "fade",
            Self::Scale => "scale",
            Self::SlideLeft => "slide-left",
            Self::SlideRight => "slide-right",
            Self::SlideUp => "slide-up",
            Self::SlideDown => "slide-down",
        }
    }

    /// Unit vector content travels along, or `None` for in-place presets.
    fn slide_axis(self) -> Option<(f64, f64)> {
        match self {
            Self::SlideLeft => Some((-1.0, 0.0)),
            Self::SlideRight => Some((1.0, 0.0)),
            Self::SlideUp => Some((0.0, -1.0)),
            Self::SlideDown => Some((0.0, 1.0)),
            Self::Fade | Self::Scale => None,
        }
    }
}

impl FromStr for PresetName {
    type Err = GlideError;

    fn from_str(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.as_str() == name)
            .ok_or_else(|| GlideError::UnknownPreset(name.to_string()))
    }
}

impl fmt::Display for PresetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Style for `preset` at `progress`, for the given phase.
fn frame_style(preset: PresetName, progress: f64, entering: bool) -> StyleMap {
    let style = StyleMap::new().opacity(progress);
    match preset {
        PresetName::Fade => style,
        PresetName::Scale => style
            .transform_origin("center")
            .transform(Transform::IDENTITY.with_uniform_scale(progress)),
        _ => {
            let (dx, dy) = preset.slide_axis().unwrap_or_default();
            // Entering content arrives from behind the direction of travel;
            // exiting content leaves ahead of it.
            let offset = (1.0 - progress) * SLIDE_DISTANCE * if entering { -1.0 } else { 1.0 };
            style.transform(Transform::translate(dx * offset, dy * offset))
        }
    }
}

/// Build the definition for a named preset.
pub fn preset(name: PresetName, params: SpringParams) -> TransitionDefinition {
    TransitionDefinition::new()
        .with_enter(move |_| SpringSpec::style(params, move |p| frame_style(name, p, true)))
        .with_exit(move |_| SpringSpec::style(params, move |p| frame_style(name, p, false)))
}

/// Look up a preset by name.
pub fn preset_by_name(name: &str, params: SpringParams) -> Result<TransitionDefinition> {
    Ok(preset(name.parse()?, params))
}
