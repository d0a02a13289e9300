//! Style maps written to host nodes.
//!
//! Per-frame callbacks either mutate host state themselves or return a
//! `StyleMap`; the runner forwards returned maps to `RenderHost::apply_style`.
//! Values interpolate linearly and are not clamped, so a spring that
//! overshoots 1.0 produces an overshooting style.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Trait for values that can be interpolated by a progress factor.
///
/// `t = 0.0` yields `self`, `t = 1.0` yields `to`; values outside `[0, 1]`
/// extrapolate.
pub trait Interpolate: Sized {
    fn interpolate(&self, to: &Self, t: f64) -> Self;
}

#[inline]
pub fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t
}

impl Interpolate for f64 {
    fn interpolate(&self, to: &Self, t: f64) -> Self {
        lerp(*self, *to, t)
    }
}

/// Visibility keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

/// 2D transform: translate, then scale, then rotate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translate_x: f64,
    pub translate_y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    /// Rotation in degrees.
    pub rotate: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translate_x: 0.0,
        translate_y: 0.0,
        scale_x: 1.0,
        scale_y: 1.0,
        rotate: 0.0,
    };

    pub fn translate(x: f64, y: f64) -> Self {
        Self {
            translate_x: x,
            translate_y: y,
            ..Self::IDENTITY
        }
    }

    pub fn with_uniform_scale(mut self, scale: f64) -> Self {
        self.scale_x = scale;
        self.scale_y = scale;
        self
    }

    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotate = degrees;
        self
    }
}

impl Interpolate for Transform {
    fn interpolate(&self, to: &Self, t: f64) -> Self {
        Self {
            translate_x: lerp(self.translate_x, to.translate_x, t),
            translate_y: lerp(self.translate_y, to.translate_y, t),
            scale_x: lerp(self.scale_x, to.scale_x, t),
            scale_y: lerp(self.scale_y, to.scale_y, t),
            rotate: lerp(self.rotate, to.rotate, t),
        }
    }
}

/// Clip-path `inset()` in percent of a reference box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClipInset {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Interpolate for ClipInset {
    fn interpolate(&self, to: &Self, t: f64) -> Self {
        Self {
            top: lerp(self.top, to.top, t),
            right: lerp(self.right, to.right, t),
            bottom: lerp(self.bottom, to.bottom, t),
            left: lerp(self.left, to.left, t),
        }
    }
}

/// Style properties the engine knows how to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleProperty {
    Opacity,
    Visibility,
    Transform,
    TransformOrigin,
    ClipPath,
    Position,
    PointerEvents,
    ZIndex,
}

/// A style value. The variant must match the property it is stored under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StyleValue {
    Number(f64),
    Visibility(Visibility),
    Transform(Transform),
    Inset(ClipInset),
    Keyword(String),
}

impl StyleValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_transform(&self) -> Option<Transform> {
        match self {
            Self::Transform(transform) => Some(*transform),
            _ => None,
        }
    }

    pub fn as_inset(&self) -> Option<ClipInset> {
        match self {
            Self::Inset(inset) => Some(*inset),
            _ => None,
        }
    }

    pub fn as_visibility(&self) -> Option<Visibility> {
        match self {
            Self::Visibility(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_keyword(&self) -> Option<&str> {
        match self {
            Self::Keyword(value) => Some(value),
            _ => None,
        }
    }
}

/// Ordered set of style writes for one node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StyleMap {
    values: BTreeMap<StyleProperty, StyleValue>,
}

impl StyleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, property: StyleProperty, value: StyleValue) {
        self.values.insert(property, value);
    }

    pub fn get(&self, property: StyleProperty) -> Option<&StyleValue> {
        self.values.get(&property)
    }

    pub fn remove(&mut self, property: StyleProperty) -> Option<StyleValue> {
        self.values.remove(&property)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StyleProperty, &StyleValue)> {
        self.values.iter()
    }

    /// Overlay `other` on top of this map.
    pub fn merge(&mut self, other: StyleMap) {
        self.values.extend(other.values);
    }

    pub fn opacity(mut self, value: f64) -> Self {
        self.set(StyleProperty::Opacity, StyleValue::Number(value));
        self
    }

    pub fn visibility(mut self, value: Visibility) -> Self {
        self.set(StyleProperty::Visibility, StyleValue::Visibility(value));
        self
    }

    pub fn transform(mut self, transform: Transform) -> Self {
        self.set(StyleProperty::Transform, StyleValue::Transform(transform));
        self
    }

    pub fn transform_origin(mut self, origin: impl Into<String>) -> Self {
        self.set(
            StyleProperty::TransformOrigin,
            StyleValue::Keyword(origin.into()),
        );
        self
    }

    pub fn clip_inset(mut self, inset: ClipInset) -> Self {
        self.set(StyleProperty::ClipPath, StyleValue::Inset(inset));
        self
    }

    pub fn keyword(mut self, property: StyleProperty, value: impl Into<String>) -> Self {
        self.set(
            property,
            StyleValue::Keyword(value.into()),
        );
        self
    }

    pub fn z_index(mut self, value: f64) -> Self {
        self.set(StyleProperty::ZIndex, StyleValue::Number(value));
        self
    }
}
