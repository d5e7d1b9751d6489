//! Animation targets and properties
//!
//! Targets are named by id, never by reference: the engine writes sampled
//! values into a [`crate::PropertyStore`] keyed by `(target, property)` and
//! the renderer looks them up while building a frame.

use lumen_core::{ViewId, WindowId};

/// What an animation moves
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnimationTarget {
    /// Whole window content (smooth scroll, buffer transitions)
    Window(WindowId),
    /// The `index`-th primitive of a window's frame
    GlyphCell { window: WindowId, index: u32 },
    ExternalView(ViewId),
    Cursor(WindowId),
}

impl AnimationTarget {
    /// The window whose frame this target lives in, if any
    pub fn window(&self) -> Option<WindowId> {
        match *self {
            AnimationTarget::Window(w)
            | AnimationTarget::Cursor(w)
            | AnimationTarget::GlyphCell { window: w, .. } => Some(w),
            AnimationTarget::ExternalView(_) => None,
        }
    }
}

/// Which property of a target is animated.
///
/// `Position` and `Size` are offsets added to the submitted geometry, so
/// their rest value is zero. `Opacity` and `Scale` multiply and rest at one.
/// `Rotation` is in radians.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnimatedProperty {
    Position,
    Size,
    Opacity,
    Scale,
    Rotation,
    /// Buffer transition progress, 0 to 1
    Progress,
}

impl AnimatedProperty {
    /// Host property code used by the C interface
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(AnimatedProperty::Position),
            1 => Some(AnimatedProperty::Size),
            2 => Some(AnimatedProperty::Opacity),
            3 => Some(AnimatedProperty::Scale),
            4 => Some(AnimatedProperty::Rotation),
            _ => None,
        }
    }
}
