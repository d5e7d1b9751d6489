//! Target-id to property-value indirection
//!
//! Values persist after their animation finishes or is cancelled, so the
//! last sampled value keeps applying until something overwrites or clears it.

use rustc_hash::FxHashMap;

use crate::target::{AnimatedProperty, AnimationTarget};
use crate::value::AnimationValue;

/// Current animated values, keyed by `(target, property)`
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PropertyStore {
    values: FxHashMap<(AnimationTarget, AnimatedProperty), AnimationValue>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, target: AnimationTarget, property: AnimatedProperty) -> Option<AnimationValue> {
        self.values.get(&(target, property)).copied()
    }

    pub fn set(&mut self, target: AnimationTarget, property: AnimatedProperty, value: AnimationValue) {
        self.values.insert((target, property), value);
    }

    pub fn remove(
        &mut self,
        target: AnimationTarget,
        property: AnimatedProperty,
    ) -> Option<AnimationValue> {
        self.values.remove(&(target, property))
    }

    /// Drop every property of `target`
    pub fn clear_target(&mut self, target: AnimationTarget) {
        self.values.retain(|(t, _), _| *t != target);
    }

    /// Drop every target that belongs to `window`
    pub fn clear_window(&mut self, window: lumen_core::WindowId) {
        self.values.retain(|(t, _), _| t.window() != Some(window));
    }

    fn scalar_or(&self, target: AnimationTarget, property: AnimatedProperty, rest: f32) -> f32 {
        self.get(target, property)
            .and_then(|v| v.as_scalar())
            .unwrap_or(rest)
    }

    fn pair_or_zero(&self, target: AnimationTarget, property: AnimatedProperty) -> [f32; 2] {
        self.get(target, property)
            .and_then(|v| v.as_pair())
            .unwrap_or([0.0, 0.0])
    }

    /// Opacity multiplier in `[0, 1]`, one when not animated
    pub fn opacity(&self, target: AnimationTarget) -> f32 {
        self.scalar_or(target, AnimatedProperty::Opacity, 1.0)
            .clamp(0.0, 1.0)
    }

    /// Scale multiplier, one when not animated
    pub fn scale(&self, target: AnimationTarget) -> f32 {
        self.scalar_or(target, AnimatedProperty::Scale, 1.0)
    }

    /// Rotation in radians, zero when not animated
    pub fn rotation(&self, target: AnimationTarget) -> f32 {
        self.scalar_or(target, AnimatedProperty::Rotation, 0.0)
    }

    /// Position offset in logical pixels
    pub fn offset(&self, target: AnimationTarget) -> [f32; 2] {
        self.pair_or_zero(target, AnimatedProperty::Position)
    }

    /// Size delta in logical pixels
    pub fn size_delta(&self, target: AnimationTarget) -> [f32; 2] {
        self.pair_or_zero(target, AnimatedProperty::Size)
    }

    /// Transition progress of a window, if a transition has written one
    pub fn progress(&self, window: lumen_core::WindowId) -> Option<f32> {
        self.get(AnimationTarget::Window(window), AnimatedProperty::Progress)
            .and_then(|v| v.as_scalar())
            .map(|p| p.clamp(0.0, 1.0))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::{ViewId, WindowId};

    #[test]
    fn rest_values() {
        let store = PropertyStore::new();
        let t = AnimationTarget::ExternalView(ViewId(1));
        assert_eq!(store.opacity(t), 1.0);
        assert_eq!(store.scale(t), 1.0);
        assert_eq!(store.rotation(t), 0.0);
        assert_eq!(store.offset(t), [0.0, 0.0]);
    }

    #[test]
    fn opacity_is_clamped() {
        let mut store = PropertyStore::new();
        let t = AnimationTarget::Cursor(WindowId(1));
        store.set(t, AnimatedProperty::Opacity, AnimationValue::Scalar(1.4));
        assert_eq!(store.opacity(t), 1.0);
    }

    #[test]
    fn clear_window_keeps_other_windows() {
        let mut store = PropertyStore::new();
        let a = AnimationTarget::Cursor(WindowId(1));
        let b = AnimationTarget::Cursor(WindowId(2));
        let view = AnimationTarget::ExternalView(ViewId(9));
        for t in [a, b, view] {
            store.set(t, AnimatedProperty::Opacity, AnimationValue::Scalar(0.5));
        }
        store.clear_window(WindowId(1));
        assert_eq!(store.len(), 2);
        assert_eq!(store.opacity(a), 1.0);
        assert_eq!(store.opacity(b), 0.5);
    }
}
