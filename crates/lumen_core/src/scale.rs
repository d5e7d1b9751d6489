//! HiDPI scale coordination
//!
//! The host speaks logical pixels; the GPU surface is sized in physical
//! pixels. Lumen only renders at integer scales so glyph bitmaps map 1:1 to
//! device pixels. Fractional factors reported by the platform are rounded to
//! the nearest supported scale, with `.5` rounding up.

use crate::geometry::{Point, Rect, Size};

pub const MIN_SCALE: u32 = 1;
pub const MAX_SCALE: u32 = 3;

/// A change of the active scale
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScaleChange {
    pub old: u32,
    pub new: u32,
}

/// Owns the active logical-to-physical scale factor of one window
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleCoordinator {
    scale: u32,
    /// Last factor reported by the platform, before rounding
    reported: f64,
}

impl Default for ScaleCoordinator {
    fn default() -> Self {
        Self {
            scale: MIN_SCALE,
            reported: 1.0,
        }
    }
}

impl ScaleCoordinator {
    pub fn new(factor: f64) -> Self {
        let mut coordinator = Self::default();
        coordinator.set_scale(factor);
        coordinator
    }

    /// Round a platform factor to a supported integer scale.
    ///
    /// Returns `None` for non-finite or non-positive input.
    pub fn round_factor(factor: f64) -> Option<u32> {
        if !factor.is_finite() || factor <= 0.0 {
            return None;
        }
        let rounded = (factor + 0.5).floor();
        Some((rounded as u32).clamp(MIN_SCALE, MAX_SCALE))
    }

    /// Apply a new platform factor. Returns the change if the integer scale moved.
    pub fn set_scale(&mut self, factor: f64) -> Option<ScaleChange> {
        let Some(scale) = Self::round_factor(factor) else {
            tracing::warn!("ignoring invalid scale factor {}", factor);
            return None;
        };
        self.reported = factor;
        if scale == self.scale {
            return None;
        }
        let change = ScaleChange {
            old: self.scale,
            new: scale,
        };
        tracing::debug!(
            "scale factor {} -> {}x (was {}x)",
            factor,
            change.new,
            change.old
        );
        self.scale = scale;
        Some(change)
    }

    /// The active integer scale
    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn factor(&self) -> f32 {
        self.scale as f32
    }

    /// The unrounded factor last reported by the platform
    pub fn reported_factor(&self) -> f64 {
        self.reported
    }

    pub fn to_physical(&self, logical: f32) -> f32 {
        logical * self.factor()
    }

    pub fn to_logical(&self, physical: f32) -> f32 {
        physical / self.factor()
    }

    pub fn point_to_physical(&self, p: Point) -> Point {
        Point::new(self.to_physical(p.x), self.to_physical(p.y))
    }

    /// Convert an input-event position back to host coordinates
    pub fn point_to_logical(&self, p: Point) -> Point {
        Point::new(self.to_logical(p.x), self.to_logical(p.y))
    }

    pub fn rect_to_physical(&self, r: Rect) -> Rect {
        r.scaled(self.factor())
    }

    /// Physical surface size in whole pixels for a logical size
    pub fn physical_size(&self, logical: Size) -> (u32, u32) {
        let w = self.to_physical(logical.width).round().max(0.0) as u32;
        let h = self.to_physical(logical.height).round().max(0.0) as u32;
        (w, h)
    }
}
