//! Paint primitives
//!
//! A [`FrameGlyph`] is one entry of the per-frame scene. Submission order is
//! paint order: there is no z-index, later entries composite over earlier
//! ones.

use crate::geometry::{Color, Rect};
use crate::ids::{FaceId, ViewId};

/// Cursor shape
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CursorStyle {
    /// Filled cell
    #[default]
    Box,
    /// Vertical bar at the left edge
    Bar,
    /// Horizontal bar at the bottom edge
    Hbar,
    /// Outline only
    Hollow,
}

impl CursorStyle {
    /// Host code: 0 box, 1 bar, 2 hbar, 3 hollow
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => CursorStyle::Bar,
            2 => CursorStyle::Hbar,
            3 => CursorStyle::Hollow,
            _ => CursorStyle::Box,
        }
    }
}

/// Coarse primitive category, used when grouping draws by pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GlyphKind {
    /// Solid quads (background, stretch, border, cursor)
    Rect,
    /// Atlas-sampled text
    Char,
    /// Imported external texture
    External,
}

/// One paint primitive, all coordinates in logical pixels
#[derive(Clone, Debug, PartialEq)]
pub enum FrameGlyph {
    /// Filled rectangle behind content
    Background { bounds: Rect, color: Color },
    /// Blank run of a line (tabs, trailing space) painted in the face background
    Stretch {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        bg: Color,
    },
    /// A single character; `y` is the top of the line, `ascent` the baseline offset
    Char {
        ch: char,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        ascent: f32,
        fg: Color,
        face_id: FaceId,
    },
    Cursor {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        style: CursorStyle,
        color: Color,
        /// False when the window does not have focus
        active: bool,
    },
    /// Window divider or frame border
    Border {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Color,
    },
    /// Placement of an embedded video/browser view
    ExternalView {
        view_id: ViewId,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

impl FrameGlyph {
    /// Bounding rectangle in logical pixels
    pub fn bounds(&self) -> Rect {
        match *self {
            FrameGlyph::Background { bounds, .. } => bounds,
            FrameGlyph::Stretch {
                x, y, width, height, ..
            }
            | FrameGlyph::Char {
                x, y, width, height, ..
            }
            | FrameGlyph::Cursor {
                x, y, width, height, ..
            }
            | FrameGlyph::Border {
                x, y, width, height, ..
            }
            | FrameGlyph::ExternalView {
                x, y, width, height, ..
            } => Rect::new(x, y, width, height),
        }
    }

    pub fn kind(&self) -> GlyphKind {
        match self {
            FrameGlyph::Char { .. } => GlyphKind::Char,
            FrameGlyph::ExternalView { .. } => GlyphKind::External,
            _ => GlyphKind::Rect,
        }
    }
}
