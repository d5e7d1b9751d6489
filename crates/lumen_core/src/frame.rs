//! Per-window retained scene
//!
//! The buffer is rebuilt from scratch every frame: `begin_frame` clears it,
//! the `add_*` calls append in paint order, `end_frame` closes it. Invalid
//! arguments never abort a frame; the primitive is dropped and a warning is
//! logged. The buffer performs no I/O and no GPU work.

use crate::geometry::{Color, Rect};
use crate::glyph::{CursorStyle, FrameGlyph};
use crate::ids::{FaceId, ViewId, WindowId};

/// Lifecycle of a [`FrameGlyphBuffer`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrameState {
    /// No frame has been started yet
    #[default]
    Idle,
    /// Between `begin_frame` and `end_frame`; primitives are accepted
    Open,
    /// `end_frame` was called; the scene is read-only until the next begin
    Closed,
}

/// Ordered paint primitives plus frame-level size and background
#[derive(Debug, Clone)]
pub struct FrameGlyphBuffer {
    window: WindowId,
    width: f32,
    height: f32,
    background: Color,
    glyphs: Vec<FrameGlyph>,
    state: FrameState,
    frame_number: u64,
    dropped: u32,
}

fn extent_ok(op: &str, window: WindowId, x: f32, y: f32, width: f32, height: f32) -> bool {
    if Rect::new(x, y, width, height).is_valid() {
        return true;
    }
    tracing::warn!(
        "{}: dropping {} with invalid geometry ({}, {}, {}x{})",
        window,
        op,
        x,
        y,
        width,
        height
    );
    false
}

impl FrameGlyphBuffer {
    pub fn new(window: WindowId) -> Self {
        Self {
            window,
            width: 0.0,
            height: 0.0,
            background: Color::WHITE,
            glyphs: Vec::new(),
            state: FrameState::Idle,
            frame_number: 0,
            dropped: 0,
        }
    }

    /// Start a new frame, discarding the previous scene.
    ///
    /// Non-finite or negative dimensions are clamped to zero.
    pub fn begin_frame(&mut self, width: f32, height: f32, background: Color) {
        if self.state == FrameState::Open {
            tracing::debug!(
                "{}: begin_frame without end_frame, discarding {} primitives",
                self.window,
                self.glyphs.len()
            );
        }
        let sanitize = |v: f32| if v.is_finite() && v > 0.0 { v } else { 0.0 };
        if sanitize(width) != width || sanitize(height) != height {
            tracing::warn!(
                "{}: invalid frame size {}x{}, clamping",
                self.window,
                width,
                height
            );
        }
        self.width = sanitize(width);
        self.height = sanitize(height);
        self.background = background;
        self.glyphs.clear();
        self.dropped = 0;
        self.state = FrameState::Open;
        self.frame_number += 1;
    }

    /// Close the frame. Returns false if no frame was open.
    pub fn end_frame(&mut self) -> bool {
        if self.state != FrameState::Open {
            tracing::warn!("{}: end_frame without begin_frame", self.window);
            return false;
        }
        self.state = FrameState::Closed;
        if self.dropped > 0 {
            tracing::debug!(
                "{}: frame {} closed with {} primitives ({} dropped)",
                self.window,
                self.frame_number,
                self.glyphs.len(),
                self.dropped
            );
        }
        true
    }

    fn accepting(&mut self, op: &str) -> bool {
        if self.state == FrameState::Open {
            return true;
        }
        tracing::warn!("{}: {} outside begin_frame/end_frame, ignored", self.window, op);
        false
    }

    fn push_checked(&mut self, op: &str, glyph: FrameGlyph) -> bool {
        if !self.accepting(op) {
            return false;
        }
        let b = glyph.bounds();
        if !extent_ok(op, self.window, b.x(), b.y(), b.width(), b.height()) {
            self.dropped += 1;
            return false;
        }
        self.glyphs.push(glyph);
        true
    }

    pub fn add_background(&mut self, bounds: Rect, color: Color) -> bool {
        self.push_checked("add_background", FrameGlyph::Background { bounds, color })
    }

    pub fn add_stretch(&mut self, x: f32, y: f32, width: f32, height: f32, bg: Color) -> bool {
        self.push_checked(
            "add_stretch",
            FrameGlyph::Stretch {
                x,
                y,
                width,
                height,
                bg,
            },
        )
    }

    /// Append a character cell. The cell height is `ascent + descent`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_char(
        &mut self,
        ch: char,
        x: f32,
        y: f32,
        width: f32,
        ascent: f32,
        descent: f32,
        fg: Color,
        face_id: FaceId,
    ) -> bool {
        if !(ascent.is_finite() && descent.is_finite() && ascent >= 0.0 && descent >= 0.0) {
            if self.accepting("add_char") {
                tracing::warn!(
                    "{}: dropping char {:?} with invalid metrics ascent={} descent={}",
                    self.window,
                    ch,
                    ascent,
                    descent
                );
                self.dropped += 1;
            }
            return false;
        }
        self.push_checked(
            "add_char",
            FrameGlyph::Char {
                ch,
                x,
                y,
                width,
                height: ascent + descent,
                ascent,
                fg,
                face_id,
            },
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_cursor(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        style: CursorStyle,
        color: Color,
        active: bool,
    ) -> bool {
        self.push_checked(
            "add_cursor",
            FrameGlyph::Cursor {
                x,
                y,
                width,
                height,
                style,
                color,
                active,
            },
        )
    }

    pub fn add_border(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color) -> bool {
        self.push_checked(
            "add_border",
            FrameGlyph::Border {
                x,
                y,
                width,
                height,
                color,
            },
        )
    }

    pub fn add_external_view(
        &mut self,
        view_id: ViewId,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> bool {
        self.push_checked(
            "add_external_view",
            FrameGlyph::ExternalView {
                view_id,
                x,
                y,
                width,
                height,
            },
        )
    }

    pub fn window(&self) -> WindowId {
        self.window
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn background(&self) -> Color {
        self.background
    }

    /// Primitives in paint order
    pub fn glyphs(&self) -> &[FrameGlyph] {
        &self.glyphs
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == FrameState::Open
    }

    /// Number of `begin_frame` calls so far
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Primitives dropped for invalid arguments in the current frame
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// The last cursor submitted this frame, if any
    pub fn cursor(&self) -> Option<&FrameGlyph> {
        self.glyphs
            .iter()
            .rev()
            .find(|g| matches!(g, FrameGlyph::Cursor { .. }))
    }
}
