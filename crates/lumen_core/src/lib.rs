//! Lumen Core
//!
//! Foundational types shared by every Lumen crate:
//!
//! - **Geometry and color**: [`Point`], [`Size`], [`Rect`], [`Color`]
//! - **Faces**: the session-owned [`FaceTable`] mapping numeric ids to styles
//! - **Frame scene**: [`FrameGlyph`] primitives retained per window in a
//!   [`FrameGlyphBuffer`] between `begin_frame` and `end_frame`
//! - **HiDPI**: [`ScaleCoordinator`] for logical/physical conversion
//!
//! # Example
//!
//! ```rust
//! use lumen_core::{Color, FrameGlyphBuffer, WindowId};
//!
//! let mut frame = FrameGlyphBuffer::new(WindowId(1));
//! frame.begin_frame(800.0, 600.0, Color::WHITE);
//! frame.add_border(0.0, 590.0, 800.0, 1.0, Color::BLACK);
//! frame.end_frame();
//!
//! assert_eq!(frame.len(), 1);
//! assert!(!frame.is_open());
//! ```

pub mod error;
pub mod face;
pub mod frame;
pub mod geometry;
pub mod glyph;
pub mod ids;
pub mod scale;

pub use error::{DisplayError, DisplayResult};
pub use face::{
    Face, FaceTable, FaceUpdate, FontStyle, FontWeight, UnderlineStyle, DEFAULT_FACE_ID,
    DEFAULT_FONT_SIZE,
};
pub use frame::{FrameGlyphBuffer, FrameState};
pub use geometry::{Color, Point, Rect, Size};
pub use glyph::{CursorStyle, FrameGlyph, GlyphKind};
pub use ids::{FaceId, ViewId, WindowId};
pub use scale::{ScaleChange, ScaleCoordinator, MAX_SCALE, MIN_SCALE};
