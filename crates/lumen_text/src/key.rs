//! Cache keys and cached glyph descriptors

use lumen_core::FaceId;

/// Identity of a rasterized glyph.
///
/// The integer scale is part of the key, so 1x and 2x bitmaps of the same
/// character and face occupy distinct cache slots.
#[derive(Hash, Eq, PartialEq, Clone, Copy, Debug)]
pub struct GlyphKey {
    pub charcode: u32,
    pub face_id: FaceId,
    pub scale: u32,
}

impl GlyphKey {
    pub fn new(ch: char, face_id: FaceId, scale: u32) -> Self {
        Self {
            charcode: ch as u32,
            face_id,
            scale,
        }
    }

    pub fn char(&self) -> Option<char> {
        char::from_u32(self.charcode)
    }
}

/// Pixel rectangle inside an atlas page
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AtlasRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl AtlasRegion {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Where a glyph lives in the atlas and how to place it.
///
/// Returned by value; callers must not keep it across frames because the
/// region can be recycled once the glyph is evicted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CachedGlyph {
    pub page: u32,
    pub region: AtlasRegion,
    /// Normalized texture coordinates (u0, v0, u1, v1)
    pub uv: [f32; 4],
    /// Offset from the pen position to the bitmap's left edge, physical pixels
    pub bearing_x: i32,
    /// Offset from the baseline up to the bitmap's top edge, physical pixels
    pub bearing_y: i32,
}

impl CachedGlyph {
    /// Whitespace and other glyphs without ink
    pub fn is_empty(&self) -> bool {
        self.region.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.region.width
    }

    pub fn height(&self) -> u32 {
        self.region.height
    }
}
