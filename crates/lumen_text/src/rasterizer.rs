//! Glyph rasterization collaborator
//!
//! The atlas asks a [`GlyphRasterizer`] for an 8-bit coverage bitmap of one
//! character in one face at a physical pixel size.

use lumen_core::Face;

use crate::{Result, TextError};

/// Alpha-coverage bitmap with placement metrics
#[derive(Debug, Clone, PartialEq)]
pub struct RasterizedGlyph {
    /// One byte per pixel, rows tightly packed
    pub bitmap: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Offset from origin to left edge
    pub bearing_x: i32,
    /// Offset from baseline to top edge
    pub bearing_y: i32,
}

impl RasterizedGlyph {
    /// A glyph without ink (space, zero-width characters)
    pub fn empty() -> Self {
        Self {
            bitmap: Vec::new(),
            width: 0,
            height: 0,
            bearing_x: 0,
            bearing_y: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Check the bitmap length matches the reported size
    pub fn validate(&self) -> Result<()> {
        let expected = self.width as usize * self.height as usize;
        if self.bitmap.len() < expected {
            return Err(TextError::MalformedBitmap {
                width: self.width,
                height: self.height,
                len: self.bitmap.len(),
            });
        }
        Ok(())
    }
}

/// Produces glyph bitmaps for the atlas
pub trait GlyphRasterizer: Send {
    /// Rasterize `ch` in `face` at `pixel_size` physical pixels.
    ///
    /// Errors (missing glyph, unloadable font) make the atlas skip the glyph.
    fn rasterize(&mut self, ch: char, face: &Face, pixel_size: f32) -> Result<RasterizedGlyph>;
}

/// Draws every visible character as a solid block.
///
/// Used when no system fonts are available (headless machines) and as a
/// deterministic rasterizer in tests. Whitespace has no ink; control
/// characters are reported missing.
#[derive(Debug, Default, Clone)]
pub struct BlockRasterizer {
    calls: usize,
}

impl BlockRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rasterize calls so far
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl GlyphRasterizer for BlockRasterizer {
    fn rasterize(&mut self, ch: char, _face: &Face, pixel_size: f32) -> Result<RasterizedGlyph> {
        self.calls += 1;
        if ch.is_control() {
            return Err(TextError::GlyphNotFound(ch));
        }
        if ch.is_whitespace() {
            return Ok(RasterizedGlyph::empty());
        }
        let height = (pixel_size * 0.7).round().max(1.0) as u32;
        let width = (pixel_size * 0.5).round().max(1.0) as u32;
        Ok(RasterizedGlyph {
            bitmap: vec![0xFF; (width * height) as usize],
            width,
            height,
            bearing_x: 0,
            bearing_y: height as i32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_size_follows_pixel_size() {
        let mut r = BlockRasterizer::new();
        let face = Face::default();
        let g1 = r.rasterize('a', &face, 20.0).unwrap();
        let g2 = r.rasterize('a', &face, 40.0).unwrap();
        assert_eq!((g1.width, g1.height), (10, 14));
        assert_eq!((g2.width, g2.height), (20, 28));
        assert!(g1.validate().is_ok());
        assert_eq!(r.calls(), 2);
    }

    #[test]
    fn whitespace_is_empty_and_controls_fail() {
        let mut r = BlockRasterizer::new();
        let face = Face::default();
        assert!(r.rasterize(' ', &face, 16.0).unwrap().is_empty());
        assert!(r.rasterize('\u{7}', &face, 16.0).is_err());
    }

    #[test]
    fn short_bitmap_is_rejected() {
        let glyph = RasterizedGlyph {
            bitmap: vec![0; 3],
            width: 2,
            height: 2,
            bearing_x: 0,
            bearing_y: 0,
        };
        assert!(glyph.validate().is_err());
    }
}
