//! Glyph rasterization and caching for Lumen
//!
//! This crate provides:
//! - Glyph keys that never alias across scale factors
//! - Shelf-packed atlas pages with region recycling
//! - An LRU glyph cache that never evicts glyphs used in the current frame
//! - System font rasterization (fontdb discovery, swash rendering)
//!
//! The atlas is CPU-side: it hands out regions and queues bitmap uploads.
//! The GPU crate mirrors each page in a texture and drains the queue once
//! per frame.

pub mod allocator;
pub mod atlas;
pub mod key;
pub mod rasterizer;
pub mod system;

pub use allocator::ShelfAllocator;
pub use atlas::{AtlasConfig, AtlasStats, GlyphAtlas, GlyphUpload};
pub use key::{AtlasRegion, CachedGlyph, GlyphKey};
pub use rasterizer::{BlockRasterizer, GlyphRasterizer, RasterizedGlyph};
pub use system::SystemFontRasterizer;

use thiserror::Error;

/// Text rendering errors
#[derive(Error, Debug)]
pub enum TextError {
    #[error("Failed to load font: {0}")]
    FontLoadError(String),

    #[error("Glyph not found for codepoint: {0:?}")]
    GlyphNotFound(char),

    #[error("Invalid font data")]
    InvalidFontData,

    #[error("Rasterizer produced a {width}x{height} bitmap with {len} bytes")]
    MalformedBitmap { width: u32, height: u32, len: usize },
}

pub type Result<T> = std::result::Result<T, TextError>;
