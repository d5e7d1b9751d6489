//! System font rasterizer
//!
//! Resolves a face's family, weight and slant through fontdb and renders
//! alpha masks with swash.

use std::sync::Arc;

use fontdb::{Database, Family, Query, Source, Stretch, Style, Weight};
use lumen_core::{Face, FontStyle};
use rustc_hash::FxHashMap;
use swash::scale::{Render, ScaleContext, Source as RenderSource};
use swash::zeno::Format;

use crate::rasterizer::{GlyphRasterizer, RasterizedGlyph};
use crate::{Result, TextError};

struct FontData {
    data: Vec<u8>,
    index: u32,
}

#[derive(Hash, PartialEq, Eq, Clone)]
struct FontQueryKey {
    family: String,
    weight: u16,
    style: FontStyle,
}

/// Rasterizes with fonts installed on the system
pub struct SystemFontRasterizer {
    db: Database,
    /// Resolved fonts (None = lookup failed, cached)
    fonts: FxHashMap<FontQueryKey, Option<Arc<FontData>>>,
    context: ScaleContext,
}

impl Default for SystemFontRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemFontRasterizer {
    /// Load every installed font
    pub fn new() -> Self {
        let mut db = Database::new();
        db.load_system_fonts();
        tracing::debug!("font database loaded {} faces", db.len());
        Self::with_database(db)
    }

    pub fn with_database(db: Database) -> Self {
        Self {
            db,
            fonts: FxHashMap::default(),
            context: ScaleContext::new(),
        }
    }

    /// Number of faces known to the database
    pub fn face_count(&self) -> usize {
        self.db.len()
    }

    fn resolve(&mut self, face: &Face) -> Result<Arc<FontData>> {
        let key = FontQueryKey {
            family: face.family.clone(),
            weight: face.weight.0,
            style: face.style,
        };
        if let Some(cached) = self.fonts.get(&key) {
            return cached
                .clone()
                .ok_or_else(|| TextError::FontLoadError(format!("{} (cached)", face.family)));
        }

        let loaded = self.load(face).map(Arc::new);
        match &loaded {
            Ok(_) => tracing::debug!(
                "resolved font family={} weight={} style={:?}",
                face.family,
                face.weight.0,
                face.style
            ),
            Err(e) => tracing::warn!("font lookup failed for {}: {}", face.family, e),
        }
        self.fonts.insert(key, loaded.as_ref().ok().cloned());
        loaded
    }

    fn load(&self, face: &Face) -> Result<FontData> {
        let named = generic_family(&face.family).unwrap_or(Family::Name(&face.family));
        let families = [named, Family::Monospace];
        let style = match face.style {
            FontStyle::Normal => Style::Normal,
            FontStyle::Italic => Style::Italic,
            FontStyle::Oblique => Style::Oblique,
        };
        let query = Query {
            families: &families,
            weight: Weight(face.weight.0),
            style,
            stretch: Stretch::Normal,
        };
        let id = self
            .db
            .query(&query)
            .ok_or_else(|| TextError::FontLoadError(face.family.clone()))?;

        let (src, index) = self
            .db
            .face_source(id)
            .ok_or_else(|| TextError::FontLoadError("font source not found".to_string()))?;
        let data = match src {
            Source::File(path) => std::fs::read(&path).map_err(|e| {
                TextError::FontLoadError(format!("failed to read {:?}: {}", path, e))
            })?,
            Source::Binary(arc) => arc.as_ref().as_ref().to_vec(),
            Source::SharedFile(_path, data) => data.as_ref().as_ref().to_vec(),
        };
        Ok(FontData { data, index })
    }
}

fn generic_family(name: &str) -> Option<Family<'static>> {
    match name.to_ascii_lowercase().as_str() {
        "monospace" | "mono" => Some(Family::Monospace),
        "serif" => Some(Family::Serif),
        "sans-serif" | "sans" => Some(Family::SansSerif),
        "cursive" => Some(Family::Cursive),
        "fantasy" => Some(Family::Fantasy),
        _ => None,
    }
}

impl GlyphRasterizer for SystemFontRasterizer {
    fn rasterize(&mut self, ch: char, face: &Face, pixel_size: f32) -> Result<RasterizedGlyph> {
        let font = self.resolve(face)?;
        let font_ref = swash::FontRef::from_index(&font.data, font.index as usize)
            .ok_or(TextError::InvalidFontData)?;

        let glyph_id = font_ref.charmap().map(ch);
        if glyph_id == 0 {
            if ch.is_whitespace() {
                return Ok(RasterizedGlyph::empty());
            }
            return Err(TextError::GlyphNotFound(ch));
        }

        let mut scaler = self.context.builder(font_ref).size(pixel_size).hint(true).build();
        let mut render = Render::new(&[RenderSource::Outline]);
        render.format(Format::Alpha);

        match render.render(&mut scaler, glyph_id) {
            Some(image) if image.placement.width > 0 && image.placement.height > 0 => {
                Ok(RasterizedGlyph {
                    bitmap: image.data,
                    width: image.placement.width,
                    height: image.placement.height,
                    bearing_x: image.placement.left,
                    bearing_y: image.placement.top,
                })
            }
            _ => Ok(RasterizedGlyph::empty()),
        }
    }
}
