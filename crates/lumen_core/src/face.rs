//! Faces and the session-owned face table
//!
//! A face is the host's named style for a run of text. The host registers
//! faces by numeric id with `set_face` and refers to them from primitives.
//! The table is owned by the display session and passed by reference to the
//! renderer; it is never copied per frame.

use rustc_hash::FxHashMap;

use crate::geometry::Color;
use crate::ids::FaceId;

/// The face every table starts with
pub const DEFAULT_FACE_ID: FaceId = FaceId(0);

/// Default logical font size in pixels
pub const DEFAULT_FONT_SIZE: f32 = 14.0;

/// CSS-style numeric font weight (100..=900)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontWeight(pub u16);

impl FontWeight {
    pub const THIN: FontWeight = FontWeight(100);
    pub const LIGHT: FontWeight = FontWeight(300);
    pub const NORMAL: FontWeight = FontWeight(400);
    pub const MEDIUM: FontWeight = FontWeight(500);
    pub const BOLD: FontWeight = FontWeight(700);
    pub const BLACK: FontWeight = FontWeight(900);

    /// Clamp an arbitrary host value into the valid range
    pub fn clamped(weight: u16) -> Self {
        FontWeight(weight.clamp(1, 1000))
    }
}

impl Default for FontWeight {
    fn default() -> Self {
        Self::NORMAL
    }
}

/// Font slant
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
    Oblique,
}

impl FontStyle {
    /// Host code: 0 normal, 1 italic, 2 oblique
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => FontStyle::Italic,
            2 => FontStyle::Oblique,
            _ => FontStyle::Normal,
        }
    }
}

/// Underline decoration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum UnderlineStyle {
    #[default]
    None,
    Single,
    Double,
    Wave,
}

impl UnderlineStyle {
    /// Host code: 0 none, 1 single, 2 double, 3 wave
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => UnderlineStyle::Single,
            2 => UnderlineStyle::Double,
            3 => UnderlineStyle::Wave,
            _ => UnderlineStyle::None,
        }
    }
}

/// A text style referenced by [`FaceId`]
#[derive(Clone, Debug, PartialEq)]
pub struct Face {
    pub foreground: Color,
    /// `None` means "use the frame background"
    pub background: Option<Color>,
    pub weight: FontWeight,
    pub style: FontStyle,
    pub underline: UnderlineStyle,
    pub family: String,
    /// Logical pixel size the glyphs are rasterized at (times the scale)
    pub font_size: f32,
}

impl Default for Face {
    fn default() -> Self {
        Self {
            foreground: Color::BLACK,
            background: None,
            weight: FontWeight::NORMAL,
            style: FontStyle::Normal,
            underline: UnderlineStyle::None,
            family: String::from("monospace"),
            font_size: DEFAULT_FONT_SIZE,
        }
    }
}

impl Face {
    /// True when `other` would rasterize to different glyph bitmaps.
    ///
    /// Colors are applied at draw time, so a color-only change keeps cached
    /// glyphs valid.
    pub fn affects_glyphs(&self, other: &Face) -> bool {
        self.family != other.family
            || self.weight != other.weight
            || self.style != other.style
            || self.font_size != other.font_size
    }
}

/// Result of [`FaceTable::set`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaceUpdate {
    /// First registration of this id
    Added,
    /// Replaced, glyph bitmaps still valid
    Restyled,
    /// Replaced, cached glyphs for this face must be dropped
    GlyphsInvalidated,
    /// Identical to the stored face
    Unchanged,
}

/// Session-owned mapping from face id to [`Face`]
#[derive(Debug, Clone)]
pub struct FaceTable {
    faces: FxHashMap<FaceId, Face>,
}

impl Default for FaceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceTable {
    pub fn new() -> Self {
        let mut faces = FxHashMap::default();
        faces.insert(DEFAULT_FACE_ID, Face::default());
        Self { faces }
    }

    /// Register or replace a face
    pub fn set(&mut self, id: FaceId, face: Face) -> FaceUpdate {
        match self.faces.insert(id, face) {
            None => FaceUpdate::Added,
            Some(old) => {
                let new = &self.faces[&id];
                if old == *new {
                    FaceUpdate::Unchanged
                } else if old.affects_glyphs(new) {
                    FaceUpdate::GlyphsInvalidated
                } else {
                    FaceUpdate::Restyled
                }
            }
        }
    }

    pub fn get(&self, id: FaceId) -> Option<&Face> {
        self.faces.get(&id)
    }

    /// Look up a face, falling back to the default face for unknown ids
    pub fn resolve(&self, id: FaceId) -> &Face {
        match self.faces.get(&id) {
            Some(face) => face,
            None => {
                tracing::debug!("unknown {}, using default face", id);
                self.default_face()
            }
        }
    }

    pub fn default_face(&self) -> &Face {
        // The default entry can be replaced but never removed.
        &self.faces[&DEFAULT_FACE_ID]
    }

    pub fn get_mut(&mut self, id: FaceId) -> Option<&mut Face> {
        self.faces.get_mut(&id)
    }

    /// Remove a face. The default face cannot be removed.
    pub fn remove(&mut self, id: FaceId) -> Option<Face> {
        if id == DEFAULT_FACE_ID {
            return None;
        }
        self.faces.remove(&id)
    }

    pub fn contains(&self, id: FaceId) -> bool {
        self.faces.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}
