//! Glyph atlas
//!
//! Caches rasterized glyphs keyed by (character, face, scale) and packs their
//! bitmaps into fixed-size R8 pages. Pixels are not uploaded here: every new
//! glyph queues a [`GlyphUpload`] that the GPU side drains once per frame.
//!
//! Capacity is bounded by `max_glyphs` entries and `max_pages` pages. Under
//! pressure the least recently used entry is evicted and its region recycled,
//! except for entries touched during the current frame generation.

use lru::LruCache;
use lumen_core::{Face, FaceId};
use rustc_hash::FxHashSet;

use crate::allocator::ShelfAllocator;
use crate::key::{AtlasRegion, CachedGlyph, GlyphKey};
use crate::rasterizer::{GlyphRasterizer, RasterizedGlyph};

/// Atlas sizing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtlasConfig {
    /// Width and height of each page in pixels
    pub page_size: u32,
    pub max_pages: u32,
    pub max_glyphs: usize,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            page_size: 1024,
            max_pages: 4,
            max_glyphs: 4096,
        }
    }
}

/// Bitmap waiting to be copied into a page texture
#[derive(Clone, Debug)]
pub struct GlyphUpload {
    pub page: u32,
    pub region: AtlasRegion,
    /// R8 pixels, `region.width * region.height` bytes
    pub pixels: Vec<u8>,
}

/// Cache counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AtlasStats {
    pub hits: u64,
    pub misses: u64,
    pub rasterizations: u64,
    pub evictions: u64,
    pub failures: u64,
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    glyph: CachedGlyph,
    /// Frame generation of the last lookup
    generation: u64,
}

pub struct GlyphAtlas {
    config: AtlasConfig,
    pages: Vec<ShelfAllocator>,
    cache: LruCache<GlyphKey, Entry>,
    /// Keys whose rasterization failed
    failed: FxHashSet<GlyphKey>,
    uploads: Vec<GlyphUpload>,
    generation: u64,
    stats: AtlasStats,
    rasterizer: Box<dyn GlyphRasterizer>,
}

impl GlyphAtlas {
    pub fn new(config: AtlasConfig, rasterizer: impl GlyphRasterizer + 'static) -> Self {
        Self::with_boxed_rasterizer(config, Box::new(rasterizer))
    }

    pub fn with_boxed_rasterizer(config: AtlasConfig, rasterizer: Box<dyn GlyphRasterizer>) -> Self {
        let config = AtlasConfig {
            page_size: config.page_size.max(16),
            max_pages: config.max_pages.max(1),
            max_glyphs: config.max_glyphs.max(1),
        };
        tracing::debug!(
            "glyph atlas: {}px pages, max {} pages, max {} glyphs",
            config.page_size,
            config.max_pages,
            config.max_glyphs
        );
        Self {
            config,
            pages: Vec::new(),
            cache: LruCache::unbounded(),
            failed: FxHashSet::default(),
            uploads: Vec::new(),
            generation: 0,
            stats: AtlasStats::default(),
            rasterizer,
        }
    }

    /// Start a new frame generation. Entries looked up from now on are pinned
    /// until the next call.
    pub fn begin_frame(&mut self) {
        self.generation += 1;
    }

    /// Look up `key`, rasterizing on a miss.
    ///
    /// Returns `None` when the glyph cannot be rasterized or no space can be
    /// freed this frame.
    pub fn get_or_create(&mut self, key: GlyphKey, face: &Face) -> Option<CachedGlyph> {
        let generation = self.generation;
        if let Some(entry) = self.cache.get_mut(&key) {
            entry.generation = generation;
            self.stats.hits += 1;
            return Some(entry.glyph);
        }
        if self.failed.contains(&key) {
            return None;
        }
        self.stats.misses += 1;

        let Some(ch) = key.char() else {
            self.mark_failed(key);
            return None;
        };

        let pixel_size = face.font_size * key.scale as f32;
        self.stats.rasterizations += 1;
        let raster = match self
            .rasterizer
            .rasterize(ch, face, pixel_size)
            .and_then(|g| g.validate().map(|_| g))
        {
            Ok(glyph) => glyph,
            Err(e) => {
                tracing::debug!("glyph {:?} face {} skipped: {}", ch, key.face_id, e);
                self.mark_failed(key);
                return None;
            }
        };

        if raster.width >= self.config.page_size || raster.height >= self.config.page_size {
            tracing::warn!(
                "glyph {:?} ({}x{}) does not fit a {}px atlas page",
                ch,
                raster.width,
                raster.height,
                self.config.page_size
            );
            self.mark_failed(key);
            return None;
        }

        if self.cache.len() >= self.config.max_glyphs && !self.evict_lru() {
            tracing::debug!("glyph atlas full ({} entries), skipping {:?}", self.cache.len(), ch);
            return None;
        }

        let glyph = if raster.is_empty() {
            CachedGlyph {
                page: 0,
                region: AtlasRegion::default(),
                uv: [0.0; 4],
                bearing_x: raster.bearing_x,
                bearing_y: raster.bearing_y,
            }
        } else {
            let (page, region) = self.allocate(raster.width, raster.height)?;
            let glyph = CachedGlyph {
                page,
                region,
                uv: self.uv_rect(region),
                bearing_x: raster.bearing_x,
                bearing_y: raster.bearing_y,
            };
            self.queue_upload(page, region, raster);
            glyph
        };

        self.cache.put(key, Entry { glyph, generation });
        Some(glyph)
    }

    fn mark_failed(&mut self, key: GlyphKey) {
        self.stats.failures += 1;
        self.failed.insert(key);
    }

    fn queue_upload(&mut self, page: u32, region: AtlasRegion, raster: RasterizedGlyph) {
        let mut pixels = raster.bitmap;
        pixels.truncate(region.width as usize * region.height as usize);
        self.uploads.push(GlyphUpload {
            page,
            region,
            pixels,
        });
    }

    fn uv_rect(&self, region: AtlasRegion) -> [f32; 4] {
        let size = self.config.page_size as f32;
        [
            region.x as f32 / size,
            region.y as f32 / size,
            (region.x + region.width) as f32 / size,
            (region.y + region.height) as f32 / size,
        ]
    }

    fn allocate(&mut self, width: u32, height: u32) -> Option<(u32, AtlasRegion)> {
        if let Some(found) = self.allocate_in_pages(width, height) {
            return Some(found);
        }

        if (self.pages.len() as u32) < self.config.max_pages {
            let mut page = ShelfAllocator::new(self.config.page_size, self.config.page_size);
            let region = page.allocate(width, height)?;
            self.pages.push(page);
            tracing::debug!("glyph atlas grew to {} pages", self.pages.len());
            return Some((self.pages.len() as u32 - 1, region));
        }

        if self.evict_fitting(width, height) {
            return self.allocate_in_pages(width, height);
        }
        tracing::debug!("no atlas space for {}x{} glyph this frame", width, height);
        None
    }

    fn allocate_in_pages(&mut self, width: u32, height: u32) -> Option<(u32, AtlasRegion)> {
        self.pages
            .iter_mut()
            .enumerate()
            .find_map(|(i, page)| page.allocate(width, height).map(|r| (i as u32, r)))
    }

    /// Evict the least recently used entry not pinned by the current frame
    fn evict_lru(&mut self) -> bool {
        let generation = self.generation;
        let victim = self
            .cache
            .iter()
            .rev()
            .find(|(_, entry)| entry.generation != generation)
            .map(|(key, _)| *key);
        match victim {
            Some(key) => {
                self.evict(key);
                true
            }
            None => false,
        }
    }

    /// Evict the least recently used unpinned entry whose region can hold a
    /// `width`x`height` glyph. Freed regions never merge, so smaller victims
    /// would not help.
    fn evict_fitting(&mut self, width: u32, height: u32) -> bool {
        let generation = self.generation;
        let victim = self
            .cache
            .iter()
            .rev()
            .find(|(_, entry)| {
                entry.generation != generation
                    && entry.glyph.region.width >= width
                    && entry.glyph.region.height >= height
            })
            .map(|(key, _)| *key);
        match victim {
            Some(key) => {
                self.evict(key);
                true
            }
            None => false,
        }
    }

    fn evict(&mut self, key: GlyphKey) {
        if let Some(entry) = self.cache.pop(&key) {
            self.release(entry.glyph);
            self.stats.evictions += 1;
        }
    }

    fn release(&mut self, glyph: CachedGlyph) {
        if glyph.is_empty() {
            return;
        }
        if let Some(page) = self.pages.get_mut(glyph.page as usize) {
            page.deallocate(glyph.region);
        }
    }

    /// Drain bitmaps queued since the last call
    pub fn take_uploads(&mut self) -> Vec<GlyphUpload> {
        std::mem::take(&mut self.uploads)
    }

    /// Drop every entry (and negative entry) of `face_id`. Returns the number
    /// of cached glyphs removed.
    pub fn invalidate_face(&mut self, face_id: FaceId) -> usize {
        let keys: Vec<GlyphKey> = self
            .cache
            .iter()
            .filter(|(key, _)| key.face_id == face_id)
            .map(|(key, _)| *key)
            .collect();
        for key in &keys {
            if let Some(entry) = self.cache.pop(key) {
                self.release(entry.glyph);
            }
        }
        self.failed.retain(|key| key.face_id != face_id);
        if !keys.is_empty() {
            tracing::debug!("invalidated {} glyphs of face {}", keys.len(), face_id);
        }
        keys.len()
    }

    /// Forget every glyph. Page count is kept so GPU textures stay valid.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.failed.clear();
        self.uploads.clear();
        for page in &mut self.pages {
            page.clear();
        }
    }

    /// Whether `key` is cached, without touching recency
    pub fn contains(&self, key: &GlyphKey) -> bool {
        self.cache.contains(key)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn page_size(&self) -> u32 {
        self.config.page_size
    }

    pub fn config(&self) -> AtlasConfig {
        self.config
    }

    pub fn stats(&self) -> AtlasStats {
        self.stats
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl std::fmt::Debug for GlyphAtlas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlyphAtlas")
            .field("config", &self.config)
            .field("pages", &self.pages.len())
            .field("glyphs", &self.cache.len())
            .field("generation", &self.generation)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::BlockRasterizer;

    fn atlas(config: AtlasConfig) -> GlyphAtlas {
        GlyphAtlas::new(config, BlockRasterizer::new())
    }

    fn small() -> AtlasConfig {
        // 14px face -> 7x10 blocks, 8 per 32px page
        AtlasConfig {
            page_size: 32,
            max_pages: 1,
            max_glyphs: 64,
        }
    }

    #[test]
    fn lookup_is_idempotent() {
        let mut atlas = atlas(AtlasConfig::default());
        let face = Face::default();
        let key = GlyphKey::new('A', FaceId(1), 1);

        let first = atlas.get_or_create(key, &face).unwrap();
        let second = atlas.get_or_create(key, &face).unwrap();
        assert_eq!(first, second);
        assert_eq!(atlas.stats().rasterizations, 1);
        assert_eq!(atlas.stats().hits, 1);
        assert_eq!(atlas.take_uploads().len(), 1);
        assert!(atlas.take_uploads().is_empty());
    }

    #[test]
    fn scales_are_separate_entries() {
        let mut atlas = atlas(AtlasConfig::default());
        let face = Face::default();
        let one = atlas.get_or_create(GlyphKey::new('a', FaceId(0), 1), &face).unwrap();
        let two = atlas.get_or_create(GlyphKey::new('a', FaceId(0), 2), &face).unwrap();
        assert_eq!(atlas.len(), 2);
        assert_eq!(two.width(), one.width() * 2);
        assert_ne!(one.region, two.region);
    }

    #[test]
    fn failures_are_negatively_cached() {
        let mut atlas = atlas(AtlasConfig::default());
        let face = Face::default();
        let key = GlyphKey::new('\u{7}', FaceId(2), 1);

        assert!(atlas.get_or_create(key, &face).is_none());
        assert!(atlas.get_or_create(key, &face).is_none());
        assert_eq!(atlas.stats().rasterizations, 1);
        assert_eq!(atlas.stats().failures, 1);

        atlas.invalidate_face(FaceId(2));
        assert!(atlas.get_or_create(key, &face).is_none());
        assert_eq!(atlas.stats().rasterizations, 2);
    }

    #[test]
    fn whitespace_takes_no_space() {
        let mut atlas = atlas(AtlasConfig::default());
        let glyph = atlas
            .get_or_create(GlyphKey::new(' ', FaceId(0), 1), &Face::default())
            .unwrap();
        assert!(glyph.is_empty());
        assert!(atlas.take_uploads().is_empty());
        assert_eq!(atlas.page_count(), 0);
    }

    #[test]
    fn uv_matches_region() {
        let mut atlas = atlas(small());
        let glyph = atlas
            .get_or_create(GlyphKey::new('x', FaceId(0), 1), &Face::default())
            .unwrap();
        assert_eq!(glyph.region, AtlasRegion { x: 0, y: 0, width: 7, height: 10 });
        assert_eq!(glyph.uv, [0.0, 0.0, 7.0 / 32.0, 10.0 / 32.0]);
    }

    #[test]
    fn evicts_least_recently_used_at_glyph_limit() {
        let mut atlas = atlas(AtlasConfig {
            max_glyphs: 2,
            ..AtlasConfig::default()
        });
        let face = Face::default();
        let a = GlyphKey::new('a', FaceId(0), 1);
        let b = GlyphKey::new('b', FaceId(0), 1);
        let c = GlyphKey::new('c', FaceId(0), 1);

        atlas.get_or_create(a, &face);
        atlas.get_or_create(b, &face);
        atlas.begin_frame();
        atlas.get_or_create(a, &face);
        assert!(atlas.get_or_create(c, &face).is_some());

        assert!(atlas.contains(&a));
        assert!(!atlas.contains(&b));
        assert!(atlas.contains(&c));
        assert_eq!(atlas.stats().evictions, 1);
    }

    #[test]
    fn current_frame_glyphs_are_never_evicted() {
        let mut atlas = atlas(AtlasConfig {
            max_glyphs: 2,
            ..AtlasConfig::default()
        });
        let face = Face::default();
        atlas.get_or_create(GlyphKey::new('a', FaceId(0), 1), &face);
        atlas.get_or_create(GlyphKey::new('b', FaceId(0), 1), &face);

        assert!(atlas.get_or_create(GlyphKey::new('c', FaceId(0), 1), &face).is_none());
        assert_eq!(atlas.len(), 2);
        assert_eq!(atlas.stats().evictions, 0);

        // Next frame the older glyphs are fair game
        atlas.begin_frame();
        assert!(atlas.get_or_create(GlyphKey::new('c', FaceId(0), 1), &face).is_some());
    }

    #[test]
    fn grows_pages_up_to_limit() {
        let mut atlas = atlas(AtlasConfig {
            max_pages: 2,
            ..small()
        });
        let face = Face::default();
        for ch in "abcdefghijkl".chars() {
            assert!(atlas.get_or_create(GlyphKey::new(ch, FaceId(0), 1), &face).is_some());
        }
        assert_eq!(atlas.page_count(), 2);
        let pages: Vec<u32> = atlas.take_uploads().iter().map(|u| u.page).collect();
        assert_eq!(pages.iter().filter(|&&p| p == 1).count(), 4);
    }

    #[test]
    fn evicted_region_is_recycled() {
        let mut atlas = atlas(small());
        let face = Face::default();
        let mut first = None;
        for ch in "abcdefgh".chars() {
            let glyph = atlas.get_or_create(GlyphKey::new(ch, FaceId(0), 1), &face).unwrap();
            first.get_or_insert(glyph);
        }
        let first = first.unwrap();

        // Page is full and every glyph is pinned
        assert!(atlas.get_or_create(GlyphKey::new('i', FaceId(0), 1), &face).is_none());

        atlas.begin_frame();
        let recycled = atlas.get_or_create(GlyphKey::new('i', FaceId(0), 1), &face).unwrap();
        assert_eq!(recycled.region, first.region);
        assert!(!atlas.contains(&GlyphKey::new('a', FaceId(0), 1)));
    }

    #[test]
    fn oversized_glyph_is_rejected() {
        let mut atlas = atlas(small());
        let face = Face {
            font_size: 200.0,
            ..Face::default()
        };
        assert!(atlas.get_or_create(GlyphKey::new('W', FaceId(0), 1), &face).is_none());
        assert_eq!(atlas.stats().failures, 1);
    }

    #[test]
    fn invalidate_face_frees_its_glyphs() {
        let mut atlas = atlas(AtlasConfig::default());
        let face = Face::default();
        atlas.get_or_create(GlyphKey::new('a', FaceId(1), 1), &face);
        atlas.get_or_create(GlyphKey::new('b', FaceId(1), 1), &face);
        atlas.get_or_create(GlyphKey::new('a', FaceId(2), 1), &face);

        assert_eq!(atlas.invalidate_face(FaceId(1)), 2);
        assert_eq!(atlas.len(), 1);
        assert!(atlas.contains(&GlyphKey::new('a', FaceId(2), 1)));
    }
}
