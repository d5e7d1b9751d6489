//! Shelf-based atlas page allocator
//!
//! Glyphs are packed left to right on horizontal shelves; a new shelf opens
//! below the last one when nothing fits. Every allocation carries one pixel
//! of padding on the right and bottom so linear sampling never bleeds into a
//! neighbour. Freed regions go to a free list and are reused first-fit; the
//! unused part of a reused region is split back into the list.

use crate::key::AtlasRegion;

/// Gap between packed glyphs
const PADDING: u32 = 1;

#[derive(Debug, Clone)]
struct Shelf {
    /// Next free x on the shelf
    x: u32,
    y: u32,
    /// Remaining width
    width: u32,
    height: u32,
}

/// Allocator for one atlas page
#[derive(Debug, Clone)]
pub struct ShelfAllocator {
    width: u32,
    height: u32,
    shelves: Vec<Shelf>,
    /// Freed padded regions
    free: Vec<AtlasRegion>,
    /// Maximum fraction of a shelf's height a glyph may leave unused
    waste_limit: f32,
    allocated: usize,
}

impl ShelfAllocator {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            shelves: Vec::new(),
            free: Vec::new(),
            waste_limit: 0.25,
            allocated: 0,
        }
    }

    /// Reserve a `width`x`height` region. Returns `None` when the page is full.
    pub fn allocate(&mut self, width: u32, height: u32) -> Option<AtlasRegion> {
        let padded_width = width.saturating_add(PADDING);
        let padded_height = height.saturating_add(PADDING);
        if padded_width > self.width || padded_height > self.height {
            return None;
        }

        let origin = self
            .take_free(padded_width, padded_height)
            .or_else(|| self.place_on_shelf(padded_width, padded_height))
            .or_else(|| self.create_new_shelf(padded_width, padded_height))?;

        self.allocated += 1;
        Some(AtlasRegion {
            x: origin.0,
            y: origin.1,
            width,
            height,
        })
    }

    /// Return a region handed out by [`allocate`](Self::allocate)
    pub fn deallocate(&mut self, region: AtlasRegion) {
        self.allocated = self.allocated.saturating_sub(1);
        self.free.push(AtlasRegion {
            x: region.x,
            y: region.y,
            width: region.width + PADDING,
            height: region.height + PADDING,
        });
    }

    fn take_free(&mut self, width: u32, height: u32) -> Option<(u32, u32)> {
        let idx = self
            .free
            .iter()
            .position(|r| r.width >= width && r.height >= height)?;
        let region = self.free.swap_remove(idx);

        // Guillotine cut: a strip right of the glyph, then everything below
        let right = AtlasRegion {
            x: region.x + width,
            y: region.y,
            width: region.width - width,
            height,
        };
        let below = AtlasRegion {
            x: region.x,
            y: region.y + height,
            width: region.width,
            height: region.height - height,
        };
        for rest in [right, below] {
            if rest.width > PADDING && rest.height > PADDING {
                self.free.push(rest);
            }
        }
        Some((region.x, region.y))
    }

    fn place_on_shelf(&mut self, width: u32, height: u32) -> Option<(u32, u32)> {
        let mut best: Option<(usize, f32)> = None;
        for (i, shelf) in self.shelves.iter().enumerate() {
            if shelf.width < width || shelf.height < height {
                continue;
            }
            let waste = (shelf.height - height) as f32 / shelf.height as f32;
            if waste > self.waste_limit {
                continue;
            }
            // Exact-height shelves win ties
            let score = if shelf.height == height { waste - 1.0 } else { waste };
            if best.map_or(true, |(_, s)| score < s) {
                best = Some((i, score));
            }
        }

        let (idx, _) = best?;
        let shelf = &mut self.shelves[idx];
        let origin = (shelf.x, shelf.y);
        shelf.x += width;
        shelf.width -= width;
        Some(origin)
    }

    fn create_new_shelf(&mut self, width: u32, height: u32) -> Option<(u32, u32)> {
        let y = self
            .shelves
            .last()
            .map_or(0, |s| s.y + s.height);
        if y.saturating_add(height) > self.height {
            return None;
        }
        self.shelves.push(Shelf {
            x: width,
            y,
            width: self.width - width,
            height,
        });
        Some((0, y))
    }

    /// Forget every allocation
    pub fn clear(&mut self) {
        self.shelves.clear();
        self.free.clear();
        self.allocated = 0;
    }

    /// Live allocations
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
