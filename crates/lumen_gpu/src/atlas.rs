//! GPU mirror of the glyph atlas pages

use lumen_text::GlyphUpload;

use crate::texture::GpuTexture;

/// One R8 texture per atlas page
pub struct AtlasTextures {
    pages: Vec<GpuTexture>,
    page_size: u32,
}

impl AtlasTextures {
    pub fn new(page_size: u32) -> Self {
        Self {
            pages: Vec::new(),
            page_size,
        }
    }

    /// Copy queued glyph bitmaps into their pages, creating pages as needed
    pub fn apply_uploads(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        uploads: &[GlyphUpload],
    ) {
        for upload in uploads {
            let page = upload.page as usize;
            while self.pages.len() <= page {
                let label = format!("Lumen Atlas Page {}", self.pages.len());
                self.pages.push(GpuTexture::new(
                    device,
                    self.page_size,
                    self.page_size,
                    wgpu::TextureFormat::R8Unorm,
                    wgpu::TextureUsages::empty(),
                    Some(&label),
                ));
                tracing::debug!("created atlas page texture {}", page);
            }
            let region = upload.region;
            self.pages[page].write_sub_rect(
                queue,
                region.x,
                region.y,
                region.width,
                region.height,
                &upload.pixels,
            );
        }
    }

    pub fn page(&self, index: u32) -> Option<&GpuTexture> {
        self.pages.get(index as usize)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}
