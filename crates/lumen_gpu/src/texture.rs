//! Sampled GPU textures with sub-rect uploads

use std::borrow::Cow;

/// A 2D texture plus its default view
pub struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
}

impl GpuTexture {
    /// Create an uninitialized texture. `extra_usage` is added to
    /// `TEXTURE_BINDING | COPY_DST`.
    pub fn new(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        extra_usage: wgpu::TextureUsages,
        label: Option<&str>,
    ) -> Self {
        let max_dim = device.limits().max_texture_dimension_2d;
        let width = width.clamp(1, max_dim);
        let height = height.clamp(1, max_dim);

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | extra_usage,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            width,
            height,
            format,
        }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn matches(&self, width: u32, height: u32, format: wgpu::TextureFormat) -> bool {
        self.width == width && self.height == height && self.format == format
    }

    /// Write tightly packed pixels into a sub-rect.
    ///
    /// Rows are repacked to `COPY_BYTES_PER_ROW_ALIGNMENT` when needed.
    pub fn write_sub_rect(
        &self,
        queue: &wgpu::Queue,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) {
        if width == 0 || height == 0 {
            return;
        }
        let Some(bytes_per_pixel) = self.format.block_copy_size(None) else {
            return;
        };
        let row_bytes = match (width as usize).checked_mul(bytes_per_pixel as usize) {
            Some(v) => v,
            None => return,
        };
        let padded_row_bytes = padded_bytes_per_row(row_bytes);
        let data: Cow<'_, [u8]> = if padded_row_bytes == row_bytes {
            Cow::Borrowed(pixels)
        } else {
            match repack_rows(pixels, row_bytes, row_bytes, height as usize) {
                Some(padded) => Cow::Owned(padded),
                None => return,
            }
        };
        self.write_rows(queue, x, y, width, height, &data, padded_row_bytes);
    }

    /// Write pixels whose rows are `stride` bytes apart
    #[allow(clippy::too_many_arguments)]
    pub fn write_rows(
        &self,
        queue: &wgpu::Queue,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        pixels: &[u8],
        stride: usize,
    ) {
        let width = width.min(self.width.saturating_sub(x));
        let height = height.min(self.height.saturating_sub(y));
        if width == 0 || height == 0 {
            return;
        }

        let Some(bytes_per_pixel) = self.format.block_copy_size(None) else {
            return;
        };
        let row_bytes = width as usize * bytes_per_pixel as usize;
        let Some(required_len) = rows_len(stride, row_bytes, height as usize) else {
            return;
        };
        if pixels.len() < required_len {
            tracing::warn!(
                "texture upload of {}x{} needs {} bytes, got {}",
                width,
                height,
                required_len,
                pixels.len()
            );
            return;
        }
        let Ok(bytes_per_row) = u32::try_from(stride) else {
            return;
        };

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            &pixels[..required_len],
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }
}

/// Bytes spanned by `height` rows of `row_bytes` spaced `stride` apart.
/// `None` when the stride is shorter than a row or the size overflows.
pub fn rows_len(stride: usize, row_bytes: usize, height: usize) -> Option<usize> {
    if stride < row_bytes || height == 0 {
        return None;
    }
    stride.checked_mul(height - 1)?.checked_add(row_bytes)
}

/// Copy `height` rows of `row_bytes` from a buffer with `stride` into a new
/// buffer whose rows are padded to the copy alignment
pub fn repack_rows(pixels: &[u8], stride: usize, row_bytes: usize, height: usize) -> Option<Vec<u8>> {
    let required = rows_len(stride, row_bytes, height)?;
    if pixels.len() < required {
        return None;
    }
    let padded_row_bytes = padded_bytes_per_row(row_bytes);
    let mut padded = vec![0u8; padded_row_bytes.checked_mul(height)?];
    for row in 0..height {
        let src = row * stride;
        let dst = row * padded_row_bytes;
        padded[dst..dst + row_bytes].copy_from_slice(&pixels[src..src + row_bytes]);
    }
    Some(padded)
}

/// Bytes per row after padding to the copy alignment
pub fn padded_bytes_per_row(row_bytes: usize) -> usize {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize;
    row_bytes.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repack_drops_producer_padding() {
        // 2x2 RGBA rows with 4 bytes of trailing producer padding
        let mut pixels = Vec::new();
        for row in 0..2u8 {
            pixels.extend_from_slice(&[row; 8]);
            pixels.extend_from_slice(&[0xEE; 4]);
        }
        let packed = repack_rows(&pixels, 12, 8, 2).unwrap();
        assert_eq!(packed.len(), 512);
        assert_eq!(&packed[..8], &[0; 8]);
        assert_eq!(&packed[256..264], &[1; 8]);
        assert_eq!(packed[8], 0);
    }

    #[test]
    fn short_sources_are_rejected() {
        assert_eq!(rows_len(12, 8, 2), Some(20));
        assert_eq!(rows_len(4, 8, 2), None);
        assert!(repack_rows(&[0; 19], 12, 8, 2).is_none());
    }

    #[test]
    fn rows_pad_to_copy_alignment() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(256), 256);
        assert_eq!(padded_bytes_per_row(257), 512);
    }
}
