//! GPU vertex and uniform layouts
//!
//! Every primitive becomes two triangles of plain vertices, so batches are
//! vertex ranges drawn with `draw(range, 0..1)`.

use bytemuck::{Pod, Zeroable};

/// Solid-color vertex (backgrounds, stretches, borders, cursors)
///
/// Memory layout (matches RECT_SHADER VertexInput):
/// - `position`: `vec2<f32>` physical pixels
/// - `color`: `vec4<f32>` straight alpha
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct RectVertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

impl RectVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x4];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Textured vertex shared by the glyph and texture pipelines
///
/// Memory layout:
/// - `position`: `vec2<f32>` physical pixels
/// - `uv`: `vec2<f32>` normalized texture coordinates
/// - `color`: `vec4<f32>` glyph color, or tint for textures
/// - `params`: `vec4<f32>` (force_opaque, shade, blur radius in physical
///   pixels, unused)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TexturedVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 4],
    pub params: [f32; 4],
}

impl TexturedVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x2,
        1 => Float32x2,
        2 => Float32x4,
        3 => Float32x4
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Uniforms shared by all pipelines
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct Uniforms {
    /// Render target size in physical pixels
    pub viewport_size: [f32; 2],
    pub _padding: [f32; 2],
}

impl Uniforms {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            viewport_size: [width as f32, height as f32],
            _padding: [0.0; 2],
        }
    }
}

/// Append an axis-aligned rectangle as two triangles
pub fn push_rect(out: &mut Vec<RectVertex>, x: f32, y: f32, width: f32, height: f32, color: [f32; 4]) {
    let (x1, y1) = (x + width, y + height);
    for position in [[x, y], [x1, y], [x1, y1], [x, y], [x1, y1], [x, y1]] {
        out.push(RectVertex { position, color });
    }
}

/// Append a solid quad with arbitrary corners (top-left, top-right,
/// bottom-right, bottom-left)
pub fn push_solid_quad(out: &mut Vec<RectVertex>, corners: [[f32; 2]; 4], color: [f32; 4]) {
    for i in [0usize, 1, 2, 0, 2, 3] {
        out.push(RectVertex {
            position: corners[i],
            color,
        });
    }
}

/// Append a textured quad. Corners and uvs are ordered top-left, top-right,
/// bottom-right, bottom-left.
pub fn push_quad(
    out: &mut Vec<TexturedVertex>,
    corners: [[f32; 2]; 4],
    uv: [[f32; 2]; 4],
    color: [f32; 4],
    params: [f32; 4],
) {
    for i in [0usize, 1, 2, 0, 2, 3] {
        out.push(TexturedVertex {
            position: corners[i],
            uv: uv[i],
            color,
            params,
        });
    }
}

/// Corners of an axis-aligned rectangle in quad order
pub fn rect_corners(x: f32, y: f32, width: f32, height: f32) -> [[f32; 2]; 4] {
    [[x, y], [x + width, y], [x + width, y + height], [x, y + height]]
}

/// UV corners of an `(u0, v0, u1, v1)` rectangle in quad order
pub fn uv_corners(uv: [f32; 4]) -> [[f32; 2]; 4] {
    [[uv[0], uv[1]], [uv[2], uv[1]], [uv[2], uv[3]], [uv[0], uv[3]]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_sizes_match_shader_layout() {
        assert_eq!(std::mem::size_of::<RectVertex>(), 24);
        assert_eq!(std::mem::size_of::<TexturedVertex>(), 48);
        assert_eq!(std::mem::size_of::<Uniforms>(), 16);
    }

    #[test]
    fn rect_emits_two_triangles() {
        let mut out = Vec::new();
        push_rect(&mut out, 1.0, 2.0, 3.0, 4.0, [1.0; 4]);
        assert_eq!(out.len(), 6);
        assert_eq!(out[2].position, [4.0, 6.0]);
        assert_eq!(out[5].position, [1.0, 6.0]);
    }

    #[test]
    fn quad_keeps_uv_with_corner() {
        let mut out = Vec::new();
        push_quad(
            &mut out,
            rect_corners(0.0, 0.0, 10.0, 10.0),
            uv_corners([0.0, 0.0, 0.5, 0.25]),
            [1.0; 4],
            [0.0; 4],
        );
        assert_eq!(out.len(), 6);
        assert_eq!(out[2].position, [10.0, 10.0]);
        assert_eq!(out[2].uv, [0.5, 0.25]);
        assert_eq!(out[5].uv, [0.0, 0.25]);
    }
}
