//! WGSL shaders
//!
//! All pipelines take positions in physical pixels and convert to clip space
//! with the viewport uniform. Output color is premultiplied.

/// Solid rectangles
pub const RECT_SHADER: &str = r#"
struct Uniforms {
    viewport_size: vec2<f32>,
    _padding: vec2<f32>,
}

@group(0) @binding(0) var<uniform> uniforms: Uniforms;

struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) color: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let ndc = in.position / uniforms.viewport_size * 2.0 - 1.0;
    out.clip_position = vec4<f32>(ndc.x, -ndc.y, 0.0, 1.0);
    out.color = in.color;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(in.color.rgb * in.color.a, in.color.a);
}
"#;

/// Glyphs sampled from an R8 coverage atlas page
pub const GLYPH_SHADER: &str = r#"
struct Uniforms {
    viewport_size: vec2<f32>,
    _padding: vec2<f32>,
}

@group(0) @binding(0) var<uniform> uniforms: Uniforms;
@group(0) @binding(1) var atlas_texture: texture_2d<f32>;
@group(0) @binding(2) var atlas_sampler: sampler;

struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) color: vec4<f32>,
    @location(3) params: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) color: vec4<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let ndc = in.position / uniforms.viewport_size * 2.0 - 1.0;
    out.clip_position = vec4<f32>(ndc.x, -ndc.y, 0.0, 1.0);
    out.uv = in.uv;
    out.color = in.color;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let coverage = textureSample(atlas_texture, atlas_sampler, in.uv).r;
    let alpha = coverage * in.color.a;
    return vec4<f32>(in.color.rgb * alpha, alpha);
}
"#;

/// RGBA textures: external views and transition snapshots
///
/// `params.x` forces opaque alpha for X-formats, `params.y` darkens the
/// sampled color (page-flip shading), `params.z` is a Gaussian blur radius
/// in physical pixels (blur transition). Sampling uses explicit LOD so the
/// blur loop stays valid in non-uniform control flow.
pub const TEXTURE_SHADER: &str = r#"
struct Uniforms {
    viewport_size: vec2<f32>,
    _padding: vec2<f32>,
}

@group(0) @binding(0) var<uniform> uniforms: Uniforms;
@group(0) @binding(1) var image_texture: texture_2d<f32>;
@group(0) @binding(2) var image_sampler: sampler;

struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) color: vec4<f32>,
    @location(3) params: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) color: vec4<f32>,
    @location(2) params: vec4<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let ndc = in.position / uniforms.viewport_size * 2.0 - 1.0;
    out.clip_position = vec4<f32>(ndc.x, -ndc.y, 0.0, 1.0);
    out.uv = in.uv;
    out.color = in.color;
    out.params = in.params;
    return out;
}

fn sample_at(uv: vec2<f32>) -> vec4<f32> {
    return textureSampleLevel(image_texture, image_sampler, uv, 0.0);
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var texel = sample_at(in.uv);
    let radius = in.params.z;
    if (radius > 0.0) {
        // 5x5 taps spread over the radius, sigma of half the radius
        let texel_size = 1.0 / vec2<f32>(textureDimensions(image_texture));
        let spacing = radius * 0.5 * texel_size;
        var sum = vec4<f32>(0.0);
        var total = 0.0;
        for (var i = -2; i <= 2; i++) {
            for (var j = -2; j <= 2; j++) {
                let d = vec2<f32>(f32(i), f32(j));
                let w = exp(-dot(d, d) * 0.5);
                sum += sample_at(in.uv + d * spacing) * w;
                total += w;
            }
        }
        texel = sum / total;
    }
    if (in.params.x > 0.5) {
        texel.a = 1.0;
    }
    let rgb = texel.rgb * in.color.rgb * (1.0 - in.params.y);
    let alpha = texel.a * in.color.a;
    return vec4<f32>(rgb * alpha, alpha);
}
"#;
