//! Frame plans
//!
//! A [`FramePlan`] is everything the GPU needs to draw one window frame,
//! built on the CPU from the retained scene: vertices in physical pixels and
//! an ordered list of draw batches. Building never touches the device, so
//! plans are deterministic and testable without a GPU.
//!
//! Primitives are sorted into fixed layers, back to front: backgrounds,
//! filled cursors, text, borders, external views, then outline cursors and
//! cursor effects. Inside a layer submission order is kept and every
//! primitive of one pipeline and binding lands in a single batch, so the
//! number of draw calls depends on the pages and views in use, not on the
//! number of cells.

use std::ops::Range;

use lumen_animation::{
    AnimationEngine, AnimationTarget, CursorAnimationMode, CursorEffects, LayerSource,
    PropertyStore,
};
use lumen_core::{
    Color, CursorStyle, FaceTable, FrameGlyph, FrameGlyphBuffer, Point, Rect, ViewId, WindowId,
};
use lumen_text::{GlyphAtlas, GlyphKey};

use crate::primitives::{
    push_quad, push_rect, push_solid_quad, rect_corners, uv_corners, RectVertex, TexturedVertex,
};

/// Logical thickness of bar and underline cursors
const CURSOR_BAR_WIDTH: f32 = 2.0;
/// Logical stroke of a hollow cursor
const CURSOR_OUTLINE: f32 = 1.0;
/// Straight segments per effect ring
const RING_SEGMENTS: usize = 24;

/// Draw layers, back to front
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Layer {
    Backgrounds,
    CursorBack,
    Text,
    Overlays,
    Media,
    CursorFront,
}

const LAYER_COUNT: usize = 6;

/// Vertices of one layer before they are laid out in the plan
#[derive(Default)]
struct LayerBuffer {
    rects: Vec<RectVertex>,
    /// Textured quads per pipeline and binding, first use first
    textured: Vec<(PipelineKind, BatchBinding, Vec<TexturedVertex>)>,
}

impl LayerBuffer {
    fn quads(&mut self, pipeline: PipelineKind, binding: BatchBinding) -> &mut Vec<TexturedVertex> {
        let index = match self
            .textured
            .iter()
            .position(|(p, b, _)| *p == pipeline && *b == binding)
        {
            Some(index) => index,
            None => {
                self.textured.push((pipeline, binding, Vec::new()));
                self.textured.len() - 1
            }
        };
        &mut self.textured[index].2
    }
}

/// Which pipeline draws a batch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    /// Solid rectangles from `rect_vertices`
    Rect,
    /// Atlas glyphs from `textured_vertices`
    Glyph,
    /// RGBA textures from `textured_vertices` (or `composite_vertices`)
    Texture,
}

/// Texture bound for a batch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BatchBinding {
    None,
    AtlasPage(u32),
    View(ViewId),
    Snapshot(LayerSource),
}

/// One draw call: a vertex range of one pipeline with one binding
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawBatch {
    pub pipeline: PipelineKind,
    pub binding: BatchBinding,
    pub vertices: Range<u32>,
}

impl DrawBatch {
    pub fn vertex_count(&self) -> u32 {
        self.vertices.end - self.vertices.start
    }
}

/// Imported texture facts the planner needs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewTextureInfo {
    pub width: u32,
    pub height: u32,
    /// Alpha channel is padding (X-formats)
    pub opaque: bool,
}

/// Resolves external views to their latest imported texture
pub trait ViewLookup {
    fn view_texture(&self, view: ViewId) -> Option<ViewTextureInfo>;
}

/// Lookup for sessions without any external views
pub struct NoViews;

impl ViewLookup for NoViews {
    fn view_texture(&self, _view: ViewId) -> Option<ViewTextureInfo> {
        None
    }
}

/// CPU-side description of one frame
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FramePlan {
    pub window: WindowId,
    pub frame_number: u64,
    /// Integer scale factor the plan was built at
    pub scale: u32,
    pub physical_size: (u32, u32),
    pub clear_color: [f32; 4],
    pub rect_vertices: Vec<RectVertex>,
    pub textured_vertices: Vec<TexturedVertex>,
    /// Scene draws in paint order
    pub batches: Vec<DrawBatch>,
    /// Transition layers drawn over the scene snapshots. Empty when the
    /// window is not transitioning and the scene goes straight to the target.
    pub composite: Vec<DrawBatch>,
    pub composite_vertices: Vec<TexturedVertex>,
    /// Characters dropped because no glyph could be produced
    pub skipped_glyphs: u32,
}

impl FramePlan {
    /// Build the plan for `frame`.
    ///
    /// Starts a new atlas generation, so glyphs resolved here stay resident
    /// until the next plan is built.
    pub fn build(
        frame: &FrameGlyphBuffer,
        atlas: &mut GlyphAtlas,
        faces: &FaceTable,
        views: &dyn ViewLookup,
        animations: &AnimationEngine,
        scale: u32,
    ) -> FramePlan {
        atlas.begin_frame();
        let window = frame.window();
        let scale = scale.max(1);
        let s = scale as f32;

        let mut builder = PlanBuilder {
            plan: FramePlan {
                window,
                frame_number: frame.frame_number(),
                scale,
                physical_size: (
                    (frame.width() * s).round() as u32,
                    (frame.height() * s).round() as u32,
                ),
                clear_color: frame.background().to_array(),
                ..FramePlan::default()
            },
            scale: s,
            store: animations.store(),
            layers: Default::default(),
        };

        // Frame background, never displaced by content animations
        let (pw, ph) = builder.plan.physical_size;
        builder.rect_fill(
            Rect::new(0.0, 0.0, pw as f32, ph as f32),
            frame.background(),
        );

        let win_target = AnimationTarget::Window(window);
        let base = Adjust {
            offset: builder.store.offset(win_target),
            size_delta: [0.0; 2],
            scale: 1.0,
            rotation: 0.0,
            opacity: builder.store.opacity(win_target),
        };
        let cursor_visible = animations.cursor_visible(window);
        let wireframe = animations.cursor_mode() == CursorAnimationMode::Wireframe;

        for (index, glyph) in frame.glyphs().iter().enumerate() {
            let cell = AnimationTarget::GlyphCell {
                window,
                index: index as u32,
            };
            let adjust = base.with(builder.store, cell);

            match *glyph {
                FrameGlyph::Background { bounds, color } => {
                    builder.rect(Layer::Backgrounds, bounds, color, &adjust);
                }
                FrameGlyph::Stretch {
                    x,
                    y,
                    width,
                    height,
                    bg,
                } => {
                    builder.rect(Layer::Backgrounds, Rect::new(x, y, width, height), bg, &adjust);
                }
                FrameGlyph::Border {
                    x,
                    y,
                    width,
                    height,
                    color,
                } => {
                    builder.rect(Layer::Overlays, Rect::new(x, y, width, height), color, &adjust);
                }
                FrameGlyph::Cursor {
                    x,
                    y,
                    width,
                    height,
                    style,
                    color,
                    active,
                } => {
                    // Inactive cursors are drawn hollow and do not blink
                    if active && !cursor_visible {
                        continue;
                    }
                    let style = if active && !wireframe { style } else { CursorStyle::Hollow };
                    let adjust = adjust.with(builder.store, AnimationTarget::Cursor(window));
                    let bounds = Rect::new(
                        x,
                        y,
                        width + adjust.size_delta[0],
                        height + adjust.size_delta[1],
                    );
                    builder.cursor(bounds, style, color, &adjust);
                }
                FrameGlyph::Char {
                    ch,
                    x,
                    y,
                    width,
                    height,
                    ascent,
                    fg,
                    face_id,
                } => {
                    let face = faces.resolve(face_id);
                    let key = GlyphKey::new(ch, face_id, scale);
                    match atlas.get_or_create(key, face) {
                        Some(cached) if !cached.is_empty() => {
                            let cell = Rect::new(x, y, width, height);
                            let ox = (x + adjust.offset[0]) * s + cached.bearing_x as f32;
                            let oy = (y + ascent + adjust.offset[1]) * s - cached.bearing_y as f32;
                            let quad = Rect::new(
                                ox,
                                oy,
                                cached.width() as f32,
                                cached.height() as f32,
                            );
                            let pivot = builder.physical(cell, &adjust).center();
                            builder.glyph(quad, pivot, cached.page, cached.uv, fg, &adjust);
                        }
                        Some(_) => {}
                        None => builder.plan.skipped_glyphs += 1,
                    }
                }
                FrameGlyph::ExternalView {
                    view_id,
                    x,
                    y,
                    width,
                    height,
                } => {
                    let Some(info) = views.view_texture(view_id) else {
                        continue;
                    };
                    let adjust = adjust.with(builder.store, AnimationTarget::ExternalView(view_id));
                    builder.view(Rect::new(x, y, width, height), view_id, info, &adjust);
                }
            }
        }

        if let (Some(effects), Some(now)) = (animations.cursor_effects(window), animations.last_tick()) {
            builder.effects(effects, now);
        }

        builder.lay_out();

        if let Some(layers) = animations.transition_layers(window, frame.width(), frame.height()) {
            for layer in &layers {
                let corners = layer.corners.map(|[x, y]| [x * s, y * s]);
                let start = builder.plan.composite_vertices.len() as u32;
                push_quad(
                    &mut builder.plan.composite_vertices,
                    corners,
                    layer.uv,
                    [1.0, 1.0, 1.0, layer.opacity],
                    [0.0, layer.shade, layer.blur * s, 0.0],
                );
                let end = builder.plan.composite_vertices.len() as u32;
                push_batch(
                    &mut builder.plan.composite,
                    PipelineKind::Texture,
                    BatchBinding::Snapshot(layer.source),
                    start..end,
                );
            }
        }

        let plan = builder.plan;
        tracing::debug!(
            "{} frame {}: {} batches, {} rect + {} textured vertices, {} glyphs skipped",
            plan.window,
            plan.frame_number,
            plan.batches.len(),
            plan.rect_vertices.len(),
            plan.textured_vertices.len(),
            plan.skipped_glyphs
        );
        plan
    }

    /// Scene batches drawn with `pipeline`
    pub fn batches_of(&self, pipeline: PipelineKind) -> impl Iterator<Item = &DrawBatch> {
        self.batches.iter().filter(move |b| b.pipeline == pipeline)
    }

    /// Whether the present pass composites transition layers
    pub fn is_transitioning(&self) -> bool {
        !self.composite.is_empty()
    }

    /// Atlas pages referenced by the scene
    pub fn atlas_pages(&self) -> impl Iterator<Item = u32> + '_ {
        self.batches.iter().filter_map(|b| match b.binding {
            BatchBinding::AtlasPage(page) => Some(page),
            _ => None,
        })
    }

    /// External views referenced by the scene
    pub fn views(&self) -> impl Iterator<Item = ViewId> + '_ {
        self.batches.iter().filter_map(|b| match b.binding {
            BatchBinding::View(view) => Some(view),
            _ => None,
        })
    }
}

/// Animated adjustments accumulated for one primitive
#[derive(Clone, Copy, Debug)]
struct Adjust {
    /// Logical pixels
    offset: [f32; 2],
    size_delta: [f32; 2],
    scale: f32,
    rotation: f32,
    opacity: f32,
}

impl Adjust {
    /// Combine with the values animated on `target`
    fn with(&self, store: &PropertyStore, target: AnimationTarget) -> Adjust {
        let offset = store.offset(target);
        let size_delta = store.size_delta(target);
        Adjust {
            offset: [self.offset[0] + offset[0], self.offset[1] + offset[1]],
            size_delta: [
                self.size_delta[0] + size_delta[0],
                self.size_delta[1] + size_delta[1],
            ],
            scale: self.scale * store.scale(target),
            rotation: self.rotation + store.rotation(target),
            opacity: self.opacity * store.opacity(target),
        }
    }

    /// Corners of a physical rect after scale and rotation about `pivot`
    fn corners(&self, rect: Rect, pivot: Point) -> Option<[[f32; 2]; 4]> {
        if rect.is_empty() || !rect.is_valid() || self.scale <= 0.0 {
            return None;
        }
        let corners = rect_corners(rect.x(), rect.y(), rect.width(), rect.height());
        if self.scale == 1.0 && self.rotation == 0.0 {
            return Some(corners);
        }
        let (sin, cos) = self.rotation.sin_cos();
        Some(corners.map(|[x, y]| {
            let dx = (x - pivot.x) * self.scale;
            let dy = (y - pivot.y) * self.scale;
            [pivot.x + dx * cos - dy * sin, pivot.y + dx * sin + dy * cos]
        }))
    }
}

struct PlanBuilder<'a> {
    plan: FramePlan,
    scale: f32,
    store: &'a PropertyStore,
    layers: [LayerBuffer; LAYER_COUNT],
}

impl PlanBuilder<'_> {
    fn layer(&mut self, layer: Layer) -> &mut LayerBuffer {
        &mut self.layers[layer as usize]
    }

    /// Logical rect to physical, with the animated offset applied
    fn physical(&self, rect: Rect, adjust: &Adjust) -> Rect {
        rect.offset(adjust.offset[0], adjust.offset[1])
            .scaled(self.scale)
    }

    /// Untransformed physical rect in the background layer
    fn rect_fill(&mut self, rect: Rect, color: Color) {
        if rect.is_empty() || color.a <= 0.0 {
            return;
        }
        push_rect(
            &mut self.layer(Layer::Backgrounds).rects,
            rect.x(),
            rect.y(),
            rect.width(),
            rect.height(),
            color.to_array(),
        );
    }

    fn rect(&mut self, layer: Layer, logical: Rect, color: Color, adjust: &Adjust) {
        let color = color.fade(adjust.opacity);
        if color.a <= 0.0 {
            return;
        }
        let rect = self.physical(logical, adjust);
        let Some(corners) = adjust.corners(rect, rect.center()) else {
            return;
        };
        push_solid_quad(&mut self.layer(layer).rects, corners, color.to_array());
    }

    /// Filled box cursors sit under the text; the others are drawn over it
    fn cursor(&mut self, bounds: Rect, style: CursorStyle, color: Color, adjust: &Adjust) {
        let (x, y, w, h) = (bounds.x(), bounds.y(), bounds.width(), bounds.height());
        let front = Layer::CursorFront;
        match style {
            CursorStyle::Box => self.rect(Layer::CursorBack, bounds, color, adjust),
            CursorStyle::Bar => {
                self.rect(front, Rect::new(x, y, CURSOR_BAR_WIDTH.min(w), h), color, adjust)
            }
            CursorStyle::Hbar => {
                let t = CURSOR_BAR_WIDTH.min(h);
                self.rect(front, Rect::new(x, y + h - t, w, t), color, adjust)
            }
            CursorStyle::Hollow => {
                let t = CURSOR_OUTLINE.min(w / 2.0).min(h / 2.0);
                self.rect(front, Rect::new(x, y, w, t), color, adjust);
                self.rect(front, Rect::new(x, y + h - t, w, t), color, adjust);
                self.rect(front, Rect::new(x, y + t, t, h - 2.0 * t), color, adjust);
                self.rect(front, Rect::new(x + w - t, y + t, t, h - 2.0 * t), color, adjust);
            }
        }
    }

    fn glyph(&mut self, quad: Rect, pivot: Point, page: u32, uv: [f32; 4], fg: Color, adjust: &Adjust) {
        let color = fg.fade(adjust.opacity);
        if color.a <= 0.0 {
            return;
        }
        let Some(corners) = adjust.corners(quad, pivot) else {
            return;
        };
        push_quad(
            self.layer(Layer::Text)
                .quads(PipelineKind::Glyph, BatchBinding::AtlasPage(page)),
            corners,
            uv_corners(uv),
            color.to_array(),
            [0.0; 4],
        );
    }

    fn view(&mut self, logical: Rect, view: ViewId, info: ViewTextureInfo, adjust: &Adjust) {
        let opacity = adjust.opacity.clamp(0.0, 1.0);
        if opacity <= 0.0 {
            return;
        }
        let rect = self.physical(logical, adjust);
        let Some(corners) = adjust.corners(rect, rect.center()) else {
            return;
        };
        push_quad(
            self.layer(Layer::Media)
                .quads(PipelineKind::Texture, BatchBinding::View(view)),
            corners,
            uv_corners([0.0, 0.0, 1.0, 1.0]),
            [1.0, 1.0, 1.0, opacity],
            [if info.opaque { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
        );
    }

    /// Particles and trail points as squares, rings as thin segments
    fn effects(&mut self, effects: &CursorEffects, now: std::time::Instant) {
        let s = self.scale;
        let out = &mut self.layers[Layer::CursorFront as usize].rects;
        let mut square = |x: f32, y: f32, size: f32, color: Color| {
            if size <= 0.0 || color.a <= 0.0 {
                return;
            }
            let half = size * s / 2.0;
            push_rect(out, x * s - half, y * s - half, half * 2.0, half * 2.0, color.to_array());
        };

        for particle in effects.particles() {
            let color = particle.color.fade(particle.opacity(now));
            square(particle.x, particle.y, particle.current_size(now), color);
        }
        let points = effects.trail().len().max(1) as f32;
        for (i, point) in effects.trail().iter().enumerate() {
            // Older points are smaller
            let size = 2.0 + 4.0 * (i as f32 + 1.0) / points;
            square(point.x, point.y, size, point.color.fade(point.opacity(now) * 0.6));
        }

        for ring in effects.rings() {
            let color = ring.color.fade(ring.opacity(now));
            if color.a <= 0.0 {
                continue;
            }
            let inner = (ring.radius - ring.thickness / 2.0).max(0.0) * s;
            let outer = (ring.radius + ring.thickness / 2.0) * s;
            let (cx, cy) = (ring.x * s, ring.y * s);
            let at = |r: f32, k: usize| {
                let angle = k as f32 / RING_SEGMENTS as f32 * std::f32::consts::TAU;
                [cx + r * angle.cos(), cy + r * angle.sin()]
            };
            for k in 0..RING_SEGMENTS {
                let corners = [at(outer, k), at(outer, k + 1), at(inner, k + 1), at(inner, k)];
                push_solid_quad(out, corners, color.to_array());
            }
        }
    }

    /// Move the layers into the plan, back to front, one batch per pipeline
    /// and binding of each layer
    fn lay_out(&mut self) {
        let layers = std::mem::take(&mut self.layers);
        for layer in layers {
            let start = self.plan.rect_vertices.len() as u32;
            self.plan.rect_vertices.extend(layer.rects);
            let end = self.plan.rect_vertices.len() as u32;
            push_batch(&mut self.plan.batches, PipelineKind::Rect, BatchBinding::None, start..end);

            for (pipeline, binding, vertices) in layer.textured {
                let start = self.plan.textured_vertices.len() as u32;
                self.plan.textured_vertices.extend(vertices);
                let end = self.plan.textured_vertices.len() as u32;
                push_batch(&mut self.plan.batches, pipeline, binding, start..end);
            }
        }
    }
}

/// Append a batch, extending the previous one when it is compatible and
/// contiguous
fn push_batch(
    batches: &mut Vec<DrawBatch>,
    pipeline: PipelineKind,
    binding: BatchBinding,
    vertices: Range<u32>,
) {
    if vertices.is_empty() {
        return;
    }
    if let Some(last) = batches.last_mut() {
        if last.pipeline == pipeline
            && last.binding == binding
            && last.vertices.end == vertices.start
        {
            last.vertices.end = vertices.end;
            return;
        }
    }
    batches.push(DrawBatch {
        pipeline,
        binding,
        vertices,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use lumen_animation::{AnimatedProperty, AnimationValue, Easing, TransitionKind};
    use lumen_core::{Face, FaceId};
    use lumen_text::{AtlasConfig, BlockRasterizer};

    const W: WindowId = WindowId(1);

    struct Fixture {
        atlas: GlyphAtlas,
        faces: FaceTable,
        engine: AnimationEngine,
        frame: FrameGlyphBuffer,
    }

    impl Fixture {
        fn new() -> Self {
            let mut faces = FaceTable::new();
            faces.set(
                FaceId(1),
                Face {
                    foreground: Color::rgb(1.0, 0.0, 0.0),
                    ..Face::default()
                },
            );
            let mut frame = FrameGlyphBuffer::new(W);
            frame.begin_frame(800.0, 600.0, Color::WHITE);
            Self {
                atlas: GlyphAtlas::new(AtlasConfig::default(), BlockRasterizer::new()),
                faces,
                engine: AnimationEngine::new(),
                frame,
            }
        }

        fn char(&mut self, ch: char, x: f32) {
            let fg = self.faces.resolve(FaceId(1)).foreground;
            self.frame.add_char(ch, x, 0.0, 8.0, 12.0, 4.0, fg, FaceId(1));
        }

        fn plan(&mut self, scale: u32) -> FramePlan {
            FramePlan::build(
                &self.frame,
                &mut self.atlas,
                &self.faces,
                &NoViews,
                &self.engine,
                scale,
            )
        }
    }

    fn pipelines(plan: &FramePlan) -> Vec<PipelineKind> {
        plan.batches.iter().map(|b| b.pipeline).collect()
    }

    #[test]
    fn background_and_one_char() {
        let mut fx = Fixture::new();
        fx.char('A', 10.0);
        fx.frame.end_frame();
        let plan = fx.plan(1);

        assert_eq!(pipelines(&plan), vec![PipelineKind::Rect, PipelineKind::Glyph]);
        assert_eq!(plan.batches[0].vertex_count(), 6);
        assert_eq!(plan.batches[1].vertex_count(), 6);
        assert_eq!(plan.batches[1].binding, BatchBinding::AtlasPage(0));
        assert_eq!(plan.textured_vertices[0].color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(plan.clear_color, [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(plan.physical_size, (800, 600));
        assert!(!plan.is_transitioning());
    }

    #[test]
    fn borders_draw_over_text() {
        let mut fx = Fixture::new();
        fx.frame.add_border(0.0, 0.0, 10.0, 10.0, Color::BLACK);
        fx.char('a', 0.0);
        fx.char('b', 8.0);
        fx.frame.add_border(0.0, 20.0, 10.0, 1.0, Color::BLACK);
        let plan = fx.plan(1);

        assert_eq!(
            pipelines(&plan),
            vec![
                PipelineKind::Rect,
                PipelineKind::Glyph,
                PipelineKind::Rect
            ]
        );
        assert_eq!(plan.batches[0].vertices, 0..6);
        assert_eq!(plan.batches[1].vertex_count(), 12);
        // Both borders share one batch after the text
        assert_eq!(plan.batches[2].vertices, 6..18);
    }

    #[test]
    fn batch_count_does_not_grow_with_cells() {
        let batches = |cells: usize| {
            let mut fx = Fixture::new();
            for i in 0..cells {
                let x = (i % 80) as f32 * 8.0;
                let y = (i / 80) as f32 * 16.0;
                fx.frame.add_stretch(x, y, 8.0, 16.0, Color::BLACK);
                let fg = fx.faces.resolve(FaceId(1)).foreground;
                let ch = char::from(b'a' + (i % 26) as u8);
                fx.frame.add_char(ch, x, y, 8.0, 12.0, 4.0, fg, FaceId(1));
            }
            fx.frame
                .add_cursor(0.0, 0.0, 8.0, 16.0, CursorStyle::Bar, Color::BLACK, true);
            fx.frame.add_border(0.0, 590.0, 800.0, 1.0, Color::BLACK);
            let plan = fx.plan(1);
            assert_eq!(plan.rect_vertices.len(), 6 * (cells + 3));
            assert_eq!(plan.textured_vertices.len(), 6 * cells);
            pipelines(&plan)
        };

        let expected = vec![PipelineKind::Rect, PipelineKind::Glyph, PipelineKind::Rect];
        assert_eq!(batches(10), expected);
        assert_eq!(batches(500), expected);
    }

    #[test]
    fn box_cursor_sits_under_text() {
        let mut fx = Fixture::new();
        fx.char('a', 0.0);
        fx.frame
            .add_cursor(0.0, 0.0, 8.0, 16.0, CursorStyle::Box, Color::BLACK, true);
        let plan = fx.plan(1);
        assert_eq!(pipelines(&plan), vec![PipelineKind::Rect, PipelineKind::Glyph]);
        // Frame background then the cursor, both before the glyph batch
        assert_eq!(plan.batches[0].vertices, 0..12);
        assert_eq!(plan.rect_vertices[6].color, Color::BLACK.to_array());
    }

    #[test]
    fn whitespace_and_zero_area_emit_nothing() {
        let mut fx = Fixture::new();
        fx.char(' ', 0.0);
        fx.frame.add_stretch(0.0, 0.0, 0.0, 10.0, Color::BLACK);
        let plan = fx.plan(1);
        assert_eq!(pipelines(&plan), vec![PipelineKind::Rect]);
        assert_eq!(plan.skipped_glyphs, 0);
    }

    #[test]
    fn failed_glyph_is_skipped() {
        let mut fx = Fixture::new();
        fx.char('\u{1}', 0.0);
        fx.char('x', 8.0);
        let plan = fx.plan(1);
        assert_eq!(plan.skipped_glyphs, 1);
        assert_eq!(plan.batches_of(PipelineKind::Glyph).count(), 1);
    }

    #[test]
    fn scale_two_doubles_geometry() {
        let mut fx = Fixture::new();
        fx.frame.add_border(10.0, 20.0, 30.0, 40.0, Color::BLACK);
        let plan = fx.plan(2);
        assert_eq!(plan.physical_size, (1600, 1200));
        assert_eq!(plan.rect_vertices[6].position, [20.0, 40.0]);
        assert_eq!(plan.rect_vertices[8].position, [80.0, 120.0]);
    }

    #[test]
    fn glyph_sits_on_baseline() {
        let mut fx = Fixture::new();
        fx.char('H', 100.0);
        let plan = fx.plan(1);
        // 14px block: 7x10 with bearing_y 10, baseline at y = 12
        let top_left = plan.textured_vertices[0].position;
        assert_eq!(top_left, [100.0, 2.0]);
        assert_eq!(plan.textured_vertices[2].position, [107.0, 12.0]);
    }

    #[test]
    fn inactive_cursor_is_hollow() {
        let mut fx = Fixture::new();
        fx.frame
            .add_cursor(0.0, 0.0, 8.0, 16.0, CursorStyle::Box, Color::BLACK, false);
        let plan = fx.plan(1);
        // Background + four outline edges
        assert_eq!(plan.rect_vertices.len(), 6 + 24);
    }

    #[test]
    fn bar_cursor_is_thin() {
        let mut fx = Fixture::new();
        fx.frame
            .add_cursor(5.0, 0.0, 8.0, 16.0, CursorStyle::Bar, Color::BLACK, true);
        let plan = fx.plan(1);
        assert_eq!(plan.rect_vertices[6].position, [5.0, 0.0]);
        assert_eq!(plan.rect_vertices[7].position, [7.0, 0.0]);
    }

    #[test]
    fn blinking_cursor_hides_in_off_phase() {
        let mut fx = Fixture::new();
        let t0 = Instant::now();
        fx.engine.cursor_moved(W, t0);
        fx.frame
            .add_cursor(0.0, 0.0, 8.0, 16.0, CursorStyle::Box, Color::BLACK, true);

        fx.engine.tick(t0 + Duration::from_millis(100));
        assert_eq!(fx.plan(1).rect_vertices.len(), 12);

        fx.engine.tick(t0 + Duration::from_millis(600));
        assert_eq!(fx.plan(1).rect_vertices.len(), 6);
    }

    #[test]
    fn window_offset_moves_content_not_background() {
        let mut fx = Fixture::new();
        fx.frame.add_border(10.0, 10.0, 5.0, 5.0, Color::BLACK);
        fx.engine.store_mut().set(
            AnimationTarget::Window(W),
            AnimatedProperty::Position,
            AnimationValue::Pair([0.0, 30.0]),
        );
        let plan = fx.plan(1);
        assert_eq!(plan.rect_vertices[0].position, [0.0, 0.0]);
        assert_eq!(plan.rect_vertices[6].position, [10.0, 40.0]);
    }

    #[test]
    fn transparent_cell_is_dropped() {
        let mut fx = Fixture::new();
        fx.char('a', 0.0);
        fx.engine.store_mut().set(
            AnimationTarget::GlyphCell { window: W, index: 0 },
            AnimatedProperty::Opacity,
            AnimationValue::Scalar(0.0),
        );
        let plan = fx.plan(1);
        assert_eq!(plan.batches_of(PipelineKind::Glyph).count(), 0);
    }

    #[test]
    fn external_view_needs_a_texture() {
        struct OneView;
        impl ViewLookup for OneView {
            fn view_texture(&self, view: ViewId) -> Option<ViewTextureInfo> {
                (view == ViewId(7)).then_some(ViewTextureInfo {
                    width: 64,
                    height: 64,
                    opaque: true,
                })
            }
        }

        let mut fx = Fixture::new();
        fx.frame.add_external_view(ViewId(7), 0.0, 0.0, 64.0, 64.0);
        fx.frame.add_external_view(ViewId(8), 0.0, 0.0, 64.0, 64.0);
        let plan = FramePlan::build(&fx.frame, &mut fx.atlas, &fx.faces, &OneView, &fx.engine, 1);

        let views: Vec<ViewId> = plan.views().collect();
        assert_eq!(views, vec![ViewId(7)]);
        assert_eq!(plan.textured_vertices[0].params, [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn transition_emits_composite_layers() {
        let mut fx = Fixture::new();
        let t0 = Instant::now();
        fx.engine.arm_transition(
            W,
            TransitionKind::Fade,
            Duration::from_millis(200),
            Easing::Linear,
        );
        fx.engine.start_armed_transition(W, t0);

        fx.engine.tick(t0);
        let plan = fx.plan(1);
        let sources: Vec<BatchBinding> = plan.composite.iter().map(|b| b.binding).collect();
        assert_eq!(sources, vec![BatchBinding::Snapshot(LayerSource::From)]);

        fx.engine.tick(t0 + Duration::from_millis(100));
        let plan = fx.plan(1);
        assert_eq!(plan.composite.len(), 2);
        assert_eq!(plan.composite_vertices[6].color[3], 0.5);
    }

    #[test]
    fn blur_transition_scales_radius() {
        let mut fx = Fixture::new();
        let t0 = Instant::now();
        fx.engine
            .arm_transition(W, TransitionKind::Blur, Duration::from_millis(100), Easing::Linear);
        fx.engine.start_armed_transition(W, t0);
        fx.engine.tick(t0 + Duration::from_millis(40));

        let plan = fx.plan(2);
        assert_eq!(plan.composite.len(), 2);
        // From layer: 0.4 * 15 logical px at scale 2
        assert!((plan.composite_vertices[0].params[2] - 12.0).abs() < 1e-4);
        assert!((plan.composite_vertices[6].params[2] - 18.0).abs() < 1e-4);
    }

    #[test]
    fn cursor_effects_are_drawn_in_front() {
        let mut fx = Fixture::new();
        let t0 = Instant::now();
        fx.engine.set_cursor_mode(CursorAnimationMode::Pixiedust);
        fx.engine.tick(t0);
        fx.engine.spawn_cursor_effect(
            W,
            Rect::new(0.0, 0.0, 8.0, 16.0),
            Rect::new(80.0, 0.0, 8.0, 16.0),
            Color::BLACK,
            t0,
        );
        fx.char('a', 0.0);
        let plan = fx.plan(1);

        let particles = fx.engine.effect_settings().particle_count as usize;
        assert_eq!(plan.rect_vertices.len(), 6 + 6 * particles);
        assert_eq!(
            pipelines(&plan),
            vec![PipelineKind::Rect, PipelineKind::Glyph, PipelineKind::Rect]
        );
        // Particles start at the new cursor center
        let first = &plan.rect_vertices[6..12];
        let cx = (first[0].position[0] + first[2].position[0]) / 2.0;
        assert!((cx - 84.0).abs() < 1e-4);
    }

    #[test]
    fn ripple_rings_are_tessellated() {
        let mut fx = Fixture::new();
        let t0 = Instant::now();
        fx.engine.set_cursor_mode(CursorAnimationMode::Ripple);
        fx.engine.tick(t0);
        fx.engine.spawn_cursor_effect(
            W,
            Rect::new(0.0, 0.0, 8.0, 16.0),
            Rect::new(0.0, 64.0, 8.0, 16.0),
            Color::BLACK,
            t0,
        );
        let plan = fx.plan(1);
        assert_eq!(plan.rect_vertices.len(), 6 + 3 * RING_SEGMENTS * 6);
    }

    #[test]
    fn wireframe_mode_outlines_the_cursor() {
        let mut fx = Fixture::new();
        fx.engine.set_cursor_mode(CursorAnimationMode::Wireframe);
        fx.frame
            .add_cursor(0.0, 0.0, 8.0, 16.0, CursorStyle::Box, Color::BLACK, true);
        let plan = fx.plan(1);
        assert_eq!(plan.rect_vertices.len(), 6 + 24);
    }

    #[test]
    fn default_plan_is_empty() {
        let plan = FramePlan::default();
        assert_eq!(plan.window, WindowId(0));
        assert!(plan.batches.is_empty());
        assert!(!plan.is_transitioning());
    }

    #[test]
    fn identical_input_gives_identical_plans() {
        let mut fx = Fixture::new();
        fx.frame.add_background(Rect::new(0.0, 0.0, 100.0, 20.0), Color::BLACK);
        for (i, ch) in "hello".chars().enumerate() {
            fx.char(ch, i as f32 * 8.0);
        }
        fx.frame
            .add_cursor(40.0, 0.0, 8.0, 16.0, CursorStyle::Box, Color::BLACK, true);
        let first = fx.plan(1);
        let second = fx.plan(1);
        assert_eq!(first, second);
    }
}
