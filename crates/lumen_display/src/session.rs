//! Display session
//!
//! [`DisplaySession`] owns every per-process resource of the compositor: the
//! face table, the glyph atlas, the animation engine, the external frame
//! importer, per-window scenes and surfaces, and (once available) the GPU
//! renderer. The host drives it through the primitive submission calls,
//! one `begin_frame` .. `end_frame` bracket per window and frame.
//!
//! Without a GPU the session still builds frame plans, which is how the
//! integration tests exercise the full pipeline.

use std::sync::Arc;
use std::time::Duration;

use lumen_animation::{
    AnimatedProperty, AnimationEngine, AnimationId, AnimationTarget, AnimationValue,
    ContentWatch, CursorAnimationMode, Easing, FrameClock, SystemClock, TransitionKind,
};
use lumen_core::{
    Color, CursorStyle, DisplayError, DisplayResult, Face, FaceId, FaceTable, FaceUpdate,
    FontStyle, FontWeight, FrameGlyph, FrameGlyphBuffer, FrameState, Rect, ScaleChange,
    ScaleCoordinator, Size, UnderlineStyle, ViewId, WindowId,
};
use lumen_gpu::{
    Acquired, AtlasTextures, ExternalBuffer, ExternalBufferImporter, ExternalHandle,
    FramePlan, FrameProducer, GpuRenderer, ImportStrategy, PixelFormat, RendererConfig,
    WindowSurface,
};
use lumen_text::{GlyphAtlas, GlyphRasterizer, SystemFontRasterizer};
use rustc_hash::FxHashMap;

use crate::config::DisplayConfig;

/// Geometry of a window as last reported by the host
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowInfo {
    pub logical: Size,
    pub physical: (u32, u32),
    pub scale: u32,
}

/// Outcome of one `end_frame`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub frame_number: u64,
    pub batches: usize,
    pub draw_calls: u32,
    /// A surface frame was acquired and presented
    pub presented: bool,
    pub skipped_glyphs: u32,
    /// Animations are running; the host should schedule another frame
    pub needs_frames: bool,
}

struct WindowState {
    frame: FrameGlyphBuffer,
    scale: ScaleCoordinator,
    logical: Size,
    surface: Option<WindowSurface>,
    last_plan: Option<FramePlan>,
    /// Cursor bounds of the previous frame, logical
    last_cursor: Option<Rect>,
    /// A transition was armed and its "from" snapshot is still to be taken
    snapshot_pending: bool,
    /// Scene shown when the transition was armed, redrawn as the snapshot
    snapshot_frame: Option<FrameGlyphBuffer>,
    content: ContentWatch,
}

impl WindowState {
    fn new(window: WindowId) -> Self {
        Self {
            frame: FrameGlyphBuffer::new(window),
            scale: ScaleCoordinator::default(),
            logical: Size::ZERO,
            surface: None,
            last_plan: None,
            last_cursor: None,
            snapshot_pending: false,
            snapshot_frame: None,
            content: ContentWatch::default(),
        }
    }

    fn physical_size(&self) -> (u32, u32) {
        self.scale.physical_size(self.logical)
    }
}

struct GpuState {
    renderer: GpuRenderer,
    atlas_textures: AtlasTextures,
}

/// Owner of all compositor state; implements the submission API
pub struct DisplaySession {
    config: DisplayConfig,
    clock: Box<dyn FrameClock>,
    faces: FaceTable,
    atlas: GlyphAtlas,
    animations: AnimationEngine,
    importer: ExternalBufferImporter,
    windows: FxHashMap<WindowId, WindowState>,
    /// Window whose frame is open for `add_*` calls
    current: Option<WindowId>,
    gpu: Option<GpuState>,
}

impl DisplaySession {
    /// Session using system fonts and the wall clock, without a GPU yet
    pub fn new(config: DisplayConfig) -> Self {
        Self::with_parts(config, Box::new(SystemFontRasterizer::new()), Box::new(SystemClock))
    }

    /// Session with an explicit rasterizer and clock
    pub fn with_parts(
        config: DisplayConfig,
        rasterizer: Box<dyn GlyphRasterizer>,
        clock: Box<dyn FrameClock>,
    ) -> Self {
        let mut animations = AnimationEngine::new();
        animations.set_cursor_blink(
            config.animation.cursor_blink,
            config.blink_interval(),
            clock.now(),
        );
        animations.set_cursor_mode(config.cursor_mode());
        animations.set_effect_settings(config.effect_settings());
        Self {
            atlas: GlyphAtlas::with_boxed_rasterizer(config.atlas_config(), rasterizer),
            importer: ExternalBufferImporter::new(ImportStrategy::detect()),
            faces: FaceTable::new(),
            windows: FxHashMap::default(),
            current: None,
            gpu: None,
            animations,
            clock,
            config,
        }
    }

    /// Create a headless GPU renderer; frames render once a surface is attached
    pub fn init_gpu(&mut self, config: RendererConfig) -> DisplayResult<()> {
        if self.gpu.is_some() {
            return Ok(());
        }
        let renderer = pollster::block_on(GpuRenderer::new(config))
            .map_err(|e| DisplayError::Device(e.to_string()))?;
        self.install_renderer(renderer);
        Ok(())
    }

    fn install_renderer(&mut self, renderer: GpuRenderer) {
        // Glyphs cached headless were never uploaded; rasterize them again
        // so the first frames queue their bitmaps for the new textures.
        if !self.atlas.is_empty() {
            tracing::debug!("dropping {} glyphs cached without a device", self.atlas.len());
            self.atlas.clear();
        }
        let atlas_textures = AtlasTextures::new(self.atlas.page_size());
        self.gpu = Some(GpuState {
            renderer,
            atlas_textures,
        });
    }

    pub fn has_gpu(&self) -> bool {
        self.gpu.is_some()
    }

    /// Present `window` into a platform window
    pub fn attach_surface<W>(&mut self, window: WindowId, handle: Arc<W>) -> DisplayResult<()>
    where
        W: raw_window_handle::HasWindowHandle
            + raw_window_handle::HasDisplayHandle
            + Send
            + Sync
            + 'static,
    {
        let surface = match &self.gpu {
            Some(gpu) => gpu
                .renderer
                .create_surface(handle)
                .map_err(|e| DisplayError::InitFailed(e.to_string()))?,
            None => {
                let (renderer, surface) =
                    pollster::block_on(GpuRenderer::with_surface(handle, RendererConfig::default()))
                        .map_err(|e| DisplayError::InitFailed(e.to_string()))?;
                self.install_renderer(renderer);
                surface
            }
        };
        let Some(gpu) = &self.gpu else {
            return Err(DisplayError::InitFailed("renderer unavailable".to_string()));
        };

        let state = self
            .windows
            .entry(window)
            .or_insert_with(|| WindowState::new(window));
        state.surface = Some(WindowSurface::new(
            window,
            surface,
            &gpu.renderer,
            state.physical_size(),
            self.config.present_mode(),
            self.config.surface.max_acquire_failures,
        ));
        tracing::info!("{}: surface attached", window);
        Ok(())
    }

    /// Forget a window and everything animating on it
    pub fn detach_window(&mut self, window: WindowId) -> bool {
        if self.current == Some(window) {
            self.current = None;
        }
        self.animations.clear_window(window);
        if let Some(gpu) = &mut self.gpu {
            gpu.renderer.remove_window(window);
        }
        self.windows.remove(&window).is_some()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Frame submission
    // ─────────────────────────────────────────────────────────────────────────

    pub fn begin_frame(&mut self, window: WindowId, width: f32, height: f32, background: Color) {
        if let Some(open) = self.current.filter(|w| *w != window) {
            tracing::warn!("{}: begin_frame while {} is still open", window, open);
        }
        let state = self
            .windows
            .entry(window)
            .or_insert_with(|| WindowState::new(window));
        state.frame.begin_frame(width, height, background);
        if state.logical == Size::ZERO {
            state.logical = Size::new(state.frame.width(), state.frame.height());
        }
        self.current = Some(window);
    }

    fn open_frame(&mut self, op: &str) -> Option<&mut FrameGlyphBuffer> {
        let Some(window) = self.current else {
            tracing::warn!("{} without an open frame, ignored", op);
            return None;
        };
        self.windows.get_mut(&window).map(|state| &mut state.frame)
    }

    pub fn add_background(&mut self, bounds: Rect, color: Color) {
        if let Some(frame) = self.open_frame("add_background") {
            frame.add_background(bounds, color);
        }
    }

    /// Fill with the face background, or the frame background if it has none
    pub fn add_stretch(&mut self, x: f32, y: f32, width: f32, height: f32, face: FaceId) {
        let background = self.faces.resolve(face).background;
        if let Some(frame) = self.open_frame("add_stretch") {
            let bg = background.unwrap_or(frame.background());
            frame.add_stretch(x, y, width, height, bg);
        }
    }

    /// Draw `ch` in the face's foreground color
    #[allow(clippy::too_many_arguments)]
    pub fn add_char(
        &mut self,
        ch: char,
        x: f32,
        y: f32,
        width: f32,
        ascent: f32,
        descent: f32,
        face: FaceId,
    ) {
        let fg = self.faces.resolve(face).foreground;
        if let Some(frame) = self.open_frame("add_char") {
            frame.add_char(ch, x, y, width, ascent, descent, fg, face);
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_cursor(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        style: CursorStyle,
        color: Color,
        active: bool,
    ) {
        if let Some(frame) = self.open_frame("add_cursor") {
            frame.add_cursor(x, y, width, height, style, color, active);
        }
    }

    pub fn add_border(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color) {
        if let Some(frame) = self.open_frame("add_border") {
            frame.add_border(x, y, width, height, color);
        }
    }

    pub fn add_external_view(&mut self, view: ViewId, x: f32, y: f32, width: f32, height: f32) {
        if let Some(frame) = self.open_frame("add_external_view") {
            frame.add_external_view(view, x, y, width, height);
        }
    }

    /// Close the frame of `window`, animate, plan and (with a surface) present.
    ///
    /// Errors only when the window is unknown or its surface is lost for good.
    pub fn end_frame(&mut self, window: WindowId) -> DisplayResult<FrameReport> {
        let now = self.clock.now();
        let Some(state) = self.windows.get_mut(&window) else {
            tracing::warn!("{}: end_frame for unknown window", window);
            return Err(DisplayError::UnknownWindow(window));
        };
        if self.current == Some(window) {
            self.current = None;
        }
        if !state.frame.end_frame() {
            return Ok(FrameReport::default());
        }

        // Cursor motion restarts the blink, optionally glides and leaves
        // the configured effect behind
        let cursor = state.frame.cursor().map(FrameGlyph::bounds);
        if cursor != state.last_cursor {
            if let Some(new) = cursor {
                self.animations.cursor_moved(window, now);
                if let (Some(old), Some(FrameGlyph::Cursor { color, .. })) =
                    (state.last_cursor, state.frame.cursor())
                {
                    self.animations
                        .spawn_cursor_effect(window, old, new, *color, now);
                }
                if let (true, Some(old)) = (self.config.animation.smooth_cursor, state.last_cursor) {
                    self.animations.glide_cursor(
                        window,
                        [old.x() - new.x(), old.y() - new.y()],
                        [old.width() - new.width(), old.height() - new.height()],
                        self.config.smooth_cursor_duration(),
                        now,
                    );
                }
            }
            state.last_cursor = cursor;
        }

        if state.snapshot_pending {
            state.snapshot_pending = false;
            let from = state.snapshot_frame.take();
            if let Some(gpu) = &mut self.gpu {
                match from {
                    // Redrawn now so its glyphs are resident and uploaded even
                    // if another window's frames evicted them meanwhile
                    Some(from) => {
                        let plan = FramePlan::build(
                            &from,
                            &mut self.atlas,
                            &self.faces,
                            &self.importer,
                            &self.animations,
                            state.scale.scale(),
                        );
                        let uploads = self.atlas.take_uploads();
                        gpu.atlas_textures.apply_uploads(
                            gpu.renderer.device(),
                            gpu.renderer.queue(),
                            &uploads,
                        );
                        gpu.renderer
                            .capture_snapshot(&plan, &gpu.atlas_textures, &self.importer);
                    }
                    None => {
                        if let Some(previous) = &state.last_plan {
                            gpu.renderer
                                .capture_snapshot(previous, &gpu.atlas_textures, &self.importer);
                        }
                    }
                }
            }
            self.animations.start_armed_transition(window, now);
        }

        self.animations.tick(now);

        let device_queue = self
            .gpu
            .as_ref()
            .map(|gpu| (gpu.renderer.device(), gpu.renderer.queue()));
        self.importer.import_pending(device_queue);

        let plan = FramePlan::build(
            &state.frame,
            &mut self.atlas,
            &self.faces,
            &self.importer,
            &self.animations,
            state.scale.scale(),
        );

        let uploads = self.atlas.take_uploads();
        let mut report = FrameReport {
            frame_number: plan.frame_number,
            batches: plan.batches.len() + plan.composite.len(),
            skipped_glyphs: plan.skipped_glyphs,
            ..FrameReport::default()
        };

        if let Some(gpu) = &mut self.gpu {
            gpu.atlas_textures
                .apply_uploads(gpu.renderer.device(), gpu.renderer.queue(), &uploads);

            if let Some(surface) = &mut state.surface {
                surface.resize(gpu.renderer.device(), plan.physical_size);
                match surface.acquire(gpu.renderer.device())? {
                    Acquired::Frame(frame) => {
                        let view = frame
                            .texture
                            .create_view(&wgpu::TextureViewDescriptor::default());
                        let stats = gpu.renderer.render(
                            &view,
                            &plan,
                            &gpu.atlas_textures,
                            &self.importer,
                        );
                        frame.present();
                        report.draw_calls = stats.draw_calls;
                        report.presented = true;
                    }
                    Acquired::Skipped => {
                        tracing::debug!("{}: frame {} skipped", window, plan.frame_number);
                    }
                }
            }
        }

        state.last_plan = Some(plan);
        report.needs_frames = self.animations.needs_frames();
        Ok(report)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Faces
    // ─────────────────────────────────────────────────────────────────────────

    /// Define or replace a face; keeps the face's font size
    #[allow(clippy::too_many_arguments)]
    pub fn set_face(
        &mut self,
        id: FaceId,
        foreground: Color,
        background: Option<Color>,
        weight: FontWeight,
        style: FontStyle,
        underline: UnderlineStyle,
        family: &str,
    ) -> FaceUpdate {
        let font_size = self
            .faces
            .get(id)
            .map_or(Face::default().font_size, |f| f.font_size);
        self.store_face(
            id,
            Face {
                foreground,
                background,
                weight,
                style,
                underline,
                family: family.to_string(),
                font_size,
            },
        )
    }

    /// Change the logical font size of a face
    pub fn set_face_size(&mut self, id: FaceId, size: f32) -> FaceUpdate {
        if !size.is_finite() || size <= 0.0 {
            tracing::warn!("{}: ignoring invalid font size {}", id, size);
            return FaceUpdate::Unchanged;
        }
        let mut face = self.faces.resolve(id).clone();
        face.font_size = size;
        self.store_face(id, face)
    }

    fn store_face(&mut self, id: FaceId, face: Face) -> FaceUpdate {
        let update = self.faces.set(id, face);
        if matches!(update, FaceUpdate::GlyphsInvalidated | FaceUpdate::Added) {
            let dropped = self.atlas.invalidate_face(id);
            if dropped > 0 {
                tracing::debug!("{}: replaced, {} cached glyphs dropped", id, dropped);
            }
        }
        update
    }

    pub fn faces(&self) -> &FaceTable {
        &self.faces
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Geometry
    // ─────────────────────────────────────────────────────────────────────────

    /// Record a window's logical size and platform scale factor
    pub fn resize(
        &mut self,
        window: WindowId,
        logical_width: f32,
        logical_height: f32,
        scale_factor: f64,
    ) -> Option<ScaleChange> {
        let state = self
            .windows
            .entry(window)
            .or_insert_with(|| WindowState::new(window));
        let size = Size::new(logical_width, logical_height);
        if size.is_valid() {
            state.logical = size;
        } else {
            tracing::warn!(
                "{}: invalid size {}x{}, keeping previous",
                window,
                logical_width,
                logical_height
            );
        }
        let change = state.scale.set_scale(scale_factor);
        if let Some(change) = change {
            tracing::info!("{}: scale {} -> {}", window, change.old, change.new);
        }
        if let (Some(gpu), Some(surface)) = (&self.gpu, &mut state.surface) {
            surface.resize(gpu.renderer.device(), state.scale.physical_size(state.logical));
        }
        change
    }

    pub fn window_size(&self, window: WindowId) -> Option<WindowInfo> {
        self.windows.get(&window).map(|state| WindowInfo {
            logical: state.logical,
            physical: state.physical_size(),
            scale: state.scale.scale(),
        })
    }

    /// Plan of the most recent completed frame of `window`
    pub fn last_plan(&self, window: WindowId) -> Option<&FramePlan> {
        self.windows.get(&window).and_then(|s| s.last_plan.as_ref())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // External views
    // ─────────────────────────────────────────────────────────────────────────

    /// Hand over a frame for `view`. Returns the previous frame if it was
    /// never rendered.
    pub fn import_external_frame(
        &mut self,
        view: ViewId,
        handle: ExternalHandle,
        width: u32,
        height: u32,
        format: PixelFormat,
        modifier: Option<u64>,
    ) -> Option<ExternalBuffer> {
        self.importer.publish(
            view,
            ExternalBuffer {
                handle,
                width,
                height,
                format,
                modifier,
            },
        )
    }

    /// Slot a producer thread can publish frames into directly
    pub fn frame_producer(&mut self, view: ViewId) -> FrameProducer {
        self.importer.producer(view)
    }

    pub fn importer(&self) -> &ExternalBufferImporter {
        &self.importer
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Animation
    // ─────────────────────────────────────────────────────────────────────────

    pub fn start_animation(
        &mut self,
        target: AnimationTarget,
        property: AnimatedProperty,
        from: AnimationValue,
        to: AnimationValue,
        duration: Duration,
        easing: Easing,
    ) -> AnimationId {
        let now = self.clock.now();
        self.animations
            .start_animation_at(target, property, from, to, duration, easing, now)
    }

    pub fn cancel_animation(&mut self, id: AnimationId) -> bool {
        self.animations.cancel_animation(id)
    }

    /// Transition from what `window` shows now to its next frame.
    /// [`TransitionKind::None`] cancels a running transition instead.
    pub fn start_buffer_transition(
        &mut self,
        window: WindowId,
        kind: TransitionKind,
        duration: Duration,
        easing: Easing,
    ) {
        let Some(state) = self.windows.get_mut(&window) else {
            tracing::warn!("{}: transition for unknown window ignored", window);
            return;
        };
        self.animations.arm_transition(window, kind, duration, easing);
        if kind == TransitionKind::None {
            state.snapshot_pending = false;
            state.snapshot_frame = None;
            return;
        }
        state.snapshot_pending = true;
        // Between frames the buffer still holds the scene on screen
        state.snapshot_frame =
            (state.frame.state() == FrameState::Closed).then(|| state.frame.clone());
    }

    /// Report a hash of what `window` shows (0 when unknown). With
    /// `auto_transition` configured, a change from a known hash starts the
    /// default transition. Returns whether one was started.
    pub fn set_content_hash(&mut self, window: WindowId, hash: u64) -> bool {
        let state = self
            .windows
            .entry(window)
            .or_insert_with(|| WindowState::new(window));
        if !state.content.update(hash) || !self.config.animation.auto_transition {
            return false;
        }
        tracing::debug!("{}: content changed, starting transition", window);
        self.start_default_transition(window);
        true
    }

    /// Transition with the configured kind and duration
    pub fn start_default_transition(&mut self, window: WindowId) {
        let kind = self.config.transition_kind();
        let duration = self.config.transition_duration();
        self.start_buffer_transition(window, kind, duration, Easing::EaseInOut);
    }

    /// Smooth a scroll of `(dx, dy)` logical pixels the host already applied
    pub fn smooth_scroll(
        &mut self,
        window: WindowId,
        dx: f32,
        dy: f32,
        duration: Option<Duration>,
    ) -> AnimationId {
        let now = self.clock.now();
        let duration = duration.unwrap_or_else(|| self.config.scroll_duration());
        self.animations.smooth_scroll(window, [dx, dy], duration, now)
    }

    pub fn set_cursor_blink(&mut self, enabled: bool, interval: Duration) {
        let now = self.clock.now();
        self.config.animation.cursor_blink = enabled;
        self.config.animation.blink_interval_ms = interval.as_millis() as u64;
        self.animations.set_cursor_blink(enabled, interval, now);
    }

    /// Switch the cursor jump decoration
    pub fn set_cursor_mode(&mut self, mode: CursorAnimationMode) {
        self.config.animation.cursor_effect = mode.name().to_string();
        self.animations.set_cursor_mode(mode);
    }

    /// True while anything is animating, a blinking cursor included
    pub fn needs_frames(&self) -> bool {
        self.animations.needs_frames()
    }

    /// Time until a blinking cursor next flips, for hosts that idle
    /// between blinks instead of rendering continuously
    pub fn next_blink_in(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.animations
            .next_blink_toggle(now)
            .map(|at| at.saturating_duration_since(now))
    }

    pub fn animations(&self) -> &AnimationEngine {
        &self.animations
    }

    pub fn atlas(&self) -> &GlyphAtlas {
        &self.atlas
    }

    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_animation::ManualClock;
    use lumen_text::{BlockRasterizer, GlyphKey};

    const W: WindowId = WindowId(1);

    fn session() -> (DisplaySession, ManualClock) {
        let clock = ManualClock::new();
        let session = DisplaySession::with_parts(
            DisplayConfig::default(),
            Box::new(BlockRasterizer::new()),
            Box::new(clock.clone()),
        );
        (session, clock)
    }

    #[test]
    fn primitives_outside_a_frame_are_dropped() {
        let (mut s, _) = session();
        s.add_border(0.0, 0.0, 1.0, 1.0, Color::BLACK);
        s.begin_frame(W, 100.0, 100.0, Color::WHITE);
        s.add_border(0.0, 0.0, 1.0, 1.0, Color::BLACK);
        s.end_frame(W).unwrap();
        s.add_border(0.0, 0.0, 1.0, 1.0, Color::BLACK);
        assert_eq!(s.last_plan(W).unwrap().rect_vertices.len(), 12);
    }

    #[test]
    fn unknown_window_errors() {
        let (mut s, _) = session();
        assert!(matches!(
            s.end_frame(WindowId(9)),
            Err(DisplayError::UnknownWindow(WindowId(9)))
        ));
    }

    #[test]
    fn stretch_uses_face_or_frame_background() {
        let (mut s, _) = session();
        let red = Color::rgb(1.0, 0.0, 0.0);
        s.set_face(
            FaceId(2),
            Color::BLACK,
            Some(red),
            FontWeight::NORMAL,
            FontStyle::Normal,
            UnderlineStyle::None,
            "monospace",
        );
        s.begin_frame(W, 100.0, 100.0, Color::WHITE);
        s.add_stretch(0.0, 0.0, 10.0, 10.0, FaceId(2));
        s.add_stretch(0.0, 10.0, 10.0, 10.0, FaceId(0));
        s.end_frame(W).unwrap();

        let plan = s.last_plan(W).unwrap();
        assert_eq!(plan.rect_vertices[6].color, red.to_array());
        assert_eq!(plan.rect_vertices[12].color, Color::WHITE.to_array());
    }

    #[test]
    fn restyling_a_face_keeps_its_glyphs() {
        let (mut s, _) = session();
        s.begin_frame(W, 100.0, 100.0, Color::WHITE);
        s.add_char('a', 0.0, 0.0, 8.0, 12.0, 4.0, FaceId(0));
        s.end_frame(W).unwrap();
        assert_eq!(s.atlas().len(), 1);

        let update = s.set_face(
            FaceId(0),
            Color::rgb(0.0, 0.0, 1.0),
            None,
            FontWeight::NORMAL,
            FontStyle::Normal,
            UnderlineStyle::None,
            "monospace",
        );
        assert_eq!(update, FaceUpdate::Restyled);
        assert_eq!(s.atlas().len(), 1);

        assert_eq!(s.set_face_size(FaceId(0), 20.0), FaceUpdate::GlyphsInvalidated);
        assert_eq!(s.atlas().len(), 0);
        assert_eq!(s.set_face_size(FaceId(0), f32::NAN), FaceUpdate::Unchanged);
    }

    #[test]
    fn cursor_move_resets_blink() {
        let (mut s, clock) = session();
        let frame = |s: &mut DisplaySession, x: f32| {
            s.begin_frame(W, 100.0, 100.0, Color::WHITE);
            s.add_cursor(x, 0.0, 8.0, 16.0, CursorStyle::Box, Color::BLACK, true);
            s.end_frame(W).unwrap();
            s.last_plan(W).unwrap().rect_vertices.len()
        };

        assert_eq!(frame(&mut s, 0.0), 12);
        clock.advance(Duration::from_millis(600));
        assert_eq!(frame(&mut s, 0.0), 6);
        // Moving shows the cursor again
        assert_eq!(frame(&mut s, 8.0), 12);
    }

    #[test]
    fn smooth_cursor_glides_from_old_position() {
        let mut config = DisplayConfig::default();
        config.animation.smooth_cursor = true;
        let clock = ManualClock::new();
        let mut s = DisplaySession::with_parts(
            config,
            Box::new(BlockRasterizer::new()),
            Box::new(clock.clone()),
        );

        for x in [0.0, 40.0] {
            s.begin_frame(W, 100.0, 100.0, Color::WHITE);
            s.add_cursor(x, 0.0, 8.0, 16.0, CursorStyle::Box, Color::BLACK, true);
            s.end_frame(W).unwrap();
        }
        // Drawn at the old position on the first frame after the move
        let plan = s.last_plan(W).unwrap();
        assert_eq!(plan.rect_vertices[6].position, [0.0, 0.0]);

        clock.advance(Duration::from_millis(200));
        s.begin_frame(W, 100.0, 100.0, Color::WHITE);
        s.add_cursor(40.0, 0.0, 8.0, 16.0, CursorStyle::Box, Color::BLACK, true);
        s.end_frame(W).unwrap();
        assert_eq!(s.last_plan(W).unwrap().rect_vertices[6].position, [40.0, 0.0]);
    }

    #[test]
    fn transition_runs_and_finishes() {
        let (mut s, clock) = session();
        s.begin_frame(W, 100.0, 100.0, Color::WHITE);
        s.end_frame(W).unwrap();

        s.start_buffer_transition(W, TransitionKind::Fade, Duration::from_millis(100), Easing::Linear);
        s.begin_frame(W, 100.0, 100.0, Color::BLACK);
        let report = s.end_frame(W).unwrap();
        assert!(report.needs_frames);
        assert!(s.last_plan(W).unwrap().is_transitioning());

        clock.advance(Duration::from_millis(150));
        s.begin_frame(W, 100.0, 100.0, Color::BLACK);
        let report = s.end_frame(W).unwrap();
        assert!(!report.needs_frames);
        assert!(!s.last_plan(W).unwrap().is_transitioning());
    }

    #[test]
    fn none_transition_cancels_the_running_one() {
        let (mut s, _) = session();
        s.begin_frame(W, 100.0, 100.0, Color::WHITE);
        s.end_frame(W).unwrap();
        s.start_buffer_transition(W, TransitionKind::Fade, Duration::from_millis(100), Easing::Linear);
        s.begin_frame(W, 100.0, 100.0, Color::BLACK);
        s.end_frame(W).unwrap();
        assert!(s.last_plan(W).unwrap().is_transitioning());

        s.start_buffer_transition(W, TransitionKind::None, Duration::from_millis(100), Easing::Linear);
        s.begin_frame(W, 100.0, 100.0, Color::BLACK);
        let report = s.end_frame(W).unwrap();
        assert!(!report.needs_frames);
        assert!(!s.last_plan(W).unwrap().is_transitioning());
    }

    #[test]
    fn content_hash_change_starts_transition_when_enabled() {
        let mut config = DisplayConfig::default();
        config.animation.auto_transition = true;
        let mut s = DisplaySession::with_parts(
            config,
            Box::new(BlockRasterizer::new()),
            Box::new(ManualClock::new()),
        );
        s.begin_frame(W, 100.0, 100.0, Color::WHITE);
        s.end_frame(W).unwrap();

        assert!(!s.set_content_hash(W, 11));
        assert!(!s.set_content_hash(W, 11));
        assert!(s.set_content_hash(W, 12));

        s.begin_frame(W, 100.0, 100.0, Color::BLACK);
        assert!(s.end_frame(W).unwrap().needs_frames);
        assert!(s.last_plan(W).unwrap().is_transitioning());
    }

    #[test]
    fn content_hash_is_ignored_without_auto_transition() {
        let (mut s, _) = session();
        s.set_content_hash(W, 1);
        assert!(!s.set_content_hash(W, 2));
        s.begin_frame(W, 100.0, 100.0, Color::WHITE);
        assert!(!s.end_frame(W).unwrap().needs_frames);
    }

    #[test]
    fn blinking_cursor_keeps_frames_coming() {
        let (mut s, clock) = session();
        s.begin_frame(W, 100.0, 100.0, Color::WHITE);
        s.add_cursor(0.0, 0.0, 8.0, 16.0, CursorStyle::Bar, Color::BLACK, true);
        let report = s.end_frame(W).unwrap();
        assert!(report.needs_frames);

        let interval = s.config().blink_interval();
        assert_eq!(s.next_blink_in(), Some(interval));
        clock.advance(interval / 2);
        assert_eq!(s.next_blink_in(), Some(interval - interval / 2));
    }

    #[test]
    fn cursor_jump_spawns_configured_effect() {
        let mut config = DisplayConfig::default();
        config.animation.cursor_effect = "railgun".to_string();
        let clock = ManualClock::new();
        let mut s = DisplaySession::with_parts(
            config,
            Box::new(BlockRasterizer::new()),
            Box::new(clock.clone()),
        );
        for x in [0.0, 80.0] {
            s.begin_frame(W, 200.0, 100.0, Color::WHITE);
            s.add_cursor(x, 0.0, 8.0, 16.0, CursorStyle::Box, Color::BLACK, true);
            s.end_frame(W).unwrap();
        }
        let effects = s.animations().cursor_effects(W).unwrap();
        assert!(!effects.particles().is_empty());

        s.set_cursor_mode(CursorAnimationMode::None);
        assert!(s.animations().cursor_effects(W).is_none());
        assert_eq!(s.config().animation.cursor_effect, "none");
    }

    #[test]
    fn glyphs_cached_headless_are_uploaded_after_gpu_init() {
        let (mut s, _) = session();
        s.begin_frame(W, 100.0, 100.0, Color::WHITE);
        s.add_char('a', 0.0, 0.0, 8.0, 12.0, 4.0, FaceId(0));
        s.end_frame(W).unwrap();
        assert_eq!(s.atlas().len(), 1);

        if s.init_gpu(RendererConfig::default()).is_err() {
            return;
        }
        assert!(s.atlas().is_empty());

        s.begin_frame(W, 100.0, 100.0, Color::WHITE);
        s.add_char('a', 0.0, 0.0, 8.0, 12.0, 4.0, FaceId(0));
        let report = s.end_frame(W).unwrap();
        assert_eq!(report.skipped_glyphs, 0);
        let gpu = s.gpu.as_ref().unwrap();
        assert!(gpu.atlas_textures.page_count() >= 1);
        assert!(gpu.atlas_textures.page(0).is_some());
    }

    #[test]
    fn snapshot_redraws_glyphs_evicted_by_other_windows() {
        let mut config = DisplayConfig::default();
        config.atlas.max_glyphs = 2;
        let mut s = DisplaySession::with_parts(
            config,
            Box::new(BlockRasterizer::new()),
            Box::new(ManualClock::new()),
        );
        if s.init_gpu(RendererConfig::default()).is_err() {
            return;
        }
        let other = WindowId(2);
        let draw = |s: &mut DisplaySession, window: WindowId, text: &str| {
            s.begin_frame(window, 100.0, 100.0, Color::WHITE);
            for (i, ch) in text.chars().enumerate() {
                s.add_char(ch, i as f32 * 8.0, 0.0, 8.0, 12.0, 4.0, FaceId(0));
            }
            s.end_frame(window).unwrap()
        };
        let key = |ch| GlyphKey::new(ch, FaceId(0), 1);

        draw(&mut s, W, "ab");
        draw(&mut s, other, "cd");
        assert!(!s.atlas().contains(&key('a')));

        s.start_buffer_transition(W, TransitionKind::Fade, Duration::from_millis(100), Easing::Linear);
        let report = draw(&mut s, W, "");
        assert!(report.needs_frames);
        assert!(s.atlas().contains(&key('a')));
        assert!(s.atlas().contains(&key('b')));
        assert!(!s.atlas().contains(&key('c')));
    }

    #[test]
    fn detach_forgets_the_window() {
        let (mut s, _) = session();
        s.resize(W, 100.0, 50.0, 2.0);
        assert!(s.detach_window(W));
        assert!(s.window_size(W).is_none());
        assert!(!s.detach_window(W));
    }
}
