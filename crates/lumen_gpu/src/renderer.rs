//! GPU renderer implementation
//!
//! Owns the wgpu device and the three pipelines (solid rects, atlas glyphs,
//! RGBA textures) and executes [`FramePlan`]s. Caches are not owned here:
//! atlas page textures and imported view textures are passed in per call.

use std::borrow::Cow;
use std::sync::Arc;

use lumen_animation::LayerSource;
use lumen_core::WindowId;
use rustc_hash::FxHashMap;

use crate::atlas::AtlasTextures;
use crate::external::ExternalBufferImporter;
use crate::plan::{BatchBinding, DrawBatch, FramePlan, PipelineKind};
use crate::primitives::{RectVertex, TexturedVertex, Uniforms};
use crate::shaders::{GLYPH_SHADER, RECT_SHADER, TEXTURE_SHADER};
use crate::texture::GpuTexture;

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
}

/// Vertices the growable buffers start with
const INITIAL_VERTICES: usize = 4096;

fn device_required_limits(adapter: &wgpu::Adapter) -> wgpu::Limits {
    // Raise with LUMEN_WGPU_MAX_BUFFER_MB; clamped to what the adapter supports.
    let supported = adapter.limits();
    let mut limits = wgpu::Limits::default();

    if let Some(mib) = env_u64("LUMEN_WGPU_MAX_BUFFER_MB") {
        let requested = mib.saturating_mul(1024 * 1024);
        limits.max_buffer_size = requested.min(supported.max_buffer_size);

        tracing::info!(
            "wgpu limits override: max_buffer_size={} MiB (requested {} MiB, supported {} MiB)",
            limits.max_buffer_size / (1024 * 1024),
            mib,
            supported.max_buffer_size / (1024 * 1024)
        );
    } else {
        tracing::debug!(
            "wgpu limits: max_buffer_size={} MiB (supported {} MiB)",
            limits.max_buffer_size / (1024 * 1024),
            supported.max_buffer_size / (1024 * 1024)
        );
    }

    limits
}

fn apply_renderer_config_overrides(
    mut config: RendererConfig,
    required_limits: &wgpu::Limits,
) -> RendererConfig {
    // Env:
    // - LUMEN_GPU_MAX_RECT_VERTICES=1200000
    // - LUMEN_GPU_MAX_TEXTURED_VERTICES=1200000
    if let Some(v) = env_usize("LUMEN_GPU_MAX_RECT_VERTICES") {
        config.max_rect_vertices = v;
    }
    if let Some(v) = env_usize("LUMEN_GPU_MAX_TEXTURED_VERTICES") {
        config.max_textured_vertices = v;
    }
    clamp_to_limits(config, required_limits)
}

fn clamp_to_limits(mut config: RendererConfig, limits: &wgpu::Limits) -> RendererConfig {
    let rect_cap = (limits.max_buffer_size / std::mem::size_of::<RectVertex>() as u64).max(6) as usize;
    let textured_cap =
        (limits.max_buffer_size / std::mem::size_of::<TexturedVertex>() as u64).max(6) as usize;

    config.max_rect_vertices = config.max_rect_vertices.clamp(6, rect_cap);
    config.max_textured_vertices = config.max_textured_vertices.clamp(6, textured_cap);
    config
}

fn log_renderer_config(config: &RendererConfig) {
    tracing::info!(
        "gpu config: max_rect_vertices={}, max_textured_vertices={}",
        config.max_rect_vertices,
        config.max_textured_vertices,
    );
}

/// Error type for renderer operations
#[derive(Debug)]
pub enum RendererError {
    /// Failed to request GPU adapter
    AdapterNotFound,
    /// Failed to request GPU device
    DeviceError(wgpu::RequestDeviceError),
    /// Failed to create surface
    SurfaceError(wgpu::CreateSurfaceError),
    /// Surface cannot present the renderer's target format
    UnsupportedSurface(wgpu::TextureFormat),
    /// Shader compilation error
    ShaderError(String),
}

impl std::fmt::Display for RendererError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RendererError::AdapterNotFound => write!(f, "No suitable GPU adapter found"),
            RendererError::DeviceError(e) => write!(f, "Failed to request GPU device: {}", e),
            RendererError::SurfaceError(e) => write!(f, "Failed to create surface: {}", e),
            RendererError::UnsupportedSurface(format) => {
                write!(f, "Surface does not support format {:?}", format)
            }
            RendererError::ShaderError(e) => write!(f, "Shader compilation error: {}", e),
        }
    }
}

impl std::error::Error for RendererError {}

/// Configuration for creating a renderer
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Upper bound on solid-rect vertices per frame (6 per rectangle)
    pub max_rect_vertices: usize,
    /// Upper bound on glyph and texture vertices per frame
    pub max_textured_vertices: usize,
    /// Preferred texture format (None = use surface preferred)
    pub texture_format: Option<wgpu::TextureFormat>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            // 200k rects / glyphs, far beyond a full 4K editor frame
            max_rect_vertices: 1_200_000,
            max_textured_vertices: 1_200_000,
            texture_format: None,
        }
    }
}

/// Counters for one executed plan
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub draw_calls: u32,
    /// Batches whose texture was not available
    pub skipped_batches: u32,
}

struct Pipelines {
    rect: wgpu::RenderPipeline,
    glyph: wgpu::RenderPipeline,
    texture: wgpu::RenderPipeline,
}

struct BindGroupLayouts {
    /// Uniforms only
    rect: wgpu::BindGroupLayout,
    /// Uniforms, texture, sampler
    textured: wgpu::BindGroupLayout,
}

/// A vertex buffer that grows to the largest frame seen
struct VertexBuffer {
    buffer: wgpu::Buffer,
    capacity: u64,
    label: &'static str,
}

impl VertexBuffer {
    fn new(device: &wgpu::Device, label: &'static str, capacity: u64) -> Self {
        Self {
            buffer: create_vertex_buffer(device, label, capacity),
            capacity,
            label,
        }
    }

    /// Write `data` from offset 0, replacing the buffer when it is too small
    fn upload<T: bytemuck::Pod>(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, data: &[T]) {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.is_empty() {
            return;
        }
        let needed = bytes.len() as u64;
        if needed > self.capacity {
            let capacity = needed.next_power_of_two();
            self.buffer = create_vertex_buffer(device, self.label, capacity);
            self.capacity = capacity;
            tracing::debug!("{}: grown to {} bytes", self.label, capacity);
        }
        queue.write_buffer(&self.buffer, 0, bytes);
    }
}

fn create_vertex_buffer(device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Truncate `data` to `max` elements, warning when anything is dropped
fn clamp_vertices<'a, T>(data: &'a [T], max: usize, what: &str) -> &'a [T] {
    if data.len() > max {
        tracing::warn!(
            "{} vertex count {} exceeds buffer capacity {}, truncating",
            what,
            data.len(),
            max
        );
        &data[..max]
    } else {
        data
    }
}

/// Vertex buffers and counts written for one pass
struct SceneBuffers<'a> {
    rect: &'a wgpu::Buffer,
    rect_count: u32,
    textured: &'a wgpu::Buffer,
    textured_count: u32,
}

/// GPU renderer executing frame plans
pub struct GpuRenderer {
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    config: RendererConfig,
    texture_format: wgpu::TextureFormat,
    layouts: BindGroupLayouts,
    pipelines: Pipelines,
    uniforms: wgpu::Buffer,
    rect_bind_group: wgpu::BindGroup,
    sampler: wgpu::Sampler,
    rect_vertices: VertexBuffer,
    textured_vertices: VertexBuffer,
    composite_vertices: VertexBuffer,
    /// Transition snapshots per window
    snapshots: FxHashMap<(WindowId, LayerSource), GpuTexture>,
}

impl GpuRenderer {
    /// Get the preferred backend for the current platform
    fn preferred_backends() -> wgpu::Backends {
        #[cfg(target_os = "macos")]
        {
            wgpu::Backends::METAL
        }
        #[cfg(target_os = "windows")]
        {
            wgpu::Backends::DX12
        }
        #[cfg(target_os = "linux")]
        {
            wgpu::Backends::VULKAN
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
        {
            wgpu::Backends::PRIMARY
        }
    }

    /// Create a new renderer without a surface (for headless rendering)
    pub async fn new(config: RendererConfig) -> Result<Self, RendererError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: Self::preferred_backends(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RendererError::AdapterNotFound)?;

        let texture_format = config
            .texture_format
            .unwrap_or(wgpu::TextureFormat::Bgra8UnormSrgb);

        Self::create_renderer(instance, adapter, config, texture_format).await
    }

    /// Create a new renderer with a window surface
    pub async fn with_surface<W>(
        window: Arc<W>,
        config: RendererConfig,
    ) -> Result<(Self, wgpu::Surface<'static>), RendererError>
    where
        W: raw_window_handle::HasWindowHandle
            + raw_window_handle::HasDisplayHandle
            + Send
            + Sync
            + 'static,
    {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: Self::preferred_backends(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(RendererError::SurfaceError)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RendererError::AdapterNotFound)?;

        let surface_caps = surface.get_capabilities(&adapter);
        tracing::debug!("Surface capabilities - formats: {:?}", surface_caps.formats);

        // Colors are specified in sRGB; let the target encode them
        let texture_format = match config.texture_format {
            Some(format) => format,
            None => surface_caps
                .formats
                .iter()
                .find(|f| f.is_srgb())
                .or_else(|| surface_caps.formats.first())
                .copied()
                .ok_or(RendererError::UnsupportedSurface(
                    wgpu::TextureFormat::Bgra8UnormSrgb,
                ))?,
        };
        tracing::debug!("Selected texture format: {:?}", texture_format);

        let renderer = Self::create_renderer(instance, adapter, config, texture_format).await?;
        Ok((renderer, surface))
    }

    /// Create a surface for another window on this renderer's instance
    pub fn create_surface<W>(&self, window: Arc<W>) -> Result<wgpu::Surface<'static>, RendererError>
    where
        W: raw_window_handle::HasWindowHandle
            + raw_window_handle::HasDisplayHandle
            + Send
            + Sync
            + 'static,
    {
        let surface = self
            .instance
            .create_surface(window)
            .map_err(RendererError::SurfaceError)?;
        let caps = surface.get_capabilities(&self.adapter);
        if !caps.formats.contains(&self.texture_format) {
            return Err(RendererError::UnsupportedSurface(self.texture_format));
        }
        Ok(surface)
    }

    async fn create_renderer(
        instance: wgpu::Instance,
        adapter: wgpu::Adapter,
        config: RendererConfig,
        texture_format: wgpu::TextureFormat,
    ) -> Result<Self, RendererError> {
        let info = adapter.get_info();
        tracing::info!("GPU adapter: {} ({:?})", info.name, info.backend);

        let required_limits = device_required_limits(&adapter);
        let config = apply_renderer_config_overrides(config, &required_limits);
        log_renderer_config(&config);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Lumen GPU Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits,
                    memory_hints: wgpu::MemoryHints::MemoryUsage,
                },
                None,
            )
            .await
            .map_err(RendererError::DeviceError)?;

        let device = Arc::new(device);
        let queue = Arc::new(queue);

        let layouts = Self::create_bind_group_layouts(&device);

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipelines = Self::create_pipelines(&device, &layouts, texture_format);
        if let Some(error) = device.pop_error_scope().await {
            return Err(RendererError::ShaderError(error.to_string()));
        }

        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Lumen Uniforms Buffer"),
            size: std::mem::size_of::<Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let rect_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Lumen Rect Bind Group"),
            layout: &layouts.rect,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            }],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Lumen Linear Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let rect_bytes = (INITIAL_VERTICES * std::mem::size_of::<RectVertex>()) as u64;
        let textured_bytes = (INITIAL_VERTICES * std::mem::size_of::<TexturedVertex>()) as u64;

        Ok(Self {
            rect_vertices: VertexBuffer::new(&device, "Lumen Rect Vertices", rect_bytes),
            textured_vertices: VertexBuffer::new(&device, "Lumen Textured Vertices", textured_bytes),
            composite_vertices: VertexBuffer::new(
                &device,
                "Lumen Composite Vertices",
                (64 * std::mem::size_of::<TexturedVertex>()) as u64,
            ),
            instance,
            adapter,
            device,
            queue,
            config,
            texture_format,
            layouts,
            pipelines,
            uniforms,
            rect_bind_group,
            sampler,
            snapshots: FxHashMap::default(),
        })
    }

    fn create_bind_group_layouts(device: &wgpu::Device) -> BindGroupLayouts {
        let uniform_entry = wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let rect = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Lumen Rect Bind Group Layout"),
            entries: &[uniform_entry],
        });

        let textured = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Lumen Textured Bind Group Layout"),
            entries: &[
                uniform_entry,
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        BindGroupLayouts { rect, textured }
    }

    fn create_pipelines(
        device: &wgpu::Device,
        layouts: &BindGroupLayouts,
        texture_format: wgpu::TextureFormat,
    ) -> Pipelines {
        // Premultiplied alpha
        let blend_state = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
        };

        let create = |label: &str,
                      source: &'static str,
                      layout: &wgpu::BindGroupLayout,
                      vertex_layout: wgpu::VertexBufferLayout<'static>| {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[layout],
                push_constant_ranges: &[],
            });
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[vertex_layout],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: texture_format,
                        blend: Some(blend_state),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        Pipelines {
            rect: create(
                "Lumen Rect Pipeline",
                RECT_SHADER,
                &layouts.rect,
                RectVertex::layout(),
            ),
            glyph: create(
                "Lumen Glyph Pipeline",
                GLYPH_SHADER,
                &layouts.textured,
                TexturedVertex::layout(),
            ),
            texture: create(
                "Lumen Texture Pipeline",
                TEXTURE_SHADER,
                &layouts.textured,
                TexturedVertex::layout(),
            ),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn device_arc(&self) -> Arc<wgpu::Device> {
        self.device.clone()
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn queue_arc(&self) -> Arc<wgpu::Queue> {
        self.queue.clone()
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    pub fn texture_format(&self) -> wgpu::TextureFormat {
        self.texture_format
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Poll the device so finished submissions release their resources
    pub fn poll(&self) {
        self.device.poll(wgpu::Maintain::Poll);
    }

    /// Drop the transition snapshots of a window
    pub fn remove_window(&mut self, window: WindowId) {
        self.snapshots.remove(&(window, LayerSource::From));
        self.snapshots.remove(&(window, LayerSource::To));
    }

    /// Whether a snapshot texture exists for `window`
    pub fn has_snapshot(&self, window: WindowId, source: LayerSource) -> bool {
        self.snapshots.contains_key(&(window, source))
    }

    /// Render `plan` into `target`.
    ///
    /// Without transition layers the scene is drawn straight into the target.
    /// While a transition runs the scene goes to the window's "to" snapshot
    /// and the target receives the composite of both snapshots.
    pub fn render(
        &mut self,
        target: &wgpu::TextureView,
        plan: &FramePlan,
        atlas: &AtlasTextures,
        views: &ExternalBufferImporter,
    ) -> RenderStats {
        let (width, height) = plan.physical_size;
        if width == 0 || height == 0 {
            return RenderStats::default();
        }

        if plan.is_transitioning() {
            self.ensure_snapshot(plan.window, LayerSource::To, plan.physical_size);
        }
        let counts = self.upload_plan(plan);

        let mut bind_groups = FxHashMap::default();
        self.collect_bind_groups(&plan.batches, plan.window, atlas, views, &mut bind_groups);
        self.collect_bind_groups(&plan.composite, plan.window, atlas, views, &mut bind_groups);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Lumen Render Encoder"),
            });

        let buffers = SceneBuffers {
            rect: &self.rect_vertices.buffer,
            rect_count: counts.0,
            textured: &self.textured_vertices.buffer,
            textured_count: counts.1,
        };

        let mut stats = RenderStats::default();
        if plan.is_transitioning() {
            if let Some(scene) = self.snapshots.get(&(plan.window, LayerSource::To)) {
                self.encode_pass(
                    &mut encoder,
                    scene.view(),
                    plan.clear_color,
                    &plan.batches,
                    &buffers,
                    &bind_groups,
                    &mut stats,
                );
            }
            let composite = SceneBuffers {
                rect: &self.rect_vertices.buffer,
                rect_count: 0,
                textured: &self.composite_vertices.buffer,
                textured_count: counts.2,
            };
            self.encode_pass(
                &mut encoder,
                target,
                plan.clear_color,
                &plan.composite,
                &composite,
                &bind_groups,
                &mut stats,
            );
        } else {
            self.encode_pass(
                &mut encoder,
                target,
                plan.clear_color,
                &plan.batches,
                &buffers,
                &bind_groups,
                &mut stats,
            );
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        stats
    }

    /// Render the scene of `plan` into the window's "from" snapshot, the
    /// first frame of a buffer transition
    pub fn capture_snapshot(
        &mut self,
        plan: &FramePlan,
        atlas: &AtlasTextures,
        views: &ExternalBufferImporter,
    ) -> RenderStats {
        let (width, height) = plan.physical_size;
        if width == 0 || height == 0 {
            return RenderStats::default();
        }
        self.ensure_snapshot(plan.window, LayerSource::From, plan.physical_size);
        let counts = self.upload_plan(plan);

        let mut bind_groups = FxHashMap::default();
        self.collect_bind_groups(&plan.batches, plan.window, atlas, views, &mut bind_groups);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Lumen Snapshot Encoder"),
            });

        let mut stats = RenderStats::default();
        if let Some(snapshot) = self.snapshots.get(&(plan.window, LayerSource::From)) {
            let buffers = SceneBuffers {
                rect: &self.rect_vertices.buffer,
                rect_count: counts.0,
                textured: &self.textured_vertices.buffer,
                textured_count: counts.1,
            };
            self.encode_pass(
                &mut encoder,
                snapshot.view(),
                plan.clear_color,
                &plan.batches,
                &buffers,
                &bind_groups,
                &mut stats,
            );
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        tracing::debug!("{}: captured transition snapshot", plan.window);
        stats
    }

    fn ensure_snapshot(&mut self, window: WindowId, source: LayerSource, size: (u32, u32)) {
        let key = (window, source);
        let fits = self
            .snapshots
            .get(&key)
            .is_some_and(|t| t.matches(size.0, size.1, self.texture_format));
        if !fits {
            let label = format!("Lumen {} {:?} Snapshot", window, source);
            let texture = GpuTexture::new(
                &self.device,
                size.0,
                size.1,
                self.texture_format,
                wgpu::TextureUsages::RENDER_ATTACHMENT,
                Some(&label),
            );
            self.snapshots.insert(key, texture);
        }
    }

    /// Upload uniforms and vertices; returns the rect, textured and
    /// composite vertex counts actually written
    fn upload_plan(&mut self, plan: &FramePlan) -> (u32, u32, u32) {
        let (width, height) = plan.physical_size;
        self.queue.write_buffer(
            &self.uniforms,
            0,
            bytemuck::bytes_of(&Uniforms::new(width, height)),
        );

        let rect = clamp_vertices(&plan.rect_vertices, self.config.max_rect_vertices, "Rect");
        let textured = clamp_vertices(
            &plan.textured_vertices,
            self.config.max_textured_vertices,
            "Textured",
        );
        let composite = &plan.composite_vertices;

        self.rect_vertices.upload(&self.device, &self.queue, rect);
        self.textured_vertices.upload(&self.device, &self.queue, textured);
        self.composite_vertices.upload(&self.device, &self.queue, composite);

        (rect.len() as u32, textured.len() as u32, composite.len() as u32)
    }

    fn collect_bind_groups(
        &self,
        batches: &[DrawBatch],
        window: WindowId,
        atlas: &AtlasTextures,
        views: &ExternalBufferImporter,
        out: &mut FxHashMap<BatchBinding, wgpu::BindGroup>,
    ) {
        for batch in batches {
            if batch.binding == BatchBinding::None || out.contains_key(&batch.binding) {
                continue;
            }
            let texture = match batch.binding {
                BatchBinding::None => None,
                BatchBinding::AtlasPage(page) => atlas.page(page),
                BatchBinding::View(view) => views.texture(view),
                BatchBinding::Snapshot(source) => self.snapshots.get(&(window, source)),
            };
            let Some(texture) = texture else {
                continue;
            };
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Lumen Texture Bind Group"),
                layout: &self.layouts.textured,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.uniforms.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(texture.view()),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });
            out.insert(batch.binding, bind_group);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn encode_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        clear: [f32; 4],
        batches: &[DrawBatch],
        buffers: &SceneBuffers<'_>,
        bind_groups: &FxHashMap<BatchBinding, wgpu::BindGroup>,
        stats: &mut RenderStats,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Lumen Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: clear[0] as f64,
                        g: clear[1] as f64,
                        b: clear[2] as f64,
                        a: clear[3] as f64,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let mut bound: Option<(PipelineKind, BatchBinding)> = None;
        for batch in batches {
            let written = match batch.pipeline {
                PipelineKind::Rect => buffers.rect_count,
                PipelineKind::Glyph | PipelineKind::Texture => buffers.textured_count,
            };
            let end = batch.vertices.end.min(written);
            if batch.vertices.start >= end {
                stats.skipped_batches += 1;
                continue;
            }

            if bound != Some((batch.pipeline, batch.binding)) {
                match batch.pipeline {
                    PipelineKind::Rect => {
                        pass.set_pipeline(&self.pipelines.rect);
                        pass.set_bind_group(0, &self.rect_bind_group, &[]);
                        pass.set_vertex_buffer(0, buffers.rect.slice(..));
                    }
                    PipelineKind::Glyph | PipelineKind::Texture => {
                        let Some(bind_group) = bind_groups.get(&batch.binding) else {
                            stats.skipped_batches += 1;
                            continue;
                        };
                        let pipeline = if batch.pipeline == PipelineKind::Glyph {
                            &self.pipelines.glyph
                        } else {
                            &self.pipelines.texture
                        };
                        pass.set_pipeline(pipeline);
                        pass.set_bind_group(0, bind_group, &[]);
                        pass.set_vertex_buffer(0, buffers.textured.slice(..));
                    }
                }
                bound = Some((batch.pipeline, batch.binding));
            }

            pass.draw(batch.vertices.start..end, 0..1);
            stats.draw_calls += 1;
        }
    }
}

/// Headless device for GPU tests; `None` when no adapter is available
#[cfg(test)]
pub(crate) async fn create_test_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            force_fallback_adapter: false,
            compatible_surface: None,
        })
        .await?;

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor::default(), None)
        .await
        .ok()?;

    Some((device, queue))
}
