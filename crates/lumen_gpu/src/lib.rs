//! Lumen GPU compositor
//!
//! wgpu-based execution of frame plans:
//!
//! - **Frame plans**: CPU-built, ordered draw batches for one window frame
//! - **Pipelines**: solid rects, R8 atlas glyphs, and RGBA textures
//! - **Glyph atlas mirror**: one texture per atlas page, fed from upload queues
//! - **External views**: DMA-BUF and shared-memory frames imported from other
//!   threads
//! - **Surfaces**: acquire error policy and reconfiguration
//!
//! Plans are built without a device, so everything up to the final draw calls
//! is deterministic and testable headless.

pub mod atlas;
pub mod external;
pub mod plan;
pub mod primitives;
pub mod renderer;
pub mod shaders;
pub mod surface;
pub mod texture;

pub use atlas::AtlasTextures;
pub use external::{
    select_path, ExternalBuffer, ExternalBufferImporter, ExternalHandle, FrameProducer, FrameSlot,
    ImportError, ImportPath, ImportStats, ImportStrategy, PixelFormat,
};
pub use plan::{
    BatchBinding, DrawBatch, FramePlan, NoViews, PipelineKind, ViewLookup, ViewTextureInfo,
};
pub use primitives::{RectVertex, TexturedVertex, Uniforms};
pub use renderer::{GpuRenderer, RenderStats, RendererConfig, RendererError};
pub use surface::{parse_present_mode, AcquireAction, AcquireFailures, Acquired, WindowSurface};
pub use texture::GpuTexture;
