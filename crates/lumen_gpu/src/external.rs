//! External frame import
//!
//! Video decoders and embedded browsers render on their own threads and hand
//! finished frames over as opaque buffers: a DMA-BUF file descriptor on Linux
//! or a block of shared memory anywhere. Each view has a single-slot
//! [`FrameSlot`]; producers overwrite it, the render thread drains it once
//! per frame and uploads the newest frame into a reusable texture.
//!
//! The import strategy is picked once at startup. With
//! [`ImportStrategy::MappedDmaBuf`] a linear DMA-BUF is memory-mapped and
//! uploaded with the producer's stride straight from the mapping. Everything
//! else, and any direct-path failure, goes through the copy path which
//! repacks rows into an aligned staging buffer first. If both fail the view
//! keeps showing its previous texture.

#[cfg(unix)]
use std::os::fd::OwnedFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lumen_core::ViewId;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::plan::{ViewLookup, ViewTextureInfo};
use crate::texture::{padded_bytes_per_row, repack_rows, rows_len, GpuTexture};

/// `DRM_FORMAT_MOD_LINEAR`
pub const MODIFIER_LINEAR: u64 = 0;
/// `DRM_FORMAT_MOD_INVALID`: the producer did not say, treated as linear
pub const MODIFIER_INVALID: u64 = 0x00ff_ffff_ffff_ffff;

/// Errors from importing an external frame
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("invalid buffer layout: {0}")]
    InvalidLayout(String),

    #[error("unsupported layout modifier {0:#x}")]
    UnsupportedModifier(u64),

    #[error("failed to map DMA-BUF: {0}")]
    Map(#[from] std::io::Error),

    #[error("direct import is not available")]
    DirectUnavailable,
}

/// 32-bit pixel layouts producers may hand over
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Bytes R, G, B, A
    Rgba8,
    /// Bytes B, G, R, A
    Bgra8,
    /// Bytes B, G, R, X (alpha ignored)
    Xrgb8,
    /// Bytes R, G, B, X (alpha ignored)
    Xbgr8,
}

impl PixelFormat {
    pub const DRM_ARGB8888: u32 = 0x3432_5241;
    pub const DRM_XRGB8888: u32 = 0x3432_5258;
    pub const DRM_ABGR8888: u32 = 0x3432_4241;
    pub const DRM_XBGR8888: u32 = 0x3432_4258;

    /// Map a DRM fourcc code. DRM names are little-endian words, so
    /// `ARGB8888` is B, G, R, A in memory.
    pub fn from_fourcc(code: u32) -> Option<Self> {
        match code {
            Self::DRM_ARGB8888 => Some(PixelFormat::Bgra8),
            Self::DRM_XRGB8888 => Some(PixelFormat::Xrgb8),
            Self::DRM_ABGR8888 => Some(PixelFormat::Rgba8),
            Self::DRM_XBGR8888 => Some(PixelFormat::Xbgr8),
            _ => None,
        }
    }

    pub fn texture_format(&self) -> wgpu::TextureFormat {
        match self {
            PixelFormat::Rgba8 | PixelFormat::Xbgr8 => wgpu::TextureFormat::Rgba8UnormSrgb,
            PixelFormat::Bgra8 | PixelFormat::Xrgb8 => wgpu::TextureFormat::Bgra8UnormSrgb,
        }
    }

    /// Whether the fourth byte is padding rather than alpha
    pub fn is_opaque(&self) -> bool {
        matches!(self, PixelFormat::Xrgb8 | PixelFormat::Xbgr8)
    }

    pub const fn bytes_per_pixel(&self) -> u32 {
        4
    }
}

/// Where a frame's pixels live
pub enum ExternalHandle {
    /// Linux DMA-BUF; `stride` and `offset` in bytes
    #[cfg(unix)]
    DmaBuf { fd: OwnedFd, stride: u32, offset: u32 },
    /// Pixels in process memory
    SharedMemory { pixels: Arc<[u8]>, stride: u32 },
}

impl ExternalHandle {
    pub fn stride(&self) -> u32 {
        match self {
            #[cfg(unix)]
            ExternalHandle::DmaBuf { stride, .. } => *stride,
            ExternalHandle::SharedMemory { stride, .. } => *stride,
        }
    }
}

impl std::fmt::Debug for ExternalHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(unix)]
            ExternalHandle::DmaBuf { fd, stride, offset } => f
                .debug_struct("DmaBuf")
                .field("fd", fd)
                .field("stride", stride)
                .field("offset", offset)
                .finish(),
            ExternalHandle::SharedMemory { pixels, stride } => f
                .debug_struct("SharedMemory")
                .field("len", &pixels.len())
                .field("stride", stride)
                .finish(),
        }
    }
}

/// One produced frame
#[derive(Debug)]
pub struct ExternalBuffer {
    pub handle: ExternalHandle,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// DRM format modifier, `None` when unknown
    pub modifier: Option<u64>,
}

impl ExternalBuffer {
    /// A frame in process memory
    pub fn shared(pixels: impl Into<Arc<[u8]>>, width: u32, height: u32, stride: u32, format: PixelFormat) -> Self {
        Self {
            handle: ExternalHandle::SharedMemory {
                pixels: pixels.into(),
                stride,
            },
            width,
            height,
            format,
            modifier: None,
        }
    }

    pub fn is_linear(&self) -> bool {
        matches!(self.modifier, None | Some(MODIFIER_LINEAR) | Some(MODIFIER_INVALID))
    }

    fn row_bytes(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel() as usize
    }

    fn validate(&self) -> Result<(), ImportError> {
        if self.width == 0 || self.height == 0 {
            return Err(ImportError::InvalidLayout(format!(
                "empty frame {}x{}",
                self.width, self.height
            )));
        }
        let stride = self.handle.stride() as usize;
        if stride < self.row_bytes() {
            return Err(ImportError::InvalidLayout(format!(
                "stride {} shorter than a {}px row",
                stride, self.width
            )));
        }
        if let ExternalHandle::SharedMemory { pixels, .. } = &self.handle {
            let needed = rows_len(stride, self.row_bytes(), self.height as usize).unwrap_or(usize::MAX);
            if pixels.len() < needed {
                return Err(ImportError::InvalidLayout(format!(
                    "{} bytes for a frame needing {}",
                    pixels.len(),
                    needed
                )));
            }
        }
        Ok(())
    }
}

/// Single-slot latest-frame exchange between a producer thread and the
/// render thread
#[derive(Debug, Default)]
pub struct FrameSlot {
    frame: Mutex<Option<ExternalBuffer>>,
    pending: AtomicBool,
}

/// Producer-side handle to a view's slot
pub type FrameProducer = Arc<FrameSlot>;

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `buffer` as the newest frame. Returns the frame it replaced if
    /// that one was never consumed.
    pub fn publish(&self, buffer: ExternalBuffer) -> Option<ExternalBuffer> {
        let discarded = self.frame.lock().replace(buffer);
        self.pending.store(true, Ordering::Release);
        discarded
    }

    /// Take the newest frame, if one arrived since the last take
    pub fn take(&self) -> Option<ExternalBuffer> {
        if !self.pending.swap(false, Ordering::Acquire) {
            return None;
        }
        self.frame.lock().take()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

/// Capability selected once per platform
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportStrategy {
    /// Map linear DMA-BUFs and upload from the mapping
    MappedDmaBuf,
    /// Always repack into a staging buffer
    CopyOnly,
}

impl ImportStrategy {
    pub fn detect() -> Self {
        if cfg!(target_os = "linux") {
            ImportStrategy::MappedDmaBuf
        } else {
            ImportStrategy::CopyOnly
        }
    }
}

/// How one frame is (to be) uploaded
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportPath {
    Direct,
    Copy,
}

/// Direct path for linear DMA-BUFs under the mapped strategy, copy otherwise
pub fn select_path(strategy: ImportStrategy, buffer: &ExternalBuffer) -> ImportPath {
    match (strategy, &buffer.handle) {
        #[cfg(unix)]
        (ImportStrategy::MappedDmaBuf, ExternalHandle::DmaBuf { .. }) if buffer.is_linear() => {
            ImportPath::Direct
        }
        _ => ImportPath::Copy,
    }
}

/// Import counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub direct: u64,
    pub copied: u64,
    pub failed: u64,
}

struct ImportedView {
    info: ViewTextureInfo,
    texture: Option<GpuTexture>,
    frames: u64,
}

/// Owns the per-view slots and imported textures
pub struct ExternalBufferImporter {
    strategy: ImportStrategy,
    slots: FxHashMap<ViewId, FrameProducer>,
    views: FxHashMap<ViewId, ImportedView>,
    stats: ImportStats,
}

impl ExternalBufferImporter {
    pub fn new(strategy: ImportStrategy) -> Self {
        tracing::debug!("external import strategy: {:?}", strategy);
        Self {
            strategy,
            slots: FxHashMap::default(),
            views: FxHashMap::default(),
            stats: ImportStats::default(),
        }
    }

    pub fn strategy(&self) -> ImportStrategy {
        self.strategy
    }

    /// Slot handle for `view`, created on first use
    pub fn producer(&mut self, view: ViewId) -> FrameProducer {
        self.slots
            .entry(view)
            .or_insert_with(|| Arc::new(FrameSlot::new()))
            .clone()
    }

    /// Publish from the render thread; see [`FrameSlot::publish`]
    pub fn publish(&mut self, view: ViewId, buffer: ExternalBuffer) -> Option<ExternalBuffer> {
        self.producer(view).publish(buffer)
    }

    /// Drain every slot and import the newest frames. Without a device only
    /// the frame geometry is recorded. Returns the number of frames imported.
    pub fn import_pending(&mut self, gpu: Option<(&wgpu::Device, &wgpu::Queue)>) -> usize {
        let pending: Vec<(ViewId, ExternalBuffer)> = self
            .slots
            .iter()
            .filter_map(|(view, slot)| slot.take().map(|buffer| (*view, buffer)))
            .collect();

        let mut imported = 0;
        for (view, buffer) in pending {
            match self.import(view, &buffer, gpu) {
                Ok(path) => {
                    tracing::debug!(
                        "{}: imported {}x{} {:?} frame ({:?})",
                        view,
                        buffer.width,
                        buffer.height,
                        buffer.format,
                        path
                    );
                    imported += 1;
                }
                Err(e) => {
                    self.stats.failed += 1;
                    tracing::warn!("{}: frame import failed, keeping previous: {}", view, e);
                }
            }
        }
        imported
    }

    /// Import one frame for `view`, direct path first. On failure the view
    /// keeps its previous texture and geometry untouched.
    pub fn import(
        &mut self,
        view: ViewId,
        buffer: &ExternalBuffer,
        gpu: Option<(&wgpu::Device, &wgpu::Queue)>,
    ) -> Result<ImportPath, ImportError> {
        buffer.validate()?;
        if !buffer.is_linear() {
            return Err(ImportError::UnsupportedModifier(buffer.modifier.unwrap_or_default()));
        }
        let path = select_path(self.strategy, buffer);

        let used = match gpu {
            Some((device, queue)) => {
                let format = buffer.format.texture_format();
                let current = self
                    .views
                    .get(&view)
                    .and_then(|v| v.texture.as_ref())
                    .filter(|t| t.matches(buffer.width, buffer.height, format));
                match current {
                    Some(texture) => upload(view, texture, queue, buffer, path)?,
                    None => {
                        // Size or format changed: fill a fresh texture and
                        // swap it in only once the upload went through.
                        let label = format!("Lumen External View {}", view.0);
                        let staging = GpuTexture::new(
                            device,
                            buffer.width,
                            buffer.height,
                            format,
                            wgpu::TextureUsages::empty(),
                            Some(&label),
                        );
                        let used = upload(view, &staging, queue, buffer, path)?;
                        self.entry(view, buffer).texture = Some(staging);
                        used
                    }
                }
            }
            None => path,
        };

        let entry = self.entry(view, buffer);
        entry.info = ViewTextureInfo {
            width: buffer.width,
            height: buffer.height,
            opaque: buffer.format.is_opaque(),
        };
        entry.frames += 1;
        match used {
            ImportPath::Direct => self.stats.direct += 1,
            ImportPath::Copy => self.stats.copied += 1,
        }
        Ok(used)
    }

    fn entry(&mut self, view: ViewId, buffer: &ExternalBuffer) -> &mut ImportedView {
        self.views.entry(view).or_insert_with(|| ImportedView {
            info: ViewTextureInfo {
                width: buffer.width,
                height: buffer.height,
                opaque: buffer.format.is_opaque(),
            },
            texture: None,
            frames: 0,
        })
    }

    /// Latest texture of `view`
    pub fn texture(&self, view: ViewId) -> Option<&GpuTexture> {
        self.views.get(&view).and_then(|v| v.texture.as_ref())
    }

    /// Frames imported for `view` so far
    pub fn frames_imported(&self, view: ViewId) -> u64 {
        self.views.get(&view).map_or(0, |v| v.frames)
    }

    /// Drop the slot and texture of a view
    pub fn remove_view(&mut self, view: ViewId) {
        self.slots.remove(&view);
        self.views.remove(&view);
    }

    pub fn stats(&self) -> ImportStats {
        self.stats
    }
}

impl ViewLookup for ExternalBufferImporter {
    fn view_texture(&self, view: ViewId) -> Option<ViewTextureInfo> {
        self.views.get(&view).map(|v| v.info)
    }
}

#[cfg(unix)]
fn map_dmabuf(fd: &OwnedFd, offset: u32, len: usize) -> Result<memmap2::Mmap, ImportError> {
    // SAFETY: the producer keeps the buffer alive and does not write to it
    // until the next frame is published; the mapping is dropped before this
    // function's caller returns.
    let map = unsafe {
        memmap2::MmapOptions::new()
            .offset(offset as u64)
            .len(len)
            .map(fd)?
    };
    Ok(map)
}

fn upload(
    view: ViewId,
    texture: &GpuTexture,
    queue: &wgpu::Queue,
    buffer: &ExternalBuffer,
    path: ImportPath,
) -> Result<ImportPath, ImportError> {
    match path {
        ImportPath::Direct => match upload_direct(texture, queue, buffer) {
            Ok(()) => Ok(ImportPath::Direct),
            Err(e) => {
                tracing::debug!("{}: direct import failed ({}), copying", view, e);
                upload_copy(texture, queue, buffer)?;
                Ok(ImportPath::Copy)
            }
        },
        ImportPath::Copy => {
            upload_copy(texture, queue, buffer)?;
            Ok(ImportPath::Copy)
        }
    }
}

fn upload_direct(texture: &GpuTexture, queue: &wgpu::Queue, buffer: &ExternalBuffer) -> Result<(), ImportError> {
    match &buffer.handle {
        #[cfg(unix)]
        ExternalHandle::DmaBuf { fd, stride, offset } => {
            let stride = *stride as usize;
            let len = rows_len(stride, buffer.row_bytes(), buffer.height as usize)
                .ok_or_else(|| ImportError::InvalidLayout("frame size overflows".to_string()))?;
            let map = map_dmabuf(fd, *offset, len)?;
            texture.write_rows(queue, 0, 0, buffer.width, buffer.height, &map, stride);
            Ok(())
        }
        ExternalHandle::SharedMemory { .. } => Err(ImportError::DirectUnavailable),
    }
}

fn upload_copy(texture: &GpuTexture, queue: &wgpu::Queue, buffer: &ExternalBuffer) -> Result<(), ImportError> {
    let row_bytes = buffer.row_bytes();
    let height = buffer.height as usize;
    let stride = buffer.handle.stride() as usize;

    let staged = match &buffer.handle {
        #[cfg(unix)]
        ExternalHandle::DmaBuf { fd, offset, .. } => {
            let len = rows_len(stride, row_bytes, height)
                .ok_or_else(|| ImportError::InvalidLayout("frame size overflows".to_string()))?;
            let map = map_dmabuf(fd, *offset, len)?;
            repack_rows(&map, stride, row_bytes, height)
        }
        ExternalHandle::SharedMemory { pixels, .. } => repack_rows(pixels, stride, row_bytes, height),
    }
    .ok_or_else(|| ImportError::InvalidLayout("source shorter than frame".to_string()))?;

    texture.write_rows(
        queue,
        0,
        0,
        buffer.width,
        buffer.height,
        &staged,
        padded_bytes_per_row(row_bytes),
    );
    Ok(())
}
