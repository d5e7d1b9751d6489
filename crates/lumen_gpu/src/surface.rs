//! Window surfaces and frame acquisition
//!
//! Acquire failures are not fatal on their own. Lost and outdated surfaces
//! are reconfigured and the frame is skipped; timeouts just skip. Only
//! out-of-memory, or more consecutive failures than configured, end the
//! window with [`DisplayError::SurfaceLost`].

use lumen_core::{DisplayError, DisplayResult, WindowId};

use crate::renderer::GpuRenderer;

/// What to do about a failed acquire
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireAction {
    /// Reconfigure the surface and skip this frame
    Reconfigure,
    /// Skip this frame
    Skip,
    /// Give up on the window
    Fatal,
}

/// Classify a `get_current_texture` error
pub fn classify(error: &wgpu::SurfaceError) -> AcquireAction {
    #[allow(unreachable_patterns)]
    match error {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => AcquireAction::Reconfigure,
        wgpu::SurfaceError::Timeout => AcquireAction::Skip,
        wgpu::SurfaceError::OutOfMemory => AcquireAction::Fatal,
        _ => AcquireAction::Skip,
    }
}

/// Consecutive acquire failure tracking
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcquireFailures {
    consecutive: u32,
    max_consecutive: u32,
    skipped: u64,
}

impl AcquireFailures {
    pub fn new(max_consecutive: u32) -> Self {
        Self {
            consecutive: 0,
            max_consecutive,
            skipped: 0,
        }
    }

    /// Count a failure; escalates to fatal past the limit
    pub fn record(&mut self, error: &wgpu::SurfaceError) -> AcquireAction {
        self.consecutive += 1;
        let action = classify(error);
        if action == AcquireAction::Fatal || self.consecutive > self.max_consecutive {
            return AcquireAction::Fatal;
        }
        self.skipped += 1;
        action
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    /// Frames skipped over the surface's lifetime
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

/// Parse a present mode name as used in configuration files
pub fn parse_present_mode(name: &str) -> Option<wgpu::PresentMode> {
    match name.trim().to_ascii_lowercase().as_str() {
        "auto_vsync" | "vsync" => Some(wgpu::PresentMode::AutoVsync),
        "auto_no_vsync" | "no_vsync" => Some(wgpu::PresentMode::AutoNoVsync),
        "fifo" => Some(wgpu::PresentMode::Fifo),
        "fifo_relaxed" => Some(wgpu::PresentMode::FifoRelaxed),
        "mailbox" => Some(wgpu::PresentMode::Mailbox),
        "immediate" => Some(wgpu::PresentMode::Immediate),
        _ => None,
    }
}

/// Result of a successful acquire call
pub enum Acquired {
    Frame(wgpu::SurfaceTexture),
    Skipped,
}

/// A configured presentation surface for one window
pub struct WindowSurface {
    window: WindowId,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    failures: AcquireFailures,
}

impl WindowSurface {
    /// Configure `surface` for the renderer's target format
    pub fn new(
        window: WindowId,
        surface: wgpu::Surface<'static>,
        renderer: &GpuRenderer,
        physical_size: (u32, u32),
        present_mode: wgpu::PresentMode,
        max_acquire_failures: u32,
    ) -> Self {
        let caps = surface.get_capabilities(renderer.adapter());
        let present_mode = if caps.present_modes.contains(&present_mode) {
            present_mode
        } else {
            tracing::debug!(
                "{}: present mode {:?} unsupported, using Fifo",
                window,
                present_mode
            );
            wgpu::PresentMode::Fifo
        };
        let alpha_mode = if caps.alpha_modes.contains(&wgpu::CompositeAlphaMode::Opaque) {
            wgpu::CompositeAlphaMode::Opaque
        } else {
            caps.alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto)
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: renderer.texture_format(),
            width: physical_size.0.max(1),
            height: physical_size.1.max(1),
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(renderer.device(), &config);
        tracing::debug!(
            "{}: surface configured {}x{} {:?}",
            window,
            config.width,
            config.height,
            config.present_mode
        );

        Self {
            window,
            surface,
            config,
            failures: AcquireFailures::new(max_acquire_failures),
        }
    }

    pub fn window(&self) -> WindowId {
        self.window
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn failures(&self) -> &AcquireFailures {
        &self.failures
    }

    /// Reconfigure for a new physical size
    pub fn resize(&mut self, device: &wgpu::Device, physical_size: (u32, u32)) {
        let (width, height) = (physical_size.0.max(1), physical_size.1.max(1));
        if (width, height) == self.size() {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(device, &self.config);
    }

    /// Acquire the next frame
    pub fn acquire(&mut self, device: &wgpu::Device) -> DisplayResult<Acquired> {
        match self.surface.get_current_texture() {
            Ok(frame) => {
                self.failures.reset();
                Ok(Acquired::Frame(frame))
            }
            Err(e) => match self.failures.record(&e) {
                AcquireAction::Reconfigure => {
                    tracing::debug!("{}: surface {:?}, reconfiguring", self.window, e);
                    self.surface.configure(device, &self.config);
                    Ok(Acquired::Skipped)
                }
                AcquireAction::Skip => {
                    tracing::warn!("{}: surface error: {:?}", self.window, e);
                    Ok(Acquired::Skipped)
                }
                AcquireAction::Fatal => {
                    tracing::error!(
                        "{}: surface unusable after {} failures ({:?})",
                        self.window,
                        self.failures.consecutive(),
                        e
                    );
                    Err(DisplayError::SurfaceLost {
                        window: self.window,
                        failures: self.failures.consecutive(),
                    })
                }
            },
        }
    }
}
