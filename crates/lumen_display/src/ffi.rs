//! C ABI for host editors
//!
//! Every entry point takes the session handle returned by
//! [`lumen_session_new`], tolerates null pointers and never unwinds across
//! the boundary. Colors are `0xAARRGGBB`; an alpha byte of zero is opaque.

#![allow(clippy::too_many_arguments)]

use std::ffi::{c_char, c_void, CStr};
use std::num::{NonZeroIsize, NonZeroU32};
use std::path::Path;
use std::ptr::{self, NonNull};
use std::sync::Arc;
use std::time::Duration;

use lumen_animation::{
    AnimatedProperty, AnimationId, AnimationTarget, AnimationValue, CursorAnimationMode, Easing,
    TransitionKind,
};
use lumen_core::{
    Color, CursorStyle, FaceId, FontStyle, FontWeight, Rect, Size, UnderlineStyle, ViewId,
    WindowId,
};
use lumen_gpu::{ExternalHandle, PixelFormat};
use raw_window_handle::{
    AppKitDisplayHandle, AppKitWindowHandle, DisplayHandle, HandleError, HasDisplayHandle,
    HasWindowHandle, RawDisplayHandle, RawWindowHandle, WaylandDisplayHandle,
    WaylandWindowHandle, Win32WindowHandle, WindowHandle, WindowsDisplayHandle,
    XcbDisplayHandle, XcbWindowHandle, XlibDisplayHandle, XlibWindowHandle,
};
use slotmap::{Key, KeyData};

use crate::config::DisplayConfig;
use crate::session::DisplaySession;

/// Opaque session handle
pub struct LumenSession {
    session: DisplaySession,
}

macro_rules! catch_panic {
    ($default:expr, $body:expr) => {
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| $body)) {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("panic caught at the C boundary: {:?}", e);
                $default
            }
        }
    };
}

fn session_mut<'a>(handle: *mut LumenSession) -> Option<&'a mut DisplaySession> {
    // SAFETY: non-null handles come from `lumen_session_new` and the host
    // serializes calls on one session.
    unsafe { handle.as_mut() }.map(|h| &mut h.session)
}

fn c_str<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    // SAFETY: the host passes NUL-terminated strings valid for the call.
    unsafe { CStr::from_ptr(s) }.to_str().ok()
}

fn millis(ms: u32) -> Duration {
    Duration::from_millis(u64::from(ms))
}

/// Windowing systems accepted by [`lumen_attach_surface`]
pub const PLATFORM_APPKIT: u32 = 0;
pub const PLATFORM_WAYLAND: u32 = 1;
pub const PLATFORM_XLIB: u32 = 2;
pub const PLATFORM_XCB: u32 = 3;
pub const PLATFORM_WIN32: u32 = 4;

/// Native handles lent by the host for the lifetime of the surface
struct HostWindow {
    window: RawWindowHandle,
    display: RawDisplayHandle,
}

impl HasWindowHandle for HostWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        // SAFETY: the host keeps the native window alive until it detaches.
        Ok(unsafe { WindowHandle::borrow_raw(self.window) })
    }
}

impl HasDisplayHandle for HostWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        // SAFETY: as above, for the display connection.
        Ok(unsafe { DisplayHandle::borrow_raw(self.display) })
    }
}

unsafe impl Send for HostWindow {}
unsafe impl Sync for HostWindow {}

/// Build raw handles from host pointers. AppKit takes an `NSView*`, Wayland
/// a `wl_surface*` and `wl_display*`, Xlib and XCB a window id and the
/// `Display*` / `xcb_connection_t*`, Win32 an `HWND`.
fn host_handles(
    platform: u32,
    window: *mut c_void,
    display: *mut c_void,
) -> Option<(RawWindowHandle, RawDisplayHandle)> {
    match platform {
        PLATFORM_APPKIT => Some((
            RawWindowHandle::AppKit(AppKitWindowHandle::new(NonNull::new(window)?)),
            RawDisplayHandle::AppKit(AppKitDisplayHandle::new()),
        )),
        PLATFORM_WAYLAND => Some((
            RawWindowHandle::Wayland(WaylandWindowHandle::new(NonNull::new(window)?)),
            RawDisplayHandle::Wayland(WaylandDisplayHandle::new(NonNull::new(display)?)),
        )),
        PLATFORM_XLIB => {
            let id = window as usize;
            if id == 0 {
                return None;
            }
            Some((
                RawWindowHandle::Xlib(XlibWindowHandle::new(id as _)),
                RawDisplayHandle::Xlib(XlibDisplayHandle::new(Some(NonNull::new(display)?), 0)),
            ))
        }
        PLATFORM_XCB => {
            let id = NonZeroU32::new(u32::try_from(window as usize).ok()?)?;
            Some((
                RawWindowHandle::Xcb(XcbWindowHandle::new(id)),
                RawDisplayHandle::Xcb(XcbDisplayHandle::new(Some(NonNull::new(display)?), 0)),
            ))
        }
        PLATFORM_WIN32 => Some((
            RawWindowHandle::Win32(Win32WindowHandle::new(NonZeroIsize::new(window as isize)?)),
            RawDisplayHandle::Windows(WindowsDisplayHandle::new()),
        )),
        _ => None,
    }
}

/// Target kinds accepted by [`lumen_start_animation`]
pub const TARGET_WINDOW: u32 = 0;
pub const TARGET_GLYPH: u32 = 1;
pub const TARGET_VIEW: u32 = 2;
pub const TARGET_CURSOR: u32 = 3;

fn animation_target(kind: u32, window: u64, index: u32) -> Option<AnimationTarget> {
    let window = WindowId(window);
    match kind {
        TARGET_WINDOW => Some(AnimationTarget::Window(window)),
        TARGET_GLYPH => Some(AnimationTarget::GlyphCell { window, index }),
        TARGET_VIEW => Some(AnimationTarget::ExternalView(ViewId(index))),
        TARGET_CURSOR => Some(AnimationTarget::Cursor(window)),
        _ => None,
    }
}

fn animation_value(property: AnimatedProperty, x: f32, y: f32) -> AnimationValue {
    match property {
        AnimatedProperty::Position | AnimatedProperty::Size => AnimationValue::Pair([x, y]),
        _ => AnimationValue::Scalar(x),
    }
}

/// Install the `LUMEN_LOG` filtered subscriber. Returns false if one exists.
#[no_mangle]
pub extern "C" fn lumen_init_logging() -> bool {
    catch_panic!(false, crate::logging::init_logging())
}

/// Create a session. `config_path` may be null for defaults; a config that
/// fails to load falls back to defaults with an error logged.
#[no_mangle]
pub extern "C" fn lumen_session_new(config_path: *const c_char) -> *mut LumenSession {
    catch_panic!(ptr::null_mut(), {
        let config = match c_str(config_path) {
            Some(path) => DisplayConfig::load(Path::new(path)).unwrap_or_else(|e| {
                tracing::error!("{:#}; using default configuration", e);
                DisplayConfig::default()
            }),
            None => DisplayConfig::default(),
        };
        Box::into_raw(Box::new(LumenSession {
            session: DisplaySession::new(config),
        }))
    })
}

#[no_mangle]
pub extern "C" fn lumen_session_free(handle: *mut LumenSession) {
    if !handle.is_null() {
        // SAFETY: created by `lumen_session_new` and not used afterwards.
        unsafe {
            let _ = Box::from_raw(handle);
        }
    }
}

/// Create a headless GPU renderer. Returns false on failure.
#[no_mangle]
pub extern "C" fn lumen_init_gpu(handle: *mut LumenSession) -> bool {
    catch_panic!(false, {
        let Some(session) = session_mut(handle) else {
            return false;
        };
        match session.init_gpu(Default::default()) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("GPU initialization failed: {}", e);
                false
            }
        }
    })
}

/// Present `window` into a native window; see [`PLATFORM_APPKIT`] and
/// friends for what `window_handle` and `display_handle` point at. Creates
/// the GPU renderer on first use. Returns false on bad handles or when no
/// surface could be created.
#[no_mangle]
pub extern "C" fn lumen_attach_surface(
    handle: *mut LumenSession,
    window: u64,
    platform: u32,
    window_handle: *mut c_void,
    display_handle: *mut c_void,
) -> bool {
    catch_panic!(false, {
        let Some(session) = session_mut(handle) else {
            return false;
        };
        let Some((window_raw, display_raw)) = host_handles(platform, window_handle, display_handle)
        else {
            tracing::warn!("attach_surface: bad handles for platform {}", platform);
            return false;
        };
        let host = Arc::new(HostWindow {
            window: window_raw,
            display: display_raw,
        });
        match session.attach_surface(WindowId(window), host) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("attach_surface failed: {}", e);
                false
            }
        }
    })
}

#[no_mangle]
pub extern "C" fn lumen_begin_frame(
    handle: *mut LumenSession,
    window: u64,
    width: f32,
    height: f32,
    background: u32,
) {
    catch_panic!((), {
        if let Some(session) = session_mut(handle) {
            session.begin_frame(WindowId(window), width, height, Color::from_pixel(background));
        }
    })
}

#[no_mangle]
pub extern "C" fn lumen_add_background(
    handle: *mut LumenSession,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    color: u32,
) {
    catch_panic!((), {
        if let Some(session) = session_mut(handle) {
            session.add_background(Rect::new(x, y, width, height), Color::from_pixel(color));
        }
    })
}

#[no_mangle]
pub extern "C" fn lumen_add_stretch(
    handle: *mut LumenSession,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    face: u32,
) {
    catch_panic!((), {
        if let Some(session) = session_mut(handle) {
            session.add_stretch(x, y, width, height, FaceId(face));
        }
    })
}

/// `codepoint` must be a Unicode scalar value; others are dropped
#[no_mangle]
pub extern "C" fn lumen_add_char(
    handle: *mut LumenSession,
    codepoint: u32,
    x: f32,
    y: f32,
    width: f32,
    ascent: f32,
    descent: f32,
    face: u32,
) {
    catch_panic!((), {
        let Some(session) = session_mut(handle) else {
            return;
        };
        match char::from_u32(codepoint) {
            Some(ch) => session.add_char(ch, x, y, width, ascent, descent, FaceId(face)),
            None => tracing::warn!("dropping invalid codepoint {:#x}", codepoint),
        }
    })
}

#[no_mangle]
pub extern "C" fn lumen_add_cursor(
    handle: *mut LumenSession,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    style: u8,
    color: u32,
    active: bool,
) {
    catch_panic!((), {
        if let Some(session) = session_mut(handle) {
            session.add_cursor(
                x,
                y,
                width,
                height,
                CursorStyle::from_code(style),
                Color::from_pixel(color),
                active,
            );
        }
    })
}

#[no_mangle]
pub extern "C" fn lumen_add_border(
    handle: *mut LumenSession,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    color: u32,
) {
    catch_panic!((), {
        if let Some(session) = session_mut(handle) {
            session.add_border(x, y, width, height, Color::from_pixel(color));
        }
    })
}

#[no_mangle]
pub extern "C" fn lumen_add_external_view(
    handle: *mut LumenSession,
    view: u32,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
) {
    catch_panic!((), {
        if let Some(session) = session_mut(handle) {
            session.add_external_view(ViewId(view), x, y, width, height);
        }
    })
}

/// Returns true when the frame ended normally, false on a lost surface or
/// unknown window
#[no_mangle]
pub extern "C" fn lumen_end_frame(handle: *mut LumenSession, window: u64) -> bool {
    catch_panic!(false, {
        let Some(session) = session_mut(handle) else {
            return false;
        };
        match session.end_frame(WindowId(window)) {
            Ok(_) => true,
            Err(e) => {
                tracing::error!("end_frame failed: {}", e);
                false
            }
        }
    })
}

/// Define a face. `has_background` selects whether `background` is used;
/// `family` may be null for the default family.
#[no_mangle]
pub extern "C" fn lumen_set_face(
    handle: *mut LumenSession,
    face: u32,
    foreground: u32,
    background: u32,
    has_background: bool,
    weight: u16,
    style: u8,
    underline: u8,
    family: *const c_char,
) {
    catch_panic!((), {
        let Some(session) = session_mut(handle) else {
            return;
        };
        let background = has_background.then(|| Color::from_pixel(background));
        session.set_face(
            FaceId(face),
            Color::from_pixel(foreground),
            background,
            FontWeight::clamped(weight),
            FontStyle::from_code(style),
            UnderlineStyle::from_code(underline),
            c_str(family).unwrap_or("monospace"),
        );
    })
}

#[no_mangle]
pub extern "C" fn lumen_set_face_size(handle: *mut LumenSession, face: u32, size: f32) {
    catch_panic!((), {
        if let Some(session) = session_mut(handle) {
            session.set_face_size(FaceId(face), size);
        }
    })
}

/// Returns the new integer scale, or 0 if it did not change
#[no_mangle]
pub extern "C" fn lumen_resize(
    handle: *mut LumenSession,
    window: u64,
    width: f32,
    height: f32,
    scale_factor: f64,
) -> u32 {
    catch_panic!(0, {
        let Some(session) = session_mut(handle) else {
            return 0;
        };
        session
            .resize(WindowId(window), width, height, scale_factor)
            .map_or(0, |change| change.new)
    })
}

/// Set the logical size and scale factor of `window`. Returns false for a
/// null handle or a size that is negative or not finite.
#[no_mangle]
pub extern "C" fn lumen_set_window_size(
    handle: *mut LumenSession,
    window: u64,
    width: f32,
    height: f32,
    scale_factor: f64,
) -> bool {
    catch_panic!(false, {
        let Some(session) = session_mut(handle) else {
            return false;
        };
        if !Size::new(width, height).is_valid() {
            return false;
        }
        session.resize(WindowId(window), width, height, scale_factor);
        true
    })
}

/// Read back the logical size, physical pixel size and integer scale of
/// `window`. Null out pointers are skipped. Returns false for unknown windows.
#[no_mangle]
pub extern "C" fn lumen_window_size(
    handle: *mut LumenSession,
    window: u64,
    width: *mut f32,
    height: *mut f32,
    physical_width: *mut u32,
    physical_height: *mut u32,
    scale: *mut u32,
) -> bool {
    catch_panic!(false, {
        let Some(info) = session_mut(handle).and_then(|s| s.window_size(WindowId(window))) else {
            return false;
        };
        // SAFETY: non-null out pointers are writable for the call.
        unsafe {
            if let Some(out) = width.as_mut() {
                *out = info.logical.width;
            }
            if let Some(out) = height.as_mut() {
                *out = info.logical.height;
            }
            if let Some(out) = physical_width.as_mut() {
                *out = info.physical.0;
            }
            if let Some(out) = physical_height.as_mut() {
                *out = info.physical.1;
            }
            if let Some(out) = scale.as_mut() {
                *out = info.scale;
            }
        }
        true
    })
}

/// Hand over a shared-memory frame. The pixels are copied before return.
#[no_mangle]
pub extern "C" fn lumen_import_shm_frame(
    handle: *mut LumenSession,
    view: u32,
    pixels: *const u8,
    len: usize,
    width: u32,
    height: u32,
    stride: u32,
    fourcc: u32,
) -> bool {
    catch_panic!(false, {
        let Some(session) = session_mut(handle) else {
            return false;
        };
        if pixels.is_null() {
            return false;
        }
        let Some(format) = PixelFormat::from_fourcc(fourcc) else {
            tracing::warn!("view#{}: unsupported fourcc {:#x}", view, fourcc);
            return false;
        };
        // SAFETY: the host guarantees `len` readable bytes at `pixels`.
        let bytes = unsafe { std::slice::from_raw_parts(pixels, len) };
        session.import_external_frame(
            ViewId(view),
            ExternalHandle::SharedMemory {
                pixels: bytes.into(),
                stride,
            },
            width,
            height,
            format,
            None,
        );
        true
    })
}

/// Hand over a DMA-BUF frame. Ownership of `fd` passes to the session.
#[cfg(unix)]
#[no_mangle]
pub extern "C" fn lumen_import_dmabuf_frame(
    handle: *mut LumenSession,
    view: u32,
    fd: i32,
    width: u32,
    height: u32,
    stride: u32,
    offset: u32,
    fourcc: u32,
    modifier: u64,
) -> bool {
    use std::os::fd::{FromRawFd, OwnedFd};

    catch_panic!(false, {
        if fd < 0 {
            return false;
        }
        // SAFETY: the host transfers an open descriptor it no longer uses.
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };
        let Some(session) = session_mut(handle) else {
            return false;
        };
        let Some(format) = PixelFormat::from_fourcc(fourcc) else {
            tracing::warn!("view#{}: unsupported fourcc {:#x}", view, fourcc);
            return false;
        };
        session.import_external_frame(
            ViewId(view),
            ExternalHandle::DmaBuf { fd, stride, offset },
            width,
            height,
            format,
            Some(modifier),
        );
        true
    })
}

/// Start an animation. `property` is a property code, `easing` a name such
/// as "ease-out" (null for linear). Scalar properties read only `from_x` and
/// `to_x`. Returns 0 when the arguments are invalid.
#[no_mangle]
pub extern "C" fn lumen_start_animation(
    handle: *mut LumenSession,
    target_kind: u32,
    window: u64,
    index: u32,
    property: u32,
    from_x: f32,
    from_y: f32,
    to_x: f32,
    to_y: f32,
    duration_ms: u32,
    easing: *const c_char,
) -> u64 {
    catch_panic!(0, {
        let Some(session) = session_mut(handle) else {
            return 0;
        };
        let (Some(target), Some(property)) = (
            animation_target(target_kind, window, index),
            AnimatedProperty::from_code(property),
        ) else {
            tracing::warn!("start_animation: bad target {} or property", target_kind);
            return 0;
        };
        let easing = c_str(easing)
            .and_then(Easing::from_name)
            .unwrap_or(Easing::Linear);
        let id = session.start_animation(
            target,
            property,
            animation_value(property, from_x, from_y),
            animation_value(property, to_x, to_y),
            millis(duration_ms),
            easing,
        );
        id.data().as_ffi()
    })
}

#[no_mangle]
pub extern "C" fn lumen_cancel_animation(handle: *mut LumenSession, id: u64) -> bool {
    catch_panic!(false, {
        let Some(session) = session_mut(handle) else {
            return false;
        };
        session.cancel_animation(AnimationId::from(KeyData::from_ffi(id)))
    })
}

/// Transition the window to its next frame. A null `kind` uses the
/// configured transition.
#[no_mangle]
pub extern "C" fn lumen_start_buffer_transition(
    handle: *mut LumenSession,
    window: u64,
    kind: *const c_char,
    duration_ms: u32,
) {
    catch_panic!((), {
        let Some(session) = session_mut(handle) else {
            return;
        };
        let window = WindowId(window);
        match c_str(kind) {
            None => session.start_default_transition(window),
            Some(name) => match TransitionKind::from_name(name) {
                Some(kind) => session.start_buffer_transition(
                    window,
                    kind,
                    millis(duration_ms),
                    Easing::EaseInOut,
                ),
                None => tracing::warn!("unknown transition {:?}", name),
            },
        }
    })
}

/// Smooth a scroll the host already applied. `duration_ms` of 0 uses the
/// configured duration.
#[no_mangle]
pub extern "C" fn lumen_smooth_scroll(
    handle: *mut LumenSession,
    window: u64,
    dx: f32,
    dy: f32,
    duration_ms: u32,
) {
    catch_panic!((), {
        if let Some(session) = session_mut(handle) {
            let duration = (duration_ms > 0).then(|| millis(duration_ms));
            session.smooth_scroll(WindowId(window), dx, dy, duration);
        }
    })
}

#[no_mangle]
pub extern "C" fn lumen_set_cursor_blink(handle: *mut LumenSession, enabled: bool, interval_ms: u32) {
    catch_panic!((), {
        if let Some(session) = session_mut(handle) {
            session.set_cursor_blink(enabled, millis(interval_ms));
        }
    })
}

/// Report a hash of the window's content; returns true when the change
/// started an automatic transition
#[no_mangle]
pub extern "C" fn lumen_set_content_hash(handle: *mut LumenSession, window: u64, hash: u64) -> bool {
    catch_panic!(false, {
        session_mut(handle).is_some_and(|s| s.set_content_hash(WindowId(window), hash))
    })
}

/// Select the cursor jump effect by name ("railgun", "ripple", ...).
/// Unknown names fall back to "smooth"; null turns effects off.
#[no_mangle]
pub extern "C" fn lumen_set_cursor_effect(handle: *mut LumenSession, name: *const c_char) {
    catch_panic!((), {
        if let Some(session) = session_mut(handle) {
            let mode = c_str(name).map_or(CursorAnimationMode::None, CursorAnimationMode::from_name);
            session.set_cursor_mode(mode);
        }
    })
}

/// Milliseconds until the cursor blink next flips, or -1 when no cursor
/// blinks
#[no_mangle]
pub extern "C" fn lumen_next_blink_ms(handle: *mut LumenSession) -> i64 {
    catch_panic!(-1, {
        session_mut(handle)
            .and_then(|s| s.next_blink_in())
            .map_or(-1, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
    })
}

/// True while animations run and the host should keep requesting frames
#[no_mangle]
pub extern "C" fn lumen_needs_frames(handle: *mut LumenSession) -> bool {
    catch_panic!(false, session_mut(handle).is_some_and(|s| s.needs_frames()))
}

#[no_mangle]
pub extern "C" fn lumen_detach_window(handle: *mut LumenSession, window: u64) {
    catch_panic!((), {
        if let Some(session) = session_mut(handle) {
            session.detach_window(WindowId(window));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_handles_are_ignored() {
        lumen_begin_frame(ptr::null_mut(), 1, 10.0, 10.0, 0);
        assert!(!lumen_end_frame(ptr::null_mut(), 1));
        assert_eq!(lumen_resize(ptr::null_mut(), 1, 10.0, 10.0, 2.0), 0);
        assert_eq!(
            lumen_start_animation(ptr::null_mut(), 0, 1, 0, 2, 0.0, 0.0, 1.0, 0.0, 100, ptr::null()),
            0
        );
        lumen_session_free(ptr::null_mut());
    }

    #[test]
    fn animation_ids_cross_the_boundary() {
        let handle = Box::into_raw(Box::new(LumenSession {
            session: DisplaySession::with_parts(
                DisplayConfig::default(),
                Box::new(lumen_text::BlockRasterizer::new()),
                Box::new(lumen_animation::ManualClock::new()),
            ),
        }));
        let easing = std::ffi::CString::new("ease-out").unwrap();

        let id = lumen_start_animation(
            handle,
            TARGET_WINDOW,
            1,
            0,
            2,
            0.0,
            0.0,
            1.0,
            0.0,
            100,
            easing.as_ptr(),
        );
        assert_ne!(id, 0);
        assert!(lumen_needs_frames(handle));
        assert!(lumen_cancel_animation(handle, id));
        assert!(!lumen_cancel_animation(handle, id));
        assert!(!lumen_needs_frames(handle));

        assert_eq!(
            lumen_start_animation(handle, 9, 1, 0, 2, 0.0, 0.0, 1.0, 0.0, 100, ptr::null()),
            0
        );
        lumen_session_free(handle);
    }

    #[test]
    fn frames_through_the_c_surface() {
        let handle = lumen_session_new(ptr::null());
        assert!(!handle.is_null());
        assert_eq!(lumen_resize(handle, 7, 200.0, 100.0, 2.0), 2);

        lumen_begin_frame(handle, 7, 200.0, 100.0, 0x00FF_FFFF);
        lumen_add_border(handle, 0.0, 99.0, 200.0, 1.0, 0);
        lumen_add_char(handle, 0xD800, 0.0, 0.0, 8.0, 12.0, 4.0, 0);
        assert!(lumen_end_frame(handle, 7));
        assert!(!lumen_end_frame(handle, 8));

        // SAFETY: handle is live
        let session = unsafe { &(*handle).session };
        let plan = session.last_plan(WindowId(7)).unwrap();
        assert_eq!(plan.physical_size, (400, 200));
        assert_eq!(plan.rect_vertices.len(), 12);
        lumen_session_free(handle);
    }

    fn manual_session() -> (*mut LumenSession, lumen_animation::ManualClock) {
        manual_session_with(DisplayConfig::default())
    }

    fn manual_session_with(
        config: DisplayConfig,
    ) -> (*mut LumenSession, lumen_animation::ManualClock) {
        let clock = lumen_animation::ManualClock::new();
        let handle = Box::into_raw(Box::new(LumenSession {
            session: DisplaySession::with_parts(
                config,
                Box::new(lumen_text::BlockRasterizer::new()),
                Box::new(clock.clone()),
            ),
        }));
        (handle, clock)
    }

    #[test]
    fn window_size_round_trips() {
        let (handle, _) = manual_session();
        assert!(!lumen_window_size(
            handle,
            3,
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
        ));
        assert!(lumen_set_window_size(handle, 3, 320.0, 200.0, 1.5));
        assert!(!lumen_set_window_size(handle, 3, f32::NAN, 200.0, 1.0));
        assert!(!lumen_set_window_size(ptr::null_mut(), 3, 320.0, 200.0, 1.0));

        let (mut w, mut h, mut pw, mut ph, mut scale) = (0.0, 0.0, 0, 0, 0);
        assert!(lumen_window_size(handle, 3, &mut w, &mut h, &mut pw, &mut ph, &mut scale));
        assert_eq!((w, h), (320.0, 200.0));
        assert_eq!(scale, 2);
        assert_eq!((pw, ph), (640, 400));

        // Only the scale pointer
        let mut scale = 0;
        assert!(lumen_window_size(
            handle,
            3,
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            &mut scale,
        ));
        assert_eq!(scale, 2);
        lumen_session_free(handle);
    }

    #[test]
    fn attach_surface_rejects_bad_handles() {
        let (handle, _) = manual_session();
        for platform in [PLATFORM_APPKIT, PLATFORM_WAYLAND, PLATFORM_XCB, PLATFORM_WIN32] {
            assert!(!lumen_attach_surface(handle, 1, platform, ptr::null_mut(), ptr::null_mut()));
        }
        let mut dummy = 0u8;
        let dummy = &mut dummy as *mut u8 as *mut c_void;
        assert!(!lumen_attach_surface(handle, 1, 99, dummy, dummy));
        assert!(!lumen_attach_surface(ptr::null_mut(), 1, PLATFORM_WAYLAND, dummy, dummy));
        // SAFETY: handle is live
        assert!(!unsafe { &(*handle).session }.has_gpu());
        lumen_session_free(handle);
    }

    #[test]
    fn host_pointers_map_to_platform_handles() {
        let mut dummy = 0u8;
        let dummy = &mut dummy as *mut u8 as *mut c_void;

        let (window, display) = host_handles(PLATFORM_WAYLAND, dummy, dummy).unwrap();
        assert!(matches!(window, RawWindowHandle::Wayland(_)));
        assert!(matches!(display, RawDisplayHandle::Wayland(_)));
        assert!(host_handles(PLATFORM_WAYLAND, dummy, ptr::null_mut()).is_none());

        let xid = 0x0040_0007usize as *mut c_void;
        match host_handles(PLATFORM_XLIB, xid, dummy).unwrap().0 {
            RawWindowHandle::Xlib(handle) => assert_eq!(handle.window as usize, 0x0040_0007),
            other => panic!("unexpected handle {:?}", other),
        }
        match host_handles(PLATFORM_XCB, xid, dummy).unwrap().0 {
            RawWindowHandle::Xcb(handle) => assert_eq!(handle.window.get(), 0x0040_0007),
            other => panic!("unexpected handle {:?}", other),
        }
        let (_, display) = host_handles(PLATFORM_APPKIT, dummy, ptr::null_mut()).unwrap();
        assert!(matches!(display, RawDisplayHandle::AppKit(_)));
        assert!(host_handles(PLATFORM_XLIB, ptr::null_mut(), dummy).is_none());
    }

    #[test]
    fn blink_and_effects_through_the_c_surface() {
        let (handle, clock) = manual_session();
        assert_eq!(lumen_next_blink_ms(handle), -1);
        assert_eq!(lumen_next_blink_ms(ptr::null_mut()), -1);

        let railgun = std::ffi::CString::new("railgun").unwrap();
        lumen_set_cursor_effect(handle, railgun.as_ptr());
        for x in [0.0, 64.0] {
            lumen_begin_frame(handle, 1, 200.0, 100.0, 0);
            lumen_add_cursor(handle, x, 0.0, 8.0, 16.0, 0, 0, true);
            assert!(lumen_end_frame(handle, 1));
        }
        assert_eq!(lumen_next_blink_ms(handle), 530);
        clock.advance(Duration::from_millis(30));
        assert_eq!(lumen_next_blink_ms(handle), 500);

        // SAFETY: handle is live
        let session = unsafe { &(*handle).session };
        assert!(session.animations().cursor_effects(WindowId(1)).is_some());
        assert!(lumen_needs_frames(handle));

        lumen_set_cursor_effect(handle, ptr::null());
        // SAFETY: handle is live
        let session = unsafe { &(*handle).session };
        assert!(session.animations().cursor_effects(WindowId(1)).is_none());
        lumen_session_free(handle);
    }

    #[test]
    fn content_hash_through_the_c_surface() {
        let (handle, _) = manual_session();
        assert!(!lumen_set_content_hash(handle, 1, 5));
        // Auto transitions are off by default
        assert!(!lumen_set_content_hash(handle, 1, 6));
        lumen_session_free(handle);

        let mut config = DisplayConfig::default();
        config.animation.auto_transition = true;
        let (handle, _) = manual_session_with(config);
        assert!(!lumen_set_content_hash(handle, 1, 5));
        assert!(lumen_set_content_hash(handle, 1, 7));
        assert!(!lumen_set_content_hash(ptr::null_mut(), 1, 8));
        lumen_session_free(handle);
    }
}
