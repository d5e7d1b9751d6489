//! Lumen display session
//!
//! The entry point hosts talk to. A [`DisplaySession`] accepts per-frame
//! primitives for each window, resolves faces and glyphs, runs animations,
//! imports external view frames and hands the resulting plan to the GPU
//! renderer.
//!
//! # Example
//!
//! ```rust
//! use lumen_animation::ManualClock;
//! use lumen_core::{Color, FaceId, WindowId};
//! use lumen_display::{DisplayConfig, DisplaySession};
//! use lumen_text::BlockRasterizer;
//!
//! let mut session = DisplaySession::with_parts(
//!     DisplayConfig::default(),
//!     Box::new(BlockRasterizer::new()),
//!     Box::new(ManualClock::new()),
//! );
//! let window = WindowId(1);
//!
//! session.begin_frame(window, 800.0, 600.0, Color::WHITE);
//! session.add_char('A', 0.0, 0.0, 8.0, 12.0, 4.0, FaceId(0));
//! let report = session.end_frame(window).unwrap();
//!
//! assert_eq!(report.frame_number, 1);
//! assert_eq!(session.atlas().len(), 1);
//! ```
//!
//! C hosts use the `lumen_*` functions in [`ffi`].

pub mod config;
pub mod ffi;
pub mod logging;
pub mod session;

pub use config::{ConfigError, DisplayConfig};
pub use logging::{init_logging, LOG_ENV};
pub use session::{DisplaySession, FrameReport, WindowInfo};

pub use lumen_core::{DisplayError, DisplayResult};
