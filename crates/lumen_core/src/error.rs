//! Session-level error type
//!
//! Submission calls never return these; they log and drop invalid input.
//! Only conditions that end the session (surface or device loss) and
//! construction failures surface as [`DisplayError`].

use thiserror::Error;

use crate::ids::WindowId;

/// Fatal display errors
#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("initialization failed: {0}")]
    InitFailed(String),

    #[error("GPU device error: {0}")]
    Device(String),

    #[error("surface for {window} lost after {failures} consecutive acquire failures")]
    SurfaceLost { window: WindowId, failures: u32 },

    #[error("unknown window {0}")]
    UnknownWindow(WindowId),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type DisplayResult<T> = std::result::Result<T, DisplayError>;
