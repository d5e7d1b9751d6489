//! Lumen Animation Engine
//!
//! Time-based property animation for the compositor:
//!
//! - **Property animations**: eased interpolation of position, size,
//!   opacity, scale and rotation of named targets, sampled once per frame
//! - **Property store**: the target-id to value indirection the renderer
//!   reads; animations never hold references into the scene
//! - **Cursor blink** and **smooth scroll** helpers
//! - **Buffer transitions**: fade, slide, push, scale-fade, page-flip and
//!   blur composites between two captured snapshots
//! - **Cursor effects**: particles, rings and trails left by cursor jumps
//!
//! # Example
//!
//! ```rust
//! use std::time::{Duration, Instant};
//! use lumen_animation::{
//!     AnimatedProperty, AnimationEngine, AnimationTarget, AnimationValue, Easing,
//! };
//! use lumen_core::WindowId;
//!
//! let mut engine = AnimationEngine::new();
//! let start = Instant::now();
//! let target = AnimationTarget::Window(WindowId(1));
//!
//! engine.start_animation_at(
//!     target,
//!     AnimatedProperty::Opacity,
//!     AnimationValue::Scalar(0.0),
//!     AnimationValue::Scalar(1.0),
//!     Duration::from_millis(100),
//!     Easing::Linear,
//!     start,
//! );
//!
//! engine.tick(start + Duration::from_millis(50));
//! assert_eq!(engine.store().opacity(target), 0.5);
//! ```

pub mod blink;
pub mod clock;
pub mod cursor_effect;
pub mod easing;
pub mod engine;
pub mod store;
pub mod target;
pub mod transition;
pub mod value;

pub use blink::{CursorBlink, DEFAULT_BLINK_INTERVAL};
pub use clock::{FrameClock, ManualClock, SystemClock};
pub use cursor_effect::{
    CursorAnimationMode, CursorEffects, EffectSettings, Particle, Ring, TrailPoint,
};
pub use easing::Easing;
pub use engine::{Animation, AnimationEngine, AnimationId, TickReport};
pub use store::PropertyStore;
pub use target::{AnimatedProperty, AnimationTarget};
pub use transition::{
    compute_layers, BufferTransition, ContentWatch, LayerSource, SlideDirection, TransitionKind,
    TransitionLayer, TransitionLayers, TransitionPhase, DEFAULT_TRANSITION_DURATION,
    MAX_BLUR_RADIUS,
};
pub use value::AnimationValue;
