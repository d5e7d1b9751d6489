//! Buffer-switch transitions
//!
//! A transition composites two snapshots of a window: `From` (captured when
//! the transition was armed) and `To` (the current frame). Progress comes
//! from an engine animation on `(Window, Progress)`. Layer geometry is
//! computed here on the CPU as projected quads; the GPU only samples.

use std::f32::consts::PI;
use std::time::Duration;

use smallvec::{smallvec, SmallVec};

use crate::easing::Easing;
use crate::engine::AnimationId;

/// Default transition length
pub const DEFAULT_TRANSITION_DURATION: Duration = Duration::from_millis(200);

/// Scale the outgoing content shrinks to in [`TransitionKind::ScaleFade`]
const SCALE_FADE_MIN: f32 = 0.9;

/// Vertical growth of the turning page's outer edge at 90 degrees, as a
/// fraction of the page height (perspective cue)
const PAGE_FLIP_PERSPECTIVE: f32 = 0.06;

/// Maximum darkening of the turning page
const PAGE_FLIP_SHADE: f32 = 0.5;

/// Blur radius of a fully blurred snapshot, logical pixels
pub const MAX_BLUR_RADIUS: f32 = 15.0;

/// Direction content moves for slide and push transitions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SlideDirection {
    /// Old content leaves to the left, new enters from the right
    #[default]
    Left,
    Right,
    Up,
    Down,
}

impl SlideDirection {
    /// Unit vector the content travels along
    fn unit(self) -> [f32; 2] {
        match self {
            SlideDirection::Left => [-1.0, 0.0],
            SlideDirection::Right => [1.0, 0.0],
            SlideDirection::Up => [0.0, -1.0],
            SlideDirection::Down => [0.0, 1.0],
        }
    }
}

/// How the two snapshots are composited
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    /// Switch instantly; arming one cancels whatever is running
    None,
    /// Crossfade
    #[default]
    Fade,
    /// Both pages move together
    Slide(SlideDirection),
    /// New page slides over a stationary old page
    Push(SlideDirection),
    /// Old page shrinks and fades while the new one grows in
    ScaleFade,
    /// Each half rotates about the vertical spine like a turning page
    PageFlip,
    /// Old page blurs out while the new one sharpens in over it
    Blur,
}

impl TransitionKind {
    /// Parse a host transition name
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => TransitionKind::None,
            "fade" | "crossfade" => TransitionKind::Fade,
            "slide" | "slide-left" => TransitionKind::Slide(SlideDirection::Left),
            "slide-right" => TransitionKind::Slide(SlideDirection::Right),
            "slide-up" => TransitionKind::Slide(SlideDirection::Up),
            "slide-down" => TransitionKind::Slide(SlideDirection::Down),
            "push" | "stack" | "push-left" => TransitionKind::Push(SlideDirection::Left),
            "push-right" => TransitionKind::Push(SlideDirection::Right),
            "push-up" => TransitionKind::Push(SlideDirection::Up),
            "push-down" => TransitionKind::Push(SlideDirection::Down),
            "scale" | "scale-fade" => TransitionKind::ScaleFade,
            "page-flip" | "page-curl" | "flip" => TransitionKind::PageFlip,
            "blur" => TransitionKind::Blur,
            _ => return None,
        };
        Some(kind)
    }
}

/// Transition lifecycle: Idle -> Armed -> Animating -> Idle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransitionPhase {
    #[default]
    Idle,
    /// `From` snapshot captured, waiting for the next frame to start
    Armed,
    Animating,
}

/// Which snapshot a layer samples
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerSource {
    From,
    To,
}

/// One textured quad of a transition composite.
///
/// Corners are logical pixels in window space, ordered top-left, top-right,
/// bottom-right, bottom-left. `uv` uses the same order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransitionLayer {
    pub source: LayerSource,
    pub corners: [[f32; 2]; 4],
    pub uv: [[f32; 2]; 4],
    pub opacity: f32,
    /// Darkening applied to the sampled color, 0 = none
    pub shade: f32,
    /// Gaussian blur radius in logical pixels, 0 = sharp
    pub blur: f32,
}

impl TransitionLayer {
    fn rect(source: LayerSource, x: f32, y: f32, w: f32, h: f32, opacity: f32) -> Self {
        Self {
            source,
            corners: [[x, y], [x + w, y], [x + w, y + h], [x, y + h]],
            uv: [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            opacity,
            shade: 0.0,
            blur: 0.0,
        }
    }

    /// The full window, unmodified
    fn full(source: LayerSource, width: f32, height: f32) -> Self {
        Self::rect(source, 0.0, 0.0, width, height, 1.0)
    }

    /// Horizontal half of the page; `right` selects the right half
    fn half(source: LayerSource, right: bool, width: f32, height: f32) -> Self {
        let half = width / 2.0;
        let x = if right { half } else { 0.0 };
        let (u0, u1) = if right { (0.5, 1.0) } else { (0.0, 0.5) };
        Self {
            source,
            corners: [[x, 0.0], [x + half, 0.0], [x + half, height], [x, height]],
            uv: [[u0, 0.0], [u1, 0.0], [u1, 1.0], [u0, 1.0]],
            opacity: 1.0,
            shade: 0.0,
            blur: 0.0,
        }
    }

    /// Projected width of the layer's top edge
    pub fn top_width(&self) -> f32 {
        (self.corners[1][0] - self.corners[0][0]).abs()
    }

    fn has_area(&self) -> bool {
        self.top_width() > 1e-3 && self.opacity > 0.0
    }
}

/// Layers in paint order
pub type TransitionLayers = SmallVec<[TransitionLayer; 4]>;

/// A buffer-switch transition of one window
#[derive(Clone, Debug, PartialEq)]
pub struct BufferTransition {
    pub kind: TransitionKind,
    pub duration: Duration,
    pub easing: Easing,
    phase: TransitionPhase,
    animation: Option<AnimationId>,
}

impl BufferTransition {
    pub fn new(kind: TransitionKind, duration: Duration, easing: Easing) -> Self {
        Self {
            kind,
            duration,
            easing,
            phase: TransitionPhase::Idle,
            animation: None,
        }
    }

    pub fn phase(&self) -> TransitionPhase {
        self.phase
    }

    pub fn animation(&self) -> Option<AnimationId> {
        self.animation
    }

    pub(crate) fn arm(&mut self) {
        self.phase = TransitionPhase::Armed;
        self.animation = None;
    }

    pub(crate) fn begin(&mut self, animation: AnimationId) {
        self.phase = TransitionPhase::Animating;
        self.animation = Some(animation);
    }

    pub(crate) fn finish(&mut self) {
        self.phase = TransitionPhase::Idle;
        self.animation = None;
    }

    /// Composite layers at `progress` for a window of the given logical size
    pub fn layers(&self, progress: f32, width: f32, height: f32) -> TransitionLayers {
        compute_layers(self.kind, progress, width, height)
    }
}

/// Notices when a window starts showing different content, from a hash the
/// host computes (buffer identity, for instance). Zero means "unknown".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContentWatch {
    last: u64,
}

impl ContentWatch {
    /// Record `hash`. True when it replaces a different, known hash.
    pub fn update(&mut self, hash: u64) -> bool {
        let changed = self.last != 0 && hash != self.last;
        self.last = hash;
        changed
    }

    pub fn last(&self) -> u64 {
        self.last
    }
}

/// Layers for `kind` at `progress`.
///
/// Progress 0 yields only the `From` snapshot and progress 1 only `To`.
pub fn compute_layers(kind: TransitionKind, progress: f32, width: f32, height: f32) -> TransitionLayers {
    let p = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) };
    if p <= 0.0 {
        return smallvec![TransitionLayer::full(LayerSource::From, width, height)];
    }
    if p >= 1.0 {
        return smallvec![TransitionLayer::full(LayerSource::To, width, height)];
    }

    let mut layers: TransitionLayers = match kind {
        TransitionKind::None => smallvec![TransitionLayer::full(LayerSource::To, width, height)],
        TransitionKind::Fade => smallvec![
            TransitionLayer::full(LayerSource::From, width, height),
            TransitionLayer::rect(LayerSource::To, 0.0, 0.0, width, height, p),
        ],
        TransitionKind::Slide(direction) => {
            let [dx, dy] = direction.unit();
            let (old_x, old_y) = (dx * p * width, dy * p * height);
            let (new_x, new_y) = (-dx * (1.0 - p) * width, -dy * (1.0 - p) * height);
            smallvec![
                TransitionLayer::rect(LayerSource::From, old_x, old_y, width, height, 1.0),
                TransitionLayer::rect(LayerSource::To, new_x, new_y, width, height, 1.0),
            ]
        }
        TransitionKind::Push(direction) => {
            let [dx, dy] = direction.unit();
            let (new_x, new_y) = (-dx * (1.0 - p) * width, -dy * (1.0 - p) * height);
            let mut from = TransitionLayer::full(LayerSource::From, width, height);
            from.shade = p * 0.3;
            smallvec![
                from,
                TransitionLayer::rect(LayerSource::To, new_x, new_y, width, height, 1.0),
            ]
        }
        TransitionKind::ScaleFade => {
            let old_scale = 1.0 - p * (1.0 - SCALE_FADE_MIN);
            let new_scale = SCALE_FADE_MIN + p * (1.0 - SCALE_FADE_MIN);
            smallvec![
                centered(LayerSource::From, old_scale, 1.0 - p, width, height),
                centered(LayerSource::To, new_scale, p, width, height),
            ]
        }
        TransitionKind::PageFlip => page_flip(p, width, height),
        TransitionKind::Blur => {
            let mut from = TransitionLayer::full(LayerSource::From, width, height);
            from.blur = p * MAX_BLUR_RADIUS;
            let mut to = TransitionLayer::rect(LayerSource::To, 0.0, 0.0, width, height, p);
            to.blur = (1.0 - p) * MAX_BLUR_RADIUS;
            smallvec![from, to]
        }
    };
    layers.retain(|l| l.has_area());
    layers
}

fn centered(source: LayerSource, scale: f32, opacity: f32, width: f32, height: f32) -> TransitionLayer {
    let w = width * scale;
    let h = height * scale;
    TransitionLayer::rect(source, (width - w) / 2.0, (height - h) / 2.0, w, h, opacity)
}

/// First half: the old right half folds onto the spine, uncovering the new
/// right half. Second half: the new left half unfolds from the spine over
/// the old left half.
fn page_flip(p: f32, width: f32, height: f32) -> TransitionLayers {
    let spine = width / 2.0;
    let (turning_source, turning_right, angle) = if p < 0.5 {
        (LayerSource::From, true, p * PI)
    } else {
        (LayerSource::To, false, (1.0 - p) * PI)
    };

    let reach = spine * angle.cos();
    let lift = height * PAGE_FLIP_PERSPECTIVE * angle.sin();
    let mut turning = TransitionLayer::half(turning_source, turning_right, width, height);
    turning.corners = if turning_right {
        [
            [spine, 0.0],
            [spine + reach, -lift],
            [spine + reach, height + lift],
            [spine, height],
        ]
    } else {
        [
            [spine - reach, -lift],
            [spine, 0.0],
            [spine, height],
            [spine - reach, height + lift],
        ]
    };
    turning.shade = angle.sin() * PAGE_FLIP_SHADE;

    smallvec![
        TransitionLayer::half(LayerSource::From, false, width, height),
        TransitionLayer::half(LayerSource::To, true, width, height),
        turning,
    ]
}
