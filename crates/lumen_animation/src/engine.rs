//! Animation engine
//!
//! Holds every active animation and samples them once per frame. Sampling is
//! poll-based: the session calls [`AnimationEngine::tick`] right before
//! rendering with the frame timestamp, and the engine writes interpolated
//! values into its [`PropertyStore`].

use std::time::{Duration, Instant};

use lumen_core::{Color, Rect, WindowId};
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};

use crate::blink::{CursorBlink, DEFAULT_BLINK_INTERVAL};
use crate::cursor_effect::{CursorAnimationMode, CursorEffects, EffectSettings};
use crate::easing::Easing;
use crate::store::PropertyStore;
use crate::target::{AnimatedProperty, AnimationTarget};
use crate::transition::{BufferTransition, TransitionKind, TransitionLayers, TransitionPhase};
use crate::value::AnimationValue;

new_key_type! {
    pub struct AnimationId;
}

/// One eased interpolation of a target property
#[derive(Clone, Debug, PartialEq)]
pub struct Animation {
    pub target: AnimationTarget,
    pub property: AnimatedProperty,
    pub from: AnimationValue,
    pub to: AnimationValue,
    pub duration: Duration,
    pub start: Instant,
    pub easing: Easing,
}

impl Animation {
    /// Linear progress at `now`, clamped to `[0, 1]`
    pub fn progress(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.start).as_nanos() as f64;
        let t = elapsed / self.duration.as_nanos() as f64;
        t.clamp(0.0, 1.0) as f32
    }

    /// Interpolated value at `now`; exactly `to` once complete
    pub fn sample(&self, now: Instant) -> AnimationValue {
        let t = self.progress(now);
        if t >= 1.0 {
            return self.to;
        }
        self.from.lerp(&self.to, self.easing.apply(t))
    }
}

/// Summary of one [`AnimationEngine::tick`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Animations still running after the tick
    pub active: usize,
    /// Animations that reached their end this tick and were removed
    pub completed: usize,
}

/// Samples animations and owns the property store, cursor blink state and
/// buffer transitions
pub struct AnimationEngine {
    animations: SlotMap<AnimationId, Animation>,
    store: PropertyStore,
    blinks: FxHashMap<WindowId, CursorBlink>,
    blink_enabled: bool,
    blink_interval: Duration,
    transitions: FxHashMap<WindowId, BufferTransition>,
    cursor_mode: CursorAnimationMode,
    effect_settings: EffectSettings,
    effects: FxHashMap<WindowId, CursorEffects>,
    last_tick: Option<Instant>,
}

impl Default for AnimationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimationEngine {
    pub fn new() -> Self {
        Self {
            animations: SlotMap::with_key(),
            store: PropertyStore::new(),
            blinks: FxHashMap::default(),
            blink_enabled: true,
            blink_interval: DEFAULT_BLINK_INTERVAL,
            transitions: FxHashMap::default(),
            cursor_mode: CursorAnimationMode::default(),
            effect_settings: EffectSettings::default(),
            effects: FxHashMap::default(),
            last_tick: None,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Property animations
    // ─────────────────────────────────────────────────────────────────────────

    /// Start an animation at the current wall-clock time
    pub fn start_animation(
        &mut self,
        target: AnimationTarget,
        property: AnimatedProperty,
        from: AnimationValue,
        to: AnimationValue,
        duration: Duration,
        easing: Easing,
    ) -> AnimationId {
        self.start_animation_at(target, property, from, to, duration, easing, Instant::now())
    }

    /// Start an animation with an explicit start time.
    ///
    /// Any running animation of the same `(target, property)` is replaced. A
    /// zero duration writes `to` immediately; the returned id is already
    /// inactive.
    #[allow(clippy::too_many_arguments)]
    pub fn start_animation_at(
        &mut self,
        target: AnimationTarget,
        property: AnimatedProperty,
        from: AnimationValue,
        to: AnimationValue,
        duration: Duration,
        easing: Easing,
        start: Instant,
    ) -> AnimationId {
        let replaced: Vec<AnimationId> = self
            .animations
            .iter()
            .filter(|(_, a)| a.target == target && a.property == property)
            .map(|(id, _)| id)
            .collect();
        for id in replaced {
            tracing::trace!("replacing animation {:?} on {:?}/{:?}", id, target, property);
            self.animations.remove(id);
        }

        let animation = Animation {
            target,
            property,
            from,
            to,
            duration,
            start,
            easing,
        };

        if duration.is_zero() {
            self.store.set(target, property, to);
            let id = self.animations.insert(animation);
            self.animations.remove(id);
            return id;
        }

        self.store.set(target, property, from);
        self.animations.insert(animation)
    }

    /// Remove an animation. The last sampled value stays in the store.
    pub fn cancel_animation(&mut self, id: AnimationId) -> bool {
        self.animations.remove(id).is_some()
    }

    pub fn animation(&self, id: AnimationId) -> Option<&Animation> {
        self.animations.get(id)
    }

    pub fn is_active(&self, id: AnimationId) -> bool {
        self.animations.contains_key(id)
    }

    /// Linear progress of an active animation at `now`
    pub fn progress(&self, id: AnimationId, now: Instant) -> Option<f32> {
        self.animations.get(id).map(|a| a.progress(now))
    }

    pub fn active_count(&self) -> usize {
        self.animations.len()
    }

    /// True while anything on screen changes without new host input: an
    /// animation, an armed or running transition, live cursor effects or a
    /// blinking cursor.
    ///
    /// A blinking cursor only changes at its toggles; hosts that want to
    /// idle between them can sleep until [`Self::next_blink_toggle`].
    pub fn needs_frames(&self) -> bool {
        !self.animations.is_empty()
            || self
                .transitions
                .values()
                .any(|t| t.phase() != TransitionPhase::Idle)
            || self.effects.values().any(|e| !e.is_empty())
            || self.is_blinking()
    }

    /// Whether any window's cursor is blinking
    pub fn is_blinking(&self) -> bool {
        self.blinks
            .values()
            .any(|b| b.is_enabled() && !b.interval().is_zero())
    }

    /// Earliest instant after `now` at which a blinking cursor flips
    pub fn next_blink_toggle(&self, now: Instant) -> Option<Instant> {
        self.blinks.values().filter_map(|b| b.next_toggle(now)).min()
    }

    /// Sample every animation at `now`.
    ///
    /// Animations reaching `t == 1` write exactly their `to` value and are
    /// removed. Transitions whose progress animation ended return to idle.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let dt = self
            .last_tick
            .map_or(0.0, |last| now.saturating_duration_since(last).as_secs_f32());
        self.last_tick = Some(now);

        for effects in self.effects.values_mut() {
            effects.step(dt, now);
        }
        self.effects.retain(|_, e| !e.is_empty());

        let mut completed = Vec::new();
        for (id, animation) in self.animations.iter() {
            let value = animation.sample(now);
            self.store.set(animation.target, animation.property, value);
            if animation.progress(now) >= 1.0 {
                completed.push(id);
            }
        }
        for id in &completed {
            self.animations.remove(*id);
        }

        let mut finished = Vec::new();
        for (window, transition) in self.transitions.iter_mut() {
            if transition.phase() != TransitionPhase::Animating {
                continue;
            }
            let running = transition
                .animation()
                .is_some_and(|id| self.animations.contains_key(id));
            if !running {
                transition.finish();
                finished.push(*window);
            }
        }
        for window in finished {
            tracing::debug!("{}: buffer transition finished", window);
            self.transitions.remove(&window);
            self.store
                .remove(AnimationTarget::Window(window), AnimatedProperty::Progress);
        }

        TickReport {
            active: self.animations.len(),
            completed: completed.len(),
        }
    }

    /// Timestamp of the most recent tick
    pub fn last_tick(&self) -> Option<Instant> {
        self.last_tick
    }

    pub fn store(&self) -> &PropertyStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut PropertyStore {
        &mut self.store
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scrolling and cursor motion
    // ─────────────────────────────────────────────────────────────────────────

    /// Smooth a scroll the host has already applied.
    ///
    /// The window content is drawn displaced by `delta` and eases back to
    /// rest. A scroll arriving mid-animation continues from the current
    /// displacement.
    pub fn smooth_scroll(
        &mut self,
        window: WindowId,
        delta: [f32; 2],
        duration: Duration,
        now: Instant,
    ) -> AnimationId {
        let target = AnimationTarget::Window(window);
        let current = self.store.offset(target);
        self.start_animation_at(
            target,
            AnimatedProperty::Position,
            AnimationValue::Pair([current[0] + delta[0], current[1] + delta[1]]),
            AnimationValue::Pair([0.0, 0.0]),
            duration,
            Easing::EaseOutCubic,
            now,
        )
    }

    /// Glide the cursor from its previous geometry to the new one.
    ///
    /// `delta` is previous position minus new position, `size_delta`
    /// likewise for the size.
    pub fn glide_cursor(
        &mut self,
        window: WindowId,
        delta: [f32; 2],
        size_delta: [f32; 2],
        duration: Duration,
        now: Instant,
    ) {
        let target = AnimationTarget::Cursor(window);
        let offset = self.store.offset(target);
        let size = self.store.size_delta(target);
        self.start_animation_at(
            target,
            AnimatedProperty::Position,
            AnimationValue::Pair([offset[0] + delta[0], offset[1] + delta[1]]),
            AnimationValue::Pair([0.0, 0.0]),
            duration,
            Easing::EaseOutCubic,
            now,
        );
        self.start_animation_at(
            target,
            AnimatedProperty::Size,
            AnimationValue::Pair([size[0] + size_delta[0], size[1] + size_delta[1]]),
            AnimationValue::Pair([0.0, 0.0]),
            duration,
            Easing::EaseOutCubic,
            now,
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Cursor blink
    // ─────────────────────────────────────────────────────────────────────────

    /// Configure blinking for every window
    pub fn set_cursor_blink(&mut self, enabled: bool, interval: Duration, now: Instant) {
        self.blink_enabled = enabled;
        self.blink_interval = interval;
        for blink in self.blinks.values_mut() {
            blink.configure(enabled, interval, now);
        }
    }

    /// Restart the blink phase of a window's cursor with the cursor shown
    pub fn cursor_moved(&mut self, window: WindowId, now: Instant) {
        let (enabled, interval) = (self.blink_enabled, self.blink_interval);
        self.blinks
            .entry(window)
            .or_insert_with(|| CursorBlink::new(enabled, interval, now))
            .reset(now);
    }

    /// Blink phase of a window's cursor as of the last tick
    pub fn cursor_visible(&self, window: WindowId) -> bool {
        match (self.blinks.get(&window), self.last_tick) {
            (Some(blink), Some(now)) => blink.visible(now),
            _ => true,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Cursor effects
    // ─────────────────────────────────────────────────────────────────────────

    /// Switch the effect mode; live effects of the old mode are dropped
    pub fn set_cursor_mode(&mut self, mode: CursorAnimationMode) {
        if mode != self.cursor_mode {
            self.effects.clear();
        }
        self.cursor_mode = mode;
    }

    pub fn cursor_mode(&self) -> CursorAnimationMode {
        self.cursor_mode
    }

    pub fn set_effect_settings(&mut self, settings: EffectSettings) {
        self.effect_settings = settings;
    }

    pub fn effect_settings(&self) -> &EffectSettings {
        &self.effect_settings
    }

    /// Decorate a cursor jump of `window` from `from` to `to`
    pub fn spawn_cursor_effect(
        &mut self,
        window: WindowId,
        from: Rect,
        to: Rect,
        color: Color,
        now: Instant,
    ) {
        let effects = self.effects.entry(window).or_default();
        effects.spawn(self.cursor_mode, &self.effect_settings, from, to, color, now);
        if effects.is_empty() {
            self.effects.remove(&window);
        }
    }

    /// Live effects of a window, if any
    pub fn cursor_effects(&self, window: WindowId) -> Option<&CursorEffects> {
        self.effects.get(&window)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Buffer transitions
    // ─────────────────────────────────────────────────────────────────────────

    /// Arm a transition; the caller has captured the `From` snapshot.
    ///
    /// An already running transition of the window is cancelled. Arming
    /// [`TransitionKind::None`] only cancels.
    pub fn arm_transition(
        &mut self,
        window: WindowId,
        kind: TransitionKind,
        duration: Duration,
        easing: Easing,
    ) {
        if kind == TransitionKind::None {
            self.cancel_transition(window);
            return;
        }
        if let Some(old) = self.transitions.remove(&window) {
            if let Some(id) = old.animation() {
                self.animations.remove(id);
            }
        }
        let mut transition = BufferTransition::new(kind, duration, easing);
        transition.arm();
        self.store.set(
            AnimationTarget::Window(window),
            AnimatedProperty::Progress,
            AnimationValue::Scalar(0.0),
        );
        self.transitions.insert(window, transition);
    }

    /// Start the progress animation of an armed transition.
    ///
    /// Returns the animation id, or `None` if the window had nothing armed.
    pub fn start_armed_transition(&mut self, window: WindowId, now: Instant) -> Option<AnimationId> {
        let (duration, easing) = match self.transitions.get(&window) {
            Some(t) if t.phase() == TransitionPhase::Armed => (t.duration, t.easing),
            _ => return None,
        };
        let id = self.start_animation_at(
            AnimationTarget::Window(window),
            AnimatedProperty::Progress,
            AnimationValue::Scalar(0.0),
            AnimationValue::Scalar(1.0),
            duration,
            easing,
            now,
        );
        if let Some(t) = self.transitions.get_mut(&window) {
            t.begin(id);
        }
        tracing::debug!("{}: buffer transition started ({:?})", window, duration);
        Some(id)
    }

    pub fn transition(&self, window: WindowId) -> Option<&BufferTransition> {
        self.transitions.get(&window)
    }

    pub fn cancel_transition(&mut self, window: WindowId) -> bool {
        let Some(transition) = self.transitions.remove(&window) else {
            return false;
        };
        if let Some(id) = transition.animation() {
            self.animations.remove(id);
        }
        self.store
            .remove(AnimationTarget::Window(window), AnimatedProperty::Progress);
        true
    }

    /// Composite layers of a running transition at the last sampled progress
    pub fn transition_layers(&self, window: WindowId, width: f32, height: f32) -> Option<TransitionLayers> {
        let transition = self.transitions.get(&window)?;
        if transition.phase() != TransitionPhase::Animating {
            return None;
        }
        let progress = self.store.progress(window).unwrap_or(0.0);
        Some(transition.layers(progress, width, height))
    }

    /// Forget everything belonging to a window
    pub fn clear_window(&mut self, window: WindowId) {
        self.animations
            .retain(|_, a| a.target.window() != Some(window));
        self.transitions.remove(&window);
        self.blinks.remove(&window);
        self.effects.remove(&window);
        self.store.clear_window(window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::ViewId;

    fn scalar(v: f32) -> AnimationValue {
        AnimationValue::Scalar(v)
    }

    fn fade(engine: &mut AnimationEngine, start: Instant, ms: u64) -> AnimationId {
        engine.start_animation_at(
            AnimationTarget::ExternalView(ViewId(1)),
            AnimatedProperty::Opacity,
            scalar(0.0),
            scalar(1.0),
            Duration::from_millis(ms),
            Easing::Linear,
            start,
        )
    }

    #[test]
    fn samples_interpolated_value() {
        let mut engine = AnimationEngine::new();
        let t0 = Instant::now();
        fade(&mut engine, t0, 200);
        engine.tick(t0 + Duration::from_millis(50));
        let target = AnimationTarget::ExternalView(ViewId(1));
        assert!((engine.store().opacity(target) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn progress_stays_in_unit_range() {
        let mut engine = AnimationEngine::new();
        let t0 = Instant::now() + Duration::from_secs(1);
        let id = fade(&mut engine, t0, 100);
        assert_eq!(engine.progress(id, t0 - Duration::from_millis(500)), Some(0.0));
        assert_eq!(engine.progress(id, t0 + Duration::from_millis(40)), Some(0.4));
        assert_eq!(engine.progress(id, t0 + Duration::from_secs(9)), Some(1.0));
    }

    #[test]
    fn completion_writes_exact_target_and_removes() {
        let mut engine = AnimationEngine::new();
        let t0 = Instant::now();
        let target = AnimationTarget::Cursor(WindowId(1));
        let id = engine.start_animation_at(
            target,
            AnimatedProperty::Position,
            AnimationValue::Pair([13.0, -7.0]),
            AnimationValue::Pair([0.1, 0.2]),
            Duration::from_millis(100),
            Easing::EaseOutBack,
            t0,
        );
        let report = engine.tick(t0 + Duration::from_millis(100));
        assert_eq!(report, TickReport { active: 0, completed: 1 });
        assert!(!engine.is_active(id));
        assert_eq!(engine.store().offset(target), [0.1, 0.2]);
    }

    #[test]
    fn zero_duration_snaps_to_target() {
        let mut engine = AnimationEngine::new();
        let t0 = Instant::now();
        let id = fade(&mut engine, t0, 0);
        assert!(!engine.is_active(id));
        assert_eq!(engine.active_count(), 0);
        let target = AnimationTarget::ExternalView(ViewId(1));
        assert_eq!(engine.store().opacity(target), 1.0);
        assert_eq!(
            engine.store().get(target, AnimatedProperty::Opacity),
            Some(scalar(1.0))
        );
    }

    #[test]
    fn cancel_keeps_last_sampled_value() {
        let mut engine = AnimationEngine::new();
        let t0 = Instant::now();
        let id = fade(&mut engine, t0, 100);
        engine.tick(t0 + Duration::from_millis(30));
        assert!(engine.cancel_animation(id));
        assert!(!engine.cancel_animation(id));
        engine.tick(t0 + Duration::from_millis(90));
        let target = AnimationTarget::ExternalView(ViewId(1));
        assert!((engine.store().opacity(target) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn new_animation_replaces_same_property() {
        let mut engine = AnimationEngine::new();
        let t0 = Instant::now();
        let first = fade(&mut engine, t0, 100);
        let second = fade(&mut engine, t0, 300);
        assert!(!engine.is_active(first));
        assert!(engine.is_active(second));
        assert_eq!(engine.active_count(), 1);
    }

    #[test]
    fn smooth_scroll_eases_back_to_rest() {
        let mut engine = AnimationEngine::new();
        let t0 = Instant::now();
        let window = WindowId(1);
        engine.smooth_scroll(window, [0.0, 40.0], Duration::from_millis(100), t0);
        let target = AnimationTarget::Window(window);
        assert_eq!(engine.store().offset(target), [0.0, 40.0]);

        engine.tick(t0 + Duration::from_millis(50));
        let mid = engine.store().offset(target)[1];
        assert!(mid > 0.0 && mid < 40.0);

        engine.tick(t0 + Duration::from_millis(100));
        assert_eq!(engine.store().offset(target), [0.0, 0.0]);
    }

    #[test]
    fn blink_follows_last_tick() {
        let mut engine = AnimationEngine::new();
        let t0 = Instant::now();
        let window = WindowId(3);
        engine.set_cursor_blink(true, Duration::from_millis(500), t0);
        engine.cursor_moved(window, t0);
        engine.tick(t0 + Duration::from_millis(100));
        assert!(engine.cursor_visible(window));
        engine.tick(t0 + Duration::from_millis(600));
        assert!(!engine.cursor_visible(window));
        engine.cursor_moved(window, t0 + Duration::from_millis(600));
        assert!(engine.cursor_visible(window));
    }

    #[test]
    fn transition_lifecycle() {
        let mut engine = AnimationEngine::new();
        let t0 = Instant::now();
        let window = WindowId(1);

        assert!(engine.start_armed_transition(window, t0).is_none());
        engine.arm_transition(
            window,
            TransitionKind::Fade,
            Duration::from_millis(200),
            Easing::Linear,
        );
        assert_eq!(
            engine.transition(window).map(|t| t.phase()),
            Some(TransitionPhase::Armed)
        );
        assert!(engine.transition_layers(window, 100.0, 100.0).is_none());

        engine.start_armed_transition(window, t0);
        engine.tick(t0 + Duration::from_millis(100));
        let layers = engine.transition_layers(window, 100.0, 100.0);
        assert_eq!(layers.map(|l| l.len()), Some(2));
        assert!(engine.needs_frames());

        engine.tick(t0 + Duration::from_millis(200));
        assert!(engine.transition(window).is_none());
        assert_eq!(engine.store().progress(window), None);
        assert!(!engine.needs_frames());
    }

    #[test]
    fn blinking_cursor_needs_frames() {
        let mut engine = AnimationEngine::new();
        let t0 = Instant::now();
        let window = WindowId(2);
        engine.set_cursor_blink(true, Duration::from_millis(500), t0);
        assert!(!engine.needs_frames());
        assert_eq!(engine.next_blink_toggle(t0), None);

        engine.cursor_moved(window, t0);
        engine.tick(t0);
        assert!(engine.needs_frames());
        assert_eq!(
            engine.next_blink_toggle(t0 + Duration::from_millis(700)),
            Some(t0 + Duration::from_millis(1000))
        );

        engine.set_cursor_blink(false, Duration::from_millis(500), t0);
        assert!(!engine.needs_frames());
        assert_eq!(engine.next_blink_toggle(t0), None);
    }

    #[test]
    fn cursor_effects_live_until_expired() {
        let mut engine = AnimationEngine::new();
        let t0 = Instant::now();
        let window = WindowId(4);
        engine.set_cursor_mode(CursorAnimationMode::Sonicboom);
        engine.tick(t0);
        engine.spawn_cursor_effect(
            window,
            Rect::new(0.0, 0.0, 8.0, 16.0),
            Rect::new(64.0, 0.0, 8.0, 16.0),
            Color::BLACK,
            t0,
        );
        assert_eq!(engine.cursor_effects(window).map(|e| e.rings().len()), Some(1));
        assert!(engine.needs_frames());

        engine.tick(t0 + Duration::from_millis(100));
        let radius = engine.cursor_effects(window).map(|e| e.rings()[0].radius);
        assert!(radius.is_some_and(|r| r > 5.0));

        engine.tick(t0 + Duration::from_millis(400));
        assert!(engine.cursor_effects(window).is_none());
        assert!(!engine.needs_frames());
    }

    #[test]
    fn arming_none_cancels_running_transition() {
        let mut engine = AnimationEngine::new();
        let t0 = Instant::now();
        let window = WindowId(6);
        engine.arm_transition(window, TransitionKind::Fade, Duration::from_millis(200), Easing::Linear);
        engine.start_armed_transition(window, t0);
        engine.arm_transition(window, TransitionKind::None, Duration::from_millis(200), Easing::Linear);
        assert!(engine.transition(window).is_none());
        assert!(engine.start_armed_transition(window, t0).is_none());
        assert!(!engine.needs_frames());
    }

    #[test]
    fn clear_window_drops_its_state() {
        let mut engine = AnimationEngine::new();
        let t0 = Instant::now();
        let window = WindowId(5);
        engine.smooth_scroll(window, [0.0, 10.0], Duration::from_millis(100), t0);
        fade(&mut engine, t0, 100);
        engine.clear_window(window);
        assert_eq!(engine.active_count(), 1);
        assert_eq!(engine.store().offset(AnimationTarget::Window(window)), [0.0, 0.0]);
    }
}
