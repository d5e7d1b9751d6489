//! Cursor motion effects
//!
//! When the cursor jumps, a window can spawn short-lived decorations along
//! the jump: particles, expanding rings or a fading trail. The engine owns
//! one [`CursorEffects`] per window, advances it on every tick and drops
//! what has expired; the planner draws whatever is still alive. Everything
//! is in logical pixels and driven by the frame timestamp, so effects are
//! deterministic for a given clock.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use lumen_core::{Color, Rect};

/// Velocity kept per second of particle flight
const PARTICLE_DRAG: f32 = 0.95;
/// Jumps shorter than this spawn nothing
const MIN_JUMP: f32 = 1.0;
const TRAIL_LIFETIME: Duration = Duration::from_millis(200);
/// Spacing of trail points along a jump
const TRAIL_SPACING: f32 = 8.0;
const GOLDEN_ANGLE: f32 = 2.39996;

/// What the cursor leaves behind when it moves
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CursorAnimationMode {
    /// Plain jump
    None,
    /// Glide only, no decorations
    #[default]
    Smooth,
    /// Particles fired backwards along the jump
    Railgun,
    /// Fading trail from the old position to the new one
    Torpedo,
    /// Particles scattered in every direction
    Pixiedust,
    /// One expanding ring at the destination
    Sonicboom,
    /// Three concentric rings at the destination
    Ripple,
    /// Cursor drawn as an outline
    Wireframe,
}

impl CursorAnimationMode {
    /// Parse a mode name, case-insensitive. Unknown names glide.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "none" => Self::None,
            "railgun" => Self::Railgun,
            "torpedo" => Self::Torpedo,
            "pixiedust" => Self::Pixiedust,
            "sonicboom" => Self::Sonicboom,
            "ripple" => Self::Ripple,
            "wireframe" => Self::Wireframe,
            _ => Self::Smooth,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Smooth => "smooth",
            Self::Railgun => "railgun",
            Self::Torpedo => "torpedo",
            Self::Pixiedust => "pixiedust",
            Self::Sonicboom => "sonicboom",
            Self::Ripple => "ripple",
            Self::Wireframe => "wireframe",
        }
    }
}

/// Tuning shared by every window
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectSettings {
    pub particle_count: u32,
    /// Logical pixels per second
    pub particle_speed: f32,
    pub particle_size: f32,
    pub particle_lifetime: Duration,
    pub max_trail: usize,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            particle_count: 15,
            particle_speed: 200.0,
            particle_size: 4.0,
            particle_lifetime: Duration::from_millis(400),
            max_trail: 40,
        }
    }
}

impl EffectSettings {
    /// Clamp the particle count to `1..=100`
    pub fn with_particle_count(mut self, count: u32) -> Self {
        self.particle_count = count.clamp(1, 100);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub color: Color,
    pub size: f32,
    pub born: Instant,
    pub lifetime: Duration,
}

impl Particle {
    pub fn is_alive(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.born) < self.lifetime
    }

    /// 0 at birth, 1 once expired
    pub fn age(&self, now: Instant) -> f32 {
        age_fraction(self.born, self.lifetime, now)
    }

    pub fn step(&mut self, dt: f32) {
        self.x += self.vx * dt;
        self.y += self.vy * dt;
        let drag = PARTICLE_DRAG.powf(dt * 60.0);
        self.vx *= drag;
        self.vy *= drag;
    }

    pub fn opacity(&self, now: Instant) -> f32 {
        (1.0 - self.age(now)).powi(2)
    }

    /// Shrinks to 30% of the spawn size
    pub fn current_size(&self, now: Instant) -> f32 {
        self.size * (1.0 - self.age(now) * 0.7)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ring {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    /// Logical pixels per second
    pub speed: f32,
    pub thickness: f32,
    pub color: Color,
    pub born: Instant,
    pub lifetime: Duration,
}

impl Ring {
    pub fn is_alive(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.born) < self.lifetime
    }

    pub fn step(&mut self, dt: f32) {
        self.radius += self.speed * dt;
    }

    pub fn opacity(&self, now: Instant) -> f32 {
        (1.0 - age_fraction(self.born, self.lifetime, now)).powi(2)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrailPoint {
    pub x: f32,
    pub y: f32,
    pub color: Color,
    pub born: Instant,
}

impl TrailPoint {
    pub fn opacity(&self, now: Instant) -> f32 {
        1.0 - age_fraction(self.born, TRAIL_LIFETIME, now)
    }
}

fn age_fraction(born: Instant, lifetime: Duration, now: Instant) -> f32 {
    if lifetime.is_zero() {
        return 1.0;
    }
    let age = now.saturating_duration_since(born).as_secs_f32();
    (age / lifetime.as_secs_f32()).min(1.0)
}

/// Live decorations of one window's cursor
#[derive(Clone, Debug, Default)]
pub struct CursorEffects {
    particles: Vec<Particle>,
    rings: Vec<Ring>,
    trail: VecDeque<TrailPoint>,
}

impl CursorEffects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the decorations of `mode` for a jump from `from` to `to`
    pub fn spawn(
        &mut self,
        mode: CursorAnimationMode,
        settings: &EffectSettings,
        from: Rect,
        to: Rect,
        color: Color,
        now: Instant,
    ) {
        let start = from.center();
        let end = to.center();
        let (dx, dy) = (end.x - start.x, end.y - start.y);
        let distance = (dx * dx + dy * dy).sqrt();
        if distance < MIN_JUMP {
            return;
        }

        match mode {
            CursorAnimationMode::None
            | CursorAnimationMode::Smooth
            | CursorAnimationMode::Wireframe => {}
            CursorAnimationMode::Railgun => {
                let back = [-dx / distance, -dy / distance];
                let n = settings.particle_count.max(1);
                for i in 0..n {
                    let spread = (i as f32 / n as f32 - 0.5) * 0.8;
                    let (sin, cos) = spread.sin_cos();
                    let jitter = 0.5 + (i as f32 * 7.13).sin().abs() * 0.5;
                    let speed = settings.particle_speed * jitter;
                    self.particles.push(Particle {
                        x: end.x,
                        y: end.y,
                        vx: (back[0] * cos - back[1] * sin) * speed,
                        vy: (back[0] * sin + back[1] * cos) * speed,
                        color,
                        size: settings.particle_size * jitter,
                        born: now,
                        lifetime: settings.particle_lifetime.mul_f32(jitter),
                    });
                }
            }
            CursorAnimationMode::Pixiedust => {
                for i in 0..settings.particle_count.max(1) {
                    let angle = (i as f32 * GOLDEN_ANGLE) % std::f32::consts::TAU;
                    let speed = settings.particle_speed
                        * (0.3 + (i as f32 * std::f32::consts::PI).sin().abs() * 0.7);
                    self.particles.push(Particle {
                        x: end.x,
                        y: end.y,
                        vx: angle.cos() * speed,
                        vy: angle.sin() * speed,
                        color: color.fade(0.8),
                        size: settings.particle_size * 0.7,
                        born: now,
                        lifetime: settings.particle_lifetime,
                    });
                }
            }
            CursorAnimationMode::Torpedo => {
                let steps = ((distance / TRAIL_SPACING).ceil() as usize).clamp(1, settings.max_trail);
                for i in 0..steps {
                    let t = i as f32 / steps as f32;
                    self.trail.push_back(TrailPoint {
                        x: start.x + dx * t,
                        y: start.y + dy * t,
                        color,
                        born: now,
                    });
                }
                while self.trail.len() > settings.max_trail {
                    self.trail.pop_front();
                }
            }
            CursorAnimationMode::Sonicboom => {
                self.rings.push(Ring {
                    x: end.x,
                    y: end.y,
                    radius: 5.0,
                    speed: 300.0,
                    thickness: 3.0,
                    color,
                    born: now,
                    lifetime: Duration::from_millis(300),
                });
            }
            CursorAnimationMode::Ripple => {
                for i in 0..3u32 {
                    self.rings.push(Ring {
                        x: end.x,
                        y: end.y,
                        radius: 2.0 + i as f32 * 8.0,
                        speed: 150.0 - i as f32 * 20.0,
                        thickness: 2.0,
                        color,
                        born: now,
                        lifetime: Duration::from_millis(400 + u64::from(i) * 50),
                    });
                }
            }
        }
    }

    /// Advance by `dt` seconds and drop expired decorations
    pub fn step(&mut self, dt: f32, now: Instant) {
        for particle in &mut self.particles {
            particle.step(dt);
        }
        self.particles.retain(|p| p.is_alive(now));
        for ring in &mut self.rings {
            ring.step(dt);
        }
        self.rings.retain(|r| r.is_alive(now));
        self.trail
            .retain(|p| now.saturating_duration_since(p.born) < TRAIL_LIFETIME);
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty() && self.rings.is_empty() && self.trail.is_empty()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
        self.rings.clear();
        self.trail.clear();
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }

    pub fn trail(&self) -> &VecDeque<TrailPoint> {
        &self.trail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jump(effects: &mut CursorEffects, mode: CursorAnimationMode, now: Instant) {
        effects.spawn(
            mode,
            &EffectSettings::default(),
            Rect::new(0.0, 0.0, 8.0, 16.0),
            Rect::new(80.0, 32.0, 8.0, 16.0),
            Color::WHITE,
            now,
        );
    }

    #[test]
    fn mode_names() {
        assert_eq!(CursorAnimationMode::from_name("RAILGUN"), CursorAnimationMode::Railgun);
        assert_eq!(CursorAnimationMode::from_name("ripple"), CursorAnimationMode::Ripple);
        assert_eq!(CursorAnimationMode::from_name("bogus"), CursorAnimationMode::Smooth);
        assert_eq!(CursorAnimationMode::default(), CursorAnimationMode::Smooth);
        for mode in [
            CursorAnimationMode::None,
            CursorAnimationMode::Torpedo,
            CursorAnimationMode::Pixiedust,
            CursorAnimationMode::Sonicboom,
            CursorAnimationMode::Wireframe,
        ] {
            assert_eq!(CursorAnimationMode::from_name(mode.name()), mode);
        }
    }

    #[test]
    fn railgun_fires_away_from_the_jump() {
        let mut effects = CursorEffects::new();
        let t0 = Instant::now();
        jump(&mut effects, CursorAnimationMode::Railgun, t0);

        assert_eq!(effects.particles().len(), 15);
        // The jump went right and down, so the spray goes left
        assert!(effects.particles().iter().all(|p| p.vx < 0.0));
        let first = effects.particles()[0];
        assert_eq!((first.x, first.y), (84.0, 40.0));
    }

    #[test]
    fn particles_move_fade_and_expire() {
        let mut effects = CursorEffects::new();
        let t0 = Instant::now();
        jump(&mut effects, CursorAnimationMode::Pixiedust, t0);
        let before = effects.particles()[1];

        let mid = t0 + Duration::from_millis(200);
        effects.step(0.2, mid);
        let after = effects.particles()[1];
        assert_ne!((after.x, after.y), (before.x, before.y));
        assert!(after.opacity(mid) < 1.0 && after.opacity(mid) > 0.0);
        assert!(after.current_size(mid) < after.size);

        effects.step(0.3, t0 + Duration::from_millis(500));
        assert!(effects.is_empty());
    }

    #[test]
    fn ripple_spawns_three_rings() {
        let mut effects = CursorEffects::new();
        let t0 = Instant::now();
        jump(&mut effects, CursorAnimationMode::Ripple, t0);
        assert_eq!(effects.rings().len(), 3);
        assert!(effects.particles().is_empty());

        effects.step(0.1, t0 + Duration::from_millis(100));
        assert!(effects.rings()[0].radius > 2.0);
    }

    #[test]
    fn trail_is_capped() {
        let mut effects = CursorEffects::new();
        let t0 = Instant::now();
        effects.spawn(
            CursorAnimationMode::Torpedo,
            &EffectSettings::default(),
            Rect::new(0.0, 0.0, 8.0, 16.0),
            Rect::new(2000.0, 0.0, 8.0, 16.0),
            Color::WHITE,
            t0,
        );
        assert_eq!(effects.trail().len(), 40);
        effects.step(0.2, t0 + TRAIL_LIFETIME);
        assert!(effects.trail().is_empty());
    }

    #[test]
    fn tiny_moves_and_plain_modes_spawn_nothing() {
        let mut effects = CursorEffects::new();
        let t0 = Instant::now();
        jump(&mut effects, CursorAnimationMode::Wireframe, t0);
        jump(&mut effects, CursorAnimationMode::Smooth, t0);
        effects.spawn(
            CursorAnimationMode::Railgun,
            &EffectSettings::default(),
            Rect::new(0.0, 0.0, 8.0, 16.0),
            Rect::new(0.5, 0.0, 8.0, 16.0),
            Color::WHITE,
            t0,
        );
        assert!(effects.is_empty());
    }

    #[test]
    fn particle_count_is_clamped() {
        let settings = EffectSettings::default();
        assert_eq!(settings.with_particle_count(0).particle_count, 1);
        assert_eq!(settings.with_particle_count(500).particle_count, 100);
    }
}
