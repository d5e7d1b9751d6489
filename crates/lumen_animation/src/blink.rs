//! Cursor blink phase

use std::time::{Duration, Instant};

pub const DEFAULT_BLINK_INTERVAL: Duration = Duration::from_millis(530);

/// Blink phase of one window's cursor.
///
/// The phase is derived from the time since the last reset, so sampling is
/// stateless and deterministic for a given `now`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorBlink {
    enabled: bool,
    interval: Duration,
    epoch: Instant,
}

impl CursorBlink {
    pub fn new(enabled: bool, interval: Duration, now: Instant) -> Self {
        Self {
            enabled,
            interval,
            epoch: now,
        }
    }

    /// Restart the phase with the cursor shown (called when the cursor moves)
    pub fn reset(&mut self, now: Instant) {
        self.epoch = now;
    }

    pub fn configure(&mut self, enabled: bool, interval: Duration, now: Instant) {
        self.enabled = enabled;
        self.interval = interval;
        self.epoch = now;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the cursor is in its "on" phase at `now`
    pub fn visible(&self, now: Instant) -> bool {
        if !self.enabled || self.interval.is_zero() {
            return true;
        }
        let elapsed = now.saturating_duration_since(self.epoch).as_nanos();
        (elapsed / self.interval.as_nanos()) % 2 == 0
    }

    /// When the phase next flips after `now`; `None` while not blinking
    pub fn next_toggle(&self, now: Instant) -> Option<Instant> {
        if !self.enabled || self.interval.is_zero() {
            return None;
        }
        let interval = self.interval.as_nanos();
        let elapsed = now.saturating_duration_since(self.epoch).as_nanos();
        let next = (elapsed / interval + 1) * interval;
        let next = u64::try_from(next).ok()?;
        Some(self.epoch + Duration::from_nanos(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blink_alternates_each_interval() {
        let t0 = Instant::now();
        let blink = CursorBlink::new(true, Duration::from_millis(500), t0);
        assert!(blink.visible(t0));
        assert!(blink.visible(t0 + Duration::from_millis(499)));
        assert!(!blink.visible(t0 + Duration::from_millis(500)));
        assert!(blink.visible(t0 + Duration::from_millis(1000)));
    }

    #[test]
    fn reset_shows_cursor() {
        let t0 = Instant::now();
        let mut blink = CursorBlink::new(true, Duration::from_millis(500), t0);
        let later = t0 + Duration::from_millis(600);
        assert!(!blink.visible(later));
        blink.reset(later);
        assert!(blink.visible(later));
    }

    #[test]
    fn next_toggle_lands_on_interval_boundary() {
        let t0 = Instant::now();
        let blink = CursorBlink::new(true, Duration::from_millis(500), t0);
        assert_eq!(blink.next_toggle(t0), Some(t0 + Duration::from_millis(500)));
        assert_eq!(
            blink.next_toggle(t0 + Duration::from_millis(500)),
            Some(t0 + Duration::from_millis(1000))
        );
        let off = CursorBlink::new(false, Duration::from_millis(500), t0);
        assert_eq!(off.next_toggle(t0), None);
    }

    #[test]
    fn disabled_blink_is_always_visible() {
        let t0 = Instant::now();
        let blink = CursorBlink::new(false, Duration::from_millis(500), t0);
        assert!(blink.visible(t0 + Duration::from_millis(700)));
    }
}
