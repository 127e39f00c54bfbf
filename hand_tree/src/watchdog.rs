//! Tracking-loss watchdog.
//!
//! Arms when a frame without a hand arrives while the confirmed gesture is
//! not already GATHER; any detected hand disarms it.  If it stays armed for
//! [`TRACKING_LOSS_TIMEOUT`] the session forces GATHER, so the tree
//! reassembles when the user walks away.
//!
//! Time is passed in explicitly; the watchdog never reads the clock.

use std::time::{Duration, Instant};

use crate::gesture::GestureLabel;

pub const TRACKING_LOSS_TIMEOUT: Duration = Duration::from_millis(500);

/// The mode the watchdog falls back to.
pub const DEFAULT_LABEL: GestureLabel = GestureLabel::Gather;

#[derive(Clone, Debug)]
pub struct TrackingLossWatchdog {
    timeout:  Duration,
    deadline: Option<Instant>,
}

impl Default for TrackingLossWatchdog {
    fn default() -> Self { Self::new(TRACKING_LOSS_TIMEOUT) }
}

impl TrackingLossWatchdog {
    pub fn new(timeout: Duration) -> Self {
        TrackingLossWatchdog { timeout, deadline: None }
    }

    /// A hand was seen: cancel any pending fallback.
    pub fn on_detection(&mut self) {
        self.deadline = None;
    }

    /// No hand at `now`.  Arms the timer unless it is already running or
    /// the confirmed gesture is already the default.  An already-armed timer
    /// keeps its first deadline.
    pub fn on_absence(&mut self, now: Instant, confirmed: GestureLabel) {
        if confirmed != DEFAULT_LABEL && self.deadline.is_none() {
            self.deadline = Some(now + self.timeout);
        }
    }

    /// True exactly once, at the first poll at or after the deadline.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool { self.deadline.is_some() }
    pub fn deadline(&self) -> Option<Instant> { self.deadline }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    #[test]
    fn fires_at_timeout_not_before() {
        let t0 = Instant::now();
        let mut w = TrackingLossWatchdog::default();
        w.on_absence(t0, GestureLabel::Explode);
        assert!(w.is_armed());
        assert!(!w.poll(t0 + ms(499)));
        assert!(w.poll(t0 + ms(500)));
        assert!(!w.is_armed());
        assert!(!w.poll(t0 + ms(900)), "fires only once");
    }

    #[test]
    fn continued_absence_keeps_first_deadline() {
        let t0 = Instant::now();
        let mut w = TrackingLossWatchdog::default();
        for i in 0..10 {
            w.on_absence(t0 + ms(i * 40), GestureLabel::Explode);
        }
        assert_eq!(w.deadline(), Some(t0 + ms(500)));
    }

    #[test]
    fn detection_cancels_pending_fallback() {
        let t0 = Instant::now();
        let mut w = TrackingLossWatchdog::default();
        w.on_absence(t0, GestureLabel::Explode);
        w.on_detection();
        assert!(!w.poll(t0 + ms(600)));
        // re-arms from the next absence
        w.on_absence(t0 + ms(700), GestureLabel::Explode);
        assert!(!w.poll(t0 + ms(1100)));
        assert!(w.poll(t0 + ms(1200)));
    }

    #[test]
    fn never_arms_when_already_default() {
        let t0 = Instant::now();
        let mut w = TrackingLossWatchdog::default();
        w.on_absence(t0, GestureLabel::Gather);
        assert!(!w.is_armed());
        assert!(!w.poll(t0 + ms(10_000)));
    }

    #[test]
    fn cancel_disarms() {
        let t0 = Instant::now();
        let mut w = TrackingLossWatchdog::default();
        w.on_absence(t0, GestureLabel::Explode);
        w.cancel();
        assert!(!w.poll(t0 + ms(10_000)));
    }
}
