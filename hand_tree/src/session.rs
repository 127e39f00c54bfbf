//! The gesture session: the inference callback and its lifecycle.
//!
//! Everything runs on the render thread.  The app calls
//! [`GestureSession::poll`] every frame; a detection pass runs only when the
//! inference [`Cadence`] is due, and the next pass is scheduled from the
//! moment the current one *finishes*.  A slow detector therefore drops
//! frames instead of queueing them.
//!
//! ```text
//!  poll(now) ──▶ watchdog due? ──▶ force GATHER
//!      │
//!      └──▶ cadence due? ──▶ detect ──┬─ Ok(Some) ─▶ classify ─▶ tracker + debouncer
//!                                     ├─ Ok(None) ─▶ hide cursor, arm watchdog
//!                                     └─ Err      ─▶ trace!, carry on
//! ```
//!
//! Ownership of shared outputs: the confirmed gesture, the rotation offset
//! and the cursor are written only here and read by the render side.

use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use crate::gesture::{classify, GestureDebouncer, GestureLabel};
use crate::landmarks::{KeypointSet, LandmarkSource};
use crate::tracker::{CursorState, PointerTracker};
use crate::watchdog::{TrackingLossWatchdog, DEFAULT_LABEL};

// ════════════════════════════════════════════════════════════════════════════
// Cadence
// ════════════════════════════════════════════════════════════════════════════

/// Self-rescheduling timer for detection passes.
#[derive(Clone, Debug)]
pub struct Cadence {
    interval: Duration,
    next:     Option<Instant>,
}

impl Cadence {
    pub const MAX_HZ: f32 = 240.0;

    /// Non-finite or sub-1 Hz rates fall back to 1 Hz.
    pub fn from_hz(hz: f32) -> Self {
        let hz = hz.max(1.0).min(Self::MAX_HZ);
        Cadence { interval: Duration::from_secs_f32(1.0 / hz), next: None }
    }

    pub fn start(&mut self, now: Instant) {
        self.next = Some(now);
    }

    pub fn due(&self, now: Instant) -> bool {
        matches!(self.next, Some(t) if now >= t)
    }

    /// Schedule the next pass one interval after `finished`.
    /// Does nothing once cancelled.
    pub fn finish(&mut self, finished: Instant) {
        if self.next.is_some() {
            self.next = Some(finished + self.interval);
        }
    }

    pub fn cancel(&mut self) {
        self.next = None;
    }

    pub fn is_scheduled(&self) -> bool { self.next.is_some() }
    pub fn interval(&self) -> Duration { self.interval }
}

// ════════════════════════════════════════════════════════════════════════════
// GestureSession
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    /// The source could not be opened; gestures are inert.
    Degraded,
    Stopped,
}

pub struct GestureSession<S: LandmarkSource> {
    source:    S,
    state:     SessionState,
    debouncer: GestureDebouncer,
    tracker:   PointerTracker,
    watchdog:  TrackingLossWatchdog,
    cadence:   Cadence,
    epoch:     Instant,
    notice:    Option<String>,
    passes:    u64,
}

impl<S: LandmarkSource> GestureSession<S> {
    pub fn new(source: S, inference_hz: f32, viewport: (f32, f32)) -> Self {
        GestureSession {
            source,
            state:     SessionState::Idle,
            debouncer: GestureDebouncer::new(DEFAULT_LABEL),
            tracker:   PointerTracker::new(viewport.0, viewport.1),
            watchdog:  TrackingLossWatchdog::default(),
            cadence:   Cadence::from_hz(inference_hz),
            epoch:     Instant::now(),
            notice:    None,
            passes:    0,
        }
    }

    /// Open the source and schedule the first pass.
    ///
    /// On failure the session degrades: no error is returned, a single
    /// user-facing notice is queued for [`take_notice`](Self::take_notice),
    /// and every later `poll` is a no-op.  Only an idle session can start.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.state != SessionState::Idle {
            return self.state == SessionState::Running;
        }
        match self.source.open() {
            Ok(()) => {
                info!(source = self.source.name(), hz = 1.0 / self.cadence.interval().as_secs_f32(), "gesture session started");
                self.state = SessionState::Running;
                self.epoch = now;
                self.cadence.start(now);
                true
            }
            Err(e) => {
                if e.is_fatal_init() {
                    error!(source = self.source.name(), error = %e, "landmark engine failed; running without gesture control");
                } else {
                    warn!(source = self.source.name(), error = %e, "gesture control unavailable");
                }
                self.notice = Some(format!("Gesture control unavailable: {}", e));
                self.state = SessionState::Degraded;
                false
            }
        }
    }

    /// Run whatever is due at `now`.  Returns a confirmed gesture
    /// transition, if one happened.
    pub fn poll(&mut self, now: Instant) -> Option<GestureLabel> {
        if self.state != SessionState::Running {
            return None;
        }

        let mut transition = None;
        if self.watchdog.poll(now) {
            self.debouncer.force(DEFAULT_LABEL);
            debug!("hand lost; falling back to {}", DEFAULT_LABEL.name());
            transition = Some(DEFAULT_LABEL);
        }

        if self.cadence.due(now) {
            let started = Instant::now();
            match self.source.detect(now.saturating_duration_since(self.epoch)) {
                Ok(Some(hand)) => {
                    if let Some(t) = self.on_hand(&hand, now) {
                        transition = Some(t);
                    }
                }
                Ok(None) => self.on_absence(now),
                Err(e)   => trace!(error = %e, "detection pass skipped"),
            }
            self.passes += 1;
            self.cadence.finish(now + started.elapsed());
        }

        transition
    }

    fn on_hand(&mut self, hand: &KeypointSet, now: Instant) -> Option<GestureLabel> {
        let Some(label) = classify(Some(hand)) else {
            self.on_absence(now);
            return None;
        };
        self.watchdog.on_detection();
        self.tracker.update(hand, label);
        self.debouncer.feed(label)
    }

    fn on_absence(&mut self, now: Instant) {
        self.tracker.lose();
        self.debouncer.interrupt();
        self.watchdog.on_absence(now, self.debouncer.confirmed());
    }

    /// Cancel the next pass, disarm the watchdog and release the source.
    pub fn stop(&mut self) {
        self.cadence.cancel();
        self.watchdog.cancel();
        self.tracker.lose();
        if self.state == SessionState::Running {
            self.source.close();
            info!(source = self.source.name(), passes = self.passes, "gesture session stopped");
        }
        self.state = SessionState::Stopped;
    }

    /// The pending user notice, at most once.
    pub fn take_notice(&mut self) -> Option<String> { self.notice.take() }

    pub fn state(&self)           -> SessionState { self.state }
    pub fn confirmed(&self)       -> GestureLabel { self.debouncer.confirmed() }
    pub fn cursor(&self)          -> CursorState  { self.tracker.cursor() }
    pub fn rotation_offset(&self) -> f32          { self.tracker.rotation_offset() }
    pub fn passes(&self)          -> u64          { self.passes }
    pub fn watchdog_armed(&self)  -> bool         { self.watchdog.is_armed() }
    pub fn is_scheduled(&self)    -> bool         { self.cadence.is_scheduled() }
    pub fn source(&self)          -> &S           { &self.source }
}

impl<S: LandmarkSource> Drop for GestureSession<S> {
    fn drop(&mut self) {
        if self.state == SessionState::Running {
            self.stop();
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
