//! Pointer/rotation tracking from the palm knuckle.
//!
//! The cursor follows landmark 9 (middle-finger knuckle), mirrored so it
//! moves like a reflection of the user, and is smoothed with an exponential
//! moving average.  While the hand is open, its horizontal motion spins the
//! tree; a closed fist or a lost hand forgets the last position so the next
//! open-hand frame starts from zero delta.

use crate::gesture::GestureLabel;
use crate::landmarks::{HandLandmark, KeypointSet};

/// EMA factor applied to each cursor axis per detection.
pub const SMOOTHING:          f32 = 0.25;
/// Radians of rotation per unit of normalised horizontal motion.
pub const ROTATION_GAIN:      f32 = -25.0;
/// Largest rotation change accepted from a single frame.
pub const MAX_ROTATION_DELTA: f32 = 0.8;

pub const REFERENCE: HandLandmark = HandLandmark::MiddleMcp;

/// What the pointer overlay draws.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CursorState {
    /// Viewport pixels.
    pub x:        f32,
    pub y:        f32,
    pub visible:  bool,
    pub grabbing: bool,
}

#[derive(Clone, Debug)]
pub struct PointerTracker {
    viewport: (f32, f32),
    cursor:   CursorState,
    last_x:   Option<f32>,
    rotation: f32,
}

impl PointerTracker {
    pub fn new(width: f32, height: f32) -> Self {
        PointerTracker {
            viewport: (width, height),
            cursor:   CursorState::default(),
            last_x:   None,
            rotation: 0.0,
        }
    }

    /// Consume one detected hand and the label it was classified as.
    /// Returns the rotation applied this frame.
    pub fn update(&mut self, hand: &KeypointSet, label: GestureLabel) -> f32 {
        let palm = hand.get(REFERENCE);
        let target_x = (1.0 - palm.x) * self.viewport.0;
        let target_y = palm.y * self.viewport.1;

        // cursor fields are rewritten together so a reader never sees half an update
        self.cursor = CursorState {
            x:        self.cursor.x + (target_x - self.cursor.x) * SMOOTHING,
            y:        self.cursor.y + (target_y - self.cursor.y) * SMOOTHING,
            visible:  true,
            grabbing: label == GestureLabel::Gather,
        };

        match label {
            GestureLabel::Gather => {
                self.last_x = None;
                0.0
            }
            GestureLabel::Explode => {
                let delta = self
                    .last_x
                    .map(|last| ((palm.x - last) * ROTATION_GAIN).clamp(-MAX_ROTATION_DELTA, MAX_ROTATION_DELTA))
                    .unwrap_or(0.0);
                self.rotation += delta;
                self.last_x = Some(palm.x);
                delta
            }
        }
    }

    /// No hand this frame: hide the cursor and forget the last position.
    /// Rotation is left where it is.
    pub fn lose(&mut self) {
        self.cursor.visible = false;
        self.last_x = None;
    }

    pub fn cursor(&self)          -> CursorState { self.cursor }
    pub fn rotation_offset(&self) -> f32         { self.rotation }
    pub fn last_x(&self)          -> Option<f32> { self.last_x }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::synthetic_hand;

    fn open_at(x: f32) -> KeypointSet { synthetic_hand(x, 0.5, false) }

    #[test]
    fn cursor_is_mirrored_and_smoothed() {
        let mut t = PointerTracker::new(1000.0, 500.0);
        t.update(&open_at(0.2), GestureLabel::Explode);
        let c = t.cursor();
        // target (1 - 0.2) * 1000 = 800, a quarter of the way from 0
        assert!((c.x - 200.0).abs() < 1e-3, "x = {}", c.x);
        assert!((c.y - 62.5).abs() < 1e-3, "y = {}", c.y);
        assert!(c.visible);
        assert!(!c.grabbing);

        for _ in 0..100 {
            t.update(&open_at(0.2), GestureLabel::Explode);
        }
        assert!((t.cursor().x - 800.0).abs() < 0.01);
    }

    #[test]
    fn first_open_frame_applies_no_rotation() {
        let mut t = PointerTracker::new(100.0, 100.0);
        assert_eq!(t.update(&open_at(0.4), GestureLabel::Explode), 0.0);
        let d = t.update(&open_at(0.42), GestureLabel::Explode);
        assert!((d - (-0.5)).abs() < 1e-4, "delta {}", d);
        assert!((t.rotation_offset() - d).abs() < 1e-6);
    }

    #[test]
    fn rotation_delta_is_clamped() {
        let mut t = PointerTracker::new(100.0, 100.0);
        t.update(&open_at(0.0), GestureLabel::Explode);
        assert_eq!(t.update(&open_at(1.0), GestureLabel::Explode), -MAX_ROTATION_DELTA);
        assert_eq!(t.update(&open_at(0.0), GestureLabel::Explode), MAX_ROTATION_DELTA);
        for x in [0.3, 0.9, 0.1, 0.95, 0.05] {
            let d = t.update(&open_at(x), GestureLabel::Explode);
            assert!(d.abs() <= MAX_ROTATION_DELTA);
        }
    }

    #[test]
    fn fist_freezes_rotation_and_clears_memory() {
        let mut t = PointerTracker::new(100.0, 100.0);
        t.update(&open_at(0.4), GestureLabel::Explode);
        t.update(&open_at(0.45), GestureLabel::Explode);
        let before = t.rotation_offset();

        assert_eq!(t.update(&synthetic_hand(0.9, 0.5, true), GestureLabel::Gather), 0.0);
        assert_eq!(t.last_x(), None);
        assert!(t.cursor().grabbing);

        // reopening far away does not jump
        assert_eq!(t.update(&open_at(0.9), GestureLabel::Explode), 0.0);
        assert_eq!(t.rotation_offset(), before);
    }

    #[test]
    fn losing_the_hand_hides_cursor_and_keeps_rotation() {
        let mut t = PointerTracker::new(100.0, 100.0);
        t.update(&open_at(0.4), GestureLabel::Explode);
        t.update(&open_at(0.5), GestureLabel::Explode);
        let rot = t.rotation_offset();
        t.lose();
        assert!(!t.cursor().visible);
        assert_eq!(t.last_x(), None);
        assert_eq!(t.rotation_offset(), rot);
        assert_eq!(t.update(&open_at(0.1), GestureLabel::Explode), 0.0);
    }
}
