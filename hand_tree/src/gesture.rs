//! Gesture classification and debouncing.
//!
//! [`classify`] turns one [`KeypointSet`] into a binary [`GestureLabel`];
//! [`GestureDebouncer`] turns the noisy per-frame label stream into stable
//! confirmed transitions.

use tracing::debug;
use tree_particles::DisplayMode;

use crate::landmarks::{HandLandmark, KeypointSet, FINGERS};

// ════════════════════════════════════════════════════════════════════════════
// GestureLabel
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GestureLabel {
    /// Closed fist: pull the tree together.
    #[default]
    Gather,
    /// Open hand: scatter the particles.
    Explode,
}

impl GestureLabel {
    pub fn name(self) -> &'static str {
        match self {
            GestureLabel::Gather  => "GATHER",
            GestureLabel::Explode => "EXPLODE",
        }
    }
}

impl From<GestureLabel> for DisplayMode {
    fn from(label: GestureLabel) -> Self {
        match label {
            GestureLabel::Gather  => DisplayMode::Tree,
            GestureLabel::Explode => DisplayMode::Explode,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Classifier
// ════════════════════════════════════════════════════════════════════════════

/// Fingers that must be folded for a fist.
pub const FIST_MIN_FOLDED: usize = 3;

/// Count the non-thumb fingers whose tip is nearer the wrist than their
/// knuckle (image-plane distances).
pub fn folded_fingers(hand: &KeypointSet) -> usize {
    let wrist = hand.get(HandLandmark::Wrist);
    FINGERS
        .iter()
        .filter(|(tip, mcp)| {
            hand.get(*tip).planar_distance(&wrist) < hand.get(*mcp).planar_distance(&wrist)
        })
        .count()
}

/// Classify one frame.  Absence, or any non-finite coordinate, is no signal.
pub fn classify(hand: Option<&KeypointSet>) -> Option<GestureLabel> {
    let hand = hand.filter(|h| h.is_finite())?;
    if folded_fingers(hand) >= FIST_MIN_FOLDED {
        Some(GestureLabel::Gather)
    } else {
        Some(GestureLabel::Explode)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Debouncer
// ════════════════════════════════════════════════════════════════════════════

/// Agreeing frames after the first that a new label needs before it is
/// confirmed.
pub const STABILITY_THRESHOLD: u32 = 6;

/// Stateful filter from raw labels to confirmed transitions.
///
/// | raw label | effect |
/// |---|---|
/// | == confirmed | clear pending, counter → 0 |
/// | == pending   | counter += 1; at threshold confirm it and clear pending |
/// | otherwise    | becomes pending, counter → 0 |
///
/// Both directions follow the same rule, so GATHER→EXPLODE and
/// EXPLODE→GATHER take the same number of frames.
#[derive(Clone, Debug, PartialEq)]
pub struct GestureDebouncer {
    confirmed:     GestureLabel,
    pending:       Option<GestureLabel>,
    stable_frames: u32,
}

impl Default for GestureDebouncer {
    fn default() -> Self { Self::new(GestureLabel::Gather) }
}

impl GestureDebouncer {
    pub fn new(confirmed: GestureLabel) -> Self {
        GestureDebouncer { confirmed, pending: None, stable_frames: 0 }
    }

    /// Feed one raw label.  Returns the newly confirmed label, if any.
    pub fn feed(&mut self, raw: GestureLabel) -> Option<GestureLabel> {
        if raw == self.confirmed {
            self.pending = None;
            self.stable_frames = 0;
            return None;
        }

        if self.pending == Some(raw) {
            self.stable_frames += 1;
            if self.stable_frames >= STABILITY_THRESHOLD {
                debug!(from = self.confirmed.name(), to = raw.name(), "gesture confirmed");
                self.confirmed = raw;
                self.pending = None;
                self.stable_frames = 0;
                return Some(raw);
            }
        } else {
            self.pending = Some(raw);
            self.stable_frames = 0;
        }
        None
    }

    /// A frame without a hand: the run of agreeing frames is broken, but
    /// the pending label is remembered.
    pub fn interrupt(&mut self) {
        self.stable_frames = 0;
    }

    /// Overwrite the confirmed label without debouncing.  Any half-built
    /// transition is discarded.
    pub fn force(&mut self, label: GestureLabel) {
        self.confirmed = label;
        self.pending = None;
        self.stable_frames = 0;
    }

    pub fn confirmed(&self)     -> GestureLabel         { self.confirmed }
    pub fn pending(&self)       -> Option<GestureLabel> { self.pending }
    pub fn stable_frames(&self) -> u32                  { self.stable_frames }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{synthetic_hand, Keypoint, KEYPOINT_COUNT};

    use super::GestureLabel::{Explode, Gather};

    /// Hand with exactly `n` of the four fingers folded.
    fn hand_with_folded(n: usize) -> KeypointSet {
        let open = synthetic_hand(0.5, 0.5, false);
        let fist = synthetic_hand(0.5, 0.5, true);
        let mut pts = *open.points();
        for (tip, _) in FINGERS.iter().take(n) {
            pts[tip.index()] = fist.get(*tip);
        }
        KeypointSet::new(pts)
    }

    /// Feed `labels`, returning the index of every emitted transition.
    fn run(d: &mut GestureDebouncer, labels: &[GestureLabel]) -> Vec<(usize, GestureLabel)> {
        labels
            .iter()
            .enumerate()
            .filter_map(|(i, &l)| d.feed(l).map(|t| (i, t)))
            .collect()
    }

    #[test]
    fn folded_count_drives_label() {
        for n in 0..=4 {
            let hand = hand_with_folded(n);
            assert_eq!(folded_fingers(&hand), n);
            let expected = if n >= 3 { Gather } else { Explode };
            assert_eq!(classify(Some(&hand)), Some(expected), "{} folded", n);
        }
    }

    #[test]
    fn classify_ignores_depth() {
        let mut pts = *hand_with_folded(4).points();
        for p in pts.iter_mut() {
            p.z = 100.0;
        }
        assert_eq!(classify(Some(&KeypointSet::new(pts))), Some(Gather));
    }

    #[test]
    fn absence_and_nan_are_no_signal() {
        assert_eq!(classify(None), None);
        let mut pts = [Keypoint::default(); KEYPOINT_COUNT];
        pts[0].x = f32::NAN;
        assert_eq!(classify(Some(&KeypointSet::new(pts))), None);
    }

    #[test]
    fn label_maps_to_display_mode() {
        assert_eq!(DisplayMode::from(Gather), DisplayMode::Tree);
        assert_eq!(DisplayMode::from(Explode), DisplayMode::Explode);
    }

    #[test]
    fn confirms_after_six_agreeing_frames() {
        let mut d = GestureDebouncer::new(Gather);
        // first frame sets pending, six more confirm
        let events = run(&mut d, &[Explode; 7]);
        assert_eq!(events, vec![(6, Explode)]);
        assert_eq!(d.confirmed(), Explode);
        assert_eq!((d.pending(), d.stable_frames()), (None, 0));
    }

    #[test]
    fn six_frames_are_not_enough() {
        let mut d = GestureDebouncer::new(Gather);
        assert!(run(&mut d, &[Explode; 6]).is_empty());
        assert_eq!(d.confirmed(), Gather);
    }

    #[test]
    fn single_glitch_in_stable_stream_is_ignored() {
        let mut d = GestureDebouncer::new(Gather);
        let mut stream = vec![Gather; 50];
        stream[20] = Explode;
        assert!(run(&mut d, &stream).is_empty());
        assert_eq!(d.pending(), None);
    }

    #[test]
    fn alternating_stream_never_emits() {
        let mut d = GestureDebouncer::new(Gather);
        let stream: Vec<_> = (0..200).map(|i| if i % 2 == 0 { Explode } else { Gather }).collect();
        assert!(run(&mut d, &stream).is_empty());
    }

    #[test]
    fn both_directions_take_the_same_frames() {
        let mut a = GestureDebouncer::new(Gather);
        let mut b = GestureDebouncer::new(Explode);
        assert_eq!(run(&mut a, &[Explode; 20]), vec![(6, Explode)]);
        assert_eq!(run(&mut b, &[Gather; 20]), vec![(6, Gather)]);
    }

    #[test]
    fn returning_to_confirmed_resets_progress() {
        let mut d = GestureDebouncer::new(Gather);
        run(&mut d, &[Explode; 5]);
        assert_eq!(d.stable_frames(), 4);
        d.feed(Gather);
        assert_eq!((d.pending(), d.stable_frames()), (None, 0));
        // must start over
        assert_eq!(run(&mut d, &[Explode; 7]), vec![(6, Explode)]);
    }

    #[test]
    fn interrupt_keeps_pending_but_restarts_count() {
        let mut d = GestureDebouncer::new(Gather);
        run(&mut d, &[Explode; 4]);
        d.interrupt();
        assert_eq!(d.pending(), Some(Explode));
        assert_eq!(d.stable_frames(), 0);
        // pending survives, so six more agreeing frames suffice
        assert_eq!(run(&mut d, &[Explode; 6]), vec![(5, Explode)]);
    }

    #[test]
    fn force_overrides_confirmed() {
        let mut d = GestureDebouncer::new(Explode);
        d.force(Gather);
        assert_eq!(d.confirmed(), Gather);
        assert_eq!(d.feed(Gather), None);
    }

    #[test]
    fn forced_fallback_needs_a_full_run_to_reopen() {
        let mut d = GestureDebouncer::new(Gather);
        assert_eq!(run(&mut d, &[Explode; 7]), vec![(6, Explode)]);
        d.interrupt();
        d.force(Gather);
        assert_eq!((d.pending(), d.stable_frames()), (None, 0));
        // same seven frames as the very first transition
        assert!(run(&mut d, &[Explode; 6]).is_empty());
        assert_eq!(d.feed(Explode), Some(Explode));
    }

    #[test]
    fn force_discards_half_built_transition() {
        let mut d = GestureDebouncer::new(Explode);
        run(&mut d, &[Gather; 4]);
        d.force(Gather);
        assert_eq!((d.pending(), d.stable_frames()), (None, 0));
        assert_eq!(run(&mut d, &[Explode; 7]), vec![(6, Explode)]);
    }
}
