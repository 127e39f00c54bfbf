//! Hand keypoints and the sources that produce them.
//!
//! A [`LandmarkSource`] yields zero or one hand per detection pass as a
//! [`KeypointSet`] of 21 points.  `x`/`y` are normalised to the camera frame
//! (`0.0..=1.0`, y pointing down) and `z` is depth relative to the wrist.
//! Consumers don't need to know whether points came from real hardware or
//! the mouse-driven simulator.
//!
//! ```text
//!         8   12  16  20        tips
//!         7   11  15  19        DIP
//!    4    6   10  14  18        PIP
//!     3   5 ─ 9 ─ 13─ 17        MCP (knuckles)
//!      2   \  |  /  /
//!       1   \ | /  /
//!            0                  wrist
//! ```

use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;

use crate::error::{DetectError, LandmarkError, SourceError};

// ════════════════════════════════════════════════════════════════════════════
// Keypoints
// ════════════════════════════════════════════════════════════════════════════

pub const KEYPOINT_COUNT: usize = 21;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Keypoint {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Keypoint { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Distance in the image plane; depth is ignored.
    pub fn planar_distance(&self, other: &Keypoint) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// The 21 hand landmarks, in detector order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandLandmark {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

impl HandLandmark {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// `(tip, knuckle)` for the four non-thumb fingers.
pub const FINGERS: [(HandLandmark, HandLandmark); 4] = [
    (HandLandmark::IndexTip,  HandLandmark::IndexMcp),
    (HandLandmark::MiddleTip, HandLandmark::MiddleMcp),
    (HandLandmark::RingTip,   HandLandmark::RingMcp),
    (HandLandmark::PinkyTip,  HandLandmark::PinkyMcp),
];

/// One detected hand.  Fresh every pass; carries no identity.
#[derive(Clone, Debug, PartialEq)]
pub struct KeypointSet {
    points: [Keypoint; KEYPOINT_COUNT],
}

impl KeypointSet {
    pub fn new(points: [Keypoint; KEYPOINT_COUNT]) -> Self {
        KeypointSet { points }
    }

    pub fn from_slice(points: &[Keypoint]) -> Result<Self, LandmarkError> {
        let points: [Keypoint; KEYPOINT_COUNT] = points
            .try_into()
            .map_err(|_| LandmarkError::WrongCount(points.len()))?;
        Ok(KeypointSet { points })
    }

    pub fn get(&self, landmark: HandLandmark) -> Keypoint {
        self.points[landmark.index()]
    }

    pub fn points(&self) -> &[Keypoint; KEYPOINT_COUNT] {
        &self.points
    }

    pub fn is_finite(&self) -> bool {
        self.points.iter().all(Keypoint::is_finite)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LandmarkSource trait: unified interface for hw and sim
// ════════════════════════════════════════════════════════════════════════════

/// Anything that can run hand detection on demand.
///
/// `open` acquires the device and loads the detector, `detect` runs one pass
/// and must never block for long, `close` releases everything.  `close` may
/// be called on a source that was never opened.
pub trait LandmarkSource {
    fn name(&self) -> &'static str;
    fn open(&mut self) -> Result<(), SourceError>;
    /// `timestamp` is time since the session started.
    fn detect(&mut self, timestamp: Duration) -> Result<Option<KeypointSet>, DetectError>;
    fn close(&mut self);
}

// ════════════════════════════════════════════════════════════════════════════
// SimLandmarkSource: keyboard/mouse simulation (always available)
// ════════════════════════════════════════════════════════════════════════════

/// Raw input event from the simulation window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SimInput {
    /// Palm position in camera-frame coordinates.
    Pointer { x: f32, y: f32 },
    /// Fingers folded (`true`) or spread.
    Fist(bool),
    /// Take the hand out of view, or bring it back.
    ToggleHand,
}

/// Landmark source driven by [`SimInput`] events from the visualizer.
///
/// The window sends input here; each detection pass drains the channel and
/// synthesises a hand at the last pointer position.  This decouples the
/// window event loop from gesture logic.
pub struct SimLandmarkSource {
    rx:      Receiver<SimInput>,
    palm:    (f32, f32),
    fist:    bool,
    visible: bool,
    open:    bool,
}

impl SimLandmarkSource {
    pub fn new(rx: Receiver<SimInput>) -> Self {
        SimLandmarkSource { rx, palm: (0.5, 0.5), fist: false, visible: true, open: false }
    }

    fn apply(&mut self, input: SimInput) {
        match input {
            SimInput::Pointer { x, y } => self.palm = (x.clamp(0.0, 1.0), y.clamp(0.0, 1.0)),
            SimInput::Fist(f)          => self.fist = f,
            SimInput::ToggleHand       => self.visible = !self.visible,
        }
    }

    fn drain(&mut self) {
        // A closed window just freezes the hand where it was.
        while let Ok(input) = self.rx.try_recv() {
            self.apply(input);
        }
    }
}

impl LandmarkSource for SimLandmarkSource {
    fn name(&self) -> &'static str { "simulated hand" }

    /// Fails when no window was ever attached to the input channel.
    fn open(&mut self) -> Result<(), SourceError> {
        match self.rx.try_recv() {
            Ok(input) => self.apply(input),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                return Err(SourceError::Unsupported("no simulation window attached".into()));
            }
        }
        self.open = true;
        Ok(())
    }

    fn detect(&mut self, _timestamp: Duration) -> Result<Option<KeypointSet>, DetectError> {
        if !self.open {
            return Err(DetectError::Transient("source not open".into()));
        }
        self.drain();
        if !self.visible {
            return Ok(None);
        }
        Ok(Some(synthetic_hand(self.palm.0, self.palm.1, self.fist)))
    }

    fn close(&mut self) {
        self.open = false;
    }
}

/// Build a plausible upright hand whose middle knuckle sits at `(x, y)`.
///
/// Spread fingers point up, away from the wrist; folded fingers curl back
/// down so every tip ends up nearer the wrist than its knuckle.
pub fn synthetic_hand(x: f32, y: f32, fist: bool) -> KeypointSet {
    const WRIST_DROP: f32 = 0.12;
    // knuckle offsets for index, middle, ring, pinky
    const KNUCKLES: [(f32, f32); 4] = [(0.03, 0.005), (0.0, 0.0), (-0.03, 0.005), (-0.055, 0.015)];

    let mut pts = [Keypoint::default(); KEYPOINT_COUNT];
    pts[0] = Keypoint::new(x, y + WRIST_DROP, 0.0);

    let thumb: [(f32, f32); 4] = if fist {
        [(0.04, 0.10), (0.06, 0.07), (0.05, 0.045), (0.025, 0.035)]
    } else {
        [(0.04, 0.10), (0.065, 0.07), (0.085, 0.045), (0.10, 0.02)]
    };
    for (i, (dx, dy)) in thumb.iter().enumerate() {
        pts[1 + i] = Keypoint::new(x + dx, y + dy, -0.01 * (i as f32 + 1.0));
    }

    // (dy of PIP, DIP, TIP) relative to the knuckle
    let bend: [f32; 3] = if fist { [-0.02, 0.01, 0.04] } else { [-0.04, -0.07, -0.10] };
    for (f, (kx, ky)) in KNUCKLES.iter().enumerate() {
        let base = 5 + f * 4;
        let (mx, my) = (x + kx, y + ky);
        pts[base] = Keypoint::new(mx, my, -0.02);
        for (j, dy) in bend.iter().enumerate() {
            let z = if fist { -0.03 - 0.01 * j as f32 } else { -0.02 };
            pts[base + 1 + j] = Keypoint::new(mx, my + dy, z);
        }
    }

    KeypointSet::new(pts)
}

// ════════════════════════════════════════════════════════════════════════════
// LeapLandmarkSource: real hardware (feature = "leap")
// ════════════════════════════════════════════════════════════════════════════

/// Landmark source backed by a real LeapMotion controller.
///
/// Requires the `leap` feature flag and the LeapC shared library installed.
/// Leap joints are reported in millimetres above the device; they are mapped
/// onto a virtual 400 × 400 mm camera frame centred over it.  Each digit's
/// proximal, intermediate and distal bones supply its four landmarks.
#[cfg(feature = "leap")]
pub struct LeapLandmarkSource {
    connection: Option<leaprs::Connection>,
}

#[cfg(feature = "leap")]
impl LeapLandmarkSource {
    const FRAME_MM:  f32 = 400.0;
    const FLOOR_MM:  f32 = 50.0;

    pub fn new() -> Self {
        LeapLandmarkSource { connection: None }
    }

    fn from_mm(x: f32, y: f32, z: f32) -> Keypoint {
        Keypoint::new(
            (x + Self::FRAME_MM / 2.0) / Self::FRAME_MM,
            1.0 - (y - Self::FLOOR_MM) / Self::FRAME_MM,
            z / (Self::FRAME_MM / 2.0),
        )
    }
}

#[cfg(feature = "leap")]
impl Default for LeapLandmarkSource {
    fn default() -> Self { Self::new() }
}

#[cfg(feature = "leap")]
impl LandmarkSource for LeapLandmarkSource {
    fn name(&self) -> &'static str { "LeapMotion" }

    fn open(&mut self) -> Result<(), SourceError> {
        use leaprs::*;
        let mut connection = Connection::create(ConnectionConfig::default())
            .map_err(|e| SourceError::EngineLoad(format!("{:?}", e)))?;
        connection
            .open()
            .map_err(|e| SourceError::DeviceBusy(format!("{:?}", e)))?;
        self.connection = Some(connection);
        Ok(())
    }

    fn detect(&mut self, _timestamp: Duration) -> Result<Option<KeypointSet>, DetectError> {
        use leaprs::*;
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| DetectError::Transient("device not open".into()))?;

        let msg = connection.poll(0).map_err(|_| DetectError::NoFrame)?;
        let Event::Tracking(frame) = msg.event() else {
            return Err(DetectError::NoFrame);
        };
        let Some(hand) = frame.hands().next() else {
            return Ok(None);
        };

        macro_rules! joint {
            ($j:expr) => {{ let j = $j; Self::from_mm(j.x, j.y, j.z) }};
        }
        let mut points = Vec::with_capacity(KEYPOINT_COUNT);
        points.push(joint!(hand.arm().next_joint()));
        for digit in hand.digits() {
            points.push(joint!(digit.proximal().prev_joint()));
            points.push(joint!(digit.intermediate().prev_joint()));
            points.push(joint!(digit.distal().prev_joint()));
            points.push(joint!(digit.distal().next_joint()));
        }
        KeypointSet::from_slice(&points)
            .map(Some)
            .map_err(|e| DetectError::Transient(e.to_string()))
    }

    fn close(&mut self) {
        self.connection = None;
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
