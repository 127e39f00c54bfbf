//! # hand_tree
//!
//! Hand-gesture controller for the `tree_particles` scene.  One hand in
//! front of the tracker steers a morphing particle tree: a fist gathers it,
//! an open hand scatters it and spins it as the palm moves sideways.
//!
//! ## Gesture → Action mapping
//!
//! | Gesture | Detected as | Action |
//! |---|---|---|
//! | Closed fist (≥ 3 fingers folded) | GATHER | Particles pull back into the tree |
//! | Open hand | EXPLODE | Particles drift out to a shell |
//! | Open hand moving left/right | EXPLODE | Spin the tree (±0.8 rad per frame max) |
//! | Hand leaves view for 500 ms | any | Fall back to GATHER |
//!
//! A new gesture must hold for 6 further detection passes before the scene
//! reacts, so a single misread frame never flips the tree.
//!
//! ## Pipeline
//!
//! ```text
//! LandmarkSource ─▶ classify ─▶ GestureDebouncer ─▶ DisplayMode ─▶ MorphEngine
//!        │                                               ▲
//!        ├────────▶ PointerTracker ─▶ cursor, rotation ──┘
//!        └────────▶ TrackingLossWatchdog ─▶ forced GATHER
//! ```
//!
//! ## Feature flags
//!
//! * (default): **Simulation mode**: the mouse drives a synthetic hand.
//! * `leap`: **Hardware mode**: polls a real LeapMotion controller via LeapC.
//!
//! ### Simulation keyboard shortcuts
//!
//! | Input | Effect |
//! |---|---|
//! | Mouse | Move the hand |
//! | `Space` (hold) | Make a fist |
//! | `H` | Hide / show the hand (exercises tracking loss) |
//! | `W` | Make a wish (launch fireworks) |
//! | `N` | Toggle snow |
//! | `Q` / `Escape` | Quit |

pub mod error;
pub mod landmarks;
pub mod gesture;
pub mod tracker;
pub mod watchdog;
pub mod session;
pub mod visualizer;
pub mod app;
