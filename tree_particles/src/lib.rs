//! # tree_particles
//!
//! Particle engine behind the gesture-driven holiday tree.
//!
//! Every visual system is a set of **preallocated flat `f32` buffers**
//! indexed by particle id.  Buffers are filled once at construction from a
//! seedable [`SceneRng`] and then mutated in place every frame; nothing in a
//! per-frame `step`/`advance` path allocates.
//!
//! | Module | System |
//! |---|---|
//! | [`shapes`]   | One-off generation of tree / explode / ornament / ground / star buffers |
//! | [`morph`]    | Morph Engine: lerps the live cloud toward the active target |
//! | [`firework`] | Firework Lifecycle Manager: launch → burst → retire |
//! | [`snow`]     | Toggleable snowfall with fade in / out |
//! | [`energy_pulse`] | Rippling ground rings, lit while the tree is gathered |
//! | [`atmosphere`]   | Distant starfield and aurora sheet |
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use tree_particles::{seeded_rng, Density, DisplayMode};
//! use tree_particles::morph::MorphEngine;
//! use tree_particles::firework::FireworkManager;
//!
//! let mut rng = seeded_rng(7);
//! let mut engine = MorphEngine::generate(Density::Full, &mut rng).unwrap();
//! let mut fireworks = FireworkManager::new(seeded_rng(8));
//!
//! fireworks.observe_wishes(1);
//! for frame in 0..600 {
//!     let elapsed = frame as f32 / 60.0;
//!     engine.step(DisplayMode::Explode, 0.0, elapsed);
//!     fireworks.advance(1.0 / 60.0);
//! }
//! ```

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;

pub mod shapes;
pub mod morph;
pub mod firework;
pub mod snow;
pub mod energy_pulse;
pub mod atmosphere;

pub use morph::{DisplayMode, MorphError};

// ════════════════════════════════════════════════════════════════════════════
// Geometry helpers
// ════════════════════════════════════════════════════════════════════════════

/// A point or direction in scene space.
pub type Vec3 = [f32; 3];

/// Linear RGB, each channel nominally 0.0–1.0 (bursts may exceed 1.0).
pub type Rgb = [f32; 3];

/// Where retired particles are parked so the renderer culls them.
pub const OFFSCREEN: Vec3 = [0.0, -1000.0, 0.0];

/// Scalar exponential-approach step: `a + (b - a) * t`.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Whole-vector lerp.
#[inline]
pub fn lerp3(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    [lerp(a[0], b[0], t), lerp(a[1], b[1], t), lerp(a[2], b[2], t)]
}

#[inline]
pub fn distance(a: Vec3, b: Vec3) -> f32 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Parse `#RRGGBB` at compile time into linear-ish RGB floats.
pub const fn hex_rgb(hex: u32) -> Rgb {
    [
        ((hex >> 16) & 0xFF) as f32 / 255.0,
        ((hex >>  8) & 0xFF) as f32 / 255.0,
        ( hex        & 0xFF) as f32 / 255.0,
    ]
}

// ════════════════════════════════════════════════════════════════════════════
// Seeding
// ════════════════════════════════════════════════════════════════════════════

/// RNG used for all scene generation and stochastic per-frame effects.
pub type SceneRng = ChaCha8Rng;

/// Reproducible RNG for tests and `--seed` runs.
pub fn seeded_rng(seed: u64) -> SceneRng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Production RNG: a fresh seed from the thread-local entropy source.
pub fn entropy_rng() -> SceneRng {
    ChaCha8Rng::seed_from_u64(rand::random())
}

// ════════════════════════════════════════════════════════════════════════════
// Density
// ════════════════════════════════════════════════════════════════════════════

/// Particle budget preset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Density {
    #[default]
    Full,
    /// Roughly a third of the full budget, for low-power devices.
    Compact,
}

impl Density {
    pub fn tree_particles(self) -> usize {
        match self { Density::Full => 15_000, Density::Compact => 5_000 }
    }
    pub fn ornaments(self) -> usize {
        match self { Density::Full => 60, Density::Compact => 30 }
    }
    pub fn ground_particles(self) -> usize {
        match self { Density::Full => 8_000, Density::Compact => 3_000 }
    }
    pub fn star_glow_particles(self) -> usize {
        match self { Density::Full => 220, Density::Compact => 100 }
    }
    pub fn pulse_particles_per_ring(self) -> usize {
        match self { Density::Full => 1_200, Density::Compact => 500 }
    }
    pub fn sky_stars(self) -> usize {
        match self { Density::Full => 3_000, Density::Compact => 1_200 }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn lerp_endpoints() {
        assert_eq!(lerp(2.0, 6.0, 0.0), 2.0);
        assert_eq!(lerp(2.0, 6.0, 1.0), 6.0);
        assert_eq!(lerp(2.0, 6.0, 0.25), 3.0);
    }

    #[test]
    fn hex_rgb_channels() {
        assert_eq!(hex_rgb(0xFFFFFF), [1.0, 1.0, 1.0]);
        assert_eq!(hex_rgb(0xFF0000), [1.0, 0.0, 0.0]);
        assert_eq!(hex_rgb(0x000000), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn seeded_rng_is_reproducible() {
        let a: Vec<u32> = (0..8).map({ let mut r = seeded_rng(42); move |_| r.random() }).collect();
        let b: Vec<u32> = (0..8).map({ let mut r = seeded_rng(42); move |_| r.random() }).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn compact_is_smaller_everywhere() {
        let (f, c) = (Density::Full, Density::Compact);
        assert!(c.tree_particles()      < f.tree_particles());
        assert!(c.ornaments()           < f.ornaments());
        assert!(c.ground_particles()    < f.ground_particles());
        assert!(c.star_glow_particles() < f.star_glow_particles());
        assert!(c.pulse_particles_per_ring() < f.pulse_particles_per_ring());
        assert!(c.sky_stars()           < f.sky_stars());
    }
}
