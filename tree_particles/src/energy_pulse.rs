//! Energy pulse stage: concentric rings of particles on the ground plane.
//!
//! Ring buffers are generated once and never touched again.  Each frame
//! only the per-ring transform (radial scale, yaw) and opacity change,
//! driven by a travelling wave so crests ripple outward from the trunk.
//! The rings glow while the tree is gathered and sink to a faint shimmer
//! once it explodes.

use std::f32::consts::TAU;

use rand::Rng;

use crate::{hex_rgb, lerp, DisplayMode, Rgb, Vec3};

pub const RING_COUNT:         usize = 6;
pub const PARTICLES_PER_RING: usize = 1_200;

/// Radius of the innermost ring; each further ring sits `RING_SPACING` out.
pub const BASE_RADIUS:  f32 = 6.5;
pub const RING_SPACING: f32 = 1.2;
/// Radial band each ring's particles are scattered across.
pub const RING_THICKNESS: f32 = 1.5;
const FLATNESS: f32 = 0.03;

/// Temporal and spatial frequency of the ripple.
const RIPPLE_FREQ:  f32 = 0.4;
const SPATIAL_FREQ: f32 = 1.2;
/// Peak radial breathing of a ring, as a fraction of its radius.
pub const RIPPLE_SCALE: f32 = 0.035;

/// Opacity floor while gathered, plus the wave's contribution on top.
pub const ACTIVE_OPACITY: f32 = 0.4;
pub const WAVE_OPACITY:   f32 = 0.2;
/// Per-frame approach rate toward the target opacity.
pub const FADE_RATE:      f32 = 0.05;
const SPIN_RATE: f32 = 0.01;

const DEEP_BLUE: Rgb = hex_rgb(0x1E40AF);
const CYAN:      Rgb = hex_rgb(0x60A5FA);

// ════════════════════════════════════════════════════════════════════════════
// PulseRing
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct PulseRing {
    positions: Vec<f32>,
    colors:    Vec<f32>,
    scale:     f32,
    yaw:       f32,
    opacity:   f32,
}

impl PulseRing {
    fn generate<R: Rng>(index: usize, count: usize, rng: &mut R) -> Self {
        let radius = BASE_RADIUS + index as f32 * RING_SPACING;
        let mut positions = Vec::with_capacity(count * 3);
        let mut colors    = Vec::with_capacity(count * 3);

        for i in 0..count {
            let angle = i as f32 / count as f32 * TAU;
            let r = radius + (rng.random::<f32>() - 0.5) * RING_THICKNESS;
            positions.extend_from_slice(&[
                angle.cos() * r,
                (rng.random::<f32>() - 0.5) * FLATNESS,
                angle.sin() * r,
            ]);
            let mix = rng.random::<f32>();
            colors.extend_from_slice(&[
                lerp(DEEP_BLUE[0], CYAN[0], mix),
                lerp(DEEP_BLUE[1], CYAN[1], mix),
                lerp(DEEP_BLUE[2], CYAN[2], mix),
            ]);
        }

        PulseRing { positions, colors, scale: 1.0, yaw: 0.0, opacity: 0.0 }
    }

    /// Map a generated point through this frame's ring transform.
    pub fn place(&self, p: Vec3) -> Vec3 {
        let (sin, cos) = self.yaw.sin_cos();
        let x = p[0] * self.scale;
        let z = p[2] * self.scale;
        [x * cos + z * sin, p[1], -x * sin + z * cos]
    }

    pub fn len(&self)       -> usize  { self.positions.len() / 3 }
    pub fn is_empty(&self)  -> bool   { self.positions.is_empty() }
    pub fn positions(&self) -> &[f32] { &self.positions }
    pub fn colors(&self)    -> &[f32] { &self.colors }
    pub fn scale(&self)     -> f32    { self.scale }
    pub fn yaw(&self)       -> f32    { self.yaw }
    pub fn opacity(&self)   -> f32    { self.opacity }
}

// ════════════════════════════════════════════════════════════════════════════
// EnergyPulse
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct EnergyPulse {
    rings: Vec<PulseRing>,
}

impl EnergyPulse {
    pub fn generate<R: Rng>(per_ring: usize, rng: &mut R) -> Self {
        let rings = (0..RING_COUNT).map(|i| PulseRing::generate(i, per_ring, rng)).collect();
        EnergyPulse { rings }
    }

    /// Wave value of ring `index` at `elapsed`, in -1..=1.  Outer rings lag
    /// inner ones, so crests travel outward.
    pub fn wave(index: usize, elapsed: f32) -> f32 {
        (elapsed * RIPPLE_FREQ - index as f32 * SPATIAL_FREQ).sin()
    }

    pub fn step(&mut self, mode: DisplayMode, elapsed: f32) {
        let base = match mode {
            DisplayMode::Tree    => ACTIVE_OPACITY,
            DisplayMode::Explode => 0.0,
        };
        for (i, ring) in self.rings.iter_mut().enumerate() {
            let wave = Self::wave(i, elapsed);
            ring.scale = 1.0 + wave * RIPPLE_SCALE;
            let target = base + (wave + 1.0) * 0.5 * WAVE_OPACITY;
            ring.opacity = lerp(ring.opacity, target, FADE_RATE);
            // neighbouring rings counter-rotate
            let dir = if i % 2 == 0 { 1.0 } else { -1.0 };
            ring.yaw = elapsed * SPIN_RATE * dir;
        }
    }

    pub fn rings(&self) -> &[PulseRing] { &self.rings }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
