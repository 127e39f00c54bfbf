//! One-off generation of every static particle buffer.
//!
//! All functions draw from the caller's RNG so a seeded [`SceneRng`] gives a
//! byte-identical scene.  Nothing here runs per frame.
//!
//! [`SceneRng`]: crate::SceneRng

use std::f32::consts::TAU;

use rand::Rng;

use crate::morph::{Ornament, StarGlow};
use crate::{hex_rgb, lerp, Rgb, Vec3};

// ════════════════════════════════════════════════════════════════════════════
// Palette
// ════════════════════════════════════════════════════════════════════════════

pub const GOLD:   Rgb = hex_rgb(0xFFD700);
pub const WHITE:  Rgb = hex_rgb(0xFFFFFF);
pub const PINK:   Rgb = hex_rgb(0xFF69B4);
pub const PURPLE: Rgb = hex_rgb(0x8A2BE2);

const GROUND_NEAR: Rgb = hex_rgb(0x050520);
const GROUND_FAR:  Rgb = hex_rgb(0x100220);

// ════════════════════════════════════════════════════════════════════════════
// Tree geometry
// ════════════════════════════════════════════════════════════════════════════

pub const TREE_HEIGHT:      f32 = 12.5;
pub const TREE_TURNS:       f32 = 12.0;
pub const TREE_BASE_RADIUS: f32 = 3.4;
/// Upper bound of the per-particle radius jitter (0.8 + 0.45).
pub const TREE_RADIUS_JITTER_MAX: f32 = 1.25;

/// Height of the star above the tree's local origin.
pub const STAR_HEIGHT:      f32 = 12.8;
const STAR_GLOW_RADIUS:     f32 = 4.5;

/// Uniformly distributed unit vector (inverse-cosine polar sampling).
pub fn unit_sphere<R: Rng>(rng: &mut R) -> Vec3 {
    let phi   = rng.random::<f32>() * TAU;
    let theta = (2.0 * rng.random::<f32>() - 1.0).acos();
    [theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos()]
}

/// The two target clouds plus their shared colors for the main particle group.
#[derive(Clone, Debug)]
pub struct TreeCloud {
    pub tree:    Vec<f32>,
    pub explode: Vec<f32>,
    pub colors:  Vec<f32>,
}

/// Generate `count` particles: a 12-turn spiral cone and a flattened shell
/// centred six units above the base.
pub fn tree_cloud<R: Rng>(count: usize, rng: &mut R) -> TreeCloud {
    let mut tree    = Vec::with_capacity(count * 3);
    let mut explode = Vec::with_capacity(count * 3);
    let mut colors  = Vec::with_capacity(count * 3);

    for _ in 0..count {
        let t      = rng.random::<f32>();
        let angle  = t * TREE_TURNS * TAU + rng.random::<f32>() * 0.7;
        let radius = (1.0 - t).powf(0.85) * TREE_BASE_RADIUS * (0.8 + rng.random::<f32>() * 0.45);
        tree.extend_from_slice(&[angle.cos() * radius, t * TREE_HEIGHT, angle.sin() * radius]);

        let dir = unit_sphere(rng);
        let r   = 10.0 + rng.random::<f32>() * 12.0;
        explode.extend_from_slice(&[dir[0] * r, dir[1] * r * 0.5 + 6.0, dir[2] * r]);

        colors.extend_from_slice(&tree_color(rng.random()));
    }

    TreeCloud { tree, explode, colors }
}

/// Weighted palette pick: 20 % white, 20 % gold, 30 % pink, 30 % purple.
fn tree_color(roll: f32) -> Rgb {
    if roll > 0.8 {
        WHITE
    } else if roll > 0.6 {
        GOLD
    } else if roll > 0.3 {
        PINK
    } else {
        PURPLE
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Ornaments
// ════════════════════════════════════════════════════════════════════════════

/// Ornament baubles laid along a slightly wider 10-turn spiral.
pub fn ornaments<R: Rng>(count: usize, rng: &mut R) -> Vec<Ornament> {
    (0..count)
        .map(|i| {
            let t      = (i as f32 / count as f32).powf(1.4);
            let angle  = t * 10.0 * TAU + rng.random::<f32>() * 0.5;
            let radius = (1.0 - t).powf(0.75) * 3.8;
            let tree   = [angle.cos() * radius, t * 12.2, angle.sin() * radius];

            let ring   = 12.0 + rng.random::<f32>() * 10.0;
            let phi    = rng.random::<f32>() * TAU;
            let explode = [phi.cos() * ring, rng.random::<f32>() * 18.0, phi.sin() * ring];

            let scale = ((1.2 - t) * 0.38 * (0.9 + rng.random::<f32>() * 0.3)).max(0.18);
            let color = match i % 3 {
                0 => PINK,
                1 => GOLD,
                _ => WHITE,
            };
            Ornament::new(tree, explode, color, scale)
        })
        .collect()
}

// ════════════════════════════════════════════════════════════════════════════
// Ground disc
// ════════════════════════════════════════════════════════════════════════════

/// Static, dimly lit disc of particles under the tree.
#[derive(Clone, Debug)]
pub struct GroundCloud {
    pub positions: Vec<f32>,
    pub colors:    Vec<f32>,
}

impl GroundCloud {
    pub fn len(&self) -> usize { self.positions.len() / 3 }
    pub fn is_empty(&self) -> bool { self.positions.is_empty() }
}

pub fn ground_cloud<R: Rng>(count: usize, rng: &mut R) -> GroundCloud {
    let mut positions = Vec::with_capacity(count * 3);
    let mut colors    = Vec::with_capacity(count * 3);
    for _ in 0..count {
        let angle = rng.random::<f32>() * TAU;
        // sqrt keeps the disc area-uniform instead of bunching at the centre
        let r = rng.random::<f32>().sqrt() * 20.0;
        positions.extend_from_slice(&[
            angle.cos() * r,
            (rng.random::<f32>() - 0.5) * 0.2,
            angle.sin() * r,
        ]);
        let mix = rng.random::<f32>();
        colors.extend_from_slice(&[
            lerp(GROUND_NEAR[0], GROUND_FAR[0], mix),
            lerp(GROUND_NEAR[1], GROUND_FAR[1], mix),
            lerp(GROUND_NEAR[2], GROUND_FAR[2], mix),
        ]);
    }
    GroundCloud { positions, colors }
}

// ════════════════════════════════════════════════════════════════════════════
// Star glow
// ════════════════════════════════════════════════════════════════════════════

/// Aura around the star: heavily centre-weighted (`r ∝ U^5.5`) so most
/// particles hug the star, each with its own flicker speed and phase.
pub fn star_glow<R: Rng>(count: usize, rng: &mut R) -> StarGlow {
    let mut positions   = Vec::with_capacity(count * 3);
    let mut intensities = Vec::with_capacity(count);
    let mut offsets     = Vec::with_capacity(count);
    let mut speeds      = Vec::with_capacity(count);

    for _ in 0..count {
        let dir = unit_sphere(rng);
        let r   = STAR_GLOW_RADIUS * rng.random::<f32>().powf(5.5);
        positions.extend_from_slice(&[dir[0] * r, dir[1] * r, dir[2] * r]);
        intensities.push((1.0 - r / STAR_GLOW_RADIUS).powf(4.5));
        offsets.push(rng.random::<f32>() * TAU);
        speeds.push(3.0 + rng.random::<f32>() * 6.0);
    }

    StarGlow::new(positions, intensities, offsets, speeds)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
