//! Morph Engine: per-frame interpolation between the gathered tree and the
//! exploded shell.
//!
//! The live buffer is the only position buffer that changes after
//! construction.  Each frame every component moves a fixed fraction of the
//! way toward the active target:
//!
//! ```text
//! live += (target - live) * rate        rate = 0.07 toward TREE
//!                                       rate = 0.035 toward EXPLODE
//! ```
//!
//! so the cloud snaps together quickly and drifts apart slowly.  Rotation is
//! never baked into positions; [`GroupOrientation`] produces a yaw for the
//! renderer to apply as a rigid transform.

use thiserror::Error;
use tracing::debug;

use rand::Rng;

use crate::shapes::{self, GroundCloud, TreeCloud};
use crate::{lerp, lerp3, Density, Rgb, Vec3};

// ════════════════════════════════════════════════════════════════════════════
// Rates
// ════════════════════════════════════════════════════════════════════════════

pub const TREE_RATE:     f32 = 0.07;
pub const EXPLODE_RATE:  f32 = 0.035;
pub const ORNAMENT_RATE: f32 = 0.07;
/// How quickly the displayed yaw follows the tracker's rotation offset.
pub const ROTATION_FOLLOW_RATE: f32 = 0.08;
/// Constant slow spin, radians per second.
pub const AMBIENT_SPIN: f32 = 0.05;
const STAR_AURA_RATE: f32 = 0.05;

// ════════════════════════════════════════════════════════════════════════════
// DisplayMode
// ════════════════════════════════════════════════════════════════════════════

/// Which target the whole scene is morphing toward.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DisplayMode {
    #[default]
    Tree,
    Explode,
}

impl DisplayMode {
    pub fn name(self) -> &'static str {
        match self {
            DisplayMode::Tree    => "TREE",
            DisplayMode::Explode => "EXPLODE",
        }
    }

    /// Per-frame interpolation rate toward this mode's target.
    pub fn rate(self) -> f32 {
        match self {
            DisplayMode::Tree    => TREE_RATE,
            DisplayMode::Explode => EXPLODE_RATE,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Errors
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MorphError {
    #[error("particle buffers disagree in length: tree={tree} explode={explode} colors={colors}")]
    LengthMismatch { tree: usize, explode: usize, colors: usize },

    #[error("flat buffer length {0} is not a multiple of 3")]
    NotTriples(usize),
}

// ════════════════════════════════════════════════════════════════════════════
// ParticleGroup
// ════════════════════════════════════════════════════════════════════════════

/// Three parallel position buffers and one color buffer, all `N × 3` floats.
///
/// Index `i` names the same logical particle in every buffer.  Only `live`
/// is mutated after construction.
#[derive(Clone, Debug)]
pub struct ParticleGroup {
    tree:    Vec<f32>,
    explode: Vec<f32>,
    live:    Vec<f32>,
    colors:  Vec<f32>,
}

impl ParticleGroup {
    /// Build a group that starts fully gathered (`live == tree`).
    pub fn new(tree: Vec<f32>, explode: Vec<f32>, colors: Vec<f32>) -> Result<Self, MorphError> {
        if tree.len() != explode.len() || tree.len() != colors.len() {
            return Err(MorphError::LengthMismatch {
                tree:    tree.len(),
                explode: explode.len(),
                colors:  colors.len(),
            });
        }
        if tree.len() % 3 != 0 {
            return Err(MorphError::NotTriples(tree.len()));
        }
        let live = tree.clone();
        Ok(ParticleGroup { tree, explode, live, colors })
    }

    pub fn from_cloud(cloud: TreeCloud) -> Result<Self, MorphError> {
        Self::new(cloud.tree, cloud.explode, cloud.colors)
    }

    /// Number of particles (not floats).
    pub fn len(&self) -> usize { self.live.len() / 3 }
    pub fn is_empty(&self) -> bool { self.live.is_empty() }

    pub fn live_positions(&self) -> &[f32] { &self.live }
    pub fn colors(&self)         -> &[f32] { &self.colors }

    pub fn target(&self, mode: DisplayMode) -> &[f32] {
        match mode {
            DisplayMode::Tree    => &self.tree,
            DisplayMode::Explode => &self.explode,
        }
    }

    /// One frame of per-component exponential approach.  O(N), no allocation.
    pub fn step(&mut self, mode: DisplayMode) {
        let rate = mode.rate();
        let target = match mode {
            DisplayMode::Tree    => &self.tree,
            DisplayMode::Explode => &self.explode,
        };
        for (live, &goal) in self.live.iter_mut().zip(target.iter()) {
            *live += (goal - *live) * rate;
        }
    }

    /// Largest per-particle distance from `mode`'s target.
    pub fn max_distance_to(&self, mode: DisplayMode) -> f32 {
        self.live
            .chunks_exact(3)
            .zip(self.target(mode).chunks_exact(3))
            .map(|(l, t)| crate::distance([l[0], l[1], l[2]], [t[0], t[1], t[2]]))
            .fold(0.0, f32::max)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Ornament
// ════════════════════════════════════════════════════════════════════════════

/// A single bauble.  Few enough that a whole-vector lerp per frame is fine.
#[derive(Clone, Debug, PartialEq)]
pub struct Ornament {
    tree_position:    Vec3,
    explode_position: Vec3,
    current:          Vec3,
    color:            Rgb,
    scale:            f32,
}

impl Ornament {
    pub fn new(tree_position: Vec3, explode_position: Vec3, color: Rgb, scale: f32) -> Self {
        Ornament { tree_position, explode_position, current: tree_position, color, scale }
    }

    pub fn step(&mut self, mode: DisplayMode) {
        let target = match mode {
            DisplayMode::Tree    => self.tree_position,
            DisplayMode::Explode => self.explode_position,
        };
        self.current = lerp3(self.current, target, ORNAMENT_RATE);
    }

    pub fn position(&self)         -> Vec3 { self.current }
    pub fn tree_position(&self)    -> Vec3 { self.tree_position }
    pub fn explode_position(&self) -> Vec3 { self.explode_position }
    pub fn color(&self)            -> Rgb  { self.color }
    pub fn scale(&self)            -> f32  { self.scale }
}

// ════════════════════════════════════════════════════════════════════════════
// StarGlow
// ════════════════════════════════════════════════════════════════════════════

/// Flickering aura around the star; visible only while gathered.
#[derive(Clone, Debug)]
pub struct StarGlow {
    positions:   Vec<f32>,
    intensities: Vec<f32>,
    offsets:     Vec<f32>,
    speeds:      Vec<f32>,
    /// Per-frame output, `N × 3`.
    colors:      Vec<f32>,
    opacity:     f32,
}

impl StarGlow {
    pub fn new(positions: Vec<f32>, intensities: Vec<f32>, offsets: Vec<f32>, speeds: Vec<f32>) -> Self {
        let colors = vec![0.0; positions.len()];
        StarGlow { positions, intensities, offsets, speeds, colors, opacity: 0.0 }
    }

    pub fn len(&self) -> usize { self.intensities.len() }
    pub fn is_empty(&self) -> bool { self.intensities.is_empty() }

    pub fn step(&mut self, mode: DisplayMode, elapsed: f32) {
        let goal = if mode == DisplayMode::Tree { 1.0 } else { 0.0 };
        self.opacity = lerp(self.opacity, goal, STAR_AURA_RATE);

        let base = shapes::GOLD;
        for (i, rgb) in self.colors.chunks_exact_mut(3).enumerate() {
            let flicker = 0.02
                + 0.98 * (elapsed * self.speeds[i] + self.offsets[i]).sin().abs().powi(14);
            let k = self.intensities[i] * flicker;
            rgb[0] = base[0] * k;
            rgb[1] = base[1] * k;
            rgb[2] = base[2] * k;
        }
    }

    pub fn positions(&self)   -> &[f32] { &self.positions }
    pub fn intensities(&self) -> &[f32] { &self.intensities }
    pub fn colors(&self)      -> &[f32] { &self.colors }
    pub fn opacity(&self)     -> f32    { self.opacity }
}

// ════════════════════════════════════════════════════════════════════════════
// GroupOrientation
// ════════════════════════════════════════════════════════════════════════════

/// Smooths the tracker's accumulated rotation offset into a display yaw.
#[derive(Clone, Debug, Default)]
pub struct GroupOrientation {
    current: f32,
}

impl GroupOrientation {
    /// Returns the yaw (radians) to apply to the whole group this frame.
    pub fn update(&mut self, rotation_offset: f32, elapsed: f32) -> f32 {
        self.current = lerp(self.current, rotation_offset, ROTATION_FOLLOW_RATE);
        elapsed * AMBIENT_SPIN + self.current
    }
}

// ════════════════════════════════════════════════════════════════════════════
// MorphEngine
// ════════════════════════════════════════════════════════════════════════════

/// Everything that belongs to the tree and follows the [`DisplayMode`].
#[derive(Clone, Debug)]
pub struct MorphEngine {
    group:       ParticleGroup,
    ornaments:   Vec<Ornament>,
    star_glow:   StarGlow,
    ground:      GroundCloud,
    orientation: GroupOrientation,
    yaw:         f32,
}

impl MorphEngine {
    pub fn new(group: ParticleGroup, ornaments: Vec<Ornament>, star_glow: StarGlow, ground: GroundCloud) -> Self {
        MorphEngine {
            group,
            ornaments,
            star_glow,
            ground,
            orientation: GroupOrientation::default(),
            yaw: 0.0,
        }
    }

    /// Generate a complete scene at the requested density.
    pub fn generate<R: Rng>(density: Density, rng: &mut R) -> Result<Self, MorphError> {
        let group     = ParticleGroup::from_cloud(shapes::tree_cloud(density.tree_particles(), rng))?;
        let ornaments = shapes::ornaments(density.ornaments(), rng);
        let ground    = shapes::ground_cloud(density.ground_particles(), rng);
        let star_glow = shapes::star_glow(density.star_glow_particles(), rng);
        debug!(
            particles = group.len(),
            ornaments = ornaments.len(),
            ground = ground.len(),
            "generated tree scene"
        );
        Ok(Self::new(group, ornaments, star_glow, ground))
    }

    /// Advance one rendered frame.
    ///
    /// `rotation_offset` is read, never written: the gesture tracker owns it.
    pub fn step(&mut self, mode: DisplayMode, rotation_offset: f32, elapsed: f32) {
        self.group.step(mode);
        for ornament in &mut self.ornaments {
            ornament.step(mode);
        }
        self.star_glow.step(mode, elapsed);
        self.yaw = self.orientation.update(rotation_offset, elapsed);
    }

    pub fn group(&self)     -> &ParticleGroup { &self.group }
    pub fn ornaments(&self) -> &[Ornament]    { &self.ornaments }
    pub fn star_glow(&self) -> &StarGlow      { &self.star_glow }
    pub fn ground(&self)    -> &GroundCloud   { &self.ground }
    /// Yaw computed by the most recent [`step`](Self::step).
    pub fn yaw(&self)       -> f32            { self.yaw }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeded_rng;

    fn small_group() -> ParticleGroup {
        ParticleGroup::new(
            vec![0.0, 0.0, 0.0,   1.0, 2.0, 3.0],
            vec![10.0, -4.0, 2.0, -6.0, 8.0, 0.5],
            vec![1.0; 6],
        ).unwrap()
    }

    #[test]
    fn rejects_mismatched_buffers() {
        let err = ParticleGroup::new(vec![0.0; 6], vec![0.0; 3], vec![0.0; 6]).unwrap_err();
        assert_eq!(err, MorphError::LengthMismatch { tree: 6, explode: 3, colors: 6 });
    }

    #[test]
    fn rejects_partial_triples() {
        let err = ParticleGroup::new(vec![0.0; 4], vec![0.0; 4], vec![0.0; 4]).unwrap_err();
        assert_eq!(err, MorphError::NotTriples(4));
    }

    #[test]
    fn starts_gathered() {
        let g = small_group();
        assert_eq!(g.len(), 2);
        assert_eq!(g.live_positions(), g.target(DisplayMode::Tree));
    }

    #[test]
    fn fixed_point_is_stable() {
        let mut g = small_group();
        let before = g.live_positions().to_vec();
        for _ in 0..10 { g.step(DisplayMode::Tree); }
        assert_eq!(g.live_positions(), &before[..]);
    }

    #[test]
    fn first_step_moves_by_rate() {
        let mut g = small_group();
        g.step(DisplayMode::Explode);
        // particle 0, x: 0 + (10 - 0) * 0.035
        assert!((g.live_positions()[0] - 0.35).abs() < 1e-6);
    }

    #[test]
    fn distance_decreases_monotonically_and_converges() {
        let mut g = small_group();
        for mode in [DisplayMode::Explode, DisplayMode::Tree, DisplayMode::Explode] {
            let mut prev = g.max_distance_to(mode);
            for _ in 0..400 {
                g.step(mode);
                let d = g.max_distance_to(mode);
                assert!(d <= prev, "distance grew: {} -> {}", prev, d);
                prev = d;
            }
            assert!(prev < 1e-3, "did not converge toward {:?}: {}", mode, prev);
        }
    }

    #[test]
    fn gathering_is_faster_than_exploding() {
        let mut g = small_group();
        let full = g.max_distance_to(DisplayMode::Explode);
        for _ in 0..30 { g.step(DisplayMode::Explode); }
        let explode_left = g.max_distance_to(DisplayMode::Explode) / full;

        for _ in 0..600 { g.step(DisplayMode::Explode); }
        let full = g.max_distance_to(DisplayMode::Tree);
        for _ in 0..30 { g.step(DisplayMode::Tree); }
        let gather_left = g.max_distance_to(DisplayMode::Tree) / full;

        assert!(gather_left < explode_left, "{} vs {}", gather_left, explode_left);
    }

    #[test]
    fn ornament_follows_mode() {
        let mut o = Ornament::new([0.0, 0.0, 0.0], [10.0, 10.0, 10.0], [1.0; 3], 0.3);
        o.step(DisplayMode::Explode);
        assert!((o.position()[1] - 0.7).abs() < 1e-6);
        for _ in 0..500 { o.step(DisplayMode::Tree); }
        assert!(crate::distance(o.position(), o.tree_position()) < 1e-4);
    }

    #[test]
    fn orientation_adds_ambient_spin() {
        let mut o = GroupOrientation::default();
        let yaw = o.update(0.0, 10.0);
        assert!((yaw - 0.5).abs() < 1e-6);
        // follows the offset gradually
        let yaw = o.update(1.0, 0.0);
        assert!((yaw - ROTATION_FOLLOW_RATE).abs() < 1e-6);
    }

    #[test]
    fn star_aura_fades_with_mode() {
        let mut glow = shapes::star_glow(50, &mut seeded_rng(3));
        for f in 0..200 { glow.step(DisplayMode::Tree, f as f32 / 60.0); }
        assert!(glow.opacity() > 0.99);
        for f in 0..200 { glow.step(DisplayMode::Explode, f as f32 / 60.0); }
        assert!(glow.opacity() < 0.01);
    }

    #[test]
    fn engine_generates_and_steps() {
        let mut engine = MorphEngine::generate(Density::Compact, &mut seeded_rng(11)).unwrap();
        assert_eq!(engine.group().len(), Density::Compact.tree_particles());
        assert_eq!(engine.ornaments().len(), Density::Compact.ornaments());
        let before = engine.group().max_distance_to(DisplayMode::Explode);
        engine.step(DisplayMode::Explode, 0.0, 0.0);
        assert!(engine.group().max_distance_to(DisplayMode::Explode) < before);
    }
}
