//! Firework Lifecycle Manager.
//!
//! Each wish launches one or two independent [`Firework`]s.  A firework is a
//! two-phase state machine:
//!
//! ```text
//!   Launch { progress }  ──progress ≥ 1──▶  Burst  ──all life ≤ 0──▶  (retired)
//! ```
//!
//! * **Launch**: the rocket climbs from `y = -6` to its apex along an
//!   ease-out-exponential curve, shedding trail points; its light fades as
//!   it nears the top.
//! * **Burst**: 600 sparks fly out under drag and gravity, twinkling and
//!   fading with `life²`, shedding shorter-lived trail points of their own.
//!
//! All per-firework storage is allocated at spawn; [`Firework::advance`]
//! only writes into those buffers.  Retirement is a `retain` over the
//! manager's id-keyed map after every entity has been advanced, so an entity
//! can never be removed twice or mutated mid-removal.

use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use tracing::debug;

use crate::shapes::unit_sphere;
use crate::{hex_rgb, lerp, Rgb, SceneRng, Vec3, OFFSCREEN};

// ════════════════════════════════════════════════════════════════════════════
// Constants
// ════════════════════════════════════════════════════════════════════════════

pub const SPARKS_PER_FIREWORK: usize = 600;
/// Trail slots drawn per firework.  Compaction trims back to this.
pub const TRAIL_SOFT_CAPACITY: usize = 500;
/// Hard ceiling; once reached, new trail points overwrite slots ring-wise.
pub const TRAIL_HARD_CAPACITY: usize = TRAIL_SOFT_CAPACITY * 2;

pub const LAUNCH_START_Y: f32 = -6.0;
pub const LAUNCH_Z:       f32 = -5.0;
/// Launch progress gained per second.
pub const LAUNCH_RATE:    f32 = 0.8;

const LAUNCH_TRAIL_CHANCE: f64 = 0.9;
const LAUNCH_TRAIL_JITTER: f32 = 0.1;
const LAUNCH_LIGHT:        f32 = 40.0;
const BURST_LIGHT:         f32 = 100.0;

/// Velocity multiplier per frame.
pub const DRAG:    f32 = 0.94;
/// Subtracted from vertical velocity per frame.
pub const GRAVITY: f32 = 0.0007;
/// Spark life lost per second.
pub const SPARK_DECAY: f32 = 0.6;

const BURST_TRAIL_CHANCE:    f64 = 0.12;
const BURST_TRAIL_MIN_LIFE:  f32 = 0.4;
const BURST_TRAIL_LIFE:      f32 = 0.6;
const TRAIL_DECAY:           f32 = 1.8;
const TRAIL_SINK:            f32 = 0.3;

const FLICKER_FREQUENCY: f32 = 45.0;

pub const PALETTES: [[Rgb; 3]; 4] = [
    [hex_rgb(0xFFD700), hex_rgb(0xFFFACD), hex_rgb(0xFFFFFF)],
    [hex_rgb(0xFF69B4), hex_rgb(0xFFB6C1), hex_rgb(0xFFFFFF)],
    [hex_rgb(0x00FFFF), hex_rgb(0xE0FFFF), hex_rgb(0xFFFFFF)],
    [hex_rgb(0xC0C0C0), hex_rgb(0xE8E8E8), hex_rgb(0xFFFFFF)],
];

/// `1 - 2^(-10x)`, pinned to exactly 1 at `x = 1`.
pub fn ease_out_expo(x: f32) -> f32 {
    if x >= 1.0 { 1.0 } else { 1.0 - 2f32.powf(-10.0 * x) }
}

/// Sparkle term: a fast sine sharpened by a high power.
#[inline]
fn twinkle(time: f32, phase: f32) -> f32 {
    (time * FLICKER_FREQUENCY + phase).sin().abs().powi(6)
}

// ════════════════════════════════════════════════════════════════════════════
// Trail
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrailPoint {
    pub position: Vec3,
    pub life:     f32,
    pub size:     f32,
}

impl TrailPoint {
    const PARKED: TrailPoint = TrailPoint { position: OFFSCREEN, life: 0.0, size: 0.0 };
}

/// Fixed-capacity trail storage for one firework.
///
/// Points are appended until [`TRAIL_HARD_CAPACITY`]; past that the oldest
/// slot is overwritten.  Expired points stay in place, parked at
/// [`OFFSCREEN`], until [`compact`](Self::compact) drops them.  The backing
/// `Vec` never reallocates after construction.
#[derive(Clone, Debug)]
pub struct TrailBuffer {
    points: Vec<TrailPoint>,
    cursor: usize,
}

impl Default for TrailBuffer {
    fn default() -> Self {
        TrailBuffer { points: Vec::with_capacity(TRAIL_HARD_CAPACITY), cursor: 0 }
    }
}

impl TrailBuffer {
    pub fn push(&mut self, point: TrailPoint) {
        if self.points.len() < TRAIL_HARD_CAPACITY {
            self.points.push(point);
        } else {
            self.points[self.cursor] = point;
            self.cursor = (self.cursor + 1) % TRAIL_HARD_CAPACITY;
        }
    }

    /// Decay and sink every point; expired ones are parked off-screen.
    pub fn advance(&mut self, dt: f32) {
        for p in &mut self.points {
            if p.life > 0.0 {
                p.life -= dt * TRAIL_DECAY;
                p.position[1] -= dt * TRAIL_SINK;
            }
            if p.life <= 0.0 {
                *p = TrailPoint::PARKED;
            }
        }
    }

    /// Drop expired points once the buffer outgrows its soft capacity.
    /// Returns true if anything was trimmed.
    pub fn compact(&mut self) -> bool {
        if self.points.len() <= TRAIL_SOFT_CAPACITY {
            return false;
        }
        self.points.retain(|p| p.life > 0.0);
        self.points.truncate(TRAIL_SOFT_CAPACITY);
        self.cursor = 0;
        true
    }

    pub fn is_spent(&self) -> bool { self.points.iter().all(|p| p.life <= 0.0) }
    pub fn len(&self) -> usize { self.points.len() }
    pub fn is_empty(&self) -> bool { self.points.is_empty() }
    pub fn capacity(&self) -> usize { self.points.capacity() }

    /// The drawable window: the first [`TRAIL_SOFT_CAPACITY`] slots.
    pub fn visible(&self) -> &[TrailPoint] {
        &self.points[..self.points.len().min(TRAIL_SOFT_CAPACITY)]
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Spark
// ════════════════════════════════════════════════════════════════════════════

/// One burst particle.  Position is relative to the firework's apex.
#[derive(Clone, Debug, PartialEq)]
pub struct Spark {
    pub position: Vec3,
    pub velocity: Vec3,
    pub life:     f32,
    pub size:     f32,
    pub flicker_phase: f32,
    pub color:    Rgb,
}

// ════════════════════════════════════════════════════════════════════════════
// Firework
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FireworkId(pub u64);

impl fmt::Display for FireworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fw#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FireworkPhase {
    Launch { progress: f32 },
    Burst,
}

impl FireworkPhase {
    pub fn is_burst(&self) -> bool { matches!(self, FireworkPhase::Burst) }
}

/// One rocket and its burst.
#[derive(Clone, Debug)]
pub struct Firework {
    id:       FireworkId,
    origin_x: f32,
    apex_y:   f32,
    palette:  [Rgb; 3],
    phase:    FireworkPhase,
    rocket:   Vec3,
    light:    f32,
    sparks:   Vec<Spark>,
    trail:    TrailBuffer,

    // render buffers, world space
    spark_positions: Vec<f32>,
    spark_colors:    Vec<f32>,
    spark_sizes:     Vec<f32>,
}

impl Firework {
    pub fn new<R: Rng>(id: FireworkId, origin_x: f32, apex_y: f32, palette: [Rgb; 3], rng: &mut R) -> Self {
        let base = palette[0];
        let sparks = (0..SPARKS_PER_FIREWORK)
            .map(|_| {
                let dir   = unit_sphere(rng);
                let speed = 0.06 + rng.random::<f32>() * 0.12;
                let accent = palette[rng.random_range(0..palette.len())];
                Spark {
                    position: [0.0; 3],
                    velocity: [dir[0] * speed, dir[1] * speed, dir[2] * speed],
                    life:     1.0,
                    size:     0.04 + rng.random::<f32>() * 0.1,
                    flicker_phase: rng.random::<f32>() * 10.0,
                    color: [
                        lerp(base[0], accent[0], 0.5),
                        lerp(base[1], accent[1], 0.5),
                        lerp(base[2], accent[2], 0.5),
                    ],
                }
            })
            .collect();

        let mut spark_positions = Vec::with_capacity(SPARKS_PER_FIREWORK * 3);
        for _ in 0..SPARKS_PER_FIREWORK {
            spark_positions.extend_from_slice(&OFFSCREEN);
        }

        Firework {
            id,
            origin_x,
            apex_y,
            palette,
            phase: FireworkPhase::Launch { progress: 0.0 },
            rocket: [origin_x, LAUNCH_START_Y, LAUNCH_Z],
            light: LAUNCH_LIGHT,
            sparks,
            trail: TrailBuffer::default(),
            spark_positions,
            spark_colors: vec![0.0; SPARKS_PER_FIREWORK * 3],
            spark_sizes:  vec![0.0; SPARKS_PER_FIREWORK],
        }
    }

    /// Advance one frame.  `time` is total elapsed seconds (drives flicker).
    /// Returns true on the frame the firework switches from launch to burst.
    pub fn advance<R: Rng>(&mut self, dt: f32, time: f32, rng: &mut R) -> bool {
        let mut burst_started = false;

        if let FireworkPhase::Launch { progress } = &mut self.phase {
            *progress += dt * LAUNCH_RATE;
            let eased = ease_out_expo(progress.min(1.0));
            let y = lerp(LAUNCH_START_Y, self.apex_y, eased);
            self.rocket = [self.origin_x, y, LAUNCH_Z];

            if rng.random_bool(LAUNCH_TRAIL_CHANCE) {
                self.trail.push(TrailPoint {
                    position: [
                        self.origin_x + (rng.random::<f32>() - 0.5) * LAUNCH_TRAIL_JITTER,
                        y,
                        LAUNCH_Z + (rng.random::<f32>() - 0.5) * LAUNCH_TRAIL_JITTER,
                    ],
                    life: 1.0,
                    size: 0.02 + rng.random::<f32>() * 0.04,
                });
            }
            self.light = LAUNCH_LIGHT * (1.0 - eased);

            if *progress >= 1.0 {
                self.phase = FireworkPhase::Burst;
                self.rocket = OFFSCREEN;
                burst_started = true;
                debug!(id = %self.id, apex = self.apex_y, "firework burst");
            }
        }

        self.trail.advance(dt);

        // The burst itself starts on the frame after the transition.
        if self.phase.is_burst() && !burst_started {
            self.advance_burst(dt, time, rng);
        }

        self.trail.compact();
        burst_started
    }

    fn advance_burst<R: Rng>(&mut self, dt: f32, time: f32, rng: &mut R) {
        let apex = [self.origin_x, self.apex_y, LAUNCH_Z];

        for (i, s) in self.sparks.iter_mut().enumerate() {
            let pos = &mut self.spark_positions[i * 3..i * 3 + 3];
            if s.life <= 0.0 {
                pos.copy_from_slice(&OFFSCREEN);
                self.spark_sizes[i] = 0.0;
                continue;
            }

            s.life -= dt * SPARK_DECAY;
            for v in &mut s.velocity { *v *= DRAG; }
            s.velocity[1] -= GRAVITY;
            for k in 0..3 { s.position[k] += s.velocity[k]; }

            let world = [apex[0] + s.position[0], apex[1] + s.position[1], apex[2] + s.position[2]];
            pos.copy_from_slice(&world);

            if s.life > BURST_TRAIL_MIN_LIFE && rng.random_bool(BURST_TRAIL_CHANCE) {
                self.trail.push(TrailPoint { position: world, life: BURST_TRAIL_LIFE, size: s.size * 0.5 });
            }

            let sparkle = twinkle(time, s.flicker_phase);
            let fade    = s.life.max(0.0).powi(2);
            let gain    = (1.2 + sparkle * 2.5) * fade;
            let rgb     = &mut self.spark_colors[i * 3..i * 3 + 3];
            rgb[0] = s.color[0] * gain;
            rgb[1] = s.color[1] * gain;
            rgb[2] = s.color[2] * gain;
            self.spark_sizes[i] = s.size * (1.0 + sparkle * 3.0) * fade;
        }

        self.light = (self.sparks[0].life * BURST_LIGHT).max(0.0);
    }

    /// True once every spark and every trail point has burnt out.
    pub fn is_spent(&self) -> bool {
        self.phase.is_burst()
            && self.sparks.iter().all(|s| s.life <= 0.0)
            && self.trail.is_spent()
    }

    pub fn id(&self)       -> FireworkId    { self.id }
    pub fn phase(&self)    -> FireworkPhase { self.phase }
    pub fn origin_x(&self) -> f32           { self.origin_x }
    pub fn apex_y(&self)   -> f32           { self.apex_y }
    pub fn palette(&self)  -> &[Rgb; 3]     { &self.palette }
    /// Rocket head while launching; [`OFFSCREEN`] after the burst.
    pub fn rocket(&self)   -> Vec3          { self.rocket }
    pub fn light_intensity(&self) -> f32    { self.light }
    pub fn sparks(&self)   -> &[Spark]      { &self.sparks }
    pub fn trail(&self)    -> &TrailBuffer  { &self.trail }
    pub fn spark_positions(&self) -> &[f32] { &self.spark_positions }
    pub fn spark_colors(&self)    -> &[f32] { &self.spark_colors }
    pub fn spark_sizes(&self)     -> &[f32] { &self.spark_sizes }
}

// ════════════════════════════════════════════════════════════════════════════
// FireworkManager
// ════════════════════════════════════════════════════════════════════════════

/// Owns every in-flight firework, keyed by id.
pub struct FireworkManager {
    active:    BTreeMap<FireworkId, Firework>,
    next_id:   u64,
    last_wish: u64,
    elapsed:   f32,
    rng:       SceneRng,
}

impl FireworkManager {
    pub fn new(rng: SceneRng) -> Self {
        FireworkManager {
            active:    BTreeMap::new(),
            next_id:   0,
            last_wish: 0,
            elapsed:   0.0,
            rng,
        }
    }

    /// React to the external wish counter.  Every unit of increase launches
    /// one or two fireworks; equal or lower values do nothing.
    /// Returns how many fireworks were spawned.
    pub fn observe_wishes(&mut self, counter: u64) -> usize {
        if counter <= self.last_wish {
            return 0;
        }
        let increase = counter - self.last_wish;
        self.last_wish = counter;

        let mut spawned = 0;
        for _ in 0..increase {
            let n = self.rng.random_range(1..=2);
            spawned += self.spawn(n).len();
        }
        spawned
    }

    /// Launch `n` fireworks with randomised origin, apex and palette.
    pub fn spawn(&mut self, n: usize) -> Vec<FireworkId> {
        let mut ids = Vec::with_capacity(n);
        for _ in 0..n {
            let id = FireworkId(self.next_id);
            self.next_id += 1;

            let origin_x = (self.rng.random::<f32>() - 0.5) * 8.0;
            let apex_y   = 6.0 + self.rng.random::<f32>() * 5.0;
            let palette  = PALETTES[self.rng.random_range(0..PALETTES.len())];
            let fw = Firework::new(id, origin_x, apex_y, palette, &mut self.rng);

            debug!(%id, origin_x, apex_y, "firework launched");
            self.active.insert(id, fw);
            ids.push(id);
        }
        ids
    }

    /// Advance every firework one frame, then retire the spent ones.
    /// Returns the ids retired this frame.
    pub fn advance(&mut self, dt: f32) -> Vec<FireworkId> {
        self.elapsed += dt;
        let time = self.elapsed;
        for fw in self.active.values_mut() {
            fw.advance(dt, time, &mut self.rng);
        }

        let mut retired = Vec::new();
        self.active.retain(|&id, fw| {
            let spent = fw.is_spent();
            if spent {
                retired.push(id);
            }
            !spent
        });
        for id in &retired {
            debug!(%id, "firework retired");
        }
        retired
    }

    pub fn len(&self) -> usize { self.active.len() }
    pub fn is_empty(&self) -> bool { self.active.is_empty() }
    pub fn iter(&self) -> impl Iterator<Item = &Firework> { self.active.values() }
    pub fn get(&self, id: FireworkId) -> Option<&Firework> { self.active.get(&id) }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeded_rng;
    use std::collections::BTreeSet;
    use std::f32::consts::TAU;

    const DT: f32 = 1.0 / 60.0;

    fn single() -> (Firework, SceneRng) {
        let mut rng = seeded_rng(21);
        let fw = Firework::new(FireworkId(0), 1.0, 8.0, PALETTES[0], &mut rng);
        (fw, rng)
    }

    #[test]
    fn ease_out_expo_endpoints() {
        assert_eq!(ease_out_expo(0.0), 0.0);
        assert_eq!(ease_out_expo(1.0), 1.0);
        assert!(ease_out_expo(0.5) > 0.95);
    }

    #[test]
    fn rocket_climbs_monotonically() {
        let (mut fw, mut rng) = single();
        let mut last_y = LAUNCH_START_Y;
        let mut last_light = f32::MAX;
        for f in 0..60 {
            fw.advance(DT, f as f32 * DT, &mut rng);
            let y = fw.rocket()[1];
            assert!(y >= last_y);
            assert!(y <= 8.0 + 1e-4);
            assert!(fw.light_intensity() <= last_light);
            last_y = y;
            last_light = fw.light_intensity();
        }
    }

    #[test]
    fn launch_to_burst_exactly_once() {
        let (mut fw, mut rng) = single();
        let mut transitions = 0;
        let mut seen_burst = false;
        for f in 0..2000 {
            if fw.advance(DT, f as f32 * DT, &mut rng) {
                transitions += 1;
            }
            if seen_burst {
                assert!(fw.phase().is_burst(), "phase reversed at frame {}", f);
            }
            seen_burst |= fw.phase().is_burst();
        }
        assert_eq!(transitions, 1);
    }

    #[test]
    fn burst_happens_after_launch_duration() {
        let (mut fw, mut rng) = single();
        // 1 / 0.8 s = 75 frames at 60 fps
        for f in 0..74 {
            fw.advance(DT, f as f32 * DT, &mut rng);
            assert!(!fw.phase().is_burst(), "burst too early at frame {}", f);
        }
        for f in 74..80 {
            fw.advance(DT, f as f32 * DT, &mut rng);
        }
        assert!(fw.phase().is_burst());
    }

    #[test]
    fn sparks_slow_down_and_fade() {
        let (mut fw, mut rng) = single();
        while !fw.phase().is_burst() {
            fw.advance(DT, 0.0, &mut rng);
        }
        fw.advance(DT, 0.0, &mut rng);
        let speed = |s: &Spark| (s.velocity[0].powi(2) + s.velocity[2].powi(2)).sqrt();
        let before: Vec<f32> = fw.sparks().iter().map(speed).collect();
        let life_before = fw.sparks()[0].life;
        fw.advance(DT, 0.0, &mut rng);
        for (s, b) in fw.sparks().iter().zip(&before) {
            assert!(speed(s) <= *b);
        }
        assert!(fw.sparks()[0].life < life_before);
    }

    #[test]
    fn firework_eventually_spent() {
        let (mut fw, mut rng) = single();
        let mut frames = 0;
        while !fw.is_spent() {
            fw.advance(DT, frames as f32 * DT, &mut rng);
            frames += 1;
            assert!(frames < 60 * 10, "firework never burnt out");
        }
        assert!(fw.sparks().iter().all(|s| s.life <= 0.0));
        assert!(fw.trail().is_spent());
        // dead sparks are parked
        assert_eq!(&fw.spark_positions()[..3], &OFFSCREEN);
    }

    #[test]
    fn trail_never_exceeds_hard_capacity() {
        let mut trail = TrailBuffer::default();
        let cap = trail.capacity();
        for i in 0..(TRAIL_HARD_CAPACITY * 3) {
            trail.push(TrailPoint { position: [i as f32, 0.0, 0.0], life: 1.0, size: 0.1 });
        }
        assert_eq!(trail.len(), TRAIL_HARD_CAPACITY);
        assert_eq!(trail.capacity(), cap);
    }

    #[test]
    fn trail_compaction_respects_soft_capacity() {
        let mut trail = TrailBuffer::default();
        for i in 0..800 {
            let life = if i % 2 == 0 { 1.0 } else { 0.0 };
            trail.push(TrailPoint { position: [0.0; 3], life, size: 0.1 });
        }
        assert!(trail.compact());
        assert_eq!(trail.len(), 400);
        assert!(trail.visible().iter().all(|p| p.life > 0.0));
        assert!(!trail.compact());
    }

    #[test]
    fn expired_trail_points_are_parked() {
        let mut trail = TrailBuffer::default();
        trail.push(TrailPoint { position: [1.0, 2.0, 3.0], life: 0.01, size: 0.1 });
        trail.advance(DT);
        assert_eq!(trail.visible()[0].position, OFFSCREEN);
        assert!(trail.is_spent());
    }

    #[test]
    fn wishes_spawn_one_or_two_per_unit() {
        for seed in 0..20 {
            let mut mgr = FireworkManager::new(seeded_rng(seed));
            let n = mgr.observe_wishes(3);
            assert!((3..=6).contains(&n), "seed {} spawned {}", seed, n);
            assert_eq!(mgr.len(), n);
        }
    }

    #[test]
    fn non_increasing_wish_counter_is_a_no_op() {
        let mut mgr = FireworkManager::new(seeded_rng(5));
        assert!(mgr.observe_wishes(2) > 0);
        let count = mgr.len();
        assert_eq!(mgr.observe_wishes(2), 0);
        assert_eq!(mgr.observe_wishes(1), 0);
        assert_eq!(mgr.observe_wishes(0), 0);
        assert_eq!(mgr.len(), count);
    }

    #[test]
    fn spawn_parameters_in_range() {
        let mut mgr = FireworkManager::new(seeded_rng(9));
        mgr.spawn(50);
        for fw in mgr.iter() {
            assert!((-4.0..=4.0).contains(&fw.origin_x()));
            assert!((6.0..=11.0).contains(&fw.apex_y()));
            assert!(PALETTES.contains(fw.palette()));
        }
    }

    #[test]
    fn every_firework_retired_exactly_once() {
        let mut mgr = FireworkManager::new(seeded_rng(13));
        let spawned: BTreeSet<FireworkId> = mgr.spawn(3).into_iter().collect();
        let mut retired = BTreeSet::new();
        let mut late = None;
        for f in 0..60 * 12 {
            // stagger a late launch mid-flight
            if f == 30 {
                late = mgr.spawn(1).first().copied();
            }
            for id in mgr.advance(DT) {
                assert!(retired.insert(id), "{} retired twice", id);
            }
        }
        assert!(mgr.is_empty());
        assert!(spawned.is_subset(&retired));
        assert!(retired.contains(&late.unwrap()));
        assert_eq!(retired.len(), 4);
    }

    #[test]
    fn ids_are_unique() {
        let mut mgr = FireworkManager::new(seeded_rng(1));
        let a = mgr.spawn(2);
        let b = mgr.spawn(2);
        let all: BTreeSet<_> = a.iter().chain(b.iter()).collect();
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn twinkle_is_bounded() {
        for i in 0..1000 {
            let t = twinkle(i as f32 * 0.013, (i as f32 * 0.37) % TAU);
            assert!((0.0..=1.0).contains(&t));
        }
    }
}
