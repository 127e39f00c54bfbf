//! Background sky: a distant twinkling starfield and a faint aurora sheet.
//!
//! Both live in world space, far behind the tree, and ignore the gesture
//! rotation.

use std::f32::consts::TAU;

use rand::Rng;

use crate::{hex_rgb, Rgb, Vec3};

pub const STAR_COUNT:  usize = 3_000;
/// Stars sit on a shell between `SKY_RADIUS` and `SKY_RADIUS + SKY_DEPTH`.
pub const SKY_RADIUS:  f32 = 120.0;
pub const SKY_DEPTH:   f32 = 60.0;
const STAR_SIZE_FACTOR: f32 = 4.0;
const STAR_LIGHTNESS:   f32 = 0.9;
const TWINKLE_SPEED:    f32 = 0.8;

pub const AURORA_CENTER:  Vec3 = [0.0, 10.0, -30.0];
pub const AURORA_WIDTH:   f32 = 100.0;
pub const AURORA_HEIGHT:  f32 = 40.0;
/// Backward lean of the sheet about x.
const AURORA_TILT:        f32 = 0.2;
/// Radians per second the sheet turns in its own plane.
pub const AURORA_SPIN:    f32 = 0.02;
pub const AURORA_COLOR:   Rgb = hex_rgb(0x4B0082);
pub const AURORA_OPACITY: f32 = 0.03;

/// HSL with full saturation to RGB.
fn hue_rgb(hue: f32, lightness: f32) -> Rgb {
    let c = (1.0 - (2.0 * lightness - 1.0).abs()).max(0.0);
    let h = hue.rem_euclid(1.0) * 6.0;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = lightness - c / 2.0;
    [r + m, g + m, b + m]
}

// ════════════════════════════════════════════════════════════════════════════
// Starfield
// ════════════════════════════════════════════════════════════════════════════

pub struct Starfield {
    positions:  Vec<f32>,
    colors:     Vec<f32>,
    sizes:      Vec<f32>,
    phases:     Vec<f32>,
    brightness: Vec<f32>,
}

impl Starfield {
    pub fn generate<R: Rng>(count: usize, rng: &mut R) -> Self {
        let mut positions = Vec::with_capacity(count * 3);
        let mut colors    = Vec::with_capacity(count * 3);
        let mut sizes     = Vec::with_capacity(count);
        let mut phases    = Vec::with_capacity(count);

        for i in 0..count {
            let r     = SKY_RADIUS + rng.random::<f32>() * SKY_DEPTH;
            let polar = (1.0 - 2.0 * rng.random::<f32>()).acos();
            let az    = rng.random::<f32>() * TAU;
            positions.extend_from_slice(&[
                r * polar.sin() * az.sin(),
                r * polar.cos(),
                r * polar.sin() * az.cos(),
            ]);
            colors.extend_from_slice(&hue_rgb(i as f32 / count.max(1) as f32, STAR_LIGHTNESS));
            sizes.push((0.5 + 0.5 * rng.random::<f32>()) * STAR_SIZE_FACTOR);
            phases.push(rng.random::<f32>() * TAU);
        }

        Starfield { positions, colors, sizes, phases, brightness: vec![1.0; count] }
    }

    pub fn step(&mut self, elapsed: f32) {
        for (b, &phase) in self.brightness.iter_mut().zip(&self.phases) {
            *b = 0.65 + 0.35 * (elapsed * TWINKLE_SPEED + phase).sin();
        }
    }

    pub fn len(&self)        -> usize  { self.sizes.len() }
    pub fn is_empty(&self)   -> bool   { self.sizes.is_empty() }
    pub fn positions(&self)  -> &[f32] { &self.positions }
    pub fn colors(&self)     -> &[f32] { &self.colors }
    pub fn sizes(&self)      -> &[f32] { &self.sizes }
    pub fn brightness(&self) -> &[f32] { &self.brightness }
}

// ════════════════════════════════════════════════════════════════════════════
// Aurora
// ════════════════════════════════════════════════════════════════════════════

/// A large translucent sheet hung behind the tree, slowly turning.
#[derive(Clone, Copy, Debug, Default)]
pub struct Aurora {
    angle: f32,
}

impl Aurora {
    pub fn step(&mut self, elapsed: f32) {
        self.angle = elapsed * AURORA_SPIN;
    }

    /// World position of the sheet point at `(u, v)`, both in -0.5..=0.5
    /// across its width and height.
    pub fn point(&self, u: f32, v: f32) -> Vec3 {
        let (x, y) = (u * AURORA_WIDTH, v * AURORA_HEIGHT);
        let (sin, cos) = self.angle.sin_cos();
        let (x, y) = (x * cos - y * sin, x * sin + y * cos);
        let (ts, tc) = AURORA_TILT.sin_cos();
        [
            AURORA_CENTER[0] + x,
            AURORA_CENTER[1] + y * tc,
            AURORA_CENTER[2] + y * ts,
        ]
    }

    pub fn angle(&self) -> f32 { self.angle }
}

// ════════════════════════════════════════════════════════════════════════════
// Atmosphere
// ════════════════════════════════════════════════════════════════════════════

pub struct Atmosphere {
    pub stars:  Starfield,
    pub aurora: Aurora,
}

impl Atmosphere {
    pub fn generate<R: Rng>(stars: usize, rng: &mut R) -> Self {
        Atmosphere { stars: Starfield::generate(stars, rng), aurora: Aurora::default() }
    }

    pub fn step(&mut self, elapsed: f32) {
        self.stars.step(elapsed);
        self.aurora.step(elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{distance, seeded_rng};

    #[test]
    fn stars_fill_a_distant_shell() {
        let sky = Starfield::generate(500, &mut seeded_rng(9));
        assert_eq!(sky.len(), 500);
        for p in sky.positions().chunks_exact(3) {
            let r = distance([p[0], p[1], p[2]], [0.0; 3]);
            assert!(r >= SKY_RADIUS - 1e-2 && r <= SKY_RADIUS + SKY_DEPTH + 1e-2, "r = {}", r);
        }
        for &s in sky.sizes() {
            assert!((2.0..=4.0).contains(&s));
        }
    }

    #[test]
    fn star_colors_are_pale() {
        let sky = Starfield::generate(200, &mut seeded_rng(1));
        for c in sky.colors().chunks_exact(3) {
            for &ch in c {
                assert!(ch >= 0.8 - 1e-5 && ch <= 1.0 + 1e-5, "channel {}", ch);
            }
        }
    }

    #[test]
    fn twinkle_stays_in_range() {
        let mut sky = Starfield::generate(200, &mut seeded_rng(2));
        for f in 0..300 {
            sky.step(f as f32 * 0.1);
            assert!(sky.brightness().iter().all(|&b| (0.3 - 1e-5..=1.0 + 1e-5).contains(&b)));
        }
    }

    #[test]
    fn hue_wheel_primaries() {
        let red = hue_rgb(0.0, 0.5);
        assert!((red[0] - 1.0).abs() < 1e-6 && red[1].abs() < 1e-6 && red[2].abs() < 1e-6);
        let blue = hue_rgb(2.0 / 3.0, 0.5);
        assert!(blue[0].abs() < 1e-5 && blue[1].abs() < 1e-5 && (blue[2] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn aurora_turns_about_its_centre() {
        let mut a = Aurora::default();
        assert_eq!(a.point(0.0, 0.0), AURORA_CENTER);
        let corner0 = a.point(0.5, 0.5);
        a.step(50.0);
        assert!((a.angle() - 1.0).abs() < 1e-6);
        assert_eq!(a.point(0.0, 0.0), AURORA_CENTER);
        let corner1 = a.point(0.5, 0.5);
        assert!(distance(corner0, corner1) > 1.0);
        let half_diag = AURORA_WIDTH.hypot(AURORA_HEIGHT) / 2.0;
        assert!((distance(corner1, AURORA_CENTER) - half_diag).abs() < 1e-3);
    }
}
