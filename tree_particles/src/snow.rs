//! Toggleable snowfall.
//!
//! Flakes fall at their own speed, wrap back to the top of the volume and
//! sway sideways.  Toggling only changes the target opacity; the system
//! fades in or out at [`FADE_RATE`] and is not updated at all once fully
//! transparent.

use std::f32::consts::TAU;

use rand::Rng;

use crate::{hex_rgb, Rgb};

pub const SNOW_FLAKES: usize = 6_000;
/// Opacity change per second while fading.
pub const FADE_RATE:   f32 = 0.4;

const FLOOR:   f32 = -20.0;
const CEILING: f32 = 30.0;
const SWAY:    f32 = 0.003;

const WHITE: Rgb = hex_rgb(0xFFFFFF);
const BLUSH: Rgb = hex_rgb(0xFFF5F8);

pub struct Snow {
    positions: Vec<f32>,
    colors:    Vec<f32>,
    fall:      Vec<f32>,
    drift:     Vec<f32>,
    opacity:   f32,
    active:    bool,
}

impl Snow {
    pub fn generate<R: Rng>(count: usize, rng: &mut R) -> Self {
        let mut positions = Vec::with_capacity(count * 3);
        let mut colors    = Vec::with_capacity(count * 3);
        let mut fall      = Vec::with_capacity(count);
        let mut drift     = Vec::with_capacity(count);

        for _ in 0..count {
            positions.extend_from_slice(&[
                (rng.random::<f32>() - 0.5) * 60.0,
                rng.random::<f32>() * 50.0 - 10.0,
                (rng.random::<f32>() - 0.5) * 60.0,
            ]);
            fall.push(0.003 + rng.random::<f32>() * 0.007);
            drift.push(rng.random::<f32>() * TAU);
            let c = if rng.random::<f32>() > 0.85 { BLUSH } else { WHITE };
            colors.extend_from_slice(&c);
        }

        Snow { positions, colors, fall, drift, opacity: 0.0, active: false }
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn toggle(&mut self) -> bool {
        self.active = !self.active;
        self.active
    }

    /// Fade toward the toggle state, then move every flake one frame.
    pub fn step(&mut self, dt: f32, elapsed: f32) {
        let target = if self.active { 1.0 } else { 0.0 };
        if self.opacity < target {
            self.opacity = (self.opacity + FADE_RATE * dt).min(1.0);
        } else if self.opacity > target {
            self.opacity = (self.opacity - FADE_RATE * dt).max(0.0);
        }
        if self.opacity <= 0.0 {
            return;
        }

        for (i, p) in self.positions.chunks_exact_mut(3).enumerate() {
            p[1] -= self.fall[i];
            if p[1] < FLOOR {
                p[1] = CEILING;
            }
            p[0] += (elapsed * 0.3 + self.drift[i]).sin() * SWAY;
        }
    }

    pub fn len(&self) -> usize { self.fall.len() }
    pub fn is_empty(&self) -> bool { self.fall.is_empty() }
    pub fn is_active(&self) -> bool { self.active }
    pub fn opacity(&self) -> f32 { self.opacity }
    /// Nothing to draw.
    pub fn is_hidden(&self) -> bool { self.opacity <= 0.0 }
    pub fn positions(&self) -> &[f32] { &self.positions }
    pub fn colors(&self) -> &[f32] { &self.colors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeded_rng;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn generated_volume() {
        let snow = Snow::generate(1000, &mut seeded_rng(3));
        assert_eq!(snow.len(), 1000);
        assert!(snow.is_hidden());
        for p in snow.positions().chunks_exact(3) {
            assert!(p[0].abs() <= 30.0 && p[2].abs() <= 30.0);
            assert!((-10.0..=40.0).contains(&p[1]));
        }
    }

    #[test]
    fn inactive_snow_is_frozen() {
        let mut snow = Snow::generate(100, &mut seeded_rng(1));
        let before = snow.positions().to_vec();
        for f in 0..120 {
            snow.step(DT, f as f32 * DT);
        }
        assert_eq!(snow.positions(), &before[..]);
    }

    #[test]
    fn fades_in_and_out() {
        let mut snow = Snow::generate(10, &mut seeded_rng(2));
        snow.set_active(true);
        // 0.4/s reaches full opacity in 2.5 s
        for _ in 0..160 {
            snow.step(DT, 0.0);
        }
        assert_eq!(snow.opacity(), 1.0);
        assert!(!snow.toggle());
        for _ in 0..160 {
            snow.step(DT, 0.0);
        }
        assert_eq!(snow.opacity(), 0.0);
        assert!(snow.is_hidden());
    }

    #[test]
    fn flakes_wrap_to_the_top() {
        let mut snow = Snow::generate(200, &mut seeded_rng(4));
        snow.set_active(true);
        for f in 0..12_000 {
            snow.step(DT, f as f32 * DT);
        }
        for p in snow.positions().chunks_exact(3) {
            assert!(p[1] >= FLOOR && p[1] <= CEILING + 1e-3, "y = {}", p[1]);
        }
    }
}
