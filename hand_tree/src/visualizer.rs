//! Software-rendered visualizer using `minifb`.
//!
//! Every particle buffer is drawn as additive points through a simple
//! pinhole camera, so dense regions of the tree glow brighter.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ TREE  wishes 2  fireworks 3                              │
//! │  .     +      aurora + stars (far back)       .          │
//! │                  *           . fireworks (z = -5)        │
//! │                 /:\                                      │
//! │                /:::\    snow                             │
//! │               /:::::\        (o) hand cursor             │
//! │  ........... ground disc ...........                     │
//! │ ((( ((( pulse rings, lit while gathered ))) )))          │
//! │ status bar                                               │
//! │ key legend                                               │
//! └──────────────────────────────────────────────────────────┘
//! ```

use std::sync::mpsc::Sender;
use std::time::Duration;

use minifb::{Key, KeyRepeat, MouseMode, Window, WindowOptions};
use tree_particles::atmosphere::{Aurora, AURORA_COLOR, AURORA_OPACITY, AURORA_WIDTH};
use tree_particles::shapes::STAR_HEIGHT;
use tree_particles::{DisplayMode, Rgb, Vec3, OFFSCREEN};

use crate::app::AppState;
use crate::error::AppError;
use crate::landmarks::SimInput;
use crate::tracker::CursorState;

// ════════════════════════════════════════════════════════════════════════════
// Layout constants
// ════════════════════════════════════════════════════════════════════════════

const BG_COLOR:     u32 = 0xFF05030F;
const TEXT_BG:      u32 = 0xFF0F0A24;
const GOLD:         u32 = 0xFFFFD700;
const CURSOR_OPEN:  u32 = 0xFFEEEEEE;
const STATUS_H:     usize = 40;
const LABEL_SCALE:  usize = 2;

/// Camera eye, looking down -z.
const EYE: Vec3 = [0.0, 6.0, 34.0];
const NEAR: f32 = 0.5;

// ════════════════════════════════════════════════════════════════════════════
// Input
// ════════════════════════════════════════════════════════════════════════════

/// Window keys that act on the app rather than on the simulated hand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiCommand {
    Wish,
    ToggleSnow,
    Quit,
}

// ════════════════════════════════════════════════════════════════════════════
// Camera
// ════════════════════════════════════════════════════════════════════════════

/// Pinhole projection with an optional yaw applied to tree-local points.
#[derive(Clone, Copy, Debug)]
struct Camera {
    focal: f32,
    cx:    f32,
    cy:    f32,
    cos:   f32,
    sin:   f32,
}

impl Camera {
    fn new(width: usize, height: usize, yaw: f32) -> Self {
        Camera {
            focal: height as f32 * 1.1,
            cx:    width as f32 / 2.0,
            cy:    height as f32 / 2.0,
            cos:   yaw.cos(),
            sin:   yaw.sin(),
        }
    }

    fn spin(&self, p: Vec3) -> Vec3 {
        [p[0] * self.cos + p[2] * self.sin, p[1], -p[0] * self.sin + p[2] * self.cos]
    }

    /// Screen position and depth, or `None` behind the near plane.
    fn project(&self, p: Vec3) -> Option<(f32, f32, f32)> {
        let depth = EYE[2] - p[2];
        if depth < NEAR {
            return None;
        }
        let k = self.focal / depth;
        Some((self.cx + (p[0] - EYE[0]) * k, self.cy - (p[1] - EYE[1]) * k, depth))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Visualizer
// ════════════════════════════════════════════════════════════════════════════

pub struct Visualizer {
    window:    Window,
    buf:       Vec<u32>,
    width:     usize,
    height:    usize,
    sim_tx:    Sender<SimInput>,
    fist_down: bool,
    mouse:     Option<(f32, f32)>,
}

impl Visualizer {
    pub fn new(width: usize, height: usize, sim_tx: Sender<SimInput>) -> Result<Self, AppError> {
        let mut window = Window::new(
            "Hand Tree — gesture particle tree",
            width, height,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        ).map_err(|e| AppError::Window(e.to_string()))?;

        window.limit_update_rate(Some(Duration::from_millis(16))); // ~60fps

        Ok(Visualizer {
            window,
            buf: vec![BG_COLOR; width * height],
            width,
            height,
            sim_tx,
            fist_down: false,
            mouse: None,
        })
    }

    pub fn is_open(&self) -> bool { self.window.is_open() }

    /// Forward mouse and hand keys to the simulated source; return the
    /// app-level commands pressed this frame.
    pub fn poll_input(&mut self) -> Vec<UiCommand> {
        let mut cmds = Vec::new();
        if !self.window.is_open() {
            cmds.push(UiCommand::Quit);
            return cmds;
        }

        let one_shot = |k: Key| self.window.is_key_pressed(k, KeyRepeat::No);
        let quit        = one_shot(Key::Q) || one_shot(Key::Escape);
        let wish        = one_shot(Key::W);
        let snow        = one_shot(Key::N);
        let toggle_hand = one_shot(Key::H);
        let fist        = self.window.is_key_down(Key::Space);
        let mouse       = self.window.get_mouse_pos(MouseMode::Clamp);

        if quit { cmds.push(UiCommand::Quit); }
        if wish { cmds.push(UiCommand::Wish); }
        if snow { cmds.push(UiCommand::ToggleSnow); }

        if toggle_hand {
            let _ = self.sim_tx.send(SimInput::ToggleHand);
        }
        if fist != self.fist_down {
            self.fist_down = fist;
            let _ = self.sim_tx.send(SimInput::Fist(fist));
        }
        if mouse.is_some() && mouse != self.mouse {
            self.mouse = mouse;
            if let Some((mx, my)) = mouse {
                // the camera sees a mirror image, so undo the cursor mirroring
                let _ = self.sim_tx.send(SimInput::Pointer {
                    x: 1.0 - mx / self.width as f32,
                    y: my / self.height as f32,
                });
            }
        }
        cmds
    }

    /// Render one frame.
    pub fn render(&mut self, app: &AppState, cursor: &CursorState) {
        self.buf.fill(BG_COLOR);

        let engine = app.engine();
        let cam    = Camera::new(self.width, self.height, engine.yaw());
        let world  = Camera { cos: 1.0, sin: 0.0, ..cam };

        // ── Sky ───────────────────────────────────────────────────────────
        let sky = app.sky();
        self.draw_aurora(&world, &sky.aurora);
        let stars = &sky.stars;
        for (i, (p, c)) in stars.positions().chunks_exact(3).zip(stars.colors().chunks_exact(3)).enumerate() {
            if let Some((x, y, _)) = world.project([p[0], p[1], p[2]]) {
                let rgb = [c[0], c[1], c[2]];
                let gain = 0.8 * stars.brightness()[i];
                if stars.sizes()[i] > 3.5 {
                    self.add_disc(x, y, 1.0, rgb, gain * 0.5);
                } else {
                    self.add_point(x, y, rgb, gain);
                }
            }
        }

        // ── Energy pulse rings ────────────────────────────────────────────
        for ring in app.pulse().rings() {
            if ring.opacity() < 0.01 { continue; }
            for (p, c) in ring.positions().chunks_exact(3).zip(ring.colors().chunks_exact(3)) {
                if let Some((x, y, _)) = world.project(ring.place([p[0], p[1], p[2]])) {
                    self.add_point(x, y, [c[0], c[1], c[2]], ring.opacity());
                }
            }
        }

        // ── Ground ────────────────────────────────────────────────────────
        let ground = engine.ground();
        self.draw_cloud(&cam, &ground.positions, &ground.colors, 2.5);

        // ── Tree particles ────────────────────────────────────────────────
        let group = engine.group();
        self.draw_cloud(&cam, group.live_positions(), group.colors(), 0.55);

        // ── Ornaments ─────────────────────────────────────────────────────
        for orn in engine.ornaments() {
            if let Some((x, y, depth)) = cam.project(cam.spin(orn.position())) {
                let r = (orn.scale() * cam.focal / depth).clamp(1.0, 6.0);
                self.add_disc(x, y, r, orn.color(), 0.9);
            }
        }

        // ── Star and its aura ─────────────────────────────────────────────
        let glow = engine.star_glow();
        if glow.opacity() > 0.01 {
            for (i, (p, c)) in glow.positions().chunks_exact(3).zip(glow.colors().chunks_exact(3)).enumerate() {
                let at = cam.spin([p[0], p[1] + STAR_HEIGHT, p[2]]);
                if let Some((x, y, _)) = cam.project(at) {
                    self.add_point(x, y, [c[0], c[1], c[2]], glow.intensities()[i] * glow.opacity());
                }
            }
            if let Some((x, y, _)) = cam.project(cam.spin([0.0, STAR_HEIGHT, 0.0])) {
                let r = 6.0 * glow.opacity();
                self.draw_diamond(x, y, r, GOLD);
            }
        }

        // ── Snow ──────────────────────────────────────────────────────────
        let snow = app.snow();
        if !snow.is_hidden() {
            self.draw_cloud(&world, snow.positions(), snow.colors(), 0.7 * snow.opacity());
        }

        // ── Fireworks ─────────────────────────────────────────────────────
        for fw in app.fireworks().iter() {
            let head = fw.rocket();
            if head != OFFSCREEN {
                if let Some((x, y, _)) = world.project(head) {
                    self.add_glow(x, y, fw.light_intensity() * 0.4, fw.palette()[0]);
                    self.add_disc(x, y, 1.5, [1.0, 0.95, 0.8], 1.0);
                }
            }
            for tp in fw.trail().visible() {
                if tp.life <= 0.0 { continue; }
                if let Some((x, y, _)) = world.project(tp.position) {
                    self.add_point(x, y, fw.palette()[0], tp.life * 0.8);
                }
            }
            let positions = fw.spark_positions().chunks_exact(3);
            let colors    = fw.spark_colors().chunks_exact(3);
            for ((p, c), &size) in positions.zip(colors).zip(fw.spark_sizes()) {
                if size <= 0.0 { continue; }
                if let Some((x, y, depth)) = world.project([p[0], p[1], p[2]]) {
                    let r = (size * world.focal / depth * 0.5).clamp(0.5, 4.0);
                    self.add_disc(x, y, r, [c[0], c[1], c[2]], 1.0);
                }
            }
        }

        // ── Hand cursor ───────────────────────────────────────────────────
        if cursor.visible {
            if cursor.grabbing {
                self.fill_circle(cursor.x, cursor.y, 9.0, GOLD);
            } else {
                self.draw_ring(cursor.x, cursor.y, 14.0, CURSOR_OPEN);
            }
        }

        // ── Header ────────────────────────────────────────────────────────
        let mode = match app.mode() {
            DisplayMode::Tree    => "TREE",
            DisplayMode::Explode => "EXPLODE",
        };
        let header = format!("{}   wishes {}   fireworks {}", mode, app.wish_count(), app.fireworks().len());
        self.draw_label(&header, 12, 12, 0xFFFFD7E0);

        // ── Status bar ────────────────────────────────────────────────────
        let status_y = self.height.saturating_sub(STATUS_H);
        self.fill_rect(0, status_y, self.width, STATUS_H, TEXT_BG);
        self.draw_label(&app.status, 10, status_y + 6, 0xFFEEEEEE);

        // ── Key legend ────────────────────────────────────────────────────
        #[cfg(not(feature = "leap"))]
        let legend = "mouse=hand  space=fist  h=hide hand  w=wish  n=snow  q=quit";
        #[cfg(feature = "leap")]
        let legend = "w=wish  n=snow  q=quit";
        self.draw_label(legend, 10, status_y + 24, 0xFF888888);

        self.window.update_with_buffer(&self.buf, self.width, self.height).ok();
    }

    // ── Point clouds ──────────────────────────────────────────────────────

    fn draw_cloud(&mut self, cam: &Camera, positions: &[f32], colors: &[f32], gain: f32) {
        for (p, c) in positions.chunks_exact(3).zip(colors.chunks_exact(3)) {
            if let Some((x, y, _)) = cam.project(cam.spin([p[0], p[1], p[2]])) {
                self.add_point(x, y, [c[0], c[1], c[2]], gain);
            }
        }
    }

    /// Translucent sheet, sampled on a grid of projected cells.
    fn draw_aurora(&mut self, cam: &Camera, aurora: &Aurora) {
        const COLS: usize = 50;
        const ROWS: usize = 20;
        for row in 0..ROWS {
            for col in 0..COLS {
                let u = (col as f32 + 0.5) / COLS as f32 - 0.5;
                let v = (row as f32 + 0.5) / ROWS as f32 - 0.5;
                if let Some((x, y, depth)) = cam.project(aurora.point(u, v)) {
                    let half = (AURORA_WIDTH / COLS as f32) * cam.focal / depth * 0.5;
                    self.add_square(x, y, half, AURORA_COLOR, AURORA_OPACITY);
                }
            }
        }
    }

    // ── Primitive drawing helpers ─────────────────────────────────────────

    fn add_point(&mut self, x: f32, y: f32, rgb: Rgb, gain: f32) {
        if x < 0.0 || y < 0.0 { return; }
        let (x, y) = (x as usize, y as usize);
        if x < self.width && y < self.height {
            let i = y * self.width + x;
            self.buf[i] = add_rgb(self.buf[i], rgb, gain);
        }
    }

    fn add_square(&mut self, cx: f32, cy: f32, half: f32, rgb: Rgb, gain: f32) {
        let h = half.ceil() as isize;
        for dy in -h..h {
            for dx in -h..h {
                self.add_point(cx + dx as f32, cy + dy as f32, rgb, gain);
            }
        }
    }

    fn add_disc(&mut self, cx: f32, cy: f32, r: f32, rgb: Rgb, gain: f32) {
        let ri = r.ceil() as isize;
        for dy in -ri..=ri {
            for dx in -ri..=ri {
                if (dx * dx + dy * dy) as f32 <= r * r {
                    self.add_point(cx + dx as f32, cy + dy as f32, rgb, gain);
                }
            }
        }
    }

    /// Soft radial halo; brightness falls off linearly to the rim.
    fn add_glow(&mut self, cx: f32, cy: f32, r: f32, rgb: Rgb) {
        if r < 1.0 { return; }
        let ri = r.ceil() as isize;
        for dy in -ri..=ri {
            for dx in -ri..=ri {
                let d = ((dx * dx + dy * dy) as f32).sqrt();
                if d < r {
                    self.add_point(cx + dx as f32, cy + dy as f32, rgb, 0.12 * (1.0 - d / r));
                }
            }
        }
    }

    fn fill_circle(&mut self, cx: f32, cy: f32, r: f32, color: u32) {
        let ri = r.ceil() as isize;
        for dy in -ri..=ri {
            for dx in -ri..=ri {
                if (dx * dx + dy * dy) as f32 <= r * r {
                    self.set_pixel_f(cx + dx as f32, cy + dy as f32, color);
                }
            }
        }
    }

    fn draw_ring(&mut self, cx: f32, cy: f32, r: f32, color: u32) {
        let steps = (r * 8.0) as usize;
        for i in 0..steps {
            let a = i as f32 / steps as f32 * std::f32::consts::TAU;
            self.set_pixel_f(cx + a.cos() * r, cy + a.sin() * r, color);
        }
    }

    fn draw_diamond(&mut self, cx: f32, cy: f32, r: f32, color: u32) {
        let ri = r.round() as isize;
        for dy in -ri..=ri {
            let w = ri - dy.abs();
            for dx in -w..=w {
                self.set_pixel_f(cx + dx as f32, cy + dy as f32, color);
            }
        }
    }

    fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        for row in y..(y + h).min(self.height) {
            for col in x..(x + w).min(self.width) {
                self.buf[row * self.width + col] = color;
            }
        }
    }

    fn set_pixel(&mut self, x: usize, y: usize, color: u32) {
        if x < self.width && y < self.height {
            self.buf[y * self.width + x] = color;
        }
    }

    fn set_pixel_f(&mut self, x: f32, y: f32, color: u32) {
        if x >= 0.0 && y >= 0.0 {
            self.set_pixel(x as usize, y as usize, color);
        }
    }

    /// Minimal bitmap font: 3×5 characters, drawn at `LABEL_SCALE`.
    /// Each character is encoded as 5 rows × 3 bits.
    fn draw_label(&mut self, text: &str, x: usize, y: usize, color: u32) {
        let s = LABEL_SCALE;
        let mut cx = x;
        for ch in text.chars() {
            let glyph = char_glyph(ch);
            for (row, &bits) in glyph.iter().enumerate() {
                for col in 0..3usize {
                    if bits & (1 << (2 - col)) != 0 {
                        self.fill_rect(cx + col * s, y + row * s, s, s, color);
                    }
                }
            }
            cx += 4 * s; // 3 wide + 1 gap
            if cx + 4 * s > self.width { break; }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Colour helpers
// ────────────────────────────────────────────────────────────────────────────

/// Additive blend of a linear colour into an ARGB pixel, saturating.
fn add_rgb(dst: u32, rgb: Rgb, gain: f32) -> u32 {
    let add = |shift: u32, c: f32| {
        let base = (dst >> shift) & 0xFF;
        let inc  = (c * gain * 255.0).max(0.0) as u32;
        (base + inc).min(0xFF) << shift
    };
    0xFF000000 | add(16, rgb[0]) | add(8, rgb[1]) | add(0, rgb[2])
}

// ────────────────────────────────────────────────────────────────────────────
// Minimal 3×5 bitmap font
// ────────────────────────────────────────────────────────────────────────────

fn char_glyph(c: char) -> [u8; 5] {
    match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'a' | 'A' => [0b111, 0b101, 0b111, 0b101, 0b101],
        'b' | 'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'c' | 'C' => [0b111, 0b100, 0b100, 0b100, 0b111],
        'd' | 'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'e' | 'E' => [0b111, 0b100, 0b111, 0b100, 0b111],
        'f' | 'F' => [0b111, 0b100, 0b111, 0b100, 0b100],
        'g' | 'G' => [0b111, 0b100, 0b101, 0b101, 0b111],
        'h' | 'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'i' | 'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'j' | 'J' => [0b001, 0b001, 0b001, 0b101, 0b111],
        'k' | 'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'l' | 'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'm' | 'M' => [0b101, 0b111, 0b101, 0b101, 0b101],
        'n' | 'N' => [0b111, 0b101, 0b101, 0b101, 0b101],
        'o' | 'O' => [0b111, 0b101, 0b101, 0b101, 0b111],
        'p' | 'P' => [0b111, 0b101, 0b111, 0b100, 0b100],
        'q' | 'Q' => [0b111, 0b101, 0b101, 0b111, 0b001],
        'r' | 'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        's' | 'S' => [0b111, 0b100, 0b111, 0b001, 0b111],
        't' | 'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'u' | 'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'v' | 'V' => [0b101, 0b101, 0b101, 0b010, 0b010],
        'w' | 'W' => [0b101, 0b101, 0b101, 0b111, 0b101],
        'x' | 'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'y' | 'Y' => [0b101, 0b101, 0b111, 0b010, 0b010],
        'z' | 'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '#' => [0b101, 0b111, 0b101, 0b111, 0b101],
        '!' => [0b010, 0b010, 0b010, 0b000, 0b010],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        ' ' => [0b000, 0b000, 0b000, 0b000, 0b000],
        _   => [0b000, 0b000, 0b010, 0b000, 0b000], // fallback dot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn additive_blend_saturates() {
        assert_eq!(add_rgb(0xFF000000, [1.0, 0.0, 0.0], 1.0), 0xFFFF0000);
        assert_eq!(add_rgb(0xFFF00000, [1.0, 0.0, 0.0], 1.0), 0xFFFF0000);
        assert_eq!(add_rgb(0xFF101010, [0.0, 0.0, 0.0], 5.0), 0xFF101010);
        // negative gain never darkens
        assert_eq!(add_rgb(0xFF101010, [1.0, 1.0, 1.0], -1.0), 0xFF101010);
    }

    #[test]
    fn camera_projects_origin_below_centre() {
        let cam = Camera::new(800, 600, 0.0);
        let (x, y, depth) = cam.project([0.0, 0.0, 0.0]).unwrap();
        assert_eq!(x, 400.0);
        assert!(y > 300.0, "eye is above the origin");
        assert_eq!(depth, EYE[2]);
    }

    #[test]
    fn points_behind_camera_are_culled() {
        let cam = Camera::new(800, 600, 0.0);
        assert!(cam.project([0.0, 0.0, EYE[2] + 1.0]).is_none());
    }

    #[test]
    fn spin_preserves_radius() {
        let cam = Camera::new(10, 10, 1.3);
        let p = cam.spin([3.0, 2.0, 4.0]);
        assert!(((p[0] * p[0] + p[2] * p[2]).sqrt() - 5.0).abs() < 1e-5);
        assert_eq!(p[1], 2.0);
    }

    #[test]
    fn every_letter_has_a_glyph() {
        let fallback = char_glyph('\u{1}');
        for c in 'a'..='z' {
            assert_ne!(char_glyph(c), fallback, "{}", c);
        }
    }
}
