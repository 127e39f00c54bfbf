//! Top-level application state machine.
//!
//! `AppState` owns the display mode, the `MorphEngine`, the
//! `FireworkManager`, the snow, the energy pulse rings and the sky.  The display mode is written only from
//! confirmed gesture transitions; everything else reads it.  `run` drives
//! the gesture session and the visualizer each frame.

use std::fs;
use std::path::Path;
use std::sync::mpsc;
use std::time::Instant;

use serde::Deserialize;
use tracing::info;

use tree_particles::atmosphere::Atmosphere;
use tree_particles::energy_pulse::EnergyPulse;
use tree_particles::firework::FireworkManager;
use tree_particles::morph::MorphEngine;
use tree_particles::snow::{Snow, SNOW_FLAKES};
use tree_particles::{entropy_rng, seeded_rng, Density, DisplayMode, SceneRng};

use crate::error::AppError;
use crate::gesture::GestureLabel;
use crate::landmarks::{LandmarkSource, SimInput};
use crate::session::GestureSession;
use crate::visualizer::{UiCommand, Visualizer};

/// Frame-time ceiling; longer stalls are treated as one slow frame.
const MAX_DT: f32 = 0.1;

// ════════════════════════════════════════════════════════════════════════════
// AppConfig
// ════════════════════════════════════════════════════════════════════════════

/// Configuration for the full application.  Every field may be omitted
/// from the JSON file.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Fixed seed for a reproducible scene; `None` draws from OS entropy.
    pub seed:         Option<u64>,
    pub density:      Density,
    /// Detection passes per second.
    pub inference_hz: f32,
    pub width:        usize,
    pub height:       usize,
    /// Start with snow falling.
    pub snow:         bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            seed:         None,
            density:      Density::Full,
            inference_hz: 30.0,
            width:        960,
            height:       640,
            snow:         false,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let text = fs::read_to_string(path)
            .map_err(|source| AppError::ConfigRead { path: path.to_path_buf(), source })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, AppError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Independent RNG streams for each subsystem, derived from the seed.
    fn rng(&self, stream: u64) -> SceneRng {
        match self.seed {
            Some(seed) => seeded_rng(seed.wrapping_add(stream)),
            None       => entropy_rng(),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// AppState
// ════════════════════════════════════════════════════════════════════════════

pub struct AppState {
    // ── mode signal ──────────────────────────────────────────────────────
    mode:       DisplayMode,

    // ── particle systems ─────────────────────────────────────────────────
    engine:     MorphEngine,
    fireworks:  FireworkManager,
    snow:       Snow,
    pulse:      EnergyPulse,
    sky:        Atmosphere,

    // ── wishes ───────────────────────────────────────────────────────────
    wish_count: u64,

    elapsed:    f32,

    // ── status message ────────────────────────────────────────────────────
    pub status: String,
}

impl AppState {
    pub fn new(cfg: &AppConfig) -> Result<Self, AppError> {
        let engine = MorphEngine::generate(cfg.density, &mut cfg.rng(0))?;
        let flakes = match cfg.density {
            Density::Full    => SNOW_FLAKES,
            Density::Compact => SNOW_FLAKES / 2,
        };
        let mut snow = Snow::generate(flakes, &mut cfg.rng(2));
        snow.set_active(cfg.snow);
        let pulse = EnergyPulse::generate(cfg.density.pulse_particles_per_ring(), &mut cfg.rng(3));
        let sky   = Atmosphere::generate(cfg.density.sky_stars(), &mut cfg.rng(4));

        Ok(AppState {
            mode:       DisplayMode::Tree,
            engine,
            fireworks:  FireworkManager::new(cfg.rng(1)),
            snow,
            pulse,
            sky,
            wish_count: 0,
            elapsed:    0.0,
            status:     "Ready: open your hand to scatter, close it to gather".to_string(),
        })
    }

    // ── inputs ────────────────────────────────────────────────────────────

    /// Apply a confirmed gesture transition.
    pub fn handle_gesture(&mut self, label: GestureLabel) {
        let mode = DisplayMode::from(label);
        if mode == self.mode {
            return;
        }
        info!(from = self.mode.name(), to = mode.name(), "display mode");
        self.mode = mode;
        self.status = match mode {
            DisplayMode::Tree    => "GATHER: the tree pulls itself together".to_string(),
            DisplayMode::Explode => "EXPLODE: move your open hand to spin".to_string(),
        };
    }

    pub fn make_wish(&mut self) {
        self.wish_count += 1;
        self.status = format!("Wish #{} made", self.wish_count);
    }

    pub fn toggle_snow(&mut self) {
        let on = self.snow.toggle();
        self.status = if on { "Snow on".to_string() } else { "Snow off".to_string() };
    }

    // ── Per-frame tick ────────────────────────────────────────────────────

    pub fn tick(&mut self, dt: f32, rotation_offset: f32) {
        let dt = dt.clamp(0.0, MAX_DT);
        self.elapsed += dt;
        self.engine.step(self.mode, rotation_offset, self.elapsed);
        self.fireworks.observe_wishes(self.wish_count);
        self.fireworks.advance(dt);
        self.snow.step(dt, self.elapsed);
        self.pulse.step(self.mode, self.elapsed);
        self.sky.step(self.elapsed);
    }

    // ── Accessors for the render loop ─────────────────────────────────────

    pub fn mode(&self)       -> DisplayMode      { self.mode }
    pub fn engine(&self)     -> &MorphEngine     { &self.engine }
    pub fn fireworks(&self)  -> &FireworkManager { &self.fireworks }
    pub fn snow(&self)       -> &Snow            { &self.snow }
    pub fn pulse(&self)      -> &EnergyPulse     { &self.pulse }
    pub fn sky(&self)        -> &Atmosphere      { &self.sky }
    pub fn wish_count(&self) -> u64              { self.wish_count }
    pub fn elapsed(&self)    -> f32              { self.elapsed }
}

// ════════════════════════════════════════════════════════════════════════════
// run(): the main application loop
// ════════════════════════════════════════════════════════════════════════════

/// Run the full application.
///
/// This is the entry point called from `main.rs`.  It creates the
/// visualizer, the landmark source (simulation by default, hardware with
/// `--features leap`), and drives the render loop at ~60 fps.  Gesture
/// failures never end the loop; only closing the window does.
pub fn run(cfg: AppConfig) -> Result<(), AppError> {
    // ── Sim input channel ─────────────────────────────────────────────────
    let (sim_tx, sim_rx) = mpsc::channel::<SimInput>();

    // ── Visualizer (owns the window and the sim input sender) ────────────
    let vis = Visualizer::new(cfg.width, cfg.height, sim_tx)?;

    // ── App state ─────────────────────────────────────────────────────────
    let app = AppState::new(&cfg)?;

    #[cfg(feature = "leap")]
    let source = {
        drop(sim_rx);
        crate::landmarks::LeapLandmarkSource::new()
    };
    #[cfg(not(feature = "leap"))]
    let source = crate::landmarks::SimLandmarkSource::new(sim_rx);

    let session = GestureSession::new(source, cfg.inference_hz, (cfg.width as f32, cfg.height as f32));
    drive(vis, app, session)
}

fn drive<S: LandmarkSource>(mut vis: Visualizer, mut app: AppState, mut session: GestureSession<S>) -> Result<(), AppError> {
    session.start(Instant::now());
    if let Some(notice) = session.take_notice() {
        app.status = notice;
    }

    let mut last = Instant::now();
    while vis.is_open() {
        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f32();
        last = now;

        // 1. Window input
        for cmd in vis.poll_input() {
            match cmd {
                UiCommand::Quit       => {
                    session.stop();
                    return Ok(());
                }
                UiCommand::Wish       => app.make_wish(),
                UiCommand::ToggleSnow => app.toggle_snow(),
            }
        }

        // 2. Inference callback, when due
        if let Some(label) = session.poll(now) {
            app.handle_gesture(label);
        }

        // 3. Per-frame logic
        app.tick(dt, session.rotation_offset());

        // 4. Render
        vis.render(&app, &session.cursor());
    }

    session.stop();
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn make_app() -> AppState {
        let cfg = AppConfig { seed: Some(11), density: Density::Compact, ..AppConfig::default() };
        AppState::new(&cfg).unwrap()
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let cfg = AppConfig::from_json(r#"{ "seed": 5, "density": "compact" }"#).unwrap();
        assert_eq!(cfg.seed, Some(5));
        assert_eq!(cfg.density, Density::Compact);
        assert_eq!(cfg.inference_hz, 30.0);
        assert_eq!(cfg.width, 960);
        assert_eq!(AppConfig::from_json("{}").unwrap(), AppConfig::default());
    }

    #[test]
    fn bad_config_is_an_error() {
        assert!(matches!(AppConfig::from_json("{ nope"), Err(AppError::ConfigParse(_))));
        assert!(matches!(
            AppConfig::load(Path::new("/definitely/not/here.json")),
            Err(AppError::ConfigRead { .. })
        ));
    }

    #[test]
    fn starts_gathered() {
        let app = make_app();
        assert_eq!(app.mode(), DisplayMode::Tree);
        assert!(app.fireworks().is_empty());
    }

    #[test]
    fn gesture_sets_mode() {
        let mut app = make_app();
        app.handle_gesture(GestureLabel::Explode);
        assert_eq!(app.mode(), DisplayMode::Explode);
        app.handle_gesture(GestureLabel::Gather);
        assert_eq!(app.mode(), DisplayMode::Tree);
    }

    #[test]
    fn tick_morphs_toward_active_mode() {
        let mut app = make_app();
        app.handle_gesture(GestureLabel::Explode);
        let before = app.engine().group().max_distance_to(DisplayMode::Explode);
        for _ in 0..30 {
            app.tick(1.0 / 60.0, 0.0);
        }
        assert!(app.engine().group().max_distance_to(DisplayMode::Explode) < before);
    }

    #[test]
    fn wish_launches_fireworks_on_next_tick() {
        let mut app = make_app();
        app.make_wish();
        assert!(app.fireworks().is_empty());
        app.tick(1.0 / 60.0, 0.0);
        assert!((1..=2).contains(&app.fireworks().len()));
        // same counter, no new launches
        let n = app.fireworks().len();
        app.tick(1.0 / 60.0, 0.0);
        assert_eq!(app.fireworks().len(), n);
    }

    #[test]
    fn snow_toggle() {
        let mut app = make_app();
        assert!(!app.snow().is_active());
        app.toggle_snow();
        assert!(app.snow().is_active());
        app.tick(1.0 / 60.0, 0.0);
        assert!(app.snow().opacity() > 0.0);
    }

    #[test]
    fn pulse_rings_dim_when_the_tree_explodes() {
        let mut app = make_app();
        for _ in 0..200 {
            app.tick(1.0 / 60.0, 0.0);
        }
        let lit: f32 = app.pulse().rings().iter().map(|r| r.opacity()).sum();
        app.handle_gesture(GestureLabel::Explode);
        for _ in 0..200 {
            app.tick(1.0 / 60.0, 0.0);
        }
        let dim: f32 = app.pulse().rings().iter().map(|r| r.opacity()).sum();
        assert!(dim < lit, "{} !< {}", dim, lit);
    }

    #[test]
    fn sky_turns_with_elapsed_time() {
        let mut app = make_app();
        assert_eq!(app.sky().aurora.angle(), 0.0);
        app.tick(0.05, 0.0);
        assert!(app.sky().aurora.angle() > 0.0);
        assert_eq!(app.sky().stars.len(), Density::Compact.sky_stars());
    }

    #[test]
    fn same_seed_same_scene() {
        let a = make_app();
        let b = make_app();
        assert_eq!(a.engine().group().live_positions(), b.engine().group().live_positions());
    }
}
