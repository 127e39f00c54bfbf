//! hand_tree: interactive entry point.
//!
//! Usage: `hand_tree [--config <file.json>] [--seed <n>] [--compact]`

use std::io;
use std::path::Path;

use hand_tree::app::{run, AppConfig};
use tracing_subscriber::EnvFilter;
use tree_particles::Density;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║          Hand Tree — Gesture-Driven Particle Tree            ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    #[cfg(feature = "leap")]
    println!("  Mode: LeapMotion hardware");
    #[cfg(not(feature = "leap"))]
    println!("  Mode: Mouse simulation  (use --features leap for hardware)");
    println!();

    let args: Vec<String> = std::env::args().collect();
    let flag_value = |name: &str| {
        args.iter()
            .position(|a| a == name)
            .and_then(|i| args.get(i + 1))
            .cloned()
    };

    let mut cfg = match flag_value("--config") {
        Some(path) => match AppConfig::load(Path::new(&path)) {
            Ok(cfg) => cfg,
            Err(e)  => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        None => AppConfig::default(),
    };
    if let Some(seed) = flag_value("--seed") {
        match seed.parse() {
            Ok(s)  => cfg.seed = Some(s),
            Err(_) => eprintln!("  ⚠  Ignoring non-numeric seed {:?}", seed),
        }
    }
    if args.iter().any(|a| a == "--compact") {
        cfg.density = Density::Compact;
    }

    println!("  Scene: {:?} density, {} Hz gesture sampling", cfg.density, cfg.inference_hz);
    println!("  Opening window…");
    println!();

    if let Err(e) = run(cfg) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
