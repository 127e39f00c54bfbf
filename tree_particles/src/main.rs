//! Headless explorer for the particle engine.
//! Seeds a scene, morphs it for N frames and fires wishes until every
//! firework has retired, printing what happened along the way.
//!
//! Usage: `tree_sim [--seed <n>] [--compact]`

use std::io::{self, Write};

use tracing_subscriber::EnvFilter;
use tree_particles::firework::FireworkManager;
use tree_particles::morph::MorphEngine;
use tree_particles::{entropy_rng, seeded_rng, Density, DisplayMode, SceneRng};

const DT: f32 = 1.0 / 60.0;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let seed = args
        .iter()
        .position(|a| a == "--seed")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse::<u64>().ok());
    let density = if args.iter().any(|a| a == "--compact") { Density::Compact } else { Density::Full };

    println!();
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║        Tree Particles — Headless Simulator           ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let rng = |offset: u64| -> SceneRng {
        match seed {
            Some(s) => seeded_rng(s.wrapping_add(offset)),
            None    => entropy_rng(),
        }
    };

    let mut engine = match MorphEngine::generate(density, &mut rng(0)) {
        Ok(e)  => e,
        Err(e) => {
            eprintln!("\n  ✗  Scene generation failed: {}\n", e);
            std::process::exit(1);
        }
    };
    let mut fireworks = FireworkManager::new(rng(1));
    let mut mode      = DisplayMode::Tree;
    let mut frame     = 0u64;
    let mut wishes    = 0u64;

    println!("  Scene   : {} particles, {} ornaments, {} ground, {} star glow",
        engine.group().len(), engine.ornaments().len(),
        engine.ground().len(), engine.star_glow().len());
    println!("  Seed    : {}", seed.map_or_else(|| "entropy".to_string(), |s| s.to_string()));
    println!();

    loop {
        print_menu(mode);
        let choice = read_line("Select (1–3, or q to quit): ");

        match choice.trim() {
            "q" | "Q" => { println!("\nGoodbye!\n"); break; }
            "1" => {
                mode = match mode {
                    DisplayMode::Tree    => DisplayMode::Explode,
                    DisplayMode::Explode => DisplayMode::Tree,
                };
                let n: u64 = read_line("  Frames to morph? (default 120): ")
                    .trim().parse().unwrap_or(120);
                let n = n.clamp(1, 100_000);

                println!();
                println!("  ┌─ morph → {} ({} frames) ─", mode.name(), n);
                let start = engine.group().max_distance_to(mode);
                println!("  │  distance at start : {:>9.4}", start);
                for i in 0..n {
                    engine.step(mode, 0.0, frame as f32 * DT);
                    frame += 1;
                    if (i + 1) % 30 == 0 || i + 1 == n {
                        println!("  │  frame {:>6}      : {:>9.4}", i + 1, engine.group().max_distance_to(mode));
                    }
                }
                println!("  │  star aura opacity : {:>9.3}", engine.star_glow().opacity());
                println!("  └─ group yaw {:.3} rad", engine.yaw());
                println!();
            }
            "2" => {
                let k: u64 = read_line("  Wishes to make? (default 1): ")
                    .trim().parse().unwrap_or(1);
                let k = k.clamp(1, 50);
                wishes += k;
                let spawned = fireworks.observe_wishes(wishes);

                println!();
                println!("  ┌─ {} wish(es) → {} firework(s) ─", k, spawned);
                let mut retired = 0;
                let mut frames  = 0u32;
                while !fireworks.is_empty() {
                    for id in fireworks.advance(DT) {
                        retired += 1;
                        println!("  │  {:<6} retired after {:>4} frames", id.to_string(), frames + 1);
                    }
                    frames += 1;
                }
                println!("  └─ {} retired in {:.2} s", retired, frames as f32 * DT);
                println!();
            }
            "3" => {
                let g = engine.group();
                println!();
                println!("  ┌─ status ─");
                println!("  │  mode           : {}", mode.name());
                println!("  │  frames run     : {}", frame);
                println!("  │  tree distance  : {:.4}", g.max_distance_to(DisplayMode::Tree));
                println!("  │  shell distance : {:.4}", g.max_distance_to(DisplayMode::Explode));
                println!("  │  wish counter   : {}", wishes);
                println!("  └─");
                println!();
            }
            _ => println!("  ⚠  Please enter 1–3 or q.\n"),
        }
    }
}

fn print_menu(mode: DisplayMode) {
    let target = match mode {
        DisplayMode::Tree    => DisplayMode::Explode,
        DisplayMode::Explode => DisplayMode::Tree,
    };
    println!("  ┌──────────────────────────────────────────────────────┐");
    println!("  │  1. Morph to {:40}│", target.name());
    println!("  │  2. {:49}│", "Make a wish (launch fireworks)");
    println!("  │  3. {:49}│", "Status");
    println!("  └──────────────────────────────────────────────────────┘");
    println!();
}

fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    io::stdout().flush().ok();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf
}
