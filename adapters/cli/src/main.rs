#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs the Galton board overlay.

mod config;
mod scene;
mod simulation;

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use galton_board_rendering::{FrameInput, Presentation, RenderingBackend, Scene};
use galton_board_rendering_macroquad::MacroquadBackend;
use galton_board_system_analytics::metrics::{
    deviation_from_binomial_bps, format_leaders, mean_bin,
};
use galton_board_transport::{FeedConfig, GiftFeed, DEFAULT_FEED_URL};
use galton_board_world::query;
use tracing_subscriber::EnvFilter;

use self::{config::Overrides, simulation::Simulation};

const HEADLESS_FRAME: Duration = Duration::from_micros(16_667);

/// Galton board overlay driven by a live gift feed.
#[derive(Parser, Debug)]
#[command(name = "galton-board", version, about, long_about = None)]
struct Args {
    /// TOML file overriding the built-in simulation constants.
    #[arg(long)]
    config: Option<PathBuf>,
    /// WebSocket relay delivering gift payloads.
    #[arg(long, default_value = DEFAULT_FEED_URL)]
    url: String,
    /// Run without connecting to the relay.
    #[arg(long)]
    offline: bool,
    /// Seed for the random walk of the tokens.
    #[arg(long)]
    seed: Option<u64>,
    /// Number of token slots in the pool.
    #[arg(long)]
    pool_capacity: Option<usize>,
    /// Run this many frames without a window and print the final statistics.
    #[arg(long)]
    headless_frames: Option<u32>,
    /// Synthetic gifts injected on the first frames.
    #[arg(long, default_value_t = 0)]
    test_gifts: u32,
    /// Synchronise presentation with the display refresh rate.
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    vsync: bool,
    /// Log frame timing once per second.
    #[arg(long)]
    show_fps: bool,
    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    log: String,
}

/// Entry point for the Galton board command-line interface.
fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log);

    let config = config::load(args.config.as_deref())?;
    let config = config::apply_overrides(
        config,
        Overrides {
            seed: args.seed,
            pool_capacity: args.pool_capacity,
        },
    )?;

    let feed = if args.offline {
        None
    } else {
        let feed_config = FeedConfig::new(args.url.clone(), config.reconnect_delay());
        Some(GiftFeed::spawn(feed_config).context("failed to start the gift feed")?)
    };
    let simulation = Simulation::new(config, feed)?;

    match args.headless_frames {
        Some(frames) => run_headless(simulation, frames, args.test_gifts),
        None => run_windowed(simulation, &args),
    }
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_headless(mut simulation: Simulation, frames: u32, test_gifts: u32) -> Result<()> {
    for frame in 0..frames {
        let input = FrameInput {
            inject_test_gift: frame < test_gifts,
            ..FrameInput::default()
        };
        simulation.step(HEADLESS_FRAME, &input);
    }

    let report = simulation
        .latest_report()
        .cloned()
        .unwrap_or_else(|| query::stats_report(simulation.world()));

    println!("landed {} dropped {}", report.landed, report.dropped);
    println!(
        "distribution {}",
        report
            .distribution
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    );
    if let Some(mean) = mean_bin(&report.distribution) {
        println!("mean bin {mean:.2}");
    }
    if let Some(deviation) = deviation_from_binomial_bps(&report) {
        println!("binomial deviation {deviation} bps");
    }
    if !report.leaders.is_empty() {
        println!("{}", format_leaders(&report));
    }
    Ok(())
}

fn run_windowed(simulation: Simulation, args: &Args) -> Result<()> {
    let mut scene = Scene::new(query::surface(simulation.world()));
    scene::populate(&mut scene, simulation.world(), simulation.layout());
    let presentation = Presentation::new("Galton Board", scene::CLEAR_COLOR, scene);
    let backend = MacroquadBackend::new()
        .with_vsync(args.vsync)
        .with_show_fps(args.show_fps);

    let mut simulation = simulation;
    let mut test_gifts = args.test_gifts;
    backend.run(presentation, move |dt, mut input, scene| {
        if test_gifts > 0 {
            input.inject_test_gift = true;
            test_gifts -= 1;
        }
        simulation.step(dt, &input);
        scene::populate(scene, simulation.world(), simulation.layout());
    })
}
