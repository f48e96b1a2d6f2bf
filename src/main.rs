/*
 * Boids Compute
 *
 * Double-buffered compute simulation of flocking boids (or Conway's life).
 * Each frame the selected program reads the previous state buffer, writes the
 * next one together with the vertex attributes, and the buffers swap roles.
 *
 * With --headless the frame loop runs without a window for a fixed number of
 * frames; otherwise a nannou window shows the simulation with interactive
 * sliders, pan and zoom.
 */

use anyhow::Context;
use boids_compute::{app, Config, FrameScheduler};

// Surface size used when there is no window
const HEADLESS_SURFACE: (u32, u32) = (1280, 800);
const FPS_LOG_INTERVAL: u64 = 100;

fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("failed to read configuration")?;

    env_logger::Builder::from_default_env()
        .filter_level(config.log_level())
        .init();

    log::info!("seed {}", config.seed());

    if config.headless {
        return run_headless(&config);
    }

    app::run(config);
    Ok(())
}

fn run_headless(config: &Config) -> anyhow::Result<()> {
    let mut scheduler =
        FrameScheduler::from_config(config, HEADLESS_SURFACE).context("failed to start simulation")?;

    for frame in 1..=config.frames {
        scheduler
            .tick()
            .with_context(|| format!("simulation stopped at frame {}", frame))?;
        if frame % FPS_LOG_INTERVAL == 0 {
            log::info!("frame {}: {:.1} fps", frame, scheduler.fps());
        }
    }

    log::info!(
        "ran {} frames, {} parameter uploads",
        scheduler.tick_count(),
        scheduler.simulation_step().upload_count()
    );
    Ok(())
}
