/*
 * Configuration Module
 *
 * Startup configuration parsed from the command line. Force strengths and the
 * vision distance are positive integers, as is the population size. Invalid
 * input is rejected here, before any device resource is allocated.
 */

use clap::Parser;
use rand::Rng;

use crate::camera::PanScale;
use crate::entity::Variant;
use crate::error::{SimResult, SimulationError};
use crate::generator::{GenerateOptions, InitialLayout};
use crate::params::{Boundary, SimulationParams};

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum PanPolicy {
    Fixed,
    ZoomTempered,
}

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "boids-compute", version, about = "Double-buffered compute simulation of flocking boids")]
pub struct Config {
    /// Number of entities (ignored for life, which uses the grid size)
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u32).range(1..))]
    pub population_size: u32,

    /// Generation seed; random when omitted
    #[arg(long, allow_negative_numbers = true)]
    pub seed: Option<i64>,

    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..))]
    pub separation: u32,

    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub alignment: u32,

    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub cohesion: u32,

    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..))]
    pub speed: u32,

    /// Neighbour radius in world units
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u32).range(1..))]
    pub vision_distance: u32,

    #[arg(long, value_enum, default_value_t = Variant::Flock)]
    pub variant: Variant,

    #[arg(long, default_value_t = 64, value_parser = clap::value_parser!(u32).range(1..))]
    pub grid_width: u32,

    #[arg(long, default_value_t = 64, value_parser = clap::value_parser!(u32).range(1..))]
    pub grid_height: u32,

    #[arg(long, value_enum, default_value_t = Boundary::Wrap)]
    pub boundary: Boundary,

    /// How boids are placed at generation
    #[arg(long, value_enum, default_value_t = InitialLayout::Literal)]
    pub layout: InitialLayout,

    #[arg(long, default_value_t = 1.0)]
    pub pan_scale: f32,

    #[arg(long, value_enum, default_value_t = PanPolicy::Fixed)]
    pub pan_policy: PanPolicy,

    /// Run without a window, logging frame rate
    #[arg(long)]
    pub headless: bool,

    /// Frames to run in headless mode
    #[arg(long, default_value_t = 600)]
    pub frames: u64,

    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    // Parse and validate; a missing seed is resolved once here
    pub fn from_args<I, T>(args: I) -> SimResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = <Self as Parser>::try_parse_from(args)
            .map_err(|e| SimulationError::Configuration(e.to_string()))?;
        config.resolved()
    }

    // Like `from_args` on the process arguments, but help and version exit
    pub fn from_env() -> SimResult<Self> {
        match <Self as Parser>::try_parse() {
            Ok(config) => config.resolved(),
            Err(e) if matches!(e.kind(), clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion) => {
                e.exit()
            }
            Err(e) => Err(SimulationError::Configuration(e.to_string())),
        }
    }

    fn resolved(mut self) -> SimResult<Self> {
        if self.seed.is_none() {
            self.seed = Some(rand::thread_rng().gen_range(0..=i64::from(i32::MAX)));
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> SimResult<()> {
        if !self.pan_scale.is_finite() || self.pan_scale <= 0.0 {
            return Err(SimulationError::Configuration(format!(
                "pan scale must be a positive number, got {}",
                self.pan_scale
            )));
        }
        if self.variant == Variant::Life && self.grid_width.checked_mul(self.grid_height).is_none() {
            return Err(SimulationError::Configuration(format!(
                "life grid {}x{} is too large",
                self.grid_width, self.grid_height
            )));
        }
        Ok(())
    }

    pub fn seed(&self) -> i64 {
        self.seed.unwrap_or_default()
    }

    pub fn population(&self) -> u32 {
        match self.variant {
            Variant::Flock => self.population_size,
            Variant::Life => self.grid_width.saturating_mul(self.grid_height),
        }
    }

    pub fn generate_options(&self) -> GenerateOptions {
        GenerateOptions {
            variant: self.variant,
            population_size: self.population(),
            seed: self.seed(),
            layout: self.layout,
            grid_width: self.grid_width,
            grid_height: self.grid_height,
        }
    }

    pub fn simulation_params(&self) -> SimulationParams {
        let mut params = SimulationParams::default();
        params.separation = self.separation as f32;
        params.alignment = self.alignment as f32;
        params.cohesion = self.cohesion as f32;
        params.speed = self.speed as f32;
        params.vision_distance = self.vision_distance as f32;
        params.grid_width = self.grid_width;
        params.grid_height = self.grid_height;
        params.boundary = self.boundary;
        params
    }

    pub fn pan_scale(&self) -> PanScale {
        match self.pan_policy {
            PanPolicy::Fixed => PanScale::Fixed(self.pan_scale),
            PanPolicy::ZoomTempered => PanScale::ZoomTempered(self.pan_scale),
        }
    }

    pub fn log_level(&self) -> log::LevelFilter {
        if self.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        }
    }
}
