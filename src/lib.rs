/*
 * Boids Compute - Module Definitions
 *
 * This file defines the module structure of the simulation pipeline:
 * - device, program: wgpu device with buffers, queue and rule programs
 * - generator, state, simulation: initial state, double buffer and stepping
 * - reader: typed readback of device buffers and render targets
 * - renderer, camera, input, ui, app: presentation
 * - scheduler: the per-frame step/render/swap loop
 */

// Re-export key components for easier access
pub use camera::Camera;
pub use config::Config;
pub use entity::{Boid, Cell, Variant};
pub use error::{SimResult, SimulationError};
pub use params::SimulationParams;
pub use scheduler::FrameScheduler;

// Define modules
pub mod app;
pub mod camera;
pub mod config;
pub mod debug;
pub mod device;
pub mod entity;
pub mod error;
pub mod generator;
pub mod input;
pub mod params;
pub mod program;
pub mod reader;
pub mod renderer;
pub mod scheduler;
pub mod simulation;
pub mod state;
pub mod ui;

// Constants
pub const BOID_SIZE: f32 = 6.0;
pub const WORLD_SIZE: f32 = 5000.0;
pub const LIFE_CELL_SIZE: f32 = 8.0;
