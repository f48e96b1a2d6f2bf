/*
 * Simulation Parameters Module
 *
 * This module defines the SimulationParams struct that holds the force
 * strengths, neighbour radius and grid settings fed to the rule programs.
 * Parameters are edited between ticks (UI sliders, reseed) and uploaded to the
 * device as a fixed-layout uniform record right before each dispatch. Snapshot
 * based change detection lets the UI tell when a force setting moved.
 */

use bytemuck::{Pod, Zeroable};

use crate::WORLD_SIZE;

// How the life grid treats neighbours beyond its edges
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Boundary {
    /// Edges join the opposite side of the grid.
    Wrap,
    /// Coordinates past an edge read the nearest in-grid cell.
    Clamp,
}

impl Boundary {
    fn code(self) -> u32 {
        match self {
            Boundary::Wrap => 0,
            Boundary::Clamp => 1,
        }
    }
}

/// Device-side layout of the per-dispatch parameters.
///
/// Field order and padding match the binding the rule programs read, so the
/// record is 48 bytes with no implicit padding.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ParamsUniform {
    pub separation: f32,
    pub alignment: f32,
    pub cohesion: f32,
    pub speed: f32,
    pub vision_distance: f32,
    pub max_force: f32,
    pub world_size: f32,
    pub grid_width: u32,
    pub grid_height: u32,
    pub boundary: u32,
    pub entity_count: u32,
    pub _pad: u32,
}

// Parameters for the simulation that can be adjusted via UI
#[derive(Clone, Debug)]
pub struct SimulationParams {
    pub separation: f32,
    pub alignment: f32,
    pub cohesion: f32,
    pub speed: f32,
    pub vision_distance: f32,
    pub max_force: f32,
    pub grid_width: u32,
    pub grid_height: u32,
    pub boundary: Boundary,
    pub show_debug: bool,
    pub pause_simulation: bool,

    // Internal state for tracking changes
    previous_values: Option<ParamSnapshot>,
}

// A snapshot of parameter values used for change detection
#[derive(Clone, Debug)]
struct ParamSnapshot {
    separation: f32,
    alignment: f32,
    cohesion: f32,
    speed: f32,
    vision_distance: f32,
    max_force: f32,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            separation: 2.0,
            alignment: 1.0,
            cohesion: 1.0,
            speed: 2.0,
            vision_distance: 50.0,
            max_force: 0.1,
            grid_width: 64,
            grid_height: 64,
            boundary: Boundary::Wrap,
            show_debug: false,
            pause_simulation: false,
            previous_values: None,
        }
    }
}

impl SimulationParams {
    // Pack the current values for upload alongside the entity count
    pub fn uniform(&self, entity_count: u32) -> ParamsUniform {
        ParamsUniform {
            separation: self.separation,
            alignment: self.alignment,
            cohesion: self.cohesion,
            speed: self.speed,
            vision_distance: self.vision_distance,
            max_force: self.max_force,
            world_size: WORLD_SIZE,
            grid_width: self.grid_width,
            grid_height: self.grid_height,
            boundary: self.boundary.code(),
            entity_count,
            _pad: 0,
        }
    }

    // Take a snapshot of current parameter values for change detection
    pub fn take_snapshot(&mut self) {
        self.previous_values = Some(ParamSnapshot {
            separation: self.separation,
            alignment: self.alignment,
            cohesion: self.cohesion,
            speed: self.speed,
            vision_distance: self.vision_distance,
            max_force: self.max_force,
        });
    }

    // Check if any force setting changed since the last snapshot
    pub fn detect_changes(&self) -> bool {
        let Some(prev) = &self.previous_values else {
            return false;
        };

        self.separation != prev.separation
            || self.alignment != prev.alignment
            || self.cohesion != prev.cohesion
            || self.speed != prev.speed
            || self.vision_distance != prev.vision_distance
            || self.max_force != prev.max_force
    }

    // Get parameter ranges for UI sliders
    pub fn get_weight_range() -> std::ops::RangeInclusive<f32> {
        0.0..=10.0
    }

    pub fn get_speed_range() -> std::ops::RangeInclusive<f32> {
        0.0..=20.0
    }

    pub fn get_vision_range() -> std::ops::RangeInclusive<f32> {
        1.0..=500.0
    }

    pub fn get_max_force_range() -> std::ops::RangeInclusive<f32> {
        0.0..=2.0
    }
}
