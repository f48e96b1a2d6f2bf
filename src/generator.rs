/*
 * State Generator Module
 *
 * Builds the initial population on the device. The records are written once
 * into the front buffer and copied device-side into the back buffer, so both
 * halves of the double buffer start bit-identical. Generation blocks until the
 * device confirms both operations, which is the last synchronization point
 * before the frame loop starts.
 */

use std::f32::consts::TAU;

use nannou::wgpu;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::device::{check_capacity, Buffer, Device};
use crate::entity::{Boid, Cell, Variant, VERTEX_STRIDE};
use crate::error::{SimResult, SimulationError};
use crate::state::SimulationState;
use crate::WORLD_SIZE;

// How boid records are seeded
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum InitialLayout {
    /// Every coordinate of every boid holds the seed value.
    #[default]
    Literal,
    /// Positions spread over the world with unit headings, drawn from the seed.
    Scatter,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GenerateOptions {
    pub variant: Variant,
    pub population_size: u32,
    pub seed: i64,
    pub layout: InitialLayout,
    pub grid_width: u32,
    pub grid_height: u32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            variant: Variant::Flock,
            population_size: 1000,
            seed: 0,
            layout: InitialLayout::Literal,
            grid_width: 64,
            grid_height: 64,
        }
    }
}

impl GenerateOptions {
    pub fn validate(&self) -> SimResult<()> {
        if self.population_size == 0 {
            return Err(SimulationError::Configuration(
                "population size must be at least 1".to_string(),
            ));
        }
        if self.variant == Variant::Life {
            let cells = self.grid_width as u64 * self.grid_height as u64;
            if cells != self.population_size as u64 {
                return Err(SimulationError::Configuration(format!(
                    "life grid {}x{} holds {} cells, population is {}",
                    self.grid_width, self.grid_height, cells, self.population_size
                )));
            }
        }
        Ok(())
    }
}

/// Buffers produced by generation: the double-buffer pair plus the
/// zero-initialized render attributes.
#[derive(Debug)]
pub struct GeneratedState {
    pub front: Buffer,
    pub back: Buffer,
    pub attributes: Buffer,
    pub entity_count: u32,
}

impl GeneratedState {
    pub fn into_state(self) -> SimulationState {
        SimulationState::new(self.front, self.back, self.attributes, self.entity_count)
    }
}

// Host-side bytes of the initial population
pub fn initial_records(options: &GenerateOptions) -> Vec<u8> {
    let count = options.population_size as usize;
    let mut rng = ChaCha8Rng::seed_from_u64(options.seed as u64);

    match (options.variant, options.layout) {
        (Variant::Flock, InitialLayout::Literal) => {
            let boids = vec![Boid::splat(options.seed as f32); count];
            bytemuck::cast_slice(&boids).to_vec()
        }
        (Variant::Flock, InitialLayout::Scatter) => {
            let half_world = WORLD_SIZE / 2.0;
            let boids: Vec<Boid> = (0..count)
                .map(|_| {
                    let x = rng.gen_range(-half_world..half_world);
                    let y = rng.gen_range(-half_world..half_world);
                    let heading = rng.gen_range(0.0..TAU);
                    Boid {
                        position: [x, y, 0.0, 0.0],
                        velocity: [heading.cos(), heading.sin(), 0.0, 0.0],
                    }
                })
                .collect();
            bytemuck::cast_slice(&boids).to_vec()
        }
        // A random grid of 0s and 1s
        (Variant::Life, _) => {
            let cells: Vec<Cell> = (0..count)
                .map(|_| Cell {
                    alive: u32::from(rng.gen_bool(0.5)),
                })
                .collect();
            bytemuck::cast_slice(&cells).to_vec()
        }
    }
}

pub fn generate(device: &Device, options: &GenerateOptions) -> SimResult<GeneratedState> {
    options.validate()?;
    let variant = options.variant;
    let population = options.population_size as u64;
    check_capacity(population, variant.bytes_per_entity(), device.limits())?;

    let state_size = population * variant.entity_stride();
    let attribute_size = population * variant.vertices_per_entity() as u64 * VERTEX_STRIDE;
    let state_usage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST;

    let front = device.create_buffer("state buffer 1", state_size, state_usage)?;
    let back = device.create_buffer("state buffer 2", state_size, state_usage)?;
    let attributes = device.create_buffer(
        "vertices buffer",
        attribute_size,
        wgpu::BufferUsages::VERTEX
            | wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_SRC
            | wgpu::BufferUsages::COPY_DST,
    )?;

    device.write_buffer(&front, 0, &initial_records(options))?;
    let mut encoder = device.create_command_encoder("generate encoder");
    device.copy_buffer_to_buffer(&mut encoder, &front, &back, state_size)?;
    device.submit(encoder);
    device.on_submitted_work_done().wait()?;

    log::info!(
        "generated {} {:?} entities ({} bytes per state buffer, seed {}, layout {:?})",
        population,
        variant,
        state_size,
        options.seed,
        options.layout
    );

    Ok(GeneratedState {
        front,
        back,
        attributes,
        entity_count: options.population_size,
    })
}
