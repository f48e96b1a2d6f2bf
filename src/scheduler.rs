/*
 * Frame Scheduler Module
 *
 * Drives the simulation loop. Each tick runs one full cycle:
 * 1. Stepping: advance the writable buffer from the readable one
 * 2. Rendering: draw the attributes the step just wrote
 * 3. Swapped: exchange buffer roles
 *
 * The scheduler owns the camera, the parameters and the frame-rate tracker,
 * so gesture handlers and the UI only touch them between ticks.
 */

use crate::camera::Camera;
use crate::config::Config;
use crate::debug::FpsTracker;
use crate::device::Device;
use crate::entity::{Boid, Variant};
use crate::error::SimResult;
use crate::generator::{generate, GenerateOptions};
use crate::params::SimulationParams;
use crate::program::ProgramRegistry;
use crate::reader::{read_boids, read_cells, request_readback, PendingReadback, RecordShape};
use crate::renderer::{DrawRecord, Renderer};
use crate::simulation::SimulationStep;
use crate::state::SimulationState;

// Records logged from the startup readback
const INITIAL_READBACK_PREVIEW: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    Stepping,
    Rendering,
    Swapped,
}

pub struct FrameScheduler {
    device: Device,
    options: GenerateOptions,
    state: SimulationState,
    step: SimulationStep,
    renderer: Renderer,
    camera: Camera,
    params: SimulationParams,
    fps: FpsTracker,
    phase: FramePhase,
    phase_log: Vec<FramePhase>,
    ticks: u64,
}

impl FrameScheduler {
    pub fn new(
        device: Device,
        programs: &ProgramRegistry,
        options: GenerateOptions,
        params: SimulationParams,
        surface: (u32, u32),
    ) -> SimResult<Self> {
        let state = generate(&device, &options)?.into_state();
        let step = SimulationStep::new(&device, programs, options.variant)?;
        let renderer = Renderer::new(&device, options.variant, surface)?;

        Ok(Self {
            device,
            options,
            state,
            step,
            renderer,
            camera: Camera::new(),
            params,
            fps: FpsTracker::new(),
            phase: FramePhase::Idle,
            phase_log: Vec::with_capacity(4),
            ticks: 0,
        })
    }

    // Build the whole pipeline on a headless device
    pub fn from_config(config: &Config, surface: (u32, u32)) -> SimResult<Self> {
        Self::from_device(Device::headless()?, config, surface)
    }

    // Build the whole pipeline from startup configuration
    pub fn from_device(device: Device, config: &Config, surface: (u32, u32)) -> SimResult<Self> {
        let limits = device.limits();
        log::info!(
            "device limits: max buffer {} bytes, max storage binding {} bytes, max texture {}",
            limits.max_buffer_size,
            limits.max_storage_buffer_binding_size,
            limits.max_texture_dimension_2d
        );

        let options = config.generate_options();
        log::info!(
            "simulating {} {:?} entities ({} bytes each)",
            options.population_size,
            options.variant,
            options.variant.bytes_per_entity()
        );

        let scheduler = Self::new(
            device,
            &ProgramRegistry::builtin(),
            options,
            config.simulation_params(),
            surface,
        )?;
        scheduler.log_initial_state()?;
        Ok(scheduler)
    }

    fn log_initial_state(&self) -> SimResult<()> {
        match self.options.variant {
            Variant::Flock => {
                let boids: Vec<Boid> = read_boids(&self.device, self.state.readable())?;
                for (i, boid) in boids.iter().take(INITIAL_READBACK_PREVIEW).enumerate() {
                    log::info!("boid {}: position {:?} velocity {:?}", i, boid.position, boid.velocity);
                }
            }
            Variant::Life => {
                let cells = read_cells(&self.device, self.state.readable())?;
                let alive = cells.iter().filter(|cell| cell.is_alive()).count();
                log::info!("life grid: {} of {} cells alive", alive, cells.len());
            }
        }
        Ok(())
    }

    fn enter(&mut self, phase: FramePhase) {
        self.phase = phase;
        self.phase_log.push(phase);
    }

    /// Run one step, render and swap. While paused only the render runs.
    pub fn tick(&mut self) -> SimResult<()> {
        self.phase_log.clear();
        let stepping = !self.params.pause_simulation;

        if stepping {
            self.enter(FramePhase::Stepping);
            let entity_count = self.state.entity_count();
            let (scope, attributes) = self.state.begin_step();
            self.step
                .step(&self.device, scope, attributes, &self.params, entity_count)?;
        }

        self.enter(FramePhase::Rendering);
        // Gestures after this point apply to the next frame
        let camera = self.camera;
        self.renderer.render(
            &self.device,
            self.state.entity_count(),
            self.state.attributes(),
            &camera,
        )?;

        if stepping {
            self.state.swap();
            self.enter(FramePhase::Swapped);
        }

        self.enter(FramePhase::Idle);
        self.fps.update();
        self.ticks += 1;
        Ok(())
    }

    // Regenerate state from a new seed, keeping parameters and camera
    pub fn reseed(&mut self, seed: i64) -> SimResult<()> {
        self.options.seed = seed;
        self.state = generate(&self.device, &self.options)?.into_state();
        log::info!("reseeded with {}", seed);
        Ok(())
    }

    // Out-of-band readback of the readable buffer
    pub fn request_readback(&self) -> SimResult<PendingReadback> {
        request_readback(
            &self.device,
            self.state.readable(),
            RecordShape::for_variant(self.options.variant),
        )
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    pub fn last_draw(&self) -> &DrawRecord {
        self.renderer.last_draw()
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    pub fn simulation_step(&self) -> &SimulationStep {
        &self.step
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut SimulationParams {
        &mut self.params
    }

    pub fn fps(&self) -> f32 {
        self.fps.fps()
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    // Phases entered during the last tick
    pub fn phase_log(&self) -> &[FramePhase] {
        &self.phase_log
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }
}
