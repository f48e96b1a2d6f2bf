// End-to-end checks of generation, stepping, readback and the frame loop

use boids_compute::device::{Device, DeviceLimits};
use boids_compute::entity::{Boid, Cell, Variant};
use boids_compute::generator::{generate, GenerateOptions, InitialLayout};
use boids_compute::params::{Boundary, SimulationParams};
use boids_compute::program::ProgramRegistry;
use boids_compute::reader::{read_boids, read_cells};
use boids_compute::scheduler::FrameScheduler;
use boids_compute::simulation::SimulationStep;
use boids_compute::state::SimulationState;
use boids_compute::{Config, SimulationError, WORLD_SIZE};
use nannou::prelude::*;

// Machines without a compute-capable adapter skip device tests
fn device() -> Option<Device> {
    match Device::headless() {
        Ok(device) => Some(device),
        Err(e) => {
            eprintln!("skipping device test: {e}");
            None
        }
    }
}

fn scatter(population_size: u32, seed: i64) -> GenerateOptions {
    GenerateOptions {
        population_size,
        seed,
        layout: InitialLayout::Scatter,
        ..GenerateOptions::default()
    }
}

fn life(width: u32, height: u32) -> GenerateOptions {
    GenerateOptions {
        variant: Variant::Life,
        population_size: width * height,
        grid_width: width,
        grid_height: height,
        ..GenerateOptions::default()
    }
}

fn run_step(device: &Device, state: &mut SimulationState, step: &mut SimulationStep, params: &SimulationParams) {
    let entity_count = state.entity_count();
    let (scope, attributes) = state.begin_step();
    step.step(device, scope, attributes, params, entity_count).unwrap();
    state.swap();
}

// B3/S23 on the host, for comparison with the device kernel
fn life_reference(cells: &[Cell], width: u32, height: u32, boundary: Boundary) -> Vec<Cell> {
    let (w, h) = (width as i64, height as i64);
    let at = |x: i64, y: i64| -> u32 {
        let (x, y) = match boundary {
            Boundary::Wrap => (x.rem_euclid(w), y.rem_euclid(h)),
            Boundary::Clamp => (x.clamp(0, w - 1), y.clamp(0, h - 1)),
        };
        cells[(y * w + x) as usize].alive.min(1)
    };

    (0..w * h)
        .map(|i| {
            let (x, y) = (i % w, i / w);
            let mut neighbors = 0;
            for dy in -1..=1 {
                for dx in -1..=1 {
                    if dx != 0 || dy != 0 {
                        neighbors += at(x + dx, y + dy);
                    }
                }
            }
            let alive = matches!((cells[i as usize].is_alive(), neighbors), (true, 2) | (_, 3));
            Cell { alive: <u32 as From<bool>>::from(alive) }
        })
        .collect()
}

#[test]
fn seed_zero_population_stays_at_origin() {
    let Some(device) = device() else { return };
    let config = Config::from_args([
        "boids-compute",
        "--seed",
        "0",
        "--population-size",
        "3",
        "--headless",
    ])
    .unwrap();
    let mut scheduler = FrameScheduler::from_device(device, &config, (640, 480)).unwrap();

    let initial = read_boids(scheduler.device(), scheduler.state().readable()).unwrap();
    assert_eq!(initial, vec![Boid::splat(0.0); 3]);

    // Coincident boids are not neighbours, so nothing moves
    for _ in 0..3 {
        scheduler.tick().unwrap();
    }
    let stepped = read_boids(scheduler.device(), scheduler.state().readable()).unwrap();
    assert_eq!(stepped, vec![Boid::splat(0.0); 3]);
}

#[test]
fn zero_strength_step_from_seed_zero_is_exact() {
    let Some(device) = device() else { return };
    let options = GenerateOptions {
        population_size: 3,
        seed: 0,
        ..GenerateOptions::default()
    };
    let mut state = generate(&device, &options).unwrap().into_state();
    let initial = read_boids(&device, state.readable()).unwrap();
    assert_eq!(initial.len(), 3);
    assert!(initial.iter().all(|boid| *boid == Boid::default()));

    let mut params = SimulationParams::default();
    params.separation = 0.0;
    params.alignment = 0.0;
    params.cohesion = 0.0;
    let mut step = SimulationStep::new(&device, &ProgramRegistry::builtin(), Variant::Flock).unwrap();
    run_step(&device, &mut state, &mut step, &params);

    let stepped = read_boids(&device, state.readable()).unwrap();
    for (before, after) in initial.iter().zip(&stepped) {
        assert_eq!(after.velocity(), Vec3::ZERO);
        assert_eq!(after.position, before.position);
    }
}

#[test]
fn generated_buffers_are_identical() {
    let Some(device) = device() else { return };
    let generated = generate(&device, &scatter(64, 11)).unwrap();
    let front = read_boids(&device, &generated.front).unwrap();
    let back = read_boids(&device, &generated.back).unwrap();
    assert_eq!(front.len(), 64);
    assert_eq!(bytemuck::cast_slice::<Boid, u8>(&front), bytemuck::cast_slice::<Boid, u8>(&back));
}

#[test]
fn zero_strengths_keep_velocity() {
    let Some(device) = device() else { return };
    let mut state = generate(&device, &scatter(32, 3)).unwrap().into_state();
    let mut step = SimulationStep::new(&device, &ProgramRegistry::builtin(), Variant::Flock).unwrap();

    let mut params = SimulationParams::default();
    params.separation = 0.0;
    params.alignment = 0.0;
    params.cohesion = 0.0;

    let before = read_boids(&device, state.readable()).unwrap();
    run_step(&device, &mut state, &mut step, &params);
    let after = read_boids(&device, state.readable()).unwrap();

    let half_world = WORLD_SIZE / 2.0;
    for (old, new) in before.iter().zip(&after) {
        assert_eq!(old.velocity(), new.velocity());
        assert!(new.position().x.abs() <= half_world);
        assert!(new.position().y.abs() <= half_world);
    }
}

#[test]
fn flock_kernel_matches_host_rule() {
    let Some(device) = device() else { return };
    let mut state = generate(&device, &scatter(16, 8)).unwrap().into_state();
    let mut step = SimulationStep::new(&device, &ProgramRegistry::builtin(), Variant::Flock).unwrap();
    let params = SimulationParams::default();

    // A tight cluster so every boid sees several neighbours
    let boids: Vec<Boid> = (0..16)
        .map(|i| {
            let angle = i as f32 * 0.7;
            Boid::new(
                vec3((i % 4) as f32 * 9.0, (i / 4) as f32 * 7.0, 0.0),
                vec3(angle.cos(), angle.sin(), 0.0),
            )
        })
        .collect();
    device
        .write_buffer(state.readable(), 0, bytemuck::cast_slice(&boids))
        .unwrap();

    run_step(&device, &mut state, &mut step, &params);
    let stepped = read_boids(&device, state.readable()).unwrap();

    let uniform = params.uniform(16);
    for (boid, actual) in boids.iter().zip(&stepped) {
        let expected = boid.flock(&boids, &uniform);
        assert!(actual.position().distance(expected.position()) < 1e-3);
        assert!(actual.velocity().distance(expected.velocity()) < 1e-3);
    }
}

#[test]
fn step_reads_one_buffer_and_writes_the_other() {
    let Some(device) = device() else { return };
    let mut state = generate(&device, &scatter(16, 5)).unwrap().into_state();
    let mut step = SimulationStep::new(&device, &ProgramRegistry::builtin(), Variant::Flock).unwrap();

    let before = read_boids(&device, state.readable()).unwrap();
    let (scope, attributes) = state.begin_step();
    step.step(&device, scope, attributes, &SimulationParams::default(), 16)
        .unwrap();

    // Readable is untouched until the swap
    assert_eq!(state.readable_slot(), 0);
    assert_eq!(read_boids(&device, state.readable()).unwrap(), before);

    state.swap();
    let after = read_boids(&device, state.readable()).unwrap();
    assert_eq!(state.readable_slot(), 1);
    assert_eq!(after.len(), before.len());
    assert!(after.iter().zip(&before).all(|(new, old)| new.position != old.position));
}

#[test]
fn blinker_oscillates_through_the_frame_loop() {
    let Some(device) = device() else { return };
    let mut params = SimulationParams::default();
    params.grid_width = 5;
    params.grid_height = 5;

    let mut scheduler =
        FrameScheduler::new(device, &ProgramRegistry::builtin(), life(5, 5), params, (640, 480)).unwrap();

    let horizontal = [11usize, 12, 13];
    let vertical = [7usize, 12, 17];
    let mut cells = vec![Cell { alive: 0 }; 25];
    for &i in &horizontal {
        cells[i].alive = 1;
    }
    scheduler
        .device()
        .write_buffer(scheduler.state().readable(), 0, bytemuck::cast_slice(&cells))
        .unwrap();

    let alive = |scheduler: &FrameScheduler| -> Vec<usize> {
        read_cells(scheduler.device(), scheduler.state().readable())
            .unwrap()
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_alive())
            .map(|(i, _)| i)
            .collect()
    };

    scheduler.tick().unwrap();
    assert_eq!(alive(&scheduler), vertical.to_vec());
    assert_eq!(scheduler.last_draw().vertex_count, 150);

    scheduler.tick().unwrap();
    assert_eq!(alive(&scheduler), horizontal.to_vec());
}

#[test]
fn clamped_edges_repeat_the_border_cell() {
    let Some(device) = device() else { return };
    let mut lone_corner = vec![Cell { alive: 0 }; 25];
    lone_corner[0].alive = 1;

    let run = |boundary: Boundary| -> Vec<Cell> {
        let mut state = generate(&device, &life(5, 5)).unwrap().into_state();
        let mut step = SimulationStep::new(&device, &ProgramRegistry::builtin(), Variant::Life).unwrap();
        let mut params = SimulationParams::default();
        params.grid_width = 5;
        params.grid_height = 5;
        params.boundary = boundary;

        device
            .write_buffer(state.readable(), 0, bytemuck::cast_slice(&lone_corner))
            .unwrap();
        run_step(&device, &mut state, &mut step, &params);
        read_cells(&device, state.readable()).unwrap()
    };

    // Past the corner the grid reads the corner itself three times
    let clamped = run(Boundary::Clamp);
    assert_eq!(clamped, lone_corner);
    assert_eq!(clamped, life_reference(&lone_corner, 5, 5, Boundary::Clamp));

    let wrapped = run(Boundary::Wrap);
    assert!(wrapped.iter().all(|cell| !cell.is_alive()));
}

#[test]
fn life_kernel_matches_host_rule() {
    let Some(device) = device() else { return };
    for boundary in [Boundary::Wrap, Boundary::Clamp] {
        let options = GenerateOptions { seed: 21, ..life(12, 9) };
        let mut state = generate(&device, &options).unwrap().into_state();
        let mut step = SimulationStep::new(&device, &ProgramRegistry::builtin(), Variant::Life).unwrap();
        let mut params = SimulationParams::default();
        params.grid_width = 12;
        params.grid_height = 9;
        params.boundary = boundary;

        let mut expected = read_cells(&device, state.readable()).unwrap();
        for _ in 0..4 {
            expected = life_reference(&expected, 12, 9, boundary);
            run_step(&device, &mut state, &mut step, &params);
            assert_eq!(read_cells(&device, state.readable()).unwrap(), expected);
        }
    }
}

#[test]
fn oversized_population_is_rejected() {
    let Some(device) = device() else { return };
    let device = device.with_limits(DeviceLimits {
        max_buffer_size: 960,
        max_storage_buffer_binding_size: 960,
        max_texture_dimension_2d: 8192,
    });
    let result = generate(&device, &scatter(21, 0));

    match result {
        Err(SimulationError::Capacity { requested, max_population, .. }) => {
            assert_eq!(requested, 21);
            assert_eq!(max_population, 20);
        }
        other => panic!("expected a capacity error, got {:?}", other.map(|_| ())),
    }
    assert!(generate(&device, &scatter(20, 0)).is_ok());
}

#[test]
fn invalid_configuration_is_rejected() {
    assert!(matches!(
        Config::from_args(["boids-compute", "--population-size", "0"]),
        Err(SimulationError::Configuration(_))
    ));
    assert!(matches!(
        Config::from_args(["boids-compute", "--pan-scale", "-1"]),
        Err(SimulationError::Configuration(_))
    ));
}
