/*
 * Simulation Benchmark
 *
 * Measures one flock step and one life step on the device for growing
 * populations, each including the parameter upload and the queue round trip.
 */

use boids_compute::device::Device;
use boids_compute::entity::Variant;
use boids_compute::generator::{generate, GenerateOptions, InitialLayout};
use boids_compute::params::SimulationParams;
use boids_compute::program::ProgramRegistry;
use boids_compute::simulation::SimulationStep;
use boids_compute::state::SimulationState;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;

fn scatter_options(population_size: u32) -> GenerateOptions {
    GenerateOptions {
        population_size,
        seed: 42,
        layout: InitialLayout::Scatter,
        ..GenerateOptions::default()
    }
}

fn run_step(device: &Device, state: &mut SimulationState, step: &mut SimulationStep, params: &SimulationParams) {
    let entity_count = state.entity_count();
    let (scope, attributes) = state.begin_step();
    step.step(device, scope, attributes, params, entity_count).expect("step");
    state.swap();
}

// Benchmark one flock step, including parameter upload and queue wait
fn bench_flock_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("flock_step");
    let device = Device::headless().expect("compute-capable adapter");
    let programs = ProgramRegistry::builtin();
    let params = SimulationParams::default();

    for num_boids in [100u32, 1000, 10_000].iter() {
        let mut state = generate(&device, &scatter_options(*num_boids)).expect("generate").into_state();
        let mut step = SimulationStep::new(&device, &programs, Variant::Flock).expect("pipeline");

        group.bench_with_input(BenchmarkId::from_parameter(num_boids), num_boids, |b, _| {
            b.iter(|| run_step(&device, &mut state, &mut step, &params));
        });
    }

    group.finish();
}

// Benchmark one life step over square grids
fn bench_life_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("life_step");
    let device = Device::headless().expect("compute-capable adapter");
    let programs = ProgramRegistry::builtin();

    for side in [64u32, 256, 512].iter() {
        let options = GenerateOptions {
            variant: Variant::Life,
            population_size: side * side,
            seed: 7,
            grid_width: *side,
            grid_height: *side,
            ..GenerateOptions::default()
        };
        let mut params = SimulationParams::default();
        params.grid_width = *side;
        params.grid_height = *side;
        let mut state = generate(&device, &options).expect("generate").into_state();
        let mut step = SimulationStep::new(&device, &programs, Variant::Life).expect("pipeline");

        group.bench_with_input(BenchmarkId::from_parameter(side), side, |b, _| {
            b.iter(|| run_step(&device, &mut state, &mut step, &params));
        });
    }

    group.finish();
}

// Configure the benchmarks
criterion_group! {
    name = benches;
    config = Criterion::default()
        .sample_size(10)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1));
    targets = bench_flock_step, bench_life_step
}

criterion_main!(benches);
