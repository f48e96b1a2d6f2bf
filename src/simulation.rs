/*
 * Simulation Step Module
 *
 * This module advances the simulation by one tick. The step uploads the
 * current parameters, binds the readable buffer read-only and the writable
 * buffer plus render attributes read-write, dispatches the rule program over
 * every entity index and waits for the device to finish.
 */

use nannou::wgpu;

use crate::device::{Buffer, Device};
use crate::entity::Variant;
use crate::error::{SimResult, SimulationError};
use crate::params::{ParamsUniform, SimulationParams};
use crate::program::{bind_group_layout, workgroup_count, ProgramSource};
use crate::state::StepScope;

pub struct SimulationStep {
    program_name: String,
    variant: Variant,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
    params_buffer: Buffer,
    // Skips re-uploading identical parameters
    last_uploaded: Option<ParamsUniform>,
    uploads: u64,
    steps: u64,
}

impl SimulationStep {
    // Compiles the rule program once for the lifetime of the step
    pub fn new(device: &Device, programs: &dyn ProgramSource, variant: Variant) -> SimResult<Self> {
        let program = programs.load(variant.program_name())?;

        let shader = device.raw().create_shader_module(&wgpu::ShaderModuleDescriptor {
            label: Some(program.name()),
            source: wgpu::ShaderSource::Wgsl(program.source().to_string().into()),
        });
        let bind_group_layout = bind_group_layout(device.raw(), program.layout());
        let pipeline_layout = wgpu::create_pipeline_layout(
            device.raw(),
            Some("compute pipeline layout"),
            &[&bind_group_layout],
            &[],
        );
        let pipeline = device.raw().create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("compute pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: program.entry_point(),
        });
        device.take_error().map_err(|e| {
            SimulationError::Program(format!("rule program '{}' failed to build: {}", program.name(), e))
        })?;

        let params_buffer = device.create_buffer(
            "params buffer",
            std::mem::size_of::<ParamsUniform>() as u64,
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        )?;

        Ok(Self {
            program_name: program.name().to_string(),
            variant,
            bind_group_layout,
            pipeline,
            params_buffer,
            last_uploaded: None,
            uploads: 0,
            steps: 0,
        })
    }

    // Number of parameter uploads issued so far
    pub fn upload_count(&self) -> u64 {
        self.uploads
    }

    pub fn step_count(&self) -> u64 {
        self.steps
    }

    pub fn step(
        &mut self,
        device: &Device,
        scope: StepScope<'_, Buffer>,
        attributes: &Buffer,
        params: &SimulationParams,
        entity_count: u32,
    ) -> SimResult<()> {
        let cells = params.grid_width as u64 * params.grid_height as u64;
        if self.variant == Variant::Life && cells != entity_count as u64 {
            return Err(SimulationError::Program(format!(
                "life dispatch of {} cells does not match a {}x{} grid",
                entity_count, params.grid_width, params.grid_height
            )));
        }

        let uniform = params.uniform(entity_count);
        if self.last_uploaded != Some(uniform) {
            device.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&uniform))?;
            self.last_uploaded = Some(uniform);
            self.uploads += 1;
        }

        // Slot order follows the rule layout
        let bind_group = wgpu::BindGroupBuilder::new()
            .buffer_bytes(scope.readable.raw(), 0, None)
            .buffer_bytes(self.params_buffer.raw(), 0, None)
            .buffer_bytes(scope.writable.raw(), 0, None)
            .buffer_bytes(attributes.raw(), 0, None)
            .build(device.raw(), &self.bind_group_layout);

        let mut encoder = device.create_command_encoder("compute encoder");
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("compute pass"),
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch(workgroup_count(entity_count), 1, 1);
        }
        device.submit(encoder);
        device.on_submitted_work_done().wait()?;

        self.steps += 1;
        log::trace!("{} step {} complete", self.program_name, self.steps);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::test_device;
    use crate::generator::{generate, GenerateOptions};
    use crate::program::{ProgramRegistry, RuleProgram};
    use std::sync::Arc;

    #[test]
    fn test_unchanged_params_upload_once() {
        let Some(device) = test_device() else { return };
        let mut state = generate(&device, &GenerateOptions { population_size: 8, ..GenerateOptions::default() })
            .unwrap()
            .into_state();
        let mut step = SimulationStep::new(&device, &ProgramRegistry::builtin(), Variant::Flock).unwrap();
        let mut params = SimulationParams::default();

        for _ in 0..3 {
            let (scope, attributes) = state.begin_step();
            step.step(&device, scope, attributes, &params, 8).unwrap();
            state.swap();
        }
        assert_eq!(step.upload_count(), 1);

        params.cohesion = 0.5;
        let (scope, attributes) = state.begin_step();
        step.step(&device, scope, attributes, &params, 8).unwrap();
        assert_eq!(step.upload_count(), 2);
        assert_eq!(step.step_count(), 4);
    }

    #[test]
    fn test_unknown_program_fails_at_build() {
        let Some(device) = test_device() else { return };
        let result = SimulationStep::new(&device, &ProgramRegistry::new(), Variant::Life);
        assert!(matches!(result, Err(SimulationError::Program(_))));
    }

    #[test]
    fn test_invalid_kernel_fails_at_build() {
        let Some(device) = test_device() else { return };
        let mut programs = ProgramRegistry::new();
        programs.register(Arc::new(RuleProgram::new("flock", "fn main( {")));
        let result = SimulationStep::new(&device, &programs, Variant::Flock);
        assert!(matches!(result, Err(SimulationError::Program(_))));
    }

    #[test]
    fn test_life_grid_must_match_count() {
        let Some(device) = test_device() else { return };
        let options = GenerateOptions {
            variant: Variant::Life,
            population_size: 16,
            grid_width: 4,
            grid_height: 4,
            ..GenerateOptions::default()
        };
        let mut state = generate(&device, &options).unwrap().into_state();
        let mut step = SimulationStep::new(&device, &ProgramRegistry::builtin(), Variant::Life).unwrap();

        // Default params describe a 64x64 grid
        let (scope, attributes) = state.begin_step();
        let result = step.step(&device, scope, attributes, &SimulationParams::default(), 16);
        assert!(matches!(result, Err(SimulationError::Program(_))));
        assert_eq!(step.step_count(), 0);
    }
}
