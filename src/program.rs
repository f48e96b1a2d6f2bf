/*
 * Rule Program Module
 *
 * Rule programs are the WGSL compute kernels the device dispatches once per
 * step. Each one declares its binding layout and runs one invocation per
 * entity index. Programs are resolved by name through a ProgramSource so the
 * pipeline never depends on a concrete kernel.
 */

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use nannou::wgpu;

use crate::error::{SimResult, SimulationError};

/// Invocations per workgroup, matching `workgroup_size` in the kernels.
pub const WORKGROUP_SIZE: u32 = 64;

/// How a buffer is bound for a dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingKind {
    ReadOnlyStorage,
    Uniform,
    Storage,
}

// readable, params, writable, render attributes
pub const RULE_LAYOUT: [BindingKind; 4] = [
    BindingKind::ReadOnlyStorage,
    BindingKind::Uniform,
    BindingKind::Storage,
    BindingKind::Storage,
];

/// A data-parallel kernel the device can dispatch.
pub trait Program: Send + Sync {
    fn name(&self) -> &str;

    /// WGSL source of the kernel.
    fn source(&self) -> &str;

    /// Binding kinds in slot order.
    fn layout(&self) -> &[BindingKind];

    fn entry_point(&self) -> &str {
        "main"
    }
}

/// A kernel using the four-slot rule layout.
pub struct RuleProgram {
    name: String,
    source: Cow<'static, str>,
}

impl RuleProgram {
    pub fn new(name: impl Into<String>, source: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

impl Program for RuleProgram {
    fn name(&self) -> &str {
        &self.name
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn layout(&self) -> &[BindingKind] {
        &RULE_LAYOUT
    }
}

// Bind group layout visible to the compute stage, one entry per slot
pub fn bind_group_layout(device: &wgpu::Device, layout: &[BindingKind]) -> wgpu::BindGroupLayout {
    let visibility = wgpu::ShaderStages::COMPUTE;
    layout
        .iter()
        .fold(wgpu::BindGroupLayoutBuilder::new(), |builder, kind| match kind {
            BindingKind::ReadOnlyStorage => builder.storage_buffer(visibility, false, true),
            BindingKind::Uniform => builder.uniform_buffer(visibility, false),
            BindingKind::Storage => builder.storage_buffer(visibility, false, false),
        })
        .build(device)
}

// Workgroups needed to cover `count` invocations
pub fn workgroup_count(count: u32) -> u32 {
    (count + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE
}

/// Resolves rule programs by name.
pub trait ProgramSource {
    fn load(&self, name: &str) -> SimResult<Arc<dyn Program>>;
}

#[derive(Default)]
pub struct ProgramRegistry {
    programs: HashMap<String, Arc<dyn Program>>,
}

impl ProgramRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Registry holding the flock and life kernels
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(RuleProgram::new("flock", include_str!("shaders/flock.wgsl"))));
        registry.register(Arc::new(RuleProgram::new("life", include_str!("shaders/life.wgsl"))));
        registry
    }

    pub fn register(&mut self, program: Arc<dyn Program>) {
        self.programs.insert(program.name().to_string(), program);
    }
}

impl ProgramSource for ProgramRegistry {
    fn load(&self, name: &str) -> SimResult<Arc<dyn Program>> {
        self.programs
            .get(name)
            .cloned()
            .ok_or_else(|| SimulationError::Program(format!("unknown rule program '{name}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Variant;

    #[test]
    fn test_builtin_registry() {
        let registry = ProgramRegistry::builtin();
        for variant in [Variant::Flock, Variant::Life] {
            let program = registry.load(variant.program_name()).unwrap();
            assert_eq!(program.name(), variant.program_name());
            assert_eq!(program.layout(), &RULE_LAYOUT);
        }
        assert!(matches!(registry.load("gravity"), Err(SimulationError::Program(_))));
    }

    #[test]
    fn test_kernels_declare_the_rule_layout() {
        let registry = ProgramRegistry::builtin();
        for name in ["flock", "life"] {
            let program = registry.load(name).unwrap();
            let source = program.source();
            assert!(source.contains("var<storage, read> readable"));
            assert!(source.contains("var<uniform> params"));
            assert!(source.contains("var<storage, read_write> writable"));
            assert!(source.contains("var<storage, read_write> vertices"));
            assert!(source.contains(&format!("workgroup_size({WORKGROUP_SIZE})")));
            assert!(source.contains(&format!("fn {}(", program.entry_point())));
        }
    }

    #[test]
    fn test_registered_program_replaces_builtin() {
        let mut registry = ProgramRegistry::builtin();
        registry.register(Arc::new(RuleProgram::new("life", "// empty")));
        assert_eq!(registry.load("life").unwrap().source(), "// empty");
    }

    #[test]
    fn test_workgroup_count() {
        assert_eq!(workgroup_count(1), 1);
        assert_eq!(workgroup_count(64), 1);
        assert_eq!(workgroup_count(65), 2);
        assert_eq!(workgroup_count(1000), 16);
    }
}
