/*
 * Compute Device Module
 *
 * This module wraps the wgpu device and queue the simulation pipeline runs
 * on. A device comes either from a nannou window (sharing its device/queue
 * pair) or from a headless adapter request. Capability limits are read from
 * the adapter once and drive the population capacity check.
 *
 * All device work is asynchronous: `submit` returns immediately and callers
 * wait on a `WorkDone` signal, which polls the device until the queue has
 * drained. Validation errors raised by wgpu are collected and surface as
 * `SimulationError::Device` on the next wait.
 */

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use nannou::wgpu;
use parking_lot::Mutex;

use crate::error::{SimResult, SimulationError};

/// Capability limits reported by the device, queried once at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceLimits {
    pub max_buffer_size: u64,
    pub max_storage_buffer_binding_size: u64,
    pub max_texture_dimension_2d: u32,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        // Same defaults a WebGPU adapter reports
        Self {
            max_buffer_size: 268_435_456,
            max_storage_buffer_binding_size: 134_217_728,
            max_texture_dimension_2d: 8192,
        }
    }
}

impl DeviceLimits {
    // wgpu 0.11 has no buffer size limit, so that one keeps the default
    pub fn from_wgpu(limits: &wgpu::Limits) -> Self {
        Self {
            max_buffer_size: Self::default().max_buffer_size,
            max_storage_buffer_binding_size: limits.max_storage_buffer_binding_size as u64,
            max_texture_dimension_2d: limits.max_texture_dimension_2d,
        }
    }

    // The tighter of two limit sets
    pub fn min(self, other: Self) -> Self {
        Self {
            max_buffer_size: self.max_buffer_size.min(other.max_buffer_size),
            max_storage_buffer_binding_size: self
                .max_storage_buffer_binding_size
                .min(other.max_storage_buffer_binding_size),
            max_texture_dimension_2d: self.max_texture_dimension_2d.min(other.max_texture_dimension_2d),
        }
    }
}

/// A device-resident buffer along with the size and usage it was created with.
pub struct Buffer {
    raw: wgpu::Buffer,
    label: String,
    size: u64,
    usage: wgpu::BufferUsages,
}

impl Buffer {
    pub fn raw(&self) -> &wgpu::Buffer {
        &self.raw
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn usage(&self) -> wgpu::BufferUsages {
        self.usage
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("label", &self.label)
            .field("size", &self.size)
            .field("usage", &self.usage)
            .finish()
    }
}

/// Resolves once the device has finished everything submitted before it.
pub struct WorkDone {
    future: Pin<Box<dyn Future<Output = ()> + Send>>,
    device: Device,
}

impl WorkDone {
    pub fn wait(self) -> SimResult<()> {
        self.device.raw().poll(wgpu::Maintain::Wait);
        futures::executor::block_on(self.future);
        self.device.take_error()
    }
}

/// The compute device: buffers, pipelines and the submission queue.
#[derive(Clone)]
pub struct Device {
    pair: Arc<wgpu::DeviceQueuePair>,
    limits: DeviceLimits,
    // First uncaptured validation error since the last wait
    error: Arc<Mutex<Option<String>>>,
}

impl Device {
    /// Request an adapter and device without a window.
    ///
    /// A software adapter is tried when no hardware adapter is available.
    pub fn headless() -> SimResult<Self> {
        let instance = wgpu::Instance::new(wgpu::DEFAULT_BACKENDS);
        let adapters = wgpu::AdapterMap::default();
        let adapter = [false, true]
            .into_iter()
            .find_map(|force_fallback_adapter| {
                let options = wgpu::RequestAdapterOptions {
                    power_preference: wgpu::DEFAULT_POWER_PREFERENCE,
                    force_fallback_adapter,
                    compatible_surface: None,
                };
                adapters.request(options, &instance)
            })
            .ok_or_else(|| SimulationError::Capability("no graphics adapter is available".to_string()))?;

        let downlevel = adapter.get_downlevel_properties();
        if !downlevel.flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS) {
            return Err(SimulationError::Capability(
                "adapter does not support compute shaders".to_string(),
            ));
        }

        let info = adapter.get_info();
        log::info!("using adapter '{}' ({:?}, {:?})", info.name, info.backend, info.device_type);

        let descriptor = wgpu::DeviceDescriptor {
            label: Some("boids-compute device"),
            features: wgpu::Features::empty(),
            limits: adapter.limits(),
        };
        Self::from_device_queue_pair(adapter.request_device(descriptor))
    }

    /// Share the device/queue pair of an existing window.
    pub fn from_device_queue_pair(pair: Arc<wgpu::DeviceQueuePair>) -> SimResult<Self> {
        let limits = DeviceLimits::from_wgpu(&pair.device().limits());
        if limits.max_storage_buffer_binding_size == 0 {
            return Err(SimulationError::Capability(
                "device reports no usable storage buffer size".to_string(),
            ));
        }

        let error = Arc::new(Mutex::new(None));
        let slot = error.clone();
        pair.device().on_uncaptured_error(move |e| {
            log::error!("device error: {}", e);
            let mut first = slot.lock();
            if first.is_none() {
                *first = Some(e.to_string());
            }
        });

        Ok(Self { pair, limits, error })
    }

    // Report at most these limits, for running against a smaller device
    pub fn with_limits(mut self, limits: DeviceLimits) -> Self {
        self.limits = self.limits.min(limits);
        self
    }

    pub fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    pub fn raw(&self) -> &wgpu::Device {
        self.pair.device()
    }

    pub fn queue(&self) -> &wgpu::Queue {
        self.pair.queue()
    }

    // Buffers start zero-filled
    pub fn create_buffer(&self, label: &str, size: u64, usage: wgpu::BufferUsages) -> SimResult<Buffer> {
        if size > self.limits.max_buffer_size {
            return Err(SimulationError::Device(format!(
                "buffer '{}' of {} bytes exceeds max buffer size {}",
                label, size, self.limits.max_buffer_size
            )));
        }

        let raw = self.raw().create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        });
        Ok(Buffer {
            raw,
            label: label.to_string(),
            size,
            usage,
        })
    }

    /// Queue a host write. Ordered before any later submission.
    pub fn write_buffer(&self, buffer: &Buffer, offset: u64, bytes: &[u8]) -> SimResult<()> {
        if !buffer.usage.contains(wgpu::BufferUsages::COPY_DST) {
            return Err(SimulationError::Binding(format!(
                "buffer '{}' was not created with COPY_DST usage",
                buffer.label
            )));
        }
        let end = offset + bytes.len() as u64;
        if end > buffer.size {
            return Err(SimulationError::Binding(format!(
                "write of {} bytes at {} overruns buffer '{}' ({} bytes)",
                bytes.len(),
                offset,
                buffer.label,
                buffer.size
            )));
        }
        check_alignment(offset, bytes.len() as u64)?;

        self.queue().write_buffer(&buffer.raw, offset, bytes);
        Ok(())
    }

    /// Encode a buffer-to-buffer copy after checking usages and bounds.
    pub fn copy_buffer_to_buffer(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        source: &Buffer,
        destination: &Buffer,
        size: u64,
    ) -> SimResult<()> {
        if std::ptr::eq(source, destination) {
            return Err(SimulationError::Binding(format!(
                "buffer '{}' cannot be copied onto itself",
                source.label
            )));
        }
        if !source.usage.contains(wgpu::BufferUsages::COPY_SRC)
            || !destination.usage.contains(wgpu::BufferUsages::COPY_DST)
        {
            return Err(SimulationError::Binding(format!(
                "copy from '{}' to '{}' needs COPY_SRC and COPY_DST usages",
                source.label, destination.label
            )));
        }
        if size > source.size || size > destination.size {
            return Err(SimulationError::Binding(format!(
                "copy of {} bytes overruns '{}' or '{}'",
                size, source.label, destination.label
            )));
        }
        check_alignment(0, size)?;

        encoder.copy_buffer_to_buffer(&source.raw, 0, &destination.raw, 0, size);
        Ok(())
    }

    pub fn create_command_encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.raw()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    pub fn submit(&self, encoder: wgpu::CommandEncoder) {
        self.queue().submit(Some(encoder.finish()));
    }

    pub fn on_submitted_work_done(&self) -> WorkDone {
        WorkDone {
            future: Box::pin(self.queue().on_submitted_work_done()),
            device: self.clone(),
        }
    }

    // Surface the first device error recorded since the last call
    pub fn take_error(&self) -> SimResult<()> {
        match self.error.lock().take() {
            Some(message) => Err(SimulationError::Device(message)),
            None => Ok(()),
        }
    }
}

fn check_alignment(offset: u64, size: u64) -> SimResult<()> {
    if offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 || size % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
        return Err(SimulationError::Binding(format!(
            "offset {} and size {} must be multiples of {} bytes",
            offset,
            size,
            wgpu::COPY_BUFFER_ALIGNMENT
        )));
    }
    Ok(())
}

/// Reject a population whose largest buffer would not fit the device.
///
/// `max_buffer_size` is checked before `max_storage_buffer_binding_size`, and
/// the error reports the largest population the exceeded limit allows.
pub fn check_capacity(population: u64, bytes_per_entity: u64, limits: &DeviceLimits) -> SimResult<()> {
    if bytes_per_entity == 0 {
        return Err(SimulationError::Configuration(
            "entities must occupy at least one byte".to_string(),
        ));
    }

    let required_bytes = population.saturating_mul(bytes_per_entity);
    let checks = [
        ("maxBufferSize", limits.max_buffer_size),
        ("maxStorageBufferBindingSize", limits.max_storage_buffer_binding_size),
    ];
    for (limit_name, limit_bytes) in checks {
        if required_bytes > limit_bytes {
            return Err(SimulationError::Capacity {
                requested: population,
                required_bytes,
                limit_name,
                limit_bytes,
                max_population: limit_bytes / bytes_per_entity,
            });
        }
    }
    Ok(())
}

// Headless device for tests, None on machines without any adapter
#[cfg(test)]
pub(crate) fn test_device() -> Option<Device> {
    match Device::headless() {
        Ok(device) => Some(device),
        Err(e) => {
            eprintln!("skipping device test: {e}");
            None
        }
    }
}
