/*
 * Buffer Reader Module
 *
 * Copies device-resident buffers into a host-visible staging buffer and
 * decodes them as typed records. Readback is asynchronous: a request returns
 * a PendingReadback that can be waited on or polled from the frame loop. The
 * caller must make sure no in-flight step writes the buffer being read.
 */

use std::future::Future;
use std::num::NonZeroU32;
use std::pin::Pin;

use futures::FutureExt;
use nannou::prelude::*;
use nannou::wgpu;

use crate::device::{Buffer, Device};
use crate::entity::{decode_records, Boid, Cell, Variant};
use crate::error::{SimResult, SimulationError};

/// Layout of the records a buffer holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordShape {
    Scalar,
    Vec3,
    Vec4,
    // position and velocity as packed vec3s
    BoidPair3,
    // position and velocity as vec4s
    BoidPair4,
}

impl RecordShape {
    pub fn stride(self) -> u64 {
        match self {
            RecordShape::Scalar => 4,
            RecordShape::Vec3 => 12,
            RecordShape::Vec4 => 16,
            RecordShape::BoidPair3 => 24,
            RecordShape::BoidPair4 => 32,
        }
    }

    // Shape of one state record of the variant
    pub fn for_variant(variant: Variant) -> Self {
        match variant {
            Variant::Flock => RecordShape::BoidPair4,
            Variant::Life => RecordShape::Scalar,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Record {
    Scalar(f32),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Boid3 { position: [f32; 3], velocity: [f32; 3] },
    Boid4(Boid),
}

fn decode(bytes: &[u8], shape: RecordShape) -> Vec<Record> {
    match shape {
        RecordShape::Scalar => decode_records::<f32>(bytes).into_iter().map(Record::Scalar).collect(),
        RecordShape::Vec3 => decode_records::<[f32; 3]>(bytes).into_iter().map(Record::Vec3).collect(),
        RecordShape::Vec4 => decode_records::<[f32; 4]>(bytes).into_iter().map(Record::Vec4).collect(),
        RecordShape::BoidPair3 => decode_records::<[[f32; 3]; 2]>(bytes)
            .into_iter()
            .map(|[position, velocity]| Record::Boid3 { position, velocity })
            .collect(),
        RecordShape::BoidPair4 => decode_records::<Boid>(bytes).into_iter().map(Record::Boid4).collect(),
    }
}

type MapFuture = Pin<Box<dyn Future<Output = Result<(), wgpu::BufferAsyncError>> + Send>>;

/// A readback that has been submitted but not necessarily mapped yet.
pub struct PendingReadback {
    staging: Buffer,
    mapped: MapFuture,
    device: Device,
    shape: RecordShape,
}

impl PendingReadback {
    pub fn wait(mut self) -> SimResult<Vec<Record>> {
        self.device.raw().poll(wgpu::Maintain::Wait);
        let result = futures::executor::block_on(self.mapped.as_mut());
        self.finish(result)
    }

    // Non-blocking poll, None until the device has produced the bytes
    pub fn try_wait(&mut self) -> Option<SimResult<Vec<Record>>> {
        self.device.raw().poll(wgpu::Maintain::Poll);
        let result = self.mapped.as_mut().now_or_never()?;
        Some(self.finish(result))
    }

    fn finish(&self, result: Result<(), wgpu::BufferAsyncError>) -> SimResult<Vec<Record>> {
        self.device.take_error()?;
        result.map_err(|e| {
            SimulationError::Device(format!("failed to map '{}': {}", self.staging.label(), e))
        })?;

        let records = {
            let bytes = self.staging.raw().slice(..).get_mapped_range();
            decode(&bytes, self.shape)
        };
        self.staging.raw().unmap();
        Ok(records)
    }
}

// Submit the copy into `staging` and start mapping it
fn stage(device: &Device, encoder: wgpu::CommandEncoder, staging: &Buffer) -> MapFuture {
    device.submit(encoder);
    Box::pin(staging.raw().slice(..).map_async(wgpu::MapMode::Read))
}

pub fn request_readback(device: &Device, buffer: &Buffer, shape: RecordShape) -> SimResult<PendingReadback> {
    let stride = shape.stride();
    if buffer.size() % stride != 0 {
        return Err(SimulationError::Alignment {
            size: buffer.size(),
            stride,
        });
    }

    let staging = device.create_buffer(
        "result buffer",
        buffer.size(),
        wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
    )?;
    let mut encoder = device.create_command_encoder("read buffer encoder");
    device.copy_buffer_to_buffer(&mut encoder, buffer, &staging, buffer.size())?;
    let mapped = stage(device, encoder, &staging);

    Ok(PendingReadback {
        staging,
        mapped,
        device: device.clone(),
        shape,
    })
}

/// Read back a 4-byte-per-texel texture, one RGBA value per pixel in row order.
pub fn read_pixels(device: &Device, texture: &wgpu::Texture) -> SimResult<Vec<[u8; 4]>> {
    if wgpu::texture_format_size_bytes(texture.format()) != 4 {
        return Err(SimulationError::Binding(format!(
            "texture format {:?} is not 4 bytes per texel",
            texture.format()
        )));
    }

    let [width, height] = texture.size();
    let row_bytes = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_row_bytes = (row_bytes + align - 1) / align * align;

    let staging = device.create_buffer(
        "pixel buffer",
        padded_row_bytes as u64 * height as u64,
        wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
    )?;
    let mut encoder = device.create_command_encoder("read texture encoder");
    encoder.copy_texture_to_buffer(
        texture.as_image_copy(),
        wgpu::ImageCopyBuffer {
            buffer: staging.raw(),
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: NonZeroU32::new(padded_row_bytes),
                rows_per_image: NonZeroU32::new(height),
            },
        },
        texture.extent(),
    );
    let mut mapped = stage(device, encoder, &staging);
    device.raw().poll(wgpu::Maintain::Wait);
    futures::executor::block_on(mapped.as_mut())
        .map_err(|e| SimulationError::Device(format!("failed to map 'pixel buffer': {}", e)))?;
    device.take_error()?;

    let pixels = {
        let bytes = staging.raw().slice(..).get_mapped_range();
        bytes
            .chunks_exact(padded_row_bytes as usize)
            .flat_map(|row| decode_records::<[u8; 4]>(&row[..row_bytes as usize]))
            .collect()
    };
    staging.raw().unmap();
    Ok(pixels)
}

pub fn read_records(device: &Device, buffer: &Buffer, shape: RecordShape) -> SimResult<Vec<Record>> {
    request_readback(device, buffer, shape)?.wait()
}

pub fn read_f32(device: &Device, buffer: &Buffer) -> SimResult<Vec<f32>> {
    let records = read_records(device, buffer, RecordShape::Scalar)?;
    Ok(records
        .into_iter()
        .filter_map(|record| match record {
            Record::Scalar(value) => Some(value),
            _ => None,
        })
        .collect())
}

pub fn read_vec3(device: &Device, buffer: &Buffer) -> SimResult<Vec<Vec3>> {
    let records = read_records(device, buffer, RecordShape::Vec3)?;
    Ok(records
        .into_iter()
        .filter_map(|record| match record {
            Record::Vec3([x, y, z]) => Some(vec3(x, y, z)),
            _ => None,
        })
        .collect())
}

pub fn read_boids(device: &Device, buffer: &Buffer) -> SimResult<Vec<Boid>> {
    let records = read_records(device, buffer, RecordShape::BoidPair4)?;
    Ok(records
        .into_iter()
        .filter_map(|record| match record {
            Record::Boid4(boid) => Some(boid),
            _ => None,
        })
        .collect())
}

// Life cells are 4-byte words, read through the scalar shape bit for bit
pub fn read_cells(device: &Device, buffer: &Buffer) -> SimResult<Vec<Cell>> {
    let records = read_records(device, buffer, RecordShape::Scalar)?;
    Ok(records
        .into_iter()
        .filter_map(|record| match record {
            Record::Scalar(value) => Some(Cell { alive: value.to_bits() }),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::test_device;

    fn buffer_with(device: &Device, bytes: &[u8]) -> Buffer {
        let buffer = device
            .create_buffer(
                "source",
                bytes.len() as u64,
                wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
            )
            .unwrap();
        device.write_buffer(&buffer, 0, bytes).unwrap();
        buffer
    }

    #[test]
    fn test_pair3_stride_alignment() {
        let Some(device) = test_device() else { return };
        let values: Vec<f32> = (0..12).map(|i| i as f32).collect();
        let buffer = buffer_with(&device, bytemuck::cast_slice(&values));

        let records = read_records(&device, &buffer, RecordShape::BoidPair3).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[1],
            Record::Boid3 {
                position: [6.0, 7.0, 8.0],
                velocity: [9.0, 10.0, 11.0],
            }
        );

        let odd = buffer_with(&device, &[0u8; 52]);
        assert_eq!(
            read_records(&device, &odd, RecordShape::BoidPair3).unwrap_err(),
            SimulationError::Alignment { size: 52, stride: 24 }
        );
    }

    #[test]
    fn test_typed_readers() {
        let Some(device) = test_device() else { return };
        let values = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let buffer = buffer_with(&device, bytemuck::cast_slice(&values));

        assert_eq!(read_f32(&device, &buffer).unwrap(), values.to_vec());
        assert_eq!(
            read_vec3(&device, &buffer).unwrap(),
            vec![vec3(1.0, 2.0, 3.0), vec3(4.0, 5.0, 6.0)]
        );
        assert!(matches!(read_boids(&device, &buffer), Err(SimulationError::Alignment { .. })));
    }

    #[test]
    fn test_read_cells_keeps_bits() {
        let Some(device) = test_device() else { return };
        let cells = [Cell { alive: 1 }, Cell { alive: 0 }, Cell { alive: 1 }];
        let buffer = buffer_with(&device, bytemuck::cast_slice(&cells));
        assert_eq!(read_cells(&device, &buffer).unwrap(), cells.to_vec());
    }

    #[test]
    fn test_poll_until_ready() {
        let Some(device) = test_device() else { return };
        let buffer = buffer_with(&device, bytemuck::bytes_of(&Boid::splat(2.0)));
        let mut pending = request_readback(&device, &buffer, RecordShape::BoidPair4).unwrap();

        let records = loop {
            if let Some(result) = pending.try_wait() {
                break result.unwrap();
            }
            std::thread::yield_now();
        };
        assert_eq!(records, vec![Record::Boid4(Boid::splat(2.0))]);
    }

    #[test]
    fn test_readback_needs_copy_src() {
        let Some(device) = test_device() else { return };
        let buffer = device
            .create_buffer("storage only", 16, wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST)
            .unwrap();
        assert!(matches!(
            request_readback(&device, &buffer, RecordShape::Vec4),
            Err(SimulationError::Binding(_))
        ));
    }
}
