/*
 * Entity Module
 *
 * This module defines the device records the simulation works on.
 * A boid follows three rules:
 * 1. Separation: Avoid crowding neighbors
 * 2. Alignment: Steer towards the average heading of neighbors
 * 3. Cohesion: Steer towards the average position of neighbors
 *
 * A life cell is a single alive/dead flag on a 2-D grid. Both records are
 * plain old data and live in flat device buffers, one slot per entity.
 */

use bytemuck::{Pod, Zeroable};
use nannou::prelude::*;

use crate::params::ParamsUniform;
use crate::{BOID_SIZE, LIFE_CELL_SIZE};

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Boid {
    pub position: [f32; 4],
    pub velocity: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Cell {
    pub alive: u32,
}

/// One render attribute vertex. `w` is 1 for visible geometry and 0 for
/// collapsed (dead) geometry.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 4],
}

pub const VERTEX_STRIDE: u64 = std::mem::size_of::<Vertex>() as u64;

// Which population the pipeline simulates
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Variant {
    Flock,
    Life,
}

impl Variant {
    pub fn program_name(self) -> &'static str {
        match self {
            Variant::Flock => "flock",
            Variant::Life => "life",
        }
    }

    // Bytes of one entity record in the state buffers
    pub fn entity_stride(self) -> u64 {
        match self {
            Variant::Flock => std::mem::size_of::<Boid>() as u64,
            Variant::Life => std::mem::size_of::<Cell>() as u64,
        }
    }

    pub fn vertices_per_entity(self) -> u32 {
        match self {
            Variant::Flock => 3,
            Variant::Life => 6,
        }
    }

    // Largest per-entity footprint of any buffer the variant binds
    pub fn bytes_per_entity(self) -> u64 {
        let attributes = self.vertices_per_entity() as u64 * VERTEX_STRIDE;
        attributes.max(self.entity_stride())
    }
}

impl Boid {
    // Every coordinate set to the same value
    pub fn splat(value: f32) -> Self {
        Self {
            position: [value; 4],
            velocity: [value; 4],
        }
    }

    pub fn new(position: Vec3, velocity: Vec3) -> Self {
        Self {
            position: [position.x, position.y, position.z, 0.0],
            velocity: [velocity.x, velocity.y, velocity.z, 0.0],
        }
    }

    pub fn position(&self) -> Vec3 {
        vec3(self.position[0], self.position[1], self.position[2])
    }

    pub fn velocity(&self) -> Vec3 {
        vec3(self.velocity[0], self.velocity[1], self.velocity[2])
    }

    // Host rendition of the flock kernel: advance one step against the
    // readable population
    pub fn flock(&self, boids: &[Boid], params: &ParamsUniform) -> Boid {
        let position = self.position();
        let velocity = self.velocity();
        let vision_squared = params.vision_distance * params.vision_distance;

        let mut separation = Vec3::ZERO;
        let mut alignment = Vec3::ZERO;
        let mut cohesion = Vec3::ZERO;
        let mut count = 0u32;

        for other in boids {
            let offset = position - other.position();
            let d_squared = offset.length_squared();

            // Skips itself and anything sharing its exact position
            if d_squared <= 0.0 || d_squared >= vision_squared {
                continue;
            }

            // Vector pointing away from neighbor, weighted by distance
            separation += offset / d_squared;
            alignment += other.velocity();
            cohesion += other.position();
            count += 1;
        }

        let mut force = Vec3::ZERO;
        if count > 0 {
            let n = count as f32;
            force += steer(separation / n, velocity, params.max_force) * params.separation;
            force += steer(alignment / n, velocity, params.max_force) * params.alignment;
            force += steer(cohesion / n - position, velocity, params.max_force) * params.cohesion;
        }

        let velocity = velocity + force;
        let mut next = Boid {
            position: self.position,
            velocity: [velocity.x, velocity.y, velocity.z, self.velocity[3]],
        };
        let moved = position + velocity * params.speed;
        next.position[0] = moved.x;
        next.position[1] = moved.y;
        next.position[2] = moved.z;
        next.wrap_edges(params.world_size);
        next
    }

    // Wrap the boid around the world edges
    pub fn wrap_edges(&mut self, world_size: f32) {
        let half_size = world_size / 2.0;

        for axis in 0..2 {
            if self.position[axis] > half_size {
                self.position[axis] = -half_size;
            } else if self.position[axis] < -half_size {
                self.position[axis] = half_size;
            }
        }
    }

    // Triangle pointing along the velocity, in world space
    pub fn triangle(&self) -> [Vertex; 3] {
        let velocity = self.velocity();
        let angle = velocity.y.atan2(velocity.x);
        let (sin, cos) = angle.sin_cos();
        let z = self.position[2];

        let corners = [
            vec2(BOID_SIZE, 0.0),
            vec2(-BOID_SIZE, BOID_SIZE / 2.0),
            vec2(-BOID_SIZE, -BOID_SIZE / 2.0),
        ];
        corners.map(|corner| {
            let x = corner.x * cos - corner.y * sin + self.position[0];
            let y = corner.x * sin + corner.y * cos + self.position[1];
            Vertex {
                position: [x, y, z, 1.0],
            }
        })
    }
}

// Implement Reynolds: Steering = Desired - Velocity, capped at max_force
fn steer(desired: Vec3, velocity: Vec3, max_force: f32) -> Vec3 {
    let length_squared = desired.length_squared();
    if length_squared <= 0.0 {
        return Vec3::ZERO;
    }

    let steering = desired / length_squared.sqrt() - velocity;
    let force_squared = steering.length_squared();
    if force_squared > max_force * max_force {
        steering * (max_force / force_squared.sqrt())
    } else {
        steering
    }
}

impl Cell {
    pub fn is_alive(&self) -> bool {
        self.alive != 0
    }

    // Two triangles covering the cell's square; dead cells collapse to a point
    pub fn quad(&self, column: u32, row: u32, width: u32, height: u32) -> [Vertex; 6] {
        let left = (column as f32 - width as f32 / 2.0) * LIFE_CELL_SIZE;
        let bottom = (row as f32 - height as f32 / 2.0) * LIFE_CELL_SIZE;

        if !self.is_alive() {
            return [Vertex {
                position: [left, bottom, 0.0, 0.0],
            }; 6];
        }

        let right = left + LIFE_CELL_SIZE;
        let top = bottom + LIFE_CELL_SIZE;
        let v = |x: f32, y: f32| Vertex {
            position: [x, y, 0.0, 1.0],
        };
        [
            v(left, bottom),
            v(right, bottom),
            v(right, top),
            v(left, bottom),
            v(right, top),
            v(left, top),
        ]
    }
}

// Decode a flat byte buffer into records, ignoring any trailing partial record
pub fn decode_records<T: Pod>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(std::mem::size_of::<T>())
        .map(bytemuck::pod_read_unaligned)
        .collect()
}
