/*
 * Camera Module
 *
 * This module defines the Camera that maps world positions to screen
 * positions in the render stage. Screen space has its origin at the window
 * centre, and one world unit is one pixel at zoom 1.
 *
 * Gestures mutate the camera between frames: pinch scales the zoom, pan moves
 * the position by a screen delta converted through the current zoom.
 */

use nannou::prelude::*;

// Smallest zoom a pinch can reach; zoom stays strictly positive
const MIN_ZOOM: f32 = 1e-3;

/// How a screen-space pan delta is scaled before it moves the camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PanScale {
    /// A constant factor.
    Fixed(f32),
    /// The factor grows slightly with zoom: `scale * zoom^(1/100)`.
    ZoomTempered(f32),
}

impl Default for PanScale {
    fn default() -> Self {
        PanScale::Fixed(1.0)
    }
}

impl PanScale {
    pub fn factor(self, zoom: f32) -> f32 {
        match self {
            PanScale::Fixed(scale) => scale,
            PanScale::ZoomTempered(scale) => scale * zoom.powf(0.01),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec2,
    pub zoom: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera {
    pub fn new() -> Self {
        Self {
            position: Vec2::ZERO,
            zoom: 1.0,
        }
    }

    // Convert a point from world space to screen space
    pub fn world_to_screen(&self, point: Vec2) -> Vec2 {
        (point + self.position) * self.zoom
    }

    // Convert a point from screen space to world space
    pub fn screen_to_world(&self, point: Vec2) -> Vec2 {
        point / self.zoom - self.position
    }

    // Pinch zoom: positive deltas zoom in by delta percent
    pub fn pinch(&mut self, zoom_delta: f32) {
        let zoom = self.zoom * (1.0 + zoom_delta / 100.0);
        self.zoom = if zoom.is_finite() { zoom.max(MIN_ZOOM) } else { self.zoom };
    }

    // Move the camera by a screen-space delta
    pub fn pan(&mut self, delta: Vec2, scale: PanScale) {
        self.position += delta * scale.factor(self.zoom) / self.zoom;
    }
}
