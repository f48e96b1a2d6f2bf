/*
 * Input Module
 *
 * This module turns window events into camera gestures:
 * - Pan with a left-button drag
 * - Zoom with the mouse wheel or a trackpad pinch
 *
 * Events over the egui panel are left to the UI.
 */

use nannou::prelude::*;
use nannou::winit::event::{MouseButton, MouseScrollDelta, TouchPhase};

use crate::app::Model;

// Tracks a drag gesture and reports per-move deltas
#[derive(Debug, Default, Clone, Copy)]
pub struct DragTracker {
    last: Option<Vec2>,
}

impl DragTracker {
    pub fn press(&mut self, position: Vec2) {
        self.last = Some(position);
    }

    // Delta since the previous move, None when not dragging
    pub fn moved(&mut self, position: Vec2) -> Option<Vec2> {
        let last = self.last.replace(position)?;
        let delta = position - last;
        (delta.length_squared() > 0.0).then_some(delta)
    }

    pub fn release(&mut self) {
        self.last = None;
    }
}

// Wheel lines and trackpad pixels as a zoom percentage
pub fn wheel_to_zoom_delta(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y * 10.0,
        MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.1,
    }
}

// Mouse moved event handler
pub fn mouse_moved(_app: &App, model: &mut Model, pos: Point2) {
    if let Some(delta) = model.drag.moved(pos) {
        let pan_scale = model.pan_scale;
        model.scheduler.camera_mut().pan(delta, pan_scale);
    }

    // Always update the stored mouse position
    model.mouse_position = pos;
}

// Mouse pressed event handler
pub fn mouse_pressed(_app: &App, model: &mut Model, button: MouseButton) {
    // Check if the click is on the UI before handling it
    if button == MouseButton::Left && !model.egui.ctx().is_pointer_over_area() {
        model.drag.press(model.mouse_position);
    }
}

// Mouse released event handler
pub fn mouse_released(_app: &App, model: &mut Model, button: MouseButton) {
    if button == MouseButton::Left {
        model.drag.release();
    }
}

// Mouse wheel event handler for zooming
pub fn mouse_wheel(_app: &App, model: &mut Model, delta: MouseScrollDelta, _phase: TouchPhase) {
    if model.egui.ctx().is_pointer_over_area() {
        return;
    }
    model.scheduler.camera_mut().pinch(wheel_to_zoom_delta(delta));
}

// Pass raw events to egui
pub fn raw_window_event(_app: &App, model: &mut Model, event: &nannou::winit::event::WindowEvent) {
    model.egui.handle_raw_event(event);
}
