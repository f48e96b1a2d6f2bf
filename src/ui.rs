/*
 * UI Module
 *
 * This module builds the egui control panel with nannou_egui. Sliders edit
 * the simulation parameters between ticks; the new values reach the device
 * with the next step's parameter upload. Buttons request actions the app
 * performs after the panel closes.
 */

use nannou_egui::{egui, Egui};

use crate::camera::Camera;
use crate::debug::DebugInfo;
use crate::entity::Variant;
use crate::params::SimulationParams;

// Actions requested from the panel this frame
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UiActions {
    pub reseed: bool,
    pub reset_camera: bool,
    pub readback: bool,
    pub forces_changed: bool,
}

pub fn update_ui(
    egui: &mut Egui,
    params: &mut SimulationParams,
    debug_info: &DebugInfo,
    camera: &Camera,
    variant: Variant,
    entity_count: u32,
) -> UiActions {
    let mut actions = UiActions::default();

    // Take a snapshot of current parameter values for change detection
    params.take_snapshot();

    let ctx = egui.begin_frame();

    egui::Window::new("Simulation Controls")
        .default_pos([10.0, 10.0])
        .show(&ctx, |ui| {
            if variant == Variant::Flock {
                ui.collapsing("Flocking Behavior", |ui| {
                    ui.add(egui::Slider::new(&mut params.separation, SimulationParams::get_weight_range()).text("Separation"));
                    ui.add(egui::Slider::new(&mut params.alignment, SimulationParams::get_weight_range()).text("Alignment"));
                    ui.add(egui::Slider::new(&mut params.cohesion, SimulationParams::get_weight_range()).text("Cohesion"));
                    ui.add(egui::Slider::new(&mut params.speed, SimulationParams::get_speed_range()).text("Speed"));
                    ui.add(egui::Slider::new(&mut params.vision_distance, SimulationParams::get_vision_range()).text("Vision Distance"));
                    ui.add(egui::Slider::new(&mut params.max_force, SimulationParams::get_max_force_range()).text("Max Force"));
                });
            } else {
                ui.label(format!("Grid: {}x{} ({:?})", params.grid_width, params.grid_height, params.boundary));
            }

            ui.collapsing("Camera Controls", |ui| {
                ui.label("Zoom: Use mouse wheel or trackpad pinch gesture");
                ui.label("Pan: Click and drag");
                if ui.button("Reset Camera").clicked() {
                    actions.reset_camera = true;
                }
                ui.label(format!("Zoom Level: {:.2}x", camera.zoom));
                ui.label(format!("Camera Position: ({:.0}, {:.0})", camera.position.x, camera.position.y));
            });

            ui.collapsing("State", |ui| {
                ui.label(format!("Entities: {}", entity_count));
                if ui.button("Reseed").clicked() {
                    actions.reseed = true;
                }
                if ui.button("Read Back Buffer").clicked() {
                    actions.readback = true;
                }
                if let Some(summary) = &debug_info.last_readback {
                    ui.label(summary.as_str());
                }
            });

            ui.separator();
            ui.label(format!("FPS: {:.1}", debug_info.fps));
            ui.checkbox(&mut params.show_debug, "Show Debug Info");
            ui.checkbox(&mut params.pause_simulation, "Pause Simulation");
        });

    // Detect parameter changes
    actions.forces_changed = params.detect_changes();
    actions
}

// Draw debug information on the screen
pub fn draw_debug_info(draw: &nannou::Draw, debug_info: &DebugInfo, window_rect: nannou::geom::Rect, entity_count: u32, camera_zoom: f32) {
    let margin = 20.0;
    let line_height = 20.0;
    let debug_texts = [
        format!("FPS: {:.1}", debug_info.fps),
        format!("Frame time: {:.2} ms", debug_info.frame_time.as_secs_f64() * 1000.0),
        format!("Entities: {}", entity_count),
        format!("Vertices drawn: {}", debug_info.vertex_count),
        format!("Surface: {}x{}", debug_info.surface.0, debug_info.surface.1),
        format!("Zoom: {:.2}x", camera_zoom),
        format!("Cursor: ({:.0}, {:.0})", debug_info.cursor_world.x, debug_info.cursor_world.y),
        format!("Parameter uploads: {}", debug_info.parameter_uploads),
        format!("Surface reconfigurations: {}", debug_info.surface_reconfigurations),
    ];

    // Create a background panel in the top-right corner
    let panel_width = 240.0;
    let panel_height = line_height * debug_texts.len() as f32 + margin;
    draw.rect()
        .x_y(window_rect.right() - panel_width / 2.0, window_rect.top() - panel_height / 2.0)
        .w_h(panel_width, panel_height)
        .color(nannou::color::rgba(0.0, 0.0, 0.0, 0.7));

    let text_x = window_rect.right() - panel_width + margin;
    let text_y = window_rect.top() - margin;
    for (i, text) in debug_texts.iter().enumerate() {
        let y = text_y - (i as f32 * line_height);

        // Position the text with a fixed offset from the left edge
        draw.text(text)
            .x_y(text_x + 90.0, y)
            .color(nannou::color::WHITE)
            .font_size(14);
    }
}
