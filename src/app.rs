/*
 * Application Module
 *
 * This module wires the simulation pipeline into a nannou window. The pipeline
 * runs on the window's own device. The update callback handles the control
 * panel and runs one scheduler tick (step, render into the target, swap); the
 * view callback copies the render target into the frame and adds the world
 * outline, the debug overlay and the egui panel on top.
 */

use std::sync::OnceLock;

use nannou::prelude::*;
use nannou::wgpu;
use nannou_egui::Egui;

use crate::camera::{Camera, PanScale};
use crate::config::Config;
use crate::debug::DebugInfo;
use crate::device::Device;
use crate::entity::Variant;
use crate::input::{self, DragTracker};
use crate::reader::{PendingReadback, Record};
use crate::scheduler::FrameScheduler;
use crate::ui;
use crate::WORLD_SIZE;

// Configuration handed from `run` to the model builder
static STARTUP_CONFIG: OnceLock<Config> = OnceLock::new();

// Main model for the application
pub struct Model {
    pub scheduler: FrameScheduler,
    pub egui: Egui,
    pub debug_info: DebugInfo,
    pub drag: DragTracker,
    pub mouse_position: Vec2,
    pub pan_scale: PanScale,
    pub pending_readback: Option<PendingReadback>,
    pub next_seed: i64,
    // Copies the render target into the frame, tagged with the target generation
    reshaper: Option<(u64, wgpu::TextureReshaper)>,
}

/// Open the window and run the frame loop until it closes.
pub fn run(config: Config) {
    if STARTUP_CONFIG.set(config).is_err() {
        log::warn!("application was already configured, keeping the first configuration");
    }
    nannou::app(model).update(update).run();
}

fn startup_config() -> Config {
    if let Some(config) = STARTUP_CONFIG.get() {
        return config.clone();
    }
    match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(2);
        }
    }
}

// Initialize the model
fn model(app: &App) -> Model {
    let config = startup_config();

    let window_id = app
        .new_window()
        .title("Boids Compute")
        .size(1280, 800)
        .view(view)
        .resized(resized)
        .key_pressed(key_pressed)
        .mouse_moved(input::mouse_moved)
        .mouse_pressed(input::mouse_pressed)
        .mouse_released(input::mouse_released)
        .mouse_wheel(input::mouse_wheel)
        .raw_event(input::raw_window_event)
        .build();
    let window_id = match window_id {
        Ok(id) => id,
        Err(e) => {
            log::error!("failed to create window: {:?}", e);
            std::process::exit(1);
        }
    };

    let Some(window) = app.window(window_id) else {
        log::error!("window closed during startup");
        std::process::exit(1);
    };
    let rect = window.rect();
    let surface = (rect.w() as u32, rect.h() as u32);
    let egui = Egui::from_window(&window);

    let started = Device::from_device_queue_pair(window.device_queue_pair().clone())
        .and_then(|device| FrameScheduler::from_device(device, &config, surface));
    let scheduler = match started {
        Ok(scheduler) => scheduler,
        Err(e) => {
            log::error!("failed to start simulation: {}", e);
            std::process::exit(1);
        }
    };
    let reshaper = Some(build_reshaper(&window, &scheduler));
    drop(window);

    Model {
        scheduler,
        egui,
        debug_info: DebugInfo::default(),
        drag: DragTracker::default(),
        mouse_position: Vec2::ZERO,
        pan_scale: config.pan_scale(),
        pending_readback: None,
        next_seed: config.seed(),
        reshaper,
    }
}

// Pass sampling the current render target into the window's frame texture
fn build_reshaper(window: &nannou::window::Window, scheduler: &FrameScheduler) -> (u64, wgpu::TextureReshaper) {
    let renderer = scheduler.renderer();
    let reshaper = wgpu::TextureReshaper::new(
        window.device(),
        renderer.target_view(),
        1,
        wgpu::TextureSampleType::Float { filterable: true },
        window.msaa_samples(),
        Frame::TEXTURE_FORMAT,
    );
    (renderer.reconfiguration_count(), reshaper)
}

// Summarize a readback for the log and the panel
fn describe_readback(records: &[Record]) -> String {
    match records.first() {
        Some(first) => format!("{} records, first {:?}", records.len(), first),
        None => "0 records".to_string(),
    }
}

fn request_readback(model: &mut Model) {
    if model.pending_readback.is_some() {
        return;
    }
    match model.scheduler.request_readback() {
        Ok(pending) => model.pending_readback = Some(pending),
        Err(e) => log::error!("readback failed: {}", e),
    }
}

fn poll_readback(model: &mut Model) {
    let Some(result) = model.pending_readback.as_mut().and_then(PendingReadback::try_wait) else {
        return;
    };
    model.pending_readback = None;

    match result {
        Ok(records) => {
            let summary = describe_readback(&records);
            log::info!("readback: {}", summary);
            model.debug_info.last_readback = Some(summary);
        }
        Err(e) => log::error!("readback failed: {}", e),
    }
}

fn reseed(app: &App, model: &mut Model) {
    model.next_seed = model.next_seed.wrapping_add(1);
    if let Err(e) = model.scheduler.reseed(model.next_seed) {
        log::error!("reseed failed: {}", e);
        app.quit();
    }
}

// Update the model
fn update(app: &App, model: &mut Model, update: Update) {
    model.debug_info.frame_time = update.since_last;

    let camera = *model.scheduler.camera();
    let variant = model.scheduler.options().variant;
    let entity_count = model.scheduler.state().entity_count();
    let actions = ui::update_ui(
        &mut model.egui,
        model.scheduler.params_mut(),
        &model.debug_info,
        &camera,
        variant,
        entity_count,
    );

    if actions.forces_changed {
        log::debug!("parameters changed: {:?}", model.scheduler.params());
    }
    if actions.reset_camera {
        *model.scheduler.camera_mut() = Camera::new();
    }
    if actions.reseed {
        reseed(app, model);
    }
    if actions.readback {
        request_readback(model);
    }
    poll_readback(model);

    if let Err(e) = model.scheduler.tick() {
        log::error!("simulation stopped: {}", e);
        app.quit();
        return;
    }

    model.debug_info.fps = model.scheduler.fps();
    model.debug_info.parameter_uploads = model.scheduler.simulation_step().upload_count();
    let reconfigurations = model.scheduler.renderer().reconfiguration_count();
    model.debug_info.surface_reconfigurations = reconfigurations;
    let draw = *model.scheduler.last_draw();
    model.debug_info.vertex_count = draw.vertex_count;
    model.debug_info.surface = (draw.surface.width, draw.surface.height);
    model.debug_info.cursor_world = model.scheduler.camera().screen_to_world(model.mouse_position);

    // A reconfigured surface has a new target to present
    if model.reshaper.as_ref().map(|(generation, _)| *generation) != Some(reconfigurations) {
        if let Some(window) = app.window(app.window_id()) {
            model.reshaper = Some(build_reshaper(&window, &model.scheduler));
        }
    }
}

fn resized(_app: &App, model: &mut Model, size: Vec2) {
    model.scheduler.renderer_mut().resize(size.x.max(0.0) as u32, size.y.max(0.0) as u32);
}

fn key_pressed(app: &App, model: &mut Model, key: Key) {
    match key {
        Key::R => request_readback(model),
        Key::Space => {
            let params = model.scheduler.params_mut();
            params.pause_simulation = !params.pause_simulation;
        }
        Key::N => reseed(app, model),
        Key::C => *model.scheduler.camera_mut() = Camera::new(),
        _ => {}
    }
}

// Render the model
fn view(app: &App, model: &Model, frame: Frame) {
    if let Some((_, reshaper)) = &model.reshaper {
        let mut encoder = frame.command_encoder();
        reshaper.encode_render_pass(frame.texture_view(), &mut encoder);
    }

    // Overlays load the presented target instead of clearing it
    let draw = app.draw();

    let window_rect = app.window_rect();
    let camera = model.scheduler.camera();
    let variant = model.scheduler.options().variant;

    // Draw world boundary to show the simulation limits
    if variant == Variant::Flock {
        let corner_a = camera.world_to_screen(vec2(-WORLD_SIZE / 2.0, -WORLD_SIZE / 2.0));
        let corner_b = camera.world_to_screen(vec2(WORLD_SIZE / 2.0, WORLD_SIZE / 2.0));
        let world_rect = Rect::from_corners(corner_a, corner_b);
        draw.rect()
            .xy(world_rect.xy())
            .wh(world_rect.wh())
            .no_fill()
            .stroke_weight(1.0)
            .stroke(rgba(0.3, 0.3, 0.3, 1.0));
    }

    if model.scheduler.params().show_debug {
        ui::draw_debug_info(
            &draw,
            &model.debug_info,
            window_rect,
            model.scheduler.state().entity_count(),
            camera.zoom,
        );
    }

    if let Err(e) = draw.to_frame(app, &frame) {
        log::error!("failed to draw frame: {:?}", e);
    }
    if let Err(e) = model.egui.draw_to_frame(&frame) {
        log::error!("failed to draw ui: {:?}", e);
    }
}
