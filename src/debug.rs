/*
 * Debug Information Module
 *
 * This module holds the frame-rate tracker fed once per completed frame and
 * the DebugInfo shown in the UI panel.
 *
 * FPS is averaged over a sliding window of the last 100 frame deltas, so a
 * single slow frame moves the estimate by a bounded amount.
 */

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use nannou::prelude::Vec2;

pub const FPS_HISTORY_LENGTH: usize = 100;

#[derive(Debug)]
pub struct FpsTracker {
    fps: f32,
    last_time: Instant,
    // Frame deltas in milliseconds, oldest first
    delta_times: VecDeque<f32>,
}

impl Default for FpsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl FpsTracker {
    pub fn new() -> Self {
        Self {
            fps: 0.0,
            last_time: Instant::now(),
            delta_times: VecDeque::with_capacity(FPS_HISTORY_LENGTH),
        }
    }

    // Record a frame completed now
    pub fn update(&mut self) {
        // The first frame measures from tracker creation
        let now = Instant::now();
        let delta = now - self.last_time;
        self.last_time = now;
        self.update_with_delta(delta);
    }

    pub fn update_with_delta(&mut self, delta: Duration) {
        if self.delta_times.len() >= FPS_HISTORY_LENGTH {
            self.delta_times.pop_front();
        }
        self.delta_times.push_back(delta.as_secs_f32() * 1000.0);

        let total: f32 = self.delta_times.iter().sum();
        if total > 0.0 {
            self.fps = 1000.0 * self.delta_times.len() as f32 / total;
        }
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn samples(&self) -> usize {
        self.delta_times.len()
    }
}

// Debug information to display
#[derive(Debug, Default, Clone)]
pub struct DebugInfo {
    pub fps: f32,
    pub frame_time: Duration,
    pub vertex_count: u32,
    pub surface: (u32, u32),
    pub cursor_world: Vec2,
    pub parameter_uploads: u64,
    pub surface_reconfigurations: u64,
    pub last_readback: Option<String>,
}
