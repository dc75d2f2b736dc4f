use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pixels::Error as PixelsError;
use thiserror::Error;
use tracing::{info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use crate::geometry::Vec2;
use crate::scene::Scene;
use crate::AppPaths;

use super::input::ActionStates;
use super::renderer::FrameRenderer;
use super::{InputAction, InputSnapshot};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub stats_log_interval: Duration,
    pub max_render_fps: Option<u32>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "tilescene".to_string(),
            window_width: 1280,
            window_height: 720,
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            stats_log_interval: Duration::from_secs(1),
            max_render_fps: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

/// Game-side logic driven by the loop. Each simulation tick calls `update` before the scene's
/// own update and collision passes.
pub trait SceneDriver {
    fn load(&mut self, _scene: &mut Scene) {}
    fn update(&mut self, dt_seconds: f32, input: &InputSnapshot, scene: &mut Scene);
    fn shutdown(&mut self, _scene: &mut Scene) {}
}

pub fn run_app(
    config: LoopConfig,
    app_paths: &AppPaths,
    mut scene: Scene,
    mut driver: Box<dyn SceneDriver>,
) -> Result<(), AppError> {
    info!(
        root = %app_paths.root.display(),
        actors_dir = %app_paths.actors_dir.display(),
        sprites_dir = %app_paths.sprites_dir.display(),
        cache_dir = %app_paths.cache_dir.display(),
        "startup"
    );

    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                config.window_width as f64,
                config.window_height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let mut renderer = FrameRenderer::new(Arc::clone(&window), app_paths.sprites_dir.clone())
        .map_err(AppError::CreateRenderer)?;

    event_loop.set_control_flow(ControlFlow::Poll);

    let target_tps = config.target_tps.max(1);
    let max_frame_delta = non_zero_or(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let stats_log_interval = non_zero_or(config.stats_log_interval, Duration::from_secs(1));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let fixed_dt_seconds = fixed_dt.as_secs_f32();
    let render_frame_target = config
        .max_render_fps
        .filter(|fps| *fps > 0)
        .map(|fps| Duration::from_secs_f64(1.0 / fps as f64));

    let (width, height) = renderer.size();
    let mut input_collector = InputCollector::new(width, height);
    scene.set_screen_size(width, height);
    driver.load(&mut scene);
    info!(actor_count = scene.actor_count(), "scene_loaded");
    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        render_fps_cap = ?config.max_render_fps,
        "loop_config"
    );

    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut last_present_instant = Instant::now();
    let mut stats = FrameStats::new(stats_log_interval, last_frame_instant);

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(size) => {
                    input_collector.set_window_size(size.width, size.height);
                    if let Err(error) = renderer.resize(size.width, size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::CursorMoved { position, .. } => {
                    input_collector.cursor_position_px =
                        Some(Vec2::new(position.x as f32, position.y as f32));
                }
                WindowEvent::CursorLeft { .. } => {
                    input_collector.cursor_position_px = None;
                }
                WindowEvent::MouseInput { state, button, .. } => {
                    input_collector.handle_mouse_input(button, state);
                }
                WindowEvent::MouseWheel { delta, .. } => {
                    input_collector.handle_mouse_wheel(delta);
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    input_collector.handle_keyboard_input(&event);
                    if input_collector.actions.is_down(InputAction::Quit) {
                        info!(reason = "escape_key", "shutdown_requested");
                        window_target.exit();
                    }
                }
                WindowEvent::RedrawRequested => {
                    let now = Instant::now();
                    let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
                    last_frame_instant = now;
                    accumulator = accumulator.saturating_add(raw_frame_dt.min(max_frame_delta));

                    let plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
                    let (width, height) = renderer.size();
                    scene.set_screen_size(width, height);
                    for _ in 0..plan.ticks_to_run {
                        let input = input_collector.snapshot_for_tick();
                        driver.update(fixed_dt_seconds, &input, &mut scene);
                        scene.update(fixed_dt_seconds);
                        scene.resolve_collisions();
                        stats.ticks += 1;
                    }
                    accumulator = plan.remaining_accumulator;
                    if plan.dropped_backlog > Duration::ZERO {
                        warn!(
                            dropped_backlog_ms = plan.dropped_backlog.as_millis() as u64,
                            max_ticks_per_frame, "sim_clamp_triggered"
                        );
                    }

                    if let Some(target) = render_frame_target {
                        let elapsed = Instant::now().saturating_duration_since(last_present_instant);
                        if elapsed < target {
                            thread::sleep(target - elapsed);
                        }
                    }

                    renderer.clear();
                    scene.render(&mut renderer);
                    if let Err(error) = renderer.present() {
                        warn!(error = %error, "renderer_draw_failed");
                        window_target.exit();
                    }
                    last_present_instant = Instant::now();
                    stats.frames += 1;

                    if let Some((fps, tps)) = stats.take_rates(now) {
                        info!(fps, tps, actor_count = scene.actor_count(), zoom = scene.zoom(), "loop_metrics");
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                window.request_redraw();
            }
            Event::LoopExiting => {
                driver.shutdown(&mut scene);
                info!("shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

/// Ticks and frames counted over a logging interval.
#[derive(Debug)]
struct FrameStats {
    interval: Duration,
    window_start: Instant,
    ticks: u32,
    frames: u32,
}

impl FrameStats {
    fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            window_start: now,
            ticks: 0,
            frames: 0,
        }
    }

    /// Returns `(fps, tps)` and starts a new window once the interval has elapsed.
    fn take_rates(&mut self, now: Instant) -> Option<(f32, f32)> {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.interval {
            return None;
        }
        let seconds = elapsed.as_secs_f32();
        let rates = (self.frames as f32 / seconds, self.ticks as f32 / seconds);
        self.window_start = now;
        self.ticks = 0;
        self.frames = 0;
        Some(rates)
    }
}

#[derive(Debug, Default)]
struct InputCollector {
    actions: ActionStates,
    cursor_position_px: Option<Vec2>,
    left_mouse_is_down: bool,
    left_click_pressed_edge: bool,
    right_mouse_is_down: bool,
    right_click_pressed_edge: bool,
    save_key_is_down: bool,
    save_pressed_edge: bool,
    zoom_in_key_is_down: bool,
    zoom_out_key_is_down: bool,
    pending_zoom_steps: i32,
    window_width: u32,
    window_height: u32,
}

impl InputCollector {
    fn new(window_width: u32, window_height: u32) -> Self {
        Self {
            window_width,
            window_height,
            ..Self::default()
        }
    }

    fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_width = width;
        self.window_height = height;
    }

    fn handle_keyboard_input(&mut self, key_event: &KeyEvent) {
        let PhysicalKey::Code(code) = key_event.physical_key else {
            return;
        };
        self.handle_key(code, key_event.state);
    }

    fn handle_key(&mut self, code: KeyCode, state: ElementState) {
        let is_pressed = state == ElementState::Pressed;
        match code {
            KeyCode::KeyW | KeyCode::ArrowUp => self.actions.set(InputAction::PanUp, is_pressed),
            KeyCode::KeyS | KeyCode::ArrowDown => self.actions.set(InputAction::PanDown, is_pressed),
            KeyCode::KeyA | KeyCode::ArrowLeft => self.actions.set(InputAction::PanLeft, is_pressed),
            KeyCode::KeyD | KeyCode::ArrowRight => {
                self.actions.set(InputAction::PanRight, is_pressed)
            }
            KeyCode::Escape => self.actions.set(InputAction::Quit, is_pressed),
            KeyCode::F5 => {
                if is_pressed && !self.save_key_is_down {
                    self.save_pressed_edge = true;
                }
                self.save_key_is_down = is_pressed;
            }
            KeyCode::Equal | KeyCode::NumpadAdd => {
                if is_pressed && !self.zoom_in_key_is_down {
                    self.pending_zoom_steps = self.pending_zoom_steps.saturating_add(1);
                }
                self.zoom_in_key_is_down = is_pressed;
            }
            KeyCode::Minus | KeyCode::NumpadSubtract => {
                if is_pressed && !self.zoom_out_key_is_down {
                    self.pending_zoom_steps = self.pending_zoom_steps.saturating_sub(1);
                }
                self.zoom_out_key_is_down = is_pressed;
            }
            _ => {}
        }
    }

    fn handle_mouse_wheel(&mut self, delta: MouseScrollDelta) {
        let steps = match delta {
            MouseScrollDelta::LineDelta(_, y) => y.round() as i32,
            MouseScrollDelta::PixelDelta(position) => position.y.signum() as i32,
        };
        self.pending_zoom_steps = self.pending_zoom_steps.saturating_add(steps);
    }

    fn handle_mouse_input(&mut self, button: MouseButton, state: ElementState) {
        let is_pressed = state == ElementState::Pressed;
        match button {
            MouseButton::Left => {
                if is_pressed && !self.left_mouse_is_down {
                    self.left_click_pressed_edge = true;
                }
                self.left_mouse_is_down = is_pressed;
            }
            MouseButton::Right => {
                if is_pressed && !self.right_mouse_is_down {
                    self.right_click_pressed_edge = true;
                }
                self.right_mouse_is_down = is_pressed;
            }
            _ => {}
        }
    }

    fn snapshot_for_tick(&mut self) -> InputSnapshot {
        let mut snapshot = InputSnapshot::empty()
            .with_cursor_position_px(self.cursor_position_px)
            .with_left_click_pressed(self.left_click_pressed_edge)
            .with_right_click_pressed(self.right_click_pressed_edge)
            .with_save_pressed(self.save_pressed_edge)
            .with_zoom_delta_steps(self.pending_zoom_steps)
            .with_window_size((self.window_width, self.window_height));
        for action in [
            InputAction::PanUp,
            InputAction::PanDown,
            InputAction::PanLeft,
            InputAction::PanRight,
            InputAction::Quit,
        ] {
            snapshot = snapshot.with_action_down(action, self.actions.is_down(action));
        }
        self.left_click_pressed_edge = false;
        self.right_click_pressed_edge = false;
        self.save_pressed_edge = false;
        self.pending_zoom_steps = 0;
        snapshot
    }
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(mut accumulator: Duration, fixed_dt: Duration, max_ticks_per_frame: u32) -> StepPlan {
    let mut ticks_to_run = 0u32;
    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator -= fixed_dt;
        ticks_to_run += 1;
    }

    let dropped_backlog = if accumulator >= fixed_dt {
        std::mem::take(&mut accumulator)
    } else {
        Duration::ZERO
    };
    StepPlan {
        ticks_to_run,
        remaining_accumulator: accumulator,
        dropped_backlog,
    }
}

fn non_zero_or(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_sim_steps_runs_whole_ticks_and_keeps_remainder() {
        let result = plan_sim_steps(Duration::from_millis(50), Duration::from_millis(16), 5);
        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::from_millis(2));
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let result = plan_sim_steps(Duration::from_millis(120), Duration::from_millis(16), 3);
        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::from_millis(72));
    }

    #[test]
    fn click_and_save_are_edge_triggered_for_single_tick() {
        let mut input = InputCollector::new(800, 600);
        input.handle_mouse_input(MouseButton::Left, ElementState::Pressed);
        input.handle_key(KeyCode::F5, ElementState::Pressed);

        let first = input.snapshot_for_tick();
        let second = input.snapshot_for_tick();
        assert!(first.left_click_pressed());
        assert!(first.save_pressed());
        assert!(!second.left_click_pressed());
        assert!(!second.save_pressed());

        input.handle_key(KeyCode::F5, ElementState::Pressed);
        assert!(!input.snapshot_for_tick().save_pressed());
    }

    #[test]
    fn held_keys_persist_across_ticks() {
        let mut input = InputCollector::new(800, 600);
        input.handle_key(KeyCode::ArrowLeft, ElementState::Pressed);
        assert!(input.snapshot_for_tick().is_down(InputAction::PanLeft));
        assert!(input.snapshot_for_tick().is_down(InputAction::PanLeft));
        input.handle_key(KeyCode::ArrowLeft, ElementState::Released);
        assert!(!input.snapshot_for_tick().is_down(InputAction::PanLeft));
    }

    #[test]
    fn zoom_steps_accumulate_from_keys_and_wheel() {
        let mut input = InputCollector::new(800, 600);
        input.handle_key(KeyCode::Equal, ElementState::Pressed);
        input.handle_key(KeyCode::Equal, ElementState::Pressed);
        input.handle_mouse_wheel(MouseScrollDelta::LineDelta(0.0, 2.0));
        input.handle_key(KeyCode::Minus, ElementState::Pressed);

        let snapshot = input.snapshot_for_tick();
        assert_eq!(snapshot.zoom_delta_steps(), 2);
        assert_eq!(snapshot.window_size(), (800, 600));
        assert_eq!(input.snapshot_for_tick().zoom_delta_steps(), 0);
    }

    #[test]
    fn frame_stats_report_after_interval() {
        let start = Instant::now();
        let mut stats = FrameStats::new(Duration::from_secs(1), start);
        stats.frames = 30;
        stats.ticks = 60;
        assert!(stats.take_rates(start + Duration::from_millis(500)).is_none());

        let (fps, tps) = stats
            .take_rates(start + Duration::from_secs(2))
            .expect("rates");
        assert!((fps - 15.0).abs() < 1e-3);
        assert!((tps - 30.0).abs() < 1e-3);
        assert_eq!(stats.frames, 0);
    }
}
