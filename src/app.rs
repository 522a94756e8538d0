use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, warn};
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::config::RendererConfig;
use crate::frame::{Clock, FrameScheduler, SessionToken, SystemClock};
use crate::geometry::PackedGeometry;
use crate::render::Renderer;
use crate::settings::{
    rotation_controls, InteractiveSettings, SettingValue, SettingsError, SettingsQueue,
    ROTATION_AXIS_FIELD, ROTATION_DEGREE_FIELD,
};
use crate::uniforms::{RotationAxis, RotationSettings};

const DEGREE_STEP: f32 = 5.0;

/// Window or event loop could not be created; callers may fall back to headless mode.
#[derive(Debug)]
pub struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

/// Opens a window and renders `geometry` until the window is closed.
pub fn run(geometry: PackedGeometry, config: RendererConfig) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = ViewerApp::new(geometry, config).context("failed to build rotation controls")?;
    event_loop
        .run_app(&mut app)
        .context("event loop terminated with error")?;

    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct ViewerApp {
    geometry: PackedGeometry,
    config: RendererConfig,
    session: SessionToken,
    queue: SettingsQueue,
    controls: InteractiveSettings,
    active: Option<ActiveWindow>,
    error: Option<anyhow::Error>,
}

struct ActiveWindow {
    window: Arc<Window>,
    scheduler: FrameScheduler<Renderer>,
}

impl ViewerApp {
    fn new(geometry: PackedGeometry, config: RendererConfig) -> Result<Self, SettingsError> {
        let queue = SettingsQueue::new();
        let controls = rotation_controls(RotationSettings::default(), &queue)?;
        Ok(Self {
            geometry,
            config,
            session: SessionToken::new(),
            queue,
            controls,
            active: None,
            error: None,
        })
    }

    fn open_window(&mut self, event_loop: &ActiveEventLoop) -> Result<ActiveWindow> {
        let attributes = Window::default_attributes()
            .with_title("Shadow Viewer")
            .with_inner_size(LogicalSize::new(1280.0, 720.0));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|err| WindowInitError::from_error("window", err))?,
        );

        let size = window.inner_size();
        let renderer = block_on(Renderer::new(
            Arc::clone(&window),
            size.width.max(1),
            size.height.max(1),
            &self.geometry,
            &self.config,
        ))?;
        let aspect = renderer.aspect();
        let draw = renderer.draw_range();

        let mut scheduler = FrameScheduler::new(
            renderer,
            &self.config,
            aspect,
            draw,
            self.session.clone(),
            self.queue.clone(),
        )?;
        scheduler.start();
        Ok(ActiveWindow { window, scheduler })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        self.error = Some(err);
        self.shutdown(event_loop);
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.session.cancel();
        if let Some(active) = self.active.take() {
            info!(
                "released GPU resources after {} frames",
                active.scheduler.frames_rendered()
            );
        }
        event_loop.exit();
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        if event.state != ElementState::Pressed {
            return;
        }
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        let result = match code {
            KeyCode::Escape => {
                self.shutdown(event_loop);
                return;
            }
            KeyCode::KeyX => self.select_axis(RotationAxis::X),
            KeyCode::KeyY => self.select_axis(RotationAxis::Y),
            KeyCode::KeyZ => self.select_axis(RotationAxis::Z),
            KeyCode::ArrowUp => self.step_degree(DEGREE_STEP),
            KeyCode::ArrowDown => self.step_degree(-DEGREE_STEP),
            _ => return,
        };
        if let Err(err) = result {
            warn!("ignoring settings change: {err}");
        }
    }

    fn select_axis(&mut self, axis: RotationAxis) -> Result<(), SettingsError> {
        self.controls.set_choice(ROTATION_AXIS_FIELD, axis.name())
    }

    fn step_degree(&mut self, step: f32) -> Result<(), SettingsError> {
        let current = match self.controls.value(ROTATION_DEGREE_FIELD) {
            Some(SettingValue::Number(degree)) => *degree,
            _ => 0.0,
        };
        self.controls
            .set_number(ROTATION_DEGREE_FIELD, current + step)
            .map(|_| ())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        match active.scheduler.frame(SystemClock.now_ms()) {
            Ok(outcome) if outcome.wants_next_frame() => active.window.request_redraw(),
            Ok(_) => self.shutdown(event_loop),
            Err(err) => self.fail(event_loop, err.into()),
        }
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.active.is_some() {
            return;
        }
        match self.open_window(event_loop) {
            Ok(active) => {
                if !self.session.is_active() {
                    self.shutdown(event_loop);
                    return;
                }
                active.window.request_redraw();
                self.active = Some(active);
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.window.id() != window_id {
            return;
        }
        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::Resized(size) => {
                let renderer = active.scheduler.backend_mut();
                renderer.resize(size.width, size.height);
                let aspect = renderer.aspect();
                active.scheduler.set_aspect(aspect);
            }
            WindowEvent::KeyboardInput { event, .. } if !event.repeat => {
                self.handle_key(event_loop, &event)
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }
}
