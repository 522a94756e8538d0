use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info};

use crate::camera::{model_matrix, LightRig, OrbitCamera};
use crate::config::RendererConfig;
use crate::error::{RendererError, Result};
use crate::settings::SettingsQueue;
use crate::uniforms::{HostUniforms, RotationSettings, UniformSink, UniformSlot, UniformState};

/// Cooperative cancellation flag shared with the host.
///
/// Checked after asynchronous setup and before every frame.
#[derive(Debug, Clone)]
pub struct SessionToken {
    active: Arc<AtomicBool>,
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionToken {
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn cancel(&self) {
        self.active.store(false, Ordering::Release);
    }
}

/// Wall-clock source in milliseconds.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

impl<F> Clock for F
where
    F: Fn() -> f64,
{
    fn now_ms(&self) -> f64 {
        self()
    }
}

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[cfg(not(target_arch = "wasm32"))]
    fn now_ms(&self) -> f64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }

    #[cfg(target_arch = "wasm32")]
    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    Shadow,
    Color,
}

/// Indexed draw covering the whole mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawRange {
    pub index_count: u32,
}

/// Records the passes of one frame and hands them to the queue as one batch.
pub trait PassRecorder {
    /// Prepares a frame. `Ok(false)` skips this frame without error.
    fn begin_frame(&mut self) -> Result<bool>;
    /// Records one complete pass: begin, bind, draw, end.
    fn record_pass(&mut self, pass: PassKind, draw: DrawRange) -> Result<()>;
    /// Submits everything recorded since [`PassRecorder::begin_frame`].
    fn submit(&mut self) -> Result<()>;
}

/// Everything the scheduler drives: uniform uploads plus pass recording.
pub trait FrameBackend: PassRecorder + UniformSink {}

impl<T: PassRecorder + UniformSink> FrameBackend for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Both passes were submitted; the host should request the next frame.
    Rendered,
    /// The backend skipped this frame; the host should still request the next one.
    Skipped,
    /// The scheduler is not running; the host must not request another frame.
    Stopped,
}

impl FrameOutcome {
    pub fn wants_next_frame(self) -> bool {
        !matches!(self, Self::Stopped)
    }
}

/// Animation loop for the two-pass shadow renderer.
///
/// Each frame writes the orbiting camera, records the shadow pass and the
/// colour pass, and submits them as a single batch.
pub struct FrameScheduler<B> {
    backend: B,
    uniforms: UniformState,
    camera: OrbitCamera,
    settings: SettingsQueue,
    session: SessionToken,
    draw: DrawRange,
    state: SchedulerState,
    frames: u64,
}

impl<B: FrameBackend> FrameScheduler<B> {
    /// Writes the fixed light and model uniforms and the initial rotation.
    pub fn new(
        mut backend: B,
        config: &RendererConfig,
        aspect: f32,
        draw: DrawRange,
        session: SessionToken,
        settings: SettingsQueue,
    ) -> Result<Self> {
        let mut uniforms = UniformState::new();
        let camera = OrbitCamera::new(config, aspect);
        let light = LightRig::new(config);

        uniforms.set_light(&mut backend, light.view_proj, light.position)?;
        uniforms.set_model(&mut backend, model_matrix(config))?;
        uniforms.set_rotation(&mut backend, RotationSettings::default());
        uniforms.set_camera(&mut backend, camera.view_proj_for_angle(0.0));

        Ok(Self {
            backend,
            uniforms,
            camera,
            settings,
            session,
            draw,
            state: SchedulerState::Idle,
            frames: 0,
        })
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn uniforms(&self) -> &UniformState {
        &self.uniforms
    }

    pub fn session(&self) -> &SessionToken {
        &self.session
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Releases the backend and every GPU resource it owns.
    pub fn into_backend(self) -> B {
        self.backend
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.camera.set_aspect(aspect);
    }

    /// Moves from idle to running if the session is still active.
    pub fn start(&mut self) -> bool {
        if self.state == SchedulerState::Idle {
            self.state = if self.session.is_active() {
                info!("frame loop running");
                SchedulerState::Running
            } else {
                SchedulerState::Stopped
            };
        }
        self.state == SchedulerState::Running
    }

    /// Renders one frame at wall-clock time `now_ms`.
    pub fn frame(&mut self, now_ms: f64) -> Result<FrameOutcome> {
        if self.state != SchedulerState::Running {
            return Ok(FrameOutcome::Stopped);
        }
        if !self.session.is_active() {
            info!("session ended after {} frames", self.frames);
            self.state = SchedulerState::Stopped;
            return Ok(FrameOutcome::Stopped);
        }

        let mut rotation = self.uniforms.rotation();
        if self.settings.apply_pending(&mut rotation) {
            self.uniforms.set_rotation(&mut self.backend, rotation);
        }

        let view_proj = self.camera.view_proj_at(now_ms);
        self.uniforms.set_camera(&mut self.backend, view_proj);

        if !self.backend.begin_frame()? {
            debug!("frame skipped by backend");
            return Ok(FrameOutcome::Skipped);
        }
        self.backend.record_pass(PassKind::Shadow, self.draw)?;
        self.backend.record_pass(PassKind::Color, self.draw)?;
        self.backend.submit()?;
        self.frames += 1;
        Ok(FrameOutcome::Rendered)
    }

    /// Stops the loop; later frames return [`FrameOutcome::Stopped`].
    pub fn stop(&mut self) {
        self.session.cancel();
        self.state = SchedulerState::Stopped;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent {
    BeginFrame,
    BeginPass(PassKind),
    DrawIndexed(PassKind, u32),
    EndPass(PassKind),
    Submit,
}

/// Headless backend that mirrors uniforms in memory and logs recorded commands.
#[derive(Debug, Default)]
pub struct FrameRecorder {
    uniforms: HostUniforms,
    events: Vec<TraceEvent>,
    frame_open: bool,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uniforms(&self) -> &HostUniforms {
        &self.uniforms
    }

    pub fn uniform_bytes(&self, slot: UniformSlot) -> &[u8] {
        self.uniforms.bytes(slot)
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<TraceEvent> {
        std::mem::take(&mut self.events)
    }
}

impl UniformSink for FrameRecorder {
    fn write_uniform(&mut self, slot: UniformSlot, offset: u64, bytes: &[u8]) {
        self.uniforms.write_uniform(slot, offset, bytes);
    }
}

impl PassRecorder for FrameRecorder {
    fn begin_frame(&mut self) -> Result<bool> {
        self.frame_open = true;
        self.events.push(TraceEvent::BeginFrame);
        Ok(true)
    }

    fn record_pass(&mut self, pass: PassKind, draw: DrawRange) -> Result<()> {
        if !self.frame_open {
            return Err(RendererError::FrameNotStarted);
        }
        self.events.push(TraceEvent::BeginPass(pass));
        self.events.push(TraceEvent::DrawIndexed(pass, draw.index_count));
        self.events.push(TraceEvent::EndPass(pass));
        Ok(())
    }

    fn submit(&mut self) -> Result<()> {
        if !std::mem::replace(&mut self.frame_open, false) {
            return Err(RendererError::FrameNotStarted);
        }
        self.events.push(TraceEvent::Submit);
        Ok(())
    }
}
