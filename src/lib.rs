//! Two-pass shadow-mapped mesh viewer.
//!
//! A mesh is loaded from OBJ text, normalized and packed into vertex and
//! index buffers. Every frame a depth-only pass renders the mesh from the
//! light into a shadow map, then a lit colour pass samples that map while a
//! camera orbits the model. The frame loop talks to the GPU through the
//! [`UniformSink`] and [`PassRecorder`] traits so it can also run headless
//! against [`FrameRecorder`].

#[cfg(not(target_arch = "wasm32"))]
pub mod app;
pub mod camera;
pub mod config;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod mesh;
pub mod render;
pub mod settings;
pub mod uniforms;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use camera::{orbit_angle, LightRig, OrbitCamera};
pub use config::RendererConfig;
pub use error::{RendererError, Result};
pub use frame::{
    Clock, DrawRange, FrameBackend, FrameOutcome, FrameRecorder, FrameScheduler, PassKind,
    PassRecorder, SchedulerState, SessionToken, SystemClock, TraceEvent,
};
pub use geometry::{GeometryBuffers, PackedGeometry, Vertex};
pub use mesh::{load_mesh_from_str, Mesh, MeshBuilder, UNIT_CUBE_OBJ};
pub use render::Renderer;
pub use settings::{rotation_controls, InteractiveSettings, SettingsEvent, SettingsQueue};
pub use uniforms::{
    HostUniforms, RotationAxis, RotationSettings, UniformSink, UniformSlot, UniformState,
};
