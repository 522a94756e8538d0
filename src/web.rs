#![cfg(target_arch = "wasm32")]

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{anyhow, Result};
use log::{error, info};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{window, HtmlCanvasElement};

use crate::config::RendererConfig;
use crate::error::RendererError;
use crate::frame::{Clock, FrameOutcome, FrameScheduler, SessionToken, SystemClock};
use crate::geometry::PackedGeometry;
use crate::mesh::{load_mesh_from_str, UNIT_CUBE_OBJ};
use crate::render::Renderer;
use crate::settings::{
    rotation_controls, InteractiveSettings, SettingsQueue, ROTATION_AXIS_FIELD,
    ROTATION_DEGREE_FIELD,
};
use crate::uniforms::RotationSettings;

#[wasm_bindgen(start)]
pub fn bootstrap() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

/// Handle returned to JavaScript for controlling a running viewer.
#[wasm_bindgen]
pub struct ShadowViewerHandle {
    session: SessionToken,
    controls: Rc<RefCell<InteractiveSettings>>,
}

#[wasm_bindgen]
impl ShadowViewerHandle {
    /// Ends the viewer. Works during GPU setup too; resources are released
    /// when setup finishes or on the next animation frame.
    pub fn stop(&self) {
        self.session.cancel();
    }

    #[wasm_bindgen(js_name = isRunning)]
    pub fn is_running(&self) -> bool {
        self.session.is_active()
    }

    #[wasm_bindgen(js_name = setRotationDegree)]
    pub fn set_rotation_degree(&self, degree: f32) -> Result<f32, JsValue> {
        self.controls
            .borrow_mut()
            .set_number(ROTATION_DEGREE_FIELD, degree)
            .map_err(to_js)
    }

    #[wasm_bindgen(js_name = setAxis)]
    pub fn set_axis(&self, axis: &str) -> Result<(), JsValue> {
        self.controls
            .borrow_mut()
            .set_choice(ROTATION_AXIS_FIELD, axis)
            .map_err(to_js)
    }
}

/// Loads `obj_text` (or the built-in cube) and starts rendering into the canvas `canvas_id`.
///
/// Mesh and canvas errors are returned directly. GPU setup continues in the
/// background and the returned handle can cancel it.
#[wasm_bindgen]
pub fn start(canvas_id: String, obj_text: Option<String>) -> Result<ShadowViewerHandle, JsValue> {
    let mut mesh =
        load_mesh_from_str(obj_text.as_deref().unwrap_or(UNIT_CUBE_OBJ)).map_err(to_js)?;
    mesh.normalize();
    let geometry = PackedGeometry::pack(&mesh).map_err(to_js)?;
    info!(
        "Loaded mesh with {} vertices ({} triangles)",
        mesh.vertex_count(),
        mesh.triangle_count()
    );

    let canvas = find_canvas(&canvas_id)?;
    let session = SessionToken::new();
    let queue = SettingsQueue::new();
    let controls = rotation_controls(RotationSettings::default(), &queue).map_err(to_js)?;

    let setup_session = session.clone();
    spawn_local(async move {
        if let Err(err) = run_viewer(canvas, geometry, setup_session, queue).await {
            error!("viewer error: {err:#}");
        }
    });

    Ok(ShadowViewerHandle {
        session,
        controls: Rc::new(RefCell::new(controls)),
    })
}

async fn run_viewer(
    canvas: HtmlCanvasElement,
    geometry: PackedGeometry,
    session: SessionToken,
    queue: SettingsQueue,
) -> Result<()> {
    let config = RendererConfig::default();
    let renderer = Renderer::new(
        wgpu::SurfaceTarget::Canvas(canvas.clone()),
        canvas.width().max(1),
        canvas.height().max(1),
        &geometry,
        &config,
    )
    .await?;

    if !session.is_active() {
        info!("viewer stopped during setup");
        return Ok(());
    }

    let aspect = renderer.aspect();
    let draw = renderer.draw_range();
    let mut scheduler = FrameScheduler::new(renderer, &config, aspect, draw, session, queue)?;
    if scheduler.start() {
        let viewer = Rc::new(RefCell::new(Some(WebViewer { canvas, scheduler })));
        schedule_animation_loop(viewer)?;
    }
    Ok(())
}

struct WebViewer {
    canvas: HtmlCanvasElement,
    scheduler: FrameScheduler<Renderer>,
}

impl WebViewer {
    fn render_frame(&mut self) -> Result<FrameOutcome, RendererError> {
        let (width, height) = (self.canvas.width(), self.canvas.height());
        let renderer = self.scheduler.backend_mut();
        if renderer.size() != (width, height) && width > 0 && height > 0 {
            renderer.resize(width, height);
            let aspect = renderer.aspect();
            self.scheduler.set_aspect(aspect);
        }
        self.scheduler.frame(SystemClock.now_ms())
    }
}

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

fn schedule_animation_loop(viewer: Rc<RefCell<Option<WebViewer>>>) -> Result<()> {
    let callback: FrameCallback = Rc::new(RefCell::new(None));
    let next = Rc::clone(&callback);

    *callback.borrow_mut() = Some(Closure::wrap(Box::new(move || {
        let outcome = match viewer.borrow_mut().as_mut() {
            Some(active) => active.render_frame(),
            None => return,
        };
        match outcome {
            Ok(outcome) if outcome.wants_next_frame() => {
                if let Err(err) = request_frame(&next) {
                    error!("{err:#}");
                }
            }
            Ok(_) => {
                // Dropping the scheduler releases the renderer and its GPU objects.
                viewer.borrow_mut().take();
                info!("viewer stopped");
            }
            Err(err) => {
                error!("render failed: {err}");
                viewer.borrow_mut().take();
            }
        }
    }) as Box<dyn FnMut()>));

    request_frame(&callback)
}

fn request_frame(callback: &FrameCallback) -> Result<()> {
    let window = window().ok_or_else(|| anyhow!("window not available"))?;
    let callback = callback.borrow();
    let closure = callback
        .as_ref()
        .ok_or_else(|| anyhow!("frame callback missing"))?;
    window
        .request_animation_frame(closure.as_ref().unchecked_ref())
        .map_err(|err| anyhow!("requestAnimationFrame failed: {err:?}"))?;
    Ok(())
}

fn find_canvas(canvas_id: &str) -> Result<HtmlCanvasElement, JsValue> {
    let window = window().ok_or_else(|| JsValue::from_str("window not available"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("document not available"))?;
    document
        .get_element_by_id(canvas_id)
        .ok_or_else(|| JsValue::from_str("canvas element not found"))?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| JsValue::from_str("element is not a canvas"))
}

fn to_js(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}
