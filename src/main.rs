use std::env;
use std::fs;

use anyhow::{anyhow, Context, Result};

use shadow_viewer::{
    load_mesh_from_str, DrawRange, FrameRecorder, FrameScheduler, Mesh, PackedGeometry,
    RendererConfig, SessionToken, SettingsQueue, TraceEvent, UNIT_CUBE_OBJ,
};

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
fn run() -> Result<()> {
    use shadow_viewer::app::{self, WindowInitError};

    let options = CliOptions::parse(env::args().skip(1))?;
    let (source_name, source) = match &options.path {
        Some(path) => (
            path.clone(),
            fs::read_to_string(path).with_context(|| format!("failed to read mesh {path}"))?,
        ),
        None => ("built-in cube".to_string(), UNIT_CUBE_OBJ.to_string()),
    };

    let mut mesh = load_mesh_from_str(&source)
        .with_context(|| format!("failed to load mesh from {source_name}"))?;
    let scale = mesh.normalize();
    let geometry = PackedGeometry::pack(&mesh).context("failed to pack mesh buffers")?;
    print_summary(&source_name, &mesh, scale, &geometry);

    let config = RendererConfig::default();
    if options.summary_only {
        return run_headless(&geometry, &config);
    }

    match app::run(geometry.clone(), config.clone()) {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.downcast_ref::<WindowInitError>().is_some() {
                eprintln!(
                    "{err}. Falling back to --summary-only mode (set DISPLAY or install X11 libs to enable rendering)."
                );
                run_headless(&geometry, &config)
            } else {
                Err(err)
            }
        }
    }
}

fn print_summary(source_name: &str, mesh: &Mesh, scale: f32, geometry: &PackedGeometry) {
    println!(
        "Loaded mesh from {source_name} with {} vertices ({} triangles)",
        mesh.vertex_count(),
        mesh.triangle_count()
    );
    println!(
        "Normalized by {scale:.4}; max |coordinate| = {:.4}",
        mesh.max_abs_coordinate()
    );
    println!(
        "Packed {} vertex bytes and {} indices",
        geometry.vertex_bytes().len(),
        geometry.index_count()
    );
}

/// Runs one frame against the recording backend and prints the command trace.
fn run_headless(geometry: &PackedGeometry, config: &RendererConfig) -> Result<()> {
    let draw = DrawRange {
        index_count: geometry.index_count(),
    };
    let mut scheduler = FrameScheduler::new(
        FrameRecorder::new(),
        config,
        1.0,
        draw,
        SessionToken::new(),
        SettingsQueue::new(),
    )?;
    if !scheduler.start() {
        return Err(anyhow!("session ended before the first frame"));
    }
    let outcome = scheduler.frame(0.0)?;
    println!("Frame outcome: {outcome:?}");
    println!("Frame trace:");
    for event in scheduler.backend().events() {
        println!(" - {}", describe(event));
    }
    Ok(())
}

fn describe(event: &TraceEvent) -> String {
    match event {
        TraceEvent::BeginFrame => "begin frame".to_string(),
        TraceEvent::BeginPass(pass) => format!("begin {pass:?} pass"),
        TraceEvent::DrawIndexed(pass, count) => format!("draw {count} indices ({pass:?})"),
        TraceEvent::EndPass(pass) => format!("end {pass:?} pass"),
        TraceEvent::Submit => "submit".to_string(),
    }
}

struct CliOptions {
    path: Option<String>,
    summary_only: bool,
}

impl CliOptions {
    fn parse(args: impl Iterator<Item = String>) -> Result<Self> {
        let mut path = None;
        let mut summary_only = false;
        for arg in args {
            match arg.as_str() {
                "--summary-only" => summary_only = true,
                other if other.starts_with("--") => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Usage: shadow-viewer [mesh.obj] [--summary-only]"
                    ));
                }
                other if path.is_none() => path = Some(other.to_string()),
                other => {
                    return Err(anyhow!(
                        "Unexpected extra argument: {other}. Usage: shadow-viewer [mesh.obj] [--summary-only]"
                    ));
                }
            }
        }
        Ok(Self { path, summary_only })
    }
}
