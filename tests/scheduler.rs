use shadow_viewer::frame::{DrawRange, FrameOutcome, PassKind, TraceEvent};
use shadow_viewer::settings::{ROTATION_AXIS_FIELD, ROTATION_DEGREE_FIELD};
use shadow_viewer::uniforms::{CAMERA_VIEW_PROJ_OFFSET, SCENE_UNIFORM_SIZE};
use shadow_viewer::{
    load_mesh_from_str, rotation_controls, FrameRecorder, FrameScheduler, PackedGeometry,
    RendererConfig, RotationSettings, SessionToken, SettingsQueue, UniformSlot, UNIT_CUBE_OBJ,
};

fn cube_geometry() -> PackedGeometry {
    let mut mesh = load_mesh_from_str(UNIT_CUBE_OBJ).expect("cube parses");
    mesh.normalize();
    PackedGeometry::pack(&mesh).expect("cube packs")
}

fn running_scheduler(
    geometry: &PackedGeometry,
    queue: SettingsQueue,
) -> FrameScheduler<FrameRecorder> {
    let mut scheduler = FrameScheduler::new(
        FrameRecorder::new(),
        &RendererConfig::default(),
        16.0 / 9.0,
        DrawRange {
            index_count: geometry.index_count(),
        },
        SessionToken::new(),
        queue,
    )
    .expect("scheduler setup");
    assert!(scheduler.start());
    scheduler
}

#[test]
fn cube_loads_into_36_small_indices() {
    let mut mesh = load_mesh_from_str(UNIT_CUBE_OBJ).expect("cube parses");
    mesh.normalize();
    assert!((mesh.max_abs_coordinate() - 1.5).abs() < 1e-6);

    let geometry = PackedGeometry::pack(&mesh).expect("cube packs");
    assert_eq!(geometry.index_count(), 36);
    assert!(geometry.indices.iter().all(|&index| index < 8));
    assert_eq!(geometry.vertex_bytes().len(), 8 * 24);
}

#[test]
fn rotation_controls_reach_the_rotation_buffer() {
    let geometry = cube_geometry();
    let queue = SettingsQueue::new();
    let mut controls = rotation_controls(RotationSettings::default(), &queue).unwrap();
    let mut scheduler = running_scheduler(&geometry, queue);

    controls.set_number(ROTATION_DEGREE_FIELD, 90.0).unwrap();
    controls.set_choice(ROTATION_AXIS_FIELD, "y").unwrap();
    scheduler.frame(0.0).unwrap();

    assert_eq!(
        scheduler.backend().uniforms().rotation_payload(),
        [90.0, 1.0]
    );
}

#[test]
fn rotation_degree_is_clamped() {
    let geometry = cube_geometry();
    let queue = SettingsQueue::new();
    let mut controls = rotation_controls(RotationSettings::default(), &queue).unwrap();
    let mut scheduler = running_scheduler(&geometry, queue);

    assert_eq!(controls.set_number(ROTATION_DEGREE_FIELD, 400.0).unwrap(), 180.0);
    scheduler.frame(0.0).unwrap();
    assert_eq!(scheduler.backend().uniforms().rotation_payload()[0], 180.0);
}

#[test]
fn frame_records_shadow_then_color_then_submits() {
    let geometry = cube_geometry();
    let mut scheduler = running_scheduler(&geometry, SettingsQueue::new());

    assert_eq!(scheduler.frame(0.0).unwrap(), FrameOutcome::Rendered);
    assert_eq!(
        scheduler.backend().events(),
        &[
            TraceEvent::BeginFrame,
            TraceEvent::BeginPass(PassKind::Shadow),
            TraceEvent::DrawIndexed(PassKind::Shadow, 36),
            TraceEvent::EndPass(PassKind::Shadow),
            TraceEvent::BeginPass(PassKind::Color),
            TraceEvent::DrawIndexed(PassKind::Color, 36),
            TraceEvent::EndPass(PassKind::Color),
            TraceEvent::Submit,
        ]
    );
}

#[test]
fn only_camera_bytes_change_between_frames() {
    let geometry = cube_geometry();
    let mut scheduler = running_scheduler(&geometry, SettingsQueue::new());

    scheduler.frame(0.0).unwrap();
    let first = scheduler.backend().uniform_bytes(UniformSlot::Scene).to_vec();
    let first_model = scheduler.backend().uniform_bytes(UniformSlot::Model).to_vec();
    scheduler.frame(500.0).unwrap();
    let second = scheduler.backend().uniform_bytes(UniformSlot::Scene);

    assert_eq!(first.len(), SCENE_UNIFORM_SIZE as usize);
    let camera = CAMERA_VIEW_PROJ_OFFSET as usize..CAMERA_VIEW_PROJ_OFFSET as usize + 64;
    for (offset, (before, after)) in first.iter().zip(second).enumerate() {
        if !camera.contains(&offset) {
            assert_eq!(before, after, "scene byte {offset} changed");
        }
    }
    assert_ne!(&first[camera.clone()], &second[camera]);
    assert_eq!(
        first_model,
        scheduler.backend().uniform_bytes(UniformSlot::Model)
    );
}

#[test]
fn cancelled_session_renders_nothing_more() {
    let geometry = cube_geometry();
    let mut scheduler = running_scheduler(&geometry, SettingsQueue::new());
    scheduler.frame(0.0).unwrap();
    scheduler.session().cancel();

    assert_eq!(scheduler.frame(16.0).unwrap(), FrameOutcome::Stopped);
    assert!(!FrameOutcome::Stopped.wants_next_frame());
    let recorder = scheduler.into_backend();
    assert_eq!(
        recorder
            .events()
            .iter()
            .filter(|event| **event == TraceEvent::Submit)
            .count(),
        1
    );
}

#[test]
fn cancelling_during_setup_prevents_the_first_frame() {
    let geometry = cube_geometry();
    let handle_session = SessionToken::new();
    let setup_session = handle_session.clone();

    // The host's stop() lands while the GPU device is still being created.
    handle_session.cancel();
    assert!(!setup_session.is_active());

    let mut scheduler = FrameScheduler::new(
        FrameRecorder::new(),
        &RendererConfig::default(),
        1.0,
        DrawRange {
            index_count: geometry.index_count(),
        },
        setup_session,
        SettingsQueue::new(),
    )
    .expect("scheduler setup");
    assert!(!scheduler.start());
    assert_eq!(scheduler.frame(0.0).unwrap(), FrameOutcome::Stopped);
    assert!(scheduler.backend().events().is_empty());
}
