//! Pipeline build, lifecycle and render cache scenarios.

mod common;

use std::sync::Arc;

use rstest::rstest;
use selection_overlay::backend::*;
use selection_overlay::pipeline::render_cache::RENDER_CACHE_PASS_NAME;
use selection_overlay::pipeline::selection::SELECTION_PASS_NAME;
use selection_overlay::pipeline::shaders::*;
use selection_overlay::registry::*;
use selection_overlay::scene::*;
use selection_overlay::*;

use common::*;

#[rstest]
#[case::capable(true, ExecutionMode::RenderGraph)]
#[case::not_capable(false, ExecutionMode::Immediate)]
fn test_mode_from_capability(#[case] supports_graph: bool, #[case] expected: ExecutionMode) {
    assert_eq!(ExecutionMode::from_capability(supports_graph), expected);
}

#[test]
fn test_default_mode_is_immediate() {
    assert_eq!(ExecutionMode::default(), ExecutionMode::Immediate);
}

#[rstest]
#[case::immediate(ExecutionMode::Immediate, BLUR_SHADER_NAME)]
#[case::render_graph(ExecutionMode::RenderGraph, SEPARABLE_BLUR_SHADER_NAME)]
fn test_materials_created_and_destroyed(#[case] mode: ExecutionMode, #[case] blur_shader: &str) {
    init_logging();
    let mut backend = RecordingBackend::new();
    let mut pipeline = build(OverlayConfig::default(), single_selection(), mode, &mut backend);

    let materials = pipeline.materials().unwrap();
    assert_eq!(backend.live_materials(), 3);
    assert_eq!(backend.material_shader(materials.mask), Some(MASK_SHADER_NAME));
    assert_eq!(backend.material_shader(materials.blur), Some(blur_shader));
    assert_eq!(backend.material_shader(materials.composite), Some(COMPOSITE_SHADER_NAME));

    pipeline.dispose(&mut backend);
    assert!(pipeline.is_disposed());
    assert_eq!(pipeline.pass_count(), 0);
    assert_eq!(backend.live_materials(), 0);

    pipeline.dispose(&mut backend);
    assert_eq!(backend.stats().materials_destroyed, 3);
}

#[rstest]
#[case::mask(MASK_SHADER_NAME)]
#[case::blur(BLUR_SHADER_NAME)]
#[case::composite(COMPOSITE_SHADER_NAME)]
fn test_missing_shader_fails_build(#[case] shader: &str) {
    let mut backend = RecordingBackend::new().with_missing_shader(shader);
    let result = OverlayPipeline::build(
        OverlayConfig::default(),
        OverlaySources::default(),
        ExecutionMode::Immediate,
        &mut backend,
    );

    match result {
        Err(OverlayError::MaterialCreation { shader: failed, .. }) => assert_eq!(failed, shader),
        other => panic!("expected material creation failure, got {other:?}"),
    }
    assert_eq!(backend.live_materials(), 0);
}

#[test]
fn test_disabled_selection_creates_no_materials() {
    let mut backend = RecordingBackend::new().with_missing_shader(MASK_SHADER_NAME);
    let pipeline = build(gizmos_only(), Default::default(), ExecutionMode::Immediate, &mut backend);
    assert!(pipeline.materials().is_none());
    assert_eq!(backend.live_materials(), 0);
}

#[test]
fn test_wrong_entry_point_is_rejected() {
    let mut backend = RecordingBackend::new();
    let pipeline = build(
        OverlayConfig::default(),
        single_selection(),
        ExecutionMode::RenderGraph,
        &mut backend,
    );
    let camera = game_camera(1);
    let mut cmd = CommandBuffer::new("misuse");

    assert!(matches!(
        pipeline.execute(PassSlot(0), &camera, &mut cmd),
        Err(OverlayError::ExecutionModeMismatch {
            built: ExecutionMode::RenderGraph,
            called: ExecutionMode::Immediate,
        })
    ));
    assert!(cmd.is_empty());

    let mut graph = selection_overlay::render_graph::RenderGraph::new(16, 16);
    assert!(matches!(
        pipeline.record_render_graph(PassSlot(99), &camera, &mut graph),
        Err(OverlayError::UnknownPass(99))
    ));
}

#[rstest]
#[case::immediate(ExecutionMode::Immediate)]
#[case::render_graph(ExecutionMode::RenderGraph)]
fn test_render_cache_draws_with_entry_materials(#[case] mode: ExecutionMode) {
    let cache = Arc::new(SnapshotCache::from_items(vec![
        renderer(1, 2),
        renderer(2, 3).with_active(false),
    ]));
    let config = OverlayConfig {
        enable_selection: false,
        enable_gizmos: false,
        ..OverlayConfig::default()
    };
    let mut backend = RecordingBackend::new();
    let pipeline = OverlayPipeline::build(
        config,
        OverlaySources {
            selection: SelectionSources::new(),
            render_cache: Some(cache),
        },
        mode,
        &mut backend,
    )
    .unwrap();
    run_frame(&pipeline, &game_camera(1), &mut backend);

    let draws: Vec<(u32, MaterialHandle)> = commands_of(&backend, RENDER_CACHE_PASS_NAME)
        .into_iter()
        .filter_map(|c| match c {
            Command::DrawRenderer {
                submesh, material, ..
            } => Some((*submesh, *material)),
            _ => None,
        })
        .collect();
    assert_eq!(draws, vec![(0, material(100)), (1, material(101))]);
    assert_eq!(backend.live_transients(), 0);
}

#[test]
fn test_render_cache_without_source_never_queued() {
    let config = OverlayConfig {
        enable_selection: false,
        enable_gizmos: false,
        ..OverlayConfig::default()
    };
    let mut backend = RecordingBackend::new();
    let pipeline = build(config, Default::default(), ExecutionMode::Immediate, &mut backend);
    assert_eq!(pipeline.pass_count(), 1);
    assert!(pipeline.configure(&game_camera(1)).is_empty());
}

#[rstest]
#[case::immediate(ExecutionMode::Immediate)]
#[case::render_graph(ExecutionMode::RenderGraph)]
fn test_full_frame_runs_in_event_order(#[case] mode: ExecutionMode) {
    init_logging();
    let cache: Arc<dyn RenderersCache> = Arc::new(SnapshotCache::from_items(vec![renderer(1, 1)]));
    let mut backend = RecordingBackend::new();
    let mut pipeline = OverlayPipeline::build(
        OverlayConfig::default(),
        OverlaySources {
            selection: single_selection(),
            render_cache: Some(cache),
        },
        mode,
        &mut backend,
    )
    .unwrap();
    let early = CountingProvider::new(1, CameraEvent::AfterForwardAlpha);
    let late = CountingProvider::new(1, CameraEvent::AfterImageEffects);
    pipeline.add_overlays([&as_provider(&early), &as_provider(&late)]);

    let camera = game_camera(1);
    let queue = pipeline.configure(&camera);
    assert_eq!(
        queue.names(),
        vec![
            RENDER_CACHE_PASS_NAME,
            "Gizmos AfterRenderingTransparents",
            SELECTION_PASS_NAME,
            "Gizmos AfterRenderingPostProcessing",
        ]
    );

    run_frame(&pipeline, &camera, &mut backend);
    assert_eq!(early.refreshes(), 1);
    assert_eq!(late.refreshes(), 1);
    assert_eq!(backend.live_transients(), 0);

    let buffers = backend.submitted_buffers();
    assert_eq!(buffers.first().copied(), Some(RENDER_CACHE_PASS_NAME));
    assert_eq!(buffers.last().copied(), Some("Gizmos AfterRenderingPostProcessing"));
}

#[test]
fn test_queue_entries_carry_events() {
    let mut backend = RecordingBackend::new();
    let settings = SelectionSettings::default().with_event(RenderPassEvent::AfterRenderingSkybox);
    let pipeline = build(outline_only(settings), single_selection(), ExecutionMode::Immediate, &mut backend);

    let queue = pipeline.configure(&game_camera(1));
    assert_eq!(queue.len(), 1);
    let entry = &queue.entries()[0];
    assert_eq!(entry.event, RenderPassEvent::AfterRenderingSkybox);
    assert_eq!(entry.slot, PassSlot(0));
    assert_eq!(entry.name, SELECTION_PASS_NAME);
}
