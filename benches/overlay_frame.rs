use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use glam::Mat4;

use selection_overlay::backend::*;
use selection_overlay::pipeline::mask::record_mask;
use selection_overlay::registry::*;
use selection_overlay::scene::*;
use selection_overlay::*;

fn large_selection() -> SelectionSources {
    let transforms: Arc<[Mat4]> = (0..64).map(|i| Mat4::from_scale(glam::Vec3::splat(i as f32))).collect();
    let batches = (0..32)
        .map(|i| RenderMeshesBatch::new(Mesh::new(MeshHandle::from_raw(i), 4), transforms.clone()))
        .collect();
    let renderers = (0..2048)
        .map(|i| {
            RendererEntry::new(
                RendererHandle::from_raw(i),
                vec![Some(MaterialHandle::from_raw(1)), None, Some(MaterialHandle::from_raw(2))],
            )
            .with_enabled(i % 7 != 0)
        })
        .collect();
    SelectionSources::new()
        .with_meshes(Arc::new(SnapshotCache::from_items(batches)))
        .with_renderers(Arc::new(SnapshotCache::from_items(renderers)))
}

fn camera() -> CameraData {
    CameraData::new(CameraId(1), 1920, 1080, TextureFormat::Rgba8Unorm)
        .with_color_target(TextureHandle::from_raw(1))
}

fn outline_config() -> OverlayConfig {
    OverlayConfig {
        enable_render_cache: false,
        enable_gizmos: false,
        ..OverlayConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Mask recording
// ---------------------------------------------------------------------------

fn bench_record_mask(c: &mut Criterion) {
    let snapshot = large_selection().snapshot();
    c.bench_function("record_mask_2048_renderers", |b| {
        b.iter(|| {
            let mut cmd = CommandBuffer::new("mask");
            let draws = record_mask(&snapshot, MaterialHandle::from_raw(1), &mut cmd);
            black_box(draws);
        });
    });
}

// ---------------------------------------------------------------------------
// Full outline frames
// ---------------------------------------------------------------------------

fn bench_immediate_frame(c: &mut Criterion) {
    let mut backend = RecordingBackend::new();
    let pipeline = OverlayPipeline::build(
        outline_config(),
        OverlaySources {
            selection: large_selection(),
            render_cache: None,
        },
        ExecutionMode::Immediate,
        &mut backend,
    )
    .unwrap();
    let camera = camera();

    c.bench_function("outline_frame_immediate", |b| {
        b.iter(|| {
            let queue = pipeline.configure(&camera);
            let submitted = pipeline.render_immediate(&queue, &camera, &mut backend).unwrap();
            backend.reset_log();
            black_box(submitted);
        });
    });
}

fn bench_graph_frame(c: &mut Criterion) {
    let mut backend = RecordingBackend::new();
    let pipeline = OverlayPipeline::build(
        outline_config(),
        OverlaySources {
            selection: large_selection(),
            render_cache: None,
        },
        ExecutionMode::RenderGraph,
        &mut backend,
    )
    .unwrap();
    let camera = camera();

    c.bench_function("outline_frame_render_graph", |b| {
        b.iter(|| {
            let queue = pipeline.configure(&camera);
            let stats = pipeline.render_graph(&queue, &camera, &mut backend).unwrap();
            backend.reset_log();
            black_box(stats);
        });
    });
}

criterion_group!(benches, bench_record_mask, bench_immediate_frame, bench_graph_frame);
criterion_main!(benches);
