//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use glam::Mat4;
use selection_overlay::backend::*;
use selection_overlay::registry::*;
use selection_overlay::scene::*;
use selection_overlay::*;

pub const COLOR_TARGET: u64 = 1;
pub const DEPTH_TARGET: u64 = 2;

/// Initialize test logging once.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A game camera with color and depth targets.
pub fn game_camera(id: u64) -> CameraData {
    CameraData::new(CameraId(id), 128, 64, TextureFormat::Rgba8Unorm)
        .with_color_target(TextureHandle::from_raw(COLOR_TARGET))
        .with_depth_target(TextureHandle::from_raw(DEPTH_TARGET))
}

pub fn mesh(id: u64, submeshes: u32) -> Mesh {
    Mesh::new(MeshHandle::from_raw(id), submeshes)
}

pub fn material(id: u64) -> MaterialHandle {
    MaterialHandle::from_raw(id)
}

pub fn renderer(id: u64, slots: usize) -> RendererEntry {
    RendererEntry::new(
        RendererHandle::from_raw(id),
        (0..slots).map(|i| Some(material(100 + i as u64))).collect(),
    )
}

/// Selection caches filled with `batches`, `renderers` and `custom`.
pub fn selection(
    batches: Vec<RenderMeshesBatch>,
    renderers: Vec<RendererEntry>,
    custom: Vec<CustomOutlineEntry>,
) -> SelectionSources {
    SelectionSources::new()
        .with_meshes(Arc::new(SnapshotCache::from_items(batches)))
        .with_renderers(Arc::new(SnapshotCache::from_items(renderers)))
        .with_custom_outlines(Arc::new(SnapshotCache::from_items(custom)))
}

/// One renderer with a single material slot.
pub fn single_selection() -> SelectionSources {
    selection(Vec::new(), vec![renderer(1, 1)], Vec::new())
}

/// Only the selection outline enabled.
pub fn outline_only(settings: SelectionSettings) -> OverlayConfig {
    OverlayConfig {
        enable_render_cache: false,
        enable_gizmos: false,
        ..OverlayConfig::default()
    }
    .with_selection(settings)
}

/// Only gizmo passes enabled.
pub fn gizmos_only() -> OverlayConfig {
    OverlayConfig {
        enable_selection: false,
        enable_render_cache: false,
        ..OverlayConfig::default()
    }
}

pub fn build(
    config: OverlayConfig,
    selection: SelectionSources,
    mode: ExecutionMode,
    backend: &mut RecordingBackend,
) -> OverlayPipeline {
    OverlayPipeline::build(
        config,
        OverlaySources {
            selection,
            render_cache: None,
        },
        mode,
        backend,
    )
    .unwrap()
}

/// Configure and run one frame for `camera` in the pipeline's own mode.
pub fn run_frame(pipeline: &OverlayPipeline, camera: &CameraData, backend: &mut RecordingBackend) {
    let queue = pipeline.configure(camera);
    match pipeline.mode() {
        ExecutionMode::Immediate => {
            pipeline.render_immediate(&queue, camera, backend).unwrap();
        }
        ExecutionMode::RenderGraph => {
            pipeline.render_graph(&queue, camera, backend).unwrap();
        }
    }
}

/// Commands recorded by buffers whose name matches `buffer`.
pub fn commands_of<'a>(backend: &'a RecordingBackend, buffer: &str) -> Vec<&'a Command> {
    backend
        .submitted()
        .iter()
        .filter(|(name, _)| name == buffer)
        .map(|(_, command)| command)
        .collect()
}

pub fn count_draws(commands: &[&Command]) -> usize {
    commands
        .iter()
        .filter(|c| {
            matches!(
                c,
                Command::DrawMesh { .. }
                    | Command::DrawMeshInstanced { .. }
                    | Command::DrawRenderer { .. }
                    | Command::DrawProcedural { .. }
            )
        })
        .count()
}

/// Overlay provider that counts refreshes and draws one line each time.
pub struct CountingProvider {
    camera: CameraId,
    event: CameraEvent,
    refreshes: AtomicUsize,
}

impl CountingProvider {
    pub fn new(camera: u64, event: CameraEvent) -> Arc<Self> {
        Arc::new(Self {
            camera: CameraId(camera),
            event,
            refreshes: AtomicUsize::new(0),
        })
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

impl OverlayProvider for CountingProvider {
    fn camera_owner(&self) -> CameraId {
        self.camera
    }

    fn camera_event(&self) -> CameraEvent {
        self.event
    }

    fn refresh(&self, sink: &mut dyn CommandSink) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        sink.draw_procedural(
            Mat4::IDENTITY,
            material(900),
            0,
            PrimitiveTopology::LineList,
            2,
            1,
        );
    }
}

pub fn as_provider(provider: &Arc<CountingProvider>) -> Arc<dyn OverlayProvider> {
    provider.clone()
}
