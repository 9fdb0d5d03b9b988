//! Gizmo overlay passes
//!
//! One pass per distinct ordering key. At record time the pass looks up the
//! providers registered for (key, camera) and lets each record its draws.

use std::sync::Arc;

use crate::backend::command::{CommandBuffer, RenderTargetId};
use crate::backend::traits::CommandSink;
use crate::backend::types::{ClearFlags, Color};
use crate::pipeline::render_cache::CAMERA_DEPTH_RESOURCE;
use crate::pipeline::selection::CAMERA_COLOR_RESOURCE;
use crate::pipeline::{GraphPass, ImmediatePass, OverlayPass, PassContext, RenderPassEvent};
use crate::render_graph::RenderGraph;
use crate::scene::{CameraData, OverlayProvider};

/// Depth is only cleared for overlays drawn right after post-processing.
pub fn clears_depth(key: RenderPassEvent, camera: &CameraData) -> bool {
    key == RenderPassEvent::AfterRenderingPostProcessing && camera.depth_target.is_some()
}

/// Optionally clear depth, then refresh every provider in order.
pub fn record_overlays(
    providers: &[Arc<dyn OverlayProvider>],
    clear_depth: bool,
    sink: &mut dyn CommandSink,
) {
    if clear_depth {
        sink.clear_render_target(ClearFlags::DEPTH, Color::CLEAR, 1.0);
    }
    for provider in providers {
        provider.refresh(sink);
    }
}

fn pass_name(key: RenderPassEvent) -> String {
    format!("Gizmos {:?}", key)
}

pub struct ImmediateGizmoPass {
    key: RenderPassEvent,
    name: String,
}

impl ImmediateGizmoPass {
    pub fn new(key: RenderPassEvent) -> Self {
        Self {
            key,
            name: pass_name(key),
        }
    }
}

impl OverlayPass for ImmediateGizmoPass {
    fn name(&self) -> &str {
        &self.name
    }

    fn event(&self) -> RenderPassEvent {
        self.key
    }

    fn should_enqueue(&self, ctx: &PassContext<'_>) -> bool {
        ctx.camera.is_game() && ctx.overlays.contains(ctx.camera.id, self.key)
    }
}

impl ImmediatePass for ImmediateGizmoPass {
    fn execute(&self, ctx: &PassContext<'_>, cmd: &mut CommandBuffer) {
        let providers = ctx.overlays.lookup(ctx.camera.id, self.key);
        if providers.is_empty() {
            return;
        }
        let Some(color) = ctx.camera.color_target else {
            log::debug!("Gizmos skipped: camera {:?} has no color target", ctx.camera.id);
            return;
        };
        cmd.set_render_target(
            RenderTargetId::Texture(color),
            ctx.camera.depth_target.map(RenderTargetId::Texture),
        );
        record_overlays(&providers, clears_depth(self.key, ctx.camera), cmd);
    }
}

pub struct GraphGizmoPass {
    key: RenderPassEvent,
    name: String,
}

impl GraphGizmoPass {
    pub fn new(key: RenderPassEvent) -> Self {
        Self {
            key,
            name: pass_name(key),
        }
    }
}

impl OverlayPass for GraphGizmoPass {
    fn name(&self) -> &str {
        &self.name
    }

    fn event(&self) -> RenderPassEvent {
        self.key
    }

    fn should_enqueue(&self, ctx: &PassContext<'_>) -> bool {
        ctx.camera.is_game() && ctx.overlays.contains(ctx.camera.id, self.key)
    }
}

impl GraphPass for GraphGizmoPass {
    fn record_render_graph(&self, ctx: &PassContext<'_>, graph: &mut RenderGraph) {
        let providers = ctx.overlays.lookup(ctx.camera.id, self.key);
        if providers.is_empty() {
            return;
        }
        let Some(color) = ctx.camera.color_target else {
            log::debug!("Gizmos skipped: camera {:?} has no color target", ctx.camera.id);
            return;
        };
        let clear_depth = clears_depth(self.key, ctx.camera);
        let color = graph.import_texture(CAMERA_COLOR_RESOURCE, color);
        let depth = ctx
            .camera
            .depth_target
            .map(|depth| graph.import_texture(CAMERA_DEPTH_RESOURCE, depth));

        graph.add_raster_pass(&self.name, |builder| {
            builder.set_render_attachment(color);
            if let Some(depth) = depth {
                builder.set_render_attachment_depth(depth);
            }
            builder.set_render_func(move |ctx| {
                record_overlays(&providers, clear_depth, ctx.commands());
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::command::Command;
    use crate::backend::types::*;
    use crate::pipeline::CameraEvent;
    use crate::scene::{CameraId, CameraRegistrationTable};
    use glam::Mat4;

    struct LineProvider {
        camera: CameraId,
    }

    impl OverlayProvider for LineProvider {
        fn camera_owner(&self) -> CameraId {
            self.camera
        }

        fn camera_event(&self) -> CameraEvent {
            CameraEvent::AfterImageEffects
        }

        fn refresh(&self, sink: &mut dyn CommandSink) {
            sink.set_wireframe(true);
            sink.draw_procedural(
                Mat4::IDENTITY,
                MaterialHandle(50),
                0,
                PrimitiveTopology::LineList,
                2,
                1,
            );
            sink.set_wireframe(false);
        }
    }

    fn camera() -> CameraData {
        CameraData::new(CameraId(3), 16, 16, TextureFormat::Rgba8Unorm)
            .with_color_target(TextureHandle(1))
            .with_depth_target(TextureHandle(2))
    }

    #[test]
    fn test_depth_cleared_only_after_post_processing() {
        let key = RenderPassEvent::AfterRenderingPostProcessing;
        let provider: Arc<dyn OverlayProvider> = Arc::new(LineProvider { camera: CameraId(3) });
        let mut table = CameraRegistrationTable::new();
        table.register(CameraId(3), key, &provider);
        let camera = camera();
        let ctx = PassContext {
            camera: &camera,
            overlays: &table,
        };

        let mut cmd = CommandBuffer::new("gizmos");
        ImmediateGizmoPass::new(key).execute(&ctx, &mut cmd);
        assert!(matches!(
            cmd.commands()[1],
            Command::Clear {
                flags: ClearFlags::DEPTH,
                ..
            }
        ));
        assert_eq!(cmd.draw_call_count(), 1);

        assert!(!clears_depth(RenderPassEvent::AfterRenderingTransparents, &camera));
    }

    #[test]
    fn test_not_enqueued_without_bucket() {
        let table = CameraRegistrationTable::new();
        let camera = camera();
        let ctx = PassContext {
            camera: &camera,
            overlays: &table,
        };
        assert!(!GraphGizmoPass::new(RenderPassEvent::AfterRendering).should_enqueue(&ctx));
    }
}
