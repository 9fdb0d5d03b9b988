//! Render cache feature: redraw a renderer cache into the camera attachments

use std::sync::Arc;

use crate::backend::command::{CommandBuffer, RenderTargetId};
use crate::backend::traits::CommandSink;
use crate::pipeline::selection::CAMERA_COLOR_RESOURCE;
use crate::pipeline::{
    GraphPass, ImmediatePass, OverlayPass, PassContext, RenderCacheSettings, RenderPassEvent,
};
use crate::registry::{RendererEntry, RenderersCache};
use crate::render_graph::RenderGraph;

pub const RENDER_CACHE_PASS_NAME: &str = "Render Cache";
pub const CAMERA_DEPTH_RESOURCE: &str = "_CameraDepth";

/// Draw each visible entry once per set slot with the slot's own material.
/// Returns the draw count.
pub fn record_renderers(entries: &[RendererEntry], sink: &mut dyn CommandSink) -> usize {
    let mut draws = 0;
    for entry in entries.iter().filter(|e| e.is_visible()) {
        for (submesh, material) in entry.material_slots() {
            sink.draw_renderer(entry.renderer, material, submesh, 0);
            draws += 1;
        }
    }
    draws
}

/// State shared by both render cache pass implementations
pub struct RenderCacheStage {
    settings: RenderCacheSettings,
    source: Option<Arc<dyn RenderersCache>>,
}

impl RenderCacheStage {
    pub fn new(settings: RenderCacheSettings, source: Option<Arc<dyn RenderersCache>>) -> Self {
        Self { settings, source }
    }

    fn wants_camera(&self, ctx: &PassContext<'_>) -> bool {
        ctx.camera.is_game() && self.source.as_ref().is_some_and(|c| !c.is_empty())
    }

    fn entries(&self) -> Option<Arc<[RendererEntry]>> {
        let entries = self.source.as_ref()?.renderers();
        (!entries.is_empty()).then_some(entries)
    }
}

pub struct ImmediateRenderCachePass {
    stage: RenderCacheStage,
}

impl ImmediateRenderCachePass {
    pub fn new(stage: RenderCacheStage) -> Self {
        Self { stage }
    }
}

impl OverlayPass for ImmediateRenderCachePass {
    fn name(&self) -> &str {
        RENDER_CACHE_PASS_NAME
    }

    fn event(&self) -> RenderPassEvent {
        self.stage.settings.event
    }

    fn should_enqueue(&self, ctx: &PassContext<'_>) -> bool {
        self.stage.wants_camera(ctx)
    }
}

impl ImmediatePass for ImmediateRenderCachePass {
    fn execute(&self, ctx: &PassContext<'_>, cmd: &mut CommandBuffer) {
        let Some(color) = ctx.camera.color_target else {
            log::debug!("Render cache skipped: camera {:?} has no color target", ctx.camera.id);
            return;
        };
        let Some(entries) = self.stage.entries() else {
            return;
        };
        cmd.set_render_target(
            RenderTargetId::Texture(color),
            ctx.camera.depth_target.map(RenderTargetId::Texture),
        );
        record_renderers(&entries, cmd);
    }
}

pub struct GraphRenderCachePass {
    stage: RenderCacheStage,
}

impl GraphRenderCachePass {
    pub fn new(stage: RenderCacheStage) -> Self {
        Self { stage }
    }
}

impl OverlayPass for GraphRenderCachePass {
    fn name(&self) -> &str {
        RENDER_CACHE_PASS_NAME
    }

    fn event(&self) -> RenderPassEvent {
        self.stage.settings.event
    }

    fn should_enqueue(&self, ctx: &PassContext<'_>) -> bool {
        self.stage.wants_camera(ctx)
    }
}

impl GraphPass for GraphRenderCachePass {
    fn record_render_graph(&self, ctx: &PassContext<'_>, graph: &mut RenderGraph) {
        let Some(color) = ctx.camera.color_target else {
            log::debug!("Render cache skipped: camera {:?} has no color target", ctx.camera.id);
            return;
        };
        let Some(entries) = self.stage.entries() else {
            return;
        };
        let color = graph.import_texture(CAMERA_COLOR_RESOURCE, color);
        let depth = ctx
            .camera
            .depth_target
            .map(|depth| graph.import_texture(CAMERA_DEPTH_RESOURCE, depth));

        graph.add_raster_pass(RENDER_CACHE_PASS_NAME, |builder| {
            builder.set_render_attachment(color);
            if let Some(depth) = depth {
                builder.set_render_attachment_depth(depth);
            }
            builder.set_render_func(move |ctx| {
                record_renderers(&entries, ctx.commands());
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::command::Command;
    use crate::backend::types::*;
    use crate::registry::RendererCache;
    use crate::scene::{CameraData, CameraId, CameraRegistrationTable};

    fn cache() -> Arc<RendererCache> {
        Arc::new(RendererCache::from_items(vec![
            RendererEntry::new(RendererHandle(1), vec![None, Some(MaterialHandle(20))]),
            RendererEntry::new(RendererHandle(2), vec![Some(MaterialHandle(21))]).with_active(false),
        ]))
    }

    #[test]
    fn test_draws_with_slot_material_and_index() {
        let mut cmd = CommandBuffer::new("cache");
        assert_eq!(record_renderers(&cache().renderers(), &mut cmd), 1);
        assert_eq!(
            cmd.commands(),
            &[Command::DrawRenderer {
                renderer: RendererHandle(1),
                material: MaterialHandle(20),
                submesh: 1,
                shader_pass: 0,
            }]
        );
    }

    #[test]
    fn test_empty_cache_not_enqueued() {
        let empty: Arc<dyn RenderersCache> = Arc::new(RendererCache::new());
        let pass = ImmediateRenderCachePass::new(RenderCacheStage::new(
            RenderCacheSettings::default(),
            Some(empty),
        ));
        let table = CameraRegistrationTable::new();
        let camera = CameraData::new(CameraId(1), 8, 8, TextureFormat::Rgba8Unorm);
        let ctx = PassContext {
            camera: &camera,
            overlays: &table,
        };
        assert!(!pass.should_enqueue(&ctx));
    }

    #[test]
    fn test_binds_camera_color_and_depth() {
        let pass = ImmediateRenderCachePass::new(RenderCacheStage::new(
            RenderCacheSettings::default(),
            Some(cache() as Arc<dyn RenderersCache>),
        ));
        let table = CameraRegistrationTable::new();
        let camera = CameraData::new(CameraId(1), 8, 8, TextureFormat::Rgba8Unorm)
            .with_color_target(TextureHandle(1))
            .with_depth_target(TextureHandle(2));
        let ctx = PassContext {
            camera: &camera,
            overlays: &table,
        };
        let mut cmd = CommandBuffer::new("cache");
        pass.execute(&ctx, &mut cmd);

        assert_eq!(
            cmd.commands()[0],
            Command::SetRenderTarget {
                color: RenderTargetId::Texture(TextureHandle(1)),
                depth: Some(RenderTargetId::Texture(TextureHandle(2))),
            }
        );
        assert_eq!(cmd.draw_call_count(), 1);
    }
}
