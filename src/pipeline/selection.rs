//! Selection outline feature
//!
//! One frame of the outline runs four stages against four same-size
//! transient targets:
//!
//! ```text
//! selection caches -> [Mask] -> _MaskTex -> [Blur V] -> _BlurVertTex -> [Blur H] -> _BlurTex
//! camera color -> [Copy] -> _CamTex -> [Composite + _MaskTex + _BlurTex] -> camera color
//! ```
//!
//! Every skip decision (camera kind, layer mask, empty caches, back buffer,
//! degenerate target) is taken before anything is recorded or allocated.

use crate::backend::command::{CommandBuffer, RenderTargetId};
use crate::backend::traits::MaterialFactory;
use crate::backend::types::{MaterialHandle, TextureDescriptor, TextureHandle};
use crate::error::{OverlayError, Result};
use crate::pipeline::blur::{add_blur_passes, record_blur};
use crate::pipeline::composite::{
    add_composite_passes, composite_target, record_composite, CompositeParams,
};
use crate::pipeline::mask::record_mask;
use crate::pipeline::shaders::{self, *};
use crate::pipeline::{
    ExecutionMode, GraphPass, ImmediatePass, OverlayPass, PassContext, RenderPassEvent,
    SelectionSettings,
};
use crate::registry::{SelectionSnapshot, SelectionSources};
use crate::render_graph::{RenderGraph, TextureSize};
use crate::scene::CameraData;

pub const SELECTION_PASS_NAME: &str = "Selection Outline";
pub const MASK_PASS_NAME: &str = "Outline Mask";
pub const CAMERA_COLOR_RESOURCE: &str = "_CameraColor";

const TEMPORARIES: [&str; 4] = [MASK_TEXTURE, BLUR_VERTICAL_TEXTURE, BLUR_TEXTURE, CAMERA_COPY_TEXTURE];

/// Materials owned by the outline, created once per pipeline build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutlineMaterials {
    pub mask: MaterialHandle,
    pub blur: MaterialHandle,
    pub composite: MaterialHandle,
}

impl OutlineMaterials {
    /// Create the mask, blur and composite materials for `mode`. On failure
    /// any material already created is destroyed again.
    pub fn create(factory: &mut dyn MaterialFactory, mode: ExecutionMode) -> Result<Self> {
        let mut created = Vec::with_capacity(3);
        for shader in shaders::outline_shaders(mode) {
            match factory.create_material(&shader) {
                Ok(material) => created.push(material),
                Err(source) => {
                    for material in created {
                        factory.destroy_material(material);
                    }
                    return Err(OverlayError::MaterialCreation {
                        shader: shader.name,
                        source,
                    });
                }
            }
        }
        Ok(Self {
            mask: created[0],
            blur: created[1],
            composite: created[2],
        })
    }

    pub fn destroy(self, factory: &mut dyn MaterialFactory) {
        factory.destroy_material(self.mask);
        factory.destroy_material(self.blur);
        factory.destroy_material(self.composite);
    }
}

/// State shared by both outline pass implementations
pub struct OutlineStage {
    settings: SelectionSettings,
    sources: SelectionSources,
    materials: OutlineMaterials,
}

/// Everything one frame of outline needs, gathered before recording
struct OutlineFrame {
    snapshot: SelectionSnapshot,
    camera_color: TextureHandle,
}

impl OutlineStage {
    pub fn new(settings: SelectionSettings, sources: SelectionSources, materials: OutlineMaterials) -> Self {
        Self {
            settings,
            sources,
            materials,
        }
    }

    pub fn settings(&self) -> &SelectionSettings {
        &self.settings
    }

    pub fn materials(&self) -> OutlineMaterials {
        self.materials
    }

    fn wants_camera(&self, camera: &CameraData) -> bool {
        if !camera.is_game() {
            log::debug!("Selection outline skipped: camera {:?} is {:?}", camera.id, camera.kind);
            return false;
        }
        if !camera.culling_mask.intersects(self.settings.layer_mask) {
            log::debug!("Selection outline skipped: layer mask miss on camera {:?}", camera.id);
            return false;
        }
        !self.sources.is_empty()
    }

    fn prepare(&self, camera: &CameraData) -> Option<OutlineFrame> {
        let camera_color = match composite_target(camera) {
            Ok(color) => color,
            Err(reason) => {
                log::debug!("Selection outline skipped on camera {:?}: {:?}", camera.id, reason);
                return None;
            }
        };
        let snapshot = self.sources.snapshot();
        if snapshot.is_empty() {
            return None;
        }
        Some(OutlineFrame {
            snapshot,
            camera_color,
        })
    }

    fn composite_params(&self) -> CompositeParams {
        CompositeParams {
            material: self.materials.composite,
            outline_color: self.settings.outline_color,
            outline_strength: self.settings.outline_strength(),
        }
    }

    fn name(&self) -> &str {
        SELECTION_PASS_NAME
    }
}

/// Selection outline recorded into one command buffer
pub struct ImmediateOutlinePass {
    stage: OutlineStage,
}

impl ImmediateOutlinePass {
    pub fn new(stage: OutlineStage) -> Self {
        Self { stage }
    }
}

impl OverlayPass for ImmediateOutlinePass {
    fn name(&self) -> &str {
        self.stage.name()
    }

    fn event(&self) -> RenderPassEvent {
        self.stage.settings.event
    }

    fn should_enqueue(&self, ctx: &PassContext<'_>) -> bool {
        self.stage.wants_camera(ctx.camera)
    }
}

impl ImmediatePass for ImmediateOutlinePass {
    fn execute(&self, ctx: &PassContext<'_>, cmd: &mut CommandBuffer) {
        let Some(frame) = self.stage.prepare(ctx.camera) else {
            return;
        };
        let materials = self.stage.materials;

        for id in TEMPORARIES {
            cmd.get_temporary(id, TextureDescriptor::transient_like(&ctx.camera.target, id));
        }

        let mask = RenderTargetId::Temporary(MASK_TEXTURE);
        let blurred = RenderTargetId::Temporary(BLUR_TEXTURE);

        cmd.set_render_target(mask, None);
        record_mask(&frame.snapshot, materials.mask, cmd);
        cmd.set_global_texture(MASK_TEXTURE, mask);

        record_blur(
            cmd,
            materials.blur,
            self.stage.settings.blur_strength(),
            mask,
            RenderTargetId::Temporary(BLUR_VERTICAL_TEXTURE),
            blurred,
        );
        cmd.set_global_texture(BLUR_TEXTURE, blurred);

        record_composite(
            cmd,
            &self.stage.composite_params(),
            frame.camera_color,
            RenderTargetId::Temporary(CAMERA_COPY_TEXTURE),
        );

        for id in TEMPORARIES {
            cmd.release_temporary(id);
        }
    }
}

/// Selection outline declared as five raster passes
pub struct GraphOutlinePass {
    stage: OutlineStage,
}

impl GraphOutlinePass {
    pub fn new(stage: OutlineStage) -> Self {
        Self { stage }
    }
}

impl OverlayPass for GraphOutlinePass {
    fn name(&self) -> &str {
        self.stage.name()
    }

    fn event(&self) -> RenderPassEvent {
        self.stage.settings.event
    }

    fn should_enqueue(&self, ctx: &PassContext<'_>) -> bool {
        self.stage.wants_camera(ctx.camera)
    }
}

impl GraphPass for GraphOutlinePass {
    fn record_render_graph(&self, ctx: &PassContext<'_>, graph: &mut RenderGraph) {
        let Some(frame) = self.stage.prepare(ctx.camera) else {
            return;
        };
        let materials = self.stage.materials;
        let format = ctx.camera.target.format;

        let camera_color = graph.import_texture(CAMERA_COLOR_RESOURCE, frame.camera_color);
        let mask = graph.create_texture_relative(MASK_TEXTURE, TextureSize::default(), format);
        let vertical =
            graph.create_texture_relative(BLUR_VERTICAL_TEXTURE, TextureSize::default(), format);
        let blurred = graph.create_texture_relative(BLUR_TEXTURE, TextureSize::default(), format);
        let copy = graph.create_texture_relative(CAMERA_COPY_TEXTURE, TextureSize::default(), format);

        let snapshot = frame.snapshot;
        let mask_material = materials.mask;
        graph.add_raster_pass(MASK_PASS_NAME, |builder| {
            builder
                .set_render_attachment(mask)
                .set_global_texture_after_pass(mask, MASK_TEXTURE)
                .set_render_func(move |ctx| {
                    record_mask(&snapshot, mask_material, ctx.commands());
                });
        });

        add_blur_passes(
            graph,
            materials.blur,
            self.stage.settings.blur_strength(),
            mask,
            vertical,
            blurred,
        );

        add_composite_passes(graph, self.stage.composite_params(), camera_color, copy);
    }
}
