//! Outline composite over the camera color target

use crate::backend::command::{CommandBuffer, MaterialPass, RenderTargetId};
use crate::backend::types::{Color, MaterialHandle, TextureDescriptor, TextureHandle};
use crate::pipeline::shaders::{BLUR_TEXTURE, MASK_TEXTURE, OUTLINE_COLOR, OUTLINE_STRENGTH};
use crate::render_graph::{RenderGraph, ResourceId};
use crate::scene::CameraData;

pub const COPY_CAMERA_PASS_NAME: &str = "Outline Copy Camera Color";
pub const COMPOSITE_PASS_NAME: &str = "Outline Composite";

/// Why a camera cannot be composited over this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRejection {
    BackBuffer,
    NoColorTarget,
    InvalidDescriptor,
}

/// The camera color texture to composite over, or why there is none.
///
/// Runs before anything is recorded so that a rejected camera costs neither
/// draws nor transient allocations.
pub fn composite_target(camera: &CameraData) -> Result<TextureHandle, TargetRejection> {
    if camera.is_back_buffer {
        return Err(TargetRejection::BackBuffer);
    }
    let Some(color) = camera.color_target else {
        return Err(TargetRejection::NoColorTarget);
    };
    if !TextureDescriptor::transient_like(&camera.target, "").is_valid_transient() {
        return Err(TargetRejection::InvalidDescriptor);
    }
    Ok(color)
}

/// Uniforms the composite reads
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeParams {
    pub material: MaterialHandle,
    pub outline_color: Color,
    pub outline_strength: f32,
}

impl CompositeParams {
    fn bind(&self, cmd: &mut CommandBuffer) {
        cmd.set_global_color(OUTLINE_COLOR, self.outline_color);
        cmd.set_global_float(OUTLINE_STRENGTH, self.outline_strength);
    }
}

/// Copy camera color into `copy`, then draw `copy` back over camera color
/// through the composite material. `_MaskTex` and `_BlurTex` must already be
/// bound.
pub fn record_composite(
    cmd: &mut CommandBuffer,
    params: &CompositeParams,
    camera_color: TextureHandle,
    copy: RenderTargetId,
) {
    let camera_color = RenderTargetId::Texture(camera_color);
    cmd.blit(camera_color, copy, None);
    params.bind(cmd);
    cmd.blit(
        copy,
        camera_color,
        Some(MaterialPass {
            material: params.material,
            pass: 0,
        }),
    );
}

/// Add the camera copy and the composite pass. The composite is the only
/// outline pass that renders to the camera attachment.
pub fn add_composite_passes(
    graph: &mut RenderGraph,
    params: CompositeParams,
    camera_color: ResourceId,
    copy: ResourceId,
) {
    graph.add_raster_pass(COPY_CAMERA_PASS_NAME, |builder| {
        builder
            .use_texture(camera_color)
            .set_render_attachment(copy)
            .set_render_func(move |ctx| ctx.blit_to_attachment(camera_color, None));
    });

    graph.add_raster_pass(COMPOSITE_PASS_NAME, |builder| {
        builder.use_global_texture(MASK_TEXTURE);
        builder.use_global_texture(BLUR_TEXTURE);
        builder
            .use_texture(copy)
            .set_render_attachment(camera_color)
            .set_render_func(move |ctx| {
                params.bind(ctx.commands());
                ctx.blit_to_attachment(
                    copy,
                    Some(MaterialPass {
                        material: params.material,
                        pass: 0,
                    }),
                );
            });
    });
}
