//! Two-pass separable blur of the selection mask
//!
//! The first pass always reads the mask and writes the intermediate target,
//! the second reads the intermediate and writes the final target. Source and
//! destination never alias.

use glam::Vec4;

use crate::backend::command::{CommandBuffer, MaterialPass, RenderTargetId};
use crate::backend::types::MaterialHandle;
use crate::pipeline::shaders::{BLUR_DIRECTION, BLUR_STRENGTH, BLUR_TEXTURE};
use crate::render_graph::{RenderGraph, ResourceId};

pub const BLUR_VERTICAL_PASS_NAME: &str = "Outline Blur Vertical";
pub const BLUR_HORIZONTAL_PASS_NAME: &str = "Outline Blur Horizontal";

/// Direction uniforms of the two passes, in execution order.
pub fn blur_directions(strength: f32) -> [Vec4; 2] {
    [
        Vec4::new(strength, 0.0, 0.0, 0.0),
        Vec4::new(0.0, strength, 0.0, 0.0),
    ]
}

/// Record both blur passes with the directional shader. Each pass runs shader
/// pass 0; the axis comes from `_BlurDirection`.
pub fn record_blur(
    cmd: &mut CommandBuffer,
    material: MaterialHandle,
    strength: f32,
    source: RenderTargetId,
    intermediate: RenderTargetId,
    destination: RenderTargetId,
) {
    let pass = Some(MaterialPass { material, pass: 0 });
    let [first, second] = blur_directions(strength);

    cmd.set_global_float(BLUR_STRENGTH, strength);
    cmd.set_global_vector(BLUR_DIRECTION, first);
    cmd.blit(source, intermediate, pass);
    cmd.set_global_vector(BLUR_DIRECTION, second);
    cmd.blit(intermediate, destination, pass);
}

/// Add both blur passes with the separable shader (pass 0, then pass 1).
/// The final target is published as `_BlurTex`.
pub fn add_blur_passes(
    graph: &mut RenderGraph,
    material: MaterialHandle,
    strength: f32,
    mask: ResourceId,
    intermediate: ResourceId,
    blurred: ResourceId,
) {
    graph.add_raster_pass(BLUR_VERTICAL_PASS_NAME, |builder| {
        builder
            .use_texture(mask)
            .set_render_attachment(intermediate)
            .set_render_func(move |ctx| {
                ctx.commands().set_global_float(BLUR_STRENGTH, strength);
                ctx.blit_to_attachment(mask, Some(MaterialPass { material, pass: 0 }));
            });
    });

    graph.add_raster_pass(BLUR_HORIZONTAL_PASS_NAME, |builder| {
        builder
            .use_texture(intermediate)
            .set_render_attachment(blurred)
            .set_global_texture_after_pass(blurred, BLUR_TEXTURE)
            .set_render_func(move |ctx| {
                ctx.commands().set_global_float(BLUR_STRENGTH, strength);
                ctx.blit_to_attachment(intermediate, Some(MaterialPass { material, pass: 1 }));
            });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::command::Command;
    use crate::backend::types::TextureFormat;
    use crate::render_graph::TextureSize;

    #[test]
    fn test_immediate_blur_reads_a_writes_b_then_reads_b_writes_c() {
        let mut cmd = CommandBuffer::new("blur");
        let a = RenderTargetId::Temporary("_A");
        let b = RenderTargetId::Temporary("_B");
        let c = RenderTargetId::Temporary("_C");
        record_blur(&mut cmd, MaterialHandle(3), 2.0, a, b, c);

        let blits: Vec<(RenderTargetId, RenderTargetId)> = cmd
            .commands()
            .iter()
            .filter_map(|c| match c {
                Command::Blit {
                    source,
                    destination,
                    ..
                } => Some((*source, *destination)),
                _ => None,
            })
            .collect();
        assert_eq!(blits, vec![(a, b), (b, c)]);

        let directions: Vec<Vec4> = cmd
            .commands()
            .iter()
            .filter_map(|c| match c {
                Command::SetGlobalVector { value, .. } => Some(*value),
                _ => None,
            })
            .collect();
        assert_eq!(directions, blur_directions(2.0).to_vec());
    }

    #[test]
    fn test_graph_blur_orders_vertical_before_horizontal() {
        let mut graph = RenderGraph::new(64, 64);
        let mask = graph.create_texture_relative("mask", TextureSize::default(), TextureFormat::Rgba8Unorm);
        let vertical = graph.create_texture_relative("vert", TextureSize::default(), TextureFormat::Rgba8Unorm);
        let blurred = graph.create_texture_relative("blur", TextureSize::default(), TextureFormat::Rgba8Unorm);
        graph.add_raster_pass("mask", |builder| {
            builder.set_render_attachment(mask).set_render_func(|_| {});
        });

        add_blur_passes(&mut graph, MaterialHandle(1), 1.0, mask, vertical, blurred);

        let compiled = graph.compile().unwrap();
        let order: Vec<&str> = compiled
            .pass_order
            .iter()
            .map(|id| graph.pass_nodes()[id.index()].name.as_str())
            .collect();
        assert_eq!(order, vec!["mask", BLUR_VERTICAL_PASS_NAME, BLUR_HORIZONTAL_PASS_NAME]);
    }
}
