//! Selection mask recording

use crate::backend::traits::CommandSink;
use crate::backend::types::{ClearFlags, Color, MaterialHandle};
use crate::registry::SelectionSnapshot;

/// Value the mask is cleared to before drawing
pub const MASK_CLEAR_COLOR: Color = Color::BLACK;

/// Clear the bound target and draw every selected item into it.
///
/// Batches draw instanced once per sub-mesh with `mask_material`. Visible
/// renderers draw once per set material slot with `mask_material`. Active
/// custom-outline entries do the same with their own prepass material.
/// Missing meshes and empty slots are skipped. Returns the draw count.
pub fn record_mask(
    snapshot: &SelectionSnapshot,
    mask_material: MaterialHandle,
    sink: &mut dyn CommandSink,
) -> usize {
    sink.clear_render_target(ClearFlags::COLOR, MASK_CLEAR_COLOR, 1.0);

    let mut draws = 0;
    for batch in snapshot.batches.iter() {
        let Some(mesh) = batch.mesh else {
            continue;
        };
        for submesh in 0..mesh.submesh_count {
            sink.draw_mesh_instanced(mesh, submesh, mask_material, 0, batch.transforms.clone());
            draws += 1;
        }
    }

    for entry in snapshot.renderers.iter().filter(|r| r.is_visible()) {
        for (submesh, _) in entry.material_slots() {
            sink.draw_renderer(entry.renderer, mask_material, submesh, 0);
            draws += 1;
        }
    }

    for custom in snapshot
        .custom_outlines
        .iter()
        .filter(|c| c.renderer.active_in_hierarchy)
    {
        for (submesh, _) in custom.renderer.material_slots() {
            sink.draw_renderer(custom.renderer.renderer, custom.prepass_material, submesh, 0);
            draws += 1;
        }
    }

    draws
}
