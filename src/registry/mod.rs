//! Renderable sources consumed by the overlay passes.
//!
//! Editors and tools publish what should be outlined or redrawn into caches;
//! the passes read one immutable snapshot per frame. Three cache shapes exist:
//!
//! | Cache | Item | Drawn with |
//! |-------|------|------------|
//! | [`MeshesCache`] | mesh + instance transforms | shared mask material, instanced |
//! | [`RenderersCache`] | renderer + material slots | shared mask material, or the slot's own material |
//! | [`CustomOutlineRenderersCache`] | renderer + prepass material | the entry's prepass material |

mod cache;
mod named;

pub use cache::*;
pub use named::*;

use std::sync::Arc;

use glam::Mat4;

use crate::backend::types::{MaterialHandle, Mesh, RendererHandle};

/// A mesh drawn once per transform
#[derive(Debug, Clone, PartialEq)]
pub struct RenderMeshesBatch {
    /// `None` when the mesh asset is gone; the batch is then skipped.
    pub mesh: Option<Mesh>,
    pub transforms: Arc<[Mat4]>,
}

impl RenderMeshesBatch {
    pub fn new(mesh: Mesh, transforms: impl Into<Arc<[Mat4]>>) -> Self {
        Self {
            mesh: Some(mesh),
            transforms: transforms.into(),
        }
    }
}

/// A host renderer and its sub-material slots
#[derive(Debug, Clone, PartialEq)]
pub struct RendererEntry {
    pub renderer: RendererHandle,
    pub enabled: bool,
    pub active_in_hierarchy: bool,
    /// One slot per sub-mesh; `None` slots are skipped.
    pub materials: Vec<Option<MaterialHandle>>,
}

impl RendererEntry {
    /// An enabled, active renderer.
    pub fn new(renderer: RendererHandle, materials: Vec<Option<MaterialHandle>>) -> Self {
        Self {
            renderer,
            enabled: true,
            active_in_hierarchy: true,
            materials,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active_in_hierarchy = active;
        self
    }

    pub fn is_visible(&self) -> bool {
        self.enabled && self.active_in_hierarchy
    }

    /// Submesh indices whose material slot is set, with that material.
    pub fn material_slots(&self) -> impl Iterator<Item = (u32, MaterialHandle)> + '_ {
        self.materials
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.map(|material| (index as u32, material)))
    }
}

/// A renderer that supplies its own mask material
#[derive(Debug, Clone, PartialEq)]
pub struct CustomOutlineEntry {
    pub renderer: RendererEntry,
    pub prepass_material: MaterialHandle,
}

/// Batches of instanced meshes
pub trait MeshesCache: Send + Sync {
    fn batches(&self) -> Arc<[RenderMeshesBatch]>;

    fn is_empty(&self) -> bool {
        self.batches().is_empty()
    }
}

/// Renderer entries
pub trait RenderersCache: Send + Sync {
    fn renderers(&self) -> Arc<[RendererEntry]>;

    fn is_empty(&self) -> bool {
        self.renderers().is_empty()
    }
}

/// Renderers with their own prepass material
pub trait CustomOutlineRenderersCache: Send + Sync {
    fn outline_entries(&self) -> Arc<[CustomOutlineEntry]>;

    fn is_empty(&self) -> bool {
        self.outline_entries().is_empty()
    }
}

/// Direct references to the three caches the selection outline reads.
#[derive(Clone, Default)]
pub struct SelectionSources {
    pub meshes: Option<Arc<dyn MeshesCache>>,
    pub renderers: Option<Arc<dyn RenderersCache>>,
    pub custom_outlines: Option<Arc<dyn CustomOutlineRenderersCache>>,
}

impl SelectionSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_meshes(mut self, cache: Arc<dyn MeshesCache>) -> Self {
        self.meshes = Some(cache);
        self
    }

    pub fn with_renderers(mut self, cache: Arc<dyn RenderersCache>) -> Self {
        self.renderers = Some(cache);
        self
    }

    pub fn with_custom_outlines(mut self, cache: Arc<dyn CustomOutlineRenderersCache>) -> Self {
        self.custom_outlines = Some(cache);
        self
    }

    /// True when every cache is absent or empty.
    pub fn is_empty(&self) -> bool {
        self.meshes.as_ref().map_or(true, |c| c.is_empty())
            && self.renderers.as_ref().map_or(true, |c| c.is_empty())
            && self.custom_outlines.as_ref().map_or(true, |c| c.is_empty())
    }

    /// Take this frame's immutable view of every cache.
    pub fn snapshot(&self) -> SelectionSnapshot {
        SelectionSnapshot {
            batches: self
                .meshes
                .as_ref()
                .map_or_else(|| Arc::from(Vec::new()), |c| c.batches()),
            renderers: self
                .renderers
                .as_ref()
                .map_or_else(|| Arc::from(Vec::new()), |c| c.renderers()),
            custom_outlines: self
                .custom_outlines
                .as_ref()
                .map_or_else(|| Arc::from(Vec::new()), |c| c.outline_entries()),
        }
    }
}

impl std::fmt::Debug for SelectionSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionSources")
            .field("meshes", &self.meshes.is_some())
            .field("renderers", &self.renderers.is_some())
            .field("custom_outlines", &self.custom_outlines.is_some())
            .finish()
    }
}

/// One frame's read-only view of the selection caches
#[derive(Debug, Clone)]
pub struct SelectionSnapshot {
    pub batches: Arc<[RenderMeshesBatch]>,
    pub renderers: Arc<[RendererEntry]>,
    pub custom_outlines: Arc<[CustomOutlineEntry]>,
}

impl SelectionSnapshot {
    /// Number of mask draws this snapshot produces.
    pub fn mask_draw_count(&self) -> usize {
        let batches: usize = self
            .batches
            .iter()
            .filter_map(|b| b.mesh)
            .map(|m| m.submesh_count as usize)
            .sum();
        let renderers: usize = self
            .renderers
            .iter()
            .filter(|r| r.is_visible())
            .map(|r| r.material_slots().count())
            .sum();
        let custom: usize = self
            .custom_outlines
            .iter()
            .filter(|c| c.renderer.active_in_hierarchy)
            .map(|c| c.renderer.material_slots().count())
            .sum();
        batches + renderers + custom
    }

    pub fn is_empty(&self) -> bool {
        self.mask_draw_count() == 0
    }
}
