use std::collections::HashMap;
use std::sync::Arc;

use super::*;
use crate::pipeline::settings::{RenderCacheSettings, SelectionSettings};

/// Which cache shape a name refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Meshes,
    Renderers,
    CustomOutlines,
}

/// A cache found by name
#[derive(Clone)]
pub enum ResolvedCache {
    Meshes(Arc<dyn MeshesCache>),
    Renderers(Arc<dyn RenderersCache>),
    CustomOutlines(Arc<dyn CustomOutlineRenderersCache>),
}

/// Name to cache map used while wiring a host.
///
/// Nothing in the passes looks names up; the host resolves once and hands
/// the overlay pipeline direct references.
#[derive(Default)]
pub struct RenderableRegistry {
    meshes: HashMap<String, Arc<dyn MeshesCache>>,
    renderers: HashMap<String, Arc<dyn RenderersCache>>,
    custom_outlines: HashMap<String, Arc<dyn CustomOutlineRenderersCache>>,
}

impl RenderableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_meshes(&mut self, name: &str, cache: Arc<dyn MeshesCache>) {
        self.meshes.insert(name.to_string(), cache);
    }

    pub fn register_renderers(&mut self, name: &str, cache: Arc<dyn RenderersCache>) {
        self.renderers.insert(name.to_string(), cache);
    }

    pub fn register_custom_outlines(
        &mut self,
        name: &str,
        cache: Arc<dyn CustomOutlineRenderersCache>,
    ) {
        self.custom_outlines.insert(name.to_string(), cache);
    }

    /// Remove a cache. Returns whether one was registered.
    pub fn unregister(&mut self, kind: CacheKind, name: &str) -> bool {
        match kind {
            CacheKind::Meshes => self.meshes.remove(name).is_some(),
            CacheKind::Renderers => self.renderers.remove(name).is_some(),
            CacheKind::CustomOutlines => self.custom_outlines.remove(name).is_some(),
        }
    }

    pub fn resolve(&self, kind: CacheKind, name: &str) -> Option<ResolvedCache> {
        match kind {
            CacheKind::Meshes => self.resolve_meshes(name).map(ResolvedCache::Meshes),
            CacheKind::Renderers => self.resolve_renderers(name).map(ResolvedCache::Renderers),
            CacheKind::CustomOutlines => self
                .resolve_custom_outlines(name)
                .map(ResolvedCache::CustomOutlines),
        }
    }

    pub fn resolve_meshes(&self, name: &str) -> Option<Arc<dyn MeshesCache>> {
        self.meshes.get(name).cloned()
    }

    pub fn resolve_renderers(&self, name: &str) -> Option<Arc<dyn RenderersCache>> {
        self.renderers.get(name).cloned()
    }

    pub fn resolve_custom_outlines(
        &self,
        name: &str,
    ) -> Option<Arc<dyn CustomOutlineRenderersCache>> {
        self.custom_outlines.get(name).cloned()
    }

    /// Resolve the selection outline's three caches by their configured names.
    pub fn selection_sources(&self, settings: &SelectionSettings) -> SelectionSources {
        SelectionSources {
            meshes: self.resolve_meshes(&settings.meshes_cache_name),
            renderers: self.resolve_renderers(&settings.renderers_cache_name),
            custom_outlines: self.resolve_custom_outlines(&settings.custom_renderers_cache_name),
        }
    }

    /// Resolve the render cache feature's renderer list.
    pub fn render_cache_source(
        &self,
        settings: &RenderCacheSettings,
    ) -> Option<Arc<dyn RenderersCache>> {
        self.resolve_renderers(&settings.renderers_cache_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_by_kind_and_name() {
        let mut registry = RenderableRegistry::new();
        registry.register_renderers("SelectedRenderers", Arc::new(RendererCache::new()));

        assert!(matches!(
            registry.resolve(CacheKind::Renderers, "SelectedRenderers"),
            Some(ResolvedCache::Renderers(_))
        ));
        assert!(registry.resolve(CacheKind::Meshes, "SelectedRenderers").is_none());

        assert!(registry.unregister(CacheKind::Renderers, "SelectedRenderers"));
        assert!(!registry.unregister(CacheKind::Renderers, "SelectedRenderers"));
    }

    #[test]
    fn test_selection_sources_use_configured_names() {
        let mut registry = RenderableRegistry::new();
        registry.register_meshes("SelectedMeshes", Arc::new(MeshBatchCache::new()));
        registry.register_custom_outlines("Other", Arc::new(CustomOutlineCache::new()));

        let sources = registry.selection_sources(&SelectionSettings::default());
        assert!(sources.meshes.is_some());
        assert!(sources.renderers.is_none());
        assert!(sources.custom_outlines.is_none());
    }
}
