use std::sync::Arc;

use parking_lot::RwLock;

use super::*;

/// In-memory cache whose readers get an immutable snapshot.
///
/// Writers replace the whole list; a frame that already took a snapshot
/// keeps seeing the old one.
pub struct SnapshotCache<T> {
    items: RwLock<Arc<[T]>>,
}

/// Instanced mesh batches
pub type MeshBatchCache = SnapshotCache<RenderMeshesBatch>;
/// Renderer entries
pub type RendererCache = SnapshotCache<RendererEntry>;
/// Renderers with their own prepass material
pub type CustomOutlineCache = SnapshotCache<CustomOutlineEntry>;

impl<T> SnapshotCache<T> {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Arc::from(Vec::new())),
        }
    }

    pub fn from_items(items: Vec<T>) -> Self {
        Self {
            items: RwLock::new(Arc::from(items)),
        }
    }

    pub fn replace(&self, items: Vec<T>) {
        *self.items.write() = Arc::from(items);
    }

    pub fn clear(&self) {
        self.replace(Vec::new());
    }

    pub fn snapshot(&self) -> Arc<[T]> {
        self.items.read().clone()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl<T: Clone> SnapshotCache<T> {
    pub fn push(&self, item: T) {
        let mut items = self.items.write();
        let mut next = items.to_vec();
        next.push(item);
        *items = Arc::from(next);
    }
}

impl<T> Default for SnapshotCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshesCache for SnapshotCache<RenderMeshesBatch> {
    fn batches(&self) -> Arc<[RenderMeshesBatch]> {
        self.snapshot()
    }

    fn is_empty(&self) -> bool {
        SnapshotCache::is_empty(self)
    }
}

impl RenderersCache for SnapshotCache<RendererEntry> {
    fn renderers(&self) -> Arc<[RendererEntry]> {
        self.snapshot()
    }

    fn is_empty(&self) -> bool {
        SnapshotCache::is_empty(self)
    }
}

impl CustomOutlineRenderersCache for SnapshotCache<CustomOutlineEntry> {
    fn outline_entries(&self) -> Arc<[CustomOutlineEntry]> {
        self.snapshot()
    }

    fn is_empty(&self) -> bool {
        SnapshotCache::is_empty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::types::*;

    #[test]
    fn test_snapshot_unaffected_by_later_writes() {
        let cache = RendererCache::new();
        cache.push(RendererEntry::new(RendererHandle(1), vec![None]));
        let frame = cache.renderers();

        cache.clear();

        assert_eq!(frame.len(), 1);
        assert!(RenderersCache::is_empty(&cache));
    }

    #[test]
    fn test_sources_empty_when_absent_or_empty() {
        let meshes = Arc::new(MeshBatchCache::new());
        let sources = SelectionSources::new().with_meshes(meshes.clone());
        assert!(sources.is_empty());

        meshes.replace(vec![RenderMeshesBatch::new(
            Mesh::new(MeshHandle(1), 2),
            vec![glam::Mat4::IDENTITY],
        )]);
        assert!(!sources.is_empty());
        assert_eq!(sources.snapshot().mask_draw_count(), 2);
    }
}
