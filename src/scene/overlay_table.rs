//! Camera registration table
//!
//! Tracks which cameras have overlay content at which ordering key:
//! `key -> camera -> [provider]`. Buckets exist only while they hold a
//! provider. The table keeps weak references; a provider that is dropped
//! without unregistering simply stops showing up.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::backend::traits::CommandSink;
use crate::pipeline::events::{CameraEvent, RenderPassEvent};
use crate::scene::camera::CameraId;

/// Source of per-camera overlay draw commands (gizmos, handles, grids).
pub trait OverlayProvider: Send + Sync {
    /// Camera whose frame the commands belong to
    fn camera_owner(&self) -> CameraId;

    /// Camera event the commands attach to
    fn camera_event(&self) -> CameraEvent;

    /// Record zero or more draws into `sink`. The sink is only valid for the
    /// duration of the call.
    fn refresh(&self, sink: &mut dyn CommandSink);
}

type Bucket = Vec<Weak<dyn OverlayProvider>>;

fn same_provider(weak: &Weak<dyn OverlayProvider>, provider: &Arc<dyn OverlayProvider>) -> bool {
    std::ptr::addr_eq(weak.as_ptr(), Arc::as_ptr(provider))
}

/// Ordering key -> camera -> providers, in registration order
#[derive(Default)]
pub struct CameraRegistrationTable {
    buckets: HashMap<RenderPassEvent, HashMap<CameraId, Bucket>>,
}

impl CameraRegistrationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `provider` under (`key`, `camera`). A provider lives in one bucket
    /// at a time, so any earlier registration is moved.
    pub fn register(
        &mut self,
        camera: CameraId,
        key: RenderPassEvent,
        provider: &Arc<dyn OverlayProvider>,
    ) {
        self.remove_everywhere(provider);
        self.buckets
            .entry(key)
            .or_default()
            .entry(camera)
            .or_default()
            .push(Arc::downgrade(provider));
    }

    /// Remove `provider` from (`key`, `camera`), pruning empty buckets.
    /// Returns whether it was registered there.
    pub fn unregister(
        &mut self,
        camera: CameraId,
        key: RenderPassEvent,
        provider: &Arc<dyn OverlayProvider>,
    ) -> bool {
        let Some(cameras) = self.buckets.get_mut(&key) else {
            return false;
        };
        let Some(bucket) = cameras.get_mut(&camera) else {
            return false;
        };

        let before = bucket.len();
        bucket.retain(|w| !same_provider(w, provider));
        let removed = bucket.len() < before;
        bucket.retain(|w| w.strong_count() > 0);

        if bucket.is_empty() {
            cameras.remove(&camera);
        }
        if cameras.is_empty() {
            self.buckets.remove(&key);
        }
        removed
    }

    /// Live providers under exactly (`key`, `camera`), in registration order.
    pub fn lookup(&self, camera: CameraId, key: RenderPassEvent) -> Vec<Arc<dyn OverlayProvider>> {
        self.buckets
            .get(&key)
            .and_then(|cameras| cameras.get(&camera))
            .map(|bucket| bucket.iter().filter_map(Weak::upgrade).collect())
            .unwrap_or_default()
    }

    /// Whether (`key`, `camera`) holds at least one live provider.
    pub fn contains(&self, camera: CameraId, key: RenderPassEvent) -> bool {
        self.buckets
            .get(&key)
            .and_then(|cameras| cameras.get(&camera))
            .is_some_and(|bucket| bucket.iter().any(|w| w.strong_count() > 0))
    }

    /// Drop references to providers that no longer exist.
    pub fn prune_dead(&mut self) {
        for cameras in self.buckets.values_mut() {
            for bucket in cameras.values_mut() {
                bucket.retain(|w| w.strong_count() > 0);
            }
            cameras.retain(|_, bucket| !bucket.is_empty());
        }
        self.buckets.retain(|_, cameras| !cameras.is_empty());
    }

    fn remove_everywhere(&mut self, provider: &Arc<dyn OverlayProvider>) {
        for cameras in self.buckets.values_mut() {
            for bucket in cameras.values_mut() {
                bucket.retain(|w| !same_provider(w, provider));
            }
            cameras.retain(|_, bucket| !bucket.is_empty());
        }
        self.buckets.retain(|_, cameras| !cameras.is_empty());
    }

    /// Number of ordering keys with at least one camera
    pub fn key_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of (key, camera) buckets
    pub fn bucket_count(&self) -> usize {
        self.buckets.values().map(HashMap::len).sum()
    }

    /// Number of registered provider references, live or not
    pub fn provider_count(&self) -> usize {
        self.buckets
            .values()
            .flat_map(HashMap::values)
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl std::fmt::Debug for CameraRegistrationTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraRegistrationTable")
            .field("keys", &self.key_count())
            .field("buckets", &self.bucket_count())
            .field("providers", &self.provider_count())
            .finish()
    }
}
