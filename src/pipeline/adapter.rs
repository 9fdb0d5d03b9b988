//! Binding of the overlay features into a host frame
//!
//! The host builds one [`OverlayPipeline`] per execution mode it runs in.
//! Every frame it asks [`OverlayPipeline::configure`] which passes want to run
//! for the active camera, inserts them at their ordering keys, and calls back
//! into [`OverlayPipeline::execute`] or [`OverlayPipeline::record_render_graph`]
//! when the frame reaches each slot.

use std::sync::Arc;

use crate::backend::command::CommandBuffer;
use crate::backend::traits::{MaterialFactory, RenderBackend};
use crate::error::{OverlayError, Result};
use crate::pipeline::gizmos::{GraphGizmoPass, ImmediateGizmoPass};
use crate::pipeline::render_cache::{GraphRenderCachePass, ImmediateRenderCachePass, RenderCacheStage};
use crate::pipeline::selection::{GraphOutlinePass, ImmediateOutlinePass, OutlineMaterials, OutlineStage};
use crate::pipeline::{
    ExecutionMode, GraphPass, ImmediatePass, OverlayConfig, OverlayPass, PassContext,
    RenderPassEvent,
};
use crate::registry::{RenderersCache, SelectionSources};
use crate::render_graph::{ExecutionStats, RenderGraph, RenderGraphExecutor};
use crate::scene::{CameraData, CameraRegistrationTable, OverlayProvider};

impl ExecutionMode {
    /// Pick the mode matching what the host reports it can run.
    pub fn from_capability(supports_render_graph: bool) -> Self {
        if supports_render_graph {
            ExecutionMode::RenderGraph
        } else {
            ExecutionMode::Immediate
        }
    }
}

/// Caches the features read, already resolved by the host
#[derive(Clone, Default)]
pub struct OverlaySources {
    pub selection: SelectionSources,
    pub render_cache: Option<Arc<dyn RenderersCache>>,
}

/// Index of a pass inside the pipeline that built it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PassSlot(pub usize);

/// One pass the host should insert this frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedPass {
    pub event: RenderPassEvent,
    pub slot: PassSlot,
    pub name: String,
}

/// Host side of pass insertion
pub trait PassQueue {
    fn enqueue(&mut self, event: RenderPassEvent, slot: PassSlot, name: &str);
}

/// Passes selected for one camera, ordered by ordering key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameQueue {
    entries: Vec<QueuedPass>,
}

impl FrameQueue {
    pub fn entries(&self) -> &[QueuedPass] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Stable sort by ordering key; passes sharing a key keep build order.
    fn sort(&mut self) {
        self.entries.sort_by_key(|e| e.event);
    }
}

impl PassQueue for FrameQueue {
    fn enqueue(&mut self, event: RenderPassEvent, slot: PassSlot, name: &str) {
        self.entries.push(QueuedPass {
            event,
            slot,
            name: name.to_string(),
        });
    }
}

enum PassSet {
    Immediate(Vec<Box<dyn ImmediatePass>>),
    Graph(Vec<Box<dyn GraphPass>>),
}

impl PassSet {
    fn len(&self) -> usize {
        match self {
            PassSet::Immediate(passes) => passes.len(),
            PassSet::Graph(passes) => passes.len(),
        }
    }

    fn clear(&mut self) {
        match self {
            PassSet::Immediate(passes) => passes.clear(),
            PassSet::Graph(passes) => passes.clear(),
        }
    }
}

/// The overlay features bound to one execution mode
pub struct OverlayPipeline {
    mode: ExecutionMode,
    config: OverlayConfig,
    passes: PassSet,
    materials: Option<OutlineMaterials>,
    overlays: CameraRegistrationTable,
    disposed: bool,
}

fn offer<P: OverlayPass + ?Sized>(
    pass: &P,
    slot: PassSlot,
    ctx: &PassContext<'_>,
    queue: &mut dyn PassQueue,
) {
    if pass.should_enqueue(ctx) {
        queue.enqueue(pass.event(), slot, pass.name());
    }
}

impl OverlayPipeline {
    /// Create materials and construct the passes for `mode`.
    pub fn build(
        config: OverlayConfig,
        sources: OverlaySources,
        mode: ExecutionMode,
        factory: &mut dyn MaterialFactory,
    ) -> Result<Self> {
        let materials = if config.enable_selection {
            Some(OutlineMaterials::create(factory, mode)?)
        } else {
            None
        };

        let outline = materials.map(|m| {
            OutlineStage::new(config.selection.clone(), sources.selection.clone(), m)
        });
        let render_cache = config.enable_render_cache.then(|| {
            RenderCacheStage::new(config.render_cache.clone(), sources.render_cache.clone())
        });
        let gizmo_keys = if config.enable_gizmos {
            config.gizmos.ordering_keys()
        } else {
            Vec::new()
        };

        let passes = match mode {
            ExecutionMode::Immediate => {
                let mut passes: Vec<Box<dyn ImmediatePass>> = Vec::new();
                if let Some(stage) = render_cache {
                    passes.push(Box::new(ImmediateRenderCachePass::new(stage)));
                }
                if let Some(stage) = outline {
                    passes.push(Box::new(ImmediateOutlinePass::new(stage)));
                }
                for key in gizmo_keys {
                    passes.push(Box::new(ImmediateGizmoPass::new(key)));
                }
                PassSet::Immediate(passes)
            }
            ExecutionMode::RenderGraph => {
                let mut passes: Vec<Box<dyn GraphPass>> = Vec::new();
                if let Some(stage) = render_cache {
                    passes.push(Box::new(GraphRenderCachePass::new(stage)));
                }
                if let Some(stage) = outline {
                    passes.push(Box::new(GraphOutlinePass::new(stage)));
                }
                for key in gizmo_keys {
                    passes.push(Box::new(GraphGizmoPass::new(key)));
                }
                PassSet::Graph(passes)
            }
        };

        log::info!("Overlay pipeline built: {:?} mode, {} passes", mode, passes.len());

        Ok(Self {
            mode,
            config,
            passes,
            materials,
            overlays: CameraRegistrationTable::new(),
            disposed: false,
        })
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn materials(&self) -> Option<OutlineMaterials> {
        self.materials
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Overlay provider announced itself: file it under its camera and key.
    pub fn add_overlay(&mut self, provider: &Arc<dyn OverlayProvider>) {
        let key = provider.camera_event().to_render_pass_event();
        self.overlays.register(provider.camera_owner(), key, provider);
    }

    pub fn add_overlays<'a>(&mut self, providers: impl IntoIterator<Item = &'a Arc<dyn OverlayProvider>>) {
        for provider in providers {
            self.add_overlay(provider);
        }
    }

    /// Overlay provider is going away. Returns whether it was registered.
    pub fn remove_overlay(&mut self, provider: &Arc<dyn OverlayProvider>) -> bool {
        let key = provider.camera_event().to_render_pass_event();
        let removed = self.overlays.unregister(provider.camera_owner(), key, provider);
        if !removed {
            log::warn!(
                "Overlay provider for camera {:?} at {:?} was not registered",
                provider.camera_owner(),
                key
            );
        }
        removed
    }

    pub fn overlays(&self) -> &CameraRegistrationTable {
        &self.overlays
    }

    pub fn overlays_mut(&mut self) -> &mut CameraRegistrationTable {
        &mut self.overlays
    }

    fn context<'a>(&'a self, camera: &'a CameraData) -> PassContext<'a> {
        PassContext {
            camera,
            overlays: &self.overlays,
        }
    }

    /// Offer every pass that wants to run for `camera` to `queue`, in build
    /// order.
    pub fn configure_into(&self, camera: &CameraData, queue: &mut dyn PassQueue) {
        let ctx = self.context(camera);
        match &self.passes {
            PassSet::Immediate(passes) => {
                for (index, pass) in passes.iter().enumerate() {
                    offer(pass.as_ref(), PassSlot(index), &ctx, queue);
                }
            }
            PassSet::Graph(passes) => {
                for (index, pass) in passes.iter().enumerate() {
                    offer(pass.as_ref(), PassSlot(index), &ctx, queue);
                }
            }
        }
    }

    /// Passes to run for `camera` this frame, ordered by ordering key.
    pub fn configure(&self, camera: &CameraData) -> FrameQueue {
        let mut queue = FrameQueue::default();
        self.configure_into(camera, &mut queue);
        queue.sort();
        queue
    }

    /// Record the immediate pass in `slot` into `cmd`.
    pub fn execute(&self, slot: PassSlot, camera: &CameraData, cmd: &mut CommandBuffer) -> Result<()> {
        let PassSet::Immediate(passes) = &self.passes else {
            return Err(OverlayError::ExecutionModeMismatch {
                built: self.mode,
                called: ExecutionMode::Immediate,
            });
        };
        let pass = passes.get(slot.0).ok_or(OverlayError::UnknownPass(slot.0))?;
        pass.execute(&self.context(camera), cmd);
        Ok(())
    }

    /// Declare the graph pass in `slot` on `graph`.
    pub fn record_render_graph(
        &self,
        slot: PassSlot,
        camera: &CameraData,
        graph: &mut RenderGraph,
    ) -> Result<()> {
        let PassSet::Graph(passes) = &self.passes else {
            return Err(OverlayError::ExecutionModeMismatch {
                built: self.mode,
                called: ExecutionMode::RenderGraph,
            });
        };
        let pass = passes.get(slot.0).ok_or(OverlayError::UnknownPass(slot.0))?;
        pass.record_render_graph(&self.context(camera), graph);
        Ok(())
    }

    /// Run a configured frame in immediate mode, one command buffer per pass.
    /// Passes that record nothing are not submitted. Returns the number of
    /// buffers submitted.
    pub fn render_immediate<B: RenderBackend + ?Sized>(
        &self,
        queue: &FrameQueue,
        camera: &CameraData,
        backend: &mut B,
    ) -> Result<usize> {
        let mut submitted = 0;
        for entry in queue.entries() {
            let mut cmd = CommandBuffer::new(&entry.name);
            self.execute(entry.slot, camera, &mut cmd)?;
            if cmd.is_empty() {
                continue;
            }
            backend.submit(&cmd)?;
            submitted += 1;
        }
        Ok(submitted)
    }

    /// Run a configured frame in render graph mode: declare every queued pass
    /// on one graph sized to the camera, then compile and execute it.
    pub fn render_graph<B: RenderBackend + ?Sized>(
        &self,
        queue: &FrameQueue,
        camera: &CameraData,
        backend: &mut B,
    ) -> Result<ExecutionStats> {
        let (width, height) = camera.size();
        let mut graph = RenderGraph::new(width, height);
        for entry in queue.entries() {
            self.record_render_graph(entry.slot, camera, &mut graph)?;
        }
        if graph.pass_count() == 0 {
            return Ok(ExecutionStats::default());
        }
        Ok(RenderGraphExecutor::new().run(graph, backend)?)
    }

    /// Destroy the materials and drop every pass. Calling it again is a no-op.
    pub fn dispose(&mut self, factory: &mut dyn MaterialFactory) {
        if self.is_disposed() {
            return;
        }
        if let Some(materials) = self.materials.take() {
            materials.destroy(factory);
        }
        self.passes.clear();
        self.disposed = true;
        log::info!("Overlay pipeline disposed");
    }
}

impl std::fmt::Debug for OverlayPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayPipeline")
            .field("mode", &self.mode)
            .field("passes", &self.passes.len())
            .field("materials", &self.materials)
            .field("overlays", &self.overlays)
            .finish()
    }
}
