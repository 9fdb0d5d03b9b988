//! Render graph executor

use std::collections::HashMap;

use crate::backend::command::{CommandBuffer, RenderTargetId};
use crate::backend::traits::*;
use crate::backend::types::*;
use crate::render_graph::graph::*;
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;

/// What one graph execution did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    pub passes_executed: usize,
    pub transients_allocated: usize,
    pub transients_released: usize,
    /// Most transient textures alive at once
    pub peak_live_transients: usize,
}

/// Executor for running a compiled render graph against a backend
#[derive(Default)]
pub struct RenderGraphExecutor {
    /// Transient textures currently allocated, by resource
    allocated: HashMap<ResourceId, TextureHandle>,
}

impl RenderGraphExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and execute `graph` in one step.
    pub fn run<B: RenderBackend + ?Sized>(
        &mut self,
        graph: RenderGraph,
        backend: &mut B,
    ) -> Result<ExecutionStats, GraphError> {
        let compiled = graph.compile()?;
        self.execute(graph, &compiled, backend)
    }

    /// Execute passes in compiled order. Each transient is allocated right
    /// before its first use and released right after its last use; on error
    /// everything still allocated is released before returning.
    pub fn execute<B: RenderBackend + ?Sized>(
        &mut self,
        mut graph: RenderGraph,
        compiled: &CompiledGraph,
        backend: &mut B,
    ) -> Result<ExecutionStats, GraphError> {
        let mut stats = ExecutionStats::default();
        let result = self.execute_passes(&mut graph, compiled, backend, &mut stats);
        stats.transients_released += self.cleanup(backend);
        result.map(|_| stats)
    }

    fn execute_passes<B: RenderBackend + ?Sized>(
        &mut self,
        graph: &mut RenderGraph,
        compiled: &CompiledGraph,
        backend: &mut B,
        stats: &mut ExecutionStats,
    ) -> Result<(), GraphError> {
        let (width, height) = graph.screen_size();

        let mut textures: HashMap<ResourceId, TextureHandle> = graph
            .resources()
            .iter()
            .filter_map(|r| match r {
                VirtualResource::Imported { id, texture, .. } => Some((*id, *texture)),
                VirtualResource::Transient(_) => None,
            })
            .collect();

        for (step, pass_id) in compiled.pass_order.iter().enumerate() {
            for resource in compiled.allocations_at(step) {
                let Some(desc) = graph.texture_desc(resource) else {
                    continue;
                };
                let handle = backend.create_transient(desc)?;
                self.allocated.insert(resource, handle);
                textures.insert(resource, handle);
                stats.transients_allocated += 1;
            }
            stats.peak_live_transients = stats.peak_live_transients.max(self.allocated.len());

            let node = &mut graph.pass_nodes_mut()[pass_id.index()];
            let Some(render_func) = node.render_func.take() else {
                return Err(GraphError::MissingRenderFunc(node.name.clone()));
            };
            log::trace!("Executing render graph pass '{}'", node.name);

            let mut commands = CommandBuffer::new(&node.name);
            let color_attachment = node.color_attachment.and_then(|r| textures.get(&r).copied());
            if let Some(color) = color_attachment {
                let depth = node
                    .depth_attachment
                    .and_then(|r| textures.get(&r).copied())
                    .map(RenderTargetId::Texture);
                commands.set_render_target(RenderTargetId::Texture(color), depth);
            }
            {
                let mut ctx = RasterContext {
                    commands: &mut commands,
                    textures: &textures,
                    color_attachment,
                    width,
                    height,
                };
                render_func(&mut ctx);
            }
            for (name, resource) in &node.globals_after {
                if let Some(&texture) = textures.get(resource) {
                    commands.set_global_texture(*name, RenderTargetId::Texture(texture));
                }
            }

            backend.submit(&commands)?;
            stats.passes_executed += 1;

            for resource in compiled.releases_after(step) {
                if let Some(handle) = self.allocated.remove(&resource) {
                    backend.release_transient(handle);
                    textures.remove(&resource);
                    stats.transients_released += 1;
                }
            }
        }

        Ok(())
    }

    /// Release anything still allocated. Returns the number released.
    pub fn cleanup<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) -> usize {
        let count = self.allocated.len();
        for (_, handle) in self.allocated.drain() {
            backend.release_transient(handle);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::RecordingBackend;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_transients_released_after_last_use() {
        let mut graph = RenderGraph::new(32, 32);
        let color = graph.import_texture("color", TextureHandle(1000));
        let a = graph.create_texture_relative("a", TextureSize::default(), TextureFormat::Rgba8Unorm);
        let b = graph.create_texture_relative("b", TextureSize::default(), TextureFormat::Rgba8Unorm);
        let c = graph.create_texture_relative("c", TextureSize::default(), TextureFormat::Rgba8Unorm);

        graph.add_raster_pass("fill_a", |p| {
            p.set_render_attachment(a);
            p.set_render_func(|ctx| {
                ctx.commands().set_global_float("_Unused", 0.0);
            });
        });
        graph.add_raster_pass("a_to_b", |p| {
            p.use_texture(a).set_render_attachment(b);
            p.set_render_func(move |ctx| ctx.blit_to_attachment(a, None));
        });
        graph.add_raster_pass("b_to_c", |p| {
            p.use_texture(b).set_render_attachment(c);
            p.set_render_func(move |ctx| ctx.blit_to_attachment(b, None));
        });
        graph.add_raster_pass("c_to_color", |p| {
            p.use_texture(c).set_render_attachment(color);
            p.set_render_func(move |ctx| ctx.blit_to_attachment(c, None));
        });

        let mut backend = RecordingBackend::new();
        let stats = RenderGraphExecutor::new().run(graph, &mut backend).unwrap();

        assert_eq!(stats.passes_executed, 4);
        assert_eq!(stats.transients_allocated, 3);
        assert_eq!(stats.transients_released, 3);
        assert_eq!(stats.peak_live_transients, 2);
        assert_eq!(backend.live_transients(), 0);
        assert_eq!(backend.stats().draw_calls, 3);
    }

    #[test]
    fn test_globals_published_after_pass() {
        let mut graph = RenderGraph::new(16, 16);
        let color = graph.import_texture("color", TextureHandle(1000));
        let mask = graph.create_texture("mask", TextureDescriptor {
            width: 16,
            height: 16,
            ..Default::default()
        });
        let seen = Rc::new(RefCell::new(None));

        graph.add_raster_pass("mask", |p| {
            p.set_render_attachment(mask)
                .set_global_texture_after_pass(mask, "_MaskTex");
            p.set_render_func(|_| {});
        });
        let seen_in_pass = seen.clone();
        graph.add_raster_pass("consume", |p| {
            let global = p.use_global_texture("_MaskTex");
            p.set_render_attachment(color);
            p.set_render_func(move |ctx| {
                *seen_in_pass.borrow_mut() = global.and_then(|g| ctx.texture(g));
            });
        });

        let mut backend = RecordingBackend::new();
        RenderGraphExecutor::new().run(graph, &mut backend).unwrap();

        assert!(seen.borrow().is_some());
        let published = backend.submitted().iter().any(|(buffer, cmd)| {
            buffer == "mask"
                && matches!(cmd, crate::backend::command::Command::SetGlobalTexture { name: "_MaskTex", .. })
        });
        assert!(published);
    }

    #[test]
    fn test_failed_allocation_releases_everything() {
        let mut graph = RenderGraph::new(16, 16);
        let good = graph.create_texture("good", TextureDescriptor {
            width: 16,
            height: 16,
            ..Default::default()
        });
        let bad = graph.create_texture("bad", TextureDescriptor {
            width: 0,
            height: 16,
            ..Default::default()
        });
        graph.add_raster_pass("good", |p| {
            p.set_render_attachment(good);
            p.set_render_func(|_| {});
        });
        graph.add_raster_pass("bad", |p| {
            p.use_texture(good).set_render_attachment(bad);
            p.set_render_func(|_| {});
        });

        let mut backend = RecordingBackend::new();
        let result = RenderGraphExecutor::new().run(graph, &mut backend);

        assert!(matches!(result, Err(GraphError::Backend(_))));
        assert_eq!(backend.live_transients(), 0);
    }
}
