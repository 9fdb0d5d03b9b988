//! Render graph definition and compilation

use std::collections::{BTreeSet, HashMap, HashSet};

use thiserror::Error;

use crate::backend::traits::BackendError;
use crate::backend::types::*;
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;

/// Errors raised while compiling or executing a graph
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Render graph contains a dependency cycle")]
    CyclicDependency,
    #[error("Pass '{pass}' references unknown resource {resource:?}")]
    UnknownResource { pass: String, resource: ResourceId },
    #[error("Pass '{pass}' reads '{resource}' before any pass writes it")]
    ReadBeforeWrite { pass: String, resource: String },
    #[error("Pass '{pass}' uses global texture '{name}' that no earlier pass publishes")]
    UnknownGlobal { pass: String, name: &'static str },
    #[error("Pass '{0}' has no render function")]
    MissingRenderFunc(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// The main render graph structure
pub struct RenderGraph {
    passes: Vec<PassNode>,
    resources: Vec<VirtualResource>,
    next_resource_id: u32,
    screen_width: u32,
    screen_height: u32,

    /// Imported host textures by name
    imported: HashMap<String, ResourceId>,
    /// Global texture names published so far
    globals: HashMap<&'static str, ResourceId>,
    unresolved_globals: Vec<(String, &'static str)>,
}

impl RenderGraph {
    /// Create a graph for a camera target of the given size.
    pub fn new(screen_width: u32, screen_height: u32) -> Self {
        Self {
            passes: Vec::new(),
            resources: Vec::new(),
            next_resource_id: 0,
            screen_width,
            screen_height,
            imported: HashMap::new(),
            globals: HashMap::new(),
            unresolved_globals: Vec::new(),
        }
    }

    pub fn screen_size(&self) -> (u32, u32) {
        (self.screen_width, self.screen_height)
    }

    fn next_id(&mut self) -> ResourceId {
        let id = ResourceId(self.next_resource_id);
        self.next_resource_id += 1;
        id
    }

    /// Declare a transient texture
    pub fn create_texture(&mut self, name: &str, desc: TextureDescriptor) -> ResourceId {
        let id = self.next_id();
        self.resources.push(VirtualResource::Transient(VirtualTexture {
            id,
            desc,
            name: name.to_string(),
        }));
        id
    }

    /// Declare a transient texture sized relative to the camera target
    pub fn create_texture_relative(
        &mut self,
        name: &str,
        size: TextureSize,
        format: TextureFormat,
    ) -> ResourceId {
        let (width, height) = size.resolve(self.screen_width, self.screen_height);
        self.create_texture(
            name,
            TextureDescriptor {
                label: Some(name.to_string()),
                width,
                height,
                depth_bits: 0,
                sample_count: 1,
                format,
                usage: TextureUsage::TRANSIENT_TARGET,
            },
        )
    }

    /// Import a host-owned texture. Importing the same name twice returns the
    /// existing resource.
    pub fn import_texture(&mut self, name: &str, texture: TextureHandle) -> ResourceId {
        if let Some(&id) = self.imported.get(name) {
            return id;
        }
        let id = self.next_id();
        self.resources.push(VirtualResource::Imported {
            id,
            name: name.to_string(),
            texture,
        });
        self.imported.insert(name.to_string(), id);
        id
    }

    /// Get imported resource by name
    pub fn get_imported(&self, name: &str) -> Option<ResourceId> {
        self.imported.get(name).copied()
    }

    /// Add a raster pass; `setup` declares its resources and render function.
    pub fn add_raster_pass<F>(&mut self, name: &str, setup: F) -> PassId
    where
        F: FnOnce(&mut RasterPassBuilder<'_>),
    {
        let id = PassId(self.passes.len() as u32);
        let mut node = PassNode {
            id,
            name: name.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            color_attachment: None,
            depth_attachment: None,
            globals_after: Vec::new(),
            render_func: None,
        };
        {
            let mut builder = RasterPassBuilder {
                node: &mut node,
                globals: &mut self.globals,
                unresolved_globals: &mut self.unresolved_globals,
            };
            setup(&mut builder);
        }
        self.passes.push(node);
        id
    }

    /// Compile the graph - topological sort and resource lifetime planning
    pub fn compile(&self) -> Result<CompiledGraph, GraphError> {
        if let Some((pass, name)) = self.unresolved_globals.first() {
            return Err(GraphError::UnknownGlobal {
                pass: pass.clone(),
                name: *name,
            });
        }

        let known: HashSet<ResourceId> = self.resources.iter().map(|r| r.id()).collect();
        let mut dependencies: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); self.passes.len()];
        let mut written: HashSet<ResourceId> = HashSet::new();

        for (index, node) in self.passes.iter().enumerate() {
            if node.render_func.is_none() {
                return Err(GraphError::MissingRenderFunc(node.name.clone()));
            }
            for access in node.accesses() {
                if !known.contains(&access.resource) {
                    return Err(GraphError::UnknownResource {
                        pass: node.name.clone(),
                        resource: access.resource,
                    });
                }
            }

            for input in &node.inputs {
                let transient = self
                    .resource(input.resource)
                    .is_some_and(VirtualResource::is_transient);
                if transient && !written.contains(&input.resource) {
                    return Err(GraphError::ReadBeforeWrite {
                        pass: node.name.clone(),
                        resource: self.resource_name(input.resource).to_string(),
                    });
                }
            }

            // Earlier writers of anything we touch, and earlier readers of
            // anything we write, must run first.
            for (earlier_index, earlier) in self.passes[..index].iter().enumerate() {
                let depends = node.accesses().any(|a| {
                    earlier.writes_resource(a.resource)
                        || (a.is_write() && earlier.reads_resource(a.resource))
                });
                if depends {
                    dependencies[index].insert(earlier_index);
                }
            }

            written.extend(node.outputs.iter().map(|a| a.resource));
        }

        // Kahn's algorithm; ready passes leave in insertion order
        let mut in_degree: Vec<usize> = dependencies.iter().map(BTreeSet::len).collect();
        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &deg)| deg == 0)
            .map(|(index, _)| index)
            .collect();
        let mut sorted_passes = Vec::with_capacity(self.passes.len());

        while let Some(index) = ready.pop_first() {
            sorted_passes.push(PassId(index as u32));
            for (dependent, deps) in dependencies.iter().enumerate() {
                if deps.contains(&index) {
                    in_degree[dependent] -= 1;
                    if in_degree[dependent] == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if sorted_passes.len() != self.passes.len() {
            return Err(GraphError::CyclicDependency);
        }

        // Transient lifetimes in terms of execution order
        let mut resource_lifetimes: HashMap<ResourceId, ResourceLifetime> = HashMap::new();
        for (order, pass_id) in sorted_passes.iter().enumerate() {
            let node = &self.passes[pass_id.index()];
            for access in node.accesses() {
                if !self
                    .resource(access.resource)
                    .is_some_and(VirtualResource::is_transient)
                {
                    continue;
                }
                let lifetime = resource_lifetimes
                    .entry(access.resource)
                    .or_insert(ResourceLifetime {
                        first_use: order,
                        last_use: order,
                    });
                lifetime.last_use = order;
            }
        }

        Ok(CompiledGraph {
            pass_order: sorted_passes,
            resource_lifetimes,
        })
    }

    /// Get pass nodes (metadata)
    pub fn pass_nodes(&self) -> &[PassNode] {
        &self.passes
    }

    pub(crate) fn pass_nodes_mut(&mut self) -> &mut [PassNode] {
        &mut self.passes
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name.as_str()).collect()
    }

    /// Get all resources
    pub fn resources(&self) -> &[VirtualResource] {
        &self.resources
    }

    pub fn resource(&self, id: ResourceId) -> Option<&VirtualResource> {
        self.resources.iter().find(|r| r.id() == id)
    }

    fn resource_name(&self, id: ResourceId) -> &str {
        self.resource(id).map(VirtualResource::name).unwrap_or("?")
    }

    /// Descriptor of a transient texture
    pub fn texture_desc(&self, id: ResourceId) -> Option<&TextureDescriptor> {
        match self.resource(id)? {
            VirtualResource::Transient(t) => Some(&t.desc),
            VirtualResource::Imported { .. } => None,
        }
    }
}

/// Resource lifetime in terms of pass execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLifetime {
    pub first_use: usize,
    pub last_use: usize,
}

/// Compiled render graph with execution order and transient lifetimes
#[derive(Debug)]
pub struct CompiledGraph {
    pub pass_order: Vec<PassId>,
    pub resource_lifetimes: HashMap<ResourceId, ResourceLifetime>,
}

impl CompiledGraph {
    /// Check if a resource is alive at a given execution step
    pub fn is_resource_alive(&self, resource: ResourceId, step: usize) -> bool {
        if let Some(lifetime) = self.resource_lifetimes.get(&resource) {
            step >= lifetime.first_use && step <= lifetime.last_use
        } else {
            false
        }
    }

    /// Transients first used at `step`, in id order
    pub fn allocations_at(&self, step: usize) -> Vec<ResourceId> {
        let mut ids: Vec<ResourceId> = self
            .resource_lifetimes
            .iter()
            .filter(|(_, l)| l.first_use == step)
            .map(|(&id, _)| id)
            .collect();
        ids.sort();
        ids
    }

    /// Transients last used at `step`, in id order
    pub fn releases_after(&self, step: usize) -> Vec<ResourceId> {
        let mut ids: Vec<ResourceId> = self
            .resource_lifetimes
            .iter()
            .filter(|(_, l)| l.last_use == step)
            .map(|(&id, _)| id)
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(builder: &mut RasterPassBuilder<'_>) {
        builder.set_render_func(|_| {});
    }

    #[test]
    fn test_chain_compiles_in_insertion_order() {
        let mut graph = RenderGraph::new(128, 64);
        let a = graph.create_texture_relative("a", TextureSize::default(), TextureFormat::Rgba8Unorm);
        let b = graph.create_texture_relative("b", TextureSize::default(), TextureFormat::Rgba8Unorm);

        graph.add_raster_pass("write_a", |p| {
            p.set_render_attachment(a);
            noop(p);
        });
        graph.add_raster_pass("a_to_b", |p| {
            p.use_texture(a).set_render_attachment(b);
            noop(p);
        });

        let compiled = graph.compile().unwrap();
        assert_eq!(compiled.pass_order, vec![PassId(0), PassId(1)]);
        assert_eq!(
            compiled.resource_lifetimes[&a],
            ResourceLifetime {
                first_use: 0,
                last_use: 1
            }
        );
        assert_eq!(compiled.allocations_at(1), vec![b]);
        assert_eq!(compiled.releases_after(1), vec![a, b]);
        assert!(compiled.is_resource_alive(a, 1));
        assert!(!compiled.is_resource_alive(b, 0));
    }

    #[test]
    fn test_relative_texture_matches_screen() {
        let mut graph = RenderGraph::new(300, 200);
        let half = graph.create_texture_relative(
            "half",
            TextureSize::Relative {
                width_scale: 0.5,
                height_scale: 0.5,
            },
            TextureFormat::Rgba16Float,
        );
        let desc = graph.texture_desc(half).unwrap();
        assert_eq!((desc.width, desc.height), (150, 100));
        assert_eq!(desc.depth_bits, 0);
    }

    #[test]
    fn test_read_before_write_rejected() {
        let mut graph = RenderGraph::new(8, 8);
        let a = graph.create_texture("a", TextureDescriptor::default());
        let out = graph.import_texture("out", TextureHandle(9));
        graph.add_raster_pass("reads_a", |p| {
            p.use_texture(a).set_render_attachment(out);
            noop(p);
        });

        assert!(matches!(
            graph.compile(),
            Err(GraphError::ReadBeforeWrite { .. })
        ));
    }

    #[test]
    fn test_imported_texture_readable_without_writer() {
        let mut graph = RenderGraph::new(8, 8);
        let color = graph.import_texture("camera_color", TextureHandle(1));
        let copy = graph.create_texture("copy", TextureDescriptor::default());
        graph.add_raster_pass("copy", |p| {
            p.use_texture(color).set_render_attachment(copy);
            noop(p);
        });

        let compiled = graph.compile().unwrap();
        assert!(!compiled.resource_lifetimes.contains_key(&color));
        assert_eq!(graph.import_texture("camera_color", TextureHandle(1)), color);
    }

    #[test]
    fn test_unknown_global_rejected() {
        let mut graph = RenderGraph::new(8, 8);
        let out = graph.import_texture("out", TextureHandle(1));
        graph.add_raster_pass("composite", |p| {
            assert!(p.use_global_texture("_Missing").is_none());
            p.set_render_attachment(out);
            noop(p);
        });

        assert!(matches!(
            graph.compile(),
            Err(GraphError::UnknownGlobal { name: "_Missing", .. })
        ));
    }

    #[test]
    fn test_missing_render_func_rejected() {
        let mut graph = RenderGraph::new(8, 8);
        let out = graph.import_texture("out", TextureHandle(1));
        graph.add_raster_pass("empty", |p| {
            p.set_render_attachment(out);
        });

        assert!(matches!(
            graph.compile(),
            Err(GraphError::MissingRenderFunc(name)) if name == "empty"
        ));
    }

    #[test]
    fn test_writer_after_reader_waits() {
        let mut graph = RenderGraph::new(8, 8);
        let color = graph.import_texture("color", TextureHandle(1));
        let copy = graph.create_texture("copy", TextureDescriptor::default());
        graph.add_raster_pass("copy_color", |p| {
            p.use_texture(color).set_render_attachment(copy);
            noop(p);
        });
        graph.add_raster_pass("overwrite_color", |p| {
            p.use_texture(copy).set_render_attachment(color);
            noop(p);
        });

        let compiled = graph.compile().unwrap();
        assert_eq!(compiled.pass_order, vec![PassId(0), PassId(1)]);
    }
}
