//! Raster pass declarations for the render graph

use std::collections::HashMap;

use crate::backend::command::{CommandBuffer, MaterialPass, RenderTargetId};
use crate::backend::types::*;
use crate::render_graph::resource::*;

/// Unique identifier for a render pass; also its insertion index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassId(pub(crate) u32);

impl PassId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Records a pass's commands once its resources are allocated.
pub type RenderFunc = Box<dyn FnOnce(&mut RasterContext<'_>)>;

/// Metadata about a pass in the graph
pub struct PassNode {
    pub id: PassId,
    pub name: String,
    pub inputs: Vec<ResourceAccess>,
    pub outputs: Vec<ResourceAccess>,
    pub color_attachment: Option<ResourceId>,
    pub depth_attachment: Option<ResourceId>,
    /// Globals published once the pass has run
    pub globals_after: Vec<(&'static str, ResourceId)>,
    pub(crate) render_func: Option<RenderFunc>,
}

impl PassNode {
    pub fn reads_resource(&self, resource: ResourceId) -> bool {
        self.inputs.iter().any(|a| a.resource == resource)
    }

    pub fn writes_resource(&self, resource: ResourceId) -> bool {
        self.outputs.iter().any(|a| a.resource == resource)
    }

    pub fn accesses(&self) -> impl Iterator<Item = &ResourceAccess> {
        self.inputs.iter().chain(self.outputs.iter())
    }
}

impl std::fmt::Debug for PassNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("color_attachment", &self.color_attachment)
            .field("depth_attachment", &self.depth_attachment)
            .field("globals_after", &self.globals_after)
            .field("has_render_func", &self.render_func.is_some())
            .finish()
    }
}

/// Context for declaring a raster pass's resources
pub struct RasterPassBuilder<'a> {
    pub(crate) node: &'a mut PassNode,
    pub(crate) globals: &'a mut HashMap<&'static str, ResourceId>,
    pub(crate) unresolved_globals: &'a mut Vec<(String, &'static str)>,
}

impl<'a> RasterPassBuilder<'a> {
    /// Sample `resource` in this pass.
    pub fn use_texture(&mut self, resource: ResourceId) -> &mut Self {
        self.node.inputs.push(ResourceAccess {
            resource,
            usage: ResourceUsage::TextureRead,
        });
        self
    }

    /// Sample whatever texture an earlier pass published under `name`.
    pub fn use_global_texture(&mut self, name: &'static str) -> Option<ResourceId> {
        match self.globals.get(name).copied() {
            Some(resource) => {
                self.use_texture(resource);
                Some(resource)
            }
            None => {
                self.unresolved_globals.push((self.node.name.clone(), name));
                None
            }
        }
    }

    pub fn set_render_attachment(&mut self, resource: ResourceId) -> &mut Self {
        self.node.color_attachment = Some(resource);
        self.node.outputs.push(ResourceAccess {
            resource,
            usage: ResourceUsage::RenderTarget,
        });
        self
    }

    pub fn set_render_attachment_depth(&mut self, resource: ResourceId) -> &mut Self {
        self.node.depth_attachment = Some(resource);
        self.node.outputs.push(ResourceAccess {
            resource,
            usage: ResourceUsage::DepthStencilWrite,
        });
        self
    }

    /// Bind `resource` to the global texture `name` after this pass runs.
    pub fn set_global_texture_after_pass(
        &mut self,
        resource: ResourceId,
        name: &'static str,
    ) -> &mut Self {
        self.node.globals_after.push((name, resource));
        self.globals.insert(name, resource);
        self
    }

    pub fn set_render_func<F>(&mut self, func: F) -> &mut Self
    where
        F: FnOnce(&mut RasterContext<'_>) + 'static,
    {
        self.node.render_func = Some(Box::new(func));
        self
    }
}

/// Context for recording a raster pass
pub struct RasterContext<'a> {
    pub(crate) commands: &'a mut CommandBuffer,
    pub(crate) textures: &'a HashMap<ResourceId, TextureHandle>,
    pub(crate) color_attachment: Option<TextureHandle>,
    pub width: u32,
    pub height: u32,
}

impl<'a> RasterContext<'a> {
    /// The command buffer for this pass, with its attachments already bound.
    pub fn commands(&mut self) -> &mut CommandBuffer {
        self.commands
    }

    /// Get the texture backing a resource
    pub fn texture(&self, resource: ResourceId) -> Option<TextureHandle> {
        self.textures.get(&resource).copied()
    }

    /// Full-screen draw of `source` into the pass's color attachment.
    pub fn blit_to_attachment(&mut self, source: ResourceId, material: Option<MaterialPass>) {
        let (Some(src), Some(dst)) = (self.texture(source), self.color_attachment) else {
            log::warn!("Blit skipped: source {:?} or attachment not allocated", source);
            return;
        };
        self.commands.blit(
            RenderTargetId::Texture(src),
            RenderTargetId::Texture(dst),
            material,
        );
    }
}
