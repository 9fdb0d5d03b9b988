//! Virtual resources for the render graph

use crate::backend::types::*;

/// Unique identifier for a render graph resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) u32);

/// Virtual texture resource in the render graph, allocated on first use and
/// released after last use
#[derive(Debug, Clone)]
pub struct VirtualTexture {
    pub id: ResourceId,
    pub desc: TextureDescriptor,
    pub name: String,
}

/// Resource type enumeration
#[derive(Debug, Clone)]
pub enum VirtualResource {
    Transient(VirtualTexture),
    /// Host-owned texture such as the camera color target
    Imported {
        id: ResourceId,
        name: String,
        texture: TextureHandle,
    },
}

impl VirtualResource {
    pub fn id(&self) -> ResourceId {
        match self {
            VirtualResource::Transient(t) => t.id,
            VirtualResource::Imported { id, .. } => *id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            VirtualResource::Transient(t) => &t.name,
            VirtualResource::Imported { name, .. } => name,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, VirtualResource::Transient(_))
    }
}

/// How a pass uses a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceUsage {
    /// Sampled texture
    TextureRead,
    /// Color attachment
    RenderTarget,
    /// Depth attachment
    DepthStencilWrite,
}

/// Resource access declaration for a pass
#[derive(Debug, Clone)]
pub struct ResourceAccess {
    pub resource: ResourceId,
    pub usage: ResourceUsage,
}

impl ResourceAccess {
    pub fn is_read(&self) -> bool {
        matches!(self.usage, ResourceUsage::TextureRead)
    }

    pub fn is_write(&self) -> bool {
        matches!(
            self.usage,
            ResourceUsage::RenderTarget | ResourceUsage::DepthStencilWrite
        )
    }
}

/// Describes texture dimensions that can be relative to the camera target
#[derive(Debug, Clone, Copy)]
pub enum TextureSize {
    /// Absolute size in pixels
    Absolute { width: u32, height: u32 },
    /// Relative to the camera target (1.0 = full size)
    Relative { width_scale: f32, height_scale: f32 },
}

impl Default for TextureSize {
    fn default() -> Self {
        TextureSize::Relative {
            width_scale: 1.0,
            height_scale: 1.0,
        }
    }
}

impl TextureSize {
    pub fn resolve(&self, screen_width: u32, screen_height: u32) -> (u32, u32) {
        match self {
            TextureSize::Absolute { width, height } => (*width, *height),
            TextureSize::Relative {
                width_scale,
                height_scale,
            } => (
                ((screen_width as f32) * width_scale) as u32,
                ((screen_height as f32) * height_scale) as u32,
            ),
        }
    }
}
