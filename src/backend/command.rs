//! Recorded command buffers
//!
//! Both execution models end up here: the immediate path records a whole
//! overlay stage into one buffer, and the render graph executor records one
//! buffer per raster pass. Backends consume the buffer in order.

use crate::backend::traits::*;
use crate::backend::types::*;
use glam::{Mat4, Vec4};
use std::collections::HashMap;
use std::sync::Arc;

/// Where a target-taking command points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTargetId {
    /// A texture the host (or the graph executor) already owns.
    Texture(TextureHandle),
    /// A named temporary acquired earlier in the same buffer.
    Temporary(&'static str),
}

/// Material plus the shader pass index a draw or blit runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialPass {
    pub material: MaterialHandle,
    pub pass: u32,
}

/// A single recorded command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    GetTemporary {
        id: &'static str,
        desc: TextureDescriptor,
    },
    ReleaseTemporary {
        id: &'static str,
    },
    SetRenderTarget {
        color: RenderTargetId,
        depth: Option<RenderTargetId>,
    },
    Clear {
        flags: ClearFlags,
        color: Color,
        depth: f32,
    },
    DrawMesh {
        mesh: Mesh,
        submesh: u32,
        transform: Mat4,
        material: MaterialHandle,
        shader_pass: u32,
    },
    DrawMeshInstanced {
        mesh: Mesh,
        submesh: u32,
        material: MaterialHandle,
        shader_pass: u32,
        transforms: Arc<[Mat4]>,
    },
    DrawRenderer {
        renderer: RendererHandle,
        material: MaterialHandle,
        submesh: u32,
        shader_pass: u32,
    },
    DrawProcedural {
        transform: Mat4,
        material: MaterialHandle,
        shader_pass: u32,
        topology: PrimitiveTopology,
        vertex_count: u32,
        instance_count: u32,
    },
    SetWireframe(bool),
    /// Full-screen copy of `source` into `destination`, optionally through a
    /// material. Leaves `destination` bound as the render target.
    Blit {
        source: RenderTargetId,
        destination: RenderTargetId,
        material: Option<MaterialPass>,
    },
    SetGlobalTexture {
        name: &'static str,
        texture: RenderTargetId,
    },
    SetGlobalFloat {
        name: &'static str,
        value: f32,
    },
    SetGlobalVector {
        name: &'static str,
        value: Vec4,
    },
    SetGlobalColor {
        name: &'static str,
        value: Color,
    },
}

impl Command {
    /// Commands that end up as a GPU draw (blits included).
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            Command::DrawMesh { .. }
                | Command::DrawMeshInstanced { .. }
                | Command::DrawRenderer { .. }
                | Command::DrawProcedural { .. }
                | Command::Blit { .. }
        )
    }
}

/// An ordered list of commands with a debug name
#[derive(Debug, Clone, Default)]
pub struct CommandBuffer {
    name: String,
    commands: Vec<Command>,
}

impl CommandBuffer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            commands: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn draw_call_count(&self) -> usize {
        self.commands.iter().filter(|c| c.is_draw()).count()
    }

    pub fn get_temporary(&mut self, id: &'static str, desc: TextureDescriptor) {
        self.commands.push(Command::GetTemporary { id, desc });
    }

    pub fn release_temporary(&mut self, id: &'static str) {
        self.commands.push(Command::ReleaseTemporary { id });
    }

    pub fn set_render_target(&mut self, color: RenderTargetId, depth: Option<RenderTargetId>) {
        self.commands.push(Command::SetRenderTarget { color, depth });
    }

    pub fn blit(
        &mut self,
        source: RenderTargetId,
        destination: RenderTargetId,
        material: Option<MaterialPass>,
    ) {
        self.commands.push(Command::Blit {
            source,
            destination,
            material,
        });
    }

    pub fn set_global_texture(&mut self, name: &'static str, texture: RenderTargetId) {
        self.commands.push(Command::SetGlobalTexture { name, texture });
    }

    pub fn set_global_float(&mut self, name: &'static str, value: f32) {
        self.commands.push(Command::SetGlobalFloat { name, value });
    }

    pub fn set_global_vector(&mut self, name: &'static str, value: Vec4) {
        self.commands.push(Command::SetGlobalVector { name, value });
    }

    pub fn set_global_color(&mut self, name: &'static str, value: Color) {
        self.commands.push(Command::SetGlobalColor { name, value });
    }

    /// Append every command of `other`.
    pub fn append(&mut self, other: &CommandBuffer) {
        self.commands.extend_from_slice(&other.commands);
    }
}

impl CommandSink for CommandBuffer {
    fn clear_render_target(&mut self, flags: ClearFlags, color: Color, depth: f32) {
        self.commands.push(Command::Clear {
            flags,
            color,
            depth,
        });
    }

    fn draw_mesh(
        &mut self,
        mesh: Mesh,
        submesh: u32,
        transform: Mat4,
        material: MaterialHandle,
        shader_pass: u32,
    ) {
        self.commands.push(Command::DrawMesh {
            mesh,
            submesh,
            transform,
            material,
            shader_pass,
        });
    }

    fn draw_mesh_instanced(
        &mut self,
        mesh: Mesh,
        submesh: u32,
        material: MaterialHandle,
        shader_pass: u32,
        transforms: Arc<[Mat4]>,
    ) {
        self.commands.push(Command::DrawMeshInstanced {
            mesh,
            submesh,
            material,
            shader_pass,
            transforms,
        });
    }

    fn draw_renderer(
        &mut self,
        renderer: RendererHandle,
        material: MaterialHandle,
        submesh: u32,
        shader_pass: u32,
    ) {
        self.commands.push(Command::DrawRenderer {
            renderer,
            material,
            submesh,
            shader_pass,
        });
    }

    fn draw_procedural(
        &mut self,
        transform: Mat4,
        material: MaterialHandle,
        shader_pass: u32,
        topology: PrimitiveTopology,
        vertex_count: u32,
        instance_count: u32,
    ) {
        self.commands.push(Command::DrawProcedural {
            transform,
            material,
            shader_pass,
            topology,
            vertex_count,
            instance_count,
        });
    }

    fn set_wireframe(&mut self, enabled: bool) {
        self.commands.push(Command::SetWireframe(enabled));
    }
}

/// Named temporaries live during one `submit`.
///
/// Shared by backends so that acquire/release/resolve behave identically.
#[derive(Debug, Default)]
pub struct TemporaryTargets {
    live: HashMap<&'static str, TextureHandle>,
}

impl TemporaryTargets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire `id`, allocating through `allocate`. Re-acquiring a live id
    /// keeps the existing texture.
    pub fn acquire<F>(&mut self, id: &'static str, allocate: F) -> BackendResult<TextureHandle>
    where
        F: FnOnce() -> BackendResult<TextureHandle>,
    {
        if let Some(&handle) = self.live.get(id) {
            log::warn!("Temporary '{}' acquired twice, reusing texture", id);
            return Ok(handle);
        }
        let handle = allocate()?;
        self.live.insert(id, handle);
        Ok(handle)
    }

    pub fn release(&mut self, id: &'static str) -> Option<TextureHandle> {
        let handle = self.live.remove(id);
        if handle.is_none() {
            log::warn!("Release of unknown temporary '{}'", id);
        }
        handle
    }

    pub fn resolve(&self, target: RenderTargetId) -> BackendResult<TextureHandle> {
        match target {
            RenderTargetId::Texture(handle) => Ok(handle),
            RenderTargetId::Temporary(id) => self
                .live
                .get(id)
                .copied()
                .ok_or(BackendError::UnknownTemporary(id)),
        }
    }

    /// Take every texture still live, leaving the set empty.
    pub fn drain(&mut self) -> Vec<(&'static str, TextureHandle)> {
        self.live.drain().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
