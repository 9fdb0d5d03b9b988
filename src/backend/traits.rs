//! Core backend abstraction traits
//!
//! The overlay passes never talk to a GPU API directly. They record into a
//! [`CommandSink`], and a host-side [`RenderBackend`] turns the recorded
//! [`CommandBuffer`] into real work. Materials are created through a
//! [`MaterialFactory`] once per pipeline build.

use crate::backend::command::CommandBuffer;
use crate::backend::types::*;
use glam::Mat4;
use std::sync::Arc;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to initialize backend: {0}")]
    InitializationFailed(String),
    #[error("Failed to create device: {0}")]
    DeviceCreationFailed(String),
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Failed to create shader: {0}")]
    ShaderCreationFailed(String),
    #[error("Unknown temporary render target '{0}'")]
    UnknownTemporary(&'static str),
    #[error("Unknown {kind} handle {id}")]
    UnknownHandle { kind: &'static str, id: u64 },
    #[error("Blit source and destination alias texture {0}")]
    AliasedBlit(u64),
    #[error("Draw recorded with no render target bound")]
    NoRenderTarget,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Shader source handed to the host when a material is created.
///
/// `passes` lists the fragment entry points by pass index; a draw or blit
/// with `shader_pass = n` runs `passes[n]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderDescriptor {
    pub name: String,
    pub source: String,
    pub passes: Vec<String>,
}

impl ShaderDescriptor {
    pub fn new(name: &str, source: &str, passes: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
            passes: passes.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// The narrow drawing surface handed to mask recording and overlay providers.
pub trait CommandSink {
    fn clear_render_target(&mut self, flags: ClearFlags, color: Color, depth: f32);

    fn draw_mesh(
        &mut self,
        mesh: Mesh,
        submesh: u32,
        transform: Mat4,
        material: MaterialHandle,
        shader_pass: u32,
    );

    fn draw_mesh_instanced(
        &mut self,
        mesh: Mesh,
        submesh: u32,
        material: MaterialHandle,
        shader_pass: u32,
        transforms: Arc<[Mat4]>,
    );

    fn draw_renderer(
        &mut self,
        renderer: RendererHandle,
        material: MaterialHandle,
        submesh: u32,
        shader_pass: u32,
    );

    fn draw_procedural(
        &mut self,
        transform: Mat4,
        material: MaterialHandle,
        shader_pass: u32,
        topology: PrimitiveTopology,
        vertex_count: u32,
        instance_count: u32,
    );

    fn set_wireframe(&mut self, enabled: bool);
}

/// Host side of frame execution: transient textures and command submission.
pub trait RenderBackend {
    fn name(&self) -> &str;

    /// Allocate a frame-scoped texture.
    fn create_transient(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle>;

    /// Return a texture obtained from [`RenderBackend::create_transient`].
    fn release_transient(&mut self, texture: TextureHandle);

    /// Execute a recorded command buffer. Temporaries acquired in the buffer
    /// and not released by it are released before this returns.
    fn submit(&mut self, commands: &CommandBuffer) -> BackendResult<()>;
}

/// Host side of material lifetime.
pub trait MaterialFactory {
    fn create_material(&mut self, shader: &ShaderDescriptor) -> BackendResult<MaterialHandle>;

    fn destroy_material(&mut self, material: MaterialHandle);
}
