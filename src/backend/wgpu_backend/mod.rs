//! Headless wgpu backend
//!
//! Executes recorded [`CommandBuffer`]s on a real device without a surface.
//! Every clear, draw and blit becomes its own render pass; passes load the
//! previous contents, so ordering inside a buffer is preserved.
//!
//! Pipelines are built lazily per (material, shader pass, geometry, target
//! formats) and cached. Global textures and uniforms persist across submits.

use std::collections::HashMap;
use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};
use wgpu::util::DeviceExt;

use crate::backend::command::{Command, CommandBuffer, MaterialPass, TemporaryTargets};
use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::shaders::{
    copy_shader, BLUR_DIRECTION, BLUR_STRENGTH, BLUR_TEXTURE, MASK_TEXTURE, OUTLINE_COLOR,
    OUTLINE_STRENGTH,
};

const MESH_VERTEX_ENTRY: &str = "vs_mesh";
const FULLSCREEN_VERTEX_ENTRY: &str = "vs_fullscreen";
/// Vertex entry point a material must provide to be used with procedural draws
pub const PROCEDURAL_VERTEX_ENTRY: &str = "vs_procedural";

const POSITION_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
const INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
    1 => Float32x4,
    2 => Float32x4,
    3 => Float32x4,
    4 => Float32x4
];

/// Uniform block shared by every overlay shader
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct OverlayUniforms {
    view_proj: [[f32; 4]; 4],
    outline_color: [f32; 4],
    params: [f32; 4],
    texel_size: [f32; 4],
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    format: TextureFormat,
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    submeshes: Vec<Range<u32>>,
}

struct GpuRenderer {
    mesh: Mesh,
    transform: Mat4,
}

struct GpuMaterial {
    name: String,
    module: wgpu::ShaderModule,
    passes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum GeometryKind {
    Mesh,
    Fullscreen,
    Procedural,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    material: MaterialHandle,
    pass: u32,
    kind: GeometryKind,
    color_format: TextureFormat,
    depth_format: Option<TextureFormat>,
    topology: PrimitiveTopology,
    wireframe: bool,
}

enum Geometry<'a> {
    Mesh {
        mesh: Mesh,
        submesh: u32,
        transforms: &'a [Mat4],
    },
    Procedural {
        transform: Mat4,
        topology: PrimitiveTopology,
        vertex_count: u32,
        instance_count: u32,
    },
    Fullscreen {
        source: TextureHandle,
    },
}

/// Render target bound while a buffer executes
#[derive(Debug, Clone, Copy, Default)]
struct BoundTarget {
    color: Option<TextureHandle>,
    depth: Option<TextureHandle>,
    wireframe: bool,
}

#[derive(Debug, Default)]
struct Globals {
    textures: HashMap<&'static str, TextureHandle>,
    floats: HashMap<&'static str, f32>,
    vectors: HashMap<&'static str, Vec4>,
    colors: HashMap<&'static str, Color>,
}

/// wgpu device plus the host resources overlay commands refer to
pub struct WgpuOverlayBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,

    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    /// 1x1 texture bound wherever a texture slot has nothing to read
    dummy_view: wgpu::TextureView,
    copy_material: MaterialHandle,

    textures: HashMap<u64, GpuTexture>,
    meshes: HashMap<u64, GpuMesh>,
    renderers: HashMap<u64, GpuRenderer>,
    materials: HashMap<u64, GpuMaterial>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,

    globals: Globals,
    view_proj: Mat4,
    next_id: u64,
}

impl WgpuOverlayBackend {
    /// Create a headless device, blocking until it is available.
    pub fn new() -> BackendResult<Self> {
        pollster::block_on(Self::new_async())
    }

    pub async fn new_async() -> BackendResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| BackendError::InitializationFailed("No suitable adapter found".into()))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Selected GPU: {} ({:?} backend)",
            adapter_info.name,
            adapter_info.backend
        );

        let required_features = adapter.features() & wgpu::Features::POLYGON_MODE_LINE;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Overlay Device"),
                    required_features,
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| BackendError::DeviceCreationFailed(e.to_string()))?;

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("overlay_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                texture_entry(1),
                texture_entry(2),
                texture_entry(3),
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("overlay_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("overlay_linear_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let dummy_view = device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("overlay_dummy"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut backend = Self {
            device,
            queue,
            adapter_name: adapter_info.name,
            bind_group_layout,
            pipeline_layout,
            sampler,
            dummy_view,
            copy_material: MaterialHandle(0),
            textures: HashMap::new(),
            meshes: HashMap::new(),
            renderers: HashMap::new(),
            materials: HashMap::new(),
            pipelines: HashMap::new(),
            globals: Globals::default(),
            view_proj: Mat4::IDENTITY,
            next_id: 1,
        };

        backend.copy_material = backend.create_material(&copy_shader())?;

        Ok(backend)
    }

    fn next_handle(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn convert_texture_format(format: TextureFormat) -> wgpu::TextureFormat {
        match format {
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            TextureFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
            TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
            TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
            TextureFormat::Depth24PlusStencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
            TextureFormat::R8Unorm => wgpu::TextureFormat::R8Unorm,
            TextureFormat::R32Float => wgpu::TextureFormat::R32Float,
        }
    }

    fn convert_texture_usage(usage: TextureUsage) -> wgpu::TextureUsages {
        let mut result = wgpu::TextureUsages::empty();
        if usage.contains(TextureUsage::COPY_SRC) {
            result |= wgpu::TextureUsages::COPY_SRC;
        }
        if usage.contains(TextureUsage::COPY_DST) {
            result |= wgpu::TextureUsages::COPY_DST;
        }
        if usage.contains(TextureUsage::TEXTURE_BINDING) {
            result |= wgpu::TextureUsages::TEXTURE_BINDING;
        }
        if usage.contains(TextureUsage::RENDER_ATTACHMENT) {
            result |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        result
    }

    fn convert_topology(topology: PrimitiveTopology) -> wgpu::PrimitiveTopology {
        match topology {
            PrimitiveTopology::PointList => wgpu::PrimitiveTopology::PointList,
            PrimitiveTopology::LineList => wgpu::PrimitiveTopology::LineList,
            PrimitiveTopology::LineStrip => wgpu::PrimitiveTopology::LineStrip,
            PrimitiveTopology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
            PrimitiveTopology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Create a host-owned texture, e.g. a camera color or depth target.
    pub fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(BackendError::TextureCreationFailed(format!(
                "zero-size texture {:?}",
                desc.label
            )));
        }
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: desc.label.as_deref(),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::convert_texture_format(desc.format),
            usage: Self::convert_texture_usage(desc.usage),
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let id = self.next_handle();
        self.textures.insert(
            id,
            GpuTexture {
                texture,
                view,
                format: desc.format,
            },
        );
        Ok(TextureHandle(id))
    }

    pub fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture.0);
    }

    /// Upload an indexed mesh. `submeshes` are index ranges.
    pub fn upload_mesh(&mut self, positions: &[Vec3], indices: &[u32], submeshes: &[Range<u32>]) -> Mesh {
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("overlay_mesh_vertices"),
                contents: bytemuck::cast_slice(positions),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("overlay_mesh_indices"),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        let id = self.next_handle();
        self.meshes.insert(
            id,
            GpuMesh {
                vertex_buffer,
                index_buffer,
                submeshes: submeshes.to_vec(),
            },
        );
        Mesh::new(MeshHandle(id), submeshes.len() as u32)
    }

    /// Register a renderer drawing `mesh` with `transform`.
    pub fn register_renderer(&mut self, mesh: Mesh, transform: Mat4) -> RendererHandle {
        let id = self.next_handle();
        self.renderers.insert(id, GpuRenderer { mesh, transform });
        RendererHandle(id)
    }

    pub fn set_renderer_transform(&mut self, renderer: RendererHandle, transform: Mat4) {
        if let Some(entry) = self.renderers.get_mut(&renderer.0) {
            entry.transform = transform;
        }
    }

    /// View-projection used by every mesh and procedural draw.
    pub fn set_view_projection(&mut self, view_proj: Mat4) {
        self.view_proj = view_proj;
    }

    fn texture(&self, handle: TextureHandle) -> BackendResult<&GpuTexture> {
        self.textures.get(&handle.0).ok_or(BackendError::UnknownHandle {
            kind: "texture",
            id: handle.0,
        })
    }

    /// A global texture, unless it is missing or currently rendered to.
    fn global_view(&self, name: &str, target: TextureHandle) -> &wgpu::TextureView {
        self.globals
            .textures
            .get(name)
            .filter(|&&h| h != target)
            .and_then(|h| self.textures.get(&h.0))
            .map_or(&self.dummy_view, |t| &t.view)
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) -> BackendResult<()> {
        if self.pipelines.contains_key(&key) {
            return Ok(());
        }
        let material = self.materials.get(&key.material.0).ok_or(BackendError::UnknownHandle {
            kind: "material",
            id: key.material.0,
        })?;
        let Some(fragment_entry) = material.passes.get(key.pass as usize) else {
            return Err(BackendError::ShaderCreationFailed(format!(
                "shader '{}' has no pass {}",
                material.name, key.pass
            )));
        };

        let instance_layouts = [
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &POSITION_ATTRIBUTES,
            },
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<Mat4>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &INSTANCE_ATTRIBUTES,
            },
        ];
        let (vertex_entry, buffers): (&str, &[wgpu::VertexBufferLayout]) = match key.kind {
            GeometryKind::Mesh => (MESH_VERTEX_ENTRY, &instance_layouts),
            GeometryKind::Fullscreen => (FULLSCREEN_VERTEX_ENTRY, &[]),
            GeometryKind::Procedural => (PROCEDURAL_VERTEX_ENTRY, &[]),
        };

        let polygon_mode = if key.wireframe
            && self
                .device
                .features()
                .contains(wgpu::Features::POLYGON_MODE_LINE)
        {
            wgpu::PolygonMode::Line
        } else {
            wgpu::PolygonMode::Fill
        };

        let depth_stencil = key.depth_format.map(|format| wgpu::DepthStencilState {
            format: Self::convert_texture_format(format),
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        let color_targets = [Some(wgpu::ColorTargetState {
            format: Self::convert_texture_format(key.color_format),
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        })];

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(material.name.as_str()),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &material.module,
                    entry_point: vertex_entry,
                    buffers,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &material.module,
                    entry_point: fragment_entry,
                    targets: &color_targets,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: Self::convert_topology(key.topology),
                    polygon_mode,
                    ..Default::default()
                },
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(BackendError::ShaderCreationFailed(format!(
                "pipeline for '{}' pass {}: {}",
                material.name, key.pass, error
            )));
        }

        self.pipelines.insert(key, pipeline);
        Ok(())
    }

    fn uniforms(&self, view_proj: Mat4, target: &GpuTexture) -> OverlayUniforms {
        let outline_color = self
            .globals
            .colors
            .get(OUTLINE_COLOR)
            .copied()
            .unwrap_or(Color::BLACK);
        let direction = self
            .globals
            .vectors
            .get(BLUR_DIRECTION)
            .copied()
            .unwrap_or(Vec4::ZERO);
        let float = |name: &str| self.globals.floats.get(name).copied().unwrap_or(0.0);

        OverlayUniforms {
            view_proj: view_proj.to_cols_array_2d(),
            outline_color: outline_color.to_array(),
            params: [float(OUTLINE_STRENGTH), float(BLUR_STRENGTH), direction.x, direction.y],
            texel_size: [
                1.0 / target.texture.width() as f32,
                1.0 / target.texture.height() as f32,
                0.0,
                0.0,
            ],
        }
    }

    fn encode_draw(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        target: BoundTarget,
        material: MaterialPass,
        geometry: Geometry<'_>,
    ) -> BackendResult<()> {
        let color = target.color.ok_or(BackendError::NoRenderTarget)?;
        let (kind, topology, depth, source) = match &geometry {
            Geometry::Mesh { .. } => (
                GeometryKind::Mesh,
                PrimitiveTopology::TriangleList,
                target.depth,
                None,
            ),
            Geometry::Procedural { topology, .. } => {
                (GeometryKind::Procedural, *topology, target.depth, None)
            }
            Geometry::Fullscreen { source } => (
                GeometryKind::Fullscreen,
                PrimitiveTopology::TriangleList,
                None,
                Some(*source),
            ),
        };

        let key = PipelineKey {
            material: material.material,
            pass: material.pass,
            kind,
            color_format: self.texture(color)?.format,
            depth_format: depth.map(|d| self.texture(d).map(|t| t.format)).transpose()?,
            topology,
            wireframe: target.wireframe,
        };
        self.ensure_pipeline(key)?;

        let color_texture = self.texture(color)?;
        let view_proj = match &geometry {
            Geometry::Procedural { transform, .. } => self.view_proj * *transform,
            _ => self.view_proj,
        };
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("overlay_uniforms"),
                contents: bytemuck::bytes_of(&self.uniforms(view_proj, color_texture)),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let source_view = match source {
            Some(handle) => &self.texture(handle)?.view,
            None => &self.dummy_view,
        };
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("overlay_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(source_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(self.global_view(MASK_TEXTURE, color)),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(self.global_view(BLUR_TEXTURE, color)),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let instance_buffer = match &geometry {
            Geometry::Mesh { transforms, .. } => Some(self.device.create_buffer_init(
                &wgpu::util::BufferInitDescriptor {
                    label: Some("overlay_instances"),
                    contents: bytemuck::cast_slice(*transforms),
                    usage: wgpu::BufferUsages::VERTEX,
                },
            )),
            _ => None,
        };

        let depth_view = match depth {
            Some(handle) => Some(&self.texture(handle)?.view),
            None => None,
        };
        let pipeline = self.pipelines.get(&key).ok_or(BackendError::UnknownHandle {
            kind: "pipeline",
            id: key.material.0,
        })?;

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("overlay_draw"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &color_texture.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: depth_view.map(|view| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, &bind_group, &[]);

        match geometry {
            Geometry::Mesh {
                mesh,
                submesh,
                transforms,
            } => {
                let gpu_mesh = self.meshes.get(&mesh.handle.0).ok_or(BackendError::UnknownHandle {
                    kind: "mesh",
                    id: mesh.handle.0,
                })?;
                let Some(range) = gpu_mesh.submeshes.get(submesh as usize) else {
                    log::warn!("Mesh {} has no submesh {}", mesh.handle.0, submesh);
                    return Ok(());
                };
                let Some(instances) = instance_buffer.as_ref() else {
                    return Ok(());
                };
                render_pass.set_vertex_buffer(0, gpu_mesh.vertex_buffer.slice(..));
                render_pass.set_vertex_buffer(1, instances.slice(..));
                render_pass.set_index_buffer(gpu_mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(range.clone(), 0, 0..transforms.len() as u32);
            }
            Geometry::Procedural {
                vertex_count,
                instance_count,
                ..
            } => {
                render_pass.draw(0..vertex_count, 0..instance_count);
            }
            Geometry::Fullscreen { .. } => {
                render_pass.draw(0..3, 0..1);
            }
        }
        Ok(())
    }

    fn encode_clear(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: BoundTarget,
        flags: ClearFlags,
        color: Color,
        depth: f32,
    ) -> BackendResult<()> {
        let color_texture = self.texture(target.color.ok_or(BackendError::NoRenderTarget)?)?;
        let color_load = if flags.contains(ClearFlags::COLOR) {
            wgpu::LoadOp::Clear(wgpu::Color {
                r: color.r as f64,
                g: color.g as f64,
                b: color.b as f64,
                a: color.a as f64,
            })
        } else {
            wgpu::LoadOp::Load
        };
        let depth_view = match target.depth {
            Some(handle) => Some(&self.texture(handle)?.view),
            None => None,
        };
        let depth_load = if flags.contains(ClearFlags::DEPTH) {
            wgpu::LoadOp::Clear(depth)
        } else {
            wgpu::LoadOp::Load
        };

        let _render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("overlay_clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &color_texture.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: depth_view.map(|view| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        Ok(())
    }

    fn encode_command(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        temporaries: &mut TemporaryTargets,
        released: &mut Vec<TextureHandle>,
        target: &mut BoundTarget,
        command: &Command,
    ) -> BackendResult<()> {
        log::trace!("wgpu overlay command {:?}", command);
        match command {
            Command::GetTemporary { id, desc } => {
                temporaries.acquire(*id, || self.create_transient(desc))?;
            }
            Command::ReleaseTemporary { id } => {
                if let Some(handle) = temporaries.release(*id) {
                    released.push(handle);
                }
            }
            Command::SetRenderTarget { color, depth } => {
                target.color = Some(temporaries.resolve(*color)?);
                target.depth = depth.map(|d| temporaries.resolve(d)).transpose()?;
            }
            Command::Clear {
                flags,
                color,
                depth,
            } => self.encode_clear(encoder, *target, *flags, *color, *depth)?,
            Command::DrawMesh {
                mesh,
                submesh,
                transform,
                material,
                shader_pass,
            } => self.encode_draw(
                encoder,
                *target,
                MaterialPass {
                    material: *material,
                    pass: *shader_pass,
                },
                Geometry::Mesh {
                    mesh: *mesh,
                    submesh: *submesh,
                    transforms: std::slice::from_ref(transform),
                },
            )?,
            Command::DrawMeshInstanced {
                mesh,
                submesh,
                material,
                shader_pass,
                transforms,
            } => self.encode_draw(
                encoder,
                *target,
                MaterialPass {
                    material: *material,
                    pass: *shader_pass,
                },
                Geometry::Mesh {
                    mesh: *mesh,
                    submesh: *submesh,
                    transforms: &transforms[..],
                },
            )?,
            Command::DrawRenderer {
                renderer,
                material,
                submesh,
                shader_pass,
            } => {
                let entry = self.renderers.get(&renderer.0).ok_or(BackendError::UnknownHandle {
                    kind: "renderer",
                    id: renderer.0,
                })?;
                let (mesh, transform) = (entry.mesh, entry.transform);
                self.encode_draw(
                    encoder,
                    *target,
                    MaterialPass {
                        material: *material,
                        pass: *shader_pass,
                    },
                    Geometry::Mesh {
                        mesh,
                        submesh: *submesh,
                        transforms: &[transform],
                    },
                )?
            }
            Command::DrawProcedural {
                transform,
                material,
                shader_pass,
                topology,
                vertex_count,
                instance_count,
            } => self.encode_draw(
                encoder,
                *target,
                MaterialPass {
                    material: *material,
                    pass: *shader_pass,
                },
                Geometry::Procedural {
                    transform: *transform,
                    topology: *topology,
                    vertex_count: *vertex_count,
                    instance_count: *instance_count,
                },
            )?,
            Command::SetWireframe(enabled) => target.wireframe = *enabled,
            Command::Blit {
                source,
                destination,
                material,
            } => {
                let source = temporaries.resolve(*source)?;
                let destination = temporaries.resolve(*destination)?;
                if source == destination {
                    return Err(BackendError::AliasedBlit(source.0));
                }
                target.color = Some(destination);
                target.depth = None;
                let material = material.unwrap_or(MaterialPass {
                    material: self.copy_material,
                    pass: 0,
                });
                self.encode_draw(encoder, *target, material, Geometry::Fullscreen { source })?;
            }
            Command::SetGlobalTexture { name, texture } => {
                let handle = temporaries.resolve(*texture)?;
                self.globals.textures.insert(*name, handle);
            }
            Command::SetGlobalFloat { name, value } => {
                self.globals.floats.insert(*name, *value);
            }
            Command::SetGlobalVector { name, value } => {
                self.globals.vectors.insert(*name, *value);
            }
            Command::SetGlobalColor { name, value } => {
                self.globals.colors.insert(*name, *value);
            }
        }
        Ok(())
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

impl RenderBackend for WgpuOverlayBackend {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn create_transient(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        if !desc.is_valid_transient() {
            return Err(BackendError::TextureCreationFailed(format!(
                "invalid transient descriptor {:?}",
                desc
            )));
        }
        self.create_texture(desc)
    }

    fn release_transient(&mut self, texture: TextureHandle) {
        self.destroy_texture(texture);
    }

    fn submit(&mut self, commands: &CommandBuffer) -> BackendResult<()> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(commands.name()),
            });
        let mut temporaries = TemporaryTargets::new();
        let mut released = Vec::new();
        let mut target = BoundTarget::default();

        let mut result = Ok(());
        for command in commands.commands() {
            result = self.encode_command(&mut encoder, &mut temporaries, &mut released, &mut target, command);
            if result.is_err() {
                break;
            }
        }

        if result.is_ok() {
            self.queue.submit(Some(encoder.finish()));
        }

        for (id, handle) in temporaries.drain() {
            log::warn!("Temporary '{}' not released by '{}'", id, commands.name());
            released.push(handle);
        }
        for handle in released {
            self.release_transient(handle);
        }
        result
    }
}

impl MaterialFactory for WgpuOverlayBackend {
    fn create_material(&mut self, shader: &ShaderDescriptor) -> BackendResult<MaterialHandle> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(shader.name.as_str()),
                source: wgpu::ShaderSource::Wgsl(shader.source.as_str().into()),
            });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(BackendError::ShaderCreationFailed(format!(
                "'{}': {}",
                shader.name, error
            )));
        }

        let id = self.next_handle();
        self.materials.insert(
            id,
            GpuMaterial {
                name: shader.name.clone(),
                module,
                passes: shader.passes.clone(),
            },
        );
        log::debug!("Created material {} for shader '{}'", id, shader.name);
        Ok(MaterialHandle(id))
    }

    fn destroy_material(&mut self, material: MaterialHandle) {
        if self.materials.remove(&material.0).is_some() {
            self.pipelines.retain(|key, _| key.material != material);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::shaders::outline_shaders;
    use crate::pipeline::ExecutionMode;

    fn backend() -> Option<WgpuOverlayBackend> {
        let _ = env_logger::builder().is_test(true).try_init();
        match WgpuOverlayBackend::new() {
            Ok(backend) => Some(backend),
            Err(e) => {
                log::warn!("Skipping wgpu test: {}", e);
                None
            }
        }
    }

    #[test]
    fn test_outline_shaders_compile() {
        let Some(mut backend) = backend() else {
            return;
        };
        for mode in [ExecutionMode::Immediate, ExecutionMode::RenderGraph] {
            for shader in outline_shaders(mode) {
                let material = backend.create_material(&shader).unwrap();
                backend.destroy_material(material);
            }
        }
    }

    #[test]
    fn test_blit_between_temporaries() {
        let Some(mut backend) = backend() else {
            return;
        };
        let desc = TextureDescriptor {
            width: 8,
            height: 8,
            ..Default::default()
        };
        let camera = backend.create_texture(&desc).unwrap();
        let live_before = backend.textures.len();

        let mut cmd = CommandBuffer::new("blit");
        cmd.get_temporary("_Copy", desc.clone());
        cmd.set_render_target(crate::backend::command::RenderTargetId::Temporary("_Copy"), None);
        cmd.clear_render_target(ClearFlags::COLOR, Color::BLACK, 1.0);
        cmd.blit(
            crate::backend::command::RenderTargetId::Temporary("_Copy"),
            crate::backend::command::RenderTargetId::Texture(camera),
            None,
        );
        cmd.release_temporary("_Copy");
        backend.submit(&cmd).unwrap();

        assert_eq!(backend.textures.len(), live_before);
    }
}
