//! Common types shared between backends

use glam::Vec4;

/// Texture format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba16Float,
    Rgba32Float,
    Depth32Float,
    Depth24PlusStencil8,
    R8Unorm,
    R32Float,
}

impl TextureFormat {
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::Depth32Float | TextureFormat::Depth24PlusStencil8
        )
    }

    /// Whether a transient color target may be allocated in this format.
    pub fn is_color_renderable(&self) -> bool {
        !self.is_depth()
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::R8Unorm => 1,
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Bgra8UnormSrgb
            | TextureFormat::Depth32Float
            | TextureFormat::Depth24PlusStencil8
            | TextureFormat::R32Float => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Rgba32Float => 16,
        }
    }
}

/// Texture usage flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureUsage(u32);

impl TextureUsage {
    pub const COPY_SRC: Self = Self(1 << 0);
    pub const COPY_DST: Self = Self(1 << 1);
    pub const TEXTURE_BINDING: Self = Self(1 << 2);
    pub const RENDER_ATTACHMENT: Self = Self(1 << 4);

    /// Usage of every transient overlay target: rendered to, then sampled.
    pub const TRANSIENT_TARGET: Self =
        Self(Self::RENDER_ATTACHMENT.0 | Self::TEXTURE_BINDING.0 | Self::COPY_SRC.0 | Self::COPY_DST.0);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for TextureUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Texture descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Depth buffer bits; overlay targets are color-only and keep this at 0.
    pub depth_bits: u32,
    pub sample_count: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            width: 1,
            height: 1,
            depth_bits: 0,
            sample_count: 1,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::TRANSIENT_TARGET,
        }
    }
}

impl TextureDescriptor {
    /// A transient color target matching `target` in size and format.
    pub fn transient_like(target: &TextureDescriptor, label: &str) -> Self {
        Self {
            label: Some(label.to_string()),
            width: target.width,
            height: target.height,
            depth_bits: 0,
            sample_count: 1,
            format: target.format,
            usage: TextureUsage::TRANSIENT_TARGET,
        }
    }

    /// Zero-size or depth-format descriptors cannot back an overlay target.
    pub fn is_valid_transient(&self) -> bool {
        self.width > 0 && self.height > 0 && self.format.is_color_renderable()
    }
}

/// Linear RGBA color
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const CLEAR: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Build from 8-bit channels.
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::new(
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            a as f32 / 255.0,
        )
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl From<Color> for Vec4 {
    fn from(c: Color) -> Self {
        Vec4::new(c.r, c.g, c.b, c.a)
    }
}

/// Which attachments a clear touches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearFlags(u32);

impl ClearFlags {
    pub const COLOR: Self = Self(1 << 0);
    pub const DEPTH: Self = Self(1 << 1);
    pub const ALL: Self = Self(Self::COLOR.0 | Self::DEPTH.0);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for ClearFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Bit set of object layers a camera renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(u32::MAX);

    pub fn layer(index: u32) -> Self {
        Self(1u32.checked_shl(index).unwrap_or(0))
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Primitive topology for procedural draws
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u64);

impl TextureHandle {
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Handle to an uploaded mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub(crate) u64);

impl MeshHandle {
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

/// Handle to a material (shader plus persistent state)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialHandle(pub(crate) u64);

impl MaterialHandle {
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

/// Handle to a host renderer (mesh plus transform owned by the host scene)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RendererHandle(pub(crate) u64);

impl RendererHandle {
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

/// Mesh reference with its sub-mesh count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mesh {
    pub handle: MeshHandle,
    pub submesh_count: u32,
}

impl Mesh {
    pub fn new(handle: MeshHandle, submesh_count: u32) -> Self {
        Self {
            handle,
            submesh_count,
        }
    }
}
