//! Per-frame camera data handed in by the host

use crate::backend::types::*;

/// Stable identity of a host camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CameraId(pub u64);

/// What a camera renders for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CameraKind {
    #[default]
    Game,
    SceneView,
    Preview,
    Reflection,
}

/// The active camera of the frame being rendered
#[derive(Debug, Clone)]
pub struct CameraData {
    pub id: CameraId,
    pub kind: CameraKind,
    pub culling_mask: LayerMask,
    /// Size and format of the camera color target
    pub target: TextureDescriptor,
    pub color_target: Option<TextureHandle>,
    pub depth_target: Option<TextureHandle>,
    /// The color target is the presented back buffer, not an intermediate
    pub is_back_buffer: bool,
}

impl CameraData {
    pub fn new(id: CameraId, width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            id,
            kind: CameraKind::Game,
            culling_mask: LayerMask::ALL,
            target: TextureDescriptor {
                label: Some("camera_color".to_string()),
                width,
                height,
                format,
                usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
                ..Default::default()
            },
            color_target: None,
            depth_target: None,
            is_back_buffer: false,
        }
    }

    pub fn with_kind(mut self, kind: CameraKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_culling_mask(mut self, mask: LayerMask) -> Self {
        self.culling_mask = mask;
        self
    }

    pub fn with_color_target(mut self, texture: TextureHandle) -> Self {
        self.color_target = Some(texture);
        self
    }

    pub fn with_depth_target(mut self, texture: TextureHandle) -> Self {
        self.depth_target = Some(texture);
        self
    }

    pub fn with_back_buffer(mut self, is_back_buffer: bool) -> Self {
        self.is_back_buffer = is_back_buffer;
        self
    }

    pub fn is_game(&self) -> bool {
        self.kind == CameraKind::Game
    }

    pub fn size(&self) -> (u32, u32) {
        (self.target.width, self.target.height)
    }
}
