//! Frame ordering points

/// Point in the host frame after which an overlay pass runs.
///
/// Variants are declared in frame order, so `Ord` follows the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum RenderPassEvent {
    BeforeRendering = 0,
    BeforeRenderingOpaques = 250,
    AfterRenderingOpaques = 300,
    BeforeRenderingSkybox = 350,
    AfterRenderingSkybox = 400,
    BeforeRenderingTransparents = 450,
    AfterRenderingTransparents = 500,
    BeforeRenderingPostProcessing = 550,
    AfterRenderingPostProcessing = 600,
    AfterRendering = 1000,
}

impl RenderPassEvent {
    /// Numeric ordering key.
    pub fn order(self) -> u32 {
        self as u32
    }
}

/// Camera-relative event an overlay provider attaches its commands to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraEvent {
    BeforeDepthTexture,
    AfterDepthTexture,
    BeforeForwardOpaque,
    AfterForwardOpaque,
    BeforeSkybox,
    AfterSkybox,
    BeforeForwardAlpha,
    AfterForwardAlpha,
    BeforeImageEffectsOpaque,
    AfterImageEffectsOpaque,
    BeforeImageEffects,
    AfterImageEffects,
    AfterEverything,
}

impl CameraEvent {
    /// Host ordering key for this event. Events without a dedicated key run
    /// after everything else.
    pub fn to_render_pass_event(self) -> RenderPassEvent {
        match self {
            CameraEvent::BeforeImageEffects => RenderPassEvent::BeforeRenderingPostProcessing,
            CameraEvent::AfterImageEffects | CameraEvent::AfterImageEffectsOpaque => {
                RenderPassEvent::AfterRenderingPostProcessing
            }
            CameraEvent::AfterForwardAlpha => RenderPassEvent::AfterRenderingTransparents,
            _ => RenderPassEvent::AfterRendering,
        }
    }
}

impl From<CameraEvent> for RenderPassEvent {
    fn from(event: CameraEvent) -> Self {
        event.to_render_pass_event()
    }
}
