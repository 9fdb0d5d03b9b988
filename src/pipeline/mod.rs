//! Overlay rendering pipeline
//!
//! Three features inject passes into the host frame:
//! 1. Selection outline - mask, two blur passes, composite over camera color
//! 2. Render cache - redraws a renderer cache into the camera attachments
//! 3. Gizmos - replays overlay providers registered for the camera
//!
//! Every feature has an immediate implementation (records a command buffer)
//! and a render graph implementation (declares raster passes). The
//! [`OverlayPipeline`] picks one set at build time.

pub mod adapter;
pub mod blur;
pub mod composite;
pub mod events;
pub mod gizmos;
pub mod mask;
pub mod render_cache;
pub mod selection;
pub mod settings;
pub mod shaders;

pub use adapter::*;
pub use events::*;
pub use settings::*;

use crate::backend::command::CommandBuffer;
use crate::render_graph::RenderGraph;
use crate::scene::{CameraData, CameraRegistrationTable};

/// How overlay passes reach the host, fixed when the pipeline is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExecutionMode {
    /// Passes record into a host command buffer and manage temporaries
    /// explicitly.
    #[default]
    Immediate,
    /// Passes declare raster passes; the graph owns transient lifetimes.
    RenderGraph,
}

/// What a pass sees while recording one camera's frame
pub struct PassContext<'a> {
    pub camera: &'a CameraData,
    pub overlays: &'a CameraRegistrationTable,
}

/// A pass the pipeline can enqueue at an ordering key
pub trait OverlayPass {
    fn name(&self) -> &str;

    fn event(&self) -> RenderPassEvent;

    /// Whether the pass has anything to do for this camera this frame.
    fn should_enqueue(&self, ctx: &PassContext<'_>) -> bool;
}

/// Pass recorded into a command buffer
pub trait ImmediatePass: OverlayPass {
    fn execute(&self, ctx: &PassContext<'_>, cmd: &mut CommandBuffer);
}

/// Pass recorded as render graph raster passes
pub trait GraphPass: OverlayPass {
    fn record_render_graph(&self, ctx: &PassContext<'_>, graph: &mut RenderGraph);
}
