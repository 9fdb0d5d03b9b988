//! Selection outline and gizmo overlays for a host frame renderer
//!
//! The crate injects three kinds of passes into a frame the host owns:
//! - **Selection outline**: selected objects are drawn into a mask, the mask is
//!   blurred in two passes, and the blurred rim is composited over the camera
//!   color.
//! - **Render cache**: a cached set of renderers is redrawn into the camera
//!   attachments.
//! - **Gizmos**: overlay providers registered per camera record their own draw
//!   commands at a chosen point in the frame.
//!
//! # Execution modes
//! Passes are built once for either an immediate command-buffer host or a
//! render graph host ([`ExecutionMode`]). Both record through the same
//! [`backend::CommandSink`] surface.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use selection_overlay::backend::*;
//! use selection_overlay::registry::*;
//! use selection_overlay::scene::*;
//! use selection_overlay::*;
//!
//! let mut backend = RecordingBackend::new();
//! let renderers = Arc::new(RendererCache::from_items(vec![RendererEntry::new(
//!     RendererHandle::from_raw(1),
//!     vec![Some(MaterialHandle::from_raw(7))],
//! )]));
//! let sources = OverlaySources {
//!     selection: SelectionSources::new().with_renderers(renderers),
//!     render_cache: None,
//! };
//! let pipeline = OverlayPipeline::build(
//!     OverlayConfig::default(),
//!     sources,
//!     ExecutionMode::Immediate,
//!     &mut backend,
//! )
//! .unwrap();
//!
//! let camera = CameraData::new(CameraId(1), 640, 480, TextureFormat::Rgba8Unorm)
//!     .with_color_target(TextureHandle::from_raw(1));
//! let queue = pipeline.configure(&camera);
//! pipeline.render_immediate(&queue, &camera, &mut backend).unwrap();
//! assert_eq!(backend.live_transients(), 0);
//! ```

pub mod backend;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod render_graph;
pub mod scene;

pub use error::{OverlayError, Result};
pub use pipeline::{
    CameraEvent, ExecutionMode, FrameQueue, GizmoSettings, OverlayConfig, OverlayPipeline,
    OverlaySources, PassQueue, PassSlot, RenderCacheSettings, RenderPassEvent, SelectionSettings,
};
