//! Backend abstraction layer
//!
//! Overlay passes record into [`command::CommandBuffer`]s. A host implements
//! [`RenderBackend`] and [`MaterialFactory`] to execute them. Two backends ship
//! with the crate: [`recording::RecordingBackend`], which validates and logs
//! every command without a GPU, and the headless wgpu backend behind the
//! `wgpu-backend` feature.

pub mod command;
pub mod recording;
pub mod traits;
pub mod types;

#[cfg(feature = "wgpu-backend")]
pub mod wgpu_backend;

pub use command::*;
pub use recording::*;
pub use traits::*;
pub use types::*;
