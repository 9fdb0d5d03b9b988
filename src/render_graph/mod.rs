//! Render Graph System
//!
//! A declarative system for defining raster passes as a directed acyclic graph (DAG).
//! Passes declare the textures they sample and render to; the graph orders
//! them, and the executor allocates each transient texture just before its
//! first use and releases it right after its last use.

pub mod executor;
pub mod graph;
pub mod pass;
pub mod resource;

pub use executor::*;
pub use graph::*;
pub use pass::*;
pub use resource::*;
