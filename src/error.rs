//! Crate-level error type

use thiserror::Error;

use crate::backend::traits::BackendError;
use crate::pipeline::ExecutionMode;
use crate::render_graph::GraphError;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("Failed to create material for shader '{shader}'")]
    MaterialCreation {
        shader: String,
        #[source]
        source: BackendError,
    },
    #[error("Pipeline was built for {built:?} execution but was driven as {called:?}")]
    ExecutionModeMismatch {
        built: ExecutionMode,
        called: ExecutionMode,
    },
    #[error("No pass in slot {0}")]
    UnknownPass(usize),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

pub type Result<T> = std::result::Result<T, OverlayError>;
