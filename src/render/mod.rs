//! Buffer allocation, batching and the per-frame draw phase

pub mod batch;
pub mod buffer;
pub mod renderer;
pub mod shader;

pub use batch::{BatchKey, BatchRenderer, Batches, DrawState, FrameStats};
pub use buffer::{BufferKind, BufferStats, RenderBuffer};
pub use renderer::{ObjectRef, RenderParams, Renderer};
pub use shader::{PointShape, RecordingShader, Shader, ShaderCalls, ShaderId, ShaderLibrary};

use crate::backend::traits::BackendError;
use crate::scene::ObjectId;
use thiserror::Error;

/// Renderer error type
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Unknown object {0:?}")]
    UnknownObject(ObjectId),
    #[error("No object named '{0}'")]
    UnknownName(String),
    #[error("An object named '{0}' already exists")]
    DuplicateName(String),
    #[error("Buffer capacity exceeds the addressable range")]
    CapacityExceeded,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type RenderResult<T> = Result<T, RenderError>;
