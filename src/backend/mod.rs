//! Backend abstraction layer
//!
//! Provides the narrow GPU contract the engine draws through, a wgpu
//! implementation and a CPU-memory one for tests and tooling.

pub mod headless;
pub mod traits;
pub mod types;
pub mod wgpu_backend;

pub use headless::HeadlessBackend;
pub use traits::*;
pub use types::*;
pub use wgpu_backend::WgpuBackend;
