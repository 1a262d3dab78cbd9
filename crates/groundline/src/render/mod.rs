//! Renderable side of the batch
//!
//! Primitives, the z-ordered collection that owns them, and the tessellation
//! that builds their geometry.

pub mod collection;
pub mod primitive;
pub mod tessellation;

pub use collection::{PrimitiveCollection, PrimitiveHandle, SharedPrimitives};
pub use primitive::{
    GeometryInstanceAttributes, GroundPolylinePrimitive, PolylineMaterialAppearance, PrimitiveStatus,
};
pub use tessellation::TessellationOptions;

/// Errors produced while building a primitive
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// Every instance in the build was degenerate
    #[error("No renderable geometry among {0} instances")]
    NoRenderableGeometry(usize),

    /// The build task was polled after it had already produced its result
    #[error("Build task polled after completion")]
    AlreadyCompleted,
}
