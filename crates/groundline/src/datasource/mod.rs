//! Entity-side data consumed by the batch
//!
//! Entities own polyline graphics whose properties may vary over time.
//! Updaters adapt one entity into geometry instances and material keys.

pub mod entity;
pub mod material;
pub mod polyline;
pub mod property;
pub mod updater;

pub use entity::{Entity, EntityId};
pub use material::{Material, MaterialHandle, MaterialProperty};
pub use polyline::PolylineGraphics;
pub use property::{DistanceDisplayCondition, Property};
pub use updater::{GeometryInstance, GroundGeometryUpdater, GroundPolylineGeometry, InstanceAttributes, PolylineGeometryUpdater};
