//! # Groundline
//!
//! Per-material batching of ground-clamped polylines.
//!
//! Entities carry polyline graphics whose material, display condition and
//! visibility may vary over time. A [`batch::GroundPolylineBatch`] groups their
//! updaters by material value and z-index, builds one ground primitive per
//! group into a shared [`render::PrimitiveCollection`], and keeps those
//! primitives in step with the entities from frame to frame.
//!
//! ## Features
//!
//! - **Material batching**: equal material definitions share a primitive
//! - **Flicker-free rebuilds**: the old primitive stays visible until its
//!   replacement finishes building
//! - **In-place attributes**: show, display condition and color refresh
//!   without a rebuild
//! - **Config files**: batch settings load from TOML or RON
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::rc::Rc;
//! use groundline::prelude::*;
//!
//! let primitives = PrimitiveCollection::shared();
//! let mut batch = GroundPolylineBatch::new(Rc::clone(&primitives));
//!
//! let positions = from_degrees_array(&[-75.0, 40.0, -74.0, 40.5]);
//! let entity = Rc::new(Entity::new().with_polyline(
//!     PolylineGraphics::ground(positions).with_material(Color::ORANGE),
//! ));
//!
//! let time = chrono::Utc::now();
//! batch.add(time, Rc::new(PolylineGeometryUpdater::new(entity)));
//! while !batch.update(time) {}
//! assert_eq!(primitives.borrow().len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::must_use_candidate)]

pub mod batch;
pub mod config;
pub mod core;
pub mod datasource;
pub mod foundation;
pub mod render;

/// Common imports for batch users
pub mod prelude {
    pub use crate::{
        batch::{BatchStats, BoundingSphereState, GroundPolylineBatch, MaterialBatchKey},
        config::{Config, ConfigError},
        core::BatchConfig,
        datasource::{
            DistanceDisplayCondition, Entity, EntityId, GroundGeometryUpdater, MaterialHandle,
            MaterialProperty, PolylineGeometryUpdater, PolylineGraphics, Property,
        },
        foundation::{
            color::Color,
            math::{from_degrees_array, BoundingSphere, Cartesian3, Ellipsoid},
            time::{JulianDate, TimeInterval, TimeIntervalCollection},
        },
        render::{PrimitiveCollection, SharedPrimitives},
    };
}
