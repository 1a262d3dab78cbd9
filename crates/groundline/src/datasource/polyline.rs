//! Polyline graphics attached to an entity

use super::material::MaterialHandle;
use super::property::{DistanceDisplayCondition, Property};
use crate::foundation::math::Cartesian3;

/// Default line width in pixels
pub const DEFAULT_WIDTH: f64 = 1.0;

/// Default surface distance between interpolated vertices, in meters
pub const DEFAULT_GRANULARITY: f64 = 9999.0;

/// Visual description of a polyline
#[derive(Debug, Clone)]
pub struct PolylineGraphics {
    /// Whether the polyline is drawn
    pub show: Property<bool>,
    /// Vertex positions
    pub positions: Property<Vec<Cartesian3>>,
    /// Line width in pixels
    pub width: Property<f64>,
    /// Surface distance between interpolated vertices
    pub granularity: Property<f64>,
    /// Whether the last position connects back to the first
    pub closed: Property<bool>,
    /// Whether the line is draped on terrain
    pub clamp_to_ground: Property<bool>,
    /// Fill material
    pub material: MaterialHandle,
    /// Camera distance range for display
    pub distance_display_condition: Option<Property<DistanceDisplayCondition>>,
    /// Draw order among ground geometry
    pub z_index: Property<i32>,
}

impl PolylineGraphics {
    /// Ground-clamped polyline through `positions` with default styling
    pub fn ground(positions: Vec<Cartesian3>) -> Self {
        Self {
            positions: Property::Constant(positions),
            clamp_to_ground: Property::Constant(true),
            ..Self::default()
        }
    }

    /// Set the material
    pub fn with_material(mut self, material: impl Into<MaterialHandle>) -> Self {
        self.material = material.into();
        self
    }

    /// Set the draw order
    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = Property::Constant(z_index);
        self
    }

    /// Set the distance display condition
    pub fn with_distance_display_condition(
        mut self,
        condition: impl Into<Property<DistanceDisplayCondition>>,
    ) -> Self {
        self.distance_display_condition = Some(condition.into());
        self
    }

    /// Set the width
    pub fn with_width(mut self, width: f64) -> Self {
        self.width = Property::Constant(width);
        self
    }
}

impl Default for PolylineGraphics {
    fn default() -> Self {
        Self {
            show: Property::Constant(true),
            positions: Property::Constant(Vec::new()),
            width: Property::Constant(DEFAULT_WIDTH),
            granularity: Property::Constant(DEFAULT_GRANULARITY),
            closed: Property::Constant(false),
            clamp_to_ground: Property::Constant(false),
            material: MaterialHandle::default(),
            distance_display_condition: None,
            z_index: Property::Constant(0),
        }
    }
}
