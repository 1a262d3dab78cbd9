//! Geometry updaters
//!
//! An updater adapts one entity into what a ground batch consumes: a geometry
//! instance sampled at a time, the material that selects the batch, the
//! render order, and the time-varying attributes that are refreshed in place.

use std::rc::Rc;

use super::entity::{Entity, EntityId};
use super::material::MaterialHandle;
use super::polyline::{PolylineGraphics, DEFAULT_GRANULARITY, DEFAULT_WIDTH};
use super::property::{DistanceDisplayCondition, Property};
use crate::foundation::color::Color;
use crate::foundation::math::Cartesian3;
use crate::foundation::time::JulianDate;

/// Geometry of one ground-clamped polyline
#[derive(Debug, Clone, PartialEq)]
pub struct GroundPolylineGeometry {
    /// Vertex positions on or near the surface
    pub positions: Vec<Cartesian3>,
    /// Line width in pixels
    pub width: f64,
    /// Surface distance between interpolated vertices, in meters
    pub granularity: f64,
    /// Whether the last position connects back to the first
    pub closed: bool,
}

/// Per-instance attributes written when an instance is created
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceAttributes {
    /// Whether the instance is drawn
    pub show: bool,
    /// Camera distance range for display
    pub distance_display_condition: DistanceDisplayCondition,
    /// Per-instance color, for solid color materials
    pub color: Option<Color>,
}

/// One entity's geometry and attributes, ready to be merged into a primitive
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryInstance {
    /// Entity the instance was created from
    pub id: EntityId,
    /// Geometry to tessellate
    pub geometry: GroundPolylineGeometry,
    /// Initial attribute values
    pub attributes: InstanceAttributes,
}

/// Source of ground geometry for one entity
///
/// Implementations are identified by [`Self::id`]; a batch never holds two
/// updaters with the same id.
pub trait GroundGeometryUpdater {
    /// Identity of the entity this updater serves
    fn id(&self) -> EntityId;

    /// Material selecting the batch this updater joins
    fn fill_material_property(&self) -> MaterialHandle;

    /// Render order index at `time`
    fn z_index(&self, time: JulianDate) -> i32;

    /// Whether the geometry is draped on terrain at `time`
    fn clamp_to_ground(&self, time: JulianDate) -> bool;

    /// Distance display condition, if any
    fn distance_display_condition_property(&self) -> Option<Property<DistanceDisplayCondition>>;

    /// Whether fill visibility can never change over time
    fn has_constant_fill(&self) -> bool;

    /// Whether the fill is visible at `time`, ignoring the entity show flag
    fn is_filled(&self, time: JulianDate) -> bool;

    /// Whether the entity is shown
    fn is_showing(&self) -> bool;

    /// Sample the geometry instance at `time`
    fn create_fill_geometry_instance(&self, time: JulianDate) -> GeometryInstance;

    /// Counter bumped when the geometry definition changes
    fn definition_revision(&self) -> u64;

    /// Counter bumped when the entity show flag flips
    fn show_revision(&self) -> u64;

    /// Distance display condition at `time`, `[0, +inf]` where undefined
    fn distance_display_condition(&self, time: JulianDate) -> DistanceDisplayCondition {
        self.distance_display_condition_property()
            .map_or_else(DistanceDisplayCondition::default, |property| {
                property.value_or(time, DistanceDisplayCondition::default())
            })
    }
}

/// Updater for an entity's [`PolylineGraphics`]
#[derive(Debug, Clone)]
pub struct PolylineGeometryUpdater {
    entity: Rc<Entity>,
}

impl PolylineGeometryUpdater {
    /// Create an updater for `entity`
    pub fn new(entity: Rc<Entity>) -> Self {
        Self { entity }
    }

    /// The entity being adapted
    pub fn entity(&self) -> &Rc<Entity> {
        &self.entity
    }

    fn with_polyline<R>(&self, read: impl FnOnce(&PolylineGraphics) -> R) -> Option<R> {
        self.entity.polyline().as_ref().map(read)
    }
}

impl GroundGeometryUpdater for PolylineGeometryUpdater {
    fn id(&self) -> EntityId {
        self.entity.id()
    }

    fn fill_material_property(&self) -> MaterialHandle {
        self.with_polyline(|polyline| polyline.material.clone())
            .unwrap_or_default()
    }

    fn z_index(&self, time: JulianDate) -> i32 {
        self.with_polyline(|polyline| polyline.z_index.value_or(time, 0))
            .unwrap_or(0)
    }

    fn clamp_to_ground(&self, time: JulianDate) -> bool {
        self.with_polyline(|polyline| polyline.clamp_to_ground.value_or(time, false))
            .unwrap_or(false)
    }

    fn distance_display_condition_property(&self) -> Option<Property<DistanceDisplayCondition>> {
        self.with_polyline(|polyline| polyline.distance_display_condition.clone())
            .flatten()
    }

    fn has_constant_fill(&self) -> bool {
        self.entity.availability().is_none()
            && self
                .with_polyline(|polyline| polyline.show.is_constant())
                .unwrap_or(true)
    }

    fn is_filled(&self, time: JulianDate) -> bool {
        self.entity.is_available(time)
            && self
                .with_polyline(|polyline| polyline.show.value_or(time, true))
                .unwrap_or(false)
    }

    fn is_showing(&self) -> bool {
        self.entity.is_showing()
    }

    fn create_fill_geometry_instance(&self, time: JulianDate) -> GeometryInstance {
        let geometry = self
            .with_polyline(|polyline| GroundPolylineGeometry {
                positions: polyline.positions.value_or(time, Vec::new()),
                width: polyline.width.value_or(time, DEFAULT_WIDTH),
                granularity: polyline.granularity.value_or(time, DEFAULT_GRANULARITY),
                closed: polyline.closed.value_or(time, false),
            })
            .unwrap_or(GroundPolylineGeometry {
                positions: Vec::new(),
                width: DEFAULT_WIDTH,
                granularity: DEFAULT_GRANULARITY,
                closed: false,
            });

        let material = self.fill_material_property();
        let color = material.get().instance_color(time);

        GeometryInstance {
            id: self.id(),
            geometry,
            attributes: InstanceAttributes {
                show: self.is_showing() && self.is_filled(time),
                distance_display_condition: self.distance_display_condition(time),
                color,
            },
        }
    }

    fn definition_revision(&self) -> u64 {
        self.entity.definition_revision()
    }

    fn show_revision(&self) -> u64 {
        self.entity.show_revision()
    }
}
