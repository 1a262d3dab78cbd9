//! Ground polyline primitive
//!
//! A primitive owns the merged geometry of several instances and one
//! appearance. Construction is asynchronous: the primitive is created with its
//! build outstanding and becomes ready when [`GroundPolylinePrimitive::update`]
//! observes the build completing. Per-instance attributes exist only once the
//! primitive is ready.

use std::collections::HashMap;
use std::fmt;
use std::task::{Context, Poll};

use futures::future::LocalBoxFuture;
use futures::task::noop_waker_ref;
use futures::FutureExt;

use crate::datasource::entity::EntityId;
use crate::datasource::material::Material;
use crate::datasource::property::DistanceDisplayCondition;
use crate::datasource::updater::GeometryInstance;
use crate::foundation::color::Color;
use crate::foundation::math::BoundingSphere;

use super::tessellation::{TessellatedGeometry, TessellationOptions, TessellationTask};
use super::BuildError;

/// Appearance shading a ground polyline with a material
#[derive(Debug, Clone, PartialEq)]
pub struct PolylineMaterialAppearance {
    /// Material value, resolved for the current time
    pub material: Material,
}

impl PolylineMaterialAppearance {
    /// Create an appearance for `material`
    pub fn new(material: Material) -> Self {
        Self { material }
    }
}

/// Mutable per-instance attributes of a ready primitive
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryInstanceAttributes {
    /// Whether the instance is drawn
    pub show: bool,
    /// Visible camera distance range as `[near, far]`
    pub distance_display_condition: [f64; 2],
    /// Per-instance color bytes
    pub color: Option<[u8; 4]>,
    bounding_sphere: Option<BoundingSphere>,
}

impl GeometryInstanceAttributes {
    /// Bounds of the instance geometry, if it produced any
    pub fn bounding_sphere(&self) -> Option<&BoundingSphere> {
        self.bounding_sphere.as_ref()
    }

    /// Write the display condition; returns whether the value changed
    pub fn set_distance_display_condition(&mut self, condition: DistanceDisplayCondition) -> bool {
        let value = condition.to_attribute_value();
        if self.distance_display_condition == value {
            return false;
        }
        self.distance_display_condition = value;
        true
    }

    /// Write the show flag; returns whether the value changed
    pub fn set_show(&mut self, show: bool) -> bool {
        std::mem::replace(&mut self.show, show) != show
    }

    /// Write the color; returns whether the value changed
    pub fn set_color(&mut self, color: Color) -> bool {
        let bytes = Some(color.to_bytes());
        std::mem::replace(&mut self.color, bytes) != bytes
    }
}

/// Build progress of a primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveStatus {
    /// Build outstanding
    Building,
    /// Geometry built, attributes available
    Ready,
    /// Build failed; the primitive will never become ready
    Failed,
}

enum BuildState {
    Building(LocalBoxFuture<'static, Result<TessellatedGeometry, BuildError>>),
    Ready {
        attributes: HashMap<EntityId, GeometryInstanceAttributes>,
        vertex_count: usize,
    },
    Failed(BuildError),
}

/// Renderable merging the geometry of several ground polylines
pub struct GroundPolylinePrimitive {
    /// Whether the primitive is drawn
    pub show: bool,
    appearance: PolylineMaterialAppearance,
    instance_ids: Vec<EntityId>,
    state: BuildState,
}

impl GroundPolylinePrimitive {
    /// Start building a hidden primitive from `instances`
    pub fn new(
        instances: Vec<GeometryInstance>,
        appearance: PolylineMaterialAppearance,
        options: TessellationOptions,
    ) -> Self {
        let instance_ids = instances.iter().map(|instance| instance.id).collect();
        Self {
            show: false,
            appearance,
            instance_ids,
            state: BuildState::Building(TessellationTask::new(instances, options).boxed_local()),
        }
    }

    /// Poll the outstanding build once and report the resulting status
    pub fn update(&mut self) -> PrimitiveStatus {
        let BuildState::Building(task) = &mut self.state else {
            return self.status();
        };

        let mut cx = Context::from_waker(noop_waker_ref());
        let result = match task.poll_unpin(&mut cx) {
            Poll::Pending => return PrimitiveStatus::Building,
            Poll::Ready(result) => result,
        };

        self.state = match result {
            Ok(geometry) => {
                let vertex_count = geometry.vertex_count();
                let attributes = geometry
                    .instances
                    .into_iter()
                    .map(|instance| {
                        let attributes = GeometryInstanceAttributes {
                            show: instance.attributes.show,
                            distance_display_condition: instance
                                .attributes
                                .distance_display_condition
                                .to_attribute_value(),
                            color: instance.attributes.color.map(Color::to_bytes),
                            bounding_sphere: instance.bounding_sphere,
                        };
                        (instance.id, attributes)
                    })
                    .collect();
                log::trace!(
                    "Ground polyline primitive ready: {} instances, {} vertices",
                    self.instance_ids.len(),
                    vertex_count
                );
                BuildState::Ready {
                    attributes,
                    vertex_count,
                }
            }
            Err(error) => BuildState::Failed(error),
        };
        self.status()
    }

    /// Current build status without polling
    pub fn status(&self) -> PrimitiveStatus {
        match self.state {
            BuildState::Building(_) => PrimitiveStatus::Building,
            BuildState::Ready { .. } => PrimitiveStatus::Ready,
            BuildState::Failed(_) => PrimitiveStatus::Failed,
        }
    }

    /// Whether the build has completed successfully
    pub fn ready(&self) -> bool {
        self.status() == PrimitiveStatus::Ready
    }

    /// Build error, once failed
    pub fn error(&self) -> Option<&BuildError> {
        match &self.state {
            BuildState::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// Entities merged into this primitive, in build order
    pub fn instance_ids(&self) -> &[EntityId] {
        &self.instance_ids
    }

    /// Total vertices; zero until ready
    pub fn vertex_count(&self) -> usize {
        match self.state {
            BuildState::Ready { vertex_count, .. } => vertex_count,
            _ => 0,
        }
    }

    /// Attributes of the instance built from entity `id`
    pub fn geometry_instance_attributes(&self, id: EntityId) -> Option<&GeometryInstanceAttributes> {
        match &self.state {
            BuildState::Ready { attributes, .. } => attributes.get(&id),
            _ => None,
        }
    }

    /// Mutable attributes of the instance built from entity `id`
    pub fn geometry_instance_attributes_mut(
        &mut self,
        id: EntityId,
    ) -> Option<&mut GeometryInstanceAttributes> {
        match &mut self.state {
            BuildState::Ready { attributes, .. } => attributes.get_mut(&id),
            _ => None,
        }
    }

    /// Shading appearance
    pub fn appearance(&self) -> &PolylineMaterialAppearance {
        &self.appearance
    }

    /// Replace the appearance material
    pub fn set_material(&mut self, material: Material) {
        self.appearance.material = material;
    }
}

impl fmt::Debug for GroundPolylinePrimitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroundPolylinePrimitive")
            .field("show", &self.show)
            .field("status", &self.status())
            .field("instances", &self.instance_ids.len())
            .field("material", &self.appearance.material.type_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::updater::{GroundPolylineGeometry, InstanceAttributes};
    use crate::foundation::math::from_radians_array;

    fn instance(positions: Vec<crate::foundation::math::Cartesian3>) -> GeometryInstance {
        GeometryInstance {
            id: EntityId::next(),
            geometry: GroundPolylineGeometry {
                positions,
                width: 1.0,
                granularity: 9999.0,
                closed: false,
            },
            attributes: InstanceAttributes {
                show: true,
                distance_display_condition: DistanceDisplayCondition::new(1.0, 2.0),
                color: Some(Color::RED),
            },
        }
    }

    fn appearance() -> PolylineMaterialAppearance {
        PolylineMaterialAppearance::new(Material::Color { color: Color::RED })
    }

    fn options(latency_frames: u32) -> TessellationOptions {
        TessellationOptions {
            latency_frames,
            ..TessellationOptions::default()
        }
    }

    #[test]
    fn test_primitive_starts_hidden_and_building() {
        let positions = from_radians_array(&[0.0, 0.0, 0.1, 0.0]);
        let primitive = GroundPolylinePrimitive::new(vec![instance(positions)], appearance(), options(1));
        assert!(!primitive.show);
        assert_eq!(primitive.status(), PrimitiveStatus::Building);
        assert_eq!(primitive.vertex_count(), 0);
    }

    #[test]
    fn test_attributes_available_once_ready() {
        let positions = from_radians_array(&[0.0, 0.0, 0.1, 0.0]);
        let source = instance(positions);
        let id = source.id;
        let mut primitive = GroundPolylinePrimitive::new(vec![source], appearance(), options(1));

        assert_eq!(primitive.update(), PrimitiveStatus::Building);
        assert!(primitive.geometry_instance_attributes(id).is_none());
        assert_eq!(primitive.update(), PrimitiveStatus::Ready);
        assert_eq!(primitive.update(), PrimitiveStatus::Ready);

        let attributes = primitive.geometry_instance_attributes(id).unwrap();
        assert_eq!(attributes.distance_display_condition, [1.0, 2.0]);
        assert_eq!(attributes.color, Some([255, 0, 0, 255]));
        assert!(attributes.bounding_sphere().is_some());
        assert!(primitive.vertex_count() > 0);
    }

    #[test]
    fn test_attribute_writes_report_changes() {
        let positions = from_radians_array(&[0.0, 0.0, 0.1, 0.0]);
        let source = instance(positions);
        let id = source.id;
        let mut primitive = GroundPolylinePrimitive::new(vec![source], appearance(), options(0));
        primitive.update();

        let attributes = primitive.geometry_instance_attributes_mut(id).unwrap();
        assert!(!attributes.set_distance_display_condition(DistanceDisplayCondition::new(1.0, 2.0)));
        assert!(attributes.set_distance_display_condition(DistanceDisplayCondition::default()));
        assert_eq!(attributes.distance_display_condition, [0.0, f64::INFINITY]);
        assert!(attributes.set_show(false));
        assert!(!attributes.set_show(false));
        assert!(!attributes.set_color(Color::RED));
    }

    #[test]
    fn test_failed_build_never_becomes_ready() {
        let mut primitive = GroundPolylinePrimitive::new(vec![instance(Vec::new())], appearance(), options(0));
        assert_eq!(primitive.update(), PrimitiveStatus::Failed);
        assert!(!primitive.ready());
        assert_eq!(primitive.error(), Some(&BuildError::NoRenderableGeometry(1)));
    }
}
