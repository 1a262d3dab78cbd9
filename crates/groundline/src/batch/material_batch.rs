//! One batch key and the primitive built for it
//!
//! A [`MaterialBatch`] holds every updater sharing a material value and
//! z-index. Membership changes mark the batch for a rebuild; the rebuild adds
//! a hidden primitive next to the visible one and swaps them once the new
//! build completes.

use std::collections::BTreeMap;
use std::rc::Rc;

use log::{debug, trace, warn};

use crate::datasource::entity::EntityId;
use crate::datasource::material::{MaterialHandle, MaterialProperty};
use crate::datasource::property::is_constant;
use crate::datasource::updater::{GeometryInstance, GroundGeometryUpdater};
use crate::foundation::math::BoundingSphere;
use crate::foundation::time::JulianDate;
use crate::render::{
    GroundPolylinePrimitive, PolylineMaterialAppearance, PrimitiveCollection, PrimitiveHandle,
    PrimitiveStatus, TessellationOptions,
};

use super::{BatchStats, BoundingSphereState};

/// Identifier of a batch within its manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct BatchId(pub(crate) u64);

/// Material value and render order shared by every member of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialBatchKey {
    /// Material definition, compared by value
    pub material: MaterialProperty,
    /// Render order index
    pub z_index: i32,
}

impl MaterialBatchKey {
    /// Whether an updater with this material and z-index belongs to the key
    pub fn matches(&self, material: &MaterialProperty, z_index: i32) -> bool {
        self.z_index == z_index && self.material == *material
    }
}

struct Member {
    updater: Rc<dyn GroundGeometryUpdater>,
    instance: GeometryInstance,
    material: MaterialHandle,
    material_revision: u64,
    definition_revision: u64,
    show_revision: u64,
    tracks_attributes: bool,
}

impl Member {
    fn new(updater: Rc<dyn GroundGeometryUpdater>, instance: GeometryInstance) -> Self {
        let material = updater.fill_material_property();
        let tracks_attributes = !updater.has_constant_fill()
            || !material.get().is_constant()
            || !is_constant(updater.distance_display_condition_property().as_ref());
        trace!("Member {} tracks attributes: {}", instance.id, tracks_attributes);
        Self {
            material_revision: material.revision(),
            definition_revision: updater.definition_revision(),
            show_revision: updater.show_revision(),
            updater,
            instance,
            material,
            tracks_attributes,
        }
    }

    /// Visibility as the instance should currently be drawn
    fn sample_show(&self, time: JulianDate) -> bool {
        self.updater.is_showing() && self.updater.is_filled(time)
    }

    /// Bring the instance attributes used for the next build up to `time`
    fn resample(&mut self, time: JulianDate) {
        let show = self.sample_show(time);
        let attributes = &mut self.instance.attributes;
        attributes.show = show;
        attributes.distance_display_condition = self.updater.distance_display_condition(time);
        if let Some(color) = self.material.get().instance_color(time) {
            attributes.color = Some(color);
        }
        self.show_revision = self.updater.show_revision();
    }

    fn is_stale(&self, time: JulianDate, z_index: i32) -> bool {
        self.material.revision() != self.material_revision
            || self.updater.definition_revision() != self.definition_revision
            || self.updater.z_index(time) != z_index
    }
}

/// Hide a primitive whose build is still running so it can finish, or
/// remove it right away
pub(crate) fn discard(
    primitives: &mut PrimitiveCollection,
    handle: PrimitiveHandle,
    retired: &mut Vec<PrimitiveHandle>,
    stats: &mut BatchStats,
) {
    match primitives.primitive_mut(handle) {
        Some(primitive) if primitive.status() == PrimitiveStatus::Building => {
            primitive.show = false;
            retired.push(handle);
        }
        _ => destroy(primitives, handle, stats),
    }
}

/// Remove a primitive from the collection
pub(crate) fn destroy(primitives: &mut PrimitiveCollection, handle: PrimitiveHandle, stats: &mut BatchStats) {
    if primitives.remove(handle).is_some() {
        stats.primitives_destroyed += 1;
        debug!("Destroyed ground polyline primitive {:?}", handle);
    }
}

/// All updaters sharing one [`MaterialBatchKey`]
pub(crate) struct MaterialBatch {
    id: BatchId,
    key: MaterialBatchKey,
    members: BTreeMap<EntityId, Member>,
    create_primitive: bool,
    primitive: Option<PrimitiveHandle>,
    old_primitive: Option<PrimitiveHandle>,
}

impl MaterialBatch {
    pub(crate) fn new(id: BatchId, key: MaterialBatchKey) -> Self {
        Self {
            id,
            key,
            members: BTreeMap::new(),
            create_primitive: true,
            primitive: None,
            old_primitive: None,
        }
    }

    pub(crate) fn id(&self) -> BatchId {
        self.id
    }

    pub(crate) fn key(&self) -> &MaterialBatchKey {
        &self.key
    }

    pub(crate) fn contains(&self, id: EntityId) -> bool {
        self.members.contains_key(&id)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }

    pub(crate) fn add(&mut self, time: JulianDate, updater: Rc<dyn GroundGeometryUpdater>) {
        let instance = updater.create_fill_geometry_instance(time);
        let member = Member::new(updater, instance);
        self.members.insert(member.instance.id, member);
        self.create_primitive = true;
    }

    pub(crate) fn remove(&mut self, id: EntityId) -> bool {
        let removed = self.members.remove(&id).is_some();
        self.create_primitive |= removed;
        removed
    }

    /// Whether any member's material or geometry definition changed since it joined
    pub(crate) fn is_invalidated(&self, time: JulianDate) -> bool {
        self.members
            .values()
            .any(|member| member.is_stale(time, self.key.z_index))
    }

    /// No rebuild pending and the current primitive, if any, is ready
    pub(crate) fn is_settled(&self, primitives: &PrimitiveCollection) -> bool {
        !self.create_primitive
            && self.old_primitive.is_none()
            && self
                .primitive
                .and_then(|handle| primitives.primitive(handle))
                .map_or(true, GroundPolylinePrimitive::ready)
    }

    /// Every primitive handle this batch holds in the collection
    pub(crate) fn owned_handles(&self) -> impl Iterator<Item = PrimitiveHandle> {
        self.primitive.into_iter().chain(self.old_primitive)
    }

    /// Dissolve the batch, returning its updaters and the handle of the
    /// primitive currently on screen, if any
    ///
    /// Primitives that are not on screen are discarded.
    pub(crate) fn release(
        self,
        primitives: &mut PrimitiveCollection,
        retired: &mut Vec<PrimitiveHandle>,
        stats: &mut BatchStats,
    ) -> (Vec<Rc<dyn GroundGeometryUpdater>>, Option<PrimitiveHandle>) {
        let current_shown = self
            .primitive
            .and_then(|handle| primitives.primitive(handle))
            .map_or(false, |primitive| primitive.show);

        let shown = if current_shown {
            if let Some(old) = self.old_primitive {
                destroy(primitives, old, stats);
            }
            self.primitive
        } else {
            if let Some(current) = self.primitive {
                discard(primitives, current, retired, stats);
            }
            self.old_primitive
        };

        let updaters = self
            .members
            .into_values()
            .map(|member| member.updater)
            .collect();
        (updaters, shown)
    }

    /// Reconcile the primitive with the current membership
    ///
    /// Returns `false` while a build for this key is outstanding.
    pub(crate) fn update(
        &mut self,
        time: JulianDate,
        primitives: &mut PrimitiveCollection,
        retired: &mut Vec<PrimitiveHandle>,
        options: &TessellationOptions,
        stats: &mut BatchStats,
    ) -> bool {
        if self.create_primitive {
            return self.rebuild(time, primitives, retired, options, stats);
        }

        let Some(handle) = self.primitive else {
            return true;
        };
        let Some(primitive) = primitives.primitive_mut(handle) else {
            warn!("Primitive {:?} was removed from the collection externally", handle);
            self.primitive = None;
            return true;
        };

        match primitive.update() {
            PrimitiveStatus::Building => false,
            PrimitiveStatus::Ready => {
                primitive.show = true;
                primitive.set_material(self.key.material.value(time));
                stats.attribute_writes += self.write_attributes(time, primitive);
                if let Some(old) = self.old_primitive.take() {
                    destroy(primitives, old, stats);
                }
                true
            }
            PrimitiveStatus::Failed => {
                if let Some(error) = primitive.error() {
                    warn!(
                        "Ground polyline build for {} failed: {}",
                        self.key.material.type_name(),
                        error
                    );
                }
                destroy(primitives, handle, stats);
                stats.failed_builds += 1;
                self.primitive = self.old_primitive.take();
                true
            }
        }
    }

    fn rebuild(
        &mut self,
        time: JulianDate,
        primitives: &mut PrimitiveCollection,
        retired: &mut Vec<PrimitiveHandle>,
        options: &TessellationOptions,
        stats: &mut BatchStats,
    ) -> bool {
        self.create_primitive = false;

        if self.members.is_empty() {
            if let Some(current) = self.primitive.take() {
                discard(primitives, current, retired, stats);
            }
            if let Some(old) = self.old_primitive.take() {
                destroy(primitives, old, stats);
            }
            return true;
        }

        if let Some(current) = self.primitive.take() {
            let current_ready = primitives
                .primitive(current)
                .map_or(false, GroundPolylinePrimitive::ready);
            if current_ready && self.old_primitive.is_none() {
                // Stays on screen until the replacement is ready
                self.old_primitive = Some(current);
            } else {
                discard(primitives, current, retired, stats);
            }
        }

        let instances: Vec<GeometryInstance> = self
            .members
            .values_mut()
            .map(|member| {
                member.resample(time);
                member.instance.clone()
            })
            .collect();
        let appearance = PolylineMaterialAppearance::new(self.key.material.value(time));
        let primitive = GroundPolylinePrimitive::new(instances, appearance, options.clone());
        let handle = primitives.add(primitive, self.key.z_index);
        self.primitive = Some(handle);
        stats.primitives_created += 1;

        debug!(
            "Building {} primitive {:?} for {} polylines at z-index {}",
            self.key.material.type_name(),
            handle,
            self.members.len(),
            self.key.z_index
        );
        false
    }

    /// Refresh time-varying and show attributes in place; returns the number of writes
    fn write_attributes(&mut self, time: JulianDate, primitive: &mut GroundPolylinePrimitive) -> usize {
        let mut writes = 0;
        for (id, member) in &mut self.members {
            let Some(attributes) = primitive.geometry_instance_attributes_mut(*id) else {
                continue;
            };
            let show_revision = member.updater.show_revision();
            let show_changed = show_revision != member.show_revision;
            member.show_revision = show_revision;

            // Values written to the primitive are kept on the instance so the
            // next rebuild starts from them
            if member.tracks_attributes || show_changed {
                let show = member.sample_show(time);
                member.instance.attributes.show = show;
                writes += usize::from(attributes.set_show(show));
            }
            if !member.tracks_attributes {
                continue;
            }

            let updater = &member.updater;
            if !is_constant(updater.distance_display_condition_property().as_ref()) {
                let condition = updater.distance_display_condition(time);
                member.instance.attributes.distance_display_condition = condition;
                writes += usize::from(attributes.set_distance_display_condition(condition));
            }

            if let Some(color) = member.material.get().instance_color(time) {
                member.instance.attributes.color = Some(color);
                writes += usize::from(attributes.set_color(color));
            }
        }
        if writes > 0 {
            trace!("Wrote {} instance attributes for batch {:?}", writes, self.id);
        }
        writes
    }

    pub(crate) fn bounding_sphere(
        &self,
        id: EntityId,
        primitives: &PrimitiveCollection,
        result: &mut BoundingSphere,
    ) -> BoundingSphereState {
        if self.create_primitive {
            return BoundingSphereState::Pending;
        }
        let Some(primitive) = self.primitive.and_then(|handle| primitives.primitive(handle)) else {
            return BoundingSphereState::Failed;
        };
        if !primitive.ready() {
            return BoundingSphereState::Pending;
        }

        match primitive.geometry_instance_attributes(id) {
            Some(attributes) if attributes.show => match attributes.bounding_sphere() {
                Some(sphere) => {
                    *result = *sphere;
                    BoundingSphereState::Done
                }
                None => BoundingSphereState::Failed,
            },
            _ => BoundingSphereState::Failed,
        }
    }
}
