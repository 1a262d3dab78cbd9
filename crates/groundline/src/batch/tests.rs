use std::rc::Rc;

use chrono::Utc;

use super::*;
use crate::datasource::entity::Entity;
use crate::datasource::material::{MaterialHandle, MaterialProperty};
use crate::datasource::polyline::PolylineGraphics;
use crate::datasource::property::{DistanceDisplayCondition, Property};
use crate::datasource::updater::PolylineGeometryUpdater;
use crate::foundation::color::Color;
use crate::foundation::math::{from_radians_array, Cartesian3};
use crate::foundation::time::{parse_iso8601, TimeInterval, TimeIntervalCollection};
use crate::render::{GeometryInstanceAttributes, PrimitiveCollection};

const MAX_FRAMES: usize = 64;

fn positions() -> Vec<Cartesian3> {
    from_radians_array(&[0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0])
}

fn ground_entity(material: impl Into<MaterialHandle>) -> Rc<Entity> {
    Rc::new(Entity::new().with_polyline(PolylineGraphics::ground(positions()).with_material(material)))
}

fn polyline_updater(entity: &Rc<Entity>) -> Rc<PolylineGeometryUpdater> {
    Rc::new(PolylineGeometryUpdater::new(Rc::clone(entity)))
}

fn outline_material() -> MaterialHandle {
    MaterialHandle::new(MaterialProperty::polyline_outline())
}

/// Tick until the batch reports nothing outstanding; returns the frame count
fn converge(batch: &mut GroundPolylineBatch, time: JulianDate) -> usize {
    crate::foundation::logging::init_with_default("warn");
    for frame in 1..=MAX_FRAMES {
        if batch.update(time) {
            return frame;
        }
    }
    panic!("batch did not converge within {MAX_FRAMES} frames");
}

/// Number of shown primitives drawing `id`
fn shown_with(primitives: &SharedPrimitives, id: EntityId) -> usize {
    primitives
        .borrow()
        .iter()
        .filter(|(_, primitive)| primitive.show && primitive.instance_ids().contains(&id))
        .count()
}

/// Tick until converged, asserting every entity stays drawn by exactly one
/// shown primitive on every frame
fn converge_without_gaps(
    batch: &mut GroundPolylineBatch,
    primitives: &SharedPrimitives,
    time: JulianDate,
    ids: &[EntityId],
) {
    crate::foundation::logging::init_with_default("warn");
    for frame in 1..=MAX_FRAMES {
        let done = batch.update(time);
        for id in ids {
            assert_eq!(shown_with(primitives, *id), 1, "entity {id} on frame {frame}");
        }
        if done {
            return;
        }
    }
    panic!("batch did not converge within {MAX_FRAMES} frames");
}

fn set_outline_width(material: &MaterialHandle, width: f64) {
    material.update(|property| {
        if let MaterialProperty::PolylineOutline(outline) = property {
            outline.outline_width = Some(width.into());
        }
    });
}

fn shown_attributes(primitives: &SharedPrimitives, id: EntityId) -> Option<GeometryInstanceAttributes> {
    let collection = primitives.borrow();
    let attributes = collection
        .iter()
        .filter(|(_, primitive)| primitive.show)
        .find_map(|(_, primitive)| primitive.geometry_instance_attributes(id).cloned());
    attributes
}

#[test]
fn test_shared_material_invalidated_splits_batch() {
    let time = Utc::now();
    let primitives = PrimitiveCollection::shared();
    let mut batch = GroundPolylineBatch::new(Rc::clone(&primitives));

    let first = ground_entity(outline_material());
    let second = ground_entity(outline_material());
    batch.add(time, polyline_updater(&first));
    batch.add(time, polyline_updater(&second));

    converge(&mut batch, time);
    assert_eq!(primitives.borrow().len(), 1);
    assert_eq!(batch.batch_count(), 1);

    let material = first
        .polyline()
        .as_ref()
        .map(|polyline| polyline.material.clone())
        .unwrap();
    set_outline_width(&material, 0.5);

    assert!(!batch.update(time));
    {
        let collection = primitives.borrow();
        assert_eq!(collection.len(), 3);
        assert_eq!(collection.shown_count(), 1);
    }

    converge_without_gaps(&mut batch, &primitives, time, &[first.id(), second.id()]);
    assert_eq!(primitives.borrow().len(), 2);
    assert_eq!(primitives.borrow().shown_count(), 2);
    assert_eq!(batch.batch_count(), 2);
    assert_eq!(batch.stats().invalidations, 1);
}

#[test]
fn test_sampled_distance_display_condition() {
    let valid_time = parse_iso8601("2018-02-14T04:10:00+1100").unwrap();
    let out_of_range = Utc::now();

    let condition = Property::from_interval(
        TimeInterval::from_iso8601(
            "2018-02-14T04:00:00+1100/2018-02-14T04:15:00+1100",
            DistanceDisplayCondition::new(1.0, 2.0),
        )
        .unwrap(),
    );
    let availability = TimeIntervalCollection::new().with_interval(
        TimeInterval::from_iso8601("2018-02-14T04:00:00+1100/2018-02-14T04:30:00+1100", ()).unwrap(),
    );
    let entity = Rc::new(
        Entity::new()
            .with_availability(availability)
            .with_polyline(
                PolylineGraphics::ground(positions())
                    .with_material(outline_material())
                    .with_distance_display_condition(condition),
            ),
    );

    let primitives = PrimitiveCollection::shared();
    let mut batch = GroundPolylineBatch::new(Rc::clone(&primitives));
    batch.add(valid_time, polyline_updater(&entity));
    converge(&mut batch, valid_time);

    let attributes = shown_attributes(&primitives, entity.id()).unwrap();
    assert_eq!(attributes.distance_display_condition, [1.0, 2.0]);
    assert!(attributes.show);

    let created = batch.stats().primitives_created;
    assert!(batch.update(out_of_range));
    let attributes = shown_attributes(&primitives, entity.id()).unwrap();
    assert_eq!(attributes.distance_display_condition, [0.0, f64::INFINITY]);
    assert!(!attributes.show);
    assert_eq!(batch.stats().primitives_created, created);
}

#[test]
fn test_only_one_primitive_shown_while_rebuilding() {
    let time = Utc::now();
    let primitives = PrimitiveCollection::shared();
    let mut batch = GroundPolylineBatch::new(Rc::clone(&primitives));

    let first = ground_entity(Color::RED);
    batch.add(time, polyline_updater(&first));
    converge(&mut batch, time);
    assert_eq!(primitives.borrow().len(), 1);

    let second = ground_entity(Color::RED);
    batch.add(time, polyline_updater(&second));

    let mut peak = 0;
    for _ in 0..MAX_FRAMES {
        let done = batch.update(time);
        let collection = primitives.borrow();
        peak = peak.max(collection.len());
        assert_eq!(collection.shown_count(), 1);
        if done {
            break;
        }
    }

    assert_eq!(peak, 2);
    assert_eq!(primitives.borrow().len(), 1);
    assert!(shown_attributes(&primitives, first.id()).is_some());
    assert!(shown_attributes(&primitives, second.id()).is_some());
}

#[test]
fn test_equal_color_materials_share_batch() {
    let time = Utc::now();
    let primitives = PrimitiveCollection::shared();
    let mut batch = GroundPolylineBatch::new(Rc::clone(&primitives));

    batch.add(time, polyline_updater(&ground_entity(Color::RED)));
    batch.add(time, polyline_updater(&ground_entity(Color::RED)));
    converge(&mut batch, time);

    assert_eq!(primitives.borrow().len(), 1);
    assert_eq!(batch.len(), 2);
}

#[test]
fn test_different_colors_batch_separately() {
    let time = Utc::now();
    let primitives = PrimitiveCollection::shared();
    let mut batch = GroundPolylineBatch::new(Rc::clone(&primitives));

    batch.add(time, polyline_updater(&ground_entity(Color::RED)));
    batch.add(time, polyline_updater(&ground_entity(Color::YELLOW)));
    converge(&mut batch, time);

    assert_eq!(primitives.borrow().len(), 2);
}

#[test]
fn test_different_z_indices_batch_separately() {
    let time = Utc::now();
    let primitives = PrimitiveCollection::shared();
    let mut batch = GroundPolylineBatch::new(Rc::clone(&primitives));

    let material = outline_material();
    let low = Rc::new(Entity::new().with_polyline(
        PolylineGraphics::ground(positions())
            .with_material(material.clone())
            .with_z_index(0),
    ));
    let high = Rc::new(Entity::new().with_polyline(
        PolylineGraphics::ground(positions())
            .with_material(material)
            .with_z_index(1),
    ));
    batch.add(time, polyline_updater(&high));
    batch.add(time, polyline_updater(&low));
    converge(&mut batch, time);

    let collection = primitives.borrow();
    assert_eq!(collection.len(), 2);
    assert_eq!(collection.get(0).unwrap().instance_ids(), &[low.id()]);
    assert_eq!(collection.get(1).unwrap().instance_ids(), &[high.id()]);
}

#[test]
fn test_removes_entities() {
    let time = Utc::now();
    let primitives = PrimitiveCollection::shared();
    let mut batch = GroundPolylineBatch::new(Rc::clone(&primitives));

    let entity = ground_entity(outline_material());
    let updater = polyline_updater(&entity);
    batch.add(time, updater.clone());
    converge(&mut batch, time);
    assert_eq!(primitives.borrow().len(), 1);

    assert!(batch.remove(&*updater));
    converge(&mut batch, time);
    assert_eq!(primitives.borrow().len(), 0);
    assert_eq!(batch.batch_count(), 0);
    assert!(batch.is_empty());
    assert_eq!(batch.stats().live_primitives(), 0);
}

#[test]
fn test_remove_unknown_updater_is_noop() {
    let primitives = PrimitiveCollection::shared();
    let mut batch = GroundPolylineBatch::new(Rc::clone(&primitives));
    let updater = polyline_updater(&ground_entity(Color::RED));

    assert!(!batch.remove(&*updater));
    assert!(batch.update(Utc::now()));
    assert!(primitives.borrow().is_empty());
}

#[test]
fn test_adding_twice_registers_once() {
    let time = Utc::now();
    let primitives = PrimitiveCollection::shared();
    let mut batch = GroundPolylineBatch::new(Rc::clone(&primitives));

    let updater = polyline_updater(&ground_entity(Color::RED));
    batch.add(time, updater.clone());
    batch.add(time, updater.clone());
    assert_eq!(batch.len(), 1);

    converge(&mut batch, time);
    let collection = primitives.borrow();
    assert_eq!(collection.len(), 1);
    assert_eq!(collection.get(0).unwrap().instance_ids().len(), 1);
}

#[test]
fn test_bounding_sphere_pending_then_done() {
    let time = Utc::now();
    let primitives = PrimitiveCollection::shared();
    let mut batch = GroundPolylineBatch::new(Rc::clone(&primitives));

    let entity = ground_entity(outline_material());
    let updater = polyline_updater(&entity);
    let mut sphere = BoundingSphere::default();

    assert_eq!(
        batch.get_bounding_sphere(&*updater, &mut sphere),
        BoundingSphereState::Failed
    );

    batch.add(time, updater.clone());
    assert_eq!(
        batch.get_bounding_sphere(&*updater, &mut sphere),
        BoundingSphereState::Pending
    );
    batch.update(time);
    assert_eq!(
        batch.get_bounding_sphere(&*updater, &mut sphere),
        BoundingSphereState::Pending
    );
    assert_eq!(sphere, BoundingSphere::default());

    converge(&mut batch, time);
    assert_eq!(
        batch.get_bounding_sphere(&*updater, &mut sphere),
        BoundingSphereState::Done
    );
    assert!(sphere.radius > 0.0);
    for position in positions() {
        assert!(sphere.contains(&position));
    }

    batch.remove(&*updater);
    assert_eq!(
        batch.get_bounding_sphere(&*updater, &mut sphere),
        BoundingSphereState::Failed
    );
}

#[test]
fn test_bounding_sphere_fails_for_hidden_entity() {
    let time = Utc::now();
    let primitives = PrimitiveCollection::shared();
    let mut batch = GroundPolylineBatch::new(Rc::clone(&primitives));

    let entity = ground_entity(Color::RED);
    let updater = polyline_updater(&entity);
    batch.add(time, updater.clone());
    converge(&mut batch, time);

    entity.set_show(false);
    batch.update(time);
    let mut sphere = BoundingSphere::default();
    assert_eq!(
        batch.get_bounding_sphere(&*updater, &mut sphere),
        BoundingSphereState::Failed
    );
}

#[test]
fn test_show_toggle_applied_in_place() {
    let time = Utc::now();
    let primitives = PrimitiveCollection::shared();
    let mut batch = GroundPolylineBatch::new(Rc::clone(&primitives));

    let entity = ground_entity(Color::RED);
    batch.add(time, polyline_updater(&entity));
    converge(&mut batch, time);
    assert!(shown_attributes(&primitives, entity.id()).unwrap().show);

    entity.set_show(false);
    assert!(batch.update(time));
    assert!(!shown_attributes(&primitives, entity.id()).unwrap().show);

    entity.set_show(true);
    assert!(batch.update(time));
    assert!(shown_attributes(&primitives, entity.id()).unwrap().show);

    assert_eq!(batch.stats().primitives_created, 1);
    assert_eq!(batch.stats().attribute_writes, 2);
}

#[test]
fn test_invalidation_leaves_other_keys_untouched() {
    let time = Utc::now();
    let primitives = PrimitiveCollection::shared();
    let mut batch = GroundPolylineBatch::new(Rc::clone(&primitives));

    let steady = ground_entity(Color::RED);
    let changing_material = MaterialHandle::from(Color::YELLOW);
    let changing = ground_entity(changing_material.clone());
    batch.add(time, polyline_updater(&steady));
    batch.add(time, polyline_updater(&changing));
    converge(&mut batch, time);

    let steady_handle = primitives
        .borrow()
        .iter()
        .find(|(_, primitive)| primitive.instance_ids() == [steady.id()])
        .map(|(handle, _)| handle)
        .unwrap();
    let created = batch.stats().primitives_created;

    changing_material.set(MaterialProperty::color(Color::ORANGE));
    converge(&mut batch, time);

    assert!(primitives.borrow().contains(steady_handle));
    assert_eq!(primitives.borrow().len(), 2);
    assert_eq!(batch.stats().primitives_created, created + 1);
}

#[test]
fn test_geometry_change_rebuilds() {
    let time = Utc::now();
    let primitives = PrimitiveCollection::shared();
    let mut batch = GroundPolylineBatch::new(Rc::clone(&primitives));

    let entity = ground_entity(Color::RED);
    batch.add(time, polyline_updater(&entity));
    converge(&mut batch, time);
    let before = primitives.borrow().get(0).unwrap().vertex_count();

    entity.update_polyline(|polyline| {
        if let Some(polyline) = polyline {
            polyline.positions = Property::Constant(from_radians_array(&[0.0, 0.0, 0.5, 0.0]));
        }
    });
    converge(&mut batch, time);

    let collection = primitives.borrow();
    assert_eq!(collection.len(), 1);
    assert!(collection.get(0).unwrap().vertex_count() < before);
    assert_eq!(batch.stats().invalidations, 1);
}

#[test]
fn test_remove_all_primitives_mid_build() {
    let time = Utc::now();
    let primitives = PrimitiveCollection::shared();
    let mut batch = GroundPolylineBatch::new(Rc::clone(&primitives));

    batch.add(time, polyline_updater(&ground_entity(Color::RED)));
    batch.add(time, polyline_updater(&ground_entity(Color::YELLOW)));
    assert!(!batch.update(time));
    assert_eq!(primitives.borrow().len(), 2);

    batch.remove_all_primitives();
    assert!(primitives.borrow().is_empty());
    assert_eq!(batch.batch_count(), 0);
    assert!(batch.update(time));
    assert!(primitives.borrow().is_empty());
}

#[test]
fn test_superseded_build_finishes_hidden_then_is_removed() {
    let time = Utc::now();
    let primitives = PrimitiveCollection::shared();
    let mut batch = GroundPolylineBatch::new(Rc::clone(&primitives));

    batch.add(time, polyline_updater(&ground_entity(Color::RED)));
    assert!(!batch.update(time));

    batch.add(time, polyline_updater(&ground_entity(Color::RED)));
    assert!(!batch.update(time));
    {
        let collection = primitives.borrow();
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.shown_count(), 0);
    }

    converge(&mut batch, time);
    let collection = primitives.borrow();
    assert_eq!(collection.len(), 1);
    assert_eq!(collection.get(0).unwrap().instance_ids().len(), 2);
    assert_eq!(batch.stats().live_primitives(), 1);
}

#[test]
fn test_degenerate_geometry_fails_build() {
    let time = Utc::now();
    let primitives = PrimitiveCollection::shared();
    let mut batch = GroundPolylineBatch::new(Rc::clone(&primitives));

    let point = from_radians_array(&[0.5, 0.5]);
    let entity = Rc::new(Entity::new().with_polyline(PolylineGraphics::ground(vec![point[0], point[0]])));
    let updater = polyline_updater(&entity);
    batch.add(time, updater.clone());
    converge(&mut batch, time);

    assert!(primitives.borrow().is_empty());
    assert_eq!(batch.stats().failed_builds, 1);
    let mut sphere = BoundingSphere::default();
    assert_eq!(
        batch.get_bounding_sphere(&*updater, &mut sphere),
        BoundingSphereState::Failed
    );
    assert!(batch.update(time));
}

#[test]
fn test_synchronous_builds_converge_sooner() {
    let time = Utc::now();

    let primitives = PrimitiveCollection::shared();
    let mut synchronous =
        GroundPolylineBatch::with_config(Rc::clone(&primitives), BatchConfig::synchronous()).unwrap();
    synchronous.add(time, polyline_updater(&ground_entity(Color::RED)));
    assert_eq!(converge(&mut synchronous, time), 2);

    let primitives = PrimitiveCollection::shared();
    let mut asynchronous = GroundPolylineBatch::new(Rc::clone(&primitives));
    asynchronous.add(time, polyline_updater(&ground_entity(Color::RED)));
    assert_eq!(converge(&mut asynchronous, time), 4);
}

#[test]
fn test_repeated_material_edits_keep_one_primitive_shown() {
    let time = Utc::now();
    let primitives = PrimitiveCollection::shared();
    let mut batch = GroundPolylineBatch::new(Rc::clone(&primitives));

    let material = outline_material();
    let first = ground_entity(material.clone());
    let second = ground_entity(material.clone());
    batch.add(time, polyline_updater(&first));
    batch.add(time, polyline_updater(&second));
    converge(&mut batch, time);

    set_outline_width(&material, 2.0);
    assert!(!batch.update(time));
    assert_eq!(primitives.borrow().shown_count(), 1);

    // Edited again before the first rebuild lands
    set_outline_width(&material, 3.0);
    converge_without_gaps(&mut batch, &primitives, time, &[first.id(), second.id()]);

    let collection = primitives.borrow();
    assert_eq!(collection.len(), 1);
    assert_eq!(collection.shown_count(), 1);
    assert_eq!(batch.batch_count(), 1);
    assert_eq!(batch.stats().invalidations, 2);
    assert_eq!(batch.stats().live_primitives(), 1);
}

#[test]
fn test_hidden_entity_stays_hidden_across_rebuild() {
    let time = Utc::now();
    let primitives = PrimitiveCollection::shared();
    let mut batch = GroundPolylineBatch::new(Rc::clone(&primitives));

    let hidden = ground_entity(Color::RED);
    batch.add(time, polyline_updater(&hidden));
    converge(&mut batch, time);

    hidden.set_show(false);
    assert!(batch.update(time));
    assert!(!shown_attributes(&primitives, hidden.id()).unwrap().show);

    let joining = ground_entity(Color::RED);
    batch.add(time, polyline_updater(&joining));
    converge(&mut batch, time);

    assert_eq!(batch.stats().primitives_created, 2);
    assert!(!shown_attributes(&primitives, hidden.id()).unwrap().show);
    assert!(shown_attributes(&primitives, joining.id()).unwrap().show);

    hidden.set_show(true);
    assert!(batch.update(time));
    assert!(shown_attributes(&primitives, hidden.id()).unwrap().show);
}

#[test]
fn test_constant_hidden_polyline_ignores_entity_toggle() {
    let time = Utc::now();
    let primitives = PrimitiveCollection::shared();
    let mut batch = GroundPolylineBatch::new(Rc::clone(&primitives));

    let mut graphics = PolylineGraphics::ground(positions()).with_material(Color::RED);
    graphics.show = Property::Constant(false);
    let entity = Rc::new(Entity::new().with_polyline(graphics));
    batch.add(time, polyline_updater(&entity));
    converge(&mut batch, time);
    assert!(!shown_attributes(&primitives, entity.id()).unwrap().show);

    entity.set_show(false);
    assert!(batch.update(time));
    entity.set_show(true);
    assert!(batch.update(time));

    assert!(!shown_attributes(&primitives, entity.id()).unwrap().show);
}

#[test]
fn test_invalid_config_is_rejected() {
    let primitives = PrimitiveCollection::shared();
    let config = BatchConfig::default().with_terrain_heights(10.0, -10.0);

    let result = GroundPolylineBatch::with_config(Rc::clone(&primitives), config);
    assert!(matches!(result, Err(ConfigError::Invalid(_))));

    let config = BatchConfig::default().with_terrain_heights(f64::NAN, 0.0);
    assert!(GroundPolylineBatch::with_config(primitives, config).is_err());
}
