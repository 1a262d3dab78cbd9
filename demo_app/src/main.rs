//! Ground polyline batch demo
//!
//! Drapes a handful of polylines over the globe, drives the batch frame by
//! frame and logs how primitives are created, swapped and retired as the
//! entities change.
//!
//! Usage: `ground_batch_demo [config.toml|config.ron]`

use std::rc::Rc;

use chrono::Duration;
use groundline::prelude::*;

const MAX_FRAMES: usize = 120;

pub struct GroundBatchDemo {
    primitives: SharedPrimitives,
    batch: GroundPolylineBatch,
    entities: Vec<Rc<Entity>>,
    shared_outline: MaterialHandle,
    time: JulianDate,
    frame: usize,
}

impl GroundBatchDemo {
    pub fn new(config: BatchConfig) -> Result<Self, ConfigError> {
        log::info!("Creating ground polyline batch demo...");
        let primitives = PrimitiveCollection::shared();
        let batch = GroundPolylineBatch::with_config(Rc::clone(&primitives), config)?;
        Ok(Self {
            primitives,
            batch,
            entities: Vec::new(),
            shared_outline: MaterialHandle::new(MaterialProperty::polyline_outline()),
            time: chrono::Utc::now(),
            frame: 0,
        })
    }

    fn add_polyline(&mut self, name: &str, degrees: &[f64], polyline: impl FnOnce(PolylineGraphics) -> PolylineGraphics) {
        let graphics = polyline(PolylineGraphics::ground(from_degrees_array(degrees)));
        let entity = Rc::new(Entity::new().with_name(name).with_polyline(graphics));
        self.batch
            .add(self.time, Rc::new(PolylineGeometryUpdater::new(Rc::clone(&entity))));
        self.entities.push(entity);
    }

    pub fn populate(&mut self) {
        let outline = self.shared_outline.clone();
        self.add_polyline("coast road", &[-75.0, 40.0, -74.5, 40.3, -74.0, 40.5], |p| {
            p.with_material(outline.clone())
        });
        self.add_polyline("river", &[-76.0, 39.0, -75.5, 39.6], |p| {
            p.with_material(outline.clone()).with_width(4.0)
        });
        self.add_polyline("border", &[-80.0, 42.0, -79.0, 42.0, -78.0, 42.2], |p| {
            p.with_material(Color::ORANGE).with_z_index(1)
        });
        self.add_polyline("trail", &[-72.0, 41.0, -71.8, 41.1], |p| {
            p.with_material(Color::ORANGE)
                .with_z_index(1)
                .with_distance_display_condition(DistanceDisplayCondition::new(0.0, 5.0e5))
        });
        log::info!("Added {} polylines in {} batches", self.entities.len(), self.batch.batch_count());
    }

    /// Tick until the batch has nothing outstanding; returns the frames taken
    pub fn settle(&mut self) -> Result<usize, Box<dyn std::error::Error>> {
        let start = self.frame;
        loop {
            self.frame += 1;
            self.time += Duration::milliseconds(16);
            let done = self.batch.update(self.time);

            let collection = self.primitives.borrow();
            log::debug!(
                "Frame {}: {} primitives, {} shown",
                self.frame,
                collection.len(),
                collection.shown_count()
            );
            if done {
                return Ok(self.frame - start);
            }
            if self.frame - start >= MAX_FRAMES {
                return Err(format!("batch did not settle within {MAX_FRAMES} frames").into());
            }
        }
    }

    fn report(&self, stage: &str) {
        let collection = self.primitives.borrow();
        log::info!("{}: {} primitives in draw order", stage, collection.len());
        for (index, (_, primitive)) in collection.iter().enumerate() {
            log::info!(
                "  [{}] {} polylines, {} vertices, material {}",
                index,
                primitive.instance_ids().len(),
                primitive.vertex_count(),
                primitive.appearance().material.type_name()
            );
        }
    }

    pub fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.populate();
        let frames = self.settle()?;
        self.report(&format!("Settled after {frames} frames"));

        if let Some(first) = self.entities.first() {
            let mut sphere = BoundingSphere::default();
            let updater = PolylineGeometryUpdater::new(Rc::clone(first));
            match self.batch.get_bounding_sphere(&updater, &mut sphere) {
                BoundingSphereState::Done => log::info!(
                    "Bounds of {}: radius {:.0} m",
                    first.name().unwrap_or("unnamed"),
                    sphere.radius
                ),
                state => log::warn!("No bounds for {}: {:?}", first.id(), state),
            }
        }

        log::info!("Widening the shared outline material...");
        self.shared_outline.update(|property| {
            if let MaterialProperty::PolylineOutline(outline) = property {
                outline.outline_width = Some(2.0.into());
            }
        });
        let frames = self.settle()?;
        self.report(&format!("Rebuilt after {frames} frames"));

        if let Some(last) = self.entities.last() {
            log::info!("Hiding {}", last.id());
            last.set_show(false);
        }
        self.settle()?;

        log::info!("Stats: {:?}", self.batch.stats());
        self.batch.remove_all_primitives();
        log::info!("Primitives after cleanup: {}", self.primitives.borrow().len());
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    groundline::foundation::logging::init();

    log::info!("Starting ground polyline batch demo");

    let config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading batch config from {}", path);
            BatchConfig::load_from_file(&path)?
        }
        None => BatchConfig::default(),
    };

    let mut demo = GroundBatchDemo::new(config)?;
    demo.run()?;
    log::info!("Demo finished");
    Ok(())
}
