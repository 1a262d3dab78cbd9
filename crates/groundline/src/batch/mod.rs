//! Per-material batching of ground-clamped polylines
//!
//! [`GroundPolylineBatch`] groups updaters by material value and z-index and
//! keeps one ground primitive per group in a shared [`PrimitiveCollection`].
//! Membership changes trigger asynchronous rebuilds; until a rebuild finishes
//! the previously built primitive stays on screen, so a group never blinks
//! out while its geometry is regenerated.
//!
//! The manager is driven by calling [`GroundPolylineBatch::update`] once per
//! frame. It returns `true` once every group has a finished primitive that
//! reflects its current members.

mod material_batch;

#[cfg(test)]
mod tests;

use std::rc::Rc;

use log::{debug, warn};

use crate::config::{Config, ConfigError};
use crate::core::BatchConfig;
use crate::datasource::entity::EntityId;
use crate::datasource::updater::GroundGeometryUpdater;
use crate::foundation::math::BoundingSphere;
use crate::foundation::time::JulianDate;
use crate::render::{PrimitiveCollection, PrimitiveHandle, PrimitiveStatus, SharedPrimitives, TessellationOptions};

pub use material_batch::MaterialBatchKey;
use material_batch::{destroy, BatchId, MaterialBatch};

/// Outcome of a bounding sphere query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundingSphereState {
    /// The result was written
    Done,
    /// The geometry is still being built; ask again later
    Pending,
    /// No bounds can be produced for this updater
    Failed,
}

/// Counters describing batch activity since creation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Number of live batch keys
    pub batch_count: usize,

    /// Primitives added to the collection
    pub primitives_created: usize,

    /// Primitives removed from the collection
    pub primitives_destroyed: usize,

    /// Batches dissolved because a member's material or geometry changed
    pub invalidations: usize,

    /// Instance attribute values changed in place
    pub attribute_writes: usize,

    /// Builds that completed without renderable geometry
    pub failed_builds: usize,
}

impl BatchStats {
    /// Primitives currently owned in the collection
    pub fn live_primitives(&self) -> usize {
        self.primitives_created.saturating_sub(self.primitives_destroyed)
    }
}

/// A visible primitive kept on screen while the batches that took over its
/// members finish building
struct Superseded {
    handle: PrimitiveHandle,
    successors: Vec<BatchId>,
}

impl Superseded {
    fn replace_successor(&mut self, dissolved: BatchId, heirs: &[BatchId]) {
        let Some(position) = self.successors.iter().position(|id| *id == dissolved) else {
            return;
        };
        self.successors.swap_remove(position);
        for id in heirs {
            if !self.successors.contains(id) {
                self.successors.push(*id);
            }
        }
    }
}

/// Batches ground polylines by material and z-index
pub struct GroundPolylineBatch {
    primitives: SharedPrimitives,
    config: BatchConfig,
    options: TessellationOptions,
    items: Vec<MaterialBatch>,
    superseded: Vec<Superseded>,
    retired: Vec<PrimitiveHandle>,
    next_batch_id: u64,
    stats: BatchStats,
}

impl GroundPolylineBatch {
    /// Create a batch drawing into `primitives` with the default configuration
    pub fn new(primitives: SharedPrimitives) -> Self {
        Self::from_valid_config(primitives, BatchConfig::default())
    }

    /// Create a batch drawing into `primitives`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `config` fails validation.
    pub fn with_config(primitives: SharedPrimitives, config: BatchConfig) -> Result<Self, ConfigError> {
        if let Err(error) = config.validate() {
            warn!("Rejected ground polyline batch config: {}", error);
            return Err(error);
        }
        Ok(Self::from_valid_config(primitives, config))
    }

    fn from_valid_config(primitives: SharedPrimitives, config: BatchConfig) -> Self {
        let options = TessellationOptions::from(&config);
        debug!(
            "Ground polyline batch created (asynchronous: {}, latency: {} frames)",
            config.asynchronous, options.latency_frames
        );
        Self {
            primitives,
            config,
            options,
            items: Vec::new(),
            superseded: Vec::new(),
            retired: Vec::new(),
            next_batch_id: 0,
            stats: BatchStats::default(),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Collection the batch draws into
    pub fn primitives(&self) -> &SharedPrimitives {
        &self.primitives
    }

    /// Activity counters
    pub fn stats(&self) -> &BatchStats {
        &self.stats
    }

    /// Number of distinct material and z-index groups
    pub fn batch_count(&self) -> usize {
        self.items.len()
    }

    /// Keys of the live groups
    pub fn keys(&self) -> impl Iterator<Item = &MaterialBatchKey> + '_ {
        self.items.iter().map(MaterialBatch::key)
    }

    /// Whether an updater with this id is registered
    pub fn contains(&self, id: EntityId) -> bool {
        self.items.iter().any(|item| item.contains(id))
    }

    /// Number of registered updaters
    pub fn len(&self) -> usize {
        self.items.iter().map(MaterialBatch::len).sum()
    }

    /// Whether no updater is registered
    pub fn is_empty(&self) -> bool {
        self.items.iter().all(MaterialBatch::is_empty)
    }

    /// Register an updater, sampling its material and z-index at `time`
    ///
    /// Adding an updater that is already registered does nothing.
    pub fn add(&mut self, time: JulianDate, updater: Rc<dyn GroundGeometryUpdater>) {
        let id = updater.id();
        if self.contains(id) {
            debug!("Updater {} is already batched", id);
            return;
        }
        if !updater.clamp_to_ground(time) {
            warn!("Updater {} is not clamped to ground but was added to a ground batch", id);
        }
        self.insert(time, updater);
    }

    /// Unregister an updater; returns whether it was registered
    ///
    /// The group it belonged to is rebuilt on the next [`Self::update`], or its
    /// primitive removed if it was the last member.
    pub fn remove<U: GroundGeometryUpdater + ?Sized>(&mut self, updater: &U) -> bool {
        let id = updater.id();
        let removed = self.items.iter_mut().any(|item| item.remove(id));
        if !removed {
            debug!("Updater {} is not batched", id);
        }
        removed
    }

    fn insert(&mut self, time: JulianDate, updater: Rc<dyn GroundGeometryUpdater>) -> BatchId {
        let material = updater.fill_material_property().snapshot();
        let z_index = updater.z_index(time);

        let index = match self
            .items
            .iter()
            .position(|item| item.key().matches(&material, z_index))
        {
            Some(index) => index,
            None => {
                let id = BatchId(self.next_batch_id);
                self.next_batch_id += 1;
                debug!(
                    "New {} batch {:?} at z-index {}",
                    material.type_name(),
                    id,
                    z_index
                );
                self.items
                    .push(MaterialBatch::new(id, MaterialBatchKey { material, z_index }));
                self.items.len() - 1
            }
        };

        let item = &mut self.items[index];
        item.add(time, updater);
        item.id()
    }

    /// Advance every group by one frame
    ///
    /// Re-batches members whose material or geometry changed, starts rebuilds
    /// for groups whose membership changed, and swaps in finished primitives.
    /// Returns `true` when nothing is outstanding.
    ///
    /// The primitive collection is borrowed mutably for the duration of the call.
    pub fn update(&mut self, time: JulianDate) -> bool {
        let shared = Rc::clone(&self.primitives);
        let mut primitives = shared.borrow_mut();

        self.rebatch_invalidated(time, &mut primitives);

        let mut is_updated = true;
        for item in &mut self.items {
            is_updated &= item.update(
                time,
                &mut primitives,
                &mut self.retired,
                &self.options,
                &mut self.stats,
            );
        }

        let before = self.items.len();
        self.items.retain(|item| !item.is_empty());
        if self.items.len() < before {
            debug!("Dropped {} empty batches", before - self.items.len());
        }

        is_updated &= self.release_superseded(&mut primitives);
        is_updated &= self.drain_retired(&mut primitives);

        self.stats.batch_count = self.items.len();
        is_updated
    }

    fn rebatch_invalidated(&mut self, time: JulianDate, primitives: &mut PrimitiveCollection) {
        let mut index = self.items.len();
        while index > 0 {
            index -= 1;
            if !self.items[index].is_invalidated(time) {
                continue;
            }

            let item = self.items.remove(index);
            let dissolved = item.id();
            self.stats.invalidations += 1;
            debug!("Batch {:?} invalidated, re-batching {} members", dissolved, item.len());

            let (updaters, shown) = item.release(primitives, &mut self.retired, &mut self.stats);
            let mut successors: Vec<BatchId> = Vec::with_capacity(updaters.len());
            for updater in updaters {
                let id = self.insert(time, updater);
                if !successors.contains(&id) {
                    successors.push(id);
                }
            }

            // Anything waiting on the dissolved batch now waits on its heirs
            for superseded in &mut self.superseded {
                superseded.replace_successor(dissolved, &successors);
            }
            if let Some(handle) = shown {
                self.superseded.push(Superseded { handle, successors });
            }
        }
    }

    /// Remove superseded primitives whose successors are all built; returns
    /// whether none remain
    ///
    /// A successor missing from `items` was emptied by [`Self::remove`];
    /// dissolved successors are replaced by their heirs when re-batching.
    fn release_superseded(&mut self, primitives: &mut PrimitiveCollection) -> bool {
        let items = &self.items;
        let stats = &mut self.stats;
        self.superseded.retain(|superseded| {
            let settled = superseded.successors.iter().all(|id| {
                items
                    .iter()
                    .find(|item| item.id() == *id)
                    .map_or(true, |item| item.is_settled(primitives))
            });
            if settled {
                destroy(primitives, superseded.handle, stats);
            }
            !settled
        });
        self.superseded.is_empty()
    }

    /// Poll builds that lost their batch and remove them once finished;
    /// returns whether none remain
    fn drain_retired(&mut self, primitives: &mut PrimitiveCollection) -> bool {
        let stats = &mut self.stats;
        self.retired.retain(|handle| {
            let status = primitives.primitive_mut(*handle).map(|primitive| primitive.update());
            match status {
                Some(PrimitiveStatus::Building) => true,
                Some(_) => {
                    destroy(primitives, *handle, stats);
                    false
                }
                None => false,
            }
        });
        self.retired.is_empty()
    }

    /// Bounds of the geometry built for `updater`
    ///
    /// Writes `result` only when [`BoundingSphereState::Done`] is returned.
    pub fn get_bounding_sphere<U: GroundGeometryUpdater + ?Sized>(
        &self,
        updater: &U,
        result: &mut BoundingSphere,
    ) -> BoundingSphereState {
        let id = updater.id();
        let Some(item) = self.items.iter().find(|item| item.contains(id)) else {
            return BoundingSphereState::Failed;
        };
        let primitives = self.primitives.borrow();
        item.bounding_sphere(id, &primitives, result)
    }

    /// Remove every primitive this batch owns from the collection right away
    ///
    /// Builds in flight are dropped and all groups are forgotten.
    pub fn remove_all_primitives(&mut self) {
        let shared = Rc::clone(&self.primitives);
        let mut primitives = shared.borrow_mut();

        let handles: Vec<PrimitiveHandle> = self
            .items
            .drain(..)
            .flat_map(|item| item.owned_handles().collect::<Vec<_>>())
            .chain(self.superseded.drain(..).map(|superseded| superseded.handle))
            .chain(self.retired.drain(..))
            .collect();
        for handle in handles {
            destroy(&mut primitives, handle, &mut self.stats);
        }
        self.stats.batch_count = 0;
        debug!("Removed all ground polyline primitives");
    }
}
