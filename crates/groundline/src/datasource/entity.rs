//! Entities carrying polyline graphics

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::polyline::PolylineGraphics;
use crate::foundation::time::{JulianDate, TimeIntervalCollection};

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

/// Unique entity identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    /// Allocate a process-unique id
    pub fn next() -> Self {
        Self(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// An object in the scene with an optional polyline
///
/// Mutation goes through `&self` so that updaters holding the entity observe
/// edits. Each kind of edit bumps its own revision counter.
#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    name: Option<String>,
    availability: Option<TimeIntervalCollection<()>>,
    show: Cell<bool>,
    show_revision: Cell<u64>,
    polyline: RefCell<Option<PolylineGraphics>>,
    definition_revision: Cell<u64>,
}

impl Entity {
    /// Create a shown entity with a fresh id and no graphics
    pub fn new() -> Self {
        Self {
            id: EntityId::next(),
            name: None,
            availability: None,
            show: Cell::new(true),
            show_revision: Cell::new(0),
            polyline: RefCell::new(None),
            definition_revision: Cell::new(0),
        }
    }

    /// Attach polyline graphics
    pub fn with_polyline(self, polyline: PolylineGraphics) -> Self {
        *self.polyline.borrow_mut() = Some(polyline);
        self
    }

    /// Restrict the entity to the given intervals
    pub fn with_availability(mut self, availability: TimeIntervalCollection<()>) -> Self {
        self.availability = Some(availability);
        self
    }

    /// Set a display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Entity id
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Display name
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Intervals during which the entity exists; always when `None`
    pub fn availability(&self) -> Option<&TimeIntervalCollection<()>> {
        self.availability.as_ref()
    }

    /// Whether the entity exists at `time`
    pub fn is_available(&self, time: JulianDate) -> bool {
        self.availability
            .as_ref()
            .map_or(true, |availability| availability.contains(time))
    }

    /// Whether the entity is shown
    pub fn is_showing(&self) -> bool {
        self.show.get()
    }

    /// Show or hide the entity
    pub fn set_show(&self, show: bool) {
        if self.show.replace(show) != show {
            self.show_revision.set(self.show_revision.get() + 1);
        }
    }

    /// Counter bumped whenever the show flag flips
    pub fn show_revision(&self) -> u64 {
        self.show_revision.get()
    }

    /// Borrow the polyline graphics
    pub fn polyline(&self) -> Ref<'_, Option<PolylineGraphics>> {
        self.polyline.borrow()
    }

    /// Edit the polyline graphics in place
    pub fn update_polyline<R>(&self, edit: impl FnOnce(&mut Option<PolylineGraphics>) -> R) -> R {
        let result = edit(&mut self.polyline.borrow_mut());
        self.definition_revision
            .set(self.definition_revision.get() + 1);
        result
    }

    /// Counter bumped by every polyline edit
    pub fn definition_revision(&self) -> u64 {
        self.definition_revision.get()
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::new()
    }
}
