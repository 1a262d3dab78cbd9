//! Material definitions for polylines
//!
//! A [`MaterialProperty`] describes a material whose fields may vary over
//! time; sampling it yields a [`Material`] value. Each variant compares its
//! own typed fields, so two independently built materials with the same
//! definition are equal.
//!
//! Entities reference materials through a [`MaterialHandle`], a shared cell
//! with a revision counter. Editing a material in place bumps the revision,
//! which is how batches notice that a shared definition changed.

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use super::property::Property;
use crate::foundation::color::Color;
use crate::foundation::time::JulianDate;

/// Default outline width in pixels
pub const DEFAULT_OUTLINE_WIDTH: f64 = 1.0;
/// Default glow strength
pub const DEFAULT_GLOW_POWER: f64 = 0.25;
/// Default glow taper strength
pub const DEFAULT_TAPER_POWER: f64 = 1.0;
/// Default dash length in pixels
pub const DEFAULT_DASH_LENGTH: f64 = 16.0;
/// Default 16-bit dash pattern
pub const DEFAULT_DASH_PATTERN: u16 = 255;

fn sample<T: Clone>(property: Option<&Property<T>>, time: JulianDate, default: T) -> T {
    match property {
        Some(property) => property.value_or(time, default),
        None => default,
    }
}

fn constant<T>(property: Option<&Property<T>>) -> bool {
    super::property::is_constant(property)
}

/// Solid color material
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorMaterialProperty {
    /// Fill color, white when unset
    pub color: Option<Property<Color>>,
}

/// Line with a colored outline
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolylineOutlineMaterialProperty {
    /// Line color, white when unset
    pub color: Option<Property<Color>>,
    /// Outline color, black when unset
    pub outline_color: Option<Property<Color>>,
    /// Outline width in pixels
    pub outline_width: Option<Property<f64>>,
}

impl PolylineOutlineMaterialProperty {
    /// Fully specified constant outline material
    pub fn new(color: Color, outline_width: f64, outline_color: Color) -> Self {
        Self {
            color: Some(color.into()),
            outline_color: Some(outline_color.into()),
            outline_width: Some(outline_width.into()),
        }
    }
}

/// Line with a glow falloff
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolylineGlowMaterialProperty {
    /// Glow color
    pub color: Option<Property<Color>>,
    /// Glow strength as a fraction of line width
    pub glow_power: Option<Property<f64>>,
    /// Taper toward the line ends
    pub taper_power: Option<Property<f64>>,
}

/// Dashed line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolylineDashMaterialProperty {
    /// Dash color
    pub color: Option<Property<Color>>,
    /// Gap color
    pub gap_color: Option<Property<Color>>,
    /// Length of one pattern repetition in pixels
    pub dash_length: Option<Property<f64>>,
    /// 16-bit on/off pattern
    pub dash_pattern: Option<Property<u16>>,
}

/// Line ending in an arrow head
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolylineArrowMaterialProperty {
    /// Arrow color
    pub color: Option<Property<Color>>,
}

/// Time-varying material definition, one variant per material kind
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialProperty {
    /// Solid color
    Color(ColorMaterialProperty),
    /// Outlined line
    PolylineOutline(PolylineOutlineMaterialProperty),
    /// Glowing line
    PolylineGlow(PolylineGlowMaterialProperty),
    /// Dashed line
    PolylineDash(PolylineDashMaterialProperty),
    /// Arrow
    PolylineArrow(PolylineArrowMaterialProperty),
}

impl MaterialProperty {
    /// Constant solid color material
    pub fn color(color: Color) -> Self {
        Self::Color(ColorMaterialProperty {
            color: Some(color.into()),
        })
    }

    /// Outline material with every field at its default
    pub fn polyline_outline() -> Self {
        Self::PolylineOutline(PolylineOutlineMaterialProperty::default())
    }

    /// Name of the material kind
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Color(_) => "Color",
            Self::PolylineOutline(_) => "PolylineOutline",
            Self::PolylineGlow(_) => "PolylineGlow",
            Self::PolylineDash(_) => "PolylineDash",
            Self::PolylineArrow(_) => "PolylineArrow",
        }
    }

    /// Whether no field varies over time
    pub fn is_constant(&self) -> bool {
        match self {
            Self::Color(m) => constant(m.color.as_ref()),
            Self::PolylineOutline(m) => {
                constant(m.color.as_ref())
                    && constant(m.outline_color.as_ref())
                    && constant(m.outline_width.as_ref())
            }
            Self::PolylineGlow(m) => {
                constant(m.color.as_ref())
                    && constant(m.glow_power.as_ref())
                    && constant(m.taper_power.as_ref())
            }
            Self::PolylineDash(m) => {
                constant(m.color.as_ref())
                    && constant(m.gap_color.as_ref())
                    && constant(m.dash_length.as_ref())
                    && constant(m.dash_pattern.as_ref())
            }
            Self::PolylineArrow(m) => constant(m.color.as_ref()),
        }
    }

    /// Sample every field at `time`, filling unset fields with defaults
    pub fn value(&self, time: JulianDate) -> Material {
        match self {
            Self::Color(m) => Material::Color {
                color: sample(m.color.as_ref(), time, Color::WHITE),
            },
            Self::PolylineOutline(m) => Material::PolylineOutline {
                color: sample(m.color.as_ref(), time, Color::WHITE),
                outline_color: sample(m.outline_color.as_ref(), time, Color::BLACK),
                outline_width: sample(m.outline_width.as_ref(), time, DEFAULT_OUTLINE_WIDTH),
            },
            Self::PolylineGlow(m) => Material::PolylineGlow {
                color: sample(m.color.as_ref(), time, Color::WHITE),
                glow_power: sample(m.glow_power.as_ref(), time, DEFAULT_GLOW_POWER),
                taper_power: sample(m.taper_power.as_ref(), time, DEFAULT_TAPER_POWER),
            },
            Self::PolylineDash(m) => Material::PolylineDash {
                color: sample(m.color.as_ref(), time, Color::WHITE),
                gap_color: sample(m.gap_color.as_ref(), time, Color::TRANSPARENT),
                dash_length: sample(m.dash_length.as_ref(), time, DEFAULT_DASH_LENGTH),
                dash_pattern: sample(m.dash_pattern.as_ref(), time, DEFAULT_DASH_PATTERN),
            },
            Self::PolylineArrow(m) => Material::PolylineArrow {
                color: sample(m.color.as_ref(), time, Color::WHITE),
            },
        }
    }

    /// Color to write as a per-instance attribute, for solid color materials
    pub fn instance_color(&self, time: JulianDate) -> Option<Color> {
        match self {
            Self::Color(m) => Some(sample(m.color.as_ref(), time, Color::WHITE)),
            _ => None,
        }
    }
}

impl Default for MaterialProperty {
    fn default() -> Self {
        Self::Color(ColorMaterialProperty::default())
    }
}

impl From<Color> for MaterialProperty {
    fn from(color: Color) -> Self {
        Self::color(color)
    }
}

impl From<PolylineOutlineMaterialProperty> for MaterialProperty {
    fn from(material: PolylineOutlineMaterialProperty) -> Self {
        Self::PolylineOutline(material)
    }
}

/// Material sampled at one time, as handed to the appearance
#[derive(Debug, Clone, PartialEq)]
pub enum Material {
    /// Solid color
    Color {
        /// Fill color
        color: Color,
    },
    /// Outlined line
    PolylineOutline {
        /// Line color
        color: Color,
        /// Outline color
        outline_color: Color,
        /// Outline width in pixels
        outline_width: f64,
    },
    /// Glowing line
    PolylineGlow {
        /// Glow color
        color: Color,
        /// Glow strength
        glow_power: f64,
        /// Taper strength
        taper_power: f64,
    },
    /// Dashed line
    PolylineDash {
        /// Dash color
        color: Color,
        /// Gap color
        gap_color: Color,
        /// Pattern length
        dash_length: f64,
        /// On/off pattern
        dash_pattern: u16,
    },
    /// Arrow
    PolylineArrow {
        /// Arrow color
        color: Color,
    },
}

impl Material {
    /// Name of the material kind
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Color { .. } => "Color",
            Self::PolylineOutline { .. } => "PolylineOutline",
            Self::PolylineGlow { .. } => "PolylineGlow",
            Self::PolylineDash { .. } => "PolylineDash",
            Self::PolylineArrow { .. } => "PolylineArrow",
        }
    }
}

struct MaterialCell {
    property: RefCell<MaterialProperty>,
    revision: Cell<u64>,
}

/// Shared, editable reference to a material definition
///
/// Clones point at the same definition. Equality is by value: two handles are
/// equal when they share a cell or hold equal definitions.
#[derive(Clone)]
pub struct MaterialHandle(Rc<MaterialCell>);

impl MaterialHandle {
    /// Wrap a definition in a new shared cell
    pub fn new(property: impl Into<MaterialProperty>) -> Self {
        Self(Rc::new(MaterialCell {
            property: RefCell::new(property.into()),
            revision: Cell::new(0),
        }))
    }

    /// Borrow the current definition
    ///
    /// # Panics
    /// If called from inside [`Self::update`] on the same material.
    pub fn get(&self) -> Ref<'_, MaterialProperty> {
        self.0.property.borrow()
    }

    /// Clone the current definition
    pub fn snapshot(&self) -> MaterialProperty {
        self.get().clone()
    }

    /// Replace the definition
    pub fn set(&self, property: impl Into<MaterialProperty>) {
        self.update(|current| *current = property.into());
    }

    /// Edit the definition in place
    pub fn update<R>(&self, edit: impl FnOnce(&mut MaterialProperty) -> R) -> R {
        let result = edit(&mut self.0.property.borrow_mut());
        self.0.revision.set(self.0.revision.get() + 1);
        result
    }

    /// Counter bumped by every edit
    pub fn revision(&self) -> u64 {
        self.0.revision.get()
    }

    /// Whether both handles share one cell
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for MaterialHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.get() == *other.get()
    }
}

impl fmt::Debug for MaterialHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaterialHandle")
            .field("property", &*self.get())
            .field("revision", &self.revision())
            .finish()
    }
}

impl Default for MaterialHandle {
    fn default() -> Self {
        Self::new(MaterialProperty::default())
    }
}

impl From<MaterialProperty> for MaterialHandle {
    fn from(property: MaterialProperty) -> Self {
        Self::new(property)
    }
}

impl From<Color> for MaterialHandle {
    fn from(color: Color) -> Self {
        Self::new(color)
    }
}
