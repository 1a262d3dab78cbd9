//! RGBA colors with normalized float components

use serde::{Deserialize, Serialize};

/// A color with red, green, blue and alpha in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    /// Red component
    pub red: f32,
    /// Green component
    pub green: f32,
    /// Blue component
    pub blue: f32,
    /// Alpha component
    pub alpha: f32,
}

impl Color {
    /// Opaque white
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    /// Opaque black
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    /// Opaque red
    pub const RED: Self = Self::new(1.0, 0.0, 0.0, 1.0);
    /// Opaque orange (#FFA500)
    pub const ORANGE: Self = Self::new(1.0, 165.0 / 255.0, 0.0, 1.0);
    /// Opaque yellow
    pub const YELLOW: Self = Self::new(1.0, 1.0, 0.0, 1.0);
    /// Fully transparent black
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Create a color from float components
    pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Same color with a different alpha
    pub const fn with_alpha(self, alpha: f32) -> Self {
        Self { alpha, ..self }
    }

    /// Pack into the unsigned byte form used by per-instance color attributes
    pub fn to_bytes(self) -> [u8; 4] {
        let to_byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [
            to_byte(self.red),
            to_byte(self.green),
            to_byte(self.blue),
            to_byte(self.alpha),
        ]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}
