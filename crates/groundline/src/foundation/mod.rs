//! Foundation types shared by every layer of the crate
//!
//! Math on the reference ellipsoid, colors, time intervals and logging setup.

pub mod color;
pub mod logging;
pub mod math;
pub mod time;
