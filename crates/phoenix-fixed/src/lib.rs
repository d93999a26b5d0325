//! Phoenix fixed-point kernel.
//!
//! Deterministic Q-format arithmetic for the simulation core: scalars,
//! reciprocal scalars, 2D vectors, and integer-only trigonometry. Given
//! identical inputs these operations produce bit-identical outputs on any
//! machine -- no floating-point instruction participates in any simulation
//! path. Floats appear only at the construction/inspection boundary
//! (`from_f64`, `to_f64`).
//!
//! # Quick Start
//!
//! ```
//! use phoenix_fixed::prelude::*;
//!
//! let p = Vec2::from_int(3, 4);
//! assert_eq!(p.length(), Distance::from_int(5));
//!
//! let dt = DeltaTime::from_hz(60);
//! let step = Vec2::from_int(60, 0) * dt;
//! assert_eq!(step, Vec2::from_int(1, 0));
//! ```

#![deny(unsafe_code)]

pub mod inv;
pub mod math;
pub mod scalar;
pub mod vec2;

pub use inv::{DeltaTime, InvFixed32};
pub use scalar::{Angle, Distance, Fixed32, Fixed64, Speed, Time, Value, WideValue};
pub use vec2::{Line, Transform, Vec2};

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::inv::{DeltaTime, InvFixed32};
    pub use crate::math;
    pub use crate::scalar::{Angle, Distance, Fixed32, Fixed64, Speed, Time, Value, WideValue};
    pub use crate::vec2::{Line, Transform, Vec2};
}
