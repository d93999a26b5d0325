//! Reciprocal fixed-point scalars.
//!
//! [`InvFixed32<B>`] represents `1/x` by storing the *denominator* `x` in Q
//! form. Multiplying a [`Fixed32`] by an `InvFixed32` is therefore an exact
//! division by the original denominator -- no precision is lost to an
//! intermediate reciprocal, which matters for quantities like the per-step
//! delta time that divide almost every term in the integrator.
//!
//! Identities (all on the represented values):
//!
//! - `Fixed * Inv(x)  == Fixed / x`
//! - `Inv(a) * Inv(b) == Inv(a * b)        == 1/(a*b)`
//! - `Inv(a) + Inv(b) == Inv(a*b/(a+b))    == 1/a + 1/b`
//! - `Inv(a) - Inv(b) == Inv(a*b/(b-a))    == 1/a - 1/b`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

use crate::scalar::{Fixed32, Time};

// ---------------------------------------------------------------------------
// InvFixed32
// ---------------------------------------------------------------------------

/// Reciprocal of a [`Fixed32<B>`]: stores the denominator's raw Q value.
///
/// A zero denominator is the default and behaves as zero in every conversion
/// (there is nothing meaningful to divide by).
#[derive(Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InvFixed32<const B: u32>(i32);

impl<const B: u32> InvFixed32<B> {
    pub const DENOM: i64 = 1 << B;

    pub const ZERO: Self = Self(0);

    /// The reciprocal of `x`.
    #[inline]
    pub const fn of(x: Fixed32<B>) -> Self {
        Self(x.to_bits())
    }

    /// Construct from the denominator's raw Q value.
    #[inline]
    pub const fn from_bits(bits: i32) -> Self {
        Self(bits)
    }

    /// The denominator's raw Q value.
    #[inline]
    pub const fn to_bits(self) -> i32 {
        self.0
    }

    /// The denominator as a [`Fixed32`].
    #[inline]
    pub const fn denominator(self) -> Fixed32<B> {
        Fixed32::from_bits(self.0)
    }

    /// Convert back to a plain fixed value (`1/x`).
    #[inline]
    pub fn to_fixed(self) -> Fixed32<B> {
        if self.0 == 0 {
            return Fixed32::ZERO;
        }
        Fixed32::from_bits(((Self::DENOM * Self::DENOM) / self.0 as i64) as i32)
    }

    /// The represented value as an `f64`. Diagnostic only.
    #[inline]
    pub fn to_f64(self) -> f64 {
        if self.0 == 0 {
            return 0.0;
        }
        Self::DENOM as f64 / self.0 as f64
    }
}

impl<const B: u32> fmt::Debug for InvFixed32<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InvFixed32<{}>(1/{})", B, self.denominator().to_f64())
    }
}

/// `Fixed * Inv(x)` divides by the stored denominator.
impl<const B: u32> Mul<InvFixed32<B>> for Fixed32<B> {
    type Output = Fixed32<B>;
    #[inline]
    fn mul(self, rhs: InvFixed32<B>) -> Fixed32<B> {
        self / rhs.denominator()
    }
}

impl<const B: u32> Mul<Fixed32<B>> for InvFixed32<B> {
    type Output = Fixed32<B>;
    #[inline]
    fn mul(self, rhs: Fixed32<B>) -> Fixed32<B> {
        rhs * self
    }
}

/// `Fixed / Inv(x)` multiplies by the stored denominator.
impl<const B: u32> Div<InvFixed32<B>> for Fixed32<B> {
    type Output = Fixed32<B>;
    #[inline]
    fn div(self, rhs: InvFixed32<B>) -> Fixed32<B> {
        self * rhs.denominator()
    }
}

/// `Inv(a) * Inv(b) == 1/(a*b)`.
impl<const B: u32> Mul for InvFixed32<B> {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self(((self.0 as i64 * rhs.0 as i64) >> B) as i32)
    }
}

/// `1/a + 1/b == 1/(a*b/(a+b))`.
impl<const B: u32> Add for InvFixed32<B> {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        let n = self.0 as i64 + rhs.0 as i64;
        if n == 0 {
            return Self::ZERO;
        }
        let d = self.0 as i64 * rhs.0 as i64;
        Self((d / n) as i32)
    }
}

/// `1/a - 1/b == 1/(a*b/(b-a))`.
impl<const B: u32> Sub for InvFixed32<B> {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        let n = rhs.0 as i64 - self.0 as i64;
        if n == 0 {
            return Self::ZERO;
        }
        let d = self.0 as i64 * rhs.0 as i64;
        Self((d / n) as i32)
    }
}

// -- cross-exponent interaction ---------------------------------------------

/// `Fixed32<A> * Inv(x: Fixed32<B>)` divides by `x` across Q exponents, and
/// `Fixed32<A> / Inv(x)` multiplies, both landing in the wider Q of the
/// underlying operator pair.
macro_rules! impl_inv_cross {
    ($fq:literal, $iq:literal) => {
        impl Mul<InvFixed32<$iq>> for Fixed32<$fq> {
            type Output = <Fixed32<$fq> as Div<Fixed32<$iq>>>::Output;
            #[inline]
            fn mul(self, rhs: InvFixed32<$iq>) -> Self::Output {
                self / rhs.denominator()
            }
        }

        impl Mul<Fixed32<$fq>> for InvFixed32<$iq> {
            type Output = <Fixed32<$fq> as Div<Fixed32<$iq>>>::Output;
            #[inline]
            fn mul(self, rhs: Fixed32<$fq>) -> Self::Output {
                rhs / self.denominator()
            }
        }

        impl Div<InvFixed32<$iq>> for Fixed32<$fq> {
            type Output = <Fixed32<$fq> as Mul<Fixed32<$iq>>>::Output;
            #[inline]
            fn div(self, rhs: InvFixed32<$iq>) -> Self::Output {
                self * rhs.denominator()
            }
        }
    };
}

impl_inv_cross!(12, 4);
impl_inv_cross!(16, 4);
impl_inv_cross!(20, 4);

// ---------------------------------------------------------------------------
// DeltaTime
// ---------------------------------------------------------------------------

/// Per-step simulation delta, stored as the reciprocal of the step rate.
///
/// `Fixed * DeltaTime` divides by the step frequency exactly, so velocities
/// integrate without the rounding loss of a tiny pre-computed `1/hz`.
pub type DeltaTime = InvFixed32<4>;

impl DeltaTime {
    /// Delta time for a fixed-step simulation running at `hz` steps/second.
    #[inline]
    pub const fn from_hz(hz: u32) -> DeltaTime {
        InvFixed32::of(Time::from_int(hz as i32))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
