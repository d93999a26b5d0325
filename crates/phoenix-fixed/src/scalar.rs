//! Q-format fixed-point scalars.
//!
//! [`Fixed32<B>`] stores `value * 2^B` in an `i32`; [`Fixed64<B>`] does the
//! same in an `i64`. Construction from integers and floats multiplies by
//! `2^B` truncating toward zero; conversions that would leave the storage
//! range *saturate* rather than wrap -- an undetected wrap would produce
//! machine-specific signed-overflow results and break the determinism
//! guarantee.
//!
//! Arithmetic between two scalars of different Q exponents widens to a
//! 64-bit intermediate and returns the scalar with the *larger* exponent:
//!
//! - `Fixed32<A> * Fixed32<B>` = `Fixed32<max(A,B)>` with raw
//!   `(i64(a) * b) >> min(A,B)`
//! - `Fixed32<A> / Fixed32<B>` scales the numerator so the quotient lands
//!   in the wider Q.
//!
//! Equality is tolerant to one unit in the last place after normalizing both
//! sides to a common denominator, so `a + b + c == c + b + a` holds even
//! when truncation orders differ.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

// ---------------------------------------------------------------------------
// Fixed32
// ---------------------------------------------------------------------------

/// A 32-bit fixed-point scalar with `B` fractional bits.
#[derive(Clone, Copy, Default, Serialize, Deserialize)]
pub struct Fixed32<const B: u32>(i32);

impl<const B: u32> Fixed32<B> {
    /// `B` must leave at least two integer bits in the storage type.
    const VALID: () = assert!(B < 30, "Q exponent must be < 30 for i32 storage");

    /// The denominator `2^B`.
    pub const DENOM: i64 = 1 << B;
    /// Number of fractional bits.
    pub const FRAC_BITS: u32 = B;

    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(1 << B);
    pub const MIN: Self = Self(i32::MIN);
    pub const MAX: Self = Self(i32::MAX);
    /// The smallest positive step representable in this Q.
    pub const STEP: Self = Self(1);

    /// Construct from a raw Q value (no scaling).
    #[inline]
    pub const fn from_bits(bits: i32) -> Self {
        let () = Self::VALID;
        Self(bits)
    }

    /// The raw Q value.
    #[inline]
    pub const fn to_bits(self) -> i32 {
        self.0
    }

    /// Construct from an integer, saturating at the storage range.
    #[inline]
    pub const fn from_int(v: i32) -> Self {
        Self(saturate_i64((v as i64) << B))
    }

    /// Construct from an `f64`, multiplying by `2^B` and truncating toward
    /// zero. Out-of-range values saturate.
    #[inline]
    pub fn from_f64(v: f64) -> Self {
        // `as` casts from float to int already saturate in Rust.
        Self((v * Self::DENOM as f64) as i32)
    }

    /// Construct from an `f32`. See [`from_f64`](Self::from_f64).
    #[inline]
    pub fn from_f32(v: f32) -> Self {
        Self::from_f64(v as f64)
    }

    /// The value as an `f64`. Diagnostic only -- never used on sim paths.
    #[inline]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / Self::DENOM as f64
    }

    /// Truncate toward zero to an integer (the C-style conversion).
    #[inline]
    pub const fn to_int(self) -> i32 {
        (self.0 as i64 / Self::DENOM) as i32
    }

    /// Largest integer less than or equal to the value.
    #[inline]
    pub const fn floor_int(self) -> i32 {
        self.0 >> B
    }

    /// Re-express this value in another Q, saturating on narrowing.
    #[inline]
    pub const fn rescale<const TO: u32>(self) -> Fixed32<TO> {
        let v = if TO >= B {
            (self.0 as i64) << (TO - B)
        } else {
            (self.0 as i64) >> (B - TO)
        };
        Fixed32::<TO>(saturate_i64(v))
    }

    /// Widen to 64-bit storage at the same Q.
    #[inline]
    pub const fn widen(self) -> Fixed64<B> {
        Fixed64(self.0 as i64)
    }

    /// Absolute value. `abs(MIN)` saturates to `MAX`.
    #[inline]
    pub const fn abs(self) -> Self {
        if self.0 == i32::MIN {
            Self(i32::MAX)
        } else if self.0 < 0 {
            Self(-self.0)
        } else {
            self
        }
    }

    #[inline]
    pub fn min(self, other: Self) -> Self {
        if self.0 < other.0 {
            self
        } else {
            other
        }
    }

    #[inline]
    pub fn max(self, other: Self) -> Self {
        if self.0 > other.0 {
            self
        } else {
            other
        }
    }

    #[inline]
    pub fn clamp(self, lo: Self, hi: Self) -> Self {
        self.max(lo).min(hi)
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// -1, 0, or +1 in this Q.
    #[inline]
    pub const fn signum(self) -> Self {
        match self.0 {
            0 => Self::ZERO,
            v if v > 0 => Self::ONE,
            _ => Self(-(1 << B)),
        }
    }
}

/// Clamp a 64-bit intermediate into i32 storage.
#[inline]
const fn saturate_i64(v: i64) -> i32 {
    if v > i32::MAX as i64 {
        i32::MAX
    } else if v < i32::MIN as i64 {
        i32::MIN
    } else {
        v as i32
    }
}

impl<const B: u32> fmt::Debug for Fixed32<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fixed32<{}>({})", B, self.to_f64())
    }
}

impl<const B: u32> fmt::Display for Fixed32<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

// -- equality / ordering ----------------------------------------------------

impl<const B: u32> PartialEq for Fixed32<B> {
    /// Tolerant to one unit in the last place.
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        (self.0 as i64 - other.0 as i64).abs() <= 1
    }
}

impl<const B: u32> PartialOrd for Fixed32<B> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.0.cmp(&other.0))
    }
}

// -- same-Q arithmetic ------------------------------------------------------

impl<const B: u32> Add for Fixed32<B> {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self(saturate_i64(self.0 as i64 + rhs.0 as i64))
    }
}

impl<const B: u32> Sub for Fixed32<B> {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self(saturate_i64(self.0 as i64 - rhs.0 as i64))
    }
}

impl<const B: u32> Mul for Fixed32<B> {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self(saturate_i64((self.0 as i64 * rhs.0 as i64) >> B))
    }
}

impl<const B: u32> Div for Fixed32<B> {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        if rhs.0 == 0 {
            // No overflow signal exists in this kernel; a zero denominator
            // saturates in the direction of the numerator.
            return if self.0 >= 0 { Self::MAX } else { Self::MIN };
        }
        Self(saturate_i64(((self.0 as i64) << B) / rhs.0 as i64))
    }
}

impl<const B: u32> Neg for Fixed32<B> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self(saturate_i64(-(self.0 as i64)))
    }
}

impl<const B: u32> AddAssign for Fixed32<B> {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<const B: u32> SubAssign for Fixed32<B> {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl<const B: u32> MulAssign for Fixed32<B> {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl<const B: u32> DivAssign for Fixed32<B> {
    #[inline]
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

// -- mixed-Q arithmetic -----------------------------------------------------

/// Generates the cross-exponent operator set for one `(LO, HI)` pair.
///
/// Results land in the wider Q following the widening rules in the module
/// docs; comparisons normalize to the common denominator first.
macro_rules! impl_mixed_fixed32 {
    ($lo:literal, $hi:literal) => {
        impl Add<Fixed32<$hi>> for Fixed32<$lo> {
            type Output = Fixed32<$hi>;
            #[inline]
            fn add(self, rhs: Fixed32<$hi>) -> Fixed32<$hi> {
                Fixed32::<$hi>::from_bits(saturate_i64(
                    ((self.to_bits() as i64) << ($hi - $lo)) + rhs.to_bits() as i64,
                ))
            }
        }

        impl Add<Fixed32<$lo>> for Fixed32<$hi> {
            type Output = Fixed32<$hi>;
            #[inline]
            fn add(self, rhs: Fixed32<$lo>) -> Fixed32<$hi> {
                rhs + self
            }
        }

        impl Sub<Fixed32<$hi>> for Fixed32<$lo> {
            type Output = Fixed32<$hi>;
            #[inline]
            fn sub(self, rhs: Fixed32<$hi>) -> Fixed32<$hi> {
                self + (-rhs)
            }
        }

        impl Sub<Fixed32<$lo>> for Fixed32<$hi> {
            type Output = Fixed32<$hi>;
            #[inline]
            fn sub(self, rhs: Fixed32<$lo>) -> Fixed32<$hi> {
                self + (-rhs)
            }
        }

        impl Mul<Fixed32<$hi>> for Fixed32<$lo> {
            type Output = Fixed32<$hi>;
            #[inline]
            fn mul(self, rhs: Fixed32<$hi>) -> Fixed32<$hi> {
                Fixed32::<$hi>::from_bits(saturate_i64(
                    (self.to_bits() as i64 * rhs.to_bits() as i64) >> $lo,
                ))
            }
        }

        impl Mul<Fixed32<$lo>> for Fixed32<$hi> {
            type Output = Fixed32<$hi>;
            #[inline]
            fn mul(self, rhs: Fixed32<$lo>) -> Fixed32<$hi> {
                rhs * self
            }
        }

        impl Div<Fixed32<$lo>> for Fixed32<$hi> {
            type Output = Fixed32<$hi>;
            #[inline]
            fn div(self, rhs: Fixed32<$lo>) -> Fixed32<$hi> {
                if rhs.to_bits() == 0 {
                    return if self.to_bits() >= 0 {
                        Fixed32::<$hi>::MAX
                    } else {
                        Fixed32::<$hi>::MIN
                    };
                }
                Fixed32::<$hi>::from_bits(saturate_i64(
                    ((self.to_bits() as i64) << $lo) / rhs.to_bits() as i64,
                ))
            }
        }

        impl Div<Fixed32<$hi>> for Fixed32<$lo> {
            type Output = Fixed32<$hi>;
            #[inline]
            fn div(self, rhs: Fixed32<$hi>) -> Fixed32<$hi> {
                if rhs.to_bits() == 0 {
                    return if self.to_bits() >= 0 {
                        Fixed32::<$hi>::MAX
                    } else {
                        Fixed32::<$hi>::MIN
                    };
                }
                // Numerator needs 2*HI - LO fractional bits before the
                // divide; that can exceed 63 bits, so go through i128.
                let n = (self.to_bits() as i128) << (2 * $hi - $lo);
                let q = n / rhs.to_bits() as i128;
                let q = if q > i64::MAX as i128 {
                    i64::MAX
                } else if q < i64::MIN as i128 {
                    i64::MIN
                } else {
                    q as i64
                };
                Fixed32::<$hi>::from_bits(saturate_i64(q))
            }
        }

        impl PartialEq<Fixed32<$hi>> for Fixed32<$lo> {
            #[inline]
            fn eq(&self, other: &Fixed32<$hi>) -> bool {
                let a = (self.to_bits() as i64) << ($hi - $lo);
                (a - other.to_bits() as i64).abs() <= 1
            }
        }

        impl PartialEq<Fixed32<$lo>> for Fixed32<$hi> {
            #[inline]
            fn eq(&self, other: &Fixed32<$lo>) -> bool {
                other == self
            }
        }

        impl PartialOrd<Fixed32<$hi>> for Fixed32<$lo> {
            #[inline]
            fn partial_cmp(&self, other: &Fixed32<$hi>) -> Option<Ordering> {
                let a = (self.to_bits() as i64) << ($hi - $lo);
                Some(a.cmp(&(other.to_bits() as i64)))
            }
        }

        impl PartialOrd<Fixed32<$lo>> for Fixed32<$hi> {
            #[inline]
            fn partial_cmp(&self, other: &Fixed32<$lo>) -> Option<Ordering> {
                let b = (other.to_bits() as i64) << ($hi - $lo);
                Some((self.to_bits() as i64).cmp(&b))
            }
        }
    };
}

impl_mixed_fixed32!(4, 12);
impl_mixed_fixed32!(4, 16);
impl_mixed_fixed32!(4, 20);
impl_mixed_fixed32!(12, 16);
impl_mixed_fixed32!(12, 20);
impl_mixed_fixed32!(16, 20);

// ---------------------------------------------------------------------------
// Fixed64
// ---------------------------------------------------------------------------

/// A 64-bit fixed-point scalar with `B` fractional bits.
///
/// Used for intermediates that would overflow 32-bit storage: dot products
/// of large distances, circumcircle terms, accumulated areas.
#[derive(Clone, Copy, Default, Serialize, Deserialize)]
pub struct Fixed64<const B: u32>(i64);

impl<const B: u32> Fixed64<B> {
    const VALID: () = assert!(B < 62, "Q exponent must be < 62 for i64 storage");

    pub const DENOM: i64 = 1 << B;
    pub const FRAC_BITS: u32 = B;

    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(1 << B);
    pub const MIN: Self = Self(i64::MIN);
    pub const MAX: Self = Self(i64::MAX);

    #[inline]
    pub const fn from_bits(bits: i64) -> Self {
        let () = Self::VALID;
        Self(bits)
    }

    #[inline]
    pub const fn to_bits(self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn from_int(v: i64) -> Self {
        Self(v << B)
    }

    #[inline]
    pub fn from_f64(v: f64) -> Self {
        Self((v * Self::DENOM as f64) as i64)
    }

    #[inline]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / Self::DENOM as f64
    }

    /// Narrow into 32-bit storage at the same Q, saturating.
    #[inline]
    pub const fn narrow(self) -> Fixed32<B> {
        Fixed32::from_bits(saturate_i64(self.0))
    }

    #[inline]
    pub const fn abs(self) -> Self {
        if self.0 == i64::MIN {
            Self(i64::MAX)
        } else if self.0 < 0 {
            Self(-self.0)
        } else {
            self
        }
    }

    #[inline]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl<const B: u32> fmt::Debug for Fixed64<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fixed64<{}>({})", B, self.to_f64())
    }
}

impl<const B: u32> PartialEq for Fixed64<B> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        (self.0.saturating_sub(other.0)).abs() <= 1
    }
}

impl<const B: u32> PartialOrd for Fixed64<B> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.0.cmp(&other.0))
    }
}

impl<const B: u32> Add for Fixed64<B> {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl<const B: u32> Sub for Fixed64<B> {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl<const B: u32> Mul for Fixed64<B> {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        // 128-bit intermediate: products of two wide values exceed 63 bits.
        let v = (self.0 as i128 * rhs.0 as i128) >> B;
        Self(saturate_i128(v))
    }
}

impl<const B: u32> Div for Fixed64<B> {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        if rhs.0 == 0 {
            return if self.0 >= 0 { Self::MAX } else { Self::MIN };
        }
        let v = ((self.0 as i128) << B) / rhs.0 as i128;
        Self(saturate_i128(v))
    }
}

impl<const B: u32> Neg for Fixed64<B> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self(self.0.saturating_neg())
    }
}

impl<const B: u32> AddAssign for Fixed64<B> {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<const B: u32> SubAssign for Fixed64<B> {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

#[inline]
const fn saturate_i128(v: i128) -> i64 {
    if v > i64::MAX as i128 {
        i64::MAX
    } else if v < i64::MIN as i128 {
        i64::MIN
    } else {
        v as i64
    }
}

// ---------------------------------------------------------------------------
// Named aliases
// ---------------------------------------------------------------------------

/// Generic dimensionless quantity (Q12).
pub type Value = Fixed32<12>;
/// World-space distance (Q12).
pub type Distance = Fixed32<12>;
/// Seconds (Q4).
pub type Time = Fixed32<4>;
/// Distance per second (Q16).
pub type Speed = Fixed32<16>;
/// Radians (Q20).
pub type Angle = Fixed32<20>;
/// Wide dimensionless quantity (Q12, 64-bit storage).
pub type WideValue = Fixed64<12>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_scales_by_denominator() {
        assert_eq!(Value::from_f32(0.5).to_bits(), Value::DENOM as i32 / 2);
        assert_eq!(Value::from_f32(1.0).to_bits(), Value::DENOM as i32);
        assert_eq!(Value::from_int(2).to_bits(), Value::DENOM as i32 * 2);
    }

    #[test]
    fn construction_truncates_toward_zero() {
        // 0.0001 is below one Q12 step.
        assert_eq!(Value::from_f64(0.0001).to_bits(), 0);
        assert_eq!(Value::from_f64(-0.0001).to_bits(), 0);
        assert_eq!(Value::from_f64(123.123).to_int(), 123);
        assert_eq!(Value::from_f64(-123.123).to_int(), -123);
    }

    #[test]
    fn roundtrip_through_bits() {
        for bits in [0, 1, -1, 4096, -4096, i32::MAX, i32::MIN] {
            assert_eq!(Value::from_bits(bits).to_bits(), bits);
        }
    }

    #[test]
    fn addition_and_subtraction() {
        assert_eq!(Value::from_int(1) + Value::from_int(1), Value::from_int(2));
        assert_eq!(
            Value::from_int(10) - Value::from_int(5),
            Value::from_int(5)
        );
        assert_eq!(
            Value::from_int(5) - Value::from_int(10),
            Value::from_int(-5)
        );
    }

    #[test]
    fn multiplication_and_division() {
        assert_eq!(Value::from_int(5) * Value::from_int(2), Value::from_int(10));
        assert_eq!(Value::from_int(10) / Value::from_int(2), Value::from_int(5));
        assert_eq!(Value::from_f32(1.0) / Value::from_f32(2.0), Value::from_f32(0.5));
        assert_eq!(
            Value::from_f32(-1.5) / Value::from_f32(2.0),
            Value::from_f32(-0.75)
        );
    }

    #[test]
    fn saturation_instead_of_wrap() {
        let big = Value::from_bits(i32::MAX);
        assert_eq!((big + big).to_bits(), i32::MAX);
        assert_eq!((big * big).to_bits(), i32::MAX);
        let small = Value::from_bits(i32::MIN);
        assert_eq!((small + small).to_bits(), i32::MIN);
    }

    #[test]
    fn abs_of_min_is_max() {
        assert_eq!(Value::MIN.abs().to_bits(), i32::MAX);
        assert_eq!(Value::from_int(-3).abs(), Value::from_int(3));
        assert_eq!(Value::from_int(3).abs(), Value::from_int(3));
    }

    #[test]
    fn division_by_zero_saturates() {
        assert_eq!(Value::from_int(1) / Value::ZERO, Value::MAX);
        assert_eq!(Value::from_int(-1) / Value::ZERO, Value::MIN);
    }

    #[test]
    fn equality_is_one_ulp_tolerant() {
        let a = Value::from_bits(1000);
        assert_eq!(a, Value::from_bits(1001));
        assert_eq!(a, Value::from_bits(999));
        assert_ne!(a, Value::from_bits(1002));
    }

    #[test]
    fn associativity_within_one_ulp() {
        let a = Value::from_f64(0.37);
        let b = Value::from_f64(12.5);
        let c = Value::from_f64(-3.125);
        assert_eq!((a + b) + c, a + (b + c));
    }

    #[test]
    fn rescale_between_exponents() {
        let v = Value::from_int(3); // Q12
        let s: Speed = v.rescale::<16>();
        assert_eq!(s.to_bits(), 3 << 16);
        let back: Value = s.rescale::<12>();
        assert_eq!(back, v);
    }

    #[test]
    fn rescale_saturates_on_narrowing() {
        // A large Q4 value does not fit in Q20.
        let t = Time::from_bits(i32::MAX);
        let a: Angle = t.rescale::<20>();
        assert_eq!(a.to_bits(), i32::MAX);
    }

    #[test]
    fn mixed_q_multiplication_lands_in_wider_q() {
        // 90 (Q20) / 2 (Q12) = 45 in Q20.
        let angle = Angle::from_int(90);
        let two = Value::from_int(2);
        let half: Angle = angle / two;
        assert_eq!(half, Angle::from_int(45));

        // 5 (Q12) * 2 (Q16) = 10 in Q16.
        let v = Value::from_int(5);
        let s = Speed::from_int(2);
        let p: Speed = v * s;
        assert_eq!(p, Speed::from_int(10));
    }

    #[test]
    fn mixed_q_comparison() {
        assert!(Value::from_int(2) < Speed::from_int(3));
        assert!(Speed::from_int(3) > Value::from_int(2));
        assert_eq!(Value::from_int(2), Speed::from_int(2));
    }

    #[test]
    fn widen_and_narrow() {
        let v = Value::from_int(100);
        let w = v.widen();
        assert_eq!(w.to_bits(), v.to_bits() as i64);
        assert_eq!(w.narrow(), v);

        let big = WideValue::from_bits(i64::MAX);
        assert_eq!(big.narrow().to_bits(), i32::MAX);
    }

    #[test]
    fn wide_multiplication_uses_128_bit_intermediate() {
        let a = WideValue::from_int(1 << 30);
        let b = WideValue::from_int(4);
        assert_eq!((a * b).to_bits(), (1i64 << 32) << 12);
    }

    #[test]
    fn serde_roundtrip_is_raw_bits() {
        let v = Value::from_f64(1.5);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "6144");
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn signum_and_clamp() {
        assert_eq!(Value::from_int(-7).signum(), Value::from_int(-1));
        assert_eq!(Value::ZERO.signum(), Value::ZERO);
        assert_eq!(
            Value::from_int(9).clamp(Value::ZERO, Value::from_int(5)),
            Value::from_int(5)
        );
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn add_commutes(a in -1_000_000i32..1_000_000, b in -1_000_000i32..1_000_000) {
                let (fa, fb) = (Value::from_bits(a), Value::from_bits(b));
                prop_assert_eq!(fa + fb, fb + fa);
            }

            #[test]
            fn abs_is_non_negative(a in any::<i32>()) {
                let v = Value::from_bits(a);
                prop_assert!(v.abs().to_bits() >= 0);
            }

            #[test]
            fn rescale_roundtrip_preserves_in_range(a in -100_000i32..100_000) {
                let v = Value::from_bits(a << 2);
                let up: Speed = v.rescale::<16>();
                let back: Value = up.rescale::<12>();
                prop_assert_eq!(back.to_bits(), v.to_bits());
            }
        }
    }
}
