//! Deterministic fixed-point math: trig, square root, angle helpers.
//!
//! Every function here is pure integer arithmetic. The cosine table is built
//! at compile time by const evaluation of an alternating integer series, so
//! inputs with equal bit patterns produce equal outputs on any host --
//! there is no libm, no float, and no platform-dependent rounding anywhere
//! on these paths.
//!
//! - `cos`/`sin`: reduce the angle to `[0, 2π)` by integer modulo in the
//!   Angle Q-domain, derive the quadrant, fold the remainder into
//!   `[0, π/2)`, and read a 1024-entry quarter-wave table with
//!   sign/reflection fixup per quadrant.
//! - `atan2`: 24-iteration CORDIC in vectoring mode against a constant
//!   `atan(2^-i)` table expressed in Angle Q.
//! - `sqrt`: Newton iteration `r <- (r + (x << B)/r) / 2` with the
//!   iteration count derived from the operand's bit width.

use crate::scalar::{Angle, Value};

// ---------------------------------------------------------------------------
// Angle constants (Q20 raw values)
// ---------------------------------------------------------------------------

pub(crate) const PI_RAW: i32 = 3_294_198;
pub(crate) const TWO_PI_RAW: i32 = PI_RAW * 2;
pub(crate) const PI_2_RAW: i32 = PI_RAW / 2;

/// π in the Angle Q-domain.
pub const PI: Angle = Angle::from_bits(PI_RAW);
/// 2π in the Angle Q-domain.
pub const TWO_PI: Angle = Angle::from_bits(TWO_PI_RAW);
/// π/2 in the Angle Q-domain.
pub const PI_2: Angle = Angle::from_bits(PI_2_RAW);
/// π/4 in the Angle Q-domain.
pub const PI_4: Angle = Angle::from_bits(PI_RAW / 4);

const DEG_180_RAW: i64 = 180 << 20;

// ---------------------------------------------------------------------------
// Quarter-wave cosine table
// ---------------------------------------------------------------------------

/// Number of table steps across `[0, π/2)`.
pub const COS_TABLE_LEN: usize = 1024;

/// cos over one quadrant as raw Q12 values, index `i` at angle
/// `i * (π/2) / 1024`. Entry `COS_TABLE_LEN` is included so the sine read
/// `table[LEN - i]` stays in bounds.
static COS_TABLE: [i32; COS_TABLE_LEN + 1] = build_cos_table();

/// Integer-only cosine for table construction: alternating series
/// `1 - x²/2 + x⁴/24 - x⁶/720 + x⁸/40320` evaluated in Q20, truncated to
/// Q12 with round-to-nearest. The first omitted term is below one Q12 step
/// over the whole quadrant.
const fn cos_series_q12(x_q20: i64) -> i32 {
    const ONE_Q20: i64 = 1 << 20;
    let x2 = (x_q20 * x_q20) >> 20;
    let t1 = x2 >> 1;
    let t2 = ((t1 * x2) >> 20) / 12;
    let t3 = ((t2 * x2) >> 20) / 30;
    let t4 = ((t3 * x2) >> 20) / 56;
    let c_q20 = ONE_Q20 - t1 + t2 - t3 + t4;
    ((c_q20 + (1 << 7)) >> 8) as i32
}

const fn build_cos_table() -> [i32; COS_TABLE_LEN + 1] {
    let mut table = [0i32; COS_TABLE_LEN + 1];
    let mut i = 0;
    while i <= COS_TABLE_LEN {
        let x = (PI_2_RAW as i64 * i as i64) / COS_TABLE_LEN as i64;
        table[i] = cos_series_q12(x);
        i += 1;
    }
    table
}

// ---------------------------------------------------------------------------
// CORDIC
// ---------------------------------------------------------------------------

/// `atan(2^-i)` in Q20, one entry per vectoring iteration.
const ARCTAN_TABLE: [i32; 24] = [
    823_550, 486_169, 256_879, 130_396, 65_451, 32_757, 16_382, 8_192, //
    4_096, 2_048, 1_024, 512, 256, 128, 64, 32, //
    16, 8, 4, 2, 1, 0, 0, 0,
];

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Reduce an angle into `[0, 2π)`.
#[inline]
pub fn wrap_angle(angle: Angle) -> Angle {
    Angle::from_bits(angle.to_bits().rem_euclid(TWO_PI_RAW))
}

/// Cosine via the quarter-wave table.
pub fn cos(angle: Angle) -> Value {
    let a = angle.to_bits().rem_euclid(TWO_PI_RAW);
    let quadrant = a / PI_2_RAW;
    let rem = a % PI_2_RAW;
    let idx = (rem as i64 * COS_TABLE_LEN as i64 / PI_2_RAW as i64) as usize;
    let raw = match quadrant {
        0 => COS_TABLE[idx],
        1 => -COS_TABLE[COS_TABLE_LEN - idx],
        2 => -COS_TABLE[idx],
        _ => COS_TABLE[COS_TABLE_LEN - idx],
    };
    Value::from_bits(raw)
}

/// Sine via the quarter-wave table (reads the reflected index).
pub fn sin(angle: Angle) -> Value {
    let a = angle.to_bits().rem_euclid(TWO_PI_RAW);
    let quadrant = a / PI_2_RAW;
    let rem = a % PI_2_RAW;
    let idx = (rem as i64 * COS_TABLE_LEN as i64 / PI_2_RAW as i64) as usize;
    let raw = match quadrant {
        0 => COS_TABLE[COS_TABLE_LEN - idx],
        1 => COS_TABLE[idx],
        2 => -COS_TABLE[COS_TABLE_LEN - idx],
        _ => -COS_TABLE[idx],
    };
    Value::from_bits(raw)
}

/// Quadrant-correct arctangent of `y/x` via CORDIC vectoring.
///
/// Inputs are raw-scaled, so any common Q works as long as both arguments
/// share it; callers pass Distance components.
pub fn atan2(y: crate::scalar::Distance, x: crate::scalar::Distance) -> Angle {
    let mut x = x.to_bits() as i64;
    let mut y = y.to_bits() as i64;
    let mut z: i64 = 0;

    // Fold the left half-plane onto the right, recording the π correction.
    if x < 0 {
        x = -x;
        y = -y;
        if y < 0 {
            z += PI_RAW as i64;
        } else {
            z -= PI_RAW as i64;
        }
    }

    let mut i = 0;
    while i < ARCTAN_TABLE.len() && y != 0 {
        let d: i64 = if y > 0 { 1 } else { -1 };
        let nx = x + d * (y >> i);
        let ny = y - d * (x >> i);
        z += d * ARCTAN_TABLE[i] as i64;
        x = nx;
        y = ny;
        i += 1;
    }

    Angle::from_bits(z as i32)
}

/// Fixed-point Newton square root on a raw Q value.
///
/// `x` and the result share `b` fractional bits. Non-positive input maps
/// to zero.
pub fn isqrt_raw(x: i64, b: u32) -> i64 {
    if x <= 0 {
        return 0;
    }
    let mut r = (x + 1) >> 1;
    let iterations = (64 - x.leading_zeros()) / 2 + 2;
    let mut i = 0;
    while i < iterations {
        if r == 0 {
            break;
        }
        let div = (((x as i128) << b) / r as i128) as i64;
        r = (r + div) >> 1;
        i += 1;
    }
    r
}

/// Square root of a [`Value`].
#[inline]
pub fn sqrt(v: Value) -> Value {
    Value::from_bits(isqrt_raw(v.to_bits() as i64, Value::FRAC_BITS) as i32)
}

/// Degrees to radians, both in the Angle Q-domain.
#[inline]
pub fn deg_to_rad(deg: Angle) -> Angle {
    Angle::from_bits((deg.to_bits() as i64 * PI_RAW as i64 / DEG_180_RAW) as i32)
}

/// Radians to degrees, both in the Angle Q-domain.
#[inline]
pub fn rad_to_deg(rad: Angle) -> Angle {
    Angle::from_bits((rad.to_bits() as i64 * DEG_180_RAW / PI_RAW as i64) as i32)
}

/// The unsigned angular separation of two angles, at most π.
pub fn angle_between(a: Angle, b: Angle) -> Angle {
    let mut d = (a - b).abs();
    if d > PI {
        d = TWO_PI - d;
    }
    d
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn angle(radians: f64) -> Angle {
        Angle::from_f64(radians)
    }

    #[test]
    fn table_endpoints() {
        assert_eq!(COS_TABLE[0], Value::ONE.to_bits());
        // cos(pi/2) collapses to zero at Q12 resolution.
        assert!(COS_TABLE[COS_TABLE_LEN].abs() <= 1);
    }

    #[test]
    fn cosine_cardinal_points() {
        assert_eq!(cos(Angle::ZERO), Value::ONE);
        assert!(cos(PI_2).abs() < Value::from_f64(0.01));
        assert_eq!(cos(PI), -Value::ONE);
        assert!(cos(PI + PI_2).abs() < Value::from_f64(0.01));
    }

    #[test]
    fn sine_cardinal_points() {
        assert!(sin(Angle::ZERO).abs() < Value::from_f64(0.01));
        assert_eq!(sin(PI_2), Value::ONE);
        assert!(sin(PI).abs() < Value::from_f64(0.01));
        assert_eq!(sin(PI + PI_2), -Value::ONE);
    }

    #[test]
    fn negative_angles_wrap() {
        assert_eq!(cos(-PI), -Value::ONE);
        assert_eq!(sin(Angle::ZERO - PI_2), -Value::ONE);
        assert_eq!(cos(TWO_PI + PI), -Value::ONE);
    }

    #[test]
    fn pythagorean_identity_within_lut_epsilon() {
        // Epsilon budget: table quantization is one Q12 step, squared terms
        // double it.
        let eps = Value::from_f64(0.004);
        let mut raw = -TWO_PI_RAW;
        while raw < 2 * TWO_PI_RAW {
            let a = Angle::from_bits(raw);
            let s = sin(a);
            let c = cos(a);
            let mag = s * s + c * c;
            assert!(
                (mag - Value::ONE).abs() <= eps,
                "sin²+cos² = {mag:?} at angle raw {raw}"
            );
            raw += 37_123; // sweep at a non-harmonic stride
        }
    }

    #[test]
    fn atan2_quadrants() {
        let d = crate::scalar::Distance::from_int(1);
        let z = crate::scalar::Distance::ZERO;

        assert_eq!(atan2(z, d), Angle::ZERO);
        assert!((atan2(d, d) - PI_4).abs() < Angle::from_f64(0.001));
        assert!((atan2(d, z) - PI_2).abs() < Angle::from_f64(0.001));
        assert!((atan2(d, -d) - (PI_2 + PI_4)).abs() < Angle::from_f64(0.001));
        assert!((atan2(z, -d) + PI).abs() < Angle::from_f64(0.001));
        assert!((atan2(-d, -d) + (PI_2 + PI_4)).abs() < Angle::from_f64(0.001));
        assert!((atan2(-d, z) + PI_2).abs() < Angle::from_f64(0.001));
        assert!((atan2(-d, d) + PI_4).abs() < Angle::from_f64(0.001));
        assert_eq!(atan2(z, z), Angle::ZERO);
    }

    #[test]
    fn sqrt_exact_on_perfect_squares() {
        for n in [1i32, 2, 4, 8, 16, 32, 64, 128, 1024] {
            let sq = Value::from_int(n * n);
            assert_eq!(sqrt(sq), Value::from_int(n), "sqrt({})", n * n);
        }
        assert_eq!(sqrt(Value::ZERO), Value::ZERO);
        assert_eq!(sqrt(Value::from_int(-4)), Value::ZERO);
    }

    #[test]
    fn sqrt_fractional() {
        let v = sqrt(Value::from_f64(2.25));
        assert!((v - Value::from_f64(1.5)).abs() < Value::from_f64(0.001));
    }

    #[test]
    fn degree_radian_roundtrip() {
        assert_eq!(deg_to_rad(Angle::ZERO), Angle::ZERO);
        assert!((deg_to_rad(Angle::from_int(90)) - PI_2).abs() < Angle::from_f64(0.001));
        assert!((deg_to_rad(Angle::from_int(180)) - PI).abs() < Angle::from_f64(0.001));
        let back = rad_to_deg(deg_to_rad(Angle::from_int(45)));
        assert!((back - Angle::from_int(45)).abs() < Angle::from_f64(0.01));
    }

    #[test]
    fn angle_between_folds_over_pi() {
        let a = angle(0.1);
        let b = angle(6.1);
        let d = angle_between(a, b);
        assert!(d < PI);
        assert!((d - angle(0.283)).abs() < Angle::from_f64(0.01));
    }

    #[test]
    fn trig_is_bit_stable() {
        // The determinism contract in miniature: identical inputs, identical
        // raw outputs, every call.
        for raw in [0, 1, -1, 123_456, -987_654, PI_RAW, TWO_PI_RAW * 3] {
            let a = Angle::from_bits(raw);
            assert_eq!(cos(a).to_bits(), cos(a).to_bits());
            assert_eq!(sin(a).to_bits(), sin(a).to_bits());
        }
    }
}
