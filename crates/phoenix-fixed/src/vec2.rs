//! Fixed-point 2D vectors, line segments, and transforms.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use crate::inv::DeltaTime;
use crate::math;
use crate::scalar::{Angle, Distance, Value};

// ---------------------------------------------------------------------------
// Vec2
// ---------------------------------------------------------------------------

/// A 2D vector with [`Distance`] components.
#[derive(Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: Distance,
    pub y: Distance,
}

impl Vec2 {
    pub const ZERO: Self = Self::from_bits(0, 0);
    pub const ONE: Self = Self::from_bits(1 << 12, 1 << 12);
    pub const X_AXIS: Self = Self::from_bits(1 << 12, 0);
    pub const Y_AXIS: Self = Self::from_bits(0, 1 << 12);

    #[inline]
    pub const fn new(x: Distance, y: Distance) -> Self {
        Self { x, y }
    }

    #[inline]
    pub const fn from_bits(x: i32, y: i32) -> Self {
        Self {
            x: Distance::from_bits(x),
            y: Distance::from_bits(y),
        }
    }

    #[inline]
    pub fn from_int(x: i32, y: i32) -> Self {
        Self::new(Distance::from_int(x), Distance::from_int(y))
    }

    #[inline]
    pub fn from_f64(x: f64, y: f64) -> Self {
        Self::new(Distance::from_f64(x), Distance::from_f64(y))
    }

    /// The unit vector at `angle` radians from the X axis.
    pub fn from_angle(angle: Angle) -> Self {
        Self {
            x: Distance::from_bits(math::cos(angle).to_bits()),
            y: Distance::from_bits(math::sin(angle).to_bits()),
        }
    }

    /// Dot product with a widened intermediate.
    pub fn dot(a: Self, b: Self) -> Value {
        let v = (a.x.to_bits() as i64 * b.x.to_bits() as i64
            + a.y.to_bits() as i64 * b.y.to_bits() as i64)
            >> Distance::FRAC_BITS;
        crate::scalar::Fixed64::<12>::from_bits(v).narrow()
    }

    /// Z component of the 3D cross product.
    pub fn cross(a: Self, b: Self) -> Value {
        let v = (a.x.to_bits() as i64 * b.y.to_bits() as i64
            - a.y.to_bits() as i64 * b.x.to_bits() as i64)
            >> Distance::FRAC_BITS;
        crate::scalar::Fixed64::<12>::from_bits(v).narrow()
    }

    /// Squared length as a raw wide Q value (never saturates for
    /// representable coordinates).
    #[inline]
    pub fn length_sq_raw(self) -> i64 {
        (self.x.to_bits() as i64 * self.x.to_bits() as i64
            + self.y.to_bits() as i64 * self.y.to_bits() as i64)
            >> Distance::FRAC_BITS
    }

    /// Euclidean length via Newton square root.
    pub fn length(self) -> Distance {
        Distance::from_bits(math::isqrt_raw(self.length_sq_raw(), Distance::FRAC_BITS) as i32)
    }

    /// Unit-length copy; the zero vector normalizes to itself.
    pub fn normalized(self) -> Self {
        let m = self.length();
        if m.is_zero() {
            return self;
        }
        Self {
            x: self.x / m,
            y: self.y / m,
        }
    }

    #[inline]
    pub fn distance(a: Self, b: Self) -> Distance {
        (a - b).length()
    }

    /// Rotate counterclockwise by `angle` using the trig tables.
    pub fn rotate(self, angle: Angle) -> Self {
        let c = math::cos(angle);
        let s = math::sin(angle);
        Self {
            x: self.x * c - self.y * s,
            y: self.x * s + self.y * c,
        }
    }

    /// The direction of this vector in radians.
    #[inline]
    pub fn as_radians(self) -> Angle {
        math::atan2(self.y, self.x)
    }

    /// Reflect `v` across the line with direction `n`.
    pub fn reflect(n: Self, v: Self) -> Self {
        let nn = Self::dot(n, n);
        if nn.is_zero() {
            return v;
        }
        let two = Value::from_int(2);
        v - n * (two * (Self::dot(v, n) / nn))
    }

    /// Project point `p` onto the line through `s` with normal `n`.
    pub fn project(s: Self, n: Self, p: Self) -> Self {
        let a = Self::dot(p - s, n);
        let b = Self::dot(n, n);
        if b.is_zero() {
            return p;
        }
        let d = a / b;
        Self {
            x: p.x - d * n.x,
            y: p.y - d * n.y,
        }
    }

    /// Component-wise closeness under `threshold`.
    pub fn approx_eq(a: Self, b: Self, threshold: Distance) -> bool {
        (a.x - b.x).abs() < threshold && (a.y - b.y).abs() < threshold
    }
}

impl fmt::Debug for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x.to_f64(), self.y.to_f64())
    }
}

impl Add for Vec2 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl Sub for Vec2 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl Neg for Vec2 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

impl AddAssign for Vec2 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Vec2 {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Mul<Value> for Vec2 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Value) -> Self {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

impl Div<Value> for Vec2 {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Value) -> Self {
        Self {
            x: self.x / rhs,
            y: self.y / rhs,
        }
    }
}

impl Mul<DeltaTime> for Vec2 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: DeltaTime) -> Self {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

// ---------------------------------------------------------------------------
// Line
// ---------------------------------------------------------------------------

/// A segment between two points.
#[derive(Clone, Copy, Default, Debug, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub start: Vec2,
    pub end: Vec2,
}

impl Line {
    #[inline]
    pub const fn new(start: Vec2, end: Vec2) -> Self {
        Self { start, end }
    }

    /// The vector from start to end.
    #[inline]
    pub fn vector(self) -> Vec2 {
        self.end - self.start
    }

    /// The normalized direction from start to end.
    #[inline]
    pub fn direction(self) -> Vec2 {
        self.vector().normalized()
    }

    /// Linear interpolation along the segment.
    pub fn lerp(self, t: Value) -> Vec2 {
        self.start + self.vector() * t
    }

    /// The vector from `point` to the nearest point on the segment.
    pub fn vector_to_line(self, point: Vec2) -> Vec2 {
        let a = point - self.start;
        let b = self.vector();
        let bb = Vec2::dot(b, b);
        if bb.is_zero() {
            return Vec2::ZERO;
        }
        let d = (Vec2::dot(a, b) / bb).clamp(Value::ZERO, Value::ONE);
        -(a - b * d)
    }

    /// Distance from `point` to the segment.
    pub fn distance_to(self, point: Vec2) -> Distance {
        self.vector_to_line(point).length()
    }

    /// Intersection point of two segments, or `None` when they are
    /// parallel, collinear, or do not cross within both spans.
    pub fn intersection(a: Line, b: Line) -> Option<Vec2> {
        // Raw cross products in i128 so large coordinates cannot wrap.
        let rx = (a.end.x - a.start.x).to_bits() as i128;
        let ry = (a.end.y - a.start.y).to_bits() as i128;
        let sx = (b.end.x - b.start.x).to_bits() as i128;
        let sy = (b.end.y - b.start.y).to_bits() as i128;
        let qpx = (b.start.x - a.start.x).to_bits() as i128;
        let qpy = (b.start.y - a.start.y).to_bits() as i128;

        let denom = rx * sy - ry * sx;
        if denom == 0 {
            return None;
        }

        let t_num = qpx * sy - qpy * sx;
        let u_num = qpx * ry - qpy * rx;

        let in_unit = |num: i128| {
            if denom > 0 {
                num >= 0 && num <= denom
            } else {
                num <= 0 && num >= denom
            }
        };
        if !in_unit(t_num) || !in_unit(u_num) {
            return None;
        }

        let px = a.start.x.to_bits() as i128 + t_num * rx / denom;
        let py = a.start.y.to_bits() as i128 + t_num * ry / denom;
        Some(Vec2::from_bits(px as i32, py as i32))
    }
}

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// Position and orientation of a simulated object.
#[derive(Clone, Copy, Default, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec2,
    pub rotation: Angle,
}

impl Transform {
    #[inline]
    pub const fn from_position(position: Vec2) -> Self {
        Self {
            position,
            rotation: Angle::from_bits(0),
        }
    }

    /// Compose a parent transform with a local one.
    pub fn compose(parent: &Transform, local: &Transform) -> Transform {
        Transform {
            position: parent.position + local.position.rotate(parent.rotation),
            rotation: parent.rotation + local.rotation,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f64, y: f64) -> Vec2 {
        Vec2::from_f64(x, y)
    }

    #[test]
    fn basic_algebra() {
        assert_eq!(v(1.0, 2.0) + v(3.0, 4.0), v(4.0, 6.0));
        assert_eq!(v(3.0, 4.0) - v(1.0, 1.0), v(2.0, 3.0));
        assert_eq!(-v(1.0, -2.0), v(-1.0, 2.0));
        assert_eq!(v(1.0, 2.0) * Value::from_int(3), v(3.0, 6.0));
        assert_eq!(v(3.0, 6.0) / Value::from_int(3), v(1.0, 2.0));
    }

    #[test]
    fn dot_and_cross() {
        assert_eq!(Vec2::dot(v(1.0, 0.0), v(0.0, 1.0)), Value::ZERO);
        assert_eq!(Vec2::dot(v(2.0, 3.0), v(4.0, 5.0)), Value::from_int(23));
        assert_eq!(Vec2::cross(Vec2::X_AXIS, Vec2::Y_AXIS), Value::ONE);
        assert_eq!(Vec2::cross(Vec2::Y_AXIS, Vec2::X_AXIS), -Value::ONE);
    }

    #[test]
    fn length_of_pythagorean_triple() {
        assert_eq!(v(3.0, 4.0).length(), Distance::from_int(5));
        assert_eq!(Vec2::ZERO.length(), Distance::ZERO);
        assert_eq!(Vec2::distance(v(1.0, 1.0), v(4.0, 5.0)), Distance::from_int(5));
    }

    #[test]
    fn dot_of_large_distances_does_not_wrap() {
        let big = v(100_000.0, 100_000.0);
        // 2 * 1e10 saturates Value but must not wrap negative.
        assert!(Vec2::dot(big, big) > Value::ZERO);
    }

    #[test]
    fn normalized_has_unit_length() {
        let n = v(10.0, 0.0).normalized();
        assert_eq!(n, Vec2::X_AXIS);
        let d = v(3.0, 4.0).normalized();
        assert!((d.length() - Distance::ONE).abs() < Distance::from_f64(0.01));
        assert_eq!(Vec2::ZERO.normalized(), Vec2::ZERO);
    }

    #[test]
    fn rotation_quarter_turns() {
        let r = Vec2::X_AXIS.rotate(crate::math::PI_2);
        assert!(Vec2::approx_eq(r, Vec2::Y_AXIS, Distance::from_f64(0.01)));
        let r = Vec2::X_AXIS.rotate(crate::math::PI);
        assert!(Vec2::approx_eq(r, -Vec2::X_AXIS, Distance::from_f64(0.01)));
    }

    #[test]
    fn from_angle_matches_as_radians() {
        let a = Angle::from_f64(0.7);
        let u = Vec2::from_angle(a);
        assert!((u.as_radians() - a).abs() < Angle::from_f64(0.01));
    }

    #[test]
    fn reflection_across_axis() {
        // Velocity heading down-right reflects off a horizontal wall.
        let wall = Vec2::X_AXIS;
        let vel = v(1.0, -1.0);
        let out = Vec2::reflect(wall, vel);
        assert!(Vec2::approx_eq(out, v(-1.0, 1.0), Distance::from_f64(0.01)));
    }

    #[test]
    fn vector_to_line_clamps_to_segment() {
        let line = Line::new(v(0.0, 0.0), v(10.0, 0.0));
        // Point above the middle.
        let to = line.vector_to_line(v(5.0, 3.0));
        assert!(Vec2::approx_eq(to, v(0.0, -3.0), Distance::from_f64(0.01)));
        // Point beyond the end clamps to the endpoint.
        let to = line.vector_to_line(v(14.0, 3.0));
        assert!(Vec2::approx_eq(to, v(-4.0, -3.0), Distance::from_f64(0.01)));
        assert_eq!(line.distance_to(v(5.0, 3.0)), Distance::from_int(3));
    }

    #[test]
    fn segment_intersection() {
        let a = Line::new(v(0.0, 0.0), v(10.0, 10.0));
        let b = Line::new(v(0.0, 10.0), v(10.0, 0.0));
        let p = Line::intersection(a, b).expect("segments cross");
        assert!(Vec2::approx_eq(p, v(5.0, 5.0), Distance::from_f64(0.01)));

        // Disjoint segments.
        let c = Line::new(v(20.0, 20.0), v(30.0, 20.0));
        assert!(Line::intersection(a, c).is_none());

        // Parallel segments.
        let d = Line::new(v(0.0, 1.0), v(10.0, 11.0));
        assert!(Line::intersection(a, d).is_none());
    }

    #[test]
    fn lerp_midpoint() {
        let line = Line::new(v(0.0, 0.0), v(4.0, 8.0));
        assert_eq!(line.lerp(Value::from_f64(0.5)), v(2.0, 4.0));
    }

    #[test]
    fn transform_compose_rotates_local_offset() {
        let parent = Transform {
            position: v(10.0, 0.0),
            rotation: crate::math::PI_2,
        };
        let local = Transform::from_position(v(1.0, 0.0));
        let world = Transform::compose(&parent, &local);
        assert!(Vec2::approx_eq(
            world.position,
            v(10.0, 1.0),
            Distance::from_f64(0.01)
        ));
    }

    #[test]
    fn velocity_integration_step() {
        let dt = DeltaTime::from_hz(60);
        let vel = v(60.0, -120.0);
        let step = vel * dt;
        assert!(Vec2::approx_eq(step, v(1.0, -2.0), Distance::from_f64(0.001)));
    }
}
