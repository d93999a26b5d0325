//! Actions: the only external input channel into a running simulation.
//!
//! An [`Action`] is a verb name plus eight [`Variant`] payload slots. The
//! driver (CLI, map loader, network layer) queues actions against the
//! session; they are timestamped, sorted, and dispatched at deterministic
//! points so that the simulation stays a pure function of its action
//! stream.

use serde::{Deserialize, Serialize};

use phoenix_core::Name;
use phoenix_fixed::{Distance, Time, Value, Vec2};

/// Payload slots per action.
pub const ACTION_DATA_SLOTS: usize = 8;

// ---------------------------------------------------------------------------
// Variant
// ---------------------------------------------------------------------------

/// One typed payload slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Variant {
    #[default]
    None,
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    Bool(bool),
    Name(Name),
    Fixed32(Value),
    Fixed64(phoenix_fixed::WideValue),
    Vec2(Vec2),
}

impl Variant {
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Variant::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u32(self) -> Option<u32> {
        match self {
            Variant::U32(v) => Some(v),
            Variant::U16(v) => Some(v as u32),
            Variant::U8(v) => Some(v as u32),
            _ => None,
        }
    }

    pub fn as_i64(self) -> Option<i64> {
        match self {
            Variant::I64(v) => Some(v),
            Variant::I32(v) => Some(v as i64),
            Variant::I16(v) => Some(v as i64),
            Variant::I8(v) => Some(v as i64),
            _ => None,
        }
    }

    pub fn as_name(self) -> Option<Name> {
        match self {
            Variant::Name(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_value(self) -> Option<Value> {
        match self {
            Variant::Fixed32(v) => Some(v),
            _ => None,
        }
    }

    /// Fixed32 slots carry Q12, which is both `Value` and `Distance`.
    pub fn as_distance(self) -> Option<Distance> {
        self.as_value()
    }

    pub fn as_time(self) -> Option<Time> {
        self.as_value().map(|v| v.rescale::<4>())
    }

    pub fn as_vec2(self) -> Option<Vec2> {
        match self {
            Variant::Vec2(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Variant::Bool(v)
    }
}

impl From<u32> for Variant {
    fn from(v: u32) -> Self {
        Variant::U32(v)
    }
}

impl From<Name> for Variant {
    fn from(v: Name) -> Self {
        Variant::Name(v)
    }
}

impl From<Value> for Variant {
    fn from(v: Value) -> Self {
        Variant::Fixed32(v)
    }
}

impl From<Vec2> for Variant {
    fn from(v: Vec2) -> Self {
        Variant::Vec2(v)
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// A verb plus its payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub verb: Name,
    pub data: [Variant; ACTION_DATA_SLOTS],
}

impl Action {
    pub fn new(verb: Name) -> Self {
        Self {
            verb,
            data: Default::default(),
        }
    }

    /// Builder-style slot assignment.
    pub fn with(mut self, slot: usize, value: impl Into<Variant>) -> Self {
        if slot < ACTION_DATA_SLOTS {
            self.data[slot] = value.into();
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_fills_slots() {
        let a = Action::new(Name::hashed("spawn_entity"))
            .with(0, Name::hashed("unit"))
            .with(1, Value::from_int(3))
            .with(2, true);
        assert_eq!(a.data[0].as_name(), Some(Name::hashed("unit")));
        assert_eq!(a.data[1].as_value(), Some(Value::from_int(3)));
        assert_eq!(a.data[2].as_bool(), Some(true));
        assert_eq!(a.data[3], Variant::None);
    }

    #[test]
    fn out_of_range_slot_is_ignored() {
        let a = Action::new(Name::hashed("x")).with(99, true);
        assert!(a.data.iter().all(|v| *v == Variant::None));
    }

    #[test]
    fn typed_accessors_reject_mismatches() {
        let v = Variant::Bool(true);
        assert_eq!(v.as_bool(), Some(true));
        assert_eq!(v.as_u32(), None);
        assert_eq!(v.as_name(), None);
        assert_eq!(Variant::None.as_value(), None);
    }

    #[test]
    fn widening_integer_accessors() {
        assert_eq!(Variant::U8(7).as_u32(), Some(7));
        assert_eq!(Variant::I16(-3).as_i64(), Some(-3));
    }

    #[test]
    fn serde_roundtrip() {
        let a = Action::new(Name::hashed("insert_point"))
            .with(0, Vec2::from_int(3, -4))
            .with(1, Value::from_f64(1.5));
        let json = serde_json::to_string(&a).unwrap();
        let back: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(a, back);
    }
}
