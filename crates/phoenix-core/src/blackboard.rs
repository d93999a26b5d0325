//! Fixed-capacity blackboard: flat `(u64 key, i64 value)` storage.
//!
//! Key layout packs three addressable parts:
//!
//! ```text
//! [ 24-bit hi | 8-bit type | 32-bit lo ]
//!   bits 40+    bits 32-39   bits 0-31
//! ```
//!
//! `lo == 0` marks an empty slot, so a live key's lo part must be nonzero
//! (it is a hash in practice). Between ticks the board is sorted by full
//! key; queries filter on any subset of (lo, hi, type) with `None` as the
//! don't-care sentinel, and hi-anchored queries binary-search the sorted
//! run instead of scanning.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::name::Name;
use phoenix_fixed::{Angle, Distance, Speed, Time, Value, Vec2};

pub type BlackboardKey = u64;
pub type BlackboardValue = i64;

// ---------------------------------------------------------------------------
// Key packing
// ---------------------------------------------------------------------------

pub mod key {
    use super::BlackboardKey;

    pub const HI_SHIFT: u32 = 40;
    pub const TYPE_SHIFT: u32 = 32;
    pub const LO_MASK: u64 = 0xFFFF_FFFF;
    pub const HI_MASK: u64 = 0xFF_FFFF << HI_SHIFT;
    pub const TYPE_MASK: u64 = 0xFF << TYPE_SHIFT;

    #[inline]
    pub const fn lo(key: BlackboardKey) -> u32 {
        (key & LO_MASK) as u32
    }

    #[inline]
    pub const fn hi(key: BlackboardKey) -> u32 {
        ((key & HI_MASK) >> HI_SHIFT) as u32
    }

    #[inline]
    pub const fn type_tag(key: BlackboardKey) -> u8 {
        ((key & TYPE_MASK) >> TYPE_SHIFT) as u8
    }

    /// Pack (lo, hi, type) into one key. `hi` keeps its low 24 bits.
    #[inline]
    pub const fn create(lo: u32, hi: u32, type_tag: u8) -> BlackboardKey {
        (lo as u64)
            | (((hi as u64) << HI_SHIFT) & HI_MASK)
            | (((type_tag as u64) << TYPE_SHIFT) & TYPE_MASK)
    }

    /// Replace the type part.
    #[inline]
    pub const fn with_type(key: BlackboardKey, type_tag: u8) -> BlackboardKey {
        (key & !TYPE_MASK) | (((type_tag as u64) << TYPE_SHIFT) & TYPE_MASK)
    }

    /// Fold another value into the lo hash part.
    #[inline]
    pub const fn combine_lo(key: BlackboardKey, value: u32) -> BlackboardKey {
        let new_lo = crate::hash::fnv1a32_combine(lo(key), value);
        create(new_lo, hi(key), type_tag(key))
    }
}

// ---------------------------------------------------------------------------
// Typed values
// ---------------------------------------------------------------------------

/// Type tags carried in the key's type byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ValueType {
    Unknown = 0,
    Bool = 1,
    U32 = 2,
    I32 = 3,
    Name = 4,
    Color = 5,
    Value = 21,
    Distance = 23,
    Time = 24,
    Angle = 25,
    Speed = 26,
    Vec2 = 27,
}

/// Conversion between a typed quantity and the stored `i64`.
pub trait BlackboardConvert: Sized {
    const TYPE_TAG: ValueType;
    fn to_stored(self) -> BlackboardValue;
    fn from_stored(raw: BlackboardValue) -> Self;
}

impl BlackboardConvert for bool {
    const TYPE_TAG: ValueType = ValueType::Bool;
    fn to_stored(self) -> i64 {
        self as i64
    }
    fn from_stored(raw: i64) -> Self {
        raw != 0
    }
}

impl BlackboardConvert for u32 {
    const TYPE_TAG: ValueType = ValueType::U32;
    fn to_stored(self) -> i64 {
        self as i64
    }
    fn from_stored(raw: i64) -> Self {
        raw as u32
    }
}

impl BlackboardConvert for i32 {
    const TYPE_TAG: ValueType = ValueType::I32;
    fn to_stored(self) -> i64 {
        self as i64
    }
    fn from_stored(raw: i64) -> Self {
        raw as i32
    }
}

impl BlackboardConvert for Name {
    const TYPE_TAG: ValueType = ValueType::Name;
    fn to_stored(self) -> i64 {
        self.hash() as i64
    }
    fn from_stored(raw: i64) -> Self {
        Name::from_hash(raw as u32)
    }
}

macro_rules! impl_fixed_convert {
    ($ty:ty, $tag:expr) => {
        impl BlackboardConvert for $ty {
            const TYPE_TAG: ValueType = $tag;
            fn to_stored(self) -> i64 {
                self.to_bits() as i64
            }
            fn from_stored(raw: i64) -> Self {
                <$ty>::from_bits(raw as i32)
            }
        }
    };
}

impl_fixed_convert!(Value, ValueType::Value);
impl_fixed_convert!(Time, ValueType::Time);
impl_fixed_convert!(Angle, ValueType::Angle);
impl_fixed_convert!(Speed, ValueType::Speed);

impl BlackboardConvert for Vec2 {
    const TYPE_TAG: ValueType = ValueType::Vec2;
    fn to_stored(self) -> i64 {
        ((self.x.to_bits() as u32 as i64) << 32) | (self.y.to_bits() as u32 as i64)
    }
    fn from_stored(raw: i64) -> Self {
        Vec2::new(
            Distance::from_bits((raw >> 32) as i32),
            Distance::from_bits(raw as i32),
        )
    }
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// A wildcardable key filter: `None` in any field matches everything.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyQuery {
    pub lo: Option<u32>,
    pub hi: Option<u32>,
    pub type_tag: Option<u8>,
}

impl KeyQuery {
    pub fn exact(key: BlackboardKey) -> Self {
        Self {
            lo: Some(key::lo(key)),
            hi: Some(key::hi(key)),
            type_tag: Some(key::type_tag(key)),
        }
    }

    /// Everything under one hi part (e.g. all rows of one entity).
    pub fn for_hi(hi: u32) -> Self {
        Self {
            lo: None,
            hi: Some(hi),
            type_tag: None,
        }
    }

    pub fn with_type(mut self, type_tag: ValueType) -> Self {
        self.type_tag = Some(type_tag as u8);
        self
    }

    pub fn matches(&self, key: BlackboardKey) -> bool {
        if key::lo(key) == 0 {
            return false;
        }
        if let Some(lo) = self.lo {
            if key::lo(key) != lo {
                return false;
            }
        }
        if let Some(hi) = self.hi {
            if key::hi(key) != hi {
                return false;
            }
        }
        if let Some(t) = self.type_tag {
            if key::type_tag(key) != t {
                return false;
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Blackboard
// ---------------------------------------------------------------------------

/// Fixed-capacity key/value store, sorted between ticks.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Blackboard {
    entries: Vec<(BlackboardKey, BlackboardValue)>,
    capacity: usize,
    sorted: bool,
    #[serde(skip)]
    warned_full: bool,
}

impl Blackboard {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            sorted: true,
            warned_full: false,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Insert or overwrite the raw value at `key`. Keys with a zero lo part
    /// are rejected (zero lo means "empty"). Returns `false` when full.
    pub fn set_raw(&mut self, key: BlackboardKey, value: BlackboardValue) -> bool {
        if key::lo(key) == 0 {
            return false;
        }
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
            return true;
        }
        if self.is_full() {
            if !self.warned_full {
                self.warned_full = true;
                warn!(capacity = self.capacity, "blackboard exhausted");
            }
            return false;
        }
        self.entries.push((key, value));
        self.sorted = false;
        true
    }

    /// Typed insert; the key's type byte is forced to the value's tag.
    pub fn set<T: BlackboardConvert>(&mut self, key: BlackboardKey, value: T) -> bool {
        self.set_raw(key::with_type(key, T::TYPE_TAG as u8), value.to_stored())
    }

    pub fn get_raw(&self, key: BlackboardKey) -> Option<BlackboardValue> {
        if self.sorted {
            let index = self.entries.binary_search_by_key(&key, |(k, _)| *k).ok()?;
            return Some(self.entries[index].1);
        }
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }

    /// Typed read; fails when the slot holds a different type tag.
    pub fn get<T: BlackboardConvert>(&self, key: BlackboardKey) -> Option<T> {
        self.get_raw(key::with_type(key, T::TYPE_TAG as u8))
            .map(T::from_stored)
    }

    pub fn remove(&mut self, key: BlackboardKey) -> bool {
        if let Some(index) = self.entries.iter().position(|(k, _)| *k == key) {
            self.entries.swap_remove(index);
            self.sorted = false;
            true
        } else {
            false
        }
    }

    /// Remove every entry matching `query`. Returns the count removed.
    pub fn remove_matching(&mut self, query: KeyQuery) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| !query.matches(*k));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.sorted = false;
        }
        removed
    }

    /// Sort by full key. Called between ticks so in-tick reads can binary
    /// search on the hi prefix.
    pub fn sort(&mut self) {
        if !self.sorted {
            self.entries.sort_unstable_by_key(|(k, _)| *k);
            self.sorted = true;
        }
    }

    /// Visit entries matching `query` in storage order. After [`sort`](Self::sort),
    /// hi-anchored queries narrow to the sorted run first.
    pub fn for_each_matching(
        &self,
        query: KeyQuery,
        mut visit: impl FnMut(BlackboardKey, BlackboardValue),
    ) {
        if self.sorted {
            if let Some(hi) = query.hi {
                // All keys with this hi form one contiguous sorted run.
                let lo_bound = key::create(0, hi, 0);
                let hi_bound = key::create(u32::MAX, hi, u8::MAX);
                let start = self.entries.partition_point(|(k, _)| *k < lo_bound);
                for (k, v) in &self.entries[start..] {
                    if *k > hi_bound {
                        break;
                    }
                    if query.matches(*k) {
                        visit(*k, *v);
                    }
                }
                return;
            }
        }
        for (k, v) in &self.entries {
            if query.matches(*k) {
                visit(*k, *v);
            }
        }
    }

    pub fn entries(&self) -> &[(BlackboardKey, BlackboardValue)] {
        &self.entries
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
