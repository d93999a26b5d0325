//! Component registration and type descriptors.
//!
//! Archetype storage is type-erased: each registered component carries a
//! descriptor with its size, alignment, and function pointers for default
//! construction, drop, and clone. Lists drive those through raw pointers;
//! typed access re-checks the `TypeId` so a mismatched cast is impossible.

use std::any::TypeId;

use phoenix_core::containers::FixedMap;
use phoenix_core::Name;

/// A component type storable in archetype lists.
///
/// The name is the stable identity used in archetype definitions, queries,
/// and across snapshots; the Rust type is only consulted for layout and
/// typed access.
pub trait Component: Default + Clone + Send + Sync + 'static {
    fn component_name() -> Name;
}

// ---------------------------------------------------------------------------
// ComponentInfo
// ---------------------------------------------------------------------------

/// Type-erased layout and lifecycle descriptor for one component type.
#[derive(Clone, Copy)]
pub struct ComponentInfo {
    pub name: Name,
    pub size: usize,
    pub align: usize,
    pub type_id: TypeId,
    /// Write a default value into uninitialized storage.
    pub default_fn: unsafe fn(*mut u8),
    /// Drop the value in place.
    pub drop_fn: unsafe fn(*mut u8),
    /// Clone `src` into uninitialized `dst`.
    pub clone_fn: unsafe fn(*const u8, *mut u8),
}

impl ComponentInfo {
    /// Build the descriptor for a concrete component type.
    pub fn of<T: Component>() -> Self {
        unsafe fn default_impl<T: Default>(ptr: *mut u8) {
            unsafe { ptr.cast::<T>().write(T::default()) };
        }
        unsafe fn drop_impl<T>(ptr: *mut u8) {
            unsafe { ptr.cast::<T>().drop_in_place() };
        }
        unsafe fn clone_impl<T: Clone>(src: *const u8, dst: *mut u8) {
            let value = unsafe { &*src.cast::<T>() };
            unsafe { dst.cast::<T>().write(value.clone()) };
        }

        Self {
            name: T::component_name(),
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
            type_id: TypeId::of::<T>(),
            default_fn: default_impl::<T>,
            drop_fn: drop_impl::<T>,
            clone_fn: clone_impl::<T>,
        }
    }
}

impl std::fmt::Debug for ComponentInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentInfo")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("align", &self.align)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Per-world registry of component descriptors, keyed by stable name.
/// Cloned with world snapshots.
#[derive(Debug, Clone)]
pub struct ComponentRegistry {
    infos: FixedMap<Name, ComponentInfo>,
}

impl ComponentRegistry {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            infos: FixedMap::with_capacity(capacity),
        }
    }

    /// Register `T` under its component name. Re-registration is a no-op.
    /// Returns the component name, or [`Name::NONE`] when the registry is
    /// full.
    pub fn register<T: Component>(&mut self) -> Name {
        let info = ComponentInfo::of::<T>();
        let name = info.name;
        if self.infos.contains_key(&name) {
            return name;
        }
        if !self.infos.insert(name, info) {
            return Name::NONE;
        }
        name
    }

    pub fn info(&self, name: Name) -> Option<&ComponentInfo> {
        self.infos.get(&name)
    }

    pub fn contains(&self, name: Name) -> bool {
        self.infos.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Health(u32);

    impl Component for Health {
        fn component_name() -> Name {
            Name::hashed("health")
        }
    }

    #[test]
    fn descriptor_layout_matches_type() {
        let info = ComponentInfo::of::<Health>();
        assert_eq!(info.size, std::mem::size_of::<Health>());
        assert_eq!(info.align, std::mem::align_of::<Health>());
        assert_eq!(info.name, Name::hashed("health"));
        assert_eq!(info.type_id, TypeId::of::<Health>());
    }

    #[test]
    fn descriptor_functions_roundtrip() {
        let info = ComponentInfo::of::<Health>();
        let mut a = std::mem::MaybeUninit::<Health>::uninit();
        let mut b = std::mem::MaybeUninit::<Health>::uninit();
        #[allow(unsafe_code)]
        unsafe {
            (info.default_fn)(a.as_mut_ptr().cast());
            assert_eq!(a.assume_init_ref(), &Health(0));
            *a.assume_init_mut() = Health(7);
            (info.clone_fn)(a.as_ptr().cast(), b.as_mut_ptr().cast());
            assert_eq!(b.assume_init_ref(), &Health(7));
            (info.drop_fn)(a.as_mut_ptr().cast());
            (info.drop_fn)(b.as_mut_ptr().cast());
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut reg = ComponentRegistry::with_capacity(4);
        let name = reg.register::<Health>();
        assert_eq!(name, Name::hashed("health"));
        assert!(reg.contains(name));
        assert_eq!(reg.len(), 1);
        // Idempotent.
        assert_eq!(reg.register::<Health>(), name);
        assert_eq!(reg.len(), 1);
        assert!(reg.info(Name::hashed("missing")).is_none());
    }

    #[test]
    fn registry_capacity() {
        #[derive(Debug, Clone, Default)]
        struct A;
        #[derive(Debug, Clone, Default)]
        struct B;
        impl Component for A {
            fn component_name() -> Name {
                Name::hashed("a")
            }
        }
        impl Component for B {
            fn component_name() -> Name {
                Name::hashed("b")
            }
        }
        let mut reg = ComponentRegistry::with_capacity(1);
        assert_ne!(reg.register::<A>(), Name::NONE);
        assert_eq!(reg.register::<B>(), Name::NONE);
    }
}
