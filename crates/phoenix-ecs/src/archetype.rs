//! Archetype definitions.
//!
//! An archetype is an ordered set of components. Members are kept sorted by
//! component name so the definition hash -- an FNV-1a fold of the member
//! names -- is identical no matter what order the components were declared
//! in. Offsets are assigned in sorted order; they matter only as stable
//! column indices here (storage is struct-of-arrays, not interleaved).

use serde::{Deserialize, Serialize};

use phoenix_core::containers::FixedVec;
use phoenix_core::Name;

use crate::component::ComponentRegistry;

/// Most components one archetype may carry.
pub const MAX_COMPONENTS_PER_ARCHETYPE: usize = 8;

/// One member of an archetype definition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSlot {
    pub name: Name,
    pub size: u16,
    pub offset: u16,
}

// ---------------------------------------------------------------------------
// ArchetypeDefinition
// ---------------------------------------------------------------------------

/// A named, hashed set of components.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchetypeDefinition {
    id: Name,
    hash: u32,
    components: FixedVec<ComponentSlot>,
    total_size: u16,
}

impl ArchetypeDefinition {
    /// Build a definition from component names, resolving sizes through the
    /// registry. Fails on unknown components, duplicates, or overflow of
    /// [`MAX_COMPONENTS_PER_ARCHETYPE`].
    pub fn new(id: Name, component_names: &[Name], registry: &ComponentRegistry) -> Option<Self> {
        if component_names.len() > MAX_COMPONENTS_PER_ARCHETYPE {
            return None;
        }
        let mut components = FixedVec::with_capacity(MAX_COMPONENTS_PER_ARCHETYPE);
        for &name in component_names {
            let info = registry.info(name)?;
            if components.iter().any(|slot: &ComponentSlot| slot.name == name) {
                return None;
            }
            components.push(ComponentSlot {
                name,
                size: info.size as u16,
                offset: 0,
            });
        }
        let mut definition = Self {
            id,
            hash: 0,
            components,
            total_size: 0,
        };
        definition.on_components_changed();
        Some(definition)
    }

    /// A copy of this definition with one more component. `None` if the
    /// component is unknown, already present, or the definition is full.
    pub fn with_component(
        &self,
        name: Name,
        registry: &ComponentRegistry,
    ) -> Option<ArchetypeDefinition> {
        if self.contains(name) {
            return None;
        }
        let info = registry.info(name)?;
        let mut next = self.clone();
        next.id = Name::NONE;
        if !next.components.push(ComponentSlot {
            name,
            size: info.size as u16,
            offset: 0,
        }) {
            return None;
        }
        next.on_components_changed();
        Some(next)
    }

    /// A copy of this definition without `name`. `None` if absent.
    pub fn without_component(&self, name: Name) -> Option<ArchetypeDefinition> {
        let index = self.index_of(name)?;
        let mut next = self.clone();
        next.id = Name::NONE;
        next.components.remove(index);
        next.on_components_changed();
        Some(next)
    }

    /// Re-sort members, reassign offsets, and refold the hash. When the
    /// definition has no explicit id, one is generated by combining the
    /// member names.
    fn on_components_changed(&mut self) {
        self.components
            .as_mut_slice()
            .sort_unstable_by_key(|slot| slot.name);

        self.total_size = 0;
        self.hash = 0;
        let generate_id = self.id.is_none_or_empty();
        if generate_id {
            self.id = Name::NONE;
        }

        for i in 0..self.components.len() {
            let slot = &mut self.components[i];
            slot.offset = self.total_size;
            self.total_size += slot.size;
            self.hash = phoenix_core::hash::fnv1a32_combine(self.hash, slot.name.hash());
        }
        if generate_id {
            let mut id = Name::NONE;
            for slot in self.components.iter() {
                id = id.combine(slot.name);
            }
            self.id = id;
        }
    }

    #[inline]
    pub fn id(&self) -> Name {
        self.id
    }

    #[inline]
    pub fn hash(&self) -> u32 {
        self.hash
    }

    #[inline]
    pub fn total_size(&self) -> u16 {
        self.total_size
    }

    #[inline]
    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    #[inline]
    pub fn components(&self) -> &[ComponentSlot] {
        self.components.as_slice()
    }

    pub fn index_of(&self, name: Name) -> Option<usize> {
        self.components.iter().position(|slot| slot.name == name)
    }

    #[inline]
    pub fn contains(&self, name: Name) -> bool {
        self.index_of(name).is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;

    #[derive(Debug, Clone, Default)]
    struct Pos(i32, i32);
    #[derive(Debug, Clone, Default)]
    struct Vel(i32, i32);
    #[derive(Debug, Clone, Default)]
    struct Hp(u8);

    impl Component for Pos {
        fn component_name() -> Name {
            Name::hashed("pos")
        }
    }
    impl Component for Vel {
        fn component_name() -> Name {
            Name::hashed("vel")
        }
    }
    impl Component for Hp {
        fn component_name() -> Name {
            Name::hashed("hp")
        }
    }

    fn registry() -> ComponentRegistry {
        let mut reg = ComponentRegistry::with_capacity(8);
        reg.register::<Pos>();
        reg.register::<Vel>();
        reg.register::<Hp>();
        reg
    }

    #[test]
    fn hash_is_registration_order_independent() {
        let reg = registry();
        let a = ArchetypeDefinition::new(
            Name::hashed("unit"),
            &[Name::hashed("pos"), Name::hashed("vel")],
            &reg,
        )
        .unwrap();
        let b = ArchetypeDefinition::new(
            Name::hashed("unit"),
            &[Name::hashed("vel"), Name::hashed("pos")],
            &reg,
        )
        .unwrap();
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.total_size(), b.total_size());
    }

    #[test]
    fn total_size_is_sum_of_member_sizes() {
        let reg = registry();
        let def = ArchetypeDefinition::new(
            Name::hashed("unit"),
            &[Name::hashed("pos"), Name::hashed("hp")],
            &reg,
        )
        .unwrap();
        assert_eq!(def.total_size() as usize, 8 + 1);
        assert_eq!(def.num_components(), 2);
    }

    #[test]
    fn unknown_component_fails() {
        let reg = registry();
        assert!(
            ArchetypeDefinition::new(Name::hashed("x"), &[Name::hashed("missing")], &reg).is_none()
        );
    }

    #[test]
    fn duplicate_component_fails() {
        let reg = registry();
        assert!(ArchetypeDefinition::new(
            Name::hashed("x"),
            &[Name::hashed("pos"), Name::hashed("pos")],
            &reg
        )
        .is_none());
    }

    #[test]
    fn derived_definitions() {
        let reg = registry();
        let base =
            ArchetypeDefinition::new(Name::hashed("unit"), &[Name::hashed("pos")], &reg).unwrap();

        let extended = base.with_component(Name::hashed("vel"), &reg).unwrap();
        assert!(extended.contains(Name::hashed("vel")));
        assert_ne!(extended.hash(), base.hash());
        // Adding an existing component fails.
        assert!(extended.with_component(Name::hashed("vel"), &reg).is_none());

        let reduced = extended.without_component(Name::hashed("vel")).unwrap();
        assert_eq!(reduced.hash(), base.hash());
        assert!(reduced.without_component(Name::hashed("vel")).is_none());
    }

    #[test]
    fn generated_id_is_stable_across_orderings() {
        let reg = registry();
        let a = ArchetypeDefinition::new(
            Name::NONE,
            &[Name::hashed("pos"), Name::hashed("vel")],
            &reg,
        )
        .unwrap();
        let b = ArchetypeDefinition::new(
            Name::NONE,
            &[Name::hashed("vel"), Name::hashed("pos")],
            &reg,
        )
        .unwrap();
        assert_eq!(a.id(), b.id());
        assert!(!a.id().is_none());
    }

    #[test]
    fn offsets_are_contiguous_in_sorted_order() {
        let reg = registry();
        let def = ArchetypeDefinition::new(
            Name::hashed("unit"),
            &[Name::hashed("pos"), Name::hashed("vel"), Name::hashed("hp")],
            &reg,
        )
        .unwrap();
        let mut expected = 0u16;
        for slot in def.components() {
            assert_eq!(slot.offset, expected);
            expected += slot.size;
        }
    }
}
