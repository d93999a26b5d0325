//! Entity tags: intrusive singly-linked lists over a shared pool.
//!
//! Each entity stores only the head index of its tag chain; the nodes live
//! in one per-world [`TagPool`]. A node with [`Name::NONE`] is free; the
//! allocator is a linear scan, which is fine at the pool sizes involved.

use serde::{Deserialize, Serialize};

use phoenix_core::containers::FixedVec;
use phoenix_core::Name;

use crate::entity::Entity;

/// One link in a tag chain.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TagNode {
    pub name: Name,
    pub next: i32,
}

impl Default for TagNode {
    fn default() -> Self {
        Self {
            name: Name::NONE,
            next: Entity::NO_TAGS,
        }
    }
}

/// Shared per-world pool of tag nodes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TagPool {
    nodes: FixedVec<TagNode>,
}

impl TagPool {
    pub fn with_capacity(capacity: usize) -> Self {
        let mut nodes = FixedVec::with_capacity(capacity);
        nodes.resize_default(capacity);
        Self { nodes }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.nodes.capacity()
    }

    /// Number of live tag nodes.
    pub fn live(&self) -> usize {
        self.nodes.iter().filter(|n| !n.name.is_none()).count()
    }

    fn find_free(&self) -> Option<usize> {
        self.nodes.iter().position(|n| n.name.is_none())
    }

    /// Append `name` to the chain rooted at `head`. Duplicates are allowed
    /// (a tag may be stacked). Returns `false` when the pool is exhausted.
    pub fn add_tag(&mut self, head: &mut i32, name: Name) -> bool {
        if name.is_none() {
            return false;
        }
        let Some(free) = self.find_free() else {
            return false;
        };
        self.nodes[free] = TagNode {
            name,
            next: Entity::NO_TAGS,
        };

        if *head == Entity::NO_TAGS {
            *head = free as i32;
            return true;
        }
        // Walk to the tail and splice.
        let mut cursor = *head;
        loop {
            let next = self.nodes[cursor as usize].next;
            if next == Entity::NO_TAGS {
                self.nodes[cursor as usize].next = free as i32;
                return true;
            }
            cursor = next;
        }
    }

    /// Remove the first occurrence of `name` from the chain.
    pub fn remove_tag(&mut self, head: &mut i32, name: Name) -> bool {
        let mut prev = Entity::NO_TAGS;
        let mut cursor = *head;
        while cursor != Entity::NO_TAGS {
            let node = self.nodes[cursor as usize];
            if node.name == name {
                if prev == Entity::NO_TAGS {
                    *head = node.next;
                } else {
                    self.nodes[prev as usize].next = node.next;
                }
                self.nodes[cursor as usize] = TagNode::default();
                return true;
            }
            prev = cursor;
            cursor = node.next;
        }
        false
    }

    /// Free the whole chain.
    pub fn remove_all_tags(&mut self, head: &mut i32) {
        let mut cursor = *head;
        while cursor != Entity::NO_TAGS {
            let next = self.nodes[cursor as usize].next;
            self.nodes[cursor as usize] = TagNode::default();
            cursor = next;
        }
        *head = Entity::NO_TAGS;
    }

    pub fn has_tag(&self, head: i32, name: Name) -> bool {
        self.iter(head).any(|n| n == name)
    }

    /// Iterate the chain's tag names in insertion order.
    pub fn iter(&self, head: i32) -> TagIter<'_> {
        TagIter {
            pool: self,
            cursor: head,
        }
    }
}

pub struct TagIter<'a> {
    pool: &'a TagPool,
    cursor: i32,
}

impl Iterator for TagIter<'_> {
    type Item = Name;

    fn next(&mut self) -> Option<Name> {
        if self.cursor == Entity::NO_TAGS {
            return None;
        }
        let node = self.pool.nodes[self.cursor as usize];
        self.cursor = node.next;
        Some(node.name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
