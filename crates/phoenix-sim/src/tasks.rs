//! Per-world task scheduling.
//!
//! [`WorldTaskQueue`] collects world-scoped tasks into ordered groups and
//! drains them through the shared thread pool at [`flush`] time. Groups
//! are separated by barriers (see [`phoenix_core::task::TaskQueue`]);
//! tasks inside one group run concurrently and must touch disjoint memory
//! or atomics.
//!
//! # Safety
//!
//! Tasks receive a [`WorldCell`]: a lifetime-erased pointer to the world
//! being flushed. This is sound because `flush` takes `&mut World` --
//! excluding every other access for its duration -- and does not return
//! until the pool has finished every submitted group, so the pointer never
//! outlives the borrow. Mutable block access through the cell
//! ([`WorldCell::get_block_mut`]) is `unsafe`: the task-group discipline
//! (disjoint writes within a group) is the caller's promise, checked in
//! debug builds by write-set tracking at group close.
//!
//! [`flush`]: WorldTaskQueue::flush

use std::sync::Arc;

use phoenix_core::task::{TaskQueue, ThreadPool};
use phoenix_core::Name;

use crate::block::BlockType;
use crate::world::World;

// ---------------------------------------------------------------------------
// RawRef
// ---------------------------------------------------------------------------

/// A copyable raw reference to a component or block field, captured during
/// a populate pass and dereferenced by later pipeline stages in the same
/// tick.
///
/// Validity window: from capture until the next structural change
/// (acquire/release/compact) of the storage it points into. The
/// orchestrator guarantees structural changes happen only outside parallel
/// regions.
pub struct RawRef<T>(*mut T);

impl<T> Clone for RawRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for RawRef<T> {}

impl<T> Default for RawRef<T> {
    fn default() -> Self {
        Self(std::ptr::null_mut())
    }
}

// Safety: RawRef is a plain address; the pipeline discipline (disjoint
// writes within a task group, barriers between groups) governs access.
unsafe impl<T: Send> Send for RawRef<T> {}
unsafe impl<T: Sync> Sync for RawRef<T> {}

impl<T> RawRef<T> {
    #[inline]
    pub fn new(target: &mut T) -> Self {
        Self(target as *mut T)
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }

    /// Dereference mutably.
    ///
    /// # Safety
    ///
    /// The referent must still be alive (no structural change since
    /// capture) and not concurrently accessed except through the
    /// task-group discipline.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get<'a>(self) -> &'a mut T {
        debug_assert!(!self.0.is_null());
        unsafe { &mut *self.0 }
    }

    /// Dereference for reading.
    ///
    /// # Safety
    ///
    /// The referent must still be alive and not concurrently written.
    #[inline]
    pub unsafe fn get_ref<'a>(self) -> &'a T {
        debug_assert!(!self.0.is_null());
        unsafe { &*self.0 }
    }
}

impl<T> std::fmt::Debug for RawRef<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawRef({:?})", self.0)
    }
}

// ---------------------------------------------------------------------------
// WorldCell
// ---------------------------------------------------------------------------

/// Lifetime-erased world access handed to tasks during a flush.
#[derive(Clone, Copy)]
pub struct WorldCell {
    world: *mut World,
}

// Safety: see the module docs -- the cell only exists while `flush` holds
// `&mut World` and blocks on task completion.
unsafe impl Send for WorldCell {}
unsafe impl Sync for WorldCell {}

impl WorldCell {
    fn new(world: &mut World) -> Self {
        Self { world }
    }

    /// Shared access to the world.
    #[inline]
    pub fn world(&self) -> &World {
        // Safety: valid for the flush duration per the module contract.
        unsafe { &*self.world }
    }

    /// Shared block access (interior atomics make scratch appends safe).
    #[inline]
    pub fn get_block<T: BlockType>(&self) -> Option<&T> {
        self.world().get_block::<T>()
    }

    /// Exclusive block access from a task.
    ///
    /// # Safety
    ///
    /// No other task in the same group may touch block `T` mutably, and no
    /// shared reference to `T` obtained through this cell may be live.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_block_mut<T: BlockType>(&self) -> Option<&mut T> {
        unsafe { (*self.world).get_block_mut::<T>() }
    }
}

// ---------------------------------------------------------------------------
// WorldTaskQueue
// ---------------------------------------------------------------------------

type WorldTask = Box<dyn FnOnce(WorldCell) + Send + 'static>;

/// Grouped, barrier-ordered tasks for one world.
pub struct WorldTaskQueue {
    groups: Vec<Vec<WorldTask>>,
    queue: TaskQueue,
    #[cfg(debug_assertions)]
    write_sets: Vec<(u32, Name, bool)>,
}

impl WorldTaskQueue {
    pub fn new(pool: Arc<ThreadPool>) -> Self {
        Self {
            groups: Vec::with_capacity(32),
            queue: TaskQueue::new(pool),
            #[cfg(debug_assertions)]
            write_sets: Vec::new(),
        }
    }

    #[inline]
    pub fn num_workers(&self) -> u32 {
        self.queue.num_workers()
    }

    /// Add a task to the current group.
    pub fn schedule(&mut self, task: impl FnOnce(WorldCell) + Send + 'static) {
        if self.groups.is_empty() {
            self.groups.push(Vec::new());
        }
        self.groups
            .last_mut()
            .expect("just ensured a group exists")
            .push(Box::new(task));
    }

    /// Open a new group boundary.
    pub fn begin_group(&mut self) {
        self.groups.push(Vec::new());
        #[cfg(debug_assertions)]
        self.write_sets.clear();
    }

    /// Close the current group.
    pub fn end_group(&mut self) {
        self.groups.push(Vec::new());
        #[cfg(debug_assertions)]
        self.write_sets.clear();
    }

    /// Chunk `[0, total)` across the pool into its own group.
    pub fn schedule_parallel_range(
        &mut self,
        total: u32,
        min_chunk: u32,
        task: impl Fn(WorldCell, u32, u32) + Send + Sync + 'static,
    ) {
        self.begin_group();
        let task = Arc::new(task);
        let desired = total / self.num_workers().max(1);
        let chunk = desired.max(min_chunk.max(1));
        let mut start = 0;
        while start < total {
            let len = chunk.min(total - start);
            let task = Arc::clone(&task);
            self.groups
                .last_mut()
                .expect("begin_group pushed a group")
                .push(Box::new(move |cell| task(cell, start, len)));
            start += len;
        }
        self.end_group();
    }

    /// Record a parallel job's component access for debug-build conflict
    /// detection within the current group. Two jobs in one group that
    /// mutably alias the same component on the same archetype list are a
    /// scheduling bug.
    pub fn record_access(&mut self, list: u32, component: Name, mutable: bool) {
        #[cfg(debug_assertions)]
        {
            for &(other_list, other_component, other_mutable) in &self.write_sets {
                if other_list == list
                    && other_component == component
                    && (mutable || other_mutable)
                {
                    tracing::error!(
                        list,
                        %component,
                        "parallel tasks in one group alias a component mutably"
                    );
                    debug_assert!(false, "parallel component aliasing within a task group");
                }
            }
            self.write_sets.push((list, component, mutable));
        }
        #[cfg(not(debug_assertions))]
        {
            let _ = (list, component, mutable);
        }
    }

    /// Submit all groups in order, one barrier between each, and block
    /// until every task completes.
    pub fn flush(&mut self, world: &mut World) {
        if self.groups.iter().all(|g| g.is_empty()) {
            self.groups.clear();
            return;
        }
        let cell = WorldCell::new(world);
        let groups = std::mem::take(&mut self.groups);
        for group in groups {
            if group.is_empty() {
                continue;
            }
            self.queue.begin_group();
            for task in group {
                self.queue.enqueue(move || task(cell));
            }
            self.queue.end_group();
        }
        self.queue.flush();
        #[cfg(debug_assertions)]
        self.write_sets.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
