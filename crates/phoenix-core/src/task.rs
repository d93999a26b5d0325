//! Thread pool and grouped task queues.
//!
//! A [`ThreadPool`] runs `N` workers over one shared [`MpmcQueue`]. Workers
//! spin with exponential backoff when the queue runs dry, then fall back to
//! yielding; they exit when the pool's `done` flag rises, draining any
//! remaining work first. Submission returns a [`TaskHandle`] the owner can
//! poll or block on.
//!
//! A [`TaskQueue`] collects tasks into ordered *groups*. [`flush`]
//! submits one group at a time and blocks until every handle in the group
//! completes before submitting the next -- a happens-before barrier between
//! groups without any cross-group dependency tracking. Tasks inside one
//! group have no ordering and must touch disjoint memory or atomics.
//!
//! There is no cancellation: once dequeued, a task always runs to
//! completion. `wait_*` timeouts report failure but do not stop work.
//!
//! [`flush`]: TaskQueue::flush

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::containers::MpmcQueue;

// ---------------------------------------------------------------------------
// TaskHandle
// ---------------------------------------------------------------------------

/// Completion flag for one submitted task.
#[derive(Debug, Default)]
pub struct TaskHandle {
    completed: AtomicBool,
}

impl TaskHandle {
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Spin-wait until completion. With a timeout, returns `false` on
    /// expiry; the task keeps running either way.
    pub fn wait_for_completed(&self, max_wait: Option<Duration>) -> bool {
        let start = Instant::now();
        while !self.is_completed() {
            thread::yield_now();
            if let Some(limit) = max_wait {
                if start.elapsed() > limit {
                    return false;
                }
            }
        }
        true
    }

    /// Wait until every handle completes. Returns `false` on timeout.
    pub fn wait_all(handles: &[Arc<TaskHandle>], max_wait: Option<Duration>) -> bool {
        let start = Instant::now();
        loop {
            if handles.iter().all(|h| h.is_completed()) {
                return true;
            }
            if let Some(limit) = max_wait {
                if start.elapsed() > limit {
                    return false;
                }
            }
            thread::yield_now();
        }
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A unit of work plus its completion handle.
pub struct Task {
    work: Box<dyn FnOnce() + Send>,
    handle: Arc<TaskHandle>,
}

impl Task {
    pub fn new(work: impl FnOnce() + Send + 'static) -> Self {
        Self {
            work: Box::new(work),
            handle: Arc::new(TaskHandle::default()),
        }
    }

    pub fn handle(&self) -> Arc<TaskHandle> {
        Arc::clone(&self.handle)
    }

    fn run(self) {
        (self.work)();
        self.handle.completed.store(true, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// ThreadPool
// ---------------------------------------------------------------------------

struct PoolShared {
    queue: MpmcQueue<Task>,
    done: AtomicBool,
    active_workers: AtomicU32,
}

/// Fixed-size worker pool over a bounded MPMC queue.
pub struct ThreadPool {
    shared: Arc<PoolShared>,
    threads: Vec<thread::JoinHandle<()>>,
    num_workers: u32,
}

impl ThreadPool {
    /// Spawn `num_workers` workers with a task queue of `queue_capacity`.
    pub fn new(id: &str, num_workers: u32, queue_capacity: usize) -> Self {
        assert!(num_workers > 0, "a pool needs at least one worker");
        let shared = Arc::new(PoolShared {
            queue: MpmcQueue::with_capacity(queue_capacity),
            done: AtomicBool::new(false),
            active_workers: AtomicU32::new(0),
        });

        let mut threads = Vec::with_capacity(num_workers as usize);
        for worker_id in 0..num_workers {
            let shared = Arc::clone(&shared);
            let name = format!("{id}-{worker_id}");
            threads.push(
                thread::Builder::new()
                    .name(name)
                    .spawn(move || worker_loop(&shared))
                    .expect("spawning pool worker"),
            );
        }

        debug!(id, num_workers, "thread pool started");
        Self {
            shared,
            threads,
            num_workers,
        }
    }

    #[inline]
    pub fn num_workers(&self) -> u32 {
        self.num_workers
    }

    /// Submit work, spinning with backoff while the queue is full.
    pub fn submit(&self, work: impl FnOnce() + Send + 'static) -> Arc<TaskHandle> {
        self.submit_task(Task::new(work))
    }

    /// Submit a prepared task.
    pub fn submit_task(&self, task: Task) -> Arc<TaskHandle> {
        let handle = task.handle();
        let mut task = task;
        let mut attempts = 0u32;
        loop {
            match self.shared.queue.try_enqueue(task) {
                Ok(()) => return handle,
                Err(back) => {
                    task = back;
                    attempts += 1;
                    if attempts < 16 {
                        for _ in 0..(1u32 << attempts.min(6)) {
                            std::hint::spin_loop();
                        }
                    } else {
                        thread::yield_now();
                    }
                }
            }
        }
    }

    /// Whether the queue currently has no pending tasks.
    pub fn is_empty(&self) -> bool {
        self.shared.queue.is_empty()
    }

    /// Wait until the queue is drained and no worker is mid-task.
    pub fn wait_idle(&self, max_wait: Option<Duration>) -> bool {
        let start = Instant::now();
        while !self.is_empty() || self.shared.active_workers.load(Ordering::Acquire) != 0 {
            thread::yield_now();
            if let Some(limit) = max_wait {
                if start.elapsed() > limit {
                    return false;
                }
            }
        }
        true
    }

    /// Signal shutdown and join every worker. Pending tasks are drained.
    pub fn shutdown(&mut self) {
        if self
            .shared
            .done
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            for thread in self.threads.drain(..) {
                let _ = thread.join();
            }
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: &PoolShared) {
    while !shared.done.load(Ordering::Acquire) {
        if let Some(task) = shared.queue.try_dequeue() {
            shared.active_workers.fetch_add(1, Ordering::AcqRel);
            task.run();
            shared.active_workers.fetch_sub(1, Ordering::AcqRel);
            continue;
        }

        // Exponential pause, then yield to the OS scheduler.
        let mut spins = 0u32;
        while !shared.done.load(Ordering::Acquire) {
            if let Some(task) = shared.queue.try_dequeue() {
                shared.active_workers.fetch_add(1, Ordering::AcqRel);
                task.run();
                shared.active_workers.fetch_sub(1, Ordering::AcqRel);
                break;
            }
            if spins < 8 {
                for _ in 0..(1u32 << spins) {
                    std::hint::spin_loop();
                }
            } else {
                thread::yield_now();
            }
            spins += 1;
        }
    }

    // Drain whatever was enqueued before shutdown.
    while let Some(task) = shared.queue.try_dequeue() {
        shared.active_workers.fetch_add(1, Ordering::AcqRel);
        task.run();
        shared.active_workers.fetch_sub(1, Ordering::AcqRel);
    }
}

// ---------------------------------------------------------------------------
// TaskQueue
// ---------------------------------------------------------------------------

/// Ordered groups of tasks flushed through a [`ThreadPool`] with barriers
/// between groups.
pub struct TaskQueue {
    groups: Vec<Vec<Task>>,
    pool: Arc<ThreadPool>,
}

impl TaskQueue {
    pub fn new(pool: Arc<ThreadPool>) -> Self {
        Self {
            groups: Vec::with_capacity(32),
            pool,
        }
    }

    #[inline]
    pub fn num_workers(&self) -> u32 {
        self.pool.num_workers()
    }

    #[inline]
    pub fn pool(&self) -> &Arc<ThreadPool> {
        &self.pool
    }

    /// Number of groups currently queued.
    pub fn pending_groups(&self) -> usize {
        self.groups.iter().filter(|g| !g.is_empty()).count()
    }

    /// Add a task to the current group.
    pub fn enqueue(&mut self, work: impl FnOnce() + Send + 'static) {
        if self.groups.is_empty() {
            self.groups.push(Vec::new());
        }
        self.groups
            .last_mut()
            .expect("just ensured a group exists")
            .push(Task::new(work));
    }

    /// Start a fresh group; subsequent enqueues land in it.
    pub fn begin_group(&mut self) {
        self.groups.push(Vec::new());
    }

    /// Close the current group; the next enqueue starts a new one.
    pub fn end_group(&mut self) {
        self.groups.push(Vec::new());
    }

    /// Split `[0, total)` into chunks of at least `min_chunk` (targeting one
    /// chunk per worker) and enqueue each as a task in its own group.
    pub fn schedule_parallel_range(
        &mut self,
        total: u32,
        min_chunk: u32,
        work: impl Fn(u32, u32) + Send + Sync + Clone + 'static,
    ) {
        self.begin_group();
        let desired = total / self.pool.num_workers().max(1);
        let chunk = desired.max(min_chunk.max(1));
        let mut start = 0;
        while start < total {
            let len = chunk.min(total - start);
            let work = work.clone();
            self.groups
                .last_mut()
                .expect("begin_group pushed a group")
                .push(Task::new(move || work(start, len)));
            start += len;
        }
        self.end_group();
    }

    /// Submit groups in order, waiting for each to finish before the next.
    pub fn flush(&mut self) {
        let groups = std::mem::take(&mut self.groups);
        for group in groups {
            if group.is_empty() {
                continue;
            }
            let mut handles = Vec::with_capacity(group.len());
            for task in group {
                handles.push(self.pool.submit_task(task));
            }
            TaskHandle::wait_all(&handles, None);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    fn pool(workers: u32) -> Arc<ThreadPool> {
        Arc::new(ThreadPool::new("test", workers, 256))
    }

    #[test]
    fn submitted_work_runs() {
        let p = pool(2);
        let counter = Arc::new(AtomicU64::new(0));
        let mut handles = Vec::new();
        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            handles.push(p.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert!(TaskHandle::wait_all(&handles, Some(Duration::from_secs(10))));
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn handle_reports_completion() {
        let p = pool(1);
        let h = p.submit(|| {});
        assert!(h.wait_for_completed(Some(Duration::from_secs(10))));
        assert!(h.is_completed());
    }

    #[test]
    fn wait_idle_waits_for_in_flight_work() {
        let p = pool(2);
        let counter = Arc::new(AtomicU64::new(0));
        for _ in 0..20 {
            let counter = Arc::clone(&counter);
            p.submit(move || {
                thread::sleep(Duration::from_millis(1));
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert!(p.wait_idle(Some(Duration::from_secs(10))));
        assert_eq!(counter.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn shutdown_drains_pending_tasks() {
        let counter = Arc::new(AtomicU64::new(0));
        {
            let mut p = ThreadPool::new("drain", 1, 256);
            for _ in 0..50 {
                let counter = Arc::clone(&counter);
                p.submit(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            }
            p.shutdown();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn groups_are_ordered_by_barriers() {
        let p = pool(4);
        let mut queue = TaskQueue::new(Arc::clone(&p));

        // Each task appends its group index; the barrier between groups
        // means all of group 0 lands before any of group 1.
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        for group in 0..3u32 {
            queue.begin_group();
            for _ in 0..8 {
                let log = Arc::clone(&log);
                queue.enqueue(move || {
                    thread::sleep(Duration::from_micros(100));
                    log.lock().unwrap().push(group);
                });
            }
            queue.end_group();
        }
        queue.flush();

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 24);
        let mut sorted = log.clone();
        sorted.sort_unstable();
        assert_eq!(*log, sorted, "groups interleaved across a barrier");
    }

    #[test]
    fn parallel_range_covers_every_index() {
        let p = pool(4);
        let mut queue = TaskQueue::new(p);
        let hits = Arc::new(AtomicU64::new(0));

        let hits2 = Arc::clone(&hits);
        queue.schedule_parallel_range(1000, 16, move |start, len| {
            for _ in start..start + len {
                hits2.fetch_add(1, Ordering::SeqCst);
            }
        });
        queue.flush();

        assert_eq!(hits.load(Ordering::SeqCst), 1000);
    }

    #[test]
    fn parallel_range_respects_min_chunk() {
        let p = pool(8);
        let mut queue = TaskQueue::new(p);
        let chunks = Arc::new(std::sync::Mutex::new(Vec::new()));

        let chunks2 = Arc::clone(&chunks);
        queue.schedule_parallel_range(100, 64, move |start, len| {
            chunks2.lock().unwrap().push((start, len));
        });
        queue.flush();

        let mut chunks = chunks.lock().unwrap().clone();
        chunks.sort_unstable();
        assert_eq!(chunks, vec![(0, 64), (64, 36)]);
    }

    #[test]
    fn flush_on_empty_queue_is_noop() {
        let p = pool(1);
        let mut queue = TaskQueue::new(p);
        queue.flush();
        assert_eq!(queue.pending_groups(), 0);
    }
}
