//! Profiling seam.
//!
//! The engine annotates zones through this trait and ships a no-op default;
//! an embedding binds its own profiler once at startup. Profiling must
//! never influence simulation state, so the interface is strictly
//! write-only from the core's point of view.

use std::sync::OnceLock;

use crate::color::Color;

/// Sink for profiling annotations.
pub trait Profiler: Send + Sync {
    fn begin_zone(&self, _name: &str) {}
    fn end_zone(&self) {}
    fn text(&self, _text: &str) {}
    fn name(&self, _name: &str) {}
    fn color(&self, _color: Color) {}
    fn value(&self, _value: i64) {}
    fn frame_mark(&self) {}
}

/// The default sink: discards everything.
pub struct NullProfiler;

impl Profiler for NullProfiler {}

static PROFILER: OnceLock<&'static dyn Profiler> = OnceLock::new();
static NULL_PROFILER: NullProfiler = NullProfiler;

/// Install the process-wide profiler. May be called once; later calls are
/// ignored.
pub fn set_profiler(profiler: &'static dyn Profiler) {
    let _ = PROFILER.set(profiler);
}

/// The installed profiler, or the null sink.
pub fn profiler() -> &'static dyn Profiler {
    match PROFILER.get() {
        Some(p) => *p,
        None => &NULL_PROFILER,
    }
}

/// RAII zone guard.
pub struct ProfileZone;

impl ProfileZone {
    #[inline]
    pub fn new(name: &str) -> Self {
        profiler().begin_zone(name);
        ProfileZone
    }
}

impl Drop for ProfileZone {
    fn drop(&mut self) {
        profiler().end_zone();
    }
}
