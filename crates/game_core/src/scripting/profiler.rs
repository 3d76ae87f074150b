//! Boundary call profiler
//!
//! `profile_call!("name")` times the rest of the enclosing scope and adds
//! `(call_count, total_ns)` to a per-thread table. Nothing is recorded
//! while profiling is disabled.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

static ENABLED: AtomicBool = AtomicBool::new(false);

thread_local! {
    static STATS: RefCell<HashMap<&'static str, CallStats>> = RefCell::new(HashMap::new());
}

/// Aggregate timing for one call site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallStats {
    /// Number of completed calls
    pub call_count: u64,
    /// Summed wall time
    pub total_ns: u64,
}

impl CallStats {
    /// Mean microseconds per call
    pub fn average_us(&self) -> f64 {
        if self.call_count == 0 {
            0.0
        } else {
            self.total_ns as f64 / 1000.0 / self.call_count as f64
        }
    }
}

/// Turn recording on or off for every thread
pub fn enable_profiling(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

/// Whether recording is on
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Add one call to this thread's table
pub fn record_call(name: &'static str, duration_ns: u64) {
    if !is_enabled() {
        return;
    }
    STATS.with(|stats| {
        let mut stats = stats.borrow_mut();
        let entry = stats.entry(name).or_default();
        entry.call_count += 1;
        entry.total_ns += duration_ns;
    });
}

/// Forget this thread's stats
pub fn reset_stats() {
    STATS.with(|stats| stats.borrow_mut().clear());
}

/// Stats for one name on this thread
pub fn stats_for(name: &str) -> Option<CallStats> {
    STATS.with(|stats| stats.borrow().get(name).copied())
}

/// The `n` most-called names on this thread, busiest first
pub fn top_calls(n: usize) -> Vec<(&'static str, CallStats)> {
    let mut sorted: Vec<_> = STATS.with(|stats| stats.borrow().iter().map(|(k, v)| (*k, *v)).collect());
    sorted.sort_by(|a, b| b.1.call_count.cmp(&a.1.call_count).then(a.0.cmp(b.0)));
    sorted.truncate(n);
    sorted
}

/// Log the top `n` calls
pub fn print_top_calls(n: usize) {
    let top = top_calls(n);
    log::info!("=== Top {} Lua boundary calls ===", top.len());
    for (i, (name, stats)) in top.iter().enumerate() {
        log::info!(
            "{}. {}: {} calls, {:.2} us/call avg",
            i + 1,
            name,
            stats.call_count,
            stats.average_us()
        );
    }
}

/// Records the time between construction and drop
pub struct ScopedCallTimer {
    name: &'static str,
    start: Option<Instant>,
}

impl ScopedCallTimer {
    /// Start timing `name` if profiling is on
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: is_enabled().then(Instant::now),
        }
    }
}

impl Drop for ScopedCallTimer {
    fn drop(&mut self) {
        if let Some(start) = self.start {
            record_call(self.name, start.elapsed().as_nanos() as u64);
        }
    }
}

/// Time the rest of the enclosing scope under `name`
#[macro_export]
macro_rules! profile_call {
    ($name:expr) => {
        let _profile_call_timer = $crate::scripting::profiler::ScopedCallTimer::new($name);
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    // One test touches the global switch so parallel tests cannot race on it
    #[test]
    fn test_records_only_when_enabled() {
        reset_stats();
        enable_profiling(false);
        {
            profile_call!("disabled_site");
        }
        assert_eq!(stats_for("disabled_site"), None);

        enable_profiling(true);
        for _ in 0..3 {
            profile_call!("hot_site");
        }
        {
            profile_call!("cold_site");
        }
        enable_profiling(false);

        assert_eq!(stats_for("hot_site").map(|s| s.call_count), Some(3));
        let top = top_calls(1);
        assert_eq!(top[0].0, "hot_site");
        reset_stats();
        assert!(top_calls(10).is_empty());
    }
}
