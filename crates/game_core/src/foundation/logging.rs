//! Logging utilities and structured logging support
//!
//! `init()` installs a tee logger: every record goes to the `env_logger`
//! backend (filtered by `RUST_LOG`) and to every attached [`LogSink`]. The
//! crash reporter's ring buffer is attached this way.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Once, PoisonError, RwLock};

use log::{LevelFilter, Log, Metadata, Record};

pub use log::{debug, error, info, trace, warn};

/// Receiver for log records besides the console backend
pub trait LogSink: Send + Sync {
    /// Handle one record
    fn log(&self, record: &Record);
}

/// Handle returned by [`attach_sink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(u64);

static SINKS: RwLock<Vec<(SinkId, Arc<dyn LogSink>)>> = RwLock::new(Vec::new());
static NEXT_SINK_ID: AtomicU64 = AtomicU64::new(1);
static INIT: Once = Once::new();

struct TeeLogger {
    console: env_logger::Logger,
}

impl Log for TeeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console.enabled(metadata) || metadata.level() <= LevelFilter::Debug
    }

    fn log(&self, record: &Record) {
        if self.console.matches(record) {
            self.console.log(record);
        }
        if record.level() > LevelFilter::Debug {
            return;
        }
        let sinks = SINKS.read().unwrap_or_else(PoisonError::into_inner);
        for (_, sink) in sinks.iter() {
            sink.log(record);
        }
    }

    fn flush(&self) {
        self.console.flush();
    }
}

/// Initialize the logging system.
///
/// Safe to call more than once; only the first call installs the logger.
/// If another logger was installed first, attached sinks stay silent.
pub fn init() {
    INIT.call_once(|| {
        let console = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("info"),
        )
        .build();
        let max_level = console.filter().max(LevelFilter::Debug);
        let logger: &'static TeeLogger = Box::leak(Box::new(TeeLogger { console }));
        if log::set_logger(logger).is_ok() {
            log::set_max_level(max_level);
        }
    });
}

/// Attach a sink that receives every record at DEBUG or above
pub fn attach_sink(sink: Arc<dyn LogSink>) -> SinkId {
    let id = SinkId(NEXT_SINK_ID.fetch_add(1, Ordering::Relaxed));
    SINKS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .push((id, sink));
    id
}

/// Detach a previously attached sink
pub fn detach_sink(id: SinkId) {
    SINKS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .retain(|(sink_id, _)| *sink_id != id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Collect(Mutex<Vec<String>>);

    impl LogSink for Collect {
        fn log(&self, record: &Record) {
            self.0
                .lock()
                .unwrap()
                .push(record.args().to_string());
        }
    }

    #[test]
    fn test_attached_sink_receives_records() {
        init();
        let sink = Arc::new(Collect(Mutex::new(Vec::new())));
        let id = attach_sink(sink.clone());
        log::warn!("tee-logger-probe-1");
        detach_sink(id);
        log::warn!("tee-logger-probe-2");

        let seen = sink.0.lock().unwrap();
        assert!(seen.iter().any(|m| m == "tee-logger-probe-1"));
        assert!(!seen.iter().any(|m| m == "tee-logger-probe-2"));
    }
}
