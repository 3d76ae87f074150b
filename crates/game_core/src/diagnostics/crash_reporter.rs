//! Crash reports
//!
//! The reporter keeps a ring of recent log lines (attached to the tee
//! logger) and turns them, with a stack trace and build details, into a JSON
//! report. Fatal paths are an unrecovered panic (exit code 1) and, on unix,
//! `SIGABRT`/`SIGSEGV`/`SIGILL`/`SIGFPE` (exit code 128 + signum). Panics
//! inside a recoverable scope are logged and left alone.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ring_sink::{LogEntry, RingBufferSink};
use super::telemetry::{session_id, Telemetry};
use super::{build_type, platform_name};
use crate::core::CrashReporterConfig;
use crate::foundation::logging::{self, SinkId};
use crate::foundation::recovery;

/// Frames shown by [`create_summary`]
const SUMMARY_FRAMES: usize = 5;
/// Log lines shown by [`create_summary`]
const SUMMARY_LOGS: usize = 10;

/// Crash reporter failures
#[derive(Error, Debug)]
pub enum CrashError {
    /// Writing the report failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding failed
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// File output is turned off in the config
    #[error("File output disabled")]
    FileOutputDisabled,
}

/// Everything known about a crash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// `YYYYMMDD_HHMMSS`
    pub id: String,
    /// `YYYY-MM-DDTHH:MM:SS`
    pub timestamp: String,
    /// What triggered the capture
    pub reason: String,
    /// Build identifier
    pub build_id: String,
    /// `Debug` or `Release`
    pub build_type: String,
    /// Operating system family
    pub platform: String,
    /// Capturing thread
    pub thread_id: String,
    /// One entry per frame
    pub stacktrace: Vec<String>,
    /// Recent log lines, oldest first
    pub logs: Vec<LogEntry>,
    /// Values from [`CrashReporter::set_game_context`]
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub game_context: BTreeMap<String, String>,
}

/// Crash capture and persistence
pub struct CrashReporter {
    config: CrashReporterConfig,
    sink: Arc<RingBufferSink>,
    sink_id: Option<SinkId>,
    context: Mutex<BTreeMap<String, String>>,
    telemetry: Mutex<Option<Arc<Telemetry>>>,
    last_json: Mutex<String>,
    handling_fatal: AtomicBool,
}

impl CrashReporter {
    /// Reporter with its ring attached to the logger; installs no handlers
    pub fn new(config: CrashReporterConfig) -> Self {
        let sink = Arc::new(RingBufferSink::new(config.max_log_entries));
        let sink_id = config
            .enabled
            .then(|| logging::attach_sink(Arc::clone(&sink) as Arc<dyn logging::LogSink>));
        Self {
            config,
            sink,
            sink_id,
            context: Mutex::new(BTreeMap::new()),
            telemetry: Mutex::new(None),
            last_json: Mutex::new(String::new()),
            handling_fatal: AtomicBool::new(false),
        }
    }

    /// Build a reporter and, when configured, install the fatal handlers
    pub fn init(config: CrashReporterConfig) -> Arc<Self> {
        let reporter = Arc::new(Self::new(config));
        if reporter.is_enabled() && reporter.config.install_handlers {
            install_panic_hook(Arc::clone(&reporter));
            install_signal_handlers(Arc::clone(&reporter));
            log::info!("Crash reporter installed (build {})", reporter.build_id());
        }
        reporter
    }

    /// Whether capture is on
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// The log ring
    pub fn sink(&self) -> &Arc<RingBufferSink> {
        &self.sink
    }

    /// Telemetry client used for the `crash_report` event
    pub fn set_telemetry(&self, telemetry: Arc<Telemetry>) {
        *self.telemetry.lock().unwrap_or_else(PoisonError::into_inner) = Some(telemetry);
    }

    /// Record a game-specific value carried in every report
    pub fn set_game_context(&self, key: impl Into<String>, value: impl Into<String>) {
        self.context
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    /// Snapshot the current state into a report
    pub fn capture_report(&self, reason: &str, include_stacktrace: bool) -> Report {
        let now = chrono::Local::now();
        Report {
            id: now.format("%Y%m%d_%H%M%S").to_string(),
            timestamp: now.format("%Y-%m-%dT%H:%M:%S").to_string(),
            reason: reason.to_string(),
            build_id: self.build_id().to_string(),
            build_type: build_type().to_string(),
            platform: platform_name().to_string(),
            thread_id: format!("{:?}", std::thread::current().id()),
            stacktrace: if include_stacktrace { capture_stacktrace() } else { Vec::new() },
            logs: self.sink.snapshot(),
            game_context: self
                .context
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }

    /// Pretty JSON for a report; also kept as the last serialized report
    pub fn serialize_report(&self, report: &Report) -> Result<String, CrashError> {
        let text = serde_json::to_string_pretty(report).map_err(|e| CrashError::Serialize(e.to_string()))?;
        self.last_json
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone_from(&text);
        Ok(text)
    }

    /// The most recent [`serialize_report`](Self::serialize_report) output
    pub fn last_serialized_report(&self) -> String {
        self.last_json.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Write `crash_report_<id>.json` into the output directory
    pub fn persist_report(&self, report: &Report) -> Result<PathBuf, CrashError> {
        let text = self.serialize_report(report)?;
        if !self.config.enable_file_output {
            return Err(CrashError::FileOutputDisabled);
        }
        let dir = if self.config.output_dir.is_empty() {
            PathBuf::from("crash_reports")
        } else {
            PathBuf::from(&self.config.output_dir)
        };
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("crash_report_{}.json", report.id));
        std::fs::write(&path, text)?;
        Ok(path)
    }

    /// Capture, announce and persist a fatal event once.
    ///
    /// Later calls while the first is in progress return `None`.
    pub fn handle_fatal(&self, reason: &str) -> Option<PathBuf> {
        if !self.config.enabled || self.handling_fatal.swap(true, Ordering::SeqCst) {
            return None;
        }
        let report = self.capture_report(reason, true);

        let telemetry = self.telemetry.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(telemetry) = telemetry {
            telemetry.record_event(
                "crash_report",
                serde_json::json!({
                    "reason": report.reason,
                    "build_id": report.build_id,
                    "build_type": report.build_type,
                    "platform": report.platform,
                    "session_id": session_id(),
                }),
            );
            telemetry.flush(Duration::from_secs(1));
        }

        match self.persist_report(&report) {
            Ok(path) => {
                log::error!("Crash report captured: {}", path.display());
                Some(path)
            }
            Err(e) => {
                log::error!("Crash report captured ({})", e);
                None
            }
        }
    }

    fn build_id(&self) -> &str {
        if self.config.build_id.is_empty() {
            "dev-local"
        } else {
            &self.config.build_id
        }
    }
}

impl Drop for CrashReporter {
    fn drop(&mut self) {
        if let Some(id) = self.sink_id.take() {
            logging::detach_sink(id);
        }
    }
}

/// Short human-readable form of a report
pub fn create_summary(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Crash Report ===");
    let _ = writeln!(out, "ID: {}", report.id);
    let _ = writeln!(out, "Time: {}", report.timestamp);
    let _ = writeln!(out, "Reason: {}", report.reason);
    let _ = writeln!(out, "Build: {} ({})", report.build_id, report.build_type);
    let _ = writeln!(out, "Platform: {}", report.platform);

    if !report.stacktrace.is_empty() {
        let _ = writeln!(out, "\n--- Stack Trace (top {}) ---", SUMMARY_FRAMES);
        for frame in report.stacktrace.iter().take(SUMMARY_FRAMES) {
            let _ = writeln!(out, "  {}", frame);
        }
        if report.stacktrace.len() > SUMMARY_FRAMES {
            let _ = writeln!(out, "  ... and {} more frames", report.stacktrace.len() - SUMMARY_FRAMES);
        }
    }

    if !report.logs.is_empty() {
        let _ = writeln!(out, "\n--- Recent Logs (last {}) ---", SUMMARY_LOGS);
        let start = report.logs.len().saturating_sub(SUMMARY_LOGS);
        for entry in &report.logs[start..] {
            let _ = writeln!(out, "[{}] {}", entry.level, entry.message);
        }
    }

    let _ = writeln!(out, "\n=== End Report ===");
    out
}

fn capture_stacktrace() -> Vec<String> {
    let trace = std::backtrace::Backtrace::force_capture().to_string();
    let frames: Vec<String> = trace
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if frames.is_empty() {
        vec!["Stack trace capture not available on this platform.".to_string()]
    } else {
        frames
    }
}

fn install_panic_hook(reporter: Arc<CrashReporter>) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if recovery::is_recovering() {
            log::error!("Recovered panic: {}", info);
            return;
        }
        previous(info);
        reporter.handle_fatal(&format!("Unhandled panic: {}", info));
        std::process::exit(1);
    }));
}

#[cfg(unix)]
fn install_signal_handlers(reporter: Arc<CrashReporter>) {
    signals::install(reporter);
}

#[cfg(not(unix))]
fn install_signal_handlers(_reporter: Arc<CrashReporter>) {
    log::debug!("Fatal signal hooks are not available on this platform");
}

#[cfg(unix)]
mod signals {
    use std::sync::{Arc, OnceLock};

    use super::CrashReporter;

    static REPORTER: OnceLock<Arc<CrashReporter>> = OnceLock::new();

    const FATAL_SIGNALS: [libc::c_int; 4] = [libc::SIGABRT, libc::SIGSEGV, libc::SIGILL, libc::SIGFPE];

    extern "C" fn on_fatal_signal(signum: libc::c_int) {
        if let Some(reporter) = REPORTER.get() {
            reporter.handle_fatal(&format!("Signal {}", signum));
        }
        // SAFETY: _exit never returns and skips atexit handlers.
        unsafe { libc::_exit(128 + signum) }
    }

    pub(super) fn install(reporter: Arc<CrashReporter>) {
        if REPORTER.set(reporter).is_err() {
            log::warn!("Fatal signal hooks already installed");
            return;
        }
        let handler = on_fatal_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        for signum in FATAL_SIGNALS {
            // SAFETY: the handler is a plain extern "C" fn that lives for the whole process.
            unsafe {
                libc::signal(signum, handler);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path) -> CrashReporterConfig {
        CrashReporterConfig {
            enabled: true,
            max_log_entries: 50,
            build_id: "test-build".to_string(),
            output_dir: dir.join("reports").to_string_lossy().into_owned(),
            enable_file_output: true,
            install_handlers: false,
        }
    }

    #[test]
    fn test_capture_includes_reason_logs_and_stack() {
        logging::init();
        let dir = tempfile::tempdir().unwrap();
        let reporter = CrashReporter::new(config_in(dir.path()));
        log::warn!("crash-reporter-probe");

        let report = reporter.capture_report("manual capture", true);
        assert_eq!(report.reason, "manual capture");
        assert_eq!(report.build_id, "test-build");
        assert!(report.logs.iter().any(|e| e.message == "crash-reporter-probe"));
        assert!(!report.stacktrace.is_empty());
        assert_eq!(report.id.len(), 15);

        let without = reporter.capture_report("no stack", false);
        assert!(without.stacktrace.is_empty());
    }

    #[test]
    fn test_persist_and_parse_back() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = CrashReporter::new(config_in(dir.path()));
        reporter.set_game_context("scene", "main_game");
        let report = reporter.capture_report("persist", false);

        let path = reporter.persist_report(&report).unwrap();
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("crash_report_"));
        let parsed: Report = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, report);
        assert_eq!(parsed.game_context["scene"], "main_game");
        assert!(reporter.last_serialized_report().contains("\"reason\": \"persist\""));
    }

    #[test]
    fn test_file_output_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.enable_file_output = false;
        let reporter = CrashReporter::new(config);
        let report = reporter.capture_report("x", false);
        assert!(matches!(reporter.persist_report(&report), Err(CrashError::FileOutputDisabled)));
    }

    #[test]
    fn test_handle_fatal_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = CrashReporter::new(config_in(dir.path()));
        assert!(reporter.handle_fatal("first").is_some());
        assert!(reporter.handle_fatal("second").is_none());
    }

    #[test]
    fn test_disabled_reporter_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.enabled = false;
        let reporter = CrashReporter::new(config);
        assert!(reporter.handle_fatal("ignored").is_none());
        assert!(!dir.path().join("reports").exists());
    }

    #[test]
    fn test_summary_truncates() {
        let report = Report {
            id: "20260101_000000".to_string(),
            timestamp: "2026-01-01T00:00:00".to_string(),
            reason: "test".to_string(),
            build_id: "b".to_string(),
            build_type: "Debug".to_string(),
            platform: "Linux".to_string(),
            thread_id: "main".to_string(),
            stacktrace: (0..8).map(|i| format!("frame {}", i)).collect(),
            logs: (0..12)
                .map(|i| LogEntry {
                    timestamp: String::new(),
                    level: "INFO".to_string(),
                    message: format!("log {}", i),
                })
                .collect(),
            game_context: BTreeMap::new(),
        };
        let summary = create_summary(&report);
        assert!(summary.contains("frame 4"));
        assert!(!summary.contains("frame 5"));
        assert!(summary.contains("... and 3 more frames"));
        assert!(summary.contains("[INFO] log 11"));
        assert!(!summary.contains("[INFO] log 1\n"));
    }
}
