//! Crash reporting and telemetry

pub mod crash_reporter;
pub mod ring_sink;
pub mod telemetry;

pub use crash_reporter::{create_summary, CrashError, CrashReporter, Report};
pub use ring_sink::{LogEntry, RingBufferSink};
pub use telemetry::{capture_url, session_id, Telemetry, TelemetryError, TelemetryTransport, UreqTransport};

/// Platform label used in reports and default telemetry properties
pub fn platform_name() -> &'static str {
    if cfg!(target_arch = "wasm32") {
        "Web"
    } else {
        match std::env::consts::OS {
            "windows" => "Windows",
            "macos" => "macOS",
            "linux" => "Linux",
            _ => "Unknown",
        }
    }
}

/// `Debug` or `Release`
pub fn build_type() -> &'static str {
    if cfg!(debug_assertions) {
        "Debug"
    } else {
        "Release"
    }
}
