//! # Unified Configuration System
//!
//! All runtime configuration lives here: the frame clock, the virtual display
//! and collision bounds, scripting, shaders, crash reporting and telemetry.
//! Every struct is serde-enabled with defaults, so partial files are valid.

use serde::{Deserialize, Serialize};

use crate::foundation::math::Rect;

// Re-export from the config module
pub use crate::config::{Config, ConfigError};

/// Fixed-step loop parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Fixed step in seconds
    pub rate: f32,
    /// Accumulator ceiling, in fixed steps
    pub max_frame_skip: u32,
    /// Fixed steps allowed per outer tick
    pub max_updates_per_frame: u32,
    /// Physics substeps per fixed step
    pub substeps: u32,
    /// Raw deltas averaged for smoothing
    pub smoothing_samples: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            rate: 1.0 / 60.0,
            max_frame_skip: 5,
            max_updates_per_frame: 5,
            substeps: 2,
            smoothing_samples: 10,
        }
    }
}

/// Virtual resolution and collision bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Virtual (design) width
    pub virtual_width: u32,
    /// Virtual (design) height
    pub virtual_height: u32,
    /// Region covered by the world quadtree before inflation
    pub world_bounds: Rect,
    /// Region covered by the UI quadtree before inflation
    pub ui_bounds: Rect,
    /// Inflation applied to both bounds each frame
    pub bounds_buffer: f32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            virtual_width: 1280,
            virtual_height: 800,
            world_bounds: Rect::new(0.0, 0.0, 1280.0, 800.0),
            ui_bounds: Rect::new(0.0, 0.0, 1280.0, 800.0),
            bounds_buffer: 200.0,
        }
    }
}

/// Script VM settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptingConfig {
    /// Root of the Lua module tree
    pub scripts_dir: String,
    /// Module required at boot
    pub entry_module: String,
    /// Seconds between hot-reload scans; zero disables scanning
    pub hot_reload_interval: f32,
    /// Reload changed modules as soon as a scan finds them
    pub auto_reload: bool,
    /// Kilobytes of incremental GC work per frame
    pub gc_step_kb: i32,
    /// Where `dump_lua_defs` writes the binding definitions
    pub defs_output: Option<String>,
    /// Enable the call profiler at boot
    pub profile_calls: bool,
}

impl Default for ScriptingConfig {
    fn default() -> Self {
        Self {
            scripts_dir: "scripts".to_string(),
            entry_module: "main".to_string(),
            hot_reload_interval: 1.0,
            auto_reload: true,
            gc_step_kb: 64,
            defs_output: None,
            profile_calls: false,
        }
    }
}

/// Shader manifest location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Path to the JSON manifest
    pub manifest_path: Option<String>,
    /// Directory that manifest paths are relative to
    pub shader_dir: String,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            manifest_path: None,
            shader_dir: "shaders".to_string(),
        }
    }
}

/// Crash reporter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrashReporterConfig {
    /// Master switch
    pub enabled: bool,
    /// Ring buffer capacity
    pub max_log_entries: usize,
    /// Build identifier stamped into reports
    pub build_id: String,
    /// Directory for persisted reports
    pub output_dir: String,
    /// Write reports to disk
    pub enable_file_output: bool,
    /// Install the panic hook and fatal signal handlers
    pub install_handlers: bool,
}

impl Default for CrashReporterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_log_entries: 200,
            build_id: "dev-local".to_string(),
            output_dir: "crash_reports".to_string(),
            enable_file_output: true,
            install_handlers: true,
        }
    }
}

/// Telemetry settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Master switch; disabled means no network traffic at all
    pub enabled: bool,
    /// Capture host; normalized to `<host>/capture/`
    pub endpoint: String,
    /// Project API key
    pub api_key: String,
    /// Stable user identifier; `"anonymous"` when empty
    pub distinct_id: String,
    /// Build identifier stamped into default properties
    pub build_id: String,
}

impl TelemetryConfig {
    /// Read the `"telemetry"` object of a JSON config document.
    ///
    /// A missing or non-object entry yields the disabled default.
    pub fn from_config_json(root: &serde_json::Value) -> Self {
        match root.get("telemetry") {
            Some(value) if value.is_object() => {
                serde_json::from_value(value.clone()).unwrap_or_else(|e| {
                    log::error!("[telemetry] invalid config block: {}", e);
                    Self::default()
                })
            }
            _ => Self::default(),
        }
    }
}

/// Top-level runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Frame clock
    pub main_loop: LoopConfig,
    /// Display and bounds
    pub display: DisplayConfig,
    /// Script VM
    pub scripting: ScriptingConfig,
    /// Shader manifest
    pub shaders: ShaderConfig,
    /// Crash reporter
    pub crash: CrashReporterConfig,
    /// Telemetry
    pub telemetry: TelemetryConfig,
}

impl Config for RuntimeConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_runtime_constants() {
        let config = RuntimeConfig::default();
        assert_eq!(config.display.virtual_width, 1280);
        assert_eq!(config.display.virtual_height, 800);
        assert_eq!(config.main_loop.substeps, 2);
        assert_eq!(config.crash.max_log_entries, 200);
        assert!(!config.telemetry.enabled);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("runtime.toml");
        std::fs::write(&path, "[main_loop]\nsubsteps = 4\n").unwrap();

        let config = RuntimeConfig::load_from_file(&path).unwrap();
        assert_eq!(config.main_loop.substeps, 4);
        assert_eq!(config.main_loop.max_updates_per_frame, 5);
        assert_eq!(config.scripting.scripts_dir, "scripts");
    }

    #[test]
    fn test_round_trip_ron() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("runtime.ron");
        let mut config = RuntimeConfig::default();
        config.crash.build_id = "ci-42".to_string();
        config.save_to_file(&path).unwrap();
        let loaded = RuntimeConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.crash.build_id, "ci-42");
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("runtime.ini");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(
            RuntimeConfig::load_from_file(&path),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_telemetry_block_from_json() {
        let root = serde_json::json!({
            "telemetry": { "enabled": true, "endpoint": "https://eu.posthog.com", "api_key": "k" }
        });
        let cfg = TelemetryConfig::from_config_json(&root);
        assert!(cfg.enabled);
        assert_eq!(cfg.api_key, "k");

        let cfg = TelemetryConfig::from_config_json(&serde_json::json!({ "telemetry": 3 }));
        assert!(!cfg.enabled);
    }
}
