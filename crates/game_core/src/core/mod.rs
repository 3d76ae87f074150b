//! Core runtime configuration

pub mod config;

pub use config::{
    Config, ConfigError, CrashReporterConfig, DisplayConfig, LoopConfig, RuntimeConfig,
    ScriptingConfig, ShaderConfig, TelemetryConfig,
};
