//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the runtime:
//! - 2D math types
//! - The fixed-step frame clock
//! - Logging with attachable sinks
//! - Recoverable panic scopes

pub mod logging;
pub mod math;
pub mod recovery;
pub mod time;
