//! Lua scripting boundary
//!
//! - [`safe_call`]: guarded calls into Lua that never raise into the engine
//! - [`binding_recorder`]: the single path for exposing engine functions
//! - [`hot_reload`]: mtime tracking and module reload
//! - [`bus_bridge`]: one-shot forwarding of core events into scripts
//! - [`profiler`]: per-thread call timing
//! - [`vm`]: the Lua state that ties these together

pub mod binding_recorder;
pub mod bus_bridge;
pub mod commands;
pub mod hot_reload;
pub mod profiler;
pub mod safe_call;
pub mod vm;

pub use binding_recorder::{BindingRecorder, FunctionDef, ParamDef};
pub use bus_bridge::{dispatch_to_lua, BusBridge, LuaEvent};
pub use commands::{CommandQueue, ScriptCommand};
pub use hot_reload::{module_name_for, HotReloader};
pub use profiler::{CallStats, ScopedCallTimer};
pub use safe_call::{safe_call, safe_call_function, ScriptError};
pub use vm::ScriptVm;
