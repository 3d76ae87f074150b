//! Guarded calls from Rust into Lua
//!
//! Every path from engine code into a script goes through these helpers.
//! Lua errors come back as `Err(String)` after being logged with the
//! caller-supplied context; nothing is raised across the frame boundary.

use std::path::PathBuf;

use mlua::{FromLuaMulti, Function, IntoLuaMulti, Lua, Value};
use thiserror::Error;

/// Errors surfaced by the script VM
#[derive(Error, Debug)]
pub enum ScriptError {
    /// The interpreter reported an error
    #[error("Lua error: {0}")]
    Lua(#[from] mlua::Error),

    /// Reading a script or writing definitions failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A global expected to be a function was something else
    #[error("'{0}' is not a function")]
    NotAFunction(String),

    /// A reload was requested for a file that is not tracked
    #[error("Not a tracked script: {}", .0.display())]
    Untracked(PathBuf),
}

/// Call the global function `name`, logging and returning any failure
pub fn safe_call<A, R>(lua: &Lua, name: &str, ctx: &str, args: A) -> Result<R, String>
where
    A: IntoLuaMulti,
    R: FromLuaMulti,
{
    let function = match lua.globals().get::<Value>(name) {
        Ok(Value::Function(f)) => f,
        Ok(Value::Nil) => {
            let message = format!("[{}] function '{}' is not defined", ctx, name);
            log::error!("{}", message);
            return Err(message);
        }
        Ok(_) => {
            let message = format!("[{}] {}", ctx, ScriptError::NotAFunction(name.to_string()));
            log::error!("{}", message);
            return Err(message);
        }
        Err(e) => {
            let message = format!("[{}] failed to look up '{}': {}", ctx, name, e);
            log::error!("{}", message);
            return Err(message);
        }
    };
    safe_call_function(&function, name, ctx, args)
}

/// Call a function handle, logging and returning any failure
pub fn safe_call_function<A, R>(function: &Function, name: &str, ctx: &str, args: A) -> Result<R, String>
where
    A: IntoLuaMulti,
    R: FromLuaMulti,
{
    function.call::<R>(args).map_err(|e| {
        let message = format!("[{}] Lua error in '{}': {}", ctx, name, e);
        log::error!("{}", message);
        message
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_returns_value() {
        let lua = Lua::new();
        lua.load("function add(a, b) return a + b end").exec().unwrap();
        let sum: i64 = safe_call(&lua, "add", "test", (2, 3)).unwrap();
        assert_eq!(sum, 5);
    }

    #[test]
    fn test_runtime_error_is_contained() {
        let lua = Lua::new();
        lua.load("function boom() error('kaboom') end").exec().unwrap();
        let err = safe_call::<_, ()>(&lua, "boom", "update", ()).unwrap_err();
        assert!(err.contains("kaboom"));
        assert!(err.contains("[update]"));
    }

    #[test]
    fn test_missing_and_non_function_globals() {
        let lua = Lua::new();
        lua.load("not_fn = 42").exec().unwrap();
        assert!(safe_call::<_, ()>(&lua, "nope", "ctx", ()).is_err());
        let err = safe_call::<_, ()>(&lua, "not_fn", "ctx", ()).unwrap_err();
        assert!(err.contains("not a function"));
    }
}
