//! Recoverable panic scopes
//!
//! Code that must survive a panicking callee (event listeners, script
//! callbacks) runs it through [`catch_recoverable`]. The crash reporter's
//! panic hook consults [`is_recovering`] so those panics are logged instead
//! of terminating the process.

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};

thread_local! {
    static RECOVERABLE_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// Run `f`, converting a panic into an error message
pub fn catch_recoverable<R>(f: impl FnOnce() -> R) -> Result<R, String> {
    RECOVERABLE_DEPTH.with(|d| d.set(d.get() + 1));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    RECOVERABLE_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    result.map_err(|payload| panic_message(payload.as_ref()))
}

/// True while the current thread is inside [`catch_recoverable`]
pub fn is_recovering() -> bool {
    RECOVERABLE_DEPTH.with(|d| d.get() > 0)
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
