//! Save file I/O
//!
//! Writes are atomic: content goes to `<path>.tmp`, is synced, then renamed
//! over `<path>`, after which a best-effort `<path>.bak` copy is made.
//! Asynchronous saves run on a detached worker and post their completion to
//! a queue that the foreground thread drains with
//! [`SaveIo::process_pending_callbacks`].

use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;

/// Attempts made by [`write_with_retry`]
pub const MAX_ATTEMPTS: u32 = 3;
/// Delay before the second attempt; doubles after each failure
pub const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(50);
/// Longest delay between attempts
pub const MAX_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Completion callback for an asynchronous save; receives success
pub type SaveCallback = Box<dyn FnOnce(bool) + Send>;

/// Save I/O failures
#[derive(Error, Debug)]
pub enum SaveError {
    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Every attempt failed
    #[error("Save failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Attempts made
        attempts: u32,
        /// Error from the final attempt
        last: String,
    },
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Write `content` to `path` through a temp file and rename
pub fn write_atomic(path: &Path, content: &str) -> Result<(), SaveError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = with_suffix(path, ".tmp");
    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;

    let backup = with_suffix(path, ".bak");
    if let Err(e) = std::fs::copy(path, &backup) {
        log::warn!("Could not write backup {}: {}", backup.display(), e);
    }
    Ok(())
}

/// [`write_atomic`] with up to [`MAX_ATTEMPTS`] tries and capped doubling delay
pub fn write_with_retry(path: &Path, content: &str) -> Result<(), SaveError> {
    let mut delay = INITIAL_RETRY_DELAY;
    let mut last = String::new();
    for attempt in 1..=MAX_ATTEMPTS {
        match write_atomic(path, content) {
            Ok(()) => return Ok(()),
            Err(e) => {
                log::warn!("Save attempt {}/{} for {} failed: {}", attempt, MAX_ATTEMPTS, path.display(), e);
                last = e.to_string();
            }
        }
        if attempt < MAX_ATTEMPTS {
            std::thread::sleep(delay);
            delay = (delay * 2).min(MAX_RETRY_DELAY);
        }
    }
    Err(SaveError::RetriesExhausted {
        attempts: MAX_ATTEMPTS,
        last,
    })
}

/// Read a save; `None` when absent or unreadable
pub fn load_file(path: impl AsRef<Path>) -> Option<String> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            log::error!("Failed to read {}: {}", path.display(), e);
            None
        }
    }
}

/// Remove a save; true when the file is gone afterwards
pub fn delete_file(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            log::error!("Failed to delete {}: {}", path.display(), e);
            false
        }
    }
}

/// Foreground handle for asynchronous saves
#[derive(Default)]
pub struct SaveIo {
    pending: Arc<Mutex<VecDeque<(SaveCallback, bool)>>>,
    in_flight: Arc<AtomicUsize>,
}

impl SaveIo {
    /// No saves in flight
    pub fn new() -> Self {
        Self::default()
    }

    /// Write on a detached worker; `callback` runs on the next
    /// [`process_pending_callbacks`](Self::process_pending_callbacks) after
    /// the write finishes
    pub fn save_file_async(&self, path: impl Into<PathBuf>, content: String, callback: Option<SaveCallback>) {
        let path = path.into();
        let pending = Arc::clone(&self.pending);
        let in_flight = Arc::clone(&self.in_flight);
        in_flight.fetch_add(1, Ordering::SeqCst);

        let spawned = std::thread::Builder::new()
            .name("save-io".to_string())
            .spawn(move || {
                let success = match write_with_retry(&path, &content) {
                    Ok(()) => true,
                    Err(e) => {
                        log::error!("Save to {} failed: {}", path.display(), e);
                        false
                    }
                };
                if let Some(callback) = callback {
                    pending
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push_back((callback, success));
                }
                in_flight.fetch_sub(1, Ordering::SeqCst);
            });

        if let Err(e) = spawned {
            log::error!("Could not start save worker: {}", e);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Synchronous save with the same retry policy
    pub fn save_file(&self, path: impl AsRef<Path>, content: &str) -> Result<(), SaveError> {
        write_with_retry(path.as_ref(), content)
    }

    /// Run posted callbacks in completion order; returns how many ran
    pub fn process_pending_callbacks(&self) -> usize {
        let batch: Vec<_> = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        let count = batch.len();
        for (callback, success) in batch {
            callback(success);
        }
        count
    }

    /// Saves still being written
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Instant;

    fn drain_until(io: &SaveIo, expected: usize) -> usize {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut ran = 0;
        while ran < expected && Instant::now() < deadline {
            ran += io.process_pending_callbacks();
            std::thread::sleep(Duration::from_millis(5));
        }
        ran
    }

    #[test]
    fn test_atomic_write_leaves_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slot1.json");
        write_atomic(&path, "{\"level\":1}").unwrap();
        assert_eq!(load_file(&path).as_deref(), Some("{\"level\":1}"));
        assert_eq!(load_file(dir.path().join("slot1.json.bak")).as_deref(), Some("{\"level\":1}"));
        assert!(!dir.path().join("slot1.json.tmp").exists());
    }

    #[test]
    fn test_load_and_delete_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("none.json");
        assert_eq!(load_file(&path), None);
        assert!(delete_file(&path));
        std::fs::write(&path, "x").unwrap();
        assert!(delete_file(&path));
        assert!(!path.exists());
    }

    #[test]
    fn test_async_callbacks_run_on_drain() {
        let dir = tempfile::tempdir().unwrap();
        let io = SaveIo::new();
        let ok = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ok);
        io.save_file_async(
            dir.path().join("saves").join("slot.json"),
            "data".to_string(),
            Some(Box::new(move |success| flag.store(success, Ordering::SeqCst))),
        );
        assert_eq!(drain_until(&io, 1), 1);
        assert!(ok.load(Ordering::SeqCst));
        assert_eq!(io.in_flight(), 0);
        assert_eq!(load_file(dir.path().join("saves/slot.json")).as_deref(), Some("data"));
    }

    #[test]
    fn test_failed_write_reports_false() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where the file should be makes the rename fail every time
        let path = dir.path().join("blocked");
        std::fs::create_dir_all(path.join("child")).unwrap();

        let io = SaveIo::new();
        let result = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&result);
        io.save_file_async(
            path,
            "data".to_string(),
            Some(Box::new(move |success| *slot.lock().unwrap() = Some(success))),
        );
        assert_eq!(drain_until(&io, 1), 1);
        assert_eq!(*result.lock().unwrap(), Some(false));
    }
}
