//! Script hot reload
//!
//! Tracked files remember their last modification time. A scan moves files
//! whose time advanced into the changed set (once, however many scans see
//! them). Reloading a file clears its `package.loaded` entry, requires the
//! module again and calls its `on_reload` export when present; only a
//! successful reload takes the file out of the changed set.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use mlua::{Lua, Table, Value};

use super::safe_call::{safe_call_function, ScriptError};

/// Module name for a script path: the part after `scripts/`, without the
/// `.lua` extension, with separators turned into dots
pub fn module_name_for(path: &Path) -> String {
    let mut text = path.to_string_lossy().replace('\\', "/");
    match text.find("scripts/") {
        Some(pos) => text = text[pos + "scripts/".len()..].to_string(),
        None => log::warn!("module_name_for: no 'scripts/' in path {}", text),
    }
    if let Some(stripped) = text.strip_suffix(".lua") {
        text = stripped.to_string();
    }
    text.replace('/', ".")
}

#[derive(Debug, Clone)]
struct TrackedFile {
    module: String,
    modified: SystemTime,
}

/// Watches script files and reloads changed modules
#[derive(Debug, Default)]
pub struct HotReloader {
    tracked: BTreeMap<PathBuf, TrackedFile>,
    changed: BTreeSet<PathBuf>,
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl HotReloader {
    /// Nothing tracked
    pub fn new() -> Self {
        Self::default()
    }

    /// Start watching one file; missing files are ignored
    pub fn track(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let Some(time) = modified(path) else {
            return false;
        };
        self.tracked.insert(
            path.to_path_buf(),
            TrackedFile {
                module: module_name_for(path),
                modified: time,
            },
        );
        true
    }

    /// Watch every `.lua` file below `dir`; returns how many were added
    pub fn track_dir(&mut self, dir: impl AsRef<Path>) -> usize {
        let mut count = 0;
        let mut pending = vec![dir.as_ref().to_path_buf()];
        while let Some(current) = pending.pop() {
            let Ok(entries) = std::fs::read_dir(&current) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                } else if path.extension().is_some_and(|e| e == "lua") && self.track(&path) {
                    count += 1;
                }
            }
        }
        count
    }

    /// Number of tracked files
    pub fn tracked_len(&self) -> usize {
        self.tracked.len()
    }

    /// Files waiting for reload
    pub fn changed(&self) -> impl Iterator<Item = &Path> {
        self.changed.iter().map(PathBuf::as_path)
    }

    /// Whether `path` is waiting for reload
    pub fn is_changed(&self, path: impl AsRef<Path>) -> bool {
        self.changed.contains(path.as_ref())
    }

    /// Module name recorded for a tracked file
    pub fn module_for(&self, path: impl AsRef<Path>) -> Option<&str> {
        self.tracked.get(path.as_ref()).map(|t| t.module.as_str())
    }

    /// Move files whose modification time advanced into the changed set
    pub fn scan(&mut self) -> usize {
        let mut newly_changed = 0;
        for (path, file) in &mut self.tracked {
            let Some(now) = modified(path) else {
                continue;
            };
            if now > file.modified {
                file.modified = now;
                if self.changed.insert(path.clone()) {
                    newly_changed += 1;
                }
            }
        }
        newly_changed
    }

    /// Reload one tracked file into `lua`
    pub fn reload(&mut self, lua: &Lua, path: impl AsRef<Path>) -> Result<(), ScriptError> {
        let path = path.as_ref();
        let module = self
            .tracked
            .get(path)
            .map(|t| t.module.clone())
            .ok_or_else(|| ScriptError::Untracked(path.to_path_buf()))?;

        let loaded: Table = lua.globals().get::<Table>("package")?.get("loaded")?;
        loaded.set(module.as_str(), Value::Nil)?;
        let require: mlua::Function = lua.globals().get("require")?;
        let exports: Value = match require.call(module.as_str()) {
            Ok(v) => v,
            Err(e) => {
                log::error!("Reload failed for {} ({}): {}", module, path.display(), e);
                return Err(e.into());
            }
        };

        if let Value::Table(table) = &exports {
            if let Ok(Value::Function(on_reload)) = table.get::<Value>("on_reload") {
                let _ = safe_call_function::<_, ()>(&on_reload, "on_reload", &module, ());
            }
        }

        self.changed.remove(path);
        log::info!("Reloaded module {} ({})", module, path.display());
        Ok(())
    }

    /// Reload every changed file; returns the modules reloaded
    pub fn reload_changed(&mut self, lua: &Lua) -> Vec<String> {
        let pending: Vec<PathBuf> = self.changed.iter().cloned().collect();
        let mut reloaded = Vec::new();
        for path in pending {
            if self.reload(lua, &path).is_ok() {
                if let Some(module) = self.module_for(&path) {
                    reloaded.push(module.to_string());
                }
            }
        }
        reloaded
    }

    /// Forget tracked and changed files
    pub fn clear(&mut self) {
        self.tracked.clear();
        self.changed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    fn bump_mtime(path: &Path, secs: u64) {
        let later = SystemTime::now() + Duration::from_secs(secs);
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(later)
            .unwrap();
    }

    fn lua_for(root: &Path) -> Lua {
        let lua = Lua::new();
        let scripts = root.join("scripts");
        let path = format!(
            "{0}/?.lua;{0}/?/init.lua",
            scripts.to_string_lossy().replace('\\', "/")
        );
        lua.globals()
            .get::<Table>("package")
            .unwrap()
            .set("path", path)
            .unwrap();
        lua
    }

    #[test]
    fn test_module_names() {
        assert_eq!(module_name_for(Path::new("scripts/ai/init.lua")), "ai.init");
        assert_eq!(module_name_for(Path::new("/game/scripts/main.lua")), "main");
        assert_eq!(module_name_for(Path::new("C:\\game\\scripts\\ui\\hud.lua")), "ui.hud");
    }

    #[test]
    fn test_touch_scan_reload_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let ai = dir.path().join("scripts").join("ai");
        fs::create_dir_all(&ai).unwrap();
        let file = ai.join("init.lua");
        fs::write(
            &file,
            "loads = (loads or 0) + 1\nlocal M = { version = 1 }\nfunction M.on_reload() reloaded = (reloaded or 0) + 1 end\nreturn M\n",
        )
        .unwrap();

        let lua = lua_for(dir.path());
        lua.load("require('ai.init')").exec().unwrap();

        let mut reloader = HotReloader::new();
        assert_eq!(reloader.track_dir(dir.path().join("scripts")), 1);
        assert_eq!(reloader.module_for(&file), Some("ai.init"));
        assert_eq!(reloader.scan(), 0);

        bump_mtime(&file, 5);
        assert_eq!(reloader.scan(), 1);
        assert!(reloader.is_changed(&file));
        // a second scan does not add it again
        bump_mtime(&file, 10);
        assert_eq!(reloader.scan(), 0);
        assert_eq!(reloader.changed().count(), 1);

        reloader.reload(&lua, &file).unwrap();
        assert!(!reloader.is_changed(&file));
        let loads: i64 = lua.globals().get("loads").unwrap();
        let reloaded: i64 = lua.globals().get("reloaded").unwrap();
        assert_eq!(loads, 2);
        assert_eq!(reloaded, 1);
    }

    #[test]
    fn test_failed_reload_stays_changed() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = dir.path().join("scripts");
        fs::create_dir_all(&scripts).unwrap();
        let file = scripts.join("broken.lua");
        fs::write(&file, "return {}").unwrap();

        let lua = lua_for(dir.path());
        let mut reloader = HotReloader::new();
        reloader.track(&file);
        fs::write(&file, "this is not lua").unwrap();
        bump_mtime(&file, 5);
        reloader.scan();

        assert!(reloader.reload(&lua, &file).is_err());
        assert!(reloader.is_changed(&file));
        assert!(reloader.reload_changed(&lua).is_empty());
    }

    #[test]
    fn test_untracked_reload_rejected() {
        let lua = Lua::new();
        let mut reloader = HotReloader::new();
        assert!(matches!(
            reloader.reload(&lua, "scripts/none.lua"),
            Err(ScriptError::Untracked(_))
        ));
    }
}
