//! The script VM
//!
//! One Lua state per process, rebuilt by [`ScriptVm::reset`] during game
//! re-init. Everything scripts can call is installed through the
//! [`BindingRecorder`], and every call back into Lua goes through
//! [`safe_call`].

use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

use mlua::{FromLuaMulti, IntoLuaMulti, Lua, LuaSerdeExt, Table, Value};

use super::binding_recorder::{BindingRecorder, FunctionDef};
use super::bus_bridge::BusBridge;
use super::commands::{CommandQueue, ScriptCommand};
use super::hot_reload::HotReloader;
use super::profiler;
use super::safe_call::{safe_call, safe_call_function, ScriptError};
use crate::core::ScriptingConfig;
use crate::events::EventBus;
use crate::profile_call;

/// GC steps slower than this are logged
const GC_WARN_MS: f64 = 5.0;

/// Installed before any script runs. `events.dispatch` isolates handlers
/// from each other so one failing handler cannot starve the rest.
const PRELUDE: &str = r#"
events = { handlers = {} }

function events.on(name, fn)
    local list = events.handlers[name]
    if list == nil then
        list = {}
        events.handlers[name] = list
    end
    table.insert(list, fn)
    return #list
end

function events.clear(name)
    if name == nil then
        events.handlers = {}
    else
        events.handlers[name] = nil
    end
end

function events.dispatch(name, payload)
    local list = events.handlers[name]
    if list == nil then
        return
    end
    for _, fn in ipairs(list) do
        local ok, err = pcall(fn, payload)
        if not ok then
            log.error("[events." .. name .. "] " .. tostring(err))
        end
    end
end
"#;

/// Owns the Lua state and everything bound into it
pub struct ScriptVm {
    lua: Rc<Lua>,
    config: ScriptingConfig,
    recorder: BindingRecorder,
    commands: CommandQueue,
    hot_reload: HotReloader,
    bridge: BusBridge,
    scan_elapsed: f32,
}

impl ScriptVm {
    /// Create the VM and install the prelude and engine bindings
    pub fn new(config: ScriptingConfig) -> Result<Self, ScriptError> {
        if config.profile_calls {
            profiler::enable_profiling(true);
        }
        let mut vm = Self {
            lua: Rc::new(Lua::new()),
            config,
            recorder: BindingRecorder::new("game_core", env!("CARGO_PKG_VERSION")),
            commands: CommandQueue::new(),
            hot_reload: HotReloader::new(),
            bridge: BusBridge::new(),
            scan_elapsed: 0.0,
        };
        vm.install()?;
        Ok(vm)
    }

    /// Shared handle to the Lua state
    pub fn lua(&self) -> &Rc<Lua> {
        &self.lua
    }

    /// Settings the VM was built with
    pub fn config(&self) -> &ScriptingConfig {
        &self.config
    }

    /// Recorded bindings
    pub fn recorder(&self) -> &BindingRecorder {
        &self.recorder
    }

    /// Queue that bound functions push into
    pub fn commands(&self) -> &CommandQueue {
        &self.commands
    }

    /// Hot-reload bookkeeping
    pub fn hot_reload(&self) -> &HotReloader {
        &self.hot_reload
    }

    /// Whether the bus bridge is live
    pub fn bus_bridge_installed(&self) -> bool {
        self.bridge.is_installed()
    }

    /// Throw the Lua state away and build a fresh one.
    ///
    /// Pending commands and bridge state go with it; the caller has already
    /// dropped the bus listeners.
    pub fn reset(&mut self) -> Result<(), ScriptError> {
        log::info!("Resetting script VM");
        self.bridge.reset();
        self.commands.clear();
        self.recorder.clear();
        self.hot_reload.clear();
        self.scan_elapsed = 0.0;
        self.lua = Rc::new(Lua::new());
        self.install()
    }

    /// Run a chunk of source
    pub fn exec(&self, source: &str, chunk_name: &str) -> Result<(), ScriptError> {
        profile_call!("vm.exec");
        self.lua.load(source).set_name(chunk_name).exec()?;
        Ok(())
    }

    /// `require` a module by dotted name
    pub fn require(&self, module: &str) -> Result<Value, ScriptError> {
        profile_call!("vm.require");
        let require: mlua::Function = self.lua.globals().get("require")?;
        Ok(require.call(module)?)
    }

    /// Require the entry module and run its `init` export if it has one
    pub fn load_entry(&self) -> Result<(), ScriptError> {
        let module = self.config.entry_module.clone();
        let exports = self.require(&module)?;
        if let Value::Table(table) = exports {
            if let Ok(Value::Function(init)) = table.get::<Value>("init") {
                safe_call_function::<_, ()>(&init, "init", &module, ())
                    .map_err(|e| ScriptError::Lua(mlua::Error::runtime(e)))?;
            }
        }
        log::info!("Loaded entry module '{}'", module);
        Ok(())
    }

    /// Call a global function through [`safe_call`]
    pub fn call<A, R>(&self, name: &str, ctx: &str, args: A) -> Result<R, String>
    where
        A: IntoLuaMulti,
        R: FromLuaMulti,
    {
        profile_call!("vm.call");
        safe_call(&self.lua, name, ctx, args)
    }

    /// Call the global `update(dt)` hook if scripts defined one
    pub fn update(&self, dt: f32) {
        if matches!(self.lua.globals().get::<Value>("update"), Ok(Value::Function(_))) {
            let _ = self.call::<_, ()>("update", "update", dt);
        }
    }

    /// Bounded incremental collection; returns true when a cycle finished
    pub fn gc_step(&self) -> bool {
        let start = Instant::now();
        let finished = match self.lua.gc_step_kbytes(self.config.gc_step_kb) {
            Ok(finished) => finished,
            Err(e) => {
                log::error!("Lua GC step failed: {}", e);
                false
            }
        };
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        if elapsed_ms > GC_WARN_MS {
            log::warn!("Lua GC step took {:.2} ms", elapsed_ms);
        }
        finished
    }

    /// Take the commands scripts queued since the last drain
    pub fn drain_commands(&self) -> Vec<ScriptCommand> {
        self.commands.drain()
    }

    /// Subscribe the script bridge to `bus` once
    pub fn install_bus_bridge(&mut self, bus: &EventBus) -> bool {
        self.bridge.install(bus, &self.lua)
    }

    /// Advance the scan clock; on each interval scan tracked files and,
    /// with auto reload on, reload what changed. Returns reloaded modules.
    pub fn scan_and_reload(&mut self, dt: f32) -> Vec<String> {
        if self.config.hot_reload_interval <= 0.0 {
            return Vec::new();
        }
        self.scan_elapsed += dt;
        if self.scan_elapsed < self.config.hot_reload_interval {
            return Vec::new();
        }
        self.scan_elapsed = 0.0;
        let changed = self.hot_reload.scan();
        if changed > 0 {
            log::info!("{} script(s) changed", changed);
        }
        if self.config.auto_reload {
            self.reload_changed()
        } else {
            Vec::new()
        }
    }

    /// Reload every file in the changed set
    pub fn reload_changed(&mut self) -> Vec<String> {
        self.hot_reload.reload_changed(&self.lua)
    }

    /// Reload one file
    pub fn reload(&mut self, path: impl AsRef<Path>) -> Result<(), ScriptError> {
        self.hot_reload.reload(&self.lua, path)
    }

    /// Scan tracked files now; returns how many newly changed
    pub fn scan(&mut self) -> usize {
        self.hot_reload.scan()
    }

    /// Write the binding definitions to the configured path
    pub fn dump_defs(&self) -> Result<Option<PathBuf>, ScriptError> {
        let Some(path) = self.config.defs_output.as_ref().map(PathBuf::from) else {
            return Ok(None);
        };
        self.recorder.dump_lua_defs(&path)?;
        Ok(Some(path))
    }

    fn install(&mut self) -> Result<(), ScriptError> {
        self.set_package_path()?;
        self.bind_log()?;
        self.lua.load(PRELUDE).set_name("prelude").exec()?;
        self.bind_engine()?;
        self.bind_telemetry()?;

        let dir = PathBuf::from(&self.config.scripts_dir);
        if dir.is_dir() {
            let tracked = self.hot_reload.track_dir(&dir);
            log::debug!("Tracking {} script(s) under {}", tracked, dir.display());
        }
        Ok(())
    }

    fn set_package_path(&self) -> Result<(), ScriptError> {
        let package: Table = self.lua.globals().get("package")?;
        let existing: String = package.get("path")?;
        let dir = self.config.scripts_dir.replace('\\', "/");
        package.set("path", format!("{0}/?.lua;{0}/?/init.lua;{1}", dir, existing))?;
        Ok(())
    }

    fn bind_log(&mut self) -> Result<(), ScriptError> {
        let lua = Rc::clone(&self.lua);
        let levels: [(&str, log::Level); 4] = [
            ("debug", log::Level::Debug),
            ("info", log::Level::Info),
            ("warn", log::Level::Warn),
            ("error", log::Level::Error),
        ];
        for (name, level) in levels {
            let f = lua.create_function(move |_, message: String| {
                log::log!(target: "lua", level, "{}", message);
                Ok(())
            })?;
            self.recorder.bind(
                &lua,
                &["log"],
                f,
                FunctionDef::new(name, format!("Log a message at {} level", level))
                    .param("message", "string"),
            )?;
        }
        Ok(())
    }

    fn bind_engine(&mut self) -> Result<(), ScriptError> {
        let lua = Rc::clone(&self.lua);
        let path: &[&str] = &["engine"];

        let q = self.commands.clone();
        let f = lua.create_function(
            move |_, (kind, x, y, w, h, ui): (String, f32, f32, f32, f32, Option<bool>)| {
                profile_call!("engine.spawn");
                q.push(ScriptCommand::Spawn {
                    kind,
                    x,
                    y,
                    w,
                    h,
                    ui: ui.unwrap_or(false),
                });
                Ok(())
            },
        )?;
        self.recorder.bind(
            &lua,
            path,
            f,
            FunctionDef::new("spawn", "Create an entity at the next command flush")
                .param("kind", "string")
                .param("x", "number")
                .param("y", "number")
                .param("w", "number")
                .param("h", "number")
                .param("ui", "boolean?"),
        )?;

        let q = self.commands.clone();
        let f = lua.create_function(move |_, id: u64| {
            profile_call!("engine.destroy");
            q.push(ScriptCommand::Destroy { id });
            Ok(())
        })?;
        self.recorder.bind(
            &lua,
            path,
            f,
            FunctionDef::new("destroy", "Destroy an entity").param("id", "integer"),
        )?;

        let q = self.commands.clone();
        let f = lua.create_function(move |_, (id, x, y): (u64, f32, f32)| {
            profile_call!("engine.set_position");
            q.push(ScriptCommand::SetPosition { id, x, y });
            Ok(())
        })?;
        self.recorder.bind(
            &lua,
            path,
            f,
            FunctionDef::new("set_position", "Move an entity")
                .param("id", "integer")
                .param("x", "number")
                .param("y", "number"),
        )?;

        let q = self.commands.clone();
        let f = lua.create_function(move |_, (id, w, h): (u64, f32, f32)| {
            q.push(ScriptCommand::SetSize { id, w, h });
            Ok(())
        })?;
        self.recorder.bind(
            &lua,
            path,
            f,
            FunctionDef::new("set_size", "Resize an entity")
                .param("id", "integer")
                .param("w", "number")
                .param("h", "number"),
        )?;

        let q = self.commands.clone();
        let f = lua.create_function(move |_, (id, radians): (u64, f32)| {
            q.push(ScriptCommand::SetRotation { id, radians });
            Ok(())
        })?;
        self.recorder.bind(
            &lua,
            path,
            f,
            FunctionDef::new("set_rotation", "Rotate an entity")
                .param("id", "integer")
                .param("radians", "number"),
        )?;

        let q = self.commands.clone();
        let f = lua.create_function(move |_, (id, enabled): (u64, bool)| {
            q.push(ScriptCommand::SetCollisionEnabled { id, enabled });
            Ok(())
        })?;
        self.recorder.bind(
            &lua,
            path,
            f,
            FunctionDef::new("set_collision_enabled", "Toggle collision for an entity")
                .param("id", "integer")
                .param("enabled", "boolean"),
        )?;

        let q = self.commands.clone();
        let f = lua.create_function(move |_, (id, category, mask): (u64, u32, u32)| {
            q.push(ScriptCommand::SetCollisionFilter { id, category, mask });
            Ok(())
        })?;
        self.recorder.bind(
            &lua,
            path,
            f,
            FunctionDef::new("set_collision_filter", "Replace collision category and mask")
                .param("id", "integer")
                .param("category", "integer")
                .param("mask", "integer"),
        )?;

        let q = self.commands.clone();
        let f = lua.create_function(
            move |_, (id, name, frames, frame_duration): (u64, String, Vec<String>, Option<f32>)| {
                q.push(ScriptCommand::QueueAnimation {
                    id,
                    name,
                    frames,
                    frame_duration: frame_duration.unwrap_or(0.1),
                });
                Ok(())
            },
        )?;
        self.recorder.bind(
            &lua,
            path,
            f,
            FunctionDef::new("queue_animation", "Append an animation to an entity's queue")
                .param("id", "integer")
                .param("name", "string")
                .param("frames", "string[]")
                .param("frame_duration", "number?"),
        )?;

        let q = self.commands.clone();
        let f = lua.create_function(move |_, (id, force): (u64, f32)| {
            profile_call!("engine.pull_spring");
            q.push(ScriptCommand::PullSpring { id, force });
            Ok(())
        })?;
        self.recorder.bind(
            &lua,
            path,
            f,
            FunctionDef::new("pull_spring", "Displace an entity's spring")
                .param("id", "integer")
                .param("force", "number"),
        )?;

        let q = self.commands.clone();
        let f = lua.create_function(move |_, (id, target, time): (u64, f32, Option<f32>)| {
            q.push(ScriptCommand::AnimateSpring { id, target, time });
            Ok(())
        })?;
        self.recorder.bind(
            &lua,
            path,
            f,
            FunctionDef::new("animate_spring", "Retarget an entity's spring")
                .param("id", "integer")
                .param("target", "number")
                .param("time", "number?"),
        )?;

        let q = self.commands.clone();
        let f = lua.create_function(move |_, state: String| {
            q.push(ScriptCommand::SetGameState { state });
            Ok(())
        })?;
        self.recorder.bind(
            &lua,
            path,
            f,
            FunctionDef::new("set_game_state", "Request a game state transition")
                .param("state", "string"),
        )?;

        let q = self.commands.clone();
        let f = lua.create_function(move |_, name: String| {
            q.push(ScriptCommand::ActivateState { name });
            Ok(())
        })?;
        self.recorder.bind(
            &lua,
            path,
            f,
            FunctionDef::new("activate_state", "Turn a state tag on").param("name", "string"),
        )?;

        let q = self.commands.clone();
        let f = lua.create_function(move |_, name: String| {
            q.push(ScriptCommand::DeactivateState { name });
            Ok(())
        })?;
        self.recorder.bind(
            &lua,
            path,
            f,
            FunctionDef::new("deactivate_state", "Turn a state tag off").param("name", "string"),
        )?;

        Ok(())
    }

    fn bind_telemetry(&mut self) -> Result<(), ScriptError> {
        let lua = Rc::clone(&self.lua);
        let q = self.commands.clone();
        let f = lua.create_function(move |lua, (name, properties): (String, Option<Value>)| {
            let properties = match properties {
                Some(value @ Value::Table(_)) => lua.from_value::<serde_json::Value>(value)?,
                _ => serde_json::Value::Object(serde_json::Map::new()),
            };
            q.push(ScriptCommand::RecordTelemetry { name, properties });
            Ok(())
        })?;
        self.recorder.bind(
            &lua,
            &["telemetry"],
            f,
            FunctionDef::new("record", "Send an analytics event")
                .param("name", "string")
                .param("properties", "table?"),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{GameState, GameStateChanged};
    use std::fs;

    fn config_in(dir: &Path) -> ScriptingConfig {
        ScriptingConfig {
            scripts_dir: dir.join("scripts").to_string_lossy().into_owned(),
            hot_reload_interval: 0.5,
            ..ScriptingConfig::default()
        }
    }

    #[test]
    fn test_bindings_push_commands() {
        let dir = tempfile::tempdir().unwrap();
        let vm = ScriptVm::new(config_in(dir.path())).unwrap();
        vm.exec(
            r#"
            engine.spawn("crate", 1, 2, 3, 4)
            engine.pull_spring(7, 0.5)
            engine.set_game_state("MAIN_GAME")
            telemetry.record("level_start", { level = 3 })
            "#,
            "test",
        )
        .unwrap();

        let commands = vm.drain_commands();
        assert_eq!(commands.len(), 4);
        assert!(matches!(&commands[0], ScriptCommand::Spawn { kind, ui: false, .. } if kind == "crate"));
        assert_eq!(commands[1], ScriptCommand::PullSpring { id: 7, force: 0.5 });
        match &commands[3] {
            ScriptCommand::RecordTelemetry { name, properties } => {
                assert_eq!(name, "level_start");
                assert_eq!(properties["level"], serde_json::json!(3));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(vm.drain_commands().is_empty());
    }

    #[test]
    fn test_every_binding_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let vm = ScriptVm::new(config_in(dir.path())).unwrap();
        for name in ["engine.spawn", "engine.destroy", "log.info", "telemetry.record"] {
            assert!(vm.recorder().find(name).is_some(), "{} missing", name);
        }
        let defs = vm.recorder().render_defs();
        assert!(defs.contains("function engine.set_game_state(state) end"));
    }

    #[test]
    fn test_entry_module_init_runs() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = dir.path().join("scripts");
        fs::create_dir_all(&scripts).unwrap();
        fs::write(
            scripts.join("main.lua"),
            "local M = {}\nfunction M.init() booted = true end\nreturn M\n",
        )
        .unwrap();
        let vm = ScriptVm::new(config_in(dir.path())).unwrap();
        assert_eq!(vm.hot_reload().tracked_len(), 1);
        vm.load_entry().unwrap();
        let booted: bool = vm.lua().globals().get("booted").unwrap();
        assert!(booted);
    }

    #[test]
    fn test_bridge_reaches_script_handlers() {
        let dir = tempfile::tempdir().unwrap();
        let bus = EventBus::new();
        let mut vm = ScriptVm::new(config_in(dir.path())).unwrap();
        vm.exec(
            r#"
            events.on("game_state_changed", function(e) last_state = e.new end)
            events.on("game_state_changed", function() error("second handler fails") end)
            events.on("game_state_changed", function() third_ran = true end)
            "#,
            "handlers",
        )
        .unwrap();
        assert!(vm.install_bus_bridge(&bus));
        assert!(!vm.install_bus_bridge(&bus));

        bus.publish(&GameStateChanged {
            old: GameState::LoadingScreen,
            new: GameState::MainMenu,
        });
        let last: String = vm.lua().globals().get("last_state").unwrap();
        let third: bool = vm.lua().globals().get("third_ran").unwrap();
        assert_eq!(last, "MAIN_MENU");
        assert!(third);
    }

    #[test]
    fn test_reset_rebuilds_state() {
        let dir = tempfile::tempdir().unwrap();
        let bus = EventBus::new();
        let mut vm = ScriptVm::new(config_in(dir.path())).unwrap();
        vm.exec("leftover = 1; engine.destroy(3)", "before").unwrap();
        vm.install_bus_bridge(&bus);
        bus.clear();

        vm.reset().unwrap();
        let leftover: Option<i64> = vm.lua().globals().get("leftover").unwrap();
        assert_eq!(leftover, None);
        assert!(vm.commands().is_empty());
        assert!(!vm.bus_bridge_installed());
        assert!(vm.recorder().find("engine.spawn").is_some());
        assert!(vm.install_bus_bridge(&bus));
    }

    #[test]
    fn test_script_errors_do_not_escape() {
        let dir = tempfile::tempdir().unwrap();
        let vm = ScriptVm::new(config_in(dir.path())).unwrap();
        vm.exec("function update(dt) error('frame failed') end", "update")
            .unwrap();
        vm.update(0.016);
        assert!(vm.call::<_, ()>("missing", "test", ()).is_err());
        assert!(vm.exec("this is not lua", "bad").is_err());
        vm.gc_step();
    }

    #[test]
    fn test_scan_interval_gates_reload() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = dir.path().join("scripts");
        fs::create_dir_all(&scripts).unwrap();
        let file = scripts.join("main.lua");
        fs::write(&file, "count = (count or 0) + 1\nreturn {}\n").unwrap();
        let mut vm = ScriptVm::new(config_in(dir.path())).unwrap();
        vm.require("main").unwrap();

        let later = std::time::SystemTime::now() + std::time::Duration::from_secs(5);
        fs::File::options()
            .write(true)
            .open(&file)
            .unwrap()
            .set_modified(later)
            .unwrap();

        assert!(vm.scan_and_reload(0.2).is_empty());
        assert_eq!(vm.scan_and_reload(0.4), vec!["main".to_string()]);
        let count: i64 = vm.lua().globals().get("count").unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_dump_defs_uses_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.defs_output = Some(dir.path().join("defs/core.defs.lua").to_string_lossy().into_owned());
        let vm = ScriptVm::new(config).unwrap();
        let path = vm.dump_defs().unwrap().unwrap();
        assert!(fs::read_to_string(path).unwrap().contains("---@meta"));
    }
}
