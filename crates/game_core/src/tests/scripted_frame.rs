//! Integration tests for the scripted frame
//!
//! Scripts live in a temp `scripts/` tree; the engine boots them through
//! the entry module exactly as a game would.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use serde_json::Value;
use tempfile::TempDir;

use crate::animation::Spring;
use crate::core::{RuntimeConfig, TelemetryConfig};
use crate::diagnostics::{Telemetry, TelemetryError, TelemetryTransport};
use crate::{AppError, Application, Engine};

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyGame;

    impl Application for EmptyGame {
        fn initialize(&mut self, _engine: &mut Engine) -> Result<(), AppError> {
            Ok(())
        }

        fn update(&mut self, _engine: &mut Engine, _delta_time: f32) -> Result<(), AppError> {
            Ok(())
        }

        fn cleanup(&mut self, _engine: &mut Engine) {}
    }

    #[derive(Clone, Default)]
    struct Recording(Arc<Mutex<Vec<Value>>>);

    impl TelemetryTransport for Recording {
        fn send(&self, _url: &str, body: &Value) -> Result<(), TelemetryError> {
            self.0.lock().unwrap_or_else(PoisonError::into_inner).push(body.clone());
            Ok(())
        }
    }

    const MAIN: &str = r#"
local ai = require("ai.init")
local M = {}

function M.init()
    engine.spawn("rock", 100, 100, 50, 50)
    engine.spawn("ship", 120, 120, 50, 50)
    events.on("collision_started", function(e)
        hits = (hits or 0) + 1
        engine.pull_spring(e.a, 5)
    end)
end

return M
"#;

    const AI: &str = r#"
local M = {}
loads = (loads or 0) + 1

function M.on_reload()
    reloaded = (reloaded or 0) + 1
end

return M
"#;

    fn write_scripts(root: &Path) -> PathBuf {
        let scripts = root.join("scripts");
        std::fs::create_dir_all(scripts.join("ai")).unwrap();
        std::fs::write(scripts.join("main.lua"), MAIN).unwrap();
        std::fs::write(scripts.join("ai").join("init.lua"), AI).unwrap();
        scripts
    }

    fn config(scripts: &Path, hot_reload_interval: f32) -> RuntimeConfig {
        let mut config = RuntimeConfig::default();
        config.scripting.scripts_dir = scripts.to_string_lossy().replace('\\', "/");
        config.scripting.hot_reload_interval = hot_reload_interval;
        config.main_loop.smoothing_samples = 1;
        config
    }

    fn lua_int(engine: &Engine, name: &str) -> i64 {
        engine.vm.lua().globals().get::<Option<i64>>(name).unwrap().unwrap_or(0)
    }

    #[test]
    fn test_lua_reacts_to_collision_through_bridge() {
        let dir = TempDir::new().unwrap();
        let scripts = write_scripts(dir.path());
        let mut engine = Engine::new(config(&scripts, 0.0)).unwrap();
        let mut game = EmptyGame;
        engine.boot(&mut game).unwrap();
        assert!(engine.vm.bus_bridge_installed());

        engine.run_frames(&mut game, 4, 0.02).unwrap();

        assert_eq!(engine.world.len(), 2);
        assert_eq!(lua_int(&engine, "hits"), 1);
        assert_eq!(engine.world.view::<Spring>().count(), 1);
    }

    #[test]
    fn test_touched_module_reloads_during_frame() {
        let dir = TempDir::new().unwrap();
        let scripts = write_scripts(dir.path());
        let ai = scripts.join("ai").join("init.lua");
        let mut engine = Engine::new(config(&scripts, 0.5)).unwrap();
        let mut game = EmptyGame;
        engine.boot(&mut game).unwrap();
        assert_eq!(lua_int(&engine, "loads"), 1);

        std::fs::File::options()
            .write(true)
            .open(&ai)
            .unwrap()
            .set_modified(SystemTime::now() + Duration::from_secs(10))
            .unwrap();

        engine.run_frames(&mut game, 1, 0.6).unwrap();

        assert_eq!(lua_int(&engine, "loads"), 2);
        assert_eq!(lua_int(&engine, "reloaded"), 1);
        assert!(!engine.vm.hot_reload().is_changed(&ai));
    }

    #[test]
    fn test_reinit_reruns_entry_without_duplicates() {
        let dir = TempDir::new().unwrap();
        let scripts = write_scripts(dir.path());
        let mut engine = Engine::new(config(&scripts, 0.0)).unwrap();
        let mut game = EmptyGame;
        engine.boot(&mut game).unwrap();
        engine.run_frames(&mut game, 3, 0.02).unwrap();
        assert_eq!(engine.world.len(), 2);

        engine.reinitialize_game(&mut game).unwrap();
        assert!(engine.world.is_empty());
        // fresh VM: globals from the previous state are gone
        assert_eq!(lua_int(&engine, "hits"), 0);

        engine.run_frames(&mut game, 3, 0.02).unwrap();
        assert_eq!(engine.world.len(), 2);
        assert_eq!(lua_int(&engine, "hits"), 1);
    }

    #[test]
    fn test_script_telemetry_reaches_transport() {
        let dir = TempDir::new().unwrap();
        let scripts = dir.path().join("scripts");
        std::fs::create_dir_all(&scripts).unwrap();
        std::fs::write(
            scripts.join("main.lua"),
            "return { init = function() telemetry.record('level_start', { level = 3 }) end }",
        )
        .unwrap();

        let recording = Recording::default();
        let telemetry = Telemetry::with_transport(
            TelemetryConfig {
                enabled: true,
                endpoint: "http://localhost:9".to_string(),
                api_key: "test-key".to_string(),
                ..TelemetryConfig::default()
            },
            recording.clone(),
        );

        let mut engine = Engine::new(config(&scripts, 0.0)).unwrap();
        engine.set_telemetry(Arc::new(telemetry));
        let mut game = EmptyGame;
        engine.boot(&mut game).unwrap();
        engine.run_frames(&mut game, 1, 0.02).unwrap();
        assert!(engine.telemetry.flush(Duration::from_secs(5)));

        let sent = recording.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["event"], "level_start");
        assert_eq!(sent[0]["properties"]["level"], 3);
        assert_eq!(sent[0]["api_key"], "test-key");
    }
}
