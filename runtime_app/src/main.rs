//! Drift demo
//!
//! Headless run of the runtime core: a field of drifting rocks, a ship that
//! squashes on a spring whenever something hits it, and the Lua entry module
//! under `scripts/`. The final frame can be written out as a PNG.
//!
//! Run `drift_demo --help` for the flags.

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use clap::{Arg, ArgMatches, Command};
use game_core::config::ConfigError;
use game_core::ecs::Component;
use game_core::events::{CollisionStarted, GameState};
use game_core::foundation::logging;
use game_core::prelude::*;
use game_core::render::{DrawPayload, Space};
use game_core::save::SaveError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use thiserror::Error;

const FRAME_TIME: f32 = 1.0 / 60.0;
const ROCK_COUNT: usize = 12;
const SHIP_SIZE: f32 = 64.0;

/// Per-entity drift velocity in virtual pixels per second
#[derive(Debug, Clone, Copy)]
struct Drift {
    vx: f32,
    vy: f32,
}

impl Component for Drift {}

#[derive(Error, Debug)]
enum RunError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Save error: {0}")]
    Save(#[from] SaveError),

    #[error("Screenshot failed: {0}")]
    Screenshot(String),
}

fn cli() -> Command {
    Command::new("drift_demo")
        .about("Headless drift field on the runtime core")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .help("Runtime config (toml, ron or json)")
                .default_value("runtime.toml"),
        )
        .arg(
            Arg::new("frames")
                .short('f')
                .long("frames")
                .value_name("COUNT")
                .help("Frames to run at 60 Hz")
                .value_parser(clap::value_parser!(u64))
                .default_value("600"),
        )
        .arg(
            Arg::new("seed")
                .short('s')
                .long("seed")
                .value_name("SEED")
                .help("Seed for the rock field")
                .value_parser(clap::value_parser!(u64))
                .default_value("7"),
        )
        .arg(
            Arg::new("screenshot")
                .long("screenshot")
                .value_name("PNG")
                .help("Write the final backbuffer to this file"),
        )
        .arg(
            Arg::new("save")
                .long("save")
                .value_name("JSON")
                .help("Write a run summary through save I/O"),
        )
        .arg(
            Arg::new("reload")
                .long("reload")
                .help("Re-initialize the game halfway through the run")
                .action(clap::ArgAction::SetTrue),
        )
}

#[derive(Debug)]
struct Args {
    config: PathBuf,
    frames: u64,
    seed: u64,
    screenshot: Option<PathBuf>,
    save: Option<PathBuf>,
    reload: bool,
}

impl Args {
    fn from_matches(matches: &ArgMatches) -> Self {
        let path = |name: &str| matches.get_one::<String>(name).map(PathBuf::from);
        Self {
            config: path("config").unwrap_or_else(|| PathBuf::from("runtime.toml")),
            frames: matches.get_one::<u64>("frames").copied().unwrap_or(600),
            seed: matches.get_one::<u64>("seed").copied().unwrap_or(7),
            screenshot: path("screenshot"),
            save: path("save"),
            reload: matches.get_flag("reload"),
        }
    }
}

struct DriftGame {
    rng: StdRng,
    ship: Option<Entity>,
    hits: Rc<Cell<u32>>,
    hits_seen: u32,
    elapsed: f32,
}

impl DriftGame {
    fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            ship: None,
            hits: Rc::new(Cell::new(0)),
            hits_seen: 0,
            elapsed: 0.0,
        }
    }

    fn spawn_rocks(&mut self, engine: &mut Engine) {
        let width = engine.config.display.virtual_width as f32;
        let height = engine.config.display.virtual_height as f32;
        for _ in 0..ROCK_COUNT {
            let size = self.rng.gen_range(24.0..72.0);
            let x = self.rng.gen_range(0.0..width - size);
            let y = self.rng.gen_range(0.0..height - size);
            let rock = engine.spawn("rock", Transform::new(x, y, size, size), false);
            engine.world.emplace(
                rock,
                Drift {
                    vx: self.rng.gen_range(-120.0..120.0),
                    vy: self.rng.gen_range(-120.0..120.0),
                },
            );
        }
    }

    fn drift(engine: &mut Engine, dt: f32) {
        let width = engine.config.display.virtual_width as f32;
        let height = engine.config.display.virtual_height as f32;
        let moving: Vec<(Entity, Drift)> = engine.world.view::<Drift>().map(|(e, d)| (e, *d)).collect();
        for (entity, drift) in moving {
            if let Some(transform) = engine.world.get_mut::<Transform>(entity) {
                transform.actual_x = (transform.actual_x + drift.vx * dt).rem_euclid(width);
                transform.actual_y = (transform.actual_y + drift.vy * dt).rem_euclid(height);
            }
            engine.physics.apply_authoritative_transform(&mut engine.world, entity);
        }
    }
}

impl Application for DriftGame {
    fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
        engine.change_state(GameState::LoadingScreen);
        engine.change_state(GameState::MainMenu);

        let hits = Rc::clone(&self.hits);
        engine.bus.subscribe(move |_: &CollisionStarted| hits.set(hits.get() + 1));

        if engine.shaders.get("tint").is_some() {
            if let Some(sprites) = engine.layers.get_mut(SPRITES_LAYER) {
                sprites.push_shader("tint");
            }
        }

        let cx = engine.config.display.virtual_width as f32 / 2.0;
        let cy = engine.config.display.virtual_height as f32 / 2.0;
        let ship = engine.spawn(
            "ship",
            Transform::new(cx - SHIP_SIZE / 2.0, cy - SHIP_SIZE / 2.0, SHIP_SIZE, SHIP_SIZE),
            false,
        );
        engine.world.emplace(ship, Spring::for_transform(0.0));
        self.ship = Some(ship);
        self.spawn_rocks(engine);

        engine.change_state(GameState::MainGame);
        log::info!("Drift field ready with {} rocks", ROCK_COUNT);
        Ok(())
    }

    fn fixed_update(&mut self, engine: &mut Engine, dt: f32) -> Result<(), AppError> {
        Self::drift(engine, dt);

        let Some(ship) = self.ship else {
            return Ok(());
        };
        let hits = self.hits.get();
        let squash = engine.world.get_mut::<Spring>(ship).map(|spring| {
            if hits > self.hits_seen {
                spring.pull(0.4, None, None);
            }
            spring.value
        });
        self.hits_seen = hits;
        if let (Some(squash), Some(transform)) = (squash, engine.world.get_mut::<Transform>(ship)) {
            transform.actual_w = SHIP_SIZE * (1.0 + squash);
            transform.actual_h = SHIP_SIZE * (1.0 - squash * 0.5);
        }
        Ok(())
    }

    fn update(&mut self, _engine: &mut Engine, delta_time: f32) -> Result<(), AppError> {
        self.elapsed += delta_time;
        Ok(())
    }

    fn render(&mut self, engine: &mut Engine) -> Result<(), AppError> {
        if let Some(background) = engine.layers.get_mut(BACKGROUND_LAYER) {
            background.queue(DrawPayload::ClearBackground { color: Color::rgba(12, 14, 28, 255) }, 0, Space::Screen);
        }
        let bar = (self.hits.get() as f32 * 8.0).min(engine.config.display.virtual_width as f32 - 40.0);
        if let Some(ui) = engine.layers.get_mut(UI_LAYER) {
            ui.queue(
                DrawPayload::DrawRectangle { rect: Rect::new(20.0, 20.0, bar, 10.0), color: Color::rgba(240, 200, 60, 255) },
                100,
                Space::Screen,
            );
        }
        Ok(())
    }

    fn cleanup(&mut self, engine: &mut Engine) {
        log::info!(
            "Drift ran {:.2}s: {} collisions, {} entities",
            self.elapsed,
            self.hits.get(),
            engine.world.len()
        );
    }
}

fn run(args: &Args) -> Result<(), RunError> {
    let config = RuntimeConfig::load_or_default(&args.config)?;
    let reporter = CrashReporter::init(config.crash.clone());
    let telemetry = Arc::new(Telemetry::new(config.telemetry.clone()));
    reporter.set_telemetry(Arc::clone(&telemetry));

    let mut engine = Engine::new(config)?;
    engine.set_telemetry(Arc::clone(&telemetry));
    engine.set_crash_reporter(Arc::clone(&reporter));

    let mut game = DriftGame::new(args.seed);
    engine.boot(&mut game)?;
    telemetry.record_event("session_start", json!({ "seed": args.seed }));

    let ran = if args.reload {
        let first = engine.run_frames(&mut game, args.frames / 2, FRAME_TIME)?;
        engine.handle_event(AppEvent::ReloadRequested);
        first + engine.run_frames(&mut game, args.frames - first, FRAME_TIME)?
    } else {
        engine.run_frames(&mut game, args.frames, FRAME_TIME)?
    };
    if ran < args.frames {
        log::warn!("Stopped early after {} of {} frames", ran, args.frames);
    }

    if let Some(path) = &args.screenshot {
        engine
            .backbuffer()
            .save_png(path)
            .map_err(|e| RunError::Screenshot(e.to_string()))?;
        log::info!("Wrote {}", path.display());
    }

    if let Some(path) = &args.save {
        let summary = json!({
            "seed": args.seed,
            "frames": ran,
            "fixed_steps": engine.main_loop.frame,
            "collisions": game.hits.get(),
            "entities": engine.world.len(),
        });
        engine.save_io.save_file(path, &summary.to_string())?;
    }

    engine.shutdown(&mut game);
    telemetry.send_session_end();
    if !telemetry.flush(Duration::from_secs(2)) {
        log::warn!("Telemetry queue not drained before exit");
    }
    Ok(())
}

fn main() {
    logging::init();
    log::info!("Starting drift demo");

    let args = Args::from_matches(&cli().get_matches());

    if let Err(e) = run(&args) {
        log::error!("Drift demo failed: {}", e);
        std::process::exit(1);
    }
    log::info!("Drift demo finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args, clap::Error> {
        let argv = std::iter::once("drift_demo").chain(list.iter().copied());
        cli().try_get_matches_from(argv).map(|m| Args::from_matches(&m))
    }

    #[test]
    fn test_args_defaults_and_flags() {
        let parsed = args(&[]).unwrap();
        assert_eq!(parsed.frames, 600);
        assert_eq!(parsed.config, PathBuf::from("runtime.toml"));
        assert!(!parsed.reload);

        let parsed = args(&["--frames", "30", "-s", "3", "--reload", "--save", "out.json"]).unwrap();
        assert_eq!(parsed.frames, 30);
        assert_eq!(parsed.seed, 3);
        assert!(parsed.reload);
        assert_eq!(parsed.save, Some(PathBuf::from("out.json")));
        assert_eq!(parsed.screenshot, None);
    }

    #[test]
    fn test_args_rejects_unknown_and_bad_values() {
        assert!(args(&["--bogus"]).is_err());
        assert!(args(&["--frames"]).is_err());
        assert!(args(&["--frames", "many"]).is_err());
    }

    fn headless_config() -> RuntimeConfig {
        let mut config = RuntimeConfig::default();
        config.scripting.scripts_dir = "does-not-exist".to_string();
        config.main_loop.smoothing_samples = 1;
        config
    }

    #[test]
    fn test_drift_field_boots_and_survives_reload() {
        let mut engine = Engine::new(headless_config()).unwrap();
        let mut game = DriftGame::new(11);
        engine.boot(&mut game).unwrap();
        assert_eq!(engine.world.len(), ROCK_COUNT + 1);
        assert_eq!(engine.game_state.current(), GameState::MainGame);

        let listeners = engine.bus.listener_count::<CollisionStarted>();

        engine.run_frames(&mut game, 30, FRAME_TIME).unwrap();
        engine.handle_event(AppEvent::ReloadRequested);
        engine.run_frames(&mut game, 1, FRAME_TIME).unwrap();

        assert!(!engine.reload_pending());
        assert_eq!(engine.world.len(), ROCK_COUNT + 1);
        assert_eq!(engine.bus.listener_count::<CollisionStarted>(), listeners);
    }

    #[test]
    fn test_rocks_wrap_inside_virtual_bounds() {
        let mut engine = Engine::new(headless_config()).unwrap();
        let mut game = DriftGame::new(5);
        engine.boot(&mut game).unwrap();
        engine.run_frames(&mut game, 240, FRAME_TIME).unwrap();

        let width = engine.config.display.virtual_width as f32;
        let height = engine.config.display.virtual_height as f32;
        for (entity, _) in engine.world.view::<Drift>() {
            let t = engine.world.get::<Transform>(entity).unwrap();
            assert!((0.0..width).contains(&t.actual_x));
            assert!((0.0..height).contains(&t.actual_y));
        }
    }
}
