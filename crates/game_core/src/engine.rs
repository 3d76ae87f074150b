//! Frame orchestrator
//!
//! [`Engine`] owns every runtime subsystem and drives them in a fixed order.
//! Each fixed step runs the physics substeps, rebuilds the collision
//! indices (publishing collision events), advances timers, runs the script
//! `update` hook, applies queued script commands, then advances springs,
//! second-order smoothers and animation queues. After the fixed steps the
//! frame update runs once with the scaled delta, followed by hot reload,
//! the Lua GC step, save callbacks, deferred bus events and the draw.

use std::rc::Rc;
use std::sync::Arc;

use thiserror::Error;

use crate::animation::{
    update_all_second_order, update_all_springs, update_animations, AnimationFrame, AnimationObject,
    AnimationQueueComponent, Easing, Spring,
};
use crate::application::{AppError, AppEvent, Application};
use crate::audio::{NullSound, SoundSystem};
use crate::core::RuntimeConfig;
use crate::diagnostics::{CrashReporter, Telemetry};
use crate::ecs::components::{
    remove_entity, ActiveStates, CollisionFilter, GameObject, LayerOrderComponent,
    ScreenSpaceCollisionMarker, StateTag, Transform,
};
use crate::ecs::{Entity, World};
use crate::events::{EntityCreated, EntityDestroyed, EventBus, GameState};
use crate::foundation::math::{Rect, Vec2};
use crate::foundation::time::MainLoop;
use crate::input::{ControllerNavManager, GameStateMachine, InputState, RawInput};
use crate::physics::{CollisionSystem, NullPhysics, PhysicsManager};
use crate::render::{
    composite, draw_layer_commands_to_specific_canvas, present, Camera2D, Canvas, DrawContext,
    DrawPayload, LayerRegistry, Letterbox, ShaderRegistry, Space, BACKGROUND_LAYER, FINAL_LAYER,
    MAIN_CANVAS, SPRITES_LAYER, UI_LAYER,
};
use crate::save::SaveIo;
use crate::scripting::{ScriptCommand, ScriptVm};
use crate::timer::TimerSystem;
use crate::ui::Localization;

/// Stiffness used when a script retargets a spring by duration
const TIMED_SPRING_STIFFNESS: f32 = 100.0;
/// Damping used when a script retargets a spring by duration
const TIMED_SPRING_DAMPING: f32 = 10.0;

/// Main engine struct that owns all subsystems
pub struct Engine {
    /// Configuration the engine was built with
    pub config: RuntimeConfig,
    /// Entity store
    pub world: World,
    /// Event bus shared with timers and script listeners
    pub bus: Rc<EventBus>,
    /// State tags currently switched on
    pub active_states: ActiveStates,
    /// Frame clock
    pub main_loop: MainLoop,
    /// World and UI broadphase
    pub collision: CollisionSystem,
    /// Physics collaborator
    pub physics: Box<dyn PhysicsManager>,
    /// Draw layers
    pub layers: LayerRegistry,
    /// Loaded shaders
    pub shaders: ShaderRegistry,
    /// Camera for world-space draws
    pub camera: Camera2D,
    /// Lua VM
    pub vm: ScriptVm,
    /// Input snapshot
    pub input: InputState,
    /// Top-level game state and pause flag
    pub game_state: GameStateMachine,
    /// Controller focus navigation
    pub nav: ControllerNavManager,
    /// Fixed-step timers
    pub timers: TimerSystem,
    /// Localized strings and language callbacks
    pub localization: Localization,
    /// Sound collaborator
    pub sound: Box<dyn SoundSystem>,
    /// Asynchronous save writes
    pub save_io: SaveIo,
    /// Analytics client; disabled unless replaced
    pub telemetry: Arc<Telemetry>,

    crash_reporter: Option<Arc<CrashReporter>>,
    backbuffer: Canvas,
    letterbox: Letterbox,
    shader_scan_elapsed: f32,
    reload_pending: bool,
    running: bool,
}

impl Engine {
    /// Create an engine with the null physics and sound collaborators
    pub fn new(config: RuntimeConfig) -> Result<Self, EngineError> {
        Self::with_collaborators(
            config,
            Box::new(NullPhysics::default()),
            Box::new(NullSound::default()),
        )
    }

    /// Create an engine around the given physics and sound backends
    pub fn with_collaborators(
        config: RuntimeConfig,
        physics: Box<dyn PhysicsManager>,
        sound: Box<dyn SoundSystem>,
    ) -> Result<Self, EngineError> {
        log::info!("Initializing runtime core");

        let vm = ScriptVm::new(config.scripting.clone()).map_err(|e| {
            EngineError::InitializationFailed(format!("Failed to create script VM: {}", e))
        })?;

        let (vw, vh) = (config.display.virtual_width.max(1), config.display.virtual_height.max(1));
        let mut engine = Self {
            world: World::new(),
            bus: Rc::new(EventBus::new()),
            active_states: ActiveStates::default(),
            main_loop: MainLoop::new(&config.main_loop),
            collision: CollisionSystem::new(),
            physics,
            layers: LayerRegistry::new(),
            shaders: ShaderRegistry::new(),
            camera: Camera2D::default(),
            vm,
            input: InputState::new(),
            game_state: GameStateMachine::default(),
            nav: ControllerNavManager::new(),
            timers: TimerSystem::new(),
            localization: Localization::default(),
            sound,
            save_io: SaveIo::new(),
            telemetry: Arc::new(Telemetry::disabled()),
            crash_reporter: None,
            backbuffer: Canvas::new(vw, vh),
            letterbox: Letterbox::compute(vw as f32, vh as f32, vw as f32, vh as f32),
            shader_scan_elapsed: 0.0,
            reload_pending: false,
            running: true,
            config,
        };
        engine.load_shaders();

        log::info!("Runtime core initialized");
        Ok(engine)
    }

    /// Start scripts and build the game for the first time
    pub fn boot<A: Application>(&mut self, app: &mut A) -> Result<(), EngineError> {
        self.start_scripts();
        self.init_game(app)
    }

    /// Run `frames` frames of `frame_time` seconds each, stopping early on quit.
    ///
    /// Returns the number of frames actually run.
    pub fn run_frames<A: Application>(
        &mut self,
        app: &mut A,
        frames: u64,
        frame_time: f32,
    ) -> Result<u64, EngineError> {
        let mut ran = 0;
        while self.running && ran < frames {
            self.frame(app, frame_time)?;
            ran += 1;
        }
        Ok(ran)
    }

    /// Stop the engine and let the game clean up
    pub fn shutdown<A: Application>(&mut self, app: &mut A) {
        self.running = false;
        app.cleanup(self);
        log::info!("Engine shut down after {} fixed steps", self.main_loop.frame);
    }

    /// One outer tick: fixed steps, the frame update, then the draw
    pub fn frame<A: Application>(&mut self, app: &mut A, frame_time: f32) -> Result<(), EngineError> {
        if self.reload_pending {
            self.reload_pending = false;
            self.reinitialize_game(app)?;
        }

        self.main_loop.set_paused(self.game_state.is_paused());
        let raw = self.main_loop.begin_tick(frame_time);
        while self.main_loop.try_fixed_step() {
            self.fixed_step(app)?;
        }

        let dt = self.main_loop.scaled_step();
        app.update(self, dt).map_err(EngineError::from_app)?;

        self.hot_reload(raw);
        self.vm.gc_step();
        self.save_io.process_pending_callbacks();
        self.bus.flush_queued();

        self.draw(app)?;
        self.input.begin_frame();
        self.main_loop.end_tick();
        Ok(())
    }

    fn fixed_step<A: Application>(&mut self, app: &mut A) -> Result<(), EngineError> {
        let dt = self.main_loop.fixed_delta();
        let sub = self.main_loop.sub_delta();
        for _ in 0..self.main_loop.substeps {
            self.physics.step_all(sub);
        }

        self.collision
            .update(&self.world, &self.active_states, &self.config.display, &self.bus);
        self.timers.update(dt);

        self.vm.update(dt);
        self.apply_script_commands();
        app.fixed_update(self, dt).map_err(EngineError::from_app)?;

        update_all_springs(&mut self.world, &self.active_states, dt);
        update_all_second_order(&mut self.world, &self.active_states, dt);
        update_animations(&mut self.world, &self.active_states, dt);
        Ok(())
    }

    fn hot_reload(&mut self, raw_delta: f32) {
        let reloaded = self.vm.scan_and_reload(raw_delta);
        if !reloaded.is_empty() {
            log::info!("Hot reloaded: {}", reloaded.join(", "));
        }

        let interval = self.config.scripting.hot_reload_interval;
        if interval <= 0.0 {
            return;
        }
        self.shader_scan_elapsed += raw_delta;
        if self.shader_scan_elapsed >= interval {
            self.shader_scan_elapsed = 0.0;
            let swapped = self.shaders.hot_reload();
            if !swapped.is_empty() {
                log::info!("Reloaded shaders: {}", swapped.join(", "));
            }
        }
    }

    fn draw<A: Application>(&mut self, app: &mut A) -> Result<(), EngineError> {
        self.layers.begin();
        self.queue_entity_draws();
        app.render(self).map_err(EngineError::from_app)?;

        let ctx = DrawContext {
            world: &self.world,
            camera: Some(&self.camera),
            shaders: &self.shaders,
        };
        for name in [BACKGROUND_LAYER, SPRITES_LAYER, UI_LAYER] {
            if let Some(layer) = self.layers.get_mut(name) {
                draw_layer_commands_to_specific_canvas(layer, MAIN_CANVAS, &ctx)
                    .map_err(|e| EngineError::RenderError(e.to_string()))?;
            }
        }

        composite(&mut self.layers, &self.shaders).map_err(|e| EngineError::RenderError(e.to_string()))?;
        self.letterbox = present(&self.layers, &mut self.backbuffer)
            .map_err(|e| EngineError::RenderError(e.to_string()))?;
        Ok(())
    }

    /// Queue one animation draw per active entity: UI entities in screen
    /// space on the UI layer, everything else in world space on sprites
    fn queue_entity_draws(&mut self) {
        let mut draws = Vec::new();
        for entity in self.world.entities_with::<AnimationQueueComponent>() {
            if !self.world.has::<Transform>(entity)
                || !self.active_states.is_entity_active(&self.world, entity)
            {
                continue;
            }
            let z = self
                .world
                .get::<LayerOrderComponent>(entity)
                .map_or(0, |o| o.z_index);
            let (layer, space) = if self.world.has::<ScreenSpaceCollisionMarker>(entity) {
                (UI_LAYER, Space::Screen)
            } else {
                (SPRITES_LAYER, Space::World)
            };
            draws.push((layer, entity, z, space));
        }

        for (layer, entity, z, space) in draws {
            if let Some(layer) = self.layers.get_mut(layer) {
                layer.queue(DrawPayload::DrawTransformEntityAnimation { entity }, z, space);
            }
        }
    }

    /// Create background, sprites, UI and final layers at the virtual size
    pub fn create_standard_layers(&mut self) {
        let (w, h) = (self.config.display.virtual_width, self.config.display.virtual_height);
        for (z, name) in [BACKGROUND_LAYER, SPRITES_LAYER, UI_LAYER, FINAL_LAYER]
            .into_iter()
            .enumerate()
        {
            self.layers.create_layer(name, w, h, z as i32);
        }
    }

    fn load_shaders(&mut self) -> usize {
        let Some(manifest) = self.config.shaders.manifest_path.clone() else {
            return 0;
        };
        match self.shaders.load_manifest(&manifest, &self.config.shaders.shader_dir) {
            Ok(count) => count,
            Err(e) => {
                log::error!("Failed to load shader manifest {}: {}", manifest, e);
                0
            }
        }
    }

    fn start_scripts(&mut self) {
        self.vm.install_bus_bridge(&self.bus);
        if let Err(e) = self.vm.load_entry() {
            log::error!("Script entry '{}' failed: {}", self.config.scripting.entry_module, e);
        }
    }

    fn init_game<A: Application>(&mut self, app: &mut A) -> Result<(), EngineError> {
        self.create_standard_layers();
        app.initialize(self).map_err(EngineError::from_app)?;
        self.note_game_state();
        Ok(())
    }

    /// Tear every subsystem down and boot the game again.
    ///
    /// The order is fixed: listeners and timers go first so nothing fires
    /// into half-destroyed state, entities go before the layers and shaders
    /// their draws reference, and the script VM is rebuilt before the game
    /// init that may call into it.
    pub fn reinitialize_game<A: Application>(&mut self, app: &mut A) -> Result<(), EngineError> {
        log::info!("Re-initializing game");

        // 1. timers, bus listeners, language callbacks
        self.timers.clear();
        self.bus.clear();
        self.localization.clear_callbacks();

        // 2. entities
        for entity in self.world.entities_with::<Transform>() {
            remove_entity(&mut self.world, entity);
        }
        self.world.clear();

        // 3. physics worlds and layers
        self.physics.clear_worlds();
        self.layers.unload_all();

        // 4. render and shader state
        self.layers.begin();
        for name in [UI_LAYER, SPRITES_LAYER, BACKGROUND_LAYER] {
            if let Some(layer) = self.layers.get_mut(name) {
                layer.clear_shaders();
            }
        }
        self.shaders.unload_all();
        let shader_count = self.load_shaders();
        log::debug!("Re-init reloaded {} shaders", shader_count);

        // 5. controller navigation
        self.nav.reset();

        // 6. script VM
        self.vm
            .reset()
            .map_err(|e| EngineError::ScriptError(format!("VM reset failed: {}", e)))?;
        self.start_scripts();

        // 7. collision indices
        self.collision.clear();

        // 8. sound, input, game
        self.sound.reset();
        self.input.reset();
        self.init_game(app)?;

        log::info!("Game re-initialized");
        Ok(())
    }

    /// Apply every command scripts queued since the last step
    pub fn apply_script_commands(&mut self) -> usize {
        let commands = self.vm.drain_commands();
        let count = commands.len();
        for command in commands {
            self.apply_command(command);
        }
        count
    }

    fn live(&self, id: u64) -> Option<Entity> {
        let entity = Entity::from_id(id);
        if self.world.valid(entity) {
            Some(entity)
        } else {
            log::debug!("Script command for stale entity {}", id);
            None
        }
    }

    fn apply_command(&mut self, command: ScriptCommand) {
        match command {
            ScriptCommand::Spawn { kind, x, y, w, h, ui } => {
                self.spawn(&kind, Transform::new(x, y, w, h), ui);
            }
            ScriptCommand::Destroy { id } => {
                if let Some(entity) = self.live(id) {
                    self.destroy(entity);
                }
            }
            ScriptCommand::SetPosition { id, x, y } => self.edit_transform(id, |t| {
                t.actual_x = x;
                t.actual_y = y;
            }),
            ScriptCommand::SetSize { id, w, h } => self.edit_transform(id, |t| {
                t.actual_w = w;
                t.actual_h = h;
            }),
            ScriptCommand::SetRotation { id, radians } => {
                self.edit_transform(id, |t| t.actual_rotation = radians);
            }
            ScriptCommand::SetCollisionEnabled { id, enabled } => {
                let Some(entity) = self.live(id) else { return };
                if let Some(go) = self.world.get_mut::<GameObject>(entity) {
                    go.state.collision_enabled = enabled;
                    self.physics.apply_authoritative_physics(&mut self.world, entity);
                }
            }
            ScriptCommand::SetCollisionFilter { id, category, mask } => {
                let Some(entity) = self.live(id) else { return };
                self.world.emplace(entity, CollisionFilter::new(category, mask));
                self.physics.apply_authoritative_physics(&mut self.world, entity);
            }
            ScriptCommand::QueueAnimation {
                id,
                name,
                frames,
                frame_duration,
            } => {
                let Some(entity) = self.live(id) else { return };
                let Some(queue) = self.world.get_mut::<AnimationQueueComponent>(entity) else {
                    log::debug!("queue_animation: {:?} has no animation queue", entity);
                    return;
                };
                let frames = frames
                    .into_iter()
                    .map(|sprite| AnimationFrame::new(sprite, frame_duration))
                    .collect();
                queue.queue_animation(AnimationObject::new(name, frames));
            }
            ScriptCommand::SetGameState { state } => match GameState::from_name(&state) {
                Some(to) => {
                    self.change_state(to);
                }
                None => log::warn!("Unknown game state '{}'", state),
            },
            ScriptCommand::ActivateState { name } => self.active_states.activate(name),
            ScriptCommand::DeactivateState { name } => self.active_states.deactivate(&name),
            ScriptCommand::PullSpring { id, force } => {
                if let Some(spring) = self.spring_for(id) {
                    spring.pull(force, None, None);
                }
            }
            ScriptCommand::AnimateSpring { id, target, time } => {
                let Some(spring) = self.spring_for(id) else { return };
                match time {
                    Some(time) => spring.animate_to_target_with_time(
                        target,
                        time,
                        Easing::Linear,
                        TIMED_SPRING_STIFFNESS,
                        TIMED_SPRING_DAMPING,
                    ),
                    None => {
                        let (stiffness, damping) = (spring.stiffness, spring.damping);
                        spring.animate_to_target(target, stiffness, damping);
                    }
                }
            }
            ScriptCommand::RecordTelemetry { name, properties } => {
                self.telemetry.record_event(&name, properties);
            }
        }
    }

    fn edit_transform(&mut self, id: u64, edit: impl FnOnce(&mut Transform)) {
        let Some(entity) = self.live(id) else { return };
        let Some(transform) = self.world.get_mut::<Transform>(entity) else {
            log::debug!("{:?} has no transform", entity);
            return;
        };
        edit(transform);
        self.physics.apply_authoritative_transform(&mut self.world, entity);
    }

    /// The entity's spring, attaching a transform-preset spring at rest if it has none
    fn spring_for(&mut self, id: u64) -> Option<&mut Spring> {
        let entity = self.live(id)?;
        if !self.world.has::<Spring>(entity) {
            self.world.emplace(entity, Spring::for_transform(0.0));
        }
        self.world.get_mut::<Spring>(entity)
    }

    /// Create an entity with the components every per-frame system expects.
    ///
    /// `ui` entities collide and draw in screen space.
    pub fn spawn(&mut self, kind: &str, transform: Transform, ui: bool) -> Entity {
        let entity = self.world.create();
        self.world.emplace(entity, transform);
        self.world.emplace(entity, GameObject::default());
        self.world.emplace(entity, StateTag::default());
        self.world.emplace(entity, CollisionFilter::default());
        self.world.emplace(
            entity,
            AnimationQueueComponent::new(AnimationObject::new(
                "default",
                vec![AnimationFrame::new(kind, 1.0)],
            )),
        );
        if ui {
            self.world.emplace(entity, ScreenSpaceCollisionMarker);
        }
        self.physics.apply_authoritative_transform(&mut self.world, entity);
        self.bus.publish(&EntityCreated {
            entity,
            kind: kind.to_string(),
        });
        entity
    }

    /// Destroy an entity and drop it from navigation; false when stale
    pub fn destroy(&mut self, entity: Entity) -> bool {
        if !self.world.valid(entity) {
            return false;
        }
        self.nav.remove_element(entity);
        remove_entity(&mut self.world, entity);
        if self.world.valid(entity) {
            self.world.destroy(entity);
        }
        self.bus.publish(&EntityDestroyed { entity });
        true
    }

    /// Move the game state machine; rejected transitions are logged
    pub fn change_state(&mut self, to: GameState) -> bool {
        match self.game_state.change_state(to, &self.bus) {
            Ok(changed) => {
                if changed {
                    self.note_game_state();
                }
                changed
            }
            Err(e) => {
                log::warn!("{}", e);
                false
            }
        }
    }

    fn note_game_state(&self) {
        if let Some(reporter) = &self.crash_reporter {
            reporter.set_game_context("game_state", self.game_state.current().name());
        }
    }

    /// Pause or resume simulation time
    pub fn set_paused(&mut self, paused: bool) {
        if paused {
            self.game_state.pause();
        } else {
            self.game_state.resume();
        }
        self.main_loop.set_paused(paused);
    }

    /// Handle a platform event.
    ///
    /// A reload request is deferred to the start of the next frame.
    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::WindowResized { width, height } => {
                log::info!("Window resized to {}x{}", width, height);
                self.backbuffer = Canvas::new(width.max(1), height.max(1));
                self.letterbox = Letterbox::compute(
                    self.config.display.virtual_width as f32,
                    self.config.display.virtual_height as f32,
                    self.backbuffer.width() as f32,
                    self.backbuffer.height() as f32,
                );
            }
            AppEvent::WindowCloseRequested => {
                log::info!("Close requested");
                self.quit();
            }
            AppEvent::Input(raw) => self.handle_input(raw),
            AppEvent::ReloadRequested => self.request_reload(),
        }
    }

    /// Fold one window-space input event into the snapshot.
    ///
    /// Cursor positions are mapped through the letterbox into virtual
    /// coordinates; clicks target the topmost UI entity under the cursor.
    pub fn handle_input(&mut self, raw: RawInput) {
        let letterbox = self.letterbox;
        let to_virtual = |p: Vec2| {
            let (x, y) = letterbox.screen_to_virtual(p.x, p.y);
            Vec2::new(x, y)
        };
        let raw = match raw {
            RawInput::MouseDown { button, position } => RawInput::MouseDown {
                button,
                position: to_virtual(position),
            },
            RawInput::MouseUp { button, position } => RawInput::MouseUp {
                button,
                position: to_virtual(position),
            },
            RawInput::MouseMove { position } => RawInput::MouseMove {
                position: to_virtual(position),
            },
            other => other,
        };

        let collision = &self.collision;
        let world = &self.world;
        let pick = |p: Vec2| {
            collision
                .query_ui(&Rect::new(p.x, p.y, 0.0, 0.0))
                .into_iter()
                .filter(|e| world.valid(*e))
                .max_by_key(|e| world.get::<LayerOrderComponent>(*e).map_or(0, |o| o.z_index))
        };
        self.input.process(&raw, &self.bus, &pick);
    }

    /// Re-initialize at the start of the next frame
    pub fn request_reload(&mut self) {
        self.reload_pending = true;
    }

    /// Whether a re-init is queued
    pub fn reload_pending(&self) -> bool {
        self.reload_pending
    }

    /// Stop the frame loop
    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Whether the frame loop should keep going
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Replace the telemetry client
    pub fn set_telemetry(&mut self, telemetry: Arc<Telemetry>) {
        self.telemetry = telemetry;
    }

    /// Record game context into crash reports
    pub fn set_crash_reporter(&mut self, reporter: Arc<CrashReporter>) {
        self.crash_reporter = Some(reporter);
        self.note_game_state();
    }

    /// Window-sized image presented last frame
    pub fn backbuffer(&self) -> &Canvas {
        &self.backbuffer
    }

    /// Letterbox used for the last present
    pub fn letterbox(&self) -> Letterbox {
        self.letterbox
    }
}

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Initialization error
    #[error("Engine initialization failed: {0}")]
    InitializationFailed(String),

    /// Rendering error
    #[error("Rendering error: {0}")]
    RenderError(String),

    /// Script VM error outside a guarded call
    #[error("Script error: {0}")]
    ScriptError(String),

    /// Application error
    #[error("Application error: {0}")]
    ApplicationError(String),
}

impl EngineError {
    fn from_app(error: AppError) -> Self {
        match error {
            AppError::Engine(inner) => inner,
            other => Self::ApplicationError(other.to_string()),
        }
    }
}
