//! Forwards core bus events into the script `events` table
//!
//! Installing the bridge subscribes one listener per forwarded event type.
//! Each listener converts the event into a Lua table and hands it to
//! `events.dispatch(name, payload)` through [`safe_call_function`]. The
//! install is one-shot; a second call is a no-op until the bridge is torn
//! down with the VM.

use std::rc::{Rc, Weak};

use mlua::{Function, Lua, Table};

use super::safe_call::safe_call_function;
use crate::events::{
    CollisionEnded, CollisionStarted, EventBus, GameStateChanged, KeyPressed, ListenerId,
    LoadingStageCompleted, LoadingStageStarted, MouseClicked, UIButtonActivated, UIElementFocused,
    UIScaleChanged,
};

/// An event that scripts can observe
pub trait LuaEvent: Clone + 'static {
    /// Name passed to `events.dispatch`
    const NAME: &'static str;

    /// Copy the event's fields into `table`
    fn fill(&self, table: &Table) -> mlua::Result<()>;
}

impl LuaEvent for MouseClicked {
    const NAME: &'static str = "mouse_clicked";

    fn fill(&self, table: &Table) -> mlua::Result<()> {
        table.set("x", self.position.x)?;
        table.set("y", self.position.y)?;
        table.set("button", self.button)?;
        table.set("target", self.target.map(|e| e.id()))
    }
}

impl LuaEvent for KeyPressed {
    const NAME: &'static str = "key_pressed";

    fn fill(&self, table: &Table) -> mlua::Result<()> {
        table.set("key_code", self.key_code)?;
        table.set("shift", self.shift)?;
        table.set("ctrl", self.ctrl)?;
        table.set("alt", self.alt)
    }
}

impl LuaEvent for UIScaleChanged {
    const NAME: &'static str = "ui_scale_changed";

    fn fill(&self, table: &Table) -> mlua::Result<()> {
        table.set("scale", self.scale)
    }
}

impl LuaEvent for UIElementFocused {
    const NAME: &'static str = "ui_element_focused";

    fn fill(&self, table: &Table) -> mlua::Result<()> {
        table.set("element", self.element.id())
    }
}

impl LuaEvent for UIButtonActivated {
    const NAME: &'static str = "ui_button_activated";

    fn fill(&self, table: &Table) -> mlua::Result<()> {
        table.set("element", self.element.id())?;
        table.set("button", self.button)
    }
}

impl LuaEvent for LoadingStageStarted {
    const NAME: &'static str = "loading_stage_started";

    fn fill(&self, table: &Table) -> mlua::Result<()> {
        table.set("stage_id", self.stage_id.as_str())
    }
}

impl LuaEvent for LoadingStageCompleted {
    const NAME: &'static str = "loading_stage_completed";

    fn fill(&self, table: &Table) -> mlua::Result<()> {
        table.set("stage_id", self.stage_id.as_str())?;
        table.set("success", self.success)?;
        table.set("error", self.error.as_deref())
    }
}

impl LuaEvent for CollisionStarted {
    const NAME: &'static str = "collision_started";

    fn fill(&self, table: &Table) -> mlua::Result<()> {
        table.set("a", self.a.id())?;
        table.set("b", self.b.id())?;
        table.set("x", self.point.x)?;
        table.set("y", self.point.y)
    }
}

impl LuaEvent for CollisionEnded {
    const NAME: &'static str = "collision_ended";

    fn fill(&self, table: &Table) -> mlua::Result<()> {
        table.set("a", self.a.id())?;
        table.set("b", self.b.id())
    }
}

impl LuaEvent for GameStateChanged {
    const NAME: &'static str = "game_state_changed";

    fn fill(&self, table: &Table) -> mlua::Result<()> {
        table.set("old", self.old.name())?;
        table.set("new", self.new.name())
    }
}

/// Hand one event to `events.dispatch` in `lua`
pub fn dispatch_to_lua<E: LuaEvent>(lua: &Lua, event: &E) -> Result<(), String> {
    let dispatch = lua
        .globals()
        .get::<Option<Table>>("events")
        .and_then(|events| match events {
            Some(events) => events.get::<Option<Function>>("dispatch"),
            None => Ok(None),
        })
        .map_err(|e| e.to_string())?;
    let Some(dispatch) = dispatch else {
        return Err(format!("[{}] events.dispatch is not defined", E::NAME));
    };
    let payload = lua.create_table().map_err(|e| e.to_string())?;
    event.fill(&payload).map_err(|e| e.to_string())?;
    safe_call_function::<_, ()>(&dispatch, "events.dispatch", E::NAME, (E::NAME, payload))
}

/// One-shot set of bus listeners feeding the script VM
#[derive(Debug, Default)]
pub struct BusBridge {
    installed: bool,
    listeners: Vec<ListenerId>,
}

impl BusBridge {
    /// Not yet installed
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the listeners are registered
    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Subscribe the forwarding listeners; false if already installed
    pub fn install(&mut self, bus: &EventBus, lua: &Rc<Lua>) -> bool {
        if self.installed {
            log::debug!("bus bridge already installed");
            return false;
        }
        let weak = Rc::downgrade(lua);
        self.listeners = vec![
            forward::<MouseClicked>(bus, &weak),
            forward::<KeyPressed>(bus, &weak),
            forward::<UIScaleChanged>(bus, &weak),
            forward::<UIElementFocused>(bus, &weak),
            forward::<UIButtonActivated>(bus, &weak),
            forward::<LoadingStageStarted>(bus, &weak),
            forward::<LoadingStageCompleted>(bus, &weak),
            forward::<CollisionStarted>(bus, &weak),
            forward::<CollisionEnded>(bus, &weak),
            forward::<GameStateChanged>(bus, &weak),
        ];
        self.installed = true;
        log::info!("bus bridge installed ({} listeners)", self.listeners.len());
        true
    }

    /// Drop the listeners and re-arm the one-shot flag
    pub fn uninstall(&mut self, bus: &EventBus) {
        for id in self.listeners.drain(..) {
            bus.unsubscribe(id);
        }
        self.installed = false;
    }

    /// Re-arm without touching a bus that has already been cleared
    pub fn reset(&mut self) {
        self.listeners.clear();
        self.installed = false;
    }
}

fn forward<E: LuaEvent>(bus: &EventBus, lua: &Weak<Lua>) -> ListenerId {
    let lua = lua.clone();
    bus.subscribe(move |event: &E| {
        if let Some(lua) = lua.upgrade() {
            let _ = dispatch_to_lua(&lua, event);
        }
    })
}
