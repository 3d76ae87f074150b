//! Records every script-callable binding and renders a LuaLS `---@meta`
//! definitions file from them.
//!
//! Binding through the recorder is the only way engine functions reach
//! Lua, so the dump is a complete description of the scripting surface.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use mlua::{Function, Lua, Table};

/// One documented function parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDef {
    /// Parameter name
    pub name: String,
    /// Lua type annotation, e.g. `number` or `string?`
    pub ty: String,
}

/// A recorded function binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    /// Function name within its module
    pub name: String,
    /// One-line description
    pub doc: String,
    /// Parameters in call order
    pub params: Vec<ParamDef>,
    /// Return annotation, if any
    pub returns: Option<String>,
}

impl FunctionDef {
    /// Undocumented function with no parameters
    pub fn new(name: impl Into<String>, doc: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: doc.into(),
            params: Vec::new(),
            returns: None,
        }
    }

    /// Builder: add a parameter
    pub fn param(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.params.push(ParamDef {
            name: name.into(),
            ty: ty.into(),
        });
        self
    }

    /// Builder: set the return annotation
    pub fn returns(mut self, ty: impl Into<String>) -> Self {
        self.returns = Some(ty.into());
        self
    }
}

/// Registry of bound functions grouped by dotted module path
#[derive(Debug, Default)]
pub struct BindingRecorder {
    module_name: String,
    module_version: String,
    modules: BTreeMap<String, Vec<FunctionDef>>,
}

impl BindingRecorder {
    /// Empty recorder describing `module_name`
    pub fn new(module_name: impl Into<String>, module_version: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            module_version: module_version.into(),
            modules: BTreeMap::new(),
        }
    }

    /// Record a definition without binding anything
    pub fn record(&mut self, path: &[&str], def: FunctionDef) {
        self.modules.entry(path.join(".")).or_default().push(def);
    }

    /// Install `function` at `path.name` in the Lua globals and record it
    pub fn bind(&mut self, lua: &Lua, path: &[&str], function: Function, def: FunctionDef) -> mlua::Result<()> {
        let table = table_at(lua, path)?;
        table.set(def.name.as_str(), function)?;
        self.record(path, def);
        Ok(())
    }

    /// Forget everything recorded
    pub fn clear(&mut self) {
        self.modules.clear();
    }

    /// Total number of recorded functions
    pub fn len(&self) -> usize {
        self.modules.values().map(Vec::len).sum()
    }

    /// True when nothing is recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a recorded definition by dotted path, e.g. `engine.spawn`
    pub fn find(&self, qualified: &str) -> Option<&FunctionDef> {
        let (module, name) = qualified.rsplit_once('.').unwrap_or(("", qualified));
        self.modules.get(module)?.iter().find(|d| d.name == name)
    }

    /// Render the definitions file
    pub fn render_defs(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "---@meta\n");
        let _ = writeln!(out, "-- {} bindings, version {}\n", self.module_name, self.module_version);

        for (module, functions) in &self.modules {
            if !module.is_empty() {
                let _ = writeln!(out, "---@class {}", module);
                let _ = writeln!(out, "{} = {{}}\n", module);
            }
            for def in functions {
                let _ = writeln!(out, "--- {}", def.doc);
                for p in &def.params {
                    let _ = writeln!(out, "---@param {} {}", p.name, p.ty);
                }
                if let Some(ret) = &def.returns {
                    let _ = writeln!(out, "---@return {}", ret);
                }
                let params: Vec<&str> = def.params.iter().map(|p| p.name.as_str()).collect();
                let qualified = if module.is_empty() {
                    def.name.clone()
                } else {
                    format!("{}.{}", module, def.name)
                };
                let _ = writeln!(out, "function {}({}) end\n", qualified, params.join(", "));
            }
        }
        out
    }

    /// Write [`render_defs`](Self::render_defs) to `path`
    pub fn dump_lua_defs(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let path = path.as_ref();
        log::info!("dump_lua_defs: writing '{}'", path.display());
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.render_defs())
    }
}

/// Walk (creating as needed) nested global tables along `path`
fn table_at(lua: &Lua, path: &[&str]) -> mlua::Result<Table> {
    let mut table = lua.globals();
    for segment in path {
        let child = match table.get::<Option<Table>>(*segment)? {
            Some(t) => t,
            None => {
                let t = lua.create_table()?;
                table.set(*segment, t.clone())?;
                t
            }
        };
        table = child;
    }
    Ok(table)
}
