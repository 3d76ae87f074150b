//! Shader registry backed by a JSON manifest
//!
//! The manifest maps logical names to vertex/fragment source paths, with an
//! optional `web` pair used instead on wasm targets. Sources are checked for
//! existence and content at load time and their modification times are
//! remembered so `hot_reload` can swap a shader when either file changes.
//!
//! The software backend compiles a fragment source by reading its
//! `// effect: <name> [args]` directive and mapping it onto a builtin
//! per-pixel effect.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::SystemTime;

use serde::Deserialize;
use thiserror::Error;

use crate::foundation::math::Color;

/// Errors raised while loading or compiling shaders
#[derive(Error, Debug)]
pub enum ShaderError {
    /// Reading a manifest or source failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The manifest is not valid JSON of the expected shape
    #[error("Invalid shader manifest: {0}")]
    Manifest(String),

    /// A listed source file does not exist
    #[error("Shader '{name}' source not found: {}", .path.display())]
    MissingSource {
        /// Logical shader name
        name: String,
        /// Resolved path
        path: PathBuf,
    },

    /// A listed source file is empty
    #[error("Shader '{name}' source is empty: {}", .path.display())]
    EmptySource {
        /// Logical shader name
        name: String,
        /// Resolved path
        path: PathBuf,
    },

    /// The fragment source names an effect this backend lacks
    #[error("Shader '{name}' uses unknown effect '{effect}'")]
    UnknownEffect {
        /// Logical shader name
        name: String,
        /// Directive text
        effect: String,
    },
}

/// A per-pixel program run during canvas blits
pub trait PixelShader {
    /// Logical name
    fn name(&self) -> &str;

    /// Output color for the source pixel at `(x, y)`
    fn shade(&self, color: Color, x: u32, y: u32) -> Color;
}

/// Builtin effects available to the software backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderEffect {
    /// Output equals input
    Passthrough,
    /// Multiply by a color
    Tint(Color),
    /// Luma grayscale, alpha kept
    Grayscale,
    /// Invert RGB, alpha kept
    Invert,
    /// Every pixel becomes this color
    SolidFill(Color),
}

impl ShaderEffect {
    /// Parse `<name> [r g b a]`
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split_whitespace();
        let name = parts.next()?;
        let channels: Vec<u8> = parts.filter_map(|p| p.parse().ok()).collect();
        let color = || match channels.as_slice() {
            [r, g, b, a] => Some(Color::rgba(*r, *g, *b, *a)),
            [r, g, b] => Some(Color::rgba(*r, *g, *b, 255)),
            _ => None,
        };
        match name {
            "passthrough" => Some(Self::Passthrough),
            "grayscale" => Some(Self::Grayscale),
            "invert" => Some(Self::Invert),
            "tint" => color().map(Self::Tint),
            "solid_fill" => color().map(Self::SolidFill),
            _ => None,
        }
    }

    /// Apply to one pixel
    pub fn apply(self, c: Color) -> Color {
        match self {
            Self::Passthrough => c,
            Self::Tint(t) => {
                let m = |a: u8, b: u8| ((u16::from(a) * u16::from(b) + 127) / 255) as u8;
                Color::rgba(m(c.r, t.r), m(c.g, t.g), m(c.b, t.b), m(c.a, t.a))
            }
            Self::Grayscale => {
                let l = (0.299 * f32::from(c.r) + 0.587 * f32::from(c.g) + 0.114 * f32::from(c.b))
                    .round()
                    .clamp(0.0, 255.0) as u8;
                Color::rgba(l, l, l, c.a)
            }
            Self::Invert => Color::rgba(255 - c.r, 255 - c.g, 255 - c.b, c.a),
            Self::SolidFill(fill) => fill,
        }
    }
}

/// Shader compiled by the software backend
#[derive(Debug, Clone)]
pub struct SoftwareShader {
    name: String,
    effect: ShaderEffect,
}

impl SoftwareShader {
    /// Shader running `effect`
    pub fn new(name: impl Into<String>, effect: ShaderEffect) -> Self {
        Self {
            name: name.into(),
            effect,
        }
    }

    /// Compile fragment source text; without a directive the shader passes through
    pub fn compile(name: &str, fragment_source: &str) -> Result<Self, ShaderError> {
        let directive = fragment_source
            .lines()
            .filter_map(|l| l.trim().strip_prefix("//"))
            .find_map(|l| l.trim().strip_prefix("effect:"));
        let effect = match directive {
            Some(text) => ShaderEffect::parse(text).ok_or_else(|| ShaderError::UnknownEffect {
                name: name.to_string(),
                effect: text.trim().to_string(),
            })?,
            None => {
                log::debug!("Shader '{}' has no effect directive, using passthrough", name);
                ShaderEffect::Passthrough
            }
        };
        Ok(Self::new(name, effect))
    }

    /// Effect run per pixel
    pub fn effect(&self) -> ShaderEffect {
        self.effect
    }
}

impl PixelShader for SoftwareShader {
    fn name(&self) -> &str {
        &self.name
    }

    fn shade(&self, color: Color, _x: u32, _y: u32) -> Color {
        self.effect.apply(color)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SourcePair {
    vertex: String,
    fragment: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ManifestEntry {
    vertex: String,
    fragment: String,
    #[serde(default)]
    web: Option<SourcePair>,
}

impl ManifestEntry {
    fn paths_for_target(&self) -> (&str, &str) {
        match &self.web {
            Some(web) if cfg!(target_arch = "wasm32") => (web.vertex.as_str(), web.fragment.as_str()),
            _ => (self.vertex.as_str(), self.fragment.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
struct TrackedSource {
    vertex: PathBuf,
    fragment: PathBuf,
    vertex_mtime: Option<SystemTime>,
    fragment_mtime: Option<SystemTime>,
}

/// Named shaders plus the source files they were built from
#[derive(Default)]
pub struct ShaderRegistry {
    shaders: HashMap<String, Rc<dyn PixelShader>>,
    sources: BTreeMap<String, TrackedSource>,
    manifest: Option<(PathBuf, PathBuf)>,
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn validate_source(name: &str, path: &Path) -> Result<String, ShaderError> {
    if !path.is_file() {
        return Err(ShaderError::MissingSource {
            name: name.to_string(),
            path: path.to_path_buf(),
        });
    }
    let text = std::fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Err(ShaderError::EmptySource {
            name: name.to_string(),
            path: path.to_path_buf(),
        });
    }
    Ok(text)
}

impl ShaderRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shader directly, replacing any of the same name
    pub fn register(&mut self, shader: Rc<dyn PixelShader>) {
        self.shaders.insert(shader.name().to_string(), shader);
    }

    /// Look up a shader by name
    pub fn get(&self, name: &str) -> Option<Rc<dyn PixelShader>> {
        self.shaders.get(name).cloned()
    }

    /// Whether a shader is registered
    pub fn contains(&self, name: &str) -> bool {
        self.shaders.contains_key(name)
    }

    /// Number of registered shaders
    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }

    /// Load every shader listed in `manifest_path`, resolving sources under `shader_dir`.
    ///
    /// The whole manifest is validated before anything is registered, so a
    /// bad entry leaves the registry unchanged.
    pub fn load_manifest(
        &mut self,
        manifest_path: impl AsRef<Path>,
        shader_dir: impl AsRef<Path>,
    ) -> Result<usize, ShaderError> {
        let manifest_path = manifest_path.as_ref();
        let shader_dir = shader_dir.as_ref();
        let text = std::fs::read_to_string(manifest_path)?;
        let entries: BTreeMap<String, ManifestEntry> =
            serde_json::from_str(&text).map_err(|e| ShaderError::Manifest(e.to_string()))?;

        let mut compiled = Vec::with_capacity(entries.len());
        for (name, entry) in &entries {
            let (vertex, fragment) = entry.paths_for_target();
            let vertex = shader_dir.join(vertex);
            let fragment = shader_dir.join(fragment);
            validate_source(name, &vertex)?;
            let fragment_text = validate_source(name, &fragment)?;
            let shader = SoftwareShader::compile(name, &fragment_text)?;
            let tracked = TrackedSource {
                vertex_mtime: modified(&vertex),
                fragment_mtime: modified(&fragment),
                vertex,
                fragment,
            };
            compiled.push((name.clone(), shader, tracked));
        }

        let count = compiled.len();
        for (name, shader, tracked) in compiled {
            self.shaders.insert(name.clone(), Rc::new(shader));
            self.sources.insert(name, tracked);
        }
        self.manifest = Some((manifest_path.to_path_buf(), shader_dir.to_path_buf()));
        log::info!("Loaded {} shaders from {}", count, manifest_path.display());
        Ok(count)
    }

    /// Reload the most recently loaded manifest, if any
    pub fn reload_manifest(&mut self) -> Result<usize, ShaderError> {
        match self.manifest.clone() {
            Some((manifest, dir)) => self.load_manifest(manifest, dir),
            None => Ok(0),
        }
    }

    /// Recompile shaders whose vertex or fragment source changed on disk.
    ///
    /// Returns the names swapped in. A shader that fails to recompile keeps
    /// its previous version and the failure is logged.
    pub fn hot_reload(&mut self) -> Vec<String> {
        let mut reloaded = Vec::new();
        for (name, tracked) in &mut self.sources {
            let vertex_mtime = modified(&tracked.vertex);
            let fragment_mtime = modified(&tracked.fragment);
            let advanced = |now: Option<SystemTime>, before: Option<SystemTime>| match (now, before) {
                (Some(now), Some(before)) => now > before,
                (Some(_), None) => true,
                _ => false,
            };
            if !advanced(vertex_mtime, tracked.vertex_mtime)
                && !advanced(fragment_mtime, tracked.fragment_mtime)
            {
                continue;
            }
            tracked.vertex_mtime = vertex_mtime;
            tracked.fragment_mtime = fragment_mtime;

            let result = validate_source(name, &tracked.vertex)
                .and_then(|_| validate_source(name, &tracked.fragment))
                .and_then(|text| SoftwareShader::compile(name, &text));
            match result {
                Ok(shader) => {
                    self.shaders.insert(name.clone(), Rc::new(shader));
                    log::info!("Hot-reloaded shader '{}'", name);
                    reloaded.push(name.clone());
                }
                Err(e) => log::error!("Shader hot reload failed, keeping previous '{}': {}", name, e),
            }
        }
        reloaded
    }

    /// Drop every shader and forget tracked sources; the manifest path is kept
    pub fn unload_all(&mut self) {
        self.shaders.clear();
        self.sources.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    fn write_manifest(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("shaders.json");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_effect_directive_parsing() {
        let shader = SoftwareShader::compile("t", "// effect: tint 255 0 0\nvoid main() {}").unwrap();
        assert_eq!(shader.effect(), ShaderEffect::Tint(Color::rgba(255, 0, 0, 255)));
        assert_eq!(shader.shade(Color::WHITE, 0, 0), Color::RED);

        let err = SoftwareShader::compile("t", "// effect: bloom").unwrap_err();
        assert!(matches!(err, ShaderError::UnknownEffect { .. }));

        let plain = SoftwareShader::compile("t", "void main() {}").unwrap();
        assert_eq!(plain.effect(), ShaderEffect::Passthrough);
    }

    #[test]
    fn test_manifest_loads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base.vs"), "// vertex").unwrap();
        fs::write(dir.path().join("invert.fs"), "// effect: invert").unwrap();
        fs::write(dir.path().join("web.fs"), "// effect: grayscale").unwrap();
        let manifest = write_manifest(
            dir.path(),
            r#"{ "invert": { "vertex": "base.vs", "fragment": "invert.fs",
                 "web": { "vertex": "base.vs", "fragment": "web.fs" } } }"#,
        );

        let mut registry = ShaderRegistry::new();
        assert_eq!(registry.load_manifest(&manifest, dir.path()).unwrap(), 1);
        let shader = registry.get("invert").unwrap();
        // desktop build uses the default pair
        assert_eq!(shader.shade(Color::BLACK, 0, 0), Color::WHITE);
    }

    #[test]
    fn test_missing_and_empty_sources_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base.vs"), "// vertex").unwrap();
        fs::write(dir.path().join("empty.fs"), "   \n").unwrap();

        let missing = write_manifest(dir.path(), r#"{ "a": { "vertex": "base.vs", "fragment": "nope.fs" } }"#);
        let mut registry = ShaderRegistry::new();
        assert!(matches!(
            registry.load_manifest(&missing, dir.path()),
            Err(ShaderError::MissingSource { .. })
        ));

        let empty = write_manifest(dir.path(), r#"{ "a": { "vertex": "base.vs", "fragment": "empty.fs" } }"#);
        assert!(matches!(
            registry.load_manifest(&empty, dir.path()),
            Err(ShaderError::EmptySource { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_hot_reload_swaps_on_mtime_advance() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base.vs"), "// vertex").unwrap();
        let fragment = dir.path().join("fx.fs");
        fs::write(&fragment, "// effect: passthrough").unwrap();
        let manifest = write_manifest(dir.path(), r#"{ "fx": { "vertex": "base.vs", "fragment": "fx.fs" } }"#);

        let mut registry = ShaderRegistry::new();
        registry.load_manifest(&manifest, dir.path()).unwrap();
        assert!(registry.hot_reload().is_empty());

        fs::write(&fragment, "// effect: solid_fill 0 0 255 255").unwrap();
        let later = SystemTime::now() + Duration::from_secs(5);
        fs::File::options().write(true).open(&fragment).unwrap().set_modified(later).unwrap();

        assert_eq!(registry.hot_reload(), vec!["fx".to_string()]);
        assert_eq!(registry.get("fx").unwrap().shade(Color::RED, 0, 0), Color::BLUE);
        assert!(registry.hot_reload().is_empty());
    }

    #[test]
    fn test_failed_reload_keeps_previous() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base.vs"), "// vertex").unwrap();
        let fragment = dir.path().join("fx.fs");
        fs::write(&fragment, "// effect: invert").unwrap();
        let manifest = write_manifest(dir.path(), r#"{ "fx": { "vertex": "base.vs", "fragment": "fx.fs" } }"#);
        let mut registry = ShaderRegistry::new();
        registry.load_manifest(&manifest, dir.path()).unwrap();

        fs::write(&fragment, "// effect: warp").unwrap();
        let later = SystemTime::now() + Duration::from_secs(5);
        fs::File::options().write(true).open(&fragment).unwrap().set_modified(later).unwrap();

        assert!(registry.hot_reload().is_empty());
        assert_eq!(registry.get("fx").unwrap().shade(Color::BLACK, 0, 0), Color::WHITE);
    }
}
