//! Localized strings
//!
//! Each language is a nested JSON document addressed by dotted keys
//! (`menu.start`). Lookups fall back to the fallback language and finally
//! to `[MISSING: key]`. UI code registers language-change callbacks; the
//! re-init sequence drops them with [`Localization::clear_callbacks`].

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use thiserror::Error;

/// Localization failures
#[derive(Error, Debug)]
pub enum LocalizationError {
    /// Reading the language file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The language file is not valid JSON
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

type LanguageCallback = Box<dyn Fn(&str)>;

/// Loaded languages and language-change listeners
pub struct Localization {
    current: String,
    fallback: String,
    languages: HashMap<String, Value>,
    callbacks: Vec<LanguageCallback>,
}

impl Default for Localization {
    fn default() -> Self {
        Self::new("en")
    }
}

impl Localization {
    /// Empty table with `language` as both current and fallback
    pub fn new(language: impl Into<String>) -> Self {
        let language = language.into();
        Self {
            current: language.clone(),
            fallback: language,
            languages: HashMap::new(),
            callbacks: Vec::new(),
        }
    }

    /// Register a language from a JSON document
    pub fn insert_language(&mut self, code: impl Into<String>, data: Value) {
        self.languages.insert(code.into(), data);
    }

    /// Load `<dir>/<code>.json`
    pub fn load_language(&mut self, code: &str, dir: impl AsRef<Path>) -> Result<(), LocalizationError> {
        let path = dir.as_ref().join(format!("{}.json", code));
        let text = std::fs::read_to_string(&path)?;
        let data: Value = serde_json::from_str(&text)?;
        self.insert_language(code, data);
        log::info!("Loaded language '{}' from {}", code, path.display());
        Ok(())
    }

    /// Language used when a key is missing from the current one
    pub fn set_fallback_language(&mut self, code: impl Into<String>) {
        self.fallback = code.into();
    }

    /// Switch language and notify callbacks; false if it is not loaded
    pub fn set_language(&mut self, code: &str) -> bool {
        if !self.languages.contains_key(code) {
            log::warn!("Language '{}' is not loaded", code);
            return false;
        }
        self.current = code.to_string();
        for callback in &self.callbacks {
            callback(code);
        }
        true
    }

    /// Current language code
    pub fn current_language(&self) -> &str {
        &self.current
    }

    /// Look up a dotted key
    pub fn get(&self, key: &str) -> String {
        let lookup = |code: &str| self.languages.get(code).and_then(|data| resolve_key(data, key));
        lookup(&self.current)
            .or_else(|| (self.fallback != self.current).then(|| lookup(&self.fallback)).flatten())
            .unwrap_or_else(|| format!("[MISSING: {}]", key))
    }

    /// Listen for language changes
    pub fn on_language_changed(&mut self, callback: impl Fn(&str) + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    /// Number of registered callbacks
    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }

    /// Drop every language-change callback
    pub fn clear_callbacks(&mut self) {
        self.callbacks.clear();
    }
}

fn resolve_key(data: &Value, key: &str) -> Option<String> {
    let mut current = data;
    for segment in key.split('.') {
        current = current.get(segment)?;
    }
    current.as_str().filter(|s| !s.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn loaded() -> Localization {
        let mut loc = Localization::new("en");
        loc.insert_language("en", json!({ "menu": { "start": "Start Game", "quit": "Quit" } }));
        loc.insert_language("fr", json!({ "menu": { "start": "Commencer" } }));
        loc
    }

    #[test]
    fn test_lookup_with_fallback() {
        let mut loc = loaded();
        assert_eq!(loc.get("menu.start"), "Start Game");
        assert!(loc.set_language("fr"));
        assert_eq!(loc.get("menu.start"), "Commencer");
        assert_eq!(loc.get("menu.quit"), "Quit");
        assert_eq!(loc.get("menu.missing"), "[MISSING: menu.missing]");
        assert!(!loc.set_language("de"));
    }

    #[test]
    fn test_callbacks_fire_and_clear() {
        let mut loc = loaded();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        loc.on_language_changed(move |code| s.borrow_mut().push(code.to_string()));
        loc.set_language("fr");
        assert_eq!(*seen.borrow(), vec!["fr"]);

        loc.clear_callbacks();
        assert_eq!(loc.callback_count(), 0);
        loc.set_language("en");
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("en.json"), r#"{ "hud": { "score": "Score" } }"#).unwrap();
        let mut loc = Localization::default();
        loc.load_language("en", dir.path()).unwrap();
        assert_eq!(loc.get("hud.score"), "Score");
        assert!(loc.load_language("xx", dir.path()).is_err());
    }
}
