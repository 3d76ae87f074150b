//! Sound collaborator interface
//!
//! Playback lives outside the runtime core; the engine only needs to tell
//! the backend to start sounds and to reset during re-init.

/// Narrow contract the engine needs from a sound backend
pub trait SoundSystem {
    /// Start a named sound
    fn play(&mut self, name: &str, volume: f32);

    /// Stop everything and forget loaded state
    fn reset(&mut self);
}

/// Backend that records requests instead of playing them
#[derive(Debug, Default)]
pub struct NullSound {
    /// Sounds requested since the last reset
    pub played: Vec<String>,
    /// Number of resets
    pub resets: u32,
}

impl SoundSystem for NullSound {
    fn play(&mut self, name: &str, _volume: f32) {
        self.played.push(name.to_string());
    }

    fn reset(&mut self) {
        self.played.clear();
        self.resets += 1;
    }
}
