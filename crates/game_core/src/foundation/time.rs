//! Time management: the fixed-step frame clock and a stopwatch
//!
//! Follows the classic "fix your timestep" accumulator. Raw frame time feeds
//! an accumulator (`lag`); the loop drains it in `rate`-sized fixed steps,
//! each of which the engine subdivides into physics substeps.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::core::config::LoopConfig;

/// Smallest raw delta accepted from the platform clock
pub const MIN_FRAME_TIME: f32 = 0.001;

/// Frame clock owning the fixed-step accumulator and rate counters
#[derive(Debug, Clone)]
pub struct MainLoop {
    /// Fixed step length in seconds
    pub rate: f32,
    /// Simulation speed multiplier
    pub timescale: f32,
    /// Unconsumed raw time
    pub lag: f32,
    /// Upper bound for `lag`, in fixed steps
    pub max_frame_skip: u32,
    /// Fixed steps allowed per outer tick
    pub max_updates_per_frame: u32,
    /// Physics substeps per fixed step
    pub substeps: u32,
    /// Total fixed steps ever performed
    pub frame: u64,

    paused: bool,
    smoothing_samples: usize,
    recent_deltas: VecDeque<f32>,
    smoothed_delta: f32,
    raw_delta: f32,
    steps_this_tick: u32,

    realtime_timer: f64,
    totaltime_timer: f64,

    updates: u32,
    update_timer: f32,
    frames: u32,
    fps_timer: f32,
    rendered_ups: u32,
    rendered_fps: u32,
}

impl Default for MainLoop {
    fn default() -> Self {
        Self::new(&LoopConfig::default())
    }
}

impl MainLoop {
    /// Create a frame clock from loop configuration
    pub fn new(config: &LoopConfig) -> Self {
        Self {
            rate: config.rate,
            timescale: 1.0,
            lag: 0.0,
            max_frame_skip: config.max_frame_skip,
            max_updates_per_frame: config.max_updates_per_frame,
            substeps: config.substeps.max(1),
            frame: 0,
            paused: false,
            smoothing_samples: config.smoothing_samples.max(1),
            recent_deltas: VecDeque::with_capacity(config.smoothing_samples.max(1)),
            smoothed_delta: 0.0,
            raw_delta: 0.0,
            steps_this_tick: 0,
            realtime_timer: 0.0,
            totaltime_timer: 0.0,
            updates: 0,
            update_timer: 0.0,
            frames: 0,
            fps_timer: 0.0,
            rendered_ups: 0,
            rendered_fps: 0,
        }
    }

    /// Start an outer tick with the platform's measured frame time.
    ///
    /// Returns the smoothed raw delta. The accumulator is fed with unscaled
    /// time so a zero timescale keeps the loop ticking.
    pub fn begin_tick(&mut self, frame_time: f32) -> f32 {
        let raw = if frame_time.is_finite() {
            frame_time.max(MIN_FRAME_TIME)
        } else {
            MIN_FRAME_TIME
        };
        self.raw_delta = raw;

        self.recent_deltas.push_back(raw);
        while self.recent_deltas.len() > self.smoothing_samples {
            self.recent_deltas.pop_front();
        }
        let sum: f32 = self.recent_deltas.iter().sum();
        self.smoothed_delta = sum / self.recent_deltas.len() as f32;

        self.realtime_timer += f64::from(self.smoothed_delta);
        if !self.paused {
            self.totaltime_timer += f64::from(self.smoothed_delta);
        }

        let max_lag = self.rate * self.max_frame_skip as f32;
        self.lag = (self.lag + self.smoothed_delta).min(max_lag);
        self.steps_this_tick = 0;
        self.smoothed_delta
    }

    /// Consume one fixed step from the accumulator if one is due.
    ///
    /// Returns false once `lag < rate` or the per-tick update cap is reached.
    pub fn try_fixed_step(&mut self) -> bool {
        if self.lag < self.rate || self.steps_this_tick >= self.max_updates_per_frame {
            return false;
        }
        self.lag -= self.rate;
        self.steps_this_tick += 1;
        self.updates += 1;
        self.frame += 1;
        true
    }

    /// Close the tick: roll the UPS and FPS windows
    pub fn end_tick(&mut self) {
        self.update_timer += self.smoothed_delta;
        if self.update_timer >= 1.0 {
            self.rendered_ups = self.updates;
            self.updates = 0;
            self.update_timer = 0.0;
        }

        self.frames += 1;
        self.fps_timer += self.smoothed_delta;
        if self.fps_timer >= 1.0 {
            self.rendered_fps = self.frames;
            self.frames = 0;
            self.fps_timer = 0.0;
        }
    }

    /// Timescale in effect; zero while paused
    pub fn effective_timescale(&self) -> f32 {
        if self.paused {
            0.0
        } else {
            self.timescale
        }
    }

    /// Scaled length of one fixed step
    pub fn fixed_delta(&self) -> f32 {
        self.rate * self.effective_timescale()
    }

    /// Scaled length of one physics substep
    pub fn sub_delta(&self) -> f32 {
        self.fixed_delta() / self.substeps as f32
    }

    /// Scaled variable-step delta for the once-per-tick update
    pub fn scaled_step(&self) -> f32 {
        self.smoothed_delta * self.effective_timescale()
    }

    /// Interpolation factor between the last two fixed steps
    pub fn alpha(&self) -> f32 {
        if self.rate > 0.0 {
            (self.lag / self.rate).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Pause or resume; the unpaused timer stops while paused
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Whether the simulation is paused
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Last raw (unsmoothed) delta
    pub fn raw_delta(&self) -> f32 {
        self.raw_delta
    }

    /// Last smoothed delta
    pub fn smoothed_delta(&self) -> f32 {
        self.smoothed_delta
    }

    /// Fixed steps performed during the current tick
    pub fn steps_this_tick(&self) -> u32 {
        self.steps_this_tick
    }

    /// Seconds elapsed since start, paused or not
    pub fn realtime(&self) -> f64 {
        self.realtime_timer
    }

    /// Seconds elapsed while unpaused
    pub fn totaltime(&self) -> f64 {
        self.totaltime_timer
    }

    /// Fixed updates counted over the last full second
    pub fn rendered_ups(&self) -> u32 {
        self.rendered_ups
    }

    /// Frames counted over the last full second
    pub fn rendered_fps(&self) -> u32 {
        self.rendered_fps
    }
}

/// Simple stopwatch for measuring elapsed time
pub struct Stopwatch {
    start_time: Option<Instant>,
    elapsed: Duration,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Stopwatch {
    /// Create a new stopped stopwatch
    pub fn new() -> Self {
        Self {
            start_time: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Create a new stopwatch and start it immediately
    pub fn start_new() -> Self {
        let mut stopwatch = Self::new();
        stopwatch.start();
        stopwatch
    }

    /// Start the stopwatch
    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Stop the stopwatch and accumulate elapsed time
    pub fn stop(&mut self) {
        if let Some(start) = self.start_time.take() {
            self.elapsed += start.elapsed();
        }
    }

    /// Get the elapsed time
    pub fn elapsed(&self) -> Duration {
        self.elapsed + self.start_time.map_or(Duration::ZERO, |s| s.elapsed())
    }

    /// Get the elapsed time in milliseconds
    pub fn elapsed_millis(&self) -> f32 {
        self.elapsed().as_secs_f32() * 1000.0
    }
}
