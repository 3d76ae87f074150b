//! Timers advanced by the fixed step

/// Handle for cancelling a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

struct Timer {
    id: TimerId,
    remaining: f32,
    interval: Option<f32>,
    callback: Box<dyn FnMut()>,
}

/// One-shot and repeating timers
#[derive(Default)]
pub struct TimerSystem {
    timers: Vec<Timer>,
    next_id: u64,
}

impl TimerSystem {
    /// No timers
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `callback` once after `delay` seconds
    pub fn after(&mut self, delay: f32, callback: impl FnMut() + 'static) -> TimerId {
        self.push(delay, None, Box::new(callback))
    }

    /// Run `callback` every `interval` seconds until cancelled
    pub fn every(&mut self, interval: f32, callback: impl FnMut() + 'static) -> TimerId {
        self.push(interval, Some(interval), Box::new(callback))
    }

    /// Remove a timer; false if it already finished
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        self.timers.len() != before
    }

    /// Advance every timer by `dt`, firing those that elapse.
    ///
    /// A repeating timer fires once per elapsed interval, so a long step can
    /// fire it several times.
    pub fn update(&mut self, dt: f32) {
        for timer in &mut self.timers {
            timer.remaining -= dt;
            while timer.remaining <= 0.0 {
                (timer.callback)();
                match timer.interval {
                    Some(interval) if interval > 0.0 => timer.remaining += interval,
                    Some(_) => {
                        timer.remaining = 0.0;
                        break;
                    }
                    None => break,
                }
            }
        }
        self.timers.retain(|t| t.interval.is_some() || t.remaining > 0.0);
    }

    /// Number of live timers
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// True when no timers are live
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Drop every timer without firing it
    pub fn clear(&mut self) {
        self.timers.clear();
    }

    fn push(&mut self, delay: f32, interval: Option<f32>, callback: Box<dyn FnMut()>) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.push(Timer {
            id,
            remaining: delay,
            interval,
            callback,
        });
        id
    }
}
