//! Deterministic scalar springs
//!
//! Semi-implicit Euler on `a = -k (x - target) - d v`, with damping never
//! allowed below critical, an optional overshoot guard, and a snap to rest
//! near the target. Time-to-target mode swaps in stiffness and damping
//! derived from the requested duration and eases the target in.

use crate::ecs::components::ActiveStates;
use crate::ecs::{Component, World};

use super::easing::Easing;

/// Distance and speed below which a spring is pinned to its target
pub const SNAP_THRESHOLD: f32 = 0.01;

/// Largest integration step used by [`update_all_springs`]
pub const MAX_SPRING_STEP: f32 = 0.016;

/// Remaining time at or below this counts as elapsed
const REMAINING_EPSILON: f32 = 1e-6;

/// Scalar spring state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spring {
    /// Current value
    pub value: f32,
    /// Rest position
    pub target_value: f32,
    /// Current velocity
    pub velocity: f32,
    /// Spring constant
    pub stiffness: f32,
    /// Damping coefficient; raised to critical when lower
    pub damping: f32,
    /// Disabled springs are skipped entirely
    pub enabled: bool,
    /// Stop at the target instead of crossing it
    pub prevent_overshoot: bool,
    /// Optional speed limit
    pub max_velocity: Option<f32>,
    /// Scales the velocity change per step
    pub smoothing_factor: f32,
    /// Requested arrival time, when animating by duration
    pub time_to_target: Option<f32>,
    /// Time left before arrival
    pub remaining_time: f32,
    /// Curve applied to normalized time in time-to-target mode
    pub easing: Easing,
}

impl Component for Spring {}

impl Default for Spring {
    fn default() -> Self {
        Self::new(0.0, 100.0, 20.0)
    }
}

impl Spring {
    /// Spring at rest on `value`
    pub fn new(value: f32, stiffness: f32, damping: f32) -> Self {
        Self {
            value,
            target_value: value,
            velocity: 0.0,
            stiffness,
            damping,
            enabled: true,
            prevent_overshoot: false,
            max_velocity: None,
            smoothing_factor: 1.0,
            time_to_target: None,
            remaining_time: 0.0,
            easing: Easing::Linear,
        }
    }

    /// Preset used for transform channels: softened velocity response
    pub fn for_transform(value: f32) -> Self {
        Self {
            smoothing_factor: 0.9,
            ..Self::new(value, 200.0, 40.0)
        }
    }

    /// Builder: set the target
    pub fn with_target(mut self, target: f32) -> Self {
        self.target_value = target;
        self
    }

    /// Builder: enable the overshoot guard
    pub fn with_prevent_overshoot(mut self, prevent: bool) -> Self {
        self.prevent_overshoot = prevent;
        self
    }

    /// Builder: cap speed
    pub fn with_max_velocity(mut self, max_velocity: f32) -> Self {
        self.max_velocity = Some(max_velocity);
        self
    }

    /// True once value and velocity are both pinned
    pub fn is_at_rest(&self) -> bool {
        self.value == self.target_value && self.velocity == 0.0 && self.time_to_target.is_none()
    }

    /// Advance by `dt` seconds. A disabled spring is left untouched.
    pub fn update(&mut self, dt: f32) {
        if !self.enabled {
            return;
        }
        if let Some(duration) = self.time_to_target {
            self.step_timed(duration, dt);
        } else {
            self.step_standard(dt);
        }
    }

    fn step_timed(&mut self, duration: f32, dt: f32) {
        self.remaining_time -= dt;
        if self.remaining_time <= REMAINING_EPSILON || duration <= 0.0 {
            self.value = self.target_value;
            self.velocity = 0.0;
            self.time_to_target = None;
            self.remaining_time = 0.0;
            return;
        }

        let normalized = 1.0 - self.remaining_time / duration;
        let eased = self.easing.apply(normalized);
        self.stiffness = 9.0 / (duration * duration);
        self.damping = 6.0 / duration;

        let eased_target = self.target_value * eased;
        let a = -self.stiffness * (self.value - eased_target) - self.damping * self.velocity;
        self.velocity += a * dt;
        self.value += self.velocity * dt;
    }

    fn step_standard(&mut self, dt: f32) {
        let critical = 2.0 * self.stiffness.max(0.0).sqrt();
        let damping = self.damping.max(critical);
        let a = -self.stiffness * (self.value - self.target_value) - damping * self.velocity;
        self.velocity += a * dt * self.smoothing_factor;

        if let Some(max) = self.max_velocity {
            self.velocity = self.velocity.clamp(-max.abs(), max.abs());
        }

        let projected = self.value + self.velocity * dt;
        let below = self.value < self.target_value;
        let above = self.value > self.target_value;
        let crosses = (below && projected > self.target_value) || (above && projected < self.target_value);
        if self.prevent_overshoot && crosses {
            self.value = self.target_value;
            self.velocity = 0.0;
        } else {
            self.value = projected;
        }

        if (self.value - self.target_value).abs() < SNAP_THRESHOLD
            && self.velocity.abs() < SNAP_THRESHOLD
        {
            self.value = self.target_value;
            self.velocity = 0.0;
        }
    }

    /// Displace the value by `force`, optionally retuning the spring.
    ///
    /// The anchor stays put, so the spring bounces back to it.
    pub fn pull(&mut self, force: f32, stiffness: Option<f32>, damping: Option<f32>) {
        if !self.enabled {
            return;
        }
        if let Some(k) = stiffness {
            self.stiffness = k;
        }
        if let Some(d) = damping {
            self.damping = d;
        }
        self.value += force;
    }

    /// Move the anchor itself
    pub fn animate_to_target(&mut self, target: f32, stiffness: f32, damping: f32) {
        if !self.enabled {
            return;
        }
        self.target_value = target;
        self.stiffness = stiffness;
        self.damping = damping;
    }

    /// Arrive at `target` after `time` seconds along `easing`
    pub fn animate_to_target_with_time(
        &mut self,
        target: f32,
        time: f32,
        easing: Easing,
        initial_stiffness: f32,
        initial_damping: f32,
    ) {
        if !self.enabled {
            return;
        }
        self.target_value = target;
        self.time_to_target = Some(time);
        self.remaining_time = time;
        self.easing = easing;
        self.stiffness = initial_stiffness;
        self.damping = initial_damping;
    }
}

/// Advance every enabled spring on an entity whose state is active.
///
/// Entities that are tagged inactive or whose `StateTag` is switched off
/// are skipped. Large deltas are split into equal substeps no longer than
/// [`MAX_SPRING_STEP`]; each spring is stepped once per substep.
pub fn update_all_springs(world: &mut World, states: &ActiveStates, dt: f32) {
    if dt <= 0.0 {
        return;
    }
    let steps = (dt / MAX_SPRING_STEP).ceil().max(1.0) as u32;
    let step = dt / steps as f32;

    let entities: Vec<_> = world
        .entities_with::<Spring>()
        .into_iter()
        .filter(|e| states.is_entity_active(world, *e))
        .collect();
    for entity in entities {
        if let Some(spring) = world.get_mut::<Spring>(entity) {
            for _ in 0..steps {
                spring.update(step);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::{InactiveTag, StateTag};
    use approx::assert_relative_eq;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn test_spring_snaps_to_target() {
        let mut spring = Spring::new(0.0, 100.0, 20.0).with_target(10.0);
        for _ in 0..120 {
            spring.update(DT);
        }
        assert!((spring.value - 10.0).abs() < SNAP_THRESHOLD);
        assert!(spring.velocity < SNAP_THRESHOLD);
        assert_eq!(spring.value, 10.0);
        assert_eq!(spring.velocity, 0.0);
    }

    #[test]
    fn test_time_to_target_arrives_on_time() {
        let mut spring = Spring::new(0.0, 100.0, 10.0);
        spring.animate_to_target_with_time(1.0, 0.5, Easing::Linear, 100.0, 10.0);
        for _ in 0..30 {
            spring.update(DT);
        }
        assert_eq!(spring.value, 1.0);
        assert!(spring.time_to_target.is_none());
    }

    #[test]
    fn test_time_to_target_in_flight_before_deadline() {
        let mut spring = Spring::new(0.0, 100.0, 10.0);
        spring.animate_to_target_with_time(1.0, 0.5, Easing::Linear, 100.0, 10.0);
        for _ in 0..15 {
            spring.update(DT);
        }
        assert!(spring.time_to_target.is_some());
        assert!(spring.value > 0.0 && spring.value < 1.0);
        assert_relative_eq!(spring.stiffness, 36.0);
        assert_relative_eq!(spring.damping, 12.0);
    }

    #[test]
    fn test_identical_inputs_identical_outputs() {
        let make = || {
            let mut s = Spring::new(3.0, 250.0, 5.0).with_target(-7.5);
            s.smoothing_factor = 0.9;
            s
        };
        let (mut a, mut b) = (make(), make());
        let dts = [DT, 0.02, 0.005, DT, 0.031, 0.001];
        for i in 0..300 {
            let dt = dts[i % dts.len()];
            a.update(dt);
            b.update(dt);
            assert_eq!(a.value.to_bits(), b.value.to_bits());
            assert_eq!(a.velocity.to_bits(), b.velocity.to_bits());
        }
    }

    #[test]
    fn test_prevent_overshoot_never_crosses() {
        let mut spring = Spring::new(10.0, 400.0, 0.0)
            .with_target(0.0)
            .with_prevent_overshoot(true);
        spring.velocity = 5.0;
        for _ in 0..240 {
            spring.update(DT);
            assert!(spring.value >= -SNAP_THRESHOLD, "crossed target: {}", spring.value);
        }
        assert_eq!(spring.value, 0.0);
    }

    #[test]
    fn test_max_velocity_clamps() {
        let mut spring = Spring::new(0.0, 10_000.0, 0.0)
            .with_target(100.0)
            .with_max_velocity(50.0);
        spring.update(DT);
        assert!(spring.velocity <= 50.0);
    }

    #[test]
    fn test_disabled_spring_untouched() {
        let mut spring = Spring::new(0.0, 100.0, 20.0).with_target(5.0);
        spring.enabled = false;
        let before = spring;
        spring.update(DT);
        spring.pull(3.0, None, None);
        assert_eq!(spring, before);
    }

    #[test]
    fn test_pull_keeps_anchor() {
        let mut spring = Spring::new(1.0, 100.0, 20.0);
        spring.pull(2.0, Some(300.0), None);
        assert_eq!(spring.value, 3.0);
        assert_eq!(spring.target_value, 1.0);
        assert_eq!(spring.stiffness, 300.0);
    }

    #[test]
    fn test_update_all_skips_inactive_and_substeps() {
        let mut world = World::new();
        let active = world.create();
        let inactive = world.create();
        for e in [active, inactive] {
            world.emplace(e, StateTag::default());
            world.emplace(e, Spring::new(0.0, 100.0, 20.0).with_target(1.0));
        }
        world.emplace(inactive, InactiveTag);

        update_all_springs(&mut world, &ActiveStates::default(), 0.05);

        let mut manual = Spring::new(0.0, 100.0, 20.0).with_target(1.0);
        for _ in 0..4 {
            manual.update(0.05 / 4.0);
        }
        assert_eq!(world.get::<Spring>(active).unwrap().value, manual.value);
        assert_eq!(world.get::<Spring>(inactive).unwrap().value, 0.0);
    }

    #[test]
    fn test_update_all_skips_switched_off_state() {
        let mut world = World::new();
        let e = world.create();
        world.emplace(e, StateTag::new("elsewhere"));
        world.emplace(e, Spring::new(0.0, 100.0, 20.0).with_target(10.0));
        let mut states = ActiveStates::default();

        for _ in 0..5 {
            update_all_springs(&mut world, &states, DT);
        }
        assert_eq!(world.get::<Spring>(e).unwrap().value, 0.0);

        states.activate("elsewhere");
        update_all_springs(&mut world, &states, DT);
        assert!(world.get::<Spring>(e).unwrap().value > 0.0);
    }
}
