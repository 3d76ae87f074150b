//! Second-order dynamics filter
//!
//! Smooths a scalar input `x` into an output `y` parameterized by natural
//! frequency `f`, damping ratio `z` and initial response `r`. The `k2` term
//! is clamped each step so the integration stays stable for large `dt`.

use std::f32::consts::PI;

use crate::ecs::components::ActiveStates;
use crate::ecs::{Component, World};

use super::spring::SNAP_THRESHOLD;

/// Second-order smoother state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SecondOrderDynamics {
    k1: f32,
    k2: f32,
    k3: f32,
    /// Previous input
    pub previous_input: f32,
    /// Smoothed output
    pub value: f32,
    /// Output velocity
    pub velocity: f32,
    /// Most recent input, consumed by [`update_all_second_order`]
    pub target: f32,
    /// Disabled filters are skipped entirely
    pub enabled: bool,
}

impl Component for SecondOrderDynamics {}

impl SecondOrderDynamics {
    /// Filter resting on `initial`
    pub fn new(frequency: f32, damping_ratio: f32, response: f32, initial: f32) -> Self {
        let mut sod = Self {
            k1: 0.0,
            k2: 0.0,
            k3: 0.0,
            previous_input: initial,
            value: initial,
            velocity: 0.0,
            target: initial,
            enabled: true,
        };
        sod.set_parameters(frequency, damping_ratio, response);
        sod
    }

    /// Recompute the constants from `(f, z, r)`, keeping state
    pub fn set_parameters(&mut self, frequency: f32, damping_ratio: f32, response: f32) {
        let f = frequency.max(f32::EPSILON);
        let w = 2.0 * PI * f;
        self.k1 = damping_ratio / (PI * f);
        self.k2 = 1.0 / (w * w);
        self.k3 = response * damping_ratio / w;
    }

    /// Constants `(k1, k2, k3)`
    pub fn constants(&self) -> (f32, f32, f32) {
        (self.k1, self.k2, self.k3)
    }

    /// Feed input `x` and advance by `dt`, returning the new output
    pub fn update(&mut self, dt: f32, x: f32) -> f32 {
        if !self.enabled || dt <= 0.0 {
            return self.value;
        }
        let xd = (x - self.previous_input) / dt;
        self.previous_input = x;

        let k2_stable = self
            .k2
            .max(dt * dt / 2.0 + dt * self.k1 / 2.0)
            .max(dt * self.k1);
        self.value += dt * self.velocity;
        self.velocity += dt * (x + self.k3 * xd - self.value - self.k1 * self.velocity) / k2_stable;

        if (self.value - x).abs() < SNAP_THRESHOLD && self.velocity.abs() < SNAP_THRESHOLD {
            self.value = x;
            self.velocity = 0.0;
        }
        self.value
    }

    /// Jump to `value` with no motion
    pub fn reset(&mut self, value: f32) {
        self.previous_input = value;
        self.value = value;
        self.target = value;
        self.velocity = 0.0;
    }
}

/// Advance every filter on an active-state entity toward its stored `target`
pub fn update_all_second_order(world: &mut World, states: &ActiveStates, dt: f32) {
    let entities: Vec<_> = world
        .entities_with::<SecondOrderDynamics>()
        .into_iter()
        .filter(|e| states.is_entity_active(world, *e))
        .collect();
    for entity in entities {
        if let Some(sod) = world.get_mut::<SecondOrderDynamics>(entity) {
            let target = sod.target;
            sod.update(dt, target);
        }
    }
}
