//! Time-stepped animation: springs, second-order smoothing, easing curves
//! and sprite frame queues

pub mod animation_queue;
pub mod easing;
pub mod second_order;
pub mod spring;

pub use animation_queue::{
    update_animations, AnimationFrame, AnimationObject, AnimationQueueComponent,
    QueueCompleteCallback,
};
pub use easing::Easing;
pub use second_order::{update_all_second_order, SecondOrderDynamics};
pub use spring::{update_all_springs, Spring, MAX_SPRING_STEP, SNAP_THRESHOLD};
