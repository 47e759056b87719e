//! # Engine: dispatch core, lifecycle, and timers.

pub(crate) mod core;
pub mod timers;

pub use self::core::Engine;
pub use timers::{
    EngineTimers, TIMER_MINUTE_TOPIC, TIMER_SECOND_TOPIC, TIMER_TOPIC_PREFIX,
};
