//! # Hooks: handler abstractions and per-topic handler lists.

pub mod handler;
pub mod hook;

pub use handler::{EventHandler, Handler, HandlerFn, HandlerId, TopicHandler, TopicHandlerFn};
pub use hook::{Hook, HookStats};
