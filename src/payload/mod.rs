//! # Payloads: opaque arguments, message records, and the slot pool.

pub mod args;
#[allow(clippy::module_inception)]
pub mod payload;
pub mod pool;

pub use args::{EventArgs, Value};
pub use payload::Payload;
pub use pool::PayloadPool;
