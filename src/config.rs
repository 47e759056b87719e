//! # Engine and hook configuration.
//!
//! [`EngineConfig`] sizes the queue and pool and sets the default
//! publish/consume waiting behavior; [`HookConfig`] tunes per-hook handler
//! invocation.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use topicbus::EngineConfig;
//!
//! let mut cfg = EngineConfig::default();
//! cfg.capacity = 8;
//! cfg.timeout = Duration::from_millis(250);
//!
//! assert_eq!(cfg.capacity, 8);
//! ```

use std::time::Duration;

/// Global configuration for one engine instance.
///
/// Controls queue and pool sizing and the default hybrid-wait behavior of
/// `publish`/`get`.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Maximum number of queued messages.
    pub capacity: usize,
    /// Number of pre-allocated payload slots; overflow heap-allocates.
    pub pool_size: usize,
    /// Non-blocking attempts before a hybrid operation falls back to
    /// waiting.
    pub max_spin: u32,
    /// Default wait bound for hybrid operations; zero waits indefinitely.
    pub timeout: Duration,
}

impl Default for EngineConfig {
    /// Provides a default configuration:
    /// - `capacity = 4095`
    /// - `pool_size = 4095`
    /// - `max_spin = 65535`
    /// - `timeout = 0s` (wait indefinitely)
    fn default() -> Self {
        Self {
            capacity: 4095,
            pool_size: 4095,
            max_spin: 65_535,
            timeout: Duration::ZERO,
        }
    }
}

/// Per-hook configuration.
#[derive(Clone, Copy, Debug, Default)]
pub struct HookConfig {
    /// Retry a with-topic handler once, without the injected `topic`
    /// binding, when it fails with
    /// [`HandlerError::UnexpectedTopicArg`](crate::HandlerError).
    ///
    /// Off by default: a handler that surfaces an unrelated
    /// `UnexpectedTopicArg` of its own executes twice with this enabled.
    pub retry_on_unexpected_topic: bool,
}
