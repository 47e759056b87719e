//! # Hook: the binding from one topic to its ordered handlers.
//!
//! A [`Hook`] owns two handler lists — no-topic and with-topic — and invokes
//! them for every message routed to it:
//!
//! - all no-topic handlers first, in insertion order,
//! - then all with-topic handlers, in insertion order.
//!
//! ## Isolation
//! Every invocation is wrapped: panics are caught
//! (`AssertUnwindSafe(..).catch_unwind()`), typed failures are inspected,
//! and both are logged without ever reaching the dispatcher. A failing
//! handler never blocks the handlers after it.
//!
//! ## With-topic convention
//! Before the with-topic group runs, the named arguments are passed with a
//! `topic` binding ensured (a caller-supplied `topic` argument wins). When a
//! handler fails with [`HandlerError::UnexpectedTopicArg`] and
//! `retry_on_unexpected_topic` is set, the call is retried once with the
//! injected binding stripped. The retry is off by default: a handler that
//! surfaces its own unrelated `UnexpectedTopicArg` would execute twice.
//!
//! ## Timing
//! [`Hook::timed`] enables a per-handler stats map; each invocation is
//! bracketed with a monotonic clock and accumulates into [`HookStats`].

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::FutureExt;
use tracing::{debug, error, warn};

use crate::config::HookConfig;
use crate::error::HandlerError;
use crate::hooks::handler::{Handler, HandlerId};
use crate::payload::{EventArgs, Payload, Value};
use crate::topics::Topic;

/// Per-handler invocation statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HookStats {
    /// Number of completed invocations (faults included).
    pub calls: u64,
    /// Accumulated wall time spent inside the handler.
    pub total_time: Duration,
}

/// Ordered handlers for one registered topic.
pub struct Hook {
    topic: Arc<Topic>,
    no_topic: RwLock<Vec<Handler>>,
    with_topic: RwLock<Vec<Handler>>,
    config: HookConfig,
    stats: Option<DashMap<HandlerId, HookStats>>,
}

impl Hook {
    /// Creates a hook with default configuration.
    #[must_use]
    pub fn new(topic: impl Into<Arc<Topic>>) -> Self {
        Self::with_config(topic, HookConfig::default())
    }

    /// Creates a hook with explicit configuration.
    #[must_use]
    pub fn with_config(topic: impl Into<Arc<Topic>>, config: HookConfig) -> Self {
        Self {
            topic: topic.into(),
            no_topic: RwLock::new(Vec::new()),
            with_topic: RwLock::new(Vec::new()),
            config,
            stats: None,
        }
    }

    /// Creates a hook that records per-handler timing.
    #[must_use]
    pub fn timed(topic: impl Into<Arc<Topic>>) -> Self {
        Self::timed_with_config(topic, HookConfig::default())
    }

    /// Creates a timing hook with explicit configuration.
    #[must_use]
    pub fn timed_with_config(topic: impl Into<Arc<Topic>>, config: HookConfig) -> Self {
        Self {
            stats: Some(DashMap::new()),
            ..Self::with_config(topic, config)
        }
    }

    /// The topic this hook is bound to.
    #[must_use]
    pub fn topic(&self) -> &Arc<Topic> {
        &self.topic
    }

    /// Appends a handler to its convention's list.
    ///
    /// With `deduplicate`, a handler already present (same `Arc`) is
    /// skipped. Without it, duplicates are allowed and fire once per
    /// registration (logged, since it is usually an accident).
    ///
    /// Returns whether the handler was added.
    pub fn add_handler(&self, handler: Handler, deduplicate: bool) -> bool {
        let list = self.list_for(&handler);
        let mut handlers = list.write().expect("hook handler list poisoned");

        if handlers.iter().any(|existing| existing.same(&handler)) {
            if deduplicate {
                return false;
            }
            debug!(
                topic = self.topic.literal(),
                handler = handler.name(),
                "duplicate handler registered without deduplication; it will fire once per registration",
            );
        }

        if let Some(stats) = &self.stats {
            stats.entry(handler.id()).or_default();
        }
        handlers.push(handler);
        true
    }

    /// Removes the first occurrence of the handler. No-op when absent.
    ///
    /// Returns whether a handler was removed.
    pub fn remove_handler(&self, handler: &Handler) -> bool {
        let list = self.list_for(handler);
        let mut handlers = list.write().expect("hook handler list poisoned");

        let Some(position) = handlers.iter().position(|h| h.same(handler)) else {
            return false;
        };
        handlers.remove(position);

        // Keep the stats entry only while registrations remain.
        if let Some(stats) = &self.stats {
            if !handlers.iter().any(|h| h.same(handler)) {
                stats.remove(&handler.id());
            }
        }
        true
    }

    /// Drops every handler (and its stats).
    pub fn clear(&self) {
        self.no_topic
            .write()
            .expect("hook handler list poisoned")
            .clear();
        self.with_topic
            .write()
            .expect("hook handler list poisoned")
            .clear();
        if let Some(stats) = &self.stats {
            stats.clear();
        }
    }

    /// Total number of registrations across both conventions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.no_topic.read().expect("hook handler list poisoned").len()
            + self.with_topic.read().expect("hook handler list poisoned").len()
    }

    /// Whether no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the handlers in trigger order.
    #[must_use]
    pub fn handlers(&self) -> Vec<Handler> {
        let mut all = self
            .no_topic
            .read()
            .expect("hook handler list poisoned")
            .clone();
        all.extend(
            self.with_topic
                .read()
                .expect("hook handler list poisoned")
                .iter()
                .cloned(),
        );
        all
    }

    /// Snapshot of the per-handler stats; `None` unless built with
    /// [`Hook::timed`].
    #[must_use]
    pub fn stats(&self) -> Option<Vec<(HandlerId, HookStats)>> {
        self.stats
            .as_ref()
            .map(|stats| stats.iter().map(|e| (*e.key(), *e.value())).collect())
    }

    /// Stats for one handler.
    #[must_use]
    pub fn stats_for(&self, handler: &Handler) -> Option<HookStats> {
        self.stats
            .as_ref()
            .and_then(|stats| stats.get(&handler.id()).map(|e| *e.value()))
    }

    /// Invokes every handler for one payload: the no-topic group first,
    /// then the with-topic group, insertion order within each.
    ///
    /// Never fails; faults are logged and isolated per handler.
    pub async fn trigger(&self, payload: &Payload) {
        let no_topic = self
            .no_topic
            .read()
            .expect("hook handler list poisoned")
            .clone();
        for handler in &no_topic {
            self.invoke(handler, payload.topic(), payload.args()).await;
        }

        let with_topic = self
            .with_topic
            .read()
            .expect("hook handler list poisoned")
            .clone();
        if with_topic.is_empty() {
            return;
        }

        // One augmented argument set for the whole group; the injected
        // binding never overrides a caller-supplied `topic`.
        let mut augmented = payload.args().clone();
        let topic_value: Value = Arc::clone(payload.topic()) as Value;
        let injected = augmented.insert_if_absent("topic", topic_value);

        for handler in &with_topic {
            let fault = self.invoke(handler, payload.topic(), &augmented).await;

            if matches!(fault, Some(HandlerError::UnexpectedTopicArg))
                && self.config.retry_on_unexpected_topic
                && injected
            {
                // Second try without the injected binding. If the handler
                // raised its own UnexpectedTopicArg, it runs twice here.
                warn!(
                    topic = self.topic.literal(),
                    handler = handler.name(),
                    "retrying handler without injected 'topic' binding",
                );
                let mut stripped = augmented.clone();
                stripped.remove("topic");
                self.invoke(handler, payload.topic(), &stripped).await;
            }
        }
    }

    /// Runs one handler with panic and fault isolation, recording timing
    /// when stats are enabled. Returns the typed fault, if any.
    async fn invoke(
        &self,
        handler: &Handler,
        topic: &Arc<Topic>,
        args: &EventArgs,
    ) -> Option<HandlerError> {
        let started = self.stats.is_some().then(Instant::now);

        let outcome = match handler {
            Handler::NoTopic(h) => {
                std::panic::AssertUnwindSafe(h.on_event(args))
                    .catch_unwind()
                    .await
            }
            Handler::WithTopic(h) => {
                std::panic::AssertUnwindSafe(h.on_event(topic, args))
                    .catch_unwind()
                    .await
            }
        };

        if let (Some(started), Some(stats)) = (started, &self.stats) {
            let elapsed = started.elapsed();
            let mut entry = stats.entry(handler.id()).or_default();
            entry.calls += 1;
            entry.total_time += elapsed;
        }

        match outcome {
            Ok(Ok(())) => None,
            Ok(Err(fault)) => {
                match fault {
                    HandlerError::UnexpectedTopicArg => debug!(
                        topic = self.topic.literal(),
                        handler = handler.name(),
                        "handler rejected the 'topic' argument",
                    ),
                    ref other => error!(
                        topic = self.topic.literal(),
                        handler = handler.name(),
                        fault = other.as_label(),
                        %other,
                        "handler failed",
                    ),
                }
                Some(fault)
            }
            Err(panic_payload) => {
                error!(
                    topic = self.topic.literal(),
                    handler = handler.name(),
                    panic = panic_message(&panic_payload),
                    "handler panicked",
                );
                None
            }
        }
    }

    fn list_for(&self, handler: &Handler) -> &RwLock<Vec<Handler>> {
        if handler.accepts_topic() {
            &self.with_topic
        } else {
            &self.no_topic
        }
    }
}

impl std::fmt::Debug for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hook")
            .field("topic", &self.topic.literal())
            .field("handlers", &self.len())
            .field("timed", &self.stats.is_some())
            .finish()
    }
}

/// Extracts a printable message from a panic payload.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
