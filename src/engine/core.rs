//! # Engine: routing, dispatch lifecycle, and the publish/subscribe API.
//!
//! The [`Engine`] owns the moving parts of the system and wires them
//! together:
//!
//! ```text
//! producers ──► publish() ──► PayloadPool ──► MsgQueue
//!                                               │
//!                               dispatcher task ┘
//!                                   │
//!                                   ├──► exact KeyMap  ── O(1) lookup
//!                                   ├──► generic KeyMap ── match walk
//!                                   │         └──► Hook::trigger()
//!                                   └──► recycle payload
//! ```
//!
//! ## Rules
//! - Publication targets must be exact topics; generic topics are refused.
//! - A hook lives in the exact map iff its topic is exact; one hook per
//!   canonical key.
//! - Generic hooks fire in registration order; there is no specificity
//!   tie-break.
//! - Both maps sit behind mutexes: hooks may be registered or removed from
//!   any thread at any time. The dispatcher snapshots matching hooks under
//!   the lock and invokes them outside it.
//! - Lifecycle transitions are strict: `start` requires an idle engine,
//!   `stop` an active one, `clear` a stopped one; wrong-state calls are
//!   logged and refused with a typed error.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::engine::timers::EngineTimers;
use crate::error::EngineError;
use crate::hooks::{Handler, Hook};
use crate::keymap::KeyMap;
use crate::payload::{EventArgs, Payload, PayloadPool};
use crate::queue::{GetError, MsgQueue, PutError};
use crate::topics::Topic;

const IDLE: u8 = 0;
const ACTIVE: u8 = 1;
const STOPPING: u8 = 2;

/// Shared state behind every [`Engine`] handle.
pub(crate) struct Shared {
    pub(crate) config: EngineConfig,
    pub(crate) queue: MsgQueue<Box<Payload>>,
    pub(crate) pool: PayloadPool,
    exact: Mutex<KeyMap<Arc<Hook>>>,
    generic: Mutex<KeyMap<Arc<Hook>>>,
    seq: AtomicU64,
    state: AtomicU8,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    cancel: Mutex<CancellationToken>,
    pub(crate) timers: EngineTimers,
}

/// Topic-routed publish/subscribe engine.
///
/// Cheap to clone; all clones share one queue, pool, and hook registry.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
}

impl Engine {
    /// Creates an engine with the given configuration, inactive.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let shared = Arc::new_cyclic(|weak| Shared {
            queue: MsgQueue::new(config.capacity),
            pool: PayloadPool::new(config.pool_size),
            exact: Mutex::new(KeyMap::new()),
            generic: Mutex::new(KeyMap::new()),
            seq: AtomicU64::new(0),
            state: AtomicU8::new(IDLE),
            dispatcher: Mutex::new(None),
            cancel: Mutex::new(CancellationToken::new()),
            timers: EngineTimers::new(weak.clone()),
            config,
        });
        Self { shared }
    }

    // ---- Publication ----

    /// Publishes without waiting.
    ///
    /// Returns the message's sequence id.
    ///
    /// # Errors
    /// [`EngineError::InvalidTopic`] for generic topics,
    /// [`EngineError::QueueFull`] when the queue is at capacity.
    pub fn try_publish(
        &self,
        topic: impl Into<Arc<Topic>>,
        args: EventArgs,
    ) -> Result<u64, EngineError> {
        let payload = self.shared.fill(topic.into(), args)?;
        let seq = payload.seq_id();
        self.shared
            .queue
            .try_put(payload)
            .map_err(|e| self.shared.reject(e))?;
        Ok(seq)
    }

    /// Publishes with the configured hybrid wait (spin, then wait up to
    /// the configured timeout; a zero timeout waits indefinitely).
    ///
    /// # Errors
    /// As [`try_publish`](Self::try_publish); [`EngineError::QueueFull`]
    /// when the timed wait elapses.
    pub async fn publish(
        &self,
        topic: impl Into<Arc<Topic>>,
        args: EventArgs,
    ) -> Result<u64, EngineError> {
        let timeout = self.shared.config.timeout;
        self.publish_timeout(topic, args, timeout).await
    }

    /// Publishes with an explicit wait bound; zero waits indefinitely.
    pub async fn publish_timeout(
        &self,
        topic: impl Into<Arc<Topic>>,
        args: EventArgs,
        timeout: Duration,
    ) -> Result<u64, EngineError> {
        let payload = self.shared.fill(topic.into(), args)?;
        let seq = payload.seq_id();
        self.shared
            .queue
            .put_hybrid(payload, self.shared.config.max_spin, timeout)
            .await
            .map_err(|e| self.shared.reject(e))?;
        Ok(seq)
    }

    // ---- Pull consumption (tests, pull consumers) ----

    /// Pops a payload without waiting.
    ///
    /// # Errors
    /// [`EngineError::QueueEmpty`] when nothing is queued.
    pub fn try_get(&self) -> Result<Box<Payload>, EngineError> {
        self.shared.queue.try_get().map_err(Into::into)
    }

    /// Pops a payload with the configured hybrid wait.
    pub async fn get(&self) -> Result<Box<Payload>, EngineError> {
        let timeout = self.shared.config.timeout;
        self.get_timeout(timeout).await
    }

    /// Pops a payload with an explicit wait bound; zero waits indefinitely.
    pub async fn get_timeout(&self, timeout: Duration) -> Result<Box<Payload>, EngineError> {
        self.shared
            .queue
            .get_hybrid(self.shared.config.max_spin, timeout)
            .await
            .map_err(Into::into)
    }

    /// Returns a pulled payload's slot to the pool.
    pub fn recycle(&self, payload: Box<Payload>) {
        self.shared.pool.recycle(payload);
    }

    // ---- Hook registry ----

    /// Registers a hook under its topic's canonical key.
    ///
    /// # Errors
    /// [`EngineError::AlreadyRegistered`] when the key is occupied.
    pub fn register_hook(&self, hook: Arc<Hook>) -> Result<(), EngineError> {
        let topic = Arc::clone(hook.topic());
        let mut map = self.shared.map_for(&topic).lock().expect("hook map poisoned");
        if map.contains(topic.key()) {
            return Err(EngineError::AlreadyRegistered {
                topic: topic.literal().to_owned(),
            });
        }
        map.set(topic.key(), hook);
        Ok(())
    }

    /// Removes and returns the hook bound to the topic.
    ///
    /// # Errors
    /// [`EngineError::NotFound`] when no hook occupies the key.
    pub fn unregister_hook(&self, topic: &Topic) -> Result<Arc<Hook>, EngineError> {
        self.shared
            .map_for(topic)
            .lock()
            .expect("hook map poisoned")
            .pop(topic.key())
            .ok_or_else(|| EngineError::NotFound {
                topic: topic.literal().to_owned(),
            })
    }

    /// Adds a handler, creating the hook on demand.
    ///
    /// Returns whether the handler was added (`false` only for a
    /// deduplicated duplicate).
    pub fn register_handler(
        &self,
        topic: impl Into<Arc<Topic>>,
        handler: Handler,
        deduplicate: bool,
    ) -> bool {
        let topic = topic.into();
        let hook = {
            let mut map = self.shared.map_for(&topic).lock().expect("hook map poisoned");
            match map.get(topic.key()) {
                Some(hook) => Arc::clone(hook),
                None => {
                    let hook = Arc::new(Hook::new(Arc::clone(&topic)));
                    map.set(topic.key(), Arc::clone(&hook));
                    hook
                }
            }
        };
        hook.add_handler(handler, deduplicate)
    }

    /// Removes a handler; unregisters the hook once it holds none.
    ///
    /// # Errors
    /// [`EngineError::NotFound`] when no hook is bound to the topic.
    pub fn unregister_handler(
        &self,
        topic: &Topic,
        handler: &Handler,
    ) -> Result<(), EngineError> {
        let mut map = self.shared.map_for(topic).lock().expect("hook map poisoned");
        let Some(hook) = map.get(topic.key()).map(Arc::clone) else {
            return Err(EngineError::NotFound {
                topic: topic.literal().to_owned(),
            });
        };
        hook.remove_handler(handler);
        if hook.is_empty() {
            map.pop(topic.key());
        }
        Ok(())
    }

    /// Drops every hook and timer. Requires a stopped engine.
    ///
    /// # Errors
    /// [`EngineError::Active`] while the dispatcher runs.
    pub fn clear(&self) -> Result<(), EngineError> {
        if self.shared.state.load(Ordering::Acquire) != IDLE {
            return Err(EngineError::Active);
        }
        self.shared.timers.abort_all();
        self.shared.exact.lock().expect("hook map poisoned").clear();
        self.shared.generic.lock().expect("hook map poisoned").clear();
        info!("engine cleared");
        Ok(())
    }

    // ---- Lifecycle ----

    /// Spawns the background dispatcher.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    /// [`EngineError::Active`] when the engine is already started (logged).
    pub fn start(&self) -> Result<(), EngineError> {
        if self
            .shared
            .state
            .compare_exchange(IDLE, ACTIVE, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("engine already started");
            return Err(EngineError::Active);
        }

        let token = CancellationToken::new();
        *self.shared.cancel.lock().expect("cancel token poisoned") = token.clone();

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            dispatch_loop(&shared, token).await;
        });
        *self.shared.dispatcher.lock().expect("dispatcher handle poisoned") = Some(handle);
        info!("engine started");
        Ok(())
    }

    /// Stops the dispatcher and every timer, then joins them.
    ///
    /// Messages already queued stay queued; publishing into a stopped
    /// engine still succeeds until the queue fills.
    ///
    /// # Errors
    /// [`EngineError::Inactive`] when the engine is not running (logged).
    pub async fn stop(&self) -> Result<(), EngineError> {
        if self
            .shared
            .state
            .compare_exchange(ACTIVE, STOPPING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("engine already stopped");
            return Err(EngineError::Inactive);
        }

        self.shared
            .cancel
            .lock()
            .expect("cancel token poisoned")
            .cancel();
        self.shared.timers.stop().await;

        let handle = self
            .shared
            .dispatcher
            .lock()
            .expect("dispatcher handle poisoned")
            .take();
        if let Some(handle) = handle {
            if let Err(join_err) = handle.await {
                warn!(error = %join_err, "dispatcher task ended abnormally");
            }
        }

        self.shared.state.store(IDLE, Ordering::Release);
        info!("engine stopped");
        Ok(())
    }

    /// Whether the dispatcher is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.shared.state.load(Ordering::Acquire) == ACTIVE
    }

    // ---- Timers ----

    /// Returns the well-known topic for `interval`, starting its timer task
    /// if not already running.
    ///
    /// The 1-second and 60-second intervals align their ticks to wall-clock
    /// boundaries and carry a `timestamp` named argument; other intervals
    /// carry `interval` and `trigger_time`. A second call with a running
    /// interval returns the existing topic; `activate_at` is then ignored.
    ///
    /// Must be called inside a tokio runtime.
    pub fn get_timer(
        &self,
        interval: Duration,
        activate_at: Option<SystemTime>,
    ) -> Arc<Topic> {
        self.shared.timers.get_or_spawn(interval, activate_at)
    }

    /// Timer registry introspection.
    #[must_use]
    pub fn timers(&self) -> &EngineTimers {
        &self.shared.timers
    }

    // ---- Introspection ----

    /// Registered topics: the exact map first, then the generic map, each
    /// in insertion order.
    #[must_use]
    pub fn topics(&self) -> Vec<Arc<Topic>> {
        self.hooks().iter().map(|h| Arc::clone(h.topic())).collect()
    }

    /// Registered hooks, in the same order as [`topics`](Self::topics).
    #[must_use]
    pub fn hooks(&self) -> Vec<Arc<Hook>> {
        let mut hooks: Vec<Arc<Hook>> = self
            .shared
            .exact
            .lock()
            .expect("hook map poisoned")
            .values()
            .map(Arc::clone)
            .collect();
        hooks.extend(
            self.shared
                .generic
                .lock()
                .expect("hook map poisoned")
                .values()
                .map(Arc::clone),
        );
        hooks
    }

    /// `(topic, hook)` pairs, in the same order as [`topics`](Self::topics).
    #[must_use]
    pub fn items(&self) -> Vec<(Arc<Topic>, Arc<Hook>)> {
        self.hooks()
            .into_iter()
            .map(|hook| (Arc::clone(hook.topic()), hook))
            .collect()
    }

    /// Number of registered hooks across both maps.
    #[must_use]
    pub fn hook_count(&self) -> usize {
        self.shared.exact.lock().expect("hook map poisoned").len()
            + self.shared.generic.lock().expect("hook map poisoned").len()
    }

    /// Number of currently queued messages.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }

    /// Maximum number of queued messages.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.queue.capacity()
    }

    /// The payload pool (slot availability, hot-disable).
    #[must_use]
    pub fn pool(&self) -> &PayloadPool {
        &self.shared.pool
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.shared.state.load(Ordering::Acquire) {
            ACTIVE => "active",
            STOPPING => "stopping",
            _ => "idle",
        };
        write!(
            f,
            "Engine({state}, hooks={}, queued={})",
            self.hook_count(),
            self.queue_len()
        )
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl Shared {
    /// Builds a filled payload for one publication.
    fn fill(&self, topic: Arc<Topic>, args: EventArgs) -> Result<Box<Payload>, EngineError> {
        if !topic.is_exact() {
            return Err(EngineError::InvalidTopic {
                topic: topic.literal().to_owned(),
            });
        }
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(self.pool.acquire(topic, args, seq))
    }

    /// Recycles a rejected payload and maps the queue error.
    fn reject(&self, error: PutError<Box<Payload>>) -> EngineError {
        match error {
            PutError::Full(payload) => {
                self.pool.recycle(payload);
                EngineError::QueueFull
            }
            PutError::Closed(payload) => {
                self.pool.recycle(payload);
                EngineError::QueueClosed
            }
        }
    }

    fn map_for(&self, topic: &Topic) -> &Mutex<KeyMap<Arc<Hook>>> {
        if topic.is_exact() {
            &self.exact
        } else {
            &self.generic
        }
    }

    /// Publishes a timer tick without waiting; a full queue drops the tick.
    pub(crate) fn publish_tick(&self, topic: &Arc<Topic>, args: EventArgs) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let payload = self.pool.acquire(Arc::clone(topic), args, seq);
        match self.queue.try_put(payload) {
            Ok(()) => {}
            Err(PutError::Full(payload)) => {
                self.pool.recycle(payload);
                warn!(topic = topic.literal(), "timer tick dropped: queue full");
            }
            Err(PutError::Closed(payload)) => {
                self.pool.recycle(payload);
            }
        }
    }

    /// Routes one payload: exact hit first, then the generic walk.
    async fn dispatch(&self, payload: Box<Payload>) {
        let exact_hit = self
            .exact
            .lock()
            .expect("hook map poisoned")
            .get(payload.topic().key())
            .map(Arc::clone);
        if let Some(hook) = exact_hit {
            hook.trigger(&payload).await;
        }

        // Snapshot matching generic hooks under the lock, invoke outside.
        let generic_hits: Vec<Arc<Hook>> = {
            let generic = self.generic.lock().expect("hook map poisoned");
            if generic.is_empty() {
                Vec::new()
            } else {
                generic
                    .values()
                    .filter(|hook| hook.topic().matches(payload.topic()).matched())
                    .map(Arc::clone)
                    .collect()
            }
        };
        for hook in generic_hits {
            hook.trigger(&payload).await;
        }

        self.pool.recycle(payload);
    }
}

/// Consumes the queue until cancellation; one payload at a time.
async fn dispatch_loop(shared: &Shared, cancel: CancellationToken) {
    debug!("dispatcher running");
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            result = shared
                .queue
                .get_hybrid(shared.config.max_spin, Duration::ZERO) =>
            {
                match result {
                    Ok(payload) => shared.dispatch(payload).await,
                    Err(GetError::Closed) => break,
                    Err(GetError::Empty) => {}
                }
            }
        }
    }
    debug!("dispatcher exited");
}

impl From<GetError> for EngineError {
    fn from(error: GetError) -> Self {
        match error {
            GetError::Empty => EngineError::QueueEmpty,
            GetError::Closed => EngineError::QueueClosed,
        }
    }
}
