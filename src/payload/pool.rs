//! # Fixed-size payload pool.
//!
//! Publishing at rate should not allocate per message. [`PayloadPool`]
//! pre-allocates a fixed number of [`Payload`] slots and recycles them:
//!
//! - [`acquire`](PayloadPool::acquire) reuses a freed slot, falling back to
//!   a fresh heap allocation when the pool is exhausted or disabled — a
//!   publication is never dropped for want of a slot.
//! - [`recycle`](PayloadPool::recycle) drops the payload's argument refs
//!   and returns the allocation to the free list (up to pool capacity).
//!
//! Internally serialized by a mutex; safe to share across producer tasks
//! and the dispatcher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::payload::args::EventArgs;
use crate::payload::payload::Payload;
use crate::topics::Topic;

/// Reusable allocator for [`Payload`]s.
pub struct PayloadPool {
    free: Mutex<Vec<Box<Payload>>>,
    capacity: usize,
    active: AtomicBool,
}

impl PayloadPool {
    /// Creates a pool with `capacity` pre-allocated slots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let free = (0..capacity).map(|_| Box::new(Payload::blank())).collect();
        Self {
            free: Mutex::new(free),
            capacity,
            active: AtomicBool::new(true),
        }
    }

    /// Takes a slot and fills it with one publication.
    ///
    /// Falls back to heap allocation when no freed slot is available.
    pub fn acquire(&self, topic: Arc<Topic>, args: EventArgs, seq_id: u64) -> Box<Payload> {
        let reused = if self.active.load(Ordering::Acquire) {
            self.free.lock().expect("payload pool poisoned").pop()
        } else {
            None
        };

        match reused {
            Some(mut payload) => {
                payload.topic = Some(topic);
                payload.args = args;
                payload.seq_id = seq_id;
                payload.recycled = true;
                payload
            }
            None => Box::new(Payload {
                topic: Some(topic),
                args,
                seq_id,
                recycled: false,
            }),
        }
    }

    /// Releases a payload: drops its topic and argument refs, then returns
    /// the allocation to the free list if there is room.
    pub fn recycle(&self, mut payload: Box<Payload>) {
        payload.topic = None;
        payload.args.reset();
        payload.seq_id = 0;

        if !self.active.load(Ordering::Acquire) {
            return;
        }
        let mut free = self.free.lock().expect("payload pool poisoned");
        if free.len() < self.capacity {
            free.push(payload);
        }
    }

    /// Number of slots currently resting in the free list.
    #[must_use]
    pub fn available(&self) -> usize {
        self.free.lock().expect("payload pool poisoned").len()
    }

    /// Configured slot count.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Hot-disables (or re-enables) slot reuse.
    ///
    /// While inactive, `acquire` always heap-allocates and `recycle` frees
    /// outright.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    /// Whether slot reuse is enabled.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}
