//! # Bounded message queue.
//!
//! [`MsgQueue`] is the producer/consumer seam of the engine: a fixed-size
//! ring with three acquisition modes per direction:
//!
//! - `try_put` / `try_get` — non-blocking, fail fast on full/empty
//! - `put_await` / `get_await` — wait until space/an item is available
//! - `put_hybrid` / `get_hybrid` — spin a bounded number of non-blocking
//!   attempts first, then fall back to a (possibly timed) wait
//!
//! ## Rules
//! - FIFO across all producers of one queue; no cross-queue ordering.
//! - A zero timeout on the hybrid operations means wait indefinitely.
//! - [`close`](MsgQueue::close) wakes every waiter; puts then fail with
//!   `Closed`, gets may still drain resident items and report `Closed`
//!   only once the ring is empty.
//!
//! The ring is guarded by a `std::sync::Mutex` (never held across await);
//! the source design's two condition variables map onto two
//! [`tokio::sync::Notify`] instances, whose stored-permit semantics cover
//! the notify-before-wait race.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

/// Non-blocking enqueue failure, handing the item back.
#[derive(Debug, PartialEq, Eq)]
pub enum PutError<T> {
    /// The ring is at capacity.
    Full(T),
    /// The queue was closed.
    Closed(T),
}

impl<T> PutError<T> {
    /// Recovers the rejected item.
    pub fn into_inner(self) -> T {
        match self {
            PutError::Full(item) | PutError::Closed(item) => item,
        }
    }
}

/// Non-blocking dequeue failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetError {
    /// The ring is empty.
    Empty,
    /// The queue was closed and fully drained.
    Closed,
}

struct Ring<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    count: usize,
    closed: bool,
}

/// Bounded FIFO ring with non-blocking, awaiting, and hybrid operations.
pub struct MsgQueue<T> {
    ring: Mutex<Ring<T>>,
    not_empty: Notify,
    not_full: Notify,
    capacity: usize,
}

impl<T> MsgQueue<T> {
    /// Creates a queue holding at most `capacity` items (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let slots = (0..capacity).map(|_| None).collect();
        Self {
            ring: Mutex::new(Ring {
                slots,
                head: 0,
                count: 0,
                closed: false,
            }),
            not_empty: Notify::new(),
            not_full: Notify::new(),
            capacity,
        }
    }

    /// Maximum number of resident items.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of resident items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.lock().expect("queue poisoned").count
    }

    /// Whether the ring holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the ring is at capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity
    }

    /// Whether [`close`](Self::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.ring.lock().expect("queue poisoned").closed
    }

    /// Enqueues without waiting.
    ///
    /// # Errors
    /// [`PutError::Full`] when at capacity, [`PutError::Closed`] after
    /// shutdown; both return the item.
    pub fn try_put(&self, item: T) -> Result<(), PutError<T>> {
        {
            let mut ring = self.ring.lock().expect("queue poisoned");
            if ring.closed {
                return Err(PutError::Closed(item));
            }
            if ring.count == self.capacity {
                return Err(PutError::Full(item));
            }
            let tail = (ring.head + ring.count) % self.capacity;
            ring.slots[tail] = Some(item);
            ring.count += 1;
        }
        self.not_empty.notify_one();
        Ok(())
    }

    /// Dequeues without waiting.
    ///
    /// # Errors
    /// [`GetError::Empty`] when nothing is resident, [`GetError::Closed`]
    /// once the queue is closed **and** drained.
    pub fn try_get(&self) -> Result<T, GetError> {
        let item = {
            let mut ring = self.ring.lock().expect("queue poisoned");
            if ring.count == 0 {
                return Err(if ring.closed {
                    GetError::Closed
                } else {
                    GetError::Empty
                });
            }
            let head = ring.head;
            let item = ring.slots[head].take().expect("occupied ring slot");
            ring.head = (head + 1) % self.capacity;
            ring.count -= 1;
            item
        };
        self.not_full.notify_one();
        Ok(item)
    }

    /// Enqueues, waiting for space indefinitely.
    ///
    /// # Errors
    /// [`PutError::Closed`] when the queue shuts down while waiting.
    pub async fn put_await(&self, item: T) -> Result<(), PutError<T>> {
        self.put_deadline(item, None).await
    }

    /// Dequeues, waiting for an item indefinitely.
    ///
    /// # Errors
    /// [`GetError::Closed`] when the queue shuts down while waiting.
    pub async fn get_await(&self) -> Result<T, GetError> {
        self.get_deadline(None).await
    }

    /// Enqueues with a spin phase before waiting.
    ///
    /// Tries non-blocking up to `max_spin` times, then waits for space.
    /// A zero `timeout` waits indefinitely.
    ///
    /// # Errors
    /// [`PutError::Full`] when the timed wait elapses, [`PutError::Closed`]
    /// on shutdown.
    pub async fn put_hybrid(
        &self,
        mut item: T,
        max_spin: u32,
        timeout: Duration,
    ) -> Result<(), PutError<T>> {
        for _ in 0..max_spin {
            match self.try_put(item) {
                Ok(()) => return Ok(()),
                Err(PutError::Closed(it)) => return Err(PutError::Closed(it)),
                Err(PutError::Full(it)) => item = it,
            }
            std::hint::spin_loop();
        }
        let deadline = deadline_after(timeout);
        self.put_deadline(item, deadline).await
    }

    /// Dequeues with a spin phase before waiting.
    ///
    /// Tries non-blocking up to `max_spin` times, then waits for an item.
    /// A zero `timeout` waits indefinitely.
    ///
    /// # Errors
    /// [`GetError::Empty`] when the timed wait elapses, [`GetError::Closed`]
    /// on shutdown with a drained ring.
    pub async fn get_hybrid(&self, max_spin: u32, timeout: Duration) -> Result<T, GetError> {
        for _ in 0..max_spin {
            match self.try_get() {
                Ok(item) => return Ok(item),
                Err(GetError::Closed) => return Err(GetError::Closed),
                Err(GetError::Empty) => {}
            }
            std::hint::spin_loop();
        }
        let deadline = deadline_after(timeout);
        self.get_deadline(deadline).await
    }

    /// Closes the queue and wakes every waiter.
    ///
    /// Resident items stay drainable via the `get` family.
    pub fn close(&self) {
        self.ring.lock().expect("queue poisoned").closed = true;
        self.not_empty.notify_waiters();
        self.not_full.notify_waiters();
    }

    /// Removes and returns every resident item (shutdown cleanup).
    pub fn drain(&self) -> Vec<T> {
        let mut ring = self.ring.lock().expect("queue poisoned");
        let mut drained = Vec::with_capacity(ring.count);
        while ring.count > 0 {
            let head = ring.head;
            drained.push(ring.slots[head].take().expect("occupied ring slot"));
            ring.head = (head + 1) % self.capacity;
            ring.count -= 1;
        }
        drop(ring);
        self.not_full.notify_waiters();
        drained
    }

    async fn put_deadline(&self, mut item: T, deadline: Option<Instant>) -> Result<(), PutError<T>> {
        loop {
            // Register interest before the attempt so a wake-up between the
            // failed try and the await is not lost.
            let notified = self.not_full.notified();
            match self.try_put(item) {
                Ok(()) => return Ok(()),
                Err(PutError::Closed(it)) => return Err(PutError::Closed(it)),
                Err(PutError::Full(it)) => item = it,
            }
            match deadline {
                None => notified.await,
                Some(at) => {
                    if tokio::time::timeout_at(at, notified).await.is_err() {
                        return Err(PutError::Full(item));
                    }
                }
            }
        }
    }

    async fn get_deadline(&self, deadline: Option<Instant>) -> Result<T, GetError> {
        loop {
            let notified = self.not_empty.notified();
            match self.try_get() {
                Ok(item) => return Ok(item),
                Err(GetError::Closed) => return Err(GetError::Closed),
                Err(GetError::Empty) => {}
            }
            match deadline {
                None => notified.await,
                Some(at) => {
                    if tokio::time::timeout_at(at, notified).await.is_err() {
                        return Err(GetError::Empty);
                    }
                }
            }
        }
    }
}

fn deadline_after(timeout: Duration) -> Option<Instant> {
    if timeout.is_zero() {
        None
    } else {
        Some(Instant::now() + timeout)
    }
}
