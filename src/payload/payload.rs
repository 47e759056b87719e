//! # On-queue message record.
//!
//! A [`Payload`] carries one publication through the engine: the target
//! topic, the opaque arguments, and a sequence id. Ownership is exclusive
//! at every point in its life — the producer fills it, the queue holds it,
//! the dispatcher routes it, and the pool takes it back.

use std::fmt;
use std::sync::Arc;

use crate::payload::args::EventArgs;
use crate::topics::Topic;

/// One in-flight publication.
pub struct Payload {
    /// `None` only while the payload rests blank inside the pool.
    pub(crate) topic: Option<Arc<Topic>>,
    pub(crate) args: EventArgs,
    pub(crate) seq_id: u64,
    /// Whether this allocation was served from the pool's free list.
    pub(crate) recycled: bool,
}

impl Payload {
    pub(crate) fn blank() -> Self {
        Self {
            topic: None,
            args: EventArgs::new(),
            seq_id: 0,
            recycled: false,
        }
    }

    /// The publication target.
    #[must_use]
    pub fn topic(&self) -> &Arc<Topic> {
        // Blank payloads live only inside the pool and are never observable.
        self.topic.as_ref().expect("payload is filled while in flight")
    }

    /// The publication arguments.
    #[must_use]
    pub fn args(&self) -> &EventArgs {
        &self.args
    }

    /// Engine-wide monotonically increasing sequence id.
    #[must_use]
    pub fn seq_id(&self) -> u64 {
        self.seq_id
    }

    /// Whether the allocation was reused from the pool.
    #[must_use]
    pub fn recycled(&self) -> bool {
        self.recycled
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("topic", &self.topic.as_deref().map(Topic::literal))
            .field("seq_id", &self.seq_id)
            .field("args", &self.args)
            .finish()
    }
}
