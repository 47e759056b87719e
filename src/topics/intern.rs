//! # Process-wide topic interning.
//!
//! Parsing a topic allocates; hot publication paths tend to rebuild the same
//! handful of topics over and over. [`intern`] deduplicates construction
//! through a process-wide map from literal string to `Arc<Topic>`:
//!
//! - initialized lazily on first use ([`init`] pins a custom capacity first)
//! - bounded: once `capacity` distinct literals are cached, further lookups
//!   parse fresh instead of growing the map
//! - [`clear`] drops all cached topics (resident `Arc`s stay alive)
//!
//! None of the engine requires interning; it is an optional convenience.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::error::ParseError;
use crate::topics::topic::Topic;

/// Default bound on distinct cached literals.
const DEFAULT_CAPACITY: usize = 4096;

struct InternMap {
    topics: DashMap<String, Arc<Topic>>,
    capacity: usize,
}

static INTERN: OnceLock<InternMap> = OnceLock::new();

fn map() -> &'static InternMap {
    INTERN.get_or_init(|| InternMap {
        topics: DashMap::new(),
        capacity: DEFAULT_CAPACITY,
    })
}

/// Pins the intern map capacity before first use.
///
/// Returns `false` (and changes nothing) when the map was already
/// initialized, matching first-wins semantics.
pub fn init(capacity: usize) -> bool {
    INTERN
        .set(InternMap {
            topics: DashMap::new(),
            capacity: capacity.max(1),
        })
        .is_ok()
}

/// Parses `input`, deduplicating through the process-wide map.
///
/// Repeated calls with the same literal return clones of one shared
/// `Arc<Topic>`. Beyond capacity, parsing still succeeds but is not cached.
///
/// # Errors
/// Propagates [`ParseError`] from [`Topic::parse`]; failures are never
/// cached.
pub fn intern(input: &str) -> Result<Arc<Topic>, ParseError> {
    let interned = map();
    if let Some(existing) = interned.topics.get(input) {
        return Ok(Arc::clone(existing.value()));
    }

    let topic = Arc::new(Topic::parse(input)?);
    if interned.topics.len() < interned.capacity {
        // A racing insert of the same literal is harmless; both Arcs wrap
        // equal topics and the map keeps whichever landed first.
        interned
            .topics
            .entry(input.to_owned())
            .or_insert_with(|| Arc::clone(&topic));
    }
    Ok(topic)
}

/// Drops every cached topic.
pub fn clear() {
    if let Some(interned) = INTERN.get() {
        interned.topics.clear();
    }
}

/// Number of currently cached literals.
#[must_use]
pub fn len() -> usize {
    INTERN.get().map_or(0, |interned| interned.topics.len())
}
