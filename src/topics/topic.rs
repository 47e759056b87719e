//! # Structured topics and their canonical keys.
//!
//! [`Topic`] is the immutable, parsed form of a dotted topic string such as
//! `MarketData.{symbol}.(Equity|Futures)./^T/`. Beyond its parts it carries:
//!
//! - `literal` — the display string (parts joined by `.`)
//! - `key` — a structural byte encoding used for equality and map indexing
//! - a precomputed 64-bit hash of `key`
//! - an exactness flag (`true` iff every part is literal)
//!
//! ## Rules
//! - Equality and hashing go through `key`, never through `literal`: the key
//!   encoding length-prefixes every part, so `A.B` + `C` and `A` + `B.C`
//!   cannot collide even if a display form did.
//! - Topics are immutable after construction; [`Topic::format`] returns a
//!   new topic.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;
use crate::hash::fnv1a64;
use crate::topics::matching::MatchResult;
use crate::topics::parse::parse_parts;
use crate::topics::part::TopicPart;

/// Byte separating part encodings inside a canonical key.
const KEY_SEPARATOR: u8 = 0x1f;

/// A parsed, immutable topic.
#[derive(Clone)]
pub struct Topic {
    parts: Vec<TopicPart>,
    literal: String,
    key: Box<[u8]>,
    hash: u64,
    exact: bool,
}

impl Topic {
    /// Parses a topic string.
    ///
    /// # Errors
    /// Returns a [`ParseError`] for empty segments, unterminated constructs,
    /// stray reserved characters, or invalid pattern bodies.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        Ok(Self::from_parts(parse_parts(input)?))
    }

    /// Builds a topic from already-validated parts.
    pub(crate) fn from_parts(parts: Vec<TopicPart>) -> Self {
        debug_assert!(!parts.is_empty());

        let literal = parts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".");
        let key = encode_key(&parts);
        let hash = fnv1a64(&key);
        let exact = parts.iter().all(TopicPart::is_exact);

        Self {
            parts,
            literal,
            key,
            hash,
            exact,
        }
    }

    /// The display string, parts joined by `.`.
    #[must_use]
    pub fn literal(&self) -> &str {
        &self.literal
    }

    /// The canonical key; injective over structurally distinct topics.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Stable 64-bit hash of the canonical key.
    #[must_use]
    pub fn hash64(&self) -> u64 {
        self.hash
    }

    /// Whether every part is a literal.
    ///
    /// Only exact topics are valid publication targets.
    #[must_use]
    pub fn is_exact(&self) -> bool {
        self.exact
    }

    /// Number of parts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Always false; a topic has at least one part.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// The parts, in order.
    #[must_use]
    pub fn parts(&self) -> &[TopicPart] {
        &self.parts
    }

    /// Iterates the parts.
    pub fn iter(&self) -> std::slice::Iter<'_, TopicPart> {
        self.parts.iter()
    }

    /// Names of the `Any` wildcards, in part order.
    #[must_use]
    pub fn wildcard_names(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(TopicPart::wildcard_name)
            .collect()
    }

    /// Matches `self` (the registered pattern) against an exact `target`.
    ///
    /// The result carries one node per part with the captured literal; see
    /// [`MatchResult`]. Non-matching when the part counts differ or when the
    /// target itself contains generic parts.
    #[must_use]
    pub fn matches(&self, target: &Topic) -> MatchResult {
        MatchResult::evaluate(self, target)
    }

    /// Substitutes named wildcards with literal fragments.
    ///
    /// Each `Any` part whose name appears in `assignments` becomes an
    /// `Exact` part; everything else is kept as-is. When every part ends up
    /// literal the result reports [`is_exact`](Self::is_exact).
    ///
    /// # Errors
    /// A substituted value must itself be a valid exact fragment: non-empty
    /// and free of `.{}()/|`.
    pub fn format<'a, I>(&self, assignments: I) -> Result<Topic, ParseError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let assignments: HashMap<&str, &str> = assignments.into_iter().collect();

        let mut parts = Vec::with_capacity(self.parts.len());
        for (index, part) in self.parts.iter().enumerate() {
            match part.wildcard_name().and_then(|n| assignments.get(n)) {
                Some(value) => {
                    validate_fragment(value, index)?;
                    parts.push(TopicPart::Exact((*value).to_owned()));
                }
                None => parts.push(part.clone()),
            }
        }
        Ok(Topic::from_parts(parts))
    }
}

impl FromStr for Topic {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::parse(s)
    }
}

impl TryFrom<&str> for Topic {
    type Error = ParseError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Topic::parse(s)
    }
}

impl PartialEq for Topic {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.key == other.key
    }
}

impl Eq for Topic {}

impl std::hash::Hash for Topic {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write(&self.key);
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.literal)
    }
}

impl fmt::Debug for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Topic({})", self.literal)
    }
}

/// Encodes parts as `tag · u32-be length · content`, joined by `0x1f`.
///
/// The length prefix is what keeps the encoding injective: a literal dot in
/// one fragment cannot be confused with a part boundary.
fn encode_key(parts: &[TopicPart]) -> Box<[u8]> {
    let mut key = Vec::with_capacity(parts.len() * 8);
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            key.push(KEY_SEPARATOR);
        }
        let content = part.canonical_content();
        key.push(part.tag());
        key.extend_from_slice(&(content.len() as u32).to_be_bytes());
        key.extend_from_slice(content.as_bytes());
    }
    key.into_boxed_slice()
}

fn validate_fragment(value: &str, index: usize) -> Result<(), ParseError> {
    if value.is_empty() {
        return Err(ParseError::EmptySegment { index });
    }
    if let Some(found) = value.chars().find(|c| ".{}()/|".contains(*c)) {
        return Err(ParseError::UnexpectedChar { index, found });
    }
    Ok(())
}
