//! # Error types used by the engine, the topic parser, and handlers.
//!
//! Three enums cover the crate's failure surface:
//!
//! - [`EngineError`] — queue pressure, routing, and lifecycle failures raised
//!   by [`Engine`](crate::Engine) and [`MsgQueue`](crate::MsgQueue).
//! - [`ParseError`] — malformed topic strings, raised at topic construction.
//! - [`HandlerError`] — failures returned by individual handlers; these are
//!   recovered inside the hook and never propagate to the dispatcher.
//!
//! All types provide `as_label()` for stable snake_case tags in logs.

use thiserror::Error;

/// Errors produced by the engine and its message queue.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum EngineError {
    /// Non-blocking enqueue into a full queue.
    #[error("message queue is full")]
    QueueFull,

    /// Non-blocking dequeue from an empty queue.
    #[error("message queue is empty")]
    QueueEmpty,

    /// Enqueue or dequeue after the queue was closed for shutdown.
    #[error("message queue is closed")]
    QueueClosed,

    /// Attempted to publish with a topic that still contains generic parts.
    #[error("cannot publish generic topic '{topic}'; publication targets must be exact")]
    InvalidTopic {
        /// Display form of the offending topic.
        topic: String,
    },

    /// No hook is bound to the given topic key.
    #[error("no hook registered for topic '{topic}'")]
    NotFound {
        /// Display form of the topic that was looked up.
        topic: String,
    },

    /// Another hook already occupies the topic key.
    #[error("a hook is already registered for topic '{topic}'")]
    AlreadyRegistered {
        /// Display form of the occupied topic.
        topic: String,
    },

    /// Operation requires a running engine, e.g. `stop()` while idle.
    #[error("engine is not active")]
    Inactive,

    /// Operation requires a stopped engine, e.g. `clear()` or a repeated
    /// `start()` while the dispatcher runs.
    #[error("engine is still active")]
    Active,
}

impl EngineError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            EngineError::QueueFull => "queue_full",
            EngineError::QueueEmpty => "queue_empty",
            EngineError::QueueClosed => "queue_closed",
            EngineError::InvalidTopic { .. } => "invalid_topic",
            EngineError::NotFound { .. } => "hook_not_found",
            EngineError::AlreadyRegistered { .. } => "hook_already_registered",
            EngineError::Inactive => "engine_inactive",
            EngineError::Active => "engine_active",
        }
    }

    /// Whether the error signals queue capacity pressure (retryable).
    #[must_use]
    pub fn is_backpressure(&self) -> bool {
        matches!(self, EngineError::QueueFull | EngineError::QueueEmpty)
    }
}

/// Errors produced while parsing a topic string.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum ParseError {
    /// The topic string is empty.
    #[error("topic string is empty")]
    Empty,

    /// Two separators in a row, or a leading/trailing separator.
    #[error("empty segment at part {index}")]
    EmptySegment {
        /// Zero-based part index of the empty segment.
        index: usize,
    },

    /// A `{` wildcard was opened but never closed within its segment.
    #[error("unterminated wildcard in part {index}")]
    UnterminatedWildcard { index: usize },

    /// A `{}` wildcard with no name.
    #[error("wildcard in part {index} has no name")]
    EmptyWildcard { index: usize },

    /// A `(` range was opened but never closed within its segment.
    #[error("unterminated range in part {index}")]
    UnterminatedRange { index: usize },

    /// A range contains an empty alternative, e.g. `(a||b)`.
    #[error("empty range alternative in part {index}")]
    EmptyRangeOption { index: usize },

    /// A range must offer at least two alternatives.
    #[error("range in part {index} needs at least two alternatives")]
    RangeNeedsAlternatives { index: usize },

    /// A `/` pattern was opened but never closed.
    #[error("unterminated pattern in part {index}")]
    UnterminatedPattern { index: usize },

    /// The pattern body did not compile as a regular expression.
    #[error("invalid pattern in part {index}: {source}")]
    InvalidPattern {
        index: usize,
        #[source]
        source: Box<regex::Error>,
    },

    /// A reserved character appeared outside a well-formed construct,
    /// e.g. `a}b` or `a|b` at segment level.
    #[error("unexpected '{found}' in part {index}")]
    UnexpectedChar { index: usize, found: char },
}

impl ParseError {
    /// Returns a short stable label.
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            ParseError::Empty => "topic_empty",
            ParseError::EmptySegment { .. } => "topic_empty_segment",
            ParseError::UnterminatedWildcard { .. } => "topic_unterminated_wildcard",
            ParseError::EmptyWildcard { .. } => "topic_empty_wildcard",
            ParseError::UnterminatedRange { .. } => "topic_unterminated_range",
            ParseError::EmptyRangeOption { .. } => "topic_empty_range_option",
            ParseError::RangeNeedsAlternatives { .. } => "topic_range_needs_alternatives",
            ParseError::UnterminatedPattern { .. } => "topic_unterminated_pattern",
            ParseError::InvalidPattern { .. } => "topic_invalid_pattern",
            ParseError::UnexpectedChar { .. } => "topic_unexpected_char",
        }
    }
}

/// Errors returned by handler invocations.
///
/// A hook logs these and moves on to the next handler; they are never fatal
/// to dispatch.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum HandlerError {
    /// The handler does not accept the injected `topic` named argument.
    ///
    /// With [`retry_on_unexpected_topic`](crate::HookConfig) set, the hook
    /// retries the call once with the injected binding stripped.
    #[error("handler does not accept a 'topic' argument")]
    UnexpectedTopicArg,

    /// The handler failed for an application-level reason.
    #[error("handler failed: {reason}")]
    Failed {
        /// Human-readable failure description.
        reason: String,
    },
}

impl HandlerError {
    /// Returns a short stable label.
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::UnexpectedTopicArg => "handler_unexpected_topic",
            HandlerError::Failed { .. } => "handler_failed",
        }
    }

    /// Builds a [`HandlerError::Failed`] from any displayable reason.
    pub fn failed(reason: impl Into<String>) -> Self {
        HandlerError::Failed {
            reason: reason.into(),
        }
    }
}
