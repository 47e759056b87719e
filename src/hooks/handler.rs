//! # Handler abstractions.
//!
//! A handler is an async callable bound to a hook. Two calling conventions
//! exist, chosen at registration time by the [`Handler`] variant:
//!
//! - **No-topic** ([`EventHandler`]): receives only the arguments. For
//!   handlers bound to one exact topic, the topic is implied.
//! - **With-topic** ([`TopicHandler`]): additionally receives the exact
//!   topic the message was published under — the way a wildcard hook learns
//!   which concrete topic fired.
//!
//! [`HandlerFn`] and [`TopicHandlerFn`] wrap plain closures so call sites
//! don't need to implement the traits by hand.
//!
//! ## Rules
//! - Handlers run sequentially on the dispatcher task; a slow handler
//!   stalls dispatch for its duration.
//! - Returning an error (or panicking) is isolated by the hook; it never
//!   stops dispatch of the remaining handlers.
//! - Handler identity is `Arc` identity: registering the same `Arc` twice
//!   is a duplicate, two separately-built closures never are.

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::payload::EventArgs;
use crate::topics::Topic;

/// Stable identity of a registered handler (its `Arc` data address).
pub type HandlerId = usize;

/// Async callable invoked without topic context.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Processes one published message.
    async fn on_event(&self, args: &EventArgs) -> Result<(), HandlerError>;

    /// Handler name for logs and stats.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Async callable invoked with the exact topic of the message.
#[async_trait]
pub trait TopicHandler: Send + Sync + 'static {
    /// Processes one published message together with its topic.
    async fn on_event(&self, topic: &Topic, args: &EventArgs) -> Result<(), HandlerError>;

    /// Handler name for logs and stats.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Function-backed no-topic handler.
///
/// Wraps a closure that creates a fresh future per invocation.
pub struct HandlerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> HandlerFn<F> {
    /// Creates a new function-backed handler.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the handler and returns it as a shared trait object.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> EventHandler for HandlerFn<F>
where
    F: Fn(EventArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn on_event(&self, args: &EventArgs) -> Result<(), HandlerError> {
        (self.f)(args.clone()).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Function-backed with-topic handler.
pub struct TopicHandlerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> TopicHandlerFn<F> {
    /// Creates a new function-backed handler.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the handler and returns it as a shared trait object.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> TopicHandler for TopicHandlerFn<F>
where
    F: Fn(Topic, EventArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn on_event(&self, topic: &Topic, args: &EventArgs) -> Result<(), HandlerError> {
        (self.f)(topic.clone(), args.clone()).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A registered handler, tagged by calling convention.
///
/// Classification happens here, at construction, not at dispatch time.
#[derive(Clone)]
pub enum Handler {
    /// Invoked with arguments only.
    NoTopic(Arc<dyn EventHandler>),
    /// Invoked with the message topic and arguments.
    WithTopic(Arc<dyn TopicHandler>),
}

impl Handler {
    /// Wraps a shared no-topic handler.
    pub fn no_topic(handler: Arc<dyn EventHandler>) -> Self {
        Handler::NoTopic(handler)
    }

    /// Wraps a shared with-topic handler.
    pub fn with_topic(handler: Arc<dyn TopicHandler>) -> Self {
        Handler::WithTopic(handler)
    }

    /// Builds a no-topic handler from a closure.
    pub fn from_fn<F, Fut>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(EventArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        Handler::NoTopic(HandlerFn::arc(name, f))
    }

    /// Builds a with-topic handler from a closure.
    pub fn from_topic_fn<F, Fut>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(Topic, EventArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        Handler::WithTopic(TopicHandlerFn::arc(name, f))
    }

    /// Whether this handler follows the with-topic convention.
    #[must_use]
    pub fn accepts_topic(&self) -> bool {
        matches!(self, Handler::WithTopic(_))
    }

    /// Stable identity for dedup, removal, and stats keys.
    #[must_use]
    pub fn id(&self) -> HandlerId {
        match self {
            Handler::NoTopic(h) => Arc::as_ptr(h) as *const () as usize,
            Handler::WithTopic(h) => Arc::as_ptr(h) as *const () as usize,
        }
    }

    /// Handler name for logs and stats.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Handler::NoTopic(h) => h.name(),
            Handler::WithTopic(h) => h.name(),
        }
    }

    /// Whether both refer to the same registered callable.
    ///
    /// Compares data addresses only; trait-object vtable identity is not
    /// reliable across codegen units.
    #[must_use]
    pub fn same(&self, other: &Handler) -> bool {
        match (self, other) {
            (Handler::NoTopic(_), Handler::NoTopic(_))
            | (Handler::WithTopic(_), Handler::WithTopic(_)) => self.id() == other.id(),
            _ => false,
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let convention = if self.accepts_topic() {
            "with_topic"
        } else {
            "no_topic"
        };
        write!(f, "Handler({}, {convention})", self.name())
    }
}
