//! # topicbus
//!
//! **Topicbus** is an in-process, topic-routed publish/subscribe event
//! engine.
//!
//! Callers publish messages tagged with a hierarchical topic; a background
//! dispatcher routes each message to every hook whose registered topic
//! matches. The crate is designed as a building block for event-driven
//! services that need structured routing without a broker.
//!
//! ## Features
//!
//! | Area          | Description                                                          | Key types / traits                      |
//! |---------------|----------------------------------------------------------------------|-----------------------------------------|
//! | **Topics**    | Dotted topics with wildcard, alternation, and regex parts.           | [`Topic`], [`TopicPart`], [`MatchResult`] |
//! | **Handlers**  | Async callables in two conventions, classified at registration.      | [`Handler`], [`EventHandler`], [`TopicHandler`] |
//! | **Hooks**     | Ordered handler lists per topic, fault-isolated, optional timing.    | [`Hook`], [`HookStats`]                 |
//! | **Dispatch**  | Bounded queue, payload pool, exact + generic routing indexes.        | [`Engine`], [`MsgQueue`], [`PayloadPool`] |
//! | **Timers**    | Wall-aligned periodic publications on well-known topics.             | [`EngineTimers`]                        |
//! | **Errors**    | Typed errors for parsing, queue pressure, and handler faults.        | [`EngineError`], [`ParseError`], [`HandlerError`] |
//!
//! ## Topic grammar
//!
//! ```text
//! topic      := part ( "." part )*
//! part       := exact | any | range | pattern
//! exact      := [^.{}()/|]+              MarketData
//! any        := "{" [^}]+ "}"            {symbol}
//! range      := "(" opt ("|" opt)+ ")"   (Equity|Futures)
//! pattern    := "/" regex "/"            /^[A-Z]{4}$/
//! ```
//!
//! Only exact topics may be published; generic topics are registered as
//! subscriptions and matched against each published topic, part by part.
//!
//! ```no_run
//! use topicbus::{Engine, EngineConfig, EventArgs, Handler, Topic};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::new(EngineConfig::default());
//!
//!     // Fires for every symbol under MarketData.Trade.
//!     let trades = Topic::parse("MarketData.Trade.{symbol}")?;
//!     engine.register_handler(
//!         trades,
//!         Handler::from_topic_fn("print-trade", |topic, _args| async move {
//!             println!("trade on {topic}");
//!             Ok(())
//!         }),
//!         true,
//!     );
//!
//!     engine.start()?;
//!     engine
//!         .publish(Topic::parse("MarketData.Trade.AAPL")?, EventArgs::new())
//!         .await?;
//!     engine.stop().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod engine;
mod error;
mod hash;
mod hooks;
mod keymap;
mod payload;
mod queue;
mod topics;

// ---- Public re-exports ----

pub use config::{EngineConfig, HookConfig};
pub use engine::{
    Engine, EngineTimers, TIMER_MINUTE_TOPIC, TIMER_SECOND_TOPIC, TIMER_TOPIC_PREFIX,
};
pub use error::{EngineError, HandlerError, ParseError};
pub use hooks::{
    EventHandler, Handler, HandlerFn, HandlerId, Hook, HookStats, TopicHandler, TopicHandlerFn,
};
pub use keymap::KeyMap;
pub use payload::{EventArgs, Payload, PayloadPool, Value};
pub use queue::{GetError, MsgQueue, PutError};
pub use topics::{intern, MatchNode, MatchResult, Topic, TopicPart};
