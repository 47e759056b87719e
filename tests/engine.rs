//! End-to-end engine scenarios: routing, backpressure, ordering, timers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use topicbus::{
    Engine, EngineConfig, EngineError, EventArgs, Handler, HandlerError, Hook, Topic,
};

fn topic(s: &str) -> Arc<Topic> {
    Arc::new(Topic::parse(s).unwrap())
}

fn small_engine(capacity: usize) -> Engine {
    Engine::new(EngineConfig {
        capacity,
        pool_size: capacity,
        ..EngineConfig::default()
    })
}

/// Handler that forwards a tag through a channel on every invocation.
fn tagging_handler(tag: &'static str, tx: mpsc::UnboundedSender<&'static str>) -> Handler {
    Handler::from_fn(tag, move |_args| {
        let tx = tx.clone();
        async move {
            tx.send(tag).expect("test channel open");
            Ok(())
        }
    })
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<&'static str>) -> &'static str {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("handler fired in time")
        .expect("channel open")
}

async fn expect_silence(rx: &mut mpsc::UnboundedReceiver<&'static str>) {
    assert!(
        timeout(Duration::from_millis(150), rx.recv()).await.is_err(),
        "unexpected extra invocation"
    );
}

#[tokio::test]
async fn exact_delivery() {
    let engine = Engine::default();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let handler = {
        let seen = Arc::clone(&seen);
        Handler::from_fn("h", move |args| {
            let seen = Arc::clone(&seen);
            let tx = tx.clone();
            async move {
                seen.lock()
                    .unwrap()
                    .push(*args.positional_as::<i64>(0).expect("first positional"));
                tx.send("h").unwrap();
                Ok(())
            }
        })
    };
    engine.register_handler(topic("A.B"), handler, true);

    engine.start().unwrap();
    engine
        .publish(topic("A.B"), EventArgs::new().arg(1i64))
        .await
        .unwrap();

    assert_eq!(recv(&mut rx).await, "h");
    expect_silence(&mut rx).await;
    assert_eq!(*seen.lock().unwrap(), vec![1]);
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn wildcard_capture_sees_concrete_topic() {
    let engine = Engine::default();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let handler = Handler::from_topic_fn("capture", move |topic, args| {
        let tx = tx.clone();
        async move {
            let symbol = args.get_as::<String>("symbol").cloned().unwrap_or_default();
            tx.send(format!("{}:{symbol}", topic.literal())).unwrap();
            Ok(())
        }
    });
    engine.register_handler(topic("M.Data.{symbol}"), handler, true);

    engine.start().unwrap();
    engine
        .publish(
            topic("M.Data.AAPL"),
            EventArgs::new().named("symbol", String::from("AAPL")),
        )
        .await
        .unwrap();

    let seen = timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen, "M.Data.AAPL:AAPL");
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn range_topic_filters_publications() {
    let engine = Engine::default();
    let (tx, mut rx) = mpsc::unbounded_channel();

    engine.register_handler(
        topic("M.(Equity|Futures).Trade"),
        tagging_handler("range", tx),
        true,
    );

    engine.start().unwrap();
    for target in ["M.Equity.Trade", "M.Options.Trade", "M.Futures.Trade"] {
        engine.publish(topic(target), EventArgs::new()).await.unwrap();
    }

    assert_eq!(recv(&mut rx).await, "range");
    assert_eq!(recv(&mut rx).await, "range");
    expect_silence(&mut rx).await;
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn pattern_topic_filters_publications() {
    let engine = Engine::default();
    let (tx, mut rx) = mpsc::unbounded_channel();

    engine.register_handler(
        topic(r"M.Data./^[A-Z]{4}$/"),
        tagging_handler("pattern", tx),
        true,
    );

    engine.start().unwrap();
    engine
        .publish(topic("M.Data.AAPL"), EventArgs::new())
        .await
        .unwrap();
    engine
        .publish(topic("M.Data.A"), EventArgs::new())
        .await
        .unwrap();

    assert_eq!(recv(&mut rx).await, "pattern");
    expect_silence(&mut rx).await;
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn backpressure_surfaces_queue_full() {
    let engine = small_engine(8);

    // Engine stopped: messages queue up without being consumed.
    for i in 0..8u64 {
        let seq = engine
            .try_publish(topic("Backpressure.T"), EventArgs::new().arg(i))
            .unwrap();
        assert_eq!(seq, i + 1);
    }
    assert!(matches!(
        engine.try_publish(topic("Backpressure.T"), EventArgs::new()),
        Err(EngineError::QueueFull)
    ));
    assert_eq!(engine.queue_len(), 8);
}

#[tokio::test]
async fn generic_publication_is_refused() {
    let engine = Engine::default();
    assert!(matches!(
        engine.try_publish(topic("A.{b}"), EventArgs::new()),
        Err(EngineError::InvalidTopic { .. })
    ));
}

#[tokio::test]
async fn queued_messages_dispatch_after_start() {
    let engine = small_engine(16);
    let (tx, mut rx) = mpsc::unbounded_channel();
    engine.register_handler(topic("Deferred.T"), tagging_handler("late", tx), true);

    engine
        .try_publish(topic("Deferred.T"), EventArgs::new())
        .unwrap();
    engine
        .try_publish(topic("Deferred.T"), EventArgs::new())
        .unwrap();

    engine.start().unwrap();
    assert_eq!(recv(&mut rx).await, "late");
    assert_eq!(recv(&mut rx).await, "late");
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn single_producer_ordering_is_preserved() {
    let engine = small_engine(64);
    let (tx, mut rx) = mpsc::unbounded_channel::<u64>();

    let handler = Handler::from_fn("order", move |args| {
        let tx = tx.clone();
        async move {
            tx.send(*args.positional_as::<u64>(0).unwrap()).unwrap();
            Ok(())
        }
    });
    engine.register_handler(topic("Ordered.T"), handler, true);
    engine.start().unwrap();

    for i in 0..100u64 {
        engine
            .publish(topic("Ordered.T"), EventArgs::new().arg(i))
            .await
            .unwrap();
    }

    for expected in 0..100u64 {
        let got = timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, expected);
    }
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn exact_and_generic_hooks_fire_in_registration_order() {
    let engine = Engine::default();
    let (tx, mut rx) = mpsc::unbounded_channel();

    engine.register_handler(topic("X.Y"), tagging_handler("exact", tx.clone()), true);
    engine.register_handler(topic("X.{any}"), tagging_handler("generic-1", tx.clone()), true);
    engine.register_handler(topic("{root}.Y"), tagging_handler("generic-2", tx), true);

    engine.start().unwrap();
    engine.publish(topic("X.Y"), EventArgs::new()).await.unwrap();

    // Exact hook first, then the generic map in insertion order.
    assert_eq!(recv(&mut rx).await, "exact");
    assert_eq!(recv(&mut rx).await, "generic-1");
    assert_eq!(recv(&mut rx).await, "generic-2");
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn failing_handler_does_not_block_later_handlers() {
    let engine = Engine::default();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let hook = Hook::new(topic("Faulty.T"));
    hook.add_handler(
        Handler::from_fn("bad", |_args| async { Err(HandlerError::failed("nope")) }),
        false,
    );
    hook.add_handler(
        Handler::from_fn("panicky", |_args| async { panic!("boom") }),
        false,
    );
    hook.add_handler(tagging_handler("good", tx), false);
    engine.register_hook(Arc::new(hook)).unwrap();

    engine.start().unwrap();
    for _ in 0..3 {
        engine.publish(topic("Faulty.T"), EventArgs::new()).await.unwrap();
    }
    for _ in 0..3 {
        assert_eq!(recv(&mut rx).await, "good");
    }
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn payloads_return_to_the_pool() {
    let engine = small_engine(4);
    let (tx, mut rx) = mpsc::unbounded_channel();
    engine.register_handler(topic("Leak.T"), tagging_handler("tick", tx), true);

    engine.start().unwrap();
    for _ in 0..20 {
        engine.publish(topic("Leak.T"), EventArgs::new()).await.unwrap();
    }
    for _ in 0..20 {
        assert_eq!(recv(&mut rx).await, "tick");
    }
    engine.stop().await.unwrap();

    // Every slot is back after the dispatcher drained the queue.
    assert_eq!(engine.queue_len(), 0);
    assert_eq!(engine.pool().available(), 4);
}

#[tokio::test]
async fn hook_registry_lifecycle() {
    let engine = Engine::default();
    let t = topic("Reg.T");

    let hook = Arc::new(Hook::new(Arc::clone(&t)));
    hook.add_handler(Handler::from_fn("h", |_args| async { Ok(()) }), true);
    engine.register_hook(Arc::clone(&hook)).unwrap();
    assert_eq!(engine.hook_count(), 1);

    // Second hook on the same key is refused.
    assert!(matches!(
        engine.register_hook(Arc::new(Hook::new(Arc::clone(&t)))),
        Err(EngineError::AlreadyRegistered { .. })
    ));

    // Unregistering returns the very same hook.
    let removed = engine.unregister_hook(&t).unwrap();
    assert!(Arc::ptr_eq(&removed, &hook));
    assert!(matches!(
        engine.unregister_hook(&t),
        Err(EngineError::NotFound { .. })
    ));
}

#[tokio::test]
async fn unregister_handler_drops_empty_hooks() {
    let engine = Engine::default();
    let t = topic("Reg.Handlers");
    let handler = Handler::from_fn("only", |_args| async { Ok(()) });

    engine.register_handler(Arc::clone(&t), handler.clone(), true);
    assert_eq!(engine.hook_count(), 1);

    engine.unregister_handler(&t, &handler).unwrap();
    assert_eq!(engine.hook_count(), 0);

    assert!(matches!(
        engine.unregister_handler(&t, &handler),
        Err(EngineError::NotFound { .. })
    ));
}

#[tokio::test]
async fn clear_requires_stopped_engine() {
    let engine = Engine::default();
    engine.register_handler(
        topic("Clear.T"),
        Handler::from_fn("h", |_args| async { Ok(()) }),
        true,
    );

    engine.start().unwrap();
    assert!(matches!(engine.clear(), Err(EngineError::Active)));
    engine.stop().await.unwrap();

    engine.clear().unwrap();
    assert_eq!(engine.hook_count(), 0);
    assert!(engine.topics().is_empty());
}

#[tokio::test]
async fn iteration_order_is_exact_then_generic() {
    let engine = Engine::default();
    let h = |name: &'static str| Handler::from_fn(name, |_args| async { Ok(()) });

    engine.register_handler(topic("B.Exact"), h("1"), true);
    engine.register_handler(topic("A.{gen}"), h("2"), true);
    engine.register_handler(topic("A.Exact"), h("3"), true);
    engine.register_handler(topic("{gen}.B"), h("4"), true);

    let literals: Vec<String> = engine
        .topics()
        .iter()
        .map(|t| t.literal().to_owned())
        .collect();
    assert_eq!(literals, vec!["B.Exact", "A.Exact", "A.{gen}", "{gen}.B"]);
    assert_eq!(engine.items().len(), 4);
}

#[tokio::test]
async fn interval_timer_publishes_ticks() {
    let engine = Engine::default();
    engine.start().unwrap();

    let timer_topic = engine.get_timer(Duration::from_millis(100), None);
    assert_eq!(timer_topic.literal(), "EventEngine.Internal.Timer.0.1");

    // Repeated calls hand back the running timer's topic.
    let again = engine.get_timer(
        Duration::from_millis(100),
        Some(std::time::SystemTime::now()),
    );
    assert!(Arc::ptr_eq(&timer_topic, &again));
    assert_eq!(engine.timers().len(), 1);

    let (tx, mut rx) = mpsc::unbounded_channel::<f64>();
    let handler = Handler::from_fn("tick", move |args| {
        let tx = tx.clone();
        async move {
            let interval = *args.get_as::<f64>("interval").expect("interval kwarg");
            assert!(args.get_as::<f64>("trigger_time").is_some());
            tx.send(interval).unwrap();
            Ok(())
        }
    });
    engine.register_handler(Arc::clone(&timer_topic), handler, true);

    let mut ticks = 0;
    while ticks < 3 {
        let interval = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timer tick in time")
            .unwrap();
        assert!((interval - 0.1).abs() < 1e-9);
        ticks += 1;
    }

    engine.stop().await.unwrap();
    assert!(engine.timers().is_empty());
}

#[tokio::test]
async fn second_timer_is_wall_aligned() {
    let engine = Engine::default();
    engine.start().unwrap();

    let timer_topic = engine.get_timer(Duration::from_secs(1), None);
    assert_eq!(timer_topic.literal(), "EventEngine.Internal.Timer.Second");

    let (tx, mut rx) = mpsc::unbounded_channel::<f64>();
    let handler = Handler::from_fn("second", move |args| {
        let tx = tx.clone();
        async move {
            tx.send(*args.get_as::<f64>("timestamp").expect("timestamp kwarg"))
                .unwrap();
            Ok(())
        }
    });
    engine.register_handler(Arc::clone(&timer_topic), handler, true);

    let mut stamps = Vec::new();
    while stamps.len() < 2 {
        let ts = timeout(Duration::from_secs(3), rx.recv())
            .await
            .expect("second tick in time")
            .unwrap();
        stamps.push(ts);
    }

    for ts in &stamps {
        assert_eq!(ts.fract(), 0.0, "timestamp {ts} not second-aligned");
    }
    // Consecutive boundaries; a slow runner may skip at most one.
    let gap = (stamps[1] - stamps[0]) as i64;
    assert!((1..=2).contains(&gap), "unexpected tick gap {gap}");

    engine.stop().await.unwrap();
}

#[tokio::test]
async fn pull_consumers_can_bypass_dispatch() {
    let engine = small_engine(8);

    assert!(matches!(engine.try_get(), Err(EngineError::QueueEmpty)));

    engine
        .try_publish(topic("Pull.T"), EventArgs::new().arg(41u8))
        .unwrap();
    let payload = engine.try_get().unwrap();
    assert_eq!(payload.topic().literal(), "Pull.T");
    assert_eq!(payload.args().positional_as::<u8>(0), Some(&41));
    engine.recycle(payload);
    assert_eq!(engine.pool().available(), 8);
}

#[tokio::test]
async fn engine_display_reflects_state() {
    let engine = Engine::default();
    assert!(engine.to_string().contains("idle"));
    engine.start().unwrap();
    assert!(engine.to_string().contains("active"));
    assert!(engine.is_active());
    engine.stop().await.unwrap();
    assert!(!engine.is_active());
}

#[tokio::test]
async fn wrong_state_lifecycle_transitions_are_refused() {
    let engine = Engine::default();

    // Stopping an idle engine requires an active one.
    assert!(matches!(engine.stop().await, Err(EngineError::Inactive)));

    engine.start().unwrap();
    assert!(matches!(engine.start(), Err(EngineError::Active)));
    assert!(engine.is_active());

    engine.stop().await.unwrap();
    assert!(matches!(engine.stop().await, Err(EngineError::Inactive)));

    // The engine restarts cleanly after a refused transition.
    engine.start().unwrap();
    engine.stop().await.unwrap();
}
