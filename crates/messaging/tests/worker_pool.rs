//! Consumer pool behavior against the in-memory broker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::{OrderId, UserId};
use events::{Event, StockReserved};
use messaging::{
    BoxError, BrokerMessage, ConsumerConfig, ConsumerPool, EventPublisher, EventPublisherExt,
    FnHandler, HandlerError, InMemoryBroker, MessageHandler, Publisher, shutdown_channel, typed,
};
use parking_lot::Mutex;

const TOPIC: &str = "test.v1.work";

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..300 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

async fn publish_raw(broker: &InMemoryBroker, payloads: impl IntoIterator<Item = Vec<u8>>) {
    let publisher = Publisher::new(broker.producer(), Duration::from_secs(1)).unwrap();
    for (i, payload) in payloads.into_iter().enumerate() {
        publisher
            .publish(TOPIC, Some(&format!("key-{i}")), payload)
            .unwrap();
    }
    publisher.close().await.unwrap();
}

fn pool_config(group: &str, workers: usize, queue_capacity: usize) -> ConsumerConfig {
    ConsumerConfig {
        workers,
        queue_capacity,
        poll_timeout: Duration::from_millis(20),
        ..ConsumerConfig::default().with_group(group)
    }
}

struct Counting {
    handled: AtomicUsize,
    delay: Duration,
}

#[async_trait]
impl MessageHandler for Counting {
    async fn handle(&self, _message: &BrokerMessage) -> Result<(), HandlerError> {
        tokio::time::sleep(self.delay).await;
        self.handled.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_pool_handles_every_message() {
    let broker = InMemoryBroker::new();
    publish_raw(&broker, (0..20u8).map(|i| vec![i])).await;

    let handler = Arc::new(Counting {
        handled: AtomicUsize::new(0),
        delay: Duration::ZERO,
    });
    let (trigger, shutdown) = shutdown_channel();
    let pool = ConsumerPool::new(
        broker.consumer(&pool_config("all", 4, 128)),
        pool_config("all", 4, 128),
    );
    let run = tokio::spawn(pool.run(shutdown, vec![TOPIC.to_string()], handler.clone()));

    wait_until(|| handler.handled.load(Ordering::SeqCst) == 20).await;
    trigger.trigger();
    run.await.unwrap().unwrap();
}

struct Recording {
    seen: Mutex<Vec<Vec<u8>>>,
    delay: Duration,
}

#[async_trait]
impl MessageHandler for Recording {
    async fn handle(&self, message: &BrokerMessage) -> Result<(), HandlerError> {
        tokio::time::sleep(self.delay).await;
        self.seen.lock().push(message.payload.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_full_queue_drops_messages_and_keeps_consuming() {
    let broker = InMemoryBroker::new();
    publish_raw(&broker, (0..10u8).map(|i| vec![i])).await;

    let handler = Arc::new(Recording {
        seen: Mutex::new(Vec::new()),
        delay: Duration::from_millis(200),
    });
    let config = pool_config("slow", 1, 1);
    let (trigger, shutdown) = shutdown_channel();
    let pool = ConsumerPool::new(broker.consumer(&config), config);
    let run = tokio::spawn(pool.run(shutdown, vec![TOPIC.to_string()], handler.clone()));

    // One message in the worker, at most one waiting; the rest were dropped.
    tokio::time::sleep(Duration::from_millis(800)).await;
    let handled = handler.seen.lock().len();
    assert!(handled >= 1, "slow worker handled nothing");
    assert!(handled <= 2, "expected drops, handled {handled} of 10");

    // After shedding the burst the pool still takes new work.
    publish_raw(&broker, [b"after-burst".to_vec()]).await;
    wait_until(|| {
        handler
            .seen
            .lock()
            .iter()
            .any(|payload| payload.as_slice() == b"after-burst")
    })
    .await;
    assert_eq!(handler.seen.lock().len(), handled + 1);

    trigger.trigger();
    run.await.unwrap().unwrap();
}

struct Flaky {
    ok: AtomicUsize,
}

#[async_trait]
impl MessageHandler for Flaky {
    async fn handle(&self, message: &BrokerMessage) -> Result<(), HandlerError> {
        match message.payload.as_slice() {
            b"panic" => panic!("handler blew up"),
            b"fail" => Err(HandlerError::Failed("rejected".into())),
            b"slow" => {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            }
            _ => {
                self.ok.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }
}

#[tokio::test]
async fn test_handler_failures_do_not_stop_workers() {
    let broker = InMemoryBroker::new();
    let payloads = ["panic", "ok", "fail", "ok", "slow", "ok"];
    publish_raw(&broker, payloads.map(|p| p.as_bytes().to_vec())).await;

    let handler = Arc::new(Flaky {
        ok: AtomicUsize::new(0),
    });
    let config = ConsumerConfig {
        handle_timeout: Some(Duration::from_millis(50)),
        ..pool_config("flaky", 1, 16)
    };
    let (trigger, shutdown) = shutdown_channel();
    let pool = ConsumerPool::new(broker.consumer(&config), config);
    let run = tokio::spawn(pool.run(shutdown, vec![TOPIC.to_string()], handler.clone()));

    wait_until(|| handler.ok.load(Ordering::SeqCst) == 3).await;
    trigger.trigger();
    run.await.unwrap().unwrap();
}

struct Tracked {
    started: AtomicBool,
    finished: AtomicBool,
}

#[async_trait]
impl MessageHandler for Tracked {
    async fn handle(&self, _message: &BrokerMessage) -> Result<(), HandlerError> {
        self.started.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(200)).await;
        self.finished.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_shutdown_waits_for_in_flight_handler() {
    let broker = InMemoryBroker::new();
    publish_raw(&broker, [b"only".to_vec()]).await;

    let handler = Arc::new(Tracked {
        started: AtomicBool::new(false),
        finished: AtomicBool::new(false),
    });
    let config = pool_config("drain", 2, 8);
    let (trigger, shutdown) = shutdown_channel();
    let pool = ConsumerPool::new(broker.consumer(&config), config);
    let run = tokio::spawn(pool.run(shutdown, vec![TOPIC.to_string()], handler.clone()));

    wait_until(|| handler.started.load(Ordering::SeqCst)).await;
    trigger.trigger();
    run.await.unwrap().unwrap();

    assert!(handler.finished.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_typed_events_flow_from_publisher_to_pool() {
    let broker = InMemoryBroker::new();
    let publisher = Publisher::new(broker.producer(), Duration::from_secs(1)).unwrap();

    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let handler = typed::<StockReserved, _>(FnHandler(move |event: StockReserved| {
        let sink = Arc::clone(&sink);
        async move {
            sink.lock().push(event.order_id);
            Ok::<(), BoxError>(())
        }
    }));

    let config = pool_config("typed", 2, 16);
    let (trigger, shutdown) = shutdown_channel();
    let pool = ConsumerPool::new(broker.consumer(&config), config);
    let run = tokio::spawn(pool.run(
        shutdown,
        vec![StockReserved::TOPIC.to_string()],
        handler,
    ));

    for i in 0..3 {
        let event = StockReserved::new(&OrderId::new(format!("order-{i}")), &UserId::new("u"));
        publisher.publish_event(&event).unwrap();
    }
    // Not decodable: must be dropped without reaching the handler.
    publisher
        .publish(StockReserved::TOPIC, Some("bad"), vec![0xff, 0xff, 0xff])
        .unwrap();

    wait_until(|| seen.lock().len() == 3).await;
    trigger.trigger();
    run.await.unwrap().unwrap();
    publisher.close().await.unwrap();

    let mut ids = std::mem::take(&mut *seen.lock());
    ids.sort();
    assert_eq!(ids, vec!["order-0", "order-1", "order-2"]);
}
