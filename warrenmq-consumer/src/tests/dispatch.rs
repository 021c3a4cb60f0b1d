use super::mock::{Call, MockBroker};
use super::{eventually, settle, Recorder};
use crate::consumer::ConsumerHandle;
use crate::{dispatch, ConsumerDeclaration, ConsumerRegistry, Handler, QueueRef, QueueRegistry};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Bind consumers, the consumer tags are the same as the ids.
async fn bind(channel: &MockBroker, consumers: Vec<(&str, Handler<MockBroker>)>) -> Vec<ConsumerHandle<MockBroker>> {
    let queues = QueueRegistry::new();
    let mut registry = ConsumerRegistry::new();

    for (id, handler) in consumers {
        let declaration = ConsumerDeclaration::new(id, QueueRef::Literal(format!("{}_queue", id)));

        registry
            .register(channel, &queues, id, &declaration, handler)
            .await
            .unwrap();
    }

    registry.into_handles()
}

fn spawn_dispatch(channel: &MockBroker, consumers: Vec<ConsumerHandle<MockBroker>>) -> JoinHandle<()> {
    let channel = channel.clone();

    tokio::spawn(async move { dispatch::run(&channel, consumers).await })
}

async fn finished(task: JoinHandle<()>) {
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("Dispatch didn't finish in time")
        .unwrap();
}

#[tokio::test]
async fn deliveries_of_a_consumer_are_handled_in_order() {
    let channel = MockBroker::new();
    let first = Recorder::default();
    let second = Recorder::default();

    let consumers = bind(&channel, vec![("first", first.handler()), ("second", second.handler())]).await;

    for i in 1..=3 {
        channel.deliver("first", &format!("f{}", i));
        channel.deliver("second", &format!("s{}", i));
    }

    let dispatch = spawn_dispatch(&channel, consumers);

    eventually(|| first.received().len() == 3 && second.received().len() == 3).await;

    channel.cancel("first");
    channel.cancel("second");

    finished(dispatch).await;

    assert_eq!(first.received(), vec!["f1", "f2", "f3"]);
    assert_eq!(second.received(), vec!["s1", "s2", "s3"]);

    let acked: Vec<u64> = channel
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Ack {
                consumer_tag,
                delivery_tag,
            } if consumer_tag == "first" => Some(delivery_tag),
            _ => None,
        })
        .collect();

    assert_eq!(acked, vec![1, 2, 3]);
}

#[tokio::test]
async fn run_returns_when_all_streams_are_closed() {
    let channel = MockBroker::new();
    let recorder = Recorder::default();

    let consumers = bind(
        &channel,
        vec![
            ("a", recorder.handler()),
            ("b", recorder.handler()),
            ("c", recorder.handler()),
        ],
    )
    .await;

    let dispatch = spawn_dispatch(&channel, consumers);

    settle().await;
    assert!(!dispatch.is_finished());

    channel.cancel("a");
    channel.cancel("b");

    settle().await;
    assert!(!dispatch.is_finished());

    channel.deliver("c", "still alive");
    eventually(|| recorder.received() == vec!["still alive"]).await;

    channel.cancel("c");

    finished(dispatch).await;
}

#[tokio::test]
async fn run_without_consumers_returns_immediately() {
    let channel = MockBroker::new();

    finished(spawn_dispatch(&channel, vec![])).await;
}

#[tokio::test]
async fn panicking_handler_stops_only_its_consumer() {
    let channel = MockBroker::new();
    let bad = Recorder::default();
    let good = Recorder::default();

    let consumers = bind(
        &channel,
        vec![("bad", bad.panicking_handler("boom")), ("good", good.handler())],
    )
    .await;

    channel.deliver("bad", "ok1");
    channel.deliver("bad", "boom");
    channel.deliver("bad", "after");
    channel.deliver("good", "g1");
    channel.deliver("good", "g2");

    let dispatch = spawn_dispatch(&channel, consumers);

    eventually(|| good.received().len() == 2).await;
    settle().await;

    assert_eq!(bad.received(), vec!["ok1"]);
    assert!(!dispatch.is_finished());

    channel.deliver("good", "g3");
    eventually(|| good.received().len() == 3).await;

    channel.cancel("good");
    channel.cancel("bad");

    finished(dispatch).await;

    assert_eq!(good.received(), vec!["g1", "g2", "g3"]);
}

#[tokio::test]
async fn stream_error_ends_the_worker() {
    let channel = MockBroker::new();
    let recorder = Recorder::default();

    let consumers = bind(&channel, vec![("flaky", recorder.handler())]).await;

    channel.deliver("flaky", "m1");
    channel.fail_stream("flaky");
    channel.deliver("flaky", "m2");

    finished(spawn_dispatch(&channel, consumers)).await;

    assert_eq!(recorder.received(), vec!["m1"]);
}

#[tokio::test]
async fn closing_the_channel_ends_the_dispatch() {
    use crate::transport::Channel;

    let channel = MockBroker::new();
    let recorder = Recorder::default();

    let consumers = bind(&channel, vec![("a", recorder.handler()), ("b", recorder.handler())]).await;
    let dispatch = spawn_dispatch(&channel, consumers);

    settle().await;
    Channel::close(&channel).await.unwrap();

    finished(dispatch).await;
}
