//! Tests for the listener container state machine and recovery.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use courier_config::ConfigError;
use courier_types::{CallEnvelope, RemoteErrorKind};
use rstest::{fixture, rstest};
use serde_json::{Value, json};

use super::*;
use crate::client::RpcClient;
use crate::codec::{Codec, JsonCodec};
use crate::correlation::CorrelationTransport;
use crate::demo::{HELLO_SERVICE, STRING_TYPE, hello_registry};
use crate::registry::MethodTable;
use crate::tests::support::{HealthEvent, RecordingHealthReporter, wait_until};
use crate::transport::memory::MemoryBroker;
use crate::transport::{CorrelationId, OutboundMessage};

const REQUESTS: &str = "container.requests";
const CALL_TIMEOUT: Option<Duration> = Some(Duration::from_secs(5));

struct Harness {
    broker: MemoryBroker,
    reporter: Arc<RecordingHealthReporter>,
}

impl Harness {
    fn container(&self, settings: ContainerSettings) -> ListenerContainer {
        self.container_for(hello_registry().expect("registry"), settings)
    }

    fn container_for(
        &self,
        registry: ServiceRegistry,
        settings: ContainerSettings,
    ) -> ListenerContainer {
        ListenerContainer::builder(
            Arc::new(self.broker.clone()),
            ServiceDispatcher::new(Arc::new(registry)),
        )
        .settings(settings.with_poll_interval(Duration::from_millis(10)))
        .reporter(self.reporter.clone())
        .build()
        .expect("valid settings")
    }

    fn client(&self) -> RpcClient {
        RpcClient::new(CorrelationTransport::new(
            Arc::new(self.broker.clone()),
            REQUESTS,
        ))
        .with_timeout(CALL_TIMEOUT)
    }

    fn say_hello(&self, name: &str) -> Value {
        self.client()
            .proxy(HELLO_SERVICE, "")
            .invoke("hello", &[STRING_TYPE], vec![json!(name)])
            .expect("hello call")
    }
}

#[fixture]
fn harness() -> Harness {
    Harness {
        broker: MemoryBroker::new(),
        reporter: Arc::new(RecordingHealthReporter::default()),
    }
}

fn settings(consumers: usize) -> ContainerSettings {
    ContainerSettings::new(REQUESTS).with_concurrent_consumers(consumers)
}

#[rstest]
fn start_attaches_every_consumer(harness: Harness) {
    let container = harness.container(settings(3));
    assert_eq!(container.state(), ContainerState::Uninitialized);

    container.start().expect("start");

    assert_eq!(container.state(), ContainerState::Running);
    assert_eq!(container.active_consumers(), 3);
    assert_eq!(container.generation(), 1);
    assert_eq!(harness.broker.connection_count(), 1);
    assert!(harness.reporter.recorded(|event| *event
        == HealthEvent::ContainerRunning {
            consumers: 3,
            generation: 1,
        }));
}

#[rstest]
fn starting_twice_is_harmless(harness: Harness) {
    let container = harness.container(settings(2));
    container.start().expect("first start");
    container.start().expect("second start");
    assert_eq!(container.active_consumers(), 2);
    assert_eq!(container.generation(), 1);
}

#[rstest]
#[case::inline(0)]
#[case::pooled(2)]
fn serves_calls(harness: Harness, #[case] workers: usize) {
    let container = harness.container(settings(2).with_workers(workers, 4));
    container.start().expect("start");

    assert_eq!(harness.say_hello("World"), json!("REQ+World"));
}

#[rstest]
fn zero_consumers_are_rejected(harness: Harness) {
    let result = ListenerContainer::builder(
        Arc::new(harness.broker.clone()),
        ServiceDispatcher::new(Arc::new(ServiceRegistry::new())),
    )
    .settings(settings(0))
    .build();

    assert!(matches!(
        result,
        Err(ContainerError::InvalidSettings {
            source: ConfigError::NoConsumers
        })
    ));
}

#[rstest]
fn failed_start_leaves_nothing_attached(harness: Harness) {
    harness.broker.set_available(false);
    let container = harness.container(settings(2));

    let error = container.start().expect_err("provider is down");

    assert!(matches!(error, ContainerError::Connection { .. }));
    assert_eq!(container.state(), ContainerState::Uninitialized);
    assert_eq!(container.active_consumers(), 0);
    assert!(harness
        .reporter
        .recorded(|event| matches!(event, HealthEvent::ContainerStartFailed(_))));
}

#[rstest]
fn stop_releases_the_connection_and_can_restart(harness: Harness) {
    let container = harness.container(settings(2));
    container.start().expect("start");

    container.stop();
    assert_eq!(container.state(), ContainerState::Stopped);
    assert_eq!(container.active_consumers(), 0);
    assert_eq!(harness.broker.connection_count(), 0);
    assert!(harness.reporter.recorded(|event| *event == HealthEvent::ContainerStopped));

    container.start().expect("restart");
    assert_eq!(container.state(), ContainerState::Running);
    assert_eq!(harness.say_hello("again"), json!("REQ+again"));
}

#[rstest]
fn recovery_restores_the_same_consumer_count(harness: Harness) {
    let container = harness.container(settings(3));
    container.start().expect("start");

    assert_eq!(harness.broker.fail_connections("simulated outage"), 1);
    assert!(
        wait_until(|| container.generation() == 2
            && container.state() == ContainerState::Running),
        "container did not recover: {container:?}"
    );

    assert_eq!(container.active_consumers(), 3);
    assert_eq!(harness.say_hello("after"), json!("REQ+after"));
    let events = harness.reporter.events();
    assert!(events.contains(&HealthEvent::TransportFailed { generation: 1 }));
    assert!(events.contains(&HealthEvent::RecoverySucceeded {
        consumers: 3,
        generation: 2,
    }));
}

#[rstest]
fn pooled_containers_recover_too(harness: Harness) {
    let container = harness.container(settings(2).with_workers(3, 8));
    container.start().expect("start");

    harness.broker.fail_connections("simulated outage");
    assert!(wait_until(|| container.generation() == 2
        && container.state() == ContainerState::Running));

    assert_eq!(harness.say_hello("pooled"), json!("REQ+pooled"));
}

#[rstest]
fn stale_failure_notifications_are_ignored(harness: Harness) {
    let container = harness.container(settings(1));
    container.start().expect("start");

    container
        .inner
        .connection_failed(&TransportError::connection_lost("old news"), 0);

    assert_eq!(container.state(), ContainerState::Running);
    assert_eq!(container.generation(), 1);
    assert!(!harness
        .reporter
        .recorded(|event| matches!(event, HealthEvent::TransportFailed { .. })));
}

#[rstest]
fn failed_recovery_waits_for_an_explicit_retry(harness: Harness) {
    let container = harness.container(settings(2));
    container.start().expect("start");

    harness.broker.set_available(false);
    harness.broker.fail_connections("simulated outage");
    assert!(wait_until(|| harness
        .reporter
        .recorded(|event| matches!(event, HealthEvent::RecoveryFailed(_)))));
    assert_eq!(container.state(), ContainerState::Recovering);
    assert_eq!(container.active_consumers(), 0);

    harness.broker.set_available(true);
    container.recover().expect("manual recovery");
    assert_eq!(container.state(), ContainerState::Running);
    assert_eq!(container.active_consumers(), 2);
    assert_eq!(harness.say_hello("retry"), json!("REQ+retry"));
}

#[rstest]
fn recover_requires_a_started_container(harness: Harness) {
    let container = harness.container(settings(1));
    let error = container.recover().expect_err("not started");
    assert!(matches!(
        error,
        ContainerError::InvalidState {
            operation: "recover",
            state: ContainerState::Uninitialized,
        }
    ));
}

#[rstest]
fn malformed_requests_get_an_error_reply(harness: Harness) {
    let container = harness.container(settings(1));
    container.start().expect("start");

    let connection = harness.broker.create_connection().expect("connection");
    connection.start().expect("start connection");
    let mut session = connection.create_session().expect("session");
    let reply_to = session.create_temporary_destination().expect("reply destination");
    let id = session
        .send(
            &Destination::queue(REQUESTS),
            OutboundMessage::new(b"[1, 2, 3]".to_vec()).with_reply_to(reply_to.clone()),
        )
        .expect("send");

    let reply = session
        .receive(&reply_to, Some(&CorrelationId::from(&id)), CALL_TIMEOUT)
        .expect("receive")
        .expect("reply before timeout");
    let envelope = JsonCodec.decode_result(&reply.body).expect("result envelope");
    assert_eq!(envelope.request_id, "");
    let error = envelope.error().expect("error reply");
    assert_eq!(error.kind, RemoteErrorKind::MalformedRequest);
    assert!(error.message.contains("array"), "{}", error.message);
}

#[rstest]
fn requests_without_a_reply_destination_are_still_dispatched(harness: Harness) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let registry = ServiceRegistry::new()
        .with_service(
            "test.Counter",
            "",
            Arc::new(MethodTable::new().with_method("bump", &[], move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            })),
        )
        .expect("registry");
    let container = harness.container_for(registry, settings(1));
    container.start().expect("start");

    let connection = harness.broker.create_connection().expect("connection");
    let mut session = connection.create_session().expect("session");
    let body = JsonCodec
        .encode_call(&CallEnvelope::new("r-1", "test.Counter", "bump"))
        .expect("encode");
    session
        .send(&Destination::queue(REQUESTS), OutboundMessage::new(body))
        .expect("send");

    assert!(wait_until(|| calls.load(Ordering::SeqCst) == 1));
    assert_eq!(harness.broker.queue_depth(REQUESTS), 0);
}

#[rstest]
fn late_replies_to_timed_out_calls_do_not_pile_up(harness: Harness) {
    const CALLS: usize = 3;
    let shared = "container.replies";
    let finished = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&finished);
    let registry = ServiceRegistry::new()
        .with_service(
            "test.Slow",
            "",
            Arc::new(MethodTable::new().with_method("nap", &[], move |_| {
                thread::sleep(Duration::from_millis(150));
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            })),
        )
        .expect("registry");
    let container = harness.container_for(registry, settings(CALLS));
    container.start().expect("start");

    let client = RpcClient::new(
        CorrelationTransport::new(Arc::new(harness.broker.clone()), REQUESTS)
            .with_shared_replies(shared),
    )
    .with_timeout(Some(Duration::from_millis(30)));
    for _ in 0..CALLS {
        let error = client
            .proxy("test.Slow", "")
            .invoke("nap", &[], Vec::new())
            .expect_err("handler outlives the call");
        assert!(error.is_timeout(), "unexpected error {error:?}");
    }

    assert!(wait_until(|| finished.load(Ordering::SeqCst) == CALLS));
    thread::sleep(Duration::from_millis(100));
    assert_eq!(harness.broker.queue_depth(shared), 0);
    assert_eq!(harness.broker.queue_depth(REQUESTS), 0);
}
