//! Tests for request/reply correlation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rstest::{fixture, rstest};

use super::CorrelationTransport;
use crate::error::RpcError;
use crate::transport::memory::MemoryBroker;
use crate::transport::{
    Connection, ConnectionFactory, Destination, Message, OutboundMessage, Session,
};

const REQUESTS: &str = "test.requests";
const POLL: Duration = Duration::from_millis(20);
const PATIENCE: Duration = Duration::from_secs(5);

/// Answers every request with `echo:` followed by the request body.
struct EchoResponder {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl EchoResponder {
    fn spawn(broker: &MemoryBroker) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let broker = broker.clone();
        let handle = thread::spawn(move || {
            let mut link = open_link(&broker);
            while !flag.load(Ordering::SeqCst) {
                match link.1.receive(&Destination::queue(REQUESTS), None, Some(POLL)) {
                    Ok(Some(request)) => reply(link.1.as_mut(), &request, echo(&request.body)),
                    Ok(None) => {}
                    Err(_) => {
                        thread::sleep(POLL);
                        link = open_link(&broker);
                    }
                }
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }
}

impl Drop for EchoResponder {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn open_link(broker: &MemoryBroker) -> (Arc<dyn Connection>, Box<dyn Session>) {
    let connection = broker.create_connection().expect("responder connection");
    connection.start().expect("start responder connection");
    let session = connection.create_session().expect("responder session");
    (connection, session)
}

fn echo(body: &[u8]) -> Vec<u8> {
    [b"echo:".as_slice(), body].concat()
}

fn reply(session: &mut dyn Session, request: &Message, body: Vec<u8>) {
    let reply_to = request.reply_to.clone().expect("request names a reply destination");
    session
        .send(
            &reply_to,
            OutboundMessage::new(body).with_correlation_id(request.reply_correlation()),
        )
        .expect("send reply");
}

#[fixture]
fn broker() -> MemoryBroker {
    MemoryBroker::new()
}

fn transport(broker: &MemoryBroker) -> CorrelationTransport {
    CorrelationTransport::new(Arc::new(broker.clone()), REQUESTS)
}

#[rstest]
fn temporary_replies_round_trip_and_clean_up(broker: MemoryBroker) {
    let _responder = EchoResponder::spawn(&broker);
    let transport = transport(&broker);

    let reply = transport
        .send_and_await(b"ping".to_vec(), Some(PATIENCE))
        .expect("reply");
    assert_eq!(reply, b"echo:ping");
    assert_eq!(broker.temporary_destination_count(), 0);
}

#[rstest]
fn timeouts_fail_promptly_and_clean_up(broker: MemoryBroker) {
    let transport = transport(&broker);
    let deadline = Duration::from_millis(100);

    let started = Instant::now();
    let error = transport
        .send_and_await(b"nobody home".to_vec(), Some(deadline))
        .expect_err("no responder");
    let elapsed = started.elapsed();

    assert!(error.is_timeout(), "unexpected error {error:?}");
    assert!(elapsed >= deadline);
    assert!(elapsed < Duration::from_millis(200), "took {elapsed:?}");
    assert_eq!(broker.temporary_destination_count(), 0);
    assert_eq!(
        broker.queue_depth(REQUESTS),
        0,
        "an unanswered request expires with its call"
    );
}

#[rstest]
fn shared_replies_match_only_their_own_call(broker: MemoryBroker) {
    const CALLS: usize = 8;
    let shared = "test.replies";

    // Collect every request before answering, then answer newest first so
    // replies arrive in the opposite order to the requests.
    let responder_broker = broker.clone();
    let responder = thread::spawn(move || {
        let (_connection, mut session) = open_link(&responder_broker);
        let mut pending = Vec::new();
        while pending.len() < CALLS {
            if let Some(request) = session
                .receive(&Destination::queue(REQUESTS), None, Some(PATIENCE))
                .expect("receive request")
            {
                pending.push(request);
            }
        }
        while let Some(request) = pending.pop() {
            let body = echo(&request.body);
            reply(session.as_mut(), &request, body);
        }
    });

    let transport = Arc::new(transport(&broker).with_shared_replies(shared));
    let callers: Vec<_> = (0..CALLS)
        .map(|index| {
            let transport = Arc::clone(&transport);
            thread::spawn(move || {
                let body = format!("call-{index}").into_bytes();
                let reply = transport
                    .send_and_await(body.clone(), Some(PATIENCE))
                    .expect("reply");
                (body, reply)
            })
        })
        .collect();

    for caller in callers {
        let (body, reply) = caller.join().expect("caller thread");
        assert_eq!(reply, echo(&body));
    }
    responder.join().expect("responder thread");
    assert_eq!(broker.queue_depth(shared), 0);
}

#[rstest]
fn stray_replies_are_left_for_their_owner(broker: MemoryBroker) {
    let shared = "test.replies";
    let (_connection, mut session) = open_link(&broker);
    session
        .send(
            &Destination::queue(shared),
            OutboundMessage::new(b"not yours".to_vec())
                .with_correlation_id(crate::transport::CorrelationId::new("someone-else")),
        )
        .expect("send stray reply");

    let transport = transport(&broker).with_shared_replies(shared);
    let error = transport
        .send_and_await(b"ping".to_vec(), Some(Duration::from_millis(50)))
        .expect_err("stray reply must not satisfy the call");
    assert!(matches!(error, RpcError::Timeout { .. }));
    assert_eq!(broker.queue_depth(shared), 1);
}

#[rstest]
fn reconnects_after_the_provider_fails(broker: MemoryBroker) {
    let _responder = EchoResponder::spawn(&broker);
    let transport = transport(&broker);
    transport
        .send_and_await(b"before".to_vec(), Some(PATIENCE))
        .expect("reply before failure");

    broker.fail_connections("simulated outage");
    let deadline = Instant::now() + PATIENCE;
    let reply = loop {
        match transport.send_and_await(b"after".to_vec(), Some(PATIENCE)) {
            Ok(reply) => break reply,
            Err(RpcError::Transport(error)) if Instant::now() < deadline => {
                assert!(error.is_connection_failure(), "unexpected error {error:?}");
                thread::sleep(POLL);
            }
            Err(error) => panic!("call failed after outage: {error:?}"),
        }
    };
    assert_eq!(reply, b"echo:after");
}
