//! End-to-end RPC test world: an in-memory broker, a listener container and
//! the outcome of the calls made against it.

use std::cell::RefCell;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{Value, json};

use crate::client::RpcClient;
use crate::container::{ContainerSettings, ContainerState, ListenerContainer};
use crate::correlation::CorrelationTransport;
use crate::demo::{HELLO_SERVICE, STRING_TYPE, hello_registry};
use crate::dispatch::ServiceDispatcher;
use crate::error::RpcError;
use crate::registry::{MethodTable, ServiceRegistry};
use crate::transport::memory::MemoryBroker;

use super::WAIT_TIMEOUT;
use super::reporter::RecordingHealthReporter;

pub const REQUESTS: &str = "scenario.requests";

/// Result of one timed call.
#[derive(Debug)]
pub struct CallOutcome {
    pub result: Result<Value, RpcError>,
    pub elapsed: Duration,
}

/// Scenario world shared across RPC steps.
pub struct RpcWorld {
    pub broker: MemoryBroker,
    pub reporter: Arc<RecordingHealthReporter>,
    container: Option<ListenerContainer>,
    client_timeout: Option<Duration>,
    shared_replies: Option<String>,
    last_call: Option<CallOutcome>,
    concurrent: Vec<(String, Result<Value, RpcError>)>,
}

impl RpcWorld {
    #[must_use]
    pub fn new() -> Self {
        Self {
            broker: MemoryBroker::new(),
            reporter: Arc::new(RecordingHealthReporter::default()),
            container: None,
            client_timeout: Some(WAIT_TIMEOUT),
            shared_replies: None,
            last_call: None,
            concurrent: Vec::new(),
        }
    }

    /// Starts a container with `consumers` sessions serving `registry`.
    pub fn start_container(&mut self, consumers: usize, registry: ServiceRegistry) {
        let container = ListenerContainer::builder(
            Arc::new(self.broker.clone()),
            ServiceDispatcher::new(Arc::new(registry)),
        )
        .settings(
            ContainerSettings::new(REQUESTS)
                .with_concurrent_consumers(consumers)
                .with_poll_interval(Duration::from_millis(10)),
        )
        .reporter(self.reporter.clone())
        .build()
        .expect("valid container settings");
        container.start().expect("container should start");
        self.container = Some(container);
    }

    /// Starts a container serving the demo hello service.
    pub fn start_hello_container(&mut self, consumers: usize) {
        self.start_container(consumers, hello_registry().expect("hello registry"));
    }

    /// Starts a container whose `hello(string)` sleeps for `delay` first.
    pub fn start_slow_container(&mut self, consumers: usize, delay: Duration) {
        let slow = MethodTable::new().with_method("hello", &[STRING_TYPE], move |parameters| {
            thread::sleep(delay);
            let name = parameters.first().and_then(Value::as_str).unwrap_or_default();
            Ok(json!(format!("REQ+{name}")))
        });
        let registry = ServiceRegistry::new()
            .with_service(HELLO_SERVICE, "", Arc::new(slow))
            .expect("slow registry");
        self.start_container(consumers, registry);
    }

    pub fn set_client_timeout(&mut self, timeout: Duration) {
        self.client_timeout = Some(timeout);
    }

    pub fn use_shared_replies(&mut self, destination: &str) {
        self.shared_replies = Some(destination.to_owned());
    }

    #[must_use]
    pub fn client(&self) -> RpcClient {
        let transport = CorrelationTransport::new(Arc::new(self.broker.clone()), REQUESTS);
        let transport = match &self.shared_replies {
            Some(destination) => transport.with_shared_replies(destination.as_str()),
            None => transport,
        };
        RpcClient::new(transport).with_timeout(self.client_timeout)
    }

    /// Calls the hello service and records the outcome.
    pub fn call(&mut self, version: &str, method: &str, signature: &[&str], parameters: Vec<Value>) {
        let client = self.client();
        let started = Instant::now();
        let result = client.proxy(HELLO_SERVICE, version).invoke(method, signature, parameters);
        self.last_call = Some(CallOutcome {
            result,
            elapsed: started.elapsed(),
        });
    }

    /// Issues `count` concurrent `hello` calls with distinct payloads.
    pub fn call_concurrently(&mut self, count: usize) {
        let client = self.client();
        let client = &client;
        self.concurrent = thread::scope(|scope| {
            let callers: Vec<_> = (0..count)
                .map(|index| {
                    scope.spawn(move || {
                        let payload = format!("hello{index}");
                        let result = client.proxy(HELLO_SERVICE, "").invoke(
                            "hello",
                            &[STRING_TYPE],
                            vec![json!(payload.as_str())],
                        );
                        (payload, result)
                    })
                })
                .collect();
            callers
                .into_iter()
                .map(|caller| caller.join().expect("caller thread panicked"))
                .collect()
        });
    }

    #[must_use]
    pub fn last_call(&self) -> &CallOutcome {
        self.last_call.as_ref().expect("no call was made")
    }

    #[must_use]
    pub fn concurrent_results(&self) -> &[(String, Result<Value, RpcError>)] {
        &self.concurrent
    }

    #[must_use]
    pub fn container(&self) -> &ListenerContainer {
        self.container.as_ref().expect("no container was started")
    }

    /// Waits for the container to be running on connection `generation`.
    #[must_use]
    pub fn await_running(&self, generation: u64) -> bool {
        let container = self.container();
        super::wait_until(|| {
            container.state() == ContainerState::Running && container.generation() == generation
        })
    }
}

impl Default for RpcWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Default RPC world fixture.
#[must_use]
pub fn rpc_world() -> RefCell<RpcWorld> {
    RefCell::new(RpcWorld::new())
}
