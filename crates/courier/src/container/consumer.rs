//! Consumer threads attached to the request destination.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use super::processor::RequestProcessor;
use super::{CONTAINER_TARGET, ContainerError};
use crate::telemetry::ThreadRole;
use crate::transport::{Destination, Message, Session, TransportError};

const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Where a consumer sends the requests it receives.
#[derive(Clone)]
pub(super) enum Delivery {
    /// Dispatch on the consuming thread and reply on its session.
    Inline(Arc<RequestProcessor>),
    /// Queue for the worker pool. Blocks while the queue is full.
    Pooled(SyncSender<Message>),
}

/// Consumer threads sharing one shutdown flag.
pub(super) struct ConsumerSet {
    shutdown: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl ConsumerSet {
    pub(super) fn new() -> Self {
        Self {
            shutdown: Arc::new(AtomicBool::new(false)),
            threads: Vec::new(),
        }
    }

    /// Starts a consumer thread driving `session`.
    pub(super) fn spawn(
        &mut self,
        session: Box<dyn Session>,
        destination: Destination,
        poll_interval: Duration,
        delivery: Delivery,
    ) -> Result<(), ContainerError> {
        let index = self.threads.len();
        let name = ThreadRole::Consumer.thread_name(index);
        let consumer = Consumer {
            index,
            session,
            destination,
            poll_interval,
            delivery,
            shutdown: Arc::clone(&self.shutdown),
        };
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || consumer.run())
            .map_err(|source| ContainerError::Spawn { thread: name, source })?;
        self.threads.push(handle);
        Ok(())
    }

    /// Number of consumers whose thread has not exited.
    pub(super) fn active(&self) -> usize {
        self.threads
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Signals every consumer to stop and waits for them to exit.
    pub(super) fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!(target: CONTAINER_TARGET, "consumer thread panicked");
            }
        }
    }
}

impl Drop for ConsumerSet {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Consumer {
    index: usize,
    session: Box<dyn Session>,
    destination: Destination,
    poll_interval: Duration,
    delivery: Delivery,
    shutdown: Arc<AtomicBool>,
}

impl Consumer {
    fn run(mut self) {
        debug!(
            target: CONTAINER_TARGET,
            consumer = self.index,
            destination = %self.destination,
            "consumer attached"
        );
        let mut last_error: Option<TransportError> = None;
        while !self.shutdown.load(Ordering::SeqCst) {
            match self
                .session
                .receive(&self.destination, None, Some(self.poll_interval))
            {
                Ok(Some(message)) => {
                    last_error = None;
                    self.deliver(message);
                }
                Ok(None) => {}
                Err(error)
                    if error.is_connection_failure()
                        || matches!(error, TransportError::SessionClosed) =>
                {
                    debug!(
                        target: CONTAINER_TARGET,
                        consumer = self.index,
                        %error,
                        "consumer detached from a failed connection"
                    );
                    break;
                }
                Err(error) => {
                    if last_error.as_ref() != Some(&error) {
                        warn!(
                            target: CONTAINER_TARGET,
                            consumer = self.index,
                            %error,
                            "receive failed, retrying"
                        );
                    }
                    last_error = Some(error);
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }
        self.session.close();
    }

    fn deliver(&mut self, message: Message) {
        match &self.delivery {
            Delivery::Inline(processor) => processor.process(self.session.as_mut(), message),
            Delivery::Pooled(queue) => {
                if let Err(rejected) = queue.send(message) {
                    warn!(
                        target: CONTAINER_TARGET,
                        consumer = self.index,
                        message_id = %rejected.0.id,
                        "worker pool is gone, dropping request"
                    );
                }
            }
        }
    }
}
