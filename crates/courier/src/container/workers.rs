//! Fixed worker pool fed by a bounded request queue.

use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use super::processor::RequestProcessor;
use super::{CONTAINER_TARGET, ContainerError};
use crate::telemetry::ThreadRole;
use crate::transport::{Connection, Message, Session};

/// Worker threads dispatching queued requests.
///
/// Each worker owns the session it replies on, so no session is ever driven
/// by two threads.
pub(super) struct WorkerPool {
    queue: Option<SyncSender<Message>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub(super) fn spawn(
        connection: &dyn Connection,
        processor: &Arc<RequestProcessor>,
        threads: usize,
        queue_capacity: usize,
    ) -> Result<(Self, SyncSender<Message>), ContainerError> {
        // Declared before the channel so an early return drops the sender
        // first and the workers being joined see the queue close.
        let mut pool = Self {
            queue: None,
            workers: Vec::with_capacity(threads),
        };
        let (queue, receiver) = mpsc::sync_channel(queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        for index in 0..threads {
            let session = connection
                .create_session()
                .map_err(|source| ContainerError::Session {
                    role: ThreadRole::Worker.as_str(),
                    index,
                    source,
                })?;
            let name = ThreadRole::Worker.thread_name(index);
            let receiver = Arc::clone(&receiver);
            let processor = Arc::clone(processor);
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || work(session, &receiver, &processor))
                .map_err(|source| ContainerError::Spawn { thread: name, source })?;
            pool.workers.push(handle);
        }
        debug!(
            target: CONTAINER_TARGET,
            workers = threads,
            queue_capacity,
            "worker pool started"
        );
        pool.queue = Some(queue.clone());
        Ok((pool, queue))
    }

    /// Closes the queue and waits for the workers to drain it.
    ///
    /// Consumers holding a sender must have exited first.
    pub(super) fn shutdown(&mut self) {
        self.queue.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!(target: CONTAINER_TARGET, "worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn work(
    mut session: Box<dyn Session>,
    queue: &Mutex<Receiver<Message>>,
    processor: &RequestProcessor,
) {
    loop {
        let next = queue.lock().unwrap_or_else(PoisonError::into_inner).recv();
        match next {
            Ok(message) => processor.process(session.as_mut(), message),
            Err(_) => break,
        }
    }
    session.close();
}
