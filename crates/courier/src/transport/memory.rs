//! In-process broker implementing the transport contract.
//!
//! Named queues spring into existence on first send. Temporary queues belong
//! to the connection that created them and vanish when it closes. Delivery
//! picks the highest-priority message first and is FIFO within a priority.
//! Messages sent with a time-to-live are discarded unread once it lapses.
//! [`MemoryBroker::fail_connections`] simulates a provider outage by breaking
//! every open connection and notifying its failure listener from a broker
//! thread, the way a network client library would.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::{
    Connection, ConnectionFactory, CorrelationId, Destination, FailureListener, Message,
    MessageId, OutboundMessage, Session, TRANSPORT_TARGET, TransportError,
};

/// Shared handle to an in-process broker. Clones refer to the same broker.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    shared: Arc<BrokerShared>,
}

#[derive(Default)]
struct BrokerShared {
    state: Mutex<BrokerState>,
    arrivals: Condvar,
}

#[derive(Default)]
struct BrokerState {
    queues: HashMap<String, VecDeque<Message>>,
    temporaries: HashMap<String, u64>,
    connections: HashMap<u64, ConnectionRecord>,
    unavailable: Option<String>,
    next_message: u64,
    next_temporary: u64,
    next_connection: u64,
}

struct ConnectionRecord {
    status: ConnectionStatus,
    listener: Option<Arc<dyn FailureListener>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ConnectionStatus {
    Stopped,
    Started,
    Broken(String),
}

impl BrokerShared {
    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wake_all(&self) {
        self.arrivals.notify_all();
    }
}

impl BrokerState {
    fn record(&self, connection: u64) -> Result<&ConnectionRecord, TransportError> {
        let record = self
            .connections
            .get(&connection)
            .ok_or(TransportError::ConnectionClosed)?;
        if let ConnectionStatus::Broken(reason) = &record.status {
            return Err(TransportError::connection_lost(reason.clone()));
        }
        Ok(record)
    }

    fn is_started(&self, connection: u64) -> Result<bool, TransportError> {
        self.record(connection)
            .map(|record| record.status == ConnectionStatus::Started)
    }

    fn take(&mut self, name: &str, filter: Option<&CorrelationId>) -> Option<Message> {
        self.discard_expired(name);
        let queue = self.queues.get_mut(name)?;
        let mut best: Option<(usize, u8)> = None;
        for (index, message) in queue.iter().enumerate() {
            if filter.is_some_and(|wanted| message.correlation_id.as_ref() != Some(wanted)) {
                continue;
            }
            if best.is_none_or(|(_, priority)| message.priority > priority) {
                best = Some((index, message.priority));
            }
        }
        let (index, _) = best?;
        queue.remove(index)
    }

    fn discard_expired(&mut self, name: &str) {
        let Some(queue) = self.queues.get_mut(name) else {
            return;
        };
        let now = Instant::now();
        let before = queue.len();
        queue.retain(|message| !message.is_expired(now));
        let expired = before - queue.len();
        if expired > 0 {
            debug!(
                target: TRANSPORT_TARGET,
                destination = name,
                expired,
                "discarded expired messages"
            );
        }
    }

    fn drop_temporaries_of(&mut self, connection: u64) {
        let owned: Vec<String> = self
            .temporaries
            .iter()
            .filter(|(_, owner)| **owner == connection)
            .map(|(name, _)| name.clone())
            .collect();
        for name in owned {
            self.temporaries.remove(&name);
            self.queues.remove(&name);
        }
    }
}

impl MemoryBroker {
    /// Creates an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Breaks every open connection and notifies their failure listeners.
    ///
    /// Returns the number of connections that were broken.
    pub fn fail_connections(&self, reason: impl Into<String>) -> usize {
        let reason = reason.into();
        let mut listeners = Vec::new();
        let mut broken = 0_usize;
        {
            let mut state = self.shared.lock();
            for record in state.connections.values_mut() {
                if matches!(record.status, ConnectionStatus::Broken(_)) {
                    continue;
                }
                record.status = ConnectionStatus::Broken(reason.clone());
                broken += 1;
                if let Some(listener) = &record.listener {
                    listeners.push(Arc::clone(listener));
                }
            }
        }
        self.shared.wake_all();
        warn!(
            target: TRANSPORT_TARGET,
            connections = broken,
            reason = %reason,
            "memory broker failing connections"
        );

        if !listeners.is_empty() {
            let error = TransportError::connection_lost(reason);
            thread::spawn(move || {
                for listener in listeners {
                    listener.on_failure(&error);
                }
            });
        }
        broken
    }

    /// Makes new connections succeed (`true`) or fail with
    /// [`TransportError::Unavailable`] (`false`).
    pub fn set_available(&self, available: bool) {
        let mut state = self.shared.lock();
        state.unavailable = if available {
            None
        } else {
            Some("memory broker marked unavailable".to_owned())
        };
    }

    /// Number of connections that have not been closed, broken ones included.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.shared.lock().connections.len()
    }

    /// Number of unexpired messages waiting on the named destination.
    #[must_use]
    pub fn queue_depth(&self, name: &str) -> usize {
        let mut state = self.shared.lock();
        state.discard_expired(name);
        state.queues.get(name).map_or(0, VecDeque::len)
    }

    /// Number of temporary destinations currently alive.
    #[must_use]
    pub fn temporary_destination_count(&self) -> usize {
        self.shared.lock().temporaries.len()
    }
}

impl fmt::Debug for MemoryBroker {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        formatter
            .debug_struct("MemoryBroker")
            .field("queues", &state.queues.len())
            .field("temporaries", &state.temporaries.len())
            .field("connections", &state.connections.len())
            .finish()
    }
}

impl ConnectionFactory for MemoryBroker {
    fn create_connection(&self) -> Result<Arc<dyn Connection>, TransportError> {
        let mut state = self.shared.lock();
        if let Some(reason) = &state.unavailable {
            return Err(TransportError::unavailable(reason.clone()));
        }
        state.next_connection += 1;
        let id = state.next_connection;
        state.connections.insert(
            id,
            ConnectionRecord {
                status: ConnectionStatus::Stopped,
                listener: None,
            },
        );
        debug!(target: TRANSPORT_TARGET, connection = id, "memory connection opened");
        Ok(Arc::new(MemoryConnection {
            shared: Arc::clone(&self.shared),
            id,
        }))
    }
}

struct MemoryConnection {
    shared: Arc<BrokerShared>,
    id: u64,
}

impl Connection for MemoryConnection {
    fn start(&self) -> Result<(), TransportError> {
        {
            let mut state = self.shared.lock();
            state.record(self.id)?;
            let Some(record) = state.connections.get_mut(&self.id) else {
                return Err(TransportError::ConnectionClosed);
            };
            if record.status == ConnectionStatus::Started {
                return Err(TransportError::illegal_state("connection already started"));
            }
            record.status = ConnectionStatus::Started;
        }
        self.shared.wake_all();
        Ok(())
    }

    fn stop(&self) -> Result<(), TransportError> {
        let mut state = self.shared.lock();
        state.record(self.id)?;
        if let Some(record) = state.connections.get_mut(&self.id) {
            record.status = ConnectionStatus::Stopped;
        }
        Ok(())
    }

    fn close(&self) {
        let removed = {
            let mut state = self.shared.lock();
            let removed = state.connections.remove(&self.id).is_some();
            state.drop_temporaries_of(self.id);
            removed
        };
        if removed {
            self.shared.wake_all();
            debug!(target: TRANSPORT_TARGET, connection = self.id, "memory connection closed");
        }
    }

    fn create_session(&self) -> Result<Box<dyn Session>, TransportError> {
        self.shared.lock().record(self.id)?;
        Ok(Box::new(MemorySession {
            shared: Arc::clone(&self.shared),
            connection: self.id,
            closed: false,
        }))
    }

    fn set_failure_listener(&self, listener: Arc<dyn FailureListener>) {
        let mut state = self.shared.lock();
        if let Some(record) = state.connections.get_mut(&self.id) {
            record.listener = Some(listener);
        }
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.close();
    }
}

struct MemorySession {
    shared: Arc<BrokerShared>,
    connection: u64,
    closed: bool,
}

impl MemorySession {
    const fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed {
            Err(TransportError::SessionClosed)
        } else {
            Ok(())
        }
    }
}

impl Session for MemorySession {
    fn send(
        &mut self,
        destination: &Destination,
        message: OutboundMessage,
    ) -> Result<MessageId, TransportError> {
        self.ensure_open()?;
        let mut state = self.shared.lock();
        state.record(self.connection)?;
        if destination.is_temporary() && !state.temporaries.contains_key(destination.name()) {
            return Err(TransportError::destination_not_found(destination.name()));
        }
        state.next_message += 1;
        let id = MessageId::new(format!("ID:memory-{}", state.next_message));
        let expires_at = message
            .time_to_live
            .and_then(|time_to_live| Instant::now().checked_add(time_to_live));
        state
            .queues
            .entry(destination.name().to_owned())
            .or_default()
            .push_back(Message {
                id: id.clone(),
                correlation_id: message.correlation_id,
                reply_to: message.reply_to,
                priority: message.priority,
                expires_at,
                body: message.body,
            });
        drop(state);
        self.shared.wake_all();
        Ok(id)
    }

    fn receive(
        &mut self,
        destination: &Destination,
        filter: Option<&CorrelationId>,
        timeout: Option<Duration>,
    ) -> Result<Option<Message>, TransportError> {
        self.ensure_open()?;
        let deadline = timeout.and_then(|wait| Instant::now().checked_add(wait));
        let mut state = self.shared.lock();
        loop {
            let started = state.is_started(self.connection)?;
            if destination.is_temporary() && !state.temporaries.contains_key(destination.name()) {
                return Err(TransportError::destination_not_found(destination.name()));
            }
            if started && let Some(message) = state.take(destination.name(), filter) {
                return Ok(Some(message));
            }

            state = match (timeout, deadline) {
                (Some(_), Some(deadline)) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    self.shared
                        .arrivals
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                _ => self
                    .shared
                    .arrivals
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    fn create_temporary_destination(&mut self) -> Result<Destination, TransportError> {
        self.ensure_open()?;
        let mut state = self.shared.lock();
        state.record(self.connection)?;
        state.next_temporary += 1;
        let name = format!("temp-{}-{}", self.connection, state.next_temporary);
        state.temporaries.insert(name.clone(), self.connection);
        state.queues.insert(name.clone(), VecDeque::new());
        Ok(Destination::temporary(name))
    }

    fn delete_temporary_destination(
        &mut self,
        destination: &Destination,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        {
            let mut state = self.shared.lock();
            if state.temporaries.remove(destination.name()).is_none() {
                return Err(TransportError::destination_not_found(destination.name()));
            }
            state.queues.remove(destination.name());
        }
        self.shared.wake_all();
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
