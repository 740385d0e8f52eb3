use crate::{Broker, BrokerError, BrokerSession, Delivery, Topology, topic_matches};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{Notify, watch};

/// How a delivery was settled by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    Acked,
    Requeued,
    Dropped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub payload: Vec<u8>,
    pub outcome: Settled,
}

#[derive(Clone)]
struct StoredMessage {
    routing_key: String,
    payload: Vec<u8>,
    redelivered: bool,
}

struct Inflight {
    session: u64,
    queue: String,
    message: StoredMessage,
}

struct Binding {
    exchange: String,
    queue: String,
    pattern: String,
}

#[derive(Default)]
struct BrokerState {
    bindings: Vec<Binding>,
    queues: HashMap<String, VecDeque<StoredMessage>>,
    inflight: HashMap<u64, Inflight>,
    sessions: HashMap<u64, watch::Sender<bool>>,
    cancelled_consumers: HashSet<u64>,
    next_tag: u64,
    next_session: u64,
    pending_connect_failures: usize,
    connect_attempts: usize,
    topologies: Vec<Topology>,
    settlements: Vec<Settlement>,
}

impl BrokerState {
    fn declare(&mut self, topology: &Topology) {
        self.queues.entry(topology.queue.clone()).or_default();
        let bound = self.bindings.iter().any(|binding| {
            binding.exchange == topology.exchange
                && binding.queue == topology.queue
                && binding.pattern == topology.binding_key
        });
        if !bound {
            self.bindings.push(Binding {
                exchange: topology.exchange.clone(),
                queue: topology.queue.clone(),
                pattern: topology.binding_key.clone(),
            });
        }
    }

    fn requeue(&mut self, queue: &str, mut message: StoredMessage) {
        message.redelivered = true;
        self.queues
            .entry(queue.to_string())
            .or_default()
            .push_front(message);
    }

    /// Return every unacknowledged delivery held by the session to its queue.
    fn release_session(&mut self, session: u64) {
        let tags: Vec<u64> = self
            .inflight
            .iter()
            .filter(|(_, inflight)| inflight.session == session)
            .map(|(tag, _)| *tag)
            .collect();
        for tag in tags {
            if let Some(inflight) = self.inflight.remove(&tag) {
                self.requeue(&inflight.queue, inflight.message);
            }
        }
    }
}

/// Broker living inside the process, with hooks for simulating transport failures.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    notify: Arc<Notify>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assert a topology ahead of any consumer so publishes are routable.
    pub fn declare(&self, topology: &Topology) {
        self.state.lock().declare(topology);
    }

    /// Route a message through the exchange; returns the number of queues it landed in.
    pub fn publish(&self, exchange: &str, routing_key: &str, payload: impl Into<Vec<u8>>) -> usize {
        let payload = payload.into();
        let mut guard = self.state.lock();
        let targets: Vec<String> = guard
            .bindings
            .iter()
            .filter(|binding| binding.exchange == exchange && topic_matches(&binding.pattern, routing_key))
            .map(|binding| binding.queue.clone())
            .collect();

        for queue in &targets {
            guard
                .queues
                .entry(queue.clone())
                .or_default()
                .push_back(StoredMessage {
                    routing_key: routing_key.to_string(),
                    payload: payload.clone(),
                    redelivered: false,
                });
        }
        drop(guard);
        self.notify.notify_waiters();
        targets.len()
    }

    /// Make the next `count` connection attempts fail.
    pub fn fail_next_connects(&self, count: usize) {
        self.state.lock().pending_connect_failures = count;
    }

    /// Drop every open connection as if the broker went away.
    pub fn sever_connections(&self) {
        let mut guard = self.state.lock();
        let sessions: Vec<(u64, watch::Sender<bool>)> = guard.sessions.drain().collect();
        for (session, closed) in sessions {
            guard.release_session(session);
            let _ = closed.send(true);
        }
        drop(guard);
        self.notify.notify_waiters();
    }

    /// Cancel every registered consumer as the broker would when its queue is deleted.
    /// Connections stay open; waiting consumers see the end of their stream.
    pub fn cancel_consumers(&self) {
        let mut guard = self.state.lock();
        let ids: Vec<u64> = guard.sessions.keys().copied().collect();
        guard.cancelled_consumers.extend(ids);
        drop(guard);
        self.notify.notify_waiters();
    }

    pub fn connect_attempts(&self) -> usize {
        self.state.lock().connect_attempts
    }

    pub fn open_sessions(&self) -> usize {
        self.state.lock().sessions.len()
    }

    pub fn queue_depth(&self, queue: &str) -> usize {
        self.state
            .lock()
            .queues
            .get(queue)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    pub fn declared_topologies(&self) -> Vec<Topology> {
        self.state.lock().topologies.clone()
    }

    pub fn settlements(&self) -> Vec<Settlement> {
        self.state.lock().settlements.clone()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn connect(&self, topology: &Topology) -> Result<Box<dyn BrokerSession>, BrokerError> {
        let (id, closed) = {
            let mut guard = self.state.lock();
            guard.connect_attempts += 1;
            if guard.pending_connect_failures > 0 {
                guard.pending_connect_failures -= 1;
                return Err(BrokerError::Connection("connection refused".into()));
            }

            guard.declare(topology);
            guard.topologies.push(topology.clone());
            let id = guard.next_session;
            guard.next_session += 1;
            let (closed_tx, closed_rx) = watch::channel(false);
            guard.sessions.insert(id, closed_tx);
            (id, closed_rx)
        };

        Ok(Box::new(InMemorySession {
            id,
            topology: topology.clone(),
            state: Arc::clone(&self.state),
            notify: Arc::clone(&self.notify),
            closed,
        }))
    }
}

struct InMemorySession {
    id: u64,
    topology: Topology,
    state: Arc<Mutex<BrokerState>>,
    notify: Arc<Notify>,
    closed: watch::Receiver<bool>,
}

impl InMemorySession {
    fn try_take(&self) -> Result<Option<Delivery>, BrokerError> {
        let mut guard = self.state.lock();
        if !guard.sessions.contains_key(&self.id) {
            return Err(BrokerError::ConnectionClosed("connection severed".into()));
        }

        let unacked = guard
            .inflight
            .values()
            .filter(|inflight| inflight.session == self.id)
            .count();
        if unacked >= usize::from(self.topology.prefetch.max(1)) {
            return Ok(None);
        }

        let Some(message) = guard
            .queues
            .get_mut(&self.topology.queue)
            .and_then(VecDeque::pop_front)
        else {
            return Ok(None);
        };

        guard.next_tag += 1;
        let delivery_tag = guard.next_tag;
        let delivery = Delivery {
            delivery_tag,
            redelivered: message.redelivered,
            routing_key: message.routing_key.clone(),
            payload: message.payload.clone(),
        };
        guard.inflight.insert(
            delivery_tag,
            Inflight {
                session: self.id,
                queue: self.topology.queue.clone(),
                message,
            },
        );
        Ok(Some(delivery))
    }

    fn settle(&self, delivery_tag: u64, outcome: Settled) -> Result<(), BrokerError> {
        let mut guard = self.state.lock();
        if !guard.sessions.contains_key(&self.id) {
            return Err(BrokerError::Channel("channel is closed".into()));
        }
        let inflight = match guard.inflight.remove(&delivery_tag) {
            Some(inflight) if inflight.session == self.id => inflight,
            Some(other) => {
                guard.inflight.insert(delivery_tag, other);
                return Err(BrokerError::Channel(format!(
                    "delivery tag {delivery_tag} belongs to another channel"
                )));
            }
            None => {
                return Err(BrokerError::Channel(format!(
                    "unknown delivery tag {delivery_tag}"
                )));
            }
        };

        guard.settlements.push(Settlement {
            delivery_tag,
            redelivered: inflight.message.redelivered,
            payload: inflight.message.payload.clone(),
            outcome,
        });
        if outcome == Settled::Requeued {
            guard.requeue(&inflight.queue, inflight.message);
        }
        Ok(())
    }
}

#[async_trait]
impl BrokerSession for InMemorySession {
    async fn next_delivery(&mut self) -> Result<Option<Delivery>, BrokerError> {
        let notify = Arc::clone(&self.notify);
        loop {
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if *self.closed.borrow() {
                return Err(BrokerError::ConnectionClosed("connection severed".into()));
            }
            if self.state.lock().cancelled_consumers.contains(&self.id) {
                return Ok(None);
            }
            if let Some(delivery) = self.try_take()? {
                return Ok(Some(delivery));
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = self.closed.changed() => {}
            }
        }
    }

    async fn ack(&mut self, delivery_tag: u64) -> Result<(), BrokerError> {
        self.settle(delivery_tag, Settled::Acked)
    }

    async fn reject(&mut self, delivery_tag: u64, requeue: bool) -> Result<(), BrokerError> {
        let outcome = if requeue { Settled::Requeued } else { Settled::Dropped };
        self.settle(delivery_tag, outcome)?;
        if requeue {
            self.notify.notify_waiters();
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BrokerError> {
        let was_open = {
            let mut guard = self.state.lock();
            let was_open = guard.sessions.remove(&self.id).is_some();
            guard.cancelled_consumers.remove(&self.id);
            if was_open {
                guard.release_session(self.id);
            }
            was_open
        };
        self.notify.notify_waiters();
        if was_open {
            Ok(())
        } else {
            Err(BrokerError::ConnectionClosed("connection already closed".into()))
        }
    }
}
