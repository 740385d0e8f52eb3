use std::{sync::Arc, time::Duration};

use log::{debug, error, info, warn};
use notifier_api::RealtimeNotifier;
use notifier_broker::{Broker, BrokerError, BrokerSession, Delivery, Topology};
use notifier_database::interfaces::NotificationStore;
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{decoder::decode, pipeline::Pipeline, retry::ReconnectSchedule};

/// Unacknowledged deliveries the broker may hand us at once.
pub const PREFETCH: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Disconnected,
    Connecting,
    Subscribed,
    ReconnectPending,
}

/// How a delivery is settled with the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    Reject { requeue: bool },
}

impl Disposition {
    /// A failed first delivery gets one more try; a failed redelivery is dropped.
    pub fn after_failure(redelivered: bool) -> Self {
        Disposition::Reject {
            requeue: !redelivered,
        }
    }
}

enum SessionEnd {
    Cancelled,
    Lost(String),
}

/// Owns the broker session and drives the connect / consume / reconnect cycle.
pub struct ConnectionManager<S, N> {
    broker: Arc<dyn Broker>,
    topology: Topology,
    pipeline: Pipeline<S, N>,
    schedule: ReconnectSchedule,
    state: watch::Sender<ConsumerState>,
}

impl<S, N> ConnectionManager<S, N>
where
    S: NotificationStore,
    N: RealtimeNotifier,
{
    pub fn new(
        broker: Arc<dyn Broker>,
        topology: Topology,
        pipeline: Pipeline<S, N>,
        schedule: ReconnectSchedule,
    ) -> Self {
        let (state, _) = watch::channel(ConsumerState::Disconnected);
        Self {
            broker,
            topology,
            pipeline,
            schedule,
            state,
        }
    }

    /// Start the run loop on its own task.
    pub fn spawn(self) -> ConsumerHandle {
        let cancel = CancellationToken::new();
        let state = self.state.subscribe();
        let task = tokio::spawn(self.run(cancel.clone()));
        ConsumerHandle {
            cancel,
            state,
            task,
        }
    }

    /// Run until `cancel` fires. The loop only exits through cancellation.
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            self.set_state(ConsumerState::Connecting);
            let connected = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                connected = self.broker.connect(&self.topology) => connected,
            };

            match connected {
                Ok(mut session) => {
                    self.set_state(ConsumerState::Subscribed);
                    info!(
                        "Waiting for messages on queue {} (prefetch {})",
                        self.topology.queue, self.topology.prefetch
                    );
                    let ended = self.consume(session.as_mut(), &cancel).await;
                    teardown(session.as_mut()).await;
                    match ended {
                        SessionEnd::Cancelled => break,
                        SessionEnd::Lost(reason) => warn!("RabbitMQ session lost: {}", reason),
                    }
                }
                Err(err) => error!("Failed to connect to RabbitMQ: {}", err),
            }

            self.set_state(ConsumerState::ReconnectPending);
            info!(
                "Reconnecting to RabbitMQ in {}",
                humanize(self.schedule.delay())
            );
            if !self.schedule.wait(&cancel).await {
                break;
            }
        }

        self.set_state(ConsumerState::Disconnected);
        info!("Consumer stopped");
    }

    async fn consume(
        &self,
        session: &mut dyn BrokerSession,
        cancel: &CancellationToken,
    ) -> SessionEnd {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return SessionEnd::Cancelled,
                next = session.next_delivery() => next,
            };

            let delivery = match next {
                Ok(Some(delivery)) => delivery,
                Ok(None) => return SessionEnd::Lost("consumer cancelled by broker".into()),
                Err(err) => return SessionEnd::Lost(err.to_string()),
            };

            // In-flight work is not interrupted by shutdown; it is settled before we look again.
            if let Err(err) = self.handle_delivery(session, delivery).await {
                return SessionEnd::Lost(err.to_string());
            }
        }
    }

    async fn handle_delivery(
        &self,
        session: &mut dyn BrokerSession,
        delivery: Delivery,
    ) -> Result<(), BrokerError> {
        debug!(
            "Received delivery {} on {} (redelivered: {})",
            delivery.delivery_tag, delivery.routing_key, delivery.redelivered
        );

        let disposition = match decode(&delivery.payload) {
            Ok(notification) => {
                info!("Processing notification: {}", notification.id);
                match self.pipeline.process(&notification).await {
                    Ok(outcome) => {
                        debug!("Notification {} finished as {:?}", notification.id, outcome);
                        Disposition::Ack
                    }
                    Err(err) => {
                        error!("Error processing message: {}", err);
                        Disposition::after_failure(delivery.redelivered)
                    }
                }
            }
            Err(err) => {
                error!("Error processing message: {}", err);
                Disposition::after_failure(delivery.redelivered)
            }
        };

        match disposition {
            Disposition::Ack => session.ack(delivery.delivery_tag).await,
            Disposition::Reject { requeue } => {
                if requeue {
                    warn!("Requeueing delivery {} for one more attempt", delivery.delivery_tag);
                } else {
                    warn!("Dropping delivery {} after a failed redelivery", delivery.delivery_tag);
                }
                session.reject(delivery.delivery_tag, requeue).await
            }
        }
    }

    fn set_state(&self, next: ConsumerState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!("Consumer state {:?} -> {:?}", previous, next);
        }
    }
}

async fn teardown(session: &mut dyn BrokerSession) {
    if let Err(err) = session.close().await {
        warn!("Error while closing RabbitMQ session: {}", err);
    }
}

fn humanize(delay: Duration) -> String {
    humantime::format_duration(delay).to_string()
}

/// Control surface for a spawned [`ConnectionManager`].
pub struct ConsumerHandle {
    cancel: CancellationToken,
    state: watch::Receiver<ConsumerState>,
    task: JoinHandle<()>,
}

impl ConsumerHandle {
    pub fn state(&self) -> ConsumerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConsumerState> {
        self.state.clone()
    }

    /// Stop consuming and wait up to `grace` for the session to be torn down.
    pub async fn close(self, grace: Duration) {
        info!("Closing RabbitMQ consumer");
        self.cancel.cancel();
        let abort = self.task.abort_handle();
        match tokio::time::timeout(grace, self.task).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!("Consumer task failed: {}", err),
            Err(_) => {
                warn!(
                    "Consumer did not stop within {}; aborting",
                    humanize(grace)
                );
                abort.abort();
            }
        }
    }
}
