//! Bus session: owns the transport connection and the single inbound queue.
//!
//! Startup: [`BusSession::connect`] suspends until the transport is up or the
//! login fails. Subscriptions are idempotent per pattern. Every received
//! envelope lands on one inbound `mpsc` queue, in transport delivery order,
//! which the dispatcher drains.
//!
//! Outbound traffic goes through [`BusHandle`]: `publish` serializes the
//! payload, enqueues it and returns without waiting for the broker. A writer
//! task drains the queue into the transport. [`BusSession::close`] refuses new
//! publishes, lets the writer flush what was already accepted, and only then
//! disconnects.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::transport::{Connector, Transport};
use crate::bus::{BusError, Envelope, MeshEvent};
use crate::config::BusCredentials;
use crate::topics::{is_mesh_pattern, parse_topic, topic_for};

/// Queue depths for the inbound and outbound halves of a session.
#[derive(Debug, Clone, Copy)]
pub struct BusBuffers {
    pub inbound: usize,
    pub outbound: usize,
}

impl Default for BusBuffers {
    fn default() -> Self {
        Self { inbound: 256, outbound: 256 }
    }
}

/// Upper bound on how long `close` waits for the writer to flush.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct Outbound {
    topic: String,
    payload: Vec<u8>,
}

/// A connected session.
pub struct BusSession {
    transport: Transport,
    subscriptions: BTreeSet<String>,
    inbound_tx: mpsc::Sender<Envelope>,
    inbound_rx: Option<mpsc::Receiver<Envelope>>,
    handle: BusHandle,
    drain: CancellationToken,
    writer: JoinHandle<usize>,
}

impl BusSession {
    pub async fn connect(
        connector: Connector,
        credentials: &BusCredentials,
        buffers: BusBuffers,
    ) -> Result<Self, BusError> {
        let transport = Transport::connect(connector, credentials).await?;
        info!(transport = transport.name(), host = %credentials.host, "bus session up");

        let (inbound_tx, inbound_rx) = mpsc::channel(buffers.inbound.max(1));
        let (outbound_tx, outbound_rx) = mpsc::channel(buffers.outbound.max(1));
        let drain = CancellationToken::new();
        let writer = tokio::spawn(write_loop(transport.clone(), outbound_rx, drain.clone()));

        Ok(Self {
            handle: BusHandle {
                transport: transport.clone(),
                outbound: outbound_tx,
                closing: Arc::new(AtomicBool::new(false)),
            },
            drain,
            transport,
            subscriptions: BTreeSet::new(),
            inbound_tx,
            inbound_rx: Some(inbound_rx),
            writer,
        })
    }

    /// Subscribe to `pattern`. Returns `Ok(false)` when the pattern was
    /// already active; a repeat never duplicates delivered envelopes.
    pub async fn subscribe(&mut self, pattern: &str) -> Result<bool, BusError> {
        if !is_mesh_pattern(pattern) {
            return Err(BusError::InvalidPattern(pattern.to_string()));
        }
        if self.subscriptions.contains(pattern) {
            debug!(%pattern, "already subscribed");
            return Ok(false);
        }
        self.transport.subscribe(pattern, self.inbound_tx.clone()).await?;
        self.subscriptions.insert(pattern.to_string());
        info!(%pattern, "subscribed");
        Ok(true)
    }

    /// Active subscription patterns, sorted.
    pub fn subscriptions(&self) -> impl Iterator<Item = &str> {
        self.subscriptions.iter().map(String::as_str)
    }

    /// Cloneable publisher for agents and other producers.
    pub fn handle(&self) -> BusHandle {
        self.handle.clone()
    }

    /// The single inbound queue. Yields `None` after the first call.
    pub fn take_inbound(&mut self) -> Option<mpsc::Receiver<Envelope>> {
        self.inbound_rx.take()
    }

    /// Disconnect. Publishes made through any handle afterwards fail with
    /// [`BusError::NotConnected`]; publishes accepted before the call are
    /// flushed to the transport first.
    pub async fn close(self) {
        self.handle.closing.store(true, Ordering::SeqCst);
        self.drain.cancel();

        let mut writer = self.writer;
        match tokio::time::timeout(DRAIN_TIMEOUT, &mut writer).await {
            Ok(Ok(flushed)) => debug!(flushed, "outbound queue drained"),
            Ok(Err(e)) => warn!(error = %e, "bus writer task failed"),
            Err(_) => {
                writer.abort();
                let outbound = &self.handle.outbound;
                warn!(
                    dropped = outbound.max_capacity() - outbound.capacity(),
                    "outbound queue not drained in time, dropping remaining publishes"
                );
            }
        }

        self.transport.close().await;
        info!(transport = self.transport.name(), "bus session closed");
    }
}

/// Publishing half of a session.
#[derive(Debug, Clone)]
pub struct BusHandle {
    transport: Transport,
    outbound: mpsc::Sender<Outbound>,
    closing: Arc<AtomicBool>,
}

impl BusHandle {
    /// Serialize `payload` as JSON and enqueue it for `topic`.
    ///
    /// Returns once the message is queued; broker acknowledgement is never
    /// awaited. Fails when the topic is outside the mesh grammar, the
    /// transport is down, or the outbound queue is saturated.
    pub fn publish<T: Serialize + ?Sized>(&self, topic: &str, payload: &T) -> Result<(), BusError> {
        if parse_topic(topic).is_none() {
            return Err(BusError::InvalidTopic(topic.to_string()));
        }
        let payload = serde_json::to_vec(payload)?;
        self.enqueue(topic.to_string(), payload)
    }

    /// Publish a typed event on the topic derived from its child and kind.
    pub fn emit(&self, event: &MeshEvent) -> Result<(), BusError> {
        let topic = topic_for(event.child_id(), event.kind());
        if parse_topic(&topic).is_none() {
            return Err(BusError::InvalidTopic(topic));
        }
        let payload = event.encode()?;
        self.enqueue(topic, payload)
    }

    pub fn is_connected(&self) -> bool {
        !self.closing.load(Ordering::SeqCst) && self.transport.is_connected()
    }

    fn enqueue(&self, topic: String, payload: Vec<u8>) -> Result<(), BusError> {
        if !self.is_connected() {
            return Err(BusError::NotConnected);
        }
        self.outbound
            .try_send(Outbound { topic, payload })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => BusError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => BusError::NotConnected,
            })
    }
}

/// Forward queued publishes until `drain` fires, then flush whatever is still
/// queued. Returns the number of messages flushed after `drain`.
async fn write_loop(transport: Transport, mut outbound: mpsc::Receiver<Outbound>, drain: CancellationToken) -> usize {
    loop {
        tokio::select! {
            biased;

            _ = drain.cancelled() => break,

            message = outbound.recv() => match message {
                Some(message) => forward(&transport, message).await,
                None => {
                    debug!("outbound queue closed, writer exiting");
                    return 0;
                }
            },
        }
    }

    let mut flushed = 0;
    while let Ok(message) = outbound.try_recv() {
        forward(&transport, message).await;
        flushed += 1;
    }
    flushed
}

async fn forward(transport: &Transport, Outbound { topic, payload }: Outbound) {
    debug!(%topic, bytes = payload.len(), "publishing");
    if let Err(e) = transport.publish(&topic, payload).await {
        warn!(%topic, error = %e, "publish failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::transport::LocalBroker;
    use crate::bus::event::RewardUnlocked;

    fn creds() -> BusCredentials {
        BusCredentials {
            host: "local".into(),
            tenant: "test".into(),
            username: "mesh".into(),
            password: "secret".into(),
        }
    }

    async fn session(broker: &LocalBroker) -> BusSession {
        BusSession::connect(Connector::Local(broker.clone()), &creds(), BusBuffers::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn login_failure_is_reported() {
        let broker = LocalBroker::new("mesh", "other");
        let result = BusSession::connect(Connector::Local(broker), &creds(), BusBuffers::default()).await;
        assert!(matches!(result, Err(BusError::Auth(_))));
    }

    #[tokio::test]
    async fn repeated_subscribe_is_noop() {
        let broker = LocalBroker::new("mesh", "secret");
        let mut s = session(&broker).await;
        let mut inbound = s.take_inbound().unwrap();
        assert!(s.take_inbound().is_none());

        assert!(s.subscribe("tinywins/*/progress/logged").await.unwrap());
        assert!(!s.subscribe("tinywins/*/progress/logged").await.unwrap());
        assert_eq!(s.subscriptions().count(), 1);

        s.handle()
            .publish("tinywins/c1/progress/logged", &serde_json::json!({"childId": "c1"}))
            .unwrap();
        let env = inbound.recv().await.unwrap();
        assert_eq!(env.topic, "tinywins/c1/progress/logged");

        tokio::task::yield_now().await;
        assert!(inbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn rejects_patterns_outside_grammar() {
        let broker = LocalBroker::new("mesh", "secret");
        let mut s = session(&broker).await;
        assert!(matches!(s.subscribe("elsewhere/>").await, Err(BusError::InvalidPattern(_))));
    }

    #[tokio::test]
    async fn publish_rejects_malformed_topic() {
        let broker = LocalBroker::new("mesh", "secret");
        let s = session(&broker).await;
        let err = s.handle().publish("tinywins/c1/nope", &serde_json::json!({})).unwrap_err();
        assert!(matches!(err, BusError::InvalidTopic(_)));
    }

    #[tokio::test]
    async fn emit_uses_derived_topic() {
        let broker = LocalBroker::new("mesh", "secret");
        let mut s = session(&broker).await;
        let mut inbound = s.take_inbound().unwrap();
        s.subscribe("tinywins/>").await.unwrap();

        let event = MeshEvent::RewardUnlocked(RewardUnlocked {
            child_id: "c7".into(),
            streak: 6,
            reward: "bronze-star".into(),
        });
        s.handle().emit(&event).unwrap();

        let env = inbound.recv().await.unwrap();
        assert_eq!(env.topic, "tinywins/c7/reward/unlocked");
        let value: serde_json::Value = serde_json::from_slice(&env.payload).unwrap();
        assert_eq!(value["streak"], 6);
    }

    #[tokio::test]
    async fn close_flushes_accepted_publishes() {
        let broker = LocalBroker::new("mesh", "secret");
        let mut observer = session(&broker).await;
        let mut seen = observer.take_inbound().unwrap();
        observer.subscribe("tinywins/*/progress/logged").await.unwrap();

        let s = session(&broker).await;
        let handle = s.handle();
        for i in 0..20 {
            handle
                .publish("tinywins/c1/progress/logged", &serde_json::json!({"seq": i}))
                .unwrap();
        }
        s.close().await;

        for i in 0..20 {
            let env = seen.recv().await.unwrap();
            let value: serde_json::Value = serde_json::from_slice(&env.payload).unwrap();
            assert_eq!(value["seq"], i);
        }
        assert!(matches!(
            handle.publish("tinywins/c1/progress/logged", &serde_json::json!({})),
            Err(BusError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn publish_after_close_is_not_connected() {
        let broker = LocalBroker::new("mesh", "secret");
        let s = session(&broker).await;
        let handle = s.handle();
        s.close().await;
        let err = handle
            .publish("tinywins/c1/progress/logged", &serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, BusError::NotConnected));
    }
}
