//! In-process broker.
//!
//! Mirrors the subset of broker behaviour the mesh relies on: username and
//! password login, wildcard subscriptions, and per-connection delivery. A
//! connection receives each published message at most once, however many of
//! its patterns match. Used by the integration tests and by `--local` runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::bus::{BusError, Envelope};
use crate::config::BusCredentials;
use crate::topics::topic_matches;

#[derive(Debug, Clone)]
pub struct LocalBroker {
    inner: Arc<BrokerInner>,
}

#[derive(Debug)]
struct BrokerInner {
    username: String,
    password: String,
    next_client_id: AtomicU64,
    clients: Mutex<HashMap<u64, ClientSlot>>,
}

#[derive(Debug, Default)]
struct ClientSlot {
    patterns: Vec<String>,
    inbound: Option<mpsc::Sender<Envelope>>,
}

impl LocalBroker {
    /// A broker that accepts exactly one username/password pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                username: username.into(),
                password: password.into(),
                next_client_id: AtomicU64::new(1),
                clients: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn connect(&self, credentials: &BusCredentials) -> Result<LocalConnection, BusError> {
        if credentials.username != self.inner.username || credentials.password != self.inner.password {
            return Err(BusError::Auth(format!(
                "local broker rejected user {:?}",
                credentials.username
            )));
        }

        let client_id = self.inner.next_client_id.fetch_add(1, Ordering::Relaxed);
        self.clients().insert(client_id, ClientSlot::default());
        debug!(client_id, tenant = %credentials.tenant, "local broker: client connected");

        Ok(LocalConnection {
            broker: self.clone(),
            client_id,
            connected: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Number of connected clients.
    pub fn connection_count(&self) -> usize {
        self.clients().len()
    }

    fn clients(&self) -> std::sync::MutexGuard<'_, HashMap<u64, ClientSlot>> {
        self.inner.clients.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn deliver(&self, topic: &str, payload: Vec<u8>) {
        let targets: Vec<mpsc::Sender<Envelope>> = self
            .clients()
            .values()
            .filter(|slot| slot.patterns.iter().any(|p| topic_matches(p, topic)))
            .filter_map(|slot| slot.inbound.clone())
            .collect();

        trace!(%topic, receivers = targets.len(), "local broker: delivering");
        for tx in targets {
            if tx.send(Envelope::new(topic, payload.clone())).await.is_err() {
                debug!(%topic, "local broker: receiver dropped");
            }
        }
    }
}

/// One client connection to a [`LocalBroker`].
#[derive(Debug, Clone)]
pub struct LocalConnection {
    broker: LocalBroker,
    client_id: u64,
    connected: Arc<AtomicBool>,
}

impl LocalConnection {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self, pattern: &str, inbound: mpsc::Sender<Envelope>) -> Result<(), BusError> {
        if !self.is_connected() {
            return Err(BusError::NotConnected);
        }
        let mut clients = self.broker.clients();
        let slot = clients.get_mut(&self.client_id).ok_or(BusError::NotConnected)?;
        if !slot.patterns.iter().any(|p| p == pattern) {
            slot.patterns.push(pattern.to_string());
        }
        slot.inbound = Some(inbound);
        Ok(())
    }

    pub async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError> {
        if !self.is_connected() {
            return Err(BusError::NotConnected);
        }
        self.broker.deliver(topic, payload).await;
        Ok(())
    }

    pub fn close(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.broker.clients().remove(&self.client_id);
            debug!(client_id = self.client_id, "local broker: client disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(password: &str) -> BusCredentials {
        BusCredentials {
            host: "local".into(),
            tenant: "test".into(),
            username: "mesh".into(),
            password: password.into(),
        }
    }

    #[test]
    fn wrong_password_is_auth_error() {
        let broker = LocalBroker::new("mesh", "secret");
        let err = broker.connect(&creds("nope")).unwrap_err();
        assert!(matches!(err, BusError::Auth(_)));
        assert_eq!(broker.connection_count(), 0);
    }

    #[tokio::test]
    async fn overlapping_patterns_deliver_once() {
        let broker = LocalBroker::new("mesh", "secret");
        let conn = broker.connect(&creds("secret")).unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        conn.subscribe("tinywins/*/progress/logged", tx.clone()).unwrap();
        conn.subscribe("tinywins/>", tx).unwrap();

        conn.publish("tinywins/c1/progress/logged", b"{}".to_vec()).await.unwrap();
        conn.publish("tinywins/c1/reward/unlocked", b"{}".to_vec()).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().topic, "tinywins/c1/progress/logged");
        assert_eq!(rx.recv().await.unwrap().topic, "tinywins/c1/reward/unlocked");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn delivers_across_connections() {
        let broker = LocalBroker::new("mesh", "secret");
        let publisher = broker.connect(&creds("secret")).unwrap();
        let subscriber = broker.connect(&creds("secret")).unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        subscriber.subscribe("tinywins/*/challenge/created", tx).unwrap();

        publisher.publish("tinywins/c9/challenge/created", b"{\"id\":\"x\"}".to_vec()).await.unwrap();
        publisher.publish("tinywins/c9/content/requested", b"{}".to_vec()).await.unwrap();

        let env = rx.recv().await.unwrap();
        assert_eq!(env.topic, "tinywins/c9/challenge/created");
        assert_eq!(env.payload, b"{\"id\":\"x\"}");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_connection_rejects_publish() {
        let broker = LocalBroker::new("mesh", "secret");
        let conn = broker.connect(&creds("secret")).unwrap();
        conn.close();
        assert!(!conn.is_connected());
        assert_eq!(broker.connection_count(), 0);
        let err = conn.publish("tinywins/c1/progress/logged", vec![]).await.unwrap_err();
        assert!(matches!(err, BusError::NotConnected));
    }
}
