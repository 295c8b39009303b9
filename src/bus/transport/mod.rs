//! Transport abstraction.
//!
//! `Transport` is an enum over concrete message transports. Add a new variant
//! and module for each additional broker. Enum dispatch keeps the session
//! free of trait objects and of the `async-trait` dependency.
//!
//! Transports speak mesh topics (`tinywins/<child>/<category>/<action>`);
//! any translation to broker-native subjects happens inside the variant.

pub mod local;
#[cfg(feature = "transport-nats")]
pub mod nats;

use tokio::sync::mpsc;

use crate::bus::{BusError, Envelope};
use crate::config::BusCredentials;

pub use local::{LocalBroker, LocalConnection};

/// How to reach the broker. Resolved at startup from config.
#[derive(Debug, Clone)]
pub enum Connector {
    #[cfg(feature = "transport-nats")]
    Nats,
    Local(LocalBroker),
}

/// A live transport connection. Cheap to clone; clones share the connection.
#[derive(Debug, Clone)]
pub enum Transport {
    #[cfg(feature = "transport-nats")]
    Nats(nats::NatsTransport),
    Local(LocalConnection),
}

impl Transport {
    /// Open a connection, suspending until the broker confirms the session
    /// or rejects the login.
    pub async fn connect(connector: Connector, credentials: &BusCredentials) -> Result<Self, BusError> {
        match connector {
            #[cfg(feature = "transport-nats")]
            Connector::Nats => Ok(Transport::Nats(nats::NatsTransport::connect(credentials).await?)),
            Connector::Local(broker) => Ok(Transport::Local(broker.connect(credentials)?)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            #[cfg(feature = "transport-nats")]
            Transport::Nats(_) => "nats",
            Transport::Local(_) => "local",
        }
    }

    pub fn is_connected(&self) -> bool {
        match self {
            #[cfg(feature = "transport-nats")]
            Transport::Nats(t) => t.is_connected(),
            Transport::Local(t) => t.is_connected(),
        }
    }

    /// Register `pattern` and forward every matching message to `inbound`.
    pub async fn subscribe(&self, pattern: &str, inbound: mpsc::Sender<Envelope>) -> Result<(), BusError> {
        match self {
            #[cfg(feature = "transport-nats")]
            Transport::Nats(t) => t.subscribe(pattern, inbound).await,
            Transport::Local(t) => t.subscribe(pattern, inbound),
        }
    }

    pub async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError> {
        match self {
            #[cfg(feature = "transport-nats")]
            Transport::Nats(t) => t.publish(topic, payload).await,
            Transport::Local(t) => t.publish(topic, payload).await,
        }
    }

    pub async fn close(&self) {
        match self {
            #[cfg(feature = "transport-nats")]
            Transport::Nats(t) => t.close().await,
            Transport::Local(t) => t.close(),
        }
    }
}
