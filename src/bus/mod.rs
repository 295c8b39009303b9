//! Mesh bus: envelopes, typed payloads, the session and its transports.
//!
//! - **event**: closed set of typed payloads keyed by topic kind.
//! - **session**: connection lifecycle, subscriptions, and the cloneable
//!   [`BusHandle`] agents publish through.
//! - **transport**: enum over concrete transports (NATS, in-process).

pub mod event;
pub mod session;
pub mod transport;

use thiserror::Error;
use uuid::Uuid;

pub use event::{MeshEvent, PayloadError};
pub use session::{BusBuffers, BusHandle, BusSession};

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus login failed: {0}")]
    Auth(String),
    #[error("bus transport unreachable: {0}")]
    Unreachable(String),
    #[error("bus transport not connected")]
    NotConnected,
    #[error("outbound queue full")]
    QueueFull,
    #[error("invalid topic: {0}")]
    InvalidTopic(String),
    #[error("invalid subscription pattern: {0}")]
    InvalidPattern(String),
    #[error("subscribe failed: {0}")]
    Subscribe(String),
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A delivered (topic, payload) unit.
///
/// `id` is assigned on receipt for log correlation only; it is not carried
/// on the wire.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub id: Uuid,
    pub topic: String,
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: Uuid::now_v7(),
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}
