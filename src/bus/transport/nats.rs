//! NATS transport (`async-nats`).
//!
//! Mesh topics map onto NATS subjects level by level, under a tenant prefix:
//! `tinywins/c1/progress/logged` becomes `<tenant>.tinywins.c1.progress.logged`.
//! The tenant plays the role of a virtual namespace, so two meshes sharing a
//! server never see each other's traffic.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_nats::{ConnectErrorKind, ConnectOptions, Event};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bus::{BusError, Envelope};
use crate::config::BusCredentials;
use crate::topics::{MULTI_WILDCARD, WILDCARD};

#[derive(Debug, Clone)]
pub struct NatsTransport {
    client: async_nats::Client,
    tenant: String,
    connected: Arc<AtomicBool>,
}

impl NatsTransport {
    pub async fn connect(credentials: &BusCredentials) -> Result<Self, BusError> {
        let connected = Arc::new(AtomicBool::new(false));
        let flag = connected.clone();

        let client = ConnectOptions::with_user_and_password(
            credentials.username.clone(),
            credentials.password.clone(),
        )
        .name("tinywins-mesh")
        .event_callback(move |event| {
            let flag = flag.clone();
            async move {
                match event {
                    Event::Connected => {
                        flag.store(true, Ordering::SeqCst);
                        info!("nats: connected");
                    }
                    Event::Disconnected => {
                        flag.store(false, Ordering::SeqCst);
                        warn!("nats: disconnected");
                    }
                    other => debug!(event = ?other, "nats: event"),
                }
            }
        })
        .connect(credentials.host.as_str())
        .await
        .map_err(|e| match e.kind() {
            ConnectErrorKind::AuthorizationViolation | ConnectErrorKind::Authentication => {
                BusError::Auth(e.to_string())
            }
            _ => BusError::Unreachable(e.to_string()),
        })?;

        connected.store(true, Ordering::SeqCst);
        info!(host = %credentials.host, tenant = %credentials.tenant, "nats: session up");

        Ok(Self {
            client,
            tenant: credentials.tenant.clone(),
            connected,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub async fn subscribe(&self, pattern: &str, inbound: mpsc::Sender<Envelope>) -> Result<(), BusError> {
        let subject = to_subject(&self.tenant, pattern, true)
            .ok_or_else(|| BusError::InvalidPattern(pattern.to_string()))?;
        let mut subscriber = self
            .client
            .subscribe(subject.clone())
            .await
            .map_err(|e| BusError::Subscribe(e.to_string()))?;
        debug!(%subject, "nats: subscribed");

        let tenant = self.tenant.clone();
        tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                let Some(topic) = from_subject(&tenant, &message.subject) else {
                    warn!(subject = %message.subject, "nats: subject outside tenant namespace");
                    continue;
                };
                if inbound.send(Envelope::new(topic, message.payload.to_vec())).await.is_err() {
                    debug!(%subject, "nats: inbound receiver dropped, ending subscription");
                    break;
                }
            }
        });
        Ok(())
    }

    pub async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError> {
        if !self.is_connected() {
            return Err(BusError::NotConnected);
        }
        let subject = to_subject(&self.tenant, topic, false)
            .ok_or_else(|| BusError::InvalidTopic(topic.to_string()))?;
        self.client
            .publish(subject, payload.into())
            .await
            .map_err(|e| BusError::Publish(e.to_string()))
    }

    pub async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Err(e) = self.client.flush().await {
            warn!(error = %e, "nats: flush on close failed");
        }
    }
}

/// Translate a mesh topic (or pattern, when `allow_wildcards`) to a subject.
/// Levels must be non-empty and free of `.` and whitespace.
fn to_subject(tenant: &str, topic: &str, allow_wildcards: bool) -> Option<String> {
    let mut subject = String::with_capacity(tenant.len() + topic.len() + 1);
    subject.push_str(tenant);
    for level in topic.split('/') {
        let wildcard = level == WILDCARD || level == MULTI_WILDCARD;
        if level.is_empty()
            || level.contains('.')
            || level.chars().any(char::is_whitespace)
            || (wildcard && !allow_wildcards)
            || (!wildcard && (level.contains('*') || level.contains('>')))
        {
            return None;
        }
        subject.push('.');
        subject.push_str(level);
    }
    Some(subject)
}

fn from_subject(tenant: &str, subject: &str) -> Option<String> {
    let rest = subject.strip_prefix(tenant)?.strip_prefix('.')?;
    Some(rest.replace('.', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_maps_under_tenant() {
        assert_eq!(
            to_subject("acme", "tinywins/c1/progress/logged", false).as_deref(),
            Some("acme.tinywins.c1.progress.logged")
        );
        assert_eq!(
            to_subject("acme", "tinywins/*/progress/logged", true).as_deref(),
            Some("acme.tinywins.*.progress.logged")
        );
    }

    #[test]
    fn concrete_topics_reject_wildcards_and_dots() {
        assert!(to_subject("acme", "tinywins/*/progress/logged", false).is_none());
        assert!(to_subject("acme", "tinywins/a.b/progress/logged", false).is_none());
        assert!(to_subject("acme", "tinywins/a b/progress/logged", false).is_none());
        assert!(to_subject("acme", "tinywins/a*/progress/logged", true).is_none());
    }

    #[test]
    fn subject_maps_back_to_topic() {
        assert_eq!(
            from_subject("acme", "acme.tinywins.c1.reward.unlocked").as_deref(),
            Some("tinywins/c1/reward/unlocked")
        );
        assert!(from_subject("acme", "other.tinywins.c1.reward.unlocked").is_none());
        assert!(from_subject("acme", "acmetinywins.c1").is_none());
    }
}
