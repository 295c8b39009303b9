//! Content agent: compose calls for `content/requested` events.
//!
//! Each request spawns one tracked task, so a slow compose service never
//! holds up the dispatcher. The task publishes exactly one
//! `content/generated` event on success and nothing on failure. Failures are
//! logged and counted; there is no retry.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::bus::event::ContentGenerated;
use crate::bus::{BusHandle, MeshEvent};
use crate::compose::{ComposeError, ComposeProvider, ComposeRequest};
use crate::dispatch::{Agent, AgentError, InboundEvent};
use crate::topics::TopicKind;

#[derive(Debug, Default)]
struct Counters {
    generated: AtomicU64,
    failed: AtomicU64,
}

pub struct ContentAgent {
    bus: BusHandle,
    provider: ComposeProvider,
    timeout: Duration,
    tracker: TaskTracker,
    counters: Arc<Counters>,
}

impl ContentAgent {
    pub fn new(bus: BusHandle, provider: ComposeProvider, timeout: Duration) -> Self {
        Self {
            bus,
            provider,
            timeout,
            tracker: TaskTracker::new(),
            counters: Arc::default(),
        }
    }

    /// Requests that produced a `content/generated` event.
    pub fn generated(&self) -> u64 {
        self.counters.generated.load(Ordering::Relaxed)
    }

    /// Requests dropped after a compose or publish failure.
    pub fn failed(&self) -> u64 {
        self.counters.failed.load(Ordering::Relaxed)
    }

    /// Compose tasks still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting new work and wait for in-flight compose tasks.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        info!(
            generated = self.generated(),
            failed = self.failed(),
            "content agent drained"
        );
    }
}

impl Agent for ContentAgent {
    fn id(&self) -> &str {
        "content"
    }

    fn kinds(&self) -> &'static [TopicKind] {
        &[TopicKind::ContentRequested]
    }

    fn handle(&self, event: &InboundEvent) -> Result<(), AgentError> {
        let MeshEvent::ContentRequested(requested) = &event.event else {
            return Ok(());
        };
        if self.tracker.is_closed() {
            return Err(AgentError::Failed("content agent is shutting down".into()));
        }

        let request = ComposeRequest {
            child_id: requested.child_id.clone(),
            kind: requested.kind,
            prompt: requested.prompt.clone(),
        };
        let bus = self.bus.clone();
        let provider = self.provider.clone();
        let timeout = self.timeout;
        let counters = self.counters.clone();
        let envelope_id = event.envelope_id;

        self.tracker.spawn(async move {
            let result = match tokio::time::timeout(timeout, provider.compose(&request)).await {
                Ok(result) => result,
                Err(_) => Err(ComposeError::TimedOut(timeout)),
            };

            let composed = match result {
                Ok(composed) => composed,
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        envelope = %envelope_id,
                        child_id = %request.child_id,
                        provider = provider.name(),
                        error = %e,
                        "compose failed, request dropped"
                    );
                    return;
                }
            };

            let generated = MeshEvent::ContentGenerated(ContentGenerated {
                child_id: request.child_id.clone(),
                url: composed.url,
                model: composed.model,
                id: composed.asset_id,
            });
            match bus.emit(&generated) {
                Ok(()) => {
                    counters.generated.fetch_add(1, Ordering::Relaxed);
                    info!(envelope = %envelope_id, child_id = %request.child_id, "content generated");
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(envelope = %envelope_id, child_id = %request.child_id, error = %e, "publishing generated content failed");
                }
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::event::{ContentKind, ContentRequested};
    use crate::bus::transport::{Connector, LocalBroker};
    use crate::bus::{BusBuffers, BusSession};
    use crate::compose::providers::http::HttpComposeClient;
    use crate::compose::providers::placeholder::PlaceholderProvider;
    use crate::config::BusCredentials;

    fn creds() -> BusCredentials {
        BusCredentials {
            host: "local".into(),
            tenant: "test".into(),
            username: "mesh".into(),
            password: "secret".into(),
        }
    }

    fn requested(child: &str) -> InboundEvent {
        InboundEvent {
            envelope_id: uuid::Uuid::now_v7(),
            topic: format!("tinywins/{child}/content/requested"),
            child_id: child.into(),
            event: MeshEvent::ContentRequested(ContentRequested {
                child_id: child.into(),
                kind: ContentKind::Image,
                prompt: "sticker".into(),
            }),
        }
    }

    async fn session() -> BusSession {
        let broker = LocalBroker::new("mesh", "secret");
        let mut s = BusSession::connect(Connector::Local(broker), &creds(), BusBuffers::default())
            .await
            .unwrap();
        s.subscribe("tinywins/*/content/generated").await.unwrap();
        s
    }

    #[tokio::test]
    async fn success_publishes_one_generated_event() {
        let mut s = session().await;
        let mut inbound = s.take_inbound().unwrap();
        let agent = ContentAgent::new(
            s.handle(),
            ComposeProvider::Placeholder(PlaceholderProvider),
            Duration::from_secs(1),
        );

        agent.handle(&requested("c2")).unwrap();
        agent.shutdown().await;

        let env = inbound.recv().await.unwrap();
        assert_eq!(env.topic, "tinywins/c2/content/generated");
        let generated: ContentGenerated = serde_json::from_slice(&env.payload).unwrap();
        assert_eq!(generated.child_id, "c2");
        assert_eq!(generated.model, "gemini-2.5-flash-image");
        assert_eq!((agent.generated(), agent.failed()), (1, 0));
        tokio::task::yield_now().await;
        assert!(inbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn failure_publishes_nothing() {
        let mut s = session().await;
        let mut inbound = s.take_inbound().unwrap();
        let client = HttpComposeClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let agent = ContentAgent::new(s.handle(), ComposeProvider::Http(client), Duration::from_secs(2));

        agent.handle(&requested("c2")).unwrap();
        agent.shutdown().await;

        assert_eq!((agent.generated(), agent.failed()), (0, 1));
        tokio::task::yield_now().await;
        assert!(inbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn rejects_work_after_shutdown() {
        let s = session().await;
        let agent = ContentAgent::new(
            s.handle(),
            ComposeProvider::Placeholder(PlaceholderProvider),
            Duration::from_secs(1),
        );
        agent.shutdown().await;
        assert!(matches!(agent.handle(&requested("c2")), Err(AgentError::Failed(_))));
        assert_eq!(agent.in_flight(), 0);
    }
}
