//! Dispatcher: feeds every inbound envelope to every registered agent.
//!
//! Each envelope is parsed and decoded once at the boundary; agents receive
//! the typed [`InboundEvent`] in registration order. An agent that returns an
//! error or panics is logged and counted, and the remaining agents still see
//! the same event. Malformed envelopes are dropped before any agent runs.
//!
//! Agents are invoked synchronously, one after another. An agent whose work
//! involves an external call spawns it as a background task so the next
//! envelope is never held up.

use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::bus::{BusError, Envelope, MeshEvent};
use crate::topics::{TopicKind, parse_topic};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error("{0}")]
    Failed(String),
}

/// A decoded envelope, as agents see it.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub envelope_id: Uuid,
    pub topic: String,
    pub child_id: String,
    pub event: MeshEvent,
}

/// A reactive handler registered with the [`Dispatcher`].
///
/// Every agent receives every event; filtering by kind is the agent's job.
pub trait Agent: Send + Sync {
    /// Unique id, used in logs. The dispatcher panics on duplicates.
    fn id(&self) -> &str;

    /// Topic kinds this agent reacts to. Drives the session's subscriptions.
    fn kinds(&self) -> &'static [TopicKind] {
        &TopicKind::ALL
    }

    /// Must not block: long-running work belongs in a spawned task.
    fn handle(&self, event: &InboundEvent) -> Result<(), AgentError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every agent was called; `failed_agents` lists those that errored or panicked.
    Delivered { failed_agents: Vec<String> },
    DroppedTopic,
    DroppedPayload,
}

#[derive(Debug, Default)]
pub struct DispatchStats {
    delivered: AtomicU64,
    dropped_topic: AtomicU64,
    dropped_payload: AtomicU64,
    agent_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub delivered: u64,
    pub dropped_topic: u64,
    pub dropped_payload: u64,
    pub agent_failures: u64,
}

impl DispatchStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped_topic: self.dropped_topic.load(Ordering::Relaxed),
            dropped_payload: self.dropped_payload.load(Ordering::Relaxed),
            agent_failures: self.agent_failures.load(Ordering::Relaxed),
        }
    }
}

pub struct Dispatcher {
    agents: Vec<Arc<dyn Agent>>,
    stats: DispatchStats,
}

impl Dispatcher {
    /// # Panics
    ///
    /// Panics if two agents share an id, a wiring error that must surface
    /// before the mesh starts consuming.
    pub fn new(agents: Vec<Arc<dyn Agent>>) -> Self {
        let mut seen = HashSet::new();
        for agent in &agents {
            if !seen.insert(agent.id().to_string()) {
                panic!("duplicate agent id registered: {:?}", agent.id());
            }
        }
        info!(
            agents = ?agents.iter().map(|a| a.id()).collect::<Vec<_>>(),
            "dispatcher ready"
        );
        Self {
            agents,
            stats: DispatchStats::default(),
        }
    }

    /// Union of every agent's kinds, in [`TopicKind::ALL`] order.
    pub fn kinds(&self) -> Vec<TopicKind> {
        TopicKind::ALL
            .into_iter()
            .filter(|kind| self.agents.iter().any(|a| a.kinds().contains(kind)))
            .collect()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn dispatch(&self, envelope: &Envelope) -> DispatchOutcome {
        let Some(parsed) = parse_topic(&envelope.topic) else {
            warn!(envelope = %envelope.id, topic = %envelope.topic, "dropping envelope: unrecognised topic");
            self.stats.dropped_topic.fetch_add(1, Ordering::Relaxed);
            return DispatchOutcome::DroppedTopic;
        };

        let event = match MeshEvent::decode(parsed.kind, &parsed.child_id, &envelope.payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(envelope = %envelope.id, topic = %envelope.topic, error = %e, "dropping envelope: bad payload");
                self.stats.dropped_payload.fetch_add(1, Ordering::Relaxed);
                return DispatchOutcome::DroppedPayload;
            }
        };

        let inbound = InboundEvent {
            envelope_id: envelope.id,
            topic: envelope.topic.clone(),
            child_id: parsed.child_id,
            event,
        };
        debug!(envelope = %inbound.envelope_id, topic = %inbound.topic, "dispatching");

        let mut failed_agents = Vec::new();
        for agent in &self.agents {
            match catch_unwind(AssertUnwindSafe(|| agent.handle(&inbound))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(agent = agent.id(), topic = %inbound.topic, error = %e, "agent failed");
                    failed_agents.push(agent.id().to_string());
                }
                Err(panic) => {
                    error!(
                        agent = agent.id(),
                        topic = %inbound.topic,
                        panic = panic_message(panic.as_ref()),
                        "agent panicked"
                    );
                    failed_agents.push(agent.id().to_string());
                }
            }
        }

        self.stats.delivered.fetch_add(1, Ordering::Relaxed);
        self.stats
            .agent_failures
            .fetch_add(failed_agents.len() as u64, Ordering::Relaxed);
        DispatchOutcome::Delivered { failed_agents }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}

/// Drain `inbound` into the dispatcher until `shutdown` is cancelled or the
/// session drops its sender.
pub async fn run(dispatcher: &Dispatcher, mut inbound: mpsc::Receiver<Envelope>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("dispatcher shutting down");
                break;
            }

            envelope = inbound.recv() => {
                match envelope {
                    Some(envelope) => {
                        dispatcher.dispatch(&envelope);
                    }
                    None => {
                        info!("inbound queue closed, dispatcher exiting");
                        break;
                    }
                }
            }
        }
    }

    let stats = dispatcher.stats();
    info!(
        delivered = stats.delivered,
        dropped_topic = stats.dropped_topic,
        dropped_payload = stats.dropped_payload,
        agent_failures = stats.agent_failures,
        "dispatch stats"
    );
}
