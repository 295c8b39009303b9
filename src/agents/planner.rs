//! Planner agent: records new challenges.
//!
//! Microstep decomposition will hang off this agent; today it only logs the
//! (child, challenge) pair and holds no state.

use tracing::info;

use crate::bus::MeshEvent;
use crate::dispatch::{Agent, AgentError, InboundEvent};
use crate::topics::TopicKind;

pub struct PlannerAgent;

impl Agent for PlannerAgent {
    fn id(&self) -> &str {
        "planner"
    }

    fn kinds(&self) -> &'static [TopicKind] {
        &[TopicKind::ChallengeCreated]
    }

    fn handle(&self, event: &InboundEvent) -> Result<(), AgentError> {
        let MeshEvent::ChallengeCreated(challenge) = &event.event else {
            return Ok(());
        };
        info!(
            child_id = %challenge.child_id,
            challenge_id = %challenge.id,
            domain = ?challenge.domain,
            title = challenge.title.as_deref().unwrap_or(""),
            "challenge created, planning microsteps"
        );
        Ok(())
    }
}
