//! Analytics agent: win streaks and reward unlocks.
//!
//! Counts `win` progress events per child. Every [`REWARD_EVERY`]th win
//! publishes a `reward/unlocked` event carrying the new count. Counters live
//! for the life of the process only.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::{debug, info};

use crate::bus::event::{ProgressType, RewardUnlocked};
use crate::bus::{BusHandle, MeshEvent};
use crate::dispatch::{Agent, AgentError, InboundEvent};
use crate::topics::TopicKind;

pub const REWARD_EVERY: u32 = 3;
pub const REWARD_NAME: &str = "bronze-star";

pub struct AnalyticsAgent {
    bus: BusHandle,
    streaks: Mutex<HashMap<String, u32>>,
}

impl AnalyticsAgent {
    pub fn new(bus: BusHandle) -> Self {
        Self {
            bus,
            streaks: Mutex::new(HashMap::new()),
        }
    }

    /// Current win count for `child_id` (0 if never seen).
    pub fn streak(&self, child_id: &str) -> u32 {
        self.lock().get(child_id).copied().unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, u32>> {
        self.streaks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Bump the child's counter, returning the new value.
    fn record_win(&self, child_id: &str) -> u32 {
        let mut streaks = self.lock();
        let count = streaks.entry(child_id.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }
}

impl Agent for AnalyticsAgent {
    fn id(&self) -> &str {
        "analytics"
    }

    fn kinds(&self) -> &'static [TopicKind] {
        &[TopicKind::ProgressLogged]
    }

    fn handle(&self, event: &InboundEvent) -> Result<(), AgentError> {
        let MeshEvent::ProgressLogged(progress) = &event.event else {
            return Ok(());
        };
        if progress.progress_type != ProgressType::Win {
            debug!(child_id = %progress.child_id, kind = ?progress.progress_type, "progress observed");
            return Ok(());
        }

        let streak = self.record_win(&progress.child_id);
        debug!(child_id = %progress.child_id, streak, "win recorded");

        if streak % REWARD_EVERY == 0 {
            self.bus.emit(&MeshEvent::RewardUnlocked(RewardUnlocked {
                child_id: progress.child_id.clone(),
                streak,
                reward: REWARD_NAME.to_string(),
            }))?;
            info!(child_id = %progress.child_id, streak, reward = REWARD_NAME, "reward unlocked");
        }
        Ok(())
    }
}
