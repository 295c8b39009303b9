//! Typed mesh payloads: one variant per [`TopicKind`].
//!
//! Payloads travel as UTF-8 JSON with camelCase field names. Decoding is the
//! mesh boundary: a payload that does not fit the variant for its topic kind,
//! leaves a required field empty, or names a different child than its topic
//! is rejected with a [`PayloadError`] and never reaches an agent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::topics::TopicKind;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not valid JSON for {kind}: {source}")]
    Json {
        kind: TopicKind,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid {kind} payload: {reason}")]
    Invalid { kind: TopicKind, reason: String },
}

// ── Enumerations ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressType {
    Try,
    Win,
    Streak,
    GameSession,
    VideoView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Image,
    Video,
    Comic,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Image => "image",
            ContentKind::Video => "video",
            ContentKind::Comic => "comic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeDomain {
    Food,
    Math,
    Behavior,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Pending,
    Active,
    Completed,
}

// ── Payload records ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeCreated {
    /// Challenge id. The REST API publishes the stored row, so `id` is the
    /// primary spelling; `challengeId` is accepted as well.
    #[serde(alias = "challengeId")]
    pub id: String,
    pub child_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<ChallengeDomain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ChallengeStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressLogged {
    pub child_id: String,
    pub challenge_id: String,
    #[serde(rename = "type")]
    pub progress_type: ProgressType,
    #[serde(default = "default_progress_value")]
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,
}

fn default_progress_value() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRequested {
    pub child_id: String,
    pub kind: ContentKind,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentGenerated {
    pub child_id: String,
    pub url: String,
    pub model: String,
    /// Asset id assigned by the compose service, when it reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardUnlocked {
    pub child_id: String,
    pub streak: u32,
    pub reward: String,
}

// ── MeshEvent ─────────────────────────────────────────────────────────────────

/// A decoded payload, tagged by the kind of topic it arrived on.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshEvent {
    ChallengeCreated(ChallengeCreated),
    ProgressLogged(ProgressLogged),
    ContentRequested(ContentRequested),
    ContentGenerated(ContentGenerated),
    RewardUnlocked(RewardUnlocked),
}

impl MeshEvent {
    pub fn kind(&self) -> TopicKind {
        match self {
            MeshEvent::ChallengeCreated(_) => TopicKind::ChallengeCreated,
            MeshEvent::ProgressLogged(_) => TopicKind::ProgressLogged,
            MeshEvent::ContentRequested(_) => TopicKind::ContentRequested,
            MeshEvent::ContentGenerated(_) => TopicKind::ContentGenerated,
            MeshEvent::RewardUnlocked(_) => TopicKind::RewardUnlocked,
        }
    }

    pub fn child_id(&self) -> &str {
        match self {
            MeshEvent::ChallengeCreated(p) => &p.child_id,
            MeshEvent::ProgressLogged(p) => &p.child_id,
            MeshEvent::ContentRequested(p) => &p.child_id,
            MeshEvent::ContentGenerated(p) => &p.child_id,
            MeshEvent::RewardUnlocked(p) => &p.child_id,
        }
    }

    /// Decode and validate a payload that arrived on a topic of `kind` for
    /// `topic_child_id`.
    pub fn decode(kind: TopicKind, topic_child_id: &str, bytes: &[u8]) -> Result<Self, PayloadError> {
        let json = |source| PayloadError::Json { kind, source };
        let event = match kind {
            TopicKind::ChallengeCreated => {
                MeshEvent::ChallengeCreated(serde_json::from_slice(bytes).map_err(json)?)
            }
            TopicKind::ProgressLogged => {
                MeshEvent::ProgressLogged(serde_json::from_slice(bytes).map_err(json)?)
            }
            TopicKind::ContentRequested => {
                MeshEvent::ContentRequested(serde_json::from_slice(bytes).map_err(json)?)
            }
            TopicKind::ContentGenerated => {
                MeshEvent::ContentGenerated(serde_json::from_slice(bytes).map_err(json)?)
            }
            TopicKind::RewardUnlocked => {
                MeshEvent::RewardUnlocked(serde_json::from_slice(bytes).map_err(json)?)
            }
        };
        event.validate(topic_child_id)?;
        Ok(event)
    }

    /// Serialize to the JSON bytes carried on the wire.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            MeshEvent::ChallengeCreated(p) => serde_json::to_vec(p),
            MeshEvent::ProgressLogged(p) => serde_json::to_vec(p),
            MeshEvent::ContentRequested(p) => serde_json::to_vec(p),
            MeshEvent::ContentGenerated(p) => serde_json::to_vec(p),
            MeshEvent::RewardUnlocked(p) => serde_json::to_vec(p),
        }
    }

    fn validate(&self, topic_child_id: &str) -> Result<(), PayloadError> {
        let kind = self.kind();
        let invalid = |reason: String| Err(PayloadError::Invalid { kind, reason });

        if self.child_id() != topic_child_id {
            return invalid(format!(
                "childId {:?} does not match topic child {topic_child_id:?}",
                self.child_id()
            ));
        }

        let blank = |value: &str| value.trim().is_empty();
        let empty_field = match self {
            MeshEvent::ChallengeCreated(p) => blank(&p.id).then_some("id"),
            MeshEvent::ProgressLogged(p) => blank(&p.challenge_id).then_some("challengeId"),
            MeshEvent::ContentRequested(p) => blank(&p.prompt).then_some("prompt"),
            MeshEvent::ContentGenerated(p) => {
                if blank(&p.url) {
                    Some("url")
                } else {
                    blank(&p.model).then_some("model")
                }
            }
            MeshEvent::RewardUnlocked(p) => blank(&p.reward).then_some("reward"),
        };
        match empty_field {
            Some(field) => invalid(format!("{field} must not be empty")),
            None => Ok(()),
        }
    }
}
