//! Topic scheme: canonical topic strings for every mesh event.
//!
//! Grammar: `tinywins/<childId>/<category>/<action>`, where
//! `<category>/<action>` is one of the [`TopicKind`] suffixes and `<childId>`
//! is an opaque, non-empty identifier with no `/`.
//!
//! Subscriptions use the same grammar with [`WILDCARD`] in the child slot,
//! one pattern per kind family (never one per concrete child).

use std::fmt;

/// First level of every mesh topic.
pub const ROOT: &str = "tinywins";

/// Single-level wildcard. Child ids never contain a level separator, so one
/// level is enough to select a whole kind family.
pub const WILDCARD: &str = "*";

/// Multi-level wildcard; only valid as the last level of a pattern.
pub const MULTI_WILDCARD: &str = ">";

/// Pattern matching every mesh topic (used by the console observer).
pub const ALL_TOPICS: &str = "tinywins/>";

/// The fixed set of `<category>/<action>` suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicKind {
    ChallengeCreated,
    ProgressLogged,
    ContentRequested,
    ContentGenerated,
    RewardUnlocked,
}

impl TopicKind {
    pub const ALL: [TopicKind; 5] = [
        TopicKind::ChallengeCreated,
        TopicKind::ProgressLogged,
        TopicKind::ContentRequested,
        TopicKind::ContentGenerated,
        TopicKind::RewardUnlocked,
    ];

    /// The `<category>/<action>` suffix.
    pub fn as_str(self) -> &'static str {
        match self {
            TopicKind::ChallengeCreated => "challenge/created",
            TopicKind::ProgressLogged => "progress/logged",
            TopicKind::ContentRequested => "content/requested",
            TopicKind::ContentGenerated => "content/generated",
            TopicKind::RewardUnlocked => "reward/unlocked",
        }
    }

    fn from_levels(category: &str, action: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| {
            kind.as_str()
                .split_once('/')
                .is_some_and(|(c, a)| c == category && a == action)
        })
    }
}

impl fmt::Display for TopicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A topic split back into its child id and kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTopic {
    pub child_id: String,
    pub kind: TopicKind,
}

/// Build the canonical topic for `(child_id, kind)`.
///
/// Passing [`WILDCARD`] as `child_id` yields the subscription pattern for
/// the whole kind family.
pub fn topic_for(child_id: &str, kind: TopicKind) -> String {
    format!("{ROOT}/{child_id}/{}", kind.as_str())
}

/// Subscription pattern covering `kind` for every child.
pub fn subscription_for(kind: TopicKind) -> String {
    topic_for(WILDCARD, kind)
}

/// Parse a concrete topic. Returns `None` for anything outside the grammar,
/// including wildcard child ids, empty levels and extra levels.
pub fn parse_topic(topic: &str) -> Option<ParsedTopic> {
    let mut levels = topic.split('/');
    let (root, child_id, category, action) =
        (levels.next()?, levels.next()?, levels.next()?, levels.next()?);
    if levels.next().is_some() || root != ROOT || !is_child_id(child_id) {
        return None;
    }
    let kind = TopicKind::from_levels(category, action)?;
    Some(ParsedTopic { child_id: child_id.to_string(), kind })
}

/// Whether `pattern` is a subscription pattern the mesh accepts:
/// `tinywins/>`, `tinywins/<child|*>/>` or `tinywins/<child|*>/<category>/<action>`.
pub fn is_mesh_pattern(pattern: &str) -> bool {
    let levels: Vec<&str> = pattern.split('/').collect();
    if levels.first() != Some(&ROOT) {
        return false;
    }
    let child_ok = |level: &str| level == WILDCARD || is_child_id(level);
    match levels.as_slice() {
        [_, MULTI_WILDCARD] => true,
        [_, child, MULTI_WILDCARD] => child_ok(child),
        [_, child, category, action] => {
            child_ok(child) && TopicKind::from_levels(category, action).is_some()
        }
        _ => false,
    }
}

/// Level-wise match of `topic` against `pattern`.
///
/// `*` matches exactly one level; `>` matches one or more trailing levels
/// and is only honoured in the last position.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let mut pattern_levels = pattern.split('/').peekable();
    let mut topic_levels = topic.split('/');

    while let Some(p) = pattern_levels.next() {
        if p == MULTI_WILDCARD && pattern_levels.peek().is_none() {
            return topic_levels.next().is_some();
        }
        match topic_levels.next() {
            Some(t) if p == WILDCARD || p == t => {}
            _ => return false,
        }
    }
    topic_levels.next().is_none()
}

fn is_child_id(level: &str) -> bool {
    !level.is_empty() && level != WILDCARD && level != MULTI_WILDCARD
}
