//! Mesh agents.
//!
//! Each agent implements [`crate::dispatch::Agent`] and filters the events it
//! cares about by kind. Agents own their state; nothing is shared between
//! them.
//!
//! - **planner**: logs new challenges; seam for microstep planning.
//! - **content**: turns content requests into compose calls and publishes
//!   the generated asset.
//! - **analytics**: counts wins per child and unlocks rewards.

pub mod analytics;
pub mod content;
pub mod planner;

pub use analytics::AnalyticsAgent;
pub use content::ContentAgent;
pub use planner::PlannerAgent;
