//! TinyWins agent mesh.
//!
//! Independent agents react to domain events published on a hierarchical
//! topic bus (`tinywins/<childId>/<category>/<action>`):
//!
//! - **topics**: topic grammar, wildcard patterns, parsing.
//! - **bus**: typed payloads, the session, and its transports.
//! - **dispatch**: fan-out of each inbound envelope to every agent.
//! - **agents**: planner, content and analytics agents.
//! - **compose**: the external content-generation call.
//! - **console**: stdin driver for local runs.

pub mod agents;
pub mod bus;
pub mod compose;
pub mod config;
pub mod console;
pub mod dispatch;
pub mod error;
pub mod logger;
pub mod topics;
