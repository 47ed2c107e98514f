//! Canvasflow Core - session orchestration for a streaming agent backend.
//!
//! This crate consumes the incremental event stream of an agent invocation,
//! reconstructs well-formed chat messages from fragments, persists them
//! exactly once into a per-session log, and broadcasts live updates to
//! connected observers. Turns are tracked in a task registry so a concurrent
//! cancellation request can stop generation without corrupting the log.
//!
//! The agent execution graph itself (prompt construction, tool selection,
//! model invocation) is an external collaborator behind the
//! [`agent::AgentInvoker`] trait.

pub mod agent;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod registry;
pub mod storage;
pub mod stream;

pub use error::{CoreError, Result};
pub use models::*;
