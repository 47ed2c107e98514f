//! Stream consumption for agent invocations.
//!
//! [`classify`] turns one inbound fragment into a deterministic kind;
//! [`StreamProcessor`] drives a whole invocation's event stream, fanning out
//! live updates and persisting snapshots.

pub mod classify;
pub mod processor;

pub use classify::{FragmentKind, classify};
pub use processor::StreamProcessor;
