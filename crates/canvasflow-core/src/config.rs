//! Runtime policy configuration injected at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Tools whose start events are suppressed from the stream.
///
/// Tools on this list drive their own confirmation flow and emit their own
/// events; the stream processor stays silent about them. The set is supplied
/// by the deployment's configuration, never hard-coded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolConfirmationPolicy {
    tools: HashSet<String>,
}

impl ToolConfirmationPolicy {
    pub fn new(tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            tools: tools.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the named tool handles its own confirmation events.
    pub fn requires_confirmation(&self, tool_name: &str) -> bool {
        self.tools.contains(tool_name)
    }
}
