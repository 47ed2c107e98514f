//! Deterministic classification of inbound message fragments.
//!
//! The agent graph does not tag fragment kinds explicitly; a fragment is
//! recognized by which fields it carries. The checks run in a fixed priority
//! order so a fragment always maps to exactly one kind.

use crate::models::MessageFragment;

/// What one fragment contributes to the in-flight turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    /// A finished tool invocation's result.
    ToolResult,
    /// A slice of rendered assistant text.
    Text,
    /// A newly named tool call.
    ToolCallStart,
    /// Streamed tool-call argument text.
    ToolCallArguments,
    /// Nothing usable; ignored.
    Empty,
}

/// Classify a fragment, testing in priority order:
/// tool result, non-empty text, named tool call, argument chunk.
pub fn classify(fragment: &MessageFragment) -> FragmentKind {
    if fragment.tool_result.is_some() {
        return FragmentKind::ToolResult;
    }
    if fragment.text.as_deref().is_some_and(|text| !text.is_empty()) {
        return FragmentKind::Text;
    }
    if fragment.tool_calls.iter().any(|call| !call.name.is_empty()) {
        return FragmentKind::ToolCallStart;
    }
    if !fragment.tool_call_chunks.is_empty() {
        return FragmentKind::ToolCallArguments;
    }
    FragmentKind::Empty
}
