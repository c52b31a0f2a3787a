//! The markup protocol spoken by the model.
//!
//! Persona instructions ask the model to wrap its prose in paired textual
//! markers (paragraphs, lists, emphasis) and to end a conversation with one
//! of two control sentinels. The markers are a *soft* protocol: nothing
//! validates pairing or nesting — malformed output is a prompting concern,
//! and the text is passed through to the client untouched.
//!
//! The two sentinels are control flow, not formatting:
//!
//! - [`SENTINEL_AWAIT_INPUT`] — the model needs more information from the
//!   user before it can proceed.
//! - [`SENTINEL_COMPLETE`] — the task is done.
//!
//! Both terminate the loop, but they mean different things to the client,
//! so detection maps them to distinct [`ControlSignal`] variants instead of
//! collapsing them into one stop flag.

use serde::{Deserialize, Serialize};

/// Paragraph open marker.
pub const P_OPEN: &str = "[P]";
/// Paragraph close marker.
pub const P_CLOSE: &str = "[/P]";
/// List open marker.
pub const LIST_OPEN: &str = "[LIST]";
/// List close marker.
pub const LIST_CLOSE: &str = "[/LIST]";
/// List item marker.
pub const ITEM: &str = "[ITEM]";
/// Emphasis open marker.
pub const BOLD_OPEN: &str = "[B]";
/// Emphasis close marker.
pub const BOLD_CLOSE: &str = "[/B]";

/// Sentinel: pause, the model needs more input from the user.
pub const SENTINEL_AWAIT_INPUT: &str = "[AWAITING_INPUT]";
/// Sentinel: the conversation is complete.
pub const SENTINEL_COMPLETE: &str = "[CONVERSATION_COMPLETE]";

/// Typed form of the two control sentinels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlSignal {
    /// The model paused for more user input.
    AwaitInput,
    /// The model declared the conversation complete.
    Complete,
}

/// Scan model text for a control sentinel.
///
/// Detection is tolerant substring search: the sentinel may appear anywhere
/// in the text, surrounded by arbitrary markup. When both sentinels appear,
/// `Complete` wins — a model that says it is done and also asks for input
/// has ended the task.
#[must_use]
pub fn detect_control_signal(text: &str) -> Option<ControlSignal> {
    if text.contains(SENTINEL_COMPLETE) {
        return Some(ControlSignal::Complete);
    }
    if text.contains(SENTINEL_AWAIT_INPUT) {
        return Some(ControlSignal::AwaitInput);
    }
    None
}

/// The markup contract fragment appended to every persona instruction.
#[must_use]
pub fn markup_instructions() -> String {
    format!(
        "Format every reply with these markers: wrap each paragraph in \
         {P_OPEN}...{P_CLOSE}, wrap lists in {LIST_OPEN}...{LIST_CLOSE} with each entry \
         prefixed by {ITEM}, and wrap emphasized phrases in {BOLD_OPEN}...{BOLD_CLOSE}. \
         When you need more information from the user before you can continue, end \
         your reply with {SENTINEL_AWAIT_INPUT}. When the user's request has been \
         fully handled, end your reply with {SENTINEL_COMPLETE}."
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
