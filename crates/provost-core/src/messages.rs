//! Conversation messages: roles, content payloads, and the window.
//!
//! A session's history is an append-only sequence of [`Message`]s. The
//! payload is one of three shapes: plain text, a batch of tool calls
//! requested by the model, or the batch of results answering them. Calls
//! and their results are always grouped per turn — every call in a `model`
//! message is answered by exactly one result in the following `function`
//! message before the model is consulted again.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tools::OperationOutcome;

/// Who produced a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The portal user (or a synthetic continuation turn).
    User,
    /// The language model.
    Model,
    /// Tool results fed back to the model.
    Function,
}

impl Role {
    /// Wire/storage name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
            Self::Function => "function",
        }
    }

    /// Parse a storage name. Unknown names are a data error, not a default.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "model" => Some(Self::Model),
            "function" => Some(Self::Function),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool invocation requested by the model. Scoped to exactly one turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    /// Call ID (`call_` prefix), assigned when the gateway response is parsed.
    pub id: String,
    /// Wire name of the tool.
    pub name: String,
    /// Argument map as produced by the model.
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// Create a new tool call.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// The answer to one [`ToolCall`], matched by `name` (not position).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    /// ID of the call this result answers.
    pub call_id: String,
    /// Tool name, echoed for name-based matching.
    pub name: String,
    /// Uniform domain-operation envelope.
    pub outcome: OperationOutcome,
}

/// Message payload. Stored as tagged JSON; opaque to the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain text (`user` turns and terminating `model` turns).
    Text {
        /// The text body.
        text: String,
    },
    /// Tool calls requested by the model in one turn.
    ToolCalls {
        /// All calls of the turn, in model order.
        calls: Vec<ToolCall>,
    },
    /// Results answering the previous `tool_calls` message.
    ToolResults {
        /// One result per call, in call order.
        results: Vec<ToolResult>,
    },
}

impl MessageContent {
    /// Text body, if this is a text payload.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// One entry in a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Producer of the message.
    pub role: Role,
    /// Payload.
    pub content: MessageContent,
}

impl Message {
    /// A user text turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text { text: text.into() },
        }
    }

    /// A model text turn.
    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: MessageContent::Text { text: text.into() },
        }
    }

    /// A model turn consisting of tool calls.
    #[must_use]
    pub fn model_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Model,
            content: MessageContent::ToolCalls { calls },
        }
    }

    /// A function turn grouping all results of the preceding call batch.
    #[must_use]
    pub fn function_results(results: Vec<ToolResult>) -> Self {
        Self {
            role: Role::Function,
            content: MessageContent::ToolResults { results },
        }
    }
}

/// A message as persisted by the session store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    /// Message ID (`msg_` prefix).
    pub id: String,
    /// Owning session.
    pub session_id: String,
    /// Position in the session log. Dense, starting at 0.
    pub seq: i64,
    /// Producer.
    pub role: Role,
    /// Payload.
    pub content: MessageContent,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
}

impl From<StoredMessage> for Message {
    fn from(m: StoredMessage) -> Self {
        Self {
            role: m.role,
            content: m.content,
        }
    }
}

/// The complete ordered history submitted to the model gateway.
///
/// INVARIANT: the gateway is stateless per call, so the window always holds
/// the *entire* history — never a delta — and stays in lockstep with the
/// persisted log (no call is made with a window that omits persisted
/// messages).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationWindow {
    messages: Vec<Message>,
}

impl ConversationWindow {
    /// Empty window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconstruct a window from the persisted log, in `seq` order.
    #[must_use]
    pub fn from_history(history: Vec<StoredMessage>) -> Self {
        Self {
            messages: history.into_iter().map(Message::from).collect(),
        }
    }

    /// Append a message. Mirrors every store append within a run.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// All messages in order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str) -> ToolCall {
        let mut args = Map::new();
        let _ = args.insert("name".into(), json!("Physics"));
        ToolCall::new("call_1", name, args)
    }

    #[test]
    fn role_round_trips_through_storage_names() {
        for role in [Role::User, Role::Model, Role::Function] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn role_rejects_unknown_name() {
        assert_eq!(Role::parse("assistant"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn content_serializes_with_kind_tag() {
        let content = MessageContent::ToolCalls {
            calls: vec![call("create_program")],
        };
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(value["kind"], "tool_calls");
        assert_eq!(value["calls"][0]["name"], "create_program");
    }

    #[test]
    fn content_text_round_trip() {
        let content = MessageContent::Text {
            text: "[P]Hello[/P]".into(),
        };
        let json = serde_json::to_string(&content).unwrap();
        let back: MessageContent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, content);
        assert_eq!(back.as_text(), Some("[P]Hello[/P]"));
    }

    #[test]
    fn as_text_is_none_for_structured_payloads() {
        let content = MessageContent::ToolResults { results: vec![] };
        assert!(content.as_text().is_none());
    }

    #[test]
    fn window_from_history_preserves_order() {
        let history = vec![
            StoredMessage {
                id: "msg_1".into(),
                session_id: "ses_1".into(),
                seq: 0,
                role: Role::Model,
                content: MessageContent::Text {
                    text: "greeting".into(),
                },
                created_at: "2026-01-01T00:00:00Z".into(),
            },
            StoredMessage {
                id: "msg_2".into(),
                session_id: "ses_1".into(),
                seq: 1,
                role: Role::User,
                content: MessageContent::Text {
                    text: "prompt".into(),
                },
                created_at: "2026-01-01T00:00:01Z".into(),
            },
        ];
        let window = ConversationWindow::from_history(history);
        assert_eq!(window.len(), 2);
        assert_eq!(window.messages()[0].role, Role::Model);
        assert_eq!(window.messages()[1].role, Role::User);
    }

    #[test]
    fn window_push_appends() {
        let mut window = ConversationWindow::new();
        assert!(window.is_empty());
        window.push(Message::user("hi"));
        window.push(Message::model_calls(vec![call("list_programs")]));
        assert_eq!(window.len(), 2);
        assert_eq!(window.messages()[1].role, Role::Model);
    }
}
