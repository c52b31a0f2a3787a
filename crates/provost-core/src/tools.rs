//! Tool declarations and the uniform domain-operation envelope.
//!
//! Every backend operation reachable through a tool returns an
//! [`OperationOutcome`]: `{success, data?, error?}`. A `success: false`
//! outcome is a *business* failure — it is fed back to the model as a
//! function result and the conversation continues. Unexpected failures are
//! not expressed in this envelope at all; they surface as errors and abort
//! the run.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Uniform result envelope for portal domain operations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationOutcome {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Operation payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Human-readable reason on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationOutcome {
    /// A successful outcome carrying `data`.
    #[must_use]
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// A business failure carrying a reason the model can act on.
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Schema entry advertised to the model for one tool.
///
/// Declarations are derived from the registry that dispatches the calls, so
/// the advertised schema and the executable tool set cannot drift apart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    /// Wire name of the tool.
    pub name: String,
    /// What the tool does, phrased for the model.
    pub description: String,
    /// JSON-schema object describing the argument shape.
    pub parameters: Value,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_outcome_has_data_no_error() {
        let outcome = OperationOutcome::ok(json!({"id": "prog_1"}));
        assert!(outcome.success);
        assert_eq!(outcome.data.unwrap()["id"], "prog_1");
        assert!(outcome.error.is_none());
    }

    #[test]
    fn rejected_outcome_has_error_no_data() {
        let outcome = OperationOutcome::rejected("duplicate program code");
        assert!(!outcome.success);
        assert!(outcome.data.is_none());
        assert_eq!(outcome.error.as_deref(), Some("duplicate program code"));
    }

    #[test]
    fn none_fields_are_omitted_on_the_wire() {
        let outcome = OperationOutcome::rejected("nope");
        let value = serde_json::to_value(&outcome).unwrap();
        assert!(value.get("data").is_none());
        assert_eq!(value["error"], "nope");
    }

    #[test]
    fn declaration_round_trip() {
        let decl = ToolDeclaration {
            name: "create_program".into(),
            description: "Create a degree program".into(),
            parameters: json!({
                "type": "object",
                "properties": {"name": {"type": "string"}},
                "required": ["name"],
            }),
        };
        let json = serde_json::to_string(&decl).unwrap();
        let back: ToolDeclaration = serde_json::from_str(&json).unwrap();
        assert_eq!(back, decl);
    }
}
