//! Gemini `generateContent` gateway.
//!
//! Non-streaming: one POST per turn carrying the entire window. The wire
//! roles are `user` / `model` / `function`, matching the persisted log
//! one-to-one, so conversion is mechanical: text payloads become text
//! parts, call batches become `functionCall` parts, result batches become
//! `functionResponse` parts.

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument};

use provost_core::ids::new_call_id;
use provost_core::messages::{ConversationWindow, Message, MessageContent, Role, ToolCall};
use provost_core::tools::ToolDeclaration;

use crate::{GatewayError, GatewayResult, ModelGateway, ModelTurn};

/// Gemini gateway configuration.
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    /// Model identifier (e.g. `gemini-2.0-flash`).
    pub model: String,
    /// Service base URL.
    pub base_url: String,
    /// API key, sent via the `x-goog-api-key` header.
    pub api_key: String,
}

/// Gemini model gateway.
pub struct GeminiGateway {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiGateway {
    /// Create a new gateway.
    #[must_use]
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Create a new gateway with a shared HTTP client.
    #[must_use]
    pub fn with_client(config: GeminiConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Convert the window into Gemini `contents`.
    fn build_contents(window: &ConversationWindow) -> Vec<ContentEntry> {
        window.messages().iter().map(Self::convert_message).collect()
    }

    fn convert_message(message: &Message) -> ContentEntry {
        let role = match message.role {
            Role::User => "user",
            Role::Model => "model",
            Role::Function => "function",
        };
        let parts = match &message.content {
            MessageContent::Text { text } => vec![Part {
                text: Some(text.clone()),
                function_call: None,
                function_response: None,
            }],
            MessageContent::ToolCalls { calls } => calls
                .iter()
                .map(|call| Part {
                    text: None,
                    function_call: Some(FunctionCallPart {
                        name: call.name.clone(),
                        args: Value::Object(call.arguments.clone()),
                    }),
                    function_response: None,
                })
                .collect(),
            MessageContent::ToolResults { results } => results
                .iter()
                .map(|result| Part {
                    text: None,
                    function_call: None,
                    function_response: Some(FunctionResponsePart {
                        name: result.name.clone(),
                        response: serde_json::to_value(&result.outcome).unwrap_or_default(),
                    }),
                })
                .collect(),
        };
        ContentEntry {
            role: Some(role.into()),
            parts,
        }
    }

    fn build_request(
        &self,
        window: &ConversationWindow,
        tools: &[ToolDeclaration],
        instructions: &str,
    ) -> GenerateContentRequest {
        let tools = if tools.is_empty() {
            None
        } else {
            Some(vec![ToolsEntry {
                function_declarations: tools
                    .iter()
                    .map(|decl| FunctionDeclarationEntry {
                        name: decl.name.clone(),
                        description: decl.description.clone(),
                        parameters: decl.parameters.clone(),
                    })
                    .collect(),
            }])
        };
        GenerateContentRequest {
            system_instruction: Some(ContentEntry {
                role: None,
                parts: vec![Part {
                    text: Some(instructions.to_string()),
                    function_call: None,
                    function_response: None,
                }],
            }),
            contents: Self::build_contents(window),
            tools,
        }
    }

    /// Partition a response into function-call parts and text parts.
    fn partition_response(response: &GenerateContentResponse) -> ModelTurn {
        let mut turn = ModelTurn::default();
        let Some(candidate) = response.candidates.first() else {
            return turn;
        };
        let Some(content) = &candidate.content else {
            return turn;
        };
        for part in &content.parts {
            if let Some(call) = &part.function_call {
                let arguments = match &call.args {
                    Value::Object(map) => map.clone(),
                    _ => serde_json::Map::new(),
                };
                turn.function_calls
                    .push(ToolCall::new(new_call_id(), call.name.clone(), arguments));
            } else if let Some(text) = &part.text {
                if !text.is_empty() {
                    turn.text_parts.push(text.clone());
                }
            }
        }
        turn
    }

    async fn post(&self, request: &GenerateContentRequest) -> GatewayResult<GenerateContentResponse> {
        let start = Instant::now();
        counter!("gateway_requests_total", "model" => self.config.model.clone()).increment(1);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = extract_error_message(&body);
            counter!("gateway_errors_total", "status" => status.as_u16().to_string()).increment(1);
            error!(status = status.as_u16(), %message, "gateway API error");
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(GatewayError::RateLimited { message });
            }
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed = response.json::<GenerateContentResponse>().await?;
        histogram!("gateway_request_duration_seconds", "model" => self.config.model.clone())
            .record(start.elapsed().as_secs_f64());
        Ok(parsed)
    }
}

#[async_trait]
impl ModelGateway for GeminiGateway {
    #[instrument(skip_all, fields(model = %self.config.model, window_len = window.len()))]
    async fn send_turn(
        &self,
        window: &ConversationWindow,
        tools: &[ToolDeclaration],
        instructions: &str,
        cancel: &CancellationToken,
    ) -> GatewayResult<ModelTurn> {
        let request = self.build_request(window, tools, instructions);
        debug!(
            contents = request.contents.len(),
            has_tools = request.tools.is_some(),
            "sending generateContent request"
        );

        let response = tokio::select! {
            () = cancel.cancelled() => return Err(GatewayError::Cancelled),
            result = self.post(&request) => result?,
        };

        let turn = Self::partition_response(&response);
        debug!(
            calls = turn.function_calls.len(),
            text_parts = turn.text_parts.len(),
            "generateContent response partitioned"
        );
        Ok(turn)
    }

    #[instrument(skip_all, fields(model = %self.config.model))]
    async fn generate_title(&self, prompt: &str) -> GatewayResult<String> {
        let mut window = ConversationWindow::new();
        window.push(Message::user(format!(
            "Suggest a concise title (six words or fewer, plain text, no markup) \
             for a conversation that starts with: {prompt}"
        )));
        let request = self.build_request(&window, &[], "You name conversations.");
        let response = self.post(&request).await?;
        let turn = Self::partition_response(&response);
        Ok(turn.joined_text().trim().to_string())
    }
}

/// Pull a human-readable message out of a Gemini error body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")?
                .get("message")?
                .as_str()
                .map(String::from)
        })
        .unwrap_or_else(|| provost_core::text::preview(body, 200))
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ContentEntry>,
    contents: Vec<ContentEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolsEntry>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContentEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "functionCall", skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCallPart>,
    #[serde(rename = "functionResponse", skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponsePart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCallPart {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponsePart {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
struct ToolsEntry {
    #[serde(rename = "functionDeclarations")]
    function_declarations: Vec<FunctionDeclarationEntry>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclarationEntry {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ContentEntry>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use provost_core::messages::ToolResult;
    use provost_core::tools::OperationOutcome;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway_for(server: &MockServer) -> GeminiGateway {
        GeminiGateway::new(GeminiConfig {
            model: "gemini-2.0-flash".into(),
            base_url: server.uri(),
            api_key: "test-key".into(),
        })
    }

    fn declarations() -> Vec<ToolDeclaration> {
        vec![ToolDeclaration {
            name: "create_program".into(),
            description: "Create a degree program".into(),
            parameters: json!({"type": "object"}),
        }]
    }

    // ── Window conversion ───────────────────────────────────────────────

    #[test]
    fn text_message_becomes_text_part() {
        let entry = GeminiGateway::convert_message(&Message::user("hello"));
        assert_eq!(entry.role.as_deref(), Some("user"));
        assert_eq!(entry.parts[0].text.as_deref(), Some("hello"));
    }

    #[test]
    fn call_batch_becomes_function_call_parts() {
        let mut args = serde_json::Map::new();
        let _ = args.insert("code".into(), json!("PHY"));
        let message = Message::model_calls(vec![ToolCall::new("call_1", "create_program", args)]);
        let entry = GeminiGateway::convert_message(&message);
        assert_eq!(entry.role.as_deref(), Some("model"));
        let call = entry.parts[0].function_call.as_ref().unwrap();
        assert_eq!(call.name, "create_program");
        assert_eq!(call.args["code"], "PHY");
    }

    #[test]
    fn result_batch_becomes_function_response_parts() {
        let message = Message::function_results(vec![ToolResult {
            call_id: "call_1".into(),
            name: "create_program".into(),
            outcome: OperationOutcome::ok(json!({"id": "prog_1"})),
        }]);
        let entry = GeminiGateway::convert_message(&message);
        assert_eq!(entry.role.as_deref(), Some("function"));
        let resp = entry.parts[0].function_response.as_ref().unwrap();
        assert_eq!(resp.name, "create_program");
        assert_eq!(resp.response["success"], true);
    }

    // ── Response partitioning ───────────────────────────────────────────

    #[test]
    fn partition_collects_calls_and_text_separately() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"role": "model", "parts": [
                {"functionCall": {"name": "create_program", "args": {"name": "Physics"}}},
                {"text": "Creating it now."},
            ]}}]
        }))
        .unwrap();
        let turn = GeminiGateway::partition_response(&response);
        assert_eq!(turn.function_calls.len(), 1);
        assert_eq!(turn.function_calls[0].name, "create_program");
        assert!(turn.function_calls[0].id.starts_with("call_"));
        assert_eq!(turn.text_parts, vec!["Creating it now.".to_string()]);
    }

    #[test]
    fn partition_empty_candidates_is_degenerate() {
        let response: GenerateContentResponse =
            serde_json::from_value(json!({"candidates": []})).unwrap();
        assert!(GeminiGateway::partition_response(&response).is_empty());
    }

    #[test]
    fn partition_skips_empty_text_parts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": ""}]}}]
        }))
        .unwrap();
        assert!(GeminiGateway::partition_response(&response).is_empty());
    }

    // ── HTTP behavior ───────────────────────────────────────────────────

    #[tokio::test]
    async fn send_turn_submits_full_window() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(json!({
                "contents": [
                    {"role": "model", "parts": [{"text": "greeting"}]},
                    {"role": "user", "parts": [{"text": "create Physics"}]},
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "[CONVERSATION_COMPLETE]"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut window = ConversationWindow::new();
        window.push(Message::model_text("greeting"));
        window.push(Message::user("create Physics"));

        let gateway = gateway_for(&server);
        let turn = gateway
            .send_turn(
                &window,
                &declarations(),
                "instructions",
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(turn.joined_text(), "[CONVERSATION_COMPLETE]");
    }

    #[tokio::test]
    async fn rate_limit_maps_to_distinct_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"message": "quota exceeded"}
            })))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        let err = gateway
            .send_turn(
                &ConversationWindow::new(),
                &[],
                "",
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_matches!(err, GatewayError::RateLimited { message } if message == "quota exceeded");
    }

    #[tokio::test]
    async fn server_error_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        let err = gateway
            .send_turn(
                &ConversationWindow::new(),
                &[],
                "",
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_matches!(err, GatewayError::Api { status: 500, .. });
    }

    #[tokio::test]
    async fn cancelled_token_aborts_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(std::time::Duration::from_secs(30))
                    .set_body_json(json!({"candidates": []})),
            )
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = gateway
            .send_turn(&ConversationWindow::new(), &[], "", &cancel)
            .await
            .unwrap_err();
        assert_matches!(err, GatewayError::Cancelled);
    }

    #[tokio::test]
    async fn generate_title_returns_trimmed_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "  Physics program setup \n"}]}}]
            })))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        let title = gateway.generate_title("create a program").await.unwrap();
        assert_eq!(title, "Physics program setup");
    }

    #[test]
    fn error_message_extraction_falls_back_to_body() {
        assert_eq!(
            extract_error_message(r#"{"error": {"message": "bad key"}}"#),
            "bad key"
        );
        assert_eq!(extract_error_message("plain failure"), "plain failure");
    }
}
