//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at server startup before any metrics are recorded.
pub fn install_recorder() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

// Metric name constants to avoid typos across crates.

/// HTTP requests total (counter, labels: route).
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
/// Active agent runs (gauge).
pub const AGENT_RUNS_ACTIVE: &str = "agent_runs_active";
/// Agent turns total (counter, labels: persona).
pub const AGENT_TURNS_TOTAL: &str = "agent_turns_total";
/// Agent turn duration seconds (histogram, labels: persona).
pub const AGENT_TURN_DURATION_SECONDS: &str = "agent_turn_duration_seconds";
/// Failed runs total (counter, labels: kind).
pub const AGENT_RUNS_FAILED_TOTAL: &str = "agent_runs_failed_total";
/// Gateway requests total (counter, labels: model).
pub const GATEWAY_REQUESTS_TOTAL: &str = "gateway_requests_total";
/// Gateway errors total (counter, labels: status).
pub const GATEWAY_ERRORS_TOTAL: &str = "gateway_errors_total";
/// Gateway request duration seconds (histogram, labels: model).
pub const GATEWAY_REQUEST_DURATION_SECONDS: &str = "gateway_request_duration_seconds";
/// Tool executions total (counter, labels: tool).
pub const TOOL_EXECUTIONS_TOTAL: &str = "tool_executions_total";
/// Tool execution duration seconds (histogram, labels: tool).
pub const TOOL_EXECUTION_DURATION_SECONDS: &str = "tool_execution_duration_seconds";
/// Stream events total (counter, labels: type).
pub const STREAM_EVENTS_TOTAL: &str = "stream_events_total";
/// Sessions created total (counter, labels: category).
pub const STORE_SESSIONS_CREATED_TOTAL: &str = "store_sessions_created_total";
/// Messages appended total (counter, labels: role).
pub const STORE_MESSAGES_APPENDED_TOTAL: &str = "store_messages_appended_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_and_render_recorder() {
        // Build a recorder + handle (no global install to avoid test conflicts).
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = handle.render();
        assert!(output.is_empty() || output.contains('#') || output.contains('\n'));
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            HTTP_REQUESTS_TOTAL,
            AGENT_RUNS_ACTIVE,
            AGENT_TURNS_TOTAL,
            AGENT_TURN_DURATION_SECONDS,
            AGENT_RUNS_FAILED_TOTAL,
            GATEWAY_REQUESTS_TOTAL,
            GATEWAY_ERRORS_TOTAL,
            GATEWAY_REQUEST_DURATION_SECONDS,
            TOOL_EXECUTIONS_TOTAL,
            TOOL_EXECUTION_DURATION_SECONDS,
            STREAM_EVENTS_TOTAL,
            STORE_SESSIONS_CREATED_TOTAL,
            STORE_MESSAGES_APPENDED_TOTAL,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
