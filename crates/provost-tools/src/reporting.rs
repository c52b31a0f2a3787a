//! Reporting tool set: enrollment and grade aggregates.
//!
//! Read-only counterparts to the academic tools. Aggregation itself is the
//! backend's job; these tools only type the parameters and carry the
//! envelope back into the conversation.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use provost_core::tools::{OperationOutcome, ToolDeclaration};

use crate::backend::PortalBackend;
use crate::errors::ToolError;
use crate::registry::{ToolName, ToolRegistry};
use crate::traits::{PortalTool, ToolContext, parse_args};

/// Build the reporting persona's registry.
#[must_use]
pub fn reporting_registry(backend: Arc<dyn PortalBackend>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(EnrollmentSummaryTool {
        backend: Arc::clone(&backend),
    }));
    registry.register(Arc::new(GradeDistributionTool {
        backend: Arc::clone(&backend),
    }));
    registry.register(Arc::new(CohortProgressionTool { backend }));
    registry
}

// ── enrollment_summary ──────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct EnrollmentSummaryArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    term: Option<String>,
    #[serde(rename = "programCode", skip_serializing_if = "Option::is_none")]
    program_code: Option<String>,
}

struct EnrollmentSummaryTool {
    backend: Arc<dyn PortalBackend>,
}

#[async_trait]
impl PortalTool for EnrollmentSummaryTool {
    fn name(&self) -> ToolName {
        ToolName::EnrollmentSummary
    }

    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.name().as_str().into(),
            description: "Enrollment counts grouped by term, optionally filtered by program."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "term": {"type": "string", "description": "Term code, e.g. 2026-FALL"},
                    "programCode": {"type": "string", "description": "Restrict to one program"},
                },
            }),
        }
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<OperationOutcome, ToolError> {
        let args: EnrollmentSummaryArgs = match parse_args(args) {
            Ok(a) => a,
            Err(reason) => return Ok(OperationOutcome::rejected(reason)),
        };
        self.backend
            .invoke(
                "enrollment_summary",
                serde_json::to_value(args).unwrap_or_default(),
            )
            .await
    }
}

// ── grade_distribution ──────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct GradeDistributionArgs {
    #[serde(rename = "programCode")]
    program_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    term: Option<String>,
}

struct GradeDistributionTool {
    backend: Arc<dyn PortalBackend>,
}

#[async_trait]
impl PortalTool for GradeDistributionTool {
    fn name(&self) -> ToolName {
        ToolName::GradeDistribution
    }

    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.name().as_str().into(),
            description: "Grade distribution for one program, optionally for one term.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "programCode": {"type": "string", "description": "Program code"},
                    "term": {"type": "string", "description": "Term code"},
                },
                "required": ["programCode"],
            }),
        }
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<OperationOutcome, ToolError> {
        let args: GradeDistributionArgs = match parse_args(args) {
            Ok(a) => a,
            Err(reason) => return Ok(OperationOutcome::rejected(reason)),
        };
        self.backend
            .invoke(
                "grade_distribution",
                serde_json::to_value(args).unwrap_or_default(),
            )
            .await
    }
}

// ── cohort_progression ──────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct CohortProgressionArgs {
    #[serde(rename = "programCode")]
    program_code: String,
    #[serde(rename = "startYear")]
    start_year: u32,
}

struct CohortProgressionTool {
    backend: Arc<dyn PortalBackend>,
}

#[async_trait]
impl PortalTool for CohortProgressionTool {
    fn name(&self) -> ToolName {
        ToolName::CohortProgression
    }

    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.name().as_str().into(),
            description: "Year-over-year progression of the cohort that entered a program in a given year.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "programCode": {"type": "string", "description": "Program code"},
                    "startYear": {"type": "integer", "description": "Cohort entry year"},
                },
                "required": ["programCode", "startYear"],
            }),
        }
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<OperationOutcome, ToolError> {
        let args: CohortProgressionArgs = match parse_args(args) {
            Ok(a) => a,
            Err(reason) => return Ok(OperationOutcome::rejected(reason)),
        };
        self.backend
            .invoke(
                "cohort_progression",
                serde_json::to_value(args).unwrap_or_default(),
            )
            .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
