//! Academic-structure tool set: programs, courses, student lookup.
//!
//! Each tool pairs a statically checked argument struct with the JSON
//! schema advertised to the model, and delegates the actual work to the
//! portal backend. Argument-shape mismatches are business rejections — the
//! model sees the reason and can retry with corrected arguments.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use provost_core::tools::{OperationOutcome, ToolDeclaration};

use crate::backend::PortalBackend;
use crate::errors::ToolError;
use crate::registry::{ToolName, ToolRegistry};
use crate::traits::{PortalTool, ToolContext, parse_args};

/// Build the academic persona's registry.
#[must_use]
pub fn academic_registry(backend: Arc<dyn PortalBackend>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(CreateProgramTool {
        backend: Arc::clone(&backend),
    }));
    registry.register(Arc::new(UpdateProgramTool {
        backend: Arc::clone(&backend),
    }));
    registry.register(Arc::new(DeleteProgramTool {
        backend: Arc::clone(&backend),
    }));
    registry.register(Arc::new(ListProgramsTool {
        backend: Arc::clone(&backend),
    }));
    registry.register(Arc::new(CreateCourseTool {
        backend: Arc::clone(&backend),
    }));
    registry.register(Arc::new(SearchStudentsTool { backend }));
    registry
}

// ── create_program ──────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct CreateProgramArgs {
    name: String,
    code: String,
}

/// Create a degree program.
struct CreateProgramTool {
    backend: Arc<dyn PortalBackend>,
}

#[async_trait]
impl PortalTool for CreateProgramTool {
    fn name(&self) -> ToolName {
        ToolName::CreateProgram
    }

    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.name().as_str().into(),
            description: "Create a new degree program with a display name and a short code."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Program display name"},
                    "code": {"type": "string", "description": "Short unique code, e.g. PHY"},
                },
                "required": ["name", "code"],
            }),
        }
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<OperationOutcome, ToolError> {
        let args: CreateProgramArgs = match parse_args(args) {
            Ok(a) => a,
            Err(reason) => return Ok(OperationOutcome::rejected(reason)),
        };
        self.backend
            .invoke("create_program", serde_json::to_value(args).unwrap_or_default())
            .await
    }
}

// ── update_program ──────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct UpdateProgramArgs {
    code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(rename = "newCode", skip_serializing_if = "Option::is_none")]
    new_code: Option<String>,
}

struct UpdateProgramTool {
    backend: Arc<dyn PortalBackend>,
}

#[async_trait]
impl PortalTool for UpdateProgramTool {
    fn name(&self) -> ToolName {
        ToolName::UpdateProgram
    }

    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.name().as_str().into(),
            description: "Rename a program or change its code. The program is identified by its current code.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "code": {"type": "string", "description": "Current program code"},
                    "name": {"type": "string", "description": "New display name"},
                    "newCode": {"type": "string", "description": "New short code"},
                },
                "required": ["code"],
            }),
        }
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<OperationOutcome, ToolError> {
        let args: UpdateProgramArgs = match parse_args(args) {
            Ok(a) => a,
            Err(reason) => return Ok(OperationOutcome::rejected(reason)),
        };
        if args.name.is_none() && args.new_code.is_none() {
            return Ok(OperationOutcome::rejected(
                "nothing to update: provide name or newCode",
            ));
        }
        self.backend
            .invoke("update_program", serde_json::to_value(args).unwrap_or_default())
            .await
    }
}

// ── delete_program ──────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct DeleteProgramArgs {
    code: String,
}

struct DeleteProgramTool {
    backend: Arc<dyn PortalBackend>,
}

#[async_trait]
impl PortalTool for DeleteProgramTool {
    fn name(&self) -> ToolName {
        ToolName::DeleteProgram
    }

    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.name().as_str().into(),
            description: "Delete a program by its code. Fails if students are still enrolled."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "code": {"type": "string", "description": "Program code"},
                },
                "required": ["code"],
            }),
        }
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<OperationOutcome, ToolError> {
        let args: DeleteProgramArgs = match parse_args(args) {
            Ok(a) => a,
            Err(reason) => return Ok(OperationOutcome::rejected(reason)),
        };
        self.backend
            .invoke("delete_program", serde_json::to_value(args).unwrap_or_default())
            .await
    }
}

// ── list_programs ───────────────────────────────────────────────────────

struct ListProgramsTool {
    backend: Arc<dyn PortalBackend>,
}

#[async_trait]
impl PortalTool for ListProgramsTool {
    fn name(&self) -> ToolName {
        ToolName::ListPrograms
    }

    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.name().as_str().into(),
            description: "List all degree programs with their codes.".into(),
            parameters: json!({"type": "object", "properties": {}}),
        }
    }

    async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<OperationOutcome, ToolError> {
        self.backend.invoke("list_programs", json!({})).await
    }
}

// ── create_course ───────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct CreateCourseArgs {
    #[serde(rename = "programCode")]
    program_code: String,
    title: String,
    credits: u32,
}

struct CreateCourseTool {
    backend: Arc<dyn PortalBackend>,
}

#[async_trait]
impl PortalTool for CreateCourseTool {
    fn name(&self) -> ToolName {
        ToolName::CreateCourse
    }

    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.name().as_str().into(),
            description: "Create a course inside an existing program.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "programCode": {"type": "string", "description": "Owning program code"},
                    "title": {"type": "string", "description": "Course title"},
                    "credits": {"type": "integer", "description": "Credit hours"},
                },
                "required": ["programCode", "title", "credits"],
            }),
        }
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<OperationOutcome, ToolError> {
        let args: CreateCourseArgs = match parse_args(args) {
            Ok(a) => a,
            Err(reason) => return Ok(OperationOutcome::rejected(reason)),
        };
        self.backend
            .invoke("create_course", serde_json::to_value(args).unwrap_or_default())
            .await
    }
}

// ── search_students ─────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct SearchStudentsArgs {
    query: String,
    #[serde(rename = "programCode", skip_serializing_if = "Option::is_none")]
    program_code: Option<String>,
}

struct SearchStudentsTool {
    backend: Arc<dyn PortalBackend>,
}

#[async_trait]
impl PortalTool for SearchStudentsTool {
    fn name(&self) -> ToolName {
        ToolName::SearchStudents
    }

    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.name().as_str().into(),
            description: "Search students by name or id, optionally within one program.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Name fragment or student id"},
                    "programCode": {"type": "string", "description": "Restrict to one program"},
                },
                "required": ["query"],
            }),
        }
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<OperationOutcome, ToolError> {
        let args: SearchStudentsArgs = match parse_args(args) {
            Ok(a) => a,
            Err(reason) => return Ok(OperationOutcome::rejected(reason)),
        };
        self.backend
            .invoke("search_students", serde_json::to_value(args).unwrap_or_default())
            .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
