//! The tool registry: a typed tag mapped to handlers.
//!
//! Dispatch is keyed by [`ToolName`], an enumerated tag, rather than raw
//! strings. Unknown wire names are rejected at parse time, before any
//! handler lookup. The schema advertised to the model is derived from the
//! same table that dispatches the calls, so the two cannot drift apart —
//! registering a tool updates both in one step.

use std::collections::BTreeMap;
use std::sync::Arc;

use provost_core::tools::ToolDeclaration;

use crate::traits::PortalTool;

/// Every tool the portal exposes, across both personas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ToolName {
    /// Create a degree program.
    CreateProgram,
    /// Rename an existing program.
    UpdateProgram,
    /// Delete a program.
    DeleteProgram,
    /// List all programs.
    ListPrograms,
    /// Create a course within a program.
    CreateCourse,
    /// Search students by name or id.
    SearchStudents,
    /// Enrollment counts grouped by term.
    EnrollmentSummary,
    /// Grade distribution for a course or program.
    GradeDistribution,
    /// Year-over-year cohort progression.
    CohortProgression,
}

impl ToolName {
    /// Wire name, as advertised to the model and echoed in its calls.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateProgram => "create_program",
            Self::UpdateProgram => "update_program",
            Self::DeleteProgram => "delete_program",
            Self::ListPrograms => "list_programs",
            Self::CreateCourse => "create_course",
            Self::SearchStudents => "search_students",
            Self::EnrollmentSummary => "enrollment_summary",
            Self::GradeDistribution => "grade_distribution",
            Self::CohortProgression => "cohort_progression",
        }
    }

    /// Parse a wire name. `None` means the model named a tool that does
    /// not exist anywhere in the system.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create_program" => Some(Self::CreateProgram),
            "update_program" => Some(Self::UpdateProgram),
            "delete_program" => Some(Self::DeleteProgram),
            "list_programs" => Some(Self::ListPrograms),
            "create_course" => Some(Self::CreateCourse),
            "search_students" => Some(Self::SearchStudents),
            "enrollment_summary" => Some(Self::EnrollmentSummary),
            "grade_distribution" => Some(Self::GradeDistribution),
            "cohort_progression" => Some(Self::CohortProgression),
            _ => None,
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static table mapping a tool tag to its handler.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<ToolName, Arc<dyn PortalTool>>,
}

impl ToolRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its own tag. Replaces any previous entry.
    pub fn register(&mut self, tool: Arc<dyn PortalTool>) {
        let _ = self.tools.insert(tool.name(), tool);
    }

    /// Look up a handler by tag.
    #[must_use]
    pub fn get(&self, name: ToolName) -> Option<&Arc<dyn PortalTool>> {
        self.tools.get(&name)
    }

    /// Schema advertised to the model — one declaration per registered tool,
    /// in stable (tag) order.
    #[must_use]
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.tools.values().map(|t| t.declaration()).collect()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ToolError;
    use crate::traits::{PortalTool, ToolContext};
    use async_trait::async_trait;
    use provost_core::tools::OperationOutcome;
    use serde_json::{Value, json};

    struct StubTool(ToolName);

    #[async_trait]
    impl PortalTool for StubTool {
        fn name(&self) -> ToolName {
            self.0
        }
        fn declaration(&self) -> ToolDeclaration {
            ToolDeclaration {
                name: self.0.as_str().into(),
                description: "stub".into(),
                parameters: json!({"type": "object"}),
            }
        }
        async fn execute(
            &self,
            _args: Value,
            _ctx: &ToolContext,
        ) -> Result<OperationOutcome, ToolError> {
            Ok(OperationOutcome::ok(json!(null)))
        }
    }

    #[test]
    fn every_wire_name_round_trips() {
        let all = [
            ToolName::CreateProgram,
            ToolName::UpdateProgram,
            ToolName::DeleteProgram,
            ToolName::ListPrograms,
            ToolName::CreateCourse,
            ToolName::SearchStudents,
            ToolName::EnrollmentSummary,
            ToolName::GradeDistribution,
            ToolName::CohortProgression,
        ];
        for name in all {
            assert_eq!(ToolName::parse(name.as_str()), Some(name));
        }
    }

    #[test]
    fn unknown_wire_name_is_rejected() {
        assert_eq!(ToolName::parse("drop_database"), None);
        assert_eq!(ToolName::parse(""), None);
    }

    #[test]
    fn declarations_track_registrations() {
        let mut registry = ToolRegistry::new();
        assert!(registry.is_empty());

        registry.register(Arc::new(StubTool(ToolName::CreateProgram)));
        registry.register(Arc::new(StubTool(ToolName::ListPrograms)));

        let decls = registry.declarations();
        assert_eq!(decls.len(), 2);
        // One declaration per registered tool — the schema cannot drift.
        assert_eq!(registry.len(), decls.len());
        let names: Vec<&str> = decls.iter().map(|d| d.name.as_str()).collect();
        assert!(names.contains(&"create_program"));
        assert!(names.contains(&"list_programs"));
    }

    #[test]
    fn get_returns_registered_handler_only() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StubTool(ToolName::CreateProgram)));
        assert!(registry.get(ToolName::CreateProgram).is_some());
        assert!(registry.get(ToolName::DeleteProgram).is_none());
    }
}
