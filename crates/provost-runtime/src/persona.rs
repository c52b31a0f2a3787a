//! The two portal personas sharing one orchestration loop.
//!
//! A persona is instruction text plus a tool table. The loop itself is
//! generic — instantiating it per domain is the whole of the persona
//! mechanism.

use std::sync::Arc;

use provost_core::markup::markup_instructions;
use provost_tools::backend::PortalBackend;
use provost_tools::registry::ToolRegistry;
use provost_tools::{academic_registry, reporting_registry};

use crate::errors::RuntimeError;

/// Which persona (and therefore tool set) a session belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Persona {
    /// Academic-structure management: programs, courses, student lookup.
    Academic,
    /// Reporting: enrollment and grade aggregates.
    Reporting,
}

impl Persona {
    /// Category tag used in session rows and URLs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Academic => "academic",
            Self::Reporting => "reporting",
        }
    }

    /// Parse a category tag.
    pub fn parse(s: &str) -> Result<Self, RuntimeError> {
        match s {
            "academic" => Ok(Self::Academic),
            "reporting" => Ok(Self::Reporting),
            other => Err(RuntimeError::UnknownPersona(other.to_string())),
        }
    }

    /// Greeting seeded as a session's first message.
    #[must_use]
    pub fn greeting(self) -> &'static str {
        match self {
            Self::Academic => {
                "[P]Hello! I can manage programs, courses, and student records. \
                 What would you like to do?[/P]"
            }
            Self::Reporting => {
                "[P]Hello! Ask me about enrollment, grades, or cohort progress \
                 and I will pull the numbers together.[/P]"
            }
        }
    }

    /// Full persona instructions sent as the system text on every call.
    #[must_use]
    pub fn instructions(self) -> String {
        let role_text = match self {
            Self::Academic => {
                "You are the academic-structure assistant of a university \
                 administration portal. You manage degree programs, courses, and \
                 student lookups through the tools provided. Use tools for every \
                 data change or lookup; never invent portal state. Confirm what \
                 you changed after each operation."
            }
            Self::Reporting => {
                "You are the reporting assistant of a university administration \
                 portal. You answer questions about enrollment, grades, and \
                 cohort progression using the reporting tools provided. Use tools \
                 for every figure you cite; never estimate."
            }
        };
        format!("{role_text}\n\n{}", markup_instructions())
    }

    /// Build this persona's tool registry over the shared backend.
    #[must_use]
    pub fn registry(self, backend: Arc<dyn PortalBackend>) -> ToolRegistry {
        match self {
            Self::Academic => academic_registry(backend),
            Self::Reporting => reporting_registry(backend),
        }
    }
}

impl std::fmt::Display for Persona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn category_tags_round_trip() {
        assert_eq!(Persona::parse("academic").unwrap(), Persona::Academic);
        assert_eq!(Persona::parse("reporting").unwrap(), Persona::Reporting);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = Persona::parse("finance").unwrap_err();
        assert_matches!(err, RuntimeError::UnknownPersona(tag) if tag == "finance");
    }

    #[test]
    fn instructions_include_markup_contract() {
        for persona in [Persona::Academic, Persona::Reporting] {
            let text = persona.instructions();
            assert!(text.contains("[CONVERSATION_COMPLETE]"));
            assert!(text.contains("[AWAITING_INPUT]"));
        }
    }

    #[test]
    fn greetings_are_marked_up() {
        assert!(Persona::Academic.greeting().starts_with("[P]"));
        assert!(Persona::Reporting.greeting().ends_with("[/P]"));
    }
}
