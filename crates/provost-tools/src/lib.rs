//! # provost-tools
//!
//! The tool layer: a typed registry, the stateless dispatcher, and the two
//! persona tool sets (academic structure and reporting), all delegating to
//! the opaque portal backend.
//!
//! ## Crate Position
//!
//! Depends on `provost-core` for the call/result vocabulary. Used by the
//! runtime, which drives dispatch from the orchestration loop.

#![deny(unsafe_code)]

pub mod academic;
pub mod backend;
pub mod dispatch;
pub mod errors;
pub mod registry;
pub mod reporting;
pub mod traits;

pub use academic::academic_registry;
pub use backend::{PortalBackend, RestPortalBackend};
pub use dispatch::dispatch;
pub use errors::{DispatchError, ToolError};
pub use registry::{ToolName, ToolRegistry};
pub use reporting::reporting_registry;
pub use traits::{PortalTool, ToolContext};
