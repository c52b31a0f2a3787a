//! # provost-core
//!
//! Foundation types for the Provost agent subsystem of the university
//! administration portal.
//!
//! This crate provides the shared vocabulary that all other Provost crates
//! depend on:
//!
//! - **Messages**: [`messages::Message`] with `user` / `model` / `function`
//!   roles and append-only ordering
//! - **Tool vocabulary**: [`messages::ToolCall`], [`messages::ToolResult`],
//!   and the [`tools::OperationOutcome`] envelope shared with the portal
//!   backend
//! - **Stream events**: [`events::AgentEvent`] — the newline-delimited JSON
//!   objects written to the client during a run
//! - **Markup protocol**: [`markup`] — paired text markers and the two
//!   control sentinels that drive loop termination
//! - **IDs**: [`ids`] — UUID v7 identifiers with typed prefixes
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other provost crates.

#![deny(unsafe_code)]

pub mod events;
pub mod ids;
pub mod markup;
pub mod messages;
pub mod text;
pub mod tools;
