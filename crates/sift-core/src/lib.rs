//! # sift-core
//!
//! Foundation types for the sift analysis pipeline.
//!
//! This crate provides the shared vocabulary that all other sift crates
//! depend on:
//!
//! - **IDs**: [`ids`] — prefixed UUIDv7 identifiers for runs, steps, artifacts
//! - **Agent catalog**: [`agents::AgentType`] — the closed set of analysis roles
//! - **Statuses**: [`status::RunStatus`], [`status::StepStatus`],
//!   [`status::PipelineMode`] with monotonic-transition predicates
//! - **Models**: [`run::Run`] and [`run::Step`] rows
//! - **Events**: [`events::RunEvent`] — ephemeral lifecycle events relayed to
//!   stream listeners
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other sift crates.

#![deny(unsafe_code)]

pub mod agents;
pub mod events;
pub mod ids;
pub mod run;
pub mod status;
