//! # sift-runtime
//!
//! The pipeline orchestration engine and the live event distribution layer.
//!
//! - [`bus::EventBus`] — one broadcast channel per active run; every
//!   listener sees every event in publish order
//! - [`context::ContextAssembler`] — seam that builds each step's prompt
//!   and context fingerprint
//! - [`artifacts::ArtifactSink`] — seam that receives each successful
//!   step's content and returns an artifact reference
//! - [`orchestrator::Orchestrator`] — drives runs through their steps,
//!   persisting and publishing every transition; guarantees a run always
//!   reaches a terminal status

#![deny(unsafe_code)]

pub mod artifacts;
pub mod bus;
pub mod context;
pub mod errors;
pub mod orchestrator;

pub use artifacts::{ArtifactError, ArtifactSink, MemoryArtifactSink};
pub use bus::EventBus;
pub use context::{ContextAssembler, ContextError, PromptContextAssembler, StepContext};
pub use errors::RuntimeError;
pub use orchestrator::{Orchestrator, OrchestratorConfig};
