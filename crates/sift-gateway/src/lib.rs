//! # sift-gateway
//!
//! The per-call inference contract: cache lookup → budget gate → primary
//! provider → fallback provider → cache write → usage accounting.
//!
//! - [`fingerprint`] — deterministic cache keys from (agent, context)
//! - [`cache`] — content-addressed response cache with fixed TTL
//! - [`ledger`] — per-tenant token counters with atomic reserve/commit/release
//! - [`gateway`] — [`gateway::InferenceGateway`] tying it together

#![deny(unsafe_code)]

pub mod cache;
pub mod fingerprint;
pub mod gateway;
pub mod ledger;

pub use cache::{CacheEntry, MemoryResponseCache, ResponseCache, RESPONSE_TTL};
pub use gateway::{
    GatewayError, InferenceCall, InferenceGateway, InferenceOutcome, ProviderKind,
};
pub use ledger::{BudgetLedger, BudgetWindow, MemoryBudgetLedger};
