//! # sift-llm
//!
//! The provider boundary: a [`provider::Provider`] trait over
//! independently-reachable inference backends, concrete implementations for
//! an Anthropic-style primary and an OpenAI-compatible fallback, and the
//! pricing tables used to turn token usage into cost estimates.
//!
//! Providers are interchangeable behind the gateway's fallback contract:
//! each accepts a prompt plus optional system context and returns generated
//! content with a token-usage figure.

#![deny(unsafe_code)]

pub mod anthropic;
pub mod openai;
pub mod pricing;
pub mod provider;

pub use anthropic::{AnthropicConfig, AnthropicProvider};
pub use openai::{OpenAiConfig, OpenAiProvider};
pub use provider::{Completion, CompletionRequest, Provider, ProviderError, ProviderResult};
