//! The inference gateway — one resource-gated call contract.
//!
//! Call order is fixed: cache lookup → budget gate → primary provider →
//! fallback provider → cache write → usage accounting. A cache hit touches
//! neither provider nor ledger. Total provider failure writes nothing to
//! cache and leaves the ledger unchanged.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use sift_core::agents::AgentType;
use sift_llm::pricing::calculate_cost;
use sift_llm::provider::{CompletionRequest, Provider, ProviderError};

use crate::cache::{CacheEntry, ResponseCache, RESPONSE_TTL};
use crate::fingerprint::{cache_key, context_fingerprint};
use crate::ledger::{BudgetLedger, BudgetWindow};

/// Rough prompt-side token estimate: four characters per token.
const CHARS_PER_TOKEN: usize = 4;

/// Which backend produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Served from the response cache.
    Cache,
    /// Primary provider.
    Primary,
    /// Fallback provider.
    Fallback,
}

/// One gated inference call.
#[derive(Debug, Clone)]
pub struct InferenceCall {
    /// Agent performing the call.
    pub agent: AgentType,
    /// Optional system context.
    pub system: Option<String>,
    /// Assembled prompt content.
    pub prompt: String,
    /// Deterministic fingerprint of the assembled context. Falls back to a
    /// fingerprint of the prompt itself when absent.
    pub context_fingerprint: Option<String>,
    /// Billing tenant.
    pub tenant_id: String,
    /// The tenant's daily token budget.
    pub daily_limit: u64,
    /// Output token ceiling for the call.
    pub max_tokens: u32,
}

impl InferenceCall {
    /// Expected worst-case token cost, used to gate admission before
    /// spending. Actual usage is what the ledger ends up recording.
    #[must_use]
    pub fn expected_tokens(&self) -> u64 {
        u64::from(self.max_tokens) + (self.prompt.len() / CHARS_PER_TOKEN) as u64
    }

    fn fingerprint(&self) -> String {
        self.context_fingerprint
            .clone()
            .unwrap_or_else(|| context_fingerprint(&self.prompt))
    }
}

/// Result of a gated inference call.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceOutcome {
    /// Produced content.
    pub content: String,
    /// Tokens consumed (stored value on a cache hit).
    pub tokens_used: u64,
    /// Cost estimate in USD (stored value on a cache hit).
    pub cost: f64,
    /// Whether the result was served from cache.
    pub cached: bool,
    /// Backend that produced the result.
    pub provider: ProviderKind,
}

/// Gateway call failures.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The call would push the tenant past its daily budget.
    #[error("daily token budget exceeded for {tenant_id}: {usage} used of {limit}")]
    BudgetExceeded {
        /// Tenant whose budget is exhausted.
        tenant_id: String,
        /// Usage at the time of the gate.
        usage: u64,
        /// The tenant's daily limit.
        limit: u64,
    },

    /// Both providers failed; nothing was cached or billed.
    #[error("all providers unavailable (primary: {primary}; fallback: {fallback})")]
    ProvidersUnavailable {
        /// Primary provider's failure.
        primary: ProviderError,
        /// Fallback provider's failure.
        fallback: ProviderError,
    },
}

/// The per-call contract over cache, ledger, and two providers.
pub struct InferenceGateway {
    primary: Arc<dyn Provider>,
    fallback: Arc<dyn Provider>,
    cache: Arc<dyn ResponseCache>,
    ledger: Arc<dyn BudgetLedger>,
    cache_ttl: Duration,
}

impl InferenceGateway {
    /// Create a gateway with the fixed 24-hour response TTL.
    pub fn new(
        primary: Arc<dyn Provider>,
        fallback: Arc<dyn Provider>,
        cache: Arc<dyn ResponseCache>,
        ledger: Arc<dyn BudgetLedger>,
    ) -> Self {
        Self {
            primary,
            fallback,
            cache,
            ledger,
            cache_ttl: RESPONSE_TTL,
        }
    }

    /// Override the response TTL (tests, alternate deployments).
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Shared access to the ledger (run admission checks live upstream).
    pub fn ledger(&self) -> &Arc<dyn BudgetLedger> {
        &self.ledger
    }

    /// Perform one gated inference call.
    #[instrument(skip_all, fields(agent = %call.agent, tenant_id = %call.tenant_id))]
    pub async fn invoke(&self, call: &InferenceCall) -> Result<InferenceOutcome, GatewayError> {
        let fingerprint = call.fingerprint();
        let key = cache_key(call.agent, &fingerprint);

        // 1. Cache lookup. A hit touches neither provider nor ledger.
        if let Some(entry) = self.cache.get(&key).await {
            counter!("gateway_cache_hits_total").increment(1);
            debug!(%key, "cache hit");
            return Ok(InferenceOutcome {
                content: entry.content,
                tokens_used: entry.tokens_used,
                cost: entry.cost,
                cached: true,
                provider: ProviderKind::Cache,
            });
        }
        counter!("gateway_cache_misses_total").increment(1);

        // 2. Budget gate on the worst-case estimate.
        let expected = call.expected_tokens();
        if let Err(usage) = self
            .ledger
            .try_reserve(&call.tenant_id, BudgetWindow::Daily, expected, call.daily_limit)
            .await
        {
            counter!("gateway_budget_rejections_total").increment(1);
            warn!(usage, limit = call.daily_limit, expected, "budget gate rejected call");
            return Err(GatewayError::BudgetExceeded {
                tenant_id: call.tenant_id.clone(),
                usage,
                limit: call.daily_limit,
            });
        }

        // 3. Primary, then fallback. Total failure returns the reservation.
        let request = CompletionRequest {
            system: call.system.clone(),
            prompt: call.prompt.clone(),
            max_tokens: call.max_tokens,
        };
        let (completion, provider) = match self.primary.complete(&request).await {
            Ok(completion) => (completion, ProviderKind::Primary),
            Err(primary_err) => {
                counter!("gateway_fallbacks_total").increment(1);
                warn!(error = %primary_err, "primary provider failed, trying fallback");
                match self.fallback.complete(&request).await {
                    Ok(completion) => (completion, ProviderKind::Fallback),
                    Err(fallback_err) => {
                        self.ledger
                            .release(&call.tenant_id, BudgetWindow::Daily, expected)
                            .await;
                        counter!("gateway_total_failures_total").increment(1);
                        return Err(GatewayError::ProvidersUnavailable {
                            primary: primary_err,
                            fallback: fallback_err,
                        });
                    }
                }
            }
        };

        // 4. Cache write, then account actual usage.
        let tokens_used = completion.tokens_used();
        let cost = calculate_cost(
            &completion.model,
            completion.input_tokens,
            completion.output_tokens,
        )
        .unwrap_or_else(|| {
            warn!(model = %completion.model, "no pricing for model, recording zero cost");
            0.0
        });
        self.cache
            .put(
                &key,
                CacheEntry {
                    content: completion.content.clone(),
                    tokens_used,
                    cost,
                    model: completion.model.clone(),
                },
                self.cache_ttl,
            )
            .await;
        self.ledger
            .commit(&call.tenant_id, BudgetWindow::Daily, expected, tokens_used)
            .await;
        self.ledger
            .commit(&call.tenant_id, BudgetWindow::Monthly, 0, tokens_used)
            .await;

        debug!(tokens_used, cost, provider = ?provider, "inference call complete");
        Ok(InferenceOutcome {
            content: completion.content,
            tokens_used,
            cost,
            cached: false,
            provider,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryResponseCache;
    use crate::ledger::MemoryBudgetLedger;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use sift_llm::provider::{Completion, ProviderResult};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scripted provider: fixed completion or fixed failure, counting calls.
    struct ScriptedProvider {
        name: &'static str,
        result: Option<Completion>,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn ok(name: &'static str, content: &str, input: u64, output: u64) -> Arc<Self> {
            Arc::new(Self {
                name,
                result: Some(Completion {
                    content: content.into(),
                    input_tokens: input,
                    output_tokens: output,
                    model: "claude-haiku-4-5".into(),
                }),
                calls: AtomicU32::new(0),
            })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                result: None,
                calls: AtomicU32::new(0),
            })
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        fn model(&self) -> &str {
            "claude-haiku-4-5"
        }

        async fn complete(&self, _request: &CompletionRequest) -> ProviderResult<Completion> {
            let _ = self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone().ok_or(ProviderError::Api {
                status: 503,
                message: "unavailable".into(),
            })
        }
    }

    struct Harness {
        gateway: InferenceGateway,
        primary: Arc<ScriptedProvider>,
        fallback: Arc<ScriptedProvider>,
        ledger: Arc<MemoryBudgetLedger>,
        cache: Arc<MemoryResponseCache>,
    }

    fn harness(primary: Arc<ScriptedProvider>, fallback: Arc<ScriptedProvider>) -> Harness {
        let ledger = Arc::new(MemoryBudgetLedger::new());
        let cache = Arc::new(MemoryResponseCache::new());
        let gateway = InferenceGateway::new(
            Arc::clone(&primary) as Arc<dyn Provider>,
            Arc::clone(&fallback) as Arc<dyn Provider>,
            Arc::clone(&cache) as Arc<dyn ResponseCache>,
            Arc::clone(&ledger) as Arc<dyn BudgetLedger>,
        );
        Harness {
            gateway,
            primary,
            fallback,
            ledger,
            cache,
        }
    }

    fn call() -> InferenceCall {
        InferenceCall {
            agent: AgentType::QaConsultant,
            system: None,
            prompt: "ping".into(),
            context_fingerprint: Some("abc123".into()),
            tenant_id: "tenant_1".into(),
            daily_limit: 10_000,
            max_tokens: 300,
        }
    }

    #[tokio::test]
    async fn success_from_primary_commits_actual_usage() {
        let h = harness(
            ScriptedProvider::ok("anthropic", "analysis", 120, 80),
            ScriptedProvider::failing("openai"),
        );
        let outcome = h.gateway.invoke(&call()).await.unwrap();

        assert_eq!(outcome.provider, ProviderKind::Primary);
        assert!(!outcome.cached);
        assert_eq!(outcome.content, "analysis");
        assert_eq!(outcome.tokens_used, 200);
        assert!(outcome.cost > 0.0);
        assert_eq!(h.fallback.call_count(), 0);
        // Ledger holds the actual usage, not the 300-token estimate
        assert_eq!(h.ledger.usage("tenant_1", BudgetWindow::Daily).await, 200);
        assert_eq!(h.ledger.usage("tenant_1", BudgetWindow::Monthly).await, 200);
    }

    #[tokio::test]
    async fn second_identical_call_hits_cache_with_one_provider_call_total() {
        let h = harness(
            ScriptedProvider::ok("anthropic", "analysis", 120, 80),
            ScriptedProvider::failing("openai"),
        );
        let first = h.gateway.invoke(&call()).await.unwrap();
        let second = h.gateway.invoke(&call()).await.unwrap();

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(second.provider, ProviderKind::Cache);
        assert_eq!(second.content, first.content);
        assert_eq!(second.tokens_used, first.tokens_used);
        // Exactly one real provider call across both invocations
        assert_eq!(h.primary.call_count(), 1);
        // The cache hit did not touch the ledger
        assert_eq!(h.ledger.usage("tenant_1", BudgetWindow::Daily).await, 200);
    }

    #[tokio::test]
    async fn cache_hit_never_invokes_either_provider() {
        let h = harness(
            ScriptedProvider::ok("anthropic", "ignored", 1, 1),
            ScriptedProvider::failing("openai"),
        );
        h.cache
            .put(
                &cache_key(AgentType::QaConsultant, "abc123"),
                CacheEntry {
                    content: "from cache".into(),
                    tokens_used: 42,
                    cost: 0.001,
                    model: "claude-haiku-4-5".into(),
                },
                RESPONSE_TTL,
            )
            .await;

        let outcome = h.gateway.invoke(&call()).await.unwrap();
        assert!(outcome.cached);
        assert_eq!(outcome.provider, ProviderKind::Cache);
        assert_eq!(outcome.content, "from cache");
        assert_eq!(outcome.tokens_used, 42);
        assert_eq!(h.primary.call_count(), 0);
        assert_eq!(h.fallback.call_count(), 0);
    }

    #[tokio::test]
    async fn budget_gate_rejects_before_any_provider_call() {
        let h = harness(
            ScriptedProvider::ok("anthropic", "never", 1, 1),
            ScriptedProvider::ok("openai", "never", 1, 1),
        );
        // Tenant at 9,800 of 10,000; a 300-token call must be rejected.
        h.ledger
            .commit("tenant_1", BudgetWindow::Daily, 0, 9_800)
            .await;

        let mut c = call();
        c.prompt = "hi".into(); // prompt estimate rounds to zero tokens
        let err = h.gateway.invoke(&c).await.unwrap_err();

        assert_matches!(
            err,
            GatewayError::BudgetExceeded { ref tenant_id, usage: 9_800, limit: 10_000 }
                if tenant_id == "tenant_1"
        );
        assert_eq!(h.primary.call_count(), 0);
        assert_eq!(h.fallback.call_count(), 0);
        // Rejection leaves the counter untouched
        assert_eq!(h.ledger.usage("tenant_1", BudgetWindow::Daily).await, 9_800);
    }

    #[tokio::test]
    async fn fallback_succeeds_when_primary_fails() {
        let h = harness(
            ScriptedProvider::failing("anthropic"),
            ScriptedProvider::ok("openai", "X", 200, 100),
        );
        let outcome = h.gateway.invoke(&call()).await.unwrap();

        assert_eq!(outcome.provider, ProviderKind::Fallback);
        assert!(!outcome.cached);
        assert_eq!(outcome.content, "X");
        assert_eq!(outcome.tokens_used, 300);
        assert_eq!(h.primary.call_count(), 1);
        assert_eq!(h.fallback.call_count(), 1);
        // The fallback result was cached for next time
        let cached = h
            .cache
            .get(&cache_key(AgentType::QaConsultant, "abc123"))
            .await
            .unwrap();
        assert_eq!(cached.content, "X");
        assert_eq!(cached.tokens_used, 300);
    }

    #[tokio::test]
    async fn total_failure_reports_both_causes() {
        let h = harness(
            ScriptedProvider::failing("anthropic"),
            ScriptedProvider::failing("openai"),
        );
        let err = h.gateway.invoke(&call()).await.unwrap_err();
        assert_matches!(err, GatewayError::ProvidersUnavailable { .. });
        let text = err.to_string();
        assert!(text.contains("primary"));
        assert!(text.contains("fallback"));
    }

    #[tokio::test]
    async fn total_failure_writes_no_cache_and_leaves_ledger_unchanged() {
        let h = harness(
            ScriptedProvider::failing("anthropic"),
            ScriptedProvider::failing("openai"),
        );
        let before = h.ledger.usage("tenant_1", BudgetWindow::Daily).await;
        let _ = h.gateway.invoke(&call()).await.unwrap_err();

        assert!(h.cache.is_empty());
        assert_eq!(h.ledger.usage("tenant_1", BudgetWindow::Daily).await, before);
        assert_eq!(h.ledger.usage("tenant_1", BudgetWindow::Monthly).await, 0);
    }

    #[tokio::test]
    async fn prompt_fingerprint_fallback_still_caches_deterministically() {
        let h = harness(
            ScriptedProvider::ok("anthropic", "analysis", 50, 50),
            ScriptedProvider::failing("openai"),
        );
        let mut c = call();
        c.context_fingerprint = None;

        let first = h.gateway.invoke(&c).await.unwrap();
        let second = h.gateway.invoke(&c).await.unwrap();
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(h.primary.call_count(), 1);
    }

    #[tokio::test]
    async fn expired_entry_triggers_fresh_provider_call() {
        let h = harness(
            ScriptedProvider::ok("anthropic", "analysis", 50, 50),
            ScriptedProvider::failing("openai"),
        );
        let gateway = h.gateway.with_cache_ttl(Duration::from_millis(0));

        let first = gateway.invoke(&call()).await.unwrap();
        let second = gateway.invoke(&call()).await.unwrap();
        assert!(!first.cached);
        assert!(!second.cached);
        assert_eq!(h.primary.call_count(), 2);
    }

    #[test]
    fn expected_tokens_includes_prompt_estimate() {
        let mut c = call();
        c.prompt = "x".repeat(400);
        c.max_tokens = 300;
        assert_eq!(c.expected_tokens(), 400);
    }
}
