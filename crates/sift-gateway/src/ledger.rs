//! Per-tenant token budget counters.
//!
//! Counters accumulate over rolling windows (daily for per-call gating,
//! monthly for run admission) and reset by key rollover: the window's period
//! is part of the counter key, so a new day or month starts from zero and
//! stale entries are pruned opportunistically.
//!
//! The gate is reserve-based: `try_reserve` atomically checks
//! `current + tokens > limit` and reserves the estimate under one entry
//! lock, so two concurrent calls for the same tenant can never both pass a
//! gate that only one call's worth of capacity permits. After the call,
//! `commit` replaces the reservation with actual usage (the ledger tracks
//! reality, not worst-case estimates) and `release` returns it on total
//! failure — failed calls never increment the ledger.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use dashmap::DashMap;

/// Budget accumulation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BudgetWindow {
    /// Rolling per-day window, used for per-call gating.
    Daily,
    /// Rolling per-month window, used for run admission.
    Monthly,
}

impl BudgetWindow {
    /// Period component of the counter key for the given instant.
    #[must_use]
    pub fn period_key(self, now: DateTime<Utc>) -> String {
        match self {
            Self::Daily => now.format("%Y-%m-%d").to_string(),
            Self::Monthly => now.format("%Y-%m").to_string(),
        }
    }
}

/// Per-tenant budget counter store.
#[async_trait]
pub trait BudgetLedger: Send + Sync {
    /// Current usage for the tenant in the window.
    async fn usage(&self, tenant_id: &str, window: BudgetWindow) -> u64;

    /// Atomically reserve `tokens` if `current + tokens <= limit`.
    ///
    /// On rejection returns the current usage (for error reporting); the
    /// counter is unchanged.
    async fn try_reserve(
        &self,
        tenant_id: &str,
        window: BudgetWindow,
        tokens: u64,
        limit: u64,
    ) -> Result<(), u64>;

    /// Replace a prior reservation with actual usage.
    ///
    /// `reserved == 0` turns this into a plain increment (used for windows
    /// that gate elsewhere, like monthly).
    async fn commit(&self, tenant_id: &str, window: BudgetWindow, reserved: u64, actual: u64);

    /// Return a prior reservation after a failed call.
    async fn release(&self, tenant_id: &str, window: BudgetWindow, tokens: u64);
}

/// Prune stale period entries once the map grows past this size.
const PRUNE_THRESHOLD: usize = 1024;

/// In-process budget ledger.
pub struct MemoryBudgetLedger {
    counters: DashMap<String, u64>,
}

impl MemoryBudgetLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
        }
    }

    fn key(tenant_id: &str, window: BudgetWindow) -> String {
        format!("{tenant_id}:{}", window.period_key(Utc::now()))
    }

    /// Drop counters from past periods when the map grows.
    fn prune_if_large(&self) {
        if self.counters.len() > PRUNE_THRESHOLD {
            let now = Utc::now();
            let day = BudgetWindow::Daily.period_key(now);
            let month = BudgetWindow::Monthly.period_key(now);
            self.counters
                .retain(|key, _| key.ends_with(&day) || key.ends_with(&month));
        }
    }

    /// Number of live counter entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Whether the ledger holds no counters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

impl Default for MemoryBudgetLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BudgetLedger for MemoryBudgetLedger {
    async fn usage(&self, tenant_id: &str, window: BudgetWindow) -> u64 {
        self.counters
            .get(&Self::key(tenant_id, window))
            .map_or(0, |v| *v)
    }

    async fn try_reserve(
        &self,
        tenant_id: &str,
        window: BudgetWindow,
        tokens: u64,
        limit: u64,
    ) -> Result<(), u64> {
        self.prune_if_large();
        // The entry guard holds the shard lock: check-and-increment is atomic
        // with respect to every other access of this key.
        let mut entry = self
            .counters
            .entry(Self::key(tenant_id, window))
            .or_insert(0);
        let current = *entry;
        if current + tokens > limit {
            return Err(current);
        }
        *entry = current + tokens;
        Ok(())
    }

    async fn commit(&self, tenant_id: &str, window: BudgetWindow, reserved: u64, actual: u64) {
        let mut entry = self
            .counters
            .entry(Self::key(tenant_id, window))
            .or_insert(0);
        *entry = entry.saturating_sub(reserved) + actual;
    }

    async fn release(&self, tenant_id: &str, window: BudgetWindow, tokens: u64) {
        let mut entry = self
            .counters
            .entry(Self::key(tenant_id, window))
            .or_insert(0);
        *entry = entry.saturating_sub(tokens);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
