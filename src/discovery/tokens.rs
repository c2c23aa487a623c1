//! Token-cost estimation and discovery bookkeeping.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::types::DiscoveryConfig;

/// Estimated token cost of a discovery session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenEstimate {
    pub preview_tokens: u64,
    pub schema_tokens: u64,
    pub execution_tokens: u64,
    pub total_tokens: u64,
    /// Cost of loading every schema up front.
    pub vs_static_loading: u64,
    /// `vs_static_loading / total_tokens`, one decimal; 0 when nothing was spent.
    pub reduction_factor: f64,
}

/// Estimate the cost of `previews` search results, `schemas` described tools
/// and optionally one execution.
pub fn estimate_token_cost(
    config: &DiscoveryConfig,
    previews: usize,
    schemas: usize,
    executed: bool,
) -> TokenEstimate {
    let preview_tokens = previews as u64 * u64::from(config.search_only_tokens);
    let schema_tokens = schemas as u64 * u64::from(config.describe_only_tokens);
    let execution_tokens = if executed {
        u64::from(config.execution_tokens)
    } else {
        0
    };
    let total_tokens = preview_tokens + schema_tokens + execution_tokens;
    let vs_static_loading = u64::from(config.static_baseline_tokens);

    let reduction_factor = if total_tokens > 0 {
        (vs_static_loading as f64 / total_tokens as f64 * 10.0).round() / 10.0
    } else {
        0.0
    };

    TokenEstimate {
        preview_tokens,
        schema_tokens,
        execution_tokens,
        total_tokens,
        vs_static_loading,
        reduction_factor,
    }
}

/// Running counters kept by the discovery engine.
#[derive(Debug, Default)]
pub struct DiscoveryStats {
    searches: AtomicU64,
    previews_served: AtomicU64,
    schemas_served: AtomicU64,
    executions: AtomicU64,
    failed_executions: AtomicU64,
    estimated_tokens: AtomicU64,
}

/// Point-in-time copy of [`DiscoveryStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub searches: u64,
    pub previews_served: u64,
    pub schemas_served: u64,
    pub executions: u64,
    pub failed_executions: u64,
    pub estimated_tokens: u64,
}

impl DiscoveryStats {
    pub fn record_search(&self, config: &DiscoveryConfig, previews: usize) {
        self.searches.fetch_add(1, Ordering::Relaxed);
        self.previews_served
            .fetch_add(previews as u64, Ordering::Relaxed);
        self.add_tokens(estimate_token_cost(config, previews, 0, false).total_tokens);
    }

    pub fn record_describe(&self, config: &DiscoveryConfig, schemas: usize) {
        self.schemas_served
            .fetch_add(schemas as u64, Ordering::Relaxed);
        self.add_tokens(estimate_token_cost(config, 0, schemas, false).total_tokens);
    }

    pub fn record_execution(&self, config: &DiscoveryConfig, success: bool) {
        self.executions.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failed_executions.fetch_add(1, Ordering::Relaxed);
        }
        self.add_tokens(estimate_token_cost(config, 0, 0, true).total_tokens);
    }

    fn add_tokens(&self, tokens: u64) {
        self.estimated_tokens.fetch_add(tokens, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            searches: self.searches.load(Ordering::Relaxed),
            previews_served: self.previews_served.load(Ordering::Relaxed),
            schemas_served: self.schemas_served.load(Ordering::Relaxed),
            executions: self.executions.load(Ordering::Relaxed),
            failed_executions: self.failed_executions.load(Ordering::Relaxed),
            estimated_tokens: self.estimated_tokens.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_matches_reference_numbers() {
        let cost = estimate_token_cost(&DiscoveryConfig::default(), 10, 2, false);
        assert_eq!(cost.preview_tokens, 50);
        assert_eq!(cost.schema_tokens, 400);
        assert_eq!(cost.execution_tokens, 0);
        assert_eq!(cost.total_tokens, 450);
        assert_eq!(cost.vs_static_loading, 10_000);
        assert_eq!(cost.reduction_factor, 22.2);
    }

    #[test]
    fn test_estimate_with_execution() {
        let cost = estimate_token_cost(&DiscoveryConfig::default(), 0, 1, true);
        assert_eq!(cost.total_tokens, 250);
        assert_eq!(cost.reduction_factor, 40.0);
    }

    #[test]
    fn test_estimate_nothing_spent() {
        let cost = estimate_token_cost(&DiscoveryConfig::default(), 0, 0, false);
        assert_eq!(cost.total_tokens, 0);
        assert_eq!(cost.reduction_factor, 0.0);
    }

    #[test]
    fn test_stats_accumulate() {
        let config = DiscoveryConfig::default();
        let stats = DiscoveryStats::default();
        stats.record_search(&config, 3);
        stats.record_describe(&config, 1);
        stats.record_execution(&config, true);
        stats.record_execution(&config, false);

        let snap = stats.snapshot();
        assert_eq!(snap.searches, 1);
        assert_eq!(snap.previews_served, 3);
        assert_eq!(snap.schemas_served, 1);
        assert_eq!(snap.executions, 2);
        assert_eq!(snap.failed_executions, 1);
        assert_eq!(snap.estimated_tokens, 15 + 200 + 100);
    }
}
