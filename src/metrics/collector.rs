//! Metrics collection using Prometheus

use crate::error::Result;
use anyhow::Context;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Main metrics collector for the matchmaking service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Total match requests by game and status
    pub match_requests_total: IntCounterVec,

    /// Total matches created by game
    pub matches_created_total: IntCounterVec,

    /// Current number of queued requests per game
    pub queue_size: IntGaugeVec,

    /// Total allocation attempts by game and outcome
    pub allocation_requests_total: IntCounterVec,

    /// Rule evaluations by predicate kind and outcome
    pub rule_evaluations_total: IntCounterVec,

    /// Time spent forming matches per game
    pub matchmaking_duration_seconds: HistogramVec,

    /// Time spent allocating sessions per game
    pub allocation_duration_seconds: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Create a metrics collector on an existing registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let match_requests_total = IntCounterVec::new(
            Opts::new("mm_rules_match_requests_total", "Total match requests"),
            &["game_id", "status"],
        )
        .context("failed to create match request counter")?;

        let matches_created_total = IntCounterVec::new(
            Opts::new("mm_rules_matches_created_total", "Total matches created"),
            &["game_id"],
        )
        .context("failed to create match counter")?;

        let queue_size = IntGaugeVec::new(
            Opts::new("mm_rules_queue_size", "Current number of queued requests"),
            &["game_id"],
        )
        .context("failed to create queue gauge")?;

        let allocation_requests_total = IntCounterVec::new(
            Opts::new(
                "mm_rules_allocation_requests_total",
                "Total allocation attempts",
            ),
            &["game_id", "status"],
        )
        .context("failed to create allocation counter")?;

        let rule_evaluations_total = IntCounterVec::new(
            Opts::new("mm_rules_rule_evaluations_total", "Total rule evaluations"),
            &["rule_kind", "result"],
        )
        .context("failed to create rule evaluation counter")?;

        let matchmaking_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "mm_rules_matchmaking_duration_seconds",
                "Time spent forming matches",
            ),
            &["game_id"],
        )
        .context("failed to create matchmaking histogram")?;

        let allocation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "mm_rules_allocation_duration_seconds",
                "Time spent allocating sessions",
            ),
            &["game_id"],
        )
        .context("failed to create allocation histogram")?;

        registry
            .register(Box::new(match_requests_total.clone()))
            .context("failed to register match request counter")?;
        registry
            .register(Box::new(matches_created_total.clone()))
            .context("failed to register match counter")?;
        registry
            .register(Box::new(queue_size.clone()))
            .context("failed to register queue gauge")?;
        registry
            .register(Box::new(allocation_requests_total.clone()))
            .context("failed to register allocation counter")?;
        registry
            .register(Box::new(rule_evaluations_total.clone()))
            .context("failed to register rule evaluation counter")?;
        registry
            .register(Box::new(matchmaking_duration_seconds.clone()))
            .context("failed to register matchmaking histogram")?;
        registry
            .register(Box::new(allocation_duration_seconds.clone()))
            .context("failed to register allocation histogram")?;

        Ok(Self {
            registry,
            match_requests_total,
            matches_created_total,
            queue_size,
            allocation_requests_total,
            rule_evaluations_total,
            matchmaking_duration_seconds,
            allocation_duration_seconds,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Record a new match request
    pub fn record_match_request(&self, game_id: &str, status: &str) {
        self.match_requests_total
            .with_label_values(&[game_id, status])
            .inc();
    }

    /// Record a newly created match
    pub fn record_match_created(&self, game_id: &str) {
        self.matches_created_total
            .with_label_values(&[game_id])
            .inc();
    }

    /// Set the current queue size for a game
    pub fn set_queue_size(&self, game_id: &str, size: usize) {
        self.queue_size
            .with_label_values(&[game_id])
            .set(size as i64);
    }

    /// Record an allocation attempt outcome
    pub fn record_allocation(&self, game_id: &str, status: &str) {
        self.allocation_requests_total
            .with_label_values(&[game_id, status])
            .inc();
    }

    /// Record one rule evaluation
    pub fn record_rule_evaluation(&self, rule_kind: &str, passed: bool) {
        let result = if passed { "pass" } else { "fail" };
        self.rule_evaluations_total
            .with_label_values(&[rule_kind, result])
            .inc();
    }

    /// Record how long a matchmaking round took
    pub fn observe_matchmaking_duration(&self, game_id: &str, seconds: f64) {
        self.matchmaking_duration_seconds
            .with_label_values(&[game_id])
            .observe(seconds);
    }

    /// Record how long an allocation batch took
    pub fn observe_allocation_duration(&self, game_id: &str, seconds: f64) {
        self.allocation_duration_seconds
            .with_label_values(&[game_id])
            .observe(seconds);
    }

    /// Encode every registered metric in the Prometheus text format
    pub fn gather_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .context("failed to encode metrics")?;
        String::from_utf8(buffer).context("metrics are not valid utf-8")
    }
}
