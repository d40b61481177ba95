//! Metrics collection for the matchmaking service
//!
//! Prometheus counters, gauges and histograms covering request intake,
//! match formation, rule evaluation and session allocation.

pub mod collector;

pub use collector::MetricsCollector;
