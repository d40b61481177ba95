//! Rule engine implementation
//!
//! Evaluates a single match request against a ranked rule list and reports
//! pass/fail plus the violated rules. Also validates game configurations at
//! ingest so evaluation never sees a malformed rule.

use crate::error::{MatchmakingError, Result};
use crate::metrics::MetricsCollector;
use crate::types::{GameConfig, MatchRequest, MetadataValue, Predicate, Rule};
use chrono::Duration;
use std::collections::HashSet;
use std::sync::Arc;

/// Stateless evaluator for matchmaking rules
#[derive(Clone, Default)]
pub struct RuleEngine {
    metrics: Option<Arc<MetricsCollector>>,
}

impl RuleEngine {
    /// Create a new rule engine instance
    pub fn new() -> Self {
        Self { metrics: None }
    }

    /// Create a rule engine that records per-rule evaluation metrics
    pub fn with_metrics(metrics: Arc<MetricsCollector>) -> Self {
        Self {
            metrics: Some(metrics),
        }
    }

    /// Evaluate one request against a rule list.
    ///
    /// Returns the pass flag and the violated rule fields, ordered by
    /// descending rule priority (stable over ties). The order only affects
    /// reporting: a request passes iff no rule is violated.
    pub fn evaluate_request(
        &self,
        request: &MatchRequest,
        rules: &[Rule],
        elapsed: Duration,
    ) -> (bool, Vec<String>) {
        let mut sorted_rules: Vec<&Rule> = rules.iter().collect();
        sorted_rules.sort_by_key(|rule| std::cmp::Reverse(rule.priority));

        let mut violations = Vec::new();
        for rule in sorted_rules {
            if !self.rule_passes(request, rule, elapsed) {
                violations.push(format!("rule '{}' failed", rule.field));
            }
        }

        (violations.is_empty(), violations)
    }

    /// Filter a candidate list down to the requests that pass every rule
    pub fn find_compatible<'a>(
        &self,
        candidates: &[&'a MatchRequest],
        rules: &[Rule],
        elapsed: Duration,
    ) -> Vec<&'a MatchRequest> {
        candidates
            .iter()
            .filter(|request| self.evaluate_request(request, rules, elapsed).0)
            .copied()
            .collect()
    }

    /// Evaluate a single rule against a request
    fn rule_passes(&self, request: &MatchRequest, rule: &Rule, elapsed: Duration) -> bool {
        // Relaxed rules pass unconditionally once the oldest candidate has
        // waited long enough; relax_after = 0 always passes.
        if let Some(relax_after) = rule.relax_after {
            if elapsed >= Duration::seconds(relax_after) {
                return true;
            }
        }

        let passed = match request.metadata.get(&rule.field) {
            // A missing field fails only strict rules
            None => !rule.strict,
            Some(value) => match rule.predicate() {
                Some(predicate) => {
                    let passed = evaluate_predicate(value, predicate);
                    if let Some(metrics) = &self.metrics {
                        metrics.record_rule_evaluation(predicate.kind(), passed);
                    }
                    passed
                }
                // Validation rejects predicate-less rules at config ingest
                None => true,
            },
        };

        passed
    }

    /// Validate a game configuration before it is accepted for matching
    pub fn validate_game_config(&self, config: &GameConfig) -> Result<()> {
        if config.game_id.is_empty() {
            return Err(invalid_config("game_id is required"));
        }

        if config.teams.is_empty() {
            return Err(invalid_config("at least one team must be defined"));
        }

        let mut team_names = HashSet::new();
        for (i, team) in config.teams.iter().enumerate() {
            if team.name.is_empty() {
                return Err(invalid_config(&format!("team {}: name is required", i)));
            }
            if team.size == 0 {
                return Err(invalid_config(&format!(
                    "team {}: size must be greater than 0",
                    i
                )));
            }
            if !team_names.insert(team.name.as_str()) {
                return Err(invalid_config(&format!(
                    "team {}: duplicate team name '{}'",
                    i, team.name
                )));
            }
        }

        for (i, rule) in config.rules.iter().enumerate() {
            if rule.field.is_empty() {
                return Err(invalid_config(&format!("rule {}: field is required", i)));
            }
            if rule.predicate().is_none() {
                return Err(invalid_config(&format!(
                    "rule {}: at least one of min, max, contains, equals must be set",
                    i
                )));
            }
        }

        Ok(())
    }
}

/// Central predicate evaluation over the typed metadata value
fn evaluate_predicate(value: &MetadataValue, predicate: Predicate<'_>) -> bool {
    match predicate {
        Predicate::Min(min) => match value.as_comparable_int() {
            Some(v) => v >= min,
            None => false,
        },
        Predicate::Max(max) => match value.as_comparable_int() {
            Some(v) => v <= max,
            None => false,
        },
        // `contains` compares for equality, not substring containment: a
        // string value must equal the target, a list passes when any
        // element's string form equals the target.
        Predicate::Contains(target) => match value {
            MetadataValue::Str(s) => s == target,
            MetadataValue::List(items) => items.iter().any(|item| item.to_string() == target),
            other => other.to_string() == target,
        },
        Predicate::Equals(target) => value.to_string() == target,
    }
}

fn invalid_config(reason: &str) -> anyhow::Error {
    MatchmakingError::InvalidGameConfig {
        reason: reason.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Metadata, Team};

    fn request_with(entries: &[(&str, MetadataValue)]) -> MatchRequest {
        let mut metadata = Metadata::new();
        for (key, value) in entries {
            metadata.insert(key.to_string(), value.clone());
        }
        MatchRequest::new("player".to_string(), "game".to_string(), metadata)
    }

    fn min_rule(field: &str, min: i64) -> Rule {
        Rule {
            field: field.to_string(),
            min: Some(min),
            max: None,
            contains: None,
            equals: None,
            strict: false,
            relax_after: None,
            priority: 0,
        }
    }

    fn no_elapsed() -> Duration {
        Duration::zero()
    }

    #[test]
    fn test_min_rule_numeric_types() {
        let engine = RuleEngine::new();
        let rules = vec![min_rule("level", 10)];

        let (pass, _) = engine.evaluate_request(
            &request_with(&[("level", MetadataValue::Int(15))]),
            &rules,
            no_elapsed(),
        );
        assert!(pass);

        // floats truncate toward zero before comparing
        let (pass, _) = engine.evaluate_request(
            &request_with(&[("level", MetadataValue::Float(10.9))]),
            &rules,
            no_elapsed(),
        );
        assert!(pass);

        let (pass, _) = engine.evaluate_request(
            &request_with(&[("level", MetadataValue::Float(9.9))]),
            &rules,
            no_elapsed(),
        );
        assert!(!pass);

        // strings parse as signed decimal integers
        let (pass, _) = engine.evaluate_request(
            &request_with(&[("level", MetadataValue::Str("12".to_string()))]),
            &rules,
            no_elapsed(),
        );
        assert!(pass);

        let (pass, violations) = engine.evaluate_request(
            &request_with(&[("level", MetadataValue::Str("high".to_string()))]),
            &rules,
            no_elapsed(),
        );
        assert!(!pass);
        assert_eq!(violations, vec!["rule 'level' failed"]);

        // lists never satisfy numeric predicates
        let (pass, _) = engine.evaluate_request(
            &request_with(&[("level", MetadataValue::List(vec![MetadataValue::Int(99)]))]),
            &rules,
            no_elapsed(),
        );
        assert!(!pass);
    }

    #[test]
    fn test_max_rule() {
        let engine = RuleEngine::new();
        let rules = vec![Rule {
            max: Some(50),
            min: None,
            ..min_rule("level", 0)
        }];

        let (pass, _) = engine.evaluate_request(
            &request_with(&[("level", MetadataValue::Int(50))]),
            &rules,
            no_elapsed(),
        );
        assert!(pass);

        let (pass, _) = engine.evaluate_request(
            &request_with(&[("level", MetadataValue::Int(51))]),
            &rules,
            no_elapsed(),
        );
        assert!(!pass);
    }

    #[test]
    fn test_contains_is_equality_on_strings() {
        let engine = RuleEngine::new();
        let rules = vec![Rule {
            min: None,
            contains: Some("eu".to_string()),
            ..min_rule("region", 0)
        }];

        let (pass, _) = engine.evaluate_request(
            &request_with(&[("region", MetadataValue::Str("eu".to_string()))]),
            &rules,
            no_elapsed(),
        );
        assert!(pass);

        // "eu-west" contains "eu" as a substring but does not equal it
        let (pass, _) = engine.evaluate_request(
            &request_with(&[("region", MetadataValue::Str("eu-west".to_string()))]),
            &rules,
            no_elapsed(),
        );
        assert!(!pass);
    }

    #[test]
    fn test_contains_matches_any_list_element() {
        let engine = RuleEngine::new();
        let rules = vec![Rule {
            min: None,
            contains: Some("ranked".to_string()),
            ..min_rule("modes", 0)
        }];

        let (pass, _) = engine.evaluate_request(
            &request_with(&[(
                "modes",
                MetadataValue::List(vec![
                    MetadataValue::Str("casual".to_string()),
                    MetadataValue::Str("ranked".to_string()),
                ]),
            )]),
            &rules,
            no_elapsed(),
        );
        assert!(pass);

        let (pass, _) = engine.evaluate_request(
            &request_with(&[(
                "modes",
                MetadataValue::List(vec![MetadataValue::Str("casual".to_string())]),
            )]),
            &rules,
            no_elapsed(),
        );
        assert!(!pass);
    }

    #[test]
    fn test_equals_compares_string_forms() {
        let engine = RuleEngine::new();
        let rules = vec![Rule {
            min: None,
            equals: Some("25".to_string()),
            ..min_rule("level", 0)
        }];

        let (pass, _) = engine.evaluate_request(
            &request_with(&[("level", MetadataValue::Int(25))]),
            &rules,
            no_elapsed(),
        );
        assert!(pass);

        let (pass, _) = engine.evaluate_request(
            &request_with(&[("level", MetadataValue::Int(26))]),
            &rules,
            no_elapsed(),
        );
        assert!(!pass);
    }

    #[test]
    fn test_missing_field_strictness() {
        let engine = RuleEngine::new();
        let request = request_with(&[]);

        let lenient = vec![min_rule("level", 10)];
        let (pass, _) = engine.evaluate_request(&request, &lenient, no_elapsed());
        assert!(pass);

        let strict = vec![Rule {
            strict: true,
            ..min_rule("level", 10)
        }];
        let (pass, _) = engine.evaluate_request(&request, &strict, no_elapsed());
        assert!(!pass);
    }

    #[test]
    fn test_relaxation_overrides_failure() {
        let engine = RuleEngine::new();
        let rules = vec![Rule {
            strict: true,
            relax_after: Some(10),
            ..min_rule("level", 50)
        }];
        let request = request_with(&[("level", MetadataValue::Int(5))]);

        let (pass, _) = engine.evaluate_request(&request, &rules, Duration::seconds(9));
        assert!(!pass);

        let (pass, _) = engine.evaluate_request(&request, &rules, Duration::seconds(10));
        assert!(pass);

        // relax_after = 0 always passes, even for a missing strict field
        let zero = vec![Rule {
            strict: true,
            relax_after: Some(0),
            ..min_rule("level", 50)
        }];
        let (pass, _) = engine.evaluate_request(&request_with(&[]), &zero, no_elapsed());
        assert!(pass);
    }

    #[test]
    fn test_violations_ordered_by_priority() {
        let engine = RuleEngine::new();
        let rules = vec![
            Rule {
                priority: 1,
                ..min_rule("level", 100)
            },
            Rule {
                priority: 10,
                ..min_rule("rank", 100)
            },
        ];
        let request = request_with(&[
            ("level", MetadataValue::Int(1)),
            ("rank", MetadataValue::Int(1)),
        ]);

        let (pass, violations) = engine.evaluate_request(&request, &rules, no_elapsed());
        assert!(!pass);
        assert_eq!(violations, vec!["rule 'rank' failed", "rule 'level' failed"]);
    }

    #[test]
    fn test_find_compatible() {
        let engine = RuleEngine::new();
        let rules = vec![min_rule("level", 20)];

        let r1 = request_with(&[("level", MetadataValue::Int(25))]);
        let r2 = request_with(&[("level", MetadataValue::Int(15))]);
        let r3 = request_with(&[("level", MetadataValue::Int(22))]);
        let candidates = vec![&r1, &r2, &r3];

        let compatible = engine.find_compatible(&candidates, &rules, no_elapsed());
        let ids: Vec<&str> = compatible.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![r1.id.as_str(), r3.id.as_str()]);
    }

    fn valid_config() -> GameConfig {
        GameConfig {
            game_id: "game".to_string(),
            teams: vec![Team {
                name: "team1".to_string(),
                size: 2,
            }],
            rules: vec![min_rule("level", 10)],
            updated_at: crate::utils::current_timestamp(),
        }
    }

    #[test]
    fn test_validate_game_config() {
        let engine = RuleEngine::new();
        assert!(engine.validate_game_config(&valid_config()).is_ok());

        let mut config = valid_config();
        config.game_id = String::new();
        assert!(engine.validate_game_config(&config).is_err());

        let mut config = valid_config();
        config.teams.clear();
        assert!(engine.validate_game_config(&config).is_err());

        let mut config = valid_config();
        config.teams[0].size = 0;
        assert!(engine.validate_game_config(&config).is_err());

        let mut config = valid_config();
        config.teams.push(Team {
            name: "team1".to_string(),
            size: 1,
        });
        assert!(engine.validate_game_config(&config).is_err());

        let mut config = valid_config();
        config.rules[0].min = None;
        assert!(engine.validate_game_config(&config).is_err());
    }
}
