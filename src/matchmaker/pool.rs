//! Core matchmaking algorithm
//!
//! Matches are formed in rounds. A round walks the configured teams in
//! declared order and fills each one with the oldest-waiting compatible
//! candidates; a round that cannot fill every team emits nothing. Requests
//! committed in earlier rounds are never reconsidered, so every successful
//! round strictly shrinks the candidate pool and the loop terminates.

use crate::metrics::MetricsCollector;
use crate::rules::RuleEngine;
use crate::types::{GameConfig, Match, MatchRequest, RequestId};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// A formed match together with the request ids selected per team.
///
/// The match itself only carries player ids; the request ids are what the
/// service layer needs for status bookkeeping and queue removal.
#[derive(Debug, Clone)]
pub struct FormedMatch {
    pub game_match: Match,
    pub team_requests: BTreeMap<String, Vec<RequestId>>,
}

impl FormedMatch {
    /// Request ids across every team of this match
    pub fn request_ids(&self) -> Vec<RequestId> {
        self.team_requests.values().flatten().cloned().collect()
    }
}

/// The core matchmaker
#[derive(Clone, Default)]
pub struct Matchmaker {
    rule_engine: RuleEngine,
}

impl Matchmaker {
    /// Create a new matchmaker instance
    pub fn new() -> Self {
        Self {
            rule_engine: RuleEngine::new(),
        }
    }

    /// Create a matchmaker whose rule engine records evaluation metrics
    pub fn with_metrics(metrics: Arc<MetricsCollector>) -> Self {
        Self {
            rule_engine: RuleEngine::with_metrics(metrics),
        }
    }

    /// Form as many complete matches as the candidate pool allows.
    ///
    /// Candidates are the pending requests of one game, in queue order. The
    /// result is deterministic for a fixed candidate list, config and `now`:
    /// no partial matches, and no request appears in more than one match.
    /// The config is assumed validated.
    pub fn process_pool(
        &self,
        candidates: &[MatchRequest],
        config: &GameConfig,
        now: DateTime<Utc>,
    ) -> Vec<FormedMatch> {
        let mut results = Vec::new();
        let mut used: HashSet<&str> = HashSet::new();

        while let Some(round) = self.form_round(candidates, config, &used, now) {
            for (_, selected) in &round {
                for request in selected {
                    used.insert(request.id.as_str());
                }
            }

            let mut teams = BTreeMap::new();
            let mut team_requests = BTreeMap::new();
            for (team_name, selected) in round {
                let players = selected.iter().map(|r| r.player_id.clone()).collect();
                let requests = selected.iter().map(|r| r.id.clone()).collect();
                teams.insert(team_name.clone(), players);
                team_requests.insert(team_name, requests);
            }

            let game_match = Match::new(config.game_id.clone(), teams);
            debug!(
                match_id = %game_match.id,
                game_id = %game_match.game_id,
                players = game_match.player_count(),
                "formed match"
            );
            results.push(FormedMatch {
                game_match,
                team_requests,
            });
        }

        results
    }

    /// Attempt one round: fill every configured team, in declared order.
    ///
    /// Returns `None` as soon as any team cannot be filled, which ends the
    /// whole run; previously committed matches stay untouched.
    fn form_round<'a>(
        &self,
        candidates: &'a [MatchRequest],
        config: &GameConfig,
        used: &HashSet<&str>,
        now: DateTime<Utc>,
    ) -> Option<Vec<(String, Vec<&'a MatchRequest>)>> {
        let mut picked_this_round: HashSet<&str> = HashSet::new();
        let mut round = Vec::with_capacity(config.teams.len());

        for team in &config.teams {
            let available: Vec<&MatchRequest> = candidates
                .iter()
                .filter(|r| {
                    !used.contains(r.id.as_str()) && !picked_this_round.contains(r.id.as_str())
                })
                .collect();

            if available.len() < team.size {
                return None;
            }

            // One consistent relaxation clock per team slot, driven by the
            // longest-waiting available candidate.
            let oldest = available
                .iter()
                .min_by(|a, b| {
                    a.created_at
                        .cmp(&b.created_at)
                        .then_with(|| a.id.cmp(&b.id))
                })
                .copied()?;
            let elapsed = now - oldest.created_at;

            let mut compatible =
                self.rule_engine
                    .find_compatible(&available, &config.rules, elapsed);
            if compatible.len() < team.size {
                return None;
            }

            // Longest waiters first, ties broken by id for determinism
            compatible.sort_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.id.cmp(&b.id))
            });
            compatible.truncate(team.size);

            for request in &compatible {
                picked_this_round.insert(request.id.as_str());
            }
            round.push((team.name.clone(), compatible));
        }

        Some(round)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Metadata, MetadataValue, RequestStatus, Rule, Team};
    use chrono::Duration;

    fn request_at(id: &str, player: &str, level: i64, age_secs: i64, now: DateTime<Utc>) -> MatchRequest {
        let mut metadata = Metadata::new();
        metadata.insert("level".to_string(), MetadataValue::Int(level));
        MatchRequest {
            id: id.to_string(),
            player_id: player.to_string(),
            game_id: "game".to_string(),
            metadata,
            created_at: now - Duration::seconds(age_secs),
            status: RequestStatus::Pending,
        }
    }

    fn level_rule(min: Option<i64>, max: Option<i64>, strict: bool, relax_after: Option<i64>) -> Rule {
        Rule {
            field: "level".to_string(),
            min,
            max,
            contains: None,
            equals: None,
            strict,
            relax_after,
            priority: 0,
        }
    }

    fn config(teams: &[(&str, usize)], rules: Vec<Rule>) -> GameConfig {
        GameConfig {
            game_id: "game".to_string(),
            teams: teams
                .iter()
                .map(|(name, size)| Team {
                    name: name.to_string(),
                    size: *size,
                })
                .collect(),
            rules,
            updated_at: crate::utils::current_timestamp(),
        }
    }

    #[test]
    fn test_one_v_one_pairs_by_wait_time() {
        let now = crate::utils::current_timestamp();
        let matchmaker = Matchmaker::new();
        let config = config(
            &[("a", 1), ("b", 1)],
            vec![level_rule(Some(10), Some(50), false, None)],
        );
        let queue = vec![
            request_at("r1", "p1", 25, 60, now),
            request_at("r2", "p2", 30, 30, now),
        ];

        let matches = matchmaker.process_pool(&queue, &config, now);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].game_match.teams["a"], vec!["p1"]);
        assert_eq!(matches[0].game_match.teams["b"], vec!["p2"]);
        assert_eq!(matches[0].team_requests["a"], vec!["r1"]);
        assert_eq!(matches[0].team_requests["b"], vec!["r2"]);
    }

    #[test]
    fn test_asymmetric_teams_fill_in_declared_order() {
        let now = crate::utils::current_timestamp();
        let matchmaker = Matchmaker::new();
        let config = config(
            &[("solo", 1), ("trio", 3)],
            vec![level_rule(Some(15), Some(60), false, None)],
        );
        let queue = vec![
            request_at("solo", "solo", 35, 60, now),
            request_at("t1", "t1", 28, 40, now),
            request_at("t2", "t2", 32, 30, now),
            request_at("t3", "t3", 29, 20, now),
        ];

        let matches = matchmaker.process_pool(&queue, &config, now);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].game_match.teams["solo"], vec!["solo"]);
        assert_eq!(matches[0].game_match.teams["trio"], vec!["t1", "t2", "t3"]);
    }

    #[test]
    fn test_back_to_back_rounds_pair_oldest_first() {
        let now = crate::utils::current_timestamp();
        let matchmaker = Matchmaker::new();
        let config = config(
            &[("a", 1), ("b", 1)],
            vec![level_rule(Some(10), Some(50), false, None)],
        );
        let queue = vec![
            request_at("r1", "p1", 25, 120, now),
            request_at("r2", "p2", 30, 90, now),
            request_at("r3", "p3", 35, 10, now),
            request_at("r4", "p4", 40, 5, now),
        ];

        let matches = matchmaker.process_pool(&queue, &config, now);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].game_match.teams["a"], vec!["p1"]);
        assert_eq!(matches[0].game_match.teams["b"], vec!["p2"]);
        assert_eq!(matches[1].game_match.teams["a"], vec!["p3"]);
        assert_eq!(matches[1].game_match.teams["b"], vec!["p4"]);
    }

    #[test]
    fn test_incompatible_candidate_stays_queued() {
        let now = crate::utils::current_timestamp();
        let matchmaker = Matchmaker::new();
        let config = config(&[("a", 2)], vec![level_rule(Some(20), None, true, None)]);
        let queue = vec![
            request_at("r1", "p1", 25, 30, now),
            request_at("r2", "p2", 15, 20, now),
            request_at("r3", "p3", 22, 10, now),
        ];

        let matches = matchmaker.process_pool(&queue, &config, now);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].game_match.teams["a"], vec!["p1", "p3"]);
    }

    #[test]
    fn test_relaxation_unlocks_match() {
        let now = crate::utils::current_timestamp();
        let matchmaker = Matchmaker::new();
        let config = config(&[("a", 2)], vec![level_rule(Some(50), None, true, Some(10))]);
        // both fail the min rule, but the oldest has waited past relax_after
        let queue = vec![
            request_at("r1", "p1", 10, 20, now),
            request_at("r2", "p2", 15, 15, now),
        ];

        let matches = matchmaker.process_pool(&queue, &config, now);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].game_match.teams["a"], vec!["p1", "p2"]);
    }

    #[test]
    fn test_no_relaxation_before_threshold() {
        let now = crate::utils::current_timestamp();
        let matchmaker = Matchmaker::new();
        let config = config(&[("a", 2)], vec![level_rule(Some(50), None, true, Some(30))]);
        let queue = vec![
            request_at("r1", "p1", 10, 20, now),
            request_at("r2", "p2", 15, 15, now),
        ];

        let matches = matchmaker.process_pool(&queue, &config, now);
        assert!(matches.is_empty());
    }

    #[test]
    fn test_empty_and_short_queues_produce_no_matches() {
        let now = crate::utils::current_timestamp();
        let matchmaker = Matchmaker::new();
        let config = config(&[("a", 3)], vec![]);

        assert!(matchmaker.process_pool(&[], &config, now).is_empty());

        let queue = vec![
            request_at("r1", "p1", 25, 30, now),
            request_at("r2", "p2", 30, 20, now),
        ];
        assert!(matchmaker.process_pool(&queue, &config, now).is_empty());
    }

    #[test]
    fn test_all_strict_rules_and_missing_field_block_matching() {
        let now = crate::utils::current_timestamp();
        let matchmaker = Matchmaker::new();
        let config = config(&[("a", 1)], vec![level_rule(Some(1), None, true, None)]);
        let queue = vec![MatchRequest {
            id: "r1".to_string(),
            player_id: "p1".to_string(),
            game_id: "game".to_string(),
            metadata: Metadata::new(),
            created_at: now,
            status: RequestStatus::Pending,
        }];

        assert!(matchmaker.process_pool(&queue, &config, now).is_empty());
    }

    #[test]
    fn test_no_request_appears_in_two_matches() {
        let now = crate::utils::current_timestamp();
        let matchmaker = Matchmaker::new();
        let config = config(&[("a", 2), ("b", 2)], vec![]);
        let queue: Vec<MatchRequest> = (0..9)
            .map(|i| request_at(&format!("r{}", i), &format!("p{}", i), 20, 100 - i, now))
            .collect();

        let matches = matchmaker.process_pool(&queue, &config, now);
        assert_eq!(matches.len(), 2);

        let mut seen = HashSet::new();
        for formed in &matches {
            for request_id in formed.request_ids() {
                assert!(seen.insert(request_id), "request selected twice");
            }
            for (team, players) in &formed.game_match.teams {
                let size = config.teams.iter().find(|t| &t.name == team).unwrap().size;
                assert_eq!(players.len(), size, "team must be filled exactly");
            }
        }
    }

    #[test]
    fn test_fairness_prefers_longest_waiters() {
        let now = crate::utils::current_timestamp();
        let matchmaker = Matchmaker::new();
        let config = config(&[("a", 2)], vec![]);
        let queue = vec![
            request_at("r1", "p1", 20, 10, now),
            request_at("r2", "p2", 20, 50, now),
            request_at("r3", "p3", 20, 40, now),
            request_at("r4", "p4", 20, 30, now),
        ];

        let matches = matchmaker.process_pool(&queue, &config, now);
        // every selected wait is >= every rejected compatible wait
        assert_eq!(matches[0].game_match.teams["a"], vec!["p2", "p3"]);
    }

    #[test]
    fn test_deterministic_given_same_inputs() {
        let now = crate::utils::current_timestamp();
        let matchmaker = Matchmaker::new();
        let config = config(
            &[("a", 1), ("b", 2)],
            vec![level_rule(Some(10), Some(60), false, None)],
        );
        let queue: Vec<MatchRequest> = (0..7)
            .map(|i| request_at(&format!("r{}", i), &format!("p{}", i), 30, 60 + i, now))
            .collect();

        let first = matchmaker.process_pool(&queue, &config, now);
        let second = matchmaker.process_pool(&queue, &config, now);

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.game_match.teams, b.game_match.teams);
            assert_eq!(a.team_requests, b.team_requests);
        }
    }

    #[test]
    fn test_ties_broken_by_id() {
        let now = crate::utils::current_timestamp();
        let matchmaker = Matchmaker::new();
        let config = config(&[("a", 1)], vec![]);
        let queue = vec![
            request_at("rb", "pb", 20, 30, now),
            request_at("ra", "pa", 20, 30, now),
        ];

        let matches = matchmaker.process_pool(&queue, &config, now);
        assert_eq!(matches[0].game_match.teams["a"], vec!["pa"]);
    }
}
