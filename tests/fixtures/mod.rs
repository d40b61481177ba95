//! Test fixtures shared by the integration suite

use chrono::Duration;
use mm_rules::allocation::MockAllocator;
use mm_rules::metrics::MetricsCollector;
use mm_rules::service::MatchmakingService;
use mm_rules::storage::{InMemoryStorage, Storage};
use mm_rules::types::{
    GameConfig, MatchRequest, Metadata, MetadataValue, RequestStatus, Rule, Team,
};
use mm_rules::utils::current_timestamp;
use std::sync::Arc;

/// A complete in-process system: service layer over in-memory storage and a
/// scriptable allocator
pub struct TestHarness {
    pub storage: Arc<InMemoryStorage>,
    pub allocator: Arc<MockAllocator>,
    pub service: MatchmakingService,
}

pub fn harness() -> TestHarness {
    let storage = Arc::new(InMemoryStorage::new());
    let allocator = Arc::new(MockAllocator::new());
    let metrics = Arc::new(MetricsCollector::new().expect("metrics collector"));

    let service = MatchmakingService::new(storage.clone(), allocator.clone(), metrics)
        .with_allocation_retries(0, std::time::Duration::from_millis(1));

    TestHarness {
        storage,
        allocator,
        service,
    }
}

pub fn game_config(game_id: &str, teams: &[(&str, usize)], rules: Vec<Rule>) -> GameConfig {
    GameConfig {
        game_id: game_id.to_string(),
        teams: teams
            .iter()
            .map(|(name, size)| Team {
                name: name.to_string(),
                size: *size,
            })
            .collect(),
        rules,
        updated_at: current_timestamp(),
    }
}

pub fn level_rule(min: Option<i64>, max: Option<i64>, strict: bool, relax_after: Option<i64>) -> Rule {
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

/// Store a pending request whose creation instant lies `age_secs` in the
/// past, letting scenarios control wait times exactly.
pub async fn enqueue_aged(
    storage: &InMemoryStorage,
    request_id: &str,
    player_id: &str,
    game_id: &str,
    level: i64,
    age_secs: i64,
) {
    let mut metadata = Metadata::new();
    metadata.insert("level".to_string(), MetadataValue::Int(level));

    let request = MatchRequest {
        id: request_id.to_string(),
        player_id: player_id.to_string(),
        game_id: game_id.to_string(),
        metadata,
        created_at: current_timestamp() - Duration::seconds(age_secs),
        status: RequestStatus::Pending,
    };

    storage
        .store_match_request(&request)
        .await
        .expect("store request");
}
