//! Common types used throughout the matchmaking service

use crate::utils::{current_timestamp, generate_match_id, generate_request_id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// External player handle (not necessarily unique across games)
pub type PlayerId = String;

/// Unique identifier for match requests
pub type RequestId = String;

/// Unique identifier for matches
pub type MatchId = String;

/// Selector of which rule set / queue applies
pub type GameId = String;

/// Current lifecycle state of a match request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Matched,
    Allocated,
    Failed,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::Matched => write!(f, "matched"),
            RequestStatus::Allocated => write!(f, "allocated"),
            RequestStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Dynamically typed metadata value attached to a match request.
///
/// Decoded straight from the request JSON: integral numbers become `Int`,
/// other numbers become `Float`, and nested arrays keep their element types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<MetadataValue>),
}

impl MetadataValue {
    /// Numeric view used by min/max predicates: integers pass through,
    /// floats truncate toward zero, strings must parse as signed decimal
    /// integers. Lists have no numeric view.
    pub fn as_comparable_int(&self) -> Option<i64> {
        match self {
            MetadataValue::Int(v) => Some(*v),
            MetadataValue::Float(v) => Some(*v as i64),
            MetadataValue::Str(s) => s.parse().ok(),
            MetadataValue::List(_) => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Int(v) => write!(f, "{}", v),
            MetadataValue::Float(v) => write!(f, "{}", v),
            MetadataValue::Str(s) => write!(f, "{}", s),
            MetadataValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Metadata mapping carried by a match request, read-only after creation
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A player's pending intent to join a game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRequest {
    pub id: RequestId,
    pub player_id: PlayerId,
    pub game_id: GameId,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub status: RequestStatus,
}

impl MatchRequest {
    /// Create a new pending match request with a generated id
    pub fn new(player_id: PlayerId, game_id: GameId, metadata: Metadata) -> Self {
        Self {
            id: generate_request_id(),
            player_id,
            game_id,
            metadata,
            created_at: current_timestamp(),
            status: RequestStatus::Pending,
        }
    }
}

/// Team shape inside a game configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    pub size: usize,
}

/// The rule set and team shape for one game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default)]
    pub game_id: GameId,
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default = "current_timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// One compatibility predicate applied to a metadata field.
///
/// Exactly one of `min`, `max`, `contains`, `equals` must be set; config
/// validation rejects rules with none. The optional fields keep the wire
/// shape, [`Rule::predicate`] exposes the validated tagged view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<String>,
    #[serde(default)]
    pub strict: bool,
    /// Seconds after which the rule unconditionally passes, measured from
    /// the oldest candidate's creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relax_after: Option<i64>,
    /// Higher priority rules report their violations first
    #[serde(default)]
    pub priority: i32,
}

/// Validated, tagged view of a rule's predicate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Predicate<'a> {
    Min(i64),
    Max(i64),
    Contains(&'a str),
    Equals(&'a str),
}

impl Predicate<'_> {
    /// Short label used for metrics and diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Predicate::Min(_) => "min",
            Predicate::Max(_) => "max",
            Predicate::Contains(_) => "contains",
            Predicate::Equals(_) => "equals",
        }
    }
}

impl Rule {
    /// The first predicate present, checked in min/max/contains/equals
    /// order. `None` only for malformed rules, which config validation
    /// rejects before evaluation.
    pub fn predicate(&self) -> Option<Predicate<'_>> {
        if let Some(min) = self.min {
            Some(Predicate::Min(min))
        } else if let Some(max) = self.max {
            Some(Predicate::Max(max))
        } else if let Some(contains) = &self.contains {
            Some(Predicate::Contains(contains))
        } else {
            self.equals.as_deref().map(Predicate::Equals)
        }
    }
}

/// A confirmed grouping of players, one list per team, for one game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub game_id: GameId,
    pub teams: BTreeMap<String, Vec<PlayerId>>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<GameSession>,
}

impl Match {
    /// Create a new match with a generated id and no session
    pub fn new(game_id: GameId, teams: BTreeMap<String, Vec<PlayerId>>) -> Self {
        Self {
            id: generate_match_id(),
            game_id,
            teams,
            created_at: current_timestamp(),
            session: None,
        }
    }

    /// All player ids across every team, deduplicated, first occurrence wins
    pub fn all_players(&self) -> Vec<PlayerId> {
        let mut seen = std::collections::HashSet::new();
        let mut players = Vec::new();
        for team_players in self.teams.values() {
            for player in team_players {
                if seen.insert(player.as_str()) {
                    players.push(player.clone());
                }
            }
        }
        players
    }

    /// Total number of player slots filled across all teams
    pub fn player_count(&self) -> usize {
        self.teams.values().map(|players| players.len()).sum()
    }
}

/// The allocated game session endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSession {
    pub ip: String,
    pub port: u16,
    pub id: String,
}

/// Per-request status projection answered by the status endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchStatusView {
    pub status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_id: Option<MatchId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players: Option<Vec<PlayerId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_players: Option<Vec<PlayerId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<GameSession>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MatchStatusView {
    /// A bare view carrying only a status
    pub fn with_status(status: RequestStatus) -> Self {
        Self {
            status,
            match_id: None,
            team_name: None,
            players: None,
            all_players: None,
            session: None,
            created_at: None,
            error: None,
        }
    }
}

/// Request body submitted to the session allocation webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub match_id: MatchId,
    pub game_id: GameId,
    pub players: Vec<PlayerId>,
    pub team_name: String,
}

impl AllocationRequest {
    /// Build the webhook payload for a match: every player across teams,
    /// with the team names joined as the composition label.
    pub fn from_match(m: &Match) -> Self {
        Self {
            match_id: m.id.clone(),
            game_id: m.game_id.clone(),
            players: m.all_players(),
            team_name: m.teams.keys().cloned().collect::<Vec<_>>().join(","),
        }
    }
}

/// Response returned by the session allocation webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<GameSession>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Counters reported by the storage stats probe
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStats {
    pub total_game_configs: usize,
    pub total_game_queues: usize,
    pub total_pending_requests: usize,
}
