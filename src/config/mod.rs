//! Configuration management for the matchmaking service

pub mod app;

pub use app::{
    validate_config, AllocationSettings, AppConfig, LogSettings, MatchmakingSettings,
    RedisSettings, ServerSettings,
};
